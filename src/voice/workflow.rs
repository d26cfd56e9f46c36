//! Voice-room lifecycle.
//!
//! A room exists in the store only while its channel exists and holds at
//! least one member. Every voice-state change re-checks the vacated
//! channel; emptiness deletes it. There is deliberately no guard against
//! a member re-triggering the lobby join before their first room is
//! cleaned up.

use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::config::VoiceConfig;
use crate::gateway::events::{InteractionEvent, MessageEvent, VoiceStateEvent};
use crate::gateway::{
    ActionRow, ChannelId, ChatOps, Component, Embed, OutboundMessage, SelectOption, UserId,
};
use crate::store::EntityStore;

use super::panel;

const MAX_RENAMES: u32 = 2;
const MAX_CUSTOM_NAME_LEN: usize = 25;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RoomType {
    #[default]
    Default,
    General,
    Gaming,
    Music,
    Study,
    Meeting,
}

impl RoomType {
    /// Types offered in the control panel. `Default` is only the initial
    /// state and never selectable.
    pub const SELECTABLE: [RoomType; 5] = [
        RoomType::General,
        RoomType::Gaming,
        RoomType::Music,
        RoomType::Study,
        RoomType::Meeting,
    ];

    pub fn emoji(self) -> &'static str {
        match self {
            RoomType::Default => "🔊",
            RoomType::General => "💬",
            RoomType::Gaming => "🐴",
            RoomType::Music => "🏴",
            RoomType::Study => "📚",
            RoomType::Meeting => "🗣️",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RoomType::Default => "room",
            RoomType::General => "free-talk",
            RoomType::Gaming => "battle room",
            RoomType::Music => "music room",
            RoomType::Study => "study room",
            RoomType::Meeting => "meeting room",
        }
    }

    pub fn value(self) -> &'static str {
        match self {
            RoomType::Default => "default",
            RoomType::General => "general",
            RoomType::Gaming => "gaming",
            RoomType::Music => "music",
            RoomType::Study => "study",
            RoomType::Meeting => "meeting",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            RoomType::Default => "The initial room theme.",
            RoomType::General => "For everyday conversation.",
            RoomType::Gaming => "For matches, scrims and training.",
            RoomType::Music => "For listening together.",
            RoomType::Study => "For study and onboarding sessions.",
            RoomType::Meeting => "For meetings.",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::SELECTABLE
            .iter()
            .copied()
            .find(|t| t.value() == value)
    }
}

#[derive(Debug, Clone)]
pub struct VoiceRoom {
    pub owner_id: UserId,
    pub created_at: DateTime<Utc>,
    pub room_type: RoomType,
    pub name_changes: u32,
}

pub struct VoiceWorkflow {
    chat: Arc<dyn ChatOps>,
    store: Arc<EntityStore<VoiceRoom>>,
    config: VoiceConfig,
}

impl VoiceWorkflow {
    pub fn new(
        chat: Arc<dyn ChatOps>,
        store: Arc<EntityStore<VoiceRoom>>,
        config: VoiceConfig,
    ) -> Self {
        Self {
            chat,
            store,
            config,
        }
    }

    pub fn store(&self) -> &EntityStore<VoiceRoom> {
        &self.store
    }

    /// Lobby joins provision a room; every vacated tracked channel gets
    /// an emptiness check.
    pub async fn on_voice_state(&self, ev: &VoiceStateEvent, now: DateTime<Utc>) -> Result<()> {
        let lobby = ChannelId::new(self.config.lobby_channel_id.clone());
        if ev.new_channel.as_ref() == Some(&lobby) && ev.old_channel.as_ref() != Some(&lobby) {
            self.provision_room(&ev.user, now).await?;
        }

        if let Some(old_channel) = &ev.old_channel {
            self.cleanup_if_empty(old_channel).await;
        }
        Ok(())
    }

    async fn provision_room(&self, user: &UserId, now: DateTime<Utc>) -> Result<()> {
        let display_name = self
            .chat
            .member_display_name(user)
            .await
            .unwrap_or_else(|_| user.to_string());
        let category = ChannelId::new(self.config.category_id.clone());

        let channel = self
            .chat
            .create_voice_channel(&format!("🔊 {display_name}'s room"), &category, user)
            .await?;

        self.store.insert(
            channel.as_str(),
            VoiceRoom {
                owner_id: user.clone(),
                created_at: now,
                room_type: RoomType::Default,
                name_changes: 0,
            },
        );

        if let Err(e) = self.chat.move_member(user, &channel).await {
            warn!(user = %user, channel = %channel, error = %e, "failed to move member into new room");
        }
        if let Err(e) = self
            .chat
            .send_direct_message(user, panel::control_panel(&channel))
            .await
        {
            warn!(user = %user, error = %e, "failed to DM control panel");
        }

        info!(user = %user, channel = %channel, "voice room provisioned");
        Ok(())
    }

    async fn cleanup_if_empty(&self, channel: &ChannelId) {
        if !self.store.contains(channel.as_str()) {
            return;
        }
        let occupied = match self.chat.channel_members(channel).await {
            Ok(members) => !members.is_empty(),
            Err(e) => {
                warn!(channel = %channel, error = %e, "failed to check room occupancy");
                return;
            }
        };
        if occupied {
            return;
        }

        if let Err(e) = self.chat.delete_channel(channel).await {
            if e.is_not_found() {
                debug!(channel = %channel, "empty room was already deleted");
            } else {
                warn!(channel = %channel, error = %e, "failed to delete empty room");
            }
        }
        self.store.remove(channel.as_str());
        info!(channel = %channel, "empty voice room removed");
    }

    /// Control-panel interactions. Every action is owner-only.
    pub async fn handle_interaction(
        &self,
        ev: &InteractionEvent,
        action: &str,
        channel_id: &str,
    ) -> Result<()> {
        let Some(room) = self.store.get(channel_id) else {
            self.ephemeral(ev, "⚠️ That voice room no longer exists.").await;
            return Ok(());
        };
        if room.owner_id != ev.user {
            self.ephemeral(ev, "⚠️ You do not own this voice room.").await;
            return Ok(());
        }
        let channel = ChannelId::new(channel_id.to_string());

        match action {
            "check" => self.show_permissions(ev, &channel, &room).await?,
            "transfer" => self.offer_transfer(ev, &channel).await?,
            "pick" => self.transfer_ownership(ev, &channel).await?,
            "rename" => self.rename(ev, &channel, channel_id).await?,
            "type" => self.change_type(ev, &channel, channel_id, &room).await?,
            _ => {}
        }
        Ok(())
    }

    async fn show_permissions(
        &self,
        ev: &InteractionEvent,
        channel: &ChannelId,
        room: &VoiceRoom,
    ) -> Result<()> {
        let members = self.chat.channel_members(channel).await.unwrap_or_default();
        let listing = if members.is_empty() {
            "None".to_string()
        } else {
            members
                .iter()
                .map(|m| {
                    let marker = if m.id == room.owner_id { "👑" } else { "👤" };
                    format!("{marker} {}", m.display_name)
                })
                .collect::<Vec<_>>()
                .join("\n")
        };

        let embed = Embed::builder()
            .color(0x3498DB)
            .title("🔔 Voice room permissions")
            .field("Owner", format!("<@{}>", room.owner_id), false)
            .field("Current members", listing, false)
            .build();
        if let Err(e) = self
            .chat
            .send_message(&ev.channel, OutboundMessage::embed(embed).as_ephemeral())
            .await
        {
            warn!(error = %e, "failed to send permission summary");
        }
        Ok(())
    }

    async fn offer_transfer(&self, ev: &InteractionEvent, channel: &ChannelId) -> Result<()> {
        let members = self.chat.channel_members(channel).await.unwrap_or_default();
        let options: Vec<SelectOption> = members
            .iter()
            .filter(|m| m.id != ev.user)
            .map(|m| {
                SelectOption::new(m.display_name.clone(), m.id.as_str())
                    .describe(format!("ID: {}", m.id))
            })
            .collect();

        if options.is_empty() {
            self.ephemeral(ev, "⚠️ There is no other member to transfer ownership to.")
                .await;
            return Ok(());
        }

        let menu = ActionRow::new(vec![Component::select_menu(
            format!("voiceroom_pick_{channel}"),
            "Choose the new owner",
            options,
        )]);
        let payload = OutboundMessage::ephemeral("👑 Choose who receives ownership of the room:")
            .with_components(vec![menu]);
        if let Err(e) = self.chat.send_message(&ev.channel, payload).await {
            warn!(error = %e, "failed to send transfer menu");
        }
        Ok(())
    }

    async fn transfer_ownership(&self, ev: &InteractionEvent, channel: &ChannelId) -> Result<()> {
        let Some(new_owner) = ev.values.first().map(|v| UserId::new(v.clone())) else {
            return Ok(());
        };

        if let Err(e) = self.chat.revoke_room_owner(channel, &ev.user).await {
            warn!(channel = %channel, error = %e, "failed to revoke old owner permissions");
        }
        if let Err(e) = self.chat.grant_room_owner(channel, &new_owner).await {
            warn!(channel = %channel, error = %e, "failed to grant new owner permissions");
        }

        self.store.with_entry(channel.as_str(), |room| {
            room.owner_id = new_owner.clone();
        });

        self.ephemeral(
            ev,
            &format!("✅ Room ownership was transferred to <@{new_owner}>."),
        )
        .await;
        if let Err(e) = self
            .chat
            .send_direct_message(&new_owner, panel::control_panel(channel))
            .await
        {
            warn!(user = %new_owner, error = %e, "failed to DM control panel to new owner");
        }
        info!(channel = %channel, new_owner = %new_owner, "room ownership transferred");
        Ok(())
    }

    async fn rename(
        &self,
        ev: &InteractionEvent,
        channel: &ChannelId,
        channel_id: &str,
    ) -> Result<()> {
        let Some(custom_name) = ev.values.first() else {
            return Ok(());
        };
        let custom_name: String = custom_name.chars().take(MAX_CUSTOM_NAME_LEN).collect();

        enum Outcome {
            Renamed { new_name: String, remaining: u32 },
            CapReached,
        }
        let outcome = self.store.with_entry(channel_id, |room| {
            if room.name_changes >= MAX_RENAMES {
                return Outcome::CapReached;
            }
            room.name_changes += 1;
            Outcome::Renamed {
                new_name: format!("{} {custom_name}", room.room_type.emoji()),
                remaining: MAX_RENAMES - room.name_changes,
            }
        });

        match outcome {
            Some(Outcome::Renamed { new_name, remaining }) => {
                if let Err(e) = self.chat.set_channel_name(channel, &new_name).await {
                    warn!(channel = %channel, error = %e, "failed to rename room");
                }
                self.ephemeral(
                    ev,
                    &format!("✅ Room renamed to `{new_name}`. ({remaining} renames left)"),
                )
                .await;
            }
            Some(Outcome::CapReached) => {
                self.ephemeral(ev, "⚠️ Rooms can be renamed at most 2 times.").await;
            }
            None => {
                self.ephemeral(ev, "⚠️ That voice room no longer exists.").await;
            }
        }
        Ok(())
    }

    /// Type change re-themes the name without consuming a rename.
    async fn change_type(
        &self,
        ev: &InteractionEvent,
        channel: &ChannelId,
        channel_id: &str,
        room: &VoiceRoom,
    ) -> Result<()> {
        let Some(room_type) = ev.values.first().and_then(|v| RoomType::parse(v)) else {
            self.ephemeral(ev, "⚠️ Unknown room type.").await;
            return Ok(());
        };

        let owner_name = self
            .chat
            .member_display_name(&room.owner_id)
            .await
            .unwrap_or_else(|_| room.owner_id.to_string());
        let new_name = format!("{} {owner_name}'s {}", room_type.emoji(), room_type.label());

        if let Err(e) = self.chat.set_channel_name(channel, &new_name).await {
            warn!(channel = %channel, error = %e, "failed to re-theme room");
        }
        self.store.with_entry(channel_id, |room| {
            room.room_type = room_type;
        });

        self.ephemeral(ev, &format!("✅ Room changed to `{new_name}`."))
            .await;
        Ok(())
    }

    /// `voicerooms` command: active rooms with owner and occupancy.
    pub async fn status(&self, ev: &MessageEvent) -> Result<()> {
        let rooms = self.store.snapshot();
        if rooms.is_empty() {
            let reply = OutboundMessage::text("No voice rooms are currently active.");
            self.chat.send_message(&ev.channel, reply).await?;
            return Ok(());
        }

        let mut builder = Embed::builder()
            .color(0x3498DB)
            .title("🔊 Active voice rooms")
            .description(format!("{} room(s) currently active.", rooms.len()));
        for (channel_id, room) in rooms {
            let channel = ChannelId::new(channel_id);
            let owner_name = self
                .chat
                .member_display_name(&room.owner_id)
                .await
                .unwrap_or_else(|_| room.owner_id.to_string());
            let member_count = self
                .chat
                .channel_members(&channel)
                .await
                .map(|m| m.len())
                .unwrap_or(0);
            builder = builder.field(
                format!("<#{channel}>"),
                format!("👑 Owner: {owner_name}\n👥 Members: {member_count}"),
                true,
            );
        }

        self.chat
            .send_message(&ev.channel, OutboundMessage::embed(builder.build()))
            .await?;
        Ok(())
    }

    /// Admin reset: delete every room a user owns.
    pub async fn reset_user(&self, ev: &MessageEvent, user_id: &str) -> Result<()> {
        if !ev.caller.is_admin {
            let reply =
                OutboundMessage::text("⚠️ Administrator permission is required to reset voice rooms.");
            self.chat.send_message(&ev.channel, reply).await?;
            return Ok(());
        }

        let target = UserId::new(user_id.to_string());
        let owned: Vec<ChannelId> = self
            .store
            .snapshot()
            .into_iter()
            .filter(|(_, room)| room.owner_id == target)
            .map(|(channel_id, _)| ChannelId::new(channel_id))
            .collect();

        if owned.is_empty() {
            let reply = OutboundMessage::text(format!("<@{target}> owns no active voice rooms."));
            self.chat.send_message(&ev.channel, reply).await?;
            return Ok(());
        }

        let mut deleted = 0usize;
        for channel in owned {
            if let Err(e) = self.chat.delete_channel(&channel).await {
                warn!(channel = %channel, error = %e, "failed to delete room during reset");
            }
            self.store.remove(channel.as_str());
            deleted += 1;
        }

        let reply = OutboundMessage::text(format!(
            "✅ Reset {deleted} voice room(s) owned by <@{target}>."
        ));
        self.chat.send_message(&ev.channel, reply).await?;
        info!(user = %target, deleted, "voice rooms reset by administrator");
        Ok(())
    }

    async fn ephemeral(&self, ev: &InteractionEvent, content: &str) {
        if let Err(e) = self
            .chat
            .send_message(&ev.channel, OutboundMessage::ephemeral(content))
            .await
        {
            warn!(error = %e, "failed to send ephemeral reply");
        }
    }
}
