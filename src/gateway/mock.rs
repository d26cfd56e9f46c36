//! Recording transport for tests - no side effects.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::errors::GatewayError;
use super::types::{ChannelId, Member, MessageId, OutboundMessage, RoleId, UserId};
use super::ChatOps;

#[derive(Debug, Clone)]
pub struct SentMessage {
    pub channel: ChannelId,
    pub message_id: MessageId,
    pub payload: OutboundMessage,
}

#[derive(Debug, Clone)]
pub struct EditedMessage {
    pub channel: ChannelId,
    pub message_id: MessageId,
    pub payload: OutboundMessage,
}

/// `ChatOps` double that records every outbound call and answers member
/// queries from scripted state.
#[derive(Default)]
pub struct RecordingChat {
    next_id: Mutex<u64>,
    pub sent: Mutex<Vec<SentMessage>>,
    pub edits: Mutex<Vec<EditedMessage>>,
    pub deleted_messages: Mutex<Vec<(ChannelId, MessageId)>>,
    pub direct_messages: Mutex<Vec<(UserId, OutboundMessage)>>,
    pub created_channels: Mutex<Vec<(ChannelId, String, UserId)>>,
    pub deleted_channels: Mutex<Vec<ChannelId>>,
    pub renamed_channels: Mutex<Vec<(ChannelId, String)>>,
    pub owner_grants: Mutex<Vec<(ChannelId, UserId)>>,
    pub owner_revocations: Mutex<Vec<(ChannelId, UserId)>>,
    pub moved_members: Mutex<Vec<(UserId, ChannelId)>>,
    display_names: Mutex<HashMap<UserId, String>>,
    members_by_channel: Mutex<HashMap<ChannelId, Vec<Member>>>,
    members_by_role: Mutex<HashMap<RoleId, Vec<Member>>>,
    /// When set, send/edit calls fail with a 500, for exercising the
    /// caught-and-logged transport-failure paths.
    pub fail_sends: Mutex<bool>,
}

impl RecordingChat {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_display_name(&self, user: impl Into<UserId>, name: &str) {
        self.display_names
            .lock()
            .unwrap()
            .insert(user.into(), name.to_string());
    }

    pub fn set_channel_members(&self, channel: impl Into<ChannelId>, members: Vec<Member>) {
        self.members_by_channel
            .lock()
            .unwrap()
            .insert(channel.into(), members);
    }

    pub fn set_role_members(&self, role: impl Into<RoleId>, members: Vec<Member>) {
        self.members_by_role
            .lock()
            .unwrap()
            .insert(role.into(), members);
    }

    pub fn set_fail_sends(&self, fail: bool) {
        *self.fail_sends.lock().unwrap() = fail;
    }

    pub fn sent_messages(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn last_sent(&self) -> Option<SentMessage> {
        self.sent.lock().unwrap().last().cloned()
    }

    pub fn last_sent_in(&self, channel: &ChannelId) -> Option<SentMessage> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|m| &m.channel == channel)
            .cloned()
    }

    pub fn last_edit(&self) -> Option<EditedMessage> {
        self.edits.lock().unwrap().last().cloned()
    }

    pub fn last_dm(&self) -> Option<(UserId, OutboundMessage)> {
        self.direct_messages.lock().unwrap().last().cloned()
    }

    pub fn deleted_channel_ids(&self) -> Vec<ChannelId> {
        self.deleted_channels.lock().unwrap().clone()
    }

    fn allocate_id(&self, prefix: &str) -> String {
        let mut next = self.next_id.lock().unwrap();
        *next += 1;
        format!("{prefix}-{}", *next)
    }

    fn check_send_failure(&self, operation: &str) -> Result<(), GatewayError> {
        if *self.fail_sends.lock().unwrap() {
            return Err(GatewayError::Api {
                operation: operation.to_string(),
                status: 500,
                message: "scripted failure".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ChatOps for RecordingChat {
    async fn send_message(
        &self,
        channel: &ChannelId,
        message: OutboundMessage,
    ) -> Result<MessageId, GatewayError> {
        self.check_send_failure("send_message")?;
        let message_id = MessageId::new(self.allocate_id("msg"));
        self.sent.lock().unwrap().push(SentMessage {
            channel: channel.clone(),
            message_id: message_id.clone(),
            payload: message,
        });
        Ok(message_id)
    }

    async fn edit_message(
        &self,
        channel: &ChannelId,
        message: &MessageId,
        payload: OutboundMessage,
    ) -> Result<(), GatewayError> {
        self.check_send_failure("edit_message")?;
        self.edits.lock().unwrap().push(EditedMessage {
            channel: channel.clone(),
            message_id: message.clone(),
            payload,
        });
        Ok(())
    }

    async fn delete_message(
        &self,
        channel: &ChannelId,
        message: &MessageId,
    ) -> Result<(), GatewayError> {
        self.deleted_messages
            .lock()
            .unwrap()
            .push((channel.clone(), message.clone()));
        Ok(())
    }

    async fn send_direct_message(
        &self,
        user: &UserId,
        message: OutboundMessage,
    ) -> Result<(), GatewayError> {
        self.direct_messages
            .lock()
            .unwrap()
            .push((user.clone(), message));
        Ok(())
    }

    async fn create_voice_channel(
        &self,
        name: &str,
        _category: &ChannelId,
        owner: &UserId,
    ) -> Result<ChannelId, GatewayError> {
        let channel = ChannelId::new(self.allocate_id("vc"));
        self.created_channels
            .lock()
            .unwrap()
            .push((channel.clone(), name.to_string(), owner.clone()));
        Ok(channel)
    }

    async fn delete_channel(&self, channel: &ChannelId) -> Result<(), GatewayError> {
        self.deleted_channels.lock().unwrap().push(channel.clone());
        Ok(())
    }

    async fn set_channel_name(&self, channel: &ChannelId, name: &str) -> Result<(), GatewayError> {
        self.renamed_channels
            .lock()
            .unwrap()
            .push((channel.clone(), name.to_string()));
        Ok(())
    }

    async fn grant_room_owner(
        &self,
        channel: &ChannelId,
        user: &UserId,
    ) -> Result<(), GatewayError> {
        self.owner_grants
            .lock()
            .unwrap()
            .push((channel.clone(), user.clone()));
        Ok(())
    }

    async fn revoke_room_owner(
        &self,
        channel: &ChannelId,
        user: &UserId,
    ) -> Result<(), GatewayError> {
        self.owner_revocations
            .lock()
            .unwrap()
            .push((channel.clone(), user.clone()));
        Ok(())
    }

    async fn move_member(&self, user: &UserId, channel: &ChannelId) -> Result<(), GatewayError> {
        self.moved_members
            .lock()
            .unwrap()
            .push((user.clone(), channel.clone()));
        Ok(())
    }

    async fn member_display_name(&self, user: &UserId) -> Result<String, GatewayError> {
        Ok(self
            .display_names
            .lock()
            .unwrap()
            .get(user)
            .cloned()
            .unwrap_or_else(|| format!("user-{user}")))
    }

    async fn channel_members(&self, channel: &ChannelId) -> Result<Vec<Member>, GatewayError> {
        Ok(self
            .members_by_channel
            .lock()
            .unwrap()
            .get(channel)
            .cloned()
            .unwrap_or_default())
    }

    async fn role_members(&self, role: &RoleId) -> Result<Vec<Member>, GatewayError> {
        Ok(self
            .members_by_role
            .lock()
            .unwrap()
            .get(role)
            .cloned()
            .unwrap_or_default())
    }
}
