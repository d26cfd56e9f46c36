//! Owner control-panel payload, sent by DM on room creation and on
//! ownership transfer.

use crate::gateway::{
    ActionRow, ButtonStyle, ChannelId, Component, Embed, OutboundMessage, SelectOption,
};

use super::workflow::RoomType;

pub fn control_panel(channel: &ChannelId) -> OutboundMessage {
    let embed = Embed::builder()
        .color(0x3498DB)
        .title("🔊 Voice room control panel")
        .description("Manage your voice room with the controls below.")
        .field("🔔 Check permissions", "Shows who is in your room and who owns it.", false)
        .field("🔕 Transfer ownership", "Hands room control to another member.", false)
        .field("✏️ Rename", "Changes the room's name.", false)
        .field("👥 Room type", "Re-themes the room with a type emoji and label.", false)
        .field("❗ Note", "The room can be renamed at most 2 times.", false)
        .build();

    let type_row = ActionRow::new(vec![Component::select_menu(
        format!("voiceroom_type_{channel}"),
        "Choose a room type",
        RoomType::SELECTABLE
            .iter()
            .map(|t| {
                SelectOption::new(t.label(), t.value())
                    .describe(t.description())
                    .emoji(t.emoji())
            })
            .collect(),
    )]);

    let button_row = ActionRow::new(vec![
        Component::button(
            format!("voiceroom_check_{channel}"),
            "Check permissions",
            ButtonStyle::Primary,
            Some("🔔"),
        ),
        Component::button(
            format!("voiceroom_transfer_{channel}"),
            "Transfer ownership",
            ButtonStyle::Success,
            Some("🔕"),
        ),
        Component::button(
            format!("voiceroom_rename_{channel}"),
            "Rename",
            ButtonStyle::Secondary,
            Some("✏️"),
        ),
    ]);

    OutboundMessage::embed(embed).with_components(vec![type_row, button_row])
}
