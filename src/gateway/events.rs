//! Tagged inbound event variants.
//!
//! The connection layer translates the platform's native payloads into
//! these shapes exactly once; nothing past this boundary duck-types.

use super::types::{Caller, ChannelId, MessageId, UserId};

#[derive(Debug, Clone)]
pub enum GatewayEvent {
    Message(MessageEvent),
    Interaction(InteractionEvent),
    VoiceState(VoiceStateEvent),
}

/// A message posted in a channel. `attachment_count` is all the donation
/// workflow needs from attachments; URLs stay on the platform side.
#[derive(Debug, Clone)]
pub struct MessageEvent {
    pub message_id: MessageId,
    pub channel: ChannelId,
    pub author: UserId,
    pub author_is_bot: bool,
    pub caller: Caller,
    pub content: String,
    pub attachment_count: usize,
    /// URL of the first image attachment, when present. Carried so the
    /// review payload can show the submitted proof.
    pub first_attachment_url: Option<String>,
}

/// A component interaction (button press, select-menu choice, or modal
/// submit). The connection layer folds modal text inputs into `values`,
/// so a rename submit arrives as `values = [new_name]`.
#[derive(Debug, Clone)]
pub struct InteractionEvent {
    pub custom_id: String,
    pub user: UserId,
    pub caller: Caller,
    pub channel: ChannelId,
    /// The message the component lives on, if any.
    pub message: Option<MessageId>,
    /// Description text of that message's first embed. Only the legacy
    /// review-recovery path reads this.
    pub message_description: Option<String>,
    pub values: Vec<String>,
}

/// A member moved between voice channels (either side may be absent).
#[derive(Debug, Clone)]
pub struct VoiceStateEvent {
    pub user: UserId,
    pub old_channel: Option<ChannelId>,
    pub new_channel: Option<ChannelId>,
}

impl GatewayEvent {
    /// Channel to address an apology reply to when a handler blows up.
    pub fn reply_channel(&self) -> Option<&ChannelId> {
        match self {
            GatewayEvent::Message(ev) => Some(&ev.channel),
            GatewayEvent::Interaction(ev) => Some(&ev.channel),
            GatewayEvent::VoiceState(_) => None,
        }
    }

    pub fn reply_user(&self) -> Option<&UserId> {
        match self {
            GatewayEvent::Message(ev) => Some(&ev.author),
            GatewayEvent::Interaction(ev) => Some(&ev.user),
            GatewayEvent::VoiceState(_) => None,
        }
    }
}
