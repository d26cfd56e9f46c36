pub mod client;
pub mod errors;
pub mod events;
pub mod mock;
pub mod types;

pub use client::{ChatOps, RestChat};
pub use errors::GatewayError;
pub use events::{GatewayEvent, InteractionEvent, MessageEvent, VoiceStateEvent};
pub use types::{
    ActionRow, ButtonStyle, Caller, ChannelId, Component, Embed, EmbedField, Member, MessageId,
    OutboundMessage, RoleId, SelectOption, UserId,
};
