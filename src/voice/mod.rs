//! Self-provisioned voice rooms: lobby-triggered creation, owner
//! controls, and emptiness-driven cleanup.

pub mod panel;
pub mod workflow;

pub use workflow::{RoomType, VoiceRoom, VoiceWorkflow};
