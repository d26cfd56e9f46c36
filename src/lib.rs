//! Guildhall: a chat-platform bot built around an in-memory workflow
//! core. Three features ride the same plumbing: self-provisioned voice
//! rooms, named single-choice votes, and a donation ledger with manual
//! review.

pub mod bot;
pub mod config;
pub mod gateway;
pub mod influence;
pub mod router;
pub mod scheduler;
pub mod shutdown;
pub mod store;
pub mod telemetry;
pub mod voice;
pub mod votes;

pub use bot::Bot;
pub use config::{config, init_config, GuildhallConfig};
pub use gateway::{ChatOps, GatewayError, GatewayEvent, RestChat};
pub use scheduler::{next_boundary, ResetWindow, TimerQueue, TimerTask, Timers};
pub use shutdown::ShutdownCoordinator;
pub use store::EntityStore;
pub use telemetry::{generate_correlation_id, init_telemetry, shutdown_telemetry};
