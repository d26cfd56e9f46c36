//! Donation ledger: per-user influence totals across four windows, a
//! pending-donation handshake, and a manual review queue.

pub mod ledger;
pub mod render;
pub mod workflow;

pub use ledger::{InfluenceLedger, LedgerTotals};
pub use workflow::{InfluenceWorkflow, PendingDonation, ReviewEntry};
