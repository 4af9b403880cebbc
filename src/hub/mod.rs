//! Live-state synchronisation hub.
//!
//! * [`StateHub`]: the set of dashboard connections; publishes messages and
//!   replays snapshots + history to late joiners.
//! * [`NotificationLog`]: bounded history of recent notifications.
//! * [`HubMessage`] / [`NotificationEntry`]: the wire shapes.
//!
//! ```text
//! WorkflowController ─┐
//! SystemModule ───────┼─▶ StateHub::publish / notify ─▶ every connection
//! ConfigModule ───────┘          │
//!                                └─▶ NotificationLog (replayed on join)
//! ```

pub mod history;
pub mod message;
pub mod state_hub;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use history::NotificationLog;
pub use message::{HubMessage, NotificationEntry, NotificationLevel};
pub use state_hub::{ConnectionId, ConnectionSender, SnapshotSource, StateHub};
