//! Remote side of the workflow: camera snapshot and image analysis.
//!
//! * [`AnalysisService`]: async trait the workflow controller calls.
//! * [`HttpAnalysisClient`]: `reqwest` implementation.
//! * [`RemoteError`]: failure variants; all of them are recovered by the
//!   controller into `has_error` + a notification.

pub mod client;

pub use client::{error_message_from_body, AnalysisService, HttpAnalysisClient, RemoteError};

// test-only re-export so the workflow and module tests can script the remote
// side without a server.
#[cfg(test)]
pub mod mock;
#[cfg(test)]
pub use mock::{Behaviour, MockAnalysisService};
