//! Device controller for a capture → analyze → speak workflow with live
//! dashboard synchronisation.
//!
//! ```text
//! button / dashboard ─▶ modules ─▶ workflow ─┬─▶ remote (camera, analysis)
//!                                           ├─▶ audio (speech playback)
//!                                           └─▶ hub ─▶ every dashboard
//! ```

pub mod audio;
pub mod config;
pub mod hub;
pub mod modules;
pub mod remote;
pub mod server;
pub mod trigger;
pub mod workflow;
