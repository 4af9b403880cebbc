//! Capture → analyze → speak workflow.
//!
//! * [`WorkflowController`]: the state machine; one live run at a time.
//! * [`WorkflowSnapshot`]: what dashboards render, published as
//!   `vision_update`.
//! * [`TransportCommand`]: pause / resume / stop / seek during playback.

pub mod controller;
pub mod state;

pub use controller::{StartOutcome, WorkflowController};
pub use state::{
    Assets, AudioState, Step, TransportAck, TransportCommand, WorkflowSnapshot, WorkflowState,
    STANDBY_MESSAGE,
};

/// Module name the workflow is registered and published under.
pub const WORKFLOW_MODULE: &str = "vision";
