//! Controller modules and command routing.
//!
//! Every subsystem the dashboard talks to is a [`Module`]: it has a stable
//! name, a long-running `start`, an optional full-state snapshot replayed to
//! late joiners, and an optional command handler.  The [`ModuleRegistry`] is
//! built once in `main`:
//!
//! ```text
//! ModuleRegistry
//!   ├─ "config"  ConfigModule   get / update
//!   ├─ "system"  SystemModule   periodic telemetry
//!   └─ "vision"  VisionModule   workflow + transport + physical trigger
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

pub mod config_module;
pub mod registry;
pub mod system;
pub mod vision;

pub use config_module::ConfigModule;
pub use registry::ModuleRegistry;
pub use system::SystemModule;
pub use vision::VisionModule;

// ---------------------------------------------------------------------------
// CommandError
// ---------------------------------------------------------------------------

/// Reasons a routed command produced no result.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Unknown module: {0}")]
    UnknownModule(String),

    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("{0}")]
    Failed(String),
}

impl CommandError {
    /// The `{"error": "..."}` body returned to the caller.
    pub fn to_json(&self) -> Value {
        json!({ "error": self.to_string() })
    }
}

// ---------------------------------------------------------------------------
// CommandRequest
// ---------------------------------------------------------------------------

/// A dashboard command addressed to one module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandRequest {
    pub module: String,
    pub command: String,
    #[serde(default)]
    pub data: Option<Value>,
}

// ---------------------------------------------------------------------------
// Module trait
// ---------------------------------------------------------------------------

/// A named, independently started unit of the controller.
///
/// Implementors must be `Send + Sync`; the registry shares them as
/// `Arc<dyn Module>` between the runtime task running `start` and the
/// transport layer calling `execute_command`.
#[async_trait]
pub trait Module: Send + Sync {
    /// Stable name used for routing and for `<name>_update` messages.
    fn name(&self) -> &'static str;

    /// Run until `shutdown` is cancelled.  May return early when the module
    /// has no background work.
    async fn start(&self, shutdown: CancellationToken);

    async fn stop(&self) {}

    /// Full state replayed to a newly joined connection.
    fn state(&self) -> Option<Value> {
        None
    }

    async fn execute_command(
        &self,
        command: &str,
        _data: Option<Value>,
    ) -> Result<Value, CommandError> {
        Err(CommandError::UnknownCommand(command.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_request_data_is_optional() {
        let req: CommandRequest =
            serde_json::from_str(r#"{"module":"vision","command":"trigger_vision"}"#).unwrap();
        assert_eq!(req.module, "vision");
        assert!(req.data.is_none());
    }

    #[test]
    fn command_errors_render_as_error_objects() {
        assert_eq!(
            CommandError::UnknownModule("camera".into()).to_json(),
            json!({ "error": "Unknown module: camera" })
        );
        assert_eq!(
            CommandError::UnknownCommand("explode".into()).to_json(),
            json!({ "error": "Unknown command: explode" })
        );
    }
}
