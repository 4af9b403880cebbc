//! `vision` module: the workflow controller, its dashboard commands, and the
//! physical button.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use crate::config::ConfigStore;
use crate::trigger::{self, SysfsTrigger};
use crate::workflow::{TransportCommand, WorkflowController, WORKFLOW_MODULE};

use super::{CommandError, Module};

pub struct VisionModule {
    controller: Arc<WorkflowController>,
    config: Arc<ConfigStore>,
}

impl VisionModule {
    pub fn new(controller: Arc<WorkflowController>, config: Arc<ConfigStore>) -> Self {
        Self { controller, config }
    }

    pub fn controller(&self) -> &Arc<WorkflowController> {
        &self.controller
    }

    fn transport(&self, command: TransportCommand) -> Result<Value, CommandError> {
        let ack = self.controller.handle_transport_command(command);
        serde_json::to_value(ack).map_err(|e| CommandError::Failed(e.to_string()))
    }
}

fn transport_command(name: &str) -> Option<TransportCommand> {
    Some(match name {
        "audio_pause" => TransportCommand::Pause,
        "audio_resume" => TransportCommand::Resume,
        "audio_stop" => TransportCommand::Stop,
        "audio_forward" => TransportCommand::SeekForward,
        "audio_backward" => TransportCommand::SeekBackward,
        _ => return None,
    })
}

#[async_trait]
impl Module for VisionModule {
    fn name(&self) -> &'static str {
        WORKFLOW_MODULE
    }

    /// Watch the physical button until shutdown.
    async fn start(&self, shutdown: CancellationToken) {
        let config = self.config.snapshot().trigger;
        if !config.enabled {
            log::info!("vision: physical trigger disabled in settings");
            return;
        }

        let button = match SysfsTrigger::open(config.gpio_pin, config.active_low) {
            Ok(button) => button,
            Err(e) => {
                log::warn!(
                    "vision: gpio{} unavailable ({e}); physical trigger disabled",
                    config.gpio_pin
                );
                return;
            }
        };

        let controller = Arc::clone(&self.controller);
        trigger::watch(&button, &config, shutdown, || {
            let outcome = controller.start_workflow();
            log::info!("vision: button press → {}", outcome.as_str());
        })
        .await;
    }

    async fn stop(&self) {
        self.controller.cancel();
    }

    fn state(&self) -> Option<Value> {
        serde_json::to_value(self.controller.snapshot()).ok()
    }

    async fn execute_command(
        &self,
        command: &str,
        _data: Option<Value>,
    ) -> Result<Value, CommandError> {
        log::debug!("vision: command {command}");
        match command {
            "trigger_vision" => {
                let outcome = self.controller.start_workflow();
                Ok(json!({ "status": outcome.as_str() }))
            }
            "cancel_vision" => {
                self.controller.cancel();
                Ok(json!({ "status": "cancelled" }))
            }
            "reset_vision" => {
                self.controller.reset();
                Ok(json!({ "status": "reset" }))
            }
            other => match transport_command(other) {
                Some(cmd) => self.transport(cmd),
                None => Err(CommandError::UnknownCommand(other.to_owned())),
            },
        }
    }
}
