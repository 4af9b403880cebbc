//! Live-state push messages and notification entries.
//!
//! Every message delivered to a dashboard connection has the shape
//! `{"type": <kind>, "data": <payload>}`:
//!
//! | `type`            | `data`                                  |
//! |-------------------|-----------------------------------------|
//! | `<module>_update` | the module's full snapshot              |
//! | `notification`    | `{message, level, time}`                |
//! | `telemetry`       | the sampled system payload              |
//! | `command_result`  | `{module, command, result}` (sender only) |

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl NotificationLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationLevel::Info => "info",
            NotificationLevel::Success => "success",
            NotificationLevel::Warning => "warning",
            NotificationLevel::Error => "error",
        }
    }
}

/// One human-readable event kept in the notification history.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationEntry {
    pub message: String,
    pub level: NotificationLevel,
    pub timestamp: DateTime<Local>,
}

impl NotificationEntry {
    pub fn now(message: impl Into<String>, level: NotificationLevel) -> Self {
        Self {
            message: message.into(),
            level,
            timestamp: Local::now(),
        }
    }

    /// Wire form; `time` is the local wall-clock time shown in the dashboard.
    pub fn to_message(&self) -> HubMessage {
        HubMessage::new(
            "notification",
            json!({
                "message": self.message,
                "level": self.level,
                "time": self.timestamp.format("%H:%M:%S").to_string(),
            }),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HubMessage {
    #[serde(rename = "type")]
    pub kind: String,
    pub data: Value,
}

impl HubMessage {
    pub fn new(kind: impl Into<String>, data: Value) -> Self {
        Self {
            kind: kind.into(),
            data,
        }
    }

    /// Full-state snapshot of the module registered as `module`.
    pub fn module_update(module: &str, data: Value) -> Self {
        Self::new(format!("{module}_update"), data)
    }

    pub fn telemetry(data: Value) -> Self {
        Self::new("telemetry", data)
    }

    pub fn command_result(module: &str, command: &str, result: Value) -> Self {
        Self::new(
            "command_result",
            json!({ "module": module, "command": command, "result": result }),
        )
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn module_update_type_name() {
        let msg = HubMessage::module_update("vision", json!({ "step": "idle" }));
        let wire: Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();

        assert_eq!(wire["type"], "vision_update");
        assert_eq!(wire["data"]["step"], "idle");
    }

    #[test]
    fn notification_wire_shape() {
        let entry = NotificationEntry::now("Scene captured", NotificationLevel::Success);
        let msg = entry.to_message();

        assert_eq!(msg.kind, "notification");
        assert_eq!(msg.data["message"], "Scene captured");
        assert_eq!(msg.data["level"], "success");
        let time = msg.data["time"].as_str().expect("time string");
        assert_eq!(time.len(), "12:34:56".len());
    }

    #[test]
    fn level_strings_match_serde() {
        for level in [
            NotificationLevel::Info,
            NotificationLevel::Success,
            NotificationLevel::Warning,
            NotificationLevel::Error,
        ] {
            assert_eq!(serde_json::to_value(level).unwrap(), level.as_str());
        }
    }
}
