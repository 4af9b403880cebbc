//! Workflow state machine and observable snapshot.
//!
//! [`Step`] drives the controller's state machine.  [`WorkflowState`] is the
//! single source of truth for one controller; [`WorkflowSnapshot`] is the
//! serialisable view broadcast as `vision_update` and replayed to late
//! joiners.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

pub const STANDBY_MESSAGE: &str = "System Standby - Ready for Command";

// ---------------------------------------------------------------------------
// Step
// ---------------------------------------------------------------------------

/// Pipeline phase of the live workflow instance.
///
/// The state machine transitions are:
///
/// ```text
/// Idle ──start──▶ Capturing ──image──▶ Analyzing ──speech──▶ Playing ──done──▶ Idle
/// any step ──failure──▶ Idle (has_error)
/// any step ──cancel / reset──▶ Idle
/// ```
///
/// Wire names are the ones the dashboard renders (`camera`, `ai`, `audio`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Step {
    #[default]
    #[serde(rename = "idle")]
    Idle,
    #[serde(rename = "camera")]
    Capturing,
    #[serde(rename = "ai")]
    Analyzing,
    #[serde(rename = "audio")]
    Playing,
}

impl Step {
    /// `true` for the three cancellable pipeline phases.
    ///
    /// ```
    /// use vision_controller::workflow::Step;
    ///
    /// assert!(!Step::Idle.is_active());
    /// assert!(Step::Capturing.is_active());
    /// assert!(Step::Analyzing.is_active());
    /// assert!(Step::Playing.is_active());
    /// ```
    pub fn is_active(&self) -> bool {
        !matches!(self, Step::Idle)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Step::Idle => "Idle",
            Step::Capturing => "Capturing",
            Step::Analyzing => "Analyzing",
            Step::Playing => "Playing",
        }
    }
}

// ---------------------------------------------------------------------------
// AudioState
// ---------------------------------------------------------------------------

/// Playback axis, independent of [`Step`]; only meaningful while
/// `step == Playing`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioState {
    #[default]
    Idle,
    Playing,
    Paused,
}

// ---------------------------------------------------------------------------
// TransportCommand
// ---------------------------------------------------------------------------

/// Playback controls issued from the dashboard while speech is playing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportCommand {
    Pause,
    Resume,
    Stop,
    SeekForward,
    SeekBackward,
}

/// Acknowledgement returned for every transport command.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransportAck {
    pub command: TransportCommand,
    /// `false` when the command had nothing to act on.
    pub applied: bool,
    pub audio_state: AudioState,
}

// ---------------------------------------------------------------------------
// WorkflowSnapshot
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assets {
    /// Base64 JPEG of the last captured frame.
    pub image: Option<String>,
    /// Base64 audio of the last spoken report.
    pub audio: Option<String>,
}

/// Full observable state of the controller at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowSnapshot {
    #[serde(rename = "status")]
    pub status_message: String,
    pub step: Step,
    pub is_processing: bool,
    pub audio_state: AudioState,
    pub has_error: bool,
    #[serde(rename = "workflow_finished")]
    pub finished: bool,
    pub assets: Assets,
}

// ---------------------------------------------------------------------------
// WorkflowState
// ---------------------------------------------------------------------------

/// Mutable state owned by the controller.
///
/// `workflow_id` is `Some` exactly while an instance is live; every mutation
/// made after a suspension point checks it against the id the pipeline task
/// was started with.
#[derive(Debug)]
pub struct WorkflowState {
    pub workflow_id: Option<Uuid>,
    pub step: Step,
    pub is_processing: bool,
    pub has_error: bool,
    pub finished: bool,
    pub status_message: String,
    pub captured_image: Option<Bytes>,
    pub synthesized_audio: Option<Bytes>,
    pub audio_state: AudioState,
    /// Set by a transport `stop`; ends the playback wait early.
    pub stop_requested: bool,
    pub cancel: Option<CancellationToken>,
}

impl Default for WorkflowState {
    fn default() -> Self {
        Self {
            workflow_id: None,
            step: Step::Idle,
            is_processing: false,
            has_error: false,
            finished: false,
            status_message: STANDBY_MESSAGE.into(),
            captured_image: None,
            synthesized_audio: None,
            audio_state: AudioState::Idle,
            stop_requested: false,
            cancel: None,
        }
    }
}

impl WorkflowState {
    /// `true` while `id` is still the live instance.
    pub fn is_current(&self, id: Uuid) -> bool {
        self.workflow_id == Some(id)
    }

    /// Start a fresh instance; previous payloads are dropped.
    pub fn begin(&mut self, id: Uuid, cancel: CancellationToken) {
        *self = Self {
            workflow_id: Some(id),
            step: Step::Capturing,
            is_processing: true,
            status_message: "Capturing image...".into(),
            cancel: Some(cancel),
            ..Self::default()
        };
    }

    /// Terminal failure: the instance ends with `has_error` set.
    pub fn fail(&mut self, status: String) {
        self.end_instance();
        self.has_error = true;
        self.finished = false;
        self.status_message = status;
    }

    /// Terminal success.
    pub fn complete(&mut self) {
        self.end_instance();
        self.has_error = false;
        self.finished = true;
        self.status_message = "Analysis Completed Successfully".into();
    }

    /// Cancellation: back to Idle without error; returns the aborted id.
    pub fn abort(&mut self, clear_assets: bool) -> Option<Uuid> {
        let aborted = self.workflow_id;
        if let Some(token) = self.cancel.take() {
            token.cancel();
        }
        self.end_instance();
        self.has_error = false;
        self.finished = false;
        self.status_message = STANDBY_MESSAGE.into();
        if clear_assets {
            self.captured_image = None;
            self.synthesized_audio = None;
        }
        aborted
    }

    fn end_instance(&mut self) {
        self.workflow_id = None;
        self.cancel = None;
        self.is_processing = false;
        self.step = Step::Idle;
        self.audio_state = AudioState::Idle;
        self.stop_requested = false;
    }

    pub fn snapshot(&self) -> WorkflowSnapshot {
        WorkflowSnapshot {
            status_message: self.status_message.clone(),
            step: self.step,
            is_processing: self.is_processing,
            audio_state: self.audio_state,
            has_error: self.has_error,
            finished: self.finished,
            assets: Assets {
                image: self.captured_image.as_ref().map(|b| STANDARD.encode(b)),
                audio: self.synthesized_audio.as_ref().map(|b| STANDARD.encode(b)),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn default_state_is_idle_standby() {
        let state = WorkflowState::default();
        assert_eq!(state.step, Step::Idle);
        assert!(!state.is_processing);
        assert!(state.workflow_id.is_none());
        assert_eq!(state.status_message, STANDBY_MESSAGE);
    }

    #[test]
    fn begin_resets_previous_run() {
        let mut state = WorkflowState::default();
        state.has_error = true;
        state.captured_image = Some(Bytes::from_static(b"old"));

        let id = Uuid::new_v4();
        state.begin(id, CancellationToken::new());

        assert!(state.is_current(id));
        assert_eq!(state.step, Step::Capturing);
        assert!(state.is_processing);
        assert!(!state.has_error);
        assert!(state.captured_image.is_none());
    }

    #[test]
    fn fail_keeps_image_and_sets_error() {
        let mut state = WorkflowState::default();
        state.begin(Uuid::new_v4(), CancellationToken::new());
        state.captured_image = Some(Bytes::from_static(b"jpg"));

        state.fail("AI Error: API 500: overloaded".into());

        assert!(state.has_error);
        assert!(!state.is_processing);
        assert!(!state.finished);
        assert_eq!(state.step, Step::Idle);
        assert!(state.workflow_id.is_none());
        assert!(state.captured_image.is_some());
    }

    #[test]
    fn abort_cancels_token_and_reports_id() {
        let mut state = WorkflowState::default();
        let token = CancellationToken::new();
        let id = Uuid::new_v4();
        state.begin(id, token.clone());

        assert_eq!(state.abort(false), Some(id));
        assert!(token.is_cancelled());
        assert_eq!(state.abort(false), None);
        assert!(!state.has_error);
        assert_eq!(state.step, Step::Idle);
    }

    #[test]
    fn abort_with_clear_drops_assets() {
        let mut state = WorkflowState::default();
        state.captured_image = Some(Bytes::from_static(b"jpg"));
        state.synthesized_audio = Some(Bytes::from_static(b"mp3"));

        state.abort(true);

        assert!(state.captured_image.is_none());
        assert!(state.synthesized_audio.is_none());
    }

    #[test]
    fn snapshot_wire_format() {
        let mut state = WorkflowState::default();
        state.begin(Uuid::new_v4(), CancellationToken::new());
        state.step = Step::Analyzing;
        state.captured_image = Some(Bytes::from_static(b"hi"));

        let wire = serde_json::to_value(state.snapshot()).unwrap();

        assert_eq!(
            wire,
            json!({
                "status": "Capturing image...",
                "step": "ai",
                "is_processing": true,
                "audio_state": "idle",
                "has_error": false,
                "workflow_finished": false,
                "assets": { "image": "aGk=", "audio": null }
            })
        );
    }

    #[test]
    fn transport_command_names() {
        let cmd: TransportCommand = serde_json::from_value(json!("seek_forward")).unwrap();
        assert_eq!(cmd, TransportCommand::SeekForward);
    }

    #[test]
    fn label_values() {
        assert_eq!(Step::Idle.label(), "Idle");
        assert_eq!(Step::Playing.label(), "Playing");
        assert_eq!(Step::default(), Step::Idle);
    }
}
