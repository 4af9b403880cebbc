//! Workflow orchestrator: drives one capture → analyze → speak run at a time.
//!
//! [`WorkflowController`] owns the [`WorkflowState`] and publishes every
//! transition to the [`StateHub`] as a `vision_update` message.
//!
//! # Pipeline flow
//!
//! ```text
//! start_workflow()
//!   └─▶ new id + CancellationToken, step = Capturing, spawn pipeline
//!         └─▶ remote.capture()          (races the token)   [Capturing]
//!               └─▶ remote.analyze(id)  (races the token)   [Analyzing]
//!                     └─▶ player.play + poll is_busy        [Playing]
//!                           └─▶ finished = true             [Idle]
//!
//! cancel() / reset()
//!   └─▶ cancel token, stop audio, step = Idle, spawn remote cancel notice
//! ```
//!
//! # Locking
//!
//! `publish_seq` is taken first and held across the state mutation and the
//! hub publish, so observers see transitions in the order they happened.
//! The state lock is always released before calling into the hub, because
//! `StateHub::join` reads snapshots while holding the hub lock.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::audio::AudioOutput;
use crate::config::ConfigStore;
use crate::hub::{HubMessage, NotificationLevel, StateHub};
use crate::remote::AnalysisService;

use super::state::{
    AudioState, Step, TransportAck, TransportCommand, WorkflowSnapshot, WorkflowState,
};
use super::WORKFLOW_MODULE;

/// Result of [`WorkflowController::start_workflow`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Triggered,
    AlreadyRunning,
    NotConfigured,
}

impl StartOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            StartOutcome::Triggered => "triggered",
            StartOutcome::AlreadyRunning => "already_running",
            StartOutcome::NotConfigured => "not_configured",
        }
    }
}

pub struct WorkflowController {
    state: Mutex<WorkflowState>,
    publish_seq: Mutex<()>,
    remote: Arc<dyn AnalysisService>,
    player: Arc<dyn AudioOutput>,
    hub: Arc<StateHub>,
    config: Arc<ConfigStore>,
}

impl WorkflowController {
    pub fn new(
        remote: Arc<dyn AnalysisService>,
        player: Arc<dyn AudioOutput>,
        hub: Arc<StateHub>,
        config: Arc<ConfigStore>,
    ) -> Self {
        Self {
            state: Mutex::new(WorkflowState::default()),
            publish_seq: Mutex::new(()),
            remote,
            player,
            hub,
            config,
        }
    }

    // -----------------------------------------------------------------------
    // Public contract
    // -----------------------------------------------------------------------

    /// Begin a new run unless one is live or the remote side is unconfigured.
    ///
    /// Returns as soon as the pipeline task is spawned.  Must be called from
    /// within a tokio runtime.
    pub fn start_workflow(self: &Arc<Self>) -> StartOutcome {
        if self.is_running() {
            log::debug!("workflow: start ignored, a run is already live");
            return StartOutcome::AlreadyRunning;
        }

        if !self.config.remote().is_configured() {
            self.hub.notify(
                "Operation Aborted: Please configure Base URL and API Key in settings.",
                NotificationLevel::Warning,
            );
            return StartOutcome::NotConfigured;
        }

        let id = Uuid::new_v4();
        let token = CancellationToken::new();
        {
            let _seq = self.publish_seq.lock();
            let snapshot = {
                let mut st = self.state.lock();
                if st.workflow_id.is_some() {
                    return StartOutcome::AlreadyRunning;
                }
                st.begin(id, token.clone());
                st.snapshot()
            };
            self.publish(&snapshot);
            self.hub.notify("Vision process initiated", NotificationLevel::Info);
        }

        log::info!("workflow {id}: started");
        tokio::spawn(Arc::clone(self).run_pipeline(id, token));
        StartOutcome::Triggered
    }

    /// Abandon the live run, if any, and return to Idle.  Captured assets
    /// stay on display.
    pub fn cancel(&self) {
        if let Some(id) = self.abort(false) {
            log::info!("workflow {id}: cancelled");
        }
    }

    /// [`cancel`](Self::cancel), then clear the captured assets.
    pub fn reset(&self) {
        let aborted = self.abort(true);
        log::info!("workflow: reset (aborted run: {aborted:?})");
        self.hub.notify(
            "System Reset: Engine and assets cleared",
            NotificationLevel::Info,
        );
    }

    /// Apply a playback control.  Outside playback the command is
    /// acknowledged with `applied == false`.
    pub fn handle_transport_command(&self, command: TransportCommand) -> TransportAck {
        let seek_step = self.config.snapshot().playback.seek_step_secs;

        let _seq = self.publish_seq.lock();
        let (applied, audio_state, changed) = {
            let mut st = self.state.lock();
            let playing = st.workflow_id.is_some() && st.step == Step::Playing;

            let applied = playing
                && match command {
                    TransportCommand::Pause if st.audio_state == AudioState::Playing => {
                        self.player.pause();
                        st.audio_state = AudioState::Paused;
                        st.status_message = "Speaking Paused".into();
                        true
                    }
                    TransportCommand::Resume if st.audio_state == AudioState::Paused => {
                        self.player.resume();
                        st.audio_state = AudioState::Playing;
                        st.status_message = "Speaking...".into();
                        true
                    }
                    TransportCommand::Pause | TransportCommand::Resume => false,
                    TransportCommand::Stop => {
                        self.player.stop();
                        st.stop_requested = true;
                        st.audio_state = AudioState::Idle;
                        st.status_message = "Audio Stopped".into();
                        true
                    }
                    TransportCommand::SeekForward | TransportCommand::SeekBackward => {
                        let offset = if command == TransportCommand::SeekForward {
                            seek_step
                        } else {
                            -seek_step
                        };
                        match self.player.seek(offset) {
                            Ok(()) => true,
                            Err(e) => {
                                log::warn!("workflow: {e}");
                                false
                            }
                        }
                    }
                };

            let seek = matches!(
                command,
                TransportCommand::SeekForward | TransportCommand::SeekBackward
            );
            let changed = (applied && !seek).then(|| st.snapshot());
            (applied, st.audio_state, changed)
        };

        log::debug!("workflow: transport {command:?} applied={applied}");
        if let Some(snapshot) = changed {
            self.publish(&snapshot);
        }
        if applied && command == TransportCommand::Stop {
            self.hub
                .notify("Audio Playback: Aborted by user", NotificationLevel::Warning);
        }

        TransportAck {
            command,
            applied,
            audio_state,
        }
    }

    pub fn snapshot(&self) -> WorkflowSnapshot {
        self.state.lock().snapshot()
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().workflow_id.is_some()
    }

    // -----------------------------------------------------------------------
    // Pipeline
    // -----------------------------------------------------------------------

    async fn run_pipeline(self: Arc<Self>, id: Uuid, token: CancellationToken) {
        // ── 1. Capture ───────────────────────────────────────────────────
        let captured = tokio::select! {
            biased;
            _ = token.cancelled() => return,
            result = self.remote.capture() => result,
        };
        let image = match captured {
            Ok(image) => image,
            Err(e) => {
                log::warn!("workflow {id}: capture failed: {e}");
                self.fail(
                    id,
                    "Camera Error: Failed to capture image".into(),
                    "Camera error: Failed to capture".into(),
                );
                return;
            }
        };
        log::debug!("workflow {id}: captured {} bytes", image.len());

        let advanced = self.transition(
            id,
            Some(("Scene captured: Processing frame for AI analysis", NotificationLevel::Info)),
            |st| {
                st.captured_image = Some(image.clone());
                st.step = Step::Analyzing;
                st.status_message = "Analyzing via AI...".into();
            },
        );
        if !advanced {
            return;
        }

        // ── 2. Analyze ───────────────────────────────────────────────────
        let analyzed = tokio::select! {
            biased;
            _ = token.cancelled() => return,
            result = self.remote.analyze(image, id) => result,
        };
        let audio = match analyzed {
            Ok(audio) => audio,
            Err(e) => {
                log::warn!("workflow {id}: analysis failed: {e}");
                self.fail(
                    id,
                    format!("AI Error: {e}"),
                    format!("AI analysis failed: {e}"),
                );
                return;
            }
        };
        log::debug!("workflow {id}: received {} bytes of speech", audio.len());

        let advanced = self.transition(
            id,
            Some((
                "AI Analysis: Insights successfully received from engine",
                NotificationLevel::Success,
            )),
            |st| {
                st.synthesized_audio = Some(audio.clone());
                st.status_message = "AI analysis received".into();
            },
        );
        if !advanced {
            return;
        }

        // ── 3. Play ──────────────────────────────────────────────────────
        let started = {
            let _seq = self.publish_seq.lock();
            let started = {
                let mut st = self.state.lock();
                if !st.is_current(id) {
                    return;
                }
                // Under the state lock so a concurrent cancel() stops what we start.
                self.player.play(audio).map(|()| {
                    st.step = Step::Playing;
                    st.audio_state = AudioState::Playing;
                    st.status_message = "Speaking...".into();
                    st.snapshot()
                })
            };
            started.map(|snapshot| {
                self.publish(&snapshot);
                self.hub.notify(
                    "Audio Response: AI is speaking the report",
                    NotificationLevel::Info,
                );
            })
        };
        if let Err(e) = started {
            log::warn!("workflow {id}: playback failed: {e}");
            self.fail(
                id,
                format!("Audio Error: {e}"),
                format!("Audio playback failed: {e}"),
            );
            return;
        }

        if !self.wait_for_playback(id, &token).await {
            return;
        }

        // ── 4. Complete ──────────────────────────────────────────────────
        if self.transition(
            id,
            Some((
                "Operation Finished: Full cycle completed successfully",
                NotificationLevel::Success,
            )),
            WorkflowState::complete,
        ) {
            log::info!("workflow {id}: completed");
        }
    }

    /// Block until playback ends naturally or is stopped.  `false` when the
    /// run was cancelled or superseded meanwhile.
    async fn wait_for_playback(&self, id: Uuid, token: &CancellationToken) -> bool {
        let mut ticker = tokio::time::interval(self.config.snapshot().playback.poll_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => return false,
                _ = ticker.tick() => {}
            }

            let done = {
                let st = self.state.lock();
                if !st.is_current(id) {
                    Some(false)
                } else if st.stop_requested {
                    Some(true)
                } else if st.audio_state == AudioState::Paused || self.player.is_busy() {
                    None
                } else {
                    Some(true)
                }
            };
            if let Some(done) = done {
                return done;
            }
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    /// Apply `change` if `id` is still the live run, publish the new
    /// snapshot, then the optional notice.  `false` when superseded.
    fn transition(
        &self,
        id: Uuid,
        notice: Option<(&str, NotificationLevel)>,
        change: impl FnOnce(&mut WorkflowState),
    ) -> bool {
        let _seq = self.publish_seq.lock();
        let snapshot = {
            let mut st = self.state.lock();
            if !st.is_current(id) {
                log::debug!("workflow {id}: superseded, discarding result");
                return false;
            }
            change(&mut *st);
            log::debug!("workflow {id}: → {}", st.step.label());
            st.snapshot()
        };
        self.publish(&snapshot);
        if let Some((message, level)) = notice {
            self.hub.notify(message, level);
        }
        true
    }

    fn fail(&self, id: Uuid, status: String, notice: String) {
        self.transition(id, Some((notice.as_str(), NotificationLevel::Warning)), |st| {
            st.fail(status)
        });
    }

    fn abort(&self, clear_assets: bool) -> Option<Uuid> {
        let _seq = self.publish_seq.lock();
        let (aborted, snapshot) = {
            let mut st = self.state.lock();
            let aborted = st.abort(clear_assets);
            (aborted, st.snapshot())
        };

        self.player.stop();
        if let Some(id) = aborted {
            self.send_remote_cancel(id);
        }
        self.publish(&snapshot);
        aborted
    }

    /// Fire-and-forget "abandon run `id`" notice to the analysis service.
    fn send_remote_cancel(&self, id: Uuid) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            log::warn!("workflow {id}: no runtime, remote cancel not sent");
            return;
        };
        let remote = Arc::clone(&self.remote);
        runtime.spawn(async move {
            match remote.cancel_remote(id).await {
                Ok(()) => log::debug!("workflow {id}: remote cancel acknowledged"),
                Err(e) => log::warn!("workflow {id}: remote cancel failed: {e}"),
            }
        });
    }

    fn publish(&self, snapshot: &WorkflowSnapshot) {
        match serde_json::to_value(snapshot) {
            Ok(data) => self
                .hub
                .publish(&HubMessage::module_update(WORKFLOW_MODULE, data)),
            Err(e) => log::error!("workflow: could not serialise snapshot: {e}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
