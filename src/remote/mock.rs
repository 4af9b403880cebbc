//! Scriptable [`AnalysisService`] for unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use uuid::Uuid;

use super::{AnalysisService, RemoteError};

/// What a mocked call does when invoked.
#[derive(Debug, Clone)]
pub enum Behaviour {
    Succeed(Bytes),
    Fail(RemoteError),
    /// Never completes; only cancellation can end the wait.
    Hang,
}

impl Behaviour {
    async fn run(self) -> Result<Bytes, RemoteError> {
        match self {
            Behaviour::Succeed(bytes) => Ok(bytes),
            Behaviour::Fail(err) => Err(err),
            Behaviour::Hang => std::future::pending().await,
        }
    }
}

pub struct MockAnalysisService {
    capture: Mutex<Behaviour>,
    analyze: Mutex<Behaviour>,
    capture_calls: AtomicUsize,
    analyze_ids: Mutex<Vec<Uuid>>,
    cancelled_ids: Mutex<Vec<Uuid>>,
}

impl MockAnalysisService {
    pub fn new(capture: Behaviour, analyze: Behaviour) -> Self {
        Self {
            capture: Mutex::new(capture),
            analyze: Mutex::new(analyze),
            capture_calls: AtomicUsize::new(0),
            analyze_ids: Mutex::new(Vec::new()),
            cancelled_ids: Mutex::new(Vec::new()),
        }
    }

    /// Capture and analyze both succeed with small fixed payloads.
    pub fn happy() -> Self {
        Self::new(
            Behaviour::Succeed(Bytes::from_static(b"\xff\xd8jpeg")),
            Behaviour::Succeed(Bytes::from_static(b"ID3mp3")),
        )
    }

    pub fn capture_calls(&self) -> usize {
        self.capture_calls.load(Ordering::SeqCst)
    }

    pub fn analyze_ids(&self) -> Vec<Uuid> {
        self.analyze_ids.lock().clone()
    }

    pub fn cancelled_ids(&self) -> Vec<Uuid> {
        self.cancelled_ids.lock().clone()
    }
}

#[async_trait]
impl AnalysisService for MockAnalysisService {
    async fn capture(&self) -> Result<Bytes, RemoteError> {
        self.capture_calls.fetch_add(1, Ordering::SeqCst);
        let behaviour = self.capture.lock().clone();
        behaviour.run().await
    }

    async fn analyze(&self, _image: Bytes, workflow_id: Uuid) -> Result<Bytes, RemoteError> {
        self.analyze_ids.lock().push(workflow_id);
        let behaviour = self.analyze.lock().clone();
        behaviour.run().await
    }

    async fn cancel_remote(&self, workflow_id: Uuid) -> Result<(), RemoteError> {
        self.cancelled_ids.lock().push(workflow_id);
        Ok(())
    }
}
