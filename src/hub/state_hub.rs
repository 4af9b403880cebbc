//! Connection set and broadcast for live dashboard state.
//!
//! Each dashboard connection is represented by the sending half of an
//! unbounded channel; the transport task owning the socket drains the other
//! half.  Because sending on an unbounded channel never blocks, the hub can
//! deliver while holding its lock, which gives two guarantees:
//!
//! * a joining connection receives its snapshots and the full history before
//!   any message published after it joined;
//! * messages are observed by every connection in the order `publish` /
//!   `notify` were called.

use std::collections::HashMap;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::history::NotificationLog;
use super::message::{HubMessage, NotificationEntry, NotificationLevel};

pub type ConnectionId = Uuid;

/// Sending half handed to the hub for one dashboard connection.
pub type ConnectionSender = mpsc::UnboundedSender<String>;

/// Supplies the per-module full-state snapshots replayed to a new connection.
pub trait SnapshotSource {
    /// `(module name, snapshot)` pairs for every module that exposes one.
    fn snapshots(&self) -> Vec<(String, serde_json::Value)>;
}

impl SnapshotSource for () {
    fn snapshots(&self) -> Vec<(String, serde_json::Value)> {
        Vec::new()
    }
}

struct HubInner {
    connections: HashMap<ConnectionId, ConnectionSender>,
    log: NotificationLog,
}

pub struct StateHub {
    inner: Mutex<HubInner>,
}

impl StateHub {
    pub fn new(history_capacity: usize) -> Self {
        Self {
            inner: Mutex::new(HubInner {
                connections: HashMap::new(),
                log: NotificationLog::new(history_capacity.max(1)),
            }),
        }
    }

    /// Register a connection and bring it up to date.
    ///
    /// Sends one `<module>_update` per snapshot from `modules`, then the
    /// notification history oldest-first, all before the connection becomes
    /// visible to `publish`.
    pub fn join(&self, sender: ConnectionSender, modules: &dyn SnapshotSource) -> ConnectionId {
        let id = Uuid::new_v4();
        let mut inner = self.inner.lock();

        let mut initial: Vec<HubMessage> = modules
            .snapshots()
            .into_iter()
            .map(|(name, data)| HubMessage::module_update(&name, data))
            .collect();
        initial.extend(inner.log.iter().map(NotificationEntry::to_message));

        for message in initial {
            let Some(text) = encode(&message) else { continue };
            if sender.send(text).is_err() {
                log::debug!("hub: connection {id} closed during initial sync");
                return id;
            }
        }

        inner.connections.insert(id, sender);
        log::info!(
            "hub: connection {id} joined ({} live)",
            inner.connections.len()
        );
        id
    }

    /// Deregister a connection; unknown ids are ignored.
    pub fn leave(&self, id: &ConnectionId) {
        let mut inner = self.inner.lock();
        if inner.connections.remove(id).is_some() {
            log::info!(
                "hub: connection {id} left ({} live)",
                inner.connections.len()
            );
        }
    }

    /// Deliver `message` to every registered connection.
    pub fn publish(&self, message: &HubMessage) {
        let Some(text) = encode(message) else { return };
        let mut inner = self.inner.lock();
        broadcast(&mut inner.connections, &text);
    }

    /// Record a notification in the history and broadcast it.
    pub fn notify(&self, message: impl Into<String>, level: NotificationLevel) {
        let entry = NotificationEntry::now(message, level);
        log::info!("notify [{}]: {}", level.as_str(), entry.message);

        let text = encode(&entry.to_message());
        let mut inner = self.inner.lock();
        inner.log.append(entry);
        if let Some(text) = text {
            broadcast(&mut inner.connections, &text);
        }
    }

    pub fn connection_count(&self) -> usize {
        self.inner.lock().connections.len()
    }

    /// Notification history, oldest first.
    pub fn history(&self) -> Vec<NotificationEntry> {
        self.inner.lock().log.snapshot_in_order()
    }
}

fn encode(message: &HubMessage) -> Option<String> {
    match message.to_json() {
        Ok(text) => Some(text),
        Err(e) => {
            log::error!("hub: failed to serialise {} message: {e}", message.kind);
            None
        }
    }
}

/// Send to every connection; the ones whose receiver is gone are dropped.
fn broadcast(connections: &mut HashMap<ConnectionId, ConnectionSender>, text: &str) {
    connections.retain(|id, sender| match sender.send(text.to_owned()) {
        Ok(()) => true,
        Err(_) => {
            log::warn!("hub: dropping unreachable connection {id}");
            false
        }
    });
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
