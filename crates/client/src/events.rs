// Event bus for best-effort failures that must not abort the caller.

use std::sync::{Arc, RwLock};

use tracing::warn;

use tfvc_common::types::Failure;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// A background step (queued-edit replay, reconcile) failed.
    NonFatalError {
        workspace: Option<String>,
        message: String,
    },
    /// Per-item failures returned by a call that otherwise succeeded.
    FailuresReported {
        workspace: Option<String>,
        failures: Vec<Failure>,
    },
}

pub trait EventListener: Send + Sync {
    fn on_event(&self, event: &ClientEvent);
}

/// Fans events out to registered listeners and logs each one.
#[derive(Default)]
pub struct EventBus {
    listeners: RwLock<Vec<Arc<dyn EventListener>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, listener: Arc<dyn EventListener>) {
        match self.listeners.write() {
            Ok(mut listeners) => listeners.push(listener),
            Err(poisoned) => poisoned.into_inner().push(listener),
        }
    }

    pub fn fire(&self, event: ClientEvent) {
        match &event {
            ClientEvent::NonFatalError { workspace, message } => {
                warn!(workspace = ?workspace, error = %message, "non-fatal error");
            }
            ClientEvent::FailuresReported { workspace, failures } => {
                warn!(workspace = ?workspace, count = failures.len(), "failures reported");
            }
        }
        let listeners = match self.listeners.read() {
            Ok(listeners) => listeners,
            Err(poisoned) => poisoned.into_inner(),
        };
        for listener in listeners.iter() {
            listener.on_event(&event);
        }
    }

    pub fn non_fatal(&self, workspace: Option<&str>, error: &dyn std::fmt::Display) {
        self.fire(ClientEvent::NonFatalError {
            workspace: workspace.map(str::to_string),
            message: error.to_string(),
        });
    }

    pub fn report_failures(&self, workspace: Option<&str>, failures: &[Failure]) {
        if failures.is_empty() {
            return;
        }
        self.fire(ClientEvent::FailuresReported {
            workspace: workspace.map(str::to_string),
            failures: failures.to_vec(),
        });
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.listeners.read().map(|l| l.len()).unwrap_or(0);
        f.debug_struct("EventBus").field("listeners", &count).finish()
    }
}

/// Listener that keeps every event, for tests and diagnostics.
#[derive(Debug, Default)]
pub struct RecordingListener {
    events: std::sync::Mutex<Vec<ClientEvent>>,
}

impl RecordingListener {
    pub fn events(&self) -> Vec<ClientEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl EventListener for RecordingListener {
    fn on_event(&self, event: &ClientEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event.clone()),
            Err(poisoned) => poisoned.into_inner().push(event.clone()),
        }
    }
}
