//! Progress events emitted while a backup runs.
//!
//! Rendering is someone else's job: the crawler hands events to a
//! [`ProgressReporter`] and carries on.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{error, info};

/// Maximum number of queued events per subscriber
const BROADCAST_CAPACITY: usize = 1000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum BackupEvent {
    #[serde(rename = "endpoint:started")]
    EndpointStarted { endpoint: String },

    /// `total` is the highest item index written so far plus one
    #[serde(rename = "endpoint:progress")]
    PageWritten { endpoint: String, total: u64 },

    #[serde(rename = "endpoint:completed")]
    EndpointCompleted { endpoint: String, total: u64 },

    #[serde(rename = "endpoint:failed")]
    EndpointFailed { endpoint: String, error: String },

    #[serde(rename = "backup:completed")]
    RunCompleted { items: u64, failed_endpoints: usize },
}

pub trait ProgressReporter: Send + Sync + 'static {
    fn report(&self, event: BackupEvent);
}

/// Reports through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct LogReporter;

impl ProgressReporter for LogReporter {
    fn report(&self, event: BackupEvent) {
        match event {
            BackupEvent::EndpointStarted { endpoint } => info!("Backing up {}", endpoint),
            BackupEvent::PageWritten { endpoint, total } => {
                info!("Backing up {}: {}", endpoint, total)
            }
            BackupEvent::EndpointCompleted { endpoint, total } => {
                info!("Backed up all {} ({} items)", endpoint, total)
            }
            BackupEvent::EndpointFailed { endpoint, error } => {
                error!("Backup of {} stopped: {}", endpoint, error)
            }
            BackupEvent::RunCompleted {
                items,
                failed_endpoints,
            } => info!(
                "Backup finished: {} items, {} endpoint(s) failed",
                items, failed_endpoints
            ),
        }
    }
}

/// Fans events out to any number of subscribers
#[derive(Debug, Clone)]
pub struct BroadcastReporter {
    tx: broadcast::Sender<BackupEvent>,
}

impl BroadcastReporter {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BackupEvent> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for BroadcastReporter {
    fn report(&self, event: BackupEvent) {
        // No subscribers is fine
        let _ = self.tx.send(event);
    }
}
