//! Change announcements to other service instances.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::model::VersionStamp;

/// Invalidation payload: consumers re-fetch only `paths`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub id: Uuid,
    pub stamp: VersionStamp,
    pub paths: BTreeSet<String>,
}

impl ChangeEvent {
    pub fn new(stamp: VersionStamp, paths: BTreeSet<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            stamp,
            paths,
        }
    }
}

/// Producer side of the message bus. Called once per successful write or
/// refresh with the full changed-path set.
pub trait ChangeAnnouncer: Send + Sync {
    fn announce(&self, stamp: &VersionStamp, paths: &BTreeSet<String>);
}

/// Logs each announcement.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAnnouncer;

impl ChangeAnnouncer for TracingAnnouncer {
    fn announce(&self, stamp: &VersionStamp, paths: &BTreeSet<String>) {
        tracing::info!(stamp = %stamp, paths = paths.len(), "Configuration changed");
        tracing::debug!(stamp = %stamp, ?paths, "Changed paths");
    }
}

/// Publishes [`ChangeEvent`]s on a tokio broadcast channel.
#[derive(Debug, Clone)]
pub struct BroadcastAnnouncer {
    tx: broadcast::Sender<ChangeEvent>,
}

impl BroadcastAnnouncer {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.tx.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl ChangeAnnouncer for BroadcastAnnouncer {
    fn announce(&self, stamp: &VersionStamp, paths: &BTreeSet<String>) {
        // No subscribers is not an error.
        let _ = self.tx.send(ChangeEvent::new(stamp.clone(), paths.clone()));
    }
}

/// Forwards every announcement to each inner announcer in order.
#[derive(Default, Clone)]
pub struct FanoutAnnouncer {
    targets: Vec<Arc<dyn ChangeAnnouncer>>,
}

impl FanoutAnnouncer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, target: Arc<dyn ChangeAnnouncer>) -> Self {
        self.targets.push(target);
        self
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

impl ChangeAnnouncer for FanoutAnnouncer {
    fn announce(&self, stamp: &VersionStamp, paths: &BTreeSet<String>) {
        for target in &self.targets {
            target.announce(stamp, paths);
        }
    }
}
