//! In-memory snapshot of everything the render layer shows.
//!
//! Three independent data slots (stats, roster, live event) plus the
//! connectivity status. Each write replaces one slot wholesale and
//! notifies subscribers from the writer's context.

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::broadcast;

use crate::api::{AggregateStats, LiveEvent, StudentRecord};
use crate::feed::live::ConnectionState;
use crate::logging::{enabled, log, obj, v_str, Domain, Level};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Backend,
    Demo,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sourced<T> {
    pub value: T,
    pub origin: Origin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Health {
    Unknown,
    Healthy,
    Degraded,
}

impl From<Origin> for Health {
    fn from(origin: Origin) -> Self {
        match origin {
            Origin::Backend => Health::Healthy,
            Origin::Demo => Health::Degraded,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Connectivity {
    pub stats: Health,
    pub roster: Health,
    pub channel: ConnectionState,
}

impl Connectivity {
    pub fn is_degraded(&self) -> bool {
        self.stats == Health::Degraded || self.roster == Health::Degraded
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub stats: Option<Sourced<AggregateStats>>,
    pub students: Option<Sourced<Vec<StudentRecord>>>,
    pub live: Option<LiveEvent>,
    pub connectivity: Connectivity,
}

impl Snapshot {
    fn empty() -> Self {
        Self {
            stats: None,
            students: None,
            live: None,
            connectivity: Connectivity {
                stats: Health::Unknown,
                roster: Health::Unknown,
                channel: ConnectionState::Connecting,
            },
        }
    }

    /// SHA-256 over the serialized data slots (connectivity excluded).
    pub fn fingerprint(&self) -> String {
        let body = serde_json::to_vec(&(&self.stats, &self.students, &self.live))
            .unwrap_or_default();
        hex::encode(Sha256::digest(&body))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Slot {
    Stats,
    Students,
    Live,
    Connectivity,
}

impl Slot {
    pub fn as_str(&self) -> &'static str {
        match self {
            Slot::Stats => "stats",
            Slot::Students => "students",
            Slot::Live => "live",
            Slot::Connectivity => "connectivity",
        }
    }
}

/// One change notification: the slot written and the snapshot after the write.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardUpdate {
    pub seq: u64,
    pub slot: Slot,
    pub snapshot: Snapshot,
}

struct StoreInner {
    snapshot: Snapshot,
    seq: u64,
}

pub struct SnapshotStore {
    inner: Mutex<StoreInner>,
    tx: broadcast::Sender<DashboardUpdate>,
    closed: AtomicBool,
}

impl SnapshotStore {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            inner: Mutex::new(StoreInner {
                snapshot: Snapshot::empty(),
                seq: 0,
            }),
            tx,
            closed: AtomicBool::new(false),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DashboardUpdate> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> Snapshot {
        self.lock().snapshot.clone()
    }

    /// Replace the stats slot; its health follows the origin.
    pub fn replace_stats(&self, stats: AggregateStats, origin: Origin) {
        self.write(Slot::Stats, |s| {
            s.stats = Some(Sourced { value: stats, origin });
            s.connectivity.stats = origin.into();
        });
    }

    /// Replace the roster slot; its health follows the origin.
    pub fn replace_students(&self, students: Vec<StudentRecord>, origin: Origin) {
        self.write(Slot::Students, |s| {
            s.students = Some(Sourced { value: students, origin });
            s.connectivity.roster = origin.into();
        });
    }

    pub fn record_live_event(&self, event: LiveEvent) {
        self.write(Slot::Live, |s| s.live = Some(event));
    }

    pub fn set_channel_state(&self, state: ConnectionState) {
        self.write(Slot::Connectivity, |s| s.connectivity.channel = state);
    }

    /// Count one more prediction against backend stats. Demo stats stay
    /// fixed and an empty slot is left alone; neither notifies.
    pub fn bump_predictions(&self) {
        self.write_if(Slot::Stats, |s| match &mut s.stats {
            Some(stats) if stats.origin == Origin::Backend => {
                stats.value.ai_predictions_made = stats.value.ai_predictions_made.saturating_add(1);
                true
            }
            _ => false,
        });
    }

    /// Reject every later write.
    pub fn close(&self) {
        let _inner = self.lock();
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write<F: FnOnce(&mut Snapshot)>(&self, slot: Slot, apply: F) {
        self.write_if(slot, |s| {
            apply(s);
            true
        });
    }

    /// Apply `apply` to a copy of the snapshot; commit and notify only
    /// when it returns true.
    fn write_if<F: FnOnce(&mut Snapshot) -> bool>(&self, slot: Slot, apply: F) {
        let mut inner = self.lock();
        if self.is_closed() {
            return;
        }
        let mut next = inner.snapshot.clone();
        if !apply(&mut next) {
            return;
        }
        inner.snapshot = next;
        inner.seq += 1;

        let update = DashboardUpdate {
            seq: inner.seq,
            slot,
            snapshot: inner.snapshot.clone(),
        };
        if enabled(Level::Debug, Domain::Store) {
            log(
                Level::Debug,
                Domain::Store,
                "write",
                obj(&[
                    ("slot", v_str(slot.as_str())),
                    ("seq", serde_json::json!(update.seq)),
                    ("fingerprint", v_str(&update.snapshot.fingerprint())),
                ]),
            );
        }
        // No receivers is fine; the snapshot is still readable.
        let _ = self.tx.send(update);
    }
}
