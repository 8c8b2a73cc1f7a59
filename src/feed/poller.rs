use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use super::stopped;
use crate::api::types::{demo_roster, demo_stats};
use crate::api::Backend;
use crate::logging::{log, log_failure, obj, v_num, Domain, Level};
use crate::storage::{Health, Origin, SnapshotStore};

/// Fetches aggregate stats on a fixed interval and the roster once.
///
/// Failures never propagate: the slot is filled with the fixed demo
/// payload and marked degraded instead.
pub struct Poller {
    backend: Arc<dyn Backend>,
    store: Arc<SnapshotStore>,
    interval: Duration,
}

impl Poller {
    pub fn new(backend: Arc<dyn Backend>, store: Arc<SnapshotStore>, interval: Duration) -> Self {
        Self {
            backend,
            store,
            interval,
        }
    }

    pub async fn fetch_stats(&self) -> Health {
        match self.backend.fetch_stats().await {
            Ok(stats) => {
                log(
                    Level::Debug,
                    Domain::Poll,
                    "stats_fetched",
                    obj(&[
                        ("total_students", serde_json::json!(stats.total_students)),
                        ("average_score", v_num(stats.average_score)),
                        ("at_risk_students", serde_json::json!(stats.at_risk_students)),
                    ]),
                );
                self.store.replace_stats(stats, Origin::Backend);
                Health::Healthy
            }
            Err(e) => {
                log_failure(Domain::Poll, "stats_fetch_failed", e.category(), &e.to_string());
                self.store.replace_stats(demo_stats(), Origin::Demo);
                Health::Degraded
            }
        }
    }

    pub async fn fetch_students(&self) -> Health {
        match self.backend.fetch_students().await {
            Ok(students) => {
                log(
                    Level::Debug,
                    Domain::Poll,
                    "roster_fetched",
                    obj(&[("count", serde_json::json!(students.len()))]),
                );
                self.store.replace_students(students, Origin::Backend);
                Health::Healthy
            }
            Err(e) => {
                log_failure(Domain::Poll, "roster_fetch_failed", e.category(), &e.to_string());
                self.store.replace_students(demo_roster(), Origin::Demo);
                Health::Degraded
            }
        }
    }

    /// Stats are fetched at startup and then on a schedule anchored at
    /// startup; the one-shot roster fetch runs alongside and never
    /// delays a stats tick.
    pub async fn run(self, mut stop: watch::Receiver<bool>) {
        let start = Instant::now();
        let stats_loop = async {
            let mut ticks = interval_at(start + self.interval, self.interval);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            self.fetch_stats().await;
            loop {
                ticks.tick().await;
                self.fetch_stats().await;
            }
        };
        let work = async {
            tokio::join!(self.fetch_students(), stats_loop);
        };

        tokio::select! {
            _ = stopped(&mut stop) => {}
            _ = work => {}
        }
        log(Level::Info, Domain::Poll, "stopped", obj(&[]));
    }
}
