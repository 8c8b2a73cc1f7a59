//! Dashboard session: owns the poller, the live channel and the snapshot
//! store for as long as the dashboard runs.
//!
//! ```text
//! ┌──────────┐  stats / roster  ┌───────────────┐  DashboardUpdate  ┌──────────┐
//! │  Poller  │─────────────────►│               │──────────────────►│  render  │
//! └──────────┘                  │ SnapshotStore │   (broadcast)     │  layer   │
//! ┌──────────┐   live events    │               │                   └──────────┘
//! │LiveChannel│────────────────►│               │
//! └──────────┘                  └───────────────┘
//! ```

use anyhow::Result;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use crate::api::types::{demo_analysis, demo_batch_summary};
use crate::api::{Backend, BatchSummary, StudentAnalysis, StudentRecord};
use crate::feed::live::{ConnectionState, LiveChannel};
use crate::feed::poller::Poller;
use crate::feed::simulator::Simulator;
use crate::feed::transport::Connector;
use crate::logging::{log, log_failure, obj, v_str, Domain, Level};
use crate::risk::{classify_score, RiskTier};
use crate::state::Config;
use crate::storage::{DashboardUpdate, Origin, Snapshot, SnapshotStore, Sourced};
use crate::view::{render, DashboardView};

/// Grace period for tasks to wind down before they are aborted.
const STOP_GRACE: Duration = Duration::from_secs(2);

pub struct DashboardSession {
    store: Arc<SnapshotStore>,
    backend: Arc<dyn Backend>,
    stop_tx: watch::Sender<bool>,
    channel_state: watch::Receiver<ConnectionState>,
    tasks: Vec<JoinHandle<()>>,
}

impl DashboardSession {
    /// Spawn the poller and the live channel on the current runtime.
    ///
    /// Neither waits on the other: the startup fetches and the first
    /// connect attempt run concurrently.
    pub fn start(
        cfg: &Config,
        backend: Arc<dyn Backend>,
        connector: Arc<dyn Connector>,
    ) -> Result<Self> {
        Self::start_with_simulator(cfg, backend, connector, Simulator::new())
    }

    pub fn start_with_simulator(
        cfg: &Config,
        backend: Arc<dyn Backend>,
        connector: Arc<dyn Connector>,
        simulator: Simulator,
    ) -> Result<Self> {
        let url = cfg.updates_url()?;
        let store = Arc::new(SnapshotStore::new(cfg.update_channel_capacity));
        let (stop_tx, stop_rx) = watch::channel(false);

        let poller = Poller::new(backend.clone(), store.clone(), cfg.poll_interval());
        let live = LiveChannel::new(cfg, url.clone(), connector, store.clone())
            .with_simulator(simulator);
        let channel_state = live.state();

        log(
            Level::Info,
            Domain::System,
            "session_start",
            obj(&[
                ("api_base", v_str(&cfg.api_base)),
                ("updates_url", v_str(url.as_str())),
                ("poll_secs", serde_json::json!(cfg.poll_secs)),
            ]),
        );

        let tasks = vec![
            tokio::spawn(poller.run(stop_rx.clone())),
            tokio::spawn(live.run(stop_rx)),
        ];

        Ok(Self {
            store,
            backend,
            stop_tx,
            channel_state,
            tasks,
        })
    }

    /// Change notifications from the moment of subscription on.
    pub fn subscribe(&self) -> broadcast::Receiver<DashboardUpdate> {
        self.store.subscribe()
    }

    pub fn snapshot(&self) -> Snapshot {
        self.store.snapshot()
    }

    pub fn view(&self) -> DashboardView {
        render(&self.store.snapshot())
    }

    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.channel_state.clone()
    }

    /// Trigger a batch prediction; a success counts one more prediction.
    pub async fn run_batch_analysis(&self) -> Sourced<BatchSummary> {
        match self.backend.predict_batch().await {
            Ok(summary) => {
                log(
                    Level::Info,
                    Domain::Analysis,
                    "batch_complete",
                    obj(&[
                        ("high_risk", serde_json::json!(summary.high_risk)),
                        ("medium_risk", serde_json::json!(summary.medium_risk)),
                        ("low_risk", serde_json::json!(summary.low_risk)),
                    ]),
                );
                self.store.bump_predictions();
                Sourced {
                    value: summary,
                    origin: Origin::Backend,
                }
            }
            Err(e) => {
                log_failure(Domain::Analysis, "batch_failed", e.category(), &e.to_string());
                Sourced {
                    value: demo_batch_summary(),
                    origin: Origin::Demo,
                }
            }
        }
    }

    pub async fn analyze_student(&self, student_id: i64) -> Sourced<StudentAnalysis> {
        match self.backend.analyze_student(student_id).await {
            Ok(analysis) => Sourced {
                value: analysis,
                origin: Origin::Backend,
            },
            Err(e) => {
                log_failure(Domain::Analysis, "analysis_failed", e.category(), &e.to_string());
                Sourced {
                    value: demo_analysis(student_id),
                    origin: Origin::Demo,
                }
            }
        }
    }

    /// Roster rows in the warning or danger band.
    pub fn identify_at_risk(&self) -> Vec<StudentRecord> {
        self.store
            .snapshot()
            .students
            .map(|s| s.value)
            .unwrap_or_default()
            .into_iter()
            .filter(|s| classify_score(s.score) != RiskTier::Low)
            .collect()
    }

    /// Log the rendered view for every update until `shutdown` resolves.
    /// Returns how many updates were rendered.
    pub async fn render_until<F: Future>(&self, shutdown: F) -> Result<u64> {
        let mut updates = self.subscribe();
        let mut rendered = 0;
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                update = updates.recv() => match update {
                    Ok(update) => {
                        let mut fields = obj(&[
                            ("slot", v_str(update.slot.as_str())),
                            ("seq", serde_json::json!(update.seq)),
                        ]);
                        fields.insert("view".to_string(), serde_json::to_value(render(&update.snapshot))?);
                        log(Level::Info, Domain::System, "render", fields);
                        rendered += 1;
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        log(
                            Level::Warn,
                            Domain::System,
                            "render_lagged",
                            obj(&[("skipped", serde_json::json!(skipped))]),
                        );
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }
        Ok(rendered)
    }

    /// Cancel every timer, close the channel and freeze the store.
    pub async fn stop(self) {
        self.stop_tx.send_replace(true);
        for mut task in self.tasks {
            if tokio::time::timeout(STOP_GRACE, &mut task).await.is_err() {
                task.abort();
                let _ = task.await;
            }
        }
        self.store.close();
        log(Level::Info, Domain::System, "session_stop", obj(&[]));
    }
}
