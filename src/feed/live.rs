//! Push-channel lifecycle.
//!
//! ```text
//!   Connecting ──ok──► Open ──close/error──► Closed ──3s──► Connecting
//!       │
//!       └──error, never opened──► Simulating (5s synthetic events)
//! ```
//!
//! A failed handshake after the channel has opened at least once goes to
//! `Closed` and keeps retrying. Exactly one producer feeds the store at a
//! time: the open transport or the simulator, both inside the same task.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior};
use url::Url;

use super::simulator::Simulator;
use super::stopped;
use super::transport::{Connector, Transport};
use crate::api::types::decode_live_event;
use crate::logging::{log, log_failure, log_transition, obj, v_str, Domain, Level};
use crate::state::Config;
use crate::storage::SnapshotStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
    Simulating,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::Closed => "closed",
            ConnectionState::Simulating => "simulating",
        }
    }
}

/// What happens once the channel has fallen back to simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulationPolicy {
    /// Simulate for the rest of the session.
    Sticky,
    /// Keep simulating, but retry the real channel on this period.
    RetryEvery(Duration),
}

pub struct LiveChannel {
    url: Url,
    connector: Arc<dyn Connector>,
    store: Arc<SnapshotStore>,
    state_tx: watch::Sender<ConnectionState>,
    transport: Option<Box<dyn Transport>>,
    simulator: Simulator,
    reconnect_delay: Duration,
    simulate_interval: Duration,
    policy: SimulationPolicy,
    ever_opened: bool,
}

impl LiveChannel {
    pub fn new(
        cfg: &Config,
        url: Url,
        connector: Arc<dyn Connector>,
        store: Arc<SnapshotStore>,
    ) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Connecting);
        Self {
            url,
            connector,
            store,
            state_tx,
            transport: None,
            simulator: Simulator::new(),
            reconnect_delay: cfg.reconnect_delay(),
            simulate_interval: cfg.simulate_interval(),
            policy: cfg.simulation_policy(),
            ever_opened: false,
        }
    }

    pub fn with_simulator(mut self, simulator: Simulator) -> Self {
        self.simulator = simulator;
        self
    }

    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Drive the state machine until the stop flag is raised.
    pub async fn run(mut self, mut stop: watch::Receiver<bool>) {
        let mut state = ConnectionState::Connecting;
        self.publish(state);
        log(
            Level::Info,
            Domain::Channel,
            "connecting",
            obj(&[("url", v_str(self.url.as_str()))]),
        );

        loop {
            let next = tokio::select! {
                _ = stopped(&mut stop) => None,
                next = self.step(state) => Some(next),
            };
            let Some((next, reason)) = next else { break };
            log_transition(state.as_str(), next.as_str(), reason);
            state = next;
            self.publish(state);
        }

        if let Some(mut transport) = self.transport.take() {
            transport.close().await;
        }
        log(Level::Info, Domain::Channel, "stopped", obj(&[("state", v_str(state.as_str()))]));
    }

    fn publish(&self, state: ConnectionState) {
        self.state_tx.send_replace(state);
        self.store.set_channel_state(state);
    }

    async fn step(&mut self, state: ConnectionState) -> (ConnectionState, &'static str) {
        match state {
            ConnectionState::Connecting => self.connect().await,
            ConnectionState::Open => self.receive().await,
            ConnectionState::Closed => {
                sleep(self.reconnect_delay).await;
                (ConnectionState::Connecting, "reconnect_delay_elapsed")
            }
            ConnectionState::Simulating => self.simulate().await,
        }
    }

    async fn connect(&mut self) -> (ConnectionState, &'static str) {
        match self.connector.connect(&self.url).await {
            Ok(transport) => {
                self.transport = Some(transport);
                self.ever_opened = true;
                (ConnectionState::Open, "handshake_ok")
            }
            Err(e) => {
                log_failure(Domain::Channel, "connect_failed", e.category(), &e.to_string());
                if self.ever_opened {
                    (ConnectionState::Closed, "handshake_failed")
                } else {
                    (ConnectionState::Simulating, "channel_unavailable")
                }
            }
        }
    }

    async fn receive(&mut self) -> (ConnectionState, &'static str) {
        loop {
            let Some(transport) = self.transport.as_mut() else {
                return (ConnectionState::Closed, "no_transport");
            };
            match transport.next_text().await {
                Some(Ok(text)) => match decode_live_event(&text) {
                    Ok(event) => self.store.record_live_event(event),
                    Err(e) => log_failure(
                        Domain::Channel,
                        "event_dropped",
                        "malformed_event",
                        &e.to_string(),
                    ),
                },
                Some(Err(e)) => {
                    log_failure(Domain::Channel, "transport_failed", e.category(), &e.to_string());
                    self.transport = None;
                    return (ConnectionState::Closed, "transport_error");
                }
                None => {
                    self.transport = None;
                    return (ConnectionState::Closed, "remote_close");
                }
            }
        }
    }

    async fn simulate(&mut self) -> (ConnectionState, &'static str) {
        let start = Instant::now();
        let mut ticks = interval_at(start + self.simulate_interval, self.simulate_interval);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let retry_every = match self.policy {
            SimulationPolicy::Sticky => None,
            SimulationPolicy::RetryEvery(period) => Some(period),
        };
        let mut retries = retry_every.map(|period| {
            let mut iv = interval_at(start + period, period);
            iv.set_missed_tick_behavior(MissedTickBehavior::Delay);
            iv
        });

        loop {
            let retry_due = async {
                match retries.as_mut() {
                    Some(iv) => {
                        iv.tick().await;
                    }
                    None => std::future::pending::<()>().await,
                }
            };
            tokio::select! {
                _ = ticks.tick() => {
                    let event = self.simulator.next_event();
                    self.store.record_live_event(event);
                }
                _ = retry_due => {
                    match self.connector.connect(&self.url).await {
                        Ok(transport) => {
                            self.transport = Some(transport);
                            self.ever_opened = true;
                            return (ConnectionState::Open, "channel_recovered");
                        }
                        Err(e) => log_failure(
                            Domain::Channel,
                            "retry_failed",
                            e.category(),
                            &e.to_string(),
                        ),
                    }
                }
            }
        }
    }
}
