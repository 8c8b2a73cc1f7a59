//! In-memory backend and push-channel fakes shared by the integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use url::Url;

use edutrack_live::api::{
    AggregateStats, Backend, BatchSummary, FetchError, StudentAnalysis, StudentRecord,
};
use edutrack_live::feed::live::ConnectionState;
use edutrack_live::feed::transport::{ChannelError, Connector, Transport};
use edutrack_live::state::Config;

pub fn test_config() -> Config {
    Config {
        update_channel_capacity: 1024,
        ..Config::default()
    }
}

pub fn live_stats() -> AggregateStats {
    AggregateStats {
        total_students: 5,
        average_score: 81.6,
        ai_predictions_made: 42,
        at_risk_students: 1,
    }
}

pub fn john_doe() -> StudentRecord {
    StudentRecord {
        id: 1,
        name: "John Doe".to_string(),
        class: "Form 4".to_string(),
        score: 85.0,
    }
}

pub struct FakeBackend {
    pub stats: Mutex<Result<AggregateStats, FetchError>>,
    pub students: Mutex<Result<Vec<StudentRecord>, FetchError>>,
    pub batch: Mutex<Result<BatchSummary, FetchError>>,
    pub stats_calls: AtomicUsize,
    pub roster_calls: AtomicUsize,
}

impl FakeBackend {
    pub fn healthy() -> Self {
        Self {
            stats: Mutex::new(Ok(live_stats())),
            students: Mutex::new(Ok(vec![john_doe()])),
            batch: Mutex::new(Ok(BatchSummary {
                high_risk: 0,
                medium_risk: 1,
                low_risk: 4,
            })),
            stats_calls: AtomicUsize::new(0),
            roster_calls: AtomicUsize::new(0),
        }
    }

    pub fn unreachable() -> Self {
        let down = || FetchError::Transport("connection refused".to_string());
        Self {
            stats: Mutex::new(Err(down())),
            students: Mutex::new(Err(down())),
            batch: Mutex::new(Err(down())),
            stats_calls: AtomicUsize::new(0),
            roster_calls: AtomicUsize::new(0),
        }
    }

    pub fn stats_calls(&self) -> usize {
        self.stats_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn fetch_stats(&self) -> Result<AggregateStats, FetchError> {
        self.stats_calls.fetch_add(1, Ordering::SeqCst);
        self.stats.lock().unwrap().clone()
    }

    async fn fetch_students(&self) -> Result<Vec<StudentRecord>, FetchError> {
        self.roster_calls.fetch_add(1, Ordering::SeqCst);
        self.students.lock().unwrap().clone()
    }

    async fn predict_batch(&self) -> Result<BatchSummary, FetchError> {
        self.batch.lock().unwrap().clone()
    }

    async fn analyze_student(&self, student_id: i64) -> Result<StudentAnalysis, FetchError> {
        Err(FetchError::Protocol {
            status: if student_id == 404 { 404 } else { 500 },
        })
    }
}

/// What the remote side does on a connection.
pub enum Frame {
    Text(String),
    Fail,
}

pub struct ChannelTransport {
    rx: mpsc::UnboundedReceiver<Frame>,
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn next_text(&mut self) -> Option<Result<String, ChannelError>> {
        match self.rx.recv().await? {
            Frame::Text(text) => Some(Ok(text)),
            Frame::Fail => Some(Err(ChannelError::Transport("reset by peer".to_string()))),
        }
    }

    async fn close(&mut self) {
        self.rx.close();
    }
}

/// Replays a fixed sequence of connect outcomes, refusing once exhausted.
pub struct ScriptedConnector {
    script: Mutex<VecDeque<Option<mpsc::UnboundedReceiver<Frame>>>>,
    attempts: Mutex<Vec<Instant>>,
}

impl ScriptedConnector {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            attempts: Mutex::new(Vec::new()),
        }
    }

    /// Queue a successful handshake; the returned sender plays the server.
    pub fn accept(&self) -> mpsc::UnboundedSender<Frame> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.script.lock().unwrap().push_back(Some(rx));
        tx
    }

    pub fn refuse(&self) {
        self.script.lock().unwrap().push_back(None);
    }

    pub fn attempts(&self) -> Vec<Instant> {
        self.attempts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn connect(&self, _url: &Url) -> Result<Box<dyn Transport>, ChannelError> {
        self.attempts.lock().unwrap().push(Instant::now());
        match self.script.lock().unwrap().pop_front().flatten() {
            Some(rx) => Ok(Box::new(ChannelTransport { rx })),
            None => Err(ChannelError::Handshake("connection refused".to_string())),
        }
    }
}

pub fn live_frame(sessions: u64) -> Frame {
    Frame::Text(format!(
        r#"{{"timestamp":"2024-05-01T10:00:00.000000","active_sessions":{},"predictions_processed":321,"alerts":1,"system_health":"optimal"}}"#,
        sessions
    ))
}

pub async fn wait_for_state(rx: &mut watch::Receiver<ConnectionState>, want: ConnectionState) {
    tokio::time::timeout(Duration::from_secs(600), rx.wait_for(|s| *s == want))
        .await
        .expect("state not reached")
        .expect("channel task gone");
}
