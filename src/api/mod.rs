use async_trait::async_trait;
use std::fmt;

mod http;
pub mod types;

pub use http::HttpBackend;
pub use types::{AggregateStats, BatchSummary, LiveEvent, StudentAnalysis, StudentRecord};

pub const STATS_PATH: &str = "/api/dashboard/stats";
pub const STUDENTS_PATH: &str = "/api/students";
pub const PREDICT_BATCH_PATH: &str = "/api/ai/predict-batch";
pub const ANALYZE_PATH: &str = "/api/ai/analyze";
pub const UPDATES_PATH: &str = "/ws/ai/updates";

/// Why a request against the backend did not yield a usable payload.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchError {
    /// No response was received.
    Transport(String),
    /// A response arrived with a non-success status.
    Protocol { status: u16 },
    /// The body did not match the expected shape.
    Decode(String),
}

impl FetchError {
    pub fn category(&self) -> &'static str {
        match self {
            FetchError::Transport(_) => "transport",
            FetchError::Protocol { .. } => "protocol",
            FetchError::Decode(_) => "decode",
        }
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Transport(msg) => write!(f, "transport failure: {}", msg),
            FetchError::Protocol { status } => write!(f, "HTTP error status {}", status),
            FetchError::Decode(msg) => write!(f, "decode failure: {}", msg),
        }
    }
}

impl std::error::Error for FetchError {}

#[async_trait]
pub trait Backend: Send + Sync {
    async fn fetch_stats(&self) -> Result<AggregateStats, FetchError>;
    async fn fetch_students(&self) -> Result<Vec<StudentRecord>, FetchError>;
    async fn predict_batch(&self) -> Result<BatchSummary, FetchError>;
    async fn analyze_student(&self, student_id: i64) -> Result<StudentAnalysis, FetchError>;
}
