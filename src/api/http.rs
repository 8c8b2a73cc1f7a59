use anyhow::Result;
use async_trait::async_trait;
use reqwest::{Client, Method};
use std::time::Duration;
use url::Url;

use super::types::{self, AggregateStats, BatchSummary, StudentAnalysis, StudentRecord};
use super::{Backend, FetchError, ANALYZE_PATH, PREDICT_BATCH_PATH, STATS_PATH, STUDENTS_PATH};
use crate::state::Config;

/// reqwest-backed client for the analytics backend.
pub struct HttpBackend {
    client: Client,
    base: Url,
}

impl HttpBackend {
    pub fn new(cfg: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.http_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base: cfg.base_url()?,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, FetchError> {
        self.base
            .join(path)
            .map_err(|e| FetchError::Transport(format!("bad endpoint {}: {}", path, e)))
    }

    /// Issue a request and return the body of a 2xx response.
    async fn body(&self, method: Method, path: &str) -> Result<String, FetchError> {
        let url = self.endpoint(path)?;
        let mut req = self.client.request(method.clone(), url);
        if method == Method::POST {
            req = req.header("Content-Type", "application/json");
        }
        let resp = req
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Protocol {
                status: status.as_u16(),
            });
        }

        resp.text()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn fetch_stats(&self) -> Result<AggregateStats, FetchError> {
        let body = self.body(Method::GET, STATS_PATH).await?;
        types::decode_stats(&body)
    }

    async fn fetch_students(&self) -> Result<Vec<StudentRecord>, FetchError> {
        let body = self.body(Method::GET, STUDENTS_PATH).await?;
        types::decode_students(&body)
    }

    async fn predict_batch(&self) -> Result<BatchSummary, FetchError> {
        let body = self.body(Method::POST, PREDICT_BATCH_PATH).await?;
        types::decode_batch(&body)
    }

    async fn analyze_student(&self, student_id: i64) -> Result<StudentAnalysis, FetchError> {
        let path = format!("{}/{}", ANALYZE_PATH, student_id);
        let body = self.body(Method::GET, &path).await?;
        types::decode_analysis(student_id, &body)
    }
}
