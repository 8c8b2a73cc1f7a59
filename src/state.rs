use anyhow::{anyhow, Result};
use std::time::Duration;
use url::Url;

use crate::api::UPDATES_PATH;
use crate::feed::live::SimulationPolicy;

pub const LOCAL_BASE: &str = "http://localhost:8000";
pub const PRODUCTION_BASE: &str = "https://edutrack-ai-backend.onrender.com";

/// Hosts treated as a local development setup.
const LOCAL_HOSTS: &[&str] = &["localhost", "127.0.0.1"];

#[derive(Clone, Debug)]
pub struct Config {
    /// Host the dashboard is served from; selects the backend address.
    pub host: String,
    pub api_base: String,
    pub poll_secs: u64,
    pub reconnect_secs: u64,
    pub simulate_secs: u64,
    /// 0 keeps simulation sticky once entered.
    pub sim_retry_secs: u64,
    pub http_timeout_secs: u64,
    pub update_channel_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            api_base: LOCAL_BASE.to_string(),
            poll_secs: 10,
            reconnect_secs: 3,
            simulate_secs: 5,
            sim_retry_secs: 0,
            http_timeout_secs: 10,
            update_channel_capacity: 64,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let d = Self::default();
        let host = std::env::var("DASHBOARD_HOST").unwrap_or(d.host);
        let api_base = std::env::var("API_BASE")
            .unwrap_or_else(|_| Self::select_base(&host).to_string());
        Self {
            api_base,
            host,
            poll_secs: std::env::var("POLL_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(d.poll_secs),
            reconnect_secs: std::env::var("RECONNECT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(d.reconnect_secs),
            simulate_secs: std::env::var("SIMULATE_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(d.simulate_secs),
            sim_retry_secs: std::env::var("SIM_RETRY_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(d.sim_retry_secs),
            http_timeout_secs: std::env::var("HTTP_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(d.http_timeout_secs),
            update_channel_capacity: std::env::var("UPDATE_CHANNEL_CAP").ok().and_then(|v| v.parse().ok()).unwrap_or(d.update_channel_capacity),
        }
    }

    pub fn select_base(host: &str) -> &'static str {
        if LOCAL_HOSTS.contains(&host) {
            LOCAL_BASE
        } else {
            PRODUCTION_BASE
        }
    }

    pub fn base_url(&self) -> Result<Url> {
        Ok(Url::parse(&self.api_base)?)
    }

    /// Push channel address: the base with `http`→`ws` / `https`→`wss`.
    pub fn updates_url(&self) -> Result<Url> {
        let mut url = self.base_url()?;
        let scheme = match url.scheme() {
            "http" => "ws",
            "https" => "wss",
            other => return Err(anyhow!("unsupported base scheme: {}", other)),
        };
        url.set_scheme(scheme)
            .map_err(|_| anyhow!("cannot switch {} to {}", self.api_base, scheme))?;
        url.set_path(UPDATES_PATH);
        Ok(url)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_secs.max(1))
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_secs)
    }

    pub fn simulate_interval(&self) -> Duration {
        Duration::from_secs(self.simulate_secs.max(1))
    }

    pub fn simulation_policy(&self) -> SimulationPolicy {
        match self.sim_retry_secs {
            0 => SimulationPolicy::Sticky,
            secs => SimulationPolicy::RetryEvery(Duration::from_secs(secs)),
        }
    }
}
