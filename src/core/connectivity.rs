//! Reachability probe for the processing server

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use url::Url;

use crate::shared::error::{AppError, AppResult};
use crate::shared::settings::ClientSettings;
use crate::shared::types::ConnectionStatus;

const TEST_ROUTE: &str = "test";

#[async_trait]
pub trait ReachabilityProbe: Send + Sync {
    /// Never returns `Checking`; every failure folds into `Disconnected`
    async fn check(&self) -> ConnectionStatus;
}

#[derive(Debug, Deserialize)]
struct StatusBody {
    status: Option<String>,
}

pub struct ConnectivityProbe {
    http: Client,
    endpoint: Url,
    timeout: Duration,
    running_markers: Vec<String>,
}

impl ConnectivityProbe {
    pub fn new(settings: &ClientSettings) -> AppResult<Self> {
        let http = Client::builder()
            .user_agent("snap-translate/probe")
            .build()
            .map_err(|e| AppError::Config(e.to_string()))?;

        Ok(Self {
            http,
            endpoint: settings.endpoint(TEST_ROUTE)?,
            timeout: settings.probe_timeout(),
            running_markers: settings.running_markers.clone(),
        })
    }

    fn is_running(&self, status: &str) -> bool {
        let status = status.trim();
        self.running_markers.iter().any(|marker| marker == status)
    }

    async fn fetch_status(&self) -> Result<Option<String>, String> {
        let response = self
            .http
            .get(self.endpoint.clone())
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if !response.status().is_success() {
            return Err(format!("server answered {}", response.status()));
        }

        let body: StatusBody = response.json().await.map_err(|e| e.to_string())?;
        Ok(body.status)
    }
}

#[async_trait]
impl ReachabilityProbe for ConnectivityProbe {
    async fn check(&self) -> ConnectionStatus {
        let started = Instant::now();
        let result = tokio::time::timeout(self.timeout, self.fetch_status()).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(Ok(Some(status))) if self.is_running(&status) => {
                tracing::info!(target: "snap_translate::probe", endpoint = %self.endpoint, elapsed_ms, "server reachable");
                ConnectionStatus::Connected
            }
            Ok(Ok(status)) => {
                tracing::warn!(target: "snap_translate::probe", endpoint = %self.endpoint, ?status, "unexpected status marker");
                ConnectionStatus::Disconnected
            }
            Ok(Err(error)) => {
                tracing::warn!(target: "snap_translate::probe", endpoint = %self.endpoint, %error, elapsed_ms, "probe failed");
                ConnectionStatus::Disconnected
            }
            Err(_) => {
                tracing::warn!(target: "snap_translate::probe", endpoint = %self.endpoint, timeout_ms = self.timeout.as_millis() as u64, "probe timed out");
                ConnectionStatus::Disconnected
            }
        }
    }
}
