use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tokio::fs;
use url::Url;

use crate::shared::error::{AppError, AppResult};
use crate::shared::types::LanguageCode;

/// Client configuration
///
/// The server address is fixed per install; nothing is discovered at runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    /// `host:port` of the processing server, or a full `http(s)://` URL
    pub server_address: String,
    pub probe_timeout_ms: u64,
    pub submit_timeout_ms: u64,
    pub default_language: LanguageCode,
    /// Accepted values of the `status` field returned by `/test`
    pub running_markers: Vec<String>,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            server_address: "127.0.0.1:5000".to_string(),
            probe_timeout_ms: 5_000,
            submit_timeout_ms: 30_000,
            default_language: LanguageCode::En,
            running_markers: vec!["running".to_string(), "Server is running".to_string()],
        }
    }
}

impl ClientSettings {
    pub fn get_settings_path() -> AppResult<PathBuf> {
        ProjectDirs::from("com", "antigravity", "snap-translate")
            .map(|dirs| dirs.config_dir().join("settings.json"))
            .ok_or_else(|| AppError::Config("Failed to determine config directory".to_string()))
    }

    /// Load settings from the per-user config directory, writing defaults on first run
    pub async fn load() -> AppResult<Self> {
        let path = Self::get_settings_path()?;
        Self::load_from(&path).await
    }

    pub async fn load_from(path: &Path) -> AppResult<Self> {
        if !fs::try_exists(path).await? {
            let settings = Self::default();
            settings.save_to(path).await?;
            return Ok(settings);
        }

        let content = fs::read_to_string(path).await?;
        let settings: Self = serde_json::from_str(&content)?;
        settings.base_url()?;
        Ok(settings)
    }

    pub async fn save_to(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).await?;
        Ok(())
    }

    /// Base URL of the processing server, always ending with `/`
    pub fn base_url(&self) -> AppResult<Url> {
        let raw = self.server_address.trim();
        if raw.is_empty() {
            return Err(AppError::Config("Server address is empty".to_string()));
        }

        let with_scheme = if raw.contains("://") {
            raw.to_string()
        } else {
            format!("http://{}", raw)
        };
        let mut url = Url::parse(&with_scheme)?;
        if url.host_str().is_none() || url.cannot_be_a_base() {
            return Err(AppError::Config(format!("Server address has no host: {}", raw)));
        }
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        Ok(url)
    }

    pub fn endpoint(&self, route: &str) -> AppResult<Url> {
        Ok(self.base_url()?.join(route.trim_start_matches('/'))?)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn submit_timeout(&self) -> Duration {
        Duration::from_millis(self.submit_timeout_ms)
    }
}
