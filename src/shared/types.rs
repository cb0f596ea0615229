use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use isolang::Language;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::shared::error::AppError;

/// Reachability of the processing server, as last reported by the probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "session.ts")]
pub enum ConnectionStatus {
    #[default]
    Checking,
    Connected,
    Disconnected,
}

impl ConnectionStatus {
    pub fn is_connected(self) -> bool {
        matches!(self, ConnectionStatus::Connected)
    }
}

/// Target languages offered by the processing server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "session.ts")]
pub enum LanguageCode {
    #[default]
    En,
    Fr,
    Es,
}

impl LanguageCode {
    pub const ALL: [LanguageCode; 3] = [LanguageCode::En, LanguageCode::Fr, LanguageCode::Es];

    /// ISO 639-1 code sent in the `language` part
    pub fn code(self) -> &'static str {
        match self {
            LanguageCode::En => "en",
            LanguageCode::Fr => "fr",
            LanguageCode::Es => "es",
        }
    }

    /// English display name for the language picker
    pub fn display_name(self) -> &'static str {
        Language::from_639_1(self.code())
            .map(|lang| lang.to_name())
            .unwrap_or_else(|| self.code())
    }
}

impl fmt::Display for LanguageCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for LanguageCode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim().to_ascii_lowercase();
        LanguageCode::ALL
            .into_iter()
            .find(|lang| lang.code() == code)
            .ok_or_else(|| AppError::InvalidInput(format!("Unsupported language: {}", s)))
    }
}

/// Image handed over by the acquirer
///
/// `data` is present when the picker was able to include the raw bytes;
/// otherwise the bytes are read from `uri` at submission time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedImage {
    pub uri: String,
    pub data: Option<Arc<Vec<u8>>>,
}

impl SelectedImage {
    pub fn from_uri(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            data: None,
        }
    }

    pub fn with_data(uri: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            uri: uri.into(),
            data: Some(Arc::new(data)),
        }
    }
}

/// Where the submission lifecycle currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "session.ts")]
pub enum SessionPhase {
    #[default]
    Idle,
    ImageReady,
    Submitting,
    ResultShown,
}

/// Read-only view of the session, published after every transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "session.ts")]
pub struct SessionSnapshot {
    pub connection: ConnectionStatus,
    pub phase: SessionPhase,
    pub selected_image: Option<String>,
    pub language: LanguageCode,
    pub busy: bool,
    pub translation: Option<String>,
    pub extracted_text: Option<String>,
    pub last_failure: Option<String>,
    pub connection_alert: Option<String>,
    pub can_pick_image: bool,
    pub can_submit: bool,
    pub can_change_language: bool,
}
