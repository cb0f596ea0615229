//! Image acquisition seam
//!
//! The photo picker and its permission prompt belong to the platform shell.
//! The session only consumes their results through [`ImageAcquirer`].

use std::path::PathBuf;

use async_trait::async_trait;

use crate::shared::error::{AppError, AppResult};

const FILE_SCHEME: &str = "file://";

/// Options passed to the platform picker
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PickerOptions {
    pub allow_editing: bool,
    /// 0.0..=1.0, 1.0 keeps the original quality
    pub quality: f32,
    pub include_bytes: bool,
}

impl Default for PickerOptions {
    fn default() -> Self {
        Self {
            allow_editing: true,
            quality: 1.0,
            include_bytes: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickedAsset {
    pub uri: String,
    pub bytes: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PickResult {
    Canceled,
    Picked(PickedAsset),
}

/// How a platform's picker URIs must be rewritten before the file is read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UriNormalization {
    #[default]
    Passthrough,
    /// Drop a leading `file://`
    StripFileScheme,
}

impl UriNormalization {
    pub fn apply(self, uri: &str) -> &str {
        match self {
            UriNormalization::Passthrough => uri,
            UriNormalization::StripFileScheme => uri.strip_prefix(FILE_SCHEME).unwrap_or(uri),
        }
    }
}

#[async_trait]
pub trait ImageAcquirer: Send + Sync {
    async fn request_permission(&self) -> bool;

    async fn launch_picker(&self, options: PickerOptions) -> AppResult<PickResult>;

    fn uri_normalization(&self) -> UriNormalization;
}

/// Acquirer backed by a file already on disk
///
/// Used by the headless driver: permission is implicit and the "picker"
/// always returns the configured path.
pub struct FileAcquirer {
    path: PathBuf,
}

impl FileAcquirer {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ImageAcquirer for FileAcquirer {
    async fn request_permission(&self) -> bool {
        true
    }

    async fn launch_picker(&self, options: PickerOptions) -> AppResult<PickResult> {
        let path = tokio::fs::canonicalize(&self.path)
            .await
            .map_err(|e| AppError::InvalidInput(format!("{}: {}", self.path.display(), e)))?;

        let bytes = if options.include_bytes {
            Some(tokio::fs::read(&path).await?)
        } else {
            None
        };

        Ok(PickResult::Picked(PickedAsset {
            uri: format!("{}{}", FILE_SCHEME, path.display()),
            bytes,
        }))
    }

    fn uri_normalization(&self) -> UriNormalization {
        UriNormalization::StripFileScheme
    }
}
