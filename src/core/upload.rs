//! Multipart upload construction
//!
//! [`build`] is pure: it only looks at the image reference and the language.
//! Bytes are pulled in later by [`UploadPayload::into_form`].

use std::sync::{Arc, OnceLock};

use regex::Regex;
use reqwest::multipart::{Form, Part};
use url::Url;

use crate::core::acquirer::UriNormalization;
use crate::shared::error::{AppError, AppResult};
use crate::shared::types::{LanguageCode, SelectedImage};

pub const IMAGE_PART: &str = "image";
pub const LANGUAGE_PART: &str = "language";

/// Content type used when the extension is missing or unknown
pub const GENERIC_IMAGE_TYPE: &str = "image/*";

/// One submission's worth of upload data, built fresh every time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPayload {
    pub file_name: String,
    pub content_type: &'static str,
    /// Image reference after platform normalization
    pub source: String,
    pub data: Option<Arc<Vec<u8>>>,
    pub language: LanguageCode,
}

pub fn build(
    image: &SelectedImage,
    language: LanguageCode,
    normalization: UriNormalization,
) -> AppResult<UploadPayload> {
    let raw = image.uri.trim();
    if raw.is_empty() {
        return Err(AppError::InvalidInput("Image reference is empty".to_string()));
    }

    let source = normalization.apply(raw);
    let file_name = file_name_of(source)
        .ok_or_else(|| AppError::InvalidInput(format!("Image reference has no file name: {}", raw)))?;

    Ok(UploadPayload {
        content_type: content_type_for(&file_name),
        file_name,
        source: source.to_string(),
        data: image.data.clone(),
        language,
    })
}

/// Trailing path segment
///
/// Only non-`file` URLs have a query or fragment to drop; `?` and `#` are
/// ordinary characters in local file names.
fn file_name_of(reference: &str) -> Option<String> {
    let segment = match Url::parse(reference) {
        Ok(url) if url.scheme() != "file" => url
            .path_segments()
            .and_then(|segments| segments.last())
            .unwrap_or_default()
            .to_string(),
        _ => reference.rsplit('/').next().unwrap_or_default().to_string(),
    };

    let name = segment.trim();
    if name.is_empty() || name == "." || name == ".." {
        None
    } else {
        Some(name.to_string())
    }
}

fn content_type_for(file_name: &str) -> &'static str {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"\.(\w+)$").unwrap());

    let Some(ext) = re.captures(file_name).and_then(|caps| caps.get(1)) else {
        return GENERIC_IMAGE_TYPE;
    };

    match ext.as_str().to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "heic" => "image/heic",
        "heif" => "image/heif",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        _ => GENERIC_IMAGE_TYPE,
    }
}

impl UploadPayload {
    /// Materialize the two-part multipart form
    ///
    /// Uses the picker's bytes when present, otherwise reads `source` from disk.
    pub async fn into_form(self) -> AppResult<Form> {
        let bytes = match self.data {
            Some(data) => Arc::unwrap_or_clone(data),
            None => tokio::fs::read(&self.source).await?,
        };

        let image = Part::bytes(bytes)
            .file_name(self.file_name)
            .mime_str(self.content_type)
            .map_err(|e| AppError::InvalidInput(format!("Invalid content type: {}", e)))?;

        Ok(Form::new()
            .part(IMAGE_PART, image)
            .text(LANGUAGE_PART, self.language.code()))
    }
}
