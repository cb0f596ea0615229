//! Submission of an image to the processing server

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Request, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::Instrument;
use url::Url;
use uuid::Uuid;

use crate::core::upload::UploadPayload;
use crate::shared::error::{AppError, AppResult};
use crate::shared::settings::ClientSettings;

const PROCESS_ROUTE: &str = "process";

/// Successful translation returned by the server
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Translation {
    pub text: String,
    pub extracted_text: Option<String>,
    pub source_language: Option<String>,
    pub target_language: Option<String>,
}

/// Exactly one of these per submission attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TranslationOutcome {
    Success(Translation),
    /// 2xx response without a usable `translated_text`
    MalformedResponse,
    ServerError { message: String },
    /// Sent, but no response arrived in time or the connection dropped
    NetworkError,
    /// The request never left the device
    ClientError { message: String },
}

impl TranslationOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, TranslationOutcome::Success(_))
    }
}

#[async_trait]
pub trait TranslationBackend: Send + Sync {
    async fn submit(&self, payload: UploadPayload) -> TranslationOutcome;
}

#[derive(Debug, Deserialize)]
struct ProcessBody {
    translated_text: Option<String>,
    extracted_text: Option<String>,
    source_language: Option<String>,
    target_language: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

pub struct TranslationClient {
    http: Client,
    endpoint: Url,
    timeout: Duration,
}

impl TranslationClient {
    pub fn new(settings: &ClientSettings) -> AppResult<Self> {
        let http = Client::builder()
            .user_agent("snap-translate/translator")
            .build()
            .map_err(|e| AppError::Config(e.to_string()))?;

        Ok(Self {
            http,
            endpoint: settings.endpoint(PROCESS_ROUTE)?,
            timeout: settings.submit_timeout(),
        })
    }

    async fn exchange(&self, request: Request) -> TranslationOutcome {
        let response = match self.http.execute(request).await {
            Ok(response) => response,
            Err(e) if e.is_builder() => {
                return TranslationOutcome::ClientError { message: e.to_string() };
            }
            Err(e) => {
                tracing::warn!(target: "snap_translate::translator", error = %e, "request failed");
                return TranslationOutcome::NetworkError;
            }
        };

        let status = response.status();
        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(target: "snap_translate::translator", %status, error = %e, "response body interrupted");
                return TranslationOutcome::NetworkError;
            }
        };

        if !status.is_success() {
            return TranslationOutcome::ServerError {
                message: server_error_message(status, &body),
            };
        }

        match serde_json::from_slice::<ProcessBody>(&body) {
            Ok(ProcessBody {
                translated_text: Some(text),
                extracted_text,
                source_language,
                target_language,
            }) if !text.trim().is_empty() => TranslationOutcome::Success(Translation {
                text,
                extracted_text,
                source_language,
                target_language,
            }),
            Ok(_) => {
                tracing::warn!(
                    target: "snap_translate::translator",
                    body = %String::from_utf8_lossy(&body),
                    "response missing translated_text"
                );
                TranslationOutcome::MalformedResponse
            }
            Err(e) => {
                tracing::warn!(target: "snap_translate::translator", error = %e, "response is not valid JSON");
                TranslationOutcome::MalformedResponse
            }
        }
    }
}

fn server_error_message(status: StatusCode, body: &[u8]) -> String {
    serde_json::from_slice::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.error)
        .filter(|msg| !msg.trim().is_empty())
        .unwrap_or_else(|| format!("Server error ({})", status.as_u16()))
}

#[async_trait]
impl TranslationBackend for TranslationClient {
    async fn submit(&self, payload: UploadPayload) -> TranslationOutcome {
        let submission_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "submission",
            %submission_id,
            language = %payload.language,
            file = %payload.file_name
        );

        async move {
            let form = match payload.into_form().await {
                Ok(form) => form,
                Err(e) => return TranslationOutcome::ClientError { message: e.to_string() },
            };

            let request = match self.http.post(self.endpoint.clone()).multipart(form).build() {
                Ok(request) => request,
                Err(e) => return TranslationOutcome::ClientError { message: e.to_string() },
            };

            tracing::info!(target: "snap_translate::translator", endpoint = %self.endpoint, "submitting image");
            let outcome = match tokio::time::timeout(self.timeout, self.exchange(request)).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    tracing::warn!(
                        target: "snap_translate::translator",
                        timeout_ms = self.timeout.as_millis() as u64,
                        "submission timed out"
                    );
                    TranslationOutcome::NetworkError
                }
            };
            tracing::info!(target: "snap_translate::translator", success = outcome.is_success(), "submission resolved");
            outcome
        }
        .instrument(span)
        .await
    }
}
