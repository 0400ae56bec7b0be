mod analysis;
mod rest;
mod storage;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::processor::ApplicationId;
use crate::status::ApplicationStatus;

pub use analysis::HttpAnalysisClient;
pub use rest::SupabaseRestClient;
pub use storage::SupabaseStorageClient;

/// Time-limited download link for a private stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedUrl {
    pub url: String,
    pub expires_in_secs: u64,
}

/// Fields returned by the risk-analysis service.
///
/// Everything except `risk_bracket` is opaque and copied verbatim onto the
/// application record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    #[serde(default)]
    pub risk_bracket: Option<String>,
    #[serde(default)]
    pub analysis_result: Value,
    #[serde(default)]
    pub analysis_explanation: Value,
    #[serde(default)]
    pub extracted_data: Value,
    #[serde(default)]
    pub analysis_completed_at: Value,
}

/// Column set written back onto an application record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApplicationUpdate {
    pub analysis_result: Value,
    pub risk_bracket: Option<String>,
    pub analysis_explanation: Value,
    pub extracted_data: Value,
    pub analysis_completed_at: Value,
    pub status: ApplicationStatus,
}

impl ApplicationUpdate {
    pub fn new(analysis: AnalysisResult, status: ApplicationStatus) -> Self {
        Self {
            analysis_result: analysis.analysis_result,
            risk_bracket: analysis.risk_bracket,
            analysis_explanation: analysis.analysis_explanation,
            extracted_data: analysis.extracted_data,
            analysis_completed_at: analysis.analysis_completed_at,
            status,
        }
    }
}

/// Failures reported by an [`AnalysisInvoker`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    #[error("Python API Error ({status}): {body}")]
    Status { status: u16, body: String },
    #[error("failed to call analysis service: {0}")]
    Transport(String),
    #[error("failed to parse analysis response: {0}")]
    Decode(String),
}

/// Issues signed download links for objects in a storage bucket.
#[async_trait]
pub trait SignedUrlIssuer: Send + Sync {
    /// Request a link for `path` in `bucket`, valid for `expires_in_secs`.
    ///
    /// `authorization` is the caller's credential, forwarded as-is.
    async fn create_signed_url(
        &self,
        bucket: &str,
        path: &str,
        expires_in_secs: u64,
        authorization: Option<&str>,
    ) -> Result<SignedUrl>;
}

/// Sends a stored report to the risk-analysis service.
#[async_trait]
pub trait AnalysisInvoker: Send + Sync {
    async fn analyze(&self, file_url: &str) -> std::result::Result<AnalysisResult, AnalysisError>;
}

/// Writes analysis output back onto a single application record.
#[async_trait]
pub trait RecordUpdater: Send + Sync {
    async fn update_application(
        &self,
        id: &ApplicationId,
        update: &ApplicationUpdate,
        authorization: Option<&str>,
    ) -> Result<()>;
}

/// Value for the `Authorization` header sent to Supabase services.
///
/// Falls back to the anon key when the caller did not forward a credential.
pub(crate) fn authorization_header(forwarded: Option<&str>, anon_key: &str) -> String {
    match forwarded.map(str::trim).filter(|value| !value.is_empty()) {
        Some(value) => value.to_string(),
        None => format!("Bearer {anon_key}"),
    }
}

/// Best-effort extraction of a human-readable message from a Supabase error body.
pub(crate) fn error_message(status: u16, body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        message: Option<String>,
        error: Option<String>,
    }

    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|parsed| parsed.message.or(parsed.error))
        .or_else(|| Some(body.trim().to_string()))
        .filter(|message| !message.trim().is_empty())
        .unwrap_or_else(|| format!("request failed with status {status}"))
}
