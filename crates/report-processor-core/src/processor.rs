use std::fmt;
use std::sync::Arc;

use anyhow::Result as AnyResult;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{info, instrument};

use crate::clients::{
    AnalysisError, AnalysisInvoker, ApplicationUpdate, HttpAnalysisClient, RecordUpdater,
    SignedUrlIssuer, SupabaseRestClient, SupabaseStorageClient,
};
use crate::settings::{ProcessorSettings, DEFAULT_BUCKET};
use crate::status::ApplicationStatus;

/// Validity window of the signed report link (one hour).
pub const SIGNED_URL_TTL_SECS: u64 = 3600;

/// Opaque application identifier, kept as the JSON value the caller sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApplicationId(Value);

impl ApplicationId {
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Whether the id counts as present: not null, `""`, `0` or `false`.
    fn is_present(value: &Value) -> bool {
        match value {
            Value::Null => false,
            Value::Bool(flag) => *flag,
            Value::String(s) => !s.is_empty(),
            Value::Number(n) => n.as_f64().map_or(true, |n| n != 0.0),
            Value::Array(_) | Value::Object(_) => true,
        }
    }
}

impl From<&str> for ApplicationId {
    fn from(value: &str) -> Self {
        Self(Value::String(value.to_string()))
    }
}

impl From<Value> for ApplicationId {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Value::String(s) => f.write_str(s),
            other => write!(f, "{other}"),
        }
    }
}

/// Body posted by the database webhook: `{ "record": { ... } }`.
///
/// The record is kept as raw JSON so that a badly shaped row is reported as an
/// invalid record rather than as an unreadable body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub record: Option<Value>,
}

impl WebhookPayload {
    /// Parse a raw body. Only bytes that are not JSON fail here; any JSON
    /// without an object `record` is left for validation to reject.
    pub fn from_slice(body: &[u8]) -> Result<Self, ProcessError> {
        let body: Value = serde_json::from_slice(body)
            .map_err(|err| ProcessError::InvalidBody(err.to_string()))?;
        let record = match body {
            Value::Object(mut fields) => fields.remove("record"),
            _ => None,
        };
        Ok(Self { record })
    }
}

/// Validated trigger for one processing run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationEvent {
    pub id: ApplicationId,
    pub business_credit_report_file_path: String,
}

impl ApplicationEvent {
    pub fn new(id: impl Into<ApplicationId>, file_path: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            business_credit_report_file_path: file_path.into(),
        }
    }

    /// Require an object record with a present `id` and a non-empty string
    /// report path. Other columns are ignored.
    pub fn from_payload(payload: WebhookPayload) -> Result<Self, ProcessError> {
        let record = match payload.record {
            Some(Value::Object(record)) => record,
            _ => return Err(ProcessError::Validation),
        };
        let id = record
            .get("id")
            .filter(|id| ApplicationId::is_present(id))
            .cloned()
            .ok_or(ProcessError::Validation)?;
        let path = record
            .get("business_credit_report_file_path")
            .and_then(Value::as_str)
            .filter(|path| !path.is_empty())
            .ok_or(ProcessError::Validation)?;
        Ok(Self::new(ApplicationId(id), path))
    }
}

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedApplication {
    pub id: ApplicationId,
    pub status: ApplicationStatus,
}

/// Every way a processing run can fail. All map to the same caller-facing reply.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("Invalid application record provided in the request body.")]
    Validation,
    #[error("Request body is not valid JSON: {0}")]
    InvalidBody(String),
    #[error("{0} is not set in environment variables.")]
    Configuration(&'static str),
    #[error("{0}")]
    Storage(String),
    #[error(transparent)]
    AnalysisService(#[from] AnalysisError),
    #[error("{0}")]
    Persistence(String),
}

/// Stateless pipeline: sign the report URL, analyze it, write the verdict back.
pub struct ReportProcessor {
    issuer: Arc<dyn SignedUrlIssuer>,
    analysis: Option<Arc<dyn AnalysisInvoker>>,
    updater: Arc<dyn RecordUpdater>,
    bucket: String,
}

impl ReportProcessor {
    /// Build a processor without an analysis service; runs fail after signing.
    pub fn new(issuer: Arc<dyn SignedUrlIssuer>, updater: Arc<dyn RecordUpdater>) -> Self {
        Self {
            issuer,
            analysis: None,
            updater,
            bucket: DEFAULT_BUCKET.to_string(),
        }
    }

    pub fn with_analysis(mut self, analysis: Arc<dyn AnalysisInvoker>) -> Self {
        self.analysis = Some(analysis);
        self
    }

    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = bucket.into();
        self
    }

    /// Wire the HTTP clients described by `settings`.
    pub fn from_settings(settings: &ProcessorSettings) -> AnyResult<Self> {
        let storage = Arc::new(SupabaseStorageClient::new(settings)?);
        let rest = Arc::new(SupabaseRestClient::new(settings)?);
        let mut processor = Self::new(storage, rest).with_bucket(settings.bucket.clone());
        if let Some(url) = &settings.analysis_url {
            let analysis = HttpAnalysisClient::new(url.clone(), settings.http_timeout)?;
            processor = processor.with_analysis(Arc::new(analysis));
        }
        Ok(processor)
    }

    /// Parse and validate a raw webhook body, then process it.
    pub async fn handle_body(
        &self,
        body: &[u8],
        authorization: Option<&str>,
    ) -> Result<ProcessedApplication, ProcessError> {
        let payload = WebhookPayload::from_slice(body)?;
        let event = ApplicationEvent::from_payload(payload)?;
        self.process(&event, authorization).await
    }

    /// Run the pipeline for one event. Not idempotent: every call signs,
    /// analyzes and overwrites the record again.
    #[instrument(skip_all, fields(application_id = %event.id))]
    pub async fn process(
        &self,
        event: &ApplicationEvent,
        authorization: Option<&str>,
    ) -> Result<ProcessedApplication, ProcessError> {
        info!("Processing application ID: {}", event.id);

        let signed = self
            .issuer
            .create_signed_url(
                &self.bucket,
                &event.business_credit_report_file_path,
                SIGNED_URL_TTL_SECS,
                authorization,
            )
            .await
            .map_err(|err| ProcessError::Storage(format!("{err:#}")))?;
        info!("Successfully created signed URL for the report.");

        let analysis = self
            .analysis
            .as_ref()
            .ok_or(ProcessError::Configuration(ProcessorSettings::ANALYSIS_URL_ENV))?;
        let analysis = analysis.analyze(&signed.url).await?;
        info!(
            risk_bracket = analysis.risk_bracket.as_deref().unwrap_or_default(),
            "Received analysis from analysis service."
        );

        let status = ApplicationStatus::from_risk_bracket(analysis.risk_bracket.as_deref());
        let update = ApplicationUpdate::new(analysis, status);
        self.updater
            .update_application(&event.id, &update, authorization)
            .await
            .map_err(|err| ProcessError::Persistence(format!("{err:#}")))?;
        info!(%status, "Successfully updated application {}.", event.id);

        Ok(ProcessedApplication {
            id: event.id.clone(),
            status,
        })
    }
}
