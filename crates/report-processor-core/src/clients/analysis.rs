use super::{AnalysisError, AnalysisInvoker, AnalysisResult};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

/// Posts signed report URLs to the risk-analysis service.
#[derive(Debug, Clone)]
pub struct HttpAnalysisClient {
    http: Client,
    url: String,
}

impl HttpAnalysisClient {
    pub fn new(url: impl Into<String>, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = Client::builder().user_agent("report-processor/0.1");
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .context("failed to build analysis HTTP client")?;
        Ok(Self {
            http,
            url: url.into(),
        })
    }
}

#[async_trait]
impl AnalysisInvoker for HttpAnalysisClient {
    async fn analyze(&self, file_url: &str) -> std::result::Result<AnalysisResult, AnalysisError> {
        let response = self
            .http
            .post(&self.url)
            .json(&AnalysisRequest { file_url })
            .send()
            .await
            .map_err(|err| AnalysisError::Transport(err.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(AnalysisError::Status { status, body });
        }

        response
            .json::<AnalysisResult>()
            .await
            .map_err(|err| AnalysisError::Decode(err.to_string()))
    }
}

#[derive(Serialize)]
struct AnalysisRequest<'a> {
    file_url: &'a str,
}
