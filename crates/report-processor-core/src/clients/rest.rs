use super::{authorization_header, error_message, ApplicationUpdate, RecordUpdater};
use crate::processor::ApplicationId;
use crate::settings::ProcessorSettings;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;

const APPLICATIONS_TABLE: &str = "applications";

/// Updates application rows through the Supabase PostgREST endpoint.
#[derive(Debug, Clone)]
pub struct SupabaseRestClient {
    http: Client,
    table_url: String,
    anon_key: String,
}

impl SupabaseRestClient {
    pub fn new(settings: &ProcessorSettings) -> Result<Self> {
        let mut builder = Client::builder().user_agent("report-processor/0.1");
        if let Some(timeout) = settings.http_timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .context("failed to build database HTTP client")?;
        Ok(Self {
            http,
            table_url: format!(
                "{}/rest/v1/{}",
                settings.supabase_url.trim_end_matches('/'),
                APPLICATIONS_TABLE
            ),
            anon_key: settings.supabase_anon_key.clone(),
        })
    }
}

#[async_trait]
impl RecordUpdater for SupabaseRestClient {
    async fn update_application(
        &self,
        id: &ApplicationId,
        update: &ApplicationUpdate,
        authorization: Option<&str>,
    ) -> Result<()> {
        let response = self
            .http
            .patch(&self.table_url)
            .query(&[("id", format!("eq.{id}"))])
            .header("apikey", &self.anon_key)
            .header(
                "Authorization",
                authorization_header(authorization, &self.anon_key),
            )
            .header("Prefer", "return=minimal")
            .json(update)
            .send()
            .await
            .context("failed to call database update endpoint")?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            bail!("{}", error_message(status, &body));
        }
        Ok(())
    }
}
