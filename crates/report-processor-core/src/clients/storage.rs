use super::{authorization_header, error_message, SignedUrl, SignedUrlIssuer};
use crate::settings::ProcessorSettings;
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};

/// Signs object URLs through the Supabase Storage REST API.
#[derive(Debug, Clone)]
pub struct SupabaseStorageClient {
    http: Client,
    base_url: String,
    anon_key: String,
}

impl SupabaseStorageClient {
    pub fn new(settings: &ProcessorSettings) -> Result<Self> {
        let mut builder = Client::builder().user_agent("report-processor/0.1");
        if let Some(timeout) = settings.http_timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .context("failed to build storage HTTP client")?;
        Ok(Self {
            http,
            base_url: format!("{}/storage/v1", settings.supabase_url.trim_end_matches('/')),
            anon_key: settings.supabase_anon_key.clone(),
        })
    }
}

#[async_trait]
impl SignedUrlIssuer for SupabaseStorageClient {
    async fn create_signed_url(
        &self,
        bucket: &str,
        path: &str,
        expires_in_secs: u64,
        authorization: Option<&str>,
    ) -> Result<SignedUrl> {
        let url = format!(
            "{}/object/sign/{}",
            self.base_url,
            object_path(bucket, path)
        );
        let response = self
            .http
            .post(&url)
            .header("apikey", &self.anon_key)
            .header(
                "Authorization",
                authorization_header(authorization, &self.anon_key),
            )
            .json(&SignRequest {
                expires_in: expires_in_secs,
            })
            .send()
            .await
            .context("failed to call storage sign endpoint")?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            bail!("{}", error_message(status, &body));
        }

        let signed: SignResponse = response
            .json()
            .await
            .context("failed to parse storage sign response")?;
        let signed_path = signed
            .signed_url
            .ok_or_else(|| anyhow!("storage sign response missing signedURL"))?;

        let url = Url::parse(&format!("{}/", self.base_url))
            .and_then(|base| base.join(signed_path.trim_start_matches('/')))
            .with_context(|| format!("invalid signed URL `{signed_path}`"))?;

        Ok(SignedUrl {
            url: url.into(),
            expires_in_secs,
        })
    }
}

/// Join bucket and object path, dropping empty segments.
fn object_path(bucket: &str, path: &str) -> String {
    std::iter::once(bucket)
        .chain(path.split('/'))
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

#[derive(Serialize)]
struct SignRequest {
    #[serde(rename = "expiresIn")]
    expires_in: u64,
}

#[derive(Deserialize)]
struct SignResponse {
    #[serde(rename = "signedURL", alias = "signedUrl")]
    signed_url: Option<String>,
}
