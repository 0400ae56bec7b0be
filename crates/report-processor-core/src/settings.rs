use anyhow::{Context, Result};
use std::collections::HashMap;
use std::time::Duration;

/// Bucket holding uploaded credit reports unless overridden.
pub const DEFAULT_BUCKET: &str = "credit-reports";

/// Environment-driven configuration for the report processor and its clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessorSettings {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub analysis_url: Option<String>,
    pub bucket: String,
    pub http_timeout: Option<Duration>,
}

impl ProcessorSettings {
    pub const SUPABASE_URL_ENV: &'static str = "SUPABASE_URL";
    pub const SUPABASE_ANON_KEY_ENV: &'static str = "SUPABASE_ANON_KEY";
    pub const ANALYSIS_URL_ENV: &'static str = "PYTHON_API_URL";
    pub const BUCKET_ENV: &'static str = "REPORT_PROCESSOR_BUCKET";
    pub const HTTP_TIMEOUT_ENV: &'static str = "REPORT_PROCESSOR_HTTP_TIMEOUT";

    /// Load settings from environment variables.
    ///
    /// * `SUPABASE_URL` / `SUPABASE_ANON_KEY` (required).
    /// * `PYTHON_API_URL` (optional; requests fail once they reach the analysis step).
    /// * `REPORT_PROCESSOR_BUCKET` (default: `credit-reports`).
    /// * `REPORT_PROCESSOR_HTTP_TIMEOUT` (optional, e.g. `30s`).
    pub fn from_env() -> Result<Self> {
        Self::from_map(std::env::vars().collect())
    }

    /// Upper-case variable names. When two names differ only in case, the one
    /// already written in upper case wins, whatever the iteration order.
    pub fn normalize_keys(
        vars: impl IntoIterator<Item = (String, String)>,
    ) -> HashMap<String, String> {
        let mut normalized = HashMap::new();
        for (key, value) in vars {
            let upper = key.to_ascii_uppercase();
            if upper == key {
                normalized.insert(upper, value);
            } else {
                normalized.entry(upper).or_insert(value);
            }
        }
        normalized
    }

    /// Build settings from a variable map. Keys are matched case-insensitively.
    pub fn from_map(vars: HashMap<String, String>) -> Result<Self> {
        let vars = Self::normalize_keys(vars);
        let non_empty = |key: &str| {
            vars.get(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let supabase_url = non_empty(Self::SUPABASE_URL_ENV)
            .with_context(|| format!("{} must be set", Self::SUPABASE_URL_ENV))?
            .trim_end_matches('/')
            .to_string();
        let supabase_anon_key = non_empty(Self::SUPABASE_ANON_KEY_ENV)
            .with_context(|| format!("{} must be set", Self::SUPABASE_ANON_KEY_ENV))?;
        let analysis_url = non_empty(Self::ANALYSIS_URL_ENV);
        let bucket = non_empty(Self::BUCKET_ENV).unwrap_or_else(|| DEFAULT_BUCKET.to_string());
        let http_timeout = non_empty(Self::HTTP_TIMEOUT_ENV)
            .map(|raw| {
                humantime::parse_duration(&raw).with_context(|| {
                    format!("invalid {} value `{raw}`", Self::HTTP_TIMEOUT_ENV)
                })
            })
            .transpose()?;

        Ok(Self {
            supabase_url,
            supabase_anon_key,
            analysis_url,
            bucket,
            http_timeout,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use once_cell::sync::Lazy;
    use std::env;
    use std::sync::Mutex;

    static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn applies_defaults() {
        let settings = ProcessorSettings::from_map(vars(&[
            ("SUPABASE_URL", "https://project.supabase.co/"),
            ("SUPABASE_ANON_KEY", "anon"),
        ]))
        .expect("should load settings");
        assert_eq!(settings.supabase_url, "https://project.supabase.co");
        assert_eq!(settings.supabase_anon_key, "anon");
        assert!(settings.analysis_url.is_none());
        assert_eq!(settings.bucket, DEFAULT_BUCKET);
        assert!(settings.http_timeout.is_none());
    }

    #[test]
    fn errors_name_the_missing_variable() {
        let err = ProcessorSettings::from_map(vars(&[("SUPABASE_ANON_KEY", "anon")]))
            .expect_err("missing url should error");
        assert!(err.to_string().contains("SUPABASE_URL"));

        let err = ProcessorSettings::from_map(vars(&[
            ("SUPABASE_URL", "https://project.supabase.co"),
            ("SUPABASE_ANON_KEY", "   "),
        ]))
        .expect_err("blank key should error");
        assert!(err.to_string().contains("SUPABASE_ANON_KEY"));
    }

    #[test]
    fn parses_timeout_and_overrides() {
        let settings = ProcessorSettings::from_map(vars(&[
            ("supabase_url", "https://project.supabase.co"),
            ("supabase_anon_key", "anon"),
            ("python_api_url", "https://analysis.internal/process-report/"),
            ("REPORT_PROCESSOR_BUCKET", "archive"),
            ("REPORT_PROCESSOR_HTTP_TIMEOUT", "1m 30s"),
        ]))
        .expect("should parse settings");
        assert_eq!(
            settings.analysis_url.as_deref(),
            Some("https://analysis.internal/process-report/")
        );
        assert_eq!(settings.bucket, "archive");
        assert_eq!(settings.http_timeout, Some(Duration::from_secs(90)));
    }

    #[test]
    fn upper_case_name_wins_over_other_spellings() {
        let exact_first = ProcessorSettings::normalize_keys([
            ("SUPABASE_URL".to_string(), "https://exact".to_string()),
            ("supabase_url".to_string(), "https://lower".to_string()),
        ]);
        let exact_last = ProcessorSettings::normalize_keys([
            ("supabase_url".to_string(), "https://lower".to_string()),
            ("SUPABASE_URL".to_string(), "https://exact".to_string()),
        ]);
        assert_eq!(exact_first["SUPABASE_URL"], "https://exact");
        assert_eq!(exact_last["SUPABASE_URL"], "https://exact");

        let settings = ProcessorSettings::from_map(vars(&[
            ("supabase_url", "https://lower.supabase.co"),
            ("SUPABASE_URL", "https://exact.supabase.co"),
            ("SUPABASE_ANON_KEY", "anon"),
        ]))
        .expect("should load settings");
        assert_eq!(settings.supabase_url, "https://exact.supabase.co");
    }

    #[test]
    fn rejects_unparseable_timeout() {
        let err = ProcessorSettings::from_map(vars(&[
            ("SUPABASE_URL", "https://project.supabase.co"),
            ("SUPABASE_ANON_KEY", "anon"),
            ("REPORT_PROCESSOR_HTTP_TIMEOUT", "soon"),
        ]))
        .expect_err("timeout should fail to parse");
        assert!(err.to_string().contains("REPORT_PROCESSOR_HTTP_TIMEOUT"));
    }

    #[test]
    fn loads_from_process_environment() {
        let _guard = ENV_LOCK.lock().unwrap();
        env::set_var(ProcessorSettings::SUPABASE_URL_ENV, "https://env.supabase.co");
        env::set_var(ProcessorSettings::SUPABASE_ANON_KEY_ENV, "env-key");
        env::remove_var(ProcessorSettings::ANALYSIS_URL_ENV);
        env::remove_var(ProcessorSettings::HTTP_TIMEOUT_ENV);

        let settings = ProcessorSettings::from_env().expect("should load from env");
        assert_eq!(settings.supabase_url, "https://env.supabase.co");
        assert_eq!(settings.supabase_anon_key, "env-key");
        assert!(settings.analysis_url.is_none());

        env::remove_var(ProcessorSettings::SUPABASE_URL_ENV);
        env::remove_var(ProcessorSettings::SUPABASE_ANON_KEY_ENV);
    }
}
