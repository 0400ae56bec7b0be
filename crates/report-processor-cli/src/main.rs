mod server;

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use report_processor_core::{ApplicationStatus, ProcessorSettings, Reply, ReportProcessor};
use tokio::io::AsyncReadExt;
use tracing::error;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "report-processor",
    author,
    version,
    about = "Credit report analysis webhook"
)]
struct Cli {
    /// Settings file (TOML, YAML or JSON) keyed by environment variable names.
    /// Real environment variables take precedence.
    #[arg(long = "config", value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve the webhook over HTTP
    Serve {
        /// Address to listen on
        #[arg(long, value_name = "ADDR", default_value = "0.0.0.0:8000")]
        bind: SocketAddr,
    },
    /// Process a single webhook payload read from a file or stdin
    Process {
        /// Payload file; reads stdin when omitted
        #[arg(long, value_name = "FILE")]
        event: Option<PathBuf>,
        /// Authorization header value forwarded to storage and database
        #[arg(long)]
        authorization: Option<String>,
    },
    /// Print the status derived from a risk bracket label
    Classify { bracket: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Commands::Serve { bind } => {
            let processor = build_processor(cli.config.as_deref())?;
            server::serve(bind, Arc::new(processor)).await?;
        }
        Commands::Process {
            event,
            authorization,
        } => {
            let processor = build_processor(cli.config.as_deref())?;
            process_once(&processor, event.as_deref(), authorization.as_deref()).await?;
        }
        Commands::Classify { bracket } => {
            println!("{}", ApplicationStatus::from_risk_bracket(Some(&bracket)));
        }
    }
    Ok(())
}

fn build_processor(config: Option<&Path>) -> Result<ReportProcessor> {
    let settings = load_settings(config)?;
    ReportProcessor::from_settings(&settings)
}

/// Merge the optional settings file with the process environment.
fn load_settings(config: Option<&Path>) -> Result<ProcessorSettings> {
    let file_vars: HashMap<String, String> = match config {
        Some(path) => config::Config::builder()
            .add_source(config::File::from(path))
            .build()
            .and_then(|loaded| loaded.try_deserialize())
            .with_context(|| format!("failed to load settings from {}", path.display()))?,
        None => HashMap::new(),
    };
    ProcessorSettings::from_map(merge_vars(file_vars, std::env::vars()))
}

/// Normalize each source on its own, then let environment values replace file values.
fn merge_vars(
    file_vars: impl IntoIterator<Item = (String, String)>,
    env_vars: impl IntoIterator<Item = (String, String)>,
) -> HashMap<String, String> {
    let mut vars = ProcessorSettings::normalize_keys(file_vars);
    vars.extend(ProcessorSettings::normalize_keys(env_vars));
    vars
}

async fn process_once(
    processor: &ReportProcessor,
    event: Option<&Path>,
    authorization: Option<&str>,
) -> Result<()> {
    let body = match event {
        Some(path) => tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read payload from {}", path.display()))?,
        None => {
            let mut buf = Vec::new();
            tokio::io::stdin()
                .read_to_end(&mut buf)
                .await
                .context("failed to read payload from stdin")?;
            buf
        }
    };

    let result = processor.handle_body(&body, authorization).await;
    if let Err(err) = &result {
        error!(error = %err, "Error processing application");
    }
    let reply = Reply::from_result(&result);
    println!("{}", serde_json::to_string_pretty(&reply.to_json())?);
    if !reply.is_success() {
        bail!("application processing failed");
    }
    Ok(())
}

fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,tokio=warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn environment_overrides_file_in_any_spelling() {
        let merged = merge_vars(
            pairs(&[
                ("supabase_url", "https://file.supabase.co"),
                ("SUPABASE_ANON_KEY", "file-key"),
            ]),
            pairs(&[("supabase_url", "https://env.supabase.co")]),
        );
        assert_eq!(merged["SUPABASE_URL"], "https://env.supabase.co");
        assert_eq!(merged["SUPABASE_ANON_KEY"], "file-key");
        assert!(!merged.contains_key("supabase_url"));
    }

    #[test]
    fn exact_environment_name_beats_lower_case_duplicate() {
        let merged = merge_vars(
            pairs(&[("SUPABASE_URL", "https://file.supabase.co")]),
            pairs(&[
                ("SUPABASE_URL", "https://exact.supabase.co"),
                ("supabase_url", "https://lower.supabase.co"),
            ]),
        );
        assert_eq!(merged["SUPABASE_URL"], "https://exact.supabase.co");
    }
}
