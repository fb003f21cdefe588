//! CLI runner - executes commands

use crate::cli::commands::{Cli, Commands, OutputFormat};
use crate::config::ClientConfig;
use crate::error::{Error, Result, ResultExt};
use crate::http::{ApiClient, CallContext, RequestDescriptor, RequestDescriptorBuilder};
use crate::types::{JsonValue, Method};
use crate::ItemOutcome;
use futures::StreamExt;
use serde_json::json;
use std::fs;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// CLI runner
pub struct Runner {
    cli: Cli,
    config: Option<ClientConfig>,
}

impl Runner {
    /// Create a new runner; configuration is loaded from `--config` and the environment
    pub fn new(cli: Cli) -> Self {
        Self { cli, config: None }
    }

    /// Create a runner with an already-built configuration
    pub fn with_config(cli: Cli, config: ClientConfig) -> Self {
        Self {
            cli,
            config: Some(config),
        }
    }

    /// Run the CLI command
    pub async fn run(&self) -> Result<()> {
        let config = self.load_config()?;

        match &self.cli.command {
            Commands::Get { path, query, param } => {
                let desc = build_descriptor(RequestDescriptor::get(path), query, param)?;
                let client = ApiClient::new(config)?;
                let response = client.execute(&desc).await?;
                self.emit(&response.body);
                Ok(())
            }
            Commands::List {
                path,
                query,
                param,
                items_path,
                max_items,
            } => {
                let mut builder = RequestDescriptor::get(path);
                if let Some(items_path) = items_path {
                    builder = builder.items_path(items_path);
                }
                let desc = build_descriptor(builder, query, param)?;
                self.list(config, &desc, *max_items).await
            }
            Commands::BatchWrite {
                path,
                file,
                method,
                param,
                chunk_size,
            } => {
                let method: Method = method
                    .parse()
                    .map_err(|e: String| Error::invalid_value("method", e))?;
                let desc = build_descriptor(RequestDescriptor::builder(method, path), &[], param)?;
                self.batch_write(config, &desc, file, *chunk_size).await
            }
            Commands::Config => {
                print!("{}", config.to_yaml()?);
                Ok(())
            }
        }
    }

    fn load_config(&self) -> Result<ClientConfig> {
        if let Some(config) = &self.config {
            return Ok(config.clone());
        }
        let config = match &self.cli.config {
            Some(path) => ClientConfig::from_file(path)?,
            None => ClientConfig::default(),
        };
        Ok(config.with_env())
    }

    /// Stream a collection to stdout; Ctrl-C cancels cleanly
    async fn list(
        &self,
        config: ClientConfig,
        desc: &RequestDescriptor,
        max_items: Option<usize>,
    ) -> Result<()> {
        let client = ApiClient::new(config)?;

        let token = CancellationToken::new();
        let watcher = token.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                watcher.cancel();
            }
        });

        let mut stream = client.stream_with(desc, CallContext::new().with_cancellation(token));
        let mut count = 0usize;
        while let Some(item) = stream.next().await {
            self.emit(&item?);
            count += 1;
            if max_items.is_some_and(|max| count >= max) {
                break;
            }
        }

        info!(items = count, "List finished");
        Ok(())
    }

    async fn batch_write(
        &self,
        config: ClientConfig,
        desc: &RequestDescriptor,
        file: &Path,
        chunk_size: Option<usize>,
    ) -> Result<()> {
        let contents = fs::read_to_string(file)
            .with_context(|| format!("Failed to read {}", file.display()))?;
        let items: Vec<JsonValue> = serde_json::from_str(&contents).map_err(|e| {
            Error::config(format!("{} must contain a JSON array: {e}", file.display()))
        })?;

        let client = ApiClient::new(config)?;
        let mut options = client.batch_defaults().clone();
        if let Some(size) = chunk_size {
            options = options.chunk_size(size);
        }

        let report = client
            .batch_write_with(desc, items, &options, &CallContext::default())
            .await?;

        self.emit(&json!({
            "items": report.len(),
            "chunks": report.chunk_count(),
            "succeeded": report.succeeded(),
            "rejected": report.rejected(),
            "chunk_failed": report.chunk_failed(),
        }));
        for failure in report.failures() {
            let detail = match &failure.outcome {
                ItemOutcome::Rejected { code, message } => json!({
                    "index": failure.index,
                    "outcome": "rejected",
                    "code": code,
                    "message": message,
                }),
                ItemOutcome::ChunkFailed { chunk, error } => json!({
                    "index": failure.index,
                    "outcome": "chunk_failed",
                    "chunk": chunk,
                    "message": error.to_string(),
                }),
                ItemOutcome::Succeeded(_) => continue,
            };
            self.emit(&detail);
        }

        if report.is_complete_success() {
            Ok(())
        } else {
            Err(Error::Other(format!(
                "{} of {} items were not written",
                report.len() - report.succeeded(),
                report.len()
            )))
        }
    }

    fn emit(&self, value: &JsonValue) {
        match self.cli.format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string(value).unwrap_or_default());
            }
            OutputFormat::Pretty => {
                println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
            }
        }
    }
}

/// Split `key=value`
fn parse_kv(raw: &str) -> Result<(String, String)> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(Error::invalid_value(raw, "expected KEY=VALUE")),
    }
}

fn build_descriptor(
    mut builder: RequestDescriptorBuilder,
    query: &[String],
    params: &[String],
) -> Result<RequestDescriptor> {
    for raw in query {
        let (key, value) = parse_kv(raw)?;
        builder = builder.query(key, value);
    }
    for raw in params {
        let (key, value) = parse_kv(raw)?;
        builder = builder.param(key, value);
    }
    Ok(builder.build())
}
