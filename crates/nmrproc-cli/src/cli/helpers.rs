use super::CliError;
use anyhow::Context;
use nmrproc_core::config::{ProcessingConfig, load_processing_config};
use nmrproc_core::script::DatasetHeader;
use std::fs;
use std::ops::Range;
use std::path::Path;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

pub(super) fn load_config(path: Option<&Path>) -> Result<ProcessingConfig, CliError> {
    match path {
        Some(path) => {
            load_processing_config(path).map_err(|error| CliError::Processing(error.into()))
        }
        None => Ok(ProcessingConfig::default()),
    }
}

/// Installs the stderr subscriber. `RUST_LOG` overrides `fallback`.
pub(super) fn init_logging(fallback: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(fallback))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

pub(super) fn read_text(path: &Path, what: &str) -> Result<String, CliError> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read {} '{}'", what, path.display()))?;
    Ok(text)
}

pub(super) fn read_header(path: Option<&Path>) -> Result<DatasetHeader, CliError> {
    let Some(path) = path else {
        return Ok(DatasetHeader::default());
    };
    let text = read_text(path, "header")?;
    let header = serde_json::from_str(&text)
        .with_context(|| format!("failed to parse header '{}'", path.display()))?;
    Ok(header)
}

pub(super) fn parse_sizes(text: &str, flag: &str) -> Result<Vec<usize>, CliError> {
    split_list(text)
        .map(|token| {
            token.parse::<usize>().map_err(|_| {
                CliError::Usage(format!("{} value '{}' is not a non-negative integer", flag, token))
            })
        })
        .collect()
}

pub(super) fn parse_flags(text: &str, flag: &str) -> Result<Vec<bool>, CliError> {
    split_list(text)
        .map(|token| match token.to_ascii_lowercase().as_str() {
            "1" | "true" | "y" | "yes" => Ok(true),
            "0" | "false" | "n" | "no" => Ok(false),
            _ => Err(CliError::Usage(format!(
                "{} value '{}' is not a boolean",
                flag, token
            ))),
        })
        .collect()
}

/// `A..B` (end exclusive) or a single row `A`.
pub(super) fn parse_row_range(text: &str) -> Result<Range<usize>, CliError> {
    let invalid = || CliError::Usage(format!("invalid row range '{}', expected A..B", text));
    match text.split_once("..") {
        Some((start, end)) => {
            let start = start.trim().parse().map_err(|_| invalid())?;
            let end = end.trim().parse().map_err(|_| invalid())?;
            if end < start {
                return Err(invalid());
            }
            Ok(start..end)
        }
        None => {
            let row: usize = text.trim().parse().map_err(|_| invalid())?;
            let end = row.checked_add(1).ok_or_else(invalid)?;
            Ok(row..end)
        }
    }
}

fn split_list(text: &str) -> impl Iterator<Item = &str> {
    text.split(',').map(str::trim).filter(|token| !token.is_empty())
}
