use super::CliError;
use anyhow::Context;
use globset::{Glob, GlobMatcher};
use mapdl_core::config::SessionConfig;
use mapdl_core::domain::{CacheEntry, SessionError};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// A parsed configuration and the directory its relative paths resolve against.
#[derive(Debug, Clone)]
pub(super) struct LoadedConfig {
    pub(super) config: SessionConfig,
    pub(super) base_dir: PathBuf,
}

pub(super) fn load_config(path: &Path) -> Result<LoadedConfig, CliError> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read session config '{}'", path.display()))?;
    let mut config = SessionConfig::from_json(&text).map_err(|error| {
        CliError::Session(SessionError::configuration(
            "CONFIG.SESSION_FILE",
            format!("invalid session config '{}': {}", path.display(), error),
        ))
    })?;
    let base_dir = config_base_dir(path);
    if config.working_directory.is_relative() {
        config.working_directory = base_dir.join(&config.working_directory);
    }
    Ok(LoadedConfig { config, base_dir })
}

pub(super) fn config_base_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

pub(super) fn case_matcher(pattern: Option<&str>) -> Result<Option<GlobMatcher>, CliError> {
    pattern
        .map(|pattern| {
            Glob::new(pattern)
                .map(|glob| glob.compile_matcher())
                .map_err(|error| CliError::Usage(format!("invalid --only pattern '{}': {}", pattern, error)))
        })
        .transpose()
}

pub(super) fn write_output(output: Option<&Path>, text: &str) -> Result<(), CliError> {
    match output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
                fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create directory '{}'", parent.display()))?;
            }
            fs::write(path, text)
                .with_context(|| format!("failed to write '{}'", path.display()))?;
        }
        None => print!("{}", text),
    }
    Ok(())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct FieldSummary {
    pub(super) field: String,
    pub(super) count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) max: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) mean: Option<f64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct CaseReport {
    pub(super) case: String,
    pub(super) status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) cache_hit: Option<bool>,
    pub(super) field_count: usize,
    pub(super) fields: Vec<FieldSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) error: Option<String>,
}

impl CaseReport {
    pub(super) fn finished(case: &str, cache_hit: bool, outputs: &CacheEntry) -> Self {
        let fields: Vec<FieldSummary> = outputs
            .iter()
            .map(|series| FieldSummary {
                field: series.field_name.clone(),
                count: series.values.len(),
                max: series.summary.map(|summary| summary.max),
                min: series.summary.map(|summary| summary.min),
                mean: series.summary.map(|summary| summary.mean),
            })
            .collect();
        Self {
            case: case.to_string(),
            status: "ok",
            cache_hit: Some(cache_hit),
            field_count: fields.len(),
            fields,
            error: None,
        }
    }

    pub(super) fn failed(case: &str, error: &SessionError) -> Self {
        Self {
            case: case.to_string(),
            status: "failed",
            cache_hit: None,
            field_count: 0,
            fields: Vec::new(),
            error: Some(error.diagnostic_line()),
        }
    }
}
