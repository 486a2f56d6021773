//! Reads the per-instance result file the engine writes after each run.

use crate::domain::{CacheEntry, FieldSeries, SessionError, SessionResult, codes};
use crate::literal::{LiteralDocument, Value};
use std::fs;
use std::path::Path;

/// Class name of the result literal.
pub const RESULT_CLASS_NAME: &str = "SessionResults";

/// Columns of each exported node row, in order.
pub const NODE_LABELS: [&str; 9] = [
    "number", "UX_o", "UY_o", "UZ_o", "UR_o", "TEMP_o", "FX_o", "FY_o", "FZ_o",
];

#[derive(Debug, Clone, PartialEq)]
pub struct NodeGroupRows {
    pub group: String,
    pub rows: Vec<Vec<f64>>,
}

/// Decoded result file.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RunOutput {
    pub labels: Vec<String>,
    pub units: Option<i64>,
    pub coordinate_system: Option<String>,
    pub groups: Vec<NodeGroupRows>,
}

impl RunOutput {
    pub fn parse(text: &str) -> SessionResult<Self> {
        let document = LiteralDocument::parse(text).map_err(|error| {
            SessionError::parse(codes::OUTPUT_FILE, format!("result file is malformed: {}", error))
        })?;

        let labels = match document.field("nodeLabels") {
            Some(value) => string_list(value).ok_or_else(|| {
                SessionError::parse(codes::OUTPUT_FILE, "'nodeLabels' must be a list of strings")
            })?,
            None => NODE_LABELS.iter().map(|label| label.to_string()).collect(),
        };

        let mut groups = Vec::new();
        if let Some(node_map) = document.field("nodeMap") {
            let entries = node_map.as_map().ok_or_else(|| {
                SessionError::parse(codes::OUTPUT_FILE, "'nodeMap' must be a mapping")
            })?;
            for (key, rows) in entries {
                let group = key.as_str().ok_or_else(|| {
                    SessionError::parse(codes::OUTPUT_FILE, "'nodeMap' keys must be group names")
                })?;
                groups.push(NodeGroupRows {
                    group: group.to_string(),
                    rows: numeric_rows(group, rows)?,
                });
            }
        }

        Ok(Self {
            labels,
            units: document.field("units").and_then(Value::as_i64),
            coordinate_system: document
                .field("coordinateSystem")
                .and_then(Value::as_str)
                .map(str::to_string),
            groups,
        })
    }

    /// One series per (group, label), named `<group>_<label>`, each with its
    /// max/min/mean. Short rows leave their missing columns out.
    pub fn field_series(&self) -> CacheEntry {
        let mut series = Vec::with_capacity(self.groups.len() * self.labels.len());
        for group in &self.groups {
            for (column, label) in self.labels.iter().enumerate() {
                let values: Vec<f64> = group
                    .rows
                    .iter()
                    .filter_map(|row| row.get(column).copied())
                    .collect();
                series.push(FieldSeries::new(format!("{}_{}", group.group, label), values));
            }
        }
        series
    }
}

fn string_list(value: &Value) -> Option<Vec<String>> {
    value
        .as_list()?
        .iter()
        .map(|item| item.as_str().map(str::to_string))
        .collect()
}

fn numeric_rows(group: &str, value: &Value) -> SessionResult<Vec<Vec<f64>>> {
    let malformed = || {
        SessionError::parse(
            codes::OUTPUT_FILE,
            format!("group '{}' must be a list of numeric rows", group),
        )
    };
    value
        .as_list()
        .ok_or_else(malformed)?
        .iter()
        .map(|row| {
            row.as_list()
                .ok_or_else(malformed)?
                .iter()
                .map(|cell| cell.as_f64().ok_or_else(malformed))
                .collect()
        })
        .collect()
}

/// Turns the engine's result file into cacheable series.
///
/// A missing or malformed file is an error; callers must not cache it.
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputCollector;

impl OutputCollector {
    pub fn try_collect(&self, path: &Path) -> SessionResult<CacheEntry> {
        let text = fs::read_to_string(path).map_err(|error| {
            SessionError::parse(
                codes::OUTPUT_FILE,
                format!("cannot read result file '{}': {}", path.display(), error),
            )
        })?;
        Ok(RunOutput::parse(&text)?.field_series())
    }
}
