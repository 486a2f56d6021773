pub mod errors;

pub use errors::{ErrorCategory, SessionError, SessionResult};

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Stable placeholder codes carried by [`SessionError`].
pub mod codes {
    pub const SESSION_NAME: &str = "CONFIG.SESSION_NAME";
    pub const ENGINE_ENVIRONMENT: &str = "CONFIG.ENGINE_ENVIRONMENT";
    pub const DUPLICATE_INSTANCE: &str = "CONFIG.DUPLICATE_INSTANCE";
    pub const SESSION_INITIALIZED: &str = "CONFIG.SESSION_INITIALIZED";
    pub const INSTANCE_NOT_FOUND: &str = "CONFIG.INSTANCE_NOT_FOUND";
    pub const INSTANCE_LIMIT: &str = "CONFIG.INSTANCE_LIMIT";
    pub const MODEL_SOURCE: &str = "CONFIG.MODEL_SOURCE";
    pub const SCRIPT_NOT_GENERATED: &str = "CONFIG.SCRIPT_NOT_GENERATED";
    pub const SESSION_SHUT_DOWN: &str = "CONFIG.SESSION_SHUT_DOWN";

    pub const ENGINE_UNSTARTABLE: &str = "PROCESS.ENGINE_UNSTARTABLE";
    pub const ENGINE_EXITED: &str = "PROCESS.ENGINE_EXITED";
    pub const SESSION_NOT_OK: &str = "PROCESS.SESSION_NOT_OK";
    pub const SIGNAL_FAILURE: &str = "PROCESS.SIGNAL_FAILURE";

    pub const RUN_TIMEOUT: &str = "TIMEOUT.RUN";

    pub const WORKING_DIR: &str = "IO.WORKING_DIR";
    pub const SCRIPT_WRITE: &str = "IO.SCRIPT_WRITE";
    pub const INDEX_WRITE: &str = "IO.INDEX_WRITE";
    pub const INPUT_WRITE: &str = "IO.INPUT_WRITE";
    pub const SOLUTION_WRITE: &str = "IO.SOLUTION_WRITE";
    pub const CACHE_WRITE: &str = "IO.CACHE_WRITE";
    pub const HOOK_READ: &str = "IO.HOOK_READ";
    pub const COMPONENTS_READ: &str = "IO.COMPONENTS_READ";

    pub const OUTPUT_FILE: &str = "PARSE.OUTPUT_FILE";
    pub const COMPONENTS_FILE: &str = "PARSE.COMPONENTS_FILE";
    pub const CACHE_FILE: &str = "PARSE.CACHE_FILE";
}

/// Ordered engine command lines that make up one case's input.
///
/// Equality is sequence equality: the same lines in a different order are a
/// different key, since later commands can override earlier ones.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandSequence(Vec<String>);

impl CommandSequence {
    pub fn new(commands: Vec<String>) -> Self {
        Self(commands)
    }

    pub fn commands(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<String>> for CommandSequence {
    fn from(commands: Vec<String>) -> Self {
        Self(commands)
    }
}

impl FromIterator<String> for CommandSequence {
    fn from_iter<T: IntoIterator<Item = String>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesSummary {
    pub max: f64,
    pub min: f64,
    /// Plain arithmetic mean over the whole series.
    pub mean: f64,
}

impl SeriesSummary {
    pub fn of(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let mean = values.iter().sum::<f64>() / values.len() as f64;
        Some(Self { max, min, mean })
    }
}

/// One named output column, e.g. `Face1_UX_o`, with its derived aggregates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSeries {
    #[serde(rename = "fieldName")]
    pub field_name: String,
    pub values: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<SeriesSummary>,
}

impl FieldSeries {
    pub fn new(field_name: impl Into<String>, values: Vec<f64>) -> Self {
        let summary = SeriesSummary::of(&values);
        Self {
            field_name: field_name.into(),
            values,
            summary,
        }
    }
}

/// Parsed outputs of one run, memoized per command sequence.
pub type CacheEntry = Vec<FieldSeries>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandshakeOutcome {
    Ready,
    TimedOut,
}

impl HandshakeOutcome {
    pub const fn completed(self) -> bool {
        matches!(self, Self::Ready)
    }
}

impl Display for HandshakeOutcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ready => f.write_str("ready"),
            Self::TimedOut => f.write_str("timed out"),
        }
    }
}
