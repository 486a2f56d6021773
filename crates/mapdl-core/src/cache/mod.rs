//! Per-instance memo of run outputs keyed by the exact command sequence.

use crate::domain::{CacheEntry, CommandSequence, SessionError, SessionResult, codes};
use crate::support::text::write_text_file_replacing;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Values shown per series by [`ResultCache::describe`].
const DESCRIBE_PREVIEW: usize = 10;

#[derive(Debug, Serialize, Deserialize)]
struct StoredRecord {
    commands: CommandSequence,
    outputs: CacheEntry,
}

#[derive(Debug, Clone)]
pub struct ResultCache {
    path: PathBuf,
    entries: BTreeMap<CommandSequence, CacheEntry>,
}

impl ResultCache {
    /// An empty cache that will persist to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: BTreeMap::new(),
        }
    }

    /// Loads `path` if it exists. An unreadable or malformed file is logged
    /// and replaced by an empty cache on the next store.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let mut cache = Self::new(path);
        match cache.read_entries() {
            Ok(entries) => cache.entries = entries,
            Err(error) => warn!(path = %cache.path.display(), %error, "starting with an empty cache"),
        }
        debug!(path = %cache.path.display(), entries = cache.entries.len(), "cache loaded");
        cache
    }

    fn read_entries(&self) -> SessionResult<BTreeMap<CommandSequence, CacheEntry>> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(error) => {
                return Err(SessionError::parse(
                    codes::CACHE_FILE,
                    format!("cannot read cache '{}': {}", self.path.display(), error),
                ));
            }
        };
        let records: Vec<StoredRecord> = serde_json::from_str(&text).map_err(|error| {
            SessionError::parse(
                codes::CACHE_FILE,
                format!("cache '{}' is malformed: {}", self.path.display(), error),
            )
        })?;
        Ok(records
            .into_iter()
            .map(|record| (record.commands, record.outputs))
            .collect())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn lookup(&self, commands: &CommandSequence) -> Option<&CacheEntry> {
        self.entries.get(commands)
    }

    /// Inserts the entry and rewrites the whole cache file.
    pub fn store(&mut self, commands: CommandSequence, outputs: CacheEntry) -> SessionResult<()> {
        self.entries.insert(commands, outputs);
        self.persist()
    }

    fn persist(&self) -> SessionResult<()> {
        let records: Vec<StoredRecord> = self
            .entries
            .iter()
            .map(|(commands, outputs)| StoredRecord {
                commands: commands.clone(),
                outputs: outputs.clone(),
            })
            .collect();
        let json = serde_json::to_string_pretty(&records).map_err(|error| {
            SessionError::io(codes::CACHE_WRITE, format!("cannot encode cache: {}", error))
        })?;
        write_text_file_replacing(&self.path, &json).map_err(|error| {
            SessionError::io(
                codes::CACHE_WRITE,
                format!("cannot write cache '{}': {}", self.path.display(), error),
            )
        })
    }

    pub fn describe(&self) -> String {
        let mut out = format!("Cache {} ({} entries)", self.path.display(), self.entries.len());
        for (position, (commands, outputs)) in self.entries.iter().enumerate() {
            out.push_str(&format!("\n[{}] commands:", position));
            for command in commands.commands() {
                out.push_str(&format!("\n      {}", command));
            }
            for series in outputs {
                let preview: Vec<String> = series
                    .values
                    .iter()
                    .take(DESCRIBE_PREVIEW)
                    .map(|value| value.to_string())
                    .collect();
                let ellipsis = if series.values.len() > DESCRIBE_PREVIEW { ", ..." } else { "" };
                out.push_str(&format!(
                    "\n   {} = [{}{}]",
                    series.field_name,
                    preview.join(", "),
                    ellipsis
                ));
            }
        }
        out
    }
}
