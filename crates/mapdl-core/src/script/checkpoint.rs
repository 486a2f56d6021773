/// Persist-clear-restore of engine parameters across a database reset.
///
/// `/CLEAR` and `RESUME` wipe the engine's parameter table, so anything the
/// control loop needs to survive them is written to `<stem>.<ext>` first and
/// read back afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterCheckpoint {
    stem: String,
    extension: String,
}

impl ParameterCheckpoint {
    pub fn new(stem: impl Into<String>, extension: impl Into<String>) -> Self {
        Self {
            stem: stem.into(),
            extension: extension.into(),
        }
    }

    pub fn persist(&self) -> String {
        format!("PARSAV,ALL,'{}','{}'", self.stem, self.extension)
    }

    pub fn clear_database() -> [&'static str; 2] {
        ["FINISH", "/CLEAR,NOSTART"]
    }

    /// Replaces the current parameter table.
    pub fn restore_fresh(&self) -> String {
        format!("PARRES,NEW,'{}','{}'", self.stem, self.extension)
    }

    /// Merges saved parameters over whatever the resumed database defined.
    pub fn restore_merge(&self) -> String {
        format!("PARRES,CHANGE,'{}','{}'", self.stem, self.extension)
    }
}
