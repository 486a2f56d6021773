use crate::domain::{SessionError, SessionResult, codes};
use crate::registry::split_model_path;
use crate::support::text::read_lines;
use std::path::{Path, PathBuf};

/// Phases of an engine iteration that accept user commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookPhase {
    Prep,
    Solution,
    Post,
}

impl HookPhase {
    pub const ALL: [Self; 3] = [Self::Prep, Self::Solution, Self::Post];

    pub const fn file_suffix(self) -> &'static str {
        match self {
            Self::Prep => "prep7",
            Self::Solution => "solution",
            Self::Post => "post",
        }
    }

    /// `<model stem>.<phase>.txt`, next to the model.
    pub fn file_beside(self, model_path: &str) -> PathBuf {
        let (stem, _) = split_model_path(model_path);
        PathBuf::from(format!("{}.{}.txt", stem, self.file_suffix()))
    }
}

/// Verbatim command lines injected into each iteration of the engine loop.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CustomizationHooks {
    pub prep: Vec<String>,
    pub solution: Vec<String>,
    pub post: Vec<String>,
}

impl CustomizationHooks {
    pub fn is_empty(&self) -> bool {
        self.prep.is_empty() && self.solution.is_empty() && self.post.is_empty()
    }

    pub fn phase(&self, phase: HookPhase) -> &[String] {
        match phase {
            HookPhase::Prep => &self.prep,
            HookPhase::Solution => &self.solution,
            HookPhase::Post => &self.post,
        }
    }

    pub fn phase_mut(&mut self, phase: HookPhase) -> &mut Vec<String> {
        match phase {
            HookPhase::Prep => &mut self.prep,
            HookPhase::Solution => &mut self.solution,
            HookPhase::Post => &mut self.post,
        }
    }

    /// Reads whichever `<stem>.prep7.txt`, `<stem>.solution.txt` and
    /// `<stem>.post.txt` files exist next to the model. Missing files leave
    /// their phase empty.
    pub fn load_beside(model_path: &str) -> SessionResult<Self> {
        let mut hooks = Self::default();
        for phase in HookPhase::ALL {
            if let Some(lines) = read_hook_file(&phase.file_beside(model_path))? {
                *hooks.phase_mut(phase) = lines;
            }
        }
        Ok(hooks)
    }
}

pub fn read_hook_file(path: &Path) -> SessionResult<Option<Vec<String>>> {
    if !path.is_file() {
        return Ok(None);
    }
    read_lines(path).map(Some).map_err(|error| {
        SessionError::io(
            codes::HOOK_READ,
            format!("failed to read hook file '{}': {}", path.display(), error),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::{CustomizationHooks, HookPhase};
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn hook_files_are_named_after_the_model_stem() {
        assert_eq!(
            HookPhase::Prep.file_beside("models/beam.db"),
            PathBuf::from("models/beam.prep7.txt")
        );
        assert_eq!(
            HookPhase::Post.file_beside("models/beam.cdb"),
            PathBuf::from("models/beam.post.txt")
        );
    }

    #[test]
    fn only_present_hook_files_are_loaded() {
        let temp = TempDir::new().expect("tempdir should be created");
        let model = temp.path().join("beam.db");
        fs::write(temp.path().join("beam.solution.txt"), "NLGEOM,ON\nSOLVE\n").expect("seed");

        let hooks = CustomizationHooks::load_beside(model.to_str().expect("utf-8 path"))
            .expect("loading should succeed");
        assert!(hooks.prep.is_empty());
        assert_eq!(hooks.solution, vec!["NLGEOM,ON".to_string(), "SOLVE".to_string()]);
        assert!(hooks.post.is_empty());
        assert!(!hooks.is_empty());
    }
}
