//! File names shared by the controller, the generated script and the cases.

use std::path::{Path, PathBuf};

pub const INPUT_EXTENSION: &str = "inp";
pub const SOLVE_EXTENSION: &str = "sol";
pub const POST_EXTENSION: &str = "pst";
pub const RESULT_EXTENSION: &str = "res";
pub const INDEX_EXTENSION: &str = "txt";
pub const CACHE_SUFFIX: &str = "_cache.json";

/// Parameter names the engine receives on its command line for the index file.
pub const INDEX_FILE_PARAM: &str = "SES_INSTFILE";
pub const INDEX_EXT_PARAM: &str = "SES_INSTEXT";

/// Index that tells the engine loop to stop.
pub const TERMINATE_INDEX: i32 = -1;

/// Instance names are used as engine file names, so spaces become `_`.
pub fn instance_file_stem(name: &str) -> String {
    name.replace(' ', "_")
}

/// Paths owned by one session inside its working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionLayout {
    working_dir: PathBuf,
    session_name: String,
}

impl SessionLayout {
    pub fn new(working_dir: impl Into<PathBuf>, session_name: impl Into<String>) -> Self {
        Self {
            working_dir: working_dir.into(),
            session_name: session_name.into(),
        }
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    pub fn script_path(&self) -> PathBuf {
        self.working_dir.join(format!("{}_ctl.dat", self.session_name))
    }

    pub fn engine_log_path(&self) -> PathBuf {
        self.working_dir.join(format!("{}_ctl.out", self.session_name))
    }

    pub fn index_basename(&self) -> String {
        format!("{}_inst", self.session_name)
    }

    pub fn index_path(&self) -> PathBuf {
        self.working_dir
            .join(format!("{}.{}", self.index_basename(), INDEX_EXTENSION))
    }

    pub fn instance_file(&self, instance_name: &str, extension: &str) -> PathBuf {
        self.working_dir
            .join(format!("{}.{}", instance_file_stem(instance_name), extension))
    }

    pub fn input_path(&self, instance_name: &str) -> PathBuf {
        self.instance_file(instance_name, INPUT_EXTENSION)
    }

    pub fn solve_path(&self, instance_name: &str) -> PathBuf {
        self.instance_file(instance_name, SOLVE_EXTENSION)
    }

    pub fn post_path(&self, instance_name: &str) -> PathBuf {
        self.instance_file(instance_name, POST_EXTENSION)
    }

    pub fn result_path(&self, instance_name: &str) -> PathBuf {
        self.instance_file(instance_name, RESULT_EXTENSION)
    }

    pub fn cache_path(&self, instance_name: &str) -> PathBuf {
        self.working_dir
            .join(format!("{}{}", instance_file_stem(instance_name), CACHE_SUFFIX))
    }
}

/// The index file holds one integer in a two-character field.
pub fn render_index(index: i32) -> String {
    format!("{:>2}\n", index)
}
