//! JSON session description and engine discovery.

use crate::assembler::{DeclaredValues, NodeDeflection};
use crate::case::CaseDefinition;
use crate::components::ComponentCatalog;
use crate::domain::{SessionError, SessionResult, codes};
use crate::registry::{MaterialProperties, ModelSource};
use crate::runner::{
    ControllerSettings, EngineLauncher, ManualLauncher, SessionController, SystemLauncher,
    normalize_session_name,
};
use crate::script::CustomizationHooks;
use crate::signal::SignalBackend;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_TIMEOUT_SECONDS: u64 = 1000;
pub const DEFAULT_ENGINE_VERSION: &str = "ANSYS145";
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 1000;
/// Platform directory variable the engine installation sets.
pub const SYSTEM_DIR_VARIABLE: &str = "ANSYS_SYSDIR";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LaunchMode {
    #[default]
    Spawn,
    Manual,
}

impl LaunchMode {
    pub fn launcher(self) -> Box<dyn EngineLauncher> {
        match self {
            Self::Spawn => Box::new(SystemLauncher),
            Self::Manual => Box::new(ManualLauncher),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
    pub session_name: String,
    pub working_directory: PathBuf,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default = "default_engine_version")]
    pub engine_version: String,
    #[serde(default)]
    pub engine_executable: Option<PathBuf>,
    #[serde(default)]
    pub signal_backend: SignalBackend,
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    #[serde(default)]
    pub launch_mode: LaunchMode,
    #[serde(default)]
    pub hooks: HookConfig,
    #[serde(default)]
    pub cases: Vec<CaseConfig>,
}

fn default_timeout_seconds() -> u64 {
    DEFAULT_TIMEOUT_SECONDS
}

fn default_engine_version() -> String {
    DEFAULT_ENGINE_VERSION.to_string()
}

fn default_settle_delay_ms() -> u64 {
    DEFAULT_SETTLE_DELAY_MS
}

/// Session-wide commands embedded in the control script.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookConfig {
    #[serde(default)]
    pub prep: Vec<String>,
    #[serde(default)]
    pub solution: Vec<String>,
    #[serde(default)]
    pub post: Vec<String>,
}

impl From<HookConfig> for CustomizationHooks {
    fn from(config: HookConfig) -> Self {
        Self {
            prep: config.prep,
            solution: config.solution,
            post: config.post,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseConfig {
    pub name: String,
    pub model: ModelSource,
    #[serde(default)]
    pub material: MaterialProperties,
    /// Inline catalog; takes precedence over `components_file`.
    #[serde(default)]
    pub components: Option<ComponentCatalog>,
    #[serde(default)]
    pub components_file: Option<PathBuf>,
    #[serde(default)]
    pub values: DeclaredValues,
    #[serde(default)]
    pub deflections: Vec<NodeDeflection>,
    #[serde(default)]
    pub extra_inputs: Vec<String>,
    #[serde(default)]
    pub solve_commands: Option<Vec<String>>,
    #[serde(default)]
    pub hooks: HookConfig,
    #[serde(default = "default_load_hook_files")]
    pub load_hook_files: bool,
}

fn default_load_hook_files() -> bool {
    true
}

impl CaseConfig {
    /// Resolves the component catalog, reading `components_file` relative to
    /// `base_dir` when it is not absolute.
    pub fn to_definition(&self, base_dir: &Path) -> SessionResult<CaseDefinition> {
        let catalog = match (&self.components, &self.components_file) {
            (Some(catalog), _) => catalog.clone(),
            (None, Some(file)) => ComponentCatalog::load(&base_dir.join(file))?,
            (None, None) => ComponentCatalog::default(),
        };
        Ok(CaseDefinition {
            name: self.name.clone(),
            model: self.model.clone(),
            material: self.material,
            catalog,
            values: self.values.clone(),
            deflections: self.deflections.clone(),
            extra_inputs: self.extra_inputs.clone(),
            solve_commands: self.solve_commands.clone(),
            hooks: self.hooks.clone().into(),
            load_hook_files: self.load_hook_files,
        })
    }
}

impl SessionConfig {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn normalized_session_name(&self) -> SessionResult<String> {
        normalize_session_name(&self.session_name)
    }

    /// The explicit executable, or the one the installation's environment
    /// points at.
    pub fn resolve_executable(&self) -> SessionResult<PathBuf> {
        self.resolve_executable_with(|name| std::env::var(name).ok())
    }

    pub fn resolve_executable_with<F>(&self, lookup: F) -> SessionResult<PathBuf>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(explicit) = &self.engine_executable {
            return Ok(explicit.clone());
        }
        if self.launch_mode == LaunchMode::Manual {
            return Ok(PathBuf::from(&self.engine_version));
        }
        EngineLocation::from_lookup(&self.engine_version, lookup).map(|location| location.executable)
    }

    pub fn controller_settings(&self) -> SessionResult<ControllerSettings> {
        Ok(ControllerSettings {
            session_name: self.session_name.clone(),
            working_dir: self.working_directory.clone(),
            executable: self.resolve_executable()?,
            timeout: self.timeout(),
            settle_delay: self.settle_delay(),
        })
    }

    /// Builds the controller with this configuration's signal backend and
    /// launch mode.
    pub fn open_controller(&self) -> SessionResult<SessionController> {
        let settings = self.controller_settings()?;
        let channel = self.signal_backend.open(settings.working_dir.clone());
        SessionController::new(settings, channel, self.launch_mode.launcher())
    }
}

/// `$<VERSION>_DIR/bin/$ANSYS_SYSDIR/<VERSION>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineLocation {
    pub install_dir: PathBuf,
    pub system_dir: String,
    pub executable: PathBuf,
}

impl EngineLocation {
    pub fn from_lookup<F>(version: &str, lookup: F) -> SessionResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let install_variable = format!("{}_DIR", version);
        let install_dir = lookup(&install_variable).ok_or_else(|| missing(&install_variable))?;
        let system_dir = lookup(SYSTEM_DIR_VARIABLE).ok_or_else(|| missing(SYSTEM_DIR_VARIABLE))?;
        let install_dir = PathBuf::from(install_dir);
        let executable = install_dir.join("bin").join(&system_dir).join(version);
        Ok(Self {
            install_dir,
            system_dir,
            executable,
        })
    }
}

fn missing(variable: &str) -> SessionError {
    SessionError::configuration(
        codes::ENGINE_ENVIRONMENT,
        format!(
            "environment variable {} is not set, cannot locate the engine",
            variable
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::{CaseConfig, EngineLocation, LaunchMode, SessionConfig};
    use crate::components::GroupKind;
    use crate::domain::codes;
    use crate::registry::ModelSource;
    use crate::signal::SignalBackend;
    use std::collections::HashMap;
    use std::fs;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    const MINIMAL: &str = r#"{
        "sessionName": "rotor",
        "workingDirectory": "/tmp/rotor"
    }"#;

    #[test]
    fn minimal_config_takes_defaults() {
        let config = SessionConfig::from_json(MINIMAL).expect("config should parse");
        assert_eq!(config.timeout_seconds, 1000);
        assert_eq!(config.engine_version, "ANSYS145");
        assert_eq!(config.settle_delay_ms, 1000);
        assert_eq!(config.launch_mode, LaunchMode::Spawn);
        assert_eq!(config.signal_backend, SignalBackend::default());
        assert!(config.cases.is_empty());
    }

    #[test]
    fn cases_describe_models_values_and_components() {
        let config = SessionConfig::from_json(
            r#"{
                "sessionName": "rotor",
                "workingDirectory": "/tmp/rotor",
                "signalBackend": "file",
                "launchMode": "manual",
                "cases": [{
                    "name": "A",
                    "model": {"neutral": "models/a.cdb"},
                    "components": {"groups": [{"name": "Face1", "kind": "surface"}], "units": 1},
                    "values": {"values": {"Face1_PRESS_i": {"value": 10.0, "unit": "MPa"}}},
                    "deflections": [{"node": 12, "uz": 0.5}],
                    "extraInputs": ["/COM, hello"]
                }]
            }"#,
        )
        .expect("config should parse");

        assert_eq!(config.launch_mode, LaunchMode::Manual);
        let case = &config.cases[0];
        assert_eq!(case.model, ModelSource::Neutral("models/a.cdb".to_string()));
        assert!(case.load_hook_files);

        let definition = case.to_definition(Path::new(".")).expect("definition");
        assert_eq!(definition.catalog.groups_of(GroupKind::Surface).count(), 1);
        assert_eq!(
            definition.values.get("Face1_PRESS_i").and_then(|q| q.unit.clone()),
            Some("MPa".to_string())
        );
        assert_eq!(definition.deflections[0].uz, 0.5);
    }

    #[test]
    fn components_file_is_read_relative_to_the_config() {
        let temp = TempDir::new().expect("tempdir should be created");
        fs::write(
            temp.path().join("beam.components"),
            "self.units = 3\nself.nodeMap = {'Tip': []}\n",
        )
        .expect("seed");
        let case: CaseConfig = serde_json::from_str(
            r#"{"name": "A", "model": {"native": "beam.db"}, "componentsFile": "beam.components"}"#,
        )
        .expect("case should parse");

        let definition = case.to_definition(temp.path()).expect("definition");
        assert_eq!(definition.catalog.units, 3);
        assert_eq!(definition.catalog.groups_of(GroupKind::Node).count(), 1);
    }

    #[test]
    fn engine_location_comes_from_the_environment() {
        let env: HashMap<&str, &str> = [
            ("ANSYS145_DIR", "/ansys_inc/v145/ansys"),
            ("ANSYS_SYSDIR", "linx64"),
        ]
        .into_iter()
        .collect();
        let location = EngineLocation::from_lookup("ANSYS145", |name| {
            env.get(name).map(|value| value.to_string())
        })
        .expect("location should resolve");
        assert_eq!(
            location.executable,
            PathBuf::from("/ansys_inc/v145/ansys/bin/linx64/ANSYS145")
        );
    }

    #[test]
    fn missing_environment_is_a_configuration_error() {
        let config = SessionConfig::from_json(MINIMAL).expect("config should parse");
        let error = config
            .resolve_executable_with(|_| None)
            .expect_err("nothing set");
        assert_eq!(error.placeholder(), codes::ENGINE_ENVIRONMENT);
        assert_eq!(error.exit_code(), 2);
    }

    #[test]
    fn explicit_executable_wins() {
        let mut config = SessionConfig::from_json(MINIMAL).expect("config should parse");
        config.engine_executable = Some(PathBuf::from("/opt/engine"));
        assert_eq!(
            config.resolve_executable_with(|_| None).expect("explicit"),
            PathBuf::from("/opt/engine")
        );
    }
}
