//! One analysis case: declared inputs in, cached or freshly computed outputs
//! out.

use crate::assembler::{AssembledInput, DeclaredValues, InputAssembler, NodeDeflection};
use crate::cache::ResultCache;
use crate::components::ComponentCatalog;
use crate::domain::{
    CacheEntry, CommandSequence, HandshakeOutcome, SessionError, SessionResult, codes,
};
use crate::layout::instance_file_stem;
use crate::output::OutputCollector;
use crate::registry::{MaterialProperties, ModelSource};
use crate::runner::SessionController;
use crate::script::{CustomizationHooks, HookPhase};
use crate::support::text::write_lines;
use crate::units::UnitSystem;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

pub const DEFAULT_SOLVE_COMMANDS: [&str; 1] = ["SOLVE"];

/// What a caller describes before the case is bound to a session.
#[derive(Debug, Clone)]
pub struct CaseDefinition {
    pub name: String,
    pub model: ModelSource,
    pub material: MaterialProperties,
    pub catalog: ComponentCatalog,
    pub values: DeclaredValues,
    pub deflections: Vec<NodeDeflection>,
    pub extra_inputs: Vec<String>,
    /// `None` keeps the default `SOLVE`, or the model's `.solution.txt`.
    pub solve_commands: Option<Vec<String>>,
    pub hooks: CustomizationHooks,
    /// Read `<stem>.prep7.txt`, `.solution.txt` and `.post.txt` next to the model.
    pub load_hook_files: bool,
}

impl CaseDefinition {
    pub fn new(name: impl Into<String>, model: ModelSource) -> Self {
        Self {
            name: name.into(),
            model,
            material: MaterialProperties::default(),
            catalog: ComponentCatalog::default(),
            values: DeclaredValues::default(),
            deflections: Vec::new(),
            extra_inputs: Vec::new(),
            solve_commands: None,
            hooks: CustomizationHooks::default(),
            load_hook_files: false,
        }
    }

    pub fn with_catalog(mut self, catalog: ComponentCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn with_values(mut self, values: DeclaredValues) -> Self {
        self.values = values;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaseOutcome {
    pub commands: CommandSequence,
    pub cache_hit: bool,
    pub outputs: CacheEntry,
}

#[derive(Debug)]
pub struct AnalysisCase {
    name: String,
    catalog: ComponentCatalog,
    unit_system: Option<UnitSystem>,
    values: DeclaredValues,
    deflections: Vec<NodeDeflection>,
    extra_inputs: Vec<String>,
    solve_commands: Vec<String>,
    hooks: CustomizationHooks,
    cache: ResultCache,
    collector: OutputCollector,
}

impl AnalysisCase {
    /// Registers the instance with `controller` and loads its cache.
    pub fn register(
        controller: &mut SessionController,
        definition: CaseDefinition,
    ) -> SessionResult<Self> {
        let CaseDefinition {
            name,
            model,
            material,
            catalog,
            values,
            deflections,
            extra_inputs,
            solve_commands,
            mut hooks,
            load_hook_files,
        } = definition;

        let mut solve_commands = solve_commands.unwrap_or_else(|| {
            DEFAULT_SOLVE_COMMANDS.iter().map(|line| line.to_string()).collect()
        });
        if load_hook_files {
            let mut from_files = CustomizationHooks::load_beside(model.path())?;
            if !from_files.solution.is_empty() {
                solve_commands = std::mem::take(&mut from_files.solution);
            }
            for phase in [HookPhase::Prep, HookPhase::Post] {
                hooks
                    .phase_mut(phase)
                    .extend(from_files.phase(phase).iter().cloned());
            }
        }

        let name = instance_file_stem(&name);
        controller.register(&name, model, material)?;
        let cache = ResultCache::load(controller.layout().cache_path(&name));

        Ok(Self {
            name,
            catalog,
            unit_system: None,
            values,
            deflections,
            extra_inputs,
            solve_commands,
            hooks,
            cache,
            collector: OutputCollector,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn catalog(&self) -> &ComponentCatalog {
        &self.catalog
    }

    pub fn values(&self) -> &DeclaredValues {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut DeclaredValues {
        &mut self.values
    }

    pub fn set_deflections(&mut self, deflections: Vec<NodeDeflection>) {
        self.deflections = deflections;
    }

    pub fn set_extra_inputs(&mut self, lines: Vec<String>) {
        self.extra_inputs = lines;
    }

    /// Overrides the unit system the catalog declares.
    pub fn set_unit_system(&mut self, unit_system: UnitSystem) {
        self.unit_system = Some(unit_system);
    }

    pub fn solve_commands(&self) -> &[String] {
        &self.solve_commands
    }

    pub fn hooks(&self) -> &CustomizationHooks {
        &self.hooks
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    pub fn build_input(&self) -> AssembledInput {
        let mut assembler = InputAssembler::new(&self.name, &self.catalog);
        if let Some(system) = &self.unit_system {
            assembler = assembler.with_unit_system(system.clone());
        }
        assembler.build(&self.values, &self.deflections, &self.extra_inputs)
    }

    /// Serves the outputs from the cache when the command sequence was seen
    /// before; otherwise runs the instance through the engine and caches the
    /// collected outputs.
    pub fn execute(&mut self, controller: &mut SessionController) -> SessionResult<CaseOutcome> {
        self.execute_with_session_hooks(controller, &CustomizationHooks::default())
    }

    /// Like [`Self::execute`]; `session_hooks` are embedded in the control
    /// script if this run is the one that initializes the session.
    pub fn execute_with_session_hooks(
        &mut self,
        controller: &mut SessionController,
        session_hooks: &CustomizationHooks,
    ) -> SessionResult<CaseOutcome> {
        let layout = controller.layout().clone();
        let input = self.build_input();
        let commands = input.commands();

        let mut input_lines = input.file_lines();
        input_lines.extend(self.hooks.prep.iter().cloned());
        write_case_file(&layout.input_path(&self.name), &input_lines, codes::INPUT_WRITE)?;
        for line in input.file_lines() {
            info!(instance = %self.name, "{}", line);
        }

        if let Some(outputs) = self.cache.lookup(&commands) {
            info!(instance = %self.name, "cache hit, engine not run");
            return Ok(CaseOutcome {
                commands,
                cache_hit: true,
                outputs: outputs.clone(),
            });
        }

        write_case_file(
            &layout.solve_path(&self.name),
            &self.solve_commands,
            codes::SOLUTION_WRITE,
        )?;
        write_case_file(&layout.post_path(&self.name), &self.hooks.post, codes::SOLUTION_WRITE)?;
        let result_path = layout.result_path(&self.name);
        remove_stale_result(&result_path);

        let outcome = controller.run(&self.name, session_hooks)?;
        if outcome == HandshakeOutcome::TimedOut {
            let error = SessionError::protocol_timeout(
                codes::RUN_TIMEOUT,
                format!(
                    "instance '{}' did not finish within {:?}",
                    self.name,
                    controller.timeout()
                ),
            );
            warn!(instance = %self.name, "{}", error.diagnostic_line());
            return Err(error);
        }

        let outputs = match self.collector.try_collect(&result_path) {
            Ok(outputs) => {
                self.cache.store(commands.clone(), outputs.clone())?;
                info!(instance = %self.name, fields = outputs.len(), "run finished and cached");
                outputs
            }
            Err(error) => {
                warn!(instance = %self.name, "{}, nothing cached", error.diagnostic_line());
                Vec::new()
            }
        };
        Ok(CaseOutcome {
            commands,
            cache_hit: false,
            outputs,
        })
    }
}

fn write_case_file(path: &Path, lines: &[String], placeholder: &'static str) -> SessionResult<()> {
    write_lines(path, lines).map_err(|error| {
        SessionError::io(
            placeholder,
            format!("cannot write '{}': {}", path.display(), error),
        )
    })
}

/// A result file left from an earlier run must not be mistaken for this one.
fn remove_stale_result(path: &Path) {
    if !path.exists() {
        return;
    }
    if let Err(error) = fs::remove_file(path) {
        warn!(path = %path.display(), %error, "cannot remove previous result file");
    }
}

#[cfg(test)]
mod tests {
    use super::{AnalysisCase, CaseDefinition};
    use crate::assembler::DeclaredValues;
    use crate::cache::ResultCache;
    use crate::components::{ComponentCatalog, GroupKind};
    use crate::domain::{CommandSequence, ErrorCategory, FieldSeries, codes};
    use crate::registry::ModelSource;
    use crate::runner::{
        ControllerSettings, EngineInvocation, EngineLauncher, EngineProcess, SessionController,
    };
    use crate::script::CustomizationHooks;
    use crate::signal::{FileSignalChannel, SignalChannel, SignalPair};
    use std::fs;
    use std::io;
    use std::path::{Path, PathBuf};
    use std::thread;
    use std::time::Duration;
    use tempfile::TempDir;

    struct IdleProcess;

    impl EngineProcess for IdleProcess {
        fn try_exit_code(&mut self) -> io::Result<Option<i32>> {
            Ok(None)
        }

        fn id(&self) -> Option<u32> {
            None
        }
    }

    struct IdleLauncher;

    impl EngineLauncher for IdleLauncher {
        fn launch(&self, _invocation: &EngineInvocation) -> io::Result<Box<dyn EngineProcess>> {
            Ok(Box::new(IdleProcess))
        }
    }

    /// Answers every go with a ready but never writes a result file.
    struct SilentEngineLauncher {
        channel: FileSignalChannel,
    }

    impl EngineLauncher for SilentEngineLauncher {
        fn launch(&self, _invocation: &EngineInvocation) -> io::Result<Box<dyn EngineProcess>> {
            let signals = SignalPair::for_session("cases");
            let channel = self.channel.clone();
            channel.raise(&signals.ready).map_err(io::Error::other)?;
            thread::spawn(move || {
                while let Ok(true) = channel.await_signal(&signals.go, Duration::from_secs(5)) {
                    if channel.raise(&signals.ready).is_err() {
                        break;
                    }
                }
            });
            Ok(Box::new(IdleProcess))
        }
    }

    fn channel(dir: &Path) -> FileSignalChannel {
        FileSignalChannel::new(dir).with_poll_interval(Duration::from_millis(5))
    }

    fn settings(dir: &Path, timeout: Duration) -> ControllerSettings {
        ControllerSettings {
            session_name: "cases".to_string(),
            working_dir: dir.to_path_buf(),
            executable: PathBuf::from("ansys145"),
            timeout,
            settle_delay: Duration::ZERO,
        }
    }

    fn controller(dir: &Path) -> SessionController {
        SessionController::new(
            settings(dir, Duration::from_millis(50)),
            Box::new(channel(dir)),
            Box::new(IdleLauncher),
        )
        .expect("controller should be created")
    }

    fn definition(name: &str) -> CaseDefinition {
        CaseDefinition::new(name, ModelSource::Native("beam.db".to_string()))
            .with_catalog(ComponentCatalog::new(1).with_group("Face1", GroupKind::Surface))
            .with_values(DeclaredValues::new().with("Face1_PRESS_i", 10.0))
    }

    #[test]
    fn cached_sequence_is_served_without_the_engine() {
        let temp = TempDir::new().expect("tempdir should be created");
        let mut controller = controller(temp.path());
        let commands = CommandSequence::new(vec!["SFA,Face1,1,PRES,10.0".to_string()]);
        ResultCache::new(controller.layout().cache_path("A"))
            .store(commands.clone(), vec![FieldSeries::new("Face1_UX_o", vec![0.5])])
            .expect("seed cache");

        let mut case = AnalysisCase::register(&mut controller, definition("A"))
            .expect("case should register");
        let outcome = case.execute(&mut controller).expect("cache hit");

        assert!(outcome.cache_hit);
        assert_eq!(outcome.commands, commands);
        assert_eq!(outcome.outputs[0].values, vec![0.5]);
        assert!(!controller.is_initialized());
        let input = fs::read_to_string(controller.layout().input_path("A")).expect("input file");
        assert_eq!(input, "! Face1_PRESS_i = 10.0 [(kg)/((m)*(s**2))]\nSFA,Face1,1,PRES,10.0\n");
    }

    #[test]
    fn timed_out_run_stores_nothing() {
        let temp = TempDir::new().expect("tempdir should be created");
        let mut controller = controller(temp.path());
        let mut case = AnalysisCase::register(&mut controller, definition("A"))
            .expect("case should register");

        let error = case.execute(&mut controller).expect_err("no engine answers");
        assert_eq!(error.category(), ErrorCategory::ProtocolTimeout);
        assert_eq!(error.placeholder(), codes::RUN_TIMEOUT);
        assert!(error.message().contains("within 50ms"));
        assert!(case.cache().is_empty());
        assert_eq!(
            fs::read_to_string(controller.layout().solve_path("A")).expect("solve file"),
            "SOLVE\n"
        );
        assert!(controller.is_ok());
    }

    #[test]
    fn solution_hook_file_replaces_default_solve() {
        let temp = TempDir::new().expect("tempdir should be created");
        let model = temp.path().join("beam.db");
        fs::write(temp.path().join("beam.solution.txt"), "NLGEOM,ON\nSOLVE\n").expect("seed");
        fs::write(temp.path().join("beam.post.txt"), "RSYS,1\n").expect("seed");
        let mut controller = controller(temp.path());

        let mut definition = CaseDefinition::new(
            "A",
            ModelSource::Native(model.to_string_lossy().into_owned()),
        );
        definition.load_hook_files = true;
        let case = AnalysisCase::register(&mut controller, definition).expect("case");

        assert_eq!(case.solve_commands(), ["NLGEOM,ON", "SOLVE"]);
        assert_eq!(case.hooks().post, vec!["RSYS,1".to_string()]);
    }

    #[test]
    fn duplicate_case_names_are_rejected() {
        let temp = TempDir::new().expect("tempdir should be created");
        let mut controller = controller(temp.path());
        AnalysisCase::register(&mut controller, definition("A")).expect("first");
        let error = AnalysisCase::register(&mut controller, definition("A")).expect_err("duplicate");
        assert_eq!(error.placeholder(), codes::DUPLICATE_INSTANCE);
    }

    #[test]
    fn late_ready_after_a_timeout_is_not_taken_as_a_result() {
        let temp = TempDir::new().expect("tempdir should be created");
        let mut controller = controller(temp.path());
        let mut case = AnalysisCase::register(&mut controller, definition("A"))
            .expect("case should register");
        case.execute(&mut controller).expect_err("first run times out");

        channel(temp.path())
            .raise(&controller.signals().ready)
            .expect("late ready");
        case.values_mut().set("Face1_PRESS_i", 20.0);
        let error = case
            .execute(&mut controller)
            .expect_err("second run has no engine either");
        assert_eq!(error.placeholder(), codes::RUN_TIMEOUT);
        assert!(case.cache().is_empty());
        assert!(
            ResultCache::load(controller.layout().cache_path("A")).is_empty(),
            "nothing should reach the cache file"
        );
    }

    #[test]
    fn missing_result_file_is_not_cached() {
        let temp = TempDir::new().expect("tempdir should be created");
        let mut controller = SessionController::new(
            settings(temp.path(), Duration::from_secs(5)),
            Box::new(channel(temp.path())),
            Box::new(SilentEngineLauncher {
                channel: channel(temp.path()),
            }),
        )
        .expect("controller should be created");
        let mut case = AnalysisCase::register(&mut controller, definition("A"))
            .expect("case should register");

        let outcome = case
            .execute_with_session_hooks(&mut controller, &CustomizationHooks::default())
            .expect("handshake completes");
        assert!(!outcome.cache_hit);
        assert!(outcome.outputs.is_empty());
        assert!(case.cache().is_empty());

        let again = case.execute(&mut controller).expect("handshake completes");
        assert!(!again.cache_hit);
        controller.shutdown().expect("shutdown");
    }

    #[test]
    fn spaced_names_share_one_stem_with_the_engine() {
        let temp = TempDir::new().expect("tempdir should be created");
        let mut controller = controller(temp.path());
        let mut case = AnalysisCase::register(&mut controller, definition("blade 1"))
            .expect("case should register");

        assert_eq!(case.name(), "blade_1");
        let script = controller.render_script(&CustomizationHooks::default());
        assert!(script.contains("SES_TBL(1,1,1)='blade_1'"));
        assert!(!script.contains("blade 1"));

        case.execute(&mut controller).expect_err("no engine answers");
        assert!(temp.path().join("blade_1.inp").is_file());
        assert!(temp.path().join("blade_1.sol").is_file());
    }
}
