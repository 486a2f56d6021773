use super::CliError;
use super::helpers::*;
use mapdl_core::case::AnalysisCase;
use mapdl_core::cache::ResultCache;
use mapdl_core::config::LaunchMode;
use mapdl_core::domain::{SessionError, SessionResult, codes};
use mapdl_core::layout::SessionLayout;
use mapdl_core::runner::{ControllerSettings, SessionController, manual_stop_instructions, normalize_session_name};
use mapdl_core::script::CustomizationHooks;
use mapdl_core::signal::{SignalBackend, SignalPair};
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(clap::Args)]
pub(super) struct ScriptArgs {
    /// Session configuration (JSON)
    #[arg(long)]
    config: PathBuf,

    /// Write the script here instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(clap::Args)]
pub(super) struct RunArgs {
    /// Session configuration (JSON)
    #[arg(long)]
    config: PathBuf,

    /// Only run cases whose name matches this glob
    #[arg(long)]
    only: Option<String>,
}

#[derive(clap::Args)]
pub(super) struct CacheArgs {
    /// Session configuration (JSON)
    #[arg(long)]
    config: PathBuf,

    /// Case whose cache to show
    #[arg(long)]
    case: String,
}

#[derive(clap::Args)]
pub(super) struct SignalsArgs {
    /// Session name
    #[arg(long)]
    session: String,

    /// Working directory of the session
    #[arg(long, default_value = ".")]
    working_dir: PathBuf,

    /// Signal backend
    #[arg(long, value_enum)]
    backend: Option<BackendArg>,
}

#[derive(Clone, Copy, clap::ValueEnum)]
pub(super) enum BackendArg {
    File,
    Waitfor,
}

impl From<BackendArg> for SignalBackend {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::File => Self::File,
            BackendArg::Waitfor => Self::Waitfor,
        }
    }
}

pub(super) fn run_script_command(args: ScriptArgs) -> Result<i32, CliError> {
    let LoadedConfig { config, base_dir } = load_config(&args.config)?;
    // Rendering never launches, so an unresolvable executable is not fatal here.
    let executable = config
        .resolve_executable()
        .unwrap_or_else(|_| PathBuf::from(&config.engine_version));
    let settings = ControllerSettings {
        session_name: config.session_name.clone(),
        working_dir: config.working_directory.clone(),
        executable,
        timeout: config.timeout(),
        settle_delay: config.settle_delay(),
    };
    let channel = config.signal_backend.open(settings.working_dir.clone());
    let mut controller = SessionController::new(settings, channel, LaunchMode::Manual.launcher())?;
    for case in &config.cases {
        let definition = case.to_definition(&base_dir)?;
        let registered = controller.register(&definition.name, definition.model, definition.material);
        skip_duplicate(registered, &case.name)?;
    }

    let hooks: CustomizationHooks = config.hooks.clone().into();
    write_output(args.output.as_deref(), &controller.render_script(&hooks))?;
    Ok(0)
}

pub(super) fn run_run_command(args: RunArgs) -> Result<i32, CliError> {
    let LoadedConfig { config, base_dir } = load_config(&args.config)?;
    let matcher = case_matcher(args.only.as_deref())?;
    let mut controller = config.open_controller()?;

    // Every case is registered; `--only` filters execution.
    let mut cases = Vec::new();
    for case in &config.cases {
        let definition = case.to_definition(&base_dir)?;
        let registered = AnalysisCase::register(&mut controller, definition);
        let Some(registered) = skip_duplicate(registered, &case.name)? else {
            continue;
        };
        if matcher.as_ref().is_none_or(|matcher| matcher.is_match(&case.name)) {
            cases.push(registered);
        }
    }
    if cases.is_empty() {
        warn!(session = %controller.name(), "no case selected, engine not started");
        return Ok(0);
    }

    let hooks: CustomizationHooks = config.hooks.clone().into();
    let mut reports = Vec::with_capacity(cases.len());
    let mut first_error: Option<SessionError> = None;
    for case in &mut cases {
        match case.execute_with_session_hooks(&mut controller, &hooks) {
            Ok(outcome) => {
                reports.push(CaseReport::finished(case.name(), outcome.cache_hit, &outcome.outputs));
            }
            Err(error) => {
                reports.push(CaseReport::failed(case.name(), &error));
                let fatal = error.category().is_fatal_to_session();
                first_error.get_or_insert(error);
                if fatal {
                    break;
                }
            }
        }
    }

    if let Err(error) = controller.shutdown() {
        warn!(session = %controller.name(), "{}", error.diagnostic_line());
        first_error.get_or_insert(error);
    }
    info!(session = %controller.name(), cases = reports.len(), "session finished");

    let rendered = serde_json::to_string_pretty(&reports)
        .map_err(|error| CliError::Internal(anyhow::Error::new(error)))?;
    println!("{}", rendered);
    Ok(first_error.map_or(0, |error| error.exit_code()))
}

/// A repeated case name keeps its first definition.
fn skip_duplicate<T>(registered: SessionResult<T>, case: &str) -> Result<Option<T>, CliError> {
    match registered {
        Ok(value) => Ok(Some(value)),
        Err(error) if error.is(codes::DUPLICATE_INSTANCE) => {
            warn!(case, "duplicate case skipped");
            Ok(None)
        }
        Err(error) => Err(error.into()),
    }
}

pub(super) fn run_cache_command(args: CacheArgs) -> Result<i32, CliError> {
    let LoadedConfig { config, .. } = load_config(&args.config)?;
    let session_name = normalize_session_name(&config.session_name)?;
    let layout = SessionLayout::new(config.working_directory.clone(), session_name);
    let cache = ResultCache::load(layout.cache_path(&args.case));
    println!("{}", cache.describe());
    Ok(0)
}

pub(super) fn run_signals_command(args: SignalsArgs) -> Result<i32, CliError> {
    let session_name = normalize_session_name(&args.session)?;
    let backend = args.backend.map(SignalBackend::from).unwrap_or_default();
    let channel = backend.open(args.working_dir.clone());
    let layout = SessionLayout::new(args.working_dir, session_name.clone());
    let signals = SignalPair::for_session(&session_name);

    println!("ready: {}", signals.ready);
    println!("go: {}", signals.go);
    println!(
        "stop: {}",
        manual_stop_instructions(&layout, &signals, channel.as_ref())
    );
    Ok(0)
}
