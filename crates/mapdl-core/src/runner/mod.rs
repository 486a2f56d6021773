//! Lifecycle of the one engine process behind a session.
//!
//! The controller owns the instance registry, the signal pair and the engine
//! process. It launches the engine on a generated control script and then
//! drives it through ready/go handshakes, one instance per run.

mod launcher;

pub use launcher::{
    ENGINE_ENVIRONMENT, EngineInvocation, EngineLauncher, EngineProcess, ManualLauncher,
    SystemLauncher,
};

use crate::domain::{HandshakeOutcome, SessionError, SessionResult, codes};
use crate::layout::{SessionLayout, TERMINATE_INDEX, render_index};
use crate::registry::{InstanceRegistry, MaterialProperties, ModelSource};
use crate::script::{CustomizationHooks, ScriptContext, generate_script};
use crate::signal::{SignalChannel, SignalError, SignalPair};
use crate::support::text::write_text_file;
use std::fmt::{Display, Formatter};
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Session names feed file and signal names, which the engine truncates.
pub const MAX_SESSION_NAME_LEN: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Created,
    Launched,
    Initialized,
    ShutDown,
}

impl Display for SessionState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Self::Created => "created",
            Self::Launched => "launched",
            Self::Initialized => "initialized",
            Self::ShutDown => "shut down",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerSettings {
    pub session_name: String,
    pub working_dir: PathBuf,
    pub executable: PathBuf,
    pub timeout: Duration,
    /// Pause between writing the index file and raising go.
    pub settle_delay: Duration,
}

/// Removes spaces and enforces the length limit.
pub fn normalize_session_name(name: &str) -> SessionResult<String> {
    let normalized: String = name.chars().filter(|ch| *ch != ' ').collect();
    if normalized.is_empty() {
        return Err(SessionError::configuration(
            codes::SESSION_NAME,
            "session name must not be empty",
        ));
    }
    if normalized.chars().count() > MAX_SESSION_NAME_LEN {
        return Err(SessionError::configuration(
            codes::SESSION_NAME,
            format!(
                "session name '{}' is longer than {} characters",
                normalized, MAX_SESSION_NAME_LEN
            ),
        ));
    }
    Ok(normalized)
}

/// How to stop a running engine by hand.
pub fn manual_stop_instructions(
    layout: &SessionLayout,
    signals: &SignalPair,
    channel: &dyn SignalChannel,
) -> String {
    format!(
        "write {} to {}, then run: {}",
        TERMINATE_INDEX,
        layout.index_path().display(),
        channel.engine_raise_command(&signals.go)
    )
}

fn signal_failure(session: &str, error: SignalError) -> SessionError {
    SessionError::process(
        codes::SIGNAL_FAILURE,
        format!("session '{}': {}", session, error),
    )
}

pub struct SessionController {
    name: String,
    layout: SessionLayout,
    executable: PathBuf,
    timeout: Duration,
    settle_delay: Duration,
    registry: InstanceRegistry,
    signals: SignalPair,
    channel: Box<dyn SignalChannel>,
    launcher: Box<dyn EngineLauncher>,
    process: Option<Box<dyn EngineProcess>>,
    state: SessionState,
    ok: bool,
    /// The engine has not answered the last go yet.
    pending_ready: bool,
}

impl SessionController {
    /// Validates the name and creates the working directory. Nothing is
    /// launched yet.
    pub fn new(
        settings: ControllerSettings,
        channel: Box<dyn SignalChannel>,
        launcher: Box<dyn EngineLauncher>,
    ) -> SessionResult<Self> {
        let name = normalize_session_name(&settings.session_name)?;
        fs::create_dir_all(&settings.working_dir).map_err(|error| {
            SessionError::io(
                codes::WORKING_DIR,
                format!(
                    "cannot create working directory '{}': {}",
                    settings.working_dir.display(),
                    error
                ),
            )
        })?;

        let layout = SessionLayout::new(settings.working_dir, name.clone());
        let signals = SignalPair::for_session(&name);
        warn!(
            session = %name,
            "to stop the engine by hand, {}",
            manual_stop_instructions(&layout, &signals, channel.as_ref())
        );

        Ok(Self {
            name,
            layout,
            executable: settings.executable,
            timeout: settings.timeout,
            settle_delay: settings.settle_delay,
            registry: InstanceRegistry::new(),
            signals,
            channel,
            launcher,
            process: None,
            state: SessionState::Created,
            ok: true,
            pending_ready: false,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn layout(&self) -> &SessionLayout {
        &self.layout
    }

    pub fn signals(&self) -> &SignalPair {
        &self.signals
    }

    pub fn channel(&self) -> &dyn SignalChannel {
        self.channel.as_ref()
    }

    pub fn registry(&self) -> &InstanceRegistry {
        &self.registry
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn is_ok(&self) -> bool {
        self.ok
    }

    pub fn is_initialized(&self) -> bool {
        self.state == SessionState::Initialized
    }

    pub fn register(
        &mut self,
        instance: &str,
        model: ModelSource,
        material: MaterialProperties,
    ) -> SessionResult<usize> {
        match self.registry.register(instance, model, material) {
            Ok(index) => {
                info!(session = %self.name, instance, index, "instance registered");
                Ok(index)
            }
            Err(error) => {
                warn!(session = %self.name, instance, "{}", error.diagnostic_line());
                Err(error)
            }
        }
    }

    /// Renders the control script without touching the filesystem.
    pub fn render_script(&self, hooks: &CustomizationHooks) -> String {
        generate_script(&ScriptContext {
            session_name: &self.name,
            registry: &self.registry,
            signals: &self.signals,
            channel: self.channel.as_ref(),
            timeout: self.timeout,
            hooks,
        })
    }

    pub fn write_script(&self, hooks: &CustomizationHooks) -> SessionResult<PathBuf> {
        let path = self.layout.script_path();
        write_text_file(&path, &self.render_script(hooks)).map_err(|error| {
            SessionError::io(
                codes::SCRIPT_WRITE,
                format!("cannot write control script '{}': {}", path.display(), error),
            )
        })?;
        debug!(session = %self.name, path = %path.display(), "control script written");
        Ok(path)
    }

    /// Starts the engine on the already written control script.
    pub fn launch(&mut self) -> SessionResult<()> {
        self.ensure_ok()?;
        self.ensure_not_shut_down()?;
        if self.state != SessionState::Created {
            debug!(session = %self.name, state = %self.state, "engine already launched");
            return Ok(());
        }
        let script = self.layout.script_path();
        if !script.is_file() {
            return Err(SessionError::configuration(
                codes::SCRIPT_NOT_GENERATED,
                format!("control script '{}' has not been written", script.display()),
            ));
        }

        let invocation = EngineInvocation::for_layout(self.executable.clone(), &self.layout);
        debug!(session = %self.name, command = %invocation.command_line(), "launching engine");
        match self.launcher.launch(&invocation) {
            Ok(process) => {
                info!(session = %self.name, pid = ?process.id(), "engine launched");
                self.process = Some(process);
                self.state = SessionState::Launched;
                Ok(())
            }
            Err(source) => {
                self.ok = false;
                let error = SessionError::process(
                    codes::ENGINE_UNSTARTABLE,
                    format!(
                        "cannot start engine '{}': {}",
                        self.executable.display(),
                        source
                    ),
                );
                error!(session = %self.name, "{}", error.diagnostic_line());
                Err(error)
            }
        }
    }

    /// Writes the script, launches the engine and waits for its first ready
    /// signal. A second call only logs a warning.
    pub fn initialize(&mut self, hooks: &CustomizationHooks) -> SessionResult<HandshakeOutcome> {
        self.ensure_ok()?;
        self.ensure_not_shut_down()?;
        if self.state == SessionState::Initialized {
            warn!(session = %self.name, "session already initialized, ignored");
            return Ok(HandshakeOutcome::Ready);
        }

        if let Err(error) = self.write_script(hooks) {
            self.ok = false;
            error!(session = %self.name, "{}", error.diagnostic_line());
            return Err(error);
        }
        self.registry.freeze();
        self.clear_stale_signals()?;
        self.launch()?;
        self.check_liveness()?;
        self.state = SessionState::Initialized;

        let outcome = self.await_ready()?;
        info!(session = %self.name, instances = self.registry.len(), %outcome, "session initialized");
        Ok(outcome)
    }

    /// Runs one registered instance through a full engine iteration.
    pub fn run(
        &mut self,
        instance: &str,
        hooks: &CustomizationHooks,
    ) -> SessionResult<HandshakeOutcome> {
        self.ensure_ok()?;
        self.ensure_not_shut_down()?;
        let index = self.registry.get(instance)?.index();

        if self.state != SessionState::Initialized {
            let outcome = self.initialize(hooks)?;
            if !outcome.completed() {
                return Ok(outcome);
            }
        }

        self.check_liveness()?;
        if self.pending_ready {
            // A late ready from the previous iteration must not answer this one.
            debug!(session = %self.name, instance, "waiting for the previous iteration to finish");
            let outcome = self.await_ready()?;
            if !outcome.completed() {
                return Ok(outcome);
            }
        }
        info!(session = %self.name, instance, index, "running instance");
        self.send_index(index as i32)?;
        let outcome = self.await_ready()?;
        debug!(session = %self.name, instance, %outcome, "run handshake finished");
        Ok(outcome)
    }

    /// Tells the engine loop to stop. Safe to call more than once.
    pub fn shutdown(&mut self) -> SessionResult<()> {
        if self.state == SessionState::ShutDown {
            debug!(session = %self.name, "session already shut down");
            return Ok(());
        }
        let was_running = matches!(self.state, SessionState::Launched | SessionState::Initialized);
        self.state = SessionState::ShutDown;
        if was_running && self.ok {
            self.send_index(TERMINATE_INDEX)?;
        }
        info!(session = %self.name, "session shut down");
        Ok(())
    }

    /// Polls the engine process. An exit before shutdown poisons the session.
    pub fn check_liveness(&mut self) -> SessionResult<()> {
        self.ensure_ok()?;
        if self.state == SessionState::ShutDown {
            return Ok(());
        }
        let Some(process) = self.process.as_mut() else {
            return Ok(());
        };
        let exit_code = process.try_exit_code().map_err(|source| {
            SessionError::process(
                codes::ENGINE_EXITED,
                format!("cannot poll engine process: {}", source),
            )
        });
        match exit_code {
            Ok(None) => Ok(()),
            Ok(Some(code)) => {
                self.ok = false;
                let error = SessionError::process(
                    codes::ENGINE_EXITED,
                    format!(
                        "engine exited with code {} (probably licensing), see '{}'",
                        code,
                        self.layout.engine_log_path().display()
                    ),
                );
                error!(session = %self.name, "{}", error.diagnostic_line());
                Err(error)
            }
            Err(error) => {
                self.ok = false;
                error!(session = %self.name, "{}", error.diagnostic_line());
                Err(error)
            }
        }
    }

    pub fn describe(&self) -> String {
        let mut out = format!("SessionController {}", self.name);
        out.push_str(&format!("\nstate {}", self.state));
        out.push_str(&format!("\nok {}", self.ok));
        out.push_str(&format!("\nworking directory {}", self.layout.working_dir().display()));
        out.push_str(&format!("\nscript {}", self.layout.script_path().display()));
        out.push_str(&format!("\nindex file {}", self.layout.index_path().display()));
        out.push_str(&format!("\nexecutable {}", self.executable.display()));
        out.push_str(&format!("\ntimeout {:?}", self.timeout));
        out.push_str(&format!("\nawaiting ready {}", self.pending_ready));
        out.push_str(&format!(
            "\nsignals ready={} go={}",
            self.signals.ready, self.signals.go
        ));
        for instance in self.registry.instances() {
            out.push('\n');
            out.push_str(&instance.describe().replace('\n', "\n   "));
        }
        out
    }

    fn ensure_ok(&self) -> SessionResult<()> {
        if self.ok {
            return Ok(());
        }
        Err(self.refuse(SessionError::process(
            codes::SESSION_NOT_OK,
            format!("session '{}' is not ok, operation refused", self.name),
        )))
    }

    fn ensure_not_shut_down(&self) -> SessionResult<()> {
        if self.state != SessionState::ShutDown {
            return Ok(());
        }
        Err(self.refuse(SessionError::configuration(
            codes::SESSION_SHUT_DOWN,
            format!("session '{}' has been shut down", self.name),
        )))
    }

    fn refuse(&self, error: SessionError) -> SessionError {
        warn!(session = %self.name, "{}\n{}", error.diagnostic_line(), self.describe());
        error
    }

    fn clear_stale_signals(&self) -> SessionResult<()> {
        for name in [&self.signals.ready, &self.signals.go] {
            self.channel
                .clear(name)
                .map_err(|error| signal_failure(&self.name, error))?;
        }
        Ok(())
    }

    fn send_index(&self, index: i32) -> SessionResult<()> {
        write_index_file(&self.layout.index_path(), index)?;
        thread::sleep(self.settle_delay);
        self.channel
            .raise(&self.signals.go)
            .map_err(|error| signal_failure(&self.name, error))?;
        debug!(session = %self.name, index, signal = %self.signals.go, "go raised");
        Ok(())
    }

    fn await_ready(&mut self) -> SessionResult<HandshakeOutcome> {
        debug!(session = %self.name, signal = %self.signals.ready, "waiting for ready");
        let received = self
            .channel
            .await_signal(&self.signals.ready, self.timeout)
            .map_err(|error| signal_failure(&self.name, error))?;
        self.pending_ready = !received;
        if received {
            return Ok(HandshakeOutcome::Ready);
        }
        warn!(
            session = %self.name,
            timeout = ?self.timeout,
            "no ready signal within the timeout, the engine may still be working"
        );
        Ok(HandshakeOutcome::TimedOut)
    }
}

fn write_index_file(path: &Path, index: i32) -> SessionResult<()> {
    fs::write(path, render_index(index)).map_err(|error| {
        SessionError::io(
            codes::INDEX_WRITE,
            format!("cannot write index file '{}': {}", path.display(), error),
        )
    })
}
