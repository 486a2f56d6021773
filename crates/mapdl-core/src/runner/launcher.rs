use crate::layout::{INDEX_EXT_PARAM, INDEX_EXTENSION, INDEX_FILE_PARAM, SessionLayout};
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use tracing::warn;

/// Environment the engine needs for unattended batch runs.
pub const ENGINE_ENVIRONMENT: [(&str, &str); 2] = [("ANSYS_LOCK", "OFF"), ("ANS_CONSEC", "YES")];

/// Everything needed to start the engine on a session's control script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineInvocation {
    pub executable: PathBuf,
    pub working_dir: PathBuf,
    pub script: PathBuf,
    pub log: PathBuf,
    pub index_basename: String,
}

impl EngineInvocation {
    pub fn for_layout(executable: PathBuf, layout: &SessionLayout) -> Self {
        Self {
            executable,
            working_dir: layout.working_dir().to_path_buf(),
            script: layout.script_path(),
            log: layout.engine_log_path(),
            index_basename: layout.index_basename(),
        }
    }

    pub fn args(&self) -> Vec<String> {
        vec![
            "-dir".to_string(),
            self.working_dir.display().to_string(),
            "-b".to_string(),
            "-i".to_string(),
            self.script.display().to_string(),
            "-o".to_string(),
            self.log.display().to_string(),
            format!("-{}", INDEX_FILE_PARAM),
            self.index_basename.clone(),
            format!("-{}", INDEX_EXT_PARAM),
            INDEX_EXTENSION.to_string(),
        ]
    }

    pub fn command_line(&self) -> String {
        std::iter::once(self.executable.display().to_string())
            .chain(self.args())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// A started engine, polled for liveness.
pub trait EngineProcess: Send {
    /// `Some(code)` once the process has exited.
    fn try_exit_code(&mut self) -> io::Result<Option<i32>>;

    fn id(&self) -> Option<u32>;

    /// Whether liveness can be observed at all.
    fn is_supervised(&self) -> bool {
        true
    }
}

pub trait EngineLauncher: Send {
    fn launch(&self, invocation: &EngineInvocation) -> io::Result<Box<dyn EngineProcess>>;
}

/// Spawns the engine as a child process.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemLauncher;

struct ChildProcess {
    child: Child,
}

impl EngineProcess for ChildProcess {
    fn try_exit_code(&mut self) -> io::Result<Option<i32>> {
        // Killed-by-signal has no code; report it as -1.
        Ok(self
            .child
            .try_wait()?
            .map(|status| status.code().unwrap_or(-1)))
    }

    fn id(&self) -> Option<u32> {
        Some(self.child.id())
    }
}

impl EngineLauncher for SystemLauncher {
    fn launch(&self, invocation: &EngineInvocation) -> io::Result<Box<dyn EngineProcess>> {
        if invocation.executable.as_os_str().is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                "no engine executable configured",
            ));
        }
        let console_log = File::create(invocation.working_dir.join("engine_console.log"))?;
        let child = Command::new(&invocation.executable)
            .args(invocation.args())
            .current_dir(&invocation.working_dir)
            .envs(ENGINE_ENVIRONMENT)
            .stdin(Stdio::null())
            .stdout(console_log.try_clone()?)
            .stderr(console_log)
            .spawn()?;
        Ok(Box::new(ChildProcess { child }))
    }
}

/// The operator starts the engine by hand, for example under a debugger.
/// Nothing is spawned and liveness is not observable.
#[derive(Debug, Clone, Copy, Default)]
pub struct ManualLauncher;

struct ManualProcess;

impl EngineProcess for ManualProcess {
    fn try_exit_code(&mut self) -> io::Result<Option<i32>> {
        Ok(None)
    }

    fn id(&self) -> Option<u32> {
        None
    }

    fn is_supervised(&self) -> bool {
        false
    }
}

impl EngineLauncher for ManualLauncher {
    fn launch(&self, invocation: &EngineInvocation) -> io::Result<Box<dyn EngineProcess>> {
        let environment = ENGINE_ENVIRONMENT
            .iter()
            .map(|(key, value)| format!("{}={}", key, value))
            .collect::<Vec<_>>()
            .join(" ");
        warn!(
            command = %invocation.command_line(),
            environment = %environment,
            "manual launch mode, start the engine with this command"
        );
        Ok(Box::new(ManualProcess))
    }
}
