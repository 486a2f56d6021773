use super::{SignalChannel, SignalError};
use std::process::{Command, Stdio};
use std::time::Duration;

const WAITFOR_EXE: &str = r"C:\Windows\System32\waitfor.exe";
// waitfor.exe accepts 1..=99999 seconds.
const MAX_WAIT_SECS: u64 = 99_999;

/// Windows `waitfor.exe` named signals.
#[derive(Debug, Clone)]
pub struct WaitforChannel {
    host: String,
}

impl WaitforChannel {
    pub fn new(host: impl Into<String>) -> Self {
        Self { host: host.into() }
    }

    pub fn from_env() -> Self {
        let host = std::env::var("COMPUTERNAME")
            .or_else(|_| std::env::var("HOSTNAME"))
            .unwrap_or_else(|_| "localhost".to_string());
        Self::new(host)
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    fn wait_secs(timeout: Duration) -> u64 {
        timeout.as_secs().clamp(1, MAX_WAIT_SECS)
    }
}

impl SignalChannel for WaitforChannel {
    fn raise(&self, name: &str) -> Result<(), SignalError> {
        let status = Command::new(WAITFOR_EXE)
            .args(["/S", &self.host, "/SI", name])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|source| SignalError::Spawn {
                name: name.to_string(),
                source,
            })?;
        if status.success() {
            Ok(())
        } else {
            Err(SignalError::CommandFailed {
                name: name.to_string(),
                status: status.to_string(),
            })
        }
    }

    fn await_signal(&self, name: &str, timeout: Duration) -> Result<bool, SignalError> {
        // A non-zero exit is how waitfor reports an expired wait.
        let status = Command::new(WAITFOR_EXE)
            .args(["/T", &Self::wait_secs(timeout).to_string(), name])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|source| SignalError::Spawn {
                name: name.to_string(),
                source,
            })?;
        Ok(status.success())
    }

    fn clear(&self, _name: &str) -> Result<(), SignalError> {
        // waitfor signals are not latched, nothing can be pending.
        Ok(())
    }

    fn engine_raise_command(&self, name: &str) -> String {
        format!("{} /S {} /SI {}", WAITFOR_EXE, self.host, name)
    }

    fn engine_await_command(&self, name: &str, timeout: Duration) -> String {
        format!("{} /T {} {}", WAITFOR_EXE, Self::wait_secs(timeout), name)
    }
}
