use std::error::Error;
use std::fmt::{Display, Formatter};

pub type SessionResult<T> = Result<T, SessionError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Configuration,
    Process,
    ProtocolTimeout,
    Io,
    Parse,
}

impl ErrorCategory {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Configuration => "ConfigurationError",
            Self::Process => "ProcessError",
            Self::ProtocolTimeout => "ProtocolTimeout",
            Self::Io => "IOError",
            Self::Parse => "ParseError",
        }
    }

    pub const fn exit_code(self) -> i32 {
        match self {
            Self::Configuration => 2,
            Self::Io => 3,
            Self::Process => 4,
            Self::ProtocolTimeout => 5,
            Self::Parse => 6,
        }
    }

    /// Only a process failure poisons the session for the rest of its lifetime.
    pub const fn is_fatal_to_session(self) -> bool {
        matches!(self, Self::Process)
    }
}

impl Display for ErrorCategory {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionError {
    category: ErrorCategory,
    placeholder: &'static str,
    message: String,
}

impl SessionError {
    pub fn new(
        category: ErrorCategory,
        placeholder: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            category,
            placeholder,
            message: message.into(),
        }
    }

    pub fn configuration(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Configuration, placeholder, message)
    }

    pub fn process(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Process, placeholder, message)
    }

    pub fn protocol_timeout(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::ProtocolTimeout, placeholder, message)
    }

    pub fn io(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Io, placeholder, message)
    }

    pub fn parse(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Parse, placeholder, message)
    }

    pub const fn category(&self) -> ErrorCategory {
        self.category
    }

    pub const fn placeholder(&self) -> &'static str {
        self.placeholder
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn exit_code(&self) -> i32 {
        self.category.exit_code()
    }

    pub fn is(&self, placeholder: &str) -> bool {
        self.placeholder == placeholder
    }

    pub fn diagnostic_line(&self) -> String {
        let severity = if self.category.is_fatal_to_session() {
            "FATAL"
        } else {
            "ERROR"
        };
        format!("{}: [{}] {}", severity, self.placeholder, self.message)
    }
}

impl Display for SessionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} [{}] {}",
            self.category.as_str(),
            self.placeholder,
            self.message
        )
    }
}

impl Error for SessionError {}
