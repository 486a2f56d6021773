//! Safe reader for the declarative literal files the engine writes.
//!
//! Result and components files look like a class definition whose constructor
//! assigns literal fields (`self.nodeMap = {...}`). They are parsed as data
//! with a restricted grammar; nothing in them is ever evaluated.

mod parser;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    None,
    List(Vec<Value>),
    /// Mapping entries in file order.
    Map(Vec<(Value, Value)>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(value) => Some(*value as f64),
            Self::Float(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            Self::Float(value) if value.fract() == 0.0 => Some(*value as i64),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&[(Value, Value)]> {
        match self {
            Self::Map(entries) => Some(entries),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct LiteralDocument {
    pub class_name: Option<String>,
    pub fields: Vec<(String, Value)>,
}

impl LiteralDocument {
    pub fn parse(source: &str) -> Result<Self, LiteralError> {
        parser::parse_document(source)
    }

    /// Last assignment wins, as it would for repeated attribute writes.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .rev()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value)
    }
}

pub fn parse_value(source: &str) -> Result<Value, LiteralError> {
    parser::parse_value(source)
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LiteralError {
    #[error("unexpected character '{ch}' at line {line}")]
    UnexpectedChar { line: usize, ch: char },
    #[error("unterminated string literal at line {line}")]
    UnterminatedString { line: usize },
    #[error("invalid number '{text}' at line {line}")]
    InvalidNumber { line: usize, text: String },
    #[error("expected {expected} at line {line}, found {found}")]
    UnexpectedToken {
        line: usize,
        expected: &'static str,
        found: String,
    },
    #[error("unexpected end of input, expected {expected}")]
    UnexpectedEnd { expected: &'static str },
}
