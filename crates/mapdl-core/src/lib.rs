//! Host-side coordination of one long-lived analysis engine session.
//!
//! A [`runner::SessionController`] launches the engine on a generated control
//! script and multiplexes registered instances through it with a ready/go
//! signal handshake. [`case::AnalysisCase`] builds each instance's input
//! commands and memoizes the parsed results per command sequence.

pub mod assembler;
pub mod cache;
pub mod case;
pub mod components;
pub mod config;
pub mod domain;
pub mod layout;
pub mod literal;
pub mod output;
pub mod registry;
pub mod runner;
pub mod script;
pub mod signal;
pub mod support;
pub mod units;
