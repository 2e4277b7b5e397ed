//! Blindtest CLI Library
//!
//! Terminal front end for the blind listening test: configuration loading,
//! prompt command parsing, and the trial controller.
//!
//! This library exposes the controller pieces for testing purposes.

pub mod config;
pub mod console;
pub mod controller;
pub mod error;

// Re-export commonly used types for convenience
pub use config::CliConfig;
pub use console::{parse_command, Command};
pub use controller::{Controller, Flow};
pub use error::{CliError, Result};
