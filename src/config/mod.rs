//! Configuration and CLI handling

pub mod cli;
pub mod settings;

pub use cli::{Cli, Command, RunArgs, ServeArgs};
pub use settings::{validate_policy, ServerSettings, Settings};
