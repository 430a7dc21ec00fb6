//! CLI arguments and configuration files for the planebot binary.
//!
//! Secrets and endpoints come from flags or environment variables; the
//! report schedule and directory file locations come from a TOML file.

pub mod bot_config;
pub mod cli_args;
pub mod directory_files;

pub use bot_config::{load_bot_config, BotConfigFile};
pub use cli_args::Cli;
pub use directory_files::{load_member_directory, load_project_bindings};
