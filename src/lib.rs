pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use config::{Cli, Command};
pub use core::{run_command, Tool, ToolReport};
pub use utils::error::{PostError, Result};
