pub mod commands;
pub mod handlers;
pub mod output;

pub use commands::{CliArgs, Commands, ConfigArgs, GuideArgs, RulesArgs};
pub use output::{OutputFormat, OutputFormatter};
