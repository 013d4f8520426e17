use repoguide::cli::commands::{CliArgs, Commands};
use repoguide::cli::handlers::{handle_config, handle_guide, handle_rules};
use repoguide::util::logging::{config_from_env, init_logging, parse_level};
use repoguide::VERSION;

use clap::Parser;
use tracing::{debug, Level};

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();
    init_logging_from_args(&args);

    debug!("repoguide v{} starting", VERSION);
    debug!("Arguments: {:?}", args);

    let exit_code = match &args.command {
        Commands::Guide(guide_args) => handle_guide(guide_args).await,
        Commands::Rules(rules_args) => handle_rules(rules_args).await,
        Commands::Config(config_args) => handle_config(config_args).await,
    };

    std::process::exit(exit_code);
}

fn init_logging_from_args(args: &CliArgs) {
    let level = if let Some(level_str) = &args.log_level {
        Some(parse_level(level_str))
    } else if args.verbose {
        Some(Level::DEBUG)
    } else if args.quiet {
        Some(Level::ERROR)
    } else {
        None
    };

    init_logging(config_from_env(level));
}
