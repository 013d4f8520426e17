use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Setup guide generator for source repositories
#[derive(Parser, Debug)]
#[command(
    name = "repoguide",
    about = "Generate step-by-step setup guides for source repositories",
    version,
    long_about = "repoguide inspects a repository's files and manifests, detects the \
                  languages, frameworks, package managers, runtimes and databases it uses, \
                  and prints an ordered list of commands to clone, install, configure \
                  and run it."
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, global = true, value_name = "LEVEL", help = "Set logging level")]
    pub log_level: Option<String>,

    #[arg(short = 'v', long, global = true, help = "Enable debug logging")]
    pub verbose: bool,

    #[arg(
        short = 'q',
        long,
        global = true,
        conflicts_with = "verbose",
        help = "Quiet mode - only log errors"
    )]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(
        about = "Generate a setup guide for a repository",
        long_about = "Lists the repository, extracts signals from watched files and manifests, \
                      ranks the detected technologies and prints the setup steps.\n\n\
                      Examples:\n  \
                      repoguide guide .\n  \
                      repoguide guide https://github.com/pallets/flask\n  \
                      repoguide guide ./my-app --format markdown -o SETUP.md"
    )]
    Guide(GuideArgs),

    #[command(about = "List the technology detection rules")]
    Rules(RulesArgs),

    #[command(about = "Show the effective configuration")]
    Config(ConfigArgs),
}

#[derive(Parser, Debug, Clone)]
pub struct GuideArgs {
    #[arg(
        value_name = "SOURCE",
        help = "Local directory or GitHub repository (URL or owner/repo on github.com)"
    )]
    pub source: String,

    #[arg(
        short = 'f',
        long,
        value_enum,
        default_value = "human",
        help = "Output format"
    )]
    pub format: GuideFormatArg,

    #[arg(long, value_name = "URL", help = "Clone URL to print in the clone step")]
    pub clone_url: Option<String>,

    #[arg(long, help = "Disable the guide cache")]
    pub no_cache: bool,

    #[arg(
        short = 'o',
        long,
        value_name = "FILE",
        help = "Write output to file instead of stdout"
    )]
    pub output: Option<PathBuf>,
}

#[derive(Parser, Debug, Clone)]
pub struct RulesArgs {
    #[arg(
        short = 'f',
        long,
        value_enum,
        default_value = "human",
        help = "Output format"
    )]
    pub format: ListingFormatArg,
}

#[derive(Parser, Debug, Clone)]
pub struct ConfigArgs {
    #[arg(
        short = 'f',
        long,
        value_enum,
        default_value = "human",
        help = "Output format"
    )]
    pub format: ListingFormatArg,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuideFormatArg {
    Human,
    Markdown,
    Json,
    Yaml,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingFormatArg {
    Human,
    Json,
}

impl From<GuideFormatArg> for super::output::OutputFormat {
    fn from(arg: GuideFormatArg) -> Self {
        match arg {
            GuideFormatArg::Human => super::output::OutputFormat::Human,
            GuideFormatArg::Markdown => super::output::OutputFormat::Markdown,
            GuideFormatArg::Json => super::output::OutputFormat::Json,
            GuideFormatArg::Yaml => super::output::OutputFormat::Yaml,
        }
    }
}

impl From<ListingFormatArg> for super::output::OutputFormat {
    fn from(arg: ListingFormatArg) -> Self {
        match arg {
            ListingFormatArg::Human => super::output::OutputFormat::Human,
            ListingFormatArg::Json => super::output::OutputFormat::Json,
        }
    }
}
