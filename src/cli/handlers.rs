use super::commands::{ConfigArgs, GuideArgs, RulesArgs};
use super::output::{OutputFormat, OutputFormatter};
use crate::cache::GuideCache;
use crate::config::GuideConfig;
use crate::pipeline::GuidePipeline;
use crate::progress::LoggingHandler;
use crate::snapshot::{GitHubSnapshot, LocalSnapshot, RepositorySource, SnapshotProvider};
use crate::stack::RuleTable;
use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info};

pub async fn handle_guide(args: &GuideArgs) -> i32 {
    let config = match GuideConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("Configuration error: {}", e);
            eprintln!("\nPlease check your REPOGUIDE_* environment variables.");
            return 1;
        }
    };
    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        eprintln!("\nPlease check your REPOGUIDE_* environment variables.");
        return 1;
    }

    let source = RepositorySource::parse(&args.source);
    debug!("Repository source: {}", source);

    let provider = match open_source(&source, args, &config) {
        Ok(p) => p,
        Err(e) => {
            error!("{:#}", e);
            return 1;
        }
    };

    let mut pipeline = GuidePipeline::new(&config).with_progress(Arc::new(LoggingHandler));
    if config.cache_enabled && !args.no_cache {
        debug!("Guide cache: {}", config.cache_dir.display());
        pipeline = pipeline.with_cache(GuideCache::new(config.cache_dir.clone()));
    } else {
        debug!("Caching disabled");
    }

    let guide = match pipeline.run(provider.as_ref()).await {
        Ok(g) => g,
        Err(e) => {
            error!("Guide generation failed: {}", e);
            return 1;
        }
    };

    let formatter = OutputFormatter::new(args.format.into());
    let rendered = match formatter.format_guide(&guide) {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to format output: {:#}", e);
            return 1;
        }
    };

    match emit(&rendered, args.output.as_deref()) {
        Ok(()) => 0,
        Err(e) => {
            error!("{:#}", e);
            1
        }
    }
}

pub async fn handle_rules(args: &RulesArgs) -> i32 {
    let rules = RuleTable::with_defaults();
    match OutputFormatter::new(args.format.into()).format_rules(&rules) {
        Ok(s) => {
            print!("{}", with_newline(s));
            0
        }
        Err(e) => {
            error!("Failed to format rules: {:#}", e);
            1
        }
    }
}

pub async fn handle_config(args: &ConfigArgs) -> i32 {
    let config = match GuideConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("Configuration error: {}", e);
            return 1;
        }
    };
    let format: OutputFormat = args.format.into();
    match OutputFormatter::new(format).format_config(&config) {
        Ok(s) => {
            print!("{}", with_newline(s));
            match config.validate() {
                Ok(()) => 0,
                Err(e) => {
                    error!("Configuration error: {}", e);
                    1
                }
            }
        }
        Err(e) => {
            error!("Failed to format config: {:#}", e);
            1
        }
    }
}

fn open_source(
    source: &RepositorySource,
    args: &GuideArgs,
    config: &GuideConfig,
) -> Result<Box<dyn SnapshotProvider>> {
    match source {
        RepositorySource::GitHub { owner, repo } => {
            let mut snapshot =
                GitHubSnapshot::new(owner, repo, &config.github_api_url, config.read_timeout())?;
            if let Some(url) = &args.clone_url {
                snapshot = snapshot.with_clone_url(url.clone());
            }
            Ok(Box::new(snapshot))
        }
        RepositorySource::Local(path) => {
            let mut snapshot = LocalSnapshot::new(path)?;
            if let Some(url) = &args.clone_url {
                snapshot = snapshot.with_clone_url(url.clone());
            }
            Ok(Box::new(snapshot))
        }
    }
}

fn with_newline(mut s: String) -> String {
    if !s.ends_with('\n') {
        s.push('\n');
    }
    s
}

fn emit(rendered: &str, output: Option<&Path>) -> Result<()> {
    let rendered = with_newline(rendered.to_string());
    match output {
        Some(path) => {
            std::fs::write(path, rendered)
                .with_context(|| format!("Failed to write output to {}", path.display()))?;
            info!("Guide written to {}", path.display());
        }
        None => print!("{}", rendered),
    }
    Ok(())
}
