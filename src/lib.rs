//! repoguide - setup guides for source repositories
//!
//! This library inspects a repository snapshot and produces an ordered, human-readable
//! guide for cloning, installing, configuring and running it. Detection is rule-based
//! and deterministic: the same snapshot always yields the same guide.
//!
//! # Pipeline
//!
//! - [`snapshot`]: read-only view of a repository (GitHub, local disk, or in memory)
//! - [`signals`]: normalized facts extracted from the listing and watched manifests
//! - [`stack`]: rule table and classifier that rank detected technologies
//! - [`commands`]: command templates and the phase-ordered synthesizer
//! - [`guide`]: the assembled [`SetupGuide`] and its consistency checks
//!
//! # Example Usage
//!
//! ```
//! use repoguide::snapshot::MemorySnapshot;
//! use repoguide::{GuideConfig, GuidePipeline};
//!
//! # tokio_test_block(async {
//! let snapshot = MemorySnapshot::new("demo");
//! snapshot.add_file("requirements.txt", "flask==3.0\n");
//! snapshot.add_file("app.py", "from flask import Flask\n");
//!
//! let guide = GuidePipeline::new(&GuideConfig::builtin())
//!     .run(&snapshot)
//!     .await
//!     .unwrap();
//! assert_eq!(guide.technologies[0].name, "Flask");
//! # });
//! # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Runtime::new().unwrap().block_on(f)
//! # }
//! ```

pub mod cache;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod guide;
pub mod pipeline;
pub mod progress;
pub mod signals;
pub mod snapshot;
pub mod stack;
pub mod util;

pub use config::{ConfigError, GuideConfig};
pub use error::GuideError;
pub use guide::{GuideAssembler, SetupGuide};
pub use pipeline::GuidePipeline;
pub use snapshot::{RepositoryInfo, RepositorySource, SnapshotProvider};
pub use util::{init_default, init_from_env, init_logging, LoggingConfig};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
