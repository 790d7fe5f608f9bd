//! Core library for shipgate.
//!
//! shipgate refuses to publish a release unless it is ahead everywhere it
//! ships: the manifest and local tag must agree, and both must be newer than
//! the remote tags, the package registry and the container registry.
//!
//! # Modules
//!
//! - [`version`] - Release version parsing and ordering
//! - [`source`] - The five version sources
//! - [`aggregate`] - Collecting source results and failures
//! - [`decision`] - The release checks and transition plan
//! - [`publish`] - Running the publish steps
//! - [`context`] - Identifier resolution and source wiring
//! - [`config`] - Configuration loading and discovery
//! - [`error`] - Error types and result aliases
//! - [`git`], [`http`], [`process`] - Access to external systems
//!
//! # Quick Start
//!
//! ```no_run
//! use camino::Utf8Path;
//! use shipgate_core::{ConfigLoader, Decision, ReleaseContext, decide};
//!
//! let root = Utf8Path::new(".");
//! let config = ConfigLoader::new().with_project_search(root).load()?;
//! let context = ReleaseContext::from_config(&config, root)?;
//!
//! match context.resolve_all().into_state() {
//!     Ok(state) => match decide(&state) {
//!         Decision::Proceed(plan) => println!("ready: {}", plan.registry.new),
//!         Decision::Blocked { reason, .. } => println!("blocked: {reason}"),
//!     },
//!     Err(failures) => eprintln!("{} sources failed", failures.len()),
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
#![deny(unsafe_code)]

pub mod aggregate;

pub mod config;

pub mod context;

pub mod decision;

pub mod error;

pub mod git;

pub mod http;

pub mod process;

pub mod publish;

pub mod source;

pub mod version;

pub use aggregate::{SourceFailure, SourceReport, aggregate};
pub use config::{Config, ConfigLoader, LogLevel};
pub use context::{ContextError, ReleaseContext};
pub use decision::{BlockReason, Decision, ReleaseState, Transition, TransitionPlan, decide};
pub use error::{ConfigError, ConfigResult, PublishError, SourceError, SourceResult};
pub use publish::{PublishDriver, PublishEvent, PublishOutcome, PublishSettings};
pub use version::ReleaseVersion;
