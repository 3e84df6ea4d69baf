//! # mirrorsync engine
//!
//! Reconciles project metadata from a GitHub repository onto a Gitea
//! repository that already pull-mirrors its code: labels, milestones, issues,
//! pull requests with their discussion, wikis and releases with their assets.
//!
//! No identifier table is kept between runs. Every mirrored item carries a
//! marker in its title and body, and each run rediscovers what was mirrored
//! before by parsing those markers back out of the destination.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use mirrorsync_engine::{GiteaClient, GitHubClient, JsonFileConfigStore, Orchestrator, RepoRef};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let source = Arc::new(GitHubClient::new(Some("ghp_xxx".into()))?);
//!     let destination = Arc::new(GiteaClient::new("https://gitea.example.com", "token")?);
//!     let configs = Arc::new(JsonFileConfigStore::new("./config"));
//!
//!     let orchestrator = Orchestrator::new(source, destination, configs);
//!     let run = orchestrator
//!         .mirror_repository(&RepoRef::parse("octo/widgets")?, &RepoRef::new("mirror", "widgets"))
//!         .await?;
//!     println!("{}: {}", run.destination, run.status);
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod gitea;
pub mod github;
pub mod identity;
pub mod lock;
pub mod orchestrator;
pub mod pagination;
pub mod progress;
pub mod release;
pub mod render;
pub mod sync;
pub mod types;
pub mod verify;
pub mod wiki;

#[cfg(test)]
pub(crate) mod testing;

pub use api::{DestinationApi, SourceApi};
pub use config::{JsonFileConfigStore, MirrorStatus, RepoConfig, RepoConfigStore};
pub use error::{Result, SyncError};
pub use gitea::GiteaClient;
pub use github::GitHubClient;
pub use identity::{IdentityMap, MarkerKind};
pub use lock::RepoLocks;
pub use orchestrator::{ComponentStatus, MetadataReport, Orchestrator, RepositoryRun, RunOverrides};
pub use progress::{ConsoleProgressReporter, ProgressCallback, SyncPhase, SyncProgress};
pub use release::{ReleaseMirror, ReleaseReport};
pub use types::RepoRef;
pub use verify::Verification;
pub use wiki::{GitWikiMirror, WikiMirror};

/// Version of the engine.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
