//! Per-repository mirror configuration and run status.
//!
//! Each source/destination pair has its own JSON document holding the
//! component switches and the outcome of the last run.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Result, SyncError};
use crate::types::RepoRef;

/// Overall outcome of a repository run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MirrorStatus {
    Success,
    /// Completed, but some optional part failed or was left incomplete.
    Warning,
    Error,
}

impl std::fmt::Display for MirrorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Component switches and last-run status of one mirror. Every component is
/// disabled unless configured.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepoConfig {
    pub mirror_metadata: bool,
    pub mirror_issues: bool,
    pub mirror_pull_requests: bool,
    pub mirror_labels: bool,
    pub mirror_milestones: bool,
    pub mirror_wiki: bool,
    pub mirror_releases: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_mirror_timestamp: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_mirror_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_mirror_status: Option<MirrorStatus>,
    pub last_mirror_messages: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_mirror_log: Option<String>,
}

impl RepoConfig {
    /// Configuration with every component switched on.
    pub fn all_enabled() -> Self {
        Self {
            mirror_metadata: true,
            mirror_issues: true,
            mirror_pull_requests: true,
            mirror_labels: true,
            mirror_milestones: true,
            mirror_wiki: true,
            mirror_releases: true,
            ..Self::default()
        }
    }

    /// Record the outcome of a run finished at `at`.
    pub fn record_run(&mut self, at: DateTime<Utc>, status: MirrorStatus, messages: Vec<String>) {
        self.last_mirror_timestamp = Some(at.timestamp());
        self.last_mirror_date = Some(at.format("%Y-%m-%d %H:%M:%S").to_string());
        self.last_mirror_status = Some(status);
        self.last_mirror_messages = messages;
    }
}

/// Storage of [`RepoConfig`] documents.
pub trait RepoConfigStore: Send + Sync {
    /// Configuration for the pair, falling back to the store's default.
    fn get_repo_config(&self, source: &RepoRef, destination: &RepoRef) -> Result<RepoConfig>;

    fn save_repo_config(
        &self,
        source: &RepoRef,
        destination: &RepoRef,
        config: &RepoConfig,
    ) -> Result<()>;
}

/// One JSON file per pair, named
/// `<src_owner>_<src_repo>_<dest_owner>_<dest_repo>.json`, plus an optional
/// `default.json` used for pairs without a file.
#[derive(Debug, Clone)]
pub struct JsonFileConfigStore {
    dir: PathBuf,
}

impl JsonFileConfigStore {
    pub const DEFAULT_FILE: &'static str = "default.json";

    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, source: &RepoRef, destination: &RepoRef) -> PathBuf {
        self.dir.join(format!(
            "{}_{}_{}_{}.json",
            source.owner, source.name, destination.owner, destination.name
        ))
    }

    /// Contents of `default.json`, or all components disabled.
    pub fn default_config(&self) -> RepoConfig {
        let path = self.dir.join(Self::DEFAULT_FILE);
        match read_json(&path) {
            Ok(Some(config)) => config,
            Ok(None) => RepoConfig::default(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring unreadable default config");
                RepoConfig::default()
            }
        }
    }

    pub fn save_default_config(&self, config: &RepoConfig) -> Result<()> {
        write_json(&self.dir, &self.dir.join(Self::DEFAULT_FILE), config)
    }
}

fn read_json(path: &Path) -> Result<Option<RepoConfig>> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(Some(serde_json::from_str(&text)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn write_json(dir: &Path, path: &Path, config: &RepoConfig) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    let json = serde_json::to_string_pretty(config)?;
    let mut file = tempfile::NamedTempFile::new_in(dir)?;
    std::io::Write::write_all(&mut file, json.as_bytes())?;
    file.persist(path)
        .map_err(|e| SyncError::Config(format!("{}: {}", path.display(), e.error)))?;
    Ok(())
}

impl RepoConfigStore for JsonFileConfigStore {
    fn get_repo_config(&self, source: &RepoRef, destination: &RepoRef) -> Result<RepoConfig> {
        let path = self.path_for(source, destination);
        match read_json(&path)? {
            Some(config) => Ok(config),
            None => {
                debug!(path = %path.display(), "No repository config, using default");
                Ok(self.default_config())
            }
        }
    }

    fn save_repo_config(
        &self,
        source: &RepoRef,
        destination: &RepoRef,
        config: &RepoConfig,
    ) -> Result<()> {
        write_json(&self.dir, &self.path_for(source, destination), config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn pair() -> (RepoRef, RepoRef) {
        (RepoRef::new("octo", "widgets"), RepoRef::new("mirror", "widgets"))
    }

    #[test]
    fn test_missing_config_is_all_disabled() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileConfigStore::new(dir.path());
        let (src, dst) = pair();

        let config = store.get_repo_config(&src, &dst).unwrap();
        assert_eq!(config, RepoConfig::default());
        assert!(!config.mirror_metadata);
    }

    #[test]
    fn test_default_file_fallback() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileConfigStore::new(dir.path());
        store.save_default_config(&RepoConfig::all_enabled()).unwrap();
        let (src, dst) = pair();

        assert!(store.get_repo_config(&src, &dst).unwrap().mirror_wiki);
    }

    #[test]
    fn test_round_trip_with_status() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileConfigStore::new(dir.path().join("nested"));
        let (src, dst) = pair();

        let mut config = RepoConfig {
            mirror_releases: true,
            ..RepoConfig::default()
        };
        let at: DateTime<Utc> = "2024-05-06T07:08:09Z".parse().unwrap();
        config.record_run(at, MirrorStatus::Warning, vec!["wiki failed".into()]);
        store.save_repo_config(&src, &dst, &config).unwrap();

        let path = dir.path().join("nested/octo_widgets_mirror_widgets.json");
        assert!(path.exists());

        let loaded = store.get_repo_config(&src, &dst).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.last_mirror_date.as_deref(), Some("2024-05-06 07:08:09"));
        assert_eq!(loaded.last_mirror_status, Some(MirrorStatus::Warning));
    }

    #[test]
    fn test_partial_document_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileConfigStore::new(dir.path());
        let (src, dst) = pair();
        std::fs::write(store.path_for(&src, &dst), r#"{"mirror_issues": true}"#).unwrap();

        let config = store.get_repo_config(&src, &dst).unwrap();
        assert!(config.mirror_issues);
        assert!(!config.mirror_pull_requests);
        assert!(config.last_mirror_messages.is_empty());
    }

    #[test]
    fn test_corrupt_document_is_an_error() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileConfigStore::new(dir.path());
        let (src, dst) = pair();
        std::fs::write(store.path_for(&src, &dst), "{not json").unwrap();

        assert!(matches!(
            store.get_repo_config(&src, &dst),
            Err(SyncError::Json(_))
        ));
    }
}
