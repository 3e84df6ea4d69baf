//! Process-wide settings.
//!
//! Sources, later ones winning:
//! 1. Built-in defaults
//! 2. The conventional `GITHUB_TOKEN`, `GITEA_TOKEN` and `GITEA_URL` variables
//! 3. `mirrorsync.toml` (or the file given with `--config`)
//! 4. `MIRRORSYNC_*` environment variables, e.g. `MIRRORSYNC_GITEA_URL`

use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment, File, FileFormat, Map};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_FILE: &str = "mirrorsync.toml";

const CONVENTIONAL_VARS: [(&str, &str); 3] = [
    ("github_token", "GITHUB_TOKEN"),
    ("gitea_token", "GITEA_TOKEN"),
    ("gitea_url", "GITEA_URL"),
];

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// GitHub token. Anonymous access works for public repositories but is
    /// rate limited to 60 requests an hour.
    pub github_token: Option<String>,
    pub gitea_url: String,
    pub gitea_token: Option<String>,
    /// Directory of per-repository JSON configuration files.
    pub config_dir: PathBuf,
    pub log_level: String,
    /// `pretty` or `json`.
    pub log_format: String,
    /// Repositories mirrored in parallel by `sync-all`.
    pub concurrency: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            github_token: None,
            gitea_url: "http://localhost:3000".to_string(),
            gitea_token: None,
            config_dir: PathBuf::from("./config"),
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            concurrency: 4,
        }
    }
}

impl Settings {
    /// Load from the process environment and an optional settings file.
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        let conventional = CONVENTIONAL_VARS
            .iter()
            .filter_map(|(key, var)| std::env::var(var).ok().map(|v| (key.to_string(), v)))
            .collect();
        Self::build(file, conventional, None)
    }

    /// `env` replaces the process environment for the `MIRRORSYNC_` layer.
    fn build(
        file: Option<&Path>,
        conventional: Map<String, String>,
        env: Option<Map<String, String>>,
    ) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        for (key, value) in conventional {
            builder = builder.set_default(key, value)?;
        }

        let path = file.map_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE), Path::to_path_buf);
        builder = builder.add_source(
            File::from(path)
                .format(FileFormat::Toml)
                .required(file.is_some()),
        );
        builder = builder.add_source(Environment::with_prefix("MIRRORSYNC").source(env));

        builder.build()?.try_deserialize()
    }

    pub fn json_logs(&self) -> bool {
        self.log_format.eq_ignore_ascii_case("json")
    }

    pub fn github_token(&self) -> Option<String> {
        self.github_token.clone().filter(|t| !t.is_empty())
    }
}
