//! Command implementations.

use std::sync::Arc;

use anyhow::{Context, Result};
use mirrorsync_engine::{
    ConsoleProgressReporter, GitHubClient, GitWikiMirror, GiteaClient, JsonFileConfigStore,
    MirrorStatus, Orchestrator, RepoConfig, RepoRef, RepositoryRun, RunOverrides, SyncProgress,
};
use tracing::info;
use url::Url;

use crate::settings::Settings;

fn orchestrator(settings: &Settings, overrides: RunOverrides) -> Result<Orchestrator> {
    let gitea_token = settings
        .gitea_token
        .clone()
        .filter(|t| !t.is_empty())
        .context("a Gitea token is required (GITEA_TOKEN or MIRRORSYNC_GITEA_TOKEN)")?;
    let gitea_url = Url::parse(&settings.gitea_url)
        .with_context(|| format!("invalid Gitea URL {}", settings.gitea_url))?;

    let source = Arc::new(GitHubClient::new(settings.github_token())?);
    let destination = Arc::new(GiteaClient::new(&settings.gitea_url, gitea_token.clone())?);
    let configs = Arc::new(JsonFileConfigStore::new(&settings.config_dir));
    let wiki = Arc::new(GitWikiMirror::new(
        source.clone(),
        destination.clone(),
        settings.github_token(),
        gitea_url,
        gitea_token,
    ));

    Ok(Orchestrator::new(source, destination, configs)
        .with_wiki(wiki)
        .with_overrides(overrides))
}

fn print_run(run: &RepositoryRun) {
    println!("{} -> {}: {}", run.source, run.destination, run.status);
    if let Some(report) = &run.report {
        for (name, status) in &report.components {
            let mark = if status.success { "ok" } else { "!!" };
            println!("  [{mark}] {name}: {}", status.message);
        }
    }
    for message in &run.messages {
        println!("  - {message}");
    }
}

/// Mirror one repository pair. Returns whether the run avoided an error status.
pub async fn sync(
    settings: &Settings,
    source: &str,
    dest_owner: &str,
    dest_repo: &str,
    overrides: RunOverrides,
) -> Result<bool> {
    let source = RepoRef::parse(source)?;
    let dest = RepoRef::new(dest_owner, dest_repo);

    let mut orchestrator = orchestrator(settings, overrides)?;
    let reporter = (!settings.json_logs()).then(ConsoleProgressReporter::new);
    if let Some(reporter) = &reporter {
        orchestrator =
            orchestrator.with_progress(Arc::new(SyncProgress::with_callback(reporter.callback())));
    }

    let run = orchestrator.mirror_repository(&source, &dest).await?;
    if let Some(reporter) = reporter {
        reporter.finish(&run.status.to_string());
    }
    print_run(&run);
    Ok(run.status != MirrorStatus::Error)
}

/// Mirror every GitHub pull mirror found on the destination.
pub async fn sync_all(settings: &Settings, concurrency: Option<usize>) -> Result<bool> {
    let concurrency = concurrency.unwrap_or(settings.concurrency);
    let runs = orchestrator(settings, RunOverrides::default())?
        .mirror_all(concurrency)
        .await?;

    if runs.is_empty() {
        println!("No mirrored repositories found. Create a pull mirror of a GitHub repository in Gitea first.");
        return Ok(true);
    }
    for run in &runs {
        print_run(run);
    }
    let errors = runs
        .iter()
        .filter(|r| r.status == MirrorStatus::Error)
        .count();
    info!(repositories = runs.len(), errors, "Sweep finished");
    Ok(errors == 0)
}

/// Write `default.json`, used for pairs without their own configuration.
pub fn init_config(settings: &Settings, all: bool) -> Result<()> {
    let store = JsonFileConfigStore::new(&settings.config_dir);
    let config = if all {
        RepoConfig::all_enabled()
    } else {
        RepoConfig::default()
    };
    store
        .save_default_config(&config)
        .with_context(|| format!("writing {}", store.dir().display()))?;
    println!(
        "Wrote {}",
        store.dir().join(JsonFileConfigStore::DEFAULT_FILE).display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_gitea_token_is_reported() {
        let settings = Settings::default();
        let err = orchestrator(&settings, RunOverrides::default())
            .err()
            .unwrap();
        assert!(err.to_string().contains("Gitea token"));
    }

    #[test]
    fn test_init_config_writes_default() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings {
            config_dir: dir.path().to_path_buf(),
            ..Settings::default()
        };

        init_config(&settings, true).unwrap();

        let store = JsonFileConfigStore::new(dir.path());
        assert_eq!(store.default_config(), RepoConfig::all_enabled());
    }
}
