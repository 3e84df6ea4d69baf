//! Wiki mirroring through the `git` executable.
//!
//! A source wiki is a separate git repository. It is cloned and force-pushed
//! to a `<repo>-wiki` repository on the destination, and the main
//! repository's description gains a `Wiki:` link.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::process::Command;
use tracing::{debug, info, warn};
use url::Url;

use crate::api::{DestinationApi, SourceApi};
use crate::error::{Result, SyncError};
use crate::types::{RepoRef, RepositoryDraft};

/// Mirrors a repository's wiki.
#[async_trait]
pub trait WikiMirror: Send + Sync {
    /// Returns `Ok(false)` when the source has no wiki to mirror.
    async fn mirror_wiki(&self, source: &RepoRef, destination: &RepoRef) -> Result<bool>;
}

/// Replace every occurrence of `token` in `text`.
pub fn mask_token(text: &str, token: Option<&str>) -> String {
    match token.filter(|t| !t.is_empty()) {
        Some(token) => text.replace(token, "*****"),
        None => text.to_string(),
    }
}

/// Destination description after linking the wiki.
///
/// A previous `Wiki:` suffix is dropped. A generated `Mirror of ...`
/// description is replaced by the source description when there is one.
pub fn wiki_description(
    current: Option<&str>,
    source_description: Option<&str>,
    source: &RepoRef,
    wiki_link: &str,
) -> String {
    let current = current.unwrap_or_default();
    let base = match current.find("Wiki:") {
        Some(idx) => current[..idx].trim(),
        None => current.trim(),
    };

    let base = if base.starts_with("Mirror of") {
        match source_description.map(str::trim).filter(|d| !d.is_empty()) {
            Some(description) => description.to_string(),
            None => format!("Mirror of {source}"),
        }
    } else {
        base.to_string()
    };

    if base.is_empty() {
        format!("Wiki: {wiki_link}")
    } else {
        format!("{base}\nWiki: {wiki_link}")
    }
}

/// [`WikiMirror`] shelling out to `git`.
pub struct GitWikiMirror {
    source: Arc<dyn SourceApi>,
    destination: Arc<dyn DestinationApi>,
    github_token: Option<String>,
    gitea_url: Url,
    gitea_token: String,
}

impl GitWikiMirror {
    pub fn new(
        source: Arc<dyn SourceApi>,
        destination: Arc<dyn DestinationApi>,
        github_token: Option<String>,
        gitea_url: Url,
        gitea_token: String,
    ) -> Self {
        let mut gitea_url = gitea_url;
        if !gitea_url.path().ends_with('/') {
            let path = format!("{}/", gitea_url.path());
            gitea_url.set_path(&path);
        }
        Self {
            source,
            destination,
            github_token,
            gitea_url,
            gitea_token,
        }
    }

    fn clone_url(&self, source: &RepoRef) -> String {
        match self.github_token.as_deref().filter(|t| !t.is_empty()) {
            Some(token) => format!(
                "https://{token}@github.com/{}/{}.wiki.git",
                source.owner, source.name
            ),
            None => format!("https://github.com/{}/{}.wiki.git", source.owner, source.name),
        }
    }

    fn push_url(&self, wiki_repo: &RepoRef) -> Result<String> {
        let mut url = self
            .gitea_url
            .join(&format!("{}/{}.git", wiki_repo.owner, wiki_repo.name))
            .map_err(|e| SyncError::Config(format!("invalid destination URL: {e}")))?;
        url.set_username(&self.gitea_token)
            .map_err(|_| SyncError::Config("destination URL cannot carry credentials".into()))?;
        Ok(url.to_string())
    }

    fn wiki_link(&self, wiki_repo: &RepoRef) -> String {
        format!(
            "{}/{}/{}",
            self.gitea_url.as_str().trim_end_matches('/'),
            wiki_repo.owner,
            wiki_repo.name
        )
    }

    async fn git(&self, cwd: &Path, args: &[&str]) -> Result<()> {
        let output = Command::new("git")
            .args(args)
            .current_dir(cwd)
            .output()
            .await
            .map_err(|e| SyncError::Git(format!("failed to run git: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stderr = mask_token(&stderr, self.github_token.as_deref());
            let stderr = mask_token(&stderr, Some(&self.gitea_token));
            return Err(SyncError::Git(format!(
                "git {} exited with {}: {}",
                args.first().copied().unwrap_or_default(),
                output.status,
                stderr.trim()
            )));
        }
        Ok(())
    }

    async fn ensure_wiki_repository(&self, destination: &RepoRef) -> Result<RepoRef> {
        let wiki_repo = RepoRef::new(&destination.owner, format!("{}-wiki", destination.name));
        if self.destination.get_repository(&wiki_repo).await?.is_some() {
            debug!(repo = %wiki_repo, "Wiki repository exists");
            return Ok(wiki_repo);
        }

        info!(repo = %wiki_repo, "Creating wiki repository");
        let created = self
            .destination
            .create_repository(&RepositoryDraft {
                name: wiki_repo.name.clone(),
                description: format!("Wiki content for {destination}, mirrored from GitHub"),
                private: false,
                auto_init: false,
            })
            .await?;
        Ok(created.repo_ref())
    }
}

#[async_trait]
impl WikiMirror for GitWikiMirror {
    async fn mirror_wiki(&self, source: &RepoRef, destination: &RepoRef) -> Result<bool> {
        let info = self.source.get_repository(source).await?;
        if !info.has_wiki {
            info!(repo = %source, "Source has no wiki");
            return Ok(false);
        }

        let temp = TempDir::new()?;
        let clone_url = self.clone_url(source);
        if let Err(e) = self
            .git(temp.path(), &["clone", &clone_url, "wiki"])
            .await
        {
            // Wikis are enabled by default, but the repository only exists
            // once a page has been written.
            warn!(repo = %source, error = %e, "Wiki enabled but could not be cloned");
            return Ok(false);
        }
        let work_dir = temp.path().join("wiki");

        let wiki_repo = self.ensure_wiki_repository(destination).await?;
        let push_url = self.push_url(&wiki_repo)?;
        self.git(&work_dir, &["push", "--force", &push_url, "HEAD:master"])
            .await?;
        info!(repo = %wiki_repo, "Pushed wiki content");

        if let Some(current) = self.destination.get_repository(destination).await? {
            let description = wiki_description(
                current.description.as_deref(),
                info.description.as_deref(),
                source,
                &self.wiki_link(&wiki_repo),
            );
            self.destination
                .update_description(destination, &description)
                .await?;
        }

        Ok(true)
    }
}
