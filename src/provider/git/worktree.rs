use chrono::{DateTime, FixedOffset, Offset, Utc};
use git2::build::CheckoutBuilder;
use git2::{Commit, ErrorCode, ObjectType, Oid, Repository, Signature, Sort};
use std::fs;
use std::io;
use std::path::Path;
use tracing::{debug, info, warn};

use super::config::GitConfig;
use crate::model::{validate_page_name, Page, PageVersion, VersionId};
use crate::provider::ProviderError;

/// Blocking page operations on a git working tree.
///
/// Every call opens the repository afresh so the value can be moved onto
/// the blocking thread pool without sharing libgit2 handles.
#[derive(Debug, Clone)]
pub struct Worktree {
    config: GitConfig,
}

enum Staging {
    Add,
    Remove,
}

impl Worktree {
    pub fn new(config: GitConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GitConfig {
        &self.config
    }

    fn open(&self) -> Result<Repository, ProviderError> {
        Ok(Repository::open(&self.config.repo_path)?)
    }

    pub fn list_pages(&self) -> Result<Vec<Page>, ProviderError> {
        let entries = match fs::read_dir(self.config.pages_path()) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut pages = Vec::new();
        for entry in entries {
            let path = entry?.path();
            let is_yaml = matches!(
                path.extension().and_then(|ext| ext.to_str()),
                Some("yaml") | Some("yml")
            );
            if !is_yaml {
                continue;
            }
            if let Some(page) = read_page(&path) {
                pages.push(page);
            }
        }
        Ok(pages)
    }

    pub fn get_page(&self, name: &str) -> Option<Page> {
        if validate_page_name(name).is_err() {
            return None;
        }
        read_page(&self.config.page_path(name))
    }

    pub fn save_page(&self, page: &Page) -> Result<(), ProviderError> {
        let name = page.name();
        checked_name(name)?;

        write_page(&self.config.page_path(name), page)?;
        let repo = self.open()?;
        self.commit(
            &repo,
            &self.config.relative_path(name),
            Staging::Add,
            &format!("Update page {}", name),
        )?;
        Ok(())
    }

    pub fn delete_page(&self, name: &str) -> Result<(), ProviderError> {
        checked_name(name)?;

        match fs::remove_file(self.config.page_path(name)) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(ProviderError::page_not_found(name)),
            Err(e) => return Err(e.into()),
        }

        let repo = self.open()?;
        match self.commit(
            &repo,
            &self.config.relative_path(name),
            Staging::Remove,
            &format!("Delete page {}", name),
        ) {
            // The file was never committed; removing it from disk is all there is
            Ok(_) | Err(ProviderError::Unchanged(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Prior versions of a page, newest first.
    ///
    /// Walks history from HEAD and keeps the commits that changed the page
    /// file. The walk ends where the file is absent, so history from before
    /// a deletion is not attributed to a recreated page. The newest such
    /// commit holds the current state and is left out.
    pub fn list_versions(&self, name: &str) -> Result<Vec<PageVersion>, ProviderError> {
        checked_name(name)?;

        let repo = self.open()?;
        let Some(head) = head_commit(&repo)? else {
            return Ok(Vec::new());
        };
        let rel = self.config.relative_path(name);

        let mut walk = repo.revwalk()?;
        walk.push(head.id())?;
        walk.set_sorting(Sort::TOPOLOGICAL | Sort::TIME)?;

        let mut touching = Vec::new();
        for oid in walk {
            let commit = repo.find_commit(oid?)?;
            let Some(blob_id) = blob_id_at(&commit, &rel)? else {
                break;
            };
            let parent_blob = match commit.parent(0) {
                Ok(parent) => blob_id_at(&parent, &rel)?,
                Err(_) => None,
            };
            if parent_blob == Some(blob_id) {
                continue;
            }
            touching.push((commit.id(), author_timestamp(&commit), blob_id));
        }

        let mut versions = Vec::with_capacity(touching.len().saturating_sub(1));
        for (commit_id, timestamp, blob_id) in touching.into_iter().skip(1) {
            let blob = repo.find_blob(blob_id)?;
            match serde_yaml::from_slice::<Page>(blob.content()) {
                Ok(page) => versions.push(PageVersion {
                    version: VersionId::new(commit_id.to_string()),
                    timestamp,
                    content: page.spec.content,
                }),
                Err(e) => debug!("Skipping unparsable version {} of page {}: {}", commit_id, name, e),
            }
        }
        Ok(versions)
    }

    pub fn restore_version(&self, name: &str, version: &VersionId) -> Result<Page, ProviderError> {
        checked_name(name)?;

        let path = self.config.page_path(name);
        if !path.is_file() {
            return Err(ProviderError::page_not_found(name));
        }

        let repo = self.open()?;
        let rel = self.config.relative_path(name);
        let commit = resolve_commit(&repo, version).ok_or_else(|| ProviderError::version_not_found(name, version))?;
        let blob_id = blob_id_at(&commit, &rel)?.ok_or_else(|| ProviderError::version_not_found(name, version))?;
        let blob = repo.find_blob(blob_id)?;

        let page: Page = serde_yaml::from_slice(blob.content()).map_err(|e| {
            ProviderError::Parse(format!("version '{}' of page '{}': {}", version, name, e))
        })?;

        write_page(&path, &page)?;
        let commit_id = commit.id().to_string();
        self.commit(
            &repo,
            &rel,
            Staging::Add,
            &format!("Restore page {} to version {}", name, &commit_id[..8]),
        )?;
        Ok(page)
    }

    /// Stage one path and commit it on HEAD. Refuses empty commits.
    ///
    /// When the commit fails for any other reason the path is reset to
    /// HEAD, so the working tree never holds changes HEAD does not have.
    fn commit(&self, repo: &Repository, rel: &Path, staging: Staging, message: &str) -> Result<Oid, ProviderError> {
        match self.try_commit(repo, rel, staging, message) {
            Err(e) if !matches!(e, ProviderError::Unchanged(_)) => {
                if let Err(reset) = self.discard_changes(repo, rel) {
                    warn!("Failed to reset {:?} after failed commit: {}", rel, reset);
                }
                Err(e)
            }
            result => result,
        }
    }

    /// Put one path back to its state at HEAD, in the index and on disk
    fn discard_changes(&self, repo: &Repository, rel: &Path) -> Result<(), ProviderError> {
        let head = head_commit(repo)?;
        let committed = match &head {
            Some(commit) => blob_id_at(commit, rel)?.is_some(),
            None => false,
        };

        match head {
            Some(commit) if committed => {
                repo.reset_default(Some(commit.as_object()), [rel])?;
                let mut checkout = CheckoutBuilder::new();
                checkout.force().path(rel);
                repo.checkout_head(Some(&mut checkout))?;
            }
            _ => {
                let mut index = repo.index()?;
                index.remove_path(rel)?;
                index.write()?;
                match fs::remove_file(self.config.repo_path.join(rel)) {
                    Ok(()) => {}
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                    Err(e) => return Err(e.into()),
                }
            }
        }
        Ok(())
    }

    fn try_commit(&self, repo: &Repository, rel: &Path, staging: Staging, message: &str) -> Result<Oid, ProviderError> {
        let mut index = repo.index()?;
        match staging {
            Staging::Add => index.add_path(rel)?,
            Staging::Remove => index.remove_path(rel)?,
        }
        index.write()?;

        let tree_id = index.write_tree()?;
        let parent = head_commit(repo)?;
        if parent.as_ref().is_some_and(|p| p.tree_id() == tree_id) {
            return Err(ProviderError::Unchanged(format!(
                "'{}' would not change the repository",
                message
            )));
        }

        let tree = repo.find_tree(tree_id)?;
        let signature = Signature::now(&self.config.author_name, &self.config.author_email)?;
        let parents: Vec<&Commit<'_>> = parent.iter().collect();
        let oid = repo.commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)?;

        info!(commit = %oid, "{}", message);
        Ok(oid)
    }
}

fn checked_name(name: &str) -> Result<(), ProviderError> {
    validate_page_name(name).map_err(ProviderError::InvalidName)
}

fn read_page(path: &Path) -> Option<Page> {
    let text = fs::read_to_string(path).ok()?;
    match serde_yaml::from_str(&text) {
        Ok(page) => Some(page),
        Err(e) => {
            debug!("Ignoring unparsable page file {:?}: {}", path, e);
            None
        }
    }
}

fn write_page(path: &Path, page: &Page) -> Result<(), ProviderError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_yaml::to_string(page)?)?;
    Ok(())
}

fn head_commit(repo: &Repository) -> Result<Option<Commit<'_>>, ProviderError> {
    match repo.head() {
        Ok(head) => Ok(Some(head.peel_to_commit()?)),
        Err(e) if matches!(e.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn blob_id_at(commit: &Commit<'_>, rel: &Path) -> Result<Option<Oid>, git2::Error> {
    let tree = commit.tree()?;
    match tree.get_path(rel) {
        Ok(entry) if entry.kind() == Some(ObjectType::Blob) => Ok(Some(entry.id())),
        Ok(_) => Ok(None),
        Err(e) if e.code() == ErrorCode::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Only (abbreviated) commit hashes are accepted as version ids
fn resolve_commit<'r>(repo: &'r Repository, version: &VersionId) -> Option<Commit<'r>> {
    let id = version.as_str();
    let is_hash = (4..=40).contains(&id.len()) && id.chars().all(|c| c.is_ascii_hexdigit());
    if !is_hash {
        return None;
    }
    repo.revparse_single(id).and_then(|obj| obj.peel_to_commit()).ok()
}

fn author_timestamp(commit: &Commit<'_>) -> String {
    let when = commit.author().when();
    let offset = FixedOffset::east_opt(when.offset_minutes() * 60).unwrap_or_else(|| Utc.fix());
    DateTime::from_timestamp(when.seconds(), 0)
        .map(|t| t.with_timezone(&offset).to_rfc3339())
        .unwrap_or_default()
}
