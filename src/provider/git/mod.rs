//! Git-backed provider: one YAML file per page, history from the commit log.

pub mod config;
pub mod worktree;

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

pub use config::GitConfig;
pub use worktree::Worktree;

use super::{ListingPolicy, ProviderError, ProviderKind, SourceProvider};
use crate::model::{Page, PageVersion, VersionId};

pub struct GitProvider {
    worktree: Worktree,
    listing: ListingPolicy,
    // Index and HEAD are shared by every page in the repository
    write_lock: Arc<Mutex<()>>,
}

impl GitProvider {
    pub fn new(config: GitConfig, listing: ListingPolicy) -> Self {
        info!(
            "Git provider at {:?} (branch {}, pages dir {})",
            config.repo_path, config.branch, config.pages_dir
        );
        Self {
            worktree: Worktree::new(config),
            listing,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn config(&self) -> &GitConfig {
        self.worktree.config()
    }

    /// Run a worktree operation on the blocking pool
    async fn run<T, F>(&self, op: F) -> Result<T, ProviderError>
    where
        F: FnOnce(&Worktree) -> Result<T, ProviderError> + Send + 'static,
        T: Send + 'static,
    {
        let worktree = self.worktree.clone();
        tokio::task::spawn_blocking(move || op(&worktree)).await?
    }

    /// Run a mutating operation under the repository write lock. The guard
    /// moves onto the blocking thread, so a cancelled request keeps the lock
    /// until the git operation has finished.
    async fn run_exclusive<T, F>(&self, op: F) -> Result<T, ProviderError>
    where
        F: FnOnce(&Worktree) -> Result<T, ProviderError> + Send + 'static,
        T: Send + 'static,
    {
        let guard = self.write_lock.clone().lock_owned().await;
        let worktree = self.worktree.clone();
        tokio::task::spawn_blocking(move || {
            let _guard = guard;
            op(&worktree)
        })
        .await?
    }
}

#[async_trait]
impl SourceProvider for GitProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Git
    }

    async fn list_pages(&self) -> Result<Vec<Page>, ProviderError> {
        let result = self.run(|tree| tree.list_pages()).await;
        self.listing.absorb(ProviderKind::Git, "list_pages", result)
    }

    async fn get_page(&self, name: &str) -> Result<Option<Page>, ProviderError> {
        let name = name.to_string();
        self.run(move |tree| Ok(tree.get_page(&name))).await
    }

    async fn save_page(&self, page: Page) -> Result<Page, ProviderError> {
        let to_write = page.clone();
        self.run_exclusive(move |tree| tree.save_page(&to_write)).await?;
        Ok(page)
    }

    async fn delete_page(&self, name: &str) -> Result<(), ProviderError> {
        let name = name.to_string();
        self.run_exclusive(move |tree| tree.delete_page(&name)).await
    }

    async fn list_versions(&self, name: &str) -> Result<Vec<PageVersion>, ProviderError> {
        let owned = name.to_string();
        let result = self.run(move |tree| tree.list_versions(&owned)).await;
        self.listing.absorb(ProviderKind::Git, "list_versions", result)
    }

    async fn restore_version(&self, name: &str, version: &VersionId) -> Result<Page, ProviderError> {
        let name = name.to_string();
        let version = version.clone();
        self.run_exclusive(move |tree| tree.restore_version(&name, &version)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{sample_page, TempRepo};
    use serde_json::json;

    fn provider(repo: &TempRepo) -> GitProvider {
        GitProvider::new(repo.config(), ListingPolicy::Strict)
    }

    #[tokio::test]
    async fn save_then_get_round_trips_spec() {
        let repo = TempRepo::new();
        let provider = provider(&repo);

        let mut page = sample_page("home", json!([{ "type": "Hero", "props": { "title": "Hi" } }]));
        page.spec.title = Some("Home".to_string());
        provider.save_page(page.clone()).await.unwrap();

        let loaded = provider.get_page("home").await.unwrap().expect("page should exist");
        assert_eq!(loaded.spec, page.spec);
        assert!(repo.path().join("pages/home.yaml").is_file());
    }

    #[tokio::test]
    async fn unknown_spec_fields_round_trip() {
        let repo = TempRepo::new();
        let provider = provider(&repo);

        let mut page = sample_page("home", json!("A"));
        page.spec.extra.insert("layout".to_string(), json!("wide"));
        page.spec.extra.insert("seo".to_string(), json!({ "noindex": true }));
        provider.save_page(page.clone()).await.unwrap();

        let loaded = provider.get_page("home").await.unwrap().unwrap();
        assert_eq!(loaded.spec, page.spec);
        let yaml = std::fs::read_to_string(repo.path().join("pages/home.yaml")).unwrap();
        assert!(yaml.contains("layout: wide"));
    }

    #[tokio::test]
    async fn save_commits_with_update_message() {
        let repo = TempRepo::new();
        let provider = provider(&repo);
        provider.save_page(sample_page("home", json!("A"))).await.unwrap();

        assert_eq!(repo.head_message(), "Update page home");
    }

    #[tokio::test]
    async fn unknown_page_is_none() {
        let repo = TempRepo::new();
        let provider = provider(&repo);
        assert!(provider.get_page("missing").await.unwrap().is_none());
        assert!(provider.get_page("../escape").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn listing_without_pages_dir_is_empty() {
        let repo = TempRepo::new();
        let provider = provider(&repo);
        assert!(provider.list_pages().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn lists_yaml_files_and_skips_garbage() {
        let repo = TempRepo::new();
        let provider = provider(&repo);
        provider.save_page(sample_page("home", json!("A"))).await.unwrap();
        provider.save_page(sample_page("about", json!("B"))).await.unwrap();
        repo.write_file("pages/notes.txt", "not a page");
        repo.write_file("pages/broken.yaml", "metadata: [unclosed");
        repo.write_file("pages/legacy.yml", "metadata:\n  name: legacy\n");

        let mut names: Vec<String> = provider
            .list_pages()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.metadata.name)
            .collect();
        names.sort();
        assert_eq!(names, vec!["about", "home", "legacy"]);
    }

    #[tokio::test]
    async fn listing_unreachable_repo_soft_fails() {
        let repo = TempRepo::new();
        repo.write_file("pages", "a file where the directory should be");

        let soft = GitProvider::new(repo.config(), ListingPolicy::SoftFail);
        assert!(soft.list_pages().await.unwrap().is_empty());

        let strict = provider(&repo);
        assert!(strict.list_pages().await.is_err());
    }

    #[tokio::test]
    async fn versions_exclude_current_state() {
        let repo = TempRepo::new();
        let provider = provider(&repo);

        provider.save_page(sample_page("home", json!("A"))).await.unwrap();
        assert!(provider.list_versions("home").await.unwrap().is_empty());

        provider.save_page(sample_page("home", json!("B"))).await.unwrap();
        provider.save_page(sample_page("home", json!("C"))).await.unwrap();

        let versions = provider.list_versions("home").await.unwrap();
        let contents: Vec<_> = versions.iter().map(|v| v.content.clone()).collect();
        assert_eq!(contents, vec![Some(json!("B")), Some(json!("A"))]);
        assert!(versions.iter().all(|v| v.version.as_str().len() == 40));
    }

    #[tokio::test]
    async fn versions_ignore_other_pages() {
        let repo = TempRepo::new();
        let provider = provider(&repo);

        provider.save_page(sample_page("home", json!("A"))).await.unwrap();
        provider.save_page(sample_page("about", json!("X"))).await.unwrap();
        provider.save_page(sample_page("home", json!("B"))).await.unwrap();
        provider.save_page(sample_page("about", json!("Y"))).await.unwrap();

        let versions = provider.list_versions("home").await.unwrap();
        assert_eq!(versions.len(), 1);
        assert_eq!(versions[0].content, Some(json!("A")));
    }

    #[tokio::test]
    async fn restore_scenario_keeps_history() {
        let repo = TempRepo::new();
        let provider = provider(&repo);

        provider.save_page(sample_page("home", json!("A"))).await.unwrap();
        provider.save_page(sample_page("home", json!("B"))).await.unwrap();

        let versions = provider.list_versions("home").await.unwrap();
        assert_eq!(versions.len(), 1);
        let target = versions[0].version.clone();

        let restored = provider.restore_version("home", &target).await.unwrap();
        assert_eq!(restored.spec.content, Some(json!("A")));
        assert_eq!(
            repo.head_message(),
            format!("Restore page home to version {}", &target.as_str()[..8])
        );

        let current = provider.get_page("home").await.unwrap().unwrap();
        assert_eq!(current.spec.content, Some(json!("A")));

        let versions = provider.list_versions("home").await.unwrap();
        assert_eq!(versions.len(), 2);
        assert_eq!(versions[0].content, Some(json!("B")));

        // Restoring the pre-restore snapshot brings "B" back
        let undo = versions[0].version.clone();
        let back = provider.restore_version("home", &undo).await.unwrap();
        assert_eq!(back.spec.content, Some(json!("B")));
    }

    #[tokio::test]
    async fn restore_accepts_abbreviated_hash() {
        let repo = TempRepo::new();
        let provider = provider(&repo);
        provider.save_page(sample_page("home", json!("A"))).await.unwrap();
        provider.save_page(sample_page("home", json!("B"))).await.unwrap();

        let full = provider.list_versions("home").await.unwrap()[0].version.clone();
        let short = VersionId::from(&full.as_str()[..10]);
        let restored = provider.restore_version("home", &short).await.unwrap();
        assert_eq!(restored.spec.content, Some(json!("A")));
    }

    #[tokio::test]
    async fn restore_unknown_version_or_page_is_not_found() {
        let repo = TempRepo::new();
        let provider = provider(&repo);
        provider.save_page(sample_page("home", json!("A"))).await.unwrap();
        provider.save_page(sample_page("about", json!("X"))).await.unwrap();

        let bogus = VersionId::from("0123456789abcdef0123456789abcdef01234567");
        assert!(provider.restore_version("home", &bogus).await.unwrap_err().is_not_found());

        let not_a_hash = VersionId::from("HEAD~1");
        assert!(provider.restore_version("home", &not_a_hash).await.unwrap_err().is_not_found());

        let head = VersionId::new(repo.head_id());
        assert!(provider.restore_version("missing", &head).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn restore_commit_without_page_file_is_not_found() {
        let repo = TempRepo::new();
        let provider = provider(&repo);
        provider.save_page(sample_page("about", json!("X"))).await.unwrap();
        let before_home = VersionId::new(repo.head_id());
        provider.save_page(sample_page("home", json!("A"))).await.unwrap();

        let err = provider.restore_version("home", &before_home).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            format!("Version '{}' not found for page 'home'", before_home)
        );
    }

    #[tokio::test]
    async fn unchanged_save_is_rejected() {
        let repo = TempRepo::new();
        let provider = provider(&repo);
        provider.save_page(sample_page("home", json!("A"))).await.unwrap();

        let err = provider.save_page(sample_page("home", json!("A"))).await.unwrap_err();
        assert!(matches!(err, ProviderError::Unchanged(_)));
    }

    #[tokio::test]
    async fn invalid_names_are_refused() {
        let repo = TempRepo::new();
        let provider = provider(&repo);
        let err = provider.save_page(sample_page("../outside", json!("A"))).await.unwrap_err();
        assert!(matches!(err, ProviderError::InvalidName(_)));
        assert!(!repo.path().join("outside.yaml").exists());
    }

    #[tokio::test]
    async fn delete_removes_page_and_history() {
        let repo = TempRepo::new();
        let provider = provider(&repo);
        provider.save_page(sample_page("home", json!("A"))).await.unwrap();
        provider.save_page(sample_page("home", json!("B"))).await.unwrap();

        provider.delete_page("home").await.unwrap();
        assert_eq!(repo.head_message(), "Delete page home");
        assert!(provider.get_page("home").await.unwrap().is_none());
        assert!(provider.list_versions("home").await.unwrap().is_empty());

        // A recreated page starts with a clean history
        provider.save_page(sample_page("home", json!("C"))).await.unwrap();
        assert!(provider.list_versions("home").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_missing_page_is_not_found() {
        let repo = TempRepo::new();
        let provider = provider(&repo);
        let err = provider.delete_page("ghost").await.unwrap_err();
        assert_eq!(err.to_string(), "Page 'ghost' not found");
    }

    #[tokio::test]
    async fn failed_commit_leaves_worktree_at_head() {
        let repo = TempRepo::new();
        let provider = provider(&repo);
        provider.save_page(sample_page("home", json!("A"))).await.unwrap();
        let head = repo.head_id();

        // An empty author name makes every commit fail after staging
        let mut config = repo.config();
        config.author_name = String::new();
        let broken = GitProvider::new(config, ListingPolicy::Strict);

        assert!(broken.save_page(sample_page("home", json!("B"))).await.is_err());
        assert!(broken.save_page(sample_page("about", json!("X"))).await.is_err());
        assert!(broken.delete_page("home").await.is_err());

        assert_eq!(repo.head_id(), head);
        assert_eq!(
            provider.get_page("home").await.unwrap().unwrap().spec.content,
            Some(json!("A"))
        );
        assert!(!repo.path().join("pages/about.yaml").exists());

        let statuses = git2::Repository::open(repo.path()).unwrap().statuses(None).unwrap().len();
        assert_eq!(statuses, 0);
    }

    #[tokio::test]
    async fn cancelled_mutation_keeps_the_write_lock_until_done() {
        let repo = TempRepo::new();
        let provider = std::sync::Arc::new(provider(&repo));
        let (started_tx, started_rx) = std::sync::mpsc::channel();
        let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();

        let task = {
            let provider = provider.clone();
            tokio::spawn(async move {
                provider
                    .run_exclusive(move |_| {
                        let _ = started_tx.send(());
                        let _ = release_rx.recv();
                        Ok(())
                    })
                    .await
            })
        };
        tokio::task::spawn_blocking(move || started_rx.recv()).await.unwrap().unwrap();

        task.abort();
        let _ = task.await;
        assert!(provider.write_lock.try_lock().is_err());

        release_tx.send(()).unwrap();
        let mut released = false;
        for _ in 0..200 {
            if provider.write_lock.try_lock().is_ok() {
                released = true;
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert!(released);
    }

    #[tokio::test]
    async fn concurrent_saves_to_different_pages_all_commit() {
        let repo = TempRepo::new();
        let provider = std::sync::Arc::new(provider(&repo));

        let mut tasks = Vec::new();
        for i in 0..8 {
            let provider = provider.clone();
            tasks.push(tokio::spawn(async move {
                provider.save_page(sample_page(&format!("page-{}", i), json!(i))).await
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(provider.list_pages().await.unwrap().len(), 8);
    }
}
