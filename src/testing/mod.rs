use git2::Repository;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

use crate::model::{Page, PageSpec};
use crate::provider::git::GitConfig;

/// Throwaway git working tree for provider tests
pub struct TempRepo {
    dir: TempDir,
}

impl TempRepo {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        Repository::init(dir.path()).expect("failed to init repository");
        Self { dir }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn config(&self) -> GitConfig {
        GitConfig::for_repo(self.path())
    }

    /// Write a file relative to the repository root without committing it
    pub fn write_file(&self, rel: &str, content: &str) {
        let path = self.path().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("failed to create parent dir");
        }
        fs::write(path, content).expect("failed to write file");
    }

    pub fn head_message(&self) -> String {
        let repo = Repository::open(self.path()).expect("failed to open repository");
        let commit = repo.head().and_then(|h| h.peel_to_commit()).expect("no HEAD commit");
        commit.message().unwrap_or_default().to_string()
    }

    pub fn head_id(&self) -> String {
        let repo = Repository::open(self.path()).expect("failed to open repository");
        let commit = repo.head().and_then(|h| h.peel_to_commit()).expect("no HEAD commit");
        commit.id().to_string()
    }
}

/// Page with only `content` set
pub fn sample_page(name: &str, content: Value) -> Page {
    Page::new(
        name,
        PageSpec {
            content: Some(content),
            ..PageSpec::default()
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temp_repo_is_a_git_repository() {
        let repo = TempRepo::new();
        assert!(repo.path().join(".git").is_dir());
    }

    #[test]
    fn sample_page_sets_only_content() {
        let page = sample_page("home", Value::from("A"));
        assert_eq!(page.name(), "home");
        assert!(page.spec.title.is_none());
        assert_eq!(page.spec.content, Some(Value::from("A")));
    }
}
