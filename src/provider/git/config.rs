use std::path::{Path, PathBuf};

use crate::config::GitSettings;
use crate::provider::ProviderError;

/// Validated git provider configuration
#[derive(Debug, Clone)]
pub struct GitConfig {
    pub repo_path: PathBuf,
    /// Read for completeness; commits always go to the checked-out HEAD
    pub branch: String,
    pub pages_dir: String,
    pub author_name: String,
    pub author_email: String,
}

impl GitConfig {
    pub fn from_settings(settings: &GitSettings) -> Result<Self, ProviderError> {
        let repo_path = settings.repo_path.clone().ok_or_else(|| {
            ProviderError::Config("GIT_REPO_PATH environment variable is required for Git provider".to_string())
        })?;

        Ok(Self {
            repo_path,
            branch: settings.branch.clone(),
            pages_dir: settings.pages_dir.clone(),
            author_name: settings.author_name.clone(),
            author_email: settings.author_email.clone(),
        })
    }

    /// Config for a repository at `path` with default branch, directory and author
    pub fn for_repo(path: impl AsRef<Path>) -> Self {
        Self {
            repo_path: path.as_ref().to_path_buf(),
            branch: "main".to_string(),
            pages_dir: "pages".to_string(),
            author_name: "page-canvas".to_string(),
            author_email: "page-canvas@localhost".to_string(),
        }
    }

    pub fn pages_path(&self) -> PathBuf {
        self.repo_path.join(&self.pages_dir)
    }

    pub fn page_path(&self, name: &str) -> PathBuf {
        self.pages_path().join(page_file_name(name))
    }

    /// Path of the page file relative to the repository root
    pub fn relative_path(&self, name: &str) -> PathBuf {
        Path::new(&self.pages_dir).join(page_file_name(name))
    }
}

fn page_file_name(name: &str) -> String {
    format!("{}.yaml", name)
}
