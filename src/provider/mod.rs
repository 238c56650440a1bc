//! Page storage providers.
//!
//! Every backend implements [`SourceProvider`]. The process selects one
//! variant through [`factory::source_provider`] and shares it with all
//! request handlers.

pub mod document;
pub mod factory;
pub mod git;
pub mod locks;

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

use crate::model::{Page, PageVersion, VersionId};

pub use document::{DocumentProvider, MemoryDocumentStore, PgDocumentStore};
pub use factory::{build_provider, source_provider};
pub use git::GitProvider;
pub use locks::PageLocks;

/// Shared handle to the process-wide provider
pub type SharedProvider = Arc<dyn SourceProvider>;

/// Errors raised by providers
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{0}")]
    NotFound(String),

    #[error("Missing configuration: {0}")]
    Config(String),

    #[error("Unsupported provider: '{0}'. Supported: mongodb, document, git, memory")]
    UnsupportedProvider(String),

    #[error("Invalid page name: {0}")]
    InvalidName(String),

    #[error("Could not parse {0}")]
    Parse(String),

    #[error("Nothing to commit: {0}")]
    Unchanged(String),

    #[error(transparent)]
    Git(#[from] git2::Error),

    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl ProviderError {
    pub fn page_not_found(name: &str) -> Self {
        ProviderError::NotFound(format!("Page '{}' not found", name))
    }

    pub fn version_not_found(name: &str, version: &VersionId) -> Self {
        ProviderError::NotFound(format!("Version '{}' not found for page '{}'", version, name))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ProviderError::NotFound(_))
    }
}

/// Backend variant tag. `mongodb` and `document` both select the
/// document-store backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Document,
    Git,
    Memory,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Document => "document",
            ProviderKind::Git => "git",
            ProviderKind::Memory => "memory",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mongodb" | "document" => Ok(ProviderKind::Document),
            "git" => Ok(ProviderKind::Git),
            "memory" => Ok(ProviderKind::Memory),
            other => Err(ProviderError::UnsupportedProvider(other.to_string())),
        }
    }
}

/// How listing operations treat backend failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListingPolicy {
    /// Log the failure and return an empty list
    #[default]
    SoftFail,
    /// Propagate the failure to the caller
    Strict,
}

impl ListingPolicy {
    pub fn from_strict(strict: bool) -> Self {
        if strict {
            ListingPolicy::Strict
        } else {
            ListingPolicy::SoftFail
        }
    }

    /// The one place where listing failures are swallowed
    pub fn absorb<T>(
        self,
        kind: ProviderKind,
        operation: &str,
        result: Result<Vec<T>, ProviderError>,
    ) -> Result<Vec<T>, ProviderError> {
        match (self, result) {
            (_, Ok(items)) => Ok(items),
            (ListingPolicy::Strict, Err(e)) => Err(e),
            (ListingPolicy::SoftFail, Err(e)) => {
                warn!(provider = %kind, "{} failed, returning empty list: {}", operation, e);
                Ok(Vec::new())
            }
        }
    }
}

/// Capability contract shared by all page storage backends
#[async_trait]
pub trait SourceProvider: Send + Sync {
    /// Which backend variant this is
    fn kind(&self) -> ProviderKind;

    /// All current pages, unordered
    async fn list_pages(&self) -> Result<Vec<Page>, ProviderError>;

    /// Current page, or `None` when absent
    async fn get_page(&self, name: &str) -> Result<Option<Page>, ProviderError>;

    /// Upsert the page as current, snapshotting the previous state first
    async fn save_page(&self, page: Page) -> Result<Page, ProviderError>;

    /// Remove the page and its history
    async fn delete_page(&self, name: &str) -> Result<(), ProviderError>;

    /// Prior versions of a page, newest first
    async fn list_versions(&self, name: &str) -> Result<Vec<PageVersion>, ProviderError>;

    /// Make a historical version current again. The pre-restore state is
    /// kept as a new version.
    async fn restore_version(&self, name: &str, version: &VersionId) -> Result<Page, ProviderError>;
}
