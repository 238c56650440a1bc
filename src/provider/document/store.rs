use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::model::{Page, PageMetadata, PageSpec, PageVersion, VersionId};
use crate::provider::ProviderError;

/// A document in the `pages` collection
#[derive(Debug, Clone, PartialEq)]
pub struct PageDocument {
    pub name: String,
    pub namespace: String,
    pub spec: PageSpec,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PageDocument {
    pub fn into_page(self) -> Page {
        Page {
            metadata: PageMetadata {
                name: self.name,
                namespace: Some(self.namespace),
            },
            spec: self.spec,
        }
    }
}

/// A document in the `page_versions` collection
#[derive(Debug, Clone, PartialEq)]
pub struct VersionDocument {
    pub name: String,
    pub version: String,
    pub timestamp: String,
    pub content: Option<Value>,
}

impl VersionDocument {
    pub fn into_version(self) -> PageVersion {
        PageVersion {
            version: VersionId::new(self.version),
            timestamp: self.timestamp,
            content: self.content,
        }
    }
}

/// One write in a batch applied by [`DocumentStore::apply`]
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentWrite {
    InsertVersion(VersionDocument),
    /// Replace namespace and spec, creating the page if needed
    UpsertPage {
        name: String,
        namespace: String,
        spec: PageSpec,
    },
    /// Replace only `spec.content` of an existing page
    SetContent {
        name: String,
        content: Option<Value>,
    },
    DeletePage {
        name: String,
    },
    DeleteVersions {
        name: String,
    },
}

/// Storage seam of the document provider.
///
/// The provider owns the versioning protocol; a store only persists the two
/// collections. `apply` must apply the whole batch or nothing.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn list_pages(&self) -> Result<Vec<PageDocument>, ProviderError>;

    async fn find_page(&self, name: &str) -> Result<Option<PageDocument>, ProviderError>;

    /// Versions of a page ordered by timestamp, newest first
    async fn list_versions(&self, name: &str) -> Result<Vec<VersionDocument>, ProviderError>;

    async fn find_version(&self, name: &str, version: &str) -> Result<Option<VersionDocument>, ProviderError>;

    async fn apply(&self, writes: Vec<DocumentWrite>) -> Result<(), ProviderError>;
}
