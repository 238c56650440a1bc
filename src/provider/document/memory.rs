use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use super::store::{DocumentStore, DocumentWrite, PageDocument, VersionDocument};
use crate::provider::ProviderError;

/// In-process document store for local development and tests
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    state: RwLock<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    pages: BTreeMap<String, PageDocument>,
    versions: Vec<VersionDocument>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn list_pages(&self) -> Result<Vec<PageDocument>, ProviderError> {
        Ok(self.state.read().await.pages.values().cloned().collect())
    }

    async fn find_page(&self, name: &str) -> Result<Option<PageDocument>, ProviderError> {
        Ok(self.state.read().await.pages.get(name).cloned())
    }

    async fn list_versions(&self, name: &str) -> Result<Vec<VersionDocument>, ProviderError> {
        let state = self.state.read().await;
        let mut versions: Vec<VersionDocument> = state.versions.iter().filter(|v| v.name == name).cloned().collect();
        versions.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(versions)
    }

    async fn find_version(&self, name: &str, version: &str) -> Result<Option<VersionDocument>, ProviderError> {
        let state = self.state.read().await;
        Ok(state
            .versions
            .iter()
            .find(|v| v.name == name && v.version == version)
            .cloned())
    }

    async fn apply(&self, writes: Vec<DocumentWrite>) -> Result<(), ProviderError> {
        // A single write guard makes the batch atomic for readers
        let mut state = self.state.write().await;
        let now = Utc::now();

        for write in writes {
            match write {
                DocumentWrite::InsertVersion(version) => state.versions.push(version),
                DocumentWrite::UpsertPage { name, namespace, spec } => match state.pages.get_mut(&name) {
                    Some(doc) => {
                        doc.namespace = namespace;
                        doc.spec = spec;
                        doc.updated_at = now;
                    }
                    None => {
                        let doc = PageDocument {
                            name: name.clone(),
                            namespace,
                            spec,
                            created_at: now,
                            updated_at: now,
                        };
                        state.pages.insert(name, doc);
                    }
                },
                DocumentWrite::SetContent { name, content } => {
                    if let Some(doc) = state.pages.get_mut(&name) {
                        doc.spec.content = content;
                        doc.updated_at = now;
                    }
                }
                DocumentWrite::DeletePage { name } => {
                    state.pages.remove(&name);
                }
                DocumentWrite::DeleteVersions { name } => {
                    state.versions.retain(|v| v.name != name);
                }
            }
        }
        Ok(())
    }
}
