//! Document-store provider: current pages in one collection, snapshots of
//! prior content in another.

pub mod memory;
pub mod postgres;
pub mod store;

use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, SubsecRound, Utc};
use std::sync::{Mutex, PoisonError};
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, info};

pub use memory::MemoryDocumentStore;
pub use postgres::PgDocumentStore;
pub use store::{DocumentStore, DocumentWrite, PageDocument, VersionDocument};

use super::{ListingPolicy, PageLocks, ProviderError, ProviderKind, SourceProvider};
use crate::model::{validate_page_name, Page, PageVersion, VersionId};

/// Strictly increasing microsecond timestamps for version ids
#[derive(Debug, Default)]
pub struct VersionClock {
    last: Mutex<Option<DateTime<Utc>>>,
}

impl VersionClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self) -> String {
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        let mut now = Utc::now().trunc_subsecs(6);
        if let Some(prev) = *last {
            if now <= prev {
                now = prev + Duration::microseconds(1);
            }
        }
        *last = Some(now);
        now.to_rfc3339_opts(SecondsFormat::Micros, true)
    }
}

pub struct DocumentProvider<S> {
    store: S,
    kind: ProviderKind,
    listing: ListingPolicy,
    clock: VersionClock,
    locks: Option<PageLocks>,
}

impl<S: DocumentStore> DocumentProvider<S> {
    pub fn new(store: S, listing: ListingPolicy, serialize_writes: bool) -> Self {
        Self {
            store,
            kind: ProviderKind::Document,
            listing,
            clock: VersionClock::new(),
            locks: serialize_writes.then(PageLocks::new),
        }
    }

    /// Report a different variant tag, used for the in-process store
    pub fn with_kind(mut self, kind: ProviderKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    async fn lock(&self, name: &str) -> Option<OwnedMutexGuard<()>> {
        match &self.locks {
            Some(locks) => Some(locks.acquire(name).await),
            None => None,
        }
    }

    /// Current document, with an undecodable one read as absent
    async fn find_readable(&self, name: &str) -> Result<Option<PageDocument>, ProviderError> {
        match self.store.find_page(name).await {
            Err(ProviderError::Parse(detail)) => {
                debug!(provider = %self.kind, "Treating unreadable page {} as absent: {}", name, detail);
                Ok(None)
            }
            result => result,
        }
    }

    fn snapshot(&self, doc: &PageDocument) -> DocumentWrite {
        let stamp = self.clock.next();
        DocumentWrite::InsertVersion(VersionDocument {
            name: doc.name.clone(),
            version: stamp.clone(),
            timestamp: stamp,
            content: doc.spec.content.clone(),
        })
    }
}

#[async_trait]
impl<S: DocumentStore + 'static> SourceProvider for DocumentProvider<S> {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn list_pages(&self) -> Result<Vec<Page>, ProviderError> {
        let result = self
            .store
            .list_pages()
            .await
            .map(|docs| docs.into_iter().map(PageDocument::into_page).collect());
        self.listing.absorb(self.kind, "list_pages", result)
    }

    async fn get_page(&self, name: &str) -> Result<Option<Page>, ProviderError> {
        Ok(self.find_readable(name).await?.map(PageDocument::into_page))
    }

    async fn save_page(&self, page: Page) -> Result<Page, ProviderError> {
        let name = page.name().to_string();
        validate_page_name(&name).map_err(ProviderError::InvalidName)?;
        let _guard = self.lock(&name).await;

        let mut writes = Vec::with_capacity(2);
        // An unreadable document is replaced without a snapshot
        if let Some(existing) = self.find_readable(&name).await? {
            writes.push(self.snapshot(&existing));
        }
        writes.push(DocumentWrite::UpsertPage {
            name: name.clone(),
            namespace: page.metadata.namespace_or_default().to_string(),
            spec: page.spec.clone(),
        });
        self.store.apply(writes).await?;

        info!(provider = %self.kind, "Saved page {}", name);
        Ok(page)
    }

    async fn delete_page(&self, name: &str) -> Result<(), ProviderError> {
        let _guard = self.lock(name).await;
        self.store
            .apply(vec![
                DocumentWrite::DeletePage { name: name.to_string() },
                DocumentWrite::DeleteVersions { name: name.to_string() },
            ])
            .await?;
        info!(provider = %self.kind, "Deleted page {}", name);
        Ok(())
    }

    async fn list_versions(&self, name: &str) -> Result<Vec<PageVersion>, ProviderError> {
        let result = self
            .store
            .list_versions(name)
            .await
            .map(|docs| docs.into_iter().map(VersionDocument::into_version).collect());
        self.listing.absorb(self.kind, "list_versions", result)
    }

    async fn restore_version(&self, name: &str, version: &VersionId) -> Result<Page, ProviderError> {
        let _guard = self.lock(name).await;

        let target = self
            .store
            .find_version(name, version.as_str())
            .await?
            .ok_or_else(|| ProviderError::version_not_found(name, version))?;
        let current = self
            .store
            .find_page(name)
            .await?
            .ok_or_else(|| ProviderError::page_not_found(name))?;

        self.store
            .apply(vec![
                self.snapshot(&current),
                DocumentWrite::SetContent {
                    name: name.to_string(),
                    content: target.content.clone(),
                },
            ])
            .await?;

        info!(provider = %self.kind, "Restored page {} to version {}", name, version);
        let mut page = current.into_page();
        page.spec.content = target.content;
        Ok(page)
    }
}
