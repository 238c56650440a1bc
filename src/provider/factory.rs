use once_cell::sync::OnceCell;
use std::sync::Arc;
use tracing::info;

use super::git::{GitConfig, GitProvider};
use super::{
    DocumentProvider, ListingPolicy, MemoryDocumentStore, PgDocumentStore, ProviderError, ProviderKind,
    SharedProvider,
};
use crate::config::{config, ProviderSettings};

static PROVIDER: OnceCell<SharedProvider> = OnceCell::new();

/// Build the provider selected by `settings.backend`
pub fn build_provider(settings: &ProviderSettings) -> Result<SharedProvider, ProviderError> {
    let kind: ProviderKind = settings.backend.parse()?;
    let listing = ListingPolicy::from_strict(settings.strict_listing);

    let provider: SharedProvider = match kind {
        ProviderKind::Git => Arc::new(GitProvider::new(GitConfig::from_settings(&settings.git)?, listing)),
        ProviderKind::Document => Arc::new(DocumentProvider::new(
            PgDocumentStore::new(&settings.document)?,
            listing,
            settings.serialize_writes,
        )),
        ProviderKind::Memory => Arc::new(
            DocumentProvider::new(MemoryDocumentStore::new(), listing, settings.serialize_writes)
                .with_kind(ProviderKind::Memory),
        ),
    };

    info!(provider = %kind, "Initialized source provider");
    Ok(provider)
}

/// Process-wide provider, built from configuration on first call.
///
/// A failed build is not cached; the next call tries again.
pub fn source_provider() -> Result<SharedProvider, ProviderError> {
    PROVIDER
        .get_or_try_init(|| build_provider(&config().provider))
        .cloned()
}
