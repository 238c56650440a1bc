//! Page and version entities shared by the providers and their callers

pub mod page;
pub mod version;

pub use page::{validate_page_name, Page, PageMetadata, PageRef, PageSpec, PublishWindow, DEFAULT_NAMESPACE};
pub use version::{PageVersion, VersionId};
