// handlers/pages - /api/pages routes backed by the configured source provider

pub mod collection;
pub mod page;
pub mod versions;

// Re-export handler functions for use in routing
pub use collection::get as pages_get;
pub use collection::post as pages_post;

pub use page::delete as page_delete;
pub use page::get as page_get;

pub use versions::get as versions_get;
pub use versions::post as version_restore;
