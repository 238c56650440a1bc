pub mod auth;
pub mod permissions;

pub use auth::authenticate;
pub use permissions::require_page_access;
