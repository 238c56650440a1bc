use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Namespace stored for pages that do not carry one
pub const DEFAULT_NAMESPACE: &str = "default";

const MAX_NAME_LEN: usize = 200;

/// A named content document.
///
/// The same shape is used on the wire and in the git backend's page files:
/// `{ metadata: { name, namespace }, spec: { ... } }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub metadata: PageMetadata,
    #[serde(default)]
    pub spec: PageSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageMetadata {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

/// Page payload. Opaque to the providers apart from `content`, which is
/// the only field captured by versions. Fields without a typed slot are
/// kept in `extra` and written back unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_ref: Option<PageRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish: Option<PublishWindow>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Lookup-only reference to another page by name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRef {
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishWindow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_date: Option<String>,
}

impl Page {
    pub fn new(name: impl Into<String>, spec: PageSpec) -> Self {
        Self {
            metadata: PageMetadata {
                name: name.into(),
                namespace: None,
            },
            spec,
        }
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// Name of the parent page, if this page hangs below another one
    pub fn parent_name(&self) -> Option<&str> {
        self.spec.parent_ref.as_ref().map(|r| r.name.as_str())
    }
}

impl PageMetadata {
    pub fn namespace_or_default(&self) -> &str {
        self.namespace.as_deref().unwrap_or(DEFAULT_NAMESPACE)
    }
}

/// Check that a page name can be used as a storage key.
///
/// Names double as file names in the git backend, so anything that could
/// escape the pages directory is refused.
pub fn validate_page_name(name: &str) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err("Page name must not be empty".to_string());
    }
    if name.len() > MAX_NAME_LEN {
        return Err(format!("Page name must be at most {} bytes", MAX_NAME_LEN));
    }
    if name.starts_with('.') {
        return Err("Page name must not start with '.'".to_string());
    }
    if name.chars().any(|c| c == '/' || c == '\\' || c.is_control()) {
        return Err("Page name must not contain path separators or control characters".to_string());
    }
    Ok(())
}
