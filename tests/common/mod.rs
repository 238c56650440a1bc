#![allow(dead_code)]

use anyhow::Result;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::Value;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

use page_canvas::app::{app, AppState};
use page_canvas::auth::Authenticator;
use page_canvas::provider::git::GitConfig;
use page_canvas::provider::{
    DocumentProvider, GitProvider, ListingPolicy, MemoryDocumentStore, ProviderKind, SharedProvider,
};

/// In-process application with its own storage
pub struct TestApp {
    router: Router,
    pub provider: SharedProvider,
    _repo: Option<TempDir>,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestApp {
    /// Document provider over the in-process store, authentication off
    pub fn memory() -> Self {
        let provider: SharedProvider = Arc::new(
            DocumentProvider::new(MemoryDocumentStore::new(), ListingPolicy::Strict, true)
                .with_kind(ProviderKind::Memory),
        );
        Self::build(provider, None, None)
    }

    /// Git provider over a fresh repository, authentication off
    pub fn git() -> Self {
        let repo = tempfile::tempdir().expect("failed to create temp dir");
        git2::Repository::init(repo.path()).expect("failed to init repository");
        let provider: SharedProvider = Arc::new(GitProvider::new(
            GitConfig::for_repo(repo.path()),
            ListingPolicy::Strict,
        ));
        Self::build(provider, None, Some(repo))
    }

    /// Memory-backed app with authentication enabled
    pub fn with_auth(auth: Authenticator) -> Self {
        let memory = Self::memory();
        Self::build(memory.provider, Some(Arc::new(auth)), None)
    }

    fn build(provider: SharedProvider, auth: Option<Arc<Authenticator>>, repo: Option<TempDir>) -> Self {
        let router = app(AppState::new(provider.clone(), auth));
        Self {
            router,
            provider,
            _repo: repo,
        }
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<&Value>,
        token: Option<&str>,
    ) -> Result<TestResponse> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(body)?))?,
            None => builder.body(Body::empty())?,
        };

        let response = self.router.clone().oneshot(request).await?;
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)?
        };
        Ok(TestResponse { status, body })
    }

    pub async fn get(&self, uri: &str) -> Result<TestResponse> {
        self.request(Method::GET, uri, None, None).await
    }

    pub async fn post(&self, uri: &str, body: &Value) -> Result<TestResponse> {
        self.request(Method::POST, uri, Some(body), None).await
    }

    pub async fn post_empty(&self, uri: &str) -> Result<TestResponse> {
        self.request(Method::POST, uri, None, None).await
    }

    pub async fn delete(&self, uri: &str) -> Result<TestResponse> {
        self.request(Method::DELETE, uri, None, None).await
    }

    /// Send a raw body, for malformed-input tests
    pub async fn post_raw(&self, uri: &str, body: &str) -> Result<TestResponse> {
        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))?;
        let response = self.router.clone().oneshot(request).await?;
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
        Ok(TestResponse {
            status,
            body: serde_json::from_slice(&bytes).unwrap_or(Value::Null),
        })
    }
}

pub fn page(name: &str, content: Value) -> Value {
    serde_json::json!({ "metadata": { "name": name }, "spec": { "content": content } })
}
