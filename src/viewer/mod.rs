//! Build-time page data for the static viewer.
//!
//! The viewer is prerendered from a snapshot of all pages. [`build`] fetches
//! the pages from the API and writes the snapshot plus the route list.

use anyhow::Context;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use crate::model::Page;

/// Key marking the site's home page
pub const HOME_KEY: &str = "__home__";

pub const PAGES_FILE: &str = "pages-data.json";
pub const ROUTES_FILE: &str = "routes.json";

/// Fetch all pages from `<api_base_url>/pages`.
///
/// A build must not fail because the API is down, so every failure is
/// logged and yields an empty list.
pub async fn fetch_pages(api_base_url: Option<&str>, token: Option<&str>) -> Vec<Page> {
    let Some(base) = api_base_url.filter(|b| !b.is_empty()) else {
        warn!("No API base URL configured, building without pages");
        return Vec::new();
    };

    let url = format!("{}/pages", base.trim_end_matches('/'));
    let mut request = reqwest::Client::new().get(&url);
    if let Some(token) = token {
        request = request.bearer_auth(token);
    }

    let response = match request.send().await {
        Ok(response) => response,
        Err(e) => {
            error!("Failed to fetch pages from {}: {}", url, e);
            return Vec::new();
        }
    };
    if !response.status().is_success() {
        error!("Failed to fetch pages from {}: {}", url, response.status());
        return Vec::new();
    }

    match response.json::<Vec<Page>>().await {
        Ok(pages) => pages,
        Err(e) => {
            error!("Failed to decode pages from {}: {}", url, e);
            Vec::new()
        }
    }
}

/// Route lookups over a page snapshot
pub struct PageIndex {
    pages: Vec<Page>,
    by_name: HashMap<String, usize>,
}

impl PageIndex {
    pub fn new(pages: Vec<Page>) -> Self {
        let by_name = pages
            .iter()
            .enumerate()
            .map(|(i, p)| (p.metadata.name.clone(), i))
            .collect();
        Self { pages, by_name }
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    /// The page keyed as home that has no parent
    pub fn home_page(&self) -> Option<&Page> {
        self.pages
            .iter()
            .find(|p| p.spec.key.as_deref() == Some(HOME_KEY) && p.parent_name().is_none())
    }

    /// Page with the given key, preferring one that hangs below a parent
    pub fn page_by_key(&self, key: &str) -> Option<&Page> {
        let matches = |p: &&Page| p.spec.key.as_deref() == Some(key);
        self.pages
            .iter()
            .filter(matches)
            .find(|p| p.parent_name().is_some())
            .or_else(|| self.pages.iter().find(matches))
    }

    /// `/` followed by the full path of every page, without duplicates
    pub fn all_routes(&self) -> Vec<String> {
        let mut routes = vec!["/".to_string()];
        for page in &self.pages {
            let path = self.full_path(page);
            if path != "/" && !routes.contains(&path) {
                routes.push(path);
            }
        }
        routes
    }

    /// Flat `/<key>` route per page, as handed to the prerenderer
    pub fn prerender_routes(&self) -> Vec<String> {
        let mut routes: Vec<String> = Vec::new();
        for page in &self.pages {
            let key = route_key(page);
            let route = if key == HOME_KEY { "/".to_string() } else { format!("/{}", key) };
            if !routes.contains(&route) {
                routes.push(route);
            }
        }
        routes
    }

    /// Path built from the parent chain. A chain that loops back on itself
    /// is cut where the loop closes.
    pub fn full_path(&self, page: &Page) -> String {
        let mut segments = Vec::new();
        let mut seen = HashSet::new();
        let mut current = Some(page);

        while let Some(page) = current {
            if !seen.insert(page.metadata.name.as_str()) {
                break;
            }
            let key = route_key(page);
            if key == HOME_KEY {
                break;
            }
            segments.push(key);
            current = page
                .parent_name()
                .and_then(|parent| self.by_name.get(parent))
                .map(|&i| &self.pages[i]);
        }

        segments.reverse();
        format!("/{}", segments.join("/"))
    }
}

/// Route segment of a page: its key, or its name when the key is unset or empty
fn route_key(page: &Page) -> &str {
    page.spec
        .key
        .as_deref()
        .filter(|key| !key.is_empty())
        .unwrap_or(&page.metadata.name)
}

#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub api_base_url: Option<String>,
    pub token: Option<String>,
    pub out_dir: PathBuf,
}

#[derive(Debug, Serialize)]
pub struct RouteManifest {
    pub routes: Vec<String>,
    pub prerender: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct BuildSummary {
    pub pages: usize,
    pub routes: usize,
    pub out_dir: PathBuf,
}

/// Fetch pages and write the page snapshot and route manifest
pub async fn build(options: &BuildOptions) -> anyhow::Result<BuildSummary> {
    let pages = fetch_pages(options.api_base_url.as_deref(), options.token.as_deref()).await;
    let index = PageIndex::new(pages);
    let manifest = RouteManifest {
        routes: index.all_routes(),
        prerender: index.prerender_routes(),
    };

    fs::create_dir_all(&options.out_dir)
        .with_context(|| format!("failed to create {}", options.out_dir.display()))?;
    write_json(&options.out_dir.join(PAGES_FILE), index.pages())?;
    write_json(&options.out_dir.join(ROUTES_FILE), &manifest)?;

    info!(
        "Wrote {} pages and {} routes to {}",
        index.pages().len(),
        manifest.routes.len(),
        options.out_dir.display()
    );
    Ok(BuildSummary {
        pages: index.pages().len(),
        routes: manifest.routes.len(),
        out_dir: options.out_dir.clone(),
    })
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> anyhow::Result<()> {
    let body = serde_json::to_string_pretty(value)?;
    fs::write(path, body).with_context(|| format!("failed to write {}", path.display()))
}
