//! Per-site configuration layered onto the viewer's framework config.
//!
//! A site ships a `config.yaml` with stylesheets, modules, layers and
//! runtime settings. [`extend_framework_config`] folds it into the base
//! config, which is handled as plain JSON.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

static ENV_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"process\.env\.(\w+)").expect("valid env token pattern"));

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_config: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub css: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub packages: Option<Vec<SitePackage>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modules: Option<Vec<ModuleEntry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nuxt_extends: Option<Vec<ExtendsEntry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub devtools: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SitePackage {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// `name` or `[name, { options }]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ModuleEntry {
    Name(String),
    WithOptions(String, Map<String, Value>),
}

/// `layer` or `[layer, { auth }]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExtendsEntry {
    Layer(String),
    WithAuth(String, ExtendsAuth),
    Bare((String,)),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtendsAuth {
    pub auth: String,
}

/// Replace `process.env.NAME` tokens. Unknown or empty variables leave the
/// token in place.
pub fn substitute_env<F>(text: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    ENV_TOKEN
        .replace_all(text, |caps: &Captures| {
            lookup(&caps[1])
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Path of the site config: `$CONFIG_FILE`, else `<dir>/config.yaml`
pub fn config_path(dir: &Path) -> PathBuf {
    env::var_os("CONFIG_FILE")
        .map(PathBuf::from)
        .unwrap_or_else(|| dir.join("config.yaml"))
}

/// Load the site config for `dir`. Any failure yields `None`.
pub fn load_site_config(dir: &Path) -> Option<SiteConfig> {
    read_site_config(&config_path(dir), |name| env::var(name).ok())
}

fn read_site_config<F>(path: &Path, lookup: F) -> Option<SiteConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) => {
            debug!("No site config at {}: {}", path.display(), e);
            return None;
        }
    };

    match serde_yaml::from_str::<Option<SiteConfig>>(&substitute_env(&raw, lookup)) {
        Ok(config) => config,
        Err(e) => {
            warn!("Ignoring unreadable site config {}: {}", path.display(), e);
            None
        }
    }
}

/// Merge `source` into `target`: arrays concatenate, objects merge
/// recursively, everything else is replaced by the source value.
pub fn deep_merge(target: &Map<String, Value>, source: &Map<String, Value>) -> Map<String, Value> {
    let mut result = target.clone();
    for (key, s_val) in source {
        let merged = match (target.get(key), s_val) {
            (Some(Value::Array(t)), Value::Array(s)) => Value::Array(t.iter().chain(s).cloned().collect()),
            (Some(Value::Object(t)), Value::Object(s)) => Value::Object(deep_merge(t, s)),
            _ => s_val.clone(),
        };
        result.insert(key.clone(), merged);
    }
    result
}

/// Apply a site config to a framework config object
pub fn extend_config(site: &SiteConfig, config: Value) -> Value {
    let mut config = match config {
        Value::Object(map) => map,
        _ => Map::new(),
    };

    if let Some(css) = &site.css {
        append(&mut config, "css", css.iter().map(|c| json!(c)));
    }

    if let Some(layers) = &site.nuxt_extends {
        append(&mut config, "extends", layers.iter().map(|l| json!(l)));
    }

    if let Some(modules) = &site.modules {
        append(&mut config, "modules", modules.iter().map(|m| json!(m)));
    }

    if let Some(hostname) = &site.hostname {
        let vite = object_entry(&mut config, "vite");
        let server = object_entry(vite, "server");
        append(server, "allowedHosts", std::iter::once(json!(hostname)));
    }

    if let Some(runtime) = &site.runtime_config {
        let base = match config.get("runtimeConfig") {
            Some(Value::Object(base)) => base.clone(),
            _ => Map::new(),
        };
        config.insert("runtimeConfig".to_string(), Value::Object(deep_merge(&base, runtime)));
    }

    if let Some(enabled) = site.devtools {
        config.insert("devtools".to_string(), json!({ "enabled": enabled }));
    }

    Value::Object(config)
}

/// Load the site config from `dir` and apply it; unchanged when absent
pub fn extend_framework_config(dir: &Path, config: Value) -> Value {
    match load_site_config(dir) {
        Some(site) => extend_config(&site, config),
        None => config,
    }
}

fn append(map: &mut Map<String, Value>, key: &str, items: impl Iterator<Item = Value>) {
    let mut values = match map.remove(key) {
        Some(Value::Array(existing)) => existing,
        _ => Vec::new(),
    };
    values.extend(items);
    map.insert(key.to_string(), Value::Array(values));
}

fn object_entry<'a>(map: &'a mut Map<String, Value>, key: &str) -> &'a mut Map<String, Value> {
    let entry = map.entry(key.to_string()).or_insert_with(|| json!({}));
    if !entry.is_object() {
        *entry = json!({});
    }
    match entry {
        Value::Object(inner) => inner,
        _ => unreachable!("entry was just made an object"),
    }
}
