use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub provider: ProviderSettings,
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub enable_request_logging: bool,
}

/// Raw provider settings. Validation (required paths, URIs) happens when
/// the selected provider is constructed, not here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSettings {
    pub backend: String,
    pub strict_listing: bool,
    pub serialize_writes: bool,
    pub git: GitSettings,
    pub document: DocumentSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitSettings {
    pub repo_path: Option<PathBuf>,
    pub branch: String,
    pub pages_dir: String,
    pub author_name: String,
    pub author_email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentSettings {
    pub database_url: Option<String>,
    pub database: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub enabled: bool,
    pub jwks_url: String,
    pub issuer: String,
    pub audience: Option<String>,
    pub keto_read_url: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| env::var(key).ok())
    }

    /// Apply overrides from `lookup`, which maps a variable name to its value
    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.is_empty());

        // Server overrides
        if let Some(port) = lookup("PAGE_CANVAS_PORT")
            .or_else(|| lookup("PORT"))
            .and_then(|v| v.parse().ok())
        {
            self.server.port = port;
        }
        if let Some(v) = lookup("API_ENABLE_REQUEST_LOGGING") {
            self.server.enable_request_logging = v.parse().unwrap_or(self.server.enable_request_logging);
        }

        // Provider overrides
        if let Some(v) = lookup("PAGE_CANVAS_PROVIDER") {
            self.provider.backend = v;
        }
        if let Some(v) = lookup("PAGE_CANVAS_STRICT_LISTING") {
            self.provider.strict_listing = v.parse().unwrap_or(self.provider.strict_listing);
        }
        if let Some(v) = lookup("PAGE_CANVAS_SERIALIZE_WRITES") {
            self.provider.serialize_writes = v.parse().unwrap_or(self.provider.serialize_writes);
        }

        // Git overrides
        if let Some(v) = non_empty("GIT_REPO_PATH") {
            self.provider.git.repo_path = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("GIT_BRANCH") {
            self.provider.git.branch = v;
        }
        if let Some(v) = lookup("GIT_PAGES_DIR") {
            self.provider.git.pages_dir = v;
        }
        if let Some(v) = lookup("GIT_AUTHOR_NAME") {
            self.provider.git.author_name = v;
        }
        if let Some(v) = lookup("GIT_AUTHOR_EMAIL") {
            self.provider.git.author_email = v;
        }

        // Document store overrides, MONGODB_* as fallbacks
        if let Some(v) = non_empty("DATABASE_URL").or_else(|| non_empty("MONGODB_URI")) {
            self.provider.document.database_url = Some(v);
        }
        if let Some(v) = non_empty("PAGE_CANVAS_DATABASE").or_else(|| non_empty("MONGODB_DATABASE")) {
            self.provider.document.database = v;
        }

        // Auth overrides
        if let Some(v) = lookup("AUTH_ENABLED") {
            self.auth.enabled = v.parse().unwrap_or(self.auth.enabled);
        }
        if let Some(v) = lookup("ORY_HYDRA_JWKS_URL") {
            self.auth.jwks_url = v;
        }
        if let Some(v) = lookup("ORY_HYDRA_ISSUER") {
            self.auth.issuer = v;
        }
        if let Some(v) = lookup("ORY_HYDRA_AUDIENCE") {
            self.auth.audience = Some(v).filter(|s| !s.is_empty());
        }
        if let Some(v) = lookup("ORY_KETO_READ_URL") {
            self.auth.keto_read_url = v;
        }

        self
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig {
                port: 3000,
                enable_request_logging: true,
            },
            provider: ProviderSettings::defaults(),
            auth: AuthConfig {
                enabled: false,
                ..AuthConfig::defaults()
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            server: ServerConfig {
                port: 3000,
                enable_request_logging: true,
            },
            provider: ProviderSettings::defaults(),
            auth: AuthConfig::defaults(),
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            server: ServerConfig {
                port: 3000,
                enable_request_logging: false,
            },
            provider: ProviderSettings::defaults(),
            auth: AuthConfig::defaults(),
        }
    }
}

impl ProviderSettings {
    fn defaults() -> Self {
        Self {
            backend: "mongodb".to_string(),
            strict_listing: false,
            serialize_writes: true,
            git: GitSettings {
                repo_path: None,
                branch: "main".to_string(),
                pages_dir: "pages".to_string(),
                author_name: "page-canvas".to_string(),
                author_email: "page-canvas@localhost".to_string(),
            },
            document: DocumentSettings {
                database_url: None,
                database: "page-canvas".to_string(),
            },
        }
    }
}

impl AuthConfig {
    fn defaults() -> Self {
        Self {
            enabled: true,
            jwks_url: "http://ory-hydra-public.ory.svc.cluster.local/.well-known/jwks.json".to_string(),
            issuer: "https://hydra.versa-stack.localdev".to_string(),
            audience: None,
            keto_read_url: "http://ory-keto-read.ory.svc.cluster.local:4466".to_string(),
        }
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}
