use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{postgres::PgPoolOptions, types::Json, FromRow, PgPool};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use super::store::{DocumentStore, DocumentWrite, PageDocument, VersionDocument};
use crate::config::DocumentSettings;
use crate::provider::ProviderError;

const SCHEMA: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS pages (
        name TEXT PRIMARY KEY,
        namespace TEXT NOT NULL DEFAULT 'default',
        spec JSONB NOT NULL DEFAULT '{}'::jsonb,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS page_versions (
        id BIGSERIAL PRIMARY KEY,
        name TEXT NOT NULL,
        version TEXT NOT NULL,
        "timestamp" TEXT NOT NULL,
        content JSONB
    )"#,
    r#"CREATE INDEX IF NOT EXISTS page_versions_name_timestamp_idx
        ON page_versions (name, "timestamp" DESC)"#,
];

/// PostgreSQL-backed document store. Pages and versions are kept as JSONB
/// documents in the `pages` and `page_versions` tables.
pub struct PgDocumentStore {
    connection_string: String,
    pool: OnceCell<PgPool>,
}

#[derive(FromRow)]
struct PageRow {
    name: String,
    namespace: String,
    spec: Json<Value>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct VersionRow {
    name: String,
    version: String,
    timestamp: String,
    content: Option<Json<Value>>,
}

impl TryFrom<PageRow> for PageDocument {
    type Error = ProviderError;

    fn try_from(row: PageRow) -> Result<Self, Self::Error> {
        let spec = serde_json::from_value(row.spec.0)
            .map_err(|e| ProviderError::Parse(format!("stored spec of page '{}': {}", row.name, e)))?;
        Ok(PageDocument {
            name: row.name,
            namespace: row.namespace,
            spec,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl From<VersionRow> for VersionDocument {
    fn from(row: VersionRow) -> Self {
        VersionDocument {
            name: row.name,
            version: row.version,
            timestamp: row.timestamp,
            content: row.content.map(|c| c.0).filter(|c| !c.is_null()),
        }
    }
}

impl PgDocumentStore {
    /// Validates configuration only; the connection is opened on first use
    pub fn new(settings: &DocumentSettings) -> Result<Self, ProviderError> {
        let base = settings.database_url.as_deref().ok_or_else(|| {
            ProviderError::Config(
                "DATABASE_URL (or MONGODB_URI) environment variable is required for document provider".to_string(),
            )
        })?;

        Ok(Self {
            connection_string: build_connection_string(base, &settings.database)?,
            pool: OnceCell::new(),
        })
    }

    async fn pool(&self) -> Result<&PgPool, ProviderError> {
        self.pool
            .get_or_try_init(|| async {
                let pool = PgPoolOptions::new().connect(&self.connection_string).await?;
                for statement in SCHEMA {
                    sqlx::query(statement).execute(&pool).await?;
                }
                info!("Connected document store");
                Ok::<_, ProviderError>(pool)
            })
            .await
    }
}

/// Decode listed rows, skipping any whose stored spec no longer decodes
fn decode_pages(rows: Vec<PageRow>) -> Vec<PageDocument> {
    rows.into_iter()
        .filter_map(|row| match PageDocument::try_from(row) {
            Ok(doc) => Some(doc),
            Err(e) => {
                debug!("Skipping unreadable page row: {}", e);
                None
            }
        })
        .collect()
}

/// Swap the database name into the path of the base connection URI
fn build_connection_string(base: &str, database: &str) -> Result<String, ProviderError> {
    let mut url = url::Url::parse(base).map_err(|e| ProviderError::Config(format!("invalid DATABASE_URL: {}", e)))?;
    url.set_path(&format!("/{}", database));
    Ok(url.into())
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn list_pages(&self) -> Result<Vec<PageDocument>, ProviderError> {
        let pool = self.pool().await?;
        let rows = sqlx::query_as::<_, PageRow>("SELECT name, namespace, spec, created_at, updated_at FROM pages")
            .fetch_all(pool)
            .await?;
        Ok(decode_pages(rows))
    }

    async fn find_page(&self, name: &str) -> Result<Option<PageDocument>, ProviderError> {
        let pool = self.pool().await?;
        let row = sqlx::query_as::<_, PageRow>(
            "SELECT name, namespace, spec, created_at, updated_at FROM pages WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(pool)
        .await?;
        row.map(PageDocument::try_from).transpose()
    }

    async fn list_versions(&self, name: &str) -> Result<Vec<VersionDocument>, ProviderError> {
        let pool = self.pool().await?;
        let rows = sqlx::query_as::<_, VersionRow>(
            r#"SELECT name, version, "timestamp", content FROM page_versions
               WHERE name = $1 ORDER BY "timestamp" DESC"#,
        )
        .bind(name)
        .fetch_all(pool)
        .await?;
        Ok(rows.into_iter().map(VersionDocument::from).collect())
    }

    async fn find_version(&self, name: &str, version: &str) -> Result<Option<VersionDocument>, ProviderError> {
        let pool = self.pool().await?;
        let row = sqlx::query_as::<_, VersionRow>(
            r#"SELECT name, version, "timestamp", content FROM page_versions
               WHERE name = $1 AND version = $2 LIMIT 1"#,
        )
        .bind(name)
        .bind(version)
        .fetch_optional(pool)
        .await?;
        Ok(row.map(VersionDocument::from))
    }

    async fn apply(&self, writes: Vec<DocumentWrite>) -> Result<(), ProviderError> {
        let pool = self.pool().await?;
        let mut tx = pool.begin().await?;

        for write in writes {
            match write {
                DocumentWrite::InsertVersion(v) => {
                    sqlx::query(
                        r#"INSERT INTO page_versions (name, version, "timestamp", content)
                           VALUES ($1, $2, $3, $4)"#,
                    )
                    .bind(v.name)
                    .bind(v.version)
                    .bind(v.timestamp)
                    .bind(v.content.map(Json))
                    .execute(&mut *tx)
                    .await?;
                }
                DocumentWrite::UpsertPage { name, namespace, spec } => {
                    sqlx::query(
                        "INSERT INTO pages (name, namespace, spec, created_at, updated_at)
                         VALUES ($1, $2, $3, now(), now())
                         ON CONFLICT (name) DO UPDATE
                         SET namespace = EXCLUDED.namespace, spec = EXCLUDED.spec, updated_at = now()",
                    )
                    .bind(name)
                    .bind(namespace)
                    .bind(Json(serde_json::to_value(&spec)?))
                    .execute(&mut *tx)
                    .await?;
                }
                DocumentWrite::SetContent { name, content } => {
                    sqlx::query(
                        "UPDATE pages
                         SET spec = CASE WHEN $2::jsonb IS NULL THEN spec - 'content'
                                         ELSE jsonb_set(spec, '{content}', $2::jsonb, true) END,
                             updated_at = now()
                         WHERE name = $1",
                    )
                    .bind(name)
                    .bind(content.map(Json))
                    .execute(&mut *tx)
                    .await?;
                }
                DocumentWrite::DeletePage { name } => {
                    sqlx::query("DELETE FROM pages WHERE name = $1")
                        .bind(name)
                        .execute(&mut *tx)
                        .await?;
                }
                DocumentWrite::DeleteVersions { name } => {
                    sqlx::query("DELETE FROM page_versions WHERE name = $1")
                        .bind(name)
                        .execute(&mut *tx)
                        .await?;
                }
            }
        }

        tx.commit().await?;
        Ok(())
    }
}
