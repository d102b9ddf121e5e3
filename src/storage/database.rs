//! SQLite table backend.
//!
//! A single `logs` table with an auto-increment id, the four base
//! columns, and six enrichment columns added by schema version 2. The
//! installed version lives outside the table in `PRAGMA user_version`;
//! every connect re-runs the idempotent migration list when the marker
//! is behind. Each step is check-then-apply, so a crash between steps
//! leaves a version-mismatched-but-harmless schema that the next
//! connect finishes.
//!
//! Count and purge push their predicates into SQL. The purge plugin
//! predicate matches the serialized `"_origin_plugin"` substring of the
//! context column rather than the structured column, so rows written
//! before the enrichment migration still match.

use crate::engine::entry::RawRecord;
use crate::error::StoreError;
use crate::storage::{LogStore, StorageMode, StoreFilter, WriteRecord};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::str::FromStr;
use std::time::Duration;

/// Current schema version stamped into `PRAGMA user_version`.
/// Version 1 was the base 4-column table keyed by `logged_at`;
/// version 2 renamed it to `timestamp` and added the enrichment columns.
const SCHEMA_VERSION: i32 = 2;

const ENRICHMENT_COLUMNS: [(&str, &str); 6] = [
    ("plugin", "TEXT"),
    ("theme", "TEXT"),
    ("file", "TEXT"),
    ("line", "INTEGER DEFAULT 0"),
    ("hook", "TEXT"),
    ("function_chain", "TEXT"),
];

const SECONDARY_INDEXES: [(&str, &str); 5] = [
    ("idx_logs_timestamp", "timestamp"),
    ("idx_logs_level", "level"),
    ("idx_logs_plugin", "plugin"),
    ("idx_logs_theme", "theme"),
    ("idx_logs_hook", "hook"),
];

pub struct DatabaseStore {
    pool: SqlitePool,
}

impl DatabaseStore {
    /// Open (creating if missing) the database at a `sqlite:` URL and
    /// bring its schema up to the current version.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        ensure_parent_dir(url)?;

        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(30));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(30))
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.ensure_schema().await?;

        Ok(store)
    }

    /// The underlying connection pool (for read-only reporting queries).
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS logs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                level TEXT NOT NULL,
                message TEXT NOT NULL,
                context TEXT,
                plugin TEXT,
                theme TEXT,
                file TEXT,
                line INTEGER DEFAULT 0,
                hook TEXT,
                function_chain TEXT
            )",
        )
        .execute(&self.pool)
        .await?;

        let installed: i64 = sqlx::query_scalar("PRAGMA user_version")
            .fetch_one(&self.pool)
            .await?;

        if installed < SCHEMA_VERSION as i64 {
            self.migrate_schema().await?;

            sqlx::query(&format!("PRAGMA user_version = {}", SCHEMA_VERSION))
                .execute(&self.pool)
                .await?;

            tracing::info!(
                from = installed,
                to = SCHEMA_VERSION,
                "log table schema migrated"
            );
        }

        Ok(())
    }

    /// Idempotent migration pass: each step checks before applying, so
    /// re-running after a partial failure is safe.
    async fn migrate_schema(&self) -> Result<(), StoreError> {
        let columns = self.table_columns().await?;

        if columns.iter().any(|c| c == "logged_at") && !columns.iter().any(|c| c == "timestamp") {
            sqlx::query("ALTER TABLE logs RENAME COLUMN logged_at TO timestamp")
                .execute(&self.pool)
                .await?;
        }

        for (name, column_type) in ENRICHMENT_COLUMNS {
            if !columns.iter().any(|c| c == name) {
                sqlx::query(&format!("ALTER TABLE logs ADD COLUMN {} {}", name, column_type))
                    .execute(&self.pool)
                    .await?;
            }
        }

        for (index_name, column) in SECONDARY_INDEXES {
            sqlx::query(&format!(
                "CREATE INDEX IF NOT EXISTS {} ON logs ({})",
                index_name, column
            ))
            .execute(&self.pool)
            .await?;
        }

        Ok(())
    }

    async fn table_columns(&self) -> Result<Vec<String>, StoreError> {
        let rows = sqlx::query("PRAGMA table_info(logs)")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .iter()
            .map(|row| row.get::<String, _>("name"))
            .collect())
    }

    /// Whether all six enrichment columns are present. Checked per write
    /// so an unmigrated install still gets the legacy 4-column insert.
    async fn enrichment_columns_exist(&self) -> Result<bool, StoreError> {
        let columns = self.table_columns().await?;
        Ok(ENRICHMENT_COLUMNS
            .iter()
            .all(|(name, _)| columns.iter().any(|c| c == name)))
    }

    fn build_predicates(filter: &StoreFilter, plugin_on_context: bool) -> (String, Vec<String>) {
        let mut parts = Vec::new();
        let mut binds = Vec::new();

        if let Some(level) = filter.level {
            parts.push("level = ?".to_string());
            binds.push(level.as_str().to_string());
        }

        if let Some(plugin) = &filter.plugin {
            let slug = plugin.to_lowercase();
            if plugin_on_context {
                parts.push("context LIKE ? ESCAPE '\\'".to_string());
                binds.push(format!("%\"_origin_plugin\":\"{}\"%", escape_like(&slug)));
            } else {
                parts.push("LOWER(plugin) = ?".to_string());
                binds.push(slug);
            }
        }

        if let Some(search) = &filter.search {
            parts.push("(message LIKE ? ESCAPE '\\' OR context LIKE ? ESCAPE '\\')".to_string());
            let needle = format!("%{}%", escape_like(search));
            binds.push(needle.clone());
            binds.push(needle);
        }

        let clause = if parts.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", parts.join(" AND "))
        };

        (clause, binds)
    }
}

fn escape_like(term: &str) -> String {
    term.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// The pool cannot create intermediate directories itself.
fn ensure_parent_dir(url: &str) -> Result<(), StoreError> {
    if let Some(path) = url.strip_prefix("sqlite:") {
        let path = path.trim_start_matches("//");
        if !path.is_empty() && !path.contains(":memory:") {
            if let Some(parent) = std::path::Path::new(path).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
        }
    }
    Ok(())
}

fn row_to_raw(row: &sqlx::sqlite::SqliteRow) -> RawRecord {
    RawRecord {
        id: row.try_get::<i64, _>("id").ok(),
        logged_at: row.try_get::<Option<String>, _>("timestamp").ok().flatten(),
        level: row.try_get::<Option<String>, _>("level").ok().flatten(),
        message: row.try_get::<Option<String>, _>("message").ok().flatten(),
        context: row
            .try_get::<Option<String>, _>("context")
            .ok()
            .flatten()
            .map(Value::String),
        plugin: row.try_get::<Option<String>, _>("plugin").ok().flatten(),
        theme: row.try_get::<Option<String>, _>("theme").ok().flatten(),
        file: row.try_get::<Option<String>, _>("file").ok().flatten(),
        line: row.try_get::<Option<i64>, _>("line").ok().flatten(),
        hook: row.try_get::<Option<String>, _>("hook").ok().flatten(),
        function_chain: row
            .try_get::<Option<String>, _>("function_chain")
            .ok()
            .flatten()
            .map(Value::String),
    }
}

#[async_trait]
impl LogStore for DatabaseStore {
    fn mode(&self) -> StorageMode {
        StorageMode::Database
    }

    async fn append(&self, record: &WriteRecord) -> Result<Option<i64>, StoreError> {
        let structured = &record.structured;
        let context = (!record.context.is_empty()).then_some(record.context.as_str());

        let result = if self.enrichment_columns_exist().await? {
            let chain = serde_json::to_string(&structured.function_chain)?;
            sqlx::query(
                "INSERT INTO logs (timestamp, level, message, context, plugin, theme, file, line, hook, function_chain)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&record.timestamp)
            .bind(record.level.as_str())
            .bind(&record.message)
            .bind(context)
            .bind(&structured.plugin)
            .bind(&structured.theme)
            .bind(&structured.file)
            .bind(structured.line)
            .bind(&structured.hook)
            .bind(chain)
            .execute(&self.pool)
            .await?
        } else {
            sqlx::query(
                "INSERT INTO logs (timestamp, level, message, context) VALUES (?, ?, ?, ?)",
            )
            .bind(&record.timestamp)
            .bind(record.level.as_str())
            .bind(&record.message)
            .bind(context)
            .execute(&self.pool)
            .await?
        };

        Ok(Some(result.last_insert_rowid()))
    }

    async fn fetch(
        &self,
        limit: Option<usize>,
        offset: usize,
    ) -> Result<Vec<RawRecord>, StoreError> {
        // LIMIT -1 is SQLite's "no limit".
        let limit = limit.map(|l| l.min(i64::MAX as usize) as i64).unwrap_or(-1);

        let rows = sqlx::query("SELECT * FROM logs ORDER BY id DESC LIMIT ? OFFSET ?")
            .bind(limit)
            .bind(offset as i64)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(row_to_raw).collect())
    }

    async fn count(&self, filter: &StoreFilter) -> Result<u64, StoreError> {
        let (clause, binds) = Self::build_predicates(filter, false);
        let sql = format!("SELECT COUNT(*) FROM logs{}", clause);

        let mut query = sqlx::query_scalar::<_, i64>(&sql);
        for bind in binds {
            query = query.bind(bind);
        }

        let count = query.fetch_one(&self.pool).await?;
        Ok(count.max(0) as u64)
    }

    async fn clear(&self) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM logs").execute(&self.pool).await?;
        // Reset the id sequence so a cleared store starts over, matching
        // truncate semantics. The sequence table only exists once a row
        // has been inserted.
        let _ = sqlx::query("DELETE FROM sqlite_sequence WHERE name = 'logs'")
            .execute(&self.pool)
            .await;
        Ok(())
    }

    async fn purge(&self, filter: &StoreFilter) -> Result<u64, StoreError> {
        let (clause, binds) = Self::build_predicates(filter, true);
        let sql = format!("DELETE FROM logs{}", clause);

        let mut query = sqlx::query(&sql);
        for bind in binds {
            query = query.bind(bind);
        }

        let result = query.execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::entry::{Level, StructuredData};
    use tempfile::TempDir;

    fn record(message: &str, level: Level, context: &str) -> WriteRecord {
        WriteRecord {
            timestamp: "2026-08-06 09:30:00".to_string(),
            level,
            message: message.to_string(),
            context: context.to_string(),
            structured: StructuredData::default(),
        }
    }

    async fn test_store(dir: &TempDir) -> DatabaseStore {
        let url = format!("sqlite:{}", dir.path().join("logs.db").display());
        DatabaseStore::connect(&url).await.unwrap()
    }

    #[tokio::test]
    async fn test_append_assigns_increasing_ids() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir).await;

        let first = store.append(&record("a", Level::Info, "")).await.unwrap();
        let second = store.append(&record("b", Level::Info, "")).await.unwrap();
        assert!(second.unwrap() > first.unwrap());
    }

    #[tokio::test]
    async fn test_fetch_newest_first_with_offset() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir).await;

        for i in 0..5 {
            store
                .append(&record(&format!("m{}", i), Level::Info, ""))
                .await
                .unwrap();
        }

        let page = store.fetch(Some(2), 1).await.unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].message.as_deref(), Some("m3"));
        assert_eq!(page[1].message.as_deref(), Some("m2"));
    }

    #[tokio::test]
    async fn test_count_pushes_level_predicate() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir).await;

        store.append(&record("a", Level::Error, "")).await.unwrap();
        store.append(&record("b", Level::Info, "")).await.unwrap();
        store.append(&record("c", Level::Error, "")).await.unwrap();

        let filter = StoreFilter {
            level: Some(Level::Error),
            ..Default::default()
        };
        assert_eq!(store.count(&filter).await.unwrap(), 2);
        assert_eq!(store.count(&StoreFilter::default()).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_count_search_matches_message_or_context() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir).await;

        store
            .append(&record("checkout failed", Level::Error, ""))
            .await
            .unwrap();
        store
            .append(&record("ok", Level::Info, r#"{"step":"checkout"}"#))
            .await
            .unwrap();
        store.append(&record("unrelated", Level::Info, "")).await.unwrap();

        let filter = StoreFilter {
            search: Some("checkout".to_string()),
            ..Default::default()
        };
        assert_eq!(store.count(&filter).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_search_escapes_like_wildcards() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir).await;

        store.append(&record("100% done", Level::Info, "")).await.unwrap();
        store.append(&record("100 xx done", Level::Info, "")).await.unwrap();

        let filter = StoreFilter {
            search: Some("100%".to_string()),
            ..Default::default()
        };
        assert_eq!(store.count(&filter).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_purge_plugin_matches_context_substring() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir).await;

        store
            .append(&record(
                "from checkout",
                Level::Error,
                r#"{"_origin_plugin":"checkout"}"#,
            ))
            .await
            .unwrap();
        store.append(&record("elsewhere", Level::Error, "")).await.unwrap();

        let filter = StoreFilter {
            plugin: Some("checkout".to_string()),
            ..Default::default()
        };
        assert_eq!(store.purge(&filter).await.unwrap(), 1);
        assert_eq!(store.count(&StoreFilter::default()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_purge_without_filters_deletes_everything() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir).await;

        store.append(&record("a", Level::Info, "")).await.unwrap();
        store.append(&record("b", Level::Info, "")).await.unwrap();

        assert_eq!(store.purge(&StoreFilter::default()).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_clear_resets_ids() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir).await;

        store.append(&record("a", Level::Info, "")).await.unwrap();
        store.clear().await.unwrap();

        let id = store.append(&record("b", Level::Info, "")).await.unwrap();
        assert_eq!(id, Some(1));
    }

    #[tokio::test]
    async fn test_migration_upgrades_legacy_table() {
        let dir = TempDir::new().unwrap();
        let url = format!("sqlite:{}", dir.path().join("legacy.db").display());

        // Build a version-1 database by hand: 4 columns, logged_at key.
        {
            let options = SqliteConnectOptions::from_str(&url)
                .unwrap()
                .create_if_missing(true);
            let pool = SqlitePoolOptions::new()
                .max_connections(1)
                .connect_with(options)
                .await
                .unwrap();

            sqlx::query(
                "CREATE TABLE logs (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    logged_at TEXT NOT NULL,
                    level TEXT NOT NULL,
                    message TEXT NOT NULL,
                    context TEXT
                )",
            )
            .execute(&pool)
            .await
            .unwrap();

            sqlx::query(
                "INSERT INTO logs (logged_at, level, message, context)
                 VALUES ('2024-01-01 00:00:00', 'ERROR', 'old row', NULL)",
            )
            .execute(&pool)
            .await
            .unwrap();

            sqlx::query("PRAGMA user_version = 1").execute(&pool).await.unwrap();
            pool.close().await;
        }

        let store = DatabaseStore::connect(&url).await.unwrap();

        let columns = store.table_columns().await.unwrap();
        assert!(columns.iter().any(|c| c == "timestamp"));
        assert!(!columns.iter().any(|c| c == "logged_at"));
        for (name, _) in ENRICHMENT_COLUMNS {
            assert!(columns.iter().any(|c| c == name), "missing column {}", name);
        }

        // The pre-migration row is still readable through the new schema.
        let rows = store.fetch(Some(10), 0).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].message.as_deref(), Some("old row"));
        assert_eq!(rows[0].logged_at.as_deref(), Some("2024-01-01 00:00:00"));

        // And new writes use the enriched insert.
        store.append(&record("new row", Level::Info, "")).await.unwrap();
        assert_eq!(store.count(&StoreFilter::default()).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_migration_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir).await;
        // Re-running the full pass against a current schema changes nothing.
        store.migrate_schema().await.unwrap();
        store.append(&record("still fine", Level::Info, "")).await.unwrap();
        assert_eq!(store.count(&StoreFilter::default()).await.unwrap(), 1);
    }
}
