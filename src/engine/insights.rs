//! Error insights over the table backend.
//!
//! Aggregates a trailing window of entries into per-level counts, the
//! plugins and themes producing the most entries, and daily totals.
//! These are grouping queries with no file-backend equivalent, so the
//! engine rejects the operation in file mode.

use crate::error::StoreError;
use crate::storage::DatabaseStore;
use serde::{Deserialize, Serialize};
use sqlx::Row;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInsights {
    pub period_days: u32,
    /// (level, count), most frequent first.
    pub level_counts: Vec<(String, u64)>,
    /// (plugin slug, count), most frequent first, top 10.
    pub top_plugins: Vec<(String, u64)>,
    /// (theme slug, count), most frequent first, top 10.
    pub top_themes: Vec<(String, u64)>,
    /// (YYYY-MM-DD, count), oldest first.
    pub daily_totals: Vec<(String, u64)>,
    pub generated_at: String,
}

/// Run the aggregate queries over the given window.
pub async fn collect(db: &DatabaseStore, days: u32) -> Result<ErrorInsights, StoreError> {
    let threshold = (chrono::Local::now() - chrono::Duration::days(days as i64))
        .format("%Y-%m-%d %H:%M:%S")
        .to_string();

    let level_counts = grouped(
        db,
        "SELECT level AS label, COUNT(*) AS total FROM logs
         WHERE timestamp >= ? GROUP BY level ORDER BY total DESC",
        &threshold,
    )
    .await?;

    let top_plugins = grouped(
        db,
        "SELECT plugin AS label, COUNT(*) AS total FROM logs
         WHERE plugin IS NOT NULL AND plugin != '' AND timestamp >= ?
         GROUP BY plugin ORDER BY total DESC LIMIT 10",
        &threshold,
    )
    .await?;

    let top_themes = grouped(
        db,
        "SELECT theme AS label, COUNT(*) AS total FROM logs
         WHERE theme IS NOT NULL AND theme != '' AND timestamp >= ?
         GROUP BY theme ORDER BY total DESC LIMIT 10",
        &threshold,
    )
    .await?;

    let daily_totals = grouped(
        db,
        "SELECT DATE(timestamp) AS label, COUNT(*) AS total FROM logs
         WHERE timestamp >= ? GROUP BY DATE(timestamp) ORDER BY label ASC",
        &threshold,
    )
    .await?;

    Ok(ErrorInsights {
        period_days: days,
        level_counts,
        top_plugins,
        top_themes,
        daily_totals,
        generated_at: chrono::Local::now()
            .format("%Y-%m-%d %H:%M:%S")
            .to_string(),
    })
}

async fn grouped(
    db: &DatabaseStore,
    sql: &str,
    threshold: &str,
) -> Result<Vec<(String, u64)>, StoreError> {
    let rows = sqlx::query(sql).bind(threshold).fetch_all(db.pool()).await?;

    Ok(rows
        .iter()
        .map(|row| {
            let label: Option<String> = row.get("label");
            let total: i64 = row.get("total");
            (label.unwrap_or_default(), total.max(0) as u64)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::entry::{Level, StructuredData};
    use crate::storage::{LogStore, WriteRecord};
    use tempfile::TempDir;

    fn record(level: Level, plugin: &str) -> WriteRecord {
        WriteRecord {
            timestamp: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            level,
            message: "entry".to_string(),
            context: String::new(),
            structured: StructuredData {
                plugin: plugin.to_string(),
                ..Default::default()
            },
        }
    }

    #[tokio::test]
    async fn test_collect_groups_by_level_and_plugin() {
        let dir = TempDir::new().unwrap();
        let url = format!("sqlite:{}", dir.path().join("logs.db").display());
        let db = DatabaseStore::connect(&url).await.unwrap();

        db.append(&record(Level::Error, "checkout")).await.unwrap();
        db.append(&record(Level::Error, "checkout")).await.unwrap();
        db.append(&record(Level::Info, "")).await.unwrap();

        let insights = collect(&db, 7).await.unwrap();

        assert_eq!(insights.period_days, 7);
        assert_eq!(insights.level_counts[0], ("ERROR".to_string(), 2));
        assert_eq!(insights.top_plugins, vec![("checkout".to_string(), 2)]);
        assert_eq!(insights.daily_totals.len(), 1);
        assert_eq!(insights.daily_totals[0].1, 3);
    }

    #[tokio::test]
    async fn test_collect_ignores_entries_outside_window() {
        let dir = TempDir::new().unwrap();
        let url = format!("sqlite:{}", dir.path().join("logs.db").display());
        let db = DatabaseStore::connect(&url).await.unwrap();

        let mut old = record(Level::Error, "legacy");
        old.timestamp = "2000-01-01 00:00:00".to_string();
        db.append(&old).await.unwrap();
        db.append(&record(Level::Info, "")).await.unwrap();

        let insights = collect(&db, 7).await.unwrap();
        let total: u64 = insights.level_counts.iter().map(|(_, n)| n).sum();
        assert_eq!(total, 1);
    }
}
