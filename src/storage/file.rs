//! Append-only file backend.
//!
//! One JSON object per line, UTF-8, newest last on disk and newest first
//! on read. Appends hold an exclusive advisory lock for the duration of
//! the single write, so concurrent writers serialize at the OS level and
//! no partial lines interleave; cross-process safety is whatever the
//! host filesystem's advisory locks provide.
//!
//! Reads never fail on a bad line: JSON first, then the legacy
//! `[ts] [LEVEL] message | Context: {...}` bracketed format, and as a
//! last resort the whole line becomes the message.

use crate::engine::entry::RawRecord;
use crate::error::StoreError;
use crate::storage::{LogStore, StorageMode, StoreFilter, WriteRecord};
use async_trait::async_trait;
use fs2::FileExt;
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Map, Value};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

lazy_static! {
    static ref LEGACY_LINE: Regex =
        Regex::new(r"^\[(.*?)\]\s*\[(.*?)\]\s*(.*?)(?:\s*\|\s*Context:\s*(.*))?$")
            .expect("legacy line pattern must compile");
}

pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn ensure_parent_dir(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        Ok(())
    }

    /// Render a record as its JSON line. Enrichment fields are only
    /// written when present, keeping lines compact.
    fn encode_line(record: &WriteRecord) -> Result<String, StoreError> {
        let mut entry = Map::new();
        entry.insert("timestamp".to_string(), Value::String(record.timestamp.clone()));
        entry.insert(
            "level".to_string(),
            Value::String(record.level.as_str().to_string()),
        );
        entry.insert("message".to_string(), Value::String(record.message.clone()));

        let structured = &record.structured;
        if !structured.plugin.is_empty() {
            entry.insert("plugin".to_string(), Value::String(structured.plugin.clone()));
        }
        if !structured.theme.is_empty() {
            entry.insert("theme".to_string(), Value::String(structured.theme.clone()));
        }
        if !structured.file.is_empty() {
            entry.insert("file".to_string(), Value::String(structured.file.clone()));
        }
        if structured.line != 0 {
            entry.insert("line".to_string(), Value::from(structured.line));
        }
        if !structured.hook.is_empty() {
            entry.insert("hook".to_string(), Value::String(structured.hook.clone()));
        }
        if !structured.function_chain.is_empty() {
            entry.insert(
                "function_chain".to_string(),
                Value::Array(
                    structured
                        .function_chain
                        .iter()
                        .map(|f| Value::String(f.clone()))
                        .collect(),
                ),
            );
        }

        if !record.context.is_empty() {
            if let Ok(Value::Object(context)) = serde_json::from_str(&record.context) {
                entry.insert("context".to_string(), Value::Object(context));
            }
        }

        Ok(serde_json::to_string(&Value::Object(entry))?)
    }

    /// Parse one stored line into a raw record. Never fails.
    fn parse_line(line: &str) -> RawRecord {
        if let Ok(Value::Object(entry)) = serde_json::from_str::<Value>(line) {
            return RawRecord {
                id: None,
                logged_at: entry.get("timestamp").and_then(Value::as_str).map(String::from),
                level: entry.get("level").and_then(Value::as_str).map(String::from),
                message: entry.get("message").and_then(Value::as_str).map(String::from),
                context: entry.get("context").cloned(),
                plugin: entry.get("plugin").and_then(Value::as_str).map(String::from),
                theme: entry.get("theme").and_then(Value::as_str).map(String::from),
                file: entry.get("file").and_then(Value::as_str).map(String::from),
                line: entry.get("line").and_then(Value::as_i64),
                hook: entry.get("hook").and_then(Value::as_str).map(String::from),
                function_chain: entry.get("function_chain").cloned(),
            };
        }

        if let Some(captures) = LEGACY_LINE.captures(line) {
            let context = captures
                .get(4)
                .map(|m| m.as_str().to_string())
                .filter(|c| !c.is_empty());

            return RawRecord {
                logged_at: captures.get(1).map(|m| m.as_str().to_string()),
                level: captures.get(2).map(|m| m.as_str().to_string()),
                message: captures.get(3).map(|m| m.as_str().to_string()),
                context: context.map(Value::String),
                ..Default::default()
            };
        }

        RawRecord {
            message: Some(line.to_string()),
            ..Default::default()
        }
    }

    fn read_lines(&self) -> Result<Vec<String>, StoreError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        Ok(content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(String::from)
            .collect())
    }
}

#[async_trait]
impl LogStore for FileStore {
    fn mode(&self) -> StorageMode {
        StorageMode::File
    }

    async fn append(&self, record: &WriteRecord) -> Result<Option<i64>, StoreError> {
        self.ensure_parent_dir()?;

        let mut line = Self::encode_line(record)?;
        line.push('\n');

        let mut handle = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        handle.lock_exclusive()?;
        let result = handle
            .write_all(line.as_bytes())
            .and_then(|_| handle.flush());
        let unlock = fs2::FileExt::unlock(&handle);
        result?;
        unlock?;

        // No stable per-entry identity within a read.
        Ok(None)
    }

    async fn fetch(
        &self,
        limit: Option<usize>,
        _offset: usize,
    ) -> Result<Vec<RawRecord>, StoreError> {
        let mut lines = self.read_lines()?;

        if let Some(limit) = limit {
            let keep_from = lines.len().saturating_sub(limit.max(1));
            lines.drain(..keep_from);
        }

        lines.reverse();

        Ok(lines.iter().map(|line| Self::parse_line(line)).collect())
    }

    async fn count(&self, _filter: &StoreFilter) -> Result<u64, StoreError> {
        Err(StoreError::unsupported(StorageMode::File, "count"))
    }

    async fn clear(&self) -> Result<(), StoreError> {
        if self.path.exists() {
            fs::write(&self.path, "")?;
        }
        Ok(())
    }

    async fn purge(&self, _filter: &StoreFilter) -> Result<u64, StoreError> {
        Err(StoreError::unsupported(StorageMode::File, "purge"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::entry::{Level, StructuredData};
    use serde_json::json;
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

    fn store(dir: &TempDir) -> FileStore {
        FileStore::new(dir.path().join("logs/common.log"))
    }

    #[tokio::test]
    async fn test_append_then_fetch_newest_first() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        store.append(&record("first", Level::Info, "")).await.unwrap();
        store.append(&record("second", Level::Error, "")).await.unwrap();

        let raw = store.fetch(Some(10), 0).await.unwrap();
        assert_eq!(raw.len(), 2);
        assert_eq!(raw[0].message.as_deref(), Some("second"));
        assert_eq!(raw[1].message.as_deref(), Some("first"));
        assert!(raw[0].id.is_none());
    }

    #[tokio::test]
    async fn test_fetch_tail_limit() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        for i in 0..5 {
            store
                .append(&record(&format!("m{}", i), Level::Info, ""))
                .await
                .unwrap();
        }

        let raw = store.fetch(Some(2), 0).await.unwrap();
        assert_eq!(raw.len(), 2);
        assert_eq!(raw[0].message.as_deref(), Some("m4"));
        assert_eq!(raw[1].message.as_deref(), Some("m3"));
    }

    #[tokio::test]
    async fn test_fetch_unbounded_reads_whole_file() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        for i in 0..5 {
            store
                .append(&record(&format!("m{}", i), Level::Info, ""))
                .await
                .unwrap();
        }

        assert_eq!(store.fetch(None, 0).await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_context_round_trips_as_object() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        store
            .append(&record("ctx", Level::Info, r#"{"user_id":42}"#))
            .await
            .unwrap();

        let raw = store.fetch(Some(1), 0).await.unwrap();
        assert_eq!(raw[0].context, Some(json!({"user_id": 42})));
    }

    #[tokio::test]
    async fn test_missing_file_reads_empty() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        assert!(store.fetch(Some(10), 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_clear_truncates() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        store.append(&record("gone", Level::Info, "")).await.unwrap();
        store.clear().await.unwrap();

        assert!(store.fetch(None, 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_purge_and_count_are_unsupported() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        let err = store.purge(&StoreFilter::default()).await.unwrap_err();
        assert!(err.is_unsupported());

        let err = store.count(&StoreFilter::default()).await.unwrap_err();
        assert!(err.is_unsupported());
    }

    #[test]
    fn test_parse_legacy_bracketed_line() {
        let raw = FileStore::parse_line(
            r#"[2024-01-01 10:00:00] [ERROR] something broke | Context: {"code":500}"#,
        );
        assert_eq!(raw.logged_at.as_deref(), Some("2024-01-01 10:00:00"));
        assert_eq!(raw.level.as_deref(), Some("ERROR"));
        assert_eq!(raw.message.as_deref(), Some("something broke"));
        assert_eq!(raw.context, Some(Value::String(r#"{"code":500}"#.to_string())));
    }

    #[test]
    fn test_parse_legacy_line_without_context() {
        let raw = FileStore::parse_line("[2024-01-01 10:00:00] [INFO] plain note");
        assert_eq!(raw.message.as_deref(), Some("plain note"));
        assert!(raw.context.is_none());
    }

    #[test]
    fn test_parse_garbage_becomes_message() {
        let raw = FileStore::parse_line("not a log line at all");
        assert_eq!(raw.message.as_deref(), Some("not a log line at all"));
        assert!(raw.level.is_none());
        assert!(raw.logged_at.is_none());
    }

    #[test]
    fn test_enrichment_fields_round_trip() {
        let mut rec = record("enriched", Level::Warning, "");
        rec.structured = StructuredData {
            plugin: "checkout".to_string(),
            theme: String::new(),
            file: "checkout/src/cart.rs".to_string(),
            line: 42,
            hook: "init".to_string(),
            function_chain: vec!["App::run".to_string(), "Cart::add".to_string()],
        };

        let line = FileStore::encode_line(&rec).unwrap();
        let parsed = FileStore::parse_line(&line);
        assert_eq!(parsed.plugin.as_deref(), Some("checkout"));
        assert_eq!(parsed.line, Some(42));
        assert_eq!(parsed.hook.as_deref(), Some("init"));
        assert_eq!(
            parsed.function_chain,
            Some(json!(["App::run", "Cart::add"]))
        );
        assert!(parsed.theme.is_none());
    }
}
