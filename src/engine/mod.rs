//! The log engine.
//!
//! Orchestrates the write path (sanitize → hooks → enrich → dispatch)
//! and the unified read path (fetch → normalize → filter → paginate →
//! count) over whichever backend the current configuration selects.
//!
//! The engine is constructed once at application start and passed by
//! handle to every collaborator; there is no global instance. The
//! storage mode is re-read from the configuration snapshot at the start
//! of every operation, so flipping it takes effect without a restart.

pub mod entry;
pub mod export;
pub mod hooks;
pub mod insights;
pub mod origin;
pub mod sanitize;

pub use entry::{normalize, summarize_issue, Level, LogEntry, RawRecord, StructuredData};
pub use hooks::{HookRegistry, LogPayload, PostLogEvent};
pub use insights::ErrorInsights;
pub use origin::{CallSite, FrameGuard, HookScope, OriginMetadata};
pub use sanitize::{context_value, sanitize_context, REDACTION_MARKER};

use crate::config::{Config, SharedConfig};
use crate::error::StoreError;
use crate::storage::{
    DatabaseStore, FileStore, LogStore, StorageMode, StoreFilter, WriteRecord,
};
use colored::Colorize;
use serde_json::{Map, Value};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Page size when a query does not specify one.
pub const DEFAULT_LOG_LIMIT: usize = 20;

tokio::task_local! {
    // Re-entrancy guard: present while a write is in flight on this
    // task, so a log call triggered from inside another log call (error
    // handlers feeding back into the engine) is dropped.
    static IN_WRITE: ();
}

/// Filter and pagination arguments for `get_logs` / `get_logs_count` /
/// `purge`.
#[derive(Debug, Clone)]
pub struct LogQuery {
    /// Final page size, coerced up to 1.
    pub limit: usize,
    /// Row offset (database backend only; the file backend has no stable
    /// identities to offset against).
    pub offset: usize,
    pub level: Option<Level>,
    /// Exact, case-insensitive match against the originating plugin.
    pub plugin: Option<String>,
    /// Case-insensitive substring match over message, issue summary,
    /// origin file and serialized context.
    pub search: Option<String>,
    /// Raw records to pull from the backend before in-memory filtering.
    /// Defaults to `max(limit * 4, DEFAULT_LOG_LIMIT * 2)` — an
    /// over-fetch to compensate for records the filters will drop.
    pub fetch_limit: Option<usize>,
}

impl Default for LogQuery {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LOG_LIMIT,
            offset: 0,
            level: None,
            plugin: None,
            search: None,
            fetch_limit: None,
        }
    }
}

impl LogQuery {
    fn is_filtered(&self) -> bool {
        self.level.is_some() || self.plugin.is_some() || self.search.is_some()
    }

    fn store_filter(&self) -> StoreFilter {
        StoreFilter {
            level: self.level,
            plugin: self.plugin.clone(),
            search: self.search.clone(),
        }
    }
}

/// Dual-backend log engine. See the module docs for the data flow.
pub struct LogEngine {
    config: SharedConfig,
    hooks: HookRegistry,
    // The pool for the database backend is reused across calls as long
    // as the configured URL stays the same; the mode decision itself is
    // never cached.
    database: Mutex<Option<(String, Arc<DatabaseStore>)>>,
}

impl LogEngine {
    pub fn new(config: SharedConfig) -> Self {
        Self {
            config,
            hooks: HookRegistry::new(),
            database: Mutex::new(None),
        }
    }

    /// Extension points: should-log vetoes, pre-log transforms, post-log
    /// notifications.
    pub fn hooks(&self) -> &HookRegistry {
        &self.hooks
    }

    fn snapshot(&self) -> Arc<Config> {
        self.config.load_full()
    }

    async fn store(&self, cfg: &Config) -> Result<Arc<dyn LogStore>, StoreError> {
        match cfg.storage.mode {
            StorageMode::File => Ok(Arc::new(FileStore::new(cfg.storage.file_path.clone()))),
            StorageMode::Database => {
                let store = self.database_store(cfg).await?;
                Ok(store as Arc<dyn LogStore>)
            }
        }
    }

    async fn database_store(&self, cfg: &Config) -> Result<Arc<DatabaseStore>, StoreError> {
        let mut cached = self.database.lock().await;

        if let Some((url, store)) = cached.as_ref() {
            if url == &cfg.storage.database_url {
                return Ok(store.clone());
            }
        }

        let store = Arc::new(DatabaseStore::connect(&cfg.storage.database_url).await?);
        *cached = Some((cfg.storage.database_url.clone(), store.clone()));
        Ok(store)
    }

    /// Write one entry. Never returns an error: a backend failure is
    /// reported on the fallback tracing channel and swallowed so the
    /// calling code path cannot crash over diagnostics.
    #[track_caller]
    pub fn log(
        &self,
        message: impl Into<String>,
        level: Level,
        context: Map<String, Value>,
    ) -> impl Future<Output = ()> + '_ {
        let site = CallSite::caller();
        let message = message.into();
        async move { self.write(message, level, context, site).await }
    }

    #[track_caller]
    pub fn error(
        &self,
        message: impl Into<String>,
        context: Map<String, Value>,
    ) -> impl Future<Output = ()> + '_ {
        let site = CallSite::caller();
        let message = message.into();
        async move { self.write(message, Level::Error, context, site).await }
    }

    #[track_caller]
    pub fn warning(
        &self,
        message: impl Into<String>,
        context: Map<String, Value>,
    ) -> impl Future<Output = ()> + '_ {
        let site = CallSite::caller();
        let message = message.into();
        async move { self.write(message, Level::Warning, context, site).await }
    }

    #[track_caller]
    pub fn notice(
        &self,
        message: impl Into<String>,
        context: Map<String, Value>,
    ) -> impl Future<Output = ()> + '_ {
        let site = CallSite::caller();
        let message = message.into();
        async move { self.write(message, Level::Notice, context, site).await }
    }

    #[track_caller]
    pub fn info(
        &self,
        message: impl Into<String>,
        context: Map<String, Value>,
    ) -> impl Future<Output = ()> + '_ {
        let site = CallSite::caller();
        let message = message.into();
        async move { self.write(message, Level::Info, context, site).await }
    }

    #[track_caller]
    pub fn debug(
        &self,
        message: impl Into<String>,
        context: Map<String, Value>,
    ) -> impl Future<Output = ()> + '_ {
        let site = CallSite::caller();
        let message = message.into();
        async move { self.write(message, Level::Debug, context, site).await }
    }

    async fn write(
        &self,
        message: String,
        level: Level,
        context: Map<String, Value>,
        site: CallSite,
    ) {
        if IN_WRITE.try_with(|_| ()).is_ok() {
            return;
        }

        IN_WRITE
            .scope((), self.write_guarded(message, level, context, site))
            .await;
    }

    async fn write_guarded(
        &self,
        message: String,
        level: Level,
        mut context: Map<String, Value>,
        site: CallSite,
    ) {
        let cfg = self.snapshot();
        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();

        context = sanitize_context(context);

        if !self.hooks.should_log(&context) {
            return;
        }

        let payload = self.hooks.apply_pre_log(LogPayload { message, context });
        let message = payload.message;
        let mut context = payload.context;

        if self.is_self_origin(&context, &site) {
            return;
        }

        if !context.contains_key("origin_metadata") {
            let metadata = origin::classify(&site, &cfg.enrichment);

            if !metadata.plugin.is_empty() && !context.contains_key("_origin_plugin") {
                context.insert(
                    "_origin_plugin".to_string(),
                    Value::String(metadata.plugin.clone()),
                );
            }
            if !metadata.file.is_empty() && !context.contains_key("_origin_file") {
                context.insert(
                    "_origin_file".to_string(),
                    Value::String(metadata.file.clone()),
                );
            }

            context.insert("origin_metadata".to_string(), context_value(&metadata));
        }

        if cfg.engine.capture_function_chain && !context.contains_key("function_chain") {
            let chain = origin::function_chain(origin::MAX_CHAIN_DEPTH);
            if !chain.is_empty() {
                context.insert("function_chain".to_string(), context_value(&chain));
            }
        }

        let structured = StructuredData::from_context(&context);

        let context_string = if context.is_empty() {
            String::new()
        } else {
            serde_json::to_string(&context).unwrap_or_default()
        };

        let record = WriteRecord {
            timestamp: timestamp.clone(),
            level,
            message: message.clone(),
            context: context_string,
            structured: structured.clone(),
        };

        let id = match self.store(&cfg).await {
            Ok(store) => match store.append(&record).await {
                Ok(id) => id,
                Err(err) => {
                    tracing::error!(error = %err, "failed to persist log entry");
                    None
                }
            },
            Err(err) => {
                tracing::error!(error = %err, "failed to open log backend");
                None
            }
        };

        self.hooks.notify_post_log(&PostLogEvent {
            id,
            level,
            timestamp: &timestamp,
            message: &message,
            context: &context,
            structured: &structured,
        });

        if cfg.engine.developer_mode {
            render_developer_entry(level, &message, &structured);
        }
    }

    /// Loop prevention: writes originating from this logging system
    /// itself are dropped, both by explicit origin keys and by call
    /// site.
    fn is_self_origin(&self, context: &Map<String, Value>, site: &CallSite) -> bool {
        if let Some(Value::String(file)) = context.get("_origin_file") {
            if file.contains(origin::SELF_TAG) {
                return true;
            }
        }

        if let Some(Value::String(plugin)) = context.get("_origin_plugin") {
            if plugin == origin::SELF_TAG {
                return true;
            }
        }

        site.is_internal()
    }

    /// Fetch, normalize, filter and paginate, newest first.
    pub async fn get_logs(&self, query: &LogQuery) -> Result<Vec<LogEntry>, StoreError> {
        let cfg = self.snapshot();
        let store = self.store(&cfg).await?;

        let limit = query.limit.max(1);
        let fetch_limit = query
            .fetch_limit
            .map(|requested| requested.max(limit))
            .unwrap_or_else(|| limit.saturating_mul(4).max(DEFAULT_LOG_LIMIT * 2));

        let raw = match store.mode() {
            StorageMode::Database => store.fetch(Some(fetch_limit), query.offset).await?,
            StorageMode::File => {
                // A tail read would bias filtered results toward recent
                // entries and silently under-count; filters force a full
                // scan.
                let file_limit = if query.is_filtered() {
                    None
                } else {
                    Some(fetch_limit)
                };
                store.fetch(file_limit, 0).await?
            }
        };

        let entries = raw
            .into_iter()
            .map(normalize)
            .filter(|entry| Self::matches(entry, query))
            .take(limit)
            .collect();

        Ok(entries)
    }

    fn matches(entry: &LogEntry, query: &LogQuery) -> bool {
        if let Some(level) = query.level {
            if !entry.level.eq_ignore_ascii_case(level.as_str()) {
                return false;
            }
        }

        if let Some(plugin) = &query.plugin {
            if !entry.origin_plugin.eq_ignore_ascii_case(plugin) {
                return false;
            }
        }

        if let Some(search) = &query.search {
            let mut haystack = format!(
                "{} {} {}",
                entry.message, entry.issue_summary, entry.origin_file
            );
            if !entry.context_array.is_empty() {
                haystack.push(' ');
                haystack.push_str(
                    &serde_json::to_string(&entry.context_array).unwrap_or_default(),
                );
            }

            if !haystack.to_lowercase().contains(&search.to_lowercase()) {
                return false;
            }
        }

        true
    }

    /// Total entries matching the filters.
    ///
    /// The database backend answers with a pushed-down `COUNT(*)`. The
    /// file backend has no indexed count and scans the whole file with
    /// filters applied — a documented O(file size) operation.
    pub async fn get_logs_count(&self, query: &LogQuery) -> Result<u64, StoreError> {
        let cfg = self.snapshot();
        let store = self.store(&cfg).await?;

        match store.mode() {
            StorageMode::Database => store.count(&query.store_filter()).await,
            StorageMode::File => {
                let mut scan = query.clone();
                scan.limit = usize::MAX;
                scan.offset = 0;
                scan.fetch_limit = Some(usize::MAX);
                Ok(self.get_logs(&scan).await?.len() as u64)
            }
        }
    }

    /// Unconditionally empty the active backend's store.
    pub async fn clear_logs(&self) -> Result<(), StoreError> {
        let cfg = self.snapshot();
        self.store(&cfg).await?.clear().await
    }

    /// Delete entries matching the filters. Database backend only; the
    /// file backend returns the distinct unsupported-operation error.
    pub async fn purge(&self, query: &LogQuery) -> Result<u64, StoreError> {
        let cfg = self.snapshot();
        self.store(&cfg).await?.purge(&query.store_filter()).await
    }

    /// Aggregate error statistics over a trailing window. Database
    /// backend only.
    pub async fn error_insights(&self, days: u32) -> Result<ErrorInsights, StoreError> {
        let cfg = self.snapshot();

        match cfg.storage.mode {
            StorageMode::File => Err(StoreError::unsupported(StorageMode::File, "insights")),
            StorageMode::Database => {
                let db = self.database_store(&cfg).await?;
                insights::collect(&db, days).await
            }
        }
    }
}

fn render_developer_entry(level: Level, message: &str, structured: &StructuredData) {
    let label = format!("[{}]", level.as_str());
    let label = match level {
        Level::Error => label.red().bold(),
        Level::Warning => label.yellow().bold(),
        Level::Notice => label.cyan(),
        Level::Info => label.green(),
        Level::Debug => label.dimmed(),
    };

    eprintln!("{} {}", label, message);
    if !structured.function_chain.is_empty() {
        eprintln!(
            "  {}",
            format!("chain: {}", structured.function_chain.join(" -> ")).dimmed()
        );
    }
}
