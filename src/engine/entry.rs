//! Canonical log entry and the normalization layer.
//!
//! Both backends hand back `RawRecord`s with backend-specific gaps (the
//! file backend never assigns ids, unmigrated table rows have no
//! enrichment columns, legacy lines have no context). `normalize` is the
//! single point of truth that reconciles all of them into one `LogEntry`
//! shape; every read path funnels through it exactly once before
//! filtering.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Log severity, write-side. Stored and compared in uppercase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Level {
    Error,
    Warning,
    Notice,
    Info,
    Debug,
}

impl Level {
    pub const ALL: [Level; 5] = [
        Level::Error,
        Level::Warning,
        Level::Notice,
        Level::Info,
        Level::Debug,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Error => "ERROR",
            Level::Warning => "WARNING",
            Level::Notice => "NOTICE",
            Level::Info => "INFO",
            Level::Debug => "DEBUG",
        }
    }

    /// Case-insensitive parse. Anything outside the five levels is `None`;
    /// the read side maps that to an empty string rather than letting an
    /// arbitrary value propagate into filtering.
    pub fn parse_opt(value: &str) -> Option<Level> {
        match value.trim().to_ascii_uppercase().as_str() {
            "ERROR" => Some(Level::Error),
            "WARNING" => Some(Level::Warning),
            "NOTICE" => Some(Level::Notice),
            "INFO" => Some(Level::Info),
            "DEBUG" => Some(Level::Debug),
            _ => None,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Level::parse_opt(s).ok_or_else(|| format!("unknown log level '{}'", s))
    }
}

/// One stored record as a backend returned it, before normalization.
///
/// `context` carries the storage shape verbatim: `Value::Object` when the
/// backend already holds a parsed map (file JSON lines), `Value::String`
/// when it holds a serialized form (table rows, legacy lines).
#[derive(Debug, Clone, Default)]
pub struct RawRecord {
    pub id: Option<i64>,
    pub logged_at: Option<String>,
    pub level: Option<String>,
    pub message: Option<String>,
    pub context: Option<Value>,
    pub plugin: Option<String>,
    pub theme: Option<String>,
    pub file: Option<String>,
    pub line: Option<i64>,
    pub hook: Option<String>,
    pub function_chain: Option<Value>,
}

/// Structured enrichment extracted from context at write time and stored
/// in dedicated columns (database) or top-level fields (file).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructuredData {
    pub plugin: String,
    pub theme: String,
    pub file: String,
    pub line: i64,
    pub hook: String,
    pub function_chain: Vec<String>,
}

impl StructuredData {
    /// Pull plugin/theme/file/line/hook out of `context.origin_metadata`
    /// and the caller frame chain out of `context.function_chain`.
    pub fn from_context(context: &Map<String, Value>) -> Self {
        let mut data = StructuredData::default();

        if let Some(Value::Object(meta)) = context.get("origin_metadata") {
            data.plugin = str_field(meta, "plugin");
            data.theme = str_field(meta, "theme");
            data.file = str_field(meta, "file");
            data.line = meta.get("line").and_then(Value::as_i64).unwrap_or(0);
            data.hook = str_field(meta, "hook");
        }

        if let Some(Value::Array(chain)) = context.get("function_chain") {
            data.function_chain = chain
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect();
        }

        data
    }
}

fn str_field(map: &Map<String, Value>, key: &str) -> String {
    map.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// The canonical, backend-agnostic log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Row id; 0 when the backend has no stable identity (file backend).
    pub id: i64,
    /// Timestamp string in the backend's native format, verbatim.
    pub logged_at: String,
    /// One of the five uppercase levels, or empty when unparseable.
    pub level: String,
    pub message: String,
    /// Serialized context, the storage round-trip form.
    pub context: String,
    /// Parsed context, the filtering/display form. Always a map; a
    /// malformed payload normalizes to an empty one.
    pub context_array: Map<String, Value>,
    pub origin_plugin: String,
    pub origin_file: String,
    /// Derived one-line synopsis of the context.
    pub issue_summary: String,
    pub plugin: String,
    pub theme: String,
    pub file: String,
    pub line: i64,
    pub hook: String,
    pub function_chain: Vec<String>,
}

/// Normalize one raw stored record into the canonical entry shape.
pub fn normalize(raw: RawRecord) -> LogEntry {
    let (context_string, context_array) = normalize_context(raw.context);

    let level = raw
        .level
        .as_deref()
        .and_then(Level::parse_opt)
        .map(|l| l.as_str().to_string())
        .unwrap_or_default();

    let origin_plugin = context_str(&context_array, "_origin_plugin");
    let origin_file = context_str(&context_array, "_origin_file");
    let issue_summary = summarize_issue(&context_array);

    LogEntry {
        id: raw.id.unwrap_or(0),
        logged_at: raw.logged_at.unwrap_or_default(),
        level,
        message: raw.message.unwrap_or_default(),
        context: context_string,
        context_array,
        origin_plugin,
        origin_file,
        issue_summary,
        plugin: raw.plugin.unwrap_or_default(),
        theme: raw.theme.unwrap_or_default(),
        file: raw.file.unwrap_or_default(),
        line: raw.line.unwrap_or(0),
        hook: raw.hook.unwrap_or_default(),
        function_chain: normalize_chain(raw.function_chain),
    }
}

/// Reconcile the dual context representation: whatever shape came in,
/// produce both the serialized string and the parsed map.
fn normalize_context(context: Option<Value>) -> (String, Map<String, Value>) {
    match context {
        Some(Value::Object(map)) => {
            let serialized = serde_json::to_string(&map).unwrap_or_default();
            (serialized, map)
        }
        Some(Value::String(raw)) if !raw.is_empty() => {
            let parsed = match serde_json::from_str::<Value>(&raw) {
                Ok(Value::Object(map)) => map,
                _ => Map::new(),
            };
            (raw, parsed)
        }
        _ => (String::new(), Map::new()),
    }
}

fn normalize_chain(chain: Option<Value>) -> Vec<String> {
    let value = match chain {
        Some(Value::Array(items)) => Value::Array(items),
        Some(Value::String(raw)) => serde_json::from_str(&raw).unwrap_or(Value::Null),
        _ => Value::Null,
    };

    match value {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn context_str(context: &Map<String, Value>, key: &str) -> String {
    context
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Render a context value the way it should read in a one-line summary.
fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn count_of(context: &Map<String, Value>, key: &str) -> u64 {
    context
        .get(key)
        .and_then(numeric)
        .filter(|n| *n > 0.0)
        .map(|n| n as u64)
        .unwrap_or(0)
}

/// Derive a short issue description from context, first match wins:
/// error location, embedded message, slow query, hook trace, or nothing.
pub fn summarize_issue(context: &Map<String, Value>) -> String {
    if context.is_empty() {
        return String::new();
    }

    if let (Some(error), Some(file), Some(line)) =
        (context.get("error"), context.get("file"), context.get("line"))
    {
        return format!(
            "{} in {}:{}",
            display_value(error),
            display_value(file),
            display_value(line)
        );
    }

    if let Some(message) = context.get("message") {
        return display_value(message);
    }

    if context.contains_key("sql") {
        if let Some(time) = context.get("time").and_then(numeric) {
            return format!("Slow query ({:.3}s)", time);
        }
    }

    if let Some(hook) = context.get("hook") {
        let mut summary = format!("Hook: {}", display_value(hook));

        let process_stop = context
            .get("process_stop")
            .map(|v| v.as_bool().unwrap_or(false) || numeric(v).unwrap_or(0.0) != 0.0)
            .unwrap_or(false);

        if process_stop {
            summary.push_str(" (PROCESS STOPPED - no callbacks)");
        } else {
            let mut counts = Vec::new();
            let actions = count_of(context, "action_count");
            let filters = count_of(context, "filter_count");
            if actions > 0 {
                counts.push(format!("{} actions", actions));
            }
            if filters > 0 {
                counts.push(format!("{} filters", filters));
            }
            if !counts.is_empty() {
                summary.push_str(&format!(" ({})", counts.join(", ")));
            }
        }

        return summary;
    }

    String::new()
}

/// Human-friendly label for a plugin or theme slug: `wp-rocket` reads as
/// `Wp Rocket`.
pub fn slug_label(slug: &str) -> String {
    if slug.is_empty() {
        return "Unknown".to_string();
    }

    slug.split(['-', '_'])
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
