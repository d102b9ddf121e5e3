//! Export serialization.
//!
//! The engine supplies the filtered entry sequence; these helpers render
//! it as a pretty-printed JSON array or as CSV with a fixed column
//! order: timestamp, level, message, plugin, theme, file, line, hook,
//! function_chain (joined by ` -> `).

use crate::engine::entry::LogEntry;

const CSV_HEADER: &str = "timestamp,level,message,plugin,theme,file,line,hook,function_chain";
const CHAIN_DELIMITER: &str = " -> ";

/// Pretty-printed JSON array of entries.
pub fn to_json(entries: &[LogEntry]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(entries)
}

/// CSV document with header row and one row per entry.
pub fn to_csv(entries: &[LogEntry]) -> String {
    let mut out = String::from(CSV_HEADER);
    out.push('\n');

    for entry in entries {
        let row = [
            csv_field(&entry.logged_at),
            csv_field(&entry.level),
            csv_field(&entry.message),
            csv_field(&entry.plugin),
            csv_field(&entry.theme),
            csv_field(&entry.file),
            entry.line.to_string(),
            csv_field(&entry.hook),
            csv_field(&entry.function_chain.join(CHAIN_DELIMITER)),
        ];
        out.push_str(&row.join(","));
        out.push('\n');
    }

    out
}

/// Quote a field when it contains a delimiter, quote, or newline;
/// embedded quotes double up.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
