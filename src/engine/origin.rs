//! Origin and call-chain enrichment.
//!
//! Rust offers no reliable runtime stack introspection, so origin capture
//! is explicit rather than stack-walked: the call site comes from
//! `#[track_caller]` on the logging wrappers, the ambient hook name from
//! a scoped guard the host installs around hook dispatch, and the
//! function chain from frame guards the host's instrumentation pushes at
//! its own entry points. All three survive optimization levels that would
//! elide stack frames.
//!
//! Scopes are thread-local; the engine reads them in the synchronous
//! prefix of a write, before the future first suspends, so they carry
//! the caller's values even on a multi-threaded runtime.

use crate::config::EnrichmentConfig;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::panic::Location;
use std::path::Path;

/// Path fragment identifying this crate's own code. Call sites and frames
/// matching it are treated as internal and suppressed from enrichment,
/// which is what breaks self-logging loops.
pub const SELF_TAG: &str = "commonlog";

/// Frames collected into a function chain, most-recent-first.
pub const MAX_CHAIN_DEPTH: usize = 10;

thread_local! {
    static HOOK_STACK: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
    static FRAME_STACK: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
}

/// Source location of the statement that invoked the logger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallSite {
    pub file: &'static str,
    pub line: u32,
}

impl CallSite {
    #[track_caller]
    pub fn caller() -> Self {
        let location = Location::caller();
        Self {
            file: location.file(),
            line: location.line(),
        }
    }

    /// True when the call site lives inside this crate itself.
    pub fn is_internal(&self) -> bool {
        self.file.contains(SELF_TAG)
    }
}

/// Provenance derived from a call site: owning plugin or theme (by root
/// directory), source file and line, and the hook active at call time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OriginMetadata {
    pub plugin: String,
    pub theme: String,
    pub file: String,
    pub line: i64,
    pub hook: String,
}

/// Classify a call site against the configured plugin/theme roots.
///
/// A file under a plugin root is attributed to the first path segment
/// below that root; theme roots work the same way. Files under neither
/// root keep only file/line provenance.
pub fn classify(site: &CallSite, roots: &EnrichmentConfig) -> OriginMetadata {
    let mut metadata = OriginMetadata {
        file: site.file.to_string(),
        line: site.line as i64,
        hook: current_hook().unwrap_or_default(),
        ..Default::default()
    };

    if let Some(slug) = first_segment_under(site.file, &roots.plugin_roots) {
        metadata.plugin = slug;
    } else if let Some(slug) = first_segment_under(site.file, &roots.theme_roots) {
        metadata.theme = slug;
    }

    metadata
}

fn first_segment_under(file: &str, roots: &[std::path::PathBuf]) -> Option<String> {
    let path = Path::new(file);

    for root in roots {
        if let Ok(relative) = path.strip_prefix(root) {
            let segment = relative
                .components()
                .next()
                .map(|c| c.as_os_str().to_string_lossy().to_string())?;

            if segment.starts_with(SELF_TAG) {
                continue;
            }

            return Some(segment);
        }
    }

    None
}

/// RAII scope marking the hook/event currently being dispatched, the
/// analogue of the host runtime's "current filter". Nests.
pub struct HookScope;

impl HookScope {
    pub fn enter(name: impl Into<String>) -> Self {
        HOOK_STACK.with(|stack| stack.borrow_mut().push(name.into()));
        Self
    }
}

impl Drop for HookScope {
    fn drop(&mut self) {
        HOOK_STACK.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

/// Name of the innermost active hook scope, if any.
pub fn current_hook() -> Option<String> {
    HOOK_STACK.with(|stack| stack.borrow().last().cloned())
}

/// RAII frame marker for function-chain capture. Host code pushes one at
/// each instrumented entry point with a `Module::function` identifier.
pub struct FrameGuard;

impl FrameGuard {
    pub fn enter(identifier: impl Into<String>) -> Self {
        FRAME_STACK.with(|stack| stack.borrow_mut().push(identifier.into()));
        Self
    }
}

impl Drop for FrameGuard {
    fn drop(&mut self) {
        FRAME_STACK.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

/// Snapshot of the instrumented frame stack, most-recent-first, skipping
/// this crate's own frames, capped at `max_depth`.
pub fn function_chain(max_depth: usize) -> Vec<String> {
    FRAME_STACK.with(|stack| {
        stack
            .borrow()
            .iter()
            .rev()
            .filter(|frame| !frame.contains(SELF_TAG))
            .take(max_depth)
            .cloned()
            .collect()
    })
}
