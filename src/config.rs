use crate::storage::StorageMode;
use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Shared configuration handle.
///
/// The engine loads a fresh snapshot from this at the start of every
/// operation, so swapping in a new `Config` (e.g. after a reload) takes
/// effect on the very next call — including a storage-mode switch, with
/// no restart and no caching across the read/write cycle.
pub type SharedConfig = Arc<ArcSwap<Config>>;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub storage: StorageConfig,
    pub engine: EngineConfig,
    pub enrichment: EnrichmentConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Active backend: `file` or `database`. Re-read on every operation.
    pub mode: StorageMode,
    /// Path of the append-only log file (file backend).
    pub file_path: PathBuf,
    /// SQLite URL of the log table (database backend), e.g. `sqlite:data/commonlog.db`.
    pub database_url: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Capture the caller frame chain at write time when the caller did not
    /// provide one.
    pub capture_function_chain: bool,
    /// Render every written entry to stderr for immediate inspection.
    pub developer_mode: bool,
}

/// Roots used to classify a call site's origin.
///
/// A source path under a plugin root is attributed to the first path
/// segment below that root; theme roots work the same way.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct EnrichmentConfig {
    pub plugin_roots: Vec<PathBuf>,
    pub theme_roots: Vec<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage: StorageConfig {
                mode: StorageMode::File,
                file_path: PathBuf::from("data/commonlog.log"),
                database_url: "sqlite:data/commonlog.db".to_string(),
            },
            engine: EngineConfig {
                capture_function_chain: true,
                developer_mode: false,
            },
            enrichment: EnrichmentConfig::default(),
        }
    }
}

impl Config {
    /// Wrap this config in the swappable handle the engine consumes.
    pub fn into_shared(self) -> SharedConfig {
        Arc::new(ArcSwap::from_pointee(self))
    }
}

/// Load configuration from an optional TOML file plus `COMMONLOG__*`
/// environment overrides.
///
/// A missing file is not an error; defaults apply.
pub fn load_config(path: &Path) -> anyhow::Result<Config> {
    let builder = config::Config::builder()
        .add_source(config::File::from(path).required(false))
        .add_source(config::Environment::with_prefix("COMMONLOG").separator("__"))
        .set_default("storage.mode", "file")?
        .set_default("storage.file_path", "data/commonlog.log")?
        .set_default("storage.database_url", "sqlite:data/commonlog.db")?
        .set_default("engine.capture_function_chain", true)?
        .set_default("engine.developer_mode", false)?
        .set_default("enrichment.plugin_roots", Vec::<String>::new())?
        .set_default("enrichment.theme_roots", Vec::<String>::new())?;

    let cfg: Config = builder.build()?.try_deserialize()?;
    validate_config(&cfg)?;

    Ok(cfg)
}

fn validate_config(cfg: &Config) -> anyhow::Result<()> {
    match cfg.storage.mode {
        StorageMode::File => {
            if cfg.storage.file_path.as_os_str().is_empty() {
                anyhow::bail!("storage.file_path cannot be empty in file mode");
            }
        }
        StorageMode::Database => {
            if !cfg.storage.database_url.starts_with("sqlite:") {
                anyhow::bail!(
                    "storage.database_url must be a sqlite: URL, got '{}'",
                    cfg.storage.database_url
                );
            }
        }
    }

    Ok(())
}
