use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Language used when a sidecar has no text for the requested language.
pub const DEFAULT_LANGUAGE: &str = "en";

/// Configuration for indexing and searching.
///
/// The whole configuration is passed explicitly into every entry point;
/// there is no process-wide mutable state. The search roots, path filters,
/// language and embed flag together form the database fingerprint, so
/// changing any of them marks an existing index as stale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Root directories to index.
    #[serde(default)]
    pub roots: Vec<PathBuf>,

    /// Optional substring or `*`/`?` wildcard filters applied to the full
    /// file path during discovery. Empty means no filtering.
    #[serde(default)]
    pub path_filters: Vec<String>,

    /// Language key used to pick description/keyword text from sidecars.
    #[serde(default = "default_language")]
    pub language: String,

    /// Store base64-encoded image bytes alongside the metadata.
    #[serde(default)]
    pub embed_images: bool,

    #[serde(default = "default_image_extensions")]
    pub image_extensions: Vec<String>,

    /// Recurse into subdirectories of each root.
    #[serde(default = "default_recursive")]
    pub recursive: bool,

    /// Files larger than this are not embedded even when `embed_images`
    /// is set.
    #[serde(default = "default_max_embed_bytes")]
    pub max_embed_bytes: u64,

    /// When set, a database file older than this many hours is rebuilt
    /// even if the fingerprint still matches.
    #[serde(default)]
    pub max_age_hours: Option<u64>,
}

fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("photodex")
        .join("photodex.db")
}

fn default_language() -> String {
    DEFAULT_LANGUAGE.to_string()
}

fn default_image_extensions() -> Vec<String> {
    vec![
        "jpg".to_string(),
        "jpeg".to_string(),
        "png".to_string(),
        "gif".to_string(),
        "webp".to_string(),
        "heic".to_string(),
        "heif".to_string(),
    ]
}

fn default_recursive() -> bool {
    true
}

fn default_max_embed_bytes() -> u64 {
    8 * 1024 * 1024 // 8MB
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            roots: Vec::new(),
            path_filters: Vec::new(),
            language: default_language(),
            embed_images: false,
            image_extensions: default_image_extensions(),
            recursive: default_recursive(),
            max_embed_bytes: default_max_embed_bytes(),
            max_age_hours: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(config_path: &PathBuf) -> Result<Self> {
        if config_path.exists() {
            let content = std::fs::read_to_string(config_path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path();

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;

        Ok(())
    }

    fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("photodex")
            .join("config.toml")
    }
}
