//! Configuration settings for Sift.

use crate::error::{Result, SiftError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Keys that may be set although they are absent from a serialized default config.
const OPTIONAL_KEYS: &[&str] = &["llm.api_base", "prompts.custom_dir"];

/// Tables whose entries are free-form names.
const MAP_TABLES: &[&str] = &["parser.primary_hosts", "prompts.variables"];

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub llm: LlmSettings,
    pub embedding: EmbeddingSettings,
    pub vector_store: VectorStoreSettings,
    pub retrieval: RetrievalSettings,
    pub parser: ParserSettings,
    pub citations: CitationSettings,
    pub prompts: PromptSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Directory for storing application data.
    pub data_dir: String,
    /// Log level when no -v flag is given (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            data_dir: "~/.sift".to_string(),
            log_level: "warn".to_string(),
        }
    }
}

/// Text model settings, shared by query parsing and answer generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    /// Model used to extract shows, hosts, dates and topics.
    pub parsing_model: String,
    /// Model used to write the final answer.
    pub answer_model: String,
    pub parsing_temperature: f32,
    pub answer_temperature: f32,
    /// OpenAI-compatible API base (e.g. a local Ollama server). None = api.openai.com.
    pub api_base: Option<String>,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            parsing_model: "gpt-4o-mini".to_string(),
            answer_model: "gpt-4o-mini".to_string(),
            parsing_temperature: 0.1,
            answer_temperature: 0.4,
            api_base: None,
            timeout_secs: 300,
        }
    }
}

impl LlmSettings {
    /// Whether requests go to a locally hosted, keyless endpoint.
    pub fn is_local(&self) -> bool {
        self.api_base.as_deref().is_some_and(|base| {
            base.contains("localhost") || base.contains("127.0.0.1")
        })
    }
}

/// Embedding generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// Embedding model to use.
    pub model: String,
    /// Embedding dimensions.
    pub dimensions: u32,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            model: "text-embedding-3-small".to_string(),
            dimensions: 1536,
        }
    }
}

/// Vector store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorStoreSettings {
    /// Vector store provider (sqlite, memory).
    pub provider: String,
    /// Path to SQLite database (for sqlite provider).
    pub sqlite_path: String,
}

impl Default for VectorStoreSettings {
    fn default() -> Self {
        Self {
            provider: "sqlite".to_string(),
            sqlite_path: "~/.sift/chunks.db".to_string(),
        }
    }
}

/// Retrieval settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    /// Maximum number of chunks handed to answer generation.
    pub context_budget: usize,
    /// A host joins the parser vocabulary once they appear in this many videos.
    pub min_host_videos: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            context_budget: 100,
            min_host_videos: 5,
        }
    }
}

/// Query parser settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserSettings {
    /// Earliest year with published videos; year filters never go below it.
    pub corpus_start_year: i32,
    /// First name -> canonical full host name.
    pub primary_hosts: BTreeMap<String, String>,
}

impl Default for ParserSettings {
    fn default() -> Self {
        let primary_hosts = [
            ("Greg", "Greg Miller"),
            ("Tim", "Tim Gettys"),
            ("Nick", "Nick Scarpino"),
            ("Kevin", "Kevin Coello"),
            ("Joey", "Joey Noelle"),
            ("Andy", "Andy Cortez"),
            ("Barrett", "Barrett Courtney"),
            ("Blessing", "Blessing Adeoye Jr."),
            ("Mike", "Mike Howard"),
            ("SnowBikeMike", "Mike Howard"),
            ("Roger", "Roger Pokorny"),
            ("Parris", "Parris Lilly"),
            ("Paris", "Parris Lilly"),
            ("Gary", "Gary Whitta"),
            ("Fran", "Fran Mirabella III"),
            ("Janet", "Janet Garcia"),
            ("Andrea", "Andrea Rene"),
            ("Tamoor", "Tamoor Hussain"),
            ("Jared", "Jared Petty"),
            ("Colin", "Colin Moriarty"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            corpus_start_year: 2012,
            primary_hosts,
        }
    }
}

/// Citation link settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CitationSettings {
    /// Seconds added to each deep link offset (negative rewinds).
    pub timestamp_buffer_secs: i64,
    pub watch_base_url: String,
    pub thumbnail_base_url: String,
}

impl Default for CitationSettings {
    fn default() -> Self {
        Self {
            timestamp_buffer_secs: 0,
            watch_base_url: "https://www.youtube.com/watch".to_string(),
            thumbnail_base_url: "https://i.ytimg.com/vi".to_string(),
        }
    }
}

/// Prompt customization settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PromptSettings {
    /// Directory for custom prompts (overrides defaults).
    pub custom_dir: Option<String>,
    /// Custom variables available in all prompts as {{variable_name}}.
    pub variables: std::collections::HashMap<String, String>,
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let settings: Settings = toml::from_str(&content)?;
            Ok(settings)
        } else {
            Ok(Settings::default())
        }
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| SiftError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("sift")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded data directory path.
    pub fn data_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.data_dir)
    }

    /// Get the expanded SQLite database path.
    pub fn sqlite_path(&self) -> PathBuf {
        Self::expand_path(&self.vector_store.sqlite_path)
    }

    /// Set a dotted key such as `retrieval.context_budget`.
    ///
    /// `raw` is read as a TOML scalar (`5`, `0.2`, `true`), falling back to a
    /// plain string. The settings are left untouched on error.
    pub fn set_value(&mut self, key: &str, raw: &str) -> Result<()> {
        let unknown = || SiftError::Config(format!("Unknown configuration key '{}'", key));

        let (parent, leaf) = key.rsplit_once('.').ok_or_else(unknown)?;
        let mut root = toml::Value::try_from(&*self)
            .map_err(|e| SiftError::Config(format!("Failed to serialize config: {}", e)))?;

        let mut table = root.as_table_mut().ok_or_else(unknown)?;
        for segment in parent.split('.') {
            table = table
                .get_mut(segment)
                .and_then(toml::Value::as_table_mut)
                .ok_or_else(unknown)?;
        }
        if !table.contains_key(leaf) && !OPTIONAL_KEYS.contains(&key) && !MAP_TABLES.contains(&parent) {
            return Err(unknown());
        }

        let typed = parse_scalar(raw);
        let as_string = toml::Value::String(raw.to_string());
        let retry = typed != as_string;

        table.insert(leaf.to_string(), typed);
        let updated = match root.clone().try_into::<Settings>() {
            Ok(settings) => settings,
            Err(_) if retry => {
                let mut root = root;
                set_path(&mut root, parent, leaf, as_string);
                root.try_into::<Settings>()
                    .map_err(|e| SiftError::Config(format!("Invalid value for {}: {}", key, e)))?
            }
            Err(e) => {
                return Err(SiftError::Config(format!("Invalid value for {}: {}", key, e)));
            }
        };

        *self = updated;
        Ok(())
    }
}

fn parse_scalar(raw: &str) -> toml::Value {
    format!("value = {}", raw)
        .parse::<toml::Table>()
        .ok()
        .and_then(|mut table| table.remove("value"))
        .unwrap_or_else(|| toml::Value::String(raw.to_string()))
}

fn set_path(root: &mut toml::Value, parent: &str, leaf: &str, value: toml::Value) {
    let mut current = root;
    for segment in parent.split('.') {
        match current.get_mut(segment) {
            Some(next) => current = next,
            None => return,
        }
    }
    if let Some(table) = current.as_table_mut() {
        table.insert(leaf.to_string(), value);
    }
}
