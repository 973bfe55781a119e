use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use doccat_core::similarity::DEFAULT_SIMILAR_LIMIT;

/// Environment variable that overrides `session.owner`.
pub const OWNER_ENV: &str = "DOCCAT_OWNER";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub duplicates: DuplicatesConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_backend")]
    pub backend: String,
    /// Base directory of the filesystem backend.
    #[serde(default)]
    pub root: Option<PathBuf>,
    #[serde(default)]
    pub s3: Option<S3StorageConfig>,
}

fn default_backend() -> String {
    "filesystem".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct S3StorageConfig {
    pub bucket: String,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default)]
    pub prefix: String,
    /// Custom endpoint for S3-compatible services (MinIO, Supabase storage).
    #[serde(default)]
    pub endpoint_url: Option<String>,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct SessionConfig {
    #[serde(default)]
    pub owner: Option<String>,
}

/// What to do when a duplicate check itself fails.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CheckFailurePolicy {
    /// Stop and wait for an explicit decision.
    Block,
    /// Continue as if no duplicate was found.
    Proceed,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DuplicatesConfig {
    #[serde(default = "default_similar_limit")]
    pub similar_limit: usize,
    #[serde(default = "default_single_policy")]
    pub on_check_failure_single: CheckFailurePolicy,
    #[serde(default = "default_bulk_policy")]
    pub on_check_failure_bulk: CheckFailurePolicy,
}

impl Default for DuplicatesConfig {
    fn default() -> Self {
        Self {
            similar_limit: DEFAULT_SIMILAR_LIMIT,
            on_check_failure_single: default_single_policy(),
            on_check_failure_bulk: default_bulk_policy(),
        }
    }
}

fn default_similar_limit() -> usize {
    DEFAULT_SIMILAR_LIMIT
}
fn default_single_policy() -> CheckFailurePolicy {
    CheckFailurePolicy::Block
}
fn default_bulk_policy() -> CheckFailurePolicy {
    CheckFailurePolicy::Proceed
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_batch_pause_ms")]
    pub batch_pause_ms: u64,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            batch_pause_ms: default_batch_pause_ms(),
            include_globs: default_include_globs(),
            exclude_globs: Vec::new(),
        }
    }
}

fn default_batch_size() -> usize {
    10
}
fn default_batch_pause_ms() -> u64 {
    500
}
fn default_include_globs() -> Vec<String> {
    vec![
        "**/*.pdf".to_string(),
        "**/*.docx".to_string(),
        "**/*.txt".to_string(),
        "**/*.md".to_string(),
    ]
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExtractionConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    /// Base URL override (Ollama host or an OpenAI-compatible gateway).
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Maximum characters of document text sent to the model.
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            url: None,
            timeout_secs: default_timeout_secs(),
            max_chars: default_max_chars(),
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_timeout_secs() -> u64 {
    60
}
fn default_max_chars() -> usize {
    6000
}

impl ExtractionConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

impl Config {
    /// Owner of the current session: `DOCCAT_OWNER` wins over the file.
    pub fn session_owner(&self) -> Option<String> {
        std::env::var(OWNER_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .or_else(|| self.session.owner.clone())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    if config.ingest.batch_size == 0 {
        bail!("ingest.batch_size must be > 0");
    }
    if config.duplicates.similar_limit == 0 {
        bail!("duplicates.similar_limit must be > 0");
    }

    match config.storage.backend.as_str() {
        "filesystem" => {
            if config.storage.root.is_none() {
                bail!("storage.root must be set when storage.backend = 'filesystem'");
            }
        }
        "s3" => match &config.storage.s3 {
            Some(s3) if !s3.bucket.is_empty() => {}
            _ => bail!("[storage.s3] with a bucket is required when storage.backend = 's3'"),
        },
        other => bail!(
            "Unknown storage backend: '{}'. Must be filesystem or s3.",
            other
        ),
    }

    match config.extraction.provider.as_str() {
        "disabled" => {}
        "openai" | "ollama" => {
            if config.extraction.model.is_none() {
                bail!(
                    "extraction.model must be specified when provider is '{}'",
                    config.extraction.provider
                );
            }
        }
        other => bail!(
            "Unknown extraction provider: '{}'. Must be disabled, openai, or ollama.",
            other
        ),
    }

    Ok(config)
}
