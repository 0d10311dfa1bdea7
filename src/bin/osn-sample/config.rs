use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Settings read from the optional TOML config file.
#[derive(Debug, Default)]
pub struct CliConfig {
    path: Option<PathBuf>,
    loaded: bool,
    data: RawConfig,
}

impl CliConfig {
    pub fn load(explicit: Option<PathBuf>) -> Result<Self, ConfigError> {
        let required = explicit.is_some();
        let path = explicit.or_else(default_config_path);
        let mut loaded = false;
        let data = match path.as_ref() {
            Some(config_path) if config_path.exists() => {
                loaded = true;
                read_file(config_path)?
            }
            Some(config_path) if required => {
                return Err(ConfigError::Missing {
                    path: config_path.clone(),
                })
            }
            _ => RawConfig::default(),
        };
        validate(&data)?;
        Ok(Self { path, loaded, data })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn log_level(&self) -> Option<&str> {
        self.data.log_level.as_deref()
    }

    pub fn tokens(&self) -> &[String] {
        &self.data.api.tokens
    }

    pub fn tokens_file(&self) -> Option<&Path> {
        self.data.api.tokens_file.as_deref()
    }

    pub fn base_url(&self) -> Option<&str> {
        self.data.api.base_url.as_deref()
    }

    pub fn timeout_secs(&self) -> Option<u64> {
        self.data.api.timeout_secs
    }

    pub fn page_size(&self) -> Option<u32> {
        self.data.api.page_size
    }

    pub fn max_transient_retries(&self) -> Option<u32> {
        self.data.retry.max_transient_retries
    }

    pub fn backoff_ms(&self) -> Option<u64> {
        self.data.retry.backoff_ms
    }

    pub fn output_path(&self) -> Option<&Path> {
        self.data.output.path.as_deref()
    }

    /// Config contents with token values hidden, for display.
    pub fn redacted(&self) -> ConfigSummary {
        ConfigSummary {
            path: self.path.clone(),
            loaded: self.is_loaded(),
            log_level: self.data.log_level.clone(),
            tokens: self.data.api.tokens.len(),
            tokens_file: self.data.api.tokens_file.clone(),
            base_url: self.data.api.base_url.clone(),
            timeout_secs: self.data.api.timeout_secs,
            page_size: self.data.api.page_size,
            max_transient_retries: self.data.retry.max_transient_retries,
            backoff_ms: self.data.retry.backoff_ms,
            output: self.data.output.path.clone(),
        }
    }
}

/// Printable view of the configuration.
#[derive(Debug, Serialize)]
pub struct ConfigSummary {
    pub path: Option<PathBuf>,
    pub loaded: bool,
    pub log_level: Option<String>,
    pub tokens: usize,
    pub tokens_file: Option<PathBuf>,
    pub base_url: Option<String>,
    pub timeout_secs: Option<u64>,
    pub page_size: Option<u32>,
    pub max_transient_retries: Option<u32>,
    pub backoff_ms: Option<u64>,
    pub output: Option<PathBuf>,
}

fn read_file(path: &Path) -> Result<RawConfig, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn validate(data: &RawConfig) -> Result<(), ConfigError> {
    if data.api.timeout_secs == Some(0) {
        return Err(ConfigError::InvalidValue {
            key: "api.timeout_secs",
            reason: "must be at least 1".into(),
        });
    }
    if data.api.page_size == Some(0) {
        return Err(ConfigError::InvalidValue {
            key: "api.page_size",
            reason: "must be at least 1".into(),
        });
    }
    Ok(())
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    log_level: Option<String>,
    #[serde(default)]
    api: ApiSection,
    #[serde(default)]
    retry: RetrySection,
    #[serde(default)]
    output: OutputSection,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct ApiSection {
    #[serde(default)]
    tokens: Vec<String>,
    tokens_file: Option<PathBuf>,
    base_url: Option<String>,
    timeout_secs: Option<u64>,
    page_size: Option<u32>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct RetrySection {
    max_transient_retries: Option<u32>,
    backoff_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct OutputSection {
    path: Option<PathBuf>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("config file {path} does not exist")]
    Missing { path: PathBuf },
    #[error("config value {key} is invalid: {reason}")]
    InvalidValue { key: &'static str, reason: String },
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|base| base.join("osn-sampler").join("config.toml"))
}
