use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Where the database listens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Default for Endpoint {
    fn default() -> Self {
        Self {
            host: "localhost".to_owned(),
            port: 9080,
        }
    }
}

impl Endpoint {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// TLS material handed to the transport; the compiler never reads it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsConfig {
    pub ca_cert: PathBuf,
    pub client_cert: Option<PathBuf>,
    pub client_key: Option<PathBuf>,
    pub server_name: Option<String>,
}

/// Sizing of the buffered mutation pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Number of persistent worker threads.
    pub workers: usize,
    /// Queue slots before `submit` blocks; 0 means one slot per worker.
    pub queue_capacity: usize,
    /// Executions allowed per mutation, counting replays.
    pub max_attempts: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: 5,
            queue_capacity: 0,
            max_attempts: 3,
        }
    }
}

impl PipelineConfig {
    pub fn single_worker() -> Self {
        Self {
            workers: 1,
            queue_capacity: 1,
            max_attempts: 3,
        }
    }

    pub fn throughput() -> Self {
        Self {
            workers: 16,
            queue_capacity: 1024,
            max_attempts: 5,
        }
    }

    /// Queue capacity with the "one slot per worker" default applied.
    pub fn effective_capacity(&self) -> usize {
        if self.queue_capacity == 0 {
            self.workers.max(1)
        } else {
            self.queue_capacity
        }
    }
}

/// Client initialization parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Deadline applied to synchronous calls without an explicit token.
    pub default_timeout_ms: Option<u64>,
    pub endpoint: Endpoint,
    pub pipeline: PipelineConfig,
    pub tls: Option<TlsConfig>,
}

impl ClientConfig {
    pub fn local() -> Self {
        Self::default()
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: ClientConfig =
            toml::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `path`, or the default location, falling back to defaults when
    /// no file exists.
    pub fn load_or_default(explicit: Option<PathBuf>) -> Result<Self, ConfigError> {
        match explicit.or_else(Self::default_path) {
            Some(path) if path.exists() => Self::load(path),
            _ => Ok(Self::default()),
        }
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: ClientConfig = toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: PathBuf::from("<inline>"),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|err| ConfigError::Invalid(err.to_string()))
    }

    /// `<config dir>/dqlc/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("dqlc").join("config.toml"))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.endpoint.host.trim().is_empty() {
            return Err(ConfigError::Invalid("endpoint.host cannot be empty".into()));
        }
        if self.pipeline.workers == 0 {
            return Err(ConfigError::Invalid("pipeline.workers must be at least 1".into()));
        }
        if self.pipeline.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "pipeline.max_attempts must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}
