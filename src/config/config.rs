use crate::config::request_timeout::RequestTimeout;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use thiserror::Error;
use tracing::{error, info};

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(default)]
pub struct ModelConfig {
    name: String,
    base_url: String,
    api_key: Option<String>,
    request_timeout: Option<RequestTimeout>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: "gemini-1.5-flash".to_string(),
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            api_key: None,
            request_timeout: None,
        }
    }
}

impl ModelConfig {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn generate_content_url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.name
        )
    }

    pub fn request_timeout(&self) -> Option<RequestTimeout> {
        self.request_timeout
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(default)]
pub struct EstimationConfig {
    runs: usize,
    max_runs: usize,
    jpeg_quality: u8,
}

impl Default for EstimationConfig {
    fn default() -> Self {
        Self {
            runs: 10,
            max_runs: 50,
            jpeg_quality: 75,
        }
    }
}

impl EstimationConfig {
    pub fn runs(&self) -> usize {
        self.runs
    }

    /// Upper bound for a caller-supplied run count.
    pub fn max_runs(&self) -> usize {
        self.max_runs
    }

    pub fn jpeg_quality(&self) -> u8 {
        self.jpeg_quality
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(default)]
pub struct ServerConfig {
    listen_address: SocketAddr,
    max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_address: SocketAddr::from(([0, 0, 0, 0], 3000)),
            max_upload_bytes: 20 * 1024 * 1024,
        }
    }
}

impl ServerConfig {
    pub fn listen_address(&self) -> SocketAddr {
        self.listen_address
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_bytes
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(default)]
pub struct Config {
    model: ModelConfig,
    estimation: EstimationConfig,
    server: ServerConfig,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Error reading config: {0}")]
    Confy(#[from] confy::ConfyError),
}

impl Config {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Option<Config> {
        match Config::load_or_create(path) {
            Ok(cfg) => Some(cfg),
            Err(err) => {
                error!("Failed to load configuration: {}", err);
                None
            }
        }
    }

    fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
        let path = path.as_ref();

        if path.exists() {
            let cfg: Self = confy::load_path(path)?;
            Ok(cfg)
        } else {
            if let Some(dir) = path.parent() {
                fs::create_dir_all(dir)?;
            }
            let cfg = Config::default();
            confy::store_path(path, &cfg)?;
            info!("Wrote default configuration to {}", path.display());
            Ok(cfg)
        }
    }

    pub fn model(&self) -> &ModelConfig {
        &self.model
    }

    pub fn estimation(&self) -> &EstimationConfig {
        &self.estimation
    }

    pub fn server(&self) -> &ServerConfig {
        &self.server
    }

    /// Picks the credential passed on the command line or environment over
    /// the one stored in the file. Blank keys count as missing.
    pub fn resolve_api_key(&self, override_key: Option<&str>) -> Option<String> {
        usable_key(override_key)
            .or_else(|| usable_key(self.model.api_key.as_deref()))
            .map(str::to_string)
    }
}

fn usable_key(key: Option<&str>) -> Option<&str> {
    key.map(str::trim).filter(|key| !key.is_empty())
}
