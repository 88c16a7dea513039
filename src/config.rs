use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/135.0.0.0 Safari/537.36";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Origin of the REST endpoints
    pub base_url: String,
    /// Push notification endpoint
    pub ws_url: String,
    /// Where downloaded slides are written
    pub output_dir: PathBuf,
    pub poll_interval_ms: u64,
    pub heartbeat_interval_ms: u64,
    /// Page size for the slide search
    pub per_page: u32,
    /// Skip TLS certificate verification for REST calls
    pub accept_invalid_certs: bool,
    pub user_agent: String,
    pub window: WindowConfig,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WindowConfig {
    pub width: i32,
    pub height: i32,
    pub max_image_width: u32,
    pub max_image_height: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: "https://classroom.guet.edu.cn".to_string(),
            ws_url: "wss://classroom.guet.edu.cn/ws".to_string(),
            output_dir: PathBuf::from("ppt_images"),
            poll_interval_ms: 1000,
            heartbeat_interval_ms: 5000,
            per_page: 100,
            accept_invalid_certs: false,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            window: WindowConfig::default(),
        }
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 450,
            max_image_width: 800,
            max_image_height: 600,
        }
    }
}

impl Config {
    /// Loads the config file, falling back to defaults when it does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Config file not found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };
        Self::from_json(&contents)
    }

    pub fn from_json(contents: &str) -> Result<Self> {
        let deserializer = &mut serde_json::Deserializer::from_str(contents);
        serde_path_to_error::deserialize(deserializer).map_err(|e| Error::Json {
            path: e.path().to_string(),
            source: e.into_inner(),
        })
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms.max(1))
    }
}
