// Gateway Configuration Module
// Persistent endpoint/root configuration with snapshot publishing

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::gateway::{strip_url_query, GatewayError};

/// Default upload ceiling: 25 MiB
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 25 * 1024 * 1024;

/// Default health-check deadline in seconds
pub const DEFAULT_HEALTH_TIMEOUT_SECS: u64 = 5;

/// Gateway configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    /// Deployed gateway URL all actions are POSTed to
    #[serde(default)]
    pub endpoint_url: String,
    /// Shared root folder; privileged identities browse it directly and
    /// personal roots are created beneath it
    #[serde(default)]
    pub root_folder_id: String,
    /// Largest file accepted for upload
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,
    /// Deadline for the health check
    #[serde(default = "default_health_timeout_secs")]
    pub health_timeout_secs: u64,
}

fn default_max_upload_bytes() -> u64 {
    DEFAULT_MAX_UPLOAD_BYTES
}

fn default_health_timeout_secs() -> u64 {
    DEFAULT_HEALTH_TIMEOUT_SECS
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            endpoint_url: String::new(),
            root_folder_id: String::new(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            health_timeout_secs: DEFAULT_HEALTH_TIMEOUT_SECS,
        }
    }
}

impl GatewayConfig {
    pub fn new(endpoint_url: impl Into<String>, root_folder_id: impl Into<String>) -> Self {
        Self {
            endpoint_url: endpoint_url.into(),
            root_folder_id: root_folder_id.into(),
            ..Default::default()
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.endpoint_url.trim().is_empty() && !self.root_folder_id.trim().is_empty()
    }
}

/// Get the path to the gateway config file
pub fn default_config_path() -> PathBuf {
    let config_dir = dirs::config_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")));
    config_dir.join("gateway-drive").join("gateway_config.json")
}

/// Load gateway configuration from disk.
///
/// A missing or unreadable file yields an empty configuration; operations
/// then fail with a configuration error instead of a transport error.
pub fn load_gateway_config(path: &Path) -> GatewayConfig {
    if path.exists() {
        match fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(config) => return config,
                Err(e) => warn!("Failed to parse gateway config: {}", e),
            },
            Err(e) => warn!("Failed to read gateway config: {}", e),
        }
    }

    GatewayConfig::default()
}

/// Save gateway configuration to disk
pub fn save_gateway_config(path: &Path, config: &GatewayConfig) -> Result<(), GatewayError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let content = serde_json::to_string_pretty(config)
        .map_err(|e| GatewayError::Configuration(format!("Failed to serialize config: {}", e)))?;

    fs::write(path, content)?;

    info!("Gateway config saved to {:?}", path);
    Ok(())
}

/// Validate gateway configuration
pub fn validate_config(config: &GatewayConfig) -> Result<(), GatewayError> {
    let endpoint = config.endpoint_url.trim();
    if endpoint.is_empty() {
        return Err(GatewayError::Configuration("Gateway endpoint URL is not set".to_string()));
    }

    let parsed = url::Url::parse(endpoint)
        .map_err(|e| GatewayError::Configuration(format!("Invalid endpoint URL: {}", e)))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(GatewayError::Configuration(format!(
            "Endpoint URL must use http or https, got '{}'",
            parsed.scheme()
        )));
    }

    if config.root_folder_id.trim().is_empty() {
        return Err(GatewayError::Configuration("Root folder id is not set".to_string()));
    }

    if config.max_upload_bytes == 0 {
        return Err(GatewayError::Configuration("Upload limit must be positive".to_string()));
    }

    if config.health_timeout_secs == 0 {
        return Err(GatewayError::Configuration(
            "Health-check timeout must be positive".to_string(),
        ));
    }

    Ok(())
}

/// Process-wide configuration holder.
///
/// Readers take an `Arc` snapshot and keep using it for the whole operation;
/// `save` publishes a new snapshot under the write lock, so a reader sees
/// either the old or the new configuration, never a mix.
pub struct ConfigStore {
    current: RwLock<Arc<GatewayConfig>>,
    path: Option<PathBuf>,
}

impl ConfigStore {
    /// In-memory store (nothing is written on save)
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            current: RwLock::new(Arc::new(config)),
            path: None,
        }
    }

    /// Store backed by a JSON file
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let config = load_gateway_config(&path);
        Self {
            current: RwLock::new(Arc::new(config)),
            path: Some(path),
        }
    }

    /// Current snapshot, whatever its validity
    pub async fn snapshot(&self) -> Arc<GatewayConfig> {
        self.current.read().await.clone()
    }

    /// Current snapshot, rejected with a configuration error when incomplete
    pub async fn require(&self) -> Result<Arc<GatewayConfig>, GatewayError> {
        let snapshot = self.snapshot().await;
        validate_config(&snapshot)?;
        Ok(snapshot)
    }

    /// Validate, persist and publish a new configuration
    pub async fn save(&self, config: GatewayConfig) -> Result<Arc<GatewayConfig>, GatewayError> {
        validate_config(&config)?;

        let mut current = self.current.write().await;
        if let Some(ref path) = self.path {
            save_gateway_config(path, &config)?;
        }

        let published = Arc::new(config);
        *current = published.clone();
        info!(
            "Published gateway config (endpoint {})",
            strip_url_query(&published.endpoint_url)
        );
        Ok(published)
    }

    /// Re-read the backing file, replacing the current snapshot
    pub async fn reload(&self) -> Arc<GatewayConfig> {
        let mut current = self.current.write().await;
        if let Some(ref path) = self.path {
            *current = Arc::new(load_gateway_config(path));
        }
        current.clone()
    }
}
