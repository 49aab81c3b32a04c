//! Upload payload encoding
//!
//! Files are sent whole, base64-encoded inside a single JSON request. The size
//! limit is enforced from file metadata so oversize files are never read.

use base64::Engine;
use std::path::Path;
use tracing::{debug, warn};

use crate::config::{GatewayConfig, DEFAULT_MAX_UPLOAD_BYTES};
use crate::gateway::GatewayError;

/// A file ready for the `upload` action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedPayload {
    pub filename: String,
    pub mime_type: String,
    /// Base64 (standard alphabet, padded) file content
    pub data: String,
    /// Raw size in bytes
    pub size: u64,
}

/// Size-checked encoder for upload payloads
#[derive(Debug, Clone)]
pub struct UploadEncoder {
    max_bytes: u64,
}

impl Default for UploadEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_UPLOAD_BYTES)
    }
}

impl UploadEncoder {
    pub fn new(max_bytes: u64) -> Self {
        Self { max_bytes }
    }

    pub fn from_config(config: &GatewayConfig) -> Self {
        Self::new(config.max_upload_bytes)
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Read and encode a local file
    pub async fn prepare(&self, path: &Path) -> Result<EncodedPayload, GatewayError> {
        let metadata = tokio::fs::metadata(path).await?;
        if !metadata.is_file() {
            return Err(GatewayError::InvalidEntry(format!("{} is not a file", path.display())));
        }
        self.check_size(metadata.len())?;

        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .ok_or_else(|| {
                GatewayError::InvalidEntry(format!("{} has no usable file name", path.display()))
            })?;

        let bytes = tokio::fs::read(path).await?;
        // The file may have grown between stat and read
        self.check_size(bytes.len() as u64)?;

        Ok(self.encode(filename, &bytes))
    }

    /// Encode content the caller already holds in memory
    pub fn prepare_bytes(
        &self,
        filename: &str,
        bytes: &[u8],
    ) -> Result<EncodedPayload, GatewayError> {
        let filename = filename.trim();
        if filename.is_empty() {
            return Err(GatewayError::InvalidEntry("File name cannot be empty".to_string()));
        }
        self.check_size(bytes.len() as u64)?;
        Ok(self.encode(filename.to_string(), bytes))
    }

    fn check_size(&self, size: u64) -> Result<(), GatewayError> {
        if size > self.max_bytes {
            warn!("Rejected upload of {} bytes (limit {})", size, self.max_bytes);
            return Err(GatewayError::SizeLimit { size, limit: self.max_bytes });
        }
        Ok(())
    }

    fn encode(&self, filename: String, bytes: &[u8]) -> EncodedPayload {
        let mime_type = mime_guess::from_path(&filename)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        debug!("Encoded {} ({} bytes, {})", filename, bytes.len(), mime_type);

        EncodedPayload {
            filename,
            mime_type,
            data: base64::engine::general_purpose::STANDARD.encode(bytes),
            size: bytes.len() as u64,
        }
    }
}
