//! Shared types for the gateway client
//!
//! Wire-level entries, navigation history, identities, compatibility states
//! and the error taxonomy used by every component of the crate.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use thiserror::Error;

/// Reserved MIME type that marks an entry as a folder
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// Remote file or folder as returned by the `list` action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteEntry {
    /// Backend object id, stable over time
    pub id: String,
    /// Display name
    pub name: String,
    /// MIME type; folders carry `FOLDER_MIME_TYPE`
    #[serde(default, deserialize_with = "deserialize_nullable_string")]
    pub mime_type: String,
    /// Browser URL for the object (folders usually have none)
    #[serde(default)]
    pub url: Option<String>,
    /// Size in bytes (0 for folders). Older gateways send it as a string.
    #[serde(default, deserialize_with = "deserialize_size")]
    pub size: u64,
}

impl RemoteEntry {
    /// Create a folder entry
    pub fn folder(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            mime_type: FOLDER_MIME_TYPE.to_string(),
            url: None,
            size: 0,
        }
    }

    /// Create a file entry
    pub fn file(
        id: impl Into<String>,
        name: impl Into<String>,
        mime_type: impl Into<String>,
        size: u64,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            mime_type: mime_type.into(),
            url: None,
            size,
        }
    }

    pub fn is_folder(&self) -> bool {
        self.mime_type == FOLDER_MIME_TYPE
    }

    /// File extension, if any
    pub fn extension(&self) -> Option<&str> {
        if self.is_folder() {
            return None;
        }
        self.name.rsplit('.').next().filter(|ext| ext.len() < self.name.len())
    }
}

fn deserialize_size<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawSize {
        Number(u64),
        Float(f64),
        Text(String),
        Null,
    }

    Ok(match RawSize::deserialize(deserializer)? {
        RawSize::Number(n) => n,
        RawSize::Float(f) if f.is_finite() && f >= 0.0 => f as u64,
        RawSize::Text(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    })
}

fn deserialize_nullable_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// One level of navigation history. Never holds the sandbox root itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderStackEntry {
    pub id: String,
    pub name: String,
}

impl From<&RemoteEntry> for FolderStackEntry {
    fn from(entry: &RemoteEntry) -> Self {
        Self {
            id: entry.id.clone(),
            name: entry.name.clone(),
        }
    }
}

/// Role of the acting identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Teacher,
    Student,
}

impl Role {
    /// Privileged roles browse the shared root instead of a personal one
    pub fn is_privileged(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Admin => write!(f, "Admin"),
            Role::Teacher => write!(f, "Teacher"),
            Role::Student => write!(f, "Student"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" | "administrator" => Ok(Role::Admin),
            "teacher" => Ok(Role::Teacher),
            "student" => Ok(Role::Student),
            other => Err(GatewayError::InvalidEntry(format!("unknown role: {}", other))),
        }
    }
}

/// The acting user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    /// Stable identity id (user record key)
    pub id: String,
    /// Display name, used for the personal folder name
    pub name: String,
    pub role: Role,
    /// Personal sandbox root, filled lazily by the resolver
    #[serde(default)]
    pub personal_root_id: Option<String>,
}

impl Identity {
    pub fn new(id: impl Into<String>, name: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            role,
            personal_root_id: None,
        }
    }

    /// Deterministic, role-qualified name of the personal root folder
    pub fn personal_folder_name(&self) -> String {
        format!("{} - {} [{}]", self.role, self.name.trim(), self.id)
    }
}

/// Classified outcome of a gateway health check
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompatibilityState {
    /// Check in flight
    #[default]
    Checking,
    /// Gateway reports the expected version
    Matches,
    /// No endpoint configured
    NotConfigured,
    /// Timeout or network failure
    ConnectionError,
    /// Markup or non-JSON response (deployment/permission problem)
    ProtocolError,
    /// Gateway answered but with a missing or different version
    Outdated,
}

impl CompatibilityState {
    /// Short label for UI annotation
    pub fn label(&self) -> &'static str {
        match self {
            CompatibilityState::Checking => "Checking gateway...",
            CompatibilityState::Matches => "Gateway up to date",
            CompatibilityState::NotConfigured => "Gateway not configured",
            CompatibilityState::ConnectionError => "Gateway unreachable",
            CompatibilityState::ProtocolError => {
                "Gateway returned a web page; check that it is deployed for anonymous access"
            }
            CompatibilityState::Outdated => "Gateway is outdated; redeploy the latest version",
        }
    }

    /// Whether version-dependent features (rename) are known to work
    pub fn supports_versioned_features(&self) -> bool {
        matches!(self, CompatibilityState::Matches)
    }
}

impl fmt::Display for CompatibilityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Gateway error type
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Network error: {0}")]
    Transport(String),

    #[error("Gateway timed out")]
    Timeout,

    #[error("Gateway protocol error: {0}")]
    Protocol(String),

    #[error("{0}")]
    Remote(String),

    #[error("Gateway is outdated: {0}")]
    Compatibility(String),

    #[error("File too large: {size} bytes (limit {limit} bytes)")]
    SizeLimit { size: u64, limit: u64 },

    #[error("Invalid entry: {0}")]
    InvalidEntry(String),

    #[error("Breadcrumb {index} out of range (depth {depth})")]
    InvalidBreadcrumb { index: usize, depth: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl GatewayError {
    /// Transport-class failures may succeed when the caller retries
    pub fn is_recoverable(&self) -> bool {
        matches!(self, GatewayError::Transport(_) | GatewayError::Timeout)
    }

    /// Whether the calling feature should disable itself rather than report a failure
    pub fn is_compatibility(&self) -> bool {
        matches!(self, GatewayError::Compatibility(_))
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            GatewayError::Timeout
        } else {
            GatewayError::Transport(e.without_url().to_string())
        }
    }
}

/// Drop the query string from a URL so deployment keys never reach the logs
pub fn strip_url_query(url: &str) -> String {
    match url.find('?') {
        Some(pos) => url[..pos].to_string(),
        None => url.to_string(),
    }
}
