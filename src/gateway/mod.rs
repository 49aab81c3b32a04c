//! Gateway Module
//!
//! All remote storage operations go through a single deployed HTTP endpoint
//! that proxies to the cloud backend. This module owns the wire protocol, the
//! response classification and the `GatewayBackend` seam the rest of the
//! crate talks to.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │             GatewayBackend Trait             │
//! │  list, upload, create, ensure, rename, delete│
//! └──────────────────────────────────────────────┘
//!                       │
//!                       ▼
//!              ┌─────────────────┐      POST { action, ... }
//!              │  GatewayClient  │ ───────────────────────────▶ gateway
//!              └─────────────────┘
//! ```

pub mod action;
pub mod client;
pub mod types;

pub use action::{classify_response, GatewayAction, Payload};
pub use client::GatewayClient;
pub use types::*;

use async_trait::async_trait;

use crate::upload::EncodedPayload;

/// Remote operations available through the gateway.
///
/// `GatewayClient` is the production implementation; navigation and sandbox
/// resolution only depend on this trait.
#[async_trait]
pub trait GatewayBackend: Send + Sync {
    /// List one folder level (non-recursive)
    async fn list(&self, folder_id: &str) -> Result<Vec<RemoteEntry>, GatewayError>;

    /// Upload an encoded file into a folder
    async fn upload(&self, folder_id: &str, file: &EncodedPayload) -> Result<(), GatewayError>;

    /// Create a child folder of `parent_id`
    async fn create_folder(&self, parent_id: &str, name: &str) -> Result<(), GatewayError>;

    /// Create-or-fetch a named folder beneath `root_id`, returning its id
    async fn ensure_folder(&self, root_id: &str, name: &str) -> Result<String, GatewayError>;

    /// Rename a folder. Gateways that predate this action answer with a
    /// `Compatibility` error.
    async fn rename_folder(&self, id: &str, name: &str) -> Result<(), GatewayError>;

    /// Delete a file or folder (folders recursively, on the gateway side)
    async fn delete(&self, id: &str) -> Result<(), GatewayError>;
}
