//! Sandbox root resolution
//!
//! Privileged identities browse the shared root from the configuration.
//! Everyone else gets a personal folder beneath it, created on first access
//! and remembered in an injected `RootCache`.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::config::ConfigStore;
use crate::gateway::{GatewayBackend, GatewayError, Identity};

/// Identity id -> resolved personal root
#[async_trait]
pub trait RootCache: Send + Sync {
    async fn get(&self, identity_id: &str) -> Option<String>;
    async fn insert(&self, identity_id: &str, root_id: &str);
    async fn remove(&self, identity_id: &str);
    async fn clear(&self);
}

/// Process-lifetime cache
#[derive(Default)]
pub struct InMemoryRootCache {
    roots: RwLock<HashMap<String, String>>,
}

impl InMemoryRootCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.roots.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.roots.read().await.is_empty()
    }
}

#[async_trait]
impl RootCache for InMemoryRootCache {
    async fn get(&self, identity_id: &str) -> Option<String> {
        self.roots.read().await.get(identity_id).cloned()
    }

    async fn insert(&self, identity_id: &str, root_id: &str) {
        self.roots
            .write()
            .await
            .entry(identity_id.to_string())
            .or_insert_with(|| root_id.to_string());
    }

    async fn remove(&self, identity_id: &str) {
        self.roots.write().await.remove(identity_id);
    }

    async fn clear(&self) {
        self.roots.write().await.clear();
    }
}

/// Computes the folder that bounds an identity's navigation
pub struct SandboxRootResolver {
    backend: Arc<dyn GatewayBackend>,
    config: Arc<ConfigStore>,
    cache: Arc<dyn RootCache>,
}

impl SandboxRootResolver {
    pub fn new(
        backend: Arc<dyn GatewayBackend>,
        config: Arc<ConfigStore>,
        cache: Arc<dyn RootCache>,
    ) -> Self {
        Self { backend, config, cache }
    }

    pub fn cache(&self) -> &Arc<dyn RootCache> {
        &self.cache
    }

    /// Resolve the sandbox root for `identity`.
    ///
    /// On a fresh personal root the id is written back to
    /// `identity.personal_root_id`; the caller persists the record. A failed
    /// ensure call is returned as-is, never replaced by the shared root.
    pub async fn resolve_root(&self, identity: &mut Identity) -> Result<String, GatewayError> {
        let config = self.config.require().await?;

        if identity.role.is_privileged() {
            debug!("Identity {} is privileged, using shared root", identity.id);
            return Ok(config.root_folder_id.clone());
        }

        let shared_root = config.root_folder_id.as_str();

        if let Some(root) = identity.personal_root_id.clone().filter(|r| !r.trim().is_empty()) {
            if root != shared_root {
                self.cache.insert(&identity.id, &root).await;
                return Ok(root);
            }
            warn!("Stored personal root of {} is the shared root, re-provisioning", identity.id);
            identity.personal_root_id = None;
        }

        if let Some(root) = self.cache.get(&identity.id).await {
            if root != shared_root {
                debug!("Root cache hit for identity {}", identity.id);
                identity.personal_root_id = Some(root.clone());
                return Ok(root);
            }
            warn!("Cached personal root of {} is the shared root, dropping it", identity.id);
            self.cache.remove(&identity.id).await;
        }

        let name = identity.personal_folder_name();
        let root = self
            .backend
            .ensure_folder(&config.root_folder_id, &name)
            .await
            .map_err(|e| {
                warn!("Failed to provision personal root for {}: {}", identity.id, e);
                e
            })?;

        if root == shared_root {
            return Err(GatewayError::Compatibility(
                "'ensureFolder' returned the shared root instead of a personal folder".to_string(),
            ));
        }

        self.cache.insert(&identity.id, &root).await;
        identity.personal_root_id = Some(root.clone());
        info!("Provisioned personal root '{}' for identity {}", name, identity.id);
        Ok(root)
    }
}
