//! Sandboxed folder navigation
//!
//! The backend cannot list ancestors, so the path from the sandbox root is
//! kept here as a stack of visited folders. The root itself is never on the
//! stack; it sits implicitly at breadcrumb index -1.
//!
//! Every transition bumps a generation counter and starts a listing fetch.
//! A fetch result is applied only if no newer transition happened while it
//! was in flight, so the listing always belongs to the current folder.

use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::gateway::{FolderStackEntry, GatewayBackend, GatewayError, Identity, RemoteEntry};
use crate::sandbox::SandboxRootResolver;
use crate::upload::EncodedPayload;

/// Contents shown for the current folder
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Listing {
    Loading,
    Loaded(Vec<RemoteEntry>),
    /// Fetch failed; no stale entries are kept
    Failed(String),
}

impl Listing {
    pub fn entries(&self) -> &[RemoteEntry] {
        match self {
            Listing::Loaded(entries) => entries,
            _ => &[],
        }
    }
}

/// Breadcrumb target for `jump_to`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Breadcrumb {
    /// The sandbox root (index -1)
    Root,
    /// Stack entry at this index
    Level(usize),
}

impl Breadcrumb {
    /// Map a UI index (-1 for root) to a breadcrumb
    pub fn from_index(index: i64) -> Option<Self> {
        match index {
            -1 => Some(Breadcrumb::Root),
            i if i >= 0 => usize::try_from(i).ok().map(Breadcrumb::Level),
            _ => None,
        }
    }
}

/// Point-in-time copy of the navigation state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationSnapshot {
    pub root_id: String,
    pub current_folder_id: String,
    pub stack: Vec<FolderStackEntry>,
    pub listing: Listing,
}

struct NavState {
    root_id: String,
    stack: Vec<FolderStackEntry>,
    listing: Listing,
    generation: u64,
}

impl NavState {
    fn current_folder_id(&self) -> &str {
        self.stack.last().map(|e| e.id.as_str()).unwrap_or(self.root_id.as_str())
    }

    /// Start a new fetch generation for the current folder
    fn begin_fetch(&mut self) -> (u64, String) {
        self.generation += 1;
        self.listing = Listing::Loading;
        (self.generation, self.current_folder_id().to_string())
    }
}

/// Folder navigation bounded by a sandbox root
pub struct NavigationController {
    backend: Arc<dyn GatewayBackend>,
    root_label: String,
    state: RwLock<NavState>,
}

impl NavigationController {
    pub fn new(backend: Arc<dyn GatewayBackend>, root_id: impl Into<String>) -> Self {
        Self {
            backend,
            root_label: "My Drive".to_string(),
            state: RwLock::new(NavState {
                root_id: root_id.into(),
                stack: Vec::new(),
                listing: Listing::Loading,
                generation: 0,
            }),
        }
    }

    /// Label of the root breadcrumb
    pub fn with_root_label(mut self, label: impl Into<String>) -> Self {
        self.root_label = label.into();
        self
    }

    /// Resolve the identity's sandbox root and load its listing.
    ///
    /// Only a failed root resolution is an error; a failed first listing is
    /// reported through `Listing::Failed`.
    pub async fn open(
        backend: Arc<dyn GatewayBackend>,
        resolver: &SandboxRootResolver,
        identity: &mut Identity,
    ) -> Result<Self, GatewayError> {
        let root_id = resolver.resolve_root(identity).await?;
        let label = if identity.role.is_privileged() { "Shared Drive" } else { "My Drive" };
        let controller = Self::new(backend, root_id).with_root_label(label);

        if let Err(e) = controller.refresh().await {
            warn!("Initial listing for identity {} failed: {}", identity.id, e);
        }
        Ok(controller)
    }

    pub async fn snapshot(&self) -> NavigationSnapshot {
        let state = self.state.read().await;
        NavigationSnapshot {
            root_id: state.root_id.clone(),
            current_folder_id: state.current_folder_id().to_string(),
            stack: state.stack.clone(),
            listing: state.listing.clone(),
        }
    }

    pub async fn root_id(&self) -> String {
        self.state.read().await.root_id.clone()
    }

    pub async fn current_folder_id(&self) -> String {
        self.state.read().await.current_folder_id().to_string()
    }

    pub async fn stack(&self) -> Vec<FolderStackEntry> {
        self.state.read().await.stack.clone()
    }

    pub async fn listing(&self) -> Listing {
        self.state.read().await.listing.clone()
    }

    /// Breadcrumb trail: root first, then every stack level
    pub async fn breadcrumbs(&self) -> Vec<(Breadcrumb, String)> {
        let state = self.state.read().await;
        std::iter::once((Breadcrumb::Root, self.root_label.clone()))
            .chain(
                state
                    .stack
                    .iter()
                    .enumerate()
                    .map(|(i, entry)| (Breadcrumb::Level(i), entry.name.clone())),
            )
            .collect()
    }

    /// Descend into a child folder
    pub async fn enter(&self, folder: &RemoteEntry) -> Result<(), GatewayError> {
        if !folder.is_folder() {
            return Err(GatewayError::InvalidEntry(format!("'{}' is not a folder", folder.name)));
        }

        let (generation, folder_id) = {
            let mut state = self.state.write().await;
            if folder.id == state.root_id {
                // A shortcut back to the root must not land on the stack
                state.stack.clear();
            } else {
                state.stack.push(FolderStackEntry::from(folder));
            }
            state.begin_fetch()
        };

        debug!("Entered folder {} ({})", folder.name, folder.id);
        self.load(generation, folder_id).await
    }

    /// Ascend one level. Returns `false` without touching the backend when
    /// already at the sandbox root.
    pub async fn up(&self) -> Result<bool, GatewayError> {
        let (generation, folder_id) = {
            let mut state = self.state.write().await;
            if state.stack.pop().is_none() {
                debug!("Already at sandbox root, ignoring up()");
                return Ok(false);
            }
            state.begin_fetch()
        };

        self.load(generation, folder_id).await?;
        Ok(true)
    }

    /// Jump to a breadcrumb, dropping every level above it
    pub async fn jump_to(&self, target: Breadcrumb) -> Result<(), GatewayError> {
        let (generation, folder_id) = {
            let mut state = self.state.write().await;
            match target {
                Breadcrumb::Root => state.stack.clear(),
                Breadcrumb::Level(index) => {
                    let depth = state.stack.len();
                    if index >= depth {
                        return Err(GatewayError::InvalidBreadcrumb { index, depth });
                    }
                    state.stack.truncate(index + 1);
                }
            }
            state.begin_fetch()
        };

        self.load(generation, folder_id).await
    }

    /// Refetch the current folder without changing position
    pub async fn refresh(&self) -> Result<(), GatewayError> {
        let (generation, folder_id) = self.state.write().await.begin_fetch();
        self.load(generation, folder_id).await
    }

    /// Create a folder in the current folder
    pub async fn create_folder(&self, name: &str) -> Result<(), GatewayError> {
        let name = non_empty_name(name)?;
        let parent = self.current_folder_id().await;
        self.backend.create_folder(&parent, name).await?;
        self.refresh().await
    }

    /// Upload an encoded file into the current folder
    pub async fn upload(&self, file: &EncodedPayload) -> Result<(), GatewayError> {
        let parent = self.current_folder_id().await;
        self.backend.upload(&parent, file).await?;
        self.refresh().await
    }

    /// Rename a folder of the current listing
    pub async fn rename(&self, folder: &RemoteEntry, new_name: &str) -> Result<(), GatewayError> {
        if !folder.is_folder() {
            return Err(GatewayError::InvalidEntry(format!(
                "'{}' is a file; only folders can be renamed",
                folder.name
            )));
        }
        let new_name = non_empty_name(new_name)?;
        self.backend.rename_folder(&folder.id, new_name).await?;
        {
            let mut state = self.state.write().await;
            for entry in state.stack.iter_mut().filter(|e| e.id == folder.id) {
                entry.name = new_name.to_string();
            }
        }
        self.refresh().await
    }

    /// Delete an entry of the current listing
    pub async fn delete(&self, entry: &RemoteEntry) -> Result<(), GatewayError> {
        {
            let state = self.state.read().await;
            if entry.id == state.root_id || state.stack.iter().any(|e| e.id == entry.id) {
                return Err(GatewayError::InvalidEntry(format!(
                    "'{}' is part of the current path and cannot be deleted",
                    entry.name
                )));
            }
        }
        self.backend.delete(&entry.id).await?;
        info!("Deleted '{}' ({})", entry.name, entry.id);
        self.refresh().await
    }

    /// Fetch a listing and apply it if `generation` is still current
    async fn load(&self, generation: u64, folder_id: String) -> Result<(), GatewayError> {
        let result = self.backend.list(&folder_id).await;

        let mut state = self.state.write().await;
        if state.generation != generation {
            debug!(
                "Discarding listing of {} (generation {} superseded by {})",
                folder_id, generation, state.generation
            );
            return result.map(|_| ());
        }

        match result {
            Ok(entries) => {
                debug!("Listed {} entries in {}", entries.len(), folder_id);
                state.listing = Listing::Loaded(entries);
                Ok(())
            }
            Err(e) => {
                warn!("Listing {} failed: {}", folder_id, e);
                state.listing = Listing::Failed(e.to_string());
                Err(e)
            }
        }
    }
}

fn non_empty_name(name: &str) -> Result<&str, GatewayError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(GatewayError::InvalidEntry("Name cannot be empty".to_string()));
    }
    Ok(name)
}
