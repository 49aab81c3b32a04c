//! Sandboxed cloud-drive client for a single JSON gateway endpoint.
//!
//! The crate is split along the request path:
//!
//! - [`gateway`]: wire protocol, response classification and the HTTP client
//! - [`config`]: persisted endpoint/root configuration and snapshot publishing
//! - [`sandbox`]: per-identity root resolution with lazy personal folders
//! - [`navigation`]: breadcrumb-stack navigation bounded by the sandbox root
//! - [`version`]: advisory gateway compatibility checks
//! - [`upload`]: size-checked, fully buffered upload payloads

pub mod config;
pub mod gateway;
pub mod navigation;
pub mod sandbox;
pub mod upload;
pub mod version;

pub use config::{ConfigStore, GatewayConfig};
pub use gateway::{
    CompatibilityState, FolderStackEntry, GatewayAction, GatewayBackend, GatewayClient,
    GatewayError, Identity, RemoteEntry, Role,
};
pub use navigation::{Breadcrumb, Listing, NavigationController, NavigationSnapshot};
pub use sandbox::{InMemoryRootCache, RootCache, SandboxRootResolver};
pub use upload::{EncodedPayload, UploadEncoder};
pub use version::{HealthReport, VersionMonitor, EXPECTED_GATEWAY_VERSION};

/// Install a `tracing` subscriber honouring `RUST_LOG` (default `info`).
///
/// Safe to call more than once; later calls are ignored.
pub fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
