// Traffic registry port: snapshot fetches and the approve / cancel commands

mod http;

pub use http::HttpRegistry;

use async_trait::async_trait;

use crate::error::RegistryError;
use crate::models::SnapshotList;

/// Server-side registry that reports traffic and executes rollout commands.
///
/// Implementations must be `Send + Sync`; one instance is shared by every mounted panel.
#[async_trait]
pub trait TrafficRegistry: Send + Sync {
    /// Current traffic for `plugin_id`. Callers use only the first entry.
    async fn fetch_snapshot(&self, plugin_id: &str) -> Result<SnapshotList, RegistryError>;

    /// Promote the active version and finish the rollout.
    async fn approve(&self, plugin_id: &str) -> Result<(), RegistryError>;

    /// Roll back by cancelling the version identified by `package_identifier`.
    async fn cancel(&self, package_identifier: &str) -> Result<(), RegistryError>;
}
