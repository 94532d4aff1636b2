//! Shared persistent clients.
//!
//! # Responsibilities
//! - Own the database pool and cache client used by request handlers
//! - Answer liveness pings for the health probes
//! - Release connections during shutdown
//!
//! # Design Decisions
//! - Probes only ping; the shutdown coordinator is the only caller of
//!   `disconnect`, and only after the request gate has closed
//! - Once disconnected a resource refuses further pings instead of
//!   silently reconnecting

pub mod cache;
pub mod database;

use async_trait::async_trait;
use serde_json::{Map, Value};

pub use cache::Cache;
pub use database::Database;

/// A shared client to an external dependency.
#[async_trait]
pub trait Resource: Send + Sync {
    fn name(&self) -> &str;

    /// Round-trip to the dependency.
    async fn ping(&self) -> anyhow::Result<()>;

    /// Extra observability detail for the health report.
    fn details(&self) -> Option<Map<String, Value>> {
        None
    }

    /// Close the client. Called once during shutdown.
    async fn disconnect(&self) -> anyhow::Result<()>;
}
