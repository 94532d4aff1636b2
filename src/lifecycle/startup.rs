//! Start-up wiring.
//!
//! # Responsibilities
//! - Build the shared clients from configuration
//! - Register one probe per dependency, in a fixed order
//! - Hand back everything the binary needs to serve and to shut down
//!
//! # Design Decisions
//! - Fail fast: any error here is fatal and the binary exits 1
//! - Clients are lazy; an unreachable database shows up in `/health`,
//!   not as a start-up failure
//! - Absent dependencies are still registered so the report lists them as
//!   `not_configured`

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::config::ServiceConfig;
use crate::health::probes::{
    FilesystemProbe, HttpIntegrationProbe, MemoryLimitOverflow, MemoryProbe, ProcMemorySource,
    ResourceProbe,
};
use crate::health::{Criticality, HealthAggregator, ProbeRegistry, RegistryError};
use crate::lifecycle::cleanup::CleanupTask;
use crate::resources::{Cache, Database, Resource};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to configure database pool: {0}")]
    Database(#[from] sqlx::Error),

    #[error("failed to configure cache client: {0}")]
    Cache(#[from] redis::RedisError),

    #[error("failed to build integration client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error(transparent)]
    MemoryLimit(#[from] MemoryLimitOverflow),

    #[error("failed to prepare upload directory {path}: {source}")]
    UploadDirectory { path: PathBuf, source: io::Error },

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Everything built at start-up.
pub struct Services {
    pub aggregator: Arc<HealthAggregator>,
    pub database: Option<Arc<Database>>,
    pub cache: Option<Arc<Cache>>,
    /// Clients the shutdown coordinator disconnects.
    pub resources: Vec<Arc<dyn Resource>>,
    /// Tasks the shutdown coordinator runs before disconnecting resources.
    pub cleanup: Vec<CleanupTask>,
}

/// Build clients, probes and the aggregator. Must run inside a Tokio runtime.
pub fn initialize(config: &ServiceConfig) -> Result<Services, StartupError> {
    let mut registry = ProbeRegistry::new();
    let mut resources: Vec<Arc<dyn Resource>> = Vec::new();
    let mut cleanup = Vec::new();

    let database = match &config.database.url {
        Some(url) => Some(Arc::new(Database::connect_lazy(url, &config.database)?)),
        None => None,
    };
    let database_probe = match &database {
        Some(db) => {
            resources.push(db.clone());
            ResourceProbe::new(db.clone())
        }
        None => ResourceProbe::not_configured("database"),
    };
    registry.register(
        Arc::new(database_probe),
        Criticality::from_flag(config.database.critical),
    )?;

    let cache = match &config.cache.url {
        Some(url) => Some(Arc::new(Cache::new(url)?)),
        None => None,
    };
    let cache_probe = match &cache {
        Some(c) => {
            resources.push(c.clone());
            ResourceProbe::new(c.clone())
        }
        None => ResourceProbe::not_configured("cache"),
    };
    registry.register(
        Arc::new(cache_probe),
        Criticality::from_flag(config.cache.critical),
    )?;

    if config.filesystem.enabled {
        let directory = config.filesystem.directory.clone();
        std::fs::create_dir_all(&directory).map_err(|source| StartupError::UploadDirectory {
            path: directory.clone(),
            source,
        })?;

        let probe = Arc::new(FilesystemProbe::new(directory));
        registry.register(probe.clone(), Criticality::from_flag(config.filesystem.critical))?;

        cleanup.push(CleanupTask::new("filesystem-markers", move || {
            let probe = probe.clone();
            async move {
                let removed = probe.sweep_markers().await?;
                if removed > 0 {
                    tracing::info!(removed, "Removed stale health-check markers");
                }
                Ok::<(), anyhow::Error>(())
            }
        }));
    }

    if config.memory.enabled {
        registry.register(
            Arc::new(MemoryProbe::new(ProcMemorySource::new(config.memory.limit_mb)?)),
            Criticality::from_flag(config.memory.critical),
        )?;
    }

    if !config.integrations.is_empty() {
        let client = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;
        for integration in &config.integrations {
            let probe = HttpIntegrationProbe::new(
                integration.name.clone(),
                integration.url.clone(),
                client.clone(),
            );
            registry.register_with_timeout(
                Arc::new(probe),
                Criticality::from_flag(integration.critical),
                integration.timeout_ms.map(Duration::from_millis),
            )?;
        }
    }

    tracing::info!(
        probes = registry.len(),
        resources = resources.len(),
        cleanup_tasks = cleanup.len(),
        "Services initialized"
    );

    Ok(Services {
        aggregator: Arc::new(HealthAggregator::new(registry, config.health.probe_timeout())),
        database,
        cache,
        resources,
        cleanup,
    })
}
