//! PostgreSQL connection pool.

use std::time::Duration;

use anyhow::{bail, Context};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::config::DatabaseConfig;
use crate::resources::Resource;

pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Build the pool without connecting; the first query (or probe)
    /// establishes connections.
    pub fn connect_lazy(url: &str, config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_millis(config.acquire_timeout_ms))
            .connect_lazy(url)?;

        tracing::info!(max_connections = config.max_connections, "Database pool created");
        Ok(Self { pool })
    }

    /// Pool handed to business handlers.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Resource for Database {
    fn name(&self) -> &str {
        "database"
    }

    async fn ping(&self) -> anyhow::Result<()> {
        if self.pool.is_closed() {
            bail!("database pool is closed");
        }
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .context("database ping failed")?;
        Ok(())
    }

    fn details(&self) -> Option<Map<String, Value>> {
        let mut details = Map::new();
        details.insert("poolSize".into(), json!(self.pool.size()));
        details.insert("idleConnections".into(), json!(self.pool.num_idle()));
        Some(details)
    }

    async fn disconnect(&self) -> anyhow::Result<()> {
        self.pool.close().await;
        Ok(())
    }
}
