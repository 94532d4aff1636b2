//! Redis client.

use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{bail, Context};
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use tokio::sync::Mutex;

use crate::resources::Resource;

pub struct Cache {
    client: redis::Client,
    connection: Mutex<Option<MultiplexedConnection>>,
    closed: AtomicBool,
}

impl Cache {
    /// Parse the URL; connecting is deferred to the first use.
    pub fn new(url: &str) -> redis::RedisResult<Self> {
        let client = redis::Client::open(url)?;
        Ok(Self {
            client,
            connection: Mutex::new(None),
            closed: AtomicBool::new(false),
        })
    }

    /// Shared multiplexed connection, opened on first call.
    pub async fn connection(&self) -> anyhow::Result<MultiplexedConnection> {
        if self.closed.load(Ordering::SeqCst) {
            bail!("cache client is closed");
        }

        let mut slot = self.connection.lock().await;
        // `disconnect` may have run while we waited for the lock.
        if self.closed.load(Ordering::SeqCst) {
            bail!("cache client is closed");
        }
        if let Some(conn) = slot.as_ref() {
            return Ok(conn.clone());
        }
        let conn = self
            .client
            .get_multiplexed_tokio_connection()
            .await
            .context("cache connection failed")?;
        *slot = Some(conn.clone());
        Ok(conn)
    }
}

#[async_trait]
impl Resource for Cache {
    fn name(&self) -> &str {
        "cache"
    }

    async fn ping(&self) -> anyhow::Result<()> {
        let mut conn = self.connection().await?;
        let reply: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .context("cache ping failed")?;
        if reply != "PONG" {
            bail!("unexpected PING reply: {reply}");
        }
        Ok(())
    }

    async fn disconnect(&self) -> anyhow::Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        // Dropping the last handle closes the multiplexed socket.
        self.connection.lock().await.take();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn rejects_invalid_url() {
        assert!(Cache::new("not a url").is_err());
    }

    #[tokio::test]
    async fn closed_cache_refuses_ping() {
        let cache = Cache::new("redis://127.0.0.1:1").unwrap();
        cache.disconnect().await.unwrap();

        let err = cache.ping().await.unwrap_err();
        assert_eq!(err.to_string(), "cache client is closed");
    }

    #[tokio::test]
    async fn caller_waiting_on_the_lock_sees_the_close() {
        let cache = Arc::new(Cache::new("redis://127.0.0.1:1").unwrap());
        let slot = cache.connection.lock().await;

        let waiting = tokio::spawn({
            let cache = cache.clone();
            async move { cache.connection().await.map(|_| ()) }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        cache.closed.store(true, Ordering::SeqCst);
        drop(slot);

        let err = waiting.await.unwrap().unwrap_err();
        assert_eq!(err.to_string(), "cache client is closed");
    }
}
