/// Redis backing for the career blob store.
///
/// The cache table and the catalog snapshot are each stored whole under one key, so all
/// this needs is byte-valued GET, SET and DEL. A missing or unreachable server is not an
/// error for the engine: every public operation logs the failure and reports it as `None`
/// or `false`, and the engine keeps serving from memory and the bundled catalog.
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tracing::warn;

use crate::error::CommonError;

#[derive(Clone)]
pub struct RedisCache {
    client: Option<redis::Client>,
}

impl RedisCache {
    /// `None` or an unparsable URL yields a handle whose operations all no-op.
    pub fn new(url: Option<&str>) -> Self {
        let client = url.and_then(|u| {
            redis::Client::open(u)
                .inspect_err(|e| warn!(error = %e, url = u, "invalid redis url, persistence disabled"))
                .ok()
        });
        Self { client }
    }

    /// PING the server. Used once at startup to report whether blobs will persist.
    pub async fn is_available(&self) -> bool {
        let Some(mut conn) = self.connect().await.ok().flatten() else {
            return false;
        };
        let pong: Result<String, _> = redis::cmd("PING").query_async(&mut conn).await;
        pong.is_ok()
    }

    /// The blob under `key`, or `None` when absent or unreachable.
    pub async fn get(&self, key: &str) -> Option<Vec<u8>> {
        let mut conn = self.connection().await?;
        conn.get::<_, Option<Vec<u8>>>(key)
            .await
            .map_err(CommonError::from)
            .inspect_err(|e| warn!(error = %e, key, "redis GET failed"))
            .ok()
            .flatten()
    }

    /// Overwrite the blob under `key`. Blobs never expire; the cache tracks its own TTLs.
    pub async fn set(&self, key: &str, value: &[u8]) -> bool {
        let Some(mut conn) = self.connection().await else {
            return false;
        };
        conn.set::<_, _, ()>(key, value)
            .await
            .map_err(CommonError::from)
            .inspect_err(|e| warn!(error = %e, key, "redis SET failed"))
            .is_ok()
    }

    pub async fn delete(&self, key: &str) -> bool {
        let Some(mut conn) = self.connection().await else {
            return false;
        };
        conn.del::<_, ()>(key)
            .await
            .map_err(CommonError::from)
            .inspect_err(|e| warn!(error = %e, key, "redis DEL failed"))
            .is_ok()
    }

    /// `Ok(None)` when no client is configured.
    async fn connect(&self) -> Result<Option<MultiplexedConnection>, CommonError> {
        match &self.client {
            None => Ok(None),
            Some(client) => Ok(Some(client.get_multiplexed_async_connection().await?)),
        }
    }

    async fn connection(&self) -> Option<MultiplexedConnection> {
        self.connect()
            .await
            .inspect_err(|e| warn!(error = %e, "redis connection failed"))
            .ok()
            .flatten()
    }
}
