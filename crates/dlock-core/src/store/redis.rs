//! Redis lock store
//!
//! Targets a single authoritative Redis node:
//! - acquire: `SET key token NX PX ttl`
//! - release: a Lua script comparing the stored token before `DEL`, so the
//!   check and the delete run as one step on the server
//!
//! No quorum is attempted; a failover that loses the record can admit a
//! second holder.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use redis::Script;
use redis::aio::ConnectionManager;
use tracing::{debug, info};

use super::{LockStore, StoreError, ttl_millis};
use crate::model::{LockKey, LockToken};

const COMPARE_AND_DELETE_LUA: &str = r#"if redis.call("get", KEYS[1]) == ARGV[1] then
    return redis.call("del", KEYS[1])
else
    return 0
end"#;

static COMPARE_AND_DELETE: LazyLock<Script> =
    LazyLock::new(|| Script::new(COMPARE_AND_DELETE_LUA));

/// Lock store backed by a Redis connection manager (reconnects on failure)
#[derive(Clone)]
pub struct RedisLockStore {
    conn: ConnectionManager,
}

impl RedisLockStore {
    /// Connects to `url` (e.g. `redis://127.0.0.1:6379/0`)
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)?;
        let conn = client.get_connection_manager().await?;
        info!(url = %url, "Connected Redis lock store");
        Ok(Self { conn })
    }

    pub fn from_connection(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl LockStore for RedisLockStore {
    async fn set_if_absent(
        &self,
        key: &LockKey,
        token: &LockToken,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let ttl_ms = ttl_millis(ttl)?;
        let mut conn = self.conn.clone();

        // Nil reply means NX refused the write.
        let reply: Option<String> = redis::cmd("SET")
            .arg(key.as_str())
            .arg(token.as_str())
            .arg("NX")
            .arg("PX")
            .arg(ttl_ms)
            .query_async(&mut conn)
            .await?;

        debug!(key = %key, token = %token, ttl_ms, acquired = reply.is_some(), "SET NX PX");

        match reply.as_deref() {
            None => Ok(false),
            Some("OK") => Ok(true),
            Some(other) => Err(StoreError::UnexpectedReply(other.to_string())),
        }
    }

    async fn compare_and_delete(
        &self,
        key: &LockKey,
        token: &LockToken,
    ) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();

        let deleted: i64 = COMPARE_AND_DELETE
            .key(key.as_str())
            .arg(token.as_str())
            .invoke_async(&mut conn)
            .await?;

        debug!(key = %key, token = %token, deleted, "compare-and-delete");
        Ok(deleted == 1)
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}
