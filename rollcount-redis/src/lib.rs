//! Redis backend for `rollcount` (companion crate).
//! Bring your own `redis::aio::MultiplexedConnection`; each record is a Redis hash
//! whose fields are bucket slots.
//!
//! | backend call   | Redis commands                                   |
//! |----------------|--------------------------------------------------|
//! | `atomic`       | `EVALSHA` of a script running `HINCRBY` / `HDEL` / `PEXPIRE` |
//! | `read_fields`  | `HMGET`                                          |
//! | `delete`       | `DEL`                                            |
//!
//! `MULTI/EXEC` keeps running after a failed command, so `atomic` uses a script that
//! checks every increment target before it writes anything.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Script};
use rollcount::{BucketOp, CounterBackend};
use std::sync::Arc;
use std::time::Duration;

/// ARGV is a flat list of `(op, a, b)` triples applied to `KEYS[1]`.
const ATOMIC_SCRIPT: &str = r#"
local key = KEYS[1]
for i = 1, #ARGV, 3 do
  local op = ARGV[i]
  if op == 'hincrby' then
    local current = redis.call('HGET', key, ARGV[i + 1])
    if current and not string.match(current, '^%-?%d+$') then
      return redis.error_reply('ERR hash value is not an integer')
    end
  elseif op ~= 'hdel' and op ~= 'pexpire' then
    return redis.error_reply('ERR unknown bucket op ' .. op)
  end
end
for i = 1, #ARGV, 3 do
  local op = ARGV[i]
  if op == 'hincrby' then
    redis.call('HINCRBY', key, ARGV[i + 1], ARGV[i + 2])
  elseif op == 'hdel' then
    redis.call('HDEL', key, ARGV[i + 1])
  else
    redis.call('PEXPIRE', key, ARGV[i + 1])
  end
end
return 0
"#;

/// [`CounterBackend`] storing each counter record as a Redis hash.
///
/// Clones share the multiplexed connection.
#[derive(Clone)]
pub struct RedisBackend {
    conn: MultiplexedConnection,
    script: Arc<Script>,
}

impl std::fmt::Debug for RedisBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisBackend")
            .field("conn", &"<redis::aio::MultiplexedConnection>")
            .field("script_sha", &self.script.get_hash())
            .finish()
    }
}

impl RedisBackend {
    /// Wrap an existing multiplexed connection.
    pub fn new(conn: MultiplexedConnection) -> Self {
        Self { conn, script: Arc::new(Script::new(ATOMIC_SCRIPT)) }
    }

    /// Open a client for `url` and establish a multiplexed connection.
    ///
    /// # Errors
    /// Returns `Err` if the URL is invalid or the server cannot be reached.
    pub async fn connect(url: &str) -> redis::RedisResult<Self> {
        let client = redis::Client::open(url)?;
        let conn = client.get_multiplexed_async_connection().await?;
        tracing::info!(target: "rollcount::redis", "redis counter backend connected");
        Ok(Self::new(conn))
    }
}

/// `PEXPIRE` with 0 deletes the key, so sub-millisecond TTLs round up.
fn ttl_millis(ttl: Duration) -> i64 {
    i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX).max(1)
}

fn script_args(op: &BucketOp) -> [String; 3] {
    match *op {
        BucketOp::IncrementField { slot, by } => ["hincrby".into(), slot.to_string(), by.to_string()],
        BucketOp::DeleteField { slot } => ["hdel".into(), slot.to_string(), String::new()],
        BucketOp::Expire { ttl } => ["pexpire".into(), ttl_millis(ttl).to_string(), String::new()],
    }
}

#[async_trait]
impl CounterBackend for RedisBackend {
    type Error = redis::RedisError;

    async fn atomic(&self, key: &str, ops: &[BucketOp]) -> Result<(), Self::Error> {
        let mut invocation = self.script.prepare_invoke();
        invocation.key(key);
        for op in ops {
            for arg in script_args(op) {
                invocation.arg(arg);
            }
        }

        // The connection handle is a cheap clone released when this call returns.
        let mut conn = self.conn.clone();
        let _: () = invocation.invoke_async(&mut conn).await.map_err(|e| {
            tracing::warn!(target: "rollcount::redis", key = %key, error = %e, "atomic bucket update failed");
            e
        })?;
        Ok(())
    }

    async fn read_fields(
        &self,
        key: &str,
        slots: &[usize],
    ) -> Result<Vec<Option<String>>, Self::Error> {
        if slots.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.conn.clone();
        redis::cmd("HMGET").arg(key).arg(slots).query_async(&mut conn).await
    }

    async fn delete(&self, key: &str) -> Result<(), Self::Error> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(key).await?;
        Ok(())
    }
}
