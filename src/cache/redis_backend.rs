use std::time::Duration;

use async_trait::async_trait;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::{AsyncCommands, Client};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use super::backend::KvBackend;
use super::error::CacheError;

/// Redis-backed [`KvBackend`].
///
/// The multiplexed connection is established lazily and shared by clone. A failed connect is
/// not remembered, so the next call tries again; startup never depends on Redis being up.
/// The first connect is a single attempt: a refused connection fails at once instead of
/// backing off inside the request that triggered it.
pub struct RedisBackend {
    client: Client,
    connection: OnceCell<ConnectionManager>,
    connect_timeout: Duration,
}

impl RedisBackend {
    pub fn open(url: &str, connect_timeout: Duration) -> Result<Self, CacheError> {
        let client = Client::open(url).map_err(|err| CacheError::backend(err.to_string()))?;
        Ok(Self {
            client,
            connection: OnceCell::new(),
            connect_timeout,
        })
    }

    async fn connection(&self) -> Result<ConnectionManager, CacheError> {
        let manager = self
            .connection
            .get_or_try_init(|| async {
                let config = ConnectionManagerConfig::new()
                    .set_number_of_retries(0)
                    .set_connection_timeout(self.connect_timeout);
                let connect = ConnectionManager::new_with_config(self.client.clone(), config);
                match tokio::time::timeout(self.connect_timeout, connect).await {
                    Ok(Ok(manager)) => {
                        info!(target: "bistro::cache", "Connected to Redis");
                        Ok(manager)
                    }
                    Ok(Err(err)) => {
                        debug!(target: "bistro::cache", error = %err, "Redis connect failed");
                        Err(CacheError::from(err))
                    }
                    Err(_) => Err(CacheError::Timeout { op: "connect" }),
                }
            })
            .await?;
        Ok(manager.clone())
    }
}

/// Escapes glob metacharacters so `KEYS` matches the prefix literally.
fn glob_prefix(prefix: &str) -> String {
    let mut pattern = String::with_capacity(prefix.len() + 1);
    for ch in prefix.chars() {
        if matches!(ch, '*' | '?' | '[' | ']' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('*');
    pattern
}

#[async_trait]
impl KvBackend for RedisBackend {
    async fn ping(&self) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        redis::cmd("PING").query_async::<()>(&mut conn).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.connection().await?;
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        conn.set_ex::<_, _, ()>(key, value, ttl.as_secs().max(1))
            .await?;
        Ok(())
    }

    async fn del(&self, keys: &[String]) -> Result<u64, CacheError> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.connection().await?;
        let removed: i64 = conn.del(keys.to_vec()).await?;
        Ok(removed.max(0) as u64)
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, CacheError> {
        let mut conn = self.connection().await?;
        let keys: Vec<String> = conn.keys(glob_prefix(prefix)).await?;
        Ok(keys)
    }

    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        let mut conn = self.connection().await?;
        let exists: bool = conn.exists(key).await?;
        Ok(exists)
    }

    async fn incr(&self, key: &str) -> Result<i64, CacheError> {
        let mut conn = self.connection().await?;
        let count: i64 = conn.incr(key, 1_i64).await?;
        Ok(count)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, CacheError> {
        let mut conn = self.connection().await?;
        let applied: bool = conn.expire(key, ttl.as_secs().max(1) as i64).await?;
        Ok(applied)
    }

    async fn has_expiry(&self, key: &str) -> Result<bool, CacheError> {
        let mut conn = self.connection().await?;
        // -1: no expiry, -2: missing key.
        let ttl: i64 = conn.ttl(key).await?;
        Ok(ttl >= 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glob_prefix_escapes_metacharacters() {
        assert_eq!(glob_prefix("order:"), "order:*");
        assert_eq!(glob_prefix("a*b?[c]"), "a\\*b\\?\\[c\\]*");
    }

    #[test]
    fn open_rejects_malformed_urls() {
        let err = RedisBackend::open("not a url", Duration::from_secs(1));
        assert!(matches!(err, Err(CacheError::Backend(_))));
    }

    #[tokio::test]
    async fn refused_connection_fails_without_waiting_out_the_timeout() {
        let backend =
            RedisBackend::open("redis://127.0.0.1:1/", Duration::from_secs(5)).expect("valid url");

        for _ in 0..2 {
            let started = std::time::Instant::now();
            let err = backend.ping().await.unwrap_err();
            assert!(err.is_unavailable(), "unexpected error: {err}");
            assert!(
                started.elapsed() < Duration::from_secs(1),
                "refused connect took {:?}",
                started.elapsed()
            );
        }
    }
}
