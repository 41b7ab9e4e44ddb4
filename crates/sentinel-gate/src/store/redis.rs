//! Redis-backed store.

use async_trait::async_trait;
use redis::{AsyncCommands, aio::ConnectionManager};
use sentinel_common::SentinelError;

use super::KvStore;

/// A namespace within a Redis database
#[derive(Clone)]
pub struct RedisStore {
    /// Redis connection manager (auto-reconnecting)
    redis: ConnectionManager,
    namespace: String,
}

impl RedisStore {
    pub fn new(redis: ConnectionManager, namespace: impl Into<String>) -> Self {
        Self {
            redis,
            namespace: namespace.into(),
        }
    }

    fn key(&self, key: &str) -> String {
        format!("{}{}", self.namespace, key)
    }
}

fn store_error(err: redis::RedisError) -> SentinelError {
    SentinelError::Store(err.to_string())
}

#[async_trait]
impl KvStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, SentinelError> {
        let mut conn = self.redis.clone();
        conn.get::<_, Option<String>>(self.key(key))
            .await
            .map_err(store_error)
    }

    async fn put(
        &self,
        key: &str,
        value: &str,
        ttl_secs: Option<u64>,
    ) -> Result<(), SentinelError> {
        let mut conn = self.redis.clone();
        match ttl_secs {
            Some(ttl) => conn
                .set_ex::<_, _, ()>(self.key(key), value, ttl)
                .await
                .map_err(store_error),
            None => conn
                .set::<_, _, ()>(self.key(key), value)
                .await
                .map_err(store_error),
        }
    }

    async fn put_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl_secs: u64,
    ) -> Result<bool, SentinelError> {
        let mut conn = self.redis.clone();
        // SET NX EX replies OK when stored and nil otherwise
        let reply: Option<String> = redis::cmd("SET")
            .arg(self.key(key))
            .arg(value)
            .arg("NX")
            .arg("EX")
            .arg(ttl_secs)
            .query_async(&mut conn)
            .await
            .map_err(store_error)?;
        Ok(reply.is_some())
    }

    async fn delete(&self, key: &str) -> Result<(), SentinelError> {
        let mut conn = self.redis.clone();
        conn.del::<_, ()>(self.key(key)).await.map_err(store_error)
    }

    async fn ping(&self) -> Result<(), SentinelError> {
        let mut conn = self.redis.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(store_error)?;
        Ok(())
    }
}
