//! Key-value stores for challenge records and the sender whitelist.
//!
//! Operations are atomic per key only. `put_if_absent` is the single
//! compare-and-set primitive the gate relies on.

#[cfg(test)]
mod memory;
mod redis;

#[cfg(test)]
pub use memory::MemoryStore;
pub use redis::RedisStore;

use async_trait::async_trait;
use sentinel_common::SentinelError;

#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, SentinelError>;

    /// Store `value`, expiring after `ttl_secs` when given
    async fn put(&self, key: &str, value: &str, ttl_secs: Option<u64>)
    -> Result<(), SentinelError>;

    /// Store `value` only if `key` is absent. Returns whether it was stored.
    async fn put_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl_secs: u64,
    ) -> Result<bool, SentinelError>;

    async fn delete(&self, key: &str) -> Result<(), SentinelError>;

    /// Check the backend is reachable
    async fn ping(&self) -> Result<(), SentinelError> {
        Ok(())
    }
}
