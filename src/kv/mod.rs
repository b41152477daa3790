//! Key-value store seam.
//!
//! All waitlist state lives in an external hosted KV store (Vercel KV /
//! Upstash Redis behind a REST API). The daemon only ever uses seven
//! primitives — set membership, set add, set read, hash write, hash read,
//! counter increment, counter read — so the seam is exactly that narrow.
//!
//! Two implementations:
//!   - [`rest::RestKv`]    — the hosted store, over HTTPS with bearer auth
//!   - [`memory::MemoryKv`] — process-local, for tests and dev fallback

pub mod memory;
pub mod rest;

use std::collections::HashMap;

use async_trait::async_trait;

/// Errors surfaced by a KV backend.
///
/// Callers treat every variant the same way (log, report a generic storage
/// failure); the split exists so operators can tell a network problem from a
/// malformed response in the logs.
#[derive(Debug, thiserror::Error)]
pub enum KvError {
    #[error("kv transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("kv protocol error: {0}")]
    Protocol(String),
}

/// The store primitives the waitlist depends on.
///
/// Single-key operations are assumed atomic on the backend; nothing here
/// spans keys transactionally.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// `SISMEMBER set value`
    async fn is_member(&self, set_key: &str, value: &str) -> Result<bool, KvError>;

    /// `SADD set value` — idempotent union; adding an existing member is a no-op.
    async fn add_member(&self, set_key: &str, value: &str) -> Result<(), KvError>;

    /// `SMEMBERS set`
    async fn get_all_members(&self, set_key: &str) -> Result<Vec<String>, KvError>;

    /// `HSET hash field value [field value ...]`
    async fn write_fields(
        &self,
        hash_key: &str,
        fields: &[(String, String)],
    ) -> Result<(), KvError>;

    /// `HGETALL hash` — empty map when the key does not exist.
    async fn read_fields(&self, hash_key: &str) -> Result<HashMap<String, String>, KvError>;

    /// `INCR counter` — returns the post-increment value.
    async fn increment(&self, counter_key: &str) -> Result<i64, KvError>;

    /// `GET counter` — `None` when the key was never incremented.
    async fn get(&self, counter_key: &str) -> Result<Option<i64>, KvError>;
}
