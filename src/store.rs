use async_trait::async_trait;
use redis::AsyncCommands;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

use crate::errors::ServiceError;
use crate::session::{CheckoutSession, SessionStatus};

const SESSION_KEY_PREFIX: &str = "checkout_session:";

/// Key-value persistence for serialized session records with a TTL.
///
/// `compare_and_swap` is the store-side primitive behind the
/// `complete_in_progress` transition: the new value is written only if the
/// stored value still equals what the caller previously read, so a second
/// concurrent completion loses the race instead of double-charging.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, ServiceError>;

    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), ServiceError>;

    async fn delete(&self, key: &str) -> Result<(), ServiceError>;

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, ServiceError>;
}

#[derive(Debug, Clone)]
struct MemoryEntry {
    value: String,
    expires_at: Instant,
}

impl MemoryEntry {
    fn is_expired(&self) -> bool {
        Instant::now() > self.expires_at
    }
}

/// In-process store used in development and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, MemoryEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, ServiceError> {
        let mut entries = self.entries.write().await;
        match entries.get(key) {
            Some(entry) if entry.is_expired() => {
                entries.remove(key);
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.value.clone())),
            None => Ok(None),
        }
    }

    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), ServiceError> {
        let mut entries = self.entries.write().await;
        entries.insert(
            key.to_string(),
            MemoryEntry {
                value: value.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), ServiceError> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, ServiceError> {
        let mut entries = self.entries.write().await;
        let current = match entries.get(key) {
            Some(entry) if !entry.is_expired() => entry.value.as_str(),
            _ => return Ok(false),
        };
        if current != expected {
            return Ok(false);
        }
        entries.insert(
            key.to_string(),
            MemoryEntry {
                value: value.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(true)
    }
}

/// Redis-backed session store.
pub struct RedisStore {
    client: Arc<redis::Client>,
    cas_script: redis::Script,
}

impl RedisStore {
    pub async fn new(redis_url: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(redis_url)?;

        let mut conn = client.get_multiplexed_async_connection().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        debug!("Redis connection established");

        // GET + SET must be atomic for the compare-and-swap contract.
        let cas_script = redis::Script::new(
            r#"
            if redis.call('GET', KEYS[1]) == ARGV[1] then
                redis.call('SET', KEYS[1], ARGV[2], 'EX', ARGV[3])
                return 1
            end
            return 0
            "#,
        );

        Ok(Self {
            client: Arc::new(client),
            cas_script,
        })
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection, ServiceError> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| ServiceError::StoreError(format!("Redis connection failed: {}", e)))
    }
}

#[async_trait]
impl SessionStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, ServiceError> {
        let mut conn = self.connection().await?;
        conn.get(key)
            .await
            .map_err(|e| ServiceError::StoreError(format!("Redis GET failed: {}", e)))
    }

    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), ServiceError> {
        let mut conn = self.connection().await?;
        conn.set_ex(key, value, ttl.as_secs())
            .await
            .map_err(|e| ServiceError::StoreError(format!("Redis SET failed: {}", e)))
    }

    async fn delete(&self, key: &str) -> Result<(), ServiceError> {
        let mut conn = self.connection().await?;
        conn.del(key)
            .await
            .map_err(|e| ServiceError::StoreError(format!("Redis DEL failed: {}", e)))
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, ServiceError> {
        let mut conn = self.connection().await?;
        let swapped: i32 = self
            .cas_script
            .key(key)
            .arg(expected)
            .arg(value)
            .arg(ttl.as_secs())
            .invoke_async(&mut conn)
            .await
            .map_err(|e| ServiceError::StoreError(format!("Redis CAS failed: {}", e)))?;
        Ok(swapped == 1)
    }
}

/// A session together with the raw record it was read from. The raw form is
/// what `compare_and_swap` matches against when the completion workflow
/// claims the session.
#[derive(Debug, Clone)]
pub struct StoredSession {
    pub session: CheckoutSession,
    raw: String,
}

impl StoredSession {
    pub fn status_at_read(&self) -> SessionStatus {
        self.session.status
    }
}

/// Typed repository over the session store. The store TTL is a hard deletion
/// bound and is kept at or above the session's logical expiry horizon.
#[derive(Clone)]
pub struct SessionRepository {
    store: Arc<dyn SessionStore>,
    ttl: Duration,
}

impl SessionRepository {
    pub fn new(store: Arc<dyn SessionStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    fn key(id: &str) -> String {
        format!("{}{}", SESSION_KEY_PREFIX, id)
    }

    pub async fn find(&self, id: &str) -> Result<Option<StoredSession>, ServiceError> {
        let raw = match self.store.get(&Self::key(id)).await? {
            Some(raw) => raw,
            None => return Ok(None),
        };
        let session: CheckoutSession = serde_json::from_str(&raw)
            .map_err(|e| ServiceError::SerializationError(e.to_string()))?;
        Ok(Some(StoredSession { session, raw }))
    }

    pub async fn save(&self, session: &CheckoutSession) -> Result<(), ServiceError> {
        let raw = serde_json::to_string(session)
            .map_err(|e| ServiceError::SerializationError(e.to_string()))?;
        self.store.put(&Self::key(&session.id), &raw, self.ttl).await
    }

    /// Persist `session` only if the stored record is still byte-identical
    /// to what `stored` was read from. Returns false when another writer got
    /// there first.
    pub async fn save_if_unchanged(
        &self,
        stored: &StoredSession,
        session: &CheckoutSession,
    ) -> Result<bool, ServiceError> {
        let raw = serde_json::to_string(session)
            .map_err(|e| ServiceError::SerializationError(e.to_string()))?;
        self.store
            .compare_and_swap(&Self::key(&session.id), &stored.raw, &raw, self.ttl)
            .await
    }

    pub async fn delete(&self, id: &str) -> Result<(), ServiceError> {
        self.store.delete(&Self::key(id)).await
    }
}
