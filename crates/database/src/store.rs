//! The persistence seam consumed by the broadcast engine.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};
use parking_lot::Mutex;

use crate::entities::{Message, NewMessage};
use crate::types::{DatabaseError, DatabaseResult};

/// Durable, append-only message persistence.
///
/// Implementations must tolerate concurrent callers; the HTTP submission
/// path and every live connection's read loop save through the same store.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Persist a candidate and return the stored record.
    async fn save(&self, message: NewMessage) -> DatabaseResult<Message>;

    /// Look up a persisted message by its identifier.
    async fn find(&self, id: &str) -> DatabaseResult<Option<Message>>;

    /// Most recent messages, oldest first.
    async fn recent(&self, limit: u32) -> DatabaseResult<Vec<Message>>;

    /// Trivial liveness query.
    async fn ping(&self) -> DatabaseResult<()>;
}

/// Hands out timestamps that never go backwards, even if the wall clock does.
///
/// Timestamps are truncated to microseconds, the precision the SQLite store
/// persists, so a saved record and its reloaded copy compare equal.
#[derive(Debug)]
pub struct MonotonicClock {
    last: Mutex<DateTime<Utc>>,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            last: Mutex::new(DateTime::<Utc>::MIN_UTC),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        let mut last = self.last.lock();
        let now = Utc::now().trunc_subsecs(6).max(*last);
        *last = now;
        now
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Process-local store used in tests and for running without a database file.
///
/// `set_failing(true)` makes every call report the store as unavailable.
#[derive(Debug, Default)]
pub struct MemoryMessageStore {
    messages: Mutex<MemoryInner>,
    clock: MonotonicClock,
    failing: AtomicBool,
    saves: AtomicUsize,
}

#[derive(Debug, Default)]
struct MemoryInner {
    ordered: Vec<Message>,
    by_id: HashMap<String, usize>,
}

impl MemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of times `save` was invoked, successful or not.
    pub fn save_calls(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.messages.lock().ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_available(&self) -> DatabaseResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(DatabaseError::Unavailable("memory store switched off".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl MessageStore for MemoryMessageStore {
    async fn save(&self, message: NewMessage) -> DatabaseResult<Message> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;

        let message = message.into_message(self.clock.now());
        let mut inner = self.messages.lock();
        if inner.by_id.contains_key(&message.id) {
            return Err(DatabaseError::Duplicate(message.id));
        }
        let index = inner.ordered.len();
        inner.by_id.insert(message.id.clone(), index);
        inner.ordered.push(message.clone());
        Ok(message)
    }

    async fn find(&self, id: &str) -> DatabaseResult<Option<Message>> {
        self.check_available()?;
        let inner = self.messages.lock();
        Ok(inner.by_id.get(id).map(|&index| inner.ordered[index].clone()))
    }

    async fn recent(&self, limit: u32) -> DatabaseResult<Vec<Message>> {
        self.check_available()?;
        let inner = self.messages.lock();
        let skip = inner.ordered.len().saturating_sub(limit as usize);
        Ok(inner.ordered[skip..].to_vec())
    }

    async fn ping(&self) -> DatabaseResult<()> {
        self.check_available()
    }
}
