//! Collaborator interfaces
//!
//! The engine reads entries through [`EntryStore`], hands notifications to a
//! [`NotificationSink`] and asks a [`Clock`] for the time. In-memory
//! implementations are provided for tests, replay and embedding.

use crate::error::EngineError;
use crate::validate::validate_entry;
use crate::types::{MoodEntry, Notification, NotificationId};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

/// Read access to users' mood entries
pub trait EntryStore {
    /// Entries created within the last `since_days` days
    fn fetch_entries(&self, user_id: &str, since_days: u32) -> Result<Vec<MoodEntry>, EngineError>;

    /// Every entry ever logged by the user
    fn fetch_all_entries(&self, user_id: &str) -> Result<Vec<MoodEntry>, EngineError>;
}

/// Persistence for composed notifications
pub trait NotificationSink {
    fn persist(&self, notification: Notification) -> Result<NotificationId, EngineError>;
}

/// Source of wall-clock time
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

impl<T: EntryStore + ?Sized> EntryStore for Arc<T> {
    fn fetch_entries(&self, user_id: &str, since_days: u32) -> Result<Vec<MoodEntry>, EngineError> {
        (**self).fetch_entries(user_id, since_days)
    }

    fn fetch_all_entries(&self, user_id: &str) -> Result<Vec<MoodEntry>, EngineError> {
        (**self).fetch_all_entries(user_id)
    }
}

impl<T: NotificationSink + ?Sized> NotificationSink for Arc<T> {
    fn persist(&self, notification: Notification) -> Result<NotificationId, EngineError> {
        (**self).persist(notification)
    }
}

impl<T: Clock + ?Sized> Clock for Arc<T> {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// System wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *lock(&self.now) = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = lock(&self.now);
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *lock(&self.now)
    }
}

/// Entry store held in memory, windowed against its clock
pub struct InMemoryEntryStore {
    entries: Mutex<HashMap<String, Vec<MoodEntry>>>,
    clock: Arc<dyn Clock + Send + Sync>,
}

impl Default for InMemoryEntryStore {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl InMemoryEntryStore {
    pub fn new(clock: Arc<dyn Clock + Send + Sync>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
        }
    }

    /// Append a validated entry
    pub fn append(&self, entry: MoodEntry) -> Result<(), EngineError> {
        validate_entry(&entry)?;
        lock(&self.entries)
            .entry(entry.user_id.clone())
            .or_default()
            .push(entry);
        Ok(())
    }

    pub fn len(&self, user_id: &str) -> usize {
        lock(&self.entries).get(user_id).map_or(0, Vec::len)
    }

    pub fn users(&self) -> Vec<String> {
        let mut users: Vec<String> = lock(&self.entries).keys().cloned().collect();
        users.sort();
        users
    }
}

impl EntryStore for InMemoryEntryStore {
    fn fetch_entries(&self, user_id: &str, since_days: u32) -> Result<Vec<MoodEntry>, EngineError> {
        let now = self.clock.now();
        // A window reaching past chrono's range has no lower bound
        let since = now.checked_sub_signed(Duration::days(i64::from(since_days)));
        let entries = lock(&self.entries);
        Ok(entries
            .get(user_id)
            .map(|list| {
                list.iter()
                    .filter(|e| since.map_or(true, |since| e.created_at >= since))
                    .filter(|e| e.created_at <= now)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn fetch_all_entries(&self, user_id: &str) -> Result<Vec<MoodEntry>, EngineError> {
        Ok(lock(&self.entries).get(user_id).cloned().unwrap_or_default())
    }
}

/// Notification sink held in memory
#[derive(Debug, Default)]
pub struct InMemoryNotificationSink {
    records: Mutex<Vec<(NotificationId, Notification)>>,
}

impl InMemoryNotificationSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All notifications for a user, oldest first
    pub fn list(&self, user_id: &str) -> Vec<(NotificationId, Notification)> {
        lock(&self.records)
            .iter()
            .filter(|(_, n)| n.user_id == user_id)
            .cloned()
            .collect()
    }

    pub fn unread(&self, user_id: &str) -> Vec<(NotificationId, Notification)> {
        self.list(user_id)
            .into_iter()
            .filter(|(_, n)| !n.read)
            .collect()
    }

    /// Mark a notification read, returning whether it exists
    pub fn mark_read(&self, id: NotificationId) -> bool {
        let mut records = lock(&self.records);
        match records.iter_mut().find(|(record_id, _)| *record_id == id) {
            Some((_, notification)) => {
                notification.read = true;
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        lock(&self.records).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl NotificationSink for InMemoryNotificationSink {
    fn persist(&self, notification: Notification) -> Result<NotificationId, EngineError> {
        let id = Uuid::new_v4();
        lock(&self.records).push((id, notification));
        Ok(id)
    }
}
