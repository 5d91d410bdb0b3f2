//! Persisted prompt counters.
//!
//! Stores, per namespace:
//! - Session counter and per-session show count
//! - Total show count and last show time
//! - Last submitted rating, rated flag, session disable marker
//! - Persisted disable and interval scopes
//!
//! Reads of absent or unreadable keys return the documented default and
//! never fail. Writes return [`StoreError`]. Every operation holds the
//! backend lock for its whole read-modify-write.

use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::kv::{KvBackend, SqliteKv};
use crate::error::StoreError;
use crate::policy::{DisableScope, IntervalScope};

/// Persisted key names.
pub mod keys {
    pub const LAST_SHOW_TIME: &str = "last_show_time";
    pub const SESSION_COUNT: &str = "session_count";
    pub const TOTAL_SHOW_COUNT: &str = "total_show_count";
    pub const SHOW_THIS_SESSION: &str = "show_this_session";
    pub const LAST_STARS: &str = "last_stars";
    pub const DISABLE_THIS_SESSION: &str = "disable_this_session";
    pub const DISABLE_TYPE: &str = "disable_type";
    pub const INTERVAL_TYPE: &str = "interval_type";
    pub const IS_RATED: &str = "is_rated";

    pub const ALL: [&str; 9] = [
        LAST_SHOW_TIME,
        SESSION_COUNT,
        TOTAL_SHOW_COUNT,
        SHOW_THIS_SESSION,
        LAST_STARS,
        DISABLE_THIS_SESSION,
        DISABLE_TYPE,
        INTERVAL_TYPE,
        IS_RATED,
    ];
}

/// Point-in-time copy of every persisted value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateSnapshot {
    /// -1 until the first session starts.
    pub session_count: i32,
    /// Epoch millis, 0 when never shown.
    pub last_show_time_ms: i64,
    pub total_show_count: i32,
    pub show_count_this_session: i32,
    /// 0 when no rating has been submitted.
    pub last_stars: i32,
    pub disabled_this_session: bool,
    pub disable_scope: DisableScope,
    pub interval_scope: IntervalScope,
    pub is_rated: bool,
}

impl Default for StateSnapshot {
    fn default() -> Self {
        Self {
            session_count: -1,
            last_show_time_ms: 0,
            total_show_count: 0,
            show_count_this_session: 0,
            last_stars: 0,
            disabled_this_session: false,
            disable_scope: DisableScope::Session,
            interval_scope: IntervalScope::Session,
            is_rated: false,
        }
    }
}

/// Typed access to the prompt counters of one namespace.
pub struct PromptStore<B: KvBackend = SqliteKv> {
    backend: Mutex<B>,
}

impl PromptStore<SqliteKv> {
    /// Open the on-disk store for `namespace` under the data directory.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open(namespace: &str) -> Result<Self, StoreError> {
        Ok(Self::new(SqliteKv::open(namespace)?))
    }
}

impl<B: KvBackend> PromptStore<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend: Mutex::new(backend),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, B>, StoreError> {
        self.backend.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Lock for a read. A poisoned lock still yields the data since reads
    /// cannot leave it half-written.
    fn lock_read(&self) -> MutexGuard<'_, B> {
        self.backend
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn session_count(&self) -> i32 {
        read_parsed(&*self.lock_read(), keys::SESSION_COUNT, -1)
    }

    /// Start a new session: bump the counter and reset the per-session
    /// show count and disable marker in one write.
    pub fn increment_session(&self) -> Result<i32, StoreError> {
        let mut kv = self.lock()?;
        let next = read_parsed(&*kv, keys::SESSION_COUNT, -1i32).saturating_add(1);
        kv.put_all(&[
            (keys::SESSION_COUNT, next.to_string()),
            (keys::SHOW_THIS_SESSION, "0".to_string()),
            (keys::DISABLE_THIS_SESSION, "false".to_string()),
        ])?;
        Ok(next)
    }

    /// Start a session and persist both scopes in one write.
    ///
    /// Applies the same transitions as [`increment_session`],
    /// [`set_disable_scope`] and [`set_interval_scope`]; on failure nothing
    /// is written.
    ///
    /// [`increment_session`]: Self::increment_session
    /// [`set_disable_scope`]: Self::set_disable_scope
    /// [`set_interval_scope`]: Self::set_interval_scope
    pub fn start_session(
        &self,
        disable_scope: DisableScope,
        interval_scope: IntervalScope,
    ) -> Result<i32, StoreError> {
        let mut kv = self.lock()?;
        let next = read_parsed(&*kv, keys::SESSION_COUNT, -1i32).saturating_add(1);
        let mut entries = vec![
            (keys::SESSION_COUNT, next.to_string()),
            (keys::SHOW_THIS_SESSION, "0".to_string()),
            (keys::DISABLE_THIS_SESSION, "false".to_string()),
        ];
        if read_disable_scope(&*kv) == DisableScope::Session {
            entries.push((keys::LAST_STARS, "0".to_string()));
        }
        entries.push((keys::DISABLE_TYPE, disable_scope.as_str().to_string()));
        if read_interval_scope(&*kv) == IntervalScope::Session {
            entries.push((keys::LAST_SHOW_TIME, "0".to_string()));
        }
        entries.push((keys::INTERVAL_TYPE, interval_scope.as_str().to_string()));
        kv.put_all(&entries)?;
        Ok(next)
    }

    pub fn last_show_time_ms(&self) -> i64 {
        read_parsed(&*self.lock_read(), keys::LAST_SHOW_TIME, 0)
    }

    /// Record that a prompt was rendered at `now`.
    pub fn record_show(&self, now: DateTime<Utc>) -> Result<(), StoreError> {
        let mut kv = self.lock()?;
        let total = read_parsed(&*kv, keys::TOTAL_SHOW_COUNT, 0i32).saturating_add(1);
        let this_session = read_parsed(&*kv, keys::SHOW_THIS_SESSION, 0i32).saturating_add(1);
        kv.put_all(&[
            (keys::LAST_SHOW_TIME, now.timestamp_millis().to_string()),
            (keys::TOTAL_SHOW_COUNT, total.to_string()),
            (keys::SHOW_THIS_SESSION, this_session.to_string()),
        ])
    }

    pub fn total_show_count(&self) -> i32 {
        read_parsed(&*self.lock_read(), keys::TOTAL_SHOW_COUNT, 0)
    }

    pub fn show_count_this_session(&self) -> i32 {
        read_parsed(&*self.lock_read(), keys::SHOW_THIS_SESSION, 0)
    }

    pub fn last_stars(&self) -> i32 {
        read_parsed(&*self.lock_read(), keys::LAST_STARS, 0)
    }

    pub fn record_stars(&self, stars: i32) -> Result<(), StoreError> {
        self.lock()?.put_all(&[(keys::LAST_STARS, stars.to_string())])
    }

    pub fn is_disabled_this_session(&self) -> bool {
        read_parsed(&*self.lock_read(), keys::DISABLE_THIS_SESSION, false)
    }

    /// Mark prompting as disabled until the next session starts.
    pub fn disable_this_session(&self) -> Result<(), StoreError> {
        self.lock()?.put_all(&[(keys::DISABLE_THIS_SESSION, "true".to_string())])
    }

    pub fn disable_scope(&self) -> DisableScope {
        read_disable_scope(&*self.lock_read())
    }

    /// Persist the disable scope. Leaving SESSION scope zeroes the last
    /// rating first, so a session-bound disable never carries over.
    pub fn set_disable_scope(&self, scope: DisableScope) -> Result<(), StoreError> {
        let mut kv = self.lock()?;
        let previous = read_disable_scope(&*kv);
        let mut entries = Vec::with_capacity(2);
        if previous == DisableScope::Session {
            entries.push((keys::LAST_STARS, "0".to_string()));
        }
        entries.push((keys::DISABLE_TYPE, scope.as_str().to_string()));
        kv.put_all(&entries)
    }

    pub fn interval_scope(&self) -> IntervalScope {
        read_interval_scope(&*self.lock_read())
    }

    /// Persist the interval scope. Leaving SESSION scope clears the last
    /// show time first, restarting the interval clock.
    pub fn set_interval_scope(&self, scope: IntervalScope) -> Result<(), StoreError> {
        let mut kv = self.lock()?;
        let previous = read_interval_scope(&*kv);
        let mut entries = Vec::with_capacity(2);
        if previous == IntervalScope::Session {
            entries.push((keys::LAST_SHOW_TIME, "0".to_string()));
        }
        entries.push((keys::INTERVAL_TYPE, scope.as_str().to_string()));
        kv.put_all(&entries)
    }

    pub fn mark_rated(&self, rated: bool) -> Result<(), StoreError> {
        self.lock()?.put_all(&[(keys::IS_RATED, rated.to_string())])
    }

    pub fn is_rated(&self) -> bool {
        read_parsed(&*self.lock_read(), keys::IS_RATED, false)
    }

    /// Erase every key of this namespace.
    pub fn clear_all(&self) -> Result<(), StoreError> {
        self.lock()?.clear()
    }

    /// Read every value under one lock.
    pub fn snapshot(&self) -> StateSnapshot {
        let kv = self.lock_read();
        let kv = &*kv;
        StateSnapshot {
            session_count: read_parsed(kv, keys::SESSION_COUNT, -1),
            last_show_time_ms: read_parsed(kv, keys::LAST_SHOW_TIME, 0),
            total_show_count: read_parsed(kv, keys::TOTAL_SHOW_COUNT, 0),
            show_count_this_session: read_parsed(kv, keys::SHOW_THIS_SESSION, 0),
            last_stars: read_parsed(kv, keys::LAST_STARS, 0),
            disabled_this_session: read_parsed(kv, keys::DISABLE_THIS_SESSION, false),
            disable_scope: read_disable_scope(kv),
            interval_scope: read_interval_scope(kv),
            is_rated: read_parsed(kv, keys::IS_RATED, false),
        }
    }

    /// Consume the store, returning its backend.
    pub fn into_inner(self) -> B {
        self.backend
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn read_raw<B: KvBackend + ?Sized>(kv: &B, key: &str) -> Option<String> {
    match kv.get(key) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(key, error = %e, "store read failed, using default");
            None
        }
    }
}

fn read_parsed<B, T>(kv: &B, key: &str, default: T) -> T
where
    B: KvBackend + ?Sized,
    T: FromStr,
{
    match read_raw(kv, key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, "corrupted store value, using default");
            default
        }),
        None => default,
    }
}

fn read_disable_scope<B: KvBackend + ?Sized>(kv: &B) -> DisableScope {
    match read_raw(kv, keys::DISABLE_TYPE) {
        Some(raw) => DisableScope::parse(&raw).unwrap_or_else(|| {
            tracing::warn!(value = %raw, "unknown disable scope, using SESSION");
            DisableScope::default()
        }),
        None => DisableScope::default(),
    }
}

fn read_interval_scope<B: KvBackend + ?Sized>(kv: &B) -> IntervalScope {
    match read_raw(kv, keys::INTERVAL_TYPE) {
        Some(raw) => IntervalScope::parse(&raw).unwrap_or_else(|| {
            tracing::warn!(value = %raw, "unknown interval scope, using SESSION");
            IntervalScope::default()
        }),
        None => IntervalScope::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryKv;
    use chrono::TimeZone;

    fn store() -> PromptStore<MemoryKv> {
        PromptStore::new(MemoryKv::new())
    }

    #[test]
    fn empty_store_reads_defaults() {
        let s = store();
        assert_eq!(s.snapshot(), StateSnapshot::default());
        assert_eq!(s.session_count(), -1);
        assert_eq!(s.last_show_time_ms(), 0);
        assert_eq!(s.disable_scope(), DisableScope::Session);
        assert_eq!(s.interval_scope(), IntervalScope::Session);
        assert!(!s.is_rated());
    }

    #[test]
    fn increment_session_resets_session_values() {
        let s = store();
        assert_eq!(s.increment_session().unwrap(), 0);
        s.record_show(Utc::now()).unwrap();
        s.disable_this_session().unwrap();
        assert_eq!(s.show_count_this_session(), 1);
        assert!(s.is_disabled_this_session());

        assert_eq!(s.increment_session().unwrap(), 1);
        assert_eq!(s.show_count_this_session(), 0);
        assert!(!s.is_disabled_this_session());
        assert_eq!(s.total_show_count(), 1);
    }

    #[test]
    fn record_show_updates_time_and_counters() {
        let s = store();
        let at = Utc.timestamp_millis_opt(1_700_000_123_456).unwrap();
        s.record_show(at).unwrap();
        s.record_show(at).unwrap();
        assert_eq!(s.last_show_time_ms(), 1_700_000_123_456);
        assert_eq!(s.total_show_count(), 2);
        assert_eq!(s.show_count_this_session(), 2);
    }

    #[test]
    fn leaving_session_disable_scope_zeroes_stars() {
        let s = store();
        s.record_stars(3).unwrap();
        s.set_disable_scope(DisableScope::Forever).unwrap();
        assert_eq!(s.last_stars(), 0);
        assert_eq!(s.disable_scope(), DisableScope::Forever);
    }

    #[test]
    fn forever_disable_scope_keeps_stars() {
        let s = store();
        s.set_disable_scope(DisableScope::Forever).unwrap();
        s.record_stars(5).unwrap();
        s.set_disable_scope(DisableScope::Forever).unwrap();
        assert_eq!(s.last_stars(), 5);
        s.set_disable_scope(DisableScope::Session).unwrap();
        assert_eq!(s.last_stars(), 5);
        assert_eq!(s.disable_scope(), DisableScope::Session);
    }

    #[test]
    fn leaving_session_interval_scope_clears_clock() {
        let s = store();
        s.record_show(Utc::now()).unwrap();
        assert!(s.last_show_time_ms() > 0);
        s.set_interval_scope(IntervalScope::Global).unwrap();
        assert_eq!(s.last_show_time_ms(), 0);

        s.record_show(Utc::now()).unwrap();
        s.set_interval_scope(IntervalScope::Global).unwrap();
        assert!(s.last_show_time_ms() > 0);
    }

    #[test]
    fn corrupted_values_fall_back_to_defaults() {
        let mut kv = MemoryKv::new();
        kv.put_all(&[
            (keys::SESSION_COUNT, "banana".to_string()),
            (keys::DISABLE_TYPE, "SOMETIMES".to_string()),
            (keys::INTERVAL_TYPE, "".to_string()),
            (keys::IS_RATED, "yes".to_string()),
        ])
        .unwrap();
        let s = PromptStore::new(kv);
        let snap = s.snapshot();
        assert_eq!(snap.session_count, -1);
        assert_eq!(snap.disable_scope, DisableScope::Session);
        assert_eq!(snap.interval_scope, IntervalScope::Session);
        assert!(!snap.is_rated);
    }

    #[test]
    fn clear_all_restores_defaults() {
        let s = store();
        s.increment_session().unwrap();
        s.record_show(Utc::now()).unwrap();
        s.record_stars(4).unwrap();
        s.mark_rated(true).unwrap();
        s.set_interval_scope(IntervalScope::Global).unwrap();
        s.clear_all().unwrap();
        assert_eq!(s.snapshot(), StateSnapshot::default());
    }

    #[test]
    fn values_are_stored_as_documented_strings() {
        let s = store();
        s.set_disable_scope(DisableScope::Forever).unwrap();
        s.mark_rated(true).unwrap();
        let kv = s.into_inner();
        assert_eq!(kv.get(keys::DISABLE_TYPE).unwrap().as_deref(), Some("FOREVER"));
        assert_eq!(kv.get(keys::IS_RATED).unwrap().as_deref(), Some("true"));
    }

    #[test]
    fn concurrent_writers_lose_no_updates() {
        const SHOWS: usize = 200;
        const SESSIONS: usize = 50;
        let s = store();

        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    for _ in 0..SHOWS / 4 {
                        s.record_show(Utc::now()).unwrap();
                    }
                });
            }
            for _ in 0..2 {
                scope.spawn(|| {
                    for _ in 0..SESSIONS / 2 {
                        s.increment_session().unwrap();
                    }
                });
            }
        });

        assert_eq!(s.total_show_count(), SHOWS as i32);
        assert_eq!(s.session_count(), SESSIONS as i32 - 1);
    }

    #[test]
    fn start_session_applies_scope_transitions_in_one_write() {
        let s = store();
        s.record_show(Utc.timestamp_millis_opt(1_700_000_000_000).unwrap()).unwrap();
        s.record_stars(4).unwrap();

        let session = s.start_session(DisableScope::Forever, IntervalScope::Global).unwrap();
        assert_eq!(session, 0);

        let snap = s.snapshot();
        assert_eq!(snap.last_stars, 0);
        assert_eq!(snap.last_show_time_ms, 0);
        assert_eq!(snap.show_count_this_session, 0);
        assert_eq!(snap.disable_scope, DisableScope::Forever);
        assert_eq!(snap.interval_scope, IntervalScope::Global);

        s.record_stars(5).unwrap();
        s.start_session(DisableScope::Forever, IntervalScope::Global).unwrap();
        assert_eq!(s.last_stars(), 5);
    }
}
