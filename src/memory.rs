//! Session store — per-conversation state with FIFO-capped history and TTL
//! eviction.
//!
//! The store is the only shared mutable structure in the pipeline. Callers
//! never touch a `Session`'s fields directly: every mutation goes through a
//! store operation, and `get_context` hands out snapshots, not references.
//!
//! The contract is *never fail on unknown session key*: any operation that
//! references an absent key transparently creates the session first
//! (upsert-on-read). `resolve_session(None)` mints a fresh UUID key.
//!
//! Locking: the outer map lock is held only to find or insert a session
//! slot; all field mutation happens under the per-session mutex. No await
//! point ever occurs while either lock is held, so concurrent turns on the
//! same key serialize and turns on distinct keys proceed independently.
//! `evict_expired` only drops map entries — an in-flight turn keeps its
//! `Arc` and completes its read-modify-write atomically.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use crate::intent::{push_unique, ConversationContext, Params, Preferences, Turn};

/// Default maximum turns retained per session (FIFO — oldest dropped first).
const DEFAULT_MAX_HISTORY: usize = 10;
/// Default session time-to-live in hours.
const DEFAULT_TTL_HOURS: i64 = 24;

/// One conversation's state. Owned by the store; exposed only as clones.
#[derive(Debug, Clone)]
pub struct Session {
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
    pub history: VecDeque<Turn>,
    pub preferences: Preferences,
    /// Normalized integer IDs of the entities the most recent dispatch
    /// returned. Overwritten wholesale, never merged.
    pub last_entities: Vec<i64>,
}

impl Session {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            created_at: now,
            last_accessed: now,
            history: VecDeque::new(),
            preferences: Preferences::default(),
            last_entities: Vec::new(),
        }
    }

    /// Snapshot handed to classification and narration.
    pub fn context(&self) -> ConversationContext {
        ConversationContext {
            recent_turns: self.history.iter().cloned().collect(),
            preferences: self.preferences.clone(),
            last_entities: self.last_entities.clone(),
        }
    }
}

type Slot = Arc<Mutex<Session>>;

pub struct SessionStore {
    sessions: RwLock<HashMap<String, Slot>>,
    max_history: usize,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(max_history: Option<usize>, ttl_hours: Option<i64>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            max_history: max_history.unwrap_or(DEFAULT_MAX_HISTORY),
            ttl: Duration::hours(ttl_hours.unwrap_or(DEFAULT_TTL_HOURS)),
        }
    }

    /// Return `key` if it names a live session (touching `last_accessed`),
    /// otherwise allocate a fresh key with an empty session. Never fails.
    pub fn resolve_session(&self, key: Option<&str>) -> String {
        if let Some(k) = key {
            let map = self.sessions.read().unwrap_or_else(|e| e.into_inner());
            if let Some(slot) = map.get(k) {
                let mut s = slot.lock().unwrap_or_else(|e| e.into_inner());
                s.last_accessed = Utc::now();
                return k.to_string();
            }
        }
        let new_key = Uuid::new_v4().to_string();
        self.insert_empty(&new_key);
        info!(session = %new_key, "session created");
        new_key
    }

    /// Snapshot of the session under `key`, auto-creating it if absent.
    pub fn get_context(&self, key: &str) -> Session {
        let slot = self.slot(key);
        let mut s = slot.lock().unwrap_or_else(|e| e.into_inner());
        s.last_accessed = Utc::now();
        s.clone()
    }

    /// Append a turn, trim history to the cap, then run passive preference
    /// inference over the turn's parameters.
    pub fn record_turn(&self, key: &str, turn: Turn) {
        let slot = self.slot(key);
        let mut s = slot.lock().unwrap_or_else(|e| e.into_inner());
        s.last_accessed = Utc::now();

        s.history.push_back(turn);
        while s.history.len() > self.max_history {
            s.history.pop_front();
        }

        // Passive inference reads the just-recorded turn (still owned by the
        // history deque — clone the params out to satisfy the borrow).
        let params = s
            .history
            .back()
            .map(|t| t.params.clone())
            .unwrap_or_default();
        infer_preferences(&mut s.preferences, &params);

        debug!(session = %key, history_len = s.history.len(), "turn recorded");
    }

    /// Overwrite the last-entity-context wholesale.
    pub fn set_last_entity_context(&self, key: &str, ids: Vec<i64>) {
        let slot = self.slot(key);
        let mut s = slot.lock().unwrap_or_else(|e| e.into_inner());
        s.last_accessed = Utc::now();
        s.last_entities = ids;
    }

    /// Explicit preference update: append only values not already present,
    /// preserving order.
    pub fn update_preferences(
        &self,
        key: &str,
        genres: &[String],
        entity_ids: &[i64],
        people: &[String],
        sources: &[String],
    ) -> Preferences {
        let slot = self.slot(key);
        let mut s = slot.lock().unwrap_or_else(|e| e.into_inner());
        s.last_accessed = Utc::now();

        for g in genres {
            push_unique(&mut s.preferences.favorite_genres, g.clone());
        }
        for id in entity_ids {
            push_unique(&mut s.preferences.favorite_entities, *id);
        }
        for p in people {
            push_unique(&mut s.preferences.favorite_people, p.clone());
        }
        for src in sources {
            push_unique(&mut s.preferences.preferred_sources, src.clone());
        }
        s.preferences.clone()
    }

    /// Remove every session with `now - last_accessed > TTL`. Returns the
    /// number evicted. Safe to run concurrently with in-flight turns.
    pub fn evict_expired(&self, now: DateTime<Utc>) -> usize {
        let expired: Vec<String> = {
            let map = self.sessions.read().unwrap_or_else(|e| e.into_inner());
            map.iter()
                .filter(|(_, slot)| {
                    let s = slot.lock().unwrap_or_else(|e| e.into_inner());
                    now - s.last_accessed > self.ttl
                })
                .map(|(k, _)| k.clone())
                .collect()
        };

        if !expired.is_empty() {
            let mut map = self.sessions.write().unwrap_or_else(|e| e.into_inner());
            for k in &expired {
                map.remove(k);
            }
            info!(count = expired.len(), "expired sessions evicted");
        }
        expired.len()
    }

    /// Unconditional removal. No-op on unknown keys.
    pub fn clear_session(&self, key: &str) {
        let mut map = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        map.remove(key);
    }

    pub fn session_count(&self) -> usize {
        self.sessions.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    // ── internals ─────────────────────────────────────────────────────

    /// Fetch the slot for `key`, creating an empty session if absent.
    fn slot(&self, key: &str) -> Slot {
        {
            let map = self.sessions.read().unwrap_or_else(|e| e.into_inner());
            if let Some(slot) = map.get(key) {
                return slot.clone();
            }
        }
        self.insert_empty(key)
    }

    fn insert_empty(&self, key: &str) -> Slot {
        let mut map = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        // A concurrent caller may have inserted between the read and write
        // lock; entry() keeps exactly one Session per key either way.
        map.entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(Session::new(Utc::now()))))
            .clone()
    }
}

/// Passive preference inference: well-known parameter names observed in a
/// turn append novel values to the matching sequence. String values only —
/// explicit `update_preferences` handles lists.
fn infer_preferences(prefs: &mut Preferences, params: &Params) {
    if let Some(genre) = params.get_str("genre") {
        push_unique(&mut prefs.favorite_genres, genre.to_string());
    }
    if let Some(person) = params.get_str("actor_name").or_else(|| params.get_str("person_name")) {
        push_unique(&mut prefs.favorite_people, person.to_string());
    }
    if let Some(source) = params.get_str("network").or_else(|| params.get_str("source")) {
        push_unique(&mut prefs.preferred_sources, source.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::{IntentKind, ParamValue};

    fn store() -> SessionStore {
        SessionStore::new(Some(3), Some(24))
    }

    fn turn(text: &str, params: Params) -> Turn {
        Turn { text: text.into(), intent: IntentKind::SearchEntity, params }
    }

    #[test]
    fn resolve_without_key_mints_unique_keys() {
        let store = store();
        let a = store.resolve_session(None);
        let b = store.resolve_session(None);
        assert_ne!(a, b);
        assert_eq!(store.session_count(), 2);
    }

    #[test]
    fn resolve_with_live_key_returns_it_unchanged() {
        let store = store();
        let key = store.resolve_session(None);
        assert_eq!(store.resolve_session(Some(&key)), key);
        assert_eq!(store.session_count(), 1);
    }

    #[test]
    fn resolve_with_dead_key_allocates_new() {
        let store = store();
        let key = store.resolve_session(Some("no-such-session"));
        assert_ne!(key, "no-such-session");
    }

    #[test]
    fn get_context_upserts() {
        let store = store();
        let s = store.get_context("fresh");
        assert!(s.history.is_empty());
        assert_eq!(store.session_count(), 1);
    }

    #[test]
    fn history_is_fifo_capped() {
        let store = store(); // cap = 3
        for i in 0..5 {
            store.record_turn("k", turn(&format!("q{i}"), Params::new()));
        }
        let s = store.get_context("k");
        assert_eq!(s.history.len(), 3);
        let texts: Vec<_> = s.history.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["q2", "q3", "q4"]);
    }

    #[test]
    fn passive_inference_appends_novel_values() {
        let store = store();
        let mut p = Params::new();
        p.insert("genre", ParamValue::Str("noir".into()));
        p.insert("actor_name", ParamValue::Str("Ida Lupino".into()));
        p.insert("network", ParamValue::Str("HBO".into()));
        store.record_turn("k", turn("q", p.clone()));
        store.record_turn("k", turn("q again", p));

        let prefs = store.get_context("k").preferences;
        assert_eq!(prefs.favorite_genres, vec!["noir"]);
        assert_eq!(prefs.favorite_people, vec!["Ida Lupino"]);
        assert_eq!(prefs.preferred_sources, vec!["HBO"]);
    }

    #[test]
    fn explicit_update_dedupes_and_preserves_order() {
        let store = store();
        store.update_preferences(
            "k",
            &["drama".into(), "noir".into()],
            &[81189, 81189, 70327],
            &[],
            &[],
        );
        let prefs = store.update_preferences("k", &["drama".into()], &[], &[], &[]);
        assert_eq!(prefs.favorite_genres, vec!["drama", "noir"]);
        assert_eq!(prefs.favorite_entities, vec![81189, 70327]);
    }

    #[test]
    fn last_entity_context_is_overwritten_wholesale() {
        let store = store();
        store.set_last_entity_context("k", vec![1, 2, 3]);
        store.set_last_entity_context("k", vec![9]);
        assert_eq!(store.get_context("k").last_entities, vec![9]);
    }

    #[test]
    fn evict_expired_removes_exactly_the_stale() {
        let store = store(); // ttl = 24h
        let stale = store.resolve_session(None);
        let fresh = store.resolve_session(None);
        // Age the stale session by hand.
        {
            let map = store.sessions.read().unwrap();
            let slot = map.get(&stale).unwrap().clone();
            drop(map);
            slot.lock().unwrap().last_accessed = Utc::now() - Duration::hours(25);
        }
        store.record_turn(&fresh, turn("keep me", Params::new()));

        let evicted = store.evict_expired(Utc::now());
        assert_eq!(evicted, 1);
        assert_eq!(store.session_count(), 1);
        // Survivor keeps its full history.
        assert_eq!(store.get_context(&fresh).history.len(), 1);
    }

    #[test]
    fn evict_at_exact_ttl_boundary_keeps_session() {
        let store = store();
        let key = store.resolve_session(None);
        let now = {
            let map = store.sessions.read().unwrap();
            map.get(&key).unwrap().lock().unwrap().last_accessed
        };
        // Strictly greater-than: equality survives.
        assert_eq!(store.evict_expired(now + Duration::hours(24)), 0);
        assert_eq!(store.evict_expired(now + Duration::hours(24) + Duration::seconds(1)), 1);
    }

    #[test]
    fn clear_session_removes() {
        let store = store();
        let key = store.resolve_session(None);
        store.clear_session(&key);
        assert_eq!(store.session_count(), 0);
        store.clear_session("never-existed"); // no-op
    }

    #[test]
    fn concurrent_turns_on_one_key_lose_nothing() {
        use std::sync::Arc as StdArc;
        let store = StdArc::new(SessionStore::new(Some(64), Some(24)));
        let mut handles = Vec::new();
        for t in 0..8 {
            let store = store.clone();
            handles.push(std::thread::spawn(move || {
                for i in 0..8 {
                    store.record_turn(
                        "shared",
                        Turn {
                            text: format!("t{t}-q{i}"),
                            intent: IntentKind::Help,
                            params: Params::new(),
                        },
                    );
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(store.get_context("shared").history.len(), 64);
    }
}
