//! The live-session index and event fan-out fabric.
//!
//! A [`Registry`] is the single shared structure every bound session and
//! the bus consumer talk through. It answers three questions: which
//! sessions does a guild or user map to right now, where does an event
//! addressed to one of them go, and what happens to events addressed to a
//! session that has gone away but might RESUME.
//!
//! Grounded in the teacher's `InMemoryCache` (`relaycord-registry`'s
//! Cargo.toml was `titanium-cache` before this crate existed): the same
//! `DashMap`-per-index shape, generalized from a read-through entity cache
//! keyed by a single snowflake to a fan-out index keyed by guild, by user,
//! and by session.
#![deny(unsafe_code)]

mod session_id;

pub use session_id::SessionId;

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use dashmap::{DashMap, DashSet};
use parking_lot::Mutex;
use relaycord_model::{Event, RouteKind, Snowflake};

/// The fixed capacity of a session's pending queue while it is dark
/// (identifying, or in its resume-grace window). Once full, further
/// events are dropped and the queue is marked lossy.
pub const PENDING_QUEUE_CAPACITY: usize = 1024;

/// How long a cleanly-disconnected, resumable session's pending queue and
/// indices are kept alive waiting for a RESUME before being torn down.
pub const RESUME_GRACE: Duration = Duration::from_secs(60);

/// What a bound session exposes to the Registry for delivery.
///
/// Deliberately synchronous and non-blocking: an implementation is
/// expected to be a thin wrapper over an unbounded `mpsc` sender into the
/// session's own write task, so `dispatch` never waits on a slow socket.
pub trait SessionHandle: Send + Sync {
    /// Hand a live event to the session for immediate framing and send.
    /// Sequence-number assignment happens on the session's side.
    fn deliver(&self, event: Event);

    /// Ask the session to close itself. `resumable` controls which close
    /// code it sends before shutting its socket down.
    fn force_close(&self, resumable: bool);
}

struct PendingEntry {
    queue: VecDeque<Event>,
    floodgates_open: bool,
    lossy: bool,
}

impl PendingEntry {
    fn new() -> Self {
        Self { queue: VecDeque::new(), floodgates_open: false, lossy: false }
    }
}

/// The guild IDs and user ID a bound session was registered under, kept
/// around so a later removal can unwind the reverse indices without a
/// full table scan.
struct SessionMeta {
    user_id: Snowflake,
    guild_ids: Vec<Snowflake>,
}

/// The live-session index and dispatch fabric. Expected to be constructed
/// once per process and shared behind an `Arc`.
#[derive(Default)]
pub struct Registry {
    sessions: DashMap<SessionId, Option<Arc<dyn SessionHandle>>>,
    meta: DashMap<SessionId, SessionMeta>,
    guild_index: DashMap<Snowflake, DashSet<SessionId>>,
    user_index: DashMap<Snowflake, DashSet<SessionId>>,
    pending: DashMap<SessionId, Mutex<PendingEntry>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a freshly-identified session under its user and guild
    /// IDs, and open a pending queue for it. Returns the session ID the
    /// caller should hand back to the client as part of READY.
    pub fn bind(&self, handle: Arc<dyn SessionHandle>, user_id: Snowflake, guild_ids: &[Snowflake]) -> SessionId {
        let id = SessionId::generate();

        self.sessions.insert(id.clone(), Some(handle));
        self.pending.insert(id.clone(), Mutex::new(PendingEntry::new()));
        self.meta.insert(id.clone(), SessionMeta { user_id, guild_ids: guild_ids.to_vec() });

        self.user_index.entry(user_id).or_default().insert(id.clone());
        for guild_id in guild_ids {
            self.guild_index.entry(*guild_id).or_default().insert(id.clone());
        }

        id
    }

    /// Route an upstream event to every session it addresses, per
    /// `guild_id > guild_ids > user_id > user_ids` routing priority.
    /// `guild_ids`/`user_ids` are fanned out into one singly-addressed
    /// event per ID, matching a producer that batches an update across
    /// several guilds or several users into one bus message.
    pub fn dispatch(&self, event: Event) {
        match event.route_kind() {
            RouteKind::Guild(guild_id) => self.dispatch_to_guild(guild_id, &event),
            RouteKind::Guilds(guild_ids) => {
                for guild_id in guild_ids {
                    let per_guild = event.for_guild(guild_id);
                    self.dispatch_to_guild(guild_id, &per_guild);
                }
            }
            RouteKind::User(user_id) => self.dispatch_to_user(user_id, &event),
            RouteKind::Users(user_ids) => {
                for user_id in user_ids {
                    let per_user = event.for_user(user_id);
                    self.dispatch_to_user(user_id, &per_user);
                }
            }
            RouteKind::Unaddressed => {
                tracing::warn!(event = %event.name, "dropping event with no addressing field set");
            }
        }
    }

    fn dispatch_to_guild(&self, guild_id: Snowflake, event: &Event) {
        let Some(sessions) = self.guild_index.get(&guild_id) else { return };
        for session_id in sessions.iter() {
            self.append_pending(&session_id, event.clone());
        }
    }

    fn dispatch_to_user(&self, user_id: Snowflake, event: &Event) {
        // Every session the user currently has open receives the event,
        // not just the first one found — the original implementation
        // returned after the first match, silently starving every other
        // device the user was signed into.
        let Some(sessions) = self.user_index.get(&user_id) else { return };
        for session_id in sessions.iter() {
            self.append_pending(&session_id, event.clone());
        }
    }

    /// Deliver `event` to `session_id` immediately if it is live and past
    /// IDENTIFY, otherwise append it to the session's pending queue.
    /// Dropping the newest event and marking the queue lossy once
    /// [`PENDING_QUEUE_CAPACITY`] is reached.
    pub fn append_pending(&self, session_id: &SessionId, event: Event) {
        let Some(pending_entry) = self.pending.get(session_id) else { return };
        let mut guard = pending_entry.lock();

        if guard.floodgates_open {
            if let Some(handle) = self.sessions.get(session_id).and_then(|entry| entry.value().clone()) {
                drop(guard);
                handle.deliver(event);
                return;
            }
        }

        if guard.queue.len() >= PENDING_QUEUE_CAPACITY {
            guard.lossy = true;
        } else {
            guard.queue.push_back(event);
        }
    }

    /// Drain a session's pending queue straight to its handle and mark it
    /// open for direct delivery from here on, atomically with respect to
    /// concurrent [`Registry::append_pending`] calls for the same
    /// session — no event can land between the drain and the flip.
    /// Returns `true` if the queue had overflowed since the last drain.
    pub fn open_floodgates(&self, session_id: &SessionId) -> bool {
        let Some(pending_entry) = self.pending.get(session_id) else { return false };
        let handle = self.sessions.get(session_id).and_then(|entry| entry.value().clone());
        let mut guard = pending_entry.lock();

        if let Some(handle) = &handle {
            for event in guard.queue.drain(..) {
                handle.deliver(event);
            }
        }
        guard.floodgates_open = true;

        let lossy = guard.lossy;
        guard.lossy = false;
        lossy
    }

    /// A session is closing. `resumable` keeps its indices and pending
    /// queue alive for [`RESUME_GRACE`] in case the client reconnects
    /// with a RESUME; otherwise it is torn down immediately.
    pub fn close(self: &Arc<Self>, session_id: &SessionId, resumable: bool) {
        if !resumable {
            self.remove(session_id);
            return;
        }

        if let Some(mut entry) = self.sessions.get_mut(session_id) {
            *entry = None;
        } else {
            return;
        }

        let registry = Arc::clone(self);
        let grace_id = session_id.clone();
        tokio::spawn(async move {
            tokio::time::sleep(RESUME_GRACE).await;
            registry.expire_grace(&grace_id);
        });
    }

    /// Tear a session down for good only if it is still in its grace
    /// window (a RESUME in the meantime would have rebound it to a new
    /// handle, in which case this is a no-op).
    fn expire_grace(&self, session_id: &SessionId) {
        let still_dark = matches!(self.sessions.get(session_id).map(|entry| entry.is_none()), Some(true));
        if still_dark {
            self.remove(session_id);
        }
    }

    fn remove(&self, session_id: &SessionId) {
        self.sessions.remove(session_id);
        self.pending.remove(session_id);

        if let Some((_, meta)) = self.meta.remove(session_id) {
            if let Some(sessions) = self.user_index.get(&meta.user_id) {
                sessions.remove(session_id);
            }
            for guild_id in &meta.guild_ids {
                if let Some(sessions) = self.guild_index.get(guild_id) {
                    sessions.remove(session_id);
                }
            }
        }
    }

    /// The user a bound or grace-window session was identified as, used by
    /// the Session layer to run presence cleanup on teardown even when the
    /// session reached this point via RESUME rather than its own IDENTIFY.
    pub fn user_of(&self, session_id: &SessionId) -> Option<Snowflake> {
        self.meta.get(session_id).map(|entry| entry.user_id)
    }

    /// Rebind a session still in its grace window to a new handle and
    /// return its buffered events for replay. Returns `None` if the
    /// session is unknown, or is still live (never entered grace).
    pub fn resume(&self, session_id: &SessionId, handle: Arc<dyn SessionHandle>) -> Option<Vec<Event>> {
        let mut entry = self.sessions.get_mut(session_id)?;
        if entry.is_some() {
            return None;
        }
        *entry = Some(handle);
        drop(entry);

        let pending_entry = self.pending.get(session_id)?;
        let mut guard = pending_entry.lock();
        let events = guard.queue.drain(..).collect();
        guard.lossy = false;
        Some(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    use serde_json::json;

    struct RecordingHandle {
        delivered: StdMutex<Vec<Event>>,
        closes: AtomicUsize,
    }

    impl RecordingHandle {
        fn new() -> Arc<Self> {
            Arc::new(Self { delivered: StdMutex::new(Vec::new()), closes: AtomicUsize::new(0) })
        }

        fn names(&self) -> Vec<String> {
            self.delivered.lock().unwrap().iter().map(|e| e.name.clone()).collect()
        }
    }

    impl SessionHandle for RecordingHandle {
        fn deliver(&self, event: Event) {
            self.delivered.lock().unwrap().push(event);
        }

        fn force_close(&self, _resumable: bool) {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn event(name: &str) -> Event {
        Event { name: name.into(), data: json!({}), guild_id: None, guild_ids: None, user_id: None, user_ids: None }
    }

    #[test]
    fn guild_event_fans_out_to_every_bound_session() {
        let registry = Registry::new();
        let a = RecordingHandle::new();
        let b = RecordingHandle::new();
        let id_a = registry.bind(a.clone(), Snowflake::new(1), &[Snowflake::new(100)]);
        let id_b = registry.bind(b.clone(), Snowflake::new(2), &[Snowflake::new(100)]);
        registry.open_floodgates(&id_a);
        registry.open_floodgates(&id_b);

        registry.dispatch(Event { guild_id: Some(Snowflake::new(100)), ..event("MESSAGE_CREATE") });

        assert_eq!(a.names(), vec!["MESSAGE_CREATE"]);
        assert_eq!(b.names(), vec!["MESSAGE_CREATE"]);
    }

    #[test]
    fn user_event_reaches_every_session_the_user_has_open_not_just_the_first() {
        let registry = Registry::new();
        let desktop = RecordingHandle::new();
        let mobile = RecordingHandle::new();
        let id_desktop = registry.bind(desktop.clone(), Snowflake::new(7), &[]);
        let id_mobile = registry.bind(mobile.clone(), Snowflake::new(7), &[]);
        registry.open_floodgates(&id_desktop);
        registry.open_floodgates(&id_mobile);

        registry.dispatch(Event { user_id: Some(Snowflake::new(7)), ..event("PRESENCE_UPDATE") });

        assert_eq!(desktop.names(), vec!["PRESENCE_UPDATE"]);
        assert_eq!(mobile.names(), vec!["PRESENCE_UPDATE"]);
    }

    #[test]
    fn guild_ids_batch_fans_out_one_singly_addressed_event_per_guild() {
        let registry = Registry::new();
        let handle = RecordingHandle::new();
        let id = registry.bind(handle.clone(), Snowflake::new(1), &[Snowflake::new(10), Snowflake::new(20)]);
        registry.open_floodgates(&id);

        registry.dispatch(Event {
            guild_ids: Some(vec![Snowflake::new(10), Snowflake::new(20), Snowflake::new(30)]),
            ..event("GUILD_UPDATE")
        });

        assert_eq!(handle.names(), vec!["GUILD_UPDATE", "GUILD_UPDATE"]);
    }

    #[test]
    fn events_before_floodgates_open_buffer_and_replay_in_order() {
        let registry = Registry::new();
        let handle = RecordingHandle::new();
        let id = registry.bind(handle.clone(), Snowflake::new(1), &[Snowflake::new(100)]);

        registry.dispatch(Event { guild_id: Some(Snowflake::new(100)), ..event("FIRST") });
        registry.dispatch(Event { guild_id: Some(Snowflake::new(100)), ..event("SECOND") });
        assert!(handle.names().is_empty(), "nothing should be delivered before floodgates open");

        let lossy = registry.open_floodgates(&id);
        assert!(!lossy);
        assert_eq!(handle.names(), vec!["FIRST", "SECOND"]);

        registry.dispatch(Event { guild_id: Some(Snowflake::new(100)), ..event("THIRD") });
        assert_eq!(handle.names(), vec!["FIRST", "SECOND", "THIRD"]);
    }

    #[test]
    fn full_pending_queue_drops_newest_and_marks_lossy() {
        let registry = Registry::new();
        let handle = RecordingHandle::new();
        let id = registry.bind(handle.clone(), Snowflake::new(1), &[Snowflake::new(100)]);

        for _ in 0..PENDING_QUEUE_CAPACITY {
            registry.dispatch(Event { guild_id: Some(Snowflake::new(100)), ..event("FILL") });
        }
        registry.dispatch(Event { guild_id: Some(Snowflake::new(100)), ..event("OVERFLOW") });

        let lossy = registry.open_floodgates(&id);
        assert!(lossy);
        assert_eq!(handle.names().len(), PENDING_QUEUE_CAPACITY);
        assert!(!handle.names().contains(&"OVERFLOW".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn resumable_close_keeps_session_reachable_during_grace() {
        let registry = Arc::new(Registry::new());
        let first = RecordingHandle::new();
        let id = registry.bind(first.clone(), Snowflake::new(1), &[Snowflake::new(100)]);
        registry.open_floodgates(&id);

        registry.close(&id, true);

        // Still in grace: events addressed to the guild buffer rather
        // than vanish.
        registry.dispatch(Event { guild_id: Some(Snowflake::new(100)), ..event("DURING_GRACE") });
        assert!(first.names().is_empty());

        let second = RecordingHandle::new();
        let replayed = registry.resume(&id, second.clone()).expect("session still in grace");
        assert_eq!(replayed.len(), 1);
        assert_eq!(replayed[0].name, "DURING_GRACE");
    }

    #[tokio::test(start_paused = true)]
    async fn grace_window_expiry_tears_down_indices_when_never_resumed() {
        let registry = Arc::new(Registry::new());
        let handle = RecordingHandle::new();
        let id = registry.bind(handle.clone(), Snowflake::new(1), &[Snowflake::new(100)]);
        registry.open_floodgates(&id);

        registry.close(&id, true);
        tokio::time::advance(RESUME_GRACE + Duration::from_secs(1)).await;
        tokio::task::yield_now().await;

        let second = RecordingHandle::new();
        assert!(registry.resume(&id, second).is_none(), "grace window should have expired");
    }

    #[test]
    fn user_of_resolves_across_a_resume() {
        let registry = Arc::new(Registry::new());
        let first = RecordingHandle::new();
        let id = registry.bind(first.clone(), Snowflake::new(42), &[]);
        assert_eq!(registry.user_of(&id), Some(Snowflake::new(42)));

        registry.close(&id, true);
        let second = RecordingHandle::new();
        registry.resume(&id, second).expect("still in grace");
        assert_eq!(registry.user_of(&id), Some(Snowflake::new(42)));
    }

    #[test]
    fn non_resumable_close_tears_down_indices_immediately() {
        let registry = Arc::new(Registry::new());
        let gone = RecordingHandle::new();
        let id = registry.bind(gone.clone(), Snowflake::new(1), &[Snowflake::new(100)]);
        registry.open_floodgates(&id);

        registry.close(&id, false);

        let second = RecordingHandle::new();
        assert!(registry.resume(&id, second).is_none());

        // The guild index entry for `id` must be gone too, not just
        // un-resumable — a fresh session bound to the same guild should
        // be the only one to see a subsequent event.
        let replacement = RecordingHandle::new();
        let replacement_id = registry.bind(replacement.clone(), Snowflake::new(2), &[Snowflake::new(100)]);
        registry.open_floodgates(&replacement_id);
        registry.dispatch(Event { guild_id: Some(Snowflake::new(100)), ..event("AFTER_CLOSE") });
        assert!(gone.names().is_empty());
        assert_eq!(replacement.names(), vec!["AFTER_CLOSE"]);
    }
}
