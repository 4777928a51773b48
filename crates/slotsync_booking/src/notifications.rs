// --- File: crates/slotsync_booking/src/notifications.rs ---
//! User-facing notification queue.
//!
//! Toast-style notifications expire on their own; errors stay until the user
//! dismisses them. Identical notices inside the dedup window collapse into one.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use slotsync_common::{DateKey, SlotStatus, TimeSlot};
use slotsync_config::NotificationConfig;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Info,
    Success,
    Warning,
    Error,
}

impl NotificationKind {
    /// Errors are never auto-expired.
    pub fn persists(&self) -> bool {
        matches!(self, NotificationKind::Error)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub id: Uuid,
    pub kind: NotificationKind,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub dismissed: bool,
}

/// The "status" part of a dedup key: a full slot status, or a fixed tag for
/// notices that carry none (conflicts, openings, maintenance).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DedupTag {
    Status(SlotStatus),
    Label(&'static str),
}

impl From<SlotStatus> for DedupTag {
    fn from(status: SlotStatus) -> Self {
        DedupTag::Status(status)
    }
}

impl From<&'static str> for DedupTag {
    fn from(label: &'static str) -> Self {
        DedupTag::Label(label)
    }
}

/// What makes two notices "the same" for deduplication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DedupKey {
    pub date: Option<DateKey>,
    pub slot: Option<TimeSlot>,
    pub tag: DedupTag,
}

impl DedupKey {
    pub fn slot(date: DateKey, slot: TimeSlot, tag: impl Into<DedupTag>) -> Self {
        Self {
            date: Some(date),
            slot: Some(slot),
            tag: tag.into(),
        }
    }

    pub fn date(date: DateKey, tag: impl Into<DedupTag>) -> Self {
        Self {
            date: Some(date),
            slot: None,
            tag: tag.into(),
        }
    }

    pub fn global(tag: impl Into<DedupTag>) -> Self {
        Self {
            date: None,
            slot: None,
            tag: tag.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotificationSettings {
    pub toast_ttl: Duration,
    pub dedup_window: Duration,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            toast_ttl: Duration::from_secs(5),
            dedup_window: Duration::from_secs(1),
        }
    }
}

impl From<&NotificationConfig> for NotificationSettings {
    fn from(config: &NotificationConfig) -> Self {
        Self {
            toast_ttl: Duration::from_secs(config.toast_ttl_secs),
            dedup_window: Duration::from_millis(config.dedup_window_ms),
        }
    }
}

#[derive(Default)]
struct CenterState {
    items: Vec<Notification>,
    recent: HashMap<DedupKey, Instant>,
}

struct CenterInner {
    settings: NotificationSettings,
    state: Mutex<CenterState>,
    active: watch::Sender<Vec<Notification>>,
}

#[derive(Clone)]
pub struct NotificationCenter {
    inner: Arc<CenterInner>,
}

impl Default for NotificationCenter {
    fn default() -> Self {
        Self::new(NotificationSettings::default())
    }
}

impl NotificationCenter {
    pub fn new(settings: NotificationSettings) -> Self {
        let (active, _) = watch::channel(Vec::new());
        Self {
            inner: Arc::new(CenterInner {
                settings,
                state: Mutex::new(CenterState::default()),
                active,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CenterState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds a notification unless an identical one was raised within the dedup
    /// window. Returns the new id, `None` when collapsed.
    pub fn push(
        &self,
        kind: NotificationKind,
        message: impl Into<String>,
        key: Option<DedupKey>,
    ) -> Option<Uuid> {
        let now = Instant::now();
        let window = self.inner.settings.dedup_window;
        let message = message.into();

        let id = {
            let mut state = self.lock();
            state
                .recent
                .retain(|_, seen| now.saturating_duration_since(*seen) < window);
            if let Some(key) = key {
                if state.recent.contains_key(&key) {
                    debug!("Collapsing duplicate notification: {}", message);
                    return None;
                }
                state.recent.insert(key, now);
            }

            let id = Uuid::new_v4();
            state.items.push(Notification {
                id,
                kind,
                message,
                created_at: Utc::now(),
                dismissed: false,
            });
            self.publish(&state);
            id
        };

        if !kind.persists() {
            self.schedule_expiry(id);
        }
        Some(id)
    }

    fn schedule_expiry(&self, id: Uuid) {
        let ttl = self.inner.settings.toast_ttl;
        let weak: Weak<CenterInner> = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            if let Some(inner) = weak.upgrade() {
                NotificationCenter { inner }.remove(id);
            }
        });
    }

    /// Hides a notification. It stays in the history for one toast TTL and
    /// is then dropped.
    pub fn dismiss(&self, id: Uuid) -> bool {
        {
            let mut state = self.lock();
            let Some(item) = state.items.iter_mut().find(|n| n.id == id && !n.dismissed) else {
                return false;
            };
            item.dismissed = true;
            self.publish(&state);
        }
        self.schedule_expiry(id);
        true
    }

    /// Removes a notification entirely.
    pub fn remove(&self, id: Uuid) -> bool {
        let mut state = self.lock();
        let before = state.items.len();
        state.items.retain(|n| n.id != id);
        let removed = state.items.len() != before;
        if removed {
            self.publish(&state);
        }
        removed
    }

    pub fn clear_all(&self) {
        let mut state = self.lock();
        state.items.clear();
        self.publish(&state);
    }

    /// Notifications not yet dismissed, oldest first.
    pub fn active(&self) -> Vec<Notification> {
        active_of(&self.lock())
    }

    /// Every retained notification, recently dismissed ones included.
    pub fn history(&self) -> Vec<Notification> {
        self.lock().items.clone()
    }

    /// Observes the active list.
    pub fn watch(&self) -> watch::Receiver<Vec<Notification>> {
        self.inner.active.subscribe()
    }

    fn publish(&self, state: &CenterState) {
        self.inner.active.send_replace(active_of(state));
    }
}

fn active_of(state: &CenterState) -> Vec<Notification> {
    state
        .items
        .iter()
        .filter(|n| !n.dismissed)
        .cloned()
        .collect()
}
