// --- File: crates/slotsync_booking/src/reconciler.rs ---
//! Where pushed events meet the cache and the user's session.
//!
//! Events are handled one at a time in arrival order. Availability deltas go
//! into the cache; notices and conflict signals are derived from the session's
//! current selection.

use chrono::{DateTime, Utc};
use serde::Serialize;
use slotsync_cache::{AvailabilityCache, DeltaOutcome};
use slotsync_common::{DateKey, SlotStatus, TimeSlot};
use slotsync_realtime::LiveEvent;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info};

use crate::notifications::{DedupKey, NotificationCenter, NotificationKind};
use crate::session::SessionState;

pub const MAINTENANCE_MESSAGE: &str =
    "System maintenance scheduled. Please complete your booking soon.";

/// The user's selected slot was taken by someone else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConflictSignal {
    pub date: DateKey,
    pub slot: TimeSlot,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateKind {
    Availability,
    Conflict,
    Waitlist,
    Maintenance,
}

/// The most recent live event, for a "last updated" display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastUpdate {
    pub kind: UpdateKind,
    pub date: Option<DateKey>,
    pub slot: Option<TimeSlot>,
    pub status: Option<SlotStatus>,
    pub position: Option<u32>,
    pub at: DateTime<Utc>,
}

impl LastUpdate {
    fn of(event: &LiveEvent) -> Self {
        let mut update = LastUpdate {
            kind: UpdateKind::Maintenance,
            date: event.date(),
            slot: None,
            status: None,
            position: None,
            at: event.timestamp(),
        };
        match event {
            LiveEvent::AvailabilityDelta { slot, status, .. } => {
                update.kind = UpdateKind::Availability;
                update.slot = Some(*slot);
                update.status = Some(*status);
            }
            LiveEvent::BookingConflict { slot, .. } => {
                update.kind = UpdateKind::Conflict;
                update.slot = Some(*slot);
            }
            LiveEvent::WaitlistDelta { slot, position, .. } => {
                update.kind = UpdateKind::Waitlist;
                update.slot = Some(*slot);
                update.position = *position;
            }
            LiveEvent::Maintenance { .. } => {}
        }
        update
    }
}

pub fn conflict_message(date: DateKey, slot: TimeSlot) -> String {
    format!(
        "Someone else just booked {} on {}. Please select another time.",
        slot,
        display_date(date)
    )
}

fn display_date(date: DateKey) -> String {
    date.as_date().format("%b %-d, %Y").to_string()
}

/// Kind of the notice for a slot that moved from `previous` to `status`.
fn delta_kind(previous: SlotStatus, status: SlotStatus) -> NotificationKind {
    if let SlotStatus::Limited { .. } = status {
        return NotificationKind::Info;
    }
    match status.openness().cmp(&previous.openness()) {
        std::cmp::Ordering::Greater => NotificationKind::Success,
        std::cmp::Ordering::Less => NotificationKind::Warning,
        std::cmp::Ordering::Equal if status.is_bookable() => NotificationKind::Success,
        std::cmp::Ordering::Equal => NotificationKind::Warning,
    }
}

fn delta_text(status: SlotStatus) -> String {
    match status {
        SlotStatus::Available => "became available".to_string(),
        SlotStatus::Booked => "was just booked".to_string(),
        SlotStatus::Limited { remaining: 1 } => "has 1 spot left".to_string(),
        SlotStatus::Limited { remaining } => format!("has {} spots left", remaining),
    }
}

pub struct EventReconciler {
    cache: AvailabilityCache,
    notifications: NotificationCenter,
    session: watch::Receiver<SessionState>,
    last_update: watch::Sender<Option<LastUpdate>>,
    conflicts: broadcast::Sender<ConflictSignal>,
}

impl EventReconciler {
    pub fn new(
        cache: AvailabilityCache,
        notifications: NotificationCenter,
        session: watch::Receiver<SessionState>,
    ) -> Self {
        let (last_update, _) = watch::channel(None);
        let (conflicts, _) = broadcast::channel(16);
        Self {
            cache,
            notifications,
            session,
            last_update,
            conflicts,
        }
    }

    pub fn last_update(&self) -> Option<LastUpdate> {
        self.last_update.borrow().clone()
    }

    /// Conflict signals for consumers beyond the session.
    pub fn subscribe_conflicts(&self) -> broadcast::Receiver<ConflictSignal> {
        self.conflicts.subscribe()
    }

    /// Applies one event. Returns the conflict signal when the event invalidates
    /// the current selection; its error notice has already been raised.
    pub fn handle_event(&self, event: LiveEvent) -> Option<ConflictSignal> {
        debug!("Reconciling live event {:?}", event);
        let selection = {
            let session = self.session.borrow();
            (session.selected_date, session.selected_time)
        };

        let signal = match &event {
            LiveEvent::AvailabilityDelta {
                date,
                slot,
                status,
                at,
            } => {
                match self.cache.apply_live_delta(*date, *slot, *status, *at) {
                    DeltaOutcome::Stale => return None,
                    DeltaOutcome::Applied { previous } if selection.0 == Some(*date) => {
                        self.notifications.push(
                            delta_kind(previous, *status),
                            format!("{} on {} {}", slot, display_date(*date), delta_text(*status)),
                            Some(DedupKey::slot(*date, *slot, *status)),
                        );
                    }
                    DeltaOutcome::Applied { .. } => {}
                }
                None
            }
            LiveEvent::BookingConflict { date, slot, at } => {
                if selection == (Some(*date), Some(*slot)) {
                    self.notifications.push(
                        NotificationKind::Error,
                        conflict_message(*date, *slot),
                        Some(DedupKey::slot(*date, *slot, "conflict")),
                    );
                    Some(ConflictSignal {
                        date: *date,
                        slot: *slot,
                        at: *at,
                    })
                } else {
                    debug!("Conflict on unselected slot {} {} absorbed", date, slot);
                    None
                }
            }
            LiveEvent::WaitlistDelta {
                date, slot, opened, ..
            } => {
                if *opened {
                    self.notifications.push(
                        NotificationKind::Success,
                        format!("A slot opened up for {} on {}!", slot, display_date(*date)),
                        Some(DedupKey::slot(*date, *slot, "opened")),
                    );
                }
                None
            }
            LiveEvent::Maintenance { .. } => {
                info!("Maintenance notice received from live feed");
                self.notifications.push(
                    NotificationKind::Warning,
                    MAINTENANCE_MESSAGE,
                    Some(DedupKey::global("maintenance")),
                );
                None
            }
        };

        self.last_update.send_replace(Some(LastUpdate::of(&event)));
        if let Some(signal) = signal {
            let _ = self.conflicts.send(signal);
        }
        signal
    }
}
