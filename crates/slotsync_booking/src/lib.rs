// --- File: crates/slotsync_booking/src/lib.rs ---

pub mod notifications;  // Deduplicated, expiring notification queue
pub mod reconciler;     // Live event reconciliation
pub mod session;        // Booking session state
pub mod sync;           // Facade consumed by the booking UI

#[cfg(test)]
mod notifications_test;
#[cfg(test)]
mod session_test;

pub use notifications::{
    DedupKey, DedupTag, Notification, NotificationCenter, NotificationKind, NotificationSettings,
};
pub use reconciler::{
    conflict_message, ConflictSignal, EventReconciler, LastUpdate, UpdateKind, MAINTENANCE_MESSAGE,
};
pub use session::{BookingSession, BookingStep, CustomerInfo, CustomerPatch, SessionState};
pub use sync::AvailabilitySync;

#[cfg(feature = "mock")]
pub mod mock {
    pub use slotsync_cache::mock::MockAvailabilitySource;
    pub use slotsync_realtime::mock::MockTransport;
}
