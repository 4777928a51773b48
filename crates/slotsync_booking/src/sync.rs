// --- File: crates/slotsync_booking/src/sync.rs ---
//! `AvailabilitySync`: the one object a booking UI talks to.
//!
//! It owns the cache, the prefetcher, the live connection, the reconciler, the
//! notification queue and the booking session, and wires the live feed into them.

use std::sync::Arc;
use std::time::Duration;

use slotsync_cache::{
    suggest_dates, AvailabilityCache, DateSuggestions, HttpAvailabilitySource, Prefetcher,
    SuggestionWindow, TtlPolicy,
};
use slotsync_common::{
    config_error, conflict, validation_error, Availability, AvailabilitySource, DateKey,
    SlotStatus, SlotSyncError, TimeSlot,
};
use slotsync_config::AppConfig;
use slotsync_realtime::{
    ConnectionManager, ConnectionSettings, ConnectionState, ConnectionStatus, Transport,
    WsTransport,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use crate::notifications::{
    DedupKey, Notification, NotificationCenter, NotificationKind, NotificationSettings,
};
use crate::reconciler::{conflict_message, EventReconciler, LastUpdate};
use crate::session::{BookingSession, BookingStep, CustomerPatch, SessionState};

pub struct AvailabilitySync {
    cache: AvailabilityCache,
    prefetcher: Prefetcher,
    connection: ConnectionManager,
    reconciler: Arc<EventReconciler>,
    notifications: NotificationCenter,
    session: BookingSession,
    suggestion_window: SuggestionWindow,
    background: Vec<JoinHandle<()>>,
}

impl AvailabilitySync {
    /// Builds the sync core against the configured HTTP API and WebSocket feed.
    pub async fn new(config: &AppConfig) -> Result<Self, SlotSyncError> {
        let source = Arc::new(HttpAvailabilitySource::from_config(&config.api));
        Self::with_parts(config, source, Arc::new(WsTransport)).await
    }

    /// Builds the sync core with explicit pull and push backends.
    ///
    /// Connects immediately when `realtime.auto_connect` is set; a failed first
    /// connection only schedules reconnects.
    pub async fn with_parts(
        config: &AppConfig,
        source: Arc<dyn AvailabilitySource>,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, SlotSyncError> {
        config.validate().map_err(config_error)?;

        let cache = AvailabilityCache::new(source, TtlPolicy::from_config(config)?);
        let prefetcher = Prefetcher::new(cache.clone(), config)?;
        let notifications = NotificationCenter::new(NotificationSettings::from(&config.notifications));
        let session = BookingSession::new();
        let reconciler = Arc::new(EventReconciler::new(
            cache.clone(),
            notifications.clone(),
            session.watch(),
        ));
        let connection =
            ConnectionManager::spawn(ConnectionSettings::from_config(&config.realtime), transport);

        let handler_reconciler = Arc::clone(&reconciler);
        let handler_session = session.clone();
        connection
            .on_event(move |event| {
                // The error notice is raised inside handle_event, before the selection is cleared.
                if let Some(signal) = handler_reconciler.handle_event(event) {
                    handler_session.invalidate_selection(
                        signal.date,
                        signal.slot,
                        &conflict_message(signal.date, signal.slot),
                    );
                }
            })
            .await?;

        let background = vec![
            cache.spawn_sweeper(Duration::from_secs(config.cache.sweep_interval_secs)),
            spawn_status_mirror(connection.watch_state(), session.clone()),
        ];

        let sync = Self {
            cache,
            prefetcher,
            connection,
            reconciler,
            notifications,
            session,
            suggestion_window: SuggestionWindow::from(&config.booking),
            background,
        };

        if config.realtime.auto_connect {
            let status = sync.connection.connect().await;
            info!("Availability sync started; live feed {:?}", status);
        }
        Ok(sync)
    }

    /// Availability for a user-requested date. A failure is returned to the
    /// caller and also raised as a warning notice.
    pub async fn get_availability(&self, date: DateKey) -> Result<Availability, SlotSyncError> {
        match self.cache.get(date).await {
            Ok(availability) => Ok(availability),
            Err(e) => {
                warn!("Availability refresh for {} failed: {}", date, e);
                self.notifications.push(
                    NotificationKind::Warning,
                    format!("Could not load availability for {}. Please try again.", date),
                    Some(DedupKey::date(date, "refresh_failed")),
                );
                Err(e)
            }
        }
    }

    pub fn prefetch(&self, focus: DateKey) -> Vec<DateKey> {
        self.prefetcher.prefetch(focus)
    }

    pub async fn bulk_prefetch(&self, dates: Vec<DateKey>) -> usize {
        self.prefetcher.bulk_prefetch(dates).await
    }

    pub fn subscribe_to_date(&self, date: DateKey) {
        self.connection.subscribe(date);
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn last_update(&self) -> Option<LastUpdate> {
        self.reconciler.last_update()
    }

    /// Active notifications, oldest first.
    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications.active()
    }

    pub fn dismiss_notification(&self, id: Uuid) -> bool {
        self.notifications.dismiss(id)
    }

    pub fn clear_notification(&self, id: Uuid) -> bool {
        self.notifications.remove(id)
    }

    pub fn clear_all(&self) {
        self.notifications.clear_all();
    }

    /// Selects a date: clears the time, follows the date on the live feed,
    /// warms its neighbours and loads its availability.
    pub async fn select_date(&self, date: DateKey) -> Result<Availability, SlotSyncError> {
        self.session.select_date(date);
        self.subscribe_to_date(date);
        self.prefetch(date);
        self.get_availability(date).await
    }

    /// Selects a time on the selected date. A slot already known to be booked
    /// is refused with a conflict error.
    pub fn select_time(&self, slot: TimeSlot) -> Result<(), SlotSyncError> {
        let date = self
            .session
            .snapshot()
            .selected_date
            .ok_or_else(|| validation_error("select a date before choosing a time"))?;

        if let Some(availability) = self.cache.peek(date) {
            if availability.status(slot) == SlotStatus::Booked {
                return Err(conflict(format!("{} on {} is already booked", slot, date)));
            }
        }
        self.session.select_time(slot)
    }

    pub fn update_customer(&self, patch: CustomerPatch) {
        self.session.update_customer(patch);
    }

    pub fn set_step(&self, step: BookingStep) {
        self.session.set_step(step);
    }

    /// Starts the booking over. Drops live interest in the selected date but
    /// keeps the shared connection open.
    pub fn reset_session(&self) {
        if let Some(date) = self.session.reset() {
            self.connection.unsubscribe(date);
        }
    }

    pub fn session_state(&self) -> SessionState {
        self.session.snapshot()
    }

    pub fn watch_session(&self) -> watch::Receiver<SessionState> {
        self.session.watch()
    }

    pub async fn suggest_dates(&self) -> DateSuggestions {
        suggest_dates(&self.cache, self.prefetcher.today(), self.suggestion_window).await
    }

    pub async fn connect(&self) -> ConnectionStatus {
        self.connection.connect().await
    }

    pub async fn disconnect(&self) {
        self.connection.disconnect().await;
    }

    pub fn cache(&self) -> &AvailabilityCache {
        &self.cache
    }

    pub fn notification_center(&self) -> &NotificationCenter {
        &self.notifications
    }

    pub fn reconciler(&self) -> &EventReconciler {
        &self.reconciler
    }
}

impl Drop for AvailabilitySync {
    fn drop(&mut self) {
        for task in &self.background {
            task.abort();
        }
    }
}

/// Keeps the session's connection field in step with the live feed.
fn spawn_status_mirror(
    mut states: watch::Receiver<ConnectionState>,
    session: BookingSession,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let status = states.borrow_and_update().status;
            session.set_connection(status);
            if states.changed().await.is_err() {
                break;
            }
        }
    })
}
