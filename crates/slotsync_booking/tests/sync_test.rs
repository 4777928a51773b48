use std::sync::Arc;
use std::time::Duration;

use slotsync_booking::{conflict_message, AvailabilitySync, BookingStep, NotificationKind};
use slotsync_cache::mock::MockAvailabilitySource;
use slotsync_common::logging;
use slotsync_common::{DateKey, SlotStatus, SlotSyncError, TimeSlot};
use slotsync_config::AppConfig;
use slotsync_realtime::mock::MockTransport;
use slotsync_realtime::ConnectionStatus;
use tokio::time::sleep;

const CONFLICT_0710_EVENING: &str = r#"{"type":"booking_conflict","date":"2025-07-10","timeSlot":"6:00 PM","timestamp":"2025-07-01T18:00:00Z"}"#;
const BOOKED_0710_EVENING: &str = r#"{"type":"availability_update","date":"2025-07-10","timeSlot":"6:00 PM","status":"booked","timestamp":1751392800000}"#;

struct Harness {
    sync: AvailabilitySync,
    source: MockAvailabilitySource,
    transport: MockTransport,
}

async fn start() -> Harness {
    logging::init();
    let source = MockAvailabilitySource::new();
    let transport = MockTransport::new();
    let sync = AvailabilitySync::with_parts(
        &AppConfig::default(),
        Arc::new(source.clone()),
        Arc::new(transport.clone()),
    )
    .await
    .expect("default config builds");
    settle().await;
    Harness {
        sync,
        source,
        transport,
    }
}

fn date(s: &str) -> DateKey {
    s.parse().unwrap()
}

async fn settle() {
    sleep(Duration::from_millis(1)).await;
}

#[tokio::test(start_paused = true)]
async fn test_starts_connected_and_mirrors_status() {
    let h = start().await;

    assert!(h.sync.is_connected());
    assert_eq!(h.sync.session_state().connection, ConnectionStatus::Open);

    h.transport.close_remote(1006);
    settle().await;
    assert_eq!(
        h.sync.session_state().connection,
        ConnectionStatus::Reconnecting
    );

    sleep(Duration::from_millis(1_100)).await;
    assert_eq!(h.sync.session_state().connection, ConnectionStatus::Open);
    assert_eq!(h.transport.link_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_select_date_subscribes_and_loads() {
    let h = start().await;
    let d = date("2025-07-10");

    let availability = h.sync.select_date(d).await.unwrap();
    settle().await;

    assert_eq!(availability.status(TimeSlot::Evening), SlotStatus::Available);
    assert_eq!(h.source.calls_for(d), 1);
    let state = h.sync.session_state();
    assert_eq!(state.selected_date, Some(d));
    assert_eq!(state.step, BookingStep::Time);
    assert!(h
        .transport
        .texts_on(0)
        .contains(&r#"{"type":"subscribe","date":"2025-07-10"}"#.to_string()));
}

#[tokio::test(start_paused = true)]
async fn test_conflict_on_selected_slot_clears_selection_with_one_error() {
    let h = start().await;
    let d = date("2025-07-10");
    h.sync.select_date(d).await.unwrap();
    h.sync.select_time(TimeSlot::Evening).unwrap();
    assert_eq!(h.sync.session_state().step, BookingStep::Info);

    h.transport.push_text(CONFLICT_0710_EVENING);
    settle().await;

    let state = h.sync.session_state();
    assert_eq!(state.selected_date, Some(d));
    assert_eq!(state.selected_time, None);
    assert_eq!(state.step, BookingStep::Time);
    assert_eq!(
        state.error.as_deref(),
        Some(conflict_message(d, TimeSlot::Evening).as_str())
    );

    let errors: Vec<_> = h
        .sync
        .notifications()
        .into_iter()
        .filter(|n| n.kind == NotificationKind::Error)
        .collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(
        errors[0].message,
        "Someone else just booked 6:00 PM on Jul 10, 2025. Please select another time."
    );

    sleep(Duration::from_secs(10)).await;
    assert_eq!(h.sync.notifications().len(), 1);
    assert!(h.sync.clear_notification(errors[0].id));
    assert!(h.sync.notifications().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_pushed_booking_blocks_time_selection() {
    let h = start().await;
    let d = date("2025-07-10");
    h.sync.select_date(d).await.unwrap();

    h.transport.push_text(BOOKED_0710_EVENING);
    settle().await;

    let result = h.sync.select_time(TimeSlot::Evening);
    assert!(matches!(result, Err(SlotSyncError::ConflictError(_))));
    assert_eq!(h.sync.session_state().selected_time, None);
    assert!(h.sync.select_time(TimeSlot::Night).is_ok());

    let view = h.sync.get_availability(d).await.unwrap();
    assert_eq!(view.status(TimeSlot::Evening), SlotStatus::Booked);
    assert_eq!(h.source.calls_for(d), 1);
    assert!(h.sync.last_update().is_some());
}

#[tokio::test(start_paused = true)]
async fn test_reset_unsubscribes_but_stays_connected() {
    let h = start().await;
    let d = date("2025-07-10");
    h.sync.select_date(d).await.unwrap();

    h.sync.reset_session();
    settle().await;

    let state = h.sync.session_state();
    assert_eq!(state.selected_date, None);
    assert_eq!(state.step, BookingStep::Date);
    assert_eq!(state.connection, ConnectionStatus::Open);
    assert!(h.sync.is_connected());
    assert!(h
        .transport
        .texts_on(0)
        .contains(&r#"{"type":"unsubscribe","date":"2025-07-10"}"#.to_string()));
}

#[tokio::test(start_paused = true)]
async fn test_failed_load_warns_and_returns_error() {
    let h = start().await;
    let d = date("2025-07-15");
    h.source.fail_date(d);

    let err = h.sync.get_availability(d).await.unwrap_err();
    assert!(err.is_transient());

    let active = h.sync.notifications();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].kind, NotificationKind::Warning);

    h.source.heal_date(d);
    assert!(h.sync.get_availability(d).await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_cache_keeps_serving_after_live_feed_gives_up() {
    let h = start().await;
    h.transport.fail_always();
    h.transport.close_remote(1006);

    sleep(Duration::from_secs(40)).await;
    assert_eq!(h.sync.connection_state().status, ConnectionStatus::GaveUp);
    assert_eq!(h.sync.session_state().connection, ConnectionStatus::GaveUp);

    let d = date("2025-07-08");
    assert!(h.sync.select_date(d).await.is_ok());
    assert_eq!(h.source.calls_for(d), 1);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_closes_feed() {
    let h = start().await;

    h.sync.disconnect().await;
    settle().await;

    assert!(!h.sync.is_connected());
    assert_eq!(h.sync.session_state().connection, ConnectionStatus::Closed);
    assert_eq!(h.sync.connect().await, ConnectionStatus::Open);
}
