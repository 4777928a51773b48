#[cfg(test)]
mod tests {
    use crate::backoff::BackoffPolicy;
    use crate::connection::{ConnectionManager, ConnectionSettings, ConnectionStatus};
    use crate::mock::MockTransport;
    use crate::protocol::LiveEvent;
    use crate::transport::{Outgoing, ABNORMAL_CLOSURE, NORMAL_CLOSURE};
    use slotsync_common::{DateKey, TimeSlot};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::time::sleep;

    const SUBSCRIBE_0704: &str = r#"{"type":"subscribe","date":"2025-07-04"}"#;

    fn settings() -> ConnectionSettings {
        ConnectionSettings {
            url: "ws://test.invalid/ws/booking-updates".to_string(),
            heartbeat: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            backoff: BackoffPolicy::default(),
        }
    }

    fn manager() -> (ConnectionManager, MockTransport) {
        let transport = MockTransport::new();
        let manager = ConnectionManager::spawn(settings(), Arc::new(transport.clone()));
        (manager, transport)
    }

    fn date(s: &str) -> DateKey {
        s.parse().unwrap()
    }

    /// Lets the actor drain its queues without moving the paused clock noticeably.
    async fn settle() {
        sleep(Duration::from_millis(1)).await;
    }

    fn gaps(attempts: &[tokio::time::Instant]) -> Vec<u64> {
        attempts
            .windows(2)
            .map(|pair| (pair[1] - pair[0]).as_secs())
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_opens_and_is_idempotent() {
        let (manager, transport) = manager();
        assert_eq!(manager.state().status, ConnectionStatus::Closed);

        assert_eq!(manager.connect().await, ConnectionStatus::Open);
        assert_eq!(manager.connect().await, ConnectionStatus::Open);

        assert!(manager.is_connected());
        assert_eq!(transport.attempts().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscribe_before_connect_is_sent_on_open() {
        let (manager, transport) = manager();

        manager.subscribe(date("2025-07-04"));
        manager.connect().await;
        settle().await;

        assert_eq!(transport.texts_on(0), vec![SUBSCRIBE_0704.to_string()]);
        assert_eq!(manager.state().subscribed_date, Some(date("2025-07-04")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_switching_dates_unsubscribes_previous() {
        let (manager, transport) = manager();
        manager.connect().await;

        manager.subscribe(date("2025-07-04"));
        manager.subscribe(date("2025-07-04"));
        manager.subscribe(date("2025-07-05"));
        manager.unsubscribe(date("2025-07-05"));
        settle().await;

        assert_eq!(
            transport.texts_on(0),
            vec![
                SUBSCRIBE_0704.to_string(),
                r#"{"type":"unsubscribe","date":"2025-07-04"}"#.to_string(),
                r#"{"type":"subscribe","date":"2025-07-05"}"#.to_string(),
                r#"{"type":"unsubscribe","date":"2025-07-05"}"#.to_string(),
            ]
        );
        assert_eq!(manager.state().subscribed_date, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abnormal_close_reconnects_after_one_second_and_resubscribes_once() {
        let (manager, transport) = manager();
        manager.subscribe(date("2025-07-04"));
        manager.connect().await;

        transport.close_remote(ABNORMAL_CLOSURE);
        settle().await;
        assert_eq!(manager.state().status, ConnectionStatus::Reconnecting);
        assert_eq!(manager.state().attempt, 1);

        sleep(Duration::from_secs(2)).await;

        assert_eq!(manager.state().status, ConnectionStatus::Open);
        assert_eq!(manager.state().attempt, 0);
        assert_eq!(gaps(&transport.attempts()), vec![1]);
        assert_eq!(transport.texts_on(1), vec![SUBSCRIBE_0704.to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_schedule_then_give_up() {
        let (manager, transport) = manager();
        manager.connect().await;

        transport.fail_always();
        transport.close_remote(ABNORMAL_CLOSURE);
        sleep(Duration::from_secs(120)).await;

        let attempts = transport.attempts();
        assert_eq!(attempts.len(), 6);
        assert_eq!(gaps(&attempts[1..]), vec![2, 4, 8, 16]);
        assert_eq!(manager.state().status, ConnectionStatus::GaveUp);

        sleep(Duration::from_secs(300)).await;
        assert_eq!(transport.attempts().len(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_connect_after_give_up_resets_attempts() {
        let (manager, transport) = manager();
        transport.fail_always();
        manager.connect().await;
        sleep(Duration::from_secs(120)).await;
        assert_eq!(manager.state().status, ConnectionStatus::GaveUp);

        transport.fail_next(0);
        assert_eq!(manager.connect().await, ConnectionStatus::Open);
        assert_eq!(manager.state().attempt, 0);
        assert_eq!(manager.state().next_delay, Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_closes_normally_and_never_reconnects() {
        let (manager, transport) = manager();
        manager.connect().await;

        manager.disconnect().await;
        sleep(Duration::from_secs(120)).await;

        assert_eq!(manager.state().status, ConnectionStatus::Closed);
        assert_eq!(transport.attempts().len(), 1);
        assert!(transport.sent_on(0).contains(&Outgoing::Close {
            code: NORMAL_CLOSURE,
            reason: "client disconnect".to_string(),
        }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_cancels_pending_reconnect() {
        let (manager, transport) = manager();
        manager.connect().await;
        transport.close_remote(ABNORMAL_CLOSURE);
        settle().await;

        manager.disconnect().await;
        sleep(Duration::from_secs(60)).await;

        assert_eq!(transport.attempts().len(), 1);
        assert_eq!(manager.state().status, ConnectionStatus::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_normal_close_does_not_reconnect() {
        let (manager, transport) = manager();
        manager.connect().await;

        transport.close_remote(NORMAL_CLOSURE);
        sleep(Duration::from_secs(60)).await;

        assert_eq!(manager.state().status, ConnectionStatus::Closed);
        assert_eq!(transport.attempts().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_pings_while_open() {
        let (manager, transport) = manager();
        manager.connect().await;

        sleep(Duration::from_secs(61)).await;

        let pings = transport
            .texts_on(0)
            .into_iter()
            .filter(|text| text == r#"{"type":"ping"}"#)
            .count();
        assert_eq!(pings, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_events_reach_handler_in_wire_order_and_bad_frames_are_dropped() {
        let (manager, transport) = manager();
        let seen: Arc<Mutex<Vec<LiveEvent>>> = Arc::default();
        let sink = seen.clone();
        manager
            .on_event(move |event| sink.lock().unwrap().push(event))
            .await
            .unwrap();
        manager.connect().await;

        transport.push_text(r#"{"type":"availability_update","date":"2025-07-04","timeSlot":"12:00 PM","status":"booked","timestamp":"2025-07-01T10:00:00Z"}"#);
        transport.push_text("{garbage");
        transport.push_text(r#"{"type":"pong"}"#);
        transport.push_text(r#"{"type":"booking_conflict","date":"2025-07-04","timeSlot":"3:00 PM","timestamp":"2025-07-01T10:00:01Z"}"#);
        settle().await;

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert!(matches!(
            seen[0],
            LiveEvent::AvailabilityDelta {
                slot: TimeSlot::Noon,
                ..
            }
        ));
        assert!(matches!(
            seen[1],
            LiveEvent::BookingConflict {
                slot: TimeSlot::Afternoon,
                ..
            }
        ));
        assert!(manager.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_handler_is_rejected() {
        let (manager, _transport) = manager();

        manager.on_event(|_| {}).await.unwrap();
        assert!(manager.on_event(|_| {}).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_handshake_does_not_block_commands() {
        let (manager, transport) = manager();
        transport.hang_next(1);

        let pending_connect = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.connect().await })
        };
        settle().await;
        assert_eq!(manager.state().status, ConnectionStatus::Connecting);

        manager.subscribe(date("2025-07-04"));
        settle().await;
        assert_eq!(manager.state().subscribed_date, Some(date("2025-07-04")));

        manager.disconnect().await;
        assert_eq!(manager.state().status, ConnectionStatus::Closed);
        assert_eq!(pending_connect.await.unwrap(), ConnectionStatus::Closed);

        assert_eq!(manager.connect().await, ConnectionStatus::Open);
        assert_eq!(transport.texts_on(0), vec![SUBSCRIBE_0704.to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_handshake_times_out_into_backoff() {
        let (manager, transport) = manager();
        transport.hang_next(1);

        assert_eq!(manager.connect().await, ConnectionStatus::Reconnecting);

        sleep(Duration::from_millis(1_100)).await;
        assert!(manager.is_connected());
        assert_eq!(gaps(&transport.attempts()), vec![11]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_during_handshake_waits_for_it() {
        let (manager, transport) = manager();
        transport.fail_next(1);

        let (first, second) = tokio::join!(manager.connect(), manager.connect());

        assert_eq!(first, ConnectionStatus::Reconnecting);
        assert_eq!(second, ConnectionStatus::Reconnecting);
        assert_eq!(transport.attempts().len(), 1);
    }
}
