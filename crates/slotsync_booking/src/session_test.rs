#[cfg(test)]
mod tests {
    use crate::session::{BookingSession, BookingStep, CustomerPatch};
    use slotsync_common::{DateKey, SlotSyncError, TimeSlot};
    use slotsync_realtime::ConnectionStatus;

    fn date(s: &str) -> DateKey {
        s.parse().unwrap()
    }

    #[test]
    fn test_selecting_a_date_clears_the_time() {
        let session = BookingSession::new();
        session.select_date(date("2025-07-04"));
        session.select_time(TimeSlot::Evening).unwrap();
        assert_eq!(session.snapshot().step, BookingStep::Info);

        let previous = session.select_date(date("2025-07-05"));

        let state = session.snapshot();
        assert_eq!(previous, Some(date("2025-07-04")));
        assert_eq!(state.selected_date, Some(date("2025-07-05")));
        assert_eq!(state.selected_time, None);
        assert_eq!(state.step, BookingStep::Time);
    }

    #[test]
    fn test_time_requires_a_date() {
        let session = BookingSession::new();
        let result = session.select_time(TimeSlot::Noon);
        assert!(matches!(result, Err(SlotSyncError::ValidationError(_))));
        assert_eq!(session.snapshot().step, BookingStep::Date);
    }

    #[test]
    fn test_invalidation_only_hits_the_exact_selection() {
        let session = BookingSession::new();
        session.select_date(date("2025-07-10"));
        session.select_time(TimeSlot::Evening).unwrap();

        assert!(!session.invalidate_selection(date("2025-07-10"), TimeSlot::Night, "taken"));
        assert!(!session.invalidate_selection(date("2025-07-11"), TimeSlot::Evening, "taken"));
        assert_eq!(session.snapshot().selected_time, Some(TimeSlot::Evening));

        assert!(session.invalidate_selection(date("2025-07-10"), TimeSlot::Evening, "taken"));
        let state = session.snapshot();
        assert_eq!(state.selected_time, None);
        assert_eq!(state.selected_date, Some(date("2025-07-10")));
        assert_eq!(state.step, BookingStep::Time);
        assert_eq!(state.error.as_deref(), Some("taken"));
    }

    #[test]
    fn test_customer_patch_is_field_wise() {
        let session = BookingSession::new();
        session.update_customer(CustomerPatch {
            name: Some("Ada".to_string()),
            city: Some("Austin".to_string()),
            ..CustomerPatch::default()
        });
        session.update_customer(CustomerPatch {
            phone: Some("555-0100".to_string()),
            ..CustomerPatch::default()
        });

        let customer = session.snapshot().customer;
        assert_eq!(customer.name, "Ada");
        assert_eq!(customer.city, "Austin");
        assert_eq!(customer.phone, "555-0100");
        assert_eq!(customer.contact_preference, "email");
    }

    #[test]
    fn test_reset_keeps_connection_mirror() {
        let session = BookingSession::new();
        session.set_connection(ConnectionStatus::Open);
        session.select_date(date("2025-07-04"));
        session.set_step(BookingStep::Confirm);

        let previous = session.reset();

        let state = session.snapshot();
        assert_eq!(previous, Some(date("2025-07-04")));
        assert_eq!(state.selected_date, None);
        assert_eq!(state.step, BookingStep::Date);
        assert_eq!(state.connection, ConnectionStatus::Open);
    }

    #[test]
    fn test_watchers_see_changes() {
        let session = BookingSession::new();
        let mut watcher = session.watch();

        session.set_connection(ConnectionStatus::Closed);
        assert!(!watcher.has_changed().unwrap());

        session.set_connection(ConnectionStatus::Reconnecting);
        assert!(watcher.has_changed().unwrap());
        assert_eq!(
            watcher.borrow_and_update().connection,
            ConnectionStatus::Reconnecting
        );
    }
}
