#[cfg(test)]
mod tests {
    use crate::notifications::{DedupKey, NotificationCenter, NotificationKind};
    use slotsync_common::{DateKey, TimeSlot};
    use std::time::Duration;
    use tokio::time::sleep;

    fn date(s: &str) -> DateKey {
        s.parse().unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_toasts_expire_after_five_seconds() {
        let center = NotificationCenter::default();
        center.push(NotificationKind::Info, "3:00 PM has 2 spots left", None);

        sleep(Duration::from_millis(4_900)).await;
        assert_eq!(center.active().len(), 1);

        sleep(Duration::from_millis(200)).await;
        assert!(center.active().is_empty());
        assert!(center.history().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_errors_persist_until_dismissed() {
        let center = NotificationCenter::default();
        let id = center
            .push(NotificationKind::Error, "Someone else just booked it", None)
            .unwrap();

        sleep(Duration::from_secs(60)).await;
        assert_eq!(center.active().len(), 1);

        assert!(center.dismiss(id));
        assert!(center.active().is_empty());
        assert!(!center.dismiss(id));
        let history = center.history();
        assert_eq!(history.len(), 1);
        assert!(history[0].dismissed);

        sleep(Duration::from_millis(5_100)).await;
        assert!(center.history().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_identical_notices_inside_window_collapse() {
        let center = NotificationCenter::default();
        let key = DedupKey::slot(date("2025-07-04"), TimeSlot::Evening, "booked");

        assert!(center.push(NotificationKind::Warning, "booked", Some(key)).is_some());
        sleep(Duration::from_millis(500)).await;
        assert!(center.push(NotificationKind::Warning, "booked", Some(key)).is_none());
        assert_eq!(center.active().len(), 1);

        sleep(Duration::from_millis(600)).await;
        assert!(center.push(NotificationKind::Warning, "booked", Some(key)).is_some());
        assert_eq!(center.active().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_different_statuses_are_not_duplicates() {
        let center = NotificationCenter::default();
        let d = date("2025-07-04");

        center.push(
            NotificationKind::Warning,
            "booked",
            Some(DedupKey::slot(d, TimeSlot::Noon, "booked")),
        );
        center.push(
            NotificationKind::Success,
            "available",
            Some(DedupKey::slot(d, TimeSlot::Noon, "available")),
        );
        center.push(NotificationKind::Info, "no key", None);
        center.push(NotificationKind::Info, "no key", None);

        assert_eq!(center.active().len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_remove_and_clear_all() {
        let center = NotificationCenter::default();
        let first = center.push(NotificationKind::Error, "first", None).unwrap();
        center.push(NotificationKind::Error, "second", None);
        let mut watcher = center.watch();

        assert!(center.remove(first));
        assert!(!center.remove(first));
        assert!(watcher.has_changed().unwrap());
        assert_eq!(watcher.borrow_and_update().len(), 1);

        center.clear_all();
        assert!(center.active().is_empty());
        assert!(watcher.borrow_and_update().is_empty());
    }
}
