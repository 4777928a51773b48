// --- File: crates/slotsync_booking/src/session.rs ---
//! Booking session state: the user's selections, form fields and step.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use slotsync_common::{validation_error, DateKey, SlotSyncError, TimeSlot};
use slotsync_realtime::ConnectionStatus;
use tokio::sync::watch;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStep {
    #[default]
    Date,
    Time,
    Info,
    Confirm,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerInfo {
    pub name: String,
    pub phone: String,
    pub email: String,
    pub address: String,
    pub city: String,
    pub zipcode: String,
    pub contact_preference: String,
}

impl Default for CustomerInfo {
    fn default() -> Self {
        Self {
            name: String::new(),
            phone: String::new(),
            email: String::new(),
            address: String::new(),
            city: String::new(),
            zipcode: String::new(),
            contact_preference: "email".to_string(),
        }
    }
}

/// Field-wise update; `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CustomerPatch {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub zipcode: Option<String>,
    pub contact_preference: Option<String>,
}

impl CustomerInfo {
    pub fn apply(&mut self, patch: CustomerPatch) {
        let fields = [
            (&mut self.name, patch.name),
            (&mut self.phone, patch.phone),
            (&mut self.email, patch.email),
            (&mut self.address, patch.address),
            (&mut self.city, patch.city),
            (&mut self.zipcode, patch.zipcode),
            (&mut self.contact_preference, patch.contact_preference),
        ];
        for (field, value) in fields {
            if let Some(value) = value {
                *field = value;
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub selected_date: Option<DateKey>,
    pub selected_time: Option<TimeSlot>,
    pub step: BookingStep,
    pub customer: CustomerInfo,
    /// Mirror of the live feed status for a "live" indicator.
    pub connection: ConnectionStatus,
    pub error: Option<String>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            selected_date: None,
            selected_time: None,
            step: BookingStep::default(),
            customer: CustomerInfo::default(),
            connection: ConnectionStatus::Closed,
            error: None,
        }
    }
}

/// Shared handle; every change is published to `watch()` receivers.
#[derive(Clone)]
pub struct BookingSession {
    state: Arc<watch::Sender<SessionState>>,
}

impl Default for BookingSession {
    fn default() -> Self {
        Self::new()
    }
}

impl BookingSession {
    pub fn new() -> Self {
        let (state, _) = watch::channel(SessionState::default());
        Self {
            state: Arc::new(state),
        }
    }

    pub fn snapshot(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Selects a date, clearing the time. Returns the previously selected date.
    pub fn select_date(&self, date: DateKey) -> Option<DateKey> {
        let mut previous = None;
        self.state.send_modify(|state| {
            previous = state.selected_date.replace(date);
            state.selected_time = None;
            state.step = BookingStep::Time;
            state.error = None;
        });
        previous
    }

    /// Selects a time on the selected date and moves on to the form.
    pub fn select_time(&self, slot: TimeSlot) -> Result<(), SlotSyncError> {
        let mut result = Ok(());
        self.state.send_if_modified(|state| {
            if state.selected_date.is_none() {
                result = Err(validation_error("select a date before choosing a time"));
                return false;
            }
            state.selected_time = Some(slot);
            state.step = BookingStep::Info;
            state.error = None;
            true
        });
        result
    }

    pub fn update_customer(&self, patch: CustomerPatch) {
        self.state.send_modify(|state| state.customer.apply(patch));
    }

    pub fn set_step(&self, step: BookingStep) {
        self.state.send_if_modified(|state| {
            let changed = state.step != step;
            state.step = step;
            changed
        });
    }

    /// Clears the time if `(date, slot)` is the current selection, sending the
    /// user back to time selection. Returns whether the selection was cleared.
    pub fn invalidate_selection(&self, date: DateKey, slot: TimeSlot, reason: &str) -> bool {
        let cleared = self.state.send_if_modified(|state| {
            if state.selected_date != Some(date) || state.selected_time != Some(slot) {
                return false;
            }
            state.selected_time = None;
            state.step = BookingStep::Time;
            state.error = Some(reason.to_string());
            true
        });
        if cleared {
            info!("Selection {} {} invalidated by a concurrent booking", date, slot);
        }
        cleared
    }

    pub fn set_connection(&self, status: ConnectionStatus) {
        self.state.send_if_modified(|state| {
            let changed = state.connection != status;
            state.connection = status;
            changed
        });
    }

    /// Back to the initial state. The connection mirror is kept.
    /// Returns the date that was selected, if any.
    pub fn reset(&self) -> Option<DateKey> {
        let mut previous = None;
        self.state.send_modify(|state| {
            previous = state.selected_date;
            *state = SessionState {
                connection: state.connection,
                ..SessionState::default()
            };
        });
        debug!("Booking session reset");
        previous
    }
}
