// --- File: crates/slotsync_realtime/src/protocol.rs ---
//! Wire protocol of the live booking-update feed.
//!
//! Inbound frames are JSON text with a `type` discriminator; they are parsed into
//! `LiveEvent` here and nowhere else. Outbound control frames are `ControlFrame`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use slotsync_common::{protocol_error, DateKey, SlotStatus, SlotSyncError, TimeSlot};

/// A server-pushed change, always stamped with the server time it was produced at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiveEvent {
    AvailabilityDelta {
        date: DateKey,
        slot: TimeSlot,
        status: SlotStatus,
        at: DateTime<Utc>,
    },
    BookingConflict {
        date: DateKey,
        slot: TimeSlot,
        at: DateTime<Utc>,
    },
    WaitlistDelta {
        date: DateKey,
        slot: TimeSlot,
        position: Option<u32>,
        opened: bool,
        at: DateTime<Utc>,
    },
    Maintenance {
        at: DateTime<Utc>,
    },
}

impl LiveEvent {
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            LiveEvent::AvailabilityDelta { at, .. }
            | LiveEvent::BookingConflict { at, .. }
            | LiveEvent::WaitlistDelta { at, .. }
            | LiveEvent::Maintenance { at } => *at,
        }
    }

    /// The date the event concerns, if any.
    pub fn date(&self) -> Option<DateKey> {
        match self {
            LiveEvent::AvailabilityDelta { date, .. }
            | LiveEvent::BookingConflict { date, .. }
            | LiveEvent::WaitlistDelta { date, .. } => Some(*date),
            LiveEvent::Maintenance { .. } => None,
        }
    }
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum InboundFrame {
    AvailabilityUpdate {
        date: DateKey,
        #[serde(rename = "timeSlot")]
        time_slot: TimeSlot,
        status: String,
        #[serde(default)]
        count: Option<u32>,
        #[serde(deserialize_with = "de_server_time")]
        timestamp: DateTime<Utc>,
    },
    BookingConflict {
        date: DateKey,
        #[serde(rename = "timeSlot")]
        time_slot: TimeSlot,
        #[serde(deserialize_with = "de_server_time")]
        timestamp: DateTime<Utc>,
    },
    WaitlistUpdate {
        date: DateKey,
        #[serde(rename = "timeSlot")]
        time_slot: TimeSlot,
        #[serde(default)]
        position: Option<u32>,
        #[serde(rename = "slotOpened", default)]
        slot_opened: bool,
        #[serde(deserialize_with = "de_server_time")]
        timestamp: DateTime<Utc>,
    },
    SystemMaintenance {
        #[serde(deserialize_with = "de_server_time")]
        timestamp: DateTime<Utc>,
    },
    Pong,
}

/// Server timestamps arrive either as RFC 3339 strings or as epoch milliseconds.
fn de_server_time<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Millis(i64),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Text(text) => DateTime::parse_from_rfc3339(&text)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom),
        Raw::Millis(ms) => DateTime::<Utc>::from_timestamp_millis(ms)
            .ok_or_else(|| serde::de::Error::custom(format!("timestamp out of range: {}", ms))),
    }
}

/// Parses one inbound text frame.
///
/// `Ok(None)` is a valid frame that carries no event (heartbeat replies).
pub fn parse_frame(text: &str) -> Result<Option<LiveEvent>, SlotSyncError> {
    let frame: InboundFrame =
        serde_json::from_str(text).map_err(|e| protocol_error(format!("{} in frame {}", e, text)))?;

    let event = match frame {
        InboundFrame::AvailabilityUpdate {
            date,
            time_slot,
            status,
            count,
            timestamp,
        } => LiveEvent::AvailabilityDelta {
            date,
            slot: time_slot,
            status: SlotStatus::from_wire(&status, count).map_err(|e| protocol_error(e))?,
            at: timestamp,
        },
        InboundFrame::BookingConflict {
            date,
            time_slot,
            timestamp,
        } => LiveEvent::BookingConflict {
            date,
            slot: time_slot,
            at: timestamp,
        },
        InboundFrame::WaitlistUpdate {
            date,
            time_slot,
            position,
            slot_opened,
            timestamp,
        } => LiveEvent::WaitlistDelta {
            date,
            slot: time_slot,
            position,
            opened: slot_opened,
            at: timestamp,
        },
        InboundFrame::SystemMaintenance { timestamp } => LiveEvent::Maintenance { at: timestamp },
        InboundFrame::Pong => return Ok(None),
    };
    Ok(Some(event))
}

/// Control frames the client sends to the feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlFrame {
    Subscribe { date: DateKey },
    Unsubscribe { date: DateKey },
    Ping,
}

impl ControlFrame {
    pub fn to_text(&self) -> Result<String, SlotSyncError> {
        Ok(serde_json::to_string(self)?)
    }
}
