// --- File: crates/slotsync_common/src/models.rs ---

//! Domain models shared by the cache, the live feed and the booking session.
//!
//! The wire shapes (`{ "12:00 PM": { "status": "limited", "count": 2 } }`) are
//! converted into total, strongly typed values at the crate boundary so nothing
//! downstream ever sees a partial slot map.

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

use crate::error::SlotSyncError;

/// A calendar date normalised to `YYYY-MM-DD`; the sole cache and subscription key.
///
/// Ordering is chronological.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DateKey(NaiveDate);

impl DateKey {
    pub fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    /// Builds a key from calendar parts, `None` for impossible dates.
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(Self)
    }

    pub fn as_date(&self) -> NaiveDate {
        self.0
    }

    pub fn weekday(&self) -> Weekday {
        self.0.weekday()
    }

    /// Shifts the key by a signed number of days, `None` on calendar overflow.
    pub fn add_days(&self, days: i64) -> Option<Self> {
        self.0.checked_add_signed(Duration::days(days)).map(Self)
    }
}

impl fmt::Display for DateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

impl FromStr for DateKey {
    type Err = SlotSyncError;

    /// Accepts `YYYY-MM-DD`, or an ISO timestamp whose date part is taken verbatim
    /// (`2025-07-04T18:00:00.000Z` -> `2025-07-04`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let date_part = match s.as_bytes().get(10) {
            Some(b'T') | Some(b't') | Some(b' ') => &s[..10],
            _ => s,
        };
        NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
            .map(Self)
            .map_err(|e| SlotSyncError::ParseError(format!("invalid date '{}': {}", s, e)))
    }
}

impl From<NaiveDate> for DateKey {
    fn from(date: NaiveDate) -> Self {
        Self(date)
    }
}

impl Serialize for DateKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DateKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// One of the fixed bookable times of a day, in chronological order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TimeSlot {
    Noon,
    Afternoon,
    Evening,
    Night,
}

impl TimeSlot {
    pub const ALL: [TimeSlot; 4] = [
        TimeSlot::Noon,
        TimeSlot::Afternoon,
        TimeSlot::Evening,
        TimeSlot::Night,
    ];

    /// The label used on the wire and in the UI.
    pub fn label(&self) -> &'static str {
        match self {
            TimeSlot::Noon => "12:00 PM",
            TimeSlot::Afternoon => "3:00 PM",
            TimeSlot::Evening => "6:00 PM",
            TimeSlot::Night => "9:00 PM",
        }
    }
}

impl fmt::Display for TimeSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for TimeSlot {
    type Err = SlotSyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        TimeSlot::ALL
            .into_iter()
            .find(|slot| slot.label().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| SlotSyncError::ParseError(format!("unknown time slot '{}'", s)))
    }
}

impl Serialize for TimeSlot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

impl<'de> Deserialize<'de> for TimeSlot {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Bookability of a single slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SlotStatus {
    #[default]
    Available,
    Limited {
        remaining: u32,
    },
    Booked,
}

impl SlotStatus {
    /// Converts the wire vocabulary. `waiting` is the older name for `limited`;
    /// a limited slot without a count is taken to have one place left.
    pub fn from_wire(status: &str, count: Option<u32>) -> Result<Self, SlotSyncError> {
        match status.trim().to_ascii_lowercase().as_str() {
            "available" => Ok(SlotStatus::Available),
            "limited" | "waiting" => Ok(SlotStatus::Limited {
                remaining: count.unwrap_or(1),
            }),
            "booked" => Ok(SlotStatus::Booked),
            other => Err(SlotSyncError::ParseError(format!(
                "unknown slot status '{}'",
                other
            ))),
        }
    }

    pub fn wire_name(&self) -> &'static str {
        match self {
            SlotStatus::Available => "available",
            SlotStatus::Limited { .. } => "limited",
            SlotStatus::Booked => "booked",
        }
    }

    pub fn to_wire(&self) -> WireSlot {
        WireSlot {
            status: self.wire_name().to_string(),
            count: match self {
                SlotStatus::Limited { remaining } => Some(*remaining),
                _ => None,
            },
        }
    }

    /// Higher is more open: `Booked` < `Limited` < `Available`.
    pub fn openness(&self) -> u8 {
        match self {
            SlotStatus::Booked => 0,
            SlotStatus::Limited { .. } => 1,
            SlotStatus::Available => 2,
        }
    }

    pub fn is_bookable(&self) -> bool {
        !matches!(self, SlotStatus::Booked)
    }
}

/// Slot status as it appears in pull responses and push frames.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireSlot {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
}

/// A total map from every `TimeSlot` to its `SlotStatus`.
///
/// Slots the server did not mention are `Available`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Availability {
    slots: BTreeMap<TimeSlot, SlotStatus>,
}

impl Default for Availability {
    fn default() -> Self {
        Self {
            slots: TimeSlot::ALL
                .into_iter()
                .map(|slot| (slot, SlotStatus::Available))
                .collect(),
        }
    }
}

impl Availability {
    /// Every slot available.
    pub fn all_available() -> Self {
        Self::default()
    }

    /// Builds a total map from a possibly partial set of statuses.
    pub fn from_statuses<I>(statuses: I) -> Self
    where
        I: IntoIterator<Item = (TimeSlot, SlotStatus)>,
    {
        let mut availability = Self::default();
        for (slot, status) in statuses {
            availability.slots.insert(slot, status);
        }
        availability
    }

    pub fn status(&self, slot: TimeSlot) -> SlotStatus {
        self.slots.get(&slot).copied().unwrap_or_default()
    }

    pub fn set(&mut self, slot: TimeSlot, status: SlotStatus) {
        self.slots.insert(slot, status);
    }

    /// Iterates all slots in chronological order.
    pub fn iter(&self) -> impl Iterator<Item = (TimeSlot, SlotStatus)> + '_ {
        self.slots.iter().map(|(slot, status)| (*slot, *status))
    }

    /// Whether at least one slot is fully open.
    pub fn has_available(&self) -> bool {
        self.slots
            .values()
            .any(|status| matches!(status, SlotStatus::Available))
    }

    /// Converts a wire map. Unknown slot labels are skipped with a warning;
    /// an unknown status is an error because it would silently misreport a slot.
    pub fn from_wire(wire: HashMap<String, WireSlot>) -> Result<Self, SlotSyncError> {
        let mut availability = Self::default();
        for (label, slot_info) in wire {
            let slot = match label.parse::<TimeSlot>() {
                Ok(slot) => slot,
                Err(_) => {
                    warn!("Ignoring unknown time slot '{}' in availability payload", label);
                    continue;
                }
            };
            let status = SlotStatus::from_wire(&slot_info.status, slot_info.count)?;
            availability.slots.insert(slot, status);
        }
        Ok(availability)
    }

    pub fn to_wire(&self) -> BTreeMap<String, WireSlot> {
        self.iter()
            .map(|(slot, status)| (slot.label().to_string(), status.to_wire()))
            .collect()
    }
}

impl Serialize for Availability {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_wire().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Availability {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let wire = HashMap::<String, WireSlot>::deserialize(deserializer)?;
        Availability::from_wire(wire).map_err(serde::de::Error::custom)
    }
}
