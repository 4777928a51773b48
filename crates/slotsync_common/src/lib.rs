// --- File: crates/slotsync_common/src/lib.rs ---

// Declare modules within this crate
pub mod models;    // Dates, slots and availability maps
pub mod error;     // Error handling
pub mod http;      // HTTP utilities
pub mod services;  // Service abstractions
pub mod logging;   // Logging utilities

// Re-export error types and utilities for easier access
pub use error::{
    SlotSyncError,
    config_error,
    validation_error,
    protocol_error,
    conflict,
    external_service_error,
    internal_error,
};

pub use models::{Availability, DateKey, SlotStatus, TimeSlot, WireSlot};
pub use services::{AvailabilitySource, BoxFuture};

// Re-export HTTP utilities for easier access
pub use http::{
    ensure_success,
    client::{HTTP_CLIENT, create_client},
};
