// --- File: crates/slotsync_common/src/http.rs ---
use reqwest::Response;

use crate::error::{external_service_error, SlotSyncError};

// Include the client module
pub mod client;

/// Turns a non-success HTTP response into an `ExternalServiceError` that names the
/// service and carries the status plus the (truncated) body.
pub async fn ensure_success(service_name: &str, response: Response) -> Result<Response, SlotSyncError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body: String = response
        .text()
        .await
        .unwrap_or_default()
        .chars()
        .take(256)
        .collect();
    Err(external_service_error(
        service_name,
        format!("status {}: {}", status.as_u16(), body),
    ))
}
