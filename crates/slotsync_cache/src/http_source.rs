// --- File: crates/slotsync_cache/src/http_source.rs ---
//! `AvailabilitySource` backed by the booking HTTP API.

use std::collections::{BTreeMap, HashMap};

use reqwest::Client;
use slotsync_common::{
    create_client, ensure_success, Availability, AvailabilitySource, BoxFuture, DateKey,
    SlotSyncError, WireSlot, HTTP_CLIENT,
};
use slotsync_config::ApiConfig;
use tracing::{debug, warn};

const SERVICE_NAME: &str = "booking-api";

pub struct HttpAvailabilitySource {
    client: Client,
    base_url: String,
}

impl HttpAvailabilitySource {
    /// Uses a client with the configured timeout, or the shared client if that cannot be built.
    pub fn from_config(config: &ApiConfig) -> Self {
        let client = create_client(config.timeout_secs, true).unwrap_or_else(|e| {
            warn!("Falling back to the shared HTTP client: {}", e);
            HTTP_CLIENT.clone()
        });
        Self::with_client(client, &config.base_url)
    }

    pub fn with_client(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn get_date(&self, date: DateKey) -> Result<Availability, SlotSyncError> {
        let url = format!("{}/availability", self.base_url);
        debug!("GET {} date={}", url, date);

        let response = self
            .client
            .get(&url)
            .query(&[("date", date.to_string())])
            .send()
            .await?;
        let response = ensure_success(SERVICE_NAME, response).await?;
        let wire: HashMap<String, WireSlot> = response.json().await?;
        Availability::from_wire(wire)
    }

    async fn post_bulk(
        &self,
        dates: Vec<DateKey>,
    ) -> Result<BTreeMap<DateKey, Availability>, SlotSyncError> {
        let url = format!("{}/bulk-availability", self.base_url);
        debug!("POST {} ({} dates)", url, dates.len());

        let response = self.client.post(&url).json(&dates).send().await?;
        let response = ensure_success(SERVICE_NAME, response).await?;
        let wire: HashMap<String, HashMap<String, WireSlot>> = response.json().await?;

        let mut result = BTreeMap::new();
        for (raw_date, slots) in wire {
            let date = match raw_date.parse::<DateKey>() {
                Ok(date) => date,
                Err(e) => {
                    warn!("Skipping bulk availability entry: {}", e);
                    continue;
                }
            };
            result.insert(date, Availability::from_wire(slots)?);
        }
        Ok(result)
    }
}

impl AvailabilitySource for HttpAvailabilitySource {
    fn fetch_date(&self, date: DateKey) -> BoxFuture<'_, Availability, SlotSyncError> {
        Box::pin(self.get_date(date))
    }

    fn fetch_bulk(
        &self,
        dates: Vec<DateKey>,
    ) -> BoxFuture<'_, BTreeMap<DateKey, Availability>, SlotSyncError> {
        Box::pin(self.post_bulk(dates))
    }
}
