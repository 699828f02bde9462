//! Best-effort address resolution against a Nominatim-compatible service.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::BillscanError;
use crate::models::config::GeocoderConfig;
use crate::models::records::GeoPoint;

/// Resolves a free-text address to coordinates.
///
/// `None` is an expected answer, not a failure.
#[async_trait]
pub trait AddressResolver: Send + Sync {
    async fn geocode(&self, address: &str) -> Option<GeoPoint>;
}

/// Nominatim search client.
pub struct NominatimGeocoder {
    client: Client,
    search_url: String,
}

impl NominatimGeocoder {
    pub fn new(config: &GeocoderConfig) -> Result<Self, BillscanError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self {
            client,
            search_url: config.search_url.clone(),
        })
    }

    async fn search(&self, address: &str) -> Result<Vec<Place>, reqwest::Error> {
        self.client
            .get(&self.search_url)
            .query(&[("q", address), ("format", "json"), ("limit", "1")])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
    }
}

/// One search hit. Nominatim encodes coordinates as strings.
#[derive(Debug, Deserialize)]
struct Place {
    lat: String,
    lon: String,
    #[serde(default)]
    display_name: String,
}

impl Place {
    fn into_point(self) -> Option<GeoPoint> {
        Some(GeoPoint {
            latitude: self.lat.trim().parse().ok()?,
            longitude: self.lon.trim().parse().ok()?,
            display_name: self.display_name,
        })
    }
}

#[async_trait]
impl AddressResolver for NominatimGeocoder {
    async fn geocode(&self, address: &str) -> Option<GeoPoint> {
        let address = address.trim();
        if address.is_empty() {
            return None;
        }

        let places = match self.search(address).await {
            Ok(places) => places,
            Err(e) => {
                warn!("Geocoding failed for {:?}: {}", address, e);
                return None;
            }
        };

        let point = places.into_iter().next().and_then(Place::into_point);
        match &point {
            Some(p) => debug!("Geocoded {:?} to ({}, {})", address, p.latitude, p.longitude),
            None => warn!("No usable geocoding result for {:?}", address),
        }
        point
    }
}
