//! `GeoLookup` backed by an ipapi.co-compatible JSON endpoint.
//!
//! `GET {base}/json/` locates the requester, `GET {base}/{ip}/json/` a given
//! address. Error replies carry `{"error": true, "reason": ...}` with a 200.

use std::net::IpAddr;
use std::time::Duration;

use serde::Deserialize;
use stockcoach_core::timezone::{GeoLocation, GeoLookup};
use stockcoach_types::error::GeoError;
use tracing::debug;

const LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
struct IpApiRecord {
    #[serde(default)]
    error: bool,
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    timezone: Option<String>,
    #[serde(default)]
    utc_offset: Option<String>,
    #[serde(default)]
    country_code: Option<String>,
}

impl IpApiRecord {
    fn into_location(self) -> Result<GeoLocation, GeoError> {
        if self.error {
            return Err(GeoError::InvalidRecord(
                self.reason.unwrap_or_else(|| "error reply".to_string()),
            ));
        }
        match (self.timezone, self.utc_offset) {
            (Some(timezone), Some(utc_offset)) if !timezone.is_empty() => Ok(GeoLocation {
                timezone,
                utc_offset,
                country_code: self.country_code,
            }),
            _ => Err(GeoError::InvalidRecord(
                "missing timezone or utc_offset".to_string(),
            )),
        }
    }
}

pub struct IpApiLookup {
    client: reqwest::Client,
    base_url: String,
}

impl IpApiLookup {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(concat!("stockcoach/", env!("CARGO_PKG_VERSION")))
            .timeout(LOOKUP_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url_for(&self, ip: Option<IpAddr>) -> String {
        match ip {
            // Loopback/private callers resolve as "the server itself".
            Some(ip) if is_public(&ip) => format!("{}/{ip}/json/", self.base_url),
            _ => format!("{}/json/", self.base_url),
        }
    }
}

fn is_public(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            !(v4.is_loopback() || v4.is_private() || v4.is_link_local() || v4.is_unspecified())
        }
        IpAddr::V6(v6) => !(v6.is_loopback() || v6.is_unspecified()),
    }
}

impl GeoLookup for IpApiLookup {
    async fn lookup(&self, ip: Option<IpAddr>) -> Result<GeoLocation, GeoError> {
        let url = self.url_for(ip);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| GeoError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GeoError::Status(status.as_u16()));
        }

        let record: IpApiRecord = response
            .json()
            .await
            .map_err(|e| GeoError::InvalidRecord(e.to_string()))?;
        let location = record.into_location()?;
        debug!(
            timezone = %location.timezone,
            utc_offset = %location.utc_offset,
            "geo lookup succeeded"
        );
        Ok(location)
    }
}
