//! CHAOS broadband records and response envelopes

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Deserializer};

/// Information about a broadband line.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BroadbandInfo {
    #[serde(deserialize_with = "number")]
    pub id: u64,
    #[serde(default)]
    pub login: String,
    #[serde(default)]
    pub postcode: String,
    /// Transmit rate in bits per second
    #[serde(deserialize_with = "number")]
    pub tx_rate: i64,
    /// Receive rate in bits per second
    #[serde(deserialize_with = "number")]
    pub rx_rate: i64,
    #[serde(deserialize_with = "number")]
    pub tx_rate_adjusted: i64,
    /// Monthly allowance in bytes
    #[serde(deserialize_with = "number")]
    pub quota_monthly: i64,
    /// Allowance left this month in bytes
    #[serde(deserialize_with = "number")]
    pub quota_remaining: i64,
    #[serde(deserialize_with = "crate::time::deserialize")]
    pub quota_timestamp: DateTime<FixedOffset>,
}

/// Quota for a broadband line.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BroadbandQuota {
    #[serde(deserialize_with = "number")]
    pub id: u64,
    #[serde(deserialize_with = "number")]
    pub quota_monthly: i64,
    #[serde(deserialize_with = "number")]
    pub quota_remaining: i64,
    #[serde(deserialize_with = "crate::time::deserialize")]
    pub quota_timestamp: DateTime<FixedOffset>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct InfoResponse {
    #[serde(default)]
    pub info: Vec<BroadbandInfo>,
    #[serde(default)]
    pub error: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct QuotaResponse {
    #[serde(default)]
    pub quota: Vec<BroadbandQuota>,
    #[serde(default)]
    pub error: String,
}

/// Only the error field, for bodies that came back with a bad status.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorResponse {
    #[serde(default)]
    pub error: String,
}

/// Response envelopes that carry a data array plus an error string.
pub(crate) trait Envelope: for<'de> Deserialize<'de> {
    type Item;

    fn into_parts(self) -> (Vec<Self::Item>, String);
}

impl Envelope for InfoResponse {
    type Item = BroadbandInfo;

    fn into_parts(self) -> (Vec<BroadbandInfo>, String) {
        (self.info, self.error)
    }
}

impl Envelope for QuotaResponse {
    type Item = BroadbandQuota;

    fn into_parts(self) -> (Vec<BroadbandQuota>, String) {
        (self.quota, self.error)
    }
}

/// The API is inconsistent about quoting numbers, so take either form.
fn number<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: std::str::FromStr + TryFrom<i64> + TryFrom<u64>,
    <T as std::str::FromStr>::Err: std::fmt::Display,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Unsigned(u64),
        Signed(i64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Unsigned(n) => <T as TryFrom<u64>>::try_from(n)
            .map_err(|_| serde::de::Error::custom(format!("number {n} out of range"))),
        Raw::Signed(n) => <T as TryFrom<i64>>::try_from(n)
            .map_err(|_| serde::de::Error::custom(format!("number {n} out of range"))),
        Raw::Text(s) => s
            .trim()
            .parse()
            .map_err(|e| serde::de::Error::custom(format!("invalid number {s:?}: {e}"))),
    }
}
