//! Upstream timestamp handling
//!
//! The API returns timestamps as "YYYY-MM-DD HH:MM:SS" in UK local time
//! rather than RFC 3339, so they have to be placed in Europe/London
//! before they mean anything.

use chrono::{DateTime, FixedOffset, LocalResult, NaiveDateTime, Offset, TimeDelta, TimeZone};
use chrono_tz::Europe::London;
use serde::{Deserialize, Deserializer};

use crate::error::ChaosError;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Parse an upstream timestamp as UK civil time.
///
/// A wall-clock time repeated by the autumn change resolves to the later
/// (GMT) instant. A wall-clock time skipped by the spring change is read
/// with the GMT offset in force just before the gap.
pub fn parse_upstream_timestamp(s: &str) -> Result<DateTime<FixedOffset>, ChaosError> {
    let naive = NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
        .map_err(|e| ChaosError::Decode(format!("invalid timestamp {s:?}: {e}")))?;

    let local = match London.from_local_datetime(&naive) {
        LocalResult::Single(t) => t,
        LocalResult::Ambiguous(_, latest) => latest,
        LocalResult::None => {
            let before = naive - TimeDelta::hours(1);
            let offset = London.offset_from_local_datetime(&before).earliest().ok_or_else(|| {
                ChaosError::Decode(format!("timestamp {s:?} does not exist in Europe/London"))
            })?;
            let utc = naive - TimeDelta::seconds(offset.fix().local_minus_utc().into());
            London.from_utc_datetime(&utc)
        }
    };

    Ok(local.fixed_offset())
}

/// Format an instant the way the API writes it.
pub fn format_upstream_timestamp(t: &DateTime<FixedOffset>) -> String {
    t.with_timezone(&London).format(TIMESTAMP_FORMAT).to_string()
}

pub(crate) fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<FixedOffset>, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    parse_upstream_timestamp(&s).map_err(serde::de::Error::custom)
}
