//! Serde helpers for timestamps sent as Unix epoch milliseconds.
//!
//! Reading accepts epoch milliseconds (integer or float) as well as an
//! RFC 1123 date string. Writing always produces the RFC 1123 form, e.g.
//! `"Sun, 06 Nov 1994 08:49:37 GMT"`.
//!
//! ```
//! use chrono::{DateTime, Utc};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize)]
//! struct Upload {
//!     #[serde(with = "courier_net::json::epoch")]
//!     created: DateTime<Utc>,
//! }
//!
//! let upload: Upload = serde_json::from_str(r#"{"created":784111777000}"#).unwrap();
//! assert_eq!(
//!     serde_json::to_string(&upload).unwrap(),
//!     r#"{"created":"Sun, 06 Nov 1994 08:49:37 GMT"}"#
//! );
//! ```

use std::fmt;

use chrono::{DateTime, TimeZone, Utc};
use serde::de::{self, Visitor};
use serde::{Deserializer, Serializer};

const RFC1123: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Format a timestamp the way it is written to JSON.
pub fn format(value: &DateTime<Utc>) -> String {
    value.format(RFC1123).to_string()
}

/// Serialize a timestamp as an RFC 1123 string.
pub fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format(value))
}

/// Deserialize a timestamp from epoch milliseconds or an RFC 1123 string.
pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    deserializer.deserialize_any(EpochVisitor)
}

struct EpochVisitor;

impl EpochVisitor {
    fn from_millis<E: de::Error>(millis: i64) -> Result<DateTime<Utc>, E> {
        Utc.timestamp_millis_opt(millis)
            .single()
            .ok_or_else(|| E::custom(format_args!("epoch milliseconds out of range: {millis}")))
    }
}

impl<'de> Visitor<'de> for EpochVisitor {
    type Value = DateTime<Utc>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("epoch milliseconds or an RFC 1123 date string")
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<Self::Value, E> {
        Self::from_millis(value)
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<Self::Value, E> {
        let millis = i64::try_from(value).map_err(|_| E::custom("epoch milliseconds out of range"))?;
        Self::from_millis(millis)
    }

    fn visit_f64<E: de::Error>(self, value: f64) -> Result<Self::Value, E> {
        if !value.is_finite() {
            return Err(E::custom("epoch milliseconds must be finite"));
        }
        Self::from_millis(value.trunc() as i64)
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<Self::Value, E> {
        DateTime::parse_from_rfc2822(value)
            .map(|date| date.with_timezone(&Utc))
            .map_err(E::custom)
    }
}
