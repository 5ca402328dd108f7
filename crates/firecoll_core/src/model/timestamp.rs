//! UTC timestamp with a canonical, order-preserving string form.
//!
//! # Invariants
//! - Precision is truncated to microseconds, matching the hosted store.
//! - Serialized form is `YYYY-MM-DDTHH:MM:SS.ffffffZ`, always 27 chars.

use chrono::{DateTime, SubsecRound, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{Display, Formatter};

const CANONICAL_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Current wall-clock time, truncated to microseconds.
    pub fn now() -> Self {
        Self::from_datetime(Utc::now())
    }

    pub fn from_datetime(value: DateTime<Utc>) -> Self {
        Self(value.trunc_subsecs(6))
    }

    /// Builds a timestamp from unix epoch milliseconds.
    ///
    /// Returns `None` when the value is outside chrono's supported range.
    pub fn from_unix_millis(millis: i64) -> Option<Self> {
        DateTime::<Utc>::from_timestamp_millis(millis).map(Self::from_datetime)
    }

    /// Parses any RFC 3339 string, normalizing the offset to UTC.
    pub fn parse(value: &str) -> Result<Self, chrono::ParseError> {
        let parsed = DateTime::parse_from_rfc3339(value.trim())?;
        Ok(Self::from_datetime(parsed.with_timezone(&Utc)))
    }

    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    pub fn unix_millis(&self) -> i64 {
        self.0.timestamp_millis()
    }

    pub fn to_canonical_string(&self) -> String {
        self.0.format(CANONICAL_FORMAT).to_string()
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(value: DateTime<Utc>) -> Self {
        Self::from_datetime(value)
    }
}

impl Display for Timestamp {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_canonical_string())
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_canonical_string())
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(|err| D::Error::custom(format!("invalid timestamp `{raw}`: {err}")))
    }
}

#[cfg(test)]
mod tests {
    use super::Timestamp;

    #[test]
    fn canonical_form_is_fixed_width_utc() {
        let ts = Timestamp::parse("2024-03-01T10:15:30+02:00").expect("valid rfc3339");
        assert_eq!(ts.to_canonical_string(), "2024-03-01T08:15:30.000000Z");

        let precise = Timestamp::parse("2024-03-01T08:15:30.123456789Z").expect("valid rfc3339");
        assert_eq!(precise.to_canonical_string(), "2024-03-01T08:15:30.123456Z");
    }

    #[test]
    fn lexical_order_matches_chronological_order() {
        let earlier = Timestamp::parse("2024-03-01T08:15:30Z").unwrap();
        let later = Timestamp::parse("2024-03-01T08:15:30.5Z").unwrap();
        assert!(earlier < later);
        assert!(earlier.to_canonical_string() < later.to_canonical_string());
    }

    #[test]
    fn now_has_microsecond_precision() {
        let now = Timestamp::now();
        assert_eq!(now.as_datetime().timestamp_subsec_nanos() % 1_000, 0);
    }

    #[test]
    fn deserialize_rejects_garbage() {
        let err = serde_json::from_value::<Timestamp>(serde_json::json!("yesterday")).unwrap_err();
        assert!(err.to_string().contains("invalid timestamp"));
    }

    #[test]
    fn unix_millis_roundtrip() {
        let ts = Timestamp::from_unix_millis(1_700_000_000_123).expect("in range");
        assert_eq!(ts.unix_millis(), 1_700_000_000_123);
    }
}
