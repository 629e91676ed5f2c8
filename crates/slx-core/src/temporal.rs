//! # Ledger Dates — UTC-Only Wall-Clock Timestamps
//!
//! Defines `LedgerDateTime`, the single date/time type used in license
//! end dates, lease expirations, and transaction stamps. The wire format
//! is `YYYY-MM-DD HH:MM:SS`, interpreted as UTC, truncated to seconds.
//!
//! ## Invariant
//!
//! All participating organizations must agree on the byte representation
//! of a date, because dates appear in records that are compared across
//! partitions. Inputs that do not match the wire format exactly are
//! **rejected at construction** — there is no lenient fallback.

use chrono::{DateTime, Months, NaiveDateTime, Timelike, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::LedgerError;

/// Wire format shared by every date in the system.
const WIRE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A UTC wall-clock timestamp with seconds precision.
///
/// # Construction
///
/// - [`LedgerDateTime::parse()`] — from the `YYYY-MM-DD HH:MM:SS` wire
///   format, rejecting anything else.
/// - [`LedgerDateTime::from_utc()`] — from a `DateTime<Utc>`, truncating
///   sub-seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LedgerDateTime(DateTime<Utc>);

impl LedgerDateTime {
    /// Parse a date from the `YYYY-MM-DD HH:MM:SS` wire format.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidDate`] if the string does not match
    /// the format exactly.
    pub fn parse(s: &str) -> Result<Self, LedgerError> {
        let naive = NaiveDateTime::parse_from_str(s, WIRE_FORMAT).map_err(|e| {
            LedgerError::InvalidDate {
                value: s.to_string(),
                reason: e.to_string(),
            }
        })?;
        Ok(Self(naive.and_utc()))
    }

    /// Create a date from a `chrono::DateTime<Utc>`, truncating sub-seconds.
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(dt.with_nanosecond(0).unwrap_or(dt))
    }

    /// Access the inner `DateTime<Utc>`.
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// The same instant advanced by `years` calendar years.
    ///
    /// Used to compute a lease expiration from an order's duration.
    /// Saturates at the representable maximum rather than wrapping.
    pub fn plus_years(&self, years: u32) -> Self {
        let advanced = self
            .0
            .checked_add_months(Months::new(years * 12))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self::from_utc(advanced)
    }

    /// Render in the `YYYY-MM-DD HH:MM:SS` wire format.
    pub fn to_wire(&self) -> String {
        self.0.format(WIRE_FORMAT).to_string()
    }
}

impl std::fmt::Display for LedgerDateTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_wire())
    }
}

// Serialize as the wire string so records stay readable and every
// organization sees one canonical byte representation.
impl Serialize for LedgerDateTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_wire())
    }
}

impl<'de> Deserialize<'de> for LedgerDateTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}
