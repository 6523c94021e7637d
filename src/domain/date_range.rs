//! Validated date ranges for provider queries.
//!
//! The provider rejects ranges wider than its lookback ceiling (90 days by
//! default) and ranges reaching into the future, so a `DateRange` can only
//! be constructed through validation. Holding a `DateRange` value is proof
//! that no `Validation` error can occur later in the call chain.

use chrono::{Duration, NaiveDate, Utc};

use crate::domain::errors::SyncError;

/// Wire format for dates exchanged with the provider.
pub const WIRE_DATE_FORMAT: &str = "%d/%m/%Y";

/// Wire format for provider timestamps (chargeback lifecycle dates).
pub const WIRE_DATETIME_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

/// An inclusive calendar date range, validated on construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    from: NaiveDate,
    to: NaiveDate,
}

impl DateRange {
    /// Builds a range after checking `from <= to <= today` and that the
    /// span does not exceed `max_lookback_days`.
    pub fn new(from: NaiveDate, to: NaiveDate, max_lookback_days: i64) -> Result<Self, SyncError> {
        if from > to {
            return Err(SyncError::Validation(format!(
                "date from {} is after date to {}",
                from, to
            )));
        }

        let today = Utc::now().date_naive();
        if to > today {
            return Err(SyncError::Validation(format!(
                "date to {} is in the future",
                to
            )));
        }

        let span = (to - from).num_days();
        if span > max_lookback_days {
            return Err(SyncError::Validation(format!(
                "range of {} days exceeds the provider limit of {} days",
                span, max_lookback_days
            )));
        }

        Ok(Self { from, to })
    }

    /// Range covering the last `days_back` days up to today.
    pub fn lookback(days_back: u32, max_lookback_days: i64) -> Result<Self, SyncError> {
        let to = Utc::now().date_naive();
        let from = to - Duration::days(days_back as i64);
        Self::new(from, to, max_lookback_days)
    }

    pub fn from(&self) -> NaiveDate {
        self.from
    }

    pub fn to(&self) -> NaiveDate {
        self.to
    }

    /// `from` bound rendered in the provider's dd/MM/yyyy wire format.
    pub fn from_wire(&self) -> String {
        self.from.format(WIRE_DATE_FORMAT).to_string()
    }

    /// `to` bound rendered in the provider's dd/MM/yyyy wire format.
    pub fn to_wire(&self) -> String {
        self.to.format(WIRE_DATE_FORMAT).to_string()
    }
}

impl std::fmt::Display for DateRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} to {}", self.from, self.to)
    }
}

/// Serde helpers for optional dates in the provider's dd/MM/yyyy format.
pub mod wire_date {
    use chrono::NaiveDate;
    use serde::{self, Deserialize, Deserializer, Serializer};

    use super::WIRE_DATE_FORMAT;

    pub fn serialize<S>(date: &Option<NaiveDate>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match date {
            Some(d) => serializer.serialize_str(&d.format(WIRE_DATE_FORMAT).to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        match raw {
            Some(s) if !s.is_empty() => NaiveDate::parse_from_str(&s, WIRE_DATE_FORMAT)
                .map(Some)
                .map_err(serde::de::Error::custom),
            _ => Ok(None),
        }
    }
}

/// Serde helpers for optional timestamps in dd/MM/yyyy HH:mm:ss format.
pub mod wire_datetime {
    use chrono::NaiveDateTime;
    use serde::{self, Deserialize, Deserializer, Serializer};

    use super::WIRE_DATETIME_FORMAT;

    pub fn serialize<S>(dt: &Option<NaiveDateTime>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match dt {
            Some(d) => serializer.serialize_str(&d.format(WIRE_DATETIME_FORMAT).to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        match raw {
            Some(s) if !s.is_empty() => NaiveDateTime::parse_from_str(&s, WIRE_DATETIME_FORMAT)
                .map(Some)
                .map_err(serde::de::Error::custom),
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_valid_range_is_accepted() {
        let range = DateRange::new(date(2025, 1, 1), date(2025, 1, 7), 90).unwrap();
        assert_eq!(range.from(), date(2025, 1, 1));
        assert_eq!(range.to(), date(2025, 1, 7));
    }

    #[test]
    fn test_inverted_range_is_rejected() {
        let err = DateRange::new(date(2025, 1, 7), date(2025, 1, 1), 90).unwrap_err();
        assert!(matches!(err, SyncError::Validation(_)));
    }

    #[test]
    fn test_future_range_is_rejected() {
        let to = Utc::now().date_naive() + Duration::days(1);
        let err = DateRange::new(to - Duration::days(3), to, 90).unwrap_err();
        assert!(matches!(err, SyncError::Validation(_)));
    }

    #[test]
    fn test_range_over_ceiling_is_rejected() {
        let err = DateRange::new(date(2025, 1, 1), date(2025, 6, 1), 90).unwrap_err();
        assert!(matches!(err, SyncError::Validation(_)));
        assert!(err.to_string().contains("90"));
    }

    #[test]
    fn test_range_at_ceiling_is_accepted() {
        assert!(DateRange::new(date(2025, 1, 1), date(2025, 4, 1), 90).is_ok());
    }

    #[test]
    fn test_lookback_spans_requested_days() {
        let range = DateRange::lookback(7, 90).unwrap();
        assert_eq!((range.to() - range.from()).num_days(), 7);
        assert_eq!(range.to(), Utc::now().date_naive());
    }

    #[test]
    fn test_wire_format_is_day_first() {
        let range = DateRange::new(date(2025, 1, 2), date(2025, 1, 7), 90).unwrap();
        assert_eq!(range.from_wire(), "02/01/2025");
        assert_eq!(range.to_wire(), "07/01/2025");
    }
}
