//! One-way latency from the send time embedded in v2 frames.
//!
//! Handheld and station clocks are not synchronised. Skew shows up as a
//! large or negative latency and is reported as-is.

use std::fmt;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LatencyError {
    #[error("invalid send date {year:04}-{month:02}-{day:02}")]
    InvalidDate { year: u16, month: u8, day: u8 },
}

/// Midnight UTC of the given date plus `seconds_of_day`.
pub fn send_instant(
    year: u16,
    month: u8,
    day: u8,
    seconds_of_day: u32,
) -> Result<DateTime<Utc>, LatencyError> {
    let midnight = NaiveDate::from_ymd_opt(year as i32, month as u32, day as u32)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .ok_or(LatencyError::InvalidDate { year, month, day })?;
    Ok(midnight.and_utc() + Duration::seconds(seconds_of_day as i64))
}

/// Receive minus send, in milliseconds rounded to two decimals.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Latency(f64);

impl Latency {
    pub fn between(sent: DateTime<Utc>, received: DateTime<Utc>) -> Self {
        let delta = received.signed_duration_since(sent);
        let ms = match delta.num_microseconds() {
            Some(us) => us as f64 / 1_000.0,
            None => delta.num_milliseconds() as f64,
        };
        Latency((ms * 100.0).round() / 100.0)
    }

    pub fn as_millis(&self) -> f64 {
        self.0
    }
}

impl fmt::Display for Latency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2} ms", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_send_instant_adds_offset_to_midnight() {
        let sent = send_instant(2025, 3, 14, 3_600 + 61).unwrap();
        assert_eq!(sent, Utc.with_ymd_and_hms(2025, 3, 14, 1, 1, 1).unwrap());
    }

    #[test]
    fn test_offset_past_midnight_rolls_over() {
        let sent = send_instant(2024, 12, 31, 86_400 + 5).unwrap();
        assert_eq!(sent, Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 5).unwrap());
    }

    #[test]
    fn test_invalid_date() {
        assert_eq!(
            send_instant(2025, 2, 30, 0),
            Err(LatencyError::InvalidDate {
                year: 2025,
                month: 2,
                day: 30
            })
        );
        assert!(send_instant(2025, 13, 1, 0).is_err());
        assert!(send_instant(2025, 0, 1, 0).is_err());
    }

    #[test]
    fn test_latency_rounding_and_display() {
        let sent = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let received = sent + Duration::microseconds(1_234_567);
        let latency = Latency::between(sent, received);
        assert_eq!(latency.as_millis(), 1234.57);
        assert_eq!(latency.to_string(), "1234.57 ms");
    }

    #[test]
    fn test_latency_across_adjacent_days_is_non_negative() {
        let sent = send_instant(2025, 6, 1, 86_399).unwrap();
        let received = Utc.with_ymd_and_hms(2025, 6, 2, 0, 0, 1).unwrap();
        assert_eq!(Latency::between(sent, received).as_millis(), 2000.0);
    }

    #[test]
    fn test_clock_skew_is_not_clamped() {
        let received = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let sent = received + Duration::seconds(3);
        let latency = Latency::between(sent, received);
        assert_eq!(latency.as_millis(), -3000.0);
        assert_eq!(latency.to_string(), "-3000.00 ms");
    }
}
