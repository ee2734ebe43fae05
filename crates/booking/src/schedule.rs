//! Booking schedule parsing.
//!
//! Accepts either a full RFC 3339 timestamp in `date`, or a calendar date
//! (`YYYY-MM-DD`) plus an optional wall-clock `time` (`HH:MM`) interpreted
//! as UTC. The result is always stored as RFC 3339 in UTC.

use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset};

use crate::error::BookingError;

pub fn parse_schedule(date: &str, time: Option<&str>) -> Result<OffsetDateTime, BookingError> {
    let date = date.trim();
    let time = time.map(str::trim).filter(|t| !t.is_empty());
    if date.is_empty() {
        return Err(BookingError::Validation("date is required".to_string()));
    }

    if let Ok(at) = OffsetDateTime::parse(date, &Rfc3339) {
        if time.is_some() {
            return Err(BookingError::Validation(
                "time must not be given with a full timestamp".to_string(),
            ));
        }
        return Ok(at.to_offset(UtcOffset::UTC));
    }

    let day = Date::parse(date, format_description!("[year]-[month]-[day]")).map_err(|e| {
        BookingError::Validation(format!("invalid date '{}': {}", date, e))
    })?;
    let clock = match time {
        Some(t) => Time::parse(t, format_description!("[hour]:[minute]"))
            .map_err(|e| BookingError::Validation(format!("invalid time '{}': {}", t, e)))?,
        None => Time::MIDNIGHT,
    };
    Ok(PrimitiveDateTime::new(day, clock).assume_utc())
}

/// RFC 3339 rendering used for `bookings.scheduled_at`.
pub fn format_schedule(at: OffsetDateTime) -> Result<String, BookingError> {
    at.format(&Rfc3339)
        .map_err(|e| BookingError::Validation(format!("unrepresentable schedule: {}", e)))
}
