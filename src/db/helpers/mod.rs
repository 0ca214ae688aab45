use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, NaiveTime, Utc};

use crate::db::models::RingOutcome;

pub fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("failed to parse {field}"))
}

pub fn parse_optional_datetime(
    value: Option<String>,
    field: &str,
) -> Result<Option<DateTime<Utc>>> {
    match value {
        Some(raw) => parse_datetime(&raw, field).map(Some),
        None => Ok(None),
    }
}

/// Stored alarm times are `HH:MM`; seconds are never persisted.
pub fn format_time_of_day(time: NaiveTime) -> String {
    time.format("%H:%M").to_string()
}

pub fn parse_time_of_day(value: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M")
        .with_context(|| format!("invalid time_of_day '{value}'"))
}

pub fn to_color(value: i64) -> Result<u32> {
    u32::try_from(value).map_err(|_| anyhow!("color_argb {value} is out of range"))
}

pub fn parse_outcome(value: &str) -> Result<RingOutcome> {
    match value {
        "Firing" => Ok(RingOutcome::Firing),
        "Dismissed" => Ok(RingOutcome::Dismissed),
        "Snoozed" => Ok(RingOutcome::Snoozed),
        "TimedOut" => Ok(RingOutcome::TimedOut),
        "Replaced" => Ok(RingOutcome::Replaced),
        "Interrupted" => Ok(RingOutcome::Interrupted),
        other => Err(anyhow!("unknown ring outcome {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_of_day_uses_hours_and_minutes() {
        let time = parse_time_of_day("07:30").expect("valid time");
        assert_eq!(format_time_of_day(time), "07:30");
        assert!(parse_time_of_day("24:00").is_err());
        assert!(parse_time_of_day("7h30").is_err());
    }

    #[test]
    fn outcome_round_trips_through_text() {
        for outcome in [
            RingOutcome::Firing,
            RingOutcome::Dismissed,
            RingOutcome::Snoozed,
            RingOutcome::TimedOut,
            RingOutcome::Replaced,
            RingOutcome::Interrupted,
        ] {
            assert_eq!(parse_outcome(outcome.as_str()).expect("known"), outcome);
        }
        assert!(parse_outcome("Exploded").is_err());
    }
}
