//! Parsing of operator-supplied publish times
//!
//! Accepted forms, tried in order:
//! - RFC 3339 timestamps: "2026-11-20T15:00:00Z"
//! - `random:MIN-MAX` spread after the previous scheduled slot: "random:10m-20m"
//! - relative durations: "30m", "2h", "1 day"
//! - natural language: "tomorrow", "next monday 10am"

use chrono::{DateTime, Duration, Utc};
use rand::Rng;

use crate::error::{Result, SkedcastError};

const RANDOM_FLOOR_SECS: i64 = 30;
const RANDOM_CEILING_SECS: i64 = 30 * 24 * 3600;

/// Parse a schedule string relative to `now`
///
/// `last_scheduled` anchors `random:` ranges so a batch of posts spreads out
/// after the latest slot already taken.
pub fn parse_schedule(input: &str, last_scheduled: Option<i64>) -> Result<DateTime<Utc>> {
    parse_schedule_at(input, last_scheduled, Utc::now())
}

pub fn parse_schedule_at(
    input: &str,
    last_scheduled: Option<i64>,
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>> {
    let input = input.trim();
    if input.is_empty() {
        return Err(invalid("Schedule string cannot be empty".to_string()));
    }

    if let Ok(at) = DateTime::parse_from_rfc3339(input) {
        return Ok(at.with_timezone(&Utc));
    }

    if let Some(range) = input.strip_prefix("random:") {
        let anchor = last_scheduled
            .and_then(|ts| DateTime::from_timestamp(ts, 0))
            .filter(|anchor| *anchor > now)
            .unwrap_or(now);
        return Ok(anchor + random_offset(range)?);
    }

    if let Some(offset) = parse_offset(input) {
        return Ok(now + offset);
    }

    chrono_english::parse_date_string(input, now, chrono_english::Dialect::Us)
        .map_err(|_| invalid(format!("Could not parse schedule string: {}", input)))
}

fn parse_offset(input: &str) -> Option<Duration> {
    let std_duration = humantime::parse_duration(input).ok()?;
    Duration::try_seconds(i64::try_from(std_duration.as_secs()).ok()?)
}

fn random_offset(range: &str) -> Result<Duration> {
    let (min, max) = range
        .split_once('-')
        .ok_or_else(|| invalid("Random format must be random:MIN-MAX".to_string()))?;
    let min = parse_offset(min.trim())
        .ok_or_else(|| invalid(format!("Could not parse duration: {}", min)))?;
    let max = parse_offset(max.trim())
        .ok_or_else(|| invalid(format!("Could not parse duration: {}", max)))?;

    let (min_secs, max_secs) = (min.num_seconds(), max.num_seconds());
    if min_secs < RANDOM_FLOOR_SECS {
        return Err(invalid(format!(
            "Minimum random interval must be at least {} seconds",
            RANDOM_FLOOR_SECS
        )));
    }
    if max_secs > RANDOM_CEILING_SECS {
        return Err(invalid(format!(
            "Maximum random interval must be at most {} days",
            RANDOM_CEILING_SECS / (24 * 3600)
        )));
    }
    if min_secs >= max_secs {
        return Err(invalid("Minimum must be less than maximum".to_string()));
    }

    let secs = rand::thread_rng().gen_range(min_secs..=max_secs);
    Ok(Duration::try_seconds(secs).unwrap_or(min))
}

fn invalid(message: String) -> SkedcastError {
    SkedcastError::InvalidInput(message)
}
