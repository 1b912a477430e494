//! Turns the timestamps a profile page renders ("45m", "Jan 3", "Dec 31, 2023")
//! into absolute instants.
//!
//! Parsing fails open: anything unreadable becomes `now` with `defaulted = true`.
//! A mis-timed post is kept rather than dropped, at the cost of precision.
use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use tracing::warn;

use crate::domain::model::Interpreted;

/// Interprets a rendered timestamp relative to `now`. Month-day forms are read as
/// local midnight in `zone`.
pub fn interpret(raw: &str, now: DateTime<Utc>, zone: &Tz) -> Interpreted<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        warn!("Empty timestamp, defaulting to now");
        return Interpreted::fallback(now);
    }

    if let Some(at) = parse_relative(s, now) {
        return Interpreted::exact(at);
    }
    if let Ok(at) = DateTime::parse_from_rfc3339(s) {
        return Interpreted::exact(at.with_timezone(&Utc));
    }
    if let Some(at) = parse_month_day_year(s, zone) {
        return Interpreted::exact(at);
    }
    if let Some(at) = parse_month_day(s, now, zone) {
        return Interpreted::exact(at);
    }

    warn!(raw = s, "Unparseable timestamp, defaulting to now");
    Interpreted::fallback(now)
}

/// True iff `at` is no more than `window_minutes` before `now`.
pub fn is_within_window(at: DateTime<Utc>, window_minutes: i64, now: DateTime<Utc>) -> bool {
    now.signed_duration_since(at) <= Duration::minutes(window_minutes)
}

fn parse_relative(s: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let unit = s.chars().last()?;
    let amount: u32 = s[..s.len() - unit.len_utf8()].parse().ok()?;
    let amount = i64::from(amount);
    let offset = match unit {
        's' => Duration::seconds(amount),
        'm' => Duration::minutes(amount),
        'h' => Duration::hours(amount),
        _ => return None,
    };
    now.checked_sub_signed(offset)
}

fn parse_month_day_year(s: &str, zone: &Tz) -> Option<DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(s, "%b %d, %Y").ok()?;
    local_midnight(date, zone)
}

fn parse_month_day(s: &str, now: DateTime<Utc>, zone: &Tz) -> Option<DateTime<Utc>> {
    let year = now.with_timezone(zone).year();
    let date = NaiveDate::parse_from_str(&format!("{s} {year}"), "%b %d %Y").ok()?;
    let at = local_midnight(date, zone)?;
    if at <= now {
        return Some(at);
    }
    // Rendered without a year but in the future: it belongs to last year.
    local_midnight(date.with_year(year - 1)?, zone)
}

fn local_midnight(date: NaiveDate, zone: &Tz) -> Option<DateTime<Utc>> {
    let naive = date.and_hms_opt(0, 0, 0)?;
    zone.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}
