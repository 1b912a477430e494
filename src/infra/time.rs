use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::Tz;

pub fn from_epoch_ms(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// Human-readable rendering for log lines.
pub fn format_epoch_ms(ms: i64, zone: &Tz) -> String {
    from_epoch_ms(ms)
        .with_timezone(zone)
        .format("%Y-%m-%d %H:%M:%S%.3f %Z")
        .to_string()
}

/// RFC 3339 rendering in `zone`, used for the `*_text` columns.
pub fn epoch_ms_to_iso(ms: i64, zone: &Tz) -> String {
    from_epoch_ms(ms).with_timezone(zone).to_rfc3339()
}
