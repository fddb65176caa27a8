//! Timestamp scale heuristic shared by the adapter and normalizer (§3
//! invariant 2): a value ≥ 10^12 is already epoch-milliseconds; anything
//! smaller (or fractional) is epoch-seconds and gets multiplied by 1000.

const MS_SCALE_THRESHOLD: f64 = 1e12;

/// Coerce a raw numeric timestamp (seconds or already-milliseconds, possibly
/// fractional) to an integer epoch-millisecond value.
pub fn to_epoch_ms(raw: f64) -> i64 {
    if raw >= MS_SCALE_THRESHOLD {
        raw.round() as i64
    } else {
        (raw * 1000.0).round() as i64
    }
}

/// Format a UTC epoch-ms timestamp as `YYYY-MM-DD HH:MM` in `tz`, falling
/// back to UTC (with the caller expected to have already warned) if `tz`
/// itself were somehow invalid — `chrono_tz::Tz` values are always valid by
/// construction, so this never actually falls back; it exists so the
/// renderer has one call site regardless of how the zone was resolved.
pub fn format_local(ts_ms: i64, tz: chrono_tz::Tz) -> String {
    use chrono::TimeZone;
    let utc = chrono::Utc.timestamp_millis_opt(ts_ms).single();
    match utc {
        Some(dt) => dt.with_timezone(&tz).format("%Y-%m-%d %H:%M").to_string(),
        None => String::new(),
    }
}

/// Resolve an IANA timezone identifier, falling back to UTC and returning
/// `false` (so the caller can log a warning) if the identifier is unknown.
pub fn resolve_timezone(id: &str) -> (chrono_tz::Tz, bool) {
    match id.parse::<chrono_tz::Tz>() {
        Ok(tz) => (tz, true),
        Err(_) => (chrono_tz::UTC, false),
    }
}
