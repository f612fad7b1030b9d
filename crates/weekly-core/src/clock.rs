//! Timezone-aware scheduling utilities: week boundaries, send-time checks.
//!
//! Grounded on `original_source/app/services/digest_time.py`, generalized
//! from Python's `pytz` to `chrono-tz`.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, TimeZone, Timelike, Utc};
use std::str::FromStr;
use tracing::warn;

/// Resolves an IANA timezone name, falling back to UTC on anything invalid
/// or unknown and logging a warning, per §4.1.
pub fn resolve_timezone(timezone: &str) -> chrono_tz::Tz {
    match chrono_tz::Tz::from_str(timezone) {
        Ok(tz) => tz,
        Err(_) => {
            warn!(timezone, "unknown or invalid timezone, falling back to UTC");
            chrono_tz::UTC
        }
    }
}

/// Returns the date of the most recent occurrence of `week_start_day` at
/// local 00:00:00 on or before `local_dt`.
pub fn week_start(local_dt: NaiveDateTime, week_start_day: u32) -> NaiveDate {
    let today = local_dt.date();
    let weekday = today.weekday().num_days_from_monday();
    let delta = (weekday + 7 - week_start_day.min(6)) % 7;
    today - Duration::days(delta as i64)
}

/// True iff, converting `now_utc` to the user's local time, the local
/// weekday and hour match `preferred_day`/`preferred_hour` and digests are
/// enabled. `preferred_day` is 0=Monday..6=Sunday.
pub fn should_send_now(
    timezone: &str,
    preferred_day: u32,
    preferred_hour: u32,
    now_utc: DateTime<Utc>,
    weekly_digest_enabled: bool,
) -> bool {
    if !weekly_digest_enabled {
        return false;
    }
    let tz = resolve_timezone(timezone);
    let local = now_utc.with_timezone(&tz);
    local.weekday().num_days_from_monday() == preferred_day.min(6) && local.hour() == preferred_hour.min(23)
}

/// Inclusive-start, exclusive-end week boundaries, in UTC, for the
/// previous completed local week and the current (in-progress) local week.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeekBoundaries {
    pub prev_week_start_utc: DateTime<Utc>,
    pub prev_week_end_utc: DateTime<Utc>,
    pub current_week_start_utc: DateTime<Utc>,
    pub current_week_end_utc: DateTime<Utc>,
}

pub fn week_boundaries(now_utc: DateTime<Utc>, timezone: &str, week_start_day: u32) -> WeekBoundaries {
    let tz = resolve_timezone(timezone);
    let local_now = now_utc.with_timezone(&tz);
    let current_start_date = week_start(local_now.naive_local(), week_start_day);
    let current_start_local = tz
        .from_local_datetime(&current_start_date.and_hms_opt(0, 0, 0).unwrap())
        .single()
        .unwrap_or_else(|| tz.from_utc_datetime(&current_start_date.and_hms_opt(0, 0, 0).unwrap()));
    let current_end_local = current_start_local + Duration::days(7);
    let prev_start_local = current_start_local - Duration::days(7);
    let prev_end_local = current_start_local;

    WeekBoundaries {
        prev_week_start_utc: prev_start_local.with_timezone(&Utc),
        prev_week_end_utc: prev_end_local.with_timezone(&Utc),
        current_week_start_utc: current_start_local.with_timezone(&Utc),
        current_week_end_utc: current_end_local.with_timezone(&Utc),
    }
}

/// Offset in whole hours east of UTC for `timezone` at `now_utc`; 0 on
/// invalid timezone. Diagnostic only, not used for scheduling decisions.
pub fn get_user_timezone_offset(timezone: &str, now_utc: DateTime<Utc>) -> i32 {
    let tz = resolve_timezone(timezone);
    let local = now_utc.with_timezone(&tz);
    local.offset().fix().local_minus_utc() / 3600
}

/// True iff it is Saturday or Sunday in the user's local time.
pub fn is_weekend(now_utc: DateTime<Utc>, timezone: &str) -> bool {
    let tz = resolve_timezone(timezone);
    let local = now_utc.with_timezone(&tz);
    matches!(local.weekday(), chrono::Weekday::Sat | chrono::Weekday::Sun)
}
