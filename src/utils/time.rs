/// Display and rounding helpers for market times
use chrono::{DateTime, NaiveDateTime, NaiveTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;

const FIVE_MINUTES_MS: i64 = 5 * 60 * 1000;

/// `9:30 AM` style label used on chart axes and tick callbacks
pub fn format_time_to_market_hours(time: NaiveDateTime) -> String {
    time.format("%-I:%M %p").to_string()
}

/// Round to the nearest five-minute mark; exact halves round up
pub fn round_to_nearest_five_minutes(instant: DateTime<Utc>) -> DateTime<Utc> {
    let ms = instant.timestamp_millis();
    let base = ms - ms.rem_euclid(FIVE_MINUTES_MS);
    let rounded = if ms.rem_euclid(FIVE_MINUTES_MS) * 2 >= FIVE_MINUTES_MS {
        base + FIVE_MINUTES_MS
    } else {
        base
    };
    Utc.timestamp_millis_opt(rounded).single().unwrap_or(instant)
}

/// Regular-session wall clock check, 09:30 through 16:00 exactly
pub fn is_market_hours(time: NaiveTime) -> bool {
    let (hours, minutes) = (time.hour(), time.minute());
    (hours == 9 && minutes >= 30) || (hours > 9 && hours < 16) || (hours == 16 && minutes == 0)
}

/// Local wall clock for an epoch-seconds tick
pub fn tick_local_time(timestamp: i64, tz: Tz) -> Option<NaiveDateTime> {
    Utc.timestamp_opt(timestamp, 0)
        .single()
        .map(|utc| utc.with_timezone(&tz).naive_local())
}

/// `Jun 10, 3:59 PM EDT` label for the latest tick
pub fn format_tick_time(timestamp: i64, tz: Tz) -> Option<String> {
    Utc.timestamp_opt(timestamp, 0)
        .single()
        .map(|utc| utc.with_timezone(&tz).format("%b %-d, %-I:%M %p %Z").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use chrono_tz::America::New_York;

    #[test]
    fn test_market_hours_label() {
        let t = NaiveDate::from_ymd_opt(2024, 6, 10).unwrap().and_hms_opt(15, 59, 0).unwrap();
        assert_eq!(format_time_to_market_hours(t), "3:59 PM");
        let t = NaiveDate::from_ymd_opt(2024, 6, 10).unwrap().and_hms_opt(9, 5, 0).unwrap();
        assert_eq!(format_time_to_market_hours(t), "9:05 AM");
    }

    #[test]
    fn test_round_to_nearest_five_minutes() {
        let t = Utc.with_ymd_and_hms(2024, 6, 10, 14, 32, 29).unwrap();
        assert_eq!(round_to_nearest_five_minutes(t), Utc.with_ymd_and_hms(2024, 6, 10, 14, 30, 0).unwrap());
        let t = Utc.with_ymd_and_hms(2024, 6, 10, 14, 32, 30).unwrap();
        assert_eq!(round_to_nearest_five_minutes(t), Utc.with_ymd_and_hms(2024, 6, 10, 14, 35, 0).unwrap());
    }

    #[test]
    fn test_is_market_hours() {
        let t = |h, m| NaiveTime::from_hms_opt(h, m, 0).unwrap();
        assert!(!is_market_hours(t(9, 29)));
        assert!(is_market_hours(t(9, 30)));
        assert!(is_market_hours(t(15, 59)));
        assert!(is_market_hours(t(16, 0)));
        assert!(!is_market_hours(t(16, 1)));
    }

    #[test]
    fn test_format_tick_time() {
        // 2024-06-10 19:59:00 UTC is 3:59 PM EDT
        let ts = Utc.with_ymd_and_hms(2024, 6, 10, 19, 59, 0).unwrap().timestamp();
        assert_eq!(format_tick_time(ts, New_York).unwrap(), "Jun 10, 3:59 PM EDT");
    }
}
