/// Trading calendar: weekday vs weekend only, no holiday awareness
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, Utc, Weekday};
use chrono_tz::Tz;

/// ISO `YYYY-MM-DD`
pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub fn is_weekday(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Plain calendar subtraction, not session-aware
pub fn yesterday_of(today: NaiveDate) -> NaiveDate {
    today - Duration::days(1)
}

pub fn day_before_yesterday_of(today: NaiveDate) -> NaiveDate {
    today - Duration::days(2)
}

/// Roll a weekend or Monday back to the previous Friday.
/// Tuesday through Friday are returned unchanged.
pub fn last_trading_day_from(today: NaiveDate) -> NaiveDate {
    match today.weekday() {
        Weekday::Sun => today - Duration::days(2),
        Weekday::Mon => today - Duration::days(3),
        Weekday::Sat => today - Duration::days(1),
        _ => today,
    }
}

/// Calendar anchored to the exchange's local wall clock
#[derive(Debug, Clone, Copy)]
pub struct TradingCalendar {
    tz: Tz,
}

impl TradingCalendar {
    pub fn new(tz: Tz) -> Self {
        TradingCalendar { tz }
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    pub fn local_at(&self, instant: DateTime<Utc>) -> NaiveDateTime {
        instant.with_timezone(&self.tz).naive_local()
    }

    pub fn local_now(&self) -> NaiveDateTime {
        self.local_at(Utc::now())
    }

    pub fn today_date(&self) -> NaiveDate {
        self.local_now().date()
    }

    pub fn today(&self) -> String {
        format_date(self.today_date())
    }

    pub fn yesterday(&self) -> String {
        format_date(yesterday_of(self.today_date()))
    }

    pub fn day_before_yesterday(&self) -> String {
        format_date(day_before_yesterday_of(self.today_date()))
    }

    pub fn last_trading_day(&self) -> String {
        format_date(last_trading_day_from(self.today_date()))
    }
}

impl Default for TradingCalendar {
    fn default() -> Self {
        TradingCalendar::new(chrono_tz::America::New_York)
    }
}
