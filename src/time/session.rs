/// Market session phase resolution against a fixed daily window
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use super::calendar::is_weekday;
use crate::config::parse_market_time;
use crate::error::Result;
use crate::types::{Config, SessionPhase, SessionWindow};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionClock {
    open_time: NaiveTime,
    close_time: NaiveTime,
}

impl SessionClock {
    pub fn new(open_time: NaiveTime, close_time: NaiveTime) -> Self {
        SessionClock { open_time, close_time }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(SessionClock::new(
            parse_market_time(&config.market_open)?,
            parse_market_time(&config.market_close)?,
        ))
    }

    pub fn window(&self, date: NaiveDate) -> SessionWindow {
        SessionWindow {
            date,
            open_time: self.open_time,
            close_time: self.close_time,
        }
    }

    /// Phase against `now`'s own date. Weekends are not projected onto Friday.
    pub fn phase(&self, now: NaiveDateTime) -> SessionPhase {
        let window = self.window(now.date());
        if now < window.open_at() {
            SessionPhase::BeforeOpen
        } else if now <= window.close_at() {
            SessionPhase::Open
        } else {
            SessionPhase::AfterClose
        }
    }

    pub fn market_open(&self, now: NaiveDateTime) -> bool {
        self.phase(now) == SessionPhase::Open && is_weekday(now.date())
    }

    pub fn before_market(&self, now: NaiveDateTime) -> bool {
        self.phase(now) == SessionPhase::BeforeOpen && is_weekday(now.date())
    }

    pub fn after_market(&self, now: NaiveDateTime) -> bool {
        self.phase(now) == SessionPhase::AfterClose && is_weekday(now.date())
    }
}

impl Default for SessionClock {
    fn default() -> Self {
        SessionClock::new(
            NaiveTime::from_hms_opt(9, 30, 0).unwrap_or(NaiveTime::MIN),
            NaiveTime::from_hms_opt(16, 0, 0).unwrap_or(NaiveTime::MIN),
        )
    }
}
