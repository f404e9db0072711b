pub mod calendar;
pub mod session;

pub use calendar::{
    day_before_yesterday_of, format_date, is_weekday, last_trading_day_from, yesterday_of,
    TradingCalendar,
};
pub use session::SessionClock;
