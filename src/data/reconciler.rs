/// Merges multi-day historical bars into per-day chart series and closing prices
///
/// The relevant sessions depend on the day of week:
/// - Monday: today, the previous Friday and the Thursday before it
/// - Weekend: the previous Friday and the Thursday before it
/// - Tuesday..Friday: today, yesterday and the day before yesterday (plain calendar days)
///
/// The closing price of a group is the close of its latest bar. Which group feeds
/// `closing_price` and `previous_closing_price` is gated by the session phase.
use chrono::{Datelike, NaiveDate, Weekday};
use std::collections::BTreeMap;
use tracing::debug;

use crate::time::{day_before_yesterday_of, last_trading_day_from, yesterday_of};
use crate::types::{Bar, ChartPoint, ClosingPriceUpdate, DayLabel, SessionPhase};
use crate::utils::format_time_to_market_hours;
use rust_decimal::Decimal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconciliationCase {
    Monday,
    Weekend,
    Regular,
}

impl ReconciliationCase {
    pub fn for_date(today: NaiveDate) -> Self {
        match today.weekday() {
            Weekday::Mon => ReconciliationCase::Monday,
            Weekday::Sat | Weekday::Sun => ReconciliationCase::Weekend,
            _ => ReconciliationCase::Regular,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ReconciliationCase::Monday => "MONDAY",
            ReconciliationCase::Weekend => "WEEKEND",
            ReconciliationCase::Regular => "REGULAR",
        }
    }
}

/// Candidate session dates, newest first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CandidateSessions {
    /// `None` on weekends: there is no session today
    pub current: Option<NaiveDate>,
    pub previous: NaiveDate,
    pub before_previous: NaiveDate,
}

impl CandidateSessions {
    pub fn for_date(today: NaiveDate) -> Self {
        match ReconciliationCase::for_date(today) {
            ReconciliationCase::Monday => monday_sessions(today),
            ReconciliationCase::Weekend => weekend_sessions(today),
            ReconciliationCase::Regular => regular_sessions(today),
        }
    }

    fn labelled(&self) -> Vec<(DayLabel, NaiveDate)> {
        let mut out = Vec::with_capacity(3);
        if let Some(current) = self.current {
            out.push((DayLabel::Today, current));
        }
        out.push((DayLabel::Yesterday, self.previous));
        out.push((DayLabel::DayBeforeYesterday, self.before_previous));
        out
    }
}

fn monday_sessions(today: NaiveDate) -> CandidateSessions {
    let friday = last_trading_day_from(today);
    CandidateSessions {
        current: Some(today),
        previous: friday,
        before_previous: yesterday_of(friday),
    }
}

fn weekend_sessions(today: NaiveDate) -> CandidateSessions {
    let friday = last_trading_day_from(today);
    CandidateSessions {
        current: None,
        previous: friday,
        before_previous: yesterday_of(friday),
    }
}

fn regular_sessions(today: NaiveDate) -> CandidateSessions {
    CandidateSessions {
        current: Some(today),
        previous: yesterday_of(today),
        before_previous: day_before_yesterday_of(today),
    }
}

/// Inclusive date range for one upstream fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn single(date: NaiveDate) -> Self {
        DateRange { start: date, end: date }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// Fetches needed for `today`. Monday's sessions are not contiguous and are
/// requested one day each; the other cases use a single spanning range.
pub fn plan_fetch(today: NaiveDate) -> Vec<DateRange> {
    let sessions = CandidateSessions::for_date(today);
    match ReconciliationCase::for_date(today) {
        ReconciliationCase::Monday => vec![
            DateRange::single(today),
            DateRange::single(sessions.previous),
            DateRange::single(sessions.before_previous),
        ],
        ReconciliationCase::Weekend => vec![DateRange {
            start: sessions.before_previous,
            end: sessions.previous,
        }],
        ReconciliationCase::Regular => vec![DateRange {
            start: sessions.before_previous,
            end: today,
        }],
    }
}

/// Output of one reconciliation pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    pub case: ReconciliationCase,
    pub sessions: CandidateSessions,
    pub closing: ClosingPriceUpdate,
    /// Chart series per relative day, oldest point first. Days without bars are absent.
    pub series: BTreeMap<DayLabel, Vec<ChartPoint>>,
}

impl Reconciliation {
    /// Series of the most recent day that has data
    pub fn latest_series(&self) -> Option<(DayLabel, &[ChartPoint])> {
        self.series
            .iter()
            .find(|(_, points)| !points.is_empty())
            .map(|(label, points)| (*label, points.as_slice()))
    }
}

/// Bars grouped by calendar date, each group sorted newest first.
/// The sort is stable, so bars sharing a timestamp keep their input order.
pub fn group_by_date(bars: &[Bar]) -> BTreeMap<NaiveDate, Vec<Bar>> {
    let mut groups: BTreeMap<NaiveDate, Vec<Bar>> = BTreeMap::new();
    for bar in bars {
        groups.entry(bar.date()).or_default().push(bar.clone());
    }
    for group in groups.values_mut() {
        group.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    }
    groups
}

/// Close of the latest bar in a newest-first group
fn closing_of(group: Option<&Vec<Bar>>) -> Option<Decimal> {
    group.and_then(|bars| bars.first()).map(|bar| bar.close)
}

fn select_closing_prices(
    case: ReconciliationCase,
    phase: SessionPhase,
    current: Option<Decimal>,
    previous: Option<Decimal>,
    before_previous: Option<Decimal>,
) -> ClosingPriceUpdate {
    match (case, phase) {
        // No session today: behave like the morning after the last session
        (ReconciliationCase::Weekend, _) | (_, SessionPhase::BeforeOpen) => ClosingPriceUpdate {
            closing_price: previous,
            previous_closing_price: before_previous,
        },
        (_, SessionPhase::Open) => ClosingPriceUpdate {
            closing_price: previous,
            previous_closing_price: None,
        },
        (_, SessionPhase::AfterClose) => ClosingPriceUpdate {
            closing_price: current,
            previous_closing_price: None,
        },
    }
}

fn chart_series(group: &[Bar]) -> Vec<ChartPoint> {
    group
        .iter()
        .rev()
        .map(|bar| ChartPoint {
            timestamp: bar.timestamp,
            label: format_time_to_market_hours(bar.timestamp),
            close: bar.close,
        })
        .collect()
}

/// Pure: never fails, empty input yields empty series and no price updates
pub fn reconcile(today: NaiveDate, phase: SessionPhase, bars: &[Bar]) -> Reconciliation {
    let case = ReconciliationCase::for_date(today);
    let sessions = CandidateSessions::for_date(today);
    let groups = group_by_date(bars);

    let current = sessions.current.and_then(|d| closing_of(groups.get(&d)));
    let previous = closing_of(groups.get(&sessions.previous));
    let before_previous = closing_of(groups.get(&sessions.before_previous));

    let closing = select_closing_prices(case, phase, current, previous, before_previous);

    let series = sessions
        .labelled()
        .into_iter()
        .filter_map(|(label, date)| {
            groups
                .get(&date)
                .filter(|g| !g.is_empty())
                .map(|g| (label, chart_series(g)))
        })
        .collect();

    debug!(
        "Reconciled {} bars ({} case, {}): close={:?} previous={:?}",
        bars.len(),
        case.as_str(),
        phase.as_str(),
        closing.closing_price,
        closing.previous_closing_price
    );

    Reconciliation {
        case,
        sessions,
        closing,
        series,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn bar(d: NaiveDate, h: u32, m: u32, close: Decimal) -> Bar {
        Bar { timestamp: d.and_hms_opt(h, m, 0).unwrap(), close }
    }

    // 2024-06-10 is a Monday
    const MON: (i32, u32, u32) = (2024, 6, 10);

    #[test]
    fn test_case_dispatch() {
        assert_eq!(ReconciliationCase::for_date(date(2024, 6, 10)), ReconciliationCase::Monday);
        assert_eq!(ReconciliationCase::for_date(date(2024, 6, 11)), ReconciliationCase::Regular);
        assert_eq!(ReconciliationCase::for_date(date(2024, 6, 14)), ReconciliationCase::Regular);
        assert_eq!(ReconciliationCase::for_date(date(2024, 6, 15)), ReconciliationCase::Weekend);
        assert_eq!(ReconciliationCase::for_date(date(2024, 6, 16)), ReconciliationCase::Weekend);
    }

    #[test]
    fn test_candidate_sessions() {
        let monday = CandidateSessions::for_date(date(2024, 6, 10));
        assert_eq!(monday.current, Some(date(2024, 6, 10)));
        assert_eq!(monday.previous, date(2024, 6, 7));
        assert_eq!(monday.before_previous, date(2024, 6, 6));

        let sunday = CandidateSessions::for_date(date(2024, 6, 16));
        assert_eq!(sunday.current, None);
        assert_eq!(sunday.previous, date(2024, 6, 14));
        assert_eq!(sunday.before_previous, date(2024, 6, 13));

        let tuesday = CandidateSessions::for_date(date(2024, 6, 11));
        assert_eq!(tuesday.previous, date(2024, 6, 10));
        assert_eq!(tuesday.before_previous, date(2024, 6, 9));
    }

    #[test]
    fn test_fetch_plan() {
        let monday = plan_fetch(date(2024, 6, 10));
        assert_eq!(monday.len(), 3);
        assert!(monday.iter().all(|r| r.start == r.end));

        let saturday = plan_fetch(date(2024, 6, 15));
        assert_eq!(saturday, vec![DateRange { start: date(2024, 6, 13), end: date(2024, 6, 14) }]);

        let wednesday = plan_fetch(date(2024, 6, 12));
        assert_eq!(wednesday, vec![DateRange { start: date(2024, 6, 10), end: date(2024, 6, 12) }]);
        assert!(wednesday[0].contains(date(2024, 6, 11)));
    }

    #[test]
    fn test_after_close_uses_latest_bar_of_today() {
        let today = date(MON.0, MON.1, MON.2);
        let bars = vec![bar(today, 15, 59, dec!(100.5)), bar(today, 9, 30, dec!(99.0))];
        let result = reconcile(today, SessionPhase::AfterClose, &bars);
        assert_eq!(result.closing.closing_price, Some(dec!(100.5)));
        assert_eq!(result.closing.previous_closing_price, None);
    }

    #[test]
    fn test_before_open_on_tuesday() {
        let tuesday = date(2024, 6, 11);
        let bars = vec![
            bar(date(2024, 6, 10), 10, 0, dec!(101)),
            bar(date(2024, 6, 10), 15, 59, dec!(102)),
            bar(date(2024, 6, 9), 15, 0, dec!(97)),
            bar(date(2024, 6, 9), 16, 0, dec!(98)),
        ];
        let result = reconcile(tuesday, SessionPhase::BeforeOpen, &bars);
        assert_eq!(result.closing.closing_price, Some(dec!(102)));
        assert_eq!(result.closing.previous_closing_price, Some(dec!(98)));
    }

    #[test]
    fn test_open_never_sets_previous() {
        let wednesday = date(2024, 6, 12);
        let bars = vec![
            bar(wednesday, 10, 0, dec!(110)),
            bar(date(2024, 6, 11), 15, 59, dec!(105)),
            bar(date(2024, 6, 10), 15, 59, dec!(104)),
        ];
        let result = reconcile(wednesday, SessionPhase::Open, &bars);
        assert_eq!(result.closing.closing_price, Some(dec!(105)));
        assert_eq!(result.closing.previous_closing_price, None);
    }

    #[test]
    fn test_monday_before_open_shifts_to_friday_and_thursday() {
        let monday = date(MON.0, MON.1, MON.2);
        let bars = vec![
            bar(date(2024, 6, 7), 15, 59, dec!(200)),
            bar(date(2024, 6, 6), 15, 59, dec!(190)),
        ];
        let result = reconcile(monday, SessionPhase::BeforeOpen, &bars);
        assert_eq!(result.case, ReconciliationCase::Monday);
        assert_eq!(result.closing.closing_price, Some(dec!(200)));
        assert_eq!(result.closing.previous_closing_price, Some(dec!(190)));
        assert!(result.series.get(&DayLabel::Today).is_none());
    }

    #[test]
    fn test_monday_open_uses_friday_and_leaves_previous_unset() {
        let monday = date(MON.0, MON.1, MON.2);
        let bars = vec![
            bar(monday, 9, 45, dec!(205)),
            bar(date(2024, 6, 7), 15, 59, dec!(200)),
            bar(date(2024, 6, 6), 15, 59, dec!(190)),
        ];
        let result = reconcile(monday, SessionPhase::Open, &bars);
        assert_eq!(result.closing.closing_price, Some(dec!(200)));
        assert_eq!(result.closing.previous_closing_price, None);
        assert_eq!(result.latest_series().map(|(label, _)| label), Some(DayLabel::Today));
    }

    #[test]
    fn test_monday_after_close_prefers_today_over_friday() {
        let monday = date(MON.0, MON.1, MON.2);
        let bars = vec![
            bar(date(2024, 6, 7), 15, 59, dec!(200)),
            bar(date(2024, 6, 6), 15, 59, dec!(190)),
            bar(monday, 15, 59, dec!(100.5)),
            bar(monday, 12, 0, dec!(101)),
        ];
        let result = reconcile(monday, SessionPhase::AfterClose, &bars);
        assert_eq!(result.closing.closing_price, Some(dec!(100.5)));
        assert_eq!(result.closing.previous_closing_price, None);
        assert_eq!(result.series.len(), 3);
        assert_eq!(result.series[&DayLabel::Yesterday][0].close, dec!(200));
    }

    #[test]
    fn test_weekend_ignores_phase() {
        let saturday = date(2024, 6, 15);
        let bars = vec![
            bar(date(2024, 6, 14), 15, 59, dec!(50)),
            bar(date(2024, 6, 13), 15, 59, dec!(49)),
        ];
        for phase in [SessionPhase::BeforeOpen, SessionPhase::Open, SessionPhase::AfterClose] {
            let result = reconcile(saturday, phase, &bars);
            assert_eq!(result.closing.closing_price, Some(dec!(50)));
            assert_eq!(result.closing.previous_closing_price, Some(dec!(49)));
        }
    }

    #[test]
    fn test_empty_input_degrades() {
        let result = reconcile(date(2024, 6, 12), SessionPhase::BeforeOpen, &[]);
        assert!(result.closing.is_empty());
        assert!(result.series.is_empty());
        assert!(result.latest_series().is_none());
    }

    #[test]
    fn test_missing_group_yields_none() {
        let wednesday = date(2024, 6, 12);
        let bars = vec![bar(date(2024, 6, 10), 15, 59, dec!(104))];
        let result = reconcile(wednesday, SessionPhase::BeforeOpen, &bars);
        assert_eq!(result.closing.closing_price, None);
        assert_eq!(result.closing.previous_closing_price, Some(dec!(104)));
    }

    #[test]
    fn test_series_are_ascending_and_labelled() {
        let today = date(2024, 6, 12);
        let bars = vec![
            bar(today, 9, 31, dec!(2)),
            bar(today, 9, 30, dec!(1)),
            bar(date(2024, 6, 11), 15, 59, dec!(3)),
            bar(date(2024, 5, 1), 15, 59, dec!(9)),
        ];
        let result = reconcile(today, SessionPhase::Open, &bars);
        let (label, points) = result.latest_series().unwrap();
        assert_eq!(label, DayLabel::Today);
        assert_eq!(points.iter().map(|p| p.close).collect::<Vec<_>>(), vec![dec!(1), dec!(2)]);
        assert_eq!(points[0].label, "9:30 AM");
        assert_eq!(result.series.len(), 2);
    }

    #[test]
    fn test_shared_timestamp_takes_first_in_input_order() {
        let today = date(2024, 6, 12);
        let bars = vec![bar(today, 16, 0, dec!(7)), bar(today, 16, 0, dec!(8))];
        let groups = group_by_date(&bars);
        assert_eq!(groups[&today][0].close, dec!(7));
    }
}
