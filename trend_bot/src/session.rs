//! Trading-session labels and notification-slot matching.

use chrono::{DateTime, Duration, NaiveTime, Timelike, Utc};

/// Seconds of slack around a configured notification time.
const SLOT_WINDOW_SECS: i64 = 300;

/// Which global session a UTC instant falls into, by fixed 8-hour bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradingSession {
    /// UTC [0, 8).
    Asia,
    /// UTC [8, 16).
    Europe,
    /// UTC [16, 24).
    Us,
}

impl TradingSession {
    pub fn from_utc_hour(hour: u32) -> Self {
        match hour {
            0..8 => TradingSession::Asia,
            8..16 => TradingSession::Europe,
            _ => TradingSession::Us,
        }
    }

    pub fn current() -> Self {
        Self::from_utc_hour(Utc::now().hour())
    }

    /// Machine label ("asia", "europe", "us").
    pub fn label(&self) -> &'static str {
        match self {
            TradingSession::Asia => "asia",
            TradingSession::Europe => "europe",
            TradingSession::Us => "us",
        }
    }

    /// Human heading for the report.
    pub fn display_name(&self) -> &'static str {
        match self {
            TradingSession::Asia => "Asia session",
            TradingSession::Europe => "Europe session",
            TradingSession::Us => "US session",
        }
    }
}

/// The slot from `schedule` that `now` falls within, if any.
///
/// A slot matches when `now` is within five minutes of it on either side;
/// callers de-duplicate per (date, slot) so a 60-second poll loop fires each
/// slot once.
pub fn due_slot(now: DateTime<Utc>, schedule: &[NaiveTime]) -> Option<NaiveTime> {
    schedule.iter().copied().find(|slot| {
        let target = now.date_naive().and_time(*slot).and_utc();
        (now - target).abs() <= Duration::seconds(SLOT_WINDOW_SECS)
    })
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn hours_map_to_fixed_bands() {
        assert_eq!(TradingSession::from_utc_hour(0), TradingSession::Asia);
        assert_eq!(TradingSession::from_utc_hour(7), TradingSession::Asia);
        assert_eq!(TradingSession::from_utc_hour(8), TradingSession::Europe);
        assert_eq!(TradingSession::from_utc_hour(15), TradingSession::Europe);
        assert_eq!(TradingSession::from_utc_hour(16), TradingSession::Us);
        assert_eq!(TradingSession::from_utc_hour(23), TradingSession::Us);
    }

    #[test]
    fn labels_are_stable() {
        assert_eq!(TradingSession::Asia.label(), "asia");
        assert_eq!(TradingSession::Us.display_name(), "US session");
    }

    #[test]
    fn slot_matches_within_five_minutes() {
        let schedule = vec![NaiveTime::from_hms_opt(9, 0, 0).unwrap()];
        let base = Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap();

        assert_eq!(due_slot(base, &schedule), Some(schedule[0]));
        assert_eq!(
            due_slot(base + Duration::minutes(4), &schedule),
            Some(schedule[0])
        );
        assert_eq!(
            due_slot(base - Duration::minutes(5), &schedule),
            Some(schedule[0])
        );
        assert_eq!(due_slot(base + Duration::minutes(6), &schedule), None);
    }

    #[test]
    fn first_matching_slot_wins() {
        let schedule = vec![
            NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(9, 5, 0).unwrap(),
        ];
        let now = Utc.with_ymd_and_hms(2025, 3, 10, 9, 3, 0).unwrap();
        assert_eq!(due_slot(now, &schedule), Some(schedule[0]));
    }
}
