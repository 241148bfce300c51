use crate::domain::models::DayWindow;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use std::sync::Arc;

pub type NowProvider = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub fn system_now() -> NowProvider {
    Arc::new(Utc::now)
}

/// Day-boundary arithmetic in one fixed time zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayCalendar {
    time_zone: Tz,
}

impl Default for DayCalendar {
    fn default() -> Self {
        Self::new(Tz::UTC)
    }
}

impl DayCalendar {
    pub fn new(time_zone: Tz) -> Self {
        Self { time_zone }
    }

    pub fn parse(time_zone: &str) -> Result<Self, String> {
        time_zone
            .trim()
            .parse::<Tz>()
            .map(Self::new)
            .map_err(|error| format!("unknown time zone '{}': {error}", time_zone.trim()))
    }

    pub fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.time_zone).date_naive()
    }

    /// Day anchor: the first instant of the local calendar day containing `instant`.
    pub fn start_of_day(&self, instant: DateTime<Utc>) -> DateTime<Utc> {
        self.start_of_date(self.local_date(instant))
    }

    pub fn day_window(&self, instant: DateTime<Utc>) -> DayWindow {
        self.window_of_date(self.local_date(instant))
    }

    pub fn window_of_date(&self, date: NaiveDate) -> DayWindow {
        let start = self.start_of_date(date);
        let end = date
            .succ_opt()
            .map(|next| self.start_of_date(next))
            .unwrap_or(start + Duration::days(1));
        DayWindow { start, end }
    }

    pub fn is_same_day(&self, left: DateTime<Utc>, right: DateTime<Utc>) -> bool {
        self.local_date(left) == self.local_date(right)
    }

    // A skipped local midnight (DST gap) resolves to the first valid instant of the date.
    fn start_of_date(&self, date: NaiveDate) -> DateTime<Utc> {
        let mut local = date.and_time(NaiveTime::MIN);
        for _ in 0..(24 * 4) {
            if let Some(resolved) = self.time_zone.from_local_datetime(&local).earliest() {
                return resolved.with_timezone(&Utc);
            }
            local += Duration::minutes(15);
        }
        Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn fixed_time(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .expect("valid datetime")
            .with_timezone(&Utc)
    }

    #[test]
    fn utc_calendar_anchors_at_midnight() {
        let calendar = DayCalendar::default();
        let window = calendar.day_window(fixed_time("2026-02-16T09:30:00Z"));
        assert_eq!(window.start, fixed_time("2026-02-16T00:00:00Z"));
        assert_eq!(window.end, fixed_time("2026-02-17T00:00:00Z"));
    }

    #[test]
    fn zoned_calendar_uses_local_midnight() {
        let calendar = DayCalendar::parse("Asia/Tokyo").expect("known zone");
        // 2026-02-16T20:00Z is already 2026-02-17 05:00 in Tokyo.
        let anchor = calendar.start_of_day(fixed_time("2026-02-16T20:00:00Z"));
        assert_eq!(anchor, fixed_time("2026-02-16T15:00:00Z"));
        assert!(calendar.is_same_day(
            fixed_time("2026-02-16T15:00:00Z"),
            fixed_time("2026-02-17T14:59:59Z")
        ));
        assert!(!calendar.is_same_day(
            fixed_time("2026-02-16T14:59:59Z"),
            fixed_time("2026-02-16T15:00:00Z")
        ));
    }

    #[test]
    fn skipped_midnight_resolves_to_first_valid_instant() {
        // Santiago skips 00:00-01:00 local time when DST starts on 2025-09-07.
        let calendar = DayCalendar::parse("America/Santiago").expect("known zone");
        let window = calendar.day_window(fixed_time("2025-09-07T15:00:00Z"));
        assert_eq!(window.start, fixed_time("2025-09-07T04:00:00Z"));
        assert_eq!(window.end - window.start, Duration::hours(23));
    }

    #[test]
    fn parse_rejects_unknown_zone() {
        assert!(DayCalendar::parse("Mars/Olympus").is_err());
    }

    proptest! {
        #[test]
        fn day_window_always_contains_its_instant(seconds in 0i64..4_102_444_800i64) {
            let calendar = DayCalendar::parse("Europe/Berlin").expect("known zone");
            let instant = Utc.timestamp_opt(seconds, 0).single().expect("valid timestamp");
            let window = calendar.day_window(instant);
            prop_assert!(window.contains(instant));
            prop_assert_eq!(window.start, calendar.start_of_day(instant));
        }
    }
}
