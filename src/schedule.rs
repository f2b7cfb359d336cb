use serde::Serialize;
use time::{OffsetDateTime, format_description::BorrowedFormatItem, macros::format_description};

const HUMAN_TIME: &[BorrowedFormatItem<'static>] = format_description!(
    "[month repr:short] [day padding:none], [year] [hour]:[minute] UTC[offset_hour sign:mandatory]:[offset_minute]"
);

/// Where an instant falls relative to a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Upcoming,
    Open,
    Closed,
}

/// An inclusive `[opens, closes]` range gating an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub opens: OffsetDateTime,
    pub closes: OffsetDateTime,
}

impl Window {
    pub fn new(opens: OffsetDateTime, closes: OffsetDateTime) -> Option<Self> {
        (opens <= closes).then_some(Self { opens, closes })
    }

    pub fn phase(&self, now: OffsetDateTime) -> Phase {
        if now < self.opens {
            Phase::Upcoming
        } else if now > self.closes {
            Phase::Closed
        } else {
            Phase::Open
        }
    }

    pub fn is_open(&self, now: OffsetDateTime) -> bool {
        self.phase(now) == Phase::Open
    }
}

/// Renders a boundary in the offset it was configured with.
pub fn human_time(at: OffsetDateTime) -> String {
    at.format(HUMAN_TIME).unwrap_or_else(|_| at.to_string())
}

/// Time remaining until an instant, split the way the results page shows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Countdown {
    pub days: i64,
    pub hours: i64,
    pub minutes: i64,
    pub seconds: i64,
}

impl Countdown {
    /// `None` once `target` has been reached.
    pub fn until(now: OffsetDateTime, target: OffsetDateTime) -> Option<Self> {
        if now >= target {
            return None;
        }

        let remaining = (target - now).whole_seconds().max(0);
        Some(Self {
            days: remaining / 86_400,
            hours: remaining % 86_400 / 3_600,
            minutes: remaining % 3_600 / 60,
            seconds: remaining % 60,
        })
    }
}

/// Every configured instant of the contest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    pub upload: Window,
    pub voting: Window,
    pub reveal: OffsetDateTime,
}

impl Schedule {
    pub fn is_revealed(&self, now: OffsetDateTime) -> bool {
        now >= self.reveal
    }
}

#[cfg(test)]
mod tests {
    use time::{Duration, macros::datetime};

    use super::*;

    fn window() -> Window {
        Window::new(
            datetime!(2025-10-31 09:00 +07:00),
            datetime!(2025-10-31 17:00 +07:00),
        )
        .unwrap()
    }

    #[test]
    fn window_bounds_are_inclusive() {
        let w = window();
        assert_eq!(w.phase(w.opens - Duration::seconds(1)), Phase::Upcoming);
        assert_eq!(w.phase(w.opens), Phase::Open);
        assert_eq!(w.phase(w.closes), Phase::Open);
        assert_eq!(w.phase(w.closes + Duration::seconds(1)), Phase::Closed);
    }

    #[test]
    fn window_compares_across_offsets() {
        let w = window();
        // 02:30 UTC is 09:30 at +07:00
        assert!(w.is_open(datetime!(2025-10-31 02:30 UTC)));
        assert!(!w.is_open(datetime!(2025-10-31 01:59 UTC)));
    }

    #[test]
    fn inverted_window_is_refused() {
        assert!(Window::new(datetime!(2025-11-01 00:00 UTC), datetime!(2025-10-31 00:00 UTC)).is_none());
    }

    #[test]
    fn countdown_splits_remaining_time() {
        let now = datetime!(2025-10-30 10:00:00 UTC);
        let target = datetime!(2025-11-01 13:04:05 UTC);
        assert_eq!(
            Countdown::until(now, target),
            Some(Countdown { days: 2, hours: 3, minutes: 4, seconds: 5 })
        );
        assert_eq!(Countdown::until(target, target), None);
        assert_eq!(Countdown::until(target + Duration::hours(1), target), None);
    }

    #[test]
    fn human_time_keeps_configured_offset() {
        assert_eq!(human_time(datetime!(2025-10-31 17:00 +07:00)), "Oct 31, 2025 17:00 UTC+07:00");
    }
}
