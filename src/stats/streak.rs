use crate::stats::StatsError;
use chrono::{Duration, NaiveDate};
use serde::Serialize;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreakStats {
    pub max_streak: u32,
    pub current_streak: u32,
    pub active_days: u32,
}

/// Collapses per-task completion dates into the sorted, distinct form the
/// streak walk expects. Several completed tasks on one day count once.
pub fn active_dates<I>(dates: I) -> Vec<NaiveDate>
where
    I: IntoIterator<Item = NaiveDate>,
{
    dates
        .into_iter()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Walks ascending, distinct active dates once.
///
/// `as_of` anchors the current streak: the trailing run only counts while its
/// last day is `as_of` or the day before, so a streak is not broken just
/// because today's tasks are still open.
pub fn compute_streak(dates: &[NaiveDate], as_of: NaiveDate) -> Result<StreakStats, StatsError> {
    let Some((&first, rest)) = dates.split_first() else {
        return Ok(StreakStats::default());
    };

    let mut previous = first;
    let mut current = 1_u32;
    let mut max = 1_u32;

    for &date in rest {
        if date <= previous {
            return Err(StatsError::UnsortedDates { previous, next: date });
        }

        current = if date - previous == Duration::days(1) {
            current + 1
        } else {
            1
        };
        max = max.max(current);
        previous = date;
    }

    let current_streak = if previous == as_of || previous + Duration::days(1) == as_of {
        current
    } else {
        0
    };

    Ok(StreakStats {
        max_streak: max,
        current_streak,
        active_days: dates.len() as u32,
    })
}

#[cfg(test)]
mod tests {
    use super::{StreakStats, active_dates, compute_streak};
    use crate::stats::StatsError;
    use chrono::NaiveDate;

    fn jan(date: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, date).expect("valid date")
    }

    #[test]
    fn longest_run_wins() {
        let stats = compute_streak(&[jan(1), jan(2), jan(3), jan(5)], jan(5)).expect("streak");

        assert_eq!(stats.max_streak, 3);
        assert_eq!(stats.active_days, 4);
        assert_eq!(stats.current_streak, 1);
    }

    #[test]
    fn empty_input_has_no_streak() {
        let stats = compute_streak(&[], jan(10)).expect("streak");
        assert_eq!(stats, StreakStats::default());
    }

    #[test]
    fn gap_of_two_days_resets() {
        let stats = compute_streak(&[jan(1), jan(3)], jan(3)).expect("streak");
        assert_eq!(stats.max_streak, 1);
        assert_eq!(stats.active_days, 2);
    }

    #[test]
    fn later_run_can_beat_earlier_run() {
        let dates = [jan(1), jan(2), jan(10), jan(11), jan(12), jan(13)];
        let stats = compute_streak(&dates, jan(14)).expect("streak");

        assert_eq!(stats.max_streak, 4);
        assert_eq!(stats.current_streak, 4);
    }

    #[test]
    fn current_streak_expires_after_a_missed_day() {
        let stats = compute_streak(&[jan(1), jan(2)], jan(4)).expect("streak");
        assert_eq!(stats.max_streak, 2);
        assert_eq!(stats.current_streak, 0);
    }

    #[test]
    fn same_day_completions_count_once() {
        let dates = active_dates([jan(2), jan(1), jan(1), jan(2), jan(3)]);
        assert_eq!(dates, vec![jan(1), jan(2), jan(3)]);

        let stats = compute_streak(&active_dates([jan(1), jan(1)]), jan(1)).expect("streak");
        assert_eq!(stats.active_days, 1);
        assert_eq!(stats.max_streak, 1);
    }

    #[test]
    fn rejects_unsorted_or_duplicated_input() {
        assert!(matches!(
            compute_streak(&[jan(2), jan(1)], jan(2)),
            Err(StatsError::UnsortedDates { .. })
        ));
        assert!(matches!(
            compute_streak(&[jan(1), jan(1)], jan(1)),
            Err(StatsError::UnsortedDates { .. })
        ));
    }
}
