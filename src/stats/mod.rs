pub mod streak;
pub mod trend;
pub mod window;

use crate::stats::streak::{StreakStats, active_dates, compute_streak};
use crate::stats::trend::{
    DailyActivity, DatedCount, DayCounts, TagCount, dual_series, project, single_series,
    tag_distribution,
};
use crate::stats::window::DateWindow;
use anyhow::Result;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StatsError {
    #[error("Invalid days value: {0}. Expected a positive whole number")]
    InvalidDays(String),

    #[error("Invalid year format: {0}. Example: 2024")]
    InvalidYear(String),

    #[error("Year {year} not allowed. Choose a year between {earliest} and {latest}")]
    YearNotAllowed { year: i32, earliest: i32, latest: i32 },

    #[error("Active dates must be ascending and distinct: {next} follows {previous}")]
    UnsortedDates { previous: NaiveDate, next: NaiveDate },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TaskTotals {
    pub total: u32,
    pub completed: u32,
    pub pending: u32,
    pub missed: u32,
    pub low: u32,
    pub medium: u32,
    pub high: u32,
}

/// Read-side queries the aggregator needs, scoped to one owner and an
/// inclusive date range.
pub trait TaskStore {
    /// Distinct dates with at least one completed task, ascending.
    fn completed_dates(&self, owner: i64, from: NaiveDate, to: NaiveDate)
    -> Result<Vec<NaiveDate>>;

    /// Status counters for each date that has at least one task.
    fn count_by_date(
        &self,
        owner: i64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<BTreeMap<NaiveDate, DayCounts>>;

    /// Task count per tag in first-encounter order.
    fn count_by_tag(&self, owner: i64, from: NaiveDate, to: NaiveDate)
    -> Result<Vec<(String, u64)>>;

    fn count_totals(&self, owner: i64, from: NaiveDate, to: NaiveDate) -> Result<TaskTotals>;
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusBreakdown {
    pub total_tasks: u32,
    pub pending: u32,
    pub completed: u32,
    pub missed: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriorityBreakdown {
    pub total_tasks: u32,
    pub low: u32,
    pub medium: u32,
    pub high: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub total_tasks: u32,
    pub status_breakdown: StatusBreakdown,
    pub priority_breakdown: PriorityBreakdown,
    pub completion_breakdown: Vec<DatedCount>,
    pub pending_breakdown: Vec<DatedCount>,
    pub activity: Vec<DailyActivity>,
    pub tag_breakdown: Vec<TagCount>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreakSummary {
    pub completed_tasks: u32,
    pub total_tasks: u32,
    pub active_days: u32,
    pub max_streak: u32,
    pub current_streak: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreakDay {
    pub date: NaiveDate,
    pub active: bool,
    pub count: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreakReport {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub summary: StreakSummary,
    pub streak_data: Vec<StreakDay>,
}

pub fn build_dashboard<S: TaskStore + ?Sized>(
    store: &S,
    owner: i64,
    window: DateWindow,
) -> Result<Dashboard> {
    let totals = store.count_totals(owner, window.start, window.end)?;
    let by_date = store.count_by_date(owner, window.start, window.end)?;
    let by_tag = store.count_by_tag(owner, window.start, window.end)?;

    let dense = project(&window, &by_date);

    Ok(Dashboard {
        from: window.start,
        to: window.end,
        total_tasks: totals.total,
        status_breakdown: StatusBreakdown {
            total_tasks: totals.total,
            pending: totals.pending,
            completed: totals.completed,
            missed: totals.missed,
        },
        priority_breakdown: PriorityBreakdown {
            total_tasks: totals.total,
            low: totals.low,
            medium: totals.medium,
            high: totals.high,
        },
        completion_breakdown: single_series(&dense, |day| day.completed),
        pending_breakdown: single_series(&dense, DayCounts::open),
        activity: dual_series(&dense),
        tag_breakdown: tag_distribution(by_tag),
    })
}

pub fn build_streak_report<S: TaskStore + ?Sized>(
    store: &S,
    owner: i64,
    window: DateWindow,
) -> Result<StreakReport> {
    let totals = store.count_totals(owner, window.start, window.end)?;
    let completed_dates = active_dates(
        store
            .completed_dates(owner, window.start, window.end)?
            .into_iter()
            .filter(|date| window.contains(*date)),
    );
    let StreakStats {
        max_streak,
        current_streak,
        active_days,
    } = compute_streak(&completed_dates, window.end)?;

    let completed_by_date = store
        .count_by_date(owner, window.start, window.end)?
        .into_iter()
        .map(|(date, counts)| (date, counts.completed))
        .collect::<BTreeMap<_, _>>();

    let streak_data = project(&window, &completed_by_date)
        .into_iter()
        .map(|(date, count)| StreakDay {
            date,
            active: count > 0,
            count,
        })
        .collect();

    Ok(StreakReport {
        from: window.start,
        to: window.end,
        summary: StreakSummary {
            completed_tasks: totals.completed,
            total_tasks: totals.total,
            active_days,
            max_streak,
            current_streak,
        },
        streak_data,
    })
}

/// Completed count for every date of the year that has tasks. Sparse: dates
/// without tasks are omitted.
pub fn build_year_calendar<S: TaskStore + ?Sized>(
    store: &S,
    owner: i64,
    window: DateWindow,
) -> Result<Vec<DatedCount>> {
    let calendar = store
        .count_by_date(owner, window.start, window.end)?
        .into_iter()
        .filter(|(date, _)| window.contains(*date))
        .map(|(date, counts)| DatedCount {
            date,
            count: counts.completed,
        })
        .collect();

    Ok(calendar)
}

#[cfg(test)]
mod tests {
    use super::{
        TaskStore, TaskTotals, build_dashboard, build_streak_report, build_year_calendar,
    };
    use crate::db::{Priority, TaskStatus};
    use crate::stats::trend::DayCounts;
    use crate::stats::window::DateWindow;
    use anyhow::Result;
    use chrono::NaiveDate;
    use std::collections::BTreeMap;

    struct FakeTask {
        owner: i64,
        date: NaiveDate,
        status: TaskStatus,
        priority: Option<Priority>,
        tag: &'static str,
    }

    struct FakeStore {
        tasks: Vec<FakeTask>,
    }

    impl FakeStore {
        fn in_range(
            &self,
            owner: i64,
            from: NaiveDate,
            to: NaiveDate,
        ) -> impl Iterator<Item = &FakeTask> {
            self.tasks
                .iter()
                .filter(move |task| task.owner == owner && from <= task.date && task.date <= to)
        }
    }

    impl TaskStore for FakeStore {
        fn completed_dates(
            &self,
            owner: i64,
            from: NaiveDate,
            to: NaiveDate,
        ) -> Result<Vec<NaiveDate>> {
            let mut dates = self
                .in_range(owner, from, to)
                .filter(|task| task.status == TaskStatus::Completed)
                .map(|task| task.date)
                .collect::<Vec<_>>();
            dates.sort();
            dates.dedup();
            Ok(dates)
        }

        fn count_by_date(
            &self,
            owner: i64,
            from: NaiveDate,
            to: NaiveDate,
        ) -> Result<BTreeMap<NaiveDate, DayCounts>> {
            Ok(self
                .in_range(owner, from, to)
                .fold(BTreeMap::new(), |mut acc, task| {
                    let entry: &mut DayCounts = acc.entry(task.date).or_default();
                    match task.status {
                        TaskStatus::Pending => entry.pending += 1,
                        TaskStatus::Completed => entry.completed += 1,
                        TaskStatus::Missed => entry.missed += 1,
                    }
                    acc
                }))
        }

        fn count_by_tag(
            &self,
            owner: i64,
            from: NaiveDate,
            to: NaiveDate,
        ) -> Result<Vec<(String, u64)>> {
            Ok(self
                .in_range(owner, from, to)
                .map(|task| (task.tag.to_string(), 1))
                .collect())
        }

        fn count_totals(&self, owner: i64, from: NaiveDate, to: NaiveDate) -> Result<TaskTotals> {
            Ok(self
                .in_range(owner, from, to)
                .fold(TaskTotals::default(), |mut totals, task| {
                    totals.total += 1;
                    match task.status {
                        TaskStatus::Pending => totals.pending += 1,
                        TaskStatus::Completed => totals.completed += 1,
                        TaskStatus::Missed => totals.missed += 1,
                    }
                    match task.priority {
                        Some(Priority::Low) => totals.low += 1,
                        Some(Priority::Medium) => totals.medium += 1,
                        Some(Priority::High) => totals.high += 1,
                        None => {}
                    }
                    totals
                }))
        }
    }

    fn march(date: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, date).expect("valid date")
    }

    fn task(date: NaiveDate, status: TaskStatus, tag: &'static str) -> FakeTask {
        FakeTask {
            owner: 1,
            date,
            status,
            priority: Some(Priority::High),
            tag,
        }
    }

    fn sample_store() -> FakeStore {
        FakeStore {
            tasks: vec![
                task(march(4), TaskStatus::Completed, "work"),
                task(march(5), TaskStatus::Completed, "home"),
                task(march(5), TaskStatus::Completed, "home"),
                task(march(6), TaskStatus::Completed, "work"),
                task(march(6), TaskStatus::Missed, "misc"),
                task(march(8), TaskStatus::Pending, "home"),
                task(march(10), TaskStatus::Completed, "misc"),
                task(march(1), TaskStatus::Completed, "old"),
                FakeTask {
                    owner: 2,
                    date: march(7),
                    status: TaskStatus::Completed,
                    priority: None,
                    tag: "other-user",
                },
            ],
        }
    }

    #[test]
    fn streak_report_covers_window_and_counts_distinct_days() {
        let store = sample_store();
        let window = DateWindow::rolling(march(10), 7).expect("window");

        let report = build_streak_report(&store, 1, window).expect("report");

        assert_eq!(report.summary.total_tasks, 7);
        assert_eq!(report.summary.completed_tasks, 5);
        assert_eq!(report.summary.active_days, 4);
        assert_eq!(report.summary.max_streak, 3);
        assert_eq!(report.summary.current_streak, 1);

        assert_eq!(report.streak_data.len(), 7);
        assert_eq!(report.streak_data[0].date, march(4));
        assert_eq!(report.streak_data[1].count, 2);
        assert!(!report.streak_data[3].active);
        assert_eq!(report.streak_data[6].date, march(10));
    }

    #[test]
    fn dashboard_breakdowns_are_dense_and_total() {
        let store = sample_store();
        let window = DateWindow::rolling(march(10), 7).expect("window");

        let dashboard = build_dashboard(&store, 1, window).expect("dashboard");

        assert_eq!(dashboard.total_tasks, 7);
        assert_eq!(dashboard.status_breakdown.completed, 5);
        assert_eq!(dashboard.status_breakdown.missed, 1);
        assert_eq!(dashboard.status_breakdown.pending, 1);
        assert_eq!(dashboard.priority_breakdown.high, 7);
        assert_eq!(dashboard.completion_breakdown.len(), 7);
        assert_eq!(dashboard.pending_breakdown.len(), 7);
        assert_eq!(dashboard.pending_breakdown[2].count, 1);
        assert_eq!(dashboard.pending_breakdown[4].count, 1);
        assert_eq!(dashboard.activity[2].total, 2);

        let tags = dashboard
            .tag_breakdown
            .iter()
            .map(|tag| (tag.tag.as_str(), tag.count))
            .collect::<Vec<_>>();
        assert_eq!(tags, vec![("home", 3), ("work", 2), ("misc", 2)]);
    }

    #[test]
    fn dashboard_for_user_without_tasks_is_zero_filled() {
        let store = FakeStore { tasks: Vec::new() };
        let window = DateWindow::rolling(march(10), 3).expect("window");

        let dashboard = build_dashboard(&store, 42, window).expect("dashboard");

        assert_eq!(dashboard.total_tasks, 0);
        assert!(dashboard.tag_breakdown.is_empty());
        assert!(
            dashboard
                .completion_breakdown
                .iter()
                .all(|point| point.count == 0)
        );
        assert_eq!(dashboard.completion_breakdown.len(), 3);
    }

    #[test]
    fn year_calendar_is_sparse_and_sorted() {
        let store = sample_store();
        let window = DateWindow::for_year(march(10), "2024").expect("window");

        let calendar = build_year_calendar(&store, 1, window).expect("calendar");

        let dates = calendar.iter().map(|day| day.date).collect::<Vec<_>>();
        assert_eq!(
            dates,
            vec![march(1), march(4), march(5), march(6), march(8), march(10)]
        );
        assert_eq!(calendar[2].count, 2);
        assert_eq!(calendar[4].count, 0);
    }
}
