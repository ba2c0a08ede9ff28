use crate::stats::window::DateWindow;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

pub const UNTAGGED: &str = "untagged";

/// Per-day status counters as they come out of the task store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DayCounts {
    pub completed: u32,
    pub pending: u32,
    pub missed: u32,
}

impl DayCounts {
    pub fn total(&self) -> u32 {
        self.completed + self.pending + self.missed
    }

    /// Tasks not completed, whether or not the sweep has marked them missed yet.
    pub fn open(&self) -> u32 {
        self.pending + self.missed
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatedCount {
    pub date: NaiveDate,
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyActivity {
    pub date: NaiveDate,
    pub completed: u32,
    pub total: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagCount {
    pub tag: String,
    pub count: u64,
}

/// Expands a sparse per-date map into one entry per window date, ascending.
/// Dates without data get `T::default()`; entries outside the window are dropped.
pub fn project<T>(window: &DateWindow, sparse: &BTreeMap<NaiveDate, T>) -> Vec<(NaiveDate, T)>
where
    T: Clone + Default,
{
    window
        .dates()
        .map(|date| (date, sparse.get(&date).cloned().unwrap_or_default()))
        .collect()
}

pub fn single_series<F>(dense: &[(NaiveDate, DayCounts)], pick: F) -> Vec<DatedCount>
where
    F: Fn(&DayCounts) -> u32,
{
    dense
        .iter()
        .map(|(date, counts)| DatedCount {
            date: *date,
            count: pick(counts),
        })
        .collect()
}

pub fn dual_series(dense: &[(NaiveDate, DayCounts)]) -> Vec<DailyActivity> {
    dense
        .iter()
        .map(|(date, counts)| DailyActivity {
            date: *date,
            completed: counts.completed,
            total: counts.total(),
        })
        .collect()
}

/// Sorts tag counts descending. Equal counts keep the order they arrived in,
/// which the store reports as first-encounter order.
pub fn tag_distribution<I>(counts: I) -> Vec<TagCount>
where
    I: IntoIterator<Item = (String, u64)>,
{
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut tags: Vec<TagCount> = Vec::new();

    for (raw_tag, count) in counts {
        let tag = match raw_tag.trim() {
            "" => UNTAGGED.to_string(),
            trimmed => trimmed.to_string(),
        };

        match positions.get(&tag).copied() {
            Some(index) => tags[index].count += count,
            None => {
                positions.insert(tag.clone(), tags.len());
                tags.push(TagCount { tag, count });
            }
        }
    }

    tags.sort_by(|left, right| right.count.cmp(&left.count));
    tags
}

#[cfg(test)]
mod tests {
    use super::{DayCounts, dual_series, project, single_series, tag_distribution};
    use crate::stats::window::DateWindow;
    use chrono::NaiveDate;
    use std::collections::BTreeMap;

    fn march(date: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, date).expect("valid date")
    }

    fn counts(completed: u32, pending: u32, missed: u32) -> DayCounts {
        DayCounts {
            completed,
            pending,
            missed,
        }
    }

    #[test]
    fn fills_every_window_date() {
        let window = DateWindow::rolling(march(10), 7).expect("window");
        let sparse = BTreeMap::from([(march(6), counts(2, 1, 0)), (march(1), counts(9, 9, 9))]);

        let dense = project(&window, &sparse);

        assert_eq!(dense.len(), 7);
        assert_eq!(dense.first().map(|(date, _)| *date), Some(march(4)));
        assert_eq!(dense.last().map(|(date, _)| *date), Some(march(10)));
        assert_eq!(dense[2], (march(6), counts(2, 1, 0)));
        assert!(
            dense
                .iter()
                .filter(|(date, _)| *date != march(6))
                .all(|(_, value)| *value == DayCounts::default())
        );
    }

    #[test]
    fn projection_is_idempotent() {
        let window = DateWindow::rolling(march(10), 5).expect("window");
        let sparse = BTreeMap::from([(march(7), counts(1, 0, 1)), (march(10), counts(0, 3, 0))]);

        let once = project(&window, &sparse);
        let twice = project(&window, &once.iter().cloned().collect::<BTreeMap<_, _>>());

        assert_eq!(once, twice);
    }

    #[test]
    fn series_variants_share_dates() {
        let window = DateWindow::rolling(march(3), 3).expect("window");
        let sparse = BTreeMap::from([(march(2), counts(2, 1, 3))]);
        let dense = project(&window, &sparse);

        let completed = single_series(&dense, |day| day.completed);
        let open = single_series(&dense, DayCounts::open);
        let activity = dual_series(&dense);

        assert_eq!(
            completed.iter().map(|point| point.count).collect::<Vec<_>>(),
            vec![0, 2, 0]
        );
        assert_eq!(
            open.iter().map(|point| point.count).collect::<Vec<_>>(),
            vec![0, 4, 0]
        );
        assert_eq!(activity[1].completed, 2);
        assert_eq!(activity[1].total, 6);
        assert_eq!(activity[0].date, march(1));
    }

    #[test]
    fn tags_sort_descending_with_stable_ties() {
        let tags = tag_distribution([
            ("work".to_string(), 3),
            ("home".to_string(), 5),
            ("misc".to_string(), 5),
        ]);

        let names = tags.iter().map(|tag| tag.tag.as_str()).collect::<Vec<_>>();
        assert_eq!(names, vec!["home", "misc", "work"]);
    }

    #[test]
    fn blank_tags_are_grouped_as_untagged() {
        let tags = tag_distribution([
            ("".to_string(), 1),
            ("work".to_string(), 1),
            ("  ".to_string(), 2),
        ]);

        assert_eq!(tags[0].tag, "untagged");
        assert_eq!(tags[0].count, 3);
        assert_eq!(tags[1].tag, "work");
    }

    #[test]
    fn repeated_tags_merge_into_first_position() {
        let tags = tag_distribution([
            ("gym".to_string(), 2),
            ("read".to_string(), 4),
            (" gym ".to_string(), 2),
        ]);

        assert_eq!(tags.len(), 2);
        assert_eq!((tags[0].tag.as_str(), tags[0].count), ("gym", 4));
        assert_eq!((tags[1].tag.as_str(), tags[1].count), ("read", 4));
    }
}
