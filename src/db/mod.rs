pub mod feedback;
pub mod goals;
pub mod queries;
pub mod tasks;
pub mod users;

use crate::stats::trend::DayCounts;
use crate::stats::{TaskStore, TaskTotals};
use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use rusqlite::{Connection, params};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

pub use feedback::{FeedbackFilter, FeedbackRow, FeedbackUpdate};
pub use goals::{GoalFilter, GoalRow, GoalUpdate, NewGoal};
pub use tasks::{NewTask, TaskFilter, TaskRow, TaskUpdate};
pub use users::{OtpState, UserRow};

/// Closed set of text values stored in a column.
macro_rules! text_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "lowercase")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }

            pub fn parse(raw: &str) -> Option<Self> {
                match raw.trim().to_lowercase().as_str() {
                    $($text => Some(Self::$variant),)+
                    _ => None,
                }
            }

            pub fn expected() -> String {
                Self::ALL
                    .iter()
                    .map(|value| value.as_str())
                    .collect::<Vec<_>>()
                    .join("|")
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

text_enum!(TaskStatus {
    Pending => "pending",
    Completed => "completed",
    Missed => "missed",
});

text_enum!(Priority {
    Low => "low",
    Medium => "medium",
    High => "high",
});

text_enum!(Role {
    User => "user",
    Admin => "admin",
});

text_enum!(GoalType {
    Monthly => "monthly",
    Quarterly => "quarterly",
    Yearly => "yearly",
});

text_enum!(FeedbackKind {
    Bug => "bug",
    Suggestion => "suggestion",
    Feedback => "feedback",
});

text_enum!(FeedbackStatus {
    Pending => "pending",
    Resolved => "resolved",
});

impl TaskStatus {
    /// Rows written by older schemas may carry no or unknown status.
    pub fn from_stored(raw: Option<&str>) -> Self {
        raw.and_then(Self::parse).unwrap_or(Self::Pending)
    }
}

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create DB directory: {}", parent.display()))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open SQLite DB: {}", path.display()))?;

        let database = Self { conn };
        database.init_schema()?;

        Ok(database)
    }

    pub fn init_schema(&self) -> Result<()> {
        self.conn
            .pragma_update(None, "foreign_keys", true)
            .context("Failed to enable foreign keys")?;

        queries::schema_statements()
            .iter()
            .try_for_each(|statement| {
                self.conn
                    .execute(statement, [])
                    .context("Failed to initialize schema")
                    .map(|_| ())
            })
    }

    /// Marks every pending task dated on or before `today` as missed.
    /// Runs as one statement, so a failure leaves no task half-swept.
    pub fn mark_pending_as_missed(&self, today: NaiveDate) -> Result<usize> {
        let updated = self
            .conn
            .execute(
                "UPDATE tasks SET status = 'missed', updated_at = ?2
                 WHERE status = 'pending' AND date <= ?1",
                params![today, Utc::now().timestamp()],
            )
            .context("Failed to mark pending tasks as missed")?;

        Ok(updated)
    }
}

/// True when a store error came from a UNIQUE or foreign-key constraint.
pub fn is_constraint_violation(error: &anyhow::Error) -> bool {
    matches!(
        error.downcast_ref::<rusqlite::Error>(),
        Some(rusqlite::Error::SqliteFailure(failure, _))
            if failure.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

fn to_u32(value: i64) -> u32 {
    value.clamp(0, i64::from(u32::MAX)) as u32
}

impl TaskStore for Database {
    fn completed_dates(
        &self,
        owner: i64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<NaiveDate>> {
        let mut statement = self.conn.prepare(
            "SELECT DISTINCT date FROM tasks
             WHERE user_id = ?1 AND date >= ?2 AND date <= ?3 AND status = 'completed'
             ORDER BY date ASC",
        )?;

        let dates = statement
            .query_map(params![owner, from, to], |row| row.get::<_, NaiveDate>(0))?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to query completed dates")?;

        Ok(dates)
    }

    fn count_by_date(
        &self,
        owner: i64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<BTreeMap<NaiveDate, DayCounts>> {
        let mut statement = self.conn.prepare(
            "SELECT date,
                    COUNT(*),
                    SUM(CASE WHEN status = 'completed' THEN 1 ELSE 0 END),
                    SUM(CASE WHEN status = 'missed' THEN 1 ELSE 0 END)
             FROM tasks
             WHERE user_id = ?1 AND date >= ?2 AND date <= ?3
             GROUP BY date
             ORDER BY date ASC",
        )?;

        let rows = statement
            .query_map(params![owner, from, to], |row| {
                let total: i64 = row.get(1)?;
                let completed: i64 = row.get(2)?;
                let missed: i64 = row.get(3)?;
                // Anything neither completed nor missed counts as pending.
                Ok((
                    row.get::<_, NaiveDate>(0)?,
                    DayCounts {
                        completed: to_u32(completed),
                        pending: to_u32(total - completed - missed),
                        missed: to_u32(missed),
                    },
                ))
            })?
            .collect::<Result<BTreeMap<_, _>, _>>()
            .context("Failed to query per-date task counts")?;

        Ok(rows)
    }

    fn count_by_tag(
        &self,
        owner: i64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<(String, u64)>> {
        let mut statement = self.conn.prepare(
            "SELECT COALESCE(TRIM(tag), '') AS tag_name, COUNT(*)
             FROM tasks
             WHERE user_id = ?1 AND date >= ?2 AND date <= ?3
             GROUP BY tag_name
             ORDER BY MIN(id) ASC",
        )?;

        let rows = statement
            .query_map(params![owner, from, to], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?.max(0) as u64))
            })?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to query tag counts")?;

        Ok(rows)
    }

    fn count_totals(&self, owner: i64, from: NaiveDate, to: NaiveDate) -> Result<TaskTotals> {
        let totals = self
            .conn
            .query_row(
                "SELECT COUNT(*),
                        COALESCE(SUM(CASE WHEN status = 'completed' THEN 1 ELSE 0 END), 0),
                        COALESCE(SUM(CASE WHEN status = 'missed' THEN 1 ELSE 0 END), 0),
                        COALESCE(SUM(CASE WHEN priority = 'low' THEN 1 ELSE 0 END), 0),
                        COALESCE(SUM(CASE WHEN priority = 'medium' THEN 1 ELSE 0 END), 0),
                        COALESCE(SUM(CASE WHEN priority = 'high' THEN 1 ELSE 0 END), 0)
                 FROM tasks
                 WHERE user_id = ?1 AND date >= ?2 AND date <= ?3",
                params![owner, from, to],
                |row| {
                    let total: i64 = row.get(0)?;
                    let completed: i64 = row.get(1)?;
                    let missed: i64 = row.get(2)?;
                    Ok(TaskTotals {
                        total: to_u32(total),
                        completed: to_u32(completed),
                        pending: to_u32(total - completed - missed),
                        missed: to_u32(missed),
                        low: to_u32(row.get(3)?),
                        medium: to_u32(row.get(4)?),
                        high: to_u32(row.get(5)?),
                    })
                },
            )
            .context("Failed to query task totals")?;

        Ok(totals)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::Database;
    use tempfile::TempDir;

    pub fn temp_database() -> (TempDir, Database) {
        let dir = tempfile::tempdir().expect("tempdir");
        let database = Database::open(&dir.path().join("test.db")).expect("open database");
        (dir, database)
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::temp_database;
    use super::{NewTask, Priority, TaskStatus, TaskUpdate, is_constraint_violation};
    use crate::stats::TaskStore;
    use chrono::NaiveDate;

    fn march(date: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, date).expect("valid date")
    }

    fn new_task(title: &str, tag: Option<&str>, date: NaiveDate) -> NewTask {
        NewTask {
            title: title.to_string(),
            tag: tag.map(ToOwned::to_owned),
            priority: Some(Priority::Medium),
            date,
        }
    }

    #[test]
    fn task_store_queries_aggregate_by_date_and_tag() {
        let (_dir, database) = temp_database();
        let user = database
            .create_user("alice", "alice@example.com", "hash")
            .expect("user");

        let first = database
            .create_task(user.id, &new_task("write", Some("work"), march(4)))
            .expect("task");
        database
            .create_task(user.id, &new_task("cook", Some("home"), march(4)))
            .expect("task");
        database
            .create_task(user.id, &new_task("clean", Some("home"), march(5)))
            .expect("task");
        database
            .create_task(user.id, &new_task("read", None, march(20)))
            .expect("task");

        database
            .update_task(
                user.id,
                first.id,
                &TaskUpdate {
                    status: Some(TaskStatus::Completed),
                    ..TaskUpdate::default()
                },
            )
            .expect("update")
            .expect("task exists");

        let dates = database
            .completed_dates(user.id, march(1), march(10))
            .expect("dates");
        assert_eq!(dates, vec![march(4)]);

        let by_date = database
            .count_by_date(user.id, march(1), march(10))
            .expect("by date");
        assert_eq!(by_date.len(), 2);
        assert_eq!(by_date[&march(4)].completed, 1);
        assert_eq!(by_date[&march(4)].pending, 1);

        let tags = database
            .count_by_tag(user.id, march(1), march(31))
            .expect("tags");
        assert_eq!(
            tags,
            vec![
                ("work".to_string(), 1),
                ("home".to_string(), 2),
                ("".to_string(), 1)
            ]
        );

        let totals = database
            .count_totals(user.id, march(1), march(10))
            .expect("totals");
        assert_eq!(totals.total, 3);
        assert_eq!(totals.completed, 1);
        assert_eq!(totals.pending, 2);
        assert_eq!(totals.medium, 3);
    }

    #[test]
    fn sweep_only_touches_pending_tasks_up_to_today() {
        let (_dir, database) = temp_database();
        let user = database
            .create_user("bob", "bob@example.com", "hash")
            .expect("user");

        let done = database
            .create_task(user.id, &new_task("done", None, march(9)))
            .expect("task");
        database
            .update_task(
                user.id,
                done.id,
                &TaskUpdate {
                    status: Some(TaskStatus::Completed),
                    ..TaskUpdate::default()
                },
            )
            .expect("update");
        database
            .create_task(user.id, &new_task("yesterday", None, march(9)))
            .expect("task");
        database
            .create_task(user.id, &new_task("today", None, march(10)))
            .expect("task");
        database
            .create_task(user.id, &new_task("tomorrow", None, march(11)))
            .expect("task");

        let updated = database.mark_pending_as_missed(march(10)).expect("sweep");
        assert_eq!(updated, 2);

        let totals = database
            .count_totals(user.id, march(1), march(31))
            .expect("totals");
        assert_eq!(totals.missed, 2);
        assert_eq!(totals.completed, 1);
        assert_eq!(totals.pending, 1);

        assert_eq!(database.mark_pending_as_missed(march(10)).expect("sweep"), 0);
    }

    #[test]
    fn unknown_stored_status_reads_as_pending() {
        assert_eq!(TaskStatus::from_stored(None), TaskStatus::Pending);
        assert_eq!(TaskStatus::from_stored(Some("archived")), TaskStatus::Pending);
        assert_eq!(TaskStatus::from_stored(Some("Missed")), TaskStatus::Missed);
    }

    #[test]
    fn duplicate_user_is_a_constraint_violation() {
        let (_dir, database) = temp_database();
        database
            .create_user("zed", "zed@example.com", "h")
            .expect("first user");

        let duplicate = database
            .create_user("zed", "other@example.com", "h")
            .expect_err("duplicate username");
        assert!(is_constraint_violation(&duplicate));

        assert!(!is_constraint_violation(&anyhow::anyhow!("disk on fire")));
    }
}
