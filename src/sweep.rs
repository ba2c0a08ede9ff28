use crate::db::Database;
use anyhow::Result;
use chrono::NaiveDate;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepOutcome {
    Completed { missed: usize },
    /// Another sweep was still running, so this trigger did nothing.
    Skipped,
}

/// Turns stale `pending` tasks into `missed`. At most one sweep runs at a
/// time per process; overlapping triggers are skipped rather than queued.
#[derive(Clone)]
pub struct Sweeper {
    db_path: PathBuf,
    running: Arc<Mutex<()>>,
}

impl Sweeper {
    pub fn new(db_path: PathBuf) -> Self {
        Self {
            db_path,
            running: Arc::new(Mutex::new(())),
        }
    }

    pub async fn run(&self, today: NaiveDate) -> Result<SweepOutcome> {
        let Ok(_guard) = self.running.try_lock() else {
            warn!(date = %today, "sweep already running, skipping trigger");
            return Ok(SweepOutcome::Skipped);
        };

        let db_path = self.db_path.clone();
        let missed = tokio::task::spawn_blocking(move || {
            Database::open(&db_path)?.mark_pending_as_missed(today)
        })
        .await??;

        info!(date = %today, missed, "pending tasks swept to missed");
        Ok(SweepOutcome::Completed { missed })
    }
}

#[cfg(test)]
mod tests {
    use super::{SweepOutcome, Sweeper};
    use crate::db::{Database, NewTask};
    use chrono::NaiveDate;

    fn march(date: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, date).expect("valid date")
    }

    #[tokio::test]
    async fn sweeps_pending_tasks_once() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db_path = dir.path().join("sweep.db");
        {
            let database = Database::open(&db_path).expect("open");
            let user = database.create_user("lou", "lou@example.com", "h").unwrap();
            database
                .create_task(
                    user.id,
                    &NewTask {
                        title: "stretch".to_string(),
                        tag: None,
                        priority: None,
                        date: march(10),
                    },
                )
                .unwrap();
        }

        let sweeper = Sweeper::new(db_path);
        assert_eq!(
            sweeper.run(march(10)).await.unwrap(),
            SweepOutcome::Completed { missed: 1 }
        );
        assert_eq!(
            sweeper.run(march(10)).await.unwrap(),
            SweepOutcome::Completed { missed: 0 }
        );
    }

    #[tokio::test]
    async fn overlapping_trigger_is_skipped() {
        let dir = tempfile::tempdir().expect("tempdir");
        let sweeper = Sweeper::new(dir.path().join("sweep.db"));

        let _held = sweeper.running.lock().await;
        assert_eq!(
            sweeper.run(march(10)).await.unwrap(),
            SweepOutcome::Skipped
        );
    }
}
