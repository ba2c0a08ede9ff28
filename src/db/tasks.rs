use crate::db::{Database, Priority, TaskStatus};
use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use rusqlite::types::Value;
use rusqlite::{OptionalExtension, Row, params, params_from_iter};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct TaskRow {
    pub id: i64,
    pub title: String,
    pub tag: Option<String>,
    pub priority: Option<Priority>,
    pub status: TaskStatus,
    pub date: NaiveDate,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone)]
pub struct NewTask {
    pub title: String,
    pub tag: Option<String>,
    pub priority: Option<Priority>,
    pub date: NaiveDate,
}

/// Fields left as `None` keep their stored value. An empty tag clears it.
#[derive(Debug, Clone, Default)]
pub struct TaskUpdate {
    pub title: Option<String>,
    pub tag: Option<String>,
    pub priority: Option<Priority>,
    pub status: Option<TaskStatus>,
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub tag: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<Priority>,
    pub date: Option<NaiveDate>,
}

const TASK_COLUMNS: &str = "id, title, tag, priority, status, date, created_at, updated_at";

fn task_from_row(row: &Row<'_>) -> rusqlite::Result<TaskRow> {
    let priority: Option<String> = row.get(3)?;
    let status: Option<String> = row.get(4)?;
    Ok(TaskRow {
        id: row.get(0)?,
        title: row.get(1)?,
        tag: row.get(2)?,
        priority: priority.as_deref().and_then(Priority::parse),
        status: TaskStatus::from_stored(status.as_deref()),
        date: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

impl Database {
    pub fn create_task(&self, owner: i64, task: &NewTask) -> Result<TaskRow> {
        let now = Utc::now().timestamp();
        self.conn
            .execute(
                "INSERT INTO tasks (user_id, title, tag, priority, status, date, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, 'pending', ?5, ?6, ?6)",
                params![
                    owner,
                    task.title,
                    task.tag,
                    task.priority.map(|priority| priority.as_str()),
                    task.date,
                    now
                ],
            )
            .context("Failed to insert task")?;

        let id = self.conn.last_insert_rowid();
        self.task(owner, id)?.context("Inserted task not found")
    }

    pub fn task(&self, owner: i64, id: i64) -> Result<Option<TaskRow>> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1 AND user_id = ?2"),
                params![id, owner],
                task_from_row,
            )
            .optional()
            .context("Failed to query task")?;

        Ok(row)
    }

    pub fn list_tasks(&self, owner: i64, filter: &TaskFilter) -> Result<Vec<TaskRow>> {
        let mut sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE user_id = ?1");
        let mut values = vec![Value::Integer(owner)];

        let mut push = |clause: &str, value: Value| {
            values.push(value);
            sql.push_str(&format!(" AND {clause} = ?{}", values.len()));
        };

        if let Some(tag) = &filter.tag {
            push("tag", Value::Text(tag.clone()));
        }
        if let Some(status) = filter.status {
            push("status", Value::Text(status.as_str().to_string()));
        }
        if let Some(priority) = filter.priority {
            push("priority", Value::Text(priority.as_str().to_string()));
        }
        if let Some(date) = filter.date {
            push("date", Value::Text(date.format("%Y-%m-%d").to_string()));
        }
        sql.push_str(" ORDER BY date ASC, id ASC");

        let mut statement = self.conn.prepare(&sql)?;
        let rows = statement
            .query_map(params_from_iter(values.iter()), task_from_row)?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to list tasks")?;

        Ok(rows)
    }

    pub fn update_task(&self, owner: i64, id: i64, update: &TaskUpdate) -> Result<Option<TaskRow>> {
        let Some(existing) = self.task(owner, id)? else {
            return Ok(None);
        };

        let tag = match update.tag.as_deref().map(str::trim) {
            Some("") => None,
            Some(tag) => Some(tag.to_string()),
            None => existing.tag,
        };

        self.conn
            .execute(
                "UPDATE tasks SET title = ?3, tag = ?4, priority = ?5, status = ?6, date = ?7, updated_at = ?8
                 WHERE id = ?1 AND user_id = ?2",
                params![
                    id,
                    owner,
                    update.title.as_ref().unwrap_or(&existing.title),
                    tag,
                    update
                        .priority
                        .or(existing.priority)
                        .map(|priority| priority.as_str()),
                    update.status.unwrap_or(existing.status).as_str(),
                    update.date.unwrap_or(existing.date),
                    Utc::now().timestamp()
                ],
            )
            .context("Failed to update task")?;

        self.task(owner, id)
    }

    pub fn delete_task(&self, owner: i64, id: i64) -> Result<bool> {
        let deleted = self
            .conn
            .execute(
                "DELETE FROM tasks WHERE id = ?1 AND user_id = ?2",
                params![id, owner],
            )
            .context("Failed to delete task")?;

        Ok(deleted > 0)
    }

    pub fn delete_all_tasks(&self, owner: i64) -> Result<usize> {
        let deleted = self
            .conn
            .execute("DELETE FROM tasks WHERE user_id = ?1", params![owner])
            .context("Failed to delete tasks")?;

        Ok(deleted)
    }
}
