use crate::db::{Database, FeedbackKind, FeedbackStatus};
use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::types::Value;
use rusqlite::{OptionalExtension, Row, params, params_from_iter};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct FeedbackRow {
    pub id: i64,
    pub user_id: i64,
    pub username: String,
    #[serde(rename = "type")]
    pub kind: FeedbackKind,
    pub message: String,
    pub status: FeedbackStatus,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Default)]
pub struct FeedbackFilter {
    /// `None` lists every user's feedback.
    pub owner: Option<i64>,
    pub status: Option<FeedbackStatus>,
    pub kind: Option<FeedbackKind>,
}

#[derive(Debug, Clone, Default)]
pub struct FeedbackUpdate {
    pub kind: Option<FeedbackKind>,
    pub message: Option<String>,
    pub status: Option<FeedbackStatus>,
}

const FEEDBACK_SELECT: &str = "SELECT f.id, f.user_id, u.username, f.kind, f.message, f.status, f.created_at, f.updated_at
     FROM feedback f JOIN users u ON u.id = f.user_id";

fn feedback_from_row(row: &Row<'_>) -> rusqlite::Result<FeedbackRow> {
    let kind: String = row.get(3)?;
    let status: String = row.get(5)?;
    Ok(FeedbackRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        username: row.get(2)?,
        kind: FeedbackKind::parse(&kind).unwrap_or(FeedbackKind::Feedback),
        message: row.get(4)?,
        status: FeedbackStatus::parse(&status).unwrap_or(FeedbackStatus::Pending),
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

impl Database {
    pub fn create_feedback(
        &self,
        owner: i64,
        kind: FeedbackKind,
        message: &str,
    ) -> Result<FeedbackRow> {
        let now = Utc::now().timestamp();
        self.conn
            .execute(
                "INSERT INTO feedback (user_id, kind, message, status, created_at, updated_at)
                 VALUES (?1, ?2, ?3, 'pending', ?4, ?4)",
                params![owner, kind.as_str(), message, now],
            )
            .context("Failed to insert feedback")?;

        let id = self.conn.last_insert_rowid();
        self.feedback(id)?.context("Inserted feedback not found")
    }

    pub fn feedback(&self, id: i64) -> Result<Option<FeedbackRow>> {
        let row = self
            .conn
            .query_row(
                &format!("{FEEDBACK_SELECT} WHERE f.id = ?1"),
                params![id],
                feedback_from_row,
            )
            .optional()
            .context("Failed to query feedback")?;

        Ok(row)
    }

    /// Newest activity first.
    pub fn list_feedback(&self, filter: &FeedbackFilter) -> Result<Vec<FeedbackRow>> {
        let mut sql = format!("{FEEDBACK_SELECT} WHERE 1 = 1");
        let mut values = Vec::new();

        let mut push = |clause: &str, value: Value| {
            values.push(value);
            sql.push_str(&format!(" AND {clause} = ?{}", values.len()));
        };

        if let Some(owner) = filter.owner {
            push("f.user_id", Value::Integer(owner));
        }
        if let Some(status) = filter.status {
            push("f.status", Value::Text(status.as_str().to_string()));
        }
        if let Some(kind) = filter.kind {
            push("f.kind", Value::Text(kind.as_str().to_string()));
        }
        sql.push_str(" ORDER BY f.updated_at DESC, f.id DESC");

        let mut statement = self.conn.prepare(&sql)?;
        let rows = statement
            .query_map(params_from_iter(values.iter()), feedback_from_row)?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to list feedback")?;

        Ok(rows)
    }

    /// `owner = None` lets an admin update any entry.
    pub fn update_feedback(
        &self,
        owner: Option<i64>,
        id: i64,
        update: &FeedbackUpdate,
    ) -> Result<Option<FeedbackRow>> {
        let updated = self
            .conn
            .execute(
                "UPDATE feedback
                 SET kind = COALESCE(?3, kind), message = COALESCE(?4, message),
                     status = COALESCE(?5, status), updated_at = ?6
                 WHERE id = ?1 AND (?2 IS NULL OR user_id = ?2)",
                params![
                    id,
                    owner,
                    update.kind.map(|kind| kind.as_str()),
                    update.message,
                    update.status.map(|status| status.as_str()),
                    Utc::now().timestamp()
                ],
            )
            .context("Failed to update feedback")?;

        if updated == 0 {
            return Ok(None);
        }
        self.feedback(id)
    }

    pub fn delete_feedback(&self, owner: i64, id: i64) -> Result<bool> {
        let deleted = self
            .conn
            .execute(
                "DELETE FROM feedback WHERE id = ?1 AND user_id = ?2",
                params![id, owner],
            )
            .context("Failed to delete feedback")?;

        Ok(deleted > 0)
    }
}
