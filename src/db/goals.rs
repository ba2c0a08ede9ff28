use crate::db::{Database, GoalType};
use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::types::Value;
use rusqlite::{OptionalExtension, Row, params, params_from_iter};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct GoalRow {
    pub id: i64,
    pub title: String,
    #[serde(rename = "type")]
    pub goal_type: GoalType,
    pub year: i32,
    pub month: Option<u32>,
    pub quarter: Option<u32>,
    pub is_completed: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone)]
pub struct NewGoal {
    pub title: String,
    pub goal_type: GoalType,
    pub year: i32,
    pub month: Option<u32>,
    pub quarter: Option<u32>,
}

#[derive(Debug, Clone, Default)]
pub struct GoalUpdate {
    pub title: Option<String>,
    pub is_completed: Option<bool>,
}

/// Month and quarter only narrow the matching goal type, as a monthly goal
/// has no quarter and a quarterly goal has no month.
#[derive(Debug, Clone, Default)]
pub struct GoalFilter {
    pub goal_type: Option<GoalType>,
    pub year: Option<i32>,
    pub month: Option<u32>,
    pub quarter: Option<u32>,
}

const GOAL_COLUMNS: &str =
    "id, title, goal_type, year, month, quarter, is_completed, created_at, updated_at";

fn goal_from_row(row: &Row<'_>) -> rusqlite::Result<GoalRow> {
    let goal_type: String = row.get(2)?;
    Ok(GoalRow {
        id: row.get(0)?,
        title: row.get(1)?,
        goal_type: GoalType::parse(&goal_type).unwrap_or(GoalType::Yearly),
        year: row.get(3)?,
        month: row.get(4)?,
        quarter: row.get(5)?,
        is_completed: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

impl Database {
    pub fn create_goal(&self, owner: i64, goal: &NewGoal) -> Result<GoalRow> {
        let now = Utc::now().timestamp();
        self.conn
            .execute(
                "INSERT INTO goals (user_id, title, goal_type, year, month, quarter, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
                params![
                    owner,
                    goal.title,
                    goal.goal_type.as_str(),
                    goal.year,
                    goal.month,
                    goal.quarter,
                    now
                ],
            )
            .context("Failed to insert goal")?;

        let id = self.conn.last_insert_rowid();
        self.goal(owner, id)?.context("Inserted goal not found")
    }

    pub fn goal(&self, owner: i64, id: i64) -> Result<Option<GoalRow>> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {GOAL_COLUMNS} FROM goals WHERE id = ?1 AND user_id = ?2"),
                params![id, owner],
                goal_from_row,
            )
            .optional()
            .context("Failed to query goal")?;

        Ok(row)
    }

    pub fn list_goals(&self, owner: i64, filter: &GoalFilter) -> Result<Vec<GoalRow>> {
        let mut sql = format!("SELECT {GOAL_COLUMNS} FROM goals WHERE user_id = ?1");
        let mut values = vec![Value::Integer(owner)];

        let mut push = |clause: &str, value: Value| {
            values.push(value);
            sql.push_str(&format!(" AND {clause} = ?{}", values.len()));
        };

        if let Some(goal_type) = filter.goal_type {
            push("goal_type", Value::Text(goal_type.as_str().to_string()));

            if let Some(year) = filter.year {
                push("year", Value::Integer(i64::from(year)));
            }
            match (goal_type, filter.month, filter.quarter) {
                (GoalType::Monthly, Some(month), _) => {
                    push("month", Value::Integer(i64::from(month)));
                }
                (GoalType::Quarterly, _, Some(quarter)) => {
                    push("quarter", Value::Integer(i64::from(quarter)));
                }
                _ => {}
            }
        }
        sql.push_str(" ORDER BY year ASC, id ASC");

        let mut statement = self.conn.prepare(&sql)?;
        let rows = statement
            .query_map(params_from_iter(values.iter()), goal_from_row)?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to list goals")?;

        Ok(rows)
    }

    pub fn update_goal(&self, owner: i64, id: i64, update: &GoalUpdate) -> Result<Option<GoalRow>> {
        let updated = self
            .conn
            .execute(
                "UPDATE goals SET title = COALESCE(?3, title), is_completed = COALESCE(?4, is_completed), updated_at = ?5
                 WHERE id = ?1 AND user_id = ?2",
                params![
                    id,
                    owner,
                    update.title,
                    update.is_completed,
                    Utc::now().timestamp()
                ],
            )
            .context("Failed to update goal")?;

        if updated == 0 {
            return Ok(None);
        }
        self.goal(owner, id)
    }

    pub fn delete_goal(&self, owner: i64, id: i64) -> Result<bool> {
        let deleted = self
            .conn
            .execute(
                "DELETE FROM goals WHERE id = ?1 AND user_id = ?2",
                params![id, owner],
            )
            .context("Failed to delete goal")?;

        Ok(deleted > 0)
    }

    pub fn delete_all_goals(&self, owner: i64) -> Result<usize> {
        let deleted = self
            .conn
            .execute("DELETE FROM goals WHERE user_id = ?1", params![owner])
            .context("Failed to delete goals")?;

        Ok(deleted)
    }
}
