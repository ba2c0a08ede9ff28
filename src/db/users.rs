use crate::db::{Database, Role};
use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{OptionalExtension, Row, params};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub is_verified: bool,
    pub avatar: String,
    pub bio: String,
    pub role: Role,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user: UserRow,
    pub password_hash: String,
}

#[derive(Debug, Clone)]
pub struct OtpState {
    pub user_id: i64,
    pub otp_hash: Option<String>,
    pub otp_expires_at: Option<i64>,
}

const USER_COLUMNS: &str =
    "id, username, email, is_verified, avatar, bio, role, created_at, updated_at";

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    let role: String = row.get(6)?;
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        is_verified: row.get(3)?,
        avatar: row.get(4)?,
        bio: row.get(5)?,
        role: Role::parse(&role).unwrap_or(Role::User),
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

impl Database {
    pub fn create_user(&self, username: &str, email: &str, password_hash: &str) -> Result<UserRow> {
        let now = Utc::now().timestamp();
        self.conn
            .execute(
                "INSERT INTO users (username, email, password_hash, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?4)",
                params![username, email, password_hash, now],
            )
            .context("Failed to insert user")?;

        let id = self.conn.last_insert_rowid();
        self.user(id)?.context("Inserted user not found")
    }

    pub fn user(&self, id: i64) -> Result<Option<UserRow>> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                params![id],
                user_from_row,
            )
            .optional()
            .context("Failed to query user")?;

        Ok(row)
    }

    /// Returns which of `username` / `email` is already registered, username first.
    pub fn taken_identity(&self, username: &str, email: &str) -> Result<Option<&'static str>> {
        let existing = self
            .conn
            .query_row(
                "SELECT username = ?1, email = ?2 FROM users
                 WHERE username = ?1 OR email = ?2
                 ORDER BY username = ?1 DESC
                 LIMIT 1",
                params![username, email],
                |row| Ok((row.get::<_, bool>(0)?, row.get::<_, bool>(1)?)),
            )
            .optional()
            .context("Failed to check existing users")?;

        Ok(existing.map(|(same_username, _)| if same_username { "username" } else { "email" }))
    }

    pub fn credentials_by_username(&self, username: &str) -> Result<Option<UserCredentials>> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {USER_COLUMNS}, password_hash FROM users WHERE username = ?1"),
                params![username],
                |row| {
                    Ok(UserCredentials {
                        user: user_from_row(row)?,
                        password_hash: row.get(9)?,
                    })
                },
            )
            .optional()
            .context("Failed to query user credentials")?;

        Ok(row)
    }

    pub fn otp_state_by_email(&self, email: &str) -> Result<Option<OtpState>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, otp_hash, otp_expires_at FROM users WHERE email = ?1",
                params![email],
                |row| {
                    Ok(OtpState {
                        user_id: row.get(0)?,
                        otp_hash: row.get(1)?,
                        otp_expires_at: row.get(2)?,
                    })
                },
            )
            .optional()
            .context("Failed to query OTP state")?;

        Ok(row)
    }

    pub fn store_otp(&self, user_id: i64, otp_hash: &str, expires_at: i64) -> Result<()> {
        self.conn
            .execute(
                "UPDATE users SET otp_hash = ?2, otp_expires_at = ?3, updated_at = ?4 WHERE id = ?1",
                params![user_id, otp_hash, expires_at, Utc::now().timestamp()],
            )
            .context("Failed to store OTP")?;

        Ok(())
    }

    /// Clears the OTP and marks the email address as verified.
    pub fn consume_otp(&self, user_id: i64) -> Result<()> {
        self.conn
            .execute(
                "UPDATE users SET otp_hash = NULL, otp_expires_at = NULL, is_verified = 1, updated_at = ?2
                 WHERE id = ?1",
                params![user_id, Utc::now().timestamp()],
            )
            .context("Failed to consume OTP")?;

        Ok(())
    }

    /// Replaces the password and revokes every session of the user.
    pub fn reset_password(&mut self, user_id: i64, password_hash: &str) -> Result<()> {
        let transaction = self
            .conn
            .transaction()
            .context("Failed to start transaction")?;

        transaction
            .execute(
                "UPDATE users SET password_hash = ?2, updated_at = ?3 WHERE id = ?1",
                params![user_id, password_hash, Utc::now().timestamp()],
            )
            .context("Failed to update password")?;
        transaction
            .execute("DELETE FROM sessions WHERE user_id = ?1", params![user_id])
            .context("Failed to revoke sessions")?;

        transaction
            .commit()
            .context("Failed to commit password reset")?;
        Ok(())
    }

    pub fn update_profile(
        &self,
        user_id: i64,
        bio: Option<&str>,
        avatar: Option<&str>,
    ) -> Result<Option<UserRow>> {
        self.conn
            .execute(
                "UPDATE users SET bio = COALESCE(?2, bio), avatar = COALESCE(?3, avatar), updated_at = ?4
                 WHERE id = ?1",
                params![user_id, bio, avatar, Utc::now().timestamp()],
            )
            .context("Failed to update profile")?;

        self.user(user_id)
    }

    pub fn set_role(&self, username: &str, role: Role) -> Result<bool> {
        let updated = self
            .conn
            .execute(
                "UPDATE users SET role = ?2, updated_at = ?3 WHERE username = ?1",
                params![username, role.as_str(), Utc::now().timestamp()],
            )
            .context("Failed to update role")?;

        Ok(updated > 0)
    }

    pub fn list_users(&self) -> Result<Vec<UserRow>> {
        let mut statement = self.conn.prepare(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at ASC, id ASC"
        ))?;

        let rows = statement
            .query_map([], user_from_row)?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to list users")?;

        Ok(rows)
    }

    /// Removes the user; tasks, goals, feedback and sessions cascade.
    pub fn delete_user(&self, user_id: i64) -> Result<bool> {
        let deleted = self
            .conn
            .execute("DELETE FROM users WHERE id = ?1", params![user_id])
            .context("Failed to delete user")?;

        Ok(deleted > 0)
    }

    /// All-time `(total, completed)` task counts for one user.
    pub fn task_summary(&self, user_id: i64) -> Result<(u32, u32)> {
        let summary = self
            .conn
            .query_row(
                "SELECT COUNT(*), COALESCE(SUM(CASE WHEN status = 'completed' THEN 1 ELSE 0 END), 0)
                 FROM tasks WHERE user_id = ?1",
                params![user_id],
                |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)),
            )
            .context("Failed to summarize tasks")?;

        Ok((summary.0.max(0) as u32, summary.1.max(0) as u32))
    }

    pub fn create_session(&self, user_id: i64, token_hash: &str, expires_at: i64) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO sessions (user_id, token_hash, created_at, expires_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![user_id, token_hash, Utc::now().timestamp(), expires_at],
            )
            .context("Failed to create session")?;

        Ok(())
    }

    pub fn session_user(&self, token_hash: &str, now: i64) -> Result<Option<UserRow>> {
        let row = self
            .conn
            .query_row(
                "SELECT u.id, u.username, u.email, u.is_verified, u.avatar, u.bio, u.role,
                        u.created_at, u.updated_at
                 FROM sessions s JOIN users u ON u.id = s.user_id
                 WHERE s.token_hash = ?1 AND s.expires_at > ?2",
                params![token_hash, now],
                user_from_row,
            )
            .optional()
            .context("Failed to query session")?;

        Ok(row)
    }

    pub fn delete_session(&self, token_hash: &str) -> Result<bool> {
        let deleted = self
            .conn
            .execute(
                "DELETE FROM sessions WHERE token_hash = ?1",
                params![token_hash],
            )
            .context("Failed to delete session")?;

        Ok(deleted > 0)
    }

    pub fn cleanup_expired_sessions(&self, now: i64) -> Result<usize> {
        let deleted = self
            .conn
            .execute("DELETE FROM sessions WHERE expires_at <= ?1", params![now])
            .context("Failed to clean up expired sessions")?;

        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use crate::db::Role;
    use crate::db::test_support::temp_database;

    #[test]
    fn detects_taken_username_before_email() {
        let (_dir, database) = temp_database();
        database
            .create_user("carol", "carol@example.com", "hash")
            .expect("user");

        assert_eq!(
            database
                .taken_identity("carol", "other@example.com")
                .unwrap(),
            Some("username")
        );
        assert_eq!(
            database.taken_identity("dave", "carol@example.com").unwrap(),
            Some("email")
        );
        assert_eq!(
            database.taken_identity("dave", "dave@example.com").unwrap(),
            None
        );
    }

    #[test]
    fn sessions_expire_and_cascade_with_user() {
        let (_dir, database) = temp_database();
        let user = database
            .create_user("erin", "erin@example.com", "hash")
            .expect("user");

        database.create_session(user.id, "token-a", 100).unwrap();
        assert!(database.session_user("token-a", 50).unwrap().is_some());
        assert!(database.session_user("token-a", 100).unwrap().is_none());

        database.create_session(user.id, "token-b", 1_000).unwrap();
        assert!(database.delete_user(user.id).unwrap());
        assert!(database.session_user("token-b", 50).unwrap().is_none());
    }

    #[test]
    fn password_reset_revokes_sessions() {
        let (_dir, mut database) = temp_database();
        let user = database
            .create_user("frank", "frank@example.com", "old")
            .expect("user");
        database.create_session(user.id, "token", 1_000).unwrap();

        database.reset_password(user.id, "new").unwrap();

        assert!(database.session_user("token", 50).unwrap().is_none());
        let credentials = database
            .credentials_by_username("frank")
            .unwrap()
            .expect("credentials");
        assert_eq!(credentials.password_hash, "new");
    }

    #[test]
    fn promote_to_admin() {
        let (_dir, database) = temp_database();
        let user = database
            .create_user("grace", "grace@example.com", "hash")
            .expect("user");
        assert_eq!(user.role, Role::User);

        assert!(database.set_role("grace", Role::Admin).unwrap());
        assert!(!database.set_role("nobody", Role::Admin).unwrap());
        assert_eq!(database.user(user.id).unwrap().unwrap().role, Role::Admin);
    }
}
