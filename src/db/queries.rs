pub const CREATE_USERS: &str = r#"
CREATE TABLE IF NOT EXISTS users (
  id             INTEGER PRIMARY KEY AUTOINCREMENT,
  username       TEXT NOT NULL UNIQUE,
  email          TEXT NOT NULL UNIQUE,
  password_hash  TEXT NOT NULL,
  is_verified    INTEGER NOT NULL DEFAULT 0,
  avatar         TEXT NOT NULL DEFAULT '',
  bio            TEXT NOT NULL DEFAULT '',
  role           TEXT NOT NULL DEFAULT 'user',
  otp_hash       TEXT,
  otp_expires_at INTEGER,
  created_at     INTEGER NOT NULL,
  updated_at     INTEGER NOT NULL
);
"#;

pub const CREATE_SESSIONS: &str = r#"
CREATE TABLE IF NOT EXISTS sessions (
  id          INTEGER PRIMARY KEY AUTOINCREMENT,
  user_id     INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
  token_hash  TEXT NOT NULL UNIQUE,
  created_at  INTEGER NOT NULL,
  expires_at  INTEGER NOT NULL
);
"#;

pub const CREATE_TASKS: &str = r#"
CREATE TABLE IF NOT EXISTS tasks (
  id          INTEGER PRIMARY KEY AUTOINCREMENT,
  user_id     INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
  title       TEXT NOT NULL,
  tag         TEXT,
  priority    TEXT,
  status      TEXT NOT NULL DEFAULT 'pending',
  date        TEXT NOT NULL,
  created_at  INTEGER NOT NULL,
  updated_at  INTEGER NOT NULL
);
"#;

pub const CREATE_GOALS: &str = r#"
CREATE TABLE IF NOT EXISTS goals (
  id           INTEGER PRIMARY KEY AUTOINCREMENT,
  user_id      INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
  title        TEXT NOT NULL,
  goal_type    TEXT NOT NULL,
  year         INTEGER NOT NULL,
  month        INTEGER,
  quarter      INTEGER,
  is_completed INTEGER NOT NULL DEFAULT 0,
  created_at   INTEGER NOT NULL,
  updated_at   INTEGER NOT NULL
);
"#;

pub const CREATE_FEEDBACK: &str = r#"
CREATE TABLE IF NOT EXISTS feedback (
  id          INTEGER PRIMARY KEY AUTOINCREMENT,
  user_id     INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
  kind        TEXT NOT NULL,
  message     TEXT NOT NULL,
  status      TEXT NOT NULL DEFAULT 'pending',
  created_at  INTEGER NOT NULL,
  updated_at  INTEGER NOT NULL
);
"#;

pub const INDEX_TASKS_USER_DATE: &str =
    "CREATE INDEX IF NOT EXISTS idx_tasks_user_date ON tasks(user_id, date);";

pub const INDEX_TASKS_STATUS_DATE: &str =
    "CREATE INDEX IF NOT EXISTS idx_tasks_status_date ON tasks(status, date);";

pub const INDEX_SESSIONS_USER: &str =
    "CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id);";

pub const INDEX_GOALS_USER: &str = "CREATE INDEX IF NOT EXISTS idx_goals_user ON goals(user_id);";

pub const INDEX_FEEDBACK_USER: &str =
    "CREATE INDEX IF NOT EXISTS idx_feedback_user ON feedback(user_id);";

pub fn schema_statements() -> Vec<&'static str> {
    vec![
        CREATE_USERS,
        CREATE_SESSIONS,
        CREATE_TASKS,
        CREATE_GOALS,
        CREATE_FEEDBACK,
        INDEX_TASKS_USER_DATE,
        INDEX_TASKS_STATUS_DATE,
        INDEX_SESSIONS_USER,
        INDEX_GOALS_USER,
        INDEX_FEEDBACK_USER,
    ]
}
