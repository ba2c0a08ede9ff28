use anyhow::{Context, Result};
use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};

/// Drops a plain-text one-time-code message into `dir`, one file per
/// message, for whatever relay picks mail up from there.
pub fn write_otp_message(dir: &Path, email: &str, otp: &str, ttl_minutes: u32) -> Result<PathBuf> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create outbox directory: {}", dir.display()))?;

    let now = Utc::now();
    let file_name = format!(
        "{}-{}.txt",
        now.format("%Y%m%dT%H%M%S%.3f"),
        sanitize_recipient(email)
    );
    let path = dir.join(file_name);

    let body = format!(
        "To: {email}\nSubject: Your verification code\nDate: {}\n\nYour one-time code is {otp}.\nIt expires in {ttl_minutes} minutes.\n",
        now.to_rfc3339()
    );

    fs::write(&path, body)
        .with_context(|| format!("Failed to write outbox message: {}", path.display()))?;

    Ok(path)
}

fn sanitize_recipient(email: &str) -> String {
    email
        .trim()
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '.' || ch == '-' {
                ch
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::write_otp_message;
    use std::fs;

    #[test]
    fn writes_one_message_per_code() {
        let dir = tempfile::tempdir().expect("tempdir");
        let outbox = dir.path().join("outbox");

        let path = write_otp_message(&outbox, "mia@example.com", "123456", 10)
            .expect("message written");

        assert!(path.starts_with(&outbox));
        assert!(
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.ends_with("mia_example.com.txt"))
        );

        let body = fs::read_to_string(&path).expect("read message");
        assert!(body.starts_with("To: mia@example.com\n"));
        assert!(body.contains("123456"));
        assert!(body.contains("10 minutes"));
    }
}
