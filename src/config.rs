use anyhow::{Context, Result, anyhow, bail};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, Offset, Utc};
use dirs::home_dir;
use serde::{Deserialize, Serialize};
use std::fs;
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

const APP_DIR: &str = ".taskpulse";
const CONFIG_FILE: &str = "config.json";
const DEFAULT_SWEEP_TIME: &str = "23:55";
// +05:30, the offset the latest client revision uses for "today".
const DEFAULT_UTC_OFFSET_MINUTES: i32 = 330;
const MIN_UTC_OFFSET_MINUTES: i32 = -12 * 60;
const MAX_UTC_OFFSET_MINUTES: i32 = 14 * 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_port: u16,
    pub db_path: PathBuf,
    pub outbox_dir: PathBuf,
    pub upload_dir: PathBuf,
    pub sweep_time: String,
    pub utc_offset_minutes: i32,
    pub session_ttl_hours: u32,
    pub otp_ttl_minutes: u32,
}

impl Default for Config {
    fn default() -> Self {
        let root = default_root_dir();

        Self {
            api_port: 6002,
            db_path: root.join("db").join("taskpulse.db"),
            outbox_dir: root.join("outbox"),
            upload_dir: root.join("uploads"),
            sweep_time: DEFAULT_SWEEP_TIME.to_string(),
            utc_offset_minutes: DEFAULT_UTC_OFFSET_MINUTES,
            session_ttl_hours: 24 * 7,
            otp_ttl_minutes: 10,
        }
    }
}

impl Config {
    pub fn config_path() -> Result<PathBuf> {
        Ok(default_root_dir().join(CONFIG_FILE))
    }

    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        Self::load_from(&config_path)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        let content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;
        config.validate()?;

        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;
        self.save_to(&config_path)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;
        set_mode_600(config_path)?;

        Ok(())
    }

    pub fn ensure_bootstrap_files(&self) -> Result<()> {
        if let Some(parent) = self.db_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create DB directory: {}", parent.display()))?;
        }

        fs::create_dir_all(&self.outbox_dir).with_context(|| {
            format!(
                "Failed to create outbox directory: {}",
                self.outbox_dir.display()
            )
        })?;

        fs::create_dir_all(&self.upload_dir).with_context(|| {
            format!(
                "Failed to create upload directory: {}",
                self.upload_dir.display()
            )
        })?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        parse_hhmm(&self.sweep_time)?;
        parse_utc_offset(&self.utc_offset_minutes.to_string())?;
        if self.session_ttl_hours == 0 {
            bail!("session_ttl_hours must be at least 1");
        }
        if self.otp_ttl_minutes == 0 {
            bail!("otp_ttl_minutes must be at least 1");
        }
        Ok(())
    }

    pub fn parse_sweep_time(&self) -> Result<NaiveTime> {
        parse_hhmm(&self.sweep_time)
    }

    /// Fixed offset that defines calendar-day boundaries for every user.
    pub fn offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes * 60).unwrap_or_else(|| Utc.fix())
    }

    pub fn today(&self) -> NaiveDate {
        self.date_at(Utc::now())
    }

    pub fn date_at(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.offset()).date_naive()
    }

    pub fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        match normalize_config_key(key) {
            "api_port" => {
                self.api_port = value
                    .parse::<u16>()
                    .map_err(|_| anyhow!("api_port must be a number"))?;
            }
            "db_path" => {
                self.db_path = expand_home(value);
            }
            "outbox_dir" => {
                self.outbox_dir = expand_home(value);
            }
            "upload_dir" => {
                self.upload_dir = expand_home(value);
            }
            "sweep_time" => {
                parse_hhmm(value)?;
                self.sweep_time = value.to_string();
            }
            "utc_offset_minutes" => {
                self.utc_offset_minutes = parse_utc_offset(value)?;
            }
            "session_ttl_hours" => {
                self.session_ttl_hours = parse_positive(value, "session_ttl_hours")?;
            }
            "otp_ttl_minutes" => {
                self.otp_ttl_minutes = parse_positive(value, "otp_ttl_minutes")?;
            }
            _ => {
                bail!(
                    "Unsupported config key: {key}. Supported keys: api_port|api.port, db_path|db.path, outbox_dir|mail.outbox_dir, upload_dir|uploads.dir, sweep_time|sweep.time, utc_offset_minutes|calendar.utc_offset_minutes, session_ttl_hours|auth.session_ttl_hours, otp_ttl_minutes|auth.otp_ttl_minutes"
                );
            }
        }

        Ok(())
    }

    pub fn get_value(&self, key: &str) -> Option<String> {
        match normalize_config_key(key) {
            "api_port" => Some(self.api_port.to_string()),
            "db_path" => Some(self.db_path.display().to_string()),
            "outbox_dir" => Some(self.outbox_dir.display().to_string()),
            "upload_dir" => Some(self.upload_dir.display().to_string()),
            "sweep_time" => Some(self.sweep_time.clone()),
            "utc_offset_minutes" => Some(self.utc_offset_minutes.to_string()),
            "session_ttl_hours" => Some(self.session_ttl_hours.to_string()),
            "otp_ttl_minutes" => Some(self.otp_ttl_minutes.to_string()),
            _ => None,
        }
    }
}

fn normalize_config_key(key: &str) -> &str {
    match key {
        "api_port" | "api.port" => "api_port",
        "db_path" | "db.path" => "db_path",
        "outbox_dir" | "mail.outbox_dir" => "outbox_dir",
        "upload_dir" | "uploads.dir" => "upload_dir",
        "sweep_time" | "sweep.time" => "sweep_time",
        "utc_offset_minutes" | "calendar.utc_offset_minutes" => "utc_offset_minutes",
        "session_ttl_hours" | "auth.session_ttl_hours" => "session_ttl_hours",
        "otp_ttl_minutes" | "auth.otp_ttl_minutes" => "otp_ttl_minutes",
        _ => key,
    }
}

pub fn parse_hhmm(value: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .with_context(|| format!("Invalid time format: {value}. Example: 23:55 (24-hour format)"))
}

fn parse_utc_offset(value: &str) -> Result<i32> {
    let minutes = value
        .trim()
        .parse::<i32>()
        .map_err(|_| anyhow!("utc_offset_minutes must be a number"))?;

    if !(MIN_UTC_OFFSET_MINUTES..=MAX_UTC_OFFSET_MINUTES).contains(&minutes) {
        bail!(
            "utc_offset_minutes must be between {MIN_UTC_OFFSET_MINUTES} and {MAX_UTC_OFFSET_MINUTES}"
        );
    }

    Ok(minutes)
}

fn parse_positive(value: &str, key: &str) -> Result<u32> {
    let parsed = value
        .trim()
        .parse::<u32>()
        .map_err(|_| anyhow!("{key} must be a number"))?;

    if parsed == 0 {
        bail!("{key} must be at least 1");
    }

    Ok(parsed)
}

fn expand_home(raw: &str) -> PathBuf {
    raw.strip_prefix("~/")
        .and_then(|stripped| home_dir().map(|home| home.join(stripped)))
        .unwrap_or_else(|| PathBuf::from(raw))
}

fn default_root_dir() -> PathBuf {
    home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

fn set_mode_600(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))
            .with_context(|| format!("Failed to set file permissions: {}", path.display()))?;
    }

    Ok(())
}
