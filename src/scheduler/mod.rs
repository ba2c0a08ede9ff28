use crate::config::parse_hhmm;
use anyhow::{Context, Result, bail};
use chrono::{DateTime, Duration as ChronoDuration, FixedOffset, NaiveDate, NaiveTime, Timelike, Utc};
use std::future::Future;
use tokio::time::{Duration, sleep};
use tracing::{error, info};

const RESCHEDULE_POLL_SECONDS: u64 = 30;

pub fn cron_from_sweep_time(sweep_time: &str) -> Result<String> {
    let time = parse_hhmm(sweep_time)?;
    Ok(format!("{} {} * * *", time.minute(), time.hour()))
}

/// Runs `task` once a day at the time given by `schedule_provider`, which is
/// re-read every poll so schedule changes apply without a restart. The task
/// receives the calendar day at `offset` when it fires.
pub async fn run_cron_scheduler<S, F, Fut>(
    mut schedule_provider: S,
    offset: FixedOffset,
    mut task: F,
) -> Result<()>
where
    S: FnMut() -> Result<String>,
    F: FnMut(NaiveDate) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let mut last_logged_cron = String::new();

    loop {
        let cron_expr = match schedule_provider() {
            Ok(value) => value,
            Err(error) => {
                error!(error = %error, "failed to load sweep schedule");
                sleep(Duration::from_secs(RESCHEDULE_POLL_SECONDS)).await;
                continue;
            }
        };

        let now = Utc::now().with_timezone(&offset);
        let delay = match seconds_until_next_run(&cron_expr, now) {
            Ok(value) => value,
            Err(error) => {
                error!(error = %error, cron = %cron_expr, "invalid sweep cron expression");
                sleep(Duration::from_secs(RESCHEDULE_POLL_SECONDS)).await;
                continue;
            }
        };

        if cron_expr != last_logged_cron {
            info!(seconds = delay.as_secs(), cron = %cron_expr, "next sweep schedule set");
            last_logged_cron = cron_expr.clone();
        }

        if delay > Duration::from_secs(RESCHEDULE_POLL_SECONDS) {
            sleep(Duration::from_secs(RESCHEDULE_POLL_SECONDS)).await;
            continue;
        }

        sleep(delay).await;

        let date = Utc::now().with_timezone(&offset).date_naive();
        if let Err(error) = task(date).await {
            error!(error = %error, date = %date, "scheduled sweep failed");
        }

        sleep(Duration::from_secs(1)).await;
    }
}

fn seconds_until_next_run(cron_expr: &str, now: DateTime<FixedOffset>) -> Result<Duration> {
    let target_time = parse_daily_cron_time(cron_expr)?;
    let today = now.date_naive();
    let offset = *now.offset();

    // A fixed offset has no DST gaps, so every local time maps to one instant.
    let candidate_today = today
        .and_time(target_time)
        .and_local_timezone(offset)
        .single()
        .context("Failed to convert schedule time")?;

    let next_run = if candidate_today > now {
        candidate_today
    } else {
        (today + ChronoDuration::days(1))
            .and_time(target_time)
            .and_local_timezone(offset)
            .single()
            .context("Failed to convert next execution time")?
    };

    (next_run - now)
        .to_std()
        .context("Failed to compute next execution delay")
}

fn parse_daily_cron_time(cron_expr: &str) -> Result<NaiveTime> {
    let fields = cron_expr.split_whitespace().collect::<Vec<_>>();

    if fields.len() != 5 {
        bail!("Invalid cron expression: {cron_expr}. Expected format: '<minute> <hour> * * *'");
    }

    if fields[2] != "*" || fields[3] != "*" || fields[4] != "*" {
        bail!(
            "Unsupported cron expression: {cron_expr}. Only daily format '<minute> <hour> * * *' is supported"
        );
    }

    let minute = fields[0]
        .parse::<u32>()
        .with_context(|| format!("Invalid cron minute: {}", fields[0]))?;
    let hour = fields[1]
        .parse::<u32>()
        .with_context(|| format!("Invalid cron hour: {}", fields[1]))?;

    NaiveTime::from_hms_opt(hour, minute, 0)
        .with_context(|| format!("Invalid cron time values: hour={hour}, minute={minute}"))
}
