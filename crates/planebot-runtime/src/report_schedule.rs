//! Cron-driven trigger for periodic project reports.

use std::collections::BTreeSet;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use cron::Schedule;
use tokio::sync::watch;

pub const REPORT_START_FORMAT: &str = "%Y-%m-%d %H:%M";

#[derive(Debug, Clone)]
/// Public struct `ReportSchedule` combining a cron expression, the timezone
/// it is evaluated in and the first moment it may fire.
pub struct ReportSchedule {
    expression: String,
    schedule: Schedule,
    timezone: Tz,
    start: DateTime<Tz>,
}

impl ReportSchedule {
    /// Accepts classic five-field expressions (minute precision, numeric
    /// weekdays with 0 or 7 = Sunday) as well as the six- or seven-field form
    /// with seconds, which uses the `cron` crate's numbering (1 = Sunday).
    pub fn parse(expression: &str, timezone: &str, start: &str) -> Result<Self> {
        let expression = expression.trim();
        let normalized = normalize_cron_expression(expression)
            .with_context(|| format!("invalid cron expression '{expression}'"))?;
        let schedule = Schedule::from_str(&normalized)
            .with_context(|| format!("invalid cron expression '{expression}'"))?;
        let timezone: Tz = timezone
            .trim()
            .parse()
            .map_err(|error| anyhow!("invalid timezone '{}': {error}", timezone.trim()))?;
        let naive_start = NaiveDateTime::parse_from_str(start.trim(), REPORT_START_FORMAT)
            .with_context(|| {
                format!("invalid report start '{start}', expected {REPORT_START_FORMAT}")
            })?;
        let start = timezone
            .from_local_datetime(&naive_start)
            .earliest()
            .ok_or_else(|| anyhow!("report start '{naive_start}' does not exist in {timezone}"))?;
        Ok(Self {
            expression: expression.to_string(),
            schedule,
            timezone,
            start,
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    pub fn start(&self) -> DateTime<Tz> {
        self.start
    }

    /// First fire time strictly after `now` that is not before the start date.
    pub fn next_fire_after(&self, now: DateTime<Utc>) -> Option<DateTime<Tz>> {
        let now = now.with_timezone(&self.timezone);
        if now < self.start {
            let just_before_start = self.start - chrono::Duration::seconds(1);
            return self.schedule.after(&just_before_start).next();
        }
        self.schedule.after(&now).next()
    }
}

/// Expands a classic five-field expression into the seconds-first form.
fn normalize_cron_expression(expression: &str) -> Result<String> {
    let fields: Vec<&str> = expression.split_whitespace().collect();
    match fields.as_slice() {
        [minute, hour, day, month, weekday] => Ok(format!(
            "0 {minute} {hour} {day} {month} {}",
            classic_weekday_field(weekday)?
        )),
        _ => Ok(expression.to_string()),
    }
}

/// Rewrites numeric weekdays (0-7, 0 and 7 = Sunday) into the `cron` crate's
/// 1-7 numbering (1 = Sunday). Name-only items pass through unchanged.
fn classic_weekday_field(field: &str) -> Result<String> {
    if !field.chars().any(|ch| ch.is_ascii_digit()) {
        return Ok(field.to_string());
    }
    let mut items: Vec<String> = Vec::new();
    let mut days: BTreeSet<u32> = BTreeSet::new();
    for item in field.split(',') {
        if !item.chars().any(|ch| ch.is_ascii_digit()) {
            items.push(item.to_string());
            continue;
        }
        let (range, step) = match item.split_once('/') {
            Some((range, step)) => (range, Some(parse_weekday_number(step, item)?)),
            None => (item, None),
        };
        let (first, last) = match range {
            "*" | "?" => (0, 6),
            _ => match range.split_once('-') {
                Some((first, last)) => {
                    (parse_weekday_number(first, item)?, parse_weekday_number(last, item)?)
                }
                None => {
                    let day = parse_weekday_number(range, item)?;
                    (day, if step.is_some() { 6 } else { day })
                }
            },
        };
        if first > 7 || last > 7 || first > last {
            bail!("day-of-week '{item}' must stay within 0-7 in ascending order");
        }
        let step = match step {
            Some(0) => bail!("day-of-week '{item}' has a zero step"),
            Some(step) => step as usize,
            None => 1,
        };
        days.extend((first..=last).step_by(step).map(|day| day % 7 + 1));
    }
    items.extend(days.iter().map(u32::to_string));
    Ok(items.join(","))
}

fn parse_weekday_number(raw: &str, item: &str) -> Result<u32> {
    raw.parse::<u32>().map_err(|_| {
        anyhow!("day-of-week '{item}' mixes names and numbers or is malformed")
    })
}

#[async_trait]
/// Trait contract for `ReportDispatcher` behavior: deliver one round of reports.
pub trait ReportDispatcher: Send + Sync {
    /// Returns how many reports were delivered.
    async fn dispatch_reports(&self) -> Result<usize>;
}

/// Sleeps until each fire time and dispatches reports until `shutdown` turns true.
pub async fn run_report_scheduler(
    schedule: ReportSchedule,
    dispatcher: Arc<dyn ReportDispatcher>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    tracing::info!(
        cron = schedule.expression(),
        timezone = %schedule.timezone(),
        start = %schedule.start(),
        "report scheduler started"
    );
    loop {
        if *shutdown.borrow() {
            break;
        }
        let now = Utc::now();
        let Some(next_fire) = schedule.next_fire_after(now) else {
            tracing::warn!(cron = schedule.expression(), "report schedule has no future occurrence");
            break;
        };
        let wait = (next_fire.with_timezone(&Utc) - now)
            .to_std()
            .unwrap_or(Duration::ZERO);
        tracing::debug!(next_fire = %next_fire, wait_ms = wait.as_millis() as u64, "waiting for next report");

        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
                continue;
            }
            _ = tokio::time::sleep(wait) => {}
        }

        match dispatcher.dispatch_reports().await {
            Ok(delivered) => tracing::info!(delivered, "periodic reports dispatched"),
            Err(error) => tracing::warn!(error = %format!("{error:#}"), "periodic report round failed"),
        }
    }
    tracing::info!("report scheduler stopped");
    Ok(())
}
