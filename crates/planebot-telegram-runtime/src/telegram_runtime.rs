//! Telegram bridge runtime that polls updates and dispatches task commands.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use planebot_runtime::{run_report_scheduler, ReportDispatcher, ReportSchedule, TaskCommandService};
use tokio::sync::watch;

mod telegram_api_client;
mod telegram_message_chunks;
mod telegram_report_dispatcher;

pub use telegram_api_client::TelegramApiClient;
pub use telegram_message_chunks::{split_message_for_telegram, TELEGRAM_MAX_MESSAGE_CHARS};
pub use telegram_report_dispatcher::TelegramReportDispatcher;

use telegram_api_client::TelegramUpdate;

#[derive(Clone)]
/// Runtime configuration for the Telegram bridge polling loop.
pub struct TelegramBridgeRuntimeConfig {
    pub client: TelegramApiClient,
    pub commands: TaskCommandService,
    /// Bot username used to accept `/cmd@name`. Looked up with `getMe` when unset.
    pub bot_name: Option<String>,
    pub poll_timeout_seconds: u64,
    pub error_backoff: Duration,
    /// Periodic reports; `None` disables the scheduler.
    pub report_schedule: Option<(ReportSchedule, Arc<dyn ReportDispatcher>)>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct PollCycleReport {
    updates: usize,
    commands: usize,
    reply_failures: usize,
}

/// Runs the bridge until Ctrl-C, then stops the report scheduler.
pub async fn run_telegram_bridge(config: TelegramBridgeRuntimeConfig) -> Result<()> {
    let mut runtime = TelegramBridgeRuntime::new(config).await?;
    runtime.run().await
}

struct TelegramBridgeRuntime {
    config: TelegramBridgeRuntimeConfig,
    bot_name: Option<String>,
    next_offset: Option<i64>,
}

impl TelegramBridgeRuntime {
    async fn new(config: TelegramBridgeRuntimeConfig) -> Result<Self> {
        let bot_name = match config.bot_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => Some(name.trim_start_matches('@').to_string()),
            _ => {
                let me = config
                    .client
                    .get_me()
                    .await
                    .context("failed to resolve telegram bot identity")?;
                tracing::info!(bot_id = me.id, is_bot = me.is_bot, username = ?me.username, "telegram bot identity resolved");
                me.username
            }
        };
        Ok(Self {
            config,
            bot_name,
            next_offset: None,
        })
    }

    async fn run(&mut self) -> Result<()> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let scheduler = self
            .config
            .report_schedule
            .clone()
            .map(|(schedule, dispatcher)| {
                tokio::spawn(run_report_scheduler(schedule, dispatcher, shutdown_rx))
            });

        tracing::info!(bot_name = ?self.bot_name, "telegram bridge polling started");
        loop {
            let stop_requested = tokio::select! {
                _ = tokio::signal::ctrl_c() => true,
                cycle = self.poll_once() => match cycle {
                    Ok(report) => {
                        if report.updates > 0 {
                            tracing::debug!(
                                updates = report.updates,
                                commands = report.commands,
                                reply_failures = report.reply_failures,
                                "telegram poll cycle complete"
                            );
                        }
                        false
                    }
                    Err(error) => {
                        tracing::warn!(error = %format!("{error:#}"), "telegram poll failed");
                        tokio::select! {
                            _ = tokio::signal::ctrl_c() => true,
                            _ = tokio::time::sleep(self.config.error_backoff) => false,
                        }
                    }
                },
            };
            if stop_requested {
                tracing::info!("telegram bridge shutdown requested");
                break;
            }
        }

        let _ = shutdown_tx.send(true);
        if let Some(handle) = scheduler {
            match handle.await {
                Ok(result) => result?,
                Err(error) => tracing::warn!(error = %error, "report scheduler task failed"),
            }
        }
        tracing::info!("telegram bridge stopped");
        Ok(())
    }

    async fn poll_once(&mut self) -> Result<PollCycleReport> {
        let updates = self
            .config
            .client
            .get_updates(self.next_offset, self.config.poll_timeout_seconds)
            .await?;
        let mut report = PollCycleReport {
            updates: updates.len(),
            ..PollCycleReport::default()
        };
        for update in updates {
            self.next_offset = Some(
                self.next_offset
                    .unwrap_or(0)
                    .max(update.update_id.saturating_add(1)),
            );
            self.handle_update(update, &mut report).await;
        }
        Ok(report)
    }

    async fn handle_update(&self, update: TelegramUpdate, report: &mut PollCycleReport) {
        let Some(message) = update.message else {
            return;
        };
        if message.from.as_ref().is_some_and(|sender| sender.is_bot) {
            return;
        }
        let Some(text) = message.text.as_deref() else {
            return;
        };
        let chat_id = message.chat_id();
        let Some(reply) = self
            .config
            .commands
            .handle_message(&chat_id, text, self.bot_name.as_deref())
            .await
        else {
            return;
        };
        report.commands += 1;
        if let Err(error) = self
            .config
            .client
            .send_message(&chat_id, &reply, Some(message.message_id))
            .await
        {
            report.reply_failures += 1;
            tracing::warn!(
                chat_id = %chat_id,
                update_id = update.update_id,
                error = %format!("{error:#}"),
                "failed to send command reply"
            );
        }
    }
}
