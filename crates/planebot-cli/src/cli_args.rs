use std::path::PathBuf;

use clap::{ArgAction, Parser};

fn parse_positive_usize(value: &str) -> Result<usize, String> {
    let parsed = value
        .parse::<usize>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

fn parse_positive_u64(value: &str) -> Result<u64, String> {
    let parsed = value
        .parse::<u64>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

#[derive(Debug, Parser)]
#[command(
    name = "planebot",
    about = "Telegram bot that manages Plane tasks and posts project reports",
    version
)]
/// Public struct `Cli` with the planebot flags and their environment fallbacks.
pub struct Cli {
    #[arg(
        long,
        env = "PLANEBOT_CONFIG",
        default_value = "planebot.toml",
        help = "TOML file with the report schedule, report states and directory file paths"
    )]
    pub config: PathBuf,

    #[arg(
        long = "plane-api-token",
        env = "PLANE_API_TOKEN",
        hide_env_values = true,
        help = "Plane API key sent as X-API-Key"
    )]
    pub plane_api_token: String,

    #[arg(
        long = "plane-workspace-slug",
        env = "PLANE_WORKSPACE_SLUG",
        help = "Plane workspace slug used in API paths and task links"
    )]
    pub plane_workspace_slug: String,

    #[arg(
        long = "plane-base-url",
        env = "PLANE_BASE_URL",
        default_value = "https://app.plane.so/",
        help = "Plane site root serving both the web UI and /api/v1"
    )]
    pub plane_base_url: String,

    #[arg(
        long = "telegram-bot-token",
        env = "TELEGRAM_BOT_TOKEN",
        hide_env_values = true,
        help = "Telegram Bot API token"
    )]
    pub telegram_bot_token: String,

    #[arg(
        long = "telegram-bot-name",
        env = "TELEGRAM_BOT_NAME",
        help = "Bot username accepted in /command@name; resolved with getMe when omitted"
    )]
    pub telegram_bot_name: Option<String>,

    #[arg(
        long = "telegram-api-base",
        env = "TELEGRAM_API_BASE",
        default_value = "https://api.telegram.org",
        help = "Base URL for the Telegram Bot API"
    )]
    pub telegram_api_base: String,

    #[arg(
        long = "telegram-poll-timeout-seconds",
        env = "TELEGRAM_POLL_TIMEOUT_SECONDS",
        default_value_t = 30,
        help = "Long-polling timeout passed to getUpdates"
    )]
    pub telegram_poll_timeout_seconds: u64,

    #[arg(
        long = "verbose-errors",
        env = "PLANEBOT_VERBOSE_ERRORS",
        default_value_t = false,
        action = ArgAction::Set,
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true",
        help = "Append tracker failure details to chat error replies"
    )]
    pub verbose_errors: bool,

    #[arg(
        long = "request-timeout-ms",
        env = "PLANEBOT_REQUEST_TIMEOUT_MS",
        default_value_t = 30_000,
        value_parser = parse_positive_u64,
        help = "Timeout in milliseconds for Plane and Telegram HTTP requests"
    )]
    pub request_timeout_ms: u64,

    #[arg(
        long = "retry-max-attempts",
        env = "PLANEBOT_RETRY_MAX_ATTEMPTS",
        default_value_t = 3,
        value_parser = parse_positive_usize,
        help = "Maximum attempts for throttled, failing-server or transport errors"
    )]
    pub retry_max_attempts: usize,

    #[arg(
        long = "retry-base-delay-ms",
        env = "PLANEBOT_RETRY_BASE_DELAY_MS",
        default_value_t = 500,
        help = "Base exponential backoff delay in milliseconds between retries"
    )]
    pub retry_base_delay_ms: u64,

    #[arg(
        long = "poll-error-backoff-ms",
        env = "PLANEBOT_POLL_ERROR_BACKOFF_MS",
        default_value_t = 5_000,
        help = "Delay before polling Telegram again after a failed getUpdates call"
    )]
    pub poll_error_backoff_ms: u64,

    #[arg(
        long = "once-report",
        default_value_t = false,
        help = "Send one round of project reports to every bound chat and exit"
    )]
    pub once_report: bool,
}
