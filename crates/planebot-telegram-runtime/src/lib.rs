//! Telegram Bot API bridge: long polling, command dispatch and report delivery.

mod telegram_runtime;

pub use telegram_runtime::{
    run_telegram_bridge, split_message_for_telegram, TelegramApiClient, TelegramBridgeRuntimeConfig,
    TelegramReportDispatcher, TELEGRAM_MAX_MESSAGE_CHARS,
};
