//! HTTP retry and response helpers shared by the Plane and Telegram clients.

pub mod transport_helpers;

pub use transport_helpers::{
    decode_json_response, ensure_success, is_retryable_status, is_retryable_transport_error,
    parse_retry_after, retry_delay, send_non_idempotent, send_with_retry, truncate_for_error,
    RetryPolicy,
};
