//! Plane issue tracker client for the chat bot.

pub mod plane_api_client;
pub mod plane_payloads;

pub use plane_api_client::{PlaneApiClient, PlaneApiConfig};
