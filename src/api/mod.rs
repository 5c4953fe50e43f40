pub mod elevenlabs;
pub mod pexels;
pub mod sendgrid;
pub mod tiktok;
pub mod zenquotes;

use anyhow::{Context, Result};
use std::time::Duration;

const USER_AGENT: &str = concat!("daily-quote-shorts/", env!("CARGO_PKG_VERSION"));

pub fn build_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(Duration::from_secs(30))
        .build()
        .context("Failed to build HTTP client")
}

/// First `max` characters of a response body, for error messages.
pub(crate) fn snippet(body: &str, max: usize) -> String {
    body.chars().take(max).collect()
}
