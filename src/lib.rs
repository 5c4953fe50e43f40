pub mod api;
pub mod catalog;
pub mod compositor;
pub mod config;
pub mod error;
pub mod ffmpeg;
pub mod history;
pub mod init;
pub mod layout;
pub mod logging;
pub mod overlay;
pub mod pipeline;
pub mod selector;

pub use error::{ShortsError, ShortsResult};

pub(crate) fn logv(tag: &str, message: &str) {
    match tag {
        "WARN" => tracing::warn!(target: "shorts", "[{}] {}", tag, message),
        _ => tracing::info!(target: "shorts", "[{}] {}", tag, message),
    }
}

pub(crate) fn logi(message: impl AsRef<str>) {
    logv("INFO", message.as_ref());
}

pub(crate) fn logok(message: impl AsRef<str>) {
    logv("OK", message.as_ref());
}

pub(crate) fn logw(message: impl AsRef<str>) {
    logv("WARN", message.as_ref());
}
