//! Error taxonomy for selection, layout, rendering and persistence.

use std::fmt::Display;
use std::path::PathBuf;
use thiserror::Error;

pub type ShortsResult<T> = Result<T, ShortsError>;

#[derive(Debug, Error)]
pub enum ShortsError {
    /// The selector ran out of attempts without finding an unused asset.
    #[error("no unused {kind} found after {attempts} attempts")]
    Exhausted { kind: &'static str, attempts: u32 },

    #[error("{service} request failed: {message}")]
    Upstream {
        service: &'static str,
        message: String,
    },

    #[error("render failed: {message}{}", stderr_suffix(.stderr_tail))]
    Render {
        message: String,
        exit_code: Option<i32>,
        stderr_tail: Option<String>,
    },

    #[error("failed to persist {}: {source}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("overlay layout failed: {message}")]
    Layout { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl ShortsError {
    pub fn upstream(service: &'static str, message: impl Display) -> Self {
        Self::Upstream {
            service,
            message: message.to_string(),
        }
    }

    pub fn render(message: impl Into<String>) -> Self {
        Self::Render {
            message: message.into(),
            exit_code: None,
            stderr_tail: None,
        }
    }

    pub fn layout(message: impl Display) -> Self {
        Self::Layout {
            message: message.to_string(),
        }
    }

    /// True for errors that mean the catalog had nothing fresh left.
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted { .. })
    }
}

fn stderr_suffix(tail: &Option<String>) -> String {
    match tail.as_deref().map(str::trim) {
        Some(tail) if !tail.is_empty() => format!("\n{tail}"),
        _ => String::new(),
    }
}
