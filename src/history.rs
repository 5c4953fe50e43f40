//! Rolling record of quotes and clips already used, so neither repeats
//! within the last [`MAX_ENTRIES`] runs.

use crate::error::{ShortsError, ShortsResult};
use crate::{logok, logw};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

pub const MAX_ENTRIES: usize = 365;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct History {
    #[serde(default)]
    pub quotes: Vec<String>,
    #[serde(default)]
    pub videos: Vec<u64>,
}

impl History {
    pub fn contains_quote(&self, content: &str) -> bool {
        self.quotes.iter().any(|q| q == content)
    }

    pub fn contains_clip(&self, id: u64) -> bool {
        self.videos.contains(&id)
    }

    /// Marks a quote and clip as used. Only [`HistoryStore::save`] makes it durable.
    pub fn record(&mut self, quote_content: &str, clip_id: u64) {
        self.quotes.push(quote_content.to_string());
        self.videos.push(clip_id);
    }

    /// Copy holding only the newest [`MAX_ENTRIES`] of each list.
    pub fn truncated(&self) -> History {
        History {
            quotes: keep_newest(&self.quotes),
            videos: keep_newest(&self.videos),
        }
    }
}

/// `<path>.tmp`, built on the raw `OsString` so non-UTF-8 names survive.
fn temp_path(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_os_string();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

fn keep_newest<T: Clone>(items: &[T]) -> Vec<T> {
    let start = items.len().saturating_sub(MAX_ENTRIES);
    items[start..].to_vec()
}

#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing or unreadable history is treated as empty.
    pub async fn load(&self) -> History {
        let text = match fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return History::default(),
            Err(err) => {
                logw(format!(
                    "Could not read history {} ({}); starting empty",
                    self.path.display(),
                    err
                ));
                return History::default();
            }
        };

        match serde_json::from_str::<History>(&text) {
            Ok(history) => history,
            Err(err) => {
                logw(format!(
                    "History {} is corrupt ({}); starting empty",
                    self.path.display(),
                    err
                ));
                History::default()
            }
        }
    }

    /// Trims to the newest entries and overwrites the file.
    pub async fn save(&self, history: &History) -> ShortsResult<()> {
        let trimmed = history.truncated();
        let json = serde_json::to_string_pretty(&trimmed)?;

        let persist_err = |source: std::io::Error| ShortsError::Persistence {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await.map_err(persist_err)?;
            }
        }

        let tmp = temp_path(&self.path);
        fs::write(&tmp, json.as_bytes()).await.map_err(persist_err)?;
        fs::rename(&tmp, &self.path).await.map_err(persist_err)?;

        logok(format!(
            "History saved: {} quotes, {} videos tracked",
            trimmed.quotes.len(),
            trimmed.videos.len()
        ));
        Ok(())
    }
}
