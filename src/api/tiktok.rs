use crate::catalog::Quote;
use crate::{logi, logok, logw};
use anyhow::{Context, Result};
use reqwest::Client;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncReadExt;

pub const CHUNK_SIZE: u64 = 10 * 1024 * 1024;
pub const TIKTOK_INIT_URL: &str = "https://open.tiktokapis.com/v2/post/publish/video/init/";
pub const TIKTOK_STATUS_URL: &str = "https://open.tiktokapis.com/v2/post/publish/status/fetch/";
pub const MAX_STATUS_POLLS: u32 = 10;
const POLL_INTERVAL: Duration = Duration::from_secs(5);
const API_TIMEOUT: Duration = Duration::from_secs(15);
const CHUNK_TIMEOUT: Duration = Duration::from_secs(120);
const TITLE_MAX_CHARS: usize = 150;
const HASHTAGS: &str = "#motivation #quotes #dailyquote #inspirational #fyp";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TikTokCredentials {
    pub access_token: String,
    pub open_id: String,
}

impl TikTokCredentials {
    pub fn from_parts(access_token: Option<&str>, open_id: Option<&str>) -> Option<Self> {
        let access_token = access_token.filter(|v| !v.trim().is_empty())?;
        let open_id = open_id.filter(|v| !v.trim().is_empty())?;
        Some(Self {
            access_token: access_token.to_string(),
            open_id: open_id.to_string(),
        })
    }
}

pub fn caption(quote: &Quote) -> String {
    format!("\"{}\" — {}\n\n{HASHTAGS}", quote.content, quote.author)
}

pub fn title(quote: &Quote) -> String {
    caption(quote).chars().take(TITLE_MAX_CHARS).collect()
}

/// Inclusive byte ranges covering `file_size` in [`CHUNK_SIZE`] pieces.
pub fn chunk_ranges(file_size: u64) -> Vec<(u64, u64)> {
    (0..file_size.div_ceil(CHUNK_SIZE))
        .map(|i| {
            let start = i * CHUNK_SIZE;
            (start, (start + CHUNK_SIZE).min(file_size) - 1)
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishStatus {
    Complete,
    Failed(String),
    Pending(String),
}

impl PublishStatus {
    pub fn classify(status: &str) -> Self {
        match status {
            "PUBLISH_COMPLETE" => PublishStatus::Complete,
            "FAILED" | "SPAM_RISK_TOO_MANY_POSTS" => PublishStatus::Failed(status.to_string()),
            other => PublishStatus::Pending(other.to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct InitData {
    publish_id: Option<String>,
    upload_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatusData {
    status: Option<String>,
    fail_reason: Option<String>,
}

/// Uploads and publishes one video. Returns `false` in stub mode (no credentials).
pub async fn post_video(
    client: &Client,
    credentials: Option<&TikTokCredentials>,
    video_path: &Path,
    quote: &Quote,
) -> Result<bool> {
    let Some(creds) = credentials else {
        print_stub_instructions();
        return Ok(false);
    };

    let file_size = fs::metadata(video_path)
        .await
        .with_context(|| format!("Failed to stat {}", video_path.display()))?
        .len();
    let ranges = chunk_ranges(file_size);
    if ranges.is_empty() {
        anyhow::bail!("Refusing to upload empty video {}", video_path.display());
    }

    let init_body = serde_json::json!({
        "post_info": {
            "title": title(quote),
            "privacy_level": "PUBLIC_TO_EVERYONE",
            "disable_duet": false,
            "disable_comment": false,
            "disable_stitch": false,
        },
        "source_info": {
            "source": "FILE_UPLOAD",
            "video_size": file_size,
            "chunk_size": CHUNK_SIZE,
            "total_chunk_count": ranges.len(),
        },
    });

    let resp = client
        .post(TIKTOK_INIT_URL)
        .bearer_auth(&creds.access_token)
        .json(&init_body)
        .timeout(API_TIMEOUT)
        .send()
        .await
        .context("TikTok init request failed")?
        .error_for_status()
        .context("TikTok init rejected")?;
    let init: Envelope<InitData> = resp.json().await.context("TikTok init response unreadable")?;
    let (publish_id, upload_url) = match init.data {
        Some(InitData {
            publish_id: Some(id),
            upload_url: Some(url),
        }) => (id, url),
        _ => anyhow::bail!("TikTok init response missing publish_id or upload_url"),
    };
    logi(format!("TikTok upload initialised. publish_id={publish_id}"));

    let mut file = fs::File::open(video_path)
        .await
        .with_context(|| format!("Failed to open {}", video_path.display()))?;
    let total = ranges.len();
    for (idx, (start, end)) in ranges.into_iter().enumerate() {
        let mut chunk = vec![0u8; (end - start + 1) as usize];
        file.read_exact(&mut chunk).await?;
        let content_range = format!("bytes {start}-{end}/{file_size}");

        client
            .put(&upload_url)
            .header("Content-Range", &content_range)
            .header("Content-Type", "video/mp4")
            .body(chunk)
            .timeout(CHUNK_TIMEOUT)
            .send()
            .await
            .with_context(|| format!("TikTok chunk {} upload failed", idx + 1))?
            .error_for_status()
            .with_context(|| format!("TikTok chunk {} rejected", idx + 1))?;
        logi(format!("  Chunk {}/{total} uploaded ({content_range})", idx + 1));
    }

    let status_body = serde_json::json!({ "publish_id": publish_id });
    for attempt in 1..=MAX_STATUS_POLLS {
        tokio::time::sleep(POLL_INTERVAL).await;
        let resp = client
            .post(TIKTOK_STATUS_URL)
            .bearer_auth(&creds.access_token)
            .json(&status_body)
            .timeout(API_TIMEOUT)
            .send()
            .await
            .context("TikTok status request failed")?
            .error_for_status()
            .context("TikTok status rejected")?;
        let status: Envelope<StatusData> = resp.json().await.context("TikTok status response unreadable")?;
        let data = status.data.unwrap_or(StatusData {
            status: None,
            fail_reason: None,
        });
        let raw = data.status.unwrap_or_else(|| "UNKNOWN".to_string());
        logi(format!("  Status poll {attempt}/{MAX_STATUS_POLLS}: {raw}"));

        match PublishStatus::classify(&raw) {
            PublishStatus::Complete => {
                logok("TikTok post published");
                return Ok(true);
            }
            PublishStatus::Failed(reason) => anyhow::bail!(
                "TikTok publish failed: {reason} {}",
                data.fail_reason.unwrap_or_default()
            ),
            PublishStatus::Pending(_) => {}
        }
    }

    anyhow::bail!("TikTok publish timed out after {MAX_STATUS_POLLS} status polls")
}

fn print_stub_instructions() {
    logw("TikTok posting is in STUB MODE, video saved locally only.");
    logw("  To enable live posting set TIKTOK_ACCESS_TOKEN and TIKTOK_OPEN_ID (from the OAuth 2.0 flow).");
    logw("  See: https://developers.tiktok.com/doc/content-posting-api");
}
