use crate::api::snippet;
use crate::catalog::Quote;
use crate::{logi, logok, logw};
use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::Client;
use std::path::Path;
use std::time::Duration;
use tokio::fs;

pub const SENDGRID_URL: &str = "https://api.sendgrid.com/v3/mail/send";
const SEND_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailSettings {
    pub api_key: String,
    pub to_email: String,
    pub from_email: String,
}

impl EmailSettings {
    /// `None` unless both the key and the recipient are set. The sender defaults to the recipient.
    pub fn from_parts(api_key: Option<&str>, to_email: Option<&str>, from_email: Option<&str>) -> Option<Self> {
        let non_empty = |v: Option<&str>| v.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string);
        let api_key = non_empty(api_key)?;
        let to_email = non_empty(to_email)?;
        let from_email = non_empty(from_email).unwrap_or_else(|| to_email.clone());
        Some(Self {
            api_key,
            to_email,
            from_email,
        })
    }
}

pub fn build_payload(
    settings: &EmailSettings,
    filename: &str,
    video: &[u8],
    quote: &Quote,
    index: usize,
    total: usize,
) -> serde_json::Value {
    let body = format!(
        "Video {index} of {total} — ready to upload!\n\n\"{}\" — {}\n\nAdd your music in TikTok and post.",
        quote.content, quote.author
    );

    serde_json::json!({
        "personalizations": [{ "to": [{ "email": settings.to_email }] }],
        "from": { "email": settings.from_email },
        "subject": format!("TikTok video {index}/{total} — {}", quote.author),
        "content": [{ "type": "text/plain", "value": body }],
        "attachments": [{
            "content": STANDARD.encode(video),
            "type": "video/mp4",
            "filename": filename,
            "disposition": "attachment",
        }],
    })
}

async fn send_one(
    client: &Client,
    settings: &EmailSettings,
    video_path: &Path,
    quote: &Quote,
    index: usize,
    total: usize,
) -> Result<()> {
    let data = fs::read(video_path)
        .await
        .with_context(|| format!("Failed to read {}", video_path.display()))?;
    logi(format!(
        "  Sending video {index}/{total} ({:.1} MB)...",
        data.len() as f64 / 1024.0 / 1024.0
    ));

    let filename = video_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| format!("short_{index}.mp4"));
    let payload = build_payload(settings, &filename, &data, quote, index, total);

    let resp = client
        .post(SENDGRID_URL)
        .bearer_auth(&settings.api_key)
        .json(&payload)
        .timeout(SEND_TIMEOUT)
        .send()
        .await
        .context("SendGrid request failed")?;

    let status = resp.status().as_u16();
    if status != 200 && status != 202 {
        let text = resp.text().await.unwrap_or_default();
        anyhow::bail!("SendGrid error on video {index}: {status} {}", snippet(&text, 300));
    }
    Ok(())
}

/// Sends one e-mail per video. Returns `false` when e-mail is not configured.
pub async fn send_daily_videos(
    client: &Client,
    settings: Option<&EmailSettings>,
    videos: &[(&Path, &Quote)],
) -> Result<bool> {
    let Some(settings) = settings else {
        logw("SendGrid not configured, skipping email delivery. Set SENDGRID_API_KEY and TO_EMAIL to enable.");
        return Ok(false);
    };

    let total = videos.len();
    for (i, (path, quote)) in videos.iter().enumerate() {
        send_one(client, settings, path, quote, i + 1, total).await?;
    }

    logok(format!("All {total} emails sent to {}", settings.to_email));
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requires_key_and_recipient() {
        assert!(EmailSettings::from_parts(None, Some("me@test"), None).is_none());
        assert!(EmailSettings::from_parts(Some("key"), Some("  "), None).is_none());

        let settings = EmailSettings::from_parts(Some("key"), Some("me@test"), None).unwrap();
        assert_eq!(settings.from_email, "me@test");

        let settings = EmailSettings::from_parts(Some("key"), Some("me@test"), Some("bot@test")).unwrap();
        assert_eq!(settings.from_email, "bot@test");
    }

    #[test]
    fn payload_attaches_video() {
        let settings = EmailSettings::from_parts(Some("key"), Some("me@test"), None).unwrap();
        let quote = Quote::new("Stay curious.", "Unknown");
        let payload = build_payload(&settings, "short_2.mp4", b"mp4", &quote, 2, 3);

        assert_eq!(payload["subject"], "TikTok video 2/3 — Unknown");
        assert_eq!(payload["personalizations"][0]["to"][0]["email"], "me@test");
        assert_eq!(payload["attachments"][0]["content"], "bXA0");
        assert_eq!(payload["attachments"][0]["filename"], "short_2.mp4");
        let body = payload["content"][0]["value"].as_str().unwrap();
        assert!(body.starts_with("Video 2 of 3"));
        assert!(body.contains("\"Stay curious.\" — Unknown"));
    }

    #[tokio::test]
    async fn unconfigured_delivery_is_skipped() {
        let client = Client::new();
        assert!(!send_daily_videos(&client, None, &[]).await.unwrap());
    }
}
