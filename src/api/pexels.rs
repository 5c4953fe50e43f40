use crate::api::snippet;
use crate::catalog::{Catalog, ClipCandidate, ClipVariant};
use crate::error::{ShortsError, ShortsResult};
use crate::logi;
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use reqwest::Client;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;

pub const PEXELS_VIDEO_URL: &str = "https://api.pexels.com/videos/search";
const SERVICE: &str = "Pexels";
const SEARCH_TIMEOUT: Duration = Duration::from_secs(15);
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(60);
const PER_PAGE: u32 = 15;

pub const SEARCH_QUERIES: [&str; 10] = [
    "mountains landscape",
    "ocean waves",
    "forest nature",
    "waterfall",
    "meadow sunrise",
    "desert dunes",
    "river flowing",
    "night sky stars",
    "city timelapse",
    "winter snow landscape",
];

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    videos: Vec<PexelsVideo>,
}

#[derive(Debug, Deserialize)]
struct PexelsVideo {
    id: u64,
    #[serde(default)]
    width: u32,
    #[serde(default)]
    height: u32,
    #[serde(default)]
    video_files: Vec<PexelsFile>,
}

#[derive(Debug, Deserialize)]
struct PexelsFile {
    width: Option<u32>,
    height: Option<u32>,
    #[serde(default)]
    link: String,
    quality: Option<String>,
    file_type: Option<String>,
}

impl From<PexelsVideo> for ClipCandidate {
    fn from(video: PexelsVideo) -> Self {
        ClipCandidate {
            id: video.id,
            width: video.width,
            height: video.height,
            variants: video
                .video_files
                .into_iter()
                .map(|f| ClipVariant {
                    width: f.width.unwrap_or(0),
                    height: f.height.unwrap_or(0),
                    link: f.link,
                    quality: f.quality,
                    file_type: f.file_type,
                })
                .collect(),
        }
    }
}

pub fn parse_search(body: &str) -> ShortsResult<Vec<ClipCandidate>> {
    let resp: SearchResponse = serde_json::from_str(body).map_err(|err| {
        ShortsError::upstream(SERVICE, format!("unexpected response ({err}): {}", snippet(body, 200)))
    })?;
    Ok(resp.videos.into_iter().map(ClipCandidate::from).collect())
}

/// Video search with a random term from [`SEARCH_QUERIES`] per attempt.
pub struct PexelsCatalog {
    client: Client,
    api_key: String,
    orientation: String,
    url: String,
    rng: StdRng,
}

impl PexelsCatalog {
    pub fn new(client: Client, api_key: impl Into<String>, orientation: impl Into<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            orientation: orientation.into(),
            url: PEXELS_VIDEO_URL.to_string(),
            rng: StdRng::from_entropy(),
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }
}

#[async_trait]
impl Catalog for PexelsCatalog {
    type Item = ClipCandidate;

    async fn fetch(&mut self, attempt: u32) -> ShortsResult<Vec<ClipCandidate>> {
        let query = SEARCH_QUERIES
            .choose(&mut self.rng)
            .copied()
            .unwrap_or(SEARCH_QUERIES[0]);
        logi(format!("  Searching clips for {query:?} (attempt {attempt})"));

        let per_page = PER_PAGE.to_string();
        let resp = self
            .client
            .get(&self.url)
            .header("Authorization", &self.api_key)
            .query(&[
                ("query", query),
                ("per_page", per_page.as_str()),
                ("orientation", self.orientation.as_str()),
                ("size", "medium"),
            ])
            .timeout(SEARCH_TIMEOUT)
            .send()
            .await
            .map_err(|err| ShortsError::upstream(SERVICE, err))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ShortsError::upstream(SERVICE, format!("HTTP {}", status.as_u16())));
        }

        let body = resp.text().await.map_err(|err| ShortsError::upstream(SERVICE, err))?;
        let clips = parse_search(&body)?;
        if clips.is_empty() {
            return Err(ShortsError::upstream(SERVICE, format!("no videos returned for query {query:?}")));
        }
        Ok(clips)
    }
}

/// Streams the best variant of `clip` into `dest`.
pub async fn download_clip(client: &Client, clip: &ClipCandidate, dest: &Path) -> ShortsResult<()> {
    let variant = clip
        .best_variant()
        .ok_or_else(|| ShortsError::upstream(SERVICE, format!("clip {} has no downloadable files", clip.id)))?;

    logi(format!(
        "Downloading clip {} ({}x{}) -> {}",
        clip.id,
        variant.width,
        variant.height,
        dest.display()
    ));

    let mut resp = client
        .get(&variant.link)
        .timeout(DOWNLOAD_TIMEOUT)
        .send()
        .await
        .map_err(|err| ShortsError::upstream(SERVICE, err))?;

    if !resp.status().is_success() {
        return Err(ShortsError::upstream(
            SERVICE,
            format!("download HTTP {} for clip {}", resp.status().as_u16(), clip.id),
        ));
    }

    let mut out = fs::File::create(dest).await?;
    while let Some(chunk) = resp.chunk().await.map_err(|err| ShortsError::upstream(SERVICE, err))? {
        out.write_all(&chunk).await?;
    }
    out.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_search_results() {
        let body = r#"{
            "page": 1,
            "videos": [
                {
                    "id": 857251,
                    "width": 1080,
                    "height": 1920,
                    "video_files": [
                        {"id": 1, "quality": "hd", "file_type": "video/mp4", "width": 1080, "height": 1920, "link": "https://videos.test/hd.mp4"},
                        {"id": 2, "quality": "sd", "file_type": "video/mp4", "width": null, "height": null, "link": "https://videos.test/sd.mp4"}
                    ]
                },
                {"id": 42, "width": 1920, "height": 1080}
            ]
        }"#;

        let clips = parse_search(body).unwrap();

        assert_eq!(clips.len(), 2);
        assert_eq!(clips[0].id, 857251);
        assert!(clips[0].is_portrait());
        assert_eq!(clips[0].variants[1].width, 0);
        assert_eq!(
            clips[0].best_variant().map(|v| v.link.as_str()),
            Some("https://videos.test/hd.mp4")
        );
        assert!(clips[1].variants.is_empty());
    }

    #[test]
    fn missing_videos_field_is_empty_batch() {
        assert!(parse_search(r#"{"page": 1}"#).unwrap().is_empty());
    }

    #[test]
    fn network_timeouts() {
        assert_eq!(SEARCH_TIMEOUT, Duration::from_secs(15));
        assert_eq!(DOWNLOAD_TIMEOUT, Duration::from_secs(60));
    }

    #[test]
    fn garbage_is_upstream_error() {
        assert!(matches!(
            parse_search("Unauthorized"),
            Err(ShortsError::Upstream { service: "Pexels", .. })
        ));
    }
}
