//! One generation run: pick fresh quote/clip pairs, produce a short for each,
//! deliver them and only then commit the history.

use crate::api::build_client;
use crate::api::elevenlabs::Narrator;
use crate::api::pexels::{PexelsCatalog, download_clip};
use crate::api::sendgrid::{EmailSettings, send_daily_videos};
use crate::api::tiktok::{TikTokCredentials, post_video};
use crate::api::zenquotes::ZenQuotesCatalog;
use crate::catalog::{Catalog, ClipCandidate, Quote};
use crate::compositor::{FfmpegRenderer, MediaRenderer, Narration, RenderJob, RenderedVideo};
use crate::config::Config;
use crate::error::{ShortsError, ShortsResult};
use crate::ffmpeg::ffprobe_video_dimensions;
use crate::history::{History, HistoryStore};
use crate::layout::LayoutStyle;
use crate::overlay::{GlyphFont, render_overlay};
use crate::selector::{Exclusion, select_clip, select_quote};
use crate::{logi, logok, logw};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use reqwest::Client;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;

pub const MANIFEST_FILE: &str = "run.json";

/// Produces the media for one video once its quote and clip are chosen.
#[async_trait]
pub trait Production: Send + Sync {
    async fn fetch_background(&self, clip: &ClipCandidate, dest: &Path) -> ShortsResult<()>;
    async fn draw_overlay(&self, quote: &Quote, dest: &Path) -> ShortsResult<()>;
    /// `None` when narration is off.
    async fn narrate(&self, quote: &Quote, dest: &Path) -> ShortsResult<Option<Narration>>;
    async fn render(&self, job: &RenderJob) -> ShortsResult<RenderedVideo>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryReport {
    pub skipped: bool,
    pub emailed: bool,
    pub posted: u32,
}

#[async_trait]
pub trait Delivery: Send + Sync {
    async fn deliver(&self, videos: &[ProducedVideo]) -> Result<DeliveryReport>;
}

/// Used for `--skip-delivery`.
pub struct NoDelivery;

#[async_trait]
impl Delivery for NoDelivery {
    async fn deliver(&self, _videos: &[ProducedVideo]) -> Result<DeliveryReport> {
        logi("Delivery skipped");
        Ok(DeliveryReport {
            skipped: true,
            ..DeliveryReport::default()
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProducedVideo {
    pub index: u32,
    pub quote: Quote,
    pub clip_id: u64,
    pub quote_attempts: u32,
    pub clip_attempts: u32,
    pub narrated: bool,
    pub video: RenderedVideo,
}

#[derive(Debug, Clone)]
pub struct BatchPlan {
    pub run_dir: PathBuf,
    pub count: u32,
}

impl BatchPlan {
    pub fn background_path(&self, n: u32) -> PathBuf {
        self.run_dir.join(format!("background_{n}.mp4"))
    }

    pub fn overlay_path(&self, n: u32) -> PathBuf {
        self.run_dir.join(format!("text_overlay_{n}.png"))
    }

    pub fn narration_path(&self, n: u32) -> PathBuf {
        self.run_dir.join(format!("narration_{n}.mp3"))
    }

    pub fn short_path(&self, n: u32) -> PathBuf {
        self.run_dir.join(format!("short_{n}.mp4"))
    }
}

/// Produces `plan.count` videos in order. Each pick is recorded in `history`
/// straight away so later picks in the same run exclude it; nothing is persisted.
pub async fn produce_batch<Q, C, P, R>(
    history: &mut History,
    dedup: bool,
    plan: &BatchPlan,
    quotes: &mut Q,
    clips: &mut C,
    production: &P,
    rng: &mut R,
) -> Result<Vec<ProducedVideo>>
where
    Q: Catalog<Item = Quote> + ?Sized,
    C: Catalog<Item = ClipCandidate> + ?Sized,
    P: Production + ?Sized,
    R: Rng + ?Sized,
{
    let count = plan.count;
    let mut produced = Vec::with_capacity(count as usize);

    for n in 1..=count {
        logi(format!("=== Video {n}/{count} ==="));

        let exclusion = if dedup {
            Exclusion::History(&*history)
        } else {
            Exclusion::Disabled
        };
        let quote = select_quote(&mut *quotes, exclusion)
            .await
            .with_context(|| format!("selecting quote {n}/{count}"))?;
        logi(format!("  \"{}\" — {}", quote.item.content, quote.item.author));

        let clip = select_clip(&mut *clips, exclusion, &mut *rng)
            .await
            .with_context(|| format!("selecting clip {n}/{count}"))?;

        history.record(&quote.item.content, clip.item.id);

        let background = plan.background_path(n);
        production
            .fetch_background(&clip.item, &background)
            .await
            .with_context(|| format!("downloading clip for video {n}/{count}"))?;

        let overlay = plan.overlay_path(n);
        production
            .draw_overlay(&quote.item, &overlay)
            .await
            .with_context(|| format!("drawing overlay {n}/{count}"))?;

        let narration = production
            .narrate(&quote.item, &plan.narration_path(n))
            .await
            .with_context(|| format!("narrating video {n}/{count}"))?;
        let narrated = narration.is_some();

        let job = match narration {
            Some(narration) => RenderJob::narrated(background, overlay, narration, plan.short_path(n)),
            None => RenderJob::silent(background, overlay, plan.short_path(n)),
        };
        let video = production
            .render(&job)
            .await
            .with_context(|| format!("rendering video {n}/{count}"))?;

        produced.push(ProducedVideo {
            index: n,
            quote: quote.item,
            clip_id: clip.item.id,
            quote_attempts: quote.attempts,
            clip_attempts: clip.attempts,
            narrated,
            video,
        });
    }

    Ok(produced)
}

/// Load history, produce, deliver, then commit. `store` is `None` when dedup is off,
/// in which case history is neither consulted nor written.
pub async fn execute<Q, C, P, D, R>(
    store: Option<&HistoryStore>,
    plan: &BatchPlan,
    quotes: &mut Q,
    clips: &mut C,
    production: &P,
    delivery: &D,
    rng: &mut R,
) -> Result<(Vec<ProducedVideo>, DeliveryReport)>
where
    Q: Catalog<Item = Quote> + ?Sized,
    C: Catalog<Item = ClipCandidate> + ?Sized,
    P: Production + ?Sized,
    D: Delivery + ?Sized,
    R: Rng + ?Sized,
{
    let mut history = match store {
        Some(store) => store.load().await,
        None => History::default(),
    };
    logi(format!(
        "History: {} quotes, {} clips already used",
        history.quotes.len(),
        history.videos.len()
    ));

    let videos = produce_batch(
        &mut history,
        store.is_some(),
        plan,
        quotes,
        clips,
        production,
        rng,
    )
    .await?;

    let report = delivery.deliver(&videos).await.context("delivering videos")?;

    if let Some(store) = store {
        store.save(&history).await.context("saving history")?;
    }
    Ok((videos, report))
}

pub struct LiveProduction {
    client: Client,
    font: Arc<GlyphFont>,
    style: LayoutStyle,
    narrator: Option<Narrator>,
    renderer: FfmpegRenderer,
}

impl LiveProduction {
    pub fn new(client: Client, font: GlyphFont, narrator: Option<Narrator>) -> Self {
        Self {
            client,
            font: Arc::new(font),
            style: LayoutStyle::default(),
            narrator,
            renderer: FfmpegRenderer::new(),
        }
    }
}

#[async_trait]
impl Production for LiveProduction {
    async fn fetch_background(&self, clip: &ClipCandidate, dest: &Path) -> ShortsResult<()> {
        download_clip(&self.client, clip, dest).await?;
        match ffprobe_video_dimensions(dest).await {
            Ok((w, h)) => logi(format!("  Background: {w}x{h}")),
            Err(err) => logw(format!("  Could not inspect background {}: {err}", dest.display())),
        }
        Ok(())
    }

    async fn draw_overlay(&self, quote: &Quote, dest: &Path) -> ShortsResult<()> {
        let font = Arc::clone(&self.font);
        let style = self.style.clone();
        let quote = quote.clone();
        let dest = dest.to_path_buf();

        let block = tokio::task::spawn_blocking(move || render_overlay(&quote, &font, &style, &dest))
            .await
            .map_err(|err| ShortsError::layout(format!("overlay task failed: {err}")))??;
        logi(format!("  Overlay: {} line(s) + author", block.lines.len()));
        Ok(())
    }

    async fn narrate(&self, quote: &Quote, dest: &Path) -> ShortsResult<Option<Narration>> {
        match &self.narrator {
            Some(narrator) => narrator.narrate(quote, dest).await.map(Some),
            None => Ok(None),
        }
    }

    async fn render(&self, job: &RenderJob) -> ShortsResult<RenderedVideo> {
        self.renderer.render(job).await
    }
}

pub struct LiveDelivery {
    client: Client,
    email: Option<EmailSettings>,
    tiktok: Option<TikTokCredentials>,
}

impl LiveDelivery {
    pub fn from_config(client: Client, cfg: &Config) -> Self {
        Self {
            client,
            email: EmailSettings::from_parts(
                cfg.sendgrid_api_key.as_deref(),
                cfg.to_email.as_deref(),
                cfg.from_email.as_deref(),
            ),
            tiktok: TikTokCredentials::from_parts(
                cfg.tiktok_access_token.as_deref(),
                cfg.tiktok_open_id.as_deref(),
            ),
        }
    }
}

#[async_trait]
impl Delivery for LiveDelivery {
    async fn deliver(&self, videos: &[ProducedVideo]) -> Result<DeliveryReport> {
        let items: Vec<(&Path, &Quote)> = videos
            .iter()
            .map(|v| (v.video.path.as_path(), &v.quote))
            .collect();
        let emailed = send_daily_videos(&self.client, self.email.as_ref(), &items)
            .await
            .context("emailing videos")?;

        let mut posted = 0;
        let total = videos.len();
        for (i, video) in videos.iter().enumerate() {
            let live = post_video(&self.client, self.tiktok.as_ref(), &video.video.path, &video.quote)
                .await
                .with_context(|| format!("publishing video {}/{total}", i + 1))?;
            if !live {
                // Stub mode: instructions already shown once.
                break;
            }
            posted += 1;
        }

        Ok(DeliveryReport {
            skipped: false,
            emailed,
            posted,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub skip_delivery: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub run_dir: PathBuf,
    pub narration: bool,
    pub dedup: bool,
    pub videos: Vec<ProducedVideo>,
    pub delivery: DeliveryReport,
}

pub fn new_run_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}

pub async fn write_manifest(summary: &RunSummary) -> Result<PathBuf> {
    let path = summary.run_dir.join(MANIFEST_FILE);
    let json = serde_json::to_string_pretty(summary)?;
    fs::write(&path, json)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

/// Full run against the live services. `cfg` must already be validated.
pub async fn run_generation(cfg: &Config, opts: &RunOptions) -> Result<RunSummary> {
    let started_at = Utc::now();
    let run_id = new_run_id();
    let run_dir = cfg.output_dir.join(&run_id);
    fs::create_dir_all(&run_dir)
        .await
        .with_context(|| format!("Failed to create run directory {}", run_dir.display()))?;
    logi(format!("Run ID: {run_id} -> output: {}", run_dir.display()));

    let client = build_client()?;
    let font = GlyphFont::load(&cfg.font_path).await.context("loading font")?;
    let narrator = if cfg.narration {
        let narrator = Narrator::connect(
            client.clone(),
            &cfg.elevenlabs_api_key,
            cfg.eleven_voice_id.as_deref(),
            cfg.eleven_model_id.as_deref(),
        )
        .await
        .context("preparing narration")?;
        Some(narrator)
    } else {
        None
    };

    let production = LiveProduction::new(client.clone(), font, narrator);
    let mut quotes = ZenQuotesCatalog::new(client.clone());
    let mut clips = PexelsCatalog::new(client.clone(), &cfg.pexels_api_key, &cfg.clip_orientation);
    let mut rng = StdRng::from_entropy();
    let store = cfg.dedup.then(|| HistoryStore::new(&cfg.history_path));
    let plan = BatchPlan {
        run_dir: run_dir.clone(),
        count: cfg.videos_per_run,
    };

    let (videos, delivery) = if opts.skip_delivery {
        execute(store.as_ref(), &plan, &mut quotes, &mut clips, &production, &NoDelivery, &mut rng).await?
    } else {
        let delivery = LiveDelivery::from_config(client.clone(), cfg);
        execute(store.as_ref(), &plan, &mut quotes, &mut clips, &production, &delivery, &mut rng).await?
    };

    let summary = RunSummary {
        run_id,
        started_at,
        finished_at: Utc::now(),
        run_dir,
        narration: cfg.narration,
        dedup: cfg.dedup,
        videos,
        delivery,
    };
    let manifest = write_manifest(&summary).await?;
    logok(format!(
        "Run complete: {} video(s), manifest {}",
        summary.videos.len(),
        manifest.display()
    ));
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_ids_are_short_and_distinct() {
        let a = new_run_id();
        let b = new_run_id();
        assert_eq!(a.len(), 8);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn artifact_names_follow_index() {
        let plan = BatchPlan {
            run_dir: PathBuf::from("output/abcd1234"),
            count: 3,
        };
        assert_eq!(plan.background_path(2), PathBuf::from("output/abcd1234/background_2.mp4"));
        assert_eq!(plan.overlay_path(2), PathBuf::from("output/abcd1234/text_overlay_2.png"));
        assert_eq!(plan.narration_path(1), PathBuf::from("output/abcd1234/narration_1.mp3"));
        assert_eq!(plan.short_path(3), PathBuf::from("output/abcd1234/short_3.mp4"));
    }

    #[tokio::test]
    async fn manifest_lands_in_run_dir() {
        let dir = tempfile::tempdir().unwrap();
        let summary = RunSummary {
            run_id: "abcd1234".into(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
            run_dir: dir.path().to_path_buf(),
            narration: false,
            dedup: true,
            videos: vec![ProducedVideo {
                index: 1,
                quote: Quote::new("Stay curious.", "Unknown"),
                clip_id: 43,
                quote_attempts: 2,
                clip_attempts: 1,
                narrated: false,
                video: RenderedVideo {
                    path: dir.path().join("short_1.mp4"),
                    size_bytes: 2048,
                    duration_secs: Some(20.0),
                },
            }],
            delivery: DeliveryReport::default(),
        };

        let path = write_manifest(&summary).await.unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();

        assert_eq!(path, dir.path().join("run.json"));
        assert_eq!(value["run_id"], "abcd1234");
        assert_eq!(value["videos"][0]["quote"]["content"], "Stay curious.");
        assert_eq!(value["videos"][0]["clip_id"], 43);
        assert_eq!(value["delivery"]["skipped"], false);
    }

    #[tokio::test]
    async fn no_delivery_reports_skip() {
        let report = NoDelivery.deliver(&[]).await.unwrap();
        assert!(report.skipped);
        assert_eq!(report.posted, 0);
    }
}
