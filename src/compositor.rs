//! Builds the ffmpeg filter graph that stacks background, text layer and
//! optional narration into the final 1080x1920 short, and runs it.

use crate::error::ShortsResult;
use crate::ffmpeg::{ffprobe_duration_seconds, run_cmd};
use crate::layout::{CANVAS_HEIGHT, CANVAS_WIDTH};
use crate::{logi, logok, logw};
use async_trait::async_trait;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

/// Silence appended after the narration so speech does not cut off abruptly.
pub const NARRATION_TAIL_SECS: f64 = 1.0;
pub const SILENT_DURATION_SECS: f64 = 20.0;
pub const RENDER_TIMEOUT: Duration = Duration::from_secs(600);

#[derive(Debug, Clone, PartialEq)]
pub struct Narration {
    pub path: PathBuf,
    pub duration_secs: f64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodingProfile {
    pub preset: &'static str,
    pub crf: u8,
    /// `(maxrate, bufsize)` ceiling for the video stream.
    pub bitrate_cap: Option<(&'static str, &'static str)>,
    pub audio_bitrate: &'static str,
}

impl EncodingProfile {
    pub const NARRATED: EncodingProfile = EncodingProfile {
        preset: "fast",
        crf: 23,
        bitrate_cap: None,
        audio_bitrate: "128k",
    };

    pub const SILENT: EncodingProfile = EncodingProfile {
        preset: "fast",
        crf: 23,
        bitrate_cap: Some(("3M", "6M")),
        audio_bitrate: "128k",
    };
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderJob {
    pub background: PathBuf,
    pub overlay: PathBuf,
    pub narration: Option<Narration>,
    pub duration_secs: f64,
    pub output: PathBuf,
    pub encoding: EncodingProfile,
}

impl RenderJob {
    pub fn narrated(background: PathBuf, overlay: PathBuf, narration: Narration, output: PathBuf) -> Self {
        Self {
            background,
            overlay,
            duration_secs: narration.duration_secs + NARRATION_TAIL_SECS,
            narration: Some(narration),
            output,
            encoding: EncodingProfile::NARRATED,
        }
    }

    pub fn silent(background: PathBuf, overlay: PathBuf, output: PathBuf) -> Self {
        Self {
            background,
            overlay,
            narration: None,
            duration_secs: SILENT_DURATION_SECS,
            output,
            encoding: EncodingProfile::SILENT,
        }
    }

    pub fn filter_graph(&self) -> String {
        let (w, h) = (CANVAS_WIDTH, CANVAS_HEIGHT);
        if self.narration.is_some() {
            format!(
                "[0:v]split=2[bg_in][fg_in];\
                 [bg_in]scale={w}:{h}:force_original_aspect_ratio=increase,crop={w}:{h},gblur=sigma=30[bg];\
                 [fg_in]scale={w}:-2[fg];\
                 [bg][fg]overlay=0:(H-h)/2[composed];\
                 [composed][1:v]overlay=0:0[video_out]"
            )
        } else {
            format!(
                "[0:v]scale={w}:{h}:force_original_aspect_ratio=increase,crop={w}:{h}[bg];\
                 [bg][1:v]overlay=0:0[video_out]"
            )
        }
    }

    /// ffmpeg arguments (without the program name) writing to `dest`.
    pub fn ffmpeg_args(&self, dest: &Path) -> Vec<String> {
        let mut args = vec![
            "-y".to_string(),
            "-hide_banner".to_string(),
            "-loglevel".to_string(),
            "error".to_string(),
            "-stream_loop".to_string(),
            "-1".to_string(),
            "-i".to_string(),
            self.background.display().to_string(),
            "-i".to_string(),
            self.overlay.display().to_string(),
        ];

        if let Some(narration) = &self.narration {
            args.push("-i".to_string());
            args.push(narration.path.display().to_string());
        }

        args.extend([
            "-filter_complex".to_string(),
            self.filter_graph(),
            "-map".to_string(),
            "[video_out]".to_string(),
        ]);

        if self.narration.is_some() {
            args.extend(["-map".to_string(), "2:a".to_string()]);
        }

        args.extend([
            "-t".to_string(),
            format!("{:.3}", self.duration_secs),
            "-c:v".to_string(),
            "libx264".to_string(),
            "-preset".to_string(),
            self.encoding.preset.to_string(),
            "-crf".to_string(),
            self.encoding.crf.to_string(),
        ]);

        if let Some((maxrate, bufsize)) = self.encoding.bitrate_cap {
            args.extend([
                "-maxrate".to_string(),
                maxrate.to_string(),
                "-bufsize".to_string(),
                bufsize.to_string(),
            ]);
        }

        args.extend(["-pix_fmt".to_string(), "yuv420p".to_string()]);

        if self.narration.is_some() {
            args.extend([
                "-c:a".to_string(),
                "aac".to_string(),
                "-b:a".to_string(),
                self.encoding.audio_bitrate.to_string(),
            ]);
        } else {
            args.push("-an".to_string());
        }

        args.extend([
            "-movflags".to_string(),
            "+faststart".to_string(),
            dest.display().to_string(),
        ]);
        args
    }
}

/// Scratch file the encoder writes before the result is promoted.
pub fn partial_path(output: &Path) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "render".to_string());
    output.with_file_name(format!("{stem}.partial.mp4"))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedVideo {
    pub path: PathBuf,
    pub size_bytes: u64,
    /// Probed duration; `None` when ffprobe could not read the file.
    pub duration_secs: Option<f64>,
}

impl RenderedVideo {
    pub fn size_mb(&self) -> f64 {
        self.size_bytes as f64 / (1024.0 * 1024.0)
    }
}

#[async_trait]
pub trait MediaRenderer: Send + Sync {
    async fn render(&self, job: &RenderJob) -> ShortsResult<RenderedVideo>;
}

pub struct FfmpegRenderer {
    program: String,
    timeout: Duration,
}

impl Default for FfmpegRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl FfmpegRenderer {
    pub fn new() -> Self {
        Self {
            program: "ffmpeg".to_string(),
            timeout: RENDER_TIMEOUT,
        }
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

async fn remove_if_present(path: &Path) {
    if let Err(err) = fs::remove_file(path).await {
        if err.kind() != std::io::ErrorKind::NotFound {
            logw(format!("Could not remove {}: {}", path.display(), err));
        }
    }
}

#[async_trait]
impl MediaRenderer for FfmpegRenderer {
    async fn render(&self, job: &RenderJob) -> ShortsResult<RenderedVideo> {
        let partial = partial_path(&job.output);
        remove_if_present(&partial).await;

        let mut args = vec![self.program.clone()];
        args.extend(job.ffmpeg_args(&partial));

        tracing::info!(
            output = %job.output.display(),
            duration = job.duration_secs,
            narrated = job.narration.is_some(),
            "Running FFmpeg composition"
        );
        tracing::debug!("{}", args.join(" "));

        if let Err(err) = run_cmd(&args, self.timeout).await {
            remove_if_present(&partial).await;
            return Err(err);
        }

        fs::rename(&partial, &job.output).await?;
        let size_bytes = fs::metadata(&job.output).await?.len();

        let duration_secs = match ffprobe_duration_seconds(&job.output).await {
            Ok(d) => Some(d),
            Err(err) => {
                logw(format!("Could not inspect {}: {}", job.output.display(), err));
                None
            }
        };

        let video = RenderedVideo {
            path: job.output.clone(),
            size_bytes,
            duration_secs,
        };
        logok(format!(
            "Video saved: {} ({:.1} MB, {:.1}s)",
            video.path.display(),
            video.size_mb(),
            duration_secs.unwrap_or(job.duration_secs)
        ));
        if let Some(measured) = duration_secs {
            if (measured - job.duration_secs).abs() > 0.2 {
                logi(format!(
                    "Probed duration {:.2}s differs from requested {:.2}s",
                    measured, job.duration_secs
                ));
            }
        }
        Ok(video)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ShortsError;
    use crate::ffmpeg::ffprobe_video_dimensions;

    fn narrated_job() -> RenderJob {
        RenderJob::narrated(
            PathBuf::from("run/background_1.mp4"),
            PathBuf::from("run/text_overlay_1.png"),
            Narration {
                path: PathBuf::from("run/narration_1.mp3"),
                duration_secs: 6.5,
            },
            PathBuf::from("run/short_1.mp4"),
        )
    }

    fn silent_job() -> RenderJob {
        RenderJob::silent(
            PathBuf::from("run/background_1.mp4"),
            PathBuf::from("run/text_overlay_1.png"),
            PathBuf::from("run/short_1.mp4"),
        )
    }

    fn value_after<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1))
            .map(String::as_str)
    }

    #[test]
    fn narrated_duration_adds_tail() {
        let job = narrated_job();
        assert!((job.duration_secs - 7.5).abs() < 1e-9);
        let args = job.ffmpeg_args(Path::new("out.mp4"));
        assert_eq!(value_after(&args, "-t"), Some("7.500"));
    }

    #[test]
    fn silent_duration_is_fixed() {
        let job = silent_job();
        assert_eq!(job.duration_secs, SILENT_DURATION_SECS);
        let args = job.ffmpeg_args(Path::new("out.mp4"));
        assert_eq!(value_after(&args, "-t"), Some("20.000"));
    }

    #[test]
    fn background_is_looped_at_the_source() {
        for job in [narrated_job(), silent_job()] {
            let args = job.ffmpeg_args(Path::new("out.mp4"));
            let loop_at = args.iter().position(|a| a == "-stream_loop").unwrap();
            let first_input = args.iter().position(|a| a == "-i").unwrap();
            assert!(loop_at < first_input);
            assert_eq!(args[loop_at + 1], "-1");
            assert_eq!(args[first_input + 1], "run/background_1.mp4");
        }
    }

    #[test]
    fn narrated_graph_blurs_and_centres() {
        let graph = narrated_job().filter_graph();
        assert_eq!(
            graph,
            "[0:v]split=2[bg_in][fg_in];\
             [bg_in]scale=1080:1920:force_original_aspect_ratio=increase,crop=1080:1920,gblur=sigma=30[bg];\
             [fg_in]scale=1080:-2[fg];\
             [bg][fg]overlay=0:(H-h)/2[composed];\
             [composed][1:v]overlay=0:0[video_out]"
        );
    }

    #[test]
    fn silent_graph_covers_and_crops() {
        let graph = silent_job().filter_graph();
        assert_eq!(
            graph,
            "[0:v]scale=1080:1920:force_original_aspect_ratio=increase,crop=1080:1920[bg];\
             [bg][1:v]overlay=0:0[video_out]"
        );
        assert!(!graph.contains("gblur"));
    }

    #[test]
    fn narrated_args_mux_audio() {
        let args = narrated_job().ffmpeg_args(Path::new("out.mp4"));
        assert_eq!(args.iter().filter(|a| *a == "-i").count(), 3);
        assert_eq!(value_after(&args, "-c:a"), Some("aac"));
        assert!(args.windows(2).any(|w| w[0] == "-map" && w[1] == "2:a"));
        assert!(!args.contains(&"-maxrate".to_string()));
        assert!(!args.contains(&"-an".to_string()));
    }

    #[test]
    fn silent_args_cap_bitrate_and_drop_audio() {
        let args = silent_job().ffmpeg_args(Path::new("out.mp4"));
        assert_eq!(args.iter().filter(|a| *a == "-i").count(), 2);
        assert_eq!(value_after(&args, "-maxrate"), Some("3M"));
        assert_eq!(value_after(&args, "-bufsize"), Some("6M"));
        assert!(args.contains(&"-an".to_string()));
        assert!(!args.contains(&"-c:a".to_string()));
    }

    #[test]
    fn shared_encoding_parameters() {
        for job in [narrated_job(), silent_job()] {
            let args = job.ffmpeg_args(Path::new("dest.mp4"));
            assert_eq!(value_after(&args, "-c:v"), Some("libx264"));
            assert_eq!(value_after(&args, "-pix_fmt"), Some("yuv420p"));
            assert_eq!(value_after(&args, "-movflags"), Some("+faststart"));
            assert_eq!(args.first().map(String::as_str), Some("-y"));
            assert_eq!(args.last().map(String::as_str), Some("dest.mp4"));
        }
    }

    #[test]
    fn partial_path_sits_next_to_output() {
        assert_eq!(
            partial_path(Path::new("output/ab12cd34/short_1.mp4")),
            PathBuf::from("output/ab12cd34/short_1.partial.mp4")
        );
    }

    #[tokio::test]
    async fn failed_render_leaves_no_output() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("short_1.mp4");
        std::fs::write(partial_path(&output), b"stale bytes").unwrap();

        let job = RenderJob::silent(dir.path().join("bg.mp4"), dir.path().join("overlay.png"), output.clone());
        let renderer = FfmpegRenderer::new()
            .with_program("definitely-not-ffmpeg-for-shorts")
            .with_timeout(Duration::from_secs(5));

        let err = renderer.render(&job).await.unwrap_err();

        assert!(matches!(err, ShortsError::Render { .. }));
        assert!(!output.exists());
        assert!(!partial_path(&output).exists());
    }

    async fn media_tools_available() -> bool {
        for tool in ["ffmpeg", "ffprobe"] {
            let found = tokio::process::Command::new(tool)
                .arg("-version")
                .output()
                .await
                .map(|o| o.status.success())
                .unwrap_or(false);
            if !found {
                eprintln!("{tool} not on PATH, skipping");
                return false;
            }
        }
        true
    }

    async fn ffmpeg(args: &[&str]) {
        let mut cmd: Vec<String> = ["ffmpeg", "-y", "-hide_banner", "-loglevel", "error"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        cmd.extend(args.iter().map(|a| a.to_string()));
        run_cmd(&cmd, Duration::from_secs(60)).await.unwrap();
    }

    /// Two-second 320x240 test pattern plus a transparent full-canvas overlay.
    async fn sources(dir: &Path) -> (PathBuf, PathBuf) {
        let background = dir.join("background_1.mp4");
        ffmpeg(&[
            "-f",
            "lavfi",
            "-i",
            "testsrc=size=320x240:rate=25:duration=2",
            "-pix_fmt",
            "yuv420p",
            background.to_str().unwrap(),
        ])
        .await;

        let overlay = dir.join("text_overlay_1.png");
        image::RgbaImage::from_pixel(CANVAS_WIDTH, CANVAS_HEIGHT, image::Rgba([0, 0, 0, 0]))
            .save(&overlay)
            .unwrap();
        (background, overlay)
    }

    #[tokio::test]
    async fn silent_render_loops_short_clip_to_full_length() {
        if !media_tools_available().await {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let (background, overlay) = sources(dir.path()).await;
        let output = dir.path().join("short_1.mp4");

        let video = FfmpegRenderer::new()
            .render(&RenderJob::silent(background, overlay, output.clone()))
            .await
            .unwrap();

        assert_eq!(video.path, output);
        assert!(video.size_bytes > 0);
        assert!(!partial_path(&output).exists());

        let measured = ffprobe_duration_seconds(&output).await.unwrap();
        assert!((measured - SILENT_DURATION_SECS).abs() <= 0.2, "duration {measured}");
        assert_eq!(ffprobe_video_dimensions(&output).await.unwrap(), (1080, 1920));
    }

    #[tokio::test]
    async fn narrated_render_runs_one_second_past_narration() {
        if !media_tools_available().await {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let (background, overlay) = sources(dir.path()).await;
        let narration_path = dir.path().join("narration_1.m4a");
        ffmpeg(&[
            "-f",
            "lavfi",
            "-i",
            "sine=frequency=440:duration=3",
            "-c:a",
            "aac",
            narration_path.to_str().unwrap(),
        ])
        .await;
        let narration = Narration {
            duration_secs: ffprobe_duration_seconds(&narration_path).await.unwrap(),
            path: narration_path,
        };
        let expected = narration.duration_secs + NARRATION_TAIL_SECS;
        let output = dir.path().join("short_1.mp4");

        FfmpegRenderer::new()
            .render(&RenderJob::narrated(background, overlay, narration, output.clone()))
            .await
            .unwrap();

        let measured = ffprobe_duration_seconds(&output).await.unwrap();
        assert!((measured - expected).abs() <= 0.2, "duration {measured}, expected {expected}");
        assert_eq!(ffprobe_video_dimensions(&output).await.unwrap(), (1080, 1920));
    }
}
