use crate::error::{ShortsError, ShortsResult};
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// How much of ffmpeg's stderr is kept on failure.
pub const STDERR_TAIL_CHARS: usize = 2000;

pub fn tail_chars(text: &str, max_chars: usize) -> &str {
    let count = text.chars().count();
    if count <= max_chars {
        return text;
    }
    let skip = count - max_chars;
    match text.char_indices().nth(skip) {
        Some((idx, _)) => &text[idx..],
        None => "",
    }
}

/// Runs `args[0]` with the remaining args, failing on timeout or non-zero exit.
pub async fn run_cmd(args: &[String], timeout: Duration) -> ShortsResult<()> {
    let Some((program, rest)) = args.split_first() else {
        return Ok(());
    };

    let child = Command::new(program)
        .args(rest)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|err| ShortsError::render(format!("could not start {program}: {err}")))?;

    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(result) => result?,
        Err(_) => {
            return Err(ShortsError::render(format!(
                "{program} timed out after {} seconds",
                timeout.as_secs()
            )));
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ShortsError::Render {
            message: format!("{program} exited with {}", output.status),
            exit_code: output.status.code(),
            stderr_tail: Some(tail_chars(stderr.trim_end(), STDERR_TAIL_CHARS).to_string()),
        });
    }

    Ok(())
}

pub async fn ffprobe_video_dimensions(path: &Path) -> ShortsResult<(u32, u32)> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height",
            "-of",
            "csv=s=x:p=0",
        ])
        .arg(path)
        .output()
        .await
        .map_err(|err| ShortsError::render(format!("ffprobe execution failed: {err}")))?;

    if !output.status.success() {
        return Err(ShortsError::render(format!("ffprobe could not read {}", path.display())));
    }

    parse_dimensions(&String::from_utf8_lossy(&output.stdout))
        .ok_or_else(|| ShortsError::render(format!("no video stream in {}", path.display())))
}

fn parse_dimensions(text: &str) -> Option<(u32, u32)> {
    let (w, h) = text.lines().next()?.trim().split_once('x')?;
    let w = w.parse::<u32>().ok()?;
    let h = h.trim_end_matches('x').parse::<u32>().ok()?;
    (w > 0 && h > 0).then_some((w, h))
}

pub async fn ffprobe_duration_seconds(path: &Path) -> ShortsResult<f64> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(path)
        .output()
        .await
        .map_err(|err| ShortsError::render(format!("ffprobe execution failed: {err}")))?;

    if !output.status.success() {
        return Err(ShortsError::render(format!("ffprobe could not read {}", path.display())));
    }

    parse_duration(&String::from_utf8_lossy(&output.stdout))
        .ok_or_else(|| ShortsError::render(format!("invalid duration for {}", path.display())))
}

fn parse_duration(text: &str) -> Option<f64> {
    let duration = text.trim().parse::<f64>().ok()?;
    (duration > 0.1).then_some(duration)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tail_keeps_last_chars() {
        assert_eq!(tail_chars("abcdef", 3), "def");
        assert_eq!(tail_chars("abc", 10), "abc");
        assert_eq!(tail_chars("ééé", 2), "éé");
    }

    #[test]
    fn parses_ffprobe_output() {
        assert_eq!(parse_dimensions("1080x1920\n"), Some((1080, 1920)));
        assert_eq!(parse_dimensions("1080x1920x\n"), Some((1080, 1920)));
        assert_eq!(parse_dimensions("0x1920"), None);
        assert_eq!(parse_dimensions(""), None);

        assert_eq!(parse_duration("21.000000\n"), Some(21.0));
        assert_eq!(parse_duration("N/A"), None);
        assert_eq!(parse_duration("0.05"), None);
    }

    #[tokio::test]
    async fn empty_command_is_a_no_op() {
        run_cmd(&[], Duration::from_secs(1)).await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failure_reports_exit_code_and_stderr() {
        let args: Vec<String> = ["sh", "-c", "echo 'bg.mp4: Invalid data found when processing input' >&2; exit 3"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        let err = run_cmd(&args, Duration::from_secs(5)).await.unwrap_err();

        assert!(matches!(err, ShortsError::Render { exit_code: Some(3), .. }));
        let shown = format!("{:#}", anyhow::Error::new(err).context("rendering video 1/3"));
        assert!(shown.starts_with("rendering video 1/3: render failed: sh exited"), "{shown}");
        assert!(shown.contains("Invalid data found when processing input"), "{shown}");
    }

    #[tokio::test]
    async fn missing_program_is_a_render_error() {
        let args = vec!["definitely-not-a-real-binary-for-shorts".to_string()];
        let err = run_cmd(&args, Duration::from_secs(5)).await.unwrap_err();
        assert!(matches!(err, ShortsError::Render { .. }));
    }
}
