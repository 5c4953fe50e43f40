use crate::{logi, logw};
use anyhow::{Context, Result};
use std::path::Path;
use tokio::fs;

/// Creates the output directory and the directory holding the font.
pub async fn ensure_directories(output_dir: &Path, font_path: &Path) -> Result<()> {
    let font_dir = font_path.parent().filter(|p| !p.as_os_str().is_empty());
    for dir in std::iter::once(output_dir).chain(font_dir) {
        if !dir.exists() {
            fs::create_dir_all(dir)
                .await
                .with_context(|| format!("Failed to create directory {}", dir.display()))?;
            logi(format!("Created directory: {}", dir.display()));
        }
    }
    Ok(())
}

pub async fn check_ffmpeg() -> bool {
    let found = match tokio::process::Command::new("ffmpeg")
        .arg("-version")
        .output()
        .await
    {
        Ok(output) => output.status.success(),
        Err(_) => false,
    };
    if !found {
        logw("ffmpeg not found on PATH; rendering will fail");
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn creates_output_and_font_dirs() {
        let root = tempfile::tempdir().unwrap();
        let output = root.path().join("output");
        let font = root.path().join("assets/fonts/Montserrat-Bold.ttf");

        ensure_directories(&output, &font).await.unwrap();
        ensure_directories(&output, &font).await.unwrap();

        assert!(output.is_dir());
        assert!(root.path().join("assets/fonts").is_dir());
        assert!(!font.exists());
    }

    #[tokio::test]
    async fn bare_font_name_needs_no_dir() {
        let root = tempfile::tempdir().unwrap();
        let output = root.path().join("out");
        ensure_directories(&output, Path::new("font.ttf")).await.unwrap();
        assert!(output.is_dir());
    }
}
