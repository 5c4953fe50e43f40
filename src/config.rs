use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub pexels_api_key: String,
    #[serde(default)]
    pub elevenlabs_api_key: String,
    #[serde(default)]
    pub eleven_voice_id: Option<String>,
    #[serde(default)]
    pub eleven_model_id: Option<String>,
    #[serde(default)]
    pub sendgrid_api_key: Option<String>,
    #[serde(default)]
    pub to_email: Option<String>,
    #[serde(default)]
    pub from_email: Option<String>,
    #[serde(default)]
    pub tiktok_access_token: Option<String>,
    #[serde(default)]
    pub tiktok_open_id: Option<String>,
    #[serde(default = "default_videos_per_run")]
    pub videos_per_run: u32,
    #[serde(default)]
    pub narration: bool,
    #[serde(default = "default_true")]
    pub dedup: bool,
    #[serde(default = "default_orientation")]
    pub clip_orientation: String,
    #[serde(default = "default_font_path")]
    pub font_path: PathBuf,
    #[serde(default = "default_history_path")]
    pub history_path: PathBuf,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive such as "info" or "daily_quote_shorts=debug,warn".
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

fn default_videos_per_run() -> u32 {
    3
}

fn default_true() -> bool {
    true
}

fn default_orientation() -> String {
    "portrait".to_string()
}

fn default_font_path() -> PathBuf {
    PathBuf::from("assets/fonts/Montserrat-Bold.ttf")
}

fn default_history_path() -> PathBuf {
    PathBuf::from("history.json")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pexels_api_key: String::new(),
            elevenlabs_api_key: String::new(),
            eleven_voice_id: None,
            eleven_model_id: None,
            sendgrid_api_key: None,
            to_email: None,
            from_email: None,
            tiktok_access_token: None,
            tiktok_open_id: None,
            videos_per_run: default_videos_per_run(),
            narration: false,
            dedup: true,
            clip_orientation: default_orientation(),
            font_path: default_font_path(),
            history_path: default_history_path(),
            output_dir: default_output_dir(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Reads the JSON file (defaults if absent) and applies environment overrides.
    /// Validation is left to the caller so CLI flags can still adjust the result.
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut config = match fs::read_to_string(path).await {
            Ok(content) => serde_json::from_str::<Config>(&content)
                .with_context(|| format!("Failed to parse config: {}", path.display()))?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Config::default(),
            Err(err) => {
                return Err(err).with_context(|| format!("Failed to read config: {}", path.display()));
            }
        };

        config.apply_env_from(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Overrides fields from `lookup`; empty values are ignored.
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("PEXELS_API_KEY") {
            self.pexels_api_key = v;
        }
        if let Some(v) = get("ELEVENLABS_API_KEY") {
            self.elevenlabs_api_key = v;
        }

        let optional = [
            ("ELEVENLABS_VOICE_ID", &mut self.eleven_voice_id),
            ("ELEVENLABS_MODEL_ID", &mut self.eleven_model_id),
            ("SENDGRID_API_KEY", &mut self.sendgrid_api_key),
            ("TO_EMAIL", &mut self.to_email),
            ("FROM_EMAIL", &mut self.from_email),
            ("TIKTOK_ACCESS_TOKEN", &mut self.tiktok_access_token),
            ("TIKTOK_OPEN_ID", &mut self.tiktok_open_id),
        ];
        for (key, slot) in optional {
            if let Some(v) = get(key) {
                *slot = Some(v);
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.pexels_api_key.trim().is_empty() {
            anyhow::bail!("config: pexels_api_key missing (set it in the config file or PEXELS_API_KEY)");
        }
        if self.narration && self.elevenlabs_api_key.trim().is_empty() {
            anyhow::bail!("config: narration is enabled but elevenlabs_api_key is missing");
        }
        if self.videos_per_run == 0 {
            anyhow::bail!("config: videos_per_run must be at least 1");
        }
        Ok(())
    }
}
