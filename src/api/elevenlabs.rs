use crate::api::snippet;
use crate::catalog::Quote;
use crate::compositor::Narration;
use crate::error::{ShortsError, ShortsResult};
use crate::ffmpeg::ffprobe_duration_seconds;
use crate::logi;
use reqwest::Client;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tokio::fs;

pub const ELEVENLABS_BASE: &str = "https://api.elevenlabs.io/v1";
const SERVICE: &str = "ElevenLabs";
const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(10);
const TTS_TIMEOUT: Duration = Duration::from_secs(60);

/// Fast, cheap models tried in order before falling back to any TTS model.
pub const PREFERRED_MODELS: [&str; 3] = ["eleven_turbo_v2", "eleven_flash_v2_5", "eleven_turbo_v2_5"];

#[derive(Debug, Clone, Deserialize)]
pub struct VoiceInfo {
    pub voice_id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct VoicesResponse {
    #[serde(default)]
    voices: Vec<VoiceInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelInfo {
    pub model_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub can_do_text_to_speech: bool,
}

pub fn pick_model(models: &[ModelInfo]) -> Option<&ModelInfo> {
    let tts = || models.iter().filter(|m| m.can_do_text_to_speech);
    PREFERRED_MODELS
        .iter()
        .find_map(|pref| tts().find(|m| m.model_id == *pref))
        .or_else(|| tts().next())
}

pub fn narration_text(quote: &Quote) -> String {
    format!("{} — {}", quote.content, quote.author)
}

/// A resolved voice/model pair bound to an API key.
#[derive(Debug, Clone)]
pub struct Narrator {
    client: Client,
    api_key: String,
    base_url: String,
    pub voice_id: String,
    pub model_id: String,
}

impl Narrator {
    /// Uses the configured voice and model, discovering whichever is missing.
    pub async fn connect(
        client: Client,
        api_key: &str,
        voice_id: Option<&str>,
        model_id: Option<&str>,
    ) -> ShortsResult<Self> {
        let mut narrator = Narrator {
            client,
            api_key: api_key.to_string(),
            base_url: ELEVENLABS_BASE.to_string(),
            voice_id: String::new(),
            model_id: String::new(),
        };

        narrator.voice_id = match voice_id.filter(|v| !v.is_empty()) {
            Some(v) => v.to_string(),
            None => narrator.discover_voice().await?,
        };
        narrator.model_id = match model_id.filter(|m| !m.is_empty()) {
            Some(m) => m.to_string(),
            None => narrator.discover_model().await?,
        };
        Ok(narrator)
    }

    async fn get_json(&self, path: &str) -> ShortsResult<String> {
        let resp = self
            .client
            .get(format!("{}/{path}", self.base_url))
            .header("xi-api-key", &self.api_key)
            .timeout(DISCOVERY_TIMEOUT)
            .send()
            .await
            .map_err(|err| ShortsError::upstream(SERVICE, err))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ShortsError::upstream(SERVICE, format!("GET /{path} HTTP {}", status.as_u16())));
        }
        resp.text().await.map_err(|err| ShortsError::upstream(SERVICE, err))
    }

    async fn discover_voice(&self) -> ShortsResult<String> {
        let body = self.get_json("voices").await?;
        let parsed: VoicesResponse = serde_json::from_str(&body)
            .map_err(|err| ShortsError::upstream(SERVICE, format!("voices response: {err}")))?;
        let voice = parsed
            .voices
            .into_iter()
            .next()
            .ok_or_else(|| ShortsError::upstream(SERVICE, "no voices found on account"))?;
        logi(format!("Using voice: {} ({})", voice.name, voice.voice_id));
        Ok(voice.voice_id)
    }

    async fn discover_model(&self) -> ShortsResult<String> {
        let body = self.get_json("models").await?;
        let models: Vec<ModelInfo> = serde_json::from_str(&body)
            .map_err(|err| ShortsError::upstream(SERVICE, format!("models response: {err}")))?;
        let model = pick_model(&models)
            .ok_or_else(|| ShortsError::upstream(SERVICE, "no TTS-capable models found on account"))?;
        logi(format!("Using model: {} ({})", model.name, model.model_id));
        Ok(model.model_id.clone())
    }

    pub async fn tts_to_mp3(&self, text: &str, out_mp3_path: &Path) -> ShortsResult<()> {
        let url = format!(
            "{}/text-to-speech/{}?output_format=mp3_44100_128",
            self.base_url, self.voice_id
        );

        let body = serde_json::json!({
            "text": text,
            "model_id": self.model_id,
            "voice_settings": {
                "stability": 0.5,
                "similarity_boost": 0.75,
            },
        });

        let resp = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .header("Accept", "audio/mpeg")
            .header("xi-api-key", &self.api_key)
            .json(&body)
            .timeout(TTS_TIMEOUT)
            .send()
            .await
            .map_err(|err| ShortsError::upstream(SERVICE, err))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(ShortsError::upstream(
                SERVICE,
                format!("TTS HTTP {}: {}", status.as_u16(), snippet(&text, 500)),
            ));
        }

        let bytes = resp.bytes().await.map_err(|err| ShortsError::upstream(SERVICE, err))?;
        if bytes.is_empty() {
            return Err(ShortsError::upstream(SERVICE, "TTS returned no audio"));
        }
        if let Some(parent) = out_mp3_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(out_mp3_path, &bytes).await?;
        Ok(())
    }

    /// Speaks the quote into `dest` and measures the result.
    pub async fn narrate(&self, quote: &Quote, dest: &Path) -> ShortsResult<Narration> {
        let text = narration_text(quote);
        logi(format!("Generating narration ({} chars)", text.chars().count()));
        self.tts_to_mp3(&text, dest).await?;

        let duration_secs = ffprobe_duration_seconds(dest).await?;
        logi(format!("Narration saved: {} ({duration_secs:.2}s)", dest.display()));
        Ok(Narration {
            path: dest.to_path_buf(),
            duration_secs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(id: &str, tts: bool) -> ModelInfo {
        ModelInfo {
            model_id: id.to_string(),
            name: id.to_string(),
            can_do_text_to_speech: tts,
        }
    }

    #[test]
    fn prefers_fast_models_in_order() {
        let models = vec![
            model("eleven_multilingual_v2", true),
            model("eleven_turbo_v2_5", true),
            model("eleven_flash_v2_5", true),
        ];
        assert_eq!(pick_model(&models).unwrap().model_id, "eleven_flash_v2_5");
    }

    #[test]
    fn falls_back_to_first_tts_model() {
        let models = vec![
            model("eleven_turbo_v2", false),
            model("eleven_english_sts_v2", false),
            model("eleven_multilingual_v2", true),
        ];
        assert_eq!(pick_model(&models).unwrap().model_id, "eleven_multilingual_v2");
        assert!(pick_model(&[model("speech_to_speech", false)]).is_none());
    }

    #[test]
    fn models_response_tolerates_missing_flags() {
        let body = r#"[{"model_id":"eleven_turbo_v2","name":"Turbo v2","can_do_text_to_speech":true},{"model_id":"sts"}]"#;
        let models: Vec<ModelInfo> = serde_json::from_str(body).unwrap();
        assert!(!models[1].can_do_text_to_speech);
        assert_eq!(pick_model(&models).unwrap().name, "Turbo v2");
    }

    #[test]
    fn narration_reads_quote_then_author() {
        let quote = Quote::new("Stay curious.", "Unknown");
        assert_eq!(narration_text(&quote), "Stay curious. — Unknown");
    }
}
