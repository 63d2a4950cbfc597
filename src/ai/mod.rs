//! Thin client for the generative-language API behind the "inspire me" and
//! "vibe check" features. Model output is opaque display data: it is cleaned
//! and parsed defensively, and anything malformed degrades to an empty
//! suggestion list rather than an error.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::AiConfig;
use crate::db::models::Vibe;
use crate::error::{AppError, AppResult};

/// A structured activity suggestion produced by the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Suggestion {
    pub activity: String,
    pub reason: String,
    pub vibe: Vibe,
    pub details: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lng: Option<f64>,
}

/// Free-text preferences driving the suggestion prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiPreferences {
    pub vibe: Vibe,
    pub social: String,
    pub time: String,
    pub duration: String,
    pub alone_ok: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VibeCheckRequest {
    pub title: String,
    pub location: String,
    pub date: String,
    pub time: String,
}

#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
}

impl GeminiClient {
    pub fn new(http: reqwest::Client, config: &AiConfig) -> Self {
        GeminiClient {
            http,
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        }
    }

    /// Ask the model for three venue suggestions matching the preferences.
    /// Malformed model output yields an empty list, not an error.
    pub async fn inspire(&self, prefs: &AiPreferences) -> AppResult<Vec<Suggestion>> {
        let text = self.generate(&inspire_prompt(prefs)).await?;
        Ok(parse_suggestions(&text))
    }

    /// Short free-text commentary on a planned event.
    pub async fn vibe_check(&self, req: &VibeCheckRequest) -> AppResult<String> {
        self.generate(&vibe_check_prompt(req)).await
    }

    async fn generate(&self, prompt: &str) -> AppResult<String> {
        let key = self
            .api_key
            .as_deref()
            .ok_or_else(|| AppError::Upstream("no Gemini API key configured".into()))?;

        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, key
        );
        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }]
        });

        let response = self.http.post(&url).json(&body).send().await?;
        if !response.status().is_success() {
            return Err(AppError::Upstream(format!(
                "generative API returned {}",
                response.status()
            )));
        }

        let payload: serde_json::Value = response.json().await?;
        payload["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| AppError::Upstream("generative API response had no text".into()))
    }
}

fn inspire_prompt(prefs: &AiPreferences) -> String {
    let now = chrono::Local::now();
    format!(
        "You are an assistant for a social app called Vamos that helps people find spontaneous activities.\n\
         \n\
         Search for 3 real, specific venues or public spaces that fit a \"{vibe}\" vibe.\n\
         Social context: {social}.\n\
         Time preference: {time}.\n\
         Intended duration: {duration}.\n\
         Is it okay to go alone? {alone_ok}.\n\
         Current time: {current_time}, {current_date}.\n\
         \n\
         IMPORTANT: Suggest REAL types of locations (cafes, parks, bars, galleries, etc.) with realistic names and descriptions. Include approximate lat/lng coordinates.\n\
         \n\
         Respond with ONLY a JSON array, no markdown, no backticks. Each object must have:\n\
         - activity (string): name of the place/activity\n\
         - reason (string): why it fits the vibe\n\
         - vibe (string): one of cozy, curious, fun, chill, spontaneous\n\
         - details (string): what to expect\n\
         - lat (number): approximate latitude\n\
         - lng (number): approximate longitude",
        vibe = prefs.vibe,
        social = prefs.social,
        time = prefs.time,
        duration = prefs.duration,
        alone_ok = prefs.alone_ok,
        current_time = now.format("%H:%M:%S"),
        current_date = now.format("%Y-%m-%d"),
    )
}

fn vibe_check_prompt(req: &VibeCheckRequest) -> String {
    format!(
        "You are a friendly assistant for a social app called Vamos.\n\
         \n\
         Someone is planning this event:\n\
         - Title: {title}\n\
         - Location: {location}\n\
         - Time: {time} on {date}\n\
         \n\
         Give a brief, friendly vibe check:\n\
         1. Is this a real, reasonable place and time?\n\
         2. Any tips (busy hours, weather considerations, parking, etc.)?\n\
         3. Keep it casual and \"no-pressure\" - this is a spontaneous hangout app.\n\
         \n\
         Be concise (2-3 short paragraphs max). Use a warm, encouraging tone. If something seems off, gently mention it.",
        title = req.title,
        location = req.location,
        time = req.time,
        date = req.date,
    )
}

/// Models often wrap JSON in markdown fences despite instructions.
fn strip_code_fences(text: &str) -> String {
    text.replace("```json", "").replace("```", "").trim().to_string()
}

fn parse_suggestions(text: &str) -> Vec<Suggestion> {
    let cleaned = strip_code_fences(text);
    match serde_json::from_str::<Vec<Suggestion>>(&cleaned) {
        Ok(suggestions) => suggestions,
        Err(e) => {
            tracing::warn!("Could not parse model suggestions: {}", e);
            Vec::new()
        }
    }
}
