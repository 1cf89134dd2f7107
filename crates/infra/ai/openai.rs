use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};
use reqwest::header::AUTHORIZATION;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::error;

use crate::domain::repositories::content_generator::ContentGenerator;

const SYSTEM_PROMPT: &str = "You write content for CMS records. Use the record's other \
fields as context and answer with the requested field value only, without quotes or commentary.";

/// Client for an OpenAI-compatible API. The key is chosen by the caller so owned and
/// managed credentials share one client.
pub struct OpenAiClient {
    http: reqwest::Client,
    base_url: String,
    text_model: String,
    image_model: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ImageResponse {
    data: Vec<ImageData>,
}

#[derive(Debug, Deserialize)]
struct ImageData {
    b64_json: Option<String>,
    url: Option<String>,
}

impl OpenAiClient {
    pub fn new(base_url: String, text_model: String, image_model: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            text_model,
            image_model,
        }
    }

    async fn ensure_success(resp: reqwest::Response, context: &str) -> Result<reqwest::Response> {
        if resp.status().is_success() {
            return Ok(resp);
        }

        let status = resp.status();
        let body = match resp.text().await {
            Ok(text) if !text.is_empty() => text,
            Ok(_) => "<empty response body>".to_string(),
            Err(err) => format!("<failed to read response body: {err}>"),
        };

        let message = serde_json::from_str::<Value>(&body).ok().and_then(|value| {
            value
                .pointer("/error/message")
                .and_then(Value::as_str)
                .map(str::to_string)
        });

        error!(
            status = %status,
            openai_message = ?message,
            context = %context,
            "openai api request failed"
        );

        match message {
            Some(message) => anyhow::bail!("{context} failed ({status}): {message}"),
            None => anyhow::bail!("{context} failed ({status})"),
        }
    }

    fn extract_text(response: ChatCompletionResponse) -> Result<String> {
        let text = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .context("text generation returned no content")?;
        Ok(text)
    }
}

#[async_trait]
impl ContentGenerator for OpenAiClient {
    async fn generate_text(
        &self,
        api_key: &str,
        prompt: String,
        context: String,
    ) -> Result<String> {
        let user_message = if context.is_empty() {
            prompt
        } else {
            format!("{prompt}\n\nRecord:\n{context}")
        };

        let resp = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .header(AUTHORIZATION, format!("Bearer {api_key}"))
            .json(&json!({
                "model": self.text_model,
                "messages": [
                    {"role": "system", "content": SYSTEM_PROMPT},
                    {"role": "user", "content": user_message}
                ]
            }))
            .send()
            .await?;
        let resp = Self::ensure_success(resp, "text generation").await?;

        let parsed: ChatCompletionResponse = resp.json().await.context("decode chat completion")?;
        Self::extract_text(parsed)
    }

    async fn generate_image(&self, api_key: &str, prompt: String) -> Result<Vec<u8>> {
        let resp = self
            .http
            .post(format!("{}/images/generations", self.base_url))
            .header(AUTHORIZATION, format!("Bearer {api_key}"))
            .json(&json!({
                "model": self.image_model,
                "prompt": prompt,
                "n": 1,
                "size": "1024x1024"
            }))
            .send()
            .await?;
        let resp = Self::ensure_success(resp, "image generation").await?;

        let parsed: ImageResponse = resp.json().await.context("decode image generation")?;
        let image = parsed
            .data
            .into_iter()
            .next()
            .context("image generation returned no data")?;

        if let Some(encoded) = image.b64_json {
            return STANDARD
                .decode(encoded.as_bytes())
                .context("image generation returned invalid base64");
        }

        let url = image.url.context("image generation returned neither b64_json nor url")?;
        let resp = self.http.get(&url).send().await?;
        let resp = Self::ensure_success(resp, "download generated image").await?;
        Ok(resp.bytes().await?.to_vec())
    }
}
