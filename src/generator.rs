// generator.rs - Turns an audio file into a structured blog post via Gemini
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::GeminiConfig;
use crate::error::GenerationError;
use crate::gemini_client::{
    truncate, Content, FileData, GeminiClient, GenerateContentRequest, GenerationConfig, Part,
    UploadedFile,
};
use crate::models::BlogPost;
use crate::retry::{RetryPolicy, Sleeper, TokioSleeper};

const BLOG_POST_PROMPT: &str = "You are a professional content writer. Listen to this audio and write a comprehensive, detailed blog post based on it.

STRICT OUTPUT RULES:
1. Return ONLY a valid JSON object. No markdown formatting.
2. NO emojis.
3. NO repetition.
4. NO hashtags.
5. Content must be in English, detailed, and professional.

CONTENT REQUIREMENTS:
- Write a full-length article (approx 800-1000 words).
- Include an introduction, a detailed breakdown of the key topics, and a conclusion.
- Use <h2> for main sections and <h3> for subsections.
- Use <ul>/<li> for lists where appropriate.
- The tone should be engaging and educational.

JSON STRUCTURE:
{
  \"title\": \"Clear, professional title\",
  \"content_html\": \"The full blog post in HTML using <h2>, <h3>, <p> and <ul> tags. No <h1>.\",
  \"summary_for_card\": \"A 2-3 sentence summary for the preview card.\"
}";

const FILE_POLL_ATTEMPTS: u32 = 30;
const FILE_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Produces a blog post from a local audio file.
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    async fn generate(&self, audio_path: &Path) -> Result<BlogPost, GenerationError>;
}

pub struct GeminiGenerator {
    client: Option<GeminiClient>,
    model: String,
    retry: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl GeminiGenerator {
    pub fn new(config: &GeminiConfig, retry: RetryPolicy) -> Self {
        Self {
            client: GeminiClient::from_config(config),
            model: config.model.clone(),
            retry,
            sleeper: Arc::new(TokioSleeper),
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn is_configured(&self) -> bool {
        self.client.is_some()
    }

    async fn wait_until_active(
        &self,
        client: &GeminiClient,
        mut file: UploadedFile,
    ) -> Result<UploadedFile, GenerationError> {
        for _ in 0..FILE_POLL_ATTEMPTS {
            if file.is_failed() {
                return Err(GenerationError::FileProcessing(format!(
                    "{} failed server-side processing",
                    file.name
                )));
            }
            if file.is_active() {
                return Ok(file);
            }
            tracing::debug!("Waiting for {} to become ACTIVE", file.name);
            self.sleeper.sleep(FILE_POLL_INTERVAL).await;
            file = client.get_file(&file.name).await?;
        }
        Err(GenerationError::FileProcessing(format!(
            "{} still processing after {} checks",
            file.name, FILE_POLL_ATTEMPTS
        )))
    }

    async fn generate_from_file(
        &self,
        client: &GeminiClient,
        file: UploadedFile,
        mime_type: &str,
    ) -> Result<BlogPost, GenerationError> {
        let file = self.wait_until_active(client, file).await?;

        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![
                    Part::Text {
                        text: BLOG_POST_PROMPT.to_string(),
                    },
                    Part::FileData {
                        file_data: FileData {
                            mime_type: file.mime_type.clone().unwrap_or_else(|| mime_type.to_string()),
                            file_uri: file.uri.clone(),
                        },
                    },
                ],
                role: Some("user".to_string()),
            }],
            generation_config: Some(GenerationConfig {
                temperature: Some(0.0),
                response_mime_type: Some("application/json".to_string()),
            }),
        };

        tracing::info!("Generating content with {}...", self.model);
        let request = &request;
        let response = self
            .retry
            .run(self.sleeper.as_ref(), |attempt| async move {
                tracing::debug!("generateContent attempt {}", attempt);
                client
                    .generate_content(&self.model, request)
                    .await
                    .map_err(|e| {
                        if e.is_rate_limited() {
                            backoff::Error::transient(e)
                        } else {
                            backoff::Error::permanent(e)
                        }
                    })
            })
            .await?;

        let text = response.text().ok_or_else(|| {
            let reason = response
                .prompt_feedback
                .as_ref()
                .and_then(|feedback| feedback.block_reason.clone())
                .map(|reason| format!("response blocked: {}", reason))
                .unwrap_or_else(|| "response contained no text".to_string());
            GenerationError::MalformedOutput(reason)
        })?;

        tracing::info!("Raw Gemini Response: {}...", truncate(text.trim(), 200));
        parse_blog_post(&text)
    }
}

#[async_trait]
impl ContentGenerator for GeminiGenerator {
    async fn generate(&self, audio_path: &Path) -> Result<BlogPost, GenerationError> {
        let client = self.client.as_ref().ok_or(GenerationError::MissingApiKey)?;

        let mime_type = audio_mime_type(audio_path);
        let file = client.upload_file(audio_path, mime_type).await?;
        let file_name = file.name.clone();

        let result = self.generate_from_file(client, file, mime_type).await;

        if let Err(e) = client.delete_file(&file_name).await {
            tracing::warn!("Could not delete uploaded file {}: {}", file_name, e);
        }

        result
    }
}

/// MIME type to declare for an audio upload, from the file extension.
pub fn audio_mime_type(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|s| s.to_lowercase())
        .as_deref()
    {
        Some("m4a") | Some("mp4") | Some("aac") => "audio/mp4",
        Some("mp3") => "audio/mpeg",
        Some("webm") => "audio/webm",
        Some("ogg") | Some("opus") => "audio/ogg",
        Some("wav") => "audio/wav",
        Some("flac") => "audio/flac",
        _ => "audio/mpeg",
    }
}

/// Remove one enclosing Markdown code fence, if present.
pub fn strip_code_fences(raw: &str) -> &str {
    let mut text = raw.trim();
    if text.get(..7).map_or(false, |fence| fence.eq_ignore_ascii_case("```json")) {
        text = &text[7..];
    } else if let Some(rest) = text.strip_prefix("```") {
        text = rest;
    }
    if let Some(rest) = text.strip_suffix("```") {
        text = rest;
    }
    text.trim()
}

/// Parse model output into exactly the three blog post fields.
pub fn parse_blog_post(raw: &str) -> Result<BlogPost, GenerationError> {
    let cleaned = strip_code_fences(raw);
    let post: BlogPost = serde_json::from_str(cleaned)
        .map_err(|e| GenerationError::MalformedOutput(e.to_string()))?;

    if let Some(field) = post.first_empty_field() {
        return Err(GenerationError::MalformedOutput(format!("field `{}` is empty", field)));
    }

    Ok(BlogPost {
        title: post.title.trim().to_string(),
        content_html: post.content_html.trim().to_string(),
        summary_for_card: post.summary_for_card.trim().to_string(),
    })
}
