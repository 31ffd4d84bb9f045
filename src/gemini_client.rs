use std::path::Path;

use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio_util::io::ReaderStream;

use crate::config::GeminiConfig;
use crate::error::GenerationError;

#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    #[serde(rename = "generationConfig", skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Content {
    #[serde(default)]
    pub parts: Vec<Part>,
    pub role: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(untagged)]
pub enum Part {
    Text { text: String },
    FileData {
        #[serde(rename = "fileData")]
        file_data: FileData,
    },
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FileData {
    #[serde(rename = "mimeType")]
    pub mime_type: String,
    #[serde(rename = "fileUri")]
    pub file_uri: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(rename = "responseMimeType", skip_serializing_if = "Option::is_none")]
    pub response_mime_type: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(rename = "usageMetadata")]
    pub usage_metadata: Option<UsageMetadata>,
    #[serde(rename = "promptFeedback")]
    pub prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Candidate {
    pub content: Option<Content>,
    #[serde(rename = "finishReason")]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PromptFeedback {
    #[serde(rename = "blockReason")]
    pub block_reason: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UsageMetadata {
    #[serde(rename = "promptTokenCount", default)]
    pub prompt_token_count: u32,
    #[serde(rename = "candidatesTokenCount", default)]
    pub candidates_token_count: u32,
    #[serde(rename = "totalTokenCount", default)]
    pub total_token_count: u32,
}

/// File stored through the Files API
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    /// Resource name, e.g. `files/abc-123`
    pub name: String,
    pub uri: String,
    pub mime_type: Option<String>,
    pub state: Option<String>,
}

impl UploadedFile {
    pub fn is_active(&self) -> bool {
        self.state.as_deref().map_or(true, |state| state == "ACTIVE")
    }

    pub fn is_failed(&self) -> bool {
        self.state.as_deref() == Some("FAILED")
    }
}

#[derive(Debug, Deserialize)]
struct UploadFileResponse {
    file: UploadedFile,
}

impl GenerateContentResponse {
    /// Concatenated text of the first candidate.
    pub fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text: String = content
            .parts
            .iter()
            .filter_map(|part| match part {
                Part::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

impl GeminiClient {
    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url,
        }
    }

    /// Client for the configured key, or `None` when no key is set.
    pub fn from_config(config: &GeminiConfig) -> Option<Self> {
        config
            .api_key
            .clone()
            .map(|key| Self::with_base_url(key, config.api_base.clone()))
    }

    /// Upload a local file with the resumable protocol, streaming it from disk.
    pub async fn upload_file(
        &self,
        path: &Path,
        mime_type: &str,
    ) -> Result<UploadedFile, GenerationError> {
        let file = tokio::fs::File::open(path).await?;
        let size = file.metadata().await?.len();
        let display_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audio".to_string());

        tracing::info!("Uploading file: {} ({} bytes, {})", path.display(), size, mime_type);

        let start = self
            .client
            .post(format!("{}/upload/v1beta/files?key={}", self.base_url, self.api_key))
            .header("X-Goog-Upload-Protocol", "resumable")
            .header("X-Goog-Upload-Command", "start")
            .header("X-Goog-Upload-Header-Content-Length", size.to_string())
            .header("X-Goog-Upload-Header-Content-Type", mime_type)
            .json(&json!({ "file": { "display_name": display_name } }))
            .send()
            .await?;
        let start = check_status(start).await?;

        let upload_url = start
            .headers()
            .get("x-goog-upload-url")
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string())
            .ok_or_else(|| GenerationError::Upstream {
                status: start.status().as_u16(),
                message: "upload session did not return an upload URL".to_string(),
            })?;

        let response = self
            .client
            .post(&upload_url)
            .header("Content-Length", size.to_string())
            .header("X-Goog-Upload-Offset", "0")
            .header("X-Goog-Upload-Command", "upload, finalize")
            .body(reqwest::Body::wrap_stream(ReaderStream::new(file)))
            .send()
            .await?;
        let response = check_status(response).await?;

        let uploaded: UploadFileResponse = response.json().await?;
        tracing::info!(
            "Uploaded as {} (state: {})",
            uploaded.file.name,
            uploaded.file.state.as_deref().unwrap_or("unknown")
        );
        Ok(uploaded.file)
    }

    pub async fn get_file(&self, name: &str) -> Result<UploadedFile, GenerationError> {
        let response = self
            .client
            .get(format!("{}/v1beta/{}?key={}", self.base_url, name, self.api_key))
            .send()
            .await?;
        Ok(check_status(response).await?.json().await?)
    }

    pub async fn delete_file(&self, name: &str) -> Result<(), GenerationError> {
        let response = self
            .client
            .delete(format!("{}/v1beta/{}?key={}", self.base_url, name, self.api_key))
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    pub async fn generate_content(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, GenerationError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url, model, self.api_key
        );

        tracing::debug!("Gemini API Request contents count: {}", request.contents.len());

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await?;
        let response_text = check_status(response).await?.text().await?;
        tracing::debug!(
            "Gemini API response (truncated): {}...",
            truncate(&response_text, 500)
        );

        let result: GenerateContentResponse = serde_json::from_str(&response_text).map_err(|e| {
            tracing::error!("Failed to parse Gemini response: {}", e);
            GenerationError::MalformedOutput(format!("error decoding response body: {}", e))
        })?;

        if let Some(usage) = &result.usage_metadata {
            tracing::info!(
                "Gemini usage: prompt={} candidates={} total={}",
                usage.prompt_token_count,
                usage.candidates_token_count,
                usage.total_token_count
            );
        }
        Ok(result)
    }
}

/// Classify a non-success response. 429 is the only rate-limit signal.
async fn check_status(response: Response) -> Result<Response, GenerationError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = error_message(&body);

    if status == StatusCode::TOO_MANY_REQUESTS {
        Err(GenerationError::RateLimited(message))
    } else {
        Err(GenerationError::Upstream {
            status: status.as_u16(),
            message,
        })
    }
}

/// Pull `error.message` out of a Google API error body, falling back to the raw text.
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| value["error"]["message"].as_str().map(|s| s.to_string()))
        .unwrap_or_else(|| truncate(body.trim(), 300).to_string())
}

pub(crate) fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
