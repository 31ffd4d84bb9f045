use serde::{Deserialize, Serialize};

/// Inbound body of `POST /generate`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoRequest {
    pub url: String,
}

/// Blog post produced from a video's audio track
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BlogPost {
    pub title: String,
    pub content_html: String,
    pub summary_for_card: String,
}

impl BlogPost {
    /// Name of the first field that is empty after trimming, if any.
    pub fn first_empty_field(&self) -> Option<&'static str> {
        [
            ("title", &self.title),
            ("content_html", &self.content_html),
            ("summary_for_card", &self.summary_for_card),
        ]
        .into_iter()
        .find(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub detail: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

impl HealthResponse {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
        }
    }
}
