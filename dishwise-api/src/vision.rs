//! Google Vision text-detection client
//!
//! Sends an annotate request for one image and returns the detected text
//! split into trimmed, non-empty lines. The first annotation in the
//! response carries the full detected text; the per-word annotations that
//! follow it are ignored.

use std::time::Duration;

use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Google Vision annotate endpoint
const VISION_API_URL: &str = "https://vision.googleapis.com/v1/images:annotate";

/// Default timeout for Vision API requests
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum annotations requested per image
const MAX_RESULTS: u32 = 50;

/// Language hints passed with every request
const LANGUAGE_HINTS: &[&str] = &["en", "zh-TW", "zh-CN"];

/// Vision API errors
#[derive(Debug, Error)]
pub enum VisionError {
    /// Network-level failure reaching the Vision endpoint
    #[error("Vision transport error: {0}")]
    Transport(String),

    /// Vision endpoint answered with a non-success status
    #[error("Vision API error: {0}")]
    Api(String),

    /// Response body could not be decoded
    #[error("Vision response parse error: {0}")]
    Parse(String),
}

/// Text-detection client for menu photos
pub struct GoogleVisionClient {
    http_client: Client,
    api_key: String,
    base_url: String,
}

impl GoogleVisionClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, VISION_API_URL)
    }

    /// Create a client against a non-default endpoint (used by tests)
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            http_client: Client::builder()
                .timeout(DEFAULT_TIMEOUT)
                .build()
                .expect("Failed to create HTTP client"),
            api_key: api_key.into(),
            base_url: base_url.into(),
        }
    }

    /// Detect text in an image, returning one entry per line
    pub async fn detect_text(&self, image: &[u8]) -> Result<Vec<String>, VisionError> {
        let request = AnnotateRequest {
            requests: vec![ImageRequest {
                image: ImageContent {
                    content: base64::engine::general_purpose::STANDARD.encode(image),
                },
                features: vec![Feature {
                    feature_type: "TEXT_DETECTION",
                    max_results: MAX_RESULTS,
                }],
                image_context: ImageContext {
                    language_hints: LANGUAGE_HINTS.iter().map(|h| h.to_string()).collect(),
                },
            }],
        };

        let url = format!("{}?key={}", self.base_url, self.api_key);
        let response = self
            .http_client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| VisionError::Transport(format!("Annotate request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(VisionError::Api(format!(
                "Annotate returned {}: {}",
                status, body
            )));
        }

        let body = response
            .json::<AnnotateResponse>()
            .await
            .map_err(|e| VisionError::Parse(format!("Annotate response: {}", e)))?;

        let lines = extract_lines(&body);
        debug!(line_count = lines.len(), "Text detection complete");
        Ok(lines)
    }
}

/// Split the full-text annotation into trimmed, non-empty lines
fn extract_lines(response: &AnnotateResponse) -> Vec<String> {
    response
        .responses
        .first()
        .and_then(|r| r.text_annotations.first())
        .map(|annotation| {
            annotation
                .description
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

#[derive(Debug, Serialize)]
struct AnnotateRequest {
    requests: Vec<ImageRequest>,
}

#[derive(Debug, Serialize)]
struct ImageRequest {
    image: ImageContent,
    features: Vec<Feature>,
    #[serde(rename = "imageContext")]
    image_context: ImageContext,
}

#[derive(Debug, Serialize)]
struct ImageContent {
    content: String,
}

#[derive(Debug, Serialize)]
struct Feature {
    #[serde(rename = "type")]
    feature_type: &'static str,
    #[serde(rename = "maxResults")]
    max_results: u32,
}

#[derive(Debug, Serialize)]
struct ImageContext {
    #[serde(rename = "languageHints")]
    language_hints: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct AnnotateResponse {
    #[serde(default)]
    responses: Vec<ImageResponse>,
}

#[derive(Debug, Deserialize)]
struct ImageResponse {
    #[serde(rename = "textAnnotations", default)]
    text_annotations: Vec<TextAnnotation>,
}

#[derive(Debug, Deserialize)]
struct TextAnnotation {
    description: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_text_annotation_splits_into_clean_lines() {
        let json = r#"{
            "responses": [{
                "textAnnotations": [
                    {"description": "Fried Rice\n  Dumplings  \n\nHot Pot"},
                    {"description": "Fried"}
                ]
            }]
        }"#;

        let response: AnnotateResponse = serde_json::from_str(json).unwrap();
        let lines = extract_lines(&response);
        assert_eq!(lines, vec!["Fried Rice", "Dumplings", "Hot Pot"]);
    }

    #[test]
    fn image_without_text_yields_no_lines() {
        let response: AnnotateResponse = serde_json::from_str(r#"{"responses": [{}]}"#).unwrap();
        assert!(extract_lines(&response).is_empty());

        let empty: AnnotateResponse = serde_json::from_str("{}").unwrap();
        assert!(extract_lines(&empty).is_empty());
    }

    #[test]
    fn annotate_request_uses_vision_field_names() {
        let request = AnnotateRequest {
            requests: vec![ImageRequest {
                image: ImageContent {
                    content: "aGVsbG8=".to_string(),
                },
                features: vec![Feature {
                    feature_type: "TEXT_DETECTION",
                    max_results: MAX_RESULTS,
                }],
                image_context: ImageContext {
                    language_hints: vec!["en".to_string()],
                },
            }],
        };

        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"type\":\"TEXT_DETECTION\""));
        assert!(json.contains("\"maxResults\""));
        assert!(json.contains("\"imageContext\""));
        assert!(json.contains("\"languageHints\""));
    }
}
