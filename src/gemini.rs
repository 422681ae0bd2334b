use anyhow::{anyhow, bail, Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

#[derive(Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize)]
struct Part {
    text: String,
}

// The API reports errors in the body (with a matching non-2xx status), so
// both shapes deserialize from the same response.
#[derive(Deserialize)]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
    error: Option<ApiError>,
}

#[derive(Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Deserialize)]
struct CandidateContent {
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Deserialize)]
struct ApiError {
    message: String,
}

/// Client for the generative-language `generateContent` endpoint. One POST
/// per prompt; no retry, no streaming, no cancellation.
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    model: String,
}

impl GeminiClient {
    pub fn new() -> Self {
        Self::with_model(DEFAULT_MODEL)
    }

    pub fn with_model(model: &str) -> Self {
        Self {
            client: Client::new(),
            model: model.to_string(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send one prompt and return the reply text, or a human-readable error.
    pub async fn generate(&self, api_key: &str, prompt: &str) -> Result<String> {
        let url = format!("{API_BASE}/{}:generateContent?key={api_key}", self.model);
        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .context("request to the Gemini API failed")?;

        let body: GenerateContentResponse = response
            .json()
            .await
            .context("Gemini API returned an unreadable response")?;

        extract_reply(body)
    }
}

impl Default for GeminiClient {
    fn default() -> Self {
        Self::new()
    }
}

fn extract_reply(response: GenerateContentResponse) -> Result<String> {
    if let Some(err) = response.error {
        bail!("{}", err.message);
    }
    response
        .candidates
        .and_then(|c| c.into_iter().next())
        .and_then(|c| c.content.parts.into_iter().next())
        .and_then(|p| p.text)
        .ok_or_else(|| anyhow!("no reply in Gemini response"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serializes_to_wire_shape() {
        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: "Hello".to_string(),
                }],
            }],
        };

        let json = serde_json::to_string(&request).unwrap();
        assert_eq!(json, r#"{"contents":[{"parts":[{"text":"Hello"}]}]}"#);
    }

    #[test]
    fn success_response_yields_first_candidate_text() {
        let json = r#"{"candidates":[{"content":{"parts":[{"text":"hi"}]}}]}"#;
        let response: GenerateContentResponse = serde_json::from_str(json).unwrap();

        assert_eq!(extract_reply(response).unwrap(), "hi");
    }

    #[test]
    fn error_response_yields_provider_message() {
        let json = r#"{"error":{"message":"bad key"}}"#;
        let response: GenerateContentResponse = serde_json::from_str(json).unwrap();

        let err = extract_reply(response).unwrap_err();
        assert_eq!(err.to_string(), "bad key");
    }

    #[test]
    fn empty_candidates_is_an_error() {
        let json = r#"{"candidates":[]}"#;
        let response: GenerateContentResponse = serde_json::from_str(json).unwrap();
        assert!(extract_reply(response).is_err());
    }

    #[test]
    fn candidate_without_text_is_an_error() {
        let json = r#"{"candidates":[{"content":{"parts":[{}]}}]}"#;
        let response: GenerateContentResponse = serde_json::from_str(json).unwrap();
        assert!(extract_reply(response).is_err());
    }

    #[test]
    fn default_model_is_flash() {
        assert_eq!(GeminiClient::new().model(), "gemini-2.5-flash");
        assert_eq!(GeminiClient::with_model("gemini-1.5-pro").model(), "gemini-1.5-pro");
    }
}
