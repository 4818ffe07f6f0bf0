//! services/api/src/adapters/gemini_llm.rs
//!
//! This module contains the adapter for the Gemini `generateContent` REST API.
//! It implements the `GenerationService` port from the `core` crate, with the
//! Google Search tool enabled and documents sent as inline base64 parts.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use study_path_core::ports::{GenerationRequest, GenerationService, PortError, PortResult};
use tracing::{debug, info};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `GenerationService` using the Gemini REST API.
#[derive(Clone)]
pub struct GeminiGenerationAdapter {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiGenerationAdapter {
    /// Creates a new `GeminiGenerationAdapter`.
    ///
    /// `base_url` is the models endpoint, e.g.
    /// `https://generativelanguage.googleapis.com/v1beta/models`.
    pub fn new(client: Client, api_key: String, model: String, base_url: String) -> Self {
        Self {
            client,
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn build_request(request: &GenerationRequest<'_>) -> GenerateContentRequest {
        let mut parts = vec![Part::Text {
            text: request.input_text.to_string(),
        }];
        if let Some(attachment) = request.attachment {
            parts.push(Part::InlineData {
                inline_data: InlineDataPayload {
                    mime_type: attachment.media_type.clone(),
                    data: BASE64_STANDARD.encode(&attachment.data),
                },
            });
        }

        GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts,
            }],
            system_instruction: Some(Content {
                role: None,
                parts: vec![Part::Text {
                    text: request.instruction.to_string(),
                }],
            }),
            tools: vec![Tool {
                google_search: GoogleSearch {},
            }],
        }
    }
}

//=========================================================================================
// `GenerationService` Trait Implementation
//=========================================================================================

#[async_trait]
impl GenerationService for GeminiGenerationAdapter {
    async fn generate(&self, request: GenerationRequest<'_>) -> PortResult<Vec<String>> {
        info!(
            conversation_id = %request.conversation_id,
            model = %self.model,
            with_attachment = request.attachment.is_some(),
            "Calling Gemini."
        );
        let body = Self::build_request(&request);
        let url = format!("{}/{}:generateContent", self.base_url, self.model);

        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| PortError::Unexpected(format!("Gemini API request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read Gemini error body".to_string());
            return Err(map_http_error(status, body_text));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| PortError::Unexpected(format!("Failed to parse Gemini response: {e}")))?;

        let fragments = final_text_fragments(parsed)?;
        debug!(fragments = fragments.len(), "Gemini response received.");
        Ok(fragments)
    }
}

//=========================================================================================
// Wire Types
//=========================================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    tools: Vec<Tool>,
}

#[derive(Serialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<Part>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineDataPayload,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineDataPayload {
    mime_type: String,
    data: String,
}

#[derive(Serialize)]
struct Tool {
    google_search: GoogleSearch,
}

#[derive(Serialize)]
struct GoogleSearch {}

#[derive(Deserialize)]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<ContentResponse>,
}

#[derive(Deserialize)]
struct ContentResponse {
    #[serde(default)]
    parts: Vec<PartResponse>,
}

#[derive(Deserialize)]
struct PartResponse {
    text: Option<String>,
}

#[derive(Deserialize)]
struct ErrorWrapper {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    status: Option<String>,
}

/// Every text part of the first candidate, in order.
fn final_text_fragments(response: GenerateContentResponse) -> PortResult<Vec<String>> {
    let fragments: Vec<String> = response
        .candidates
        .and_then(|candidates| candidates.into_iter().next())
        .and_then(|candidate| candidate.content)
        .map(|content| content.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if fragments.is_empty() {
        Err(PortError::Unexpected(
            "Gemini API returned no text in the response candidates".to_string(),
        ))
    } else {
        Ok(fragments)
    }
}

fn map_http_error(status: StatusCode, body: String) -> PortError {
    let message = serde_json::from_str::<ErrorWrapper>(&body)
        .map(|wrapper| {
            let status_text = wrapper.error.status.unwrap_or_default();
            let msg = wrapper.error.message.unwrap_or_else(|| body.clone());
            if status_text.is_empty() {
                msg
            } else {
                format!("{status_text}: {msg}")
            }
        })
        .unwrap_or_else(|_| body.clone());

    PortError::Upstream {
        status: status.as_u16(),
        message,
    }
}
