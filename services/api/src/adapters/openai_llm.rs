//! services/api/src/adapters/openai_llm.rs
//!
//! This module contains the adapter for OpenAI's Responses API.
//! It implements the `GenerationService` port from the `core` crate with the
//! web search tool enabled.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::responses::{CreateResponseArgs, Tool, WebSearchTool},
    Client,
};
use async_trait::async_trait;
use study_path_core::ports::{GenerationRequest, GenerationService, PortError, PortResult};
use tracing::info;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `GenerationService` using an OpenAI-compatible LLM.
#[derive(Clone)]
pub struct OpenAiGenerationAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiGenerationAdapter {
    /// Creates a new `OpenAiGenerationAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }
}

//=========================================================================================
// `GenerationService` Trait Implementation
//=========================================================================================

#[async_trait]
impl GenerationService for OpenAiGenerationAdapter {
    async fn generate(&self, request: GenerationRequest<'_>) -> PortResult<Vec<String>> {
        // Document inputs are only wired up for the Gemini backend.
        if let Some(attachment) = request.attachment {
            return Err(PortError::Unsupported(format!(
                "the OpenAI backend cannot read the attached document '{}'; use GENERATION_PROVIDER=gemini",
                attachment.file_name
            )));
        }

        info!(
            conversation_id = %request.conversation_id,
            model = %self.model,
            "Calling OpenAI."
        );

        let api_request = CreateResponseArgs::default()
            .model(&self.model)
            .instructions(request.instruction)
            .input(request.input_text.to_string())
            .tools(vec![Tool::WebSearch(WebSearchTool::default())])
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let response = self
            .client
            .responses()
            .create(api_request)
            .await
            .map_err(|e: OpenAIError| PortError::Unexpected(e.to_string()))?;

        match response.output_text() {
            Some(text) if !text.trim().is_empty() => Ok(vec![text]),
            _ => Err(PortError::Unexpected(
                "OpenAI response contained no text output.".to_string(),
            )),
        }
    }
}
