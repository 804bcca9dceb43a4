//! Chat-completion backed language model.

use super::LanguageModel;
use crate::config::LlmSettings;
use crate::error::{Result, SiftError};
use crate::openai::create_client;
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs,
};
use async_trait::async_trait;
use tracing::{debug, instrument};

/// Language model served over an OpenAI-compatible chat completions API.
pub struct OpenAIChatModel {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
    temperature: f32,
}

impl OpenAIChatModel {
    /// Create the model used for query parsing.
    pub fn parser(settings: &LlmSettings) -> Result<Self> {
        Ok(Self::with_client(
            create_client(settings)?,
            &settings.parsing_model,
            settings.parsing_temperature,
        ))
    }

    /// Create the model used for answer generation.
    pub fn answerer(settings: &LlmSettings) -> Result<Self> {
        Ok(Self::with_client(
            create_client(settings)?,
            &settings.answer_model,
            settings.answer_temperature,
        ))
    }

    pub fn with_client(
        client: async_openai::Client<async_openai::config::OpenAIConfig>,
        model: &str,
        temperature: f32,
    ) -> Self {
        Self {
            client,
            model: model.to_string(),
            temperature,
        }
    }
}

#[async_trait]
impl LanguageModel for OpenAIChatModel {
    #[instrument(skip(self, prompt), fields(model = %self.model, prompt_len = prompt.len()))]
    async fn invoke(&self, prompt: &str) -> Result<String> {
        let messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestUserMessageArgs::default()
                .content(prompt.to_string())
                .build()
                .map_err(|e| SiftError::Llm(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(self.temperature)
            .build()
            .map_err(|e| SiftError::Llm(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| SiftError::OpenAI(format!("Failed to generate response: {}", e)))?;

        let text = response
            .choices
            .first()
            .and_then(|c| c.message.content.as_ref())
            .ok_or_else(|| SiftError::Llm("Empty response from model".to_string()))?
            .clone();

        debug!("Model replied with {} characters", text.len());
        Ok(text)
    }

    fn name(&self) -> &str {
        &self.model
    }
}
