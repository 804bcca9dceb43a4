//! OpenAI client configuration with sensible defaults.

use crate::config::LlmSettings;
use crate::error::Result;
use async_openai::{config::OpenAIConfig, Client};
use backoff::ExponentialBackoffBuilder;
use std::time::Duration;

/// Create an OpenAI client from the model settings.
///
/// Every call is a single attempt: the client's rate-limit backoff is
/// disabled and the request timeout is the only per-call limit.
pub fn create_client(settings: &LlmSettings) -> Result<Client<OpenAIConfig>> {
    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(settings.timeout_secs))
        .build()?;

    let mut config = OpenAIConfig::default();
    if let Some(base) = &settings.api_base {
        config = config.with_api_base(base);
        if settings.is_local() && std::env::var("OPENAI_API_KEY").is_err() {
            // Local servers ignore the key but the client always sends one.
            config = config.with_api_key("local");
        }
    }

    let no_retry = ExponentialBackoffBuilder::new()
        .with_max_elapsed_time(Some(Duration::ZERO))
        .build();

    Ok(Client::with_config(config)
        .with_http_client(http_client)
        .with_backoff(no_retry))
}
