pub mod openai;
pub mod retry;
pub mod streaming;

use syllabot_core::config::ModelConfig;
use syllabot_core::traits::LlmClient;

pub use openai::OpenAiClient;
pub use retry::RetryingClient;

/// Create an LLM client for the configured model.
///
/// Every provider is reached through the OpenAI-compatible chat completions
/// API; `base_url` selects the endpoint. A `[model.retry]` section wraps the
/// client in [`RetryingClient`].
pub fn create_client(config: &ModelConfig) -> Box<dyn LlmClient> {
    let client: Box<dyn LlmClient> = Box::new(OpenAiClient::new());
    match &config.retry {
        Some(retry) => Box::new(RetryingClient::new(client, retry.clone())),
        None => client,
    }
}
