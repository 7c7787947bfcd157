//! Text-generation providers behind one trait: Anthropic, OpenAI (and any
//! compatible endpoint), Ollama, and the offline stub.

pub mod anthropic;
pub mod ollama;
pub mod openai;
pub mod provider;
pub mod stub;

pub use anthropic::AnthropicProvider;
pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;
pub use provider::{LlmError, LlmResult, TextProvider};
pub use stub::StubProvider;

use cogmod_core::{Config, ProviderKind};
use std::path::PathBuf;

/// Build the configured provider. Credential absence fails here, at
/// construction, not on the first request. `module_roots` feeds the stub's
/// example matching and is ignored by the network providers.
pub fn provider_from_config(
    config: &Config,
    module_roots: Vec<PathBuf>,
) -> LlmResult<Box<dyn TextProvider>> {
    match config.provider {
        ProviderKind::Anthropic => {
            let key = config.anthropic_api_key.clone().ok_or_else(|| {
                LlmError::AuthFailed("ANTHROPIC_API_KEY is not set".to_string())
            })?;
            Ok(Box::new(AnthropicProvider::new(key)))
        }
        ProviderKind::OpenAi => {
            let key = config.openai_api_key.clone().ok_or_else(|| {
                LlmError::AuthFailed("OPENAI_API_KEY is not set".to_string())
            })?;
            let mut provider = OpenAiProvider::new(key);
            if let Some(base) = &config.openai_base_url {
                provider = provider.with_base_url(base);
            }
            Ok(Box::new(provider))
        }
        ProviderKind::Ollama => Ok(Box::new(OllamaProvider::new(config.ollama_host.clone()))),
        ProviderKind::Stub => Ok(Box::new(StubProvider::new(module_roots))),
    }
}
