//! Text provider trait

/// Result type for provider operations
pub type LlmResult<T> = Result<T, LlmError>;

/// Provider error types
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("request failed: {0}")]
    RequestFailed(String),

    #[error("authentication failed: {0}")]
    AuthFailed(String),

    #[error("rate limited: retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("network error: {0}")]
    NetworkError(#[from] reqwest::Error),
}

/// One prompt in, one text document out. Every provider is non-streaming
/// and stateless across calls; conversation state lives in the prompt.
#[async_trait::async_trait]
pub trait TextProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Model used when the caller passes no override.
    fn default_model(&self) -> &str;

    async fn generate(&self, prompt: &str, model: Option<&str>) -> LlmResult<String>;
}
