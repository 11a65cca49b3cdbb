//! AI capability: LLM clients and the media judgments built on them.
//!
//! Callers depend on `MediaBrain`; `LlmBrain` is the production
//! implementation and `testing::MockBrain` the test double.

mod brain;
pub mod llm;

use async_trait::async_trait;
use thiserror::Error;

pub use brain::LlmBrain;
pub use llm::{build_llm_client, LlmClient, LlmError};

/// Errors from AI judgments.
#[derive(Debug, Error)]
pub enum AiError {
    #[error("LLM not configured")]
    NotConfigured,

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Media judgments the pipeline needs from an AI.
#[async_trait]
pub trait MediaBrain: Send + Sync {
    /// Name for logging.
    fn name(&self) -> &str;

    /// Whether a file path is a main episode/movie or its subtitle.
    async fn classify_is_main_content(&self, path: &str) -> Result<bool, AiError>;

    /// Episode number in (0, 1000), if one can be found.
    async fn extract_episode(&self, text: &str) -> Option<u32>;

    /// Season number in (0, 100), if one can be found.
    async fn extract_season(&self, text: &str) -> Option<u32>;

    /// Show name without group and quality tags.
    async fn extract_name(&self, text: &str) -> Option<String>;
}
