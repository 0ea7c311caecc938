use serde::Serialize;
use thiserror::Error;

/// Why a single credential attempt did not produce text.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderFailure {
    #[error("upstream returned HTTP {0}")]
    Status(u16),
    #[serde(rename = "error")]
    #[error("{0}")]
    Failed(String),
}

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Prompt is required.")]
    EmptyPrompt,
    #[error("All API keys failed or quota exceeded.")]
    AllProvidersFailed { last_error: Option<ProviderFailure> },
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}
