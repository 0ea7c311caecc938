mod error;
mod gemini;
mod render;

use crate::store::{ChatTurn, SessionContext, SessionStore};
use std::sync::Arc;
use tracing::{info, warn};

pub use error::{ChatError, ProviderFailure};
pub use gemini::{Content, GeminiClient, GenerateRequest, GenerationProvider, Role};
pub use render::{markdown_to_html, render_history};

/// Turns of prior history forwarded upstream with each prompt.
pub const HISTORY_WINDOW: usize = 3;

/// Relays prompts to the generation API, trying each configured key in order.
pub struct ChatProxy {
    provider: Arc<dyn GenerationProvider>,
    sessions: Arc<dyn SessionStore>,
    api_keys: Vec<String>,
}

impl ChatProxy {
    pub fn new(
        provider: Arc<dyn GenerationProvider>,
        sessions: Arc<dyn SessionStore>,
        api_keys: Vec<String>,
    ) -> Self {
        let usable = api_keys.iter().filter(|k| !k.trim().is_empty()).count();
        info!("Chat proxy ready with {} usable API key(s)", usable);
        Self {
            provider,
            sessions,
            api_keys,
        }
    }

    /// Returns the reply rendered as HTML. On success the turn is appended to
    /// the session history and the session is saved; on failure the session
    /// is left untouched.
    pub async fn generate(
        &self,
        session: &mut SessionContext,
        prompt: &str,
    ) -> Result<String, ChatError> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(ChatError::EmptyPrompt);
        }

        let request = build_request(&session.data.llm_history, prompt);
        let mut last_error = None;

        for (index, api_key) in self.api_keys.iter().enumerate() {
            if api_key.trim().is_empty() {
                continue;
            }

            match self.provider.generate(api_key, &request).await {
                Ok(generated) => {
                    info!("Generation succeeded with API key #{}", index + 1);
                    session.data.llm_history.push(ChatTurn {
                        prompt: prompt.to_string(),
                        response: generated.clone(),
                    });
                    self.sessions.save_session(session).await?;
                    return Ok(markdown_to_html(&generated));
                }
                Err(failure) => {
                    warn!("API key #{} failed: {}", index + 1, failure);
                    last_error = Some(failure);
                }
            }
        }

        Err(ChatError::AllProvidersFailed { last_error })
    }
}

/// Last `HISTORY_WINDOW` turns as alternating user/model contents, then the
/// new prompt.
pub fn build_request(history: &[ChatTurn], prompt: &str) -> GenerateRequest {
    let start = history.len().saturating_sub(HISTORY_WINDOW);
    let mut contents = Vec::with_capacity(HISTORY_WINDOW * 2 + 1);

    for turn in &history[start..] {
        if !turn.prompt.is_empty() {
            contents.push(Content::text(Role::User, &turn.prompt));
        }
        if !turn.response.is_empty() {
            contents.push(Content::text(Role::Model, &turn.response));
        }
    }
    contents.push(Content::text(Role::User, prompt));

    GenerateRequest { contents }
}
