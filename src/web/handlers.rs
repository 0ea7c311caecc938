use super::AppState;
use super::session::Session;
use crate::account::{AccountError, LoginForm, RegistrationForm, VerifyForm};
use crate::chat::{ChatError, render_history};
use crate::otp::OtpError;
use axum::Json;
use axum::extract::{Form, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::error;

const GENERIC_ERROR: &str = "Something went wrong. Please try again.";
const LLM_TEXTAREA_CLASS: &str = "llm--textarea";

fn reply(session: &Session, status: StatusCode, body: Value) -> Response {
    (status, session.cookies(), Json(body)).into_response()
}

fn account_error(session: &Session, err: AccountError) -> Response {
    let (status, body) = match err {
        AccountError::Validation(ref errors) => (
            StatusCode::BAD_REQUEST,
            json!({"error": err.to_string(), "errors": errors.render()}),
        ),
        AccountError::InvalidCredentials => {
            (StatusCode::UNAUTHORIZED, json!({"error": err.to_string()}))
        }
        AccountError::Otp(OtpError::Cooldown(seconds)) => (
            StatusCode::TOO_MANY_REQUESTS,
            json!({"error": OtpError::Cooldown(seconds).to_string(), "retry_after": seconds}),
        ),
        AccountError::Otp(OtpError::EmailDelivery) => (
            StatusCode::SERVICE_UNAVAILABLE,
            json!({"error": OtpError::EmailDelivery.to_string()}),
        ),
        AccountError::Otp(OtpError::Storage(e)) | AccountError::Storage(e) => {
            error!("Account request failed: {:#}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, json!({"error": GENERIC_ERROR}))
        }
        other => (StatusCode::BAD_REQUEST, json!({"error": other.to_string()})),
    };
    reply(session, status, body)
}

fn login_required(session: &Session) -> Option<Response> {
    if session.ctx.is_authenticated() {
        return None;
    }
    Some(reply(
        session,
        StatusCode::UNAUTHORIZED,
        json!({"error": "Authentication required."}),
    ))
}

pub async fn health() -> &'static str {
    "ok"
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    mut session: Session,
    Form(form): Form<RegistrationForm>,
) -> Response {
    match state.accounts.register(&mut session.ctx, form).await {
        Ok(user) => reply(
            &session,
            StatusCode::CREATED,
            json!({
                "message": format!("A verification code was sent to {}.", user.email),
                "username": user.username,
            }),
        ),
        Err(e) => account_error(&session, e),
    }
}

pub async fn verify_email(
    State(state): State<Arc<AppState>>,
    mut session: Session,
    Form(form): Form<VerifyForm>,
) -> Response {
    match state.accounts.verify_email(&mut session.ctx, form).await {
        Ok(user) => reply(
            &session,
            StatusCode::OK,
            json!({"message": "Your email has been verified.", "username": user.username}),
        ),
        Err(e) => account_error(&session, e),
    }
}

pub async fn resend_code(State(state): State<Arc<AppState>>, session: Session) -> Response {
    match state.accounts.resend_code(&session.ctx).await {
        Ok(()) => reply(
            &session,
            StatusCode::OK,
            json!({"message": "A new verification code has been sent."}),
        ),
        Err(e) => account_error(&session, e),
    }
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    mut session: Session,
    Form(form): Form<LoginForm>,
) -> Response {
    match state.accounts.login(&mut session.ctx, form).await {
        Ok(user) => reply(
            &session,
            StatusCode::OK,
            json!({"message": "Welcome back!", "username": user.username}),
        ),
        Err(e) => account_error(&session, e),
    }
}

pub async fn logout(State(state): State<Arc<AppState>>, mut session: Session) -> Response {
    match state.accounts.logout(&mut session.ctx).await {
        Ok(()) => reply(&session, StatusCode::OK, json!({"message": "Logged out."})),
        Err(e) => account_error(&session, e),
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct PromptForm {
    #[serde(default)]
    pub prompt: String,
}

pub async fn llm_generate(
    State(state): State<Arc<AppState>>,
    mut session: Session,
    Form(form): Form<PromptForm>,
) -> Response {
    if let Some(denied) = login_required(&session) {
        return denied;
    }

    match state.chat.generate(&mut session.ctx, &form.prompt).await {
        Ok(html) => reply(&session, StatusCode::OK, json!({"generated": html})),
        Err(ChatError::EmptyPrompt) => reply(
            &session,
            StatusCode::BAD_REQUEST,
            json!({"error": ChatError::EmptyPrompt.to_string()}),
        ),
        Err(ChatError::AllProvidersFailed { last_error }) => reply(
            &session,
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({
                "error": "All API keys failed or quota exceeded.",
                "details": last_error,
            }),
        ),
        Err(ChatError::Storage(e)) => {
            error!("Chat request failed: {:#}", e);
            reply(
                &session,
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({"error": GENERIC_ERROR}),
            )
        }
    }
}

pub async fn llm_page(session: Session) -> Response {
    if let Some(denied) = login_required(&session) {
        return denied;
    }

    reply(
        &session,
        StatusCode::OK,
        json!({
            "llm_history": render_history(&session.ctx.data.llm_history),
            "llm_form": {
                "prompt": {
                    "class": LLM_TEXTAREA_CLASS,
                    "placeholder": "Ask anything",
                    "rows": 1,
                }
            }
        }),
    )
}
