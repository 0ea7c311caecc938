use super::AppState;
use crate::store::SessionContext;
use axum::Json;
use axum::extract::FromRequestParts;
use axum::http::StatusCode;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde_json::json;
use std::sync::Arc;
use tracing::error;

const SESSION_COOKIE: &str = "sessionid";

/// The caller's session, loaded from the `sessionid` cookie. Unknown or
/// missing ids get a fresh session.
pub struct Session {
    pub ctx: SessionContext,
    jar: CookieJar,
    cookie_id: Option<String>,
}

impl Session {
    fn from_jar(jar: CookieJar, ctx: SessionContext) -> Self {
        let cookie_id = jar.get(SESSION_COOKIE).map(|c| c.value().to_string());
        Self {
            ctx,
            jar,
            cookie_id,
        }
    }

    /// Cookie changes for the response: a `Set-Cookie` whenever the session id
    /// differs from the one the browser sent, including after rotation.
    pub fn cookies(&self) -> CookieJar {
        if self.cookie_id.as_deref() == Some(self.ctx.id.as_str()) {
            return self.jar.clone();
        }
        let cookie = Cookie::build((SESSION_COOKIE, self.ctx.id.clone()))
            .http_only(true)
            .path("/")
            .same_site(SameSite::Lax);
        self.jar.clone().add(cookie)
    }
}

impl FromRequestParts<Arc<AppState>> for Session {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);

        if let Some(id) = jar.get(SESSION_COOKIE).map(|c| c.value().to_string()) {
            match state.sessions.load_session(&id).await {
                Ok(Some(data)) => {
                    return Ok(Session::from_jar(jar, SessionContext { id, data }));
                }
                Ok(None) => {}
                Err(e) => {
                    error!("Failed to load session: {:#}", e);
                    return Err((
                        StatusCode::INTERNAL_SERVER_ERROR,
                        Json(json!({"error": "Something went wrong. Please try again."})),
                    )
                        .into_response());
                }
            }
        }

        Ok(Session::from_jar(jar, SessionContext::new()))
    }
}
