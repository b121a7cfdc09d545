//! Cookie-backed anonymous sessions.
//!
//! Every request leaves the middleware with a [`SessionId`] in its
//! extensions; handlers take it as an explicit `Extension<SessionId>`.

use axum::{
    extract::Request,
    http::{
        HeaderMap, HeaderValue,
        header::{COOKIE, SET_COOKIE},
    },
    middleware::Next,
    response::Response,
};
use store::SessionId;

pub const SESSION_COOKIE: &str = "sid";

/// Reuse the caller's `sid` cookie when it holds a valid id, otherwise mint a
/// new one and set it on the response.
pub async fn ensure_session(mut request: Request, next: Next) -> Response {
    let (session, fresh) = match session_from_headers(request.headers()) {
        Some(session) => (session, false),
        None => (SessionId::generate(), true),
    };

    request.extensions_mut().insert(session.clone());
    let mut response = next.run(request).await;

    if fresh {
        match HeaderValue::from_str(&session_cookie(&session)) {
            Ok(value) => {
                response.headers_mut().append(SET_COOKIE, value);
                tracing::debug!(session = %session, "Started new session");
            }
            Err(e) => tracing::error!(error = %e, "Failed to build session cookie"),
        }
    }

    response
}

pub fn session_cookie(session: &SessionId) -> String {
    format!("{SESSION_COOKIE}={session}; Path=/; HttpOnly; SameSite=Lax")
}

/// First `sid` cookie that parses as a session id.
pub fn session_from_headers(headers: &HeaderMap) -> Option<SessionId> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .filter(|(name, _)| *name == SESSION_COOKIE)
        .find_map(|(_, value)| value.parse().ok())
}
