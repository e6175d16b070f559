//! Axum surface for the bridge
//!
//! Every path is dispatched through [`BridgeController::handle`]; the outcome
//! is rendered as a redirect, an empty response or the static error page.

use std::sync::Arc;

use axum::{
    Router,
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode, Uri, header},
    response::{Html, IntoResponse, Response},
    routing::get,
};
use idp_bridge_sdk::{BridgeRequest, SessionId};

use crate::controller::{BridgeController, BridgeOutcome};

const ERROR_PAGE: &str = "<!DOCTYPE html>\n<html><head><title>Authentication failed</title></head>\
<body><h1>Authentication failed</h1>\
<p>The sign-in request could not be completed. Please start again from the application.</p>\
</body></html>\n";

/// Router serving `/`, `/logout` and `/logout/sso`; any other path falls
/// back to the default dispatch. Mount it with [`Router::nest`].
#[must_use]
pub fn router(controller: Arc<BridgeController>) -> Router {
    Router::new()
        .route("/", get(dispatch))
        .route("/logout", get(dispatch))
        .route("/logout/sso", get(dispatch))
        .fallback(dispatch)
        .with_state(controller)
}

async fn dispatch(
    State(controller): State<Arc<BridgeController>>,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let cookie_name = &controller.config().session.cookie_name;
    let (session_id, minted) = match session_from_cookies(&headers, cookie_name) {
        Some(id) => (id, false),
        None => (SessionId::new(uuid::Uuid::new_v4().to_string()), true),
    };

    let mut request = BridgeRequest::new(uri.path(), session_id);
    request.headers = headers;
    if let Some(query) = uri.query() {
        request.params = url::form_urlencoded::parse(query.as_bytes())
            .into_owned()
            .collect();
    }

    let mut response = controller.handle(&request).await.into_response();
    if minted {
        let cookie = format!(
            "{cookie_name}={}; Path=/; HttpOnly; Secure; SameSite=Lax",
            request.session_id
        );
        if let Ok(value) = HeaderValue::from_str(&cookie) {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
    }
    response
}

fn session_from_cookies(headers: &HeaderMap, cookie_name: &str) -> Option<SessionId> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == cookie_name && !value.is_empty())
        .map(|(_, value)| SessionId::new(value))
}

fn redirect(location: &str) -> Response {
    match HeaderValue::from_str(location) {
        Ok(value) => (StatusCode::FOUND, [(header::LOCATION, value)]).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Redirect target is not a valid header value");
            error_page(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

fn error_page(status: StatusCode) -> Response {
    (status, Html(ERROR_PAGE)).into_response()
}

impl IntoResponse for BridgeOutcome {
    fn into_response(self) -> Response {
        match self {
            BridgeOutcome::LoginRedirect { location, .. }
            | BridgeOutcome::Resume { location, .. }
            | BridgeOutcome::LogoutRedirect { location } => redirect(location.as_str()),
            BridgeOutcome::ForwardToHostLogout { path } => redirect(&path),
            BridgeOutcome::LogoutNotNeeded | BridgeOutcome::LogoutEchoSuppressed => {
                StatusCode::NO_CONTENT.into_response()
            }
            BridgeOutcome::ErrorPage { status } => error_page(
                StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            ),
        }
    }
}
