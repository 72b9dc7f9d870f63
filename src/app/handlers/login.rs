use crate::auth::RelyingParty;
use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use std::sync::Arc;
use tracing::error;

/// Start an authorization: fresh PKCE material and state, then off to the
/// authorization server.
pub async fn login(party: Extension<Arc<RelyingParty>>) -> Response {
    match party.begin_authorization() {
        Ok(target) => Redirect::to(target.as_str()).into_response(),
        Err(err) => {
            error!("Failed to start authorization: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to start authorization",
            )
                .into_response()
        }
    }
}
