use crate::auth::RelyingParty;
use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use std::sync::Arc;
use tracing::error;

pub async fn logout(party: Extension<Arc<RelyingParty>>) -> Response {
    match party.session().clear() {
        Ok(()) => Redirect::to("/").into_response(),
        Err(err) => {
            error!("Failed to clear session: {err}");
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to sign out").into_response()
        }
    }
}
