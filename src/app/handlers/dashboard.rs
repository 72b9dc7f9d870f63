use crate::auth::RelyingParty;
use axum::{
    extract::Extension,
    response::{IntoResponse, Json, Redirect, Response},
};
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;

/// What the dashboard shows. Token values stay server-side.
#[derive(Serialize, Debug)]
pub struct Dashboard {
    authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    token_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    expires_in: Option<u64>,
}

pub async fn dashboard(party: Extension<Arc<RelyingParty>>) -> Response {
    match party.session().load() {
        Ok(Some(tokens)) if !tokens.access_token.is_empty() => Json(Dashboard {
            authenticated: true,
            token_type: tokens.token_type,
            expires_in: tokens.expires_in,
        })
        .into_response(),
        Ok(_) => Redirect::to("/").into_response(),
        Err(err) => {
            warn!("Failed to read session: {err}");
            Redirect::to("/").into_response()
        }
    }
}
