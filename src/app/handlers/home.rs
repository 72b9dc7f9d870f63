use crate::auth::RelyingParty;
use axum::{extract::Extension, response::Json};
use serde_json::{json, Value};
use std::sync::Arc;

pub async fn home(party: Extension<Arc<RelyingParty>>) -> Json<Value> {
    let authenticated = party.session().is_authenticated();

    Json(json!({
        "name": env!("CARGO_PKG_NAME"),
        "authenticated": authenticated,
        "login": "/login",
        "dashboard": "/dashboard",
    }))
}
