use crate::auth::{ExchangeOutcome, RelyingParty};
use axum::{
    extract::{Extension, RawQuery},
    response::Redirect,
};
use std::sync::Arc;

pub async fn callback(party: Extension<Arc<RelyingParty>>, RawQuery(query): RawQuery) -> Redirect {
    let query = query.unwrap_or_default();
    let pairs = url::form_urlencoded::parse(query.as_bytes());

    match party.complete(pairs).await {
        ExchangeOutcome::Success => Redirect::to("/dashboard"),
        ExchangeOutcome::Failure(_) => Redirect::to("/"),
    }
}
