//! Relying-party HTTP server: starts the login, receives the callback and
//! shows the stored tokens.

pub mod handlers;

use crate::auth::RelyingParty;
use anyhow::Result;
use axum::{
    body::Body,
    extract::Extension,
    http::{HeaderName, HeaderValue, Request},
    routing::{get, post},
    Router,
};
use handlers::{callback, dashboard, health, home, login, logout};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer, trace::TraceLayer,
};
use tracing::{debug_span, info, Span};
use ulid::Ulid;

#[must_use]
pub fn router(party: Arc<RelyingParty>) -> Router {
    Router::new()
        .route("/", get(home::home))
        .route("/login", get(login::login))
        .route("/callback", get(callback::callback))
        .route("/dashboard", get(dashboard::dashboard))
        .route("/logout", post(logout::logout))
        .route("/health", get(health::health).options(health::health))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(Extension(party)),
        )
}

/// Serve until Ctrl-C.
/// # Errors
/// Returns an error if the listener cannot be bound or the server fails.
pub async fn serve(port: u16, party: Arc<RelyingParty>) -> Result<()> {
    let app = router(party);

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

// span
fn make_span(request: &Request<Body>) -> Span {
    let path = request.uri().path();
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");

    // No headers or query here: the callback query carries the code.
    debug_span!("http-request", path, request_id)
}
