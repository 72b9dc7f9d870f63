use crate::GIT_COMMIT_HASH;
use axum::{
    http::{HeaderMap, HeaderValue},
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Serialize, Deserialize, Debug)]
pub struct Health {
    commit: String,
    name: String,
    version: String,
}

// axum handler for health
pub async fn health() -> impl IntoResponse {
    let health = Health {
        commit: GIT_COMMIT_HASH.to_string(),
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    let short_hash = if health.commit.len() > 7 {
        &health.commit[0..7]
    } else {
        ""
    };

    let headers = format!("{}:{}:{}", health.name, health.version, short_hash)
        .parse::<HeaderValue>()
        .map(|x_app_header_value| {
            let mut headers = HeaderMap::new();
            headers.insert("X-App", x_app_header_value);
            headers
        })
        .map_err(|err| {
            debug!("Failed to parse X-App header: {}", err);
        })
        .unwrap_or_else(|()| HeaderMap::new());

    (headers, Json(health))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::to_bytes, http::StatusCode};

    #[tokio::test]
    async fn health_reports_name_and_x_app() -> anyhow::Result<()> {
        let response = health().await.into_response();
        assert_eq!(response.status(), StatusCode::OK);

        let x_app = response
            .headers()
            .get("X-App")
            .and_then(|value| value.to_str().ok())
            .map(ToString::to_string);
        assert!(x_app.is_some_and(|value| value.starts_with(env!("CARGO_PKG_NAME"))));

        let body = to_bytes(response.into_body(), usize::MAX).await?;
        let health: Health = serde_json::from_slice(&body)?;
        assert_eq!(health.version, env!("CARGO_PKG_VERSION"));
        Ok(())
    }
}
