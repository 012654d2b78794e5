//! HTTP metrics middleware.
//!
//! Captures every response, including the 401/403/503 produced by the auth
//! middleware and framework-level 404/405 that never reach a handler.

use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;

use crate::observability::metrics::record_http_request;

/// Records method, normalized path, status and duration for each request.
///
/// Applied as the outermost layer.
pub async fn http_metrics_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let path = request.uri().path().to_string();

    let response = next.run(request).await;

    record_http_request(&method, &path, response.status().as_u16(), start.elapsed());

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request as HttpRequest, StatusCode},
        middleware,
        routing::get,
        Router,
    };
    use tower::ServiceExt;

    async fn ok() -> &'static str {
        "OK"
    }

    async fn unavailable() -> (StatusCode, &'static str) {
        (StatusCode::SERVICE_UNAVAILABLE, "down")
    }

    fn test_app() -> Router {
        Router::new()
            .route("/health", get(ok))
            .route("/ready", get(unavailable))
            .layer(middleware::from_fn(http_metrics_middleware))
    }

    async fn status_of(uri: &str) -> StatusCode {
        let request = HttpRequest::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .expect("request builder should succeed");

        test_app()
            .oneshot(request)
            .await
            .expect("request should succeed")
            .status()
    }

    #[tokio::test]
    async fn test_middleware_passes_responses_through() {
        assert_eq!(status_of("/health").await, StatusCode::OK);
        assert_eq!(status_of("/ready").await, StatusCode::SERVICE_UNAVAILABLE);
        // Unknown routes are still observed
        assert_eq!(status_of("/nope").await, StatusCode::NOT_FOUND);
    }
}
