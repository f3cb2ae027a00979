use axum::extract::State;
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::sync::Arc;
use tracing::error;

use crate::http::{Outcome, Request, StyleResponse};
use crate::middleware::StyleMiddleware;

/// Axum middleware function, for use with `axum::middleware::from_fn_with_state`
///
/// ```ignore
/// let styles = Arc::new(StyleMiddleware::new(config)?);
/// let app = Router::new()
///     .nest_service("/", ServeDir::new("public"))
///     .layer(axum::middleware::from_fn_with_state(styles, serve_styles));
/// ```
///
/// An error handed to the next handler has no place to go in axum's chain,
/// so it is answered with a 500 instead.
pub async fn serve_styles(
    State(styles): State<Arc<StyleMiddleware>>,
    request: axum::extract::Request,
    next: Next,
) -> Response {
    match styles.handle(&style_request(&request)).await {
        Outcome::Respond(response) => response.into_response(),
        Outcome::Next(None) => next.run(request).await,
        Outcome::Next(Some(err)) => {
            error!("Style sheet request {} failed: {}", request.uri(), err);
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
        }
    }
}

fn style_request(request: &axum::extract::Request) -> Request {
    let target = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or_else(|| request.uri().path());
    Request::new(request.method().as_str(), target)
}

impl IntoResponse for StyleResponse {
    fn into_response(self) -> Response {
        let mut response = self.body.into_response();
        *response.status_mut() = StatusCode::from_u16(self.status).unwrap_or(StatusCode::OK);
        for (key, value) in &self.headers {
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(key.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                response.headers_mut().insert(name, value);
            }
        }
        response
    }
}
