//! Request-wide middleware.

use std::time::Duration;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::error::ServerError;

/// Bound the whole request by `timeout`.
///
/// On expiry the inner future is dropped, which cancels pending store calls,
/// and the caller gets the usual JSON error envelope.
pub async fn deadline(State(timeout): State<Duration>, req: Request, next: Next) -> Response {
    match tokio::time::timeout(timeout, next.run(req)).await {
        Ok(response) => response,
        Err(_) => ServerError::Timeout.into_response(),
    }
}
