//! Token provider issues short-lived access tokens and rotates persisted
//! refresh tokens carried by a cookie.

#![forbid(unsafe_code)]
pub mod config;
pub mod cookie;
mod database;
pub mod error;
pub mod issuer;
mod middleware;
pub mod refresh_token;
mod router;
pub mod telemetry;
pub mod token;

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::FromRef;
use axum::http::{Method, header};
use axum::routing::{get, post};
use axum::{Router, middleware as AxumMiddleware};
use error::ServerError;
use tower::ServiceBuilder;
use tower_http::LatencyUnit;
use tower_http::cors::{Any, CorsLayer};
use tower_http::sensitive_headers::SetSensitiveHeadersLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};

/// MUST NEVER be used in production.
#[cfg(test)]
pub async fn make_request(
    app: Router,
    method: Method,
    path: &str,
    body: String,
    cookie: Option<&str>,
) -> axum::http::Response<axum::body::Body> {
    use axum::extract::Request;
    use tower::util::ServiceExt;

    let mut request = Request::builder()
        .method(method)
        .uri(path)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        request = request.header(header::COOKIE, cookie);
    }

    app.oneshot(request.body(axum::body::Body::from(body)).unwrap())
        .await
        .unwrap()
}

/// State sharing between routes.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<config::Configuration>,
    pub issuer: Arc<issuer::TokenIssuer>,
}

impl FromRef<AppState> for Arc<issuer::TokenIssuer> {
    fn from_ref(state: &AppState) -> Arc<issuer::TokenIssuer> {
        Arc::clone(&state.issuer)
    }
}

/// Create router.
pub fn app(state: AppState) -> Router {
    let layers = ServiceBuilder::new()
        // Add high level tracing/logging to all requests.
        .layer(
            TraceLayer::new_for_http()
                .on_body_chunk(|chunk: &Bytes, latency: Duration, _span: &tracing::Span| {
                    tracing::trace!(
                        size_bytes = chunk.len(),
                        latency = ?latency,
                        "sending body chunk"
                    )
                })
                .make_span_with(
                    DefaultMakeSpan::new()
                        .include_headers(true)
                        .level(tracing::Level::INFO),
                )
                .on_request(DefaultOnRequest::new())
                .on_response(
                    DefaultOnResponse::new()
                        .include_headers(true)
                        .latency_unit(LatencyUnit::Micros),
                ),
        )
        // Set a timeout answered with a JSON error.
        .layer(AxumMiddleware::from_fn_with_state(
            state.config.server.timeout(),
            middleware::deadline,
        ))
        // Remove senstive headers from trace.
        .layer(SetSensitiveHeadersLayer::new([
            header::AUTHORIZATION,
            header::COOKIE,
            header::SET_COOKIE,
        ]))
        // Add CORS preflight support.
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers(Any),
        );

    Router::new()
        // `GET /status.json` goes to `status`.
        .route("/status.json", get(router::status::status))
        // `POST /token/generate` goes to `generate`.
        .route("/token/generate", post(router::generate::handler))
        .with_state(state)
        .route_layer(AxumMiddleware::from_fn(telemetry::track))
        .layer(layers)
}

/// Initialize the application state.
pub async fn initialize_state() -> Result<AppState, Box<dyn std::error::Error>> {
    // read configuration file. let it in memory.
    let config = config::Configuration::read();

    let Some(postgres) = &config.postgres else {
        tracing::error!("missing `POSTGRES_URL` or `postgres` entry on `config.yaml` file");
        return Err(ServerError::Configuration("missing PostgreSQL connection string").into());
    };
    let db = database::Database::new(
        &postgres.url,
        postgres.pool_size.unwrap_or(database::DEFAULT_POOL_SIZE),
    )
    .await?;

    // execute migrations scripts on start.
    db.migrate().await?;

    // an empty secret stops the startup here.
    let signer = token::TokenSigner::new(
        &config.token.issuer,
        &config.token.audience,
        &config.token.security_key,
    )?;
    let store = Arc::new(refresh_token::PgRefreshTokenStore::new(db.postgres));
    let issuer = issuer::TokenIssuer::new(store, signer, config.token.refresh_lifetime());

    tracing::info!(
        issuer = %config.token.issuer,
        audience = %config.token.audience,
        refresh_lifetime_hours = config.token.refresh_lifetime().num_hours(),
        "token issuer ready"
    );

    Ok(AppState {
        config,
        issuer: Arc::new(issuer),
    })
}
