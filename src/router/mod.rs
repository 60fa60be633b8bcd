//! HTTP routes.
pub mod generate;
pub mod status;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request};
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::error::ServerError;

/// JSON body checked with [`validator`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Valid<T>(pub T);

impl<T, S> FromRequest<S> for Valid<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
{
    type Rejection = ServerError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        value.validate()?;
        Ok(Valid(value))
    }
}

/// Shared state for handler tests, backed by an in-memory store.
#[cfg(test)]
pub(crate) fn state(
    store: std::sync::Arc<crate::refresh_token::memory::MemoryRefreshTokenStore>,
) -> crate::AppState {
    use std::sync::Arc;

    let mut config = crate::config::Configuration::default();
    config.name = "token-provider".into();
    config.token = crate::config::Token {
        issuer: "https://auth.example.com".into(),
        audience: "example".into(),
        security_key: "secret".into(),
        refresh_lifetime_days: None,
    };
    let signer = crate::token::TokenSigner::new(
        &config.token.issuer,
        &config.token.audience,
        &config.token.security_key,
    )
    .unwrap();
    let issuer =
        crate::issuer::TokenIssuer::new(store, signer, config.token.refresh_lifetime());

    crate::AppState {
        config: Arc::new(config),
        issuer: Arc::new(issuer),
    }
}
