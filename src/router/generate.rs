//! Issue an access token, rotating the refresh token cookie when needed.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum_extra::extract::CookieJar;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::cookie::REFRESH_TOKEN_COOKIE;
use crate::error::{INVALID_BODY, Result, ServerError};
use crate::issuer::TokenIssuer;
use crate::router::Valid;

#[derive(Debug, Default, Serialize, Deserialize, Validate)]
pub struct Body {
    #[serde(rename = "userId", alias = "UserId")]
    #[validate(required, length(min = 1))]
    pub user_id: Option<String>,
    #[serde(alias = "Email")]
    #[validate(required, length(min = 1))]
    pub email: Option<String>,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Response {
    pub access_token: String,
    pub refresh_token: String,
}

/// Handler of `POST /token/generate`.
pub async fn handler(
    State(issuer): State<Arc<TokenIssuer>>,
    jar: CookieJar,
    Valid(body): Valid<Body>,
) -> Result<(CookieJar, Json<Response>)> {
    let (Some(user_id), Some(email)) = (body.user_id, body.email) else {
        return Err(ServerError::BadRequest(INVALID_BODY));
    };
    let existing = jar
        .get(REFRESH_TOKEN_COOKIE)
        .map(|cookie| cookie.value().to_owned());

    let issued = issuer.issue(existing.as_deref(), &user_id, &email).await?;

    let jar = match &issued.refresh.cookie {
        Some(attributes) => jar.add(attributes.to_cookie(&issued.refresh.token)),
        None => jar,
    };

    Ok((
        jar,
        Json(Response {
            access_token: issued.access_token,
            refresh_token: issued.refresh.token,
        }),
    ))
}

#[cfg(test)]
mod tests {
    use axum::http::{StatusCode, header};
    use chrono::{Duration, Utc};
    use http_body_util::BodyExt;
    use serde_json::json;

    use super::*;
    use crate::refresh_token::RefreshTokenRecord;
    use crate::refresh_token::memory::MemoryRefreshTokenStore;
    use crate::*;

    const PATH: &str = "/token/generate";

    fn body(user_id: Option<&str>, email: Option<&str>) -> String {
        json!(Body {
            user_id: user_id.map(Into::into),
            email: email.map(Into::into),
        })
        .to_string()
    }

    async fn json_body(response: axum::http::Response<axum::body::Body>) -> serde_json::Value {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_generate_without_cookie() {
        let store = Arc::new(MemoryRefreshTokenStore::default());
        let state = router::state(store.clone());
        let app = app(state.clone());

        let response = make_request(
            app,
            Method::POST,
            PATH,
            body(Some("u1"), Some("u1@x.com")),
            None,
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|value| value.to_str().ok())
            .unwrap()
            .to_owned();
        assert!(cookie.starts_with("refreshToken="));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Secure"));

        let body: Response = serde_json::from_value(json_body(response).await).unwrap();
        assert!(!body.access_token.is_empty());
        assert!(!body.refresh_token.is_empty());
        assert!(cookie.starts_with(&format!("refreshToken={}", body.refresh_token)));
        assert!(store.get(&body.refresh_token).await.is_some());

        let claims = state
            .issuer
            .signer()
            .decode::<crate::token::AccessClaims>(&body.access_token)
            .unwrap()
            .claims;
        assert_eq!(claims.sub, "u1");
        assert_eq!(claims.refresh_token.as_deref(), Some(body.refresh_token.as_str()));
    }

    #[tokio::test]
    async fn test_generate_reuses_fresh_cookie() {
        let store = Arc::new(MemoryRefreshTokenStore::default());
        store
            .seed(RefreshTokenRecord {
                token: "fresh".into(),
                user_id: "u1".into(),
                expiry_date: Utc::now() + Duration::days(10),
            })
            .await;
        let app = app(router::state(store.clone()));

        let response = make_request(
            app,
            Method::POST,
            PATH,
            body(Some("u1"), Some("u1@x.com")),
            Some("refreshToken=fresh"),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get(header::SET_COOKIE).is_none());

        let body = json_body(response).await;
        assert_eq!(body["RefreshToken"], "fresh");
        assert_eq!(store.inserts(), 0);
    }

    #[tokio::test]
    async fn test_generate_missing_user_id() {
        let app = app(router::state(Arc::default()));

        let response = make_request(
            app,
            Method::POST,
            PATH,
            json!({ "email": "u1@x.com" }).to_string(),
            None,
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            json_body(response).await,
            json!({ "Error": "Please provide a valid userId and email address" })
        );
    }

    #[tokio::test]
    async fn test_generate_invalid_bodies() {
        for request in [
            body(Some("u1"), None),
            body(Some(""), Some("u1@x.com")),
            body(Some("u1"), Some("")),
            "not json".to_string(),
        ] {
            let app = app(router::state(Arc::default()));
            let response = make_request(app, Method::POST, PATH, request, None).await;

            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            assert_eq!(json_body(response).await["Error"], INVALID_BODY);
        }
    }

    #[tokio::test]
    async fn test_generate_store_failure() {
        let app = app(router::state(Arc::new(MemoryRefreshTokenStore::failing())));

        let response = make_request(
            app,
            Method::POST,
            PATH,
            body(Some("u1"), Some("u1@x.com")),
            None,
        )
        .await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.headers().get(header::SET_COOKIE).is_none());

        let body = json_body(response).await;
        assert!(body["Error"].as_str().is_some_and(|error| !error.is_empty()));
        assert!(body.get("AccessToken").is_none());
    }

    #[tokio::test]
    async fn test_generate_deadline() {
        let store = Arc::new(MemoryRefreshTokenStore::slow(std::time::Duration::from_secs(3)));
        let mut state = router::state(store.clone());
        let mut config = (*state.config).clone();
        config.server.request_timeout = 1;
        state.config = Arc::new(config);

        let response = make_request(
            app(state),
            Method::POST,
            PATH,
            body(Some("u1"), Some("u1@x.com")),
            None,
        )
        .await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.headers().get(header::SET_COOKIE).is_none());
        assert_eq!(
            json_body(response).await,
            json!({ "Error": "request timed out" })
        );

        // the cancelled insert never lands.
        tokio::time::sleep(std::time::Duration::from_secs(3)).await;
        assert_eq!(store.inserts(), 0);
    }
}
