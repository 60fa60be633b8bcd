//! Attributes of the `refreshToken` cookie.

use axum_extra::extract::cookie::{Cookie, SameSite};
use chrono::{DateTime, Utc};
use time::OffsetDateTime;

/// Cookie name carrying the refresh token.
pub const REFRESH_TOKEN_COOKIE: &str = "refreshToken";

/// Attributes applied to a freshly minted refresh token cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieAttributes {
    pub http_only: bool,
    pub secure: bool,
    pub same_site: SameSite,
    /// Consent-exempt cookie. Not serialized on the wire.
    pub essential: bool,
    pub expires: DateTime<Utc>,
}

impl CookieAttributes {
    pub fn new(expires: DateTime<Utc>) -> Self {
        Self {
            http_only: true,
            secure: true,
            same_site: SameSite::Lax,
            essential: true,
            expires,
        }
    }

    /// Build the `refreshToken` cookie for `token`.
    pub fn to_cookie(&self, token: &str) -> Cookie<'static> {
        let mut cookie = Cookie::build((REFRESH_TOKEN_COOKIE, token.to_owned()))
            .http_only(self.http_only)
            .secure(self.secure)
            .same_site(self.same_site)
            .path("/")
            .build();

        // out of range timestamps leave a session cookie.
        if let Ok(expires) = OffsetDateTime::from_unix_timestamp(self.expires.timestamp()) {
            cookie.set_expires(expires);
        }

        cookie
    }
}
