//! Refresh token rotation and access token issuance.
//!
//! Two clocks are involved. A refresh token embeds a 5-minute
//! `exp` claim, but reuse is gated by the `expiry_date` of its stored row,
//! which lives for the configured refresh lifetime.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::cookie::CookieAttributes;
use crate::error::{Result, ServerError};
use crate::refresh_token::{RefreshTokenRecord, RefreshTokenStore};
use crate::token::{AccessClaims, EXPIRATION_TIME, RefreshClaims, TokenSigner};

/// A stored refresh token closer than this to its expiry gets rotated.
const ROTATION_MARGIN_DAYS: i64 = 1;

/// Refresh token handed back to the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshGrant {
    pub token: String,
    /// Expiry of the stored row.
    pub expires_at: DateTime<Utc>,
    /// Only set when a new token was minted.
    pub cookie: Option<CookieAttributes>,
}

impl RefreshGrant {
    pub fn rotated(&self) -> bool {
        self.cookie.is_some()
    }
}

/// Both tokens of a successful request.
#[derive(Debug, Clone, PartialEq)]
pub struct IssuedTokens {
    pub access_token: String,
    pub refresh: RefreshGrant,
}

/// Decide between refresh token reuse and rotation, then sign access tokens.
pub struct TokenIssuer {
    store: Arc<dyn RefreshTokenStore>,
    signer: TokenSigner,
    refresh_lifetime: Duration,
}

impl TokenIssuer {
    /// Create a new [`TokenIssuer`].
    pub fn new(
        store: Arc<dyn RefreshTokenStore>,
        signer: TokenSigner,
        refresh_lifetime: Duration,
    ) -> Self {
        Self {
            store,
            signer,
            refresh_lifetime,
        }
    }

    pub fn signer(&self) -> &TokenSigner {
        &self.signer
    }

    /// Run the whole flow: reuse or rotate the refresh token, then sign an
    /// access token bound to it.
    ///
    /// A refresh failure ends the request, no access token is signed.
    pub async fn issue(
        &self,
        existing: Option<&str>,
        user_id: &str,
        email: &str,
    ) -> Result<IssuedTokens> {
        check_identity(user_id, email)?;

        let refresh = self.issue_or_rotate_refresh_token(existing, user_id).await?;
        let access_token = self.issue_access_token(user_id, email, Some(&refresh.token))?;

        Ok(IssuedTokens {
            access_token,
            refresh,
        })
    }

    /// Return `existing` when its stored row is valid and fresh, otherwise
    /// mint and persist a new refresh token.
    pub async fn issue_or_rotate_refresh_token(
        &self,
        existing: Option<&str>,
        user_id: &str,
    ) -> Result<RefreshGrant> {
        let record = match existing.filter(|token| !token.is_empty()) {
            Some(token) => self.store.lookup_valid(token).await?,
            None => None,
        };

        match record {
            Some(record) if !needs_rotation(&record, Utc::now()) => {
                tracing::debug!(expiry_date = %record.expiry_date, "refresh token reused");

                Ok(RefreshGrant {
                    token: record.token,
                    expires_at: record.expiry_date,
                    cookie: None,
                })
            },
            Some(record) => {
                tracing::debug!(expiry_date = %record.expiry_date, "refresh token near expiry");
                self.rotate(user_id).await
            },
            None => self.rotate(user_id).await,
        }
    }

    async fn rotate(&self, user_id: &str) -> Result<RefreshGrant> {
        if user_id.is_empty() {
            return Err(ServerError::BadRequest("userId must not be empty"));
        }

        let now = Utc::now();
        let expiry_date = now
            .checked_add_signed(self.refresh_lifetime)
            .ok_or(ServerError::ExpiryOverflow)?;
        let token = self.signer.sign(
            RefreshClaims::new(user_id),
            now + Duration::seconds(EXPIRATION_TIME),
        )?;
        let record = RefreshTokenRecord {
            token,
            user_id: user_id.to_owned(),
            expiry_date,
        };

        self.store.insert(&record).await?;

        metrics::counter!("tokens_issued_total", "kind" => "refresh").increment(1);
        tracing::info!(%user_id, expiry_date = %record.expiry_date, "refresh token rotated");

        Ok(RefreshGrant {
            cookie: Some(CookieAttributes::new(record.expiry_date)),
            expires_at: record.expiry_date,
            token: record.token,
        })
    }

    /// Sign a 5-minute access token, optionally bound to a refresh token.
    pub fn issue_access_token(
        &self,
        user_id: &str,
        email: &str,
        refresh_token: Option<&str>,
    ) -> Result<String> {
        check_identity(user_id, email)?;

        let claims = AccessClaims {
            sub: user_id.to_owned(),
            name: email.to_owned(),
            email: email.to_owned(),
            refresh_token: refresh_token
                .filter(|token| !token.is_empty())
                .map(str::to_owned),
        };
        let token = self
            .signer
            .sign(claims, Utc::now() + Duration::seconds(EXPIRATION_TIME))?;

        metrics::counter!("tokens_issued_total", "kind" => "access").increment(1);
        Ok(token)
    }
}

/// A stored token expiring within [`ROTATION_MARGIN_DAYS`] is replaced.
fn needs_rotation(record: &RefreshTokenRecord, now: DateTime<Utc>) -> bool {
    record.expiry_date < now + Duration::days(ROTATION_MARGIN_DAYS)
}

fn check_identity(user_id: &str, email: &str) -> Result<()> {
    if user_id.is_empty() || email.is_empty() {
        return Err(ServerError::BadRequest("userId and email must not be empty"));
    }

    Ok(())
}
