//! Manage json web tokens.

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::distributions::{Alphanumeric, DistString};
use rand::rngs::OsRng;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{Result, ServerError};

/// Lifetime embedded in every signed token, access and refresh alike.
pub const EXPIRATION_TIME: i64 = 60 * 5; // 5 minutes.
const JTI_LENGTH: usize = 16;

/// Claims registered by RFC 7519, shared by both token kinds.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Registered {
    pub iss: String,
    pub aud: String,
    pub exp: i64,
    pub nbf: i64,
    pub iat: i64,
}

/// Claims carried by an access token.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AccessClaims {
    /// User ID.
    pub sub: String,
    pub name: String,
    pub email: String,
    /// Refresh token this access token was issued with.
    #[serde(rename = "refreshToken", skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

/// Claims carried by a refresh token.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RefreshClaims {
    /// User ID.
    pub sub: String,
    /// Keeps two refresh tokens minted in the same second distinct.
    pub jti: String,
}

impl RefreshClaims {
    pub fn new(user_id: &str) -> Self {
        Self {
            sub: user_id.to_owned(),
            jti: Alphanumeric.sample_string(&mut OsRng, JTI_LENGTH),
        }
    }
}

/// Domain claims merged with registered claims for signing.
#[derive(Debug, Serialize, Deserialize)]
pub struct Signed<C> {
    #[serde(flatten)]
    pub claims: C,
    #[serde(flatten)]
    pub registered: Registered,
}

/// Sign claims with HMAC-SHA256.
#[derive(Clone)]
pub struct TokenSigner {
    algorithm: Algorithm,
    issuer: String,
    audience: String,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner")
            .field("algorithm", &self.algorithm)
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .finish_non_exhaustive()
    }
}

impl TokenSigner {
    /// Create a new [`TokenSigner`].
    ///
    /// Fails with [`ServerError::Configuration`] on an empty secret.
    pub fn new(issuer: &str, audience: &str, secret: &str) -> Result<Self> {
        if secret.is_empty() {
            return Err(ServerError::Configuration("`TOKEN_SECURITYKEY` is empty"));
        }

        Ok(Self {
            algorithm: Algorithm::HS256,
            issuer: issuer.to_owned(),
            audience: audience.to_owned(),
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        })
    }

    /// Sign `claims` into a compact token valid until `expires_at`.
    pub fn sign<C: Serialize>(&self, claims: C, expires_at: DateTime<Utc>) -> Result<String> {
        let now = Utc::now().timestamp();
        let token = Signed {
            claims,
            registered: Registered {
                iss: self.issuer.clone(),
                aud: self.audience.clone(),
                exp: expires_at.timestamp(),
                nbf: now,
                iat: now,
            },
        };

        Ok(encode(&Header::new(self.algorithm), &token, &self.encoding_key)?)
    }

    /// Decode and check a token signed by this instance.
    pub fn decode<C: DeserializeOwned>(&self, token: &str) -> Result<Signed<C>> {
        let mut validation = Validation::new(self.algorithm);
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);

        Ok(decode::<Signed<C>>(token, &self.decoding_key, &validation)?.claims)
    }
}
