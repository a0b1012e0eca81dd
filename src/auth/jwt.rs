use std::time::Duration;

use axum::extract::FromRef;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use crate::{config::JwtConfig, state::AppState};

/// Which of the two configured lifetimes a session token gets. `Extended` is
/// used when the caller asked to stay signed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionLength {
    Short,
    Extended,
}

/// Identity claims embedded in a session token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub iat: usize,
    pub exp: usize,
}

/// Signing and verification keys derived once from the shared secret. The
/// secret itself never leaves the config and is never logged.
#[derive(Clone)]
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    short_ttl: Duration,
    extended_ttl: Duration,
}

impl FromRef<AppState> for TokenKeys {
    fn from_ref(state: &AppState) -> Self {
        let JwtConfig {
            secret,
            ttl_minutes,
            extended_ttl_minutes,
        } = state.config.jwt.clone();
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            short_ttl: Duration::from_secs((ttl_minutes as u64) * 60),
            extended_ttl: Duration::from_secs((extended_ttl_minutes as u64) * 60),
        }
    }
}

impl TokenKeys {
    pub fn sign_session(
        &self,
        user_id: Uuid,
        email: &str,
        length: SessionLength,
    ) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let ttl = match length {
            SessionLength::Short => self.short_ttl,
            SessionLength::Extended => self.extended_ttl,
        };
        let exp = now + TimeDuration::seconds(ttl.as_secs() as i64);
        let claims = Claims {
            sub: user_id,
            email: email.to_string(),
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(user_id = %user_id, length = ?length, "session token signed");
        Ok(token)
    }

    /// Checks signature and expiry and hands the embedded claims back
    /// unchanged. The token says nothing about whether the user still exists.
    pub fn verify(&self, token: &str) -> anyhow::Result<Claims> {
        let data = decode::<Claims>(token, &self.decoding, &Validation::default())?;
        debug!(user_id = %data.claims.sub, "session token verified");
        Ok(data.claims)
    }
}
