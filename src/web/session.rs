// Dashboard sessions: short-lived HS256 JWTs carried in an HttpOnly
// cookie. Nothing is stored server-side; logout just clears the cookie.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

pub const SESSION_COOKIE: &str = "guildkeeper_session";

fn session_lifetime() -> Duration {
    Duration::hours(24)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Discord user id.
    pub sub: String,
    /// Discord username, for display only.
    pub name: String,
    pub exp: i64,
}

#[derive(Clone)]
pub struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl SessionKeys {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    pub fn issue(&self, user_id: u64, username: &str) -> anyhow::Result<String> {
        let claims = SessionClaims {
            sub: user_id.to_string(),
            name: username.to_string(),
            exp: (Utc::now() + session_lifetime()).timestamp(),
        };
        Ok(encode(&Header::default(), &claims, &self.encoding)?)
    }

    pub fn verify(&self, token: &str) -> Option<SessionClaims> {
        decode::<SessionClaims>(token, &self.decoding, &Validation::default())
            .map(|data| data.claims)
            .ok()
    }
}

/// Pull the session token out of a Cookie header value.
pub fn token_from_cookie_header(header: &str) -> Option<&str> {
    header.split(';').find_map(|part| {
        let part = part.trim();
        part.strip_prefix(SESSION_COOKIE)?.strip_prefix('=')
    })
}

pub fn set_cookie_header(token: &str) -> String {
    format!(
        "{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        session_lifetime().num_seconds()
    )
}

pub fn clear_cookie_header() -> String {
    format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_sessions_verify_and_carry_identity() {
        let keys = SessionKeys::new("test-secret");
        let token = keys.issue(42, "tester").unwrap();
        let claims = keys.verify(&token).unwrap();
        assert_eq!(claims.sub, "42");
        assert_eq!(claims.name, "tester");
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let keys = SessionKeys::new("test-secret");
        let other = SessionKeys::new("other-secret");
        let token = keys.issue(42, "tester").unwrap();
        assert!(other.verify(&token).is_none());
    }

    #[test]
    fn cookie_parsing_finds_the_session_among_others() {
        let header = format!("theme=dark; {SESSION_COOKIE}=abc.def.ghi; lang=en");
        assert_eq!(token_from_cookie_header(&header), Some("abc.def.ghi"));
        assert_eq!(token_from_cookie_header("theme=dark"), None);
    }
}
