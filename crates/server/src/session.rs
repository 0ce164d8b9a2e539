//! Cookie session: an HS256-signed JWT carrying the login state.

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::errors::ApiError;

#[derive(Clone)]
pub struct SessionConfig {
    pub secret: String,
    pub cookie_name: String,
    pub ttl_hours: i64,
    pub secure: bool,
}

impl From<&configs::AuthConfig> for SessionConfig {
    fn from(c: &configs::AuthConfig) -> Self {
        Self {
            secret: c.session_secret.clone(),
            cookie_name: c.cookie_name.clone(),
            ttl_hours: c.session_ttl_hours,
            secure: c.secure_cookie,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionData {
    /// Logged-in user id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Where to go once the login completes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
    /// OAuth `state` of the login in progress.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,
    #[serde(default)]
    exp: usize,
}

impl SessionData {
    /// Session from the request cookie. Missing, expired or forged cookies yield an empty session.
    pub fn from_jar(jar: &CookieJar, cfg: &SessionConfig) -> Self {
        let Some(cookie) = jar.get(&cfg.cookie_name) else {
            return Self::default();
        };
        let key = DecodingKey::from_secret(cfg.secret.as_bytes());
        match decode::<SessionData>(cookie.value(), &key, &Validation::new(Algorithm::HS256)) {
            Ok(data) => data.claims,
            Err(e) => {
                warn!(err = %e, "discarding invalid session cookie");
                Self::default()
            }
        }
    }

    pub fn is_authenticated(&self) -> bool { self.uid.is_some() }

    /// Sign the session into the jar.
    pub fn store(mut self, jar: CookieJar, cfg: &SessionConfig) -> Result<CookieJar, ApiError> {
        self.exp = (chrono::Utc::now() + chrono::Duration::hours(cfg.ttl_hours)).timestamp().max(0) as usize;
        let token = encode(&Header::default(), &self, &EncodingKey::from_secret(cfg.secret.as_bytes()))
            .map_err(|e| ApiError::Session(e.to_string()))?;
        let mut cookie = Cookie::new(cfg.cookie_name.clone(), token);
        cookie.set_path("/");
        cookie.set_http_only(true);
        cookie.set_secure(cfg.secure);
        cookie.set_same_site(SameSite::Lax);
        Ok(jar.add(cookie))
    }

    pub fn clear(jar: CookieJar, cfg: &SessionConfig) -> CookieJar {
        let mut cookie = Cookie::from(cfg.cookie_name.clone());
        cookie.set_path("/");
        jar.remove(cookie)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> SessionConfig {
        SessionConfig { secret: "0123456789abcdef".into(), cookie_name: "slh_session".into(), ttl_hours: 1, secure: false }
    }

    #[test]
    fn store_then_read() {
        let s = SessionData { uid: Some(3), lang: Some("zh-hant".into()), next: Some("/account/settings".into()), ..Default::default() };
        let jar = s.clone().store(CookieJar::new(), &cfg()).unwrap();
        let back = SessionData::from_jar(&jar, &cfg());
        assert_eq!(back.uid, Some(3));
        assert_eq!(back.lang.as_deref(), Some("zh-hant"));
        assert_eq!(back.next.as_deref(), Some("/account/settings"));
        assert!(back.is_authenticated());
    }

    #[test]
    fn wrong_secret_is_empty_session() {
        let jar = SessionData { uid: Some(1), ..Default::default() }.store(CookieJar::new(), &cfg()).unwrap();
        let other = SessionConfig { secret: "another-secret-value".into(), ..cfg() };
        assert_eq!(SessionData::from_jar(&jar, &other), SessionData::default());
    }

    #[test]
    fn missing_cookie_is_anonymous() {
        assert!(!SessionData::from_jar(&CookieJar::new(), &cfg()).is_authenticated());
    }
}
