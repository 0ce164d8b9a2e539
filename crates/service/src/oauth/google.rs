use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use configs::OAuthConfig;
use oauth2::basic::{BasicClient, BasicTokenResponse};
use oauth2::reqwest::async_http_client;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, RedirectUrl, RefreshToken, Scope, TokenResponse,
    TokenUrl,
};
use reqwest::StatusCode;
use tracing::{debug, warn};

use super::{Credential, ExternalProfile, FetchOutcome, IdentityProvider, OAuthError};

/// Google authorization-code flow plus the userinfo endpoint.
pub struct GoogleProvider {
    client: BasicClient,
    http: reqwest::Client,
    profile_url: String,
    scopes: Vec<String>,
}

impl GoogleProvider {
    pub fn from_config(cfg: &OAuthConfig) -> Result<Self, OAuthError> {
        let auth_url = AuthUrl::new(cfg.auth_url.clone())
            .map_err(|e| OAuthError::Config(format!("invalid auth url: {}", e)))?;
        let token_url = TokenUrl::new(cfg.token_url.clone())
            .map_err(|e| OAuthError::Config(format!("invalid token url: {}", e)))?;
        let redirect = RedirectUrl::new(cfg.redirect_uri.clone())
            .map_err(|e| OAuthError::Config(format!("invalid redirect uri: {}", e)))?;

        let client = BasicClient::new(
            ClientId::new(cfg.client_id.clone()),
            Some(ClientSecret::new(cfg.client_secret.clone())),
            auth_url,
            Some(token_url),
        )
        .set_redirect_uri(redirect);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.http_timeout_secs))
            .build()
            .map_err(|e| OAuthError::Config(format!("http client: {}", e)))?;

        Ok(Self { client, http, profile_url: cfg.profile_url.clone(), scopes: cfg.scopes.clone() })
    }

    fn to_credential(token: &BasicTokenResponse, previous_refresh: Option<&str>) -> Credential {
        let expires_at = token
            .expires_in()
            .and_then(|d| chrono::Duration::from_std(d).ok())
            .map(|d| Utc::now() + d);
        Credential {
            access_token: token.access_token().secret().clone(),
            // Google omits the refresh token on refresh responses
            refresh_token: token
                .refresh_token()
                .map(|r| r.secret().clone())
                .or_else(|| previous_refresh.map(str::to_string)),
            expires_at,
            scopes: token
                .scopes()
                .map(|s| s.iter().map(|x| x.as_str().to_string()).collect())
                .unwrap_or_default(),
        }
    }
}

#[async_trait]
impl IdentityProvider for GoogleProvider {
    fn authorize_url(&self, state: &str) -> String {
        let state = state.to_string();
        let (url, _) = self
            .client
            .authorize_url(move || CsrfToken::new(state))
            .add_scopes(self.scopes.iter().cloned().map(Scope::new))
            .add_extra_param("access_type", "offline")
            .url();
        url.to_string()
    }

    async fn exchange_code(&self, code: &str) -> Result<Credential, OAuthError> {
        let token = self
            .client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .request_async(async_http_client)
            .await
            .map_err(|e| OAuthError::Exchange(e.to_string()))?;
        debug!(has_refresh = token.refresh_token().is_some(), "oauth code exchanged");
        Ok(Self::to_credential(&token, None))
    }

    async fn refresh(&self, credential: &Credential) -> Result<Credential, OAuthError> {
        let refresh = credential.refresh_token.as_deref().ok_or(OAuthError::MissingRefreshToken)?;
        let token = self
            .client
            .exchange_refresh_token(&RefreshToken::new(refresh.to_string()))
            .request_async(async_http_client)
            .await
            .map_err(|e| OAuthError::Refresh(e.to_string()))?;
        Ok(Self::to_credential(&token, Some(refresh)))
    }

    async fn fetch_profile(&self, credential: &Credential) -> FetchOutcome {
        if credential.is_expired_at(Utc::now()) {
            return FetchOutcome::Expired;
        }
        let resp = match self.http.get(&self.profile_url).bearer_auth(&credential.access_token).send().await {
            Ok(r) => r,
            Err(e) => return FetchOutcome::Failed(format!("profile request: {}", e)),
        };
        match resp.status() {
            StatusCode::UNAUTHORIZED => FetchOutcome::Expired,
            s if s.is_success() => match resp.json::<ExternalProfile>().await {
                Ok(p) => FetchOutcome::Fetched(p),
                Err(e) => FetchOutcome::Failed(format!("profile decode: {}", e)),
            },
            s => {
                warn!(status = %s, "profile endpoint returned error");
                FetchOutcome::Failed(format!("profile endpoint returned {}", s))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> OAuthConfig {
        OAuthConfig {
            client_id: "client-123".into(),
            client_secret: "secret".into(),
            redirect_uri: "http://localhost:8000/account/oauth2callback".into(),
            ..OAuthConfig::default()
        }
    }

    #[test]
    fn authorize_url_carries_state_and_offline_access() {
        let p = GoogleProvider::from_config(&cfg()).unwrap();
        let url = p.authorize_url("abc123");
        assert!(url.starts_with("https://accounts.google.com/"));
        assert!(url.contains("state=abc123"));
        assert!(url.contains("client_id=client-123"));
        assert!(url.contains("access_type=offline"));
        assert!(url.contains("response_type=code"));
    }

    #[test]
    fn bad_redirect_is_config_error() {
        let mut c = cfg();
        c.redirect_uri = "not a url".into();
        assert!(matches!(GoogleProvider::from_config(&c), Err(OAuthError::Config(_))));
    }

    #[tokio::test]
    async fn refresh_without_token_fails_fast() {
        let p = GoogleProvider::from_config(&cfg()).unwrap();
        let c = Credential { access_token: "a".into(), refresh_token: None, expires_at: None, scopes: vec![] };
        assert!(matches!(p.refresh(&c).await, Err(OAuthError::MissingRefreshToken)));
    }
}
