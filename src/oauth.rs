//! Google and Naver sign-in.
//!
//! `/auth/{provider}` redirects the browser to the provider with a random
//! state that is stored in the database. The front-end receives the code on
//! `{public_url}/auth/{provider}/callback` and posts `{code, state}` back to
//! the API, which consumes the state, exchanges the code and reads the
//! provider's user profile.

use crate::config::{Config, OAuthClientConfig};
use crate::db::{Database, OAuthState, now_timestamp};
use crate::error::{AppError, Result};
use oauth2::basic::BasicClient;
use oauth2::{
    AuthType, AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, EndpointNotSet,
    EndpointSet, PkceCodeChallenge, PkceCodeVerifier, RedirectUrl, Scope, TokenResponse, TokenUrl,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// States older than this are rejected and purged.
const STATE_TTL_SECS: i64 = 10 * 60;

type ConfiguredClient =
    BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// Supported identity providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OAuthProvider {
    /// Google accounts.
    Google,
    /// Naver accounts.
    Naver,
}

impl OAuthProvider {
    /// Path segment and stored provider name.
    pub fn as_str(&self) -> &'static str {
        match self {
            OAuthProvider::Google => "google",
            OAuthProvider::Naver => "naver",
        }
    }

    /// Parse a path segment.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "google" => Some(OAuthProvider::Google),
            "naver" => Some(OAuthProvider::Naver),
            _ => None,
        }
    }

    fn auth_url(&self) -> &'static str {
        match self {
            OAuthProvider::Google => "https://accounts.google.com/o/oauth2/v2/auth",
            OAuthProvider::Naver => "https://nid.naver.com/oauth2.0/authorize",
        }
    }

    fn token_url(&self) -> &'static str {
        match self {
            OAuthProvider::Google => "https://oauth2.googleapis.com/token",
            OAuthProvider::Naver => "https://nid.naver.com/oauth2.0/token",
        }
    }

    fn userinfo_url(&self) -> &'static str {
        match self {
            OAuthProvider::Google => "https://openidconnect.googleapis.com/v1/userinfo",
            OAuthProvider::Naver => "https://openapi.naver.com/v1/nid/me",
        }
    }

    fn scopes(&self) -> &'static [&'static str] {
        match self {
            OAuthProvider::Google => &["openid", "email", "profile"],
            OAuthProvider::Naver => &[],
        }
    }

    /// Naver does not implement PKCE.
    fn uses_pkce(&self) -> bool {
        matches!(self, OAuthProvider::Google)
    }
}

impl std::fmt::Display for OAuthProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Profile fields read from the provider.
#[derive(Debug, Clone, PartialEq)]
pub struct OAuthProfile {
    /// Verified email address.
    pub email: String,
    /// Display name, possibly empty.
    pub name: String,
}

/// Naver's token endpoint returns `expires_in` as a string, which the
/// standard token response rejects, so its exchange is done by hand.
#[derive(Debug, Deserialize)]
struct NaverToken {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// OAuth flows for the configured providers.
#[derive(Clone)]
pub struct OAuthService {
    http: reqwest::Client,
    db: Database,
    public_url: String,
    google: Option<OAuthClientConfig>,
    naver: Option<OAuthClientConfig>,
}

impl OAuthService {
    /// Build from configuration. Providers without a client ID are disabled.
    pub fn new(http: reqwest::Client, db: Database, config: &Config) -> Self {
        let usable = |c: &Option<OAuthClientConfig>| {
            c.clone().filter(|c| !c.client_id.trim().is_empty())
        };

        Self {
            http,
            db,
            public_url: config.server.public_url.trim_end_matches('/').to_string(),
            google: usable(&config.oauth.google),
            naver: usable(&config.oauth.naver),
        }
    }

    fn credentials(&self, provider: OAuthProvider) -> Result<&OAuthClientConfig> {
        let creds = match provider {
            OAuthProvider::Google => self.google.as_ref(),
            OAuthProvider::Naver => self.naver.as_ref(),
        };
        creds.ok_or_else(|| AppError::NotFound(format!("{} sign-in is not configured", provider)))
    }

    /// Whether the provider has credentials.
    pub fn is_enabled(&self, provider: OAuthProvider) -> bool {
        self.credentials(provider).is_ok()
    }

    /// Front-end route the provider redirects back to.
    pub fn redirect_uri(&self, provider: OAuthProvider) -> String {
        format!("{}/auth/{}/callback", self.public_url, provider)
    }

    fn client(&self, provider: OAuthProvider) -> Result<ConfiguredClient> {
        let creds = self.credentials(provider)?;
        let invalid = |e: oauth2::url::ParseError| AppError::Config(format!("Invalid OAuth URL: {}", e));

        Ok(BasicClient::new(ClientId::new(creds.client_id.clone()))
            .set_client_secret(ClientSecret::new(creds.client_secret.clone()))
            .set_auth_type(AuthType::RequestBody)
            .set_auth_uri(AuthUrl::new(provider.auth_url().to_string()).map_err(invalid)?)
            .set_token_uri(TokenUrl::new(provider.token_url().to_string()).map_err(invalid)?)
            .set_redirect_uri(RedirectUrl::new(self.redirect_uri(provider)).map_err(invalid)?))
    }

    /// Provider authorization URL. The generated state is stored for the callback.
    pub fn authorize_url(&self, provider: OAuthProvider) -> Result<String> {
        let client = self.client(provider)?;

        let mut request = client.authorize_url(CsrfToken::new_random);
        for scope in provider.scopes() {
            request = request.add_scope(Scope::new(scope.to_string()));
        }

        let mut pkce_verifier = None;
        if provider.uses_pkce() {
            let (challenge, verifier) = PkceCodeChallenge::new_random_sha256();
            request = request.set_pkce_challenge(challenge);
            pkce_verifier = Some(verifier.secret().clone());
        }

        let (url, csrf_state) = request.url();

        self.db
            .cleanup_oauth_states(now_timestamp() - STATE_TTL_SECS)?;
        self.db.save_oauth_state(&OAuthState {
            state: csrf_state.secret().clone(),
            provider: provider.as_str().to_string(),
            pkce_verifier,
            created_at: now_timestamp(),
        })?;

        Ok(url.to_string())
    }

    /// Consume the state, exchange the code and fetch the user's profile.
    pub async fn complete(
        &self,
        provider: OAuthProvider,
        code: &str,
        state: &str,
    ) -> Result<OAuthProfile> {
        let saved = self
            .db
            .take_oauth_state(state)?
            .filter(|s| s.provider == provider.as_str())
            .filter(|s| s.created_at >= now_timestamp() - STATE_TTL_SECS)
            .ok_or_else(|| {
                AppError::Unauthorized("Invalid state parameter. Possible CSRF attack.".to_string())
            })?;

        let access_token = match provider {
            OAuthProvider::Google => self.exchange_standard(provider, code, saved).await?,
            OAuthProvider::Naver => self.exchange_naver(code, state).await?,
        };

        let profile = self.fetch_profile(provider, &access_token).await?;
        tracing::debug!(provider = %provider, "OAuth profile fetched");
        Ok(profile)
    }

    async fn exchange_standard(
        &self,
        provider: OAuthProvider,
        code: &str,
        saved: OAuthState,
    ) -> Result<String> {
        let client = self.client(provider)?;
        let mut request = client.exchange_code(AuthorizationCode::new(code.to_string()));
        if let Some(verifier) = saved.pkce_verifier {
            request = request.set_pkce_verifier(PkceCodeVerifier::new(verifier));
        }

        let token = request.request_async(&self.http).await.map_err(|e| {
            AppError::Upstream(format!("{} token exchange failed: {}", provider, e))
        })?;
        Ok(token.access_token().secret().clone())
    }

    async fn exchange_naver(&self, code: &str, state: &str) -> Result<String> {
        let creds = self.credentials(OAuthProvider::Naver)?;
        let response = self
            .http
            .post(OAuthProvider::Naver.token_url())
            .form(&[
                ("grant_type", "authorization_code"),
                ("client_id", creds.client_id.as_str()),
                ("client_secret", creds.client_secret.as_str()),
                ("code", code),
                ("state", state),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AppError::Upstream(format!(
                "naver token exchange failed: {}",
                response.status()
            )));
        }

        let token: NaverToken = response.json().await?;
        match token.access_token {
            Some(access_token) => Ok(access_token),
            None => Err(AppError::Upstream(format!(
                "naver token exchange failed: {}",
                token
                    .error_description
                    .or(token.error)
                    .unwrap_or_else(|| "no access token".to_string())
            ))),
        }
    }

    async fn fetch_profile(&self, provider: OAuthProvider, access_token: &str) -> Result<OAuthProfile> {
        let response = self
            .http
            .get(provider.userinfo_url())
            .bearer_auth(access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AppError::Upstream(format!(
                "{} profile request failed: {}",
                provider,
                response.status()
            )));
        }

        let body: Value = response.json().await?;
        parse_profile(provider, &body)
    }
}

/// Read email and name from a userinfo response.
pub(crate) fn parse_profile(provider: OAuthProvider, body: &Value) -> Result<OAuthProfile> {
    let fields = match provider {
        OAuthProvider::Google => body,
        OAuthProvider::Naver => body.get("response").unwrap_or(&Value::Null),
    };
    let text = |key: &str| fields.get(key).and_then(Value::as_str).unwrap_or_default();

    let email = text("email");
    if email.is_empty() {
        return Err(AppError::Upstream(format!(
            "{} did not share an email address",
            provider
        )));
    }

    // Naver only returns emails it has confirmed
    if provider == OAuthProvider::Google
        && fields.get("email_verified").and_then(Value::as_bool) != Some(true)
    {
        return Err(AppError::Unauthorized(format!(
            "{} email address {} is not verified",
            provider, email
        )));
    }

    let name = match text("name") {
        "" => text("nickname"),
        name => name,
    };

    Ok(OAuthProfile {
        email: email.to_string(),
        name: name.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> OAuthService {
        let mut config = Config::default();
        config.server.public_url = "https://books.example.com/".to_string();
        config.oauth.google = Some(OAuthClientConfig {
            client_id: "google-id".to_string(),
            client_secret: "google-secret".to_string(),
        });
        OAuthService::new(
            reqwest::Client::new(),
            Database::open_memory().unwrap(),
            &config,
        )
    }

    #[test]
    fn test_provider_parse() {
        assert_eq!(OAuthProvider::parse("google"), Some(OAuthProvider::Google));
        assert_eq!(OAuthProvider::parse("naver"), Some(OAuthProvider::Naver));
        assert_eq!(OAuthProvider::parse("kakao"), None);
    }

    #[test]
    fn test_authorize_url_stores_state() {
        let oauth = service();
        assert!(oauth.is_enabled(OAuthProvider::Google));
        assert!(!oauth.is_enabled(OAuthProvider::Naver));

        let url = oauth.authorize_url(OAuthProvider::Google).unwrap();
        assert!(url.starts_with("https://accounts.google.com/o/oauth2/v2/auth?"));
        assert!(url.contains("client_id=google-id"));
        assert!(url.contains("code_challenge="));
        assert!(url.contains(&urlencoding::encode(
            "https://books.example.com/auth/google/callback"
        ).into_owned()));

        let parsed = oauth2::url::Url::parse(&url).unwrap();
        let state = parsed
            .query_pairs()
            .find(|(k, _)| k == "state")
            .map(|(_, v)| v.into_owned())
            .unwrap();

        let saved = oauth.db.take_oauth_state(&state).unwrap().unwrap();
        assert_eq!(saved.provider, "google");
        assert!(saved.pkce_verifier.is_some());
        assert!(oauth.db.take_oauth_state(&state).unwrap().is_none());
    }

    #[test]
    fn test_unconfigured_provider() {
        let oauth = service();
        assert!(matches!(
            oauth.authorize_url(OAuthProvider::Naver),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn test_unknown_state_rejected() {
        let oauth = service();
        let result =
            tokio_test::block_on(oauth.complete(OAuthProvider::Google, "code", "forged"));
        assert!(matches!(result, Err(AppError::Unauthorized(_))));
    }

    #[test]
    fn test_parse_profile() {
        let google = serde_json::json!({
            "sub": "1",
            "email": "a@example.com",
            "email_verified": true,
            "name": "A"
        });
        let profile = parse_profile(OAuthProvider::Google, &google).unwrap();
        assert_eq!(profile.email, "a@example.com");
        assert_eq!(profile.name, "A");

        let naver = serde_json::json!({
            "resultcode": "00",
            "response": {"id": "x", "email": "b@naver.com", "nickname": "bee"}
        });
        let profile = parse_profile(OAuthProvider::Naver, &naver).unwrap();
        assert_eq!(profile.email, "b@naver.com");
        assert_eq!(profile.name, "bee");

        let missing = serde_json::json!({"response": {}});
        assert!(parse_profile(OAuthProvider::Naver, &missing).is_err());
    }

    #[test]
    fn test_unverified_google_email_rejected() {
        let unverified = serde_json::json!({
            "sub": "2",
            "email": "someone@example.com",
            "email_verified": false,
            "name": "Someone"
        });
        assert!(matches!(
            parse_profile(OAuthProvider::Google, &unverified),
            Err(AppError::Unauthorized(_))
        ));

        let no_flag = serde_json::json!({"sub": "2", "email": "someone@example.com"});
        assert!(matches!(
            parse_profile(OAuthProvider::Google, &no_flag),
            Err(AppError::Unauthorized(_))
        ));
    }
}
