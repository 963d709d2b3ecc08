use crate::auth::AuthResponse;
use crate::client::storage::Storage;
use crate::db::User;
use crate::error::Result;

/// Session storage key of the cached user.
pub const USER_KEY: &str = "user";
/// Session storage key of the bearer token.
pub const TOKEN_KEY: &str = "token";

/// The auth endpoints a session talks to.
#[allow(async_fn_in_trait)]
pub trait AuthBackend {
    /// `POST /auth/login`.
    async fn login(&self, email: &str, password: &str) -> Result<AuthResponse>;
    /// `POST /auth/signup`.
    async fn signup(&self, email: &str, password: &str, name: &str) -> Result<AuthResponse>;
    /// `POST /auth/logout`.
    async fn logout(&self, token: &str) -> Result<()>;
    /// `GET /auth/me`.
    async fn current_user(&self, token: &str) -> Result<User>;
}

/// Signed-in state, mirrored into session storage.
pub struct AuthSession<B> {
    backend: B,
    storage: Storage,
    user: Option<User>,
    token: Option<String>,
}

impl<B: AuthBackend> AuthSession<B> {
    /// Load whatever user and token the storage holds. Nothing is verified
    /// until [`restore`](Self::restore) runs.
    pub fn new(backend: B, storage: Storage) -> Self {
        let user = storage.get::<User>(USER_KEY);
        let token = storage.get::<String>(TOKEN_KEY);
        Self {
            backend,
            storage,
            user,
            token,
        }
    }

    /// The backend in use.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Signed-in user.
    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    /// Bearer token.
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Whether both a user and a token are held.
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some() && self.token.is_some()
    }

    fn store(&mut self, auth: AuthResponse) -> Result<&User> {
        self.storage.set(USER_KEY, &auth.user)?;
        self.storage.set(TOKEN_KEY, &auth.token)?;
        self.token = Some(auth.token);
        Ok(&*self.user.insert(auth.user))
    }

    fn clear(&mut self) -> Result<()> {
        self.user = None;
        self.token = None;
        self.storage.remove(&[USER_KEY, TOKEN_KEY])
    }

    /// Sign in. Backend errors are returned unchanged and leave the session as it was.
    pub async fn login(&mut self, email: &str, password: &str) -> Result<&User> {
        let auth = self.backend.login(email, password).await?;
        tracing::info!(user_id = %auth.user.id, "Logged in");
        self.store(auth)
    }

    /// Create an account and sign in.
    pub async fn signup(&mut self, email: &str, password: &str, name: &str) -> Result<&User> {
        let auth = self.backend.signup(email, password, name).await?;
        tracing::info!(user_id = %auth.user.id, "Signed up");
        self.store(auth)
    }

    /// Store the user and token an OAuth callback returned.
    pub fn complete_oauth(&mut self, auth: AuthResponse) -> Result<&User> {
        self.store(auth)
    }

    /// Sign out. The remote call is best effort; local state is always cleared.
    pub async fn logout(&mut self) -> Result<()> {
        if let Some(token) = self.token.as_deref() {
            if let Err(e) = self.backend.logout(token).await {
                tracing::warn!(error = %e, "Remote logout failed");
            }
        }
        self.clear()
    }

    /// Check the stored token against the backend.
    ///
    /// A rejected token clears the session. Any other failure keeps the
    /// cached user so the app still works while the backend is down.
    pub async fn restore(&mut self) -> Result<Option<&User>> {
        let Some(token) = self.token.clone() else {
            if self.user.is_some() {
                self.clear()?;
            }
            return Ok(None);
        };

        match self.backend.current_user(&token).await {
            Ok(user) => {
                self.storage.set(USER_KEY, &user)?;
                self.user = Some(user);
            }
            Err(e) if e.is_unauthorized() => {
                tracing::info!("Stored token rejected, clearing session");
                self.clear()?;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Could not verify session, keeping cached user");
            }
        }
        Ok(self.user.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use chrono::Utc;
    use std::cell::Cell;

    #[derive(Default)]
    struct FakeBackend {
        me: Option<fn() -> Result<User>>,
        logout_fails: bool,
        logout_calls: Cell<u32>,
    }

    fn user() -> User {
        User {
            id: "u1".to_string(),
            email: "reader@example.com".to_string(),
            name: "Reader".to_string(),
            password_hash: String::new(),
            provider: "local".to_string(),
            created_at: Utc::now(),
            last_login: None,
        }
    }

    impl AuthBackend for FakeBackend {
        async fn login(&self, email: &str, password: &str) -> Result<AuthResponse> {
            if email == "reader@example.com" && password == "secret1" {
                Ok(AuthResponse {
                    user: user(),
                    token: "tok".to_string(),
                })
            } else {
                Err(AppError::Unauthorized("Invalid email or password".to_string()))
            }
        }

        async fn signup(&self, email: &str, _password: &str, name: &str) -> Result<AuthResponse> {
            let mut user = user();
            user.email = email.to_string();
            user.name = name.to_string();
            Ok(AuthResponse {
                user,
                token: "new".to_string(),
            })
        }

        async fn logout(&self, _token: &str) -> Result<()> {
            self.logout_calls.set(self.logout_calls.get() + 1);
            if self.logout_fails {
                Err(AppError::Network("offline".to_string()))
            } else {
                Ok(())
            }
        }

        async fn current_user(&self, _token: &str) -> Result<User> {
            match self.me {
                Some(f) => f(),
                None => Ok(user()),
            }
        }
    }

    fn storage(dir: &tempfile::TempDir) -> Storage {
        Storage::open(dir.path().join("session.json")).unwrap()
    }

    fn signed_in(backend: FakeBackend, dir: &tempfile::TempDir) -> AuthSession<FakeBackend> {
        let mut storage = storage(dir);
        storage.set(USER_KEY, &user()).unwrap();
        storage.set(TOKEN_KEY, "tok").unwrap();
        AuthSession::new(backend, storage)
    }

    #[tokio::test]
    async fn test_login_stores_user_and_token() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = AuthSession::new(FakeBackend::default(), storage(&dir));
        assert!(!session.is_authenticated());

        let user = session.login("reader@example.com", "secret1").await.unwrap();
        assert_eq!(user.name, "Reader");
        assert!(session.is_authenticated());

        let stored = Storage::open(dir.path().join("session.json")).unwrap();
        assert_eq!(stored.get::<String>(TOKEN_KEY).as_deref(), Some("tok"));
        assert_eq!(stored.get::<User>(USER_KEY).unwrap().id, "u1");
    }

    #[tokio::test]
    async fn test_login_failure_surfaces_message() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = AuthSession::new(FakeBackend::default(), storage(&dir));

        let err = session.login("reader@example.com", "wrong").await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid email or password");
        assert!(!session.is_authenticated());
    }

    #[tokio::test]
    async fn test_logout_clears_even_when_remote_fails() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FakeBackend {
            logout_fails: true,
            ..Default::default()
        };
        let mut session = signed_in(backend, &dir);
        assert!(session.is_authenticated());

        session.logout().await.unwrap();
        assert!(!session.is_authenticated());
        assert_eq!(session.backend().logout_calls.get(), 1);

        let stored = Storage::open(dir.path().join("session.json")).unwrap();
        assert!(!stored.contains(USER_KEY));
        assert!(!stored.contains(TOKEN_KEY));
    }

    #[tokio::test]
    async fn test_restore_with_expired_token_clears_session() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FakeBackend {
            me: Some(|| Err(AppError::Unauthorized("Session expired".to_string()))),
            ..Default::default()
        };
        let mut session = signed_in(backend, &dir);

        assert!(session.restore().await.unwrap().is_none());
        assert!(!session.is_authenticated());
        assert!(session.token().is_none());
    }

    #[tokio::test]
    async fn test_restore_keeps_cached_user_when_offline() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FakeBackend {
            me: Some(|| Err(AppError::Network("offline".to_string()))),
            ..Default::default()
        };
        let mut session = signed_in(backend, &dir);

        let user = session.restore().await.unwrap();
        assert_eq!(user.map(|u| u.id.as_str()), Some("u1"));
        assert!(session.is_authenticated());
    }

    #[tokio::test]
    async fn test_restore_without_token_drops_stale_user() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = storage(&dir);
        storage.set(USER_KEY, &user()).unwrap();
        let mut session = AuthSession::new(FakeBackend::default(), storage);

        assert!(session.restore().await.unwrap().is_none());
        assert!(session.user().is_none());
    }

    #[tokio::test]
    async fn test_complete_oauth_and_signup() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = AuthSession::new(FakeBackend::default(), storage(&dir));

        session
            .complete_oauth(AuthResponse {
                user: user(),
                token: "oauth".to_string(),
            })
            .unwrap();
        assert_eq!(session.token(), Some("oauth"));

        let user = session.signup("new@example.com", "secret1", "New").await.unwrap();
        assert_eq!(user.email, "new@example.com");
        assert_eq!(session.token(), Some("new"));
    }
}
