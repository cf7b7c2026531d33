use chrono::Utc;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use validator::Validate;

use crate::backend::Backend;
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::models::{AuthSession, Credentials, Registration, User};
use crate::storage::{load_json, save_json, LocalStore, SESSION_KEY};

/// Mirrors the backend session locally as a [`User`].
///
/// The session is persisted under `phk_user_session` so it can be resumed
/// on the next start; the profile row is re-read every time a session is
/// established.
pub struct SessionManager {
    backend: Arc<dyn Backend>,
    store: Arc<dyn LocalStore>,
    events: EventSender,
    session: Option<AuthSession>,
    user: Option<User>,
}

impl SessionManager {
    pub fn new(backend: Arc<dyn Backend>, store: Arc<dyn LocalStore>, events: EventSender) -> Self {
        Self {
            backend,
            store,
            events,
            session: None,
            user: None,
        }
    }

    pub fn current_user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn session(&self) -> Option<&AuthSession> {
        self.session.as_ref()
    }

    pub fn is_signed_in(&self) -> bool {
        self.user.is_some()
    }

    pub fn is_admin(&self) -> bool {
        self.user.as_ref().map_or(false, User::is_admin)
    }

    #[instrument(skip(self, credentials), fields(email = %credentials.email))]
    pub async fn sign_in(&mut self, credentials: &Credentials) -> Result<&User, ServiceError> {
        credentials.validate()?;
        let session = self
            .backend
            .sign_in(credentials.email.trim(), &credentials.password)
            .await?;
        self.establish(session).await
    }

    #[instrument(skip(self, registration), fields(email = %registration.email))]
    pub async fn sign_up(&mut self, registration: &Registration) -> Result<&User, ServiceError> {
        registration.validate()?;
        let session = self.backend.sign_up(registration).await?;
        self.establish(session).await
    }

    /// Clears the local user whatever the backend answers.
    #[instrument(skip(self))]
    pub async fn sign_out(&mut self) -> Result<(), ServiceError> {
        let session = self.session.take();
        let user = self.user.take();

        if let Some(session) = &session {
            if let Err(err) = self.backend.sign_out(session).await {
                warn!(error = %err, "Backend sign-out failed; local session cleared anyway");
            }
        }
        self.store.remove(SESSION_KEY)?;

        if let Some(user) = user {
            info!(user_id = %user.id, "Signed out");
            self.events.send_or_log(Event::SignedOut {
                user_id: user.id,
                at: Utc::now(),
            });
        }
        Ok(())
    }

    /// Resumes the persisted session, if any and still valid.
    ///
    /// A stale or rejected session is discarded and `Ok(None)` is returned;
    /// only local storage failures are errors.
    #[instrument(skip(self))]
    pub async fn restore(&mut self) -> Result<Option<&User>, ServiceError> {
        let Some(saved) = load_json::<AuthSession>(self.store.as_ref(), SESSION_KEY)? else {
            return Ok(None);
        };
        if saved.is_expired() {
            info!(user_id = %saved.user_id, "Persisted session expired");
            self.store.remove(SESSION_KEY)?;
            return Ok(None);
        }

        match self.backend.resume(&saved).await {
            Ok(session) => self.establish(session).await.map(Some),
            Err(err) => {
                warn!(error = %err, "Could not resume persisted session");
                self.store.remove(SESSION_KEY)?;
                Ok(None)
            }
        }
    }

    async fn establish(&mut self, session: AuthSession) -> Result<&User, ServiceError> {
        let profile = match self.backend.fetch_profile(session.user_id).await {
            Ok(profile) => profile,
            Err(err) => {
                warn!(user_id = %session.user_id, error = %err, "Profile lookup failed; continuing as client");
                None
            }
        };
        let user = User::from_session(&session, profile);
        save_json(self.store.as_ref(), SESSION_KEY, &session)?;

        info!(user_id = %user.id, role = %user.role, "Signed in");
        self.events.send_or_log(Event::SignedIn {
            user_id: user.id,
            email: user.email.clone(),
            at: Utc::now(),
        });

        self.session = Some(session);
        Ok(self.user.insert(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{AuthProvider, BackendOp, InMemoryBackend};
    use crate::models::Role;
    use crate::storage::MemoryStore;

    struct Fixture {
        backend: Arc<InMemoryBackend>,
        store: Arc<MemoryStore>,
        events: EventSender,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                backend: Arc::new(InMemoryBackend::new()),
                store: Arc::new(MemoryStore::new()),
                events: EventSender::default(),
            }
        }

        fn manager(&self) -> SessionManager {
            SessionManager::new(self.backend.clone(), self.store.clone(), self.events.clone())
        }
    }

    fn registration() -> Registration {
        Registration {
            email: "ana@example.com".into(),
            password: "secret123".into(),
            first_name: Some("Ana".into()),
            last_name: None,
        }
    }

    #[tokio::test]
    async fn sign_up_persists_the_session_and_publishes() {
        let fx = Fixture::new();
        let mut rx = fx.events.subscribe();
        let mut sessions = fx.manager();

        let user = sessions.sign_up(&registration()).await.unwrap();
        assert_eq!(user.display_name(), "Ana");
        assert_eq!(user.role, Role::Client);
        assert!(fx.store.get(SESSION_KEY).unwrap().is_some());
        assert!(matches!(rx.recv().await.unwrap(), Event::SignedIn { .. }));
    }

    #[tokio::test]
    async fn invalid_credentials_never_reach_the_backend() {
        let fx = Fixture::new();
        let mut sessions = fx.manager();
        let err = sessions
            .sign_in(&Credentials {
                email: "not-an-email".into(),
                password: "x".into(),
            })
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::ValidationError(_)));
        assert_eq!(fx.backend.calls(BackendOp::SignIn), 0);
    }

    #[tokio::test]
    async fn restore_resumes_a_persisted_session() {
        let fx = Fixture::new();
        fx.manager().sign_up(&registration()).await.unwrap();

        let mut fresh = fx.manager();
        let user = fresh.restore().await.unwrap().unwrap();
        assert_eq!(user.email, "ana@example.com");
    }

    #[tokio::test]
    async fn rejected_sessions_are_discarded() {
        let fx = Fixture::new();
        let mut first = fx.manager();
        first.sign_up(&registration()).await.unwrap();
        let session = first.session().cloned().unwrap();
        fx.backend.sign_out(&session).await.unwrap();

        let mut fresh = fx.manager();
        assert!(fresh.restore().await.unwrap().is_none());
        assert!(fx.store.get(SESSION_KEY).unwrap().is_none());
    }

    #[tokio::test]
    async fn sign_out_clears_even_when_the_backend_fails() {
        let fx = Fixture::new();
        let mut sessions = fx.manager();
        sessions.sign_up(&registration()).await.unwrap();
        fx.backend.fail_on(BackendOp::SignOut, "network down");

        sessions.sign_out().await.unwrap();
        assert!(sessions.current_user().is_none());
        assert!(fx.store.get(SESSION_KEY).unwrap().is_none());
    }

    #[tokio::test]
    async fn admins_are_recognised_from_their_profile() {
        let fx = Fixture::new();
        fx.backend.seed_admin("admin@phk.studio", "phkstudio2025").unwrap();
        let mut sessions = fx.manager();
        sessions
            .sign_in(&Credentials {
                email: "admin@phk.studio".into(),
                password: "phkstudio2025".into(),
            })
            .await
            .unwrap();
        assert!(sessions.is_admin());
    }
}
