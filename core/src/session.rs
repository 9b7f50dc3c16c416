//! Who is logged in.
//!
//! # Design
//! `SessionStore` is one owned object shared as `Rc<SessionStore>`: pages
//! read it, the API client pulls the bearer token from it through
//! [`Credentials`], and only login, registration, restore, logout and
//! invalidation write it. Every write bumps a generation counter and notifies
//! subscribers with the new [`AuthState`].
//!
//! The states are `Anonymous`, `Authenticating` and `Authenticated`. A store
//! created over a persisted, unexpired token starts in `Authenticating` so
//! that nothing renders "logged out" before `restore` has had its say.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use crate::client::{ApiClient, ApiRequest, Credentials};
use crate::error::{message_from_body, Error, Result};
use crate::token_store::{PersistedToken, TokenStore};
use crate::types::{AuthResponse, LoginRequest, RegisterRequest, Role, UserProfile};

pub const LOGIN_PATH: &str = "/auth/login";
pub const REGISTER_PATH: &str = "/auth/register";
pub const PROFILE_PATH: &str = "/auth/profile";

/// The authenticated identity.
#[derive(Clone, PartialEq)]
pub struct Session {
    pub user_id: String,
    pub email: String,
    pub role: Role,
    /// Set for farmer accounts: the id to use with `/farmers/{id}`.
    pub farmer_profile_id: Option<String>,
    /// Farmer first name, for greetings.
    pub display_name: Option<String>,
    pub bearer_token: String,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    fn from_profile(profile: UserProfile, token: PersistedToken) -> Self {
        let (farmer_profile_id, display_name) = match profile.farmer {
            Some(farmer) => (Some(farmer.id), Some(farmer.first_name)),
            None => (None, None),
        };
        Self {
            user_id: profile.id,
            email: profile.email,
            role: profile.role,
            farmer_profile_id,
            display_name,
            bearer_token: token.token,
            expires_at: token.expires_at,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("user_id", &self.user_id)
            .field("email", &self.email)
            .field("role", &self.role)
            .field("farmer_profile_id", &self.farmer_profile_id)
            .field("bearer_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AuthState {
    Anonymous,
    /// Credentials are being checked; dependents should show a loading state.
    Authenticating,
    Authenticated(Session),
}

impl AuthState {
    pub fn label(&self) -> &'static str {
        match self {
            AuthState::Anonymous => "anonymous",
            AuthState::Authenticating => "authenticating",
            AuthState::Authenticated(_) => "authenticated",
        }
    }
}

/// Snapshot of the store generation, taken before a fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTicket {
    generation: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Rc<dyn Fn(&AuthState)>;

pub struct SessionStore {
    api: ApiClient,
    tokens: Box<dyn TokenStore>,
    ttl: Duration,
    state: RefCell<AuthState>,
    generation: Cell<u64>,
    listeners: RefCell<Vec<(SubscriptionId, Listener)>>,
    next_listener: Cell<u64>,
}

impl fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionStore")
            .field("state", &self.state.borrow().label())
            .field("generation", &self.generation.get())
            .finish()
    }
}

impl SessionStore {
    /// `api` must be an anonymous client; the store attaches tokens itself.
    /// `ttl` applies when the server does not state a token lifetime.
    pub fn new(api: ApiClient, tokens: Box<dyn TokenStore>, ttl: Duration) -> Rc<Self> {
        let initial = match tokens.load() {
            Ok(Some(token)) if !token.is_expired(Utc::now()) => AuthState::Authenticating,
            Ok(_) => AuthState::Anonymous,
            Err(e) => {
                warn!(error = %e, "ignoring unreadable persisted token");
                AuthState::Anonymous
            }
        };
        Rc::new(Self {
            api,
            tokens,
            ttl,
            state: RefCell::new(initial),
            generation: Cell::new(0),
            listeners: RefCell::new(Vec::new()),
            next_listener: Cell::new(0),
        })
    }

    pub fn state(&self) -> AuthState {
        self.state.borrow().clone()
    }

    pub fn session(&self) -> Option<Session> {
        match &*self.state.borrow() {
            AuthState::Authenticated(session) => Some(session.clone()),
            _ => None,
        }
    }

    /// The session, or `Error::NotAuthenticated`.
    pub fn require(&self) -> Result<Session> {
        self.session().ok_or(Error::NotAuthenticated)
    }

    pub fn is_loading(&self) -> bool {
        matches!(*self.state.borrow(), AuthState::Authenticating)
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(*self.state.borrow(), AuthState::Authenticated(_))
    }

    pub fn role(&self) -> Option<Role> {
        self.session().map(|s| s.role)
    }

    /// Exchange credentials for a session. Any non-2xx answer from the login
    /// endpoint is `Error::Auth`; nothing is persisted on failure.
    pub fn login(&self, email: &str, password: &str) -> Result<Session> {
        self.discard_current("login");
        self.transition(AuthState::Authenticating);

        let request = ApiRequest::post(LOGIN_PATH).json(&LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        });
        let outcome = request.and_then(|r| self.api.send::<AuthResponse>(r));
        match outcome {
            Ok(auth) => Ok(self.establish(auth)),
            Err(err) => {
                self.transition(AuthState::Anonymous);
                match err {
                    Error::Api { status, body, .. } => {
                        warn!(status, email, "login rejected");
                        Err(Error::Auth(
                            message_from_body(&body).unwrap_or_else(|| "invalid credentials".to_string()),
                        ))
                    }
                    other => Err(other),
                }
            }
        }
    }

    /// Create a farmer account and log into it. Empty optional fields are not
    /// sent (see [`crate::types::CreateFarmer`]).
    pub fn register(&self, payload: &RegisterRequest) -> Result<Session> {
        self.discard_current("registration");
        self.transition(AuthState::Authenticating);

        let outcome = ApiRequest::post(REGISTER_PATH)
            .json(payload)
            .and_then(|r| self.api.send::<AuthResponse>(r));
        match outcome {
            Ok(auth) => Ok(self.establish(auth)),
            Err(err) => {
                self.transition(AuthState::Anonymous);
                match err {
                    Error::Api { status, status_text, body } => {
                        warn!(status, email = %payload.email, "registration rejected");
                        let message = message_from_body(&body).unwrap_or(status_text);
                        Err(Error::Registration { status, message })
                    }
                    other => Err(other),
                }
            }
        }
    }

    /// Forget the session and the persisted token. Never fails.
    pub fn logout(&self) {
        if let Err(e) = self.tokens.clear() {
            warn!(error = %e, "failed to clear persisted token");
        }
        self.transition(AuthState::Anonymous);
    }

    /// Resolve a persisted token into a session.
    ///
    /// Expired tokens are dropped without a request. A 401/403 from the
    /// profile endpoint drops the token; any other failure keeps it for a
    /// later attempt and is returned.
    pub fn restore(&self) -> Result<AuthState> {
        if self.is_authenticated() {
            return Ok(self.state());
        }

        let persisted = match self.tokens.load() {
            Ok(Some(token)) => token,
            Ok(None) => {
                self.settle_anonymous();
                return Ok(AuthState::Anonymous);
            }
            Err(e) => {
                warn!(error = %e, "discarding unreadable persisted token");
                self.clear_tokens();
                self.settle_anonymous();
                return Ok(AuthState::Anonymous);
            }
        };

        if persisted.is_expired(Utc::now()) {
            info!(expired_at = %persisted.expires_at, "persisted token expired");
            self.clear_tokens();
            self.settle_anonymous();
            return Ok(AuthState::Anonymous);
        }

        if !self.is_loading() {
            self.transition(AuthState::Authenticating);
        }
        let request = ApiRequest::get(PROFILE_PATH).bearer(persisted.token.as_str());
        match self.api.send::<UserProfile>(request) {
            Ok(profile) => {
                let session = Session::from_profile(profile, persisted);
                info!(user = %session.email, role = %session.role, "session restored");
                self.transition(AuthState::Authenticated(session));
                Ok(self.state())
            }
            Err(e) if e.is_auth_failure() => {
                info!(status = ?e.status(), "persisted token rejected");
                self.clear_tokens();
                self.transition(AuthState::Anonymous);
                Ok(AuthState::Anonymous)
            }
            Err(e) => {
                warn!(error = %e, "could not restore session");
                self.transition(AuthState::Anonymous);
                Err(e)
            }
        }
    }

    /// Drop an authenticated session after the server or the clock said the
    /// token is no longer good.
    pub fn invalidate(&self, reason: &str) {
        if !self.is_authenticated() {
            debug!(reason, "invalidate ignored, no session");
            return;
        }
        warn!(reason, "session invalidated");
        self.clear_tokens();
        self.transition(AuthState::Anonymous);
    }

    /// Register a callback run after every state change.
    pub fn subscribe(&self, listener: impl Fn(&AuthState) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_listener.get());
        self.next_listener.set(id.0 + 1);
        self.listeners.borrow_mut().push((id, Rc::new(listener)));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    pub fn ticket(&self) -> SessionTicket {
        SessionTicket {
            generation: self.generation.get(),
        }
    }

    /// False once the identity changed after `ticket` was taken.
    pub fn is_current(&self, ticket: &SessionTicket) -> bool {
        ticket.generation == self.generation.get()
    }

    fn establish(&self, auth: AuthResponse) -> Session {
        let lifetime = auth
            .expires_in
            .filter(|secs| *secs > 0)
            .map(Duration::seconds)
            .unwrap_or(self.ttl);
        let persisted = PersistedToken {
            token: auth.token,
            expires_at: Utc::now() + lifetime,
        };
        if let Err(e) = self.tokens.save(&persisted) {
            warn!(error = %e, "failed to persist token, session will not survive restart");
        }
        let session = Session::from_profile(auth.user, persisted);
        info!(user = %session.email, role = %session.role, "logged in");
        self.transition(AuthState::Authenticated(session.clone()));
        session
    }

    fn discard_current(&self, reason: &str) {
        if self.is_authenticated() {
            debug!(reason, "replacing existing session");
            self.clear_tokens();
        }
    }

    fn clear_tokens(&self) {
        if let Err(e) = self.tokens.clear() {
            warn!(error = %e, "failed to clear persisted token");
        }
    }

    fn settle_anonymous(&self) {
        if !matches!(*self.state.borrow(), AuthState::Anonymous) {
            self.transition(AuthState::Anonymous);
        }
    }

    fn transition(&self, next: AuthState) {
        let label = next.label();
        *self.state.borrow_mut() = next;
        self.generation.set(self.generation.get() + 1);
        debug!(state = label, generation = self.generation.get(), "session state changed");

        let state = self.state();
        let listeners: Vec<Listener> = self
            .listeners
            .borrow()
            .iter()
            .map(|(_, listener)| Rc::clone(listener))
            .collect();
        for listener in listeners {
            listener(&state);
        }
    }
}

impl Credentials for SessionStore {
    fn bearer_token(&self) -> Option<String> {
        let (token, expired) = match &*self.state.borrow() {
            AuthState::Authenticated(session) => {
                (session.bearer_token.clone(), session.is_expired(Utc::now()))
            }
            _ => return None,
        };
        if expired {
            self.invalidate("token expired");
            return None;
        }
        Some(token)
    }

    fn on_unauthorized(&self) {
        self.invalidate("server answered 401");
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::token_store::MemoryTokenStore;
    use crate::transport::ScriptedTransport;
    use crate::types::CreateFarmer;

    const ADMIN_LOGIN: &str = r#"{"token":"tok-admin","user":{"id":"u1","email":"admin@agtech.com","role":"ADMIN"}}"#;
    const FARMER_LOGIN: &str = r#"{"token":"tok-john","expiresIn":60,"user":{"id":"u2","email":"john@agtech.com","role":"FARMER","farmer":{"id":"f1","firstName":"John","lastName":"Farmer"}}}"#;

    fn store_with(transport: &ScriptedTransport, tokens: &MemoryTokenStore) -> Rc<SessionStore> {
        let api = ApiClient::new("http://api.test", Rc::new(transport.clone()));
        SessionStore::new(api, Box::new(tokens.clone()), Duration::hours(24))
    }

    fn valid_token(token: &str) -> PersistedToken {
        PersistedToken {
            token: token.to_string(),
            expires_at: Utc::now() + Duration::hours(1),
        }
    }

    #[test]
    fn login_success_stores_token_and_identity() {
        let transport = ScriptedTransport::new();
        transport.push_json(200, ADMIN_LOGIN);
        let tokens = MemoryTokenStore::new();
        let store = store_with(&transport, &tokens);

        let session = store.login("admin@agtech.com", "admin123").unwrap();
        assert_eq!(session.role, Role::Admin);
        assert!(store.is_authenticated());
        assert_eq!(tokens.current().unwrap().token, "tok-admin");

        let sent = transport.last_request().unwrap();
        assert_eq!(sent.url, "http://api.test/auth/login");
        assert!(sent.header("Authorization").is_none());
        let body: serde_json::Value = serde_json::from_str(sent.body.as_deref().unwrap()).unwrap();
        assert_eq!(body, serde_json::json!({"email":"admin@agtech.com","password":"admin123"}));
    }

    #[test]
    fn farmer_login_carries_profile_id_and_server_lifetime() {
        let transport = ScriptedTransport::new();
        transport.push_json(201, FARMER_LOGIN);
        let tokens = MemoryTokenStore::new();
        let store = store_with(&transport, &tokens);

        let session = store.login("john@agtech.com", "farmer123").unwrap();
        assert_eq!(session.farmer_profile_id.as_deref(), Some("f1"));
        assert_eq!(session.display_name.as_deref(), Some("John"));
        let remaining = session.expires_at - Utc::now();
        assert!(remaining <= Duration::seconds(60));
        assert!(remaining > Duration::seconds(50));
    }

    #[test]
    fn invalid_credentials_is_auth_error_and_stays_anonymous() {
        let transport = ScriptedTransport::new();
        transport.push_json(401, r#"{"message":"Invalid credentials"}"#);
        let tokens = MemoryTokenStore::new();
        let store = store_with(&transport, &tokens);

        let err = store.login("admin@agtech.com", "wrong").unwrap_err();
        assert!(matches!(err, Error::Auth(ref m) if m == "Invalid credentials"));
        assert_eq!(store.state(), AuthState::Anonymous);
        assert!(tokens.current().is_none());
    }

    #[test]
    fn network_failure_during_login_is_not_auth_error() {
        let transport = ScriptedTransport::new();
        transport.push_failure("connection refused");
        let store = store_with(&transport, &MemoryTokenStore::new());
        let err = store.login("a@b.co", "x").unwrap_err();
        assert!(matches!(err, Error::Network(_)));
        assert_eq!(store.state(), AuthState::Anonymous);
    }

    #[test]
    fn subscribers_see_authenticating_before_authenticated() {
        let transport = ScriptedTransport::new();
        transport.push_json(200, ADMIN_LOGIN);
        let store = store_with(&transport, &MemoryTokenStore::new());
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        store.subscribe(move |state| sink.borrow_mut().push(state.label()));

        store.login("admin@agtech.com", "admin123").unwrap();
        store.logout();
        assert_eq!(*seen.borrow(), vec!["authenticating", "authenticated", "anonymous"]);
    }

    #[test]
    fn unsubscribe_stops_notifications() {
        let store = store_with(&ScriptedTransport::new(), &MemoryTokenStore::new());
        let count = Rc::new(Cell::new(0));
        let sink = Rc::clone(&count);
        let id = store.subscribe(move |_| sink.set(sink.get() + 1));
        store.logout();
        assert!(store.unsubscribe(id));
        assert!(!store.unsubscribe(id));
        store.logout();
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn logout_always_clears() {
        let tokens = MemoryTokenStore::with_token(valid_token("old"));
        let store = store_with(&ScriptedTransport::new(), &tokens);
        store.logout();
        assert_eq!(store.state(), AuthState::Anonymous);
        assert!(tokens.current().is_none());

        store.logout();
        assert_eq!(store.state(), AuthState::Anonymous);
    }

    #[test]
    fn registration_sends_only_filled_fields_and_logs_in() {
        let transport = ScriptedTransport::new();
        transport.push_json(201, FARMER_LOGIN);
        let store = store_with(&transport, &MemoryTokenStore::new());

        let payload = CreateFarmer {
            phone: Some(String::new()),
            farm_size: Some(0.0),
            ..CreateFarmer::new("john@agtech.com", "farmer123", "John", "Farmer")
        };
        let session = store.register(&payload).unwrap();
        assert_eq!(session.role, Role::Farmer);

        let sent = transport.last_request().unwrap();
        assert_eq!(sent.url, "http://api.test/auth/register");
        let body: serde_json::Value = serde_json::from_str(sent.body.as_deref().unwrap()).unwrap();
        assert_eq!(body.as_object().unwrap().len(), 4);
        assert!(body.get("phone").is_none());
        assert!(body.get("farmSize").is_none());
    }

    #[test]
    fn registration_conflict_is_registration_error() {
        let transport = ScriptedTransport::new();
        transport.push_json(409, r#"{"message":"Email already registered"}"#);
        let store = store_with(&transport, &MemoryTokenStore::new());
        let err = store
            .register(&CreateFarmer::new("john@agtech.com", "farmer123", "John", "Farmer"))
            .unwrap_err();
        match err {
            Error::Registration { status, message } => {
                assert_eq!(status, 409);
                assert_eq!(message, "Email already registered");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!store.is_authenticated());
    }

    #[test]
    fn persisted_token_starts_in_authenticating_and_restores() {
        let transport = ScriptedTransport::new();
        transport.push_json(
            200,
            r#"{"id":"u1","email":"admin@agtech.com","role":"ADMIN"}"#,
        );
        let tokens = MemoryTokenStore::with_token(valid_token("persisted"));
        let store = store_with(&transport, &tokens);
        assert!(store.is_loading());

        let state = store.restore().unwrap();
        assert!(matches!(state, AuthState::Authenticated(ref s) if s.bearer_token == "persisted"));
        let sent = transport.last_request().unwrap();
        assert_eq!(sent.url, "http://api.test/auth/profile");
        assert_eq!(sent.header("Authorization"), Some("Bearer persisted"));
    }

    #[test]
    fn rejected_persisted_token_is_cleared() {
        let transport = ScriptedTransport::new();
        transport.push_json(401, "");
        let tokens = MemoryTokenStore::with_token(valid_token("revoked"));
        let store = store_with(&transport, &tokens);

        assert_eq!(store.restore().unwrap(), AuthState::Anonymous);
        assert!(tokens.current().is_none());
    }

    #[test]
    fn restore_network_failure_keeps_token() {
        let transport = ScriptedTransport::new();
        transport.push_failure("timed out");
        let tokens = MemoryTokenStore::with_token(valid_token("keep"));
        let store = store_with(&transport, &tokens);

        assert!(matches!(store.restore(), Err(Error::Network(_))));
        assert_eq!(store.state(), AuthState::Anonymous);
        assert_eq!(tokens.current().unwrap().token, "keep");
    }

    #[test]
    fn expired_persisted_token_is_cleared_without_request() {
        let transport = ScriptedTransport::new();
        let tokens = MemoryTokenStore::with_token(PersistedToken {
            token: "old".into(),
            expires_at: Utc::now() - Duration::minutes(1),
        });
        let store = store_with(&transport, &tokens);
        assert_eq!(store.state(), AuthState::Anonymous);

        assert_eq!(store.restore().unwrap(), AuthState::Anonymous);
        assert!(tokens.current().is_none());
        assert!(transport.requests().is_empty());
    }

    #[test]
    fn unauthorized_signal_invalidates_and_changes_generation() {
        let transport = ScriptedTransport::new();
        transport.push_json(200, ADMIN_LOGIN);
        let tokens = MemoryTokenStore::new();
        let store = store_with(&transport, &tokens);
        store.login("admin@agtech.com", "admin123").unwrap();

        let ticket = store.ticket();
        assert!(store.is_current(&ticket));
        store.on_unauthorized();
        assert!(!store.is_current(&ticket));
        assert_eq!(store.state(), AuthState::Anonymous);
        assert!(tokens.current().is_none());
    }

    #[test]
    fn expired_session_yields_no_bearer() {
        let transport = ScriptedTransport::new();
        transport.push_json(200, ADMIN_LOGIN);
        let api = ApiClient::new("http://api.test", Rc::new(transport.clone()));
        let store = SessionStore::new(api, Box::new(MemoryTokenStore::new()), Duration::seconds(-1));
        store.login("admin@agtech.com", "admin123").unwrap();

        assert!(store.bearer_token().is_none());
        assert!(!store.is_authenticated());
    }

    #[test]
    fn debug_output_redacts_token() {
        let transport = ScriptedTransport::new();
        transport.push_json(200, ADMIN_LOGIN);
        let store = store_with(&transport, &MemoryTokenStore::new());
        let session = store.login("admin@agtech.com", "admin123").unwrap();
        let printed = format!("{session:?}");
        assert!(!printed.contains("tok-admin"));
        assert!(printed.contains("<redacted>"));
    }
}
