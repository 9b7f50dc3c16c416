//! Login and registration, as two tabs of one screen.

use std::rc::Rc;

use crate::context::Services;
use crate::error::{Error, Result};
use crate::forms::{FarmerForm, LoginForm, ValidationErrors};
use crate::pages::{Notice, Route};
use crate::session::{AuthState, Session, SessionStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tab {
    #[default]
    Login,
    Register,
}

#[derive(Debug)]
pub struct LoginPage {
    session: Rc<SessionStore>,
    pub tab: Tab,
    pub login: LoginForm,
    pub register: FarmerForm,
    errors: ValidationErrors,
    loading: bool,
    error: Option<String>,
}

impl LoginPage {
    pub fn new(services: &Services) -> Self {
        Self {
            session: services.session.clone(),
            tab: Tab::default(),
            login: LoginForm::default(),
            register: FarmerForm::default(),
            errors: ValidationErrors::new(),
            loading: false,
            error: None,
        }
    }

    /// Where to go instead of rendering the form, if anywhere.
    pub fn open(&self) -> Option<Route> {
        match self.session.state() {
            AuthState::Authenticated(_) => Some(Route::Dashboard),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// The banner under the form after a failed attempt.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn notice(&self) -> Option<Notice> {
        self.error.as_deref().map(Notice::error)
    }

    pub fn errors(&self) -> &ValidationErrors {
        &self.errors
    }

    pub fn select(&mut self, tab: Tab) {
        self.tab = tab;
        self.error = None;
        self.errors = ValidationErrors::new();
    }

    /// Log in with the login tab's form; on success the caller navigates to
    /// the dashboard.
    pub fn submit_login(&mut self) -> Result<Session> {
        self.error = None;
        let request = self.login.validate().map_err(|errors| {
            self.errors = errors.clone();
            Error::Validation(errors)
        })?;
        self.errors = ValidationErrors::new();

        self.loading = true;
        let result = self.session.login(&request.email, &request.password);
        self.loading = false;
        if result.is_err() {
            self.error = Some("Invalid credentials. Please try again.".to_string());
        }
        result
    }

    /// Register a farmer account from the register tab. Empty optional fields
    /// are left out of the request.
    pub fn submit_register(&mut self) -> Result<Session> {
        self.error = None;
        let payload = self.register.validate_create().map_err(|errors| {
            self.errors = errors.clone();
            Error::Validation(errors)
        })?;
        self.errors = ValidationErrors::new();

        self.loading = true;
        let result = self.session.register(&payload);
        self.loading = false;
        if let Err(err) = &result {
            self.error = Some(match err {
                Error::Registration { message, .. } if !message.is_empty() => {
                    format!("Registration failed: {message}")
                }
                _ => "Registration failed. Please try again.".to_string(),
            });
        }
        result
    }
}
