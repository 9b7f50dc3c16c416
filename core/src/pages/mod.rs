//! Per-screen controllers.
//!
//! # Design
//! Every page follows the same lifecycle: check access against the session
//! store (wait while it is authenticating, redirect when anonymous or the role
//! does not match), fetch what the screen needs, then expose a view model.
//! Mutations validate the form, call a resource client with the submitting
//! flag raised, and on success re-fetch the full list. Deletes go through a
//! confirmation step first.
//!
//! A [`SessionTicket`] is taken before each call; a result that comes back
//! after the identity changed is dropped instead of applied.

use std::rc::Rc;

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::forms::ValidationErrors;
use crate::session::{AuthState, Session, SessionStore, SessionTicket};
use crate::types::Role;

pub mod crops;
pub mod dashboard;
pub mod farmers;
pub mod login;
pub mod my_crops;
pub mod profile;

pub use crops::CropsPage;
pub use dashboard::DashboardPage;
pub use farmers::FarmersPage;
pub use login::LoginPage;
pub use my_crops::MyCropsPage;
pub use profile::ProfilePage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Login,
    Dashboard,
    Farmers,
    Crops,
    MyCrops,
    Profile,
}

impl Route {
    pub const ALL: [Route; 6] = [
        Route::Login,
        Route::Dashboard,
        Route::Farmers,
        Route::Crops,
        Route::MyCrops,
        Route::Profile,
    ];

    pub fn path(&self) -> &'static str {
        match self {
            Route::Login => "/login",
            Route::Dashboard => "/dashboard",
            Route::Farmers => "/farmers",
            Route::Crops => "/crops",
            Route::MyCrops => "/my-crops",
            Route::Profile => "/profile",
        }
    }

    pub fn from_path(path: &str) -> Option<Route> {
        Route::ALL.into_iter().find(|r| r.path() == path)
    }

    /// `None` means any authenticated user (or, for Login, anyone).
    pub fn required_role(&self) -> Option<Role> {
        match self {
            Route::Farmers | Route::Crops => Some(Role::Admin),
            Route::MyCrops | Route::Profile => Some(Role::Farmer),
            Route::Login | Route::Dashboard => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavItem {
    pub route: Route,
    pub label: &'static str,
}

const ADMIN_NAV: [NavItem; 3] = [
    NavItem { route: Route::Dashboard, label: "Dashboard" },
    NavItem { route: Route::Farmers, label: "Farmers" },
    NavItem { route: Route::Crops, label: "All Crops" },
];

const FARMER_NAV: [NavItem; 3] = [
    NavItem { route: Route::Dashboard, label: "Dashboard" },
    NavItem { route: Route::Profile, label: "My Profile" },
    NavItem { route: Route::MyCrops, label: "My Crops" },
];

/// Sidebar entries for `role`.
pub fn nav_items(role: Role) -> &'static [NavItem] {
    match role {
        Role::Admin => &ADMIN_NAV,
        Role::Farmer => &FARMER_NAV,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Access {
    /// The session store is still resolving a token.
    Pending,
    Redirect(Route),
    Granted(Session),
}

/// Decide whether a page requiring `required` may render.
pub fn check_access(session: &SessionStore, required: Option<Role>) -> Access {
    match session.state() {
        AuthState::Authenticating => Access::Pending,
        AuthState::Anonymous => Access::Redirect(Route::Login),
        AuthState::Authenticated(s) => match required {
            Some(role) if role != s.role => Access::Redirect(Route::Dashboard),
            _ => Access::Granted(s),
        },
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Phase {
    Loading,
    Ready,
    Redirect(Route),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Error,
}

/// The last user-visible message a page produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Error,
            message: message.into(),
        }
    }
}

/// An open create/edit dialog.
#[derive(Debug, Clone, PartialEq)]
pub struct Editor<F> {
    /// Id of the record being edited; `None` when creating.
    pub editing: Option<String>,
    pub form: F,
    pub errors: ValidationErrors,
}

impl<F> Editor<F> {
    pub fn create(form: F) -> Self {
        Self {
            editing: None,
            form,
            errors: ValidationErrors::new(),
        }
    }

    pub fn edit(id: &str, form: F) -> Self {
        Self {
            editing: Some(id.to_string()),
            form,
            errors: ValidationErrors::new(),
        }
    }

    pub fn is_editing(&self) -> bool {
        self.editing.is_some()
    }
}

/// A delete waiting for the user to confirm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingDelete {
    pub id: String,
    /// What the confirmation prompt names, e.g. the farmer's full name.
    pub label: String,
}

/// State and plumbing shared by every page.
#[derive(Debug)]
pub(crate) struct PageCore {
    session: Rc<SessionStore>,
    phase: Phase,
    submitting: bool,
    notice: Option<Notice>,
}

impl PageCore {
    pub(crate) fn new(session: Rc<SessionStore>) -> Self {
        Self {
            session,
            phase: Phase::Loading,
            submitting: false,
            notice: None,
        }
    }

    pub(crate) fn session(&self) -> &SessionStore {
        &self.session
    }

    pub(crate) fn phase(&self) -> &Phase {
        &self.phase
    }

    pub(crate) fn is_submitting(&self) -> bool {
        self.submitting
    }

    pub(crate) fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub(crate) fn set_notice(&mut self, notice: Notice) {
        self.notice = Some(notice);
    }

    /// Run the access check. Returns the session when the page may load.
    pub(crate) fn enter(&mut self, required: Option<Role>) -> Option<Session> {
        match check_access(&self.session, required) {
            Access::Pending => {
                self.phase = Phase::Loading;
                None
            }
            Access::Redirect(route) => {
                debug!(to = route.path(), "redirecting");
                self.phase = Phase::Redirect(route);
                None
            }
            Access::Granted(session) => Some(session),
        }
    }

    pub(crate) fn ticket(&self) -> SessionTicket {
        self.session.ticket()
    }

    pub(crate) fn mark_ready(&mut self) {
        if self.phase == Phase::Loading {
            self.phase = Phase::Ready;
        }
    }

    /// Run `call` with the submitting flag raised; the flag is lowered again
    /// whatever the outcome.
    pub(crate) fn submitting<T>(&mut self, call: impl FnOnce() -> Result<T>) -> Result<T> {
        self.submitting = true;
        let result = call();
        self.submitting = false;
        result
    }

    /// Apply the outcome of a call made under `ticket`.
    ///
    /// `Ok(None)` means the session changed while the call was in flight and
    /// the value was dropped. Failures become an error notice and are
    /// returned; a loading page becomes ready either way. A failure under a
    /// previous session is still returned, without a notice.
    pub(crate) fn settle<T>(
        &mut self,
        ticket: &SessionTicket,
        result: Result<T>,
        failure: &str,
    ) -> Result<Option<T>> {
        if !self.session.is_current(ticket) {
            debug!("dropping response from a previous session");
            if !self.session.is_authenticated() {
                self.phase = Phase::Redirect(Route::Login);
            }
            return result.map(|_| None);
        }
        match result {
            Ok(value) => Ok(Some(value)),
            Err(err) => {
                warn!(error = %err, "{failure}");
                self.notice = Some(Notice::error(describe(failure, &err)));
                self.mark_ready();
                Err(err)
            }
        }
    }
}

/// Notice text for a failed call: the server's message when it sent one.
fn describe(failure: &str, err: &Error) -> String {
    match err {
        Error::Validation(errors) => format!("{failure}: {errors}"),
        _ => match err.server_message() {
            Some(message) => format!("{failure}: {message}"),
            None => failure.to_string(),
        },
    }
}
