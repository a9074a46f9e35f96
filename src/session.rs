//! The signed-in session and everything that reacts to it going away.

use anyhow::Result;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use tracing::{error, info, warn};

use crate::api::{self, ApiClient, ApiError};
use crate::models::{Session, Site};
use crate::store::Store;

/// Views a user can be on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Login,
    Home,
}

/// Blocking messages shown to the user when a request fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    SessionConflict,
    SessionExpired,
    Network,
    Server { status: u16, message: String },
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::SessionConflict => f.write_str(
                "Your session has been terminated because you logged in from another device. Please log in again.",
            ),
            Notice::SessionExpired => f.write_str("Your session has expired. Please log in again."),
            Notice::Network => f.write_str(
                "Network connection error. Please check your internet connection and try again.",
            ),
            Notice::Server { status, message } => write!(f, "Error {}: {}", status, message),
        }
    }
}

pub trait Notifier {
    fn notify(&self, notice: &Notice);
}

/// Prints notices on stderr.
pub struct TerminalNotifier;

impl Notifier for TerminalNotifier {
    fn notify(&self, notice: &Notice) {
        eprintln!("! {}", notice);
    }
}

/// Keeps every notice, for callers that render them later.
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    notices: Rc<RefCell<Vec<Notice>>>,
}

impl RecordingNotifier {
    pub fn notices(&self) -> Vec<Notice> {
        self.notices.borrow().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: &Notice) {
        self.notices.borrow_mut().push(notice.clone());
    }
}

/// Owns the persisted session: created on login, destroyed on logout or
/// when the backend invalidates it.
pub struct SessionContext<N: Notifier> {
    store: Store,
    api: ApiClient,
    notifier: N,
    redirect: Cell<Option<Route>>,
}

impl<N: Notifier> SessionContext<N> {
    pub fn new(store: Store, api: ApiClient, notifier: N) -> Self {
        Self {
            store,
            api,
            notifier,
            redirect: Cell::new(None),
        }
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    pub fn session(&self) -> Result<Option<Session>> {
        self.store.session()
    }

    pub fn is_authenticated(&self) -> bool {
        self.stored_token().is_some()
    }

    pub fn stored_token(&self) -> Option<String> {
        self.store.token().unwrap_or_else(|e| {
            warn!(error = %e, "failed to read stored token");
            None
        })
    }

    pub fn stored_site(&self) -> Option<Site> {
        self.store.site().unwrap_or_else(|e| {
            warn!(error = %e, "failed to read stored website");
            None
        })
    }

    /// The stored session, or `NotAuthenticated` with a redirect to login.
    pub fn require_session(&self) -> api::Result<Session> {
        match self.session() {
            Ok(Some(session)) => Ok(session),
            Ok(None) => {
                self.redirect.set(Some(Route::Login));
                Err(ApiError::NotAuthenticated)
            }
            Err(e) => {
                error!(error = %e, "failed to read stored session");
                self.redirect.set(Some(Route::Login));
                Err(ApiError::NotAuthenticated)
            }
        }
    }

    pub fn begin(&self, session: &Session) -> Result<()> {
        self.store.save_session(session)?;
        info!(site = %session.site, "signed in");
        Ok(())
    }

    /// Forget the session. Never fails; storage errors are logged.
    pub fn end(&self) {
        if let Err(e) = self.store.clear_session() {
            error!(error = %e, "failed to clear stored session");
        }
    }

    /// Forced navigation requested by a failed call, if any. Reading it
    /// resets it.
    pub fn take_redirect(&self) -> Option<Route> {
        self.redirect.take()
    }

    /// Apply the global reaction to a failed call and hand the error back.
    pub fn intercept<T>(&self, result: api::Result<T>) -> api::Result<T> {
        if let Err(ref err) = result {
            self.on_failure(err);
        }
        result
    }

    fn on_failure(&self, err: &ApiError) {
        match err {
            ApiError::SessionConflict { .. } => {
                warn!("session terminated by another login");
                self.end();
                self.notifier.notify(&Notice::SessionConflict);
                self.redirect.set(Some(Route::Login));
            }
            ApiError::SessionExpired { .. } => {
                warn!("session expired");
                self.end();
                self.notifier.notify(&Notice::SessionExpired);
                self.redirect.set(Some(Route::Login));
            }
            ApiError::Network(e) => {
                error!(error = %e, "network error");
                self.notifier.notify(&Notice::Network);
            }
            ApiError::Status { status, message, .. } => {
                self.notifier.notify(&Notice::Server {
                    status: *status,
                    message: message.clone(),
                });
            }
            ApiError::Decode(_) | ApiError::NotAuthenticated | ApiError::Client(_) => {}
        }
    }
}
