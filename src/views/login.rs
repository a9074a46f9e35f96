use tracing::{error, info};

use crate::api::ApiError;
use crate::models::{Session, Site};
use crate::services::auth;
use crate::session::{Notifier, Route, SessionContext};
use crate::validators::is_valid_email;
use crate::views::format;

pub const MSG_FILL_ALL_FIELDS: &str = "Please fill in all fields.";
pub const MSG_INVALID_EMAIL: &str = "Invalid email address.";
pub const MSG_LOGIN_FAILED: &str = "Login failed";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginState {
    Idle { error: Option<String> },
    Submitting,
    Success,
    AlreadyAuthenticated,
}

pub struct LoginForm<'a, N: Notifier> {
    ctx: &'a SessionContext<N>,
    pub site: Site,
    pub username: String,
    pub password: String,
    state: LoginState,
}

impl<'a, N: Notifier> LoginForm<'a, N> {
    pub fn new(ctx: &'a SessionContext<N>) -> Self {
        Self {
            ctx,
            site: Site::default(),
            username: String::new(),
            password: String::new(),
            state: LoginState::Idle { error: None },
        }
    }

    pub fn state(&self) -> &LoginState {
        &self.state
    }

    pub fn error(&self) -> Option<&str> {
        match &self.state {
            LoginState::Idle { error } => error.as_deref(),
            _ => None,
        }
    }

    /// A stored token skips the form entirely.
    pub fn mount(&mut self) -> Option<Route> {
        if self.ctx.is_authenticated() {
            self.state = LoginState::AlreadyAuthenticated;
            return Some(Route::Home);
        }
        None
    }

    /// Validate, call the backend, and persist the session on success.
    /// Returns where to go next, or `None` to stay on the form.
    pub async fn submit(&mut self) -> Option<Route> {
        if self.username.is_empty() || self.password.is_empty() {
            return self.fail(MSG_FILL_ALL_FIELDS);
        }
        if !is_valid_email(&self.username) {
            return self.fail(MSG_INVALID_EMAIL);
        }

        self.state = LoginState::Submitting;
        let result = auth::login(self.ctx, self.site, &self.username, &self.password).await;
        let response = match result {
            Ok(response) => response,
            Err(e) => {
                let message = login_error_message(&e);
                return self.fail(&message);
            }
        };

        let session = Session {
            token: response.token,
            site: self.site,
        };
        if let Err(e) = self.ctx.begin(&session) {
            error!(error = %e, "failed to persist session");
            return self.fail(MSG_LOGIN_FAILED);
        }

        info!(site = %self.site, "login succeeded");
        self.password.clear();
        self.state = LoginState::Success;
        Some(Route::Home)
    }

    fn fail(&mut self, message: &str) -> Option<Route> {
        self.state = LoginState::Idle {
            error: Some(message.to_string()),
        };
        None
    }

    pub fn render(&self) -> String {
        let mut lines = vec!["Altius Capital Login".to_string(), String::new()];
        for site in Site::ALL {
            let marker = if site == self.site { "(*)" } else { "( )" };
            lines.push(format!("  {} {} [{}]", marker, site.label(), site));
        }
        lines.push(format!("  Email:    {}", self.username));
        lines.push(format!("  Password: {}", "*".repeat(self.password.chars().count())));
        match &self.state {
            LoginState::Idle { error: Some(e) } => {
                lines.push(String::new());
                lines.push(format!("  {}", e));
            }
            LoginState::Submitting => {
                lines.push(String::new());
                lines.push("  Signing in...".to_string());
            }
            _ => {}
        }
        format::block(&lines)
    }
}

/// The server's plain-text `detail`, if it sent one.
pub fn login_error_message(err: &ApiError) -> String {
    match err {
        ApiError::Status {
            detail: Some(detail),
            ..
        } if !detail.is_empty() => detail.clone(),
        _ => MSG_LOGIN_FAILED.to_string(),
    }
}
