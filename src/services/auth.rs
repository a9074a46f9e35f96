use serde_json::json;

use crate::api::{self, Endpoint};
use crate::models::{LoginRequest, LoginResponse, Site};
use crate::session::{Notifier, SessionContext};

/// Exchange credentials for a token. Nothing is persisted here; the login
/// form decides what to keep.
pub async fn login<N: Notifier>(
    ctx: &SessionContext<N>,
    site: Site,
    username: &str,
    password: &str,
) -> api::Result<LoginResponse> {
    let body = json!(LoginRequest {
        username,
        password,
        website: site,
    });
    ctx.intercept(ctx.api().post(Endpoint::Login, body, None).await)
}

/// Local only, there is no logout endpoint.
pub fn logout<N: Notifier>(ctx: &SessionContext<N>) {
    ctx.end();
}

pub fn is_authenticated<N: Notifier>(ctx: &SessionContext<N>) -> bool {
    ctx.is_authenticated()
}

pub fn stored_token<N: Notifier>(ctx: &SessionContext<N>) -> Option<String> {
    ctx.stored_token()
}

pub fn stored_site<N: Notifier>(ctx: &SessionContext<N>) -> Option<Site> {
    ctx.stored_site()
}
