use anyhow::Result;

use crate::services::auth;
use crate::session::{Notifier, SessionContext};

pub fn run<N: Notifier>(ctx: &SessionContext<N>) -> Result<()> {
    let was_signed_in = auth::is_authenticated(ctx);
    auth::logout(ctx);
    if was_signed_in {
        println!("Logged out");
    } else {
        println!("Not logged in.");
    }
    Ok(())
}
