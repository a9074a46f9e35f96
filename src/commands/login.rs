use anyhow::{bail, Context, Result};
use std::io::{self, Write};

use crate::models::Site;
use crate::session::{Notifier, SessionContext};
use crate::views::login::LoginForm;

/// Sign in. Missing email or password are asked for on the terminal.
pub async fn run<N: Notifier>(
    ctx: &SessionContext<N>,
    site: Site,
    email: Option<String>,
    password: Option<String>,
) -> Result<()> {
    let mut form = LoginForm::new(ctx);
    if form.mount().is_some() {
        let site = ctx.stored_site().unwrap_or_default();
        println!("Already logged in to {}. Run 'dealdesk logout' first to switch.", site.label());
        return Ok(());
    }

    form.site = site;
    form.username = match email {
        Some(e) => e,
        None => prompt_email()?,
    };
    form.password = match password {
        Some(p) => p,
        None => rpassword::prompt_password("Password: ").context("Failed to read password")?,
    };

    if form.submit().await.is_none() {
        let message = form.error().unwrap_or("Login failed").to_string();
        bail!(message);
    }

    println!("Logged in to {}", site.label());
    Ok(())
}

fn prompt_email() -> Result<String> {
    print!("Email: ");
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin()
        .read_line(&mut input)
        .context("Failed to read email")?;
    Ok(input.trim().to_string())
}
