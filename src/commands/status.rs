use anyhow::Result;

use crate::session::{Notifier, SessionContext};

pub fn run<N: Notifier>(ctx: &SessionContext<N>) -> Result<()> {
    println!("Backend: {}", ctx.api().base_url());

    let session = match ctx.session()? {
        Some(s) => s,
        None => {
            println!("Status:  Not logged in");
            return Ok(());
        }
    };

    println!("Status:  Authenticated");
    println!("Website: {}", session.site.as_str().to_uppercase());
    println!("Token:   {}", session.token);
    match ctx.store().cached_deals(session.site)? {
        Some(deals) => println!("Cached deals: {}", deals.len()),
        None => println!("Cached deals: none"),
    }

    Ok(())
}
