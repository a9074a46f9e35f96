use anyhow::{bail, Result};

use crate::commands::LOGIN_REQUIRED;
use crate::session::{Notifier, Route, SessionContext};
use crate::views::home::{DealsSource, DealsState, HomePage};

pub async fn run<N: Notifier>(ctx: &SessionContext<N>) -> Result<()> {
    let mut page = HomePage::new(ctx);
    if page.mount().await == Route::Login {
        bail!(LOGIN_REQUIRED);
    }

    if let DealsState::Ready {
        source: DealsSource::Cached,
        ..
    } = page.deals_state()
    {
        eprintln!("Showing cached deals; the backend could not be reached.");
    }
    print!("{}", page.render());
    Ok(())
}
