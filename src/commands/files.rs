use anyhow::{bail, Result};
use std::path::Path;

use crate::commands::LOGIN_REQUIRED;
use crate::services::deals;
use crate::session::{Notifier, Route, SessionContext};
use crate::views::home::{FilesState, HomePage};

/// Show one deal's files, optionally saving all of them into `download`.
pub async fn run<N: Notifier>(
    ctx: &SessionContext<N>,
    deal_id: i64,
    download: Option<&Path>,
) -> Result<()> {
    let mut page = HomePage::new(ctx);
    if page.mount().await == Route::Login {
        bail!(LOGIN_REQUIRED);
    }
    if page.open_deal(deal_id).await? == Route::Login {
        bail!(LOGIN_REQUIRED);
    }

    if let Some(modal) = page.render_modal() {
        print!("{}", modal);
    }

    let dir = match download {
        Some(d) => d,
        None => return Ok(()),
    };
    let files = match page.modal().map(|m| &m.files) {
        Some(FilesState::Ready(files)) => files,
        _ => return Ok(()),
    };
    for file in files {
        let path = deals::download_file(ctx, file, dir).await?;
        println!("Saved {}", path.display());
    }

    Ok(())
}
