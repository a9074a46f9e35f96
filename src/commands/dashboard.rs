use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use tokio::io::{self, AsyncBufRead, AsyncBufReadExt, BufReader};

use crate::commands::LOGIN_REQUIRED;
use crate::services::deals;
use crate::session::{Notifier, Route, SessionContext};
use crate::views::home::{FilesState, HomePage};

const HELP: &str = "Commands: r refresh | v <id> view files | d <n> <dir> download | c close | l logout | q quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Refresh,
    View(i64),
    Download { index: usize, dir: PathBuf },
    Close,
    Logout,
    Quit,
    Help,
}

/// Parse one input line. Blank lines yield `None`.
pub fn parse_action(line: &str) -> Result<Option<Action>> {
    let mut parts = line.split_whitespace();
    let cmd = match parts.next() {
        Some(c) => c,
        None => return Ok(None),
    };

    let action = match cmd {
        "r" | "refresh" => Action::Refresh,
        "v" | "view" => {
            let id = parts.next().context("Usage: v <deal-id>")?;
            let id = id
                .parse::<i64>()
                .with_context(|| format!("Invalid deal id '{}'", id))?;
            Action::View(id)
        }
        "d" | "download" => {
            let n = parts.next().context("Usage: d <file-number> <dir>")?;
            let index = match n.parse::<usize>() {
                Ok(i) if i > 0 => i,
                _ => bail!("Invalid file number '{}'", n),
            };
            let dir = parts.next().context("Usage: d <file-number> <dir>")?;
            Action::Download {
                index,
                dir: PathBuf::from(dir),
            }
        }
        "c" | "close" => Action::Close,
        "l" | "logout" => Action::Logout,
        "q" | "quit" | "exit" => Action::Quit,
        "h" | "help" | "?" => Action::Help,
        other => bail!("Unknown command '{}'. Type h for help.", other),
    };
    Ok(Some(action))
}

pub async fn run<N: Notifier>(ctx: &SessionContext<N>) -> Result<()> {
    run_with(ctx, BufReader::new(io::stdin())).await
}

/// The interactive loop, reading commands from `input` until quit, logout,
/// or end of input.
pub async fn run_with<N: Notifier, R: AsyncBufRead + Unpin>(
    ctx: &SessionContext<N>,
    input: R,
) -> Result<()> {
    let mut page = HomePage::new(ctx).with_action("v");
    if page.mount().await == Route::Login {
        bail!(LOGIN_REQUIRED);
    }
    print!("{}", page.render());
    println!("{}", HELP);

    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        let action = match parse_action(&line) {
            Ok(Some(a)) => a,
            Ok(None) => continue,
            Err(e) => {
                eprintln!("Error: {:#}", e);
                continue;
            }
        };

        let route = match action {
            Action::Quit => return Ok(()),
            Action::Help => {
                println!("{}", HELP);
                Route::Home
            }
            Action::Refresh => {
                let route = page.refresh().await;
                print!("{}", page.render());
                route
            }
            Action::View(id) => match page.open_deal(id).await {
                Ok(route) => {
                    if let Some(modal) = page.render_modal() {
                        print!("{}", modal);
                    }
                    route
                }
                Err(e) => {
                    eprintln!("Error: {:#}", e);
                    Route::Home
                }
            },
            Action::Download { index, dir } => {
                if let Err(e) = download(ctx, &page, index, dir).await {
                    eprintln!("Error: {:#}", e);
                }
                ctx.take_redirect().unwrap_or(page.route())
            }
            Action::Close => {
                page.close_modal();
                print!("{}", page.render());
                Route::Home
            }
            Action::Logout => {
                page.logout();
                println!("Logged out");
                return Ok(());
            }
        };

        if route == Route::Login {
            bail!(LOGIN_REQUIRED);
        }
    }

    Ok(())
}

async fn download<N: Notifier>(
    ctx: &SessionContext<N>,
    page: &HomePage<'_, N>,
    index: usize,
    dir: PathBuf,
) -> Result<()> {
    let files = match page.modal().map(|m| &m.files) {
        Some(FilesState::Ready(files)) => files,
        Some(FilesState::Loading) => bail!("Files are still loading"),
        None => bail!("Open a deal first with v <id>"),
    };
    let file = match index.checked_sub(1).and_then(|i| files.get(i)) {
        Some(f) => f,
        None => bail!("File #{} not found", index),
    };

    let path = deals::download_file(ctx, file, &dir).await?;
    println!("Saved {}", path.display());
    Ok(())
}
