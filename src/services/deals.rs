use anyhow::{Context, Result};
use serde_json::json;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::api::{self, Endpoint};
use crate::models::{DealsResponse, FileInfo, FilesResponse};
use crate::session::{Notifier, SessionContext};

pub async fn list_deals<N: Notifier>(ctx: &SessionContext<N>) -> api::Result<DealsResponse> {
    let session = ctx.require_session()?;
    ctx.intercept(
        ctx.api()
            .post(Endpoint::ListDeals, json!({}), Some(&session))
            .await,
    )
}

/// Files attached to a deal. The payload's `error` can be set on a
/// successful response, so callers check both.
pub async fn list_files<N: Notifier>(
    ctx: &SessionContext<N>,
    deal_id: i64,
) -> api::Result<FilesResponse> {
    let session = ctx.require_session()?;
    ctx.intercept(
        ctx.api()
            .post(
                Endpoint::DealFiles(deal_id),
                json!({ "deal_id": deal_id }),
                Some(&session),
            )
            .await,
    )
}

/// Save a file into `dir` and return where it went.
pub async fn download_file<N: Notifier>(
    ctx: &SessionContext<N>,
    file: &FileInfo,
    dir: &Path,
) -> Result<PathBuf> {
    let bytes = ctx.intercept(ctx.api().download(&file.download_url).await)?;

    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create {}", dir.display()))?;
    let path = dir.join(local_file_name(file));
    tokio::fs::write(&path, &bytes)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;

    info!(path = %path.display(), bytes = bytes.len(), "downloaded file");
    Ok(path)
}

/// A single path component derived from the backend's file name.
pub fn local_file_name(file: &FileInfo) -> String {
    let name = file
        .name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or("")
        .trim();
    match name {
        "" | "." | ".." => format!("file-{}", file.id),
        name => name.to_string(),
    }
}
