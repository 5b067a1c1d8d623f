//! Download feed snapshots into a data directory.
//!
//! A snapshot younger than the cache window is left alone, so repeated runs
//! within the window make no requests.

use flu_cdc::{
    api::FeedClient,
    jurisdiction::{parse_jurisdiction_payload, NATIONAL_JURISDICTION},
    nextstrain::parse_nextstrain_payload,
    wastewater::parse_wastewater_payload,
};
use flu_utils::validate::sanitize_state_code;
use log::{info, warn};
use std::{
    fs,
    future::Future,
    path::{Path, PathBuf},
    time::Duration,
};

/// Hospital records for every jurisdiction.
pub const HOSPITAL_SNAPSHOT: &str = "cdc.json";
/// Hospital records for the national total only.
pub const NATIONAL_SNAPSHOT: &str = "cdc-national.json";
pub const WASTEWATER_SNAPSHOT: &str = "wastewater.json";
pub const NEXTSTRAIN_SNAPSHOT: &str = "nextstrain.json";

/// Snapshots younger than this are reused.
pub const DEFAULT_MAX_AGE_SECS: u64 = 3600;

pub struct FetchOptions {
    pub out_dir: PathBuf,
    /// Row limit for the all-jurisdiction hospital and wastewater feeds
    pub limit: u32,
    /// Weeks of national hospital history
    pub national_limit: u32,
    pub state: Option<String>,
    pub max_age: Duration,
    pub include_nextstrain: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotStatus {
    Reused,
    Written(usize),
}

/// True when `path` exists and was modified less than `max_age` ago.
pub fn is_fresh(path: &Path, max_age: Duration) -> bool {
    fs::metadata(path)
        .and_then(|meta| meta.modified())
        .ok()
        .and_then(|modified| modified.elapsed().ok())
        .map(|age| age < max_age)
        .unwrap_or(false)
}

/// Write `body` to `path` through a temporary file, so readers never see
/// a partial snapshot.
pub fn write_snapshot(path: &Path, body: &str) -> anyhow::Result<()> {
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, body)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Reuse a fresh snapshot or await `fetch` and store its body.
///
/// `fetch` is only polled when the snapshot is stale. The body is decoded
/// with `count_records` before it replaces the old snapshot.
async fn refresh_snapshot<F>(
    path: &Path,
    max_age: Duration,
    fetch: F,
    count_records: fn(&str) -> anyhow::Result<usize>,
) -> anyhow::Result<SnapshotStatus>
where
    F: Future<Output = flu_cdc::api::Result<String>>,
{
    if is_fresh(path, max_age) {
        info!("Reusing fresh snapshot {}", path.display());
        return Ok(SnapshotStatus::Reused);
    }
    let body = fetch.await?;
    let count = count_records(&body)
        .map_err(|e| anyhow::anyhow!("Invalid payload for {}: {}", path.display(), e))?;
    write_snapshot(path, &body)?;
    info!("Wrote {} records to {}", count, path.display());
    Ok(SnapshotStatus::Written(count))
}

fn count_hospital(body: &str) -> anyhow::Result<usize> {
    Ok(parse_jurisdiction_payload(body)?.len())
}

fn count_wastewater(body: &str) -> anyhow::Result<usize> {
    Ok(parse_wastewater_payload(body)?.len())
}

fn count_nextstrain(body: &str) -> anyhow::Result<usize> {
    parse_nextstrain_payload(body)?;
    Ok(1)
}

/// Refresh every snapshot. Each feed is tried once; the command fails after
/// all feeds were attempted if any of them failed.
pub async fn run_fetch(options: &FetchOptions) -> anyhow::Result<()> {
    let state = match options.state.as_deref() {
        Some(raw) => Some(
            sanitize_state_code(Some(raw))
                .ok_or_else(|| anyhow::anyhow!("Invalid state code: {:?}", raw))?,
        ),
        None => None,
    };

    fs::create_dir_all(&options.out_dir)?;
    let client = FeedClient::new()?;
    let dir = &options.out_dir;
    let max_age = options.max_age;

    let mut results = vec![
        (
            HOSPITAL_SNAPSHOT,
            refresh_snapshot(
                &dir.join(HOSPITAL_SNAPSHOT),
                max_age,
                client.fetch_hospital_text(options.limit, state.as_deref()),
                count_hospital,
            )
            .await,
        ),
        (
            NATIONAL_SNAPSHOT,
            refresh_snapshot(
                &dir.join(NATIONAL_SNAPSHOT),
                max_age,
                client.fetch_hospital_text(options.national_limit, Some(NATIONAL_JURISDICTION)),
                count_hospital,
            )
            .await,
        ),
        (
            WASTEWATER_SNAPSHOT,
            refresh_snapshot(
                &dir.join(WASTEWATER_SNAPSHOT),
                max_age,
                client.fetch_wastewater_text(options.limit, state.as_deref()),
                count_wastewater,
            )
            .await,
        ),
    ];
    if options.include_nextstrain {
        results.push((
            NEXTSTRAIN_SNAPSHOT,
            refresh_snapshot(
                &dir.join(NEXTSTRAIN_SNAPSHOT),
                max_age,
                client.fetch_nextstrain_text(),
                count_nextstrain,
            )
            .await,
        ));
    }

    let mut failed = Vec::new();
    for (name, result) in results {
        if let Err(e) = result {
            warn!("Failed to refresh {}: {}", name, e);
            failed.push(name);
        }
    }
    if !failed.is_empty() {
        anyhow::bail!("Failed to refresh {}", failed.join(", "));
    }
    info!("Snapshots up to date in {}", dir.display());
    Ok(())
}
