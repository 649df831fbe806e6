//! Reconciliation planner: which catalog records still lack a published file.
//!
//! The download directory is the source of truth for completion. A file named
//! `<save_name>.mp4` removes that record from the plan whatever its error
//! fields say. Planning never writes anything.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use tracing::{debug, instrument, warn};

use crate::catalog::{CatalogRecord, CatalogStore};
use crate::error::PipelineError;
use crate::site::MEDIA_EXTENSION;

/// Records whose file is still missing, ordered by save name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadPlan {
    /// Every record without a published file, including excluded ones.
    pub pending: Vec<CatalogRecord>,
}

impl DownloadPlan {
    /// Records the download phase should act on (`need_download` set).
    pub fn actionable(&self) -> impl Iterator<Item = &CatalogRecord> {
        self.pending.iter().filter(|record| record.need_download)
    }

    /// Owned copy of [`actionable`](Self::actionable).
    #[must_use]
    pub fn into_actionable(self) -> Vec<CatalogRecord> {
        self.pending
            .into_iter()
            .filter(|record| record.need_download)
            .collect()
    }

    /// Pending records excluded by the manual override.
    #[must_use]
    pub fn excluded_count(&self) -> usize {
        self.pending.len() - self.actionable().count()
    }
}

/// Computes the plan from two listings: catalog records and directory entry names.
///
/// Records are keyed by save name; if two records share one, the later wins
/// and the collision is logged.
#[must_use]
pub fn diff<I, S>(records: Vec<CatalogRecord>, entries: I) -> DownloadPlan
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut candidates: BTreeMap<String, CatalogRecord> = BTreeMap::new();
    for record in records {
        if let Some(shadowed) = candidates.insert(record.save_name.clone(), record) {
            warn!(
                save_name = %shadowed.save_name,
                shadowed_id = shadowed.id,
                web_url = %shadowed.web_url,
                "save name shared by several records, only the latest is planned"
            );
        }
    }

    let present: HashSet<String> = entries
        .into_iter()
        .filter_map(|entry| {
            entry
                .as_ref()
                .strip_suffix(MEDIA_EXTENSION)
                .map(str::to_string)
        })
        .collect();

    candidates.retain(|save_name, _| !present.contains(save_name));
    DownloadPlan {
        pending: candidates.into_values().collect(),
    }
}

/// Lists file names in `dir` (subdirectories are ignored).
///
/// # Errors
///
/// Returns [`PipelineError::Filesystem`] if the directory cannot be read.
pub async fn list_entries(dir: &Path) -> Result<Vec<String>, PipelineError> {
    let mut reader = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| PipelineError::filesystem(dir, e))?;
    let mut names = Vec::new();
    while let Some(entry) = reader
        .next_entry()
        .await
        .map_err(|e| PipelineError::filesystem(dir, e))?
    {
        let is_dir = entry.file_type().await.is_ok_and(|t| t.is_dir());
        if is_dir {
            continue;
        }
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    Ok(names)
}

/// Plans downloads against the catalog and `download_dir`.
///
/// # Errors
///
/// Returns [`PipelineError::Persistence`] if the catalog cannot be listed and
/// [`PipelineError::Filesystem`] if the directory cannot be read.
#[instrument(skip(store), fields(dir = %download_dir.display()))]
pub async fn plan(
    store: &dyn CatalogStore,
    download_dir: &Path,
) -> Result<DownloadPlan, PipelineError> {
    let records = store.list_all().await?;
    let total = records.len();
    let entries = list_entries(download_dir).await?;
    let plan = diff(records, &entries);
    debug!(
        records = total,
        files = entries.len(),
        pending = plan.pending.len(),
        "planned downloads"
    );
    Ok(plan)
}
