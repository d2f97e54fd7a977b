use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::error::{IndexerError, Result};
use crate::limits::{clamp_concurrency, ingest_concurrency};
use crate::pipeline::{IngestOutcome, Pipeline};
use crate::scanner::{unit_id_for_path, UnitScanner};
use crate::stats::IngestStats;

/// Ingests every source unit under a project root, several units at a time.
///
/// Cancellation is cooperative: the flag is checked before each unit starts, never in
/// the middle of one.
pub struct ProjectIngestor {
    root: PathBuf,
    pipeline: Arc<Pipeline>,
    concurrency: usize,
    cancel: Arc<AtomicBool>,
}

impl ProjectIngestor {
    pub fn new(root: impl AsRef<Path>, pipeline: Arc<Pipeline>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(IndexerError::InvalidPath(format!(
                "Path is not a directory: {}",
                root.display()
            )));
        }
        Ok(Self {
            root,
            pipeline,
            concurrency: ingest_concurrency(),
            cancel: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Builder: units parsed at once (clamped to 1..=32)
    #[must_use]
    pub fn with_concurrency(mut self, limit: usize) -> Self {
        self.concurrency = clamp_concurrency(limit);
        self
    }

    /// Set to `true` to stop starting new units
    #[must_use]
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Scan, ingest changed units, and drop units whose files disappeared
    pub async fn ingest_all(&self) -> Result<IngestStats> {
        let start = Instant::now();
        let mut stats = IngestStats::new();

        let root = self.root.clone();
        let scan = tokio::task::spawn_blocking(move || UnitScanner::new(root).scan())
            .await
            .map_err(|err| IndexerError::Other(format!("join scan task: {err}")))?;
        stats.units = scan.units.len();

        let assigned = assign_unit_ids(&self.root, &scan.units);
        let live: BTreeSet<String> = assigned.iter().map(|(_, id)| id.clone()).collect();
        log::info!(
            "Ingesting {} units from {} (concurrency {})",
            assigned.len(),
            self.root.display(),
            self.concurrency
        );

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();
        for (path, unit_id) in assigned {
            if self.cancel.load(Ordering::Relaxed) {
                stats.skipped += 1;
                continue;
            }
            let permit = Arc::clone(&semaphore)
                .acquire_owned()
                .await
                .map_err(|err| IndexerError::Other(format!("ingest semaphore closed: {err}")))?;
            let pipeline = Arc::clone(&self.pipeline);
            let cancel = Arc::clone(&self.cancel);
            tasks.spawn_blocking(move || {
                let _permit = permit;
                if cancel.load(Ordering::Relaxed) {
                    return (unit_id, None);
                }
                let outcome = pipeline.ingest_file_as(&path, &unit_id);
                (unit_id, Some(outcome))
            });
        }

        while let Some(joined) = tasks.join_next().await {
            let (unit_id, outcome) =
                joined.map_err(|err| IndexerError::Other(format!("join ingest task: {err}")))?;
            match outcome {
                None => stats.skipped += 1,
                Some(Ok(IngestOutcome::Indexed {
                    source_lines,
                    diagnostics,
                    ..
                })) => stats.add_indexed(source_lines, diagnostics),
                Some(Ok(IngestOutcome::Unchanged { .. })) => stats.unchanged += 1,
                Some(Ok(IngestOutcome::Failed { unit_id, reason })) => stats.add_failure(unit_id, reason),
                Some(Err(err)) => {
                    log::warn!("{unit_id}: {err}");
                    stats.add_error(format!("{unit_id}: {err}"));
                }
            }
        }

        stats.cancelled = self.cancel.load(Ordering::Relaxed);
        if !stats.cancelled {
            let corpus = self.pipeline.corpus();
            let snapshot = corpus.snapshot();
            let stale: Vec<String> = snapshot
                .unit_ids()
                .chain(snapshot.failed().keys().map(String::as_str))
                .filter(|id| !live.contains(*id))
                .map(str::to_string)
                .collect();
            for unit_id in stale {
                log::debug!("{unit_id}: source gone, removing");
                corpus.remove(&unit_id);
                stats.removed += 1;
            }
        }

        stats.normalize();
        stats.time_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        log::info!(
            "Ingested {} units: {} indexed, {} unchanged, {} failed, {} removed in {} ms",
            stats.units,
            stats.indexed,
            stats.unchanged,
            stats.failed.len(),
            stats.removed,
            stats.time_ms
        );
        Ok(stats)
    }
}

/// Unit ids by file stem; stems shared by several files fall back to the
/// upper-cased relative path without extension
fn assign_unit_ids(root: &Path, paths: &[PathBuf]) -> Vec<(PathBuf, String)> {
    let mut by_stem: BTreeMap<String, usize> = BTreeMap::new();
    for path in paths {
        *by_stem.entry(unit_id_for_path(path)).or_default() += 1;
    }

    paths
        .iter()
        .map(|path| {
            let stem = unit_id_for_path(path);
            let id = if by_stem.get(&stem).copied().unwrap_or(0) > 1 {
                let relative = path.strip_prefix(root).unwrap_or(path).with_extension("");
                relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().to_ascii_uppercase())
                    .collect::<Vec<_>>()
                    .join("/")
            } else {
                stem
            };
            (path.clone(), id)
        })
        .collect()
}
