//! Batch pipeline: spreadsheet + photos → posters → zip.
//!
//! ## Stages
//!
//! ```text
//! validate inputs → read table → index photos → load background
//!     → plan rows → render (rayon) → package → write archive + manifest
//! ```
//!
//! Every stage before rendering is fatal on failure, and nothing is written
//! to the output directory unless the whole run succeeds.
//!
//! ## Planning
//!
//! Rows are planned sequentially and in order. Each row first reports
//! [`RunEvent::RowStarted`], then is either turned into a [`PosterJob`] or
//! skipped with a [`SkipReason`]:
//!
//! - `school`, `major` or `image` missing or empty
//! - no supplied photo named like the `image` cell
//!
//! Skips are data problems, not errors: they are logged at `warn`, listed in
//! the manifest, and the run continues.
//!
//! ## Rendering
//!
//! Jobs render on the global rayon pool, one [`Surface`] per worker. Results
//! are reassembled in row order before packaging, so the archive order never
//! depends on scheduling. What happens when a render fails is decided by
//! [`RenderErrorPolicy`]:
//!
//! - `abort`: the run fails with [`PipelineError::Render`] and no archive is
//!   produced. Jobs not yet started when the failure is seen are not rendered.
//! - `skip`: the failure is recorded in [`RunOutcome::failed`] and the rest of
//!   the batch is packaged.
//!
//! ## Exclusion
//!
//! [`build`] holds a [`RunLock`] on the output directory for its whole
//! duration, so two runs never write the same archive at once.

use crate::archive::{ArchiveError, ArchiveWriter, write_archive};
use crate::assets::AssetIndex;
use crate::config::{PosterConfig, ProcessingConfig, RenderErrorPolicy};
use crate::naming::{ARCHIVE_NAME, MANIFEST_NAME};
use crate::render::{PosterBackend, PosterJob, RasterBackend, RenderError, Surface};
use crate::table::{Record, Row, TableError, read_table};
use rayon::prelude::*;
use serde::Serialize;
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Table(#[from] TableError),
    #[error("cannot index images: {0}")]
    Assets(std::io::Error),
    #[error("background template unavailable: {0}")]
    Background(RenderError),
    #[error("captions cannot be drawn: {0}")]
    Fonts(RenderError),
    #[error("row {row}: {source}")]
    Render {
        row: usize,
        #[source]
        source: RenderError,
    },
    #[error("cannot build archive: {0}")]
    Archive(#[from] ArchiveError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("another run is already writing to this directory (remove {} if it is stale)", .0.display())]
    Locked(PathBuf),
}

/// Everything a run reads from disk.
#[derive(Debug, Clone)]
pub struct RunInputs {
    pub table: PathBuf,
    /// Photo files and/or directories of photos.
    pub images: Vec<PathBuf>,
    pub background: PathBuf,
}

// ============================================================================
// Events
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    ReadingTable,
    IndexingImages,
    LoadingBackground,
    Rendering { jobs: usize },
    Packaging,
}

/// Progress reported while a run executes.
#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    Phase(Phase),
    RowStarted {
        index: usize,
        total: usize,
        school: String,
    },
    RowSkipped {
        index: usize,
        reason: SkipReason,
    },
    /// Sent as workers finish, so not necessarily in row order.
    RowRendered { index: usize, name: String },
    RowFailed { index: usize, error: String },
    /// None of the configured caption fonts is installed.
    FontFallback { requested: Vec<String>, used: String },
}

/// Why a row produced no poster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    MissingField { field: &'static str },
    ImageNotFound { image: String },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MissingField { field } => write!(f, "missing {field}"),
            SkipReason::ImageNotFound { image } => write!(f, "image not found: {image}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedRow {
    pub row: usize,
    #[serde(flatten)]
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedRow {
    pub row: usize,
    pub image: String,
    pub error: String,
}

fn emit(events: Option<&Sender<RunEvent>>, event: RunEvent) {
    if let Some(tx) = events {
        // The receiver going away only silences progress output.
        let _ = tx.send(event);
    }
}

// ============================================================================
// Planning
// ============================================================================

/// Rows that will render, and rows that were dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    /// Data rows read from the spreadsheet.
    pub rows: usize,
    pub jobs: Vec<PosterJob>,
    pub skipped: Vec<SkippedRow>,
}

/// Validate each record and join it to its photo, in row order.
pub fn plan(records: &[Record], assets: &AssetIndex, events: Option<&Sender<RunEvent>>) -> Plan {
    let total = records.len();
    let mut jobs = Vec::new();
    let mut skipped = Vec::new();

    for record in records {
        emit(
            events,
            RunEvent::RowStarted {
                index: record.index,
                total,
                school: record.get("school").unwrap_or_default().to_string(),
            },
        );

        let reason = match Row::from_record(record) {
            Err(missing) => SkipReason::MissingField { field: missing.0 },
            Ok(row) => match assets.get(&row.image) {
                Some(asset) => {
                    jobs.push(PosterJob {
                        row: row.index,
                        asset: asset.clone(),
                        school: row.school,
                        major: row.major,
                        image: row.image,
                    });
                    continue;
                }
                None => SkipReason::ImageNotFound { image: row.image },
            },
        };

        tracing::warn!(row = record.index, %reason, "skipping row");
        emit(
            events,
            RunEvent::RowSkipped {
                index: record.index,
                reason: reason.clone(),
            },
        );
        skipped.push(SkippedRow {
            row: record.index,
            reason,
        });
    }

    Plan {
        rows: total,
        jobs,
        skipped,
    }
}

// ============================================================================
// Rendering
// ============================================================================

/// Result of a successful run, before anything is written to disk.
#[derive(Debug)]
pub struct RunOutcome {
    /// Zip payload.
    pub archive: Vec<u8>,
    /// Data rows read from the spreadsheet.
    pub rows: usize,
    /// Entry names in archive order.
    pub entries: Vec<String>,
    pub skipped: Vec<SkippedRow>,
    pub failed: Vec<FailedRow>,
}

/// Plan, render and package `records` with any backend.
pub fn render_batch(
    backend: &impl PosterBackend,
    records: &[Record],
    assets: &AssetIndex,
    processing: &ProcessingConfig,
    events: Option<&Sender<RunEvent>>,
) -> Result<RunOutcome, PipelineError> {
    let Plan {
        rows,
        jobs,
        skipped,
    } = plan(records, assets, events);

    emit(events, RunEvent::Phase(Phase::Rendering { jobs: jobs.len() }));
    let abort = processing.on_render_error == RenderErrorPolicy::Abort;
    let aborted = AtomicBool::new(false);
    let (width, height) = backend.canvas_size();

    // `None` marks a job left unrendered after an abort.
    let results: Vec<Option<Result<Vec<u8>, RenderError>>> = jobs
        .par_iter()
        .map_init(
            || Surface::new(width, height),
            |surface, job| {
                if abort && aborted.load(Ordering::Relaxed) {
                    return None;
                }
                let result = backend.render(surface, job);
                match &result {
                    Ok(_) => emit(
                        events,
                        RunEvent::RowRendered {
                            index: job.row,
                            name: job.entry_name(),
                        },
                    ),
                    Err(e) => {
                        aborted.store(true, Ordering::Relaxed);
                        emit(
                            events,
                            RunEvent::RowFailed {
                                index: job.row,
                                error: e.to_string(),
                            },
                        );
                    }
                }
                Some(result)
            },
        )
        .collect();

    let mut writer = ArchiveWriter::new();
    let mut failed = Vec::new();
    for (job, result) in jobs.into_iter().zip(results) {
        match result {
            Some(Ok(png)) => writer.add(job.entry_name(), png),
            Some(Err(source)) if abort => {
                return Err(PipelineError::Render {
                    row: job.row,
                    source,
                });
            }
            Some(Err(e)) => {
                tracing::warn!(row = job.row, image = %job.image, error = %e, "render failed, skipping row");
                failed.push(FailedRow {
                    row: job.row,
                    image: job.image,
                    error: e.to_string(),
                });
            }
            None => {}
        }
    }

    emit(events, RunEvent::Phase(Phase::Packaging));
    let entries = writer.names();
    let archive = writer.finish()?;

    Ok(RunOutcome {
        archive,
        rows,
        entries,
        skipped,
        failed,
    })
}

// ============================================================================
// Entry points
// ============================================================================

fn load_inputs(
    table: &Path,
    images: &[PathBuf],
    events: Option<&Sender<RunEvent>>,
) -> Result<(Vec<Record>, AssetIndex), PipelineError> {
    if !table.is_file() {
        return Err(PipelineError::Validation(format!(
            "spreadsheet not found: {}",
            table.display()
        )));
    }
    if images.is_empty() {
        return Err(PipelineError::Validation(
            "no image files selected".to_string(),
        ));
    }

    emit(events, RunEvent::Phase(Phase::ReadingTable));
    let records = read_table(&std::fs::read(table)?)?;

    emit(events, RunEvent::Phase(Phase::IndexingImages));
    let assets = AssetIndex::from_paths(images).map_err(PipelineError::Assets)?;
    if assets.is_empty() {
        return Err(PipelineError::Validation(
            "no usable image files among the selected paths".to_string(),
        ));
    }
    Ok((records, assets))
}

/// Execute a run in memory with the production backend.
pub fn run(
    inputs: &RunInputs,
    config: &PosterConfig,
    events: Option<Sender<RunEvent>>,
) -> Result<RunOutcome, PipelineError> {
    let events = events.as_ref();
    let (records, assets) = load_inputs(&inputs.table, &inputs.images, events)?;

    emit(events, RunEvent::Phase(Phase::LoadingBackground));
    let backend = RasterBackend::new(config, &inputs.background).map_err(|e| match e {
        RenderError::Font(_) => PipelineError::Fonts(e),
        other => PipelineError::Background(other),
    })?;
    if let Some(used) = backend.font_fallback() {
        emit(
            events,
            RunEvent::FontFallback {
                requested: config.text.font_family.clone(),
                used: used.to_string(),
            },
        );
    }

    render_batch(&backend, &records, &assets, &config.processing, events)
}

/// Read and plan without rendering.
pub fn check(
    table: &Path,
    images: &[PathBuf],
    events: Option<Sender<RunEvent>>,
) -> Result<Plan, PipelineError> {
    let events = events.as_ref();
    let (records, assets) = load_inputs(table, images, events)?;
    Ok(plan(&records, &assets, events))
}

/// Files written by a successful [`build`].
#[derive(Debug)]
pub struct BuildOutput {
    pub archive: PathBuf,
    pub manifest: PathBuf,
    pub outcome: RunOutcome,
}

/// Run under the output directory's lock and write the archive and manifest.
pub fn build(
    inputs: &RunInputs,
    config: &PosterConfig,
    output_dir: &Path,
    events: Option<Sender<RunEvent>>,
) -> Result<BuildOutput, PipelineError> {
    let _lock = RunLock::acquire(output_dir)?;
    let outcome = run(inputs, config, events)?;

    let archive = write_archive(output_dir, &outcome.archive)?;
    let manifest = output_dir.join(MANIFEST_NAME);
    let json = serde_json::to_string_pretty(&RunManifest::from_outcome(&outcome))?;
    std::fs::write(&manifest, json)?;

    Ok(BuildOutput {
        archive,
        manifest,
        outcome,
    })
}

// ============================================================================
// Manifest
// ============================================================================

/// `manifest.json`: what the run produced and what it left out.
#[derive(Debug, Serialize)]
pub struct RunManifest<'a> {
    pub archive: &'static str,
    pub rows: usize,
    pub entries: &'a [String],
    pub skipped: &'a [SkippedRow],
    pub failed: &'a [FailedRow],
}

impl<'a> RunManifest<'a> {
    pub fn from_outcome(outcome: &'a RunOutcome) -> Self {
        Self {
            archive: ARCHIVE_NAME,
            rows: outcome.rows,
            entries: &outcome.entries,
            skipped: &outcome.skipped,
            failed: &outcome.failed,
        }
    }
}

// ============================================================================
// Run exclusion
// ============================================================================

/// Lock file name inside the output directory.
pub const LOCK_FILE: &str = ".poster-batch.lock";

/// Exclusive claim on an output directory, released on drop.
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
}

impl RunLock {
    pub fn acquire(dir: &Path) -> Result<Self, PipelineError> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(LOCK_FILE);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                writeln!(file, "{}", std::process::id())?;
                Ok(Self { path })
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(PipelineError::Locked(path))
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to remove lock file");
        }
    }
}
