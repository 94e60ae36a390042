//! CLI output formatting.
//!
//! # Status line
//!
//! A run reports progress as [`RunEvent`]s. On an interactive terminal the
//! progress lines (phases, "Processing row i/N", rendered rows) share one line
//! that each new message overwrites, so only the latest status is visible.
//! Skipped and failed rows are printed as permanent lines so they survive the
//! next update. When stdout is not a terminal every line is printed plainly.
//!
//! ```text
//! Row 2 skipped: missing school
//! Row 3 skipped: image not found: missing.jpg
//! Processing row 3/3: 北大              ← rewritten in place
//! ```
//!
//! # Summaries
//!
//! ```text
//! Rows: 3
//! Posters: 1
//!     001 喜报-清华大学-计算机科学.png
//! Skipped: 2
//!     002 missing school
//!     003 image not found: missing.jpg
//! ```
//!
//! # Architecture
//!
//! `format_*` functions return `Vec<String>` and do no I/O; `print_*`
//! wrappers and [`StatusLine`] write them out.

use crate::pipeline::{FailedRow, Phase, Plan, RunEvent, RunOutcome, SkippedRow};
use std::io::{self, IsTerminal, Write};

/// Erase the current terminal line and return the cursor to column 0.
const CLEAR_LINE: &str = "\r\x1b[2K";

// ============================================================================
// Shared helpers
// ============================================================================

/// Format a 1-based row number as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn skipped_lines(skipped: &[SkippedRow]) -> Vec<String> {
    let mut lines = Vec::new();
    if !skipped.is_empty() {
        lines.push(format!("Skipped: {}", skipped.len()));
        for s in skipped {
            lines.push(format!("{}{} {}", indent(1), format_index(s.row), s.reason));
        }
    }
    lines
}

fn failed_lines(failed: &[FailedRow]) -> Vec<String> {
    let mut lines = Vec::new();
    if !failed.is_empty() {
        lines.push(format!("Failed: {}", failed.len()));
        for f in failed {
            lines.push(format!(
                "{}{} {}: {}",
                indent(1),
                format_index(f.row),
                f.image,
                f.error
            ));
        }
    }
    lines
}

// ============================================================================
// Run events
// ============================================================================

/// Format one progress event as display lines.
pub fn format_run_event(event: &RunEvent) -> Vec<String> {
    let line = match event {
        RunEvent::Phase(Phase::ReadingTable) => "Reading spreadsheet".to_string(),
        RunEvent::Phase(Phase::IndexingImages) => "Indexing images".to_string(),
        RunEvent::Phase(Phase::LoadingBackground) => "Loading background template".to_string(),
        RunEvent::Phase(Phase::Rendering { jobs }) => format!("Rendering {jobs} posters"),
        RunEvent::Phase(Phase::Packaging) => "Packaging archive".to_string(),
        RunEvent::RowStarted {
            index,
            total,
            school,
        } => format!("Processing row {index}/{total}: {school}"),
        RunEvent::RowSkipped { index, reason } => format!("Row {index} skipped: {reason}"),
        RunEvent::RowRendered { index, name } => format!("Row {index} → {name}"),
        RunEvent::RowFailed { index, error } => format!("Row {index} failed: {error}"),
        RunEvent::FontFallback { requested, used } => format!(
            "Fonts not installed: {}; captions use {used}",
            requested.join(", ")
        ),
    };
    vec![line]
}

/// Whether an event's lines stay on screen after the next update.
fn is_persistent(event: &RunEvent) -> bool {
    matches!(
        event,
        RunEvent::RowSkipped { .. }
            | RunEvent::RowFailed { .. }
            | RunEvent::FontFallback { .. }
    )
}

/// One-line status display that keeps only the latest message.
pub struct StatusLine<W: Write> {
    out: W,
    interactive: bool,
    /// A transient line is on screen without a trailing newline.
    dirty: bool,
}

impl StatusLine<io::Stdout> {
    /// Status line on stdout, rewriting in place only when stdout is a TTY.
    pub fn stdout() -> Self {
        let out = io::stdout();
        let interactive = out.is_terminal();
        Self::new(out, interactive)
    }
}

impl<W: Write> StatusLine<W> {
    pub fn new(out: W, interactive: bool) -> Self {
        Self {
            out,
            interactive,
            dirty: false,
        }
    }

    /// Replace the current status with `text`.
    pub fn update(&mut self, text: &str) -> io::Result<()> {
        if self.interactive {
            write!(self.out, "{CLEAR_LINE}{text}")?;
            self.dirty = true;
            self.out.flush()
        } else {
            writeln!(self.out, "{text}")
        }
    }

    /// Print `text` on its own line, above the status.
    pub fn persist(&mut self, text: &str) -> io::Result<()> {
        if self.dirty {
            write!(self.out, "{CLEAR_LINE}")?;
            self.dirty = false;
        }
        writeln!(self.out, "{text}")
    }

    pub fn show(&mut self, event: &RunEvent) -> io::Result<()> {
        for line in format_run_event(event) {
            if is_persistent(event) {
                self.persist(&line)?;
            } else {
                self.update(&line)?;
            }
        }
        Ok(())
    }

    /// End the status line so later output starts on a fresh line.
    pub fn finish(&mut self) -> io::Result<()> {
        if self.dirty {
            writeln!(self.out)?;
            self.dirty = false;
        }
        self.out.flush()
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

// ============================================================================
// Check and build summaries
// ============================================================================

/// Format what a `check` found: renderable rows and skipped rows.
pub fn format_plan(plan: &Plan) -> Vec<String> {
    let mut lines = vec![
        format!("Rows: {}", plan.rows),
        format!("Posters: {}", plan.jobs.len()),
    ];
    for job in &plan.jobs {
        lines.push(format!(
            "{}{} {} ← {}",
            indent(1),
            format_index(job.row),
            job.entry_name(),
            job.image
        ));
    }
    lines.extend(skipped_lines(&plan.skipped));
    lines
}

pub fn print_plan(plan: &Plan) {
    for line in format_plan(plan) {
        println!("{}", line);
    }
}

/// Format the result of a finished run.
pub fn format_summary(outcome: &RunOutcome) -> Vec<String> {
    let mut lines = vec![
        format!("Rows: {}", outcome.rows),
        format!("Posters: {}", outcome.entries.len()),
    ];
    for (i, name) in outcome.entries.iter().enumerate() {
        lines.push(format!("{}{} {}", indent(1), format_index(i + 1), name));
    }
    lines.extend(skipped_lines(&outcome.skipped));
    lines.extend(failed_lines(&outcome.failed));
    lines
}

pub fn print_summary(outcome: &RunOutcome) {
    for line in format_summary(outcome) {
        println!("{}", line);
    }
}
