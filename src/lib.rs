//! # Poster Batch
//!
//! Batch-renders personalised "喜报" announcement posters. A spreadsheet names
//! one student per row (`school`, `major`, `image`); each row is joined to its
//! photo by file name, drawn onto a fixed background template, and every
//! poster is bundled into one zip archive, `批量生成的海报.zip`.
//!
//! # Architecture: One Linear Run
//!
//! ```text
//! students.xlsx ─→ table ──→ records ─┐
//!                                      ├─→ pipeline::plan ─→ jobs ─→ render ─→ archive
//! photos/       ─→ assets ─→ index  ──┘                                        │
//!                                                                              ▼
//!                                       output/批量生成的海报.zip + manifest.json
//! ```
//!
//! Nothing is cached between runs. The only files a run writes are the archive,
//! the manifest, and a lock file that lives as long as the run.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`table`] | Spreadsheet decoding (first worksheet, header-keyed records) |
//! | [`assets`] | File name → photo handle index built from files and directories |
//! | [`render`] | Poster layout, reusable drawing surface, text, and the backend trait |
//! | [`pipeline`] | Plan → render → package orchestration, events, manifest, run lock |
//! | [`archive`] | In-memory zip assembly with last-write-wins entry names |
//! | [`config`] | `config.toml` loading, stock defaults, merging, and validation |
//! | [`naming`] | Fixed archive, manifest, and poster entry names |
//! | [`output`] | CLI formatting: status line, check plan, run summary |
//!
//! # Design Decisions
//!
//! ## Skip Data Problems, Fail on Rendering Problems
//!
//! A row with a blank field or an unknown photo is skipped with a warning and
//! listed in the manifest. A photo that exists but cannot be decoded is a
//! different kind of problem: by default the whole run aborts and no archive
//! is written. Setting `processing.on_render_error = "skip"` turns those into
//! manifest entries as well.
//!
//! ## Explicit Surface
//!
//! Each render worker owns a [`render::Surface`]. The only way to draw on it is
//! [`render::Surface::begin`], which clears it first, so a poster can never
//! show pixels from the previous one.
//!
//! ## Ordered Parallelism
//!
//! Posters render on a rayon pool sized by `processing.max_processes`, but the
//! archive is assembled from results in spreadsheet order. The same inputs
//! always produce the same archive layout.
//!
//! ## Name Collisions
//!
//! Two rows with the same school and major map to the same entry name. The
//! later row wins and the collision is logged.

pub mod archive;
pub mod assets;
pub mod config;
pub mod naming;
pub mod output;
pub mod pipeline;
pub mod render;
pub mod table;

#[cfg(test)]
pub(crate) mod test_helpers;
