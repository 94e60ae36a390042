//! Fixed file names.
//!
//! Every poster lands in the archive as `喜报-{school}-{major}.png`, and the
//! archive itself is always called `批量生成的海报.zip`. Neither is
//! configurable: downstream users sort and share these files by name.

/// File name of the archive written to the output directory.
pub const ARCHIVE_NAME: &str = "批量生成的海报.zip";

/// File name of the run manifest written next to the archive.
pub const MANIFEST_NAME: &str = "manifest.json";

/// Background template looked up in the project directory.
pub const BACKGROUND_NAME: &str = "background.png";

/// Archive entry name for one poster.
///
/// The values are used verbatim, so two rows with the same school and major
/// map to the same entry.
pub fn poster_entry_name(school: &str, major: &str) -> String {
    format!("喜报-{school}-{major}.png")
}
