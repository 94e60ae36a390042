//! Photo lookup by file name.
//!
//! The spreadsheet's `image` column names a photo by its bare file name
//! (`a.jpg`). [`AssetIndex`] maps those names to [`Asset`] handles built from
//! whatever the user passed on the command line:
//!
//! - a file is indexed under its own file name, whatever its extension;
//! - a directory is walked recursively and every file with a decodable image
//!   extension is indexed, in file-name order.
//!
//! Lookups are exact (case- and extension-sensitive). When two inputs share a
//! file name the later one wins. Nothing is decoded while indexing; decoding
//! happens per row in [`Asset::decode`].

use crate::render::RenderError;
use image::{DynamicImage, ImageFormat, ImageReader};
use std::collections::HashMap;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

/// Extensions picked up when walking a directory.
const IMAGE_CANDIDATES: &[(&str, ImageFormat)] = &[
    ("jpg", ImageFormat::Jpeg),
    ("jpeg", ImageFormat::Jpeg),
    ("png", ImageFormat::Png),
    ("webp", ImageFormat::WebP),
    ("gif", ImageFormat::Gif),
    ("bmp", ImageFormat::Bmp),
    ("tif", ImageFormat::Tiff),
    ("tiff", ImageFormat::Tiff),
];

/// Returns true if `path` has an extension whose decoder is compiled in.
pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| {
            IMAGE_CANDIDATES.iter().any(|(candidate, fmt)| {
                ext.eq_ignore_ascii_case(candidate) && fmt.reading_enabled()
            })
        })
}

/// Handle to one user photo. Cheap to clone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Asset {
    File(PathBuf),
    Memory(Arc<[u8]>),
}

impl Asset {
    /// Decode the photo, sniffing the format from its content.
    pub fn decode(&self) -> Result<DynamicImage, RenderError> {
        match self {
            Asset::File(path) => ImageReader::open(path)?
                .with_guessed_format()?
                .decode()
                .map_err(|e| RenderError::Decode(format!("{}: {e}", path.display()))),
            Asset::Memory(bytes) => ImageReader::new(Cursor::new(bytes.as_ref()))
                .with_guessed_format()?
                .decode()
                .map_err(|e| RenderError::Decode(e.to_string())),
        }
    }
}

/// File name → photo handle.
#[derive(Debug, Default)]
pub struct AssetIndex {
    assets: HashMap<String, Asset>,
}

impl AssetIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index files and directories. Unreadable directory entries are skipped.
    pub fn from_paths(paths: &[PathBuf]) -> std::io::Result<Self> {
        let mut index = Self::new();
        for path in paths {
            if path.is_dir() {
                for entry in WalkDir::new(path)
                    .follow_links(true)
                    .sort_by_file_name()
                    .into_iter()
                    .filter_map(|e| e.ok())
                {
                    let file = entry.path();
                    if file.is_file() && is_supported_image(file) {
                        index.insert_file(file);
                    }
                }
            } else if path.is_file() {
                index.insert_file(path);
            } else {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("image input not found: {}", path.display()),
                ));
            }
        }
        tracing::debug!(assets = index.len(), "indexed photos");
        Ok(index)
    }

    fn insert_file(&mut self, path: &Path) {
        if let Some(name) = path.file_name() {
            self.insert(&name.to_string_lossy(), Asset::File(path.to_path_buf()));
        }
    }

    /// Register an asset under `name`, replacing any previous one.
    pub fn insert(&mut self, name: &str, asset: Asset) {
        if self.assets.insert(name.to_string(), asset).is_some() {
            tracing::debug!(name, "duplicate photo name, keeping the later file");
        }
    }

    pub fn get(&self, name: &str) -> Option<&Asset> {
        self.assets.get(name)
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{jpeg_bytes, png_bytes};
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn supported_extensions_are_case_insensitive() {
        assert!(is_supported_image(Path::new("a.JPG")));
        assert!(is_supported_image(Path::new("dir/b.png")));
        assert!(!is_supported_image(Path::new("notes.txt")));
        assert!(!is_supported_image(Path::new("no_extension")));
    }

    #[test]
    fn directory_walk_indexes_images_only() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.jpg"), jpeg_bytes(4, 4, [1, 2, 3])).unwrap();
        fs::write(tmp.path().join("b.png"), png_bytes(4, 4, [1, 2, 3])).unwrap();
        fs::write(tmp.path().join("readme.txt"), "hi").unwrap();

        let index = AssetIndex::from_paths(&[tmp.path().to_path_buf()]).unwrap();
        assert_eq!(index.len(), 2);
        assert!(index.get("a.jpg").is_some());
        assert!(index.get("b.png").is_some());
        assert!(index.get("readme.txt").is_none());
    }

    #[test]
    fn explicit_file_is_indexed_regardless_of_extension() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("photo.dat");
        fs::write(&path, png_bytes(2, 2, [0, 0, 0])).unwrap();

        let index = AssetIndex::from_paths(&[path.clone()]).unwrap();
        assert_eq!(index.get("photo.dat"), Some(&Asset::File(path)));
    }

    #[test]
    fn lookup_is_exact() {
        let mut index = AssetIndex::new();
        index.insert("a.jpg", Asset::Memory(Arc::from(vec![1u8])));
        assert!(index.get("a.jpg").is_some());
        assert!(index.get("A.jpg").is_none());
        assert!(index.get("a.jpeg").is_none());
        assert!(index.get("a").is_none());
    }

    #[test]
    fn later_duplicate_wins() {
        let tmp = TempDir::new().unwrap();
        let first = tmp.path().join("one");
        let second = tmp.path().join("two");
        fs::create_dir_all(&first).unwrap();
        fs::create_dir_all(&second).unwrap();
        fs::write(first.join("a.png"), png_bytes(2, 2, [0, 0, 0])).unwrap();
        fs::write(second.join("a.png"), png_bytes(2, 2, [9, 9, 9])).unwrap();

        let index = AssetIndex::from_paths(&[first, second.clone()]).unwrap();
        assert_eq!(index.len(), 1);
        assert_eq!(index.get("a.png"), Some(&Asset::File(second.join("a.png"))));
    }

    #[test]
    fn missing_input_path_errors() {
        let result = AssetIndex::from_paths(&[PathBuf::from("/nonexistent/photos")]);
        assert!(result.is_err());
    }

    #[test]
    fn decode_sniffs_format_from_content() {
        let tmp = TempDir::new().unwrap();
        // PNG content behind a .jpg name still decodes.
        let path = tmp.path().join("mislabelled.jpg");
        fs::write(&path, png_bytes(5, 3, [10, 20, 30])).unwrap();

        let img = Asset::File(path).decode().unwrap();
        assert_eq!((img.width(), img.height()), (5, 3));
    }

    #[test]
    fn decode_corrupt_bytes_is_decode_error() {
        let asset = Asset::Memory(Arc::from(b"not an image".to_vec()));
        assert!(matches!(asset.decode(), Err(RenderError::Decode(_))));
    }
}
