//! Caption rasterisation.
//!
//! Captions are described as a tiny SVG document (one `<text>` per line),
//! laid out by `usvg` against a shared font database and rasterised by
//! `resvg` into a transparent layer, which is then alpha-blended onto the
//! poster. Shaping, CJK fallback and bold synthesis all come from the
//! resvg text stack; nothing here measures glyphs itself.

use super::backend::RenderError;
use super::layout::TextAnchor;
use crate::config::TextConfig;
use image::{Rgba, RgbaImage};
use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;
use usvg::fontdb;

const GENERIC_FAMILIES: &[&str] = &["serif", "sans-serif", "cursive", "fantasy", "monospace"];

/// One line of caption text.
#[derive(Debug, Clone, Copy)]
pub struct TextRun<'a> {
    pub text: &'a str,
    pub anchor: TextAnchor,
}

pub struct TextPainter {
    fontdb: Arc<fontdb::Database>,
    font_family: String,
    font_size: u32,
    font_weight: String,
    color: String,
    fallback: Option<String>,
}

impl TextPainter {
    /// Load system fonts plus the optional configured font file.
    pub fn new(config: &TextConfig) -> Result<Self, RenderError> {
        let mut db = fontdb::Database::new();
        db.load_system_fonts();
        let preferred = match &config.font_file {
            Some(path) => Some(load_font_file(&mut db, path)?),
            None => None,
        };
        Self::with_database(db, config, preferred)
    }

    /// Build a painter over an already populated font database.
    ///
    /// When none of the configured families has an installed face, the
    /// generic families are pointed at `preferred` (or the best installed
    /// family) and that family is appended to the caption stack. With no
    /// installed face to fall back on it is an error.
    pub fn with_database(
        mut db: fontdb::Database,
        config: &TextConfig,
        preferred: Option<String>,
    ) -> Result<Self, RenderError> {
        let mut families = config.font_family.clone();
        let fallback = if resolves_any(&db, &families) {
            None
        } else {
            let name = preferred.or_else(|| installed_family(&db)).ok_or_else(|| {
                RenderError::Font(
                    "no fonts installed for captions; set text.font_file".to_string(),
                )
            })?;
            tracing::warn!(
                requested = ?families,
                used = %name,
                "caption fonts not installed, using fallback"
            );
            db.set_sans_serif_family(name.clone());
            db.set_serif_family(name.clone());
            families.push(name.clone());
            Some(name)
        };
        tracing::debug!(faces = db.len(), "loaded fonts");

        Ok(Self {
            fontdb: Arc::new(db),
            font_family: css_font_family(&families),
            font_size: config.font_size,
            font_weight: config.font_weight.clone(),
            color: config.color.clone(),
            fallback,
        })
    }

    /// Family used in place of the configured stack, if it had to be replaced.
    pub fn fallback(&self) -> Option<&str> {
        self.fallback.as_deref()
    }

    /// SVG document drawing `runs` on a `width`×`height` transparent canvas.
    pub fn svg_markup(&self, width: u32, height: u32, runs: &[TextRun<'_>]) -> String {
        let mut svg = format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{height}" viewBox="0 0 {width} {height}">"#
        );
        for run in runs.iter().filter(|r| !r.text.is_empty()) {
            let _ = write!(
                svg,
                r#"<text x="{}" y="{}" font-family="{}" font-size="{}" font-weight="{}" fill="{}" text-anchor="start" xml:space="preserve">{}</text>"#,
                run.anchor.x,
                run.anchor.y,
                escape_xml(&self.font_family),
                self.font_size,
                escape_xml(&self.font_weight),
                escape_xml(&self.color),
                escape_xml(run.text),
            );
        }
        svg.push_str("</svg>");
        svg
    }

    /// Draw `runs` onto `canvas`, blending over what is already there.
    pub fn draw(&self, canvas: &mut RgbaImage, runs: &[TextRun<'_>]) -> Result<(), RenderError> {
        if runs.iter().all(|r| r.text.is_empty()) {
            return Ok(());
        }
        let (width, height) = canvas.dimensions();
        let svg = self.svg_markup(width, height, runs);

        let options = usvg::Options {
            fontdb: Arc::clone(&self.fontdb),
            ..Default::default()
        };
        let tree = usvg::Tree::from_str(&svg, &options)
            .map_err(|e| RenderError::ProcessingFailed(format!("caption layout failed: {e}")))?;

        let mut pixmap = resvg::tiny_skia::Pixmap::new(width, height).ok_or_else(|| {
            RenderError::ProcessingFailed("failed to allocate caption pixmap".into())
        })?;
        resvg::render(
            &tree,
            resvg::tiny_skia::Transform::identity(),
            &mut pixmap.as_mut(),
        );

        // tiny-skia stores premultiplied pixels; the image crate blends straight alpha.
        let layer = RgbaImage::from_fn(width, height, |x, y| match pixmap.pixel(x, y) {
            Some(p) if p.alpha() > 0 => {
                let c = p.demultiply();
                Rgba([c.red(), c.green(), c.blue(), c.alpha()])
            }
            _ => Rgba([0, 0, 0, 0]),
        });
        image::imageops::overlay(canvas, &layer, 0, 0);
        Ok(())
    }
}

/// Load `path` into `db` and return the family name of its first face.
fn load_font_file(db: &mut fontdb::Database, path: &Path) -> Result<String, RenderError> {
    let mut single = fontdb::Database::new();
    single
        .load_font_file(path)
        .map_err(|e| RenderError::Font(format!("cannot load font {}: {e}", path.display())))?;
    let family = single
        .faces()
        .find_map(|face| face.families.first().map(|(name, _)| name.clone()))
        .ok_or_else(|| RenderError::Font(format!("{} holds no font faces", path.display())))?;
    db.load_font_file(path)
        .map_err(|e| RenderError::Font(format!("cannot load font {}: {e}", path.display())))?;
    Ok(family)
}

fn family_of(name: &str) -> fontdb::Family<'_> {
    match name {
        "serif" => fontdb::Family::Serif,
        "sans-serif" => fontdb::Family::SansSerif,
        "cursive" => fontdb::Family::Cursive,
        "fantasy" => fontdb::Family::Fantasy,
        "monospace" => fontdb::Family::Monospace,
        named => fontdb::Family::Name(named),
    }
}

/// Whether any family of the stack has an installed face.
fn resolves_any(db: &fontdb::Database, families: &[String]) -> bool {
    families.iter().any(|name| {
        db.query(&fontdb::Query {
            families: &[family_of(name)],
            weight: fontdb::Weight::NORMAL,
            stretch: fontdb::Stretch::Normal,
            style: fontdb::Style::Normal,
        })
        .is_some()
    })
}

/// Installed family to stand in for a missing stack: the first sans family
/// by name, else the first family by name.
fn installed_family(db: &fontdb::Database) -> Option<String> {
    let names: BTreeSet<&str> = db
        .faces()
        .flat_map(|face| face.families.iter().map(|(name, _)| name.as_str()))
        .collect();
    names
        .iter()
        .find(|name| name.contains("Sans") && !name.contains("Mono"))
        .or_else(|| names.iter().next())
        .map(|name| name.to_string())
}

/// CSS `font-family` value: named families quoted, generic ones bare.
fn css_font_family(families: &[String]) -> String {
    families
        .iter()
        .map(|f| {
            if GENERIC_FAMILIES.contains(&f.as_str()) {
                f.clone()
            } else {
                format!("'{}'", f.replace('\'', ""))
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}
