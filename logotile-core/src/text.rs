//! Word-wrapped informational text for auxiliary panels.
//!
//! Lines are laid out against a `TextMeasure`, collected in a `TextLayer`,
//! and finally emitted as SVG `<text>` nodes rasterised by resvg.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tiny_skia::{Pixmap, Transform};
use usvg::fontdb;

use crate::params::Rgb;

/// Environment variable naming a font file to use instead of system fonts.
pub const FONT_ENV: &str = "LOGOTILE_FONT";

/// Advance used when no font face is available, in em.
const FALLBACK_ADVANCE_EM: f32 = 0.55;

pub trait TextMeasure {
    /// Rendered width of `text` in pixels. Bold changes the weight only, never the size.
    fn measure(&self, text: &str, size_px: f32, bold: bool) -> f32;
}

/// Font database shared by text measurement and drawing.
#[derive(Clone)]
pub struct FontBook {
    db: Arc<fontdb::Database>,
}

impl FontBook {
    /// No faces: measurement uses the fixed fallback advance and drawing is skipped.
    pub fn empty() -> Self {
        FontBook {
            db: Arc::new(fontdb::Database::new()),
        }
    }

    pub fn system() -> Self {
        let mut db = fontdb::Database::new();
        db.load_system_fonts();
        Self::finish(db, false)
    }

    /// Explicit font file, else `LOGOTILE_FONT`, else system fonts.
    pub fn load(font_file: Option<&Path>) -> Self {
        let env_file = std::env::var_os(FONT_ENV);
        let file = font_file.or(env_file.as_deref().map(Path::new));
        if let Some(path) = file {
            let mut db = fontdb::Database::new();
            match db.load_font_file(path) {
                Ok(()) => return Self::finish(db, true),
                Err(e) => log::warn!("cannot load font {}: {e}; using system fonts", path.display()),
            }
        }
        Self::system()
    }

    fn finish(mut db: fontdb::Database, force_sans: bool) -> Self {
        let sans_missing = db
            .query(&fontdb::Query {
                families: &[fontdb::Family::SansSerif],
                ..Default::default()
            })
            .is_none();
        // Map generic 'sans-serif' to a loaded family so SVG text resolves
        if force_sans || sans_missing {
            let family = db
                .faces()
                .next()
                .and_then(|face| face.families.first().map(|(n, _)| n.clone()));
            if let Some(name) = family {
                db.set_sans_serif_family(name);
            }
        }
        if db.is_empty() {
            log::warn!("no fonts available; panel text will not be drawn");
        }
        FontBook { db: Arc::new(db) }
    }

    pub fn database(&self) -> Arc<fontdb::Database> {
        self.db.clone()
    }

    pub fn has_faces(&self) -> bool {
        !self.db.is_empty()
    }

    fn face_width(&self, text: &str, size_px: f32, bold: bool) -> Option<f32> {
        let weight = if bold {
            fontdb::Weight::BOLD
        } else {
            fontdb::Weight::NORMAL
        };
        let id = self.db.query(&fontdb::Query {
            families: &[fontdb::Family::SansSerif],
            weight,
            ..Default::default()
        })?;
        self.db
            .with_face_data(id, |data, index| {
                let face = ttf_parser::Face::parse(data, index).ok()?;
                let upem = face.units_per_em() as f32;
                let missing = face.units_per_em() / 2;
                let units: u32 = text
                    .chars()
                    .map(|c| {
                        face.glyph_index(c)
                            .and_then(|g| face.glyph_hor_advance(g))
                            .unwrap_or(missing) as u32
                    })
                    .sum();
                Some(units as f32 * size_px / upem)
            })
            .flatten()
    }
}

impl TextMeasure for FontBook {
    fn measure(&self, text: &str, size_px: f32, bold: bool) -> f32 {
        self.face_width(text, size_px, bold)
            .unwrap_or_else(|| text.chars().count() as f32 * size_px * FALLBACK_ADVANCE_EM)
    }
}

/// Greedy word wrap. A word that alone exceeds `max_width_px` still gets its
/// own line. The final line is always emitted, so empty text yields one empty line.
pub fn wrap_lines<M: TextMeasure + ?Sized>(
    measure: &M,
    text: &str,
    max_width_px: f32,
    size_px: f32,
    bold: bool,
) -> Vec<String> {
    let mut lines = Vec::new();
    let mut line = String::new();
    for word in text.split_whitespace() {
        if line.is_empty() {
            line.push_str(word);
            continue;
        }
        let candidate = format!("{line} {word}");
        if measure.measure(&candidate, size_px, bold) <= max_width_px {
            line = candidate;
        } else {
            lines.push(std::mem::replace(&mut line, word.to_string()));
        }
    }
    lines.push(line);
    lines
}

#[derive(Clone, Debug, PartialEq)]
pub struct PlacedLine {
    pub text: String,
    pub x: f32,
    /// Baseline.
    pub y: f32,
    pub size_px: f32,
    pub bold: bool,
    pub color: Rgb,
}

/// A fixed informational section: bold title, regular paragraphs, blank spacer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextBlock {
    pub title: String,
    pub paragraphs: Vec<String>,
    pub x: f32,
    pub y: f32,
    pub max_width_px: f32,
    pub line_height_px: f32,
    pub size_px: f32,
}

impl Default for TextBlock {
    fn default() -> Self {
        TextBlock {
            title: String::new(),
            paragraphs: Vec::new(),
            x: 0.0,
            y: 0.0,
            max_width_px: 600.0,
            line_height_px: 30.0,
            size_px: 24.0,
        }
    }
}

#[derive(Clone, Debug)]
pub struct TextLayer {
    pub lines: Vec<PlacedLine>,
    pub size_px: f32,
    pub color: Rgb,
}

impl Default for TextLayer {
    fn default() -> Self {
        TextLayer::new(24.0, Rgb::BLACK)
    }
}

impl TextLayer {
    pub fn new(size_px: f32, color: Rgb) -> Self {
        TextLayer {
            lines: Vec::new(),
            size_px,
            color,
        }
    }

    /// Wraps `text` starting at baseline `y` and returns the baseline after the last line.
    #[allow(clippy::too_many_arguments)]
    pub fn wrap_text<M: TextMeasure + ?Sized>(
        &mut self,
        measure: &M,
        text: &str,
        x: f32,
        y: f32,
        max_width_px: f32,
        line_height_px: f32,
        bold: bool,
    ) -> f32 {
        let mut y = y;
        for line in wrap_lines(measure, text, max_width_px, self.size_px, bold) {
            if !line.is_empty() {
                self.lines.push(PlacedLine {
                    text: line,
                    x,
                    y,
                    size_px: self.size_px,
                    bold,
                    color: self.color,
                });
            }
            y += line_height_px;
        }
        y
    }

    pub fn block<M: TextMeasure + ?Sized>(&mut self, measure: &M, block: &TextBlock) -> f32 {
        let saved = self.size_px;
        self.size_px = block.size_px;
        let (x, w, lh) = (block.x, block.max_width_px, block.line_height_px);
        let mut y = self.wrap_text(measure, &block.title, x, block.y, w, lh, true);
        for p in &block.paragraphs {
            y = self.wrap_text(measure, p, x, y, w, lh, false);
        }
        y = self.wrap_text(measure, "", x, y, w, lh, false);
        self.size_px = saved;
        y
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn to_svg(&self, width: u32, height: u32) -> String {
        let mut s = String::new();
        s.push_str(&format!(
            "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{width}\" height=\"{height}\" viewBox=\"0 0 {width} {height}\" font-family=\"sans-serif\">\n"
        ));
        for l in &self.lines {
            s.push_str(&format!(
                "<text x=\"{:.2}\" y=\"{:.2}\" font-size=\"{:.2}\" font-weight=\"{}\" fill=\"{}\">{}</text>\n",
                l.x,
                l.y,
                l.size_px,
                if l.bold { "bold" } else { "normal" },
                l.color.to_hex(),
                svg_escape(&l.text)
            ));
        }
        s.push_str("</svg>\n");
        s
    }

    /// Draws every collected line onto `pixmap` in its own (axis-aligned) coordinates.
    pub fn render(&self, pixmap: &mut Pixmap, fonts: &FontBook) {
        if self.lines.is_empty() {
            return;
        }
        if !fonts.has_faces() {
            log::warn!("skipping {} text line(s): no fonts loaded", self.lines.len());
            return;
        }
        let svg = self.to_svg(pixmap.width(), pixmap.height());
        let mut opt = usvg::Options::default();
        opt.fontdb = fonts.database();
        match usvg::Tree::from_str(&svg, &opt) {
            Ok(tree) => resvg::render(&tree, Transform::identity(), &mut pixmap.as_mut()),
            Err(e) => log::warn!("text layer did not parse: {e}"),
        }
    }
}

fn svg_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

pub fn care_instructions(x: f32, y: f32, max_width_px: f32) -> TextBlock {
    TextBlock {
        title: "Care instructions".to_string(),
        paragraphs: vec![
            "Wash at 30 °C with similar colours, inside out.".to_string(),
            "Do not bleach. Do not tumble dry. Iron on low heat on the reverse side only, never directly on the print. Do not dry clean.".to_string(),
        ],
        x,
        y,
        max_width_px,
        ..Default::default()
    }
}

pub fn company_address(x: f32, y: f32, max_width_px: f32) -> TextBlock {
    TextBlock {
        title: "Manufacturer".to_string(),
        paragraphs: vec![
            "Musterdruck GmbH".to_string(),
            "Industriestraße 12, 70565 Stuttgart, Germany".to_string(),
            "info@musterdruck.example".to_string(),
        ],
        x,
        y,
        max_width_px,
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Every character is 10px wide regardless of size or weight.
    struct Fixed;

    impl TextMeasure for Fixed {
        fn measure(&self, text: &str, _size_px: f32, _bold: bool) -> f32 {
            text.chars().count() as f32 * 10.0
        }
    }

    #[test]
    fn wraps_greedily() {
        let lines = wrap_lines(&Fixed, "aaa bbb ccc ddd", 75.0, 24.0, false);
        assert_eq!(lines, vec!["aaa bbb", "ccc ddd"]);
    }

    #[test]
    fn exact_fit_stays_on_line() {
        let lines = wrap_lines(&Fixed, "aaa bbb", 70.0, 24.0, false);
        assert_eq!(lines, vec!["aaa bbb"]);
    }

    #[test]
    fn narrow_width_puts_each_word_on_its_own_line() {
        let lines = wrap_lines(&Fixed, "alpha beta gamma", 5.0, 24.0, true);
        assert_eq!(lines, vec!["alpha", "beta", "gamma"]);
    }

    #[test]
    fn empty_text_is_one_blank_line() {
        assert_eq!(wrap_lines(&Fixed, "", 100.0, 24.0, false), vec![String::new()]);
    }

    #[test]
    fn wrap_text_advances_baseline() {
        let mut layer = TextLayer::default();
        let next = layer.wrap_text(&Fixed, "aaa bbb ccc", 10.0, 100.0, 75.0, 30.0, false);
        assert_eq!(next, 160.0);
        assert_eq!(layer.lines.len(), 2);
        assert_eq!(layer.lines[0].y, 100.0);
        assert_eq!(layer.lines[1].y, 130.0);
        assert_eq!(layer.lines[1].text, "ccc");
    }

    #[test]
    fn block_is_title_paragraphs_and_spacer() {
        let mut layer = TextLayer::default();
        let block = TextBlock {
            title: "Title".into(),
            paragraphs: vec!["one two".into(), "three".into()],
            x: 0.0,
            y: 50.0,
            max_width_px: 1000.0,
            line_height_px: 20.0,
            size_px: 18.0,
        };
        let next = layer.block(&Fixed, &block);
        // title + 2 paragraphs + spacer
        assert_eq!(next, 50.0 + 4.0 * 20.0);
        assert_eq!(layer.lines.len(), 3);
        assert!(layer.lines[0].bold);
        assert!(!layer.lines[1].bold);
        assert_eq!(layer.lines[2].size_px, 18.0);
        assert_eq!(layer.size_px, 24.0);
    }

    #[test]
    fn empty_font_book_uses_fallback_advance() {
        let fonts = FontBook::empty();
        assert_eq!(fonts.measure("abcd", 10.0, false), 4.0 * 10.0 * FALLBACK_ADVANCE_EM);
        assert_eq!(fonts.measure("abcd", 10.0, true), fonts.measure("abcd", 10.0, false));
    }

    #[test]
    fn svg_output_escapes_text() {
        let mut layer = TextLayer::default();
        layer.wrap_text(&Fixed, "A&B <c>", 0.0, 10.0, 1000.0, 10.0, true);
        let svg = layer.to_svg(100, 50);
        assert!(svg.contains("A&amp;B &lt;c&gt;"));
        assert!(svg.contains("font-weight=\"bold\""));
    }

    #[test]
    fn render_without_fonts_leaves_pixmap_untouched() {
        let mut layer = TextLayer::default();
        layer.wrap_text(&Fixed, "hello", 0.0, 20.0, 1000.0, 10.0, false);
        let mut pixmap = Pixmap::new(50, 30).unwrap();
        layer.render(&mut pixmap, &FontBook::empty());
        assert!(pixmap.data().iter().all(|&b| b == 0));
    }
}
