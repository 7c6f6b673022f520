//! Tiling compositor.
//!
//! Fills the panel, enters a frame centred on the panel and rotated by the
//! design rotation, tiles the background image and the logo over a fixed
//! 200×200 grid in that frame, then draws the axis-aligned overlays.

use tiny_skia::{
    FilterQuality, Paint, PathBuilder, Pixmap, PixmapPaint, Point, Rect, Stroke, Transform,
};

use crate::error::{Error, Result};
use crate::image_cache::RasterHandle;
use crate::panel::{Overlay, Panel};
use crate::params::{BanderoleParameters, DesignParameters, Rgb};
use crate::text::{FontBook, TextLayer, TextMeasure};
use crate::units::{Density, cm_to_pixels};

/// Tile indices run over `GRID_FIRST..GRID_END` on both axes, independent of panel size.
pub const GRID_FIRST: i32 = -100;
pub const GRID_END: i32 = 100;

/// Decoded images one render pass reads. Missing or undecoded handles are skipped.
#[derive(Clone, Debug, Default)]
pub struct PanelImages {
    pub logo: RasterHandle,
    pub background: RasterHandle,
    pub banderole_logo: RasterHandle,
}

/// Finished pixel buffer of one panel.
#[derive(Clone, Debug)]
pub struct RenderOutput {
    pub panel: String,
    pub pixmap: Pixmap,
}

impl RenderOutput {
    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TileStats {
    pub drawn: u32,
    pub culled: u32,
}

/// Size and placement of logo tiles in the rotated frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TileGeometry {
    pub width: f32,
    pub height: f32,
    /// Uniform scale from natural to rendered size; 1 while undecoded.
    pub scale: f32,
    pub x_gap: f32,
    pub y_gap: f32,
    pub stagger: f32,
}

impl TileGeometry {
    pub fn new(params: &DesignParameters, logo: &RasterHandle) -> Self {
        let target = params.logo_target_width_px;
        let (nw, nh) = (logo.natural_width(), logo.natural_height());
        let (width, height, scale) = if nw == 0 {
            (target, target, 1.0)
        } else {
            let scale = target / nw as f32;
            (nw as f32 * scale, nh as f32 * scale, scale)
        };
        TileGeometry {
            width,
            height,
            scale,
            x_gap: params.x_gap_px,
            y_gap: params.y_gap_px,
            stagger: params.x_stagger_offset_px,
        }
    }

    /// Top-left corner of tile `(i, j)` relative to the rotated origin.
    pub fn origin(&self, i: i32, j: i32) -> (f32, f32) {
        let odd_row = j.rem_euclid(2) == 1;
        let x = i as f32 * self.width + i as f32 * self.x_gap + if odd_row { self.stagger } else { 0.0 };
        let y = j as f32 * self.height + j as f32 * self.y_gap;
        (x, y)
    }
}

/// Folds any angle into (−180, 180] so equivalent angles give identical transforms.
pub fn normalize_degrees(deg: f32) -> f32 {
    let d = deg.rem_euclid(360.0);
    if d > 180.0 { d - 360.0 } else { d }
}

/// Origin at the buffer centre, rotated by `rotation_deg`.
pub fn pattern_frame(width: u32, height: u32, rotation_deg: f32) -> Transform {
    Transform::from_translate(width as f32 / 2.0, height as f32 / 2.0)
        .pre_rotate(normalize_degrees(rotation_deg))
}

/// Renders one panel at `density`.
pub fn render(
    panel: &Panel,
    params: &DesignParameters,
    banderole: &BanderoleParameters,
    images: &PanelImages,
    fonts: &FontBook,
    density: Density,
) -> Result<RenderOutput> {
    params.validate()?;
    let (width, height) = panel.pixel_size(params, density);
    let mut pixmap = Pixmap::new(width, height).ok_or(Error::PixmapAlloc { width, height })?;

    let stats = if panel.pattern {
        draw_pattern(&mut pixmap, params, &images.logo, &images.background)
    } else {
        pixmap.fill(Rgb::WHITE.to_color());
        TileStats::default()
    };

    for overlay in &panel.overlays {
        match overlay {
            Overlay::Border { color, width_px } => draw_border(&mut pixmap, *color, *width_px),
            Overlay::DimensionLabel { color, size_px } => {
                if let Some((w_cm, h_cm)) = panel.size_cm(params) {
                    draw_dimension_label(&mut pixmap, fonts, w_cm, h_cm, *color, *size_px);
                }
            }
            Overlay::LabelPatch => {
                draw_label_patch(&mut pixmap, banderole, &images.banderole_logo, density)
            }
            Overlay::Text { color, blocks } => {
                let mut layer = TextLayer::new(24.0, *color);
                for block in blocks {
                    layer.block(fonts, block);
                }
                layer.render(&mut pixmap, fonts);
            }
        }
    }

    log::debug!(
        "rendered panel {} {}x{}: {} tiles drawn, {} culled",
        panel.name,
        width,
        height,
        stats.drawn,
        stats.culled
    );
    Ok(RenderOutput {
        panel: panel.name.clone(),
        pixmap,
    })
}

/// Background fill plus the rotated background/logo tiling. Overwrites the whole buffer.
pub fn draw_pattern(
    pixmap: &mut Pixmap,
    params: &DesignParameters,
    logo: &RasterHandle,
    background: &RasterHandle,
) -> TileStats {
    pixmap.fill(params.background_color.to_color());
    let frame = pattern_frame(pixmap.width(), pixmap.height(), params.rotation_deg);
    let bounds = (pixmap.width() as f32, pixmap.height() as f32);
    let mut paint = PixmapPaint::default();
    paint.quality = FilterQuality::Bilinear;
    let mut stats = TileStats::default();

    if let Some(bg) = background.image() {
        let (bw, bh) = (bg.width() as f32, bg.height() as f32);
        for i in GRID_FIRST..GRID_END {
            for j in GRID_FIRST..GRID_END {
                let ts = frame.pre_translate(i as f32 * bw, j as f32 * bh);
                if !touches(ts, bw, bh, bounds) {
                    stats.culled += 1;
                    continue;
                }
                pixmap.draw_pixmap(0, 0, bg.as_ref(), &paint, ts, None);
                stats.drawn += 1;
            }
        }
    }

    let geom = TileGeometry::new(params, logo);
    // undecoded logo: geometry falls back to target size, nothing to draw
    if let Some(img) = logo.image() {
        for i in GRID_FIRST..GRID_END {
            for j in GRID_FIRST..GRID_END {
                let (x, y) = geom.origin(i, j);
                let ts = frame.pre_translate(x, y);
                if !touches(ts, geom.width, geom.height, bounds) {
                    stats.culled += 1;
                    continue;
                }
                let ts = ts.pre_scale(geom.scale, geom.scale);
                pixmap.draw_pixmap(0, 0, img.as_ref(), &paint, ts, None);
                stats.drawn += 1;
            }
        }
    }
    stats
}

// Whether the w×h rect at the local origin, mapped by `ts`, can touch the buffer.
fn touches(ts: Transform, w: f32, h: f32, (bw, bh): (f32, f32)) -> bool {
    let mut pts = [
        Point::from_xy(0.0, 0.0),
        Point::from_xy(w, 0.0),
        Point::from_xy(0.0, h),
        Point::from_xy(w, h),
    ];
    ts.map_points(&mut pts);
    let (mut minx, mut miny) = (f32::INFINITY, f32::INFINITY);
    let (mut maxx, mut maxy) = (f32::NEG_INFINITY, f32::NEG_INFINITY);
    for p in &pts {
        minx = minx.min(p.x);
        miny = miny.min(p.y);
        maxx = maxx.max(p.x);
        maxy = maxy.max(p.y);
    }
    maxx > 0.0 && maxy > 0.0 && minx < bw && miny < bh
}

fn solid(color: Rgb) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color(color.to_color());
    paint.anti_alias = true;
    paint
}

fn draw_border(pixmap: &mut Pixmap, color: Rgb, width_px: f32) {
    let inset = width_px / 2.0;
    let rect = Rect::from_xywh(
        inset,
        inset,
        pixmap.width() as f32 - width_px,
        pixmap.height() as f32 - width_px,
    );
    let Some(rect) = rect else {
        // border thicker than the panel
        pixmap.fill(color.to_color());
        return;
    };
    let path = PathBuilder::from_rect(rect);
    let stroke = Stroke {
        width: width_px,
        ..Default::default()
    };
    pixmap.stroke_path(&path, &solid(color), &stroke, Transform::identity(), None);
}

fn draw_dimension_label(
    pixmap: &mut Pixmap,
    fonts: &FontBook,
    width_cm: f64,
    height_cm: f64,
    color: Rgb,
    size_px: f32,
) {
    let text = format!("{} cm x {} cm", fmt_cm(width_cm), fmt_cm(height_cm));
    let margin = size_px;
    let x = (pixmap.width() as f32 - fonts.measure(&text, size_px, false) - margin).max(0.0);
    let y = pixmap.height() as f32 - margin;
    let mut layer = TextLayer::new(size_px, color);
    layer.wrap_text(fonts, &text, x, y, f32::INFINITY, size_px, false);
    layer.render(pixmap, fonts);
}

// whole centimetres print without decimals
fn fmt_cm(v: f64) -> String {
    if (v - v.round()).abs() < 1e-6 {
        format!("{:.0}", v)
    } else {
        format!("{:.2}", v)
            .trim_end_matches('0')
            .trim_end_matches('.')
            .to_string()
    }
}

/// White patch of fixed physical size at the panel centre, with the banderole
/// logo rotated about its own centre and shifted by its offset.
pub fn draw_label_patch(
    pixmap: &mut Pixmap,
    banderole: &BanderoleParameters,
    logo: &RasterHandle,
    density: Density,
) {
    let (cx, cy) = (pixmap.width() as f32 / 2.0, pixmap.height() as f32 / 2.0);
    let pw = cm_to_pixels(banderole.patch_width_cm, density) as f32;
    let ph = cm_to_pixels(banderole.patch_height_cm, density) as f32;
    if let Some(rect) = Rect::from_xywh(cx - pw / 2.0, cy - ph / 2.0, pw, ph) {
        let mut paint = solid(Rgb::WHITE);
        paint.anti_alias = false;
        pixmap.fill_rect(rect, &paint, Transform::identity(), None);
    }

    let Some(img) = logo.image() else {
        return;
    };
    let target = banderole.logo_target_width_px;
    if !target.is_finite() || target <= 0.0 {
        log::warn!("banderole logo width {target} is not positive; skipping logo");
        return;
    }
    let scale = target / img.width() as f32;
    let (w, h) = (img.width() as f32 * scale, img.height() as f32 * scale);
    let ts = Transform::from_translate(cx + banderole.offset_x_px, cy + banderole.offset_y_px)
        .pre_rotate(normalize_degrees(banderole.rotation_deg))
        .pre_translate(-w / 2.0, -h / 2.0)
        .pre_scale(scale, scale);
    let mut paint = PixmapPaint::default();
    paint.quality = FilterQuality::Bilinear;
    pixmap.draw_pixmap(0, 0, img.as_ref(), &paint, ts, None);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_logo(w: u32, h: u32, color: Rgb) -> RasterHandle {
        let mut p = Pixmap::new(w, h).unwrap();
        p.fill(color.to_color());
        RasterHandle::from_pixmap(p)
    }

    #[test]
    fn geometry_scales_from_target_width() {
        let params = DesignParameters {
            logo_target_width_px: 200.0,
            ..Default::default()
        };
        let g = TileGeometry::new(&params, &solid_logo(100, 50, Rgb::RED));
        assert_eq!((g.width, g.height, g.scale), (200.0, 100.0, 2.0));
        assert_eq!(g.origin(0, 0), (0.0, 0.0));
        assert_eq!(g.origin(1, 0), (200.0, 0.0));
        assert_eq!(g.origin(-1, 2), (-200.0, 200.0));
    }

    #[test]
    fn undecoded_logo_falls_back_to_square_target() {
        let params = DesignParameters {
            logo_target_width_px: 80.0,
            ..Default::default()
        };
        let g = TileGeometry::new(&params, &RasterHandle::empty());
        assert_eq!((g.width, g.height, g.scale), (80.0, 80.0, 1.0));
    }

    #[test]
    fn stagger_applies_to_odd_rows_including_negative() {
        let params = DesignParameters {
            logo_target_width_px: 10.0,
            x_gap_px: 5.0,
            y_gap_px: 3.0,
            x_stagger_offset_px: 7.0,
            ..Default::default()
        };
        let g = TileGeometry::new(&params, &solid_logo(10, 10, Rgb::RED));
        assert_eq!(g.origin(2, 0), (30.0, 0.0));
        assert_eq!(g.origin(2, 1), (37.0, 13.0));
        assert_eq!(g.origin(2, -1), (37.0, -13.0));
        assert_eq!(g.origin(2, -2), (30.0, -26.0));
    }

    #[test]
    fn angles_fold_into_half_open_range() {
        assert_eq!(normalize_degrees(-180.0), 180.0);
        assert_eq!(normalize_degrees(180.0), 180.0);
        assert_eq!(normalize_degrees(540.0), 180.0);
        assert_eq!(normalize_degrees(-90.0), -90.0);
        assert_eq!(normalize_degrees(270.0), -90.0);
        assert_eq!(normalize_degrees(0.0), 0.0);
    }

    #[test]
    fn culling_keeps_only_visible_tiles() {
        let frame = pattern_frame(100, 100, 0.0);
        assert!(touches(frame, 10.0, 10.0, (100.0, 100.0)));
        assert!(!touches(frame.pre_translate(60.0, 0.0), 10.0, 10.0, (100.0, 100.0)));
        assert!(!touches(frame.pre_translate(-60.0, 0.0), 10.0, 10.0, (100.0, 100.0)));
        assert!(touches(frame.pre_translate(-55.0, -55.0), 10.0, 10.0, (100.0, 100.0)));
    }

    #[test]
    fn dimension_text_trims_decimals() {
        assert_eq!(fmt_cm(25.0), "25");
        assert_eq!(fmt_cm(25.5), "25.5");
        assert_eq!(fmt_cm(18.25), "18.25");
    }
}
