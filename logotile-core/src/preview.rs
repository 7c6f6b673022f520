use tiny_skia::{BlendMode, FilterQuality, Pixmap, PixmapPaint, Transform};

use crate::error::{Error, Result};
use crate::units::REFERENCE_FULL_PX;

/// Viewports wider than this are height-driven, narrower ones width-driven.
pub const WIDE_VIEWPORT: f32 = 900.0;

/// Scale from full-resolution buffers to on-screen preview, in (0, 1].
pub fn preview_scale(viewport_width: f32, viewport_height: f32) -> f32 {
    let driving = if viewport_width > WIDE_VIEWPORT {
        viewport_height
    } else {
        viewport_width
    };
    let scale = driving / REFERENCE_FULL_PX as f32;
    if scale.is_finite() && scale > 0.0 {
        scale.min(1.0)
    } else {
        // degenerate viewport: one reference pixel per preview pixel
        1.0 / REFERENCE_FULL_PX as f32
    }
}

pub fn preview_size(width: u32, height: u32, scale: f32) -> (u32, u32) {
    let dim = |v: u32| ((v as f32 * scale).round() as u32).max(1);
    (dim(width), dim(height))
}

/// Image-scales `full` by `scale`. No re-rendering: the preview shows exactly
/// the pixels that export will write, just fewer of them.
pub fn downscale(full: &Pixmap, scale: f32) -> Result<Pixmap> {
    let (width, height) = preview_size(full.width(), full.height(), scale);
    let mut out = Pixmap::new(width, height).ok_or(Error::PixmapAlloc { width, height })?;
    let sx = width as f32 / full.width() as f32;
    let sy = height as f32 / full.height() as f32;
    let paint = PixmapPaint {
        blend_mode: BlendMode::Source,
        quality: FilterQuality::Nearest,
        ..Default::default()
    };
    out.draw_pixmap(0, 0, full.as_ref(), &paint, Transform::from_scale(sx, sy), None);
    Ok(out)
}
