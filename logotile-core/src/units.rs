use serde::{Deserialize, Serialize};

/// Pixels per centimetre for on-screen, preview-only buffers.
pub const PREVIEW_PX_PER_CM: f64 = 28.0;
/// Pixels per centimetre for export-quality buffers.
pub const EXPORT_PX_PER_CM: f64 = 118.0;

/// Width in pixels of the largest physical panel (35 cm) at export density.
/// Preview scale factors are normalised against this size.
pub const REFERENCE_FULL_PX: f64 = 4130.0;

/// Output target that fixes the density constant for one render path.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Density {
    Preview,
    #[default]
    Export,
}

impl Density {
    pub fn px_per_cm(self) -> f64 {
        match self {
            Density::Preview => PREVIEW_PX_PER_CM,
            Density::Export => EXPORT_PX_PER_CM,
        }
    }
}

/// Physical length to raster pixels. `f64::round` rounds half away from zero.
pub fn cm_to_pixels(cm: f64, density: Density) -> i64 {
    (cm * density.px_per_cm()).round() as i64
}

/// Pixel size of a buffer edge; never zero so the buffer can be allocated.
pub fn panel_pixels(cm: f64, density: Density) -> u32 {
    cm_to_pixels(cm, density).clamp(1, u32::MAX as i64) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_zero() {
        assert_eq!(cm_to_pixels(0.0, Density::Preview), 0);
        assert_eq!(cm_to_pixels(0.0, Density::Export), 0);
    }

    #[test]
    fn rounds_half_away_from_zero() {
        // 0.125 * 28 = 3.5 exactly
        assert_eq!(cm_to_pixels(0.125, Density::Preview), 4);
        assert_eq!(cm_to_pixels(-0.125, Density::Preview), -4);
        assert_eq!(cm_to_pixels(25.0, Density::Export), 2950);
        assert_eq!(cm_to_pixels(35.0, Density::Export), REFERENCE_FULL_PX as i64);
    }

    #[test]
    fn panel_pixels_never_zero() {
        assert_eq!(panel_pixels(0.0, Density::Export), 1);
        assert_eq!(panel_pixels(-3.0, Density::Export), 1);
        assert_eq!(panel_pixels(10.0, Density::Preview), 280);
    }
}
