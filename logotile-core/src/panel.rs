use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::params::{DesignParameters, Rgb};
use crate::text::{TextBlock, care_instructions, company_address};
use crate::units::{Density, cm_to_pixels, panel_pixels};

/// Physical size of the banderole (wrap band) panels.
pub const BANDEROLE_WIDTH_CM: f64 = 35.0;
pub const BANDEROLE_HEIGHT_CM: f64 = 8.0;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PanelSize {
    /// Physical width/height from the design parameters.
    Design,
    Cm { width: f64, height: f64 },
    Px { width: u32, height: u32 },
}

/// Axis-aligned content drawn after the rotated pattern, in list order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Overlay {
    /// Outline along the panel edge.
    Border { color: Rgb, width_px: f32 },
    /// "W cm x H cm" in the bottom right corner.
    DimensionLabel { color: Rgb, size_px: f32 },
    /// White label patch with the banderole logo.
    LabelPatch,
    Text { color: Rgb, blocks: Vec<TextBlock> },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Panel {
    pub name: String,
    pub size: PanelSize,
    /// Plain panels skip the tiled pattern and are filled white.
    #[serde(default = "default_true")]
    pub pattern: bool,
    #[serde(default)]
    pub overlays: Vec<Overlay>,
}

fn default_true() -> bool {
    true
}

impl Panel {
    pub fn new(name: &str, size: PanelSize) -> Self {
        Panel {
            name: name.to_string(),
            size,
            pattern: true,
            overlays: Vec::new(),
        }
    }

    pub fn plain(mut self) -> Self {
        self.pattern = false;
        self
    }

    pub fn with_overlay(mut self, overlay: Overlay) -> Self {
        self.overlays.push(overlay);
        self
    }

    /// Physical size, when the panel has one.
    pub fn size_cm(&self, params: &DesignParameters) -> Option<(f64, f64)> {
        match self.size {
            PanelSize::Design => Some((params.physical_width_cm, params.physical_height_cm)),
            PanelSize::Cm { width, height } => Some((width, height)),
            PanelSize::Px { .. } => None,
        }
    }

    pub fn pixel_size(&self, params: &DesignParameters, density: Density) -> (u32, u32) {
        match self.size {
            PanelSize::Px { width, height } => (width.max(1), height.max(1)),
            _ => {
                let (w, h) = self.size_cm(params).unwrap_or((1.0, 1.0));
                (panel_pixels(w, density), panel_pixels(h, density))
            }
        }
    }
}

/// Panel names become export file names: non-empty, no path separators, no `..`.
pub fn check_name(name: &str) -> Result<()> {
    if name.trim().is_empty() || name.contains(['/', '\\', '\0']) || name.contains("..") {
        return Err(Error::InvalidPanelName(name.to_string()));
    }
    Ok(())
}

/// Every name valid and distinct, so each panel exports to its own file.
pub fn check_names(panels: &[Panel]) -> Result<()> {
    let mut seen = HashSet::new();
    for panel in panels {
        check_name(&panel.name)?;
        if !seen.insert(panel.name.as_str()) {
            return Err(Error::DuplicatePanelName(panel.name.clone()));
        }
    }
    Ok(())
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PanelLayout {
    /// One front panel, pattern only.
    #[default]
    Single,
    /// One front panel with outline and dimension label.
    Annotated,
    /// Front, back and both banderole sides.
    Packed,
}

impl PanelLayout {
    pub fn panels(self, density: Density) -> Vec<Panel> {
        match self {
            PanelLayout::Single => vec![Panel::new("front", PanelSize::Design)],
            PanelLayout::Annotated => {
                let k = (density.px_per_cm() / crate::units::PREVIEW_PX_PER_CM) as f32;
                vec![
                    Panel::new("front", PanelSize::Design)
                        .with_overlay(Overlay::Border {
                            color: Rgb::RED,
                            width_px: 19.0 * k,
                        })
                        .with_overlay(Overlay::DimensionLabel {
                            color: Rgb::WHITE,
                            size_px: 24.0 * k,
                        }),
                ]
            }
            PanelLayout::Packed => packed_panels(density),
        }
    }
}

fn packed_panels(density: Density) -> Vec<Panel> {
    let px = |cm: f64| cm_to_pixels(cm, density) as f32;
    let banderole = PanelSize::Cm {
        width: BANDEROLE_WIDTH_CM,
        height: BANDEROLE_HEIGHT_CM,
    };
    let scale_block = |mut b: TextBlock| {
        b.size_px = px(0.45);
        b.line_height_px = px(0.6);
        b
    };
    let care = scale_block(care_instructions(px(1.0), px(1.5), px(15.0)));
    let address = scale_block(company_address(px(18.0), px(1.5), px(15.0)));
    vec![
        Panel::new("front", PanelSize::Design),
        Panel::new("back", PanelSize::Design),
        Panel::new("banderole-front", banderole.clone()).with_overlay(Overlay::LabelPatch),
        Panel::new("banderole-back", banderole)
            .plain()
            .with_overlay(Overlay::Text {
                color: Rgb::BLACK,
                blocks: vec![care, address],
            }),
    ]
}
