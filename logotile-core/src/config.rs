use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::panel::{Panel, PanelLayout, check_names};
use crate::params::{BanderoleParameters, DesignParameters};
use crate::units::Density;

/// Viewport assumed for previews when the design file has none.
pub const DEFAULT_VIEWPORT: [f32; 2] = [1280.0, 800.0];

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Outputs {
    pub png: bool,
    pub pdf: bool,
    pub preview: bool,
}

impl Default for Outputs {
    fn default() -> Self {
        Outputs {
            png: true,
            pdf: false,
            preview: false,
        }
    }
}

/// Everything needed to render a design from the command line.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DesignFile {
    pub params: DesignParameters,
    pub banderole: BanderoleParameters,
    pub layout: PanelLayout,
    /// Explicit panel list; overrides `layout` when present.
    pub panels: Option<Vec<Panel>>,
    pub density: Density,
    pub viewport: Option<[f32; 2]>,
    pub font_file: Option<PathBuf>,
    pub outputs: Outputs,
}

impl DesignFile {
    /// Parses and checks that every panel can be exported under its own name.
    pub fn from_json_str(s: &str) -> Result<Self> {
        let design: DesignFile = serde_json::from_str(s)?;
        check_names(&design.panel_list())?;
        Ok(design)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let txt = std::fs::read_to_string(path)?;
        let mut design = Self::from_json_str(&txt)?;
        // relative image paths are relative to the design file
        if let Some(dir) = path.parent() {
            design.resolve_paths(dir);
        }
        Ok(design)
    }

    pub fn panel_list(&self) -> Vec<Panel> {
        self.panels
            .clone()
            .unwrap_or_else(|| self.layout.panels(self.density))
    }

    pub fn viewport(&self) -> [f32; 2] {
        self.viewport.unwrap_or(DEFAULT_VIEWPORT)
    }

    fn resolve_paths(&mut self, dir: &Path) {
        let fix = |src: &mut Option<String>| {
            if let Some(s) = src
                && !s.starts_with("data:")
                && Path::new(s.as_str()).is_relative()
            {
                *s = dir.join(s.as_str()).to_string_lossy().into_owned();
            }
        };
        fix(&mut self.params.logo_image);
        fix(&mut self.params.background_image);
        fix(&mut self.banderole.logo_image);
        if let Some(f) = &mut self.font_file
            && f.is_relative()
        {
            *f = dir.join(&*f);
        }
    }
}
