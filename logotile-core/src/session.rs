//! Interactive design state: one setter per parameter, one `render` trigger.
//!
//! Every render recomputes all panels from scratch. Image sources decode in
//! the background; `pump` re-renders once when any decode finishes.

use std::path::{Path, PathBuf};

use crate::compositor::{self, PanelImages, RenderOutput};
use crate::config::DesignFile;
use crate::error::Result;
use crate::export::{self, ExportFormat};
use crate::image_cache::{ImageCache, RasterHandle};
use crate::panel::{self, Panel};
use crate::params::{BanderoleParameters, DesignParameters, Rgb};
use crate::preview;
use crate::text::FontBook;
use crate::units::Density;

pub struct DesignSession {
    params: DesignParameters,
    banderole: BanderoleParameters,
    panels: Vec<Panel>,
    outputs: Vec<Option<RenderOutput>>,
    cache: ImageCache,
    fonts: FontBook,
    density: Density,
}

impl DesignSession {
    pub fn new(panels: Vec<Panel>, density: Density, fonts: FontBook) -> Self {
        let outputs = vec![None; panels.len()];
        let cache = ImageCache::new().with_fontdb(fonts.database());
        DesignSession {
            params: DesignParameters::default(),
            banderole: BanderoleParameters::default(),
            panels,
            outputs,
            cache,
            fonts,
            density,
        }
    }

    /// Session for a design file; image sources are requested but not awaited.
    pub fn from_design(design: &DesignFile) -> Self {
        let fonts = FontBook::load(design.font_file.as_deref());
        let mut s = Self::new(design.panel_list(), design.density, fonts);
        s.set_logo_image(design.params.logo_image.clone());
        s.set_background_image(design.params.background_image.clone());
        s.set_banderole_logo_image(design.banderole.logo_image.clone());
        s.params = design.params.clone();
        s.banderole = design.banderole.clone();
        s
    }

    pub fn params(&self) -> &DesignParameters {
        &self.params
    }

    pub fn banderole(&self) -> &BanderoleParameters {
        &self.banderole
    }

    pub fn panels(&self) -> &[Panel] {
        &self.panels
    }

    pub fn density(&self) -> Density {
        self.density
    }

    pub fn set_physical_width_cm(&mut self, v: f64) {
        self.params.physical_width_cm = v;
    }

    pub fn set_physical_height_cm(&mut self, v: f64) {
        self.params.physical_height_cm = v;
    }

    pub fn set_rotation_deg(&mut self, v: f32) {
        self.params.rotation_deg = v;
    }

    pub fn set_logo_target_width_px(&mut self, v: f32) {
        self.params.logo_target_width_px = v;
    }

    pub fn set_x_gap_px(&mut self, v: f32) {
        self.params.x_gap_px = v;
    }

    pub fn set_y_gap_px(&mut self, v: f32) {
        self.params.y_gap_px = v;
    }

    pub fn set_x_stagger_offset_px(&mut self, v: f32) {
        self.params.x_stagger_offset_px = v;
    }

    pub fn set_background_color(&mut self, v: Rgb) {
        self.params.background_color = v;
    }

    pub fn set_logo_image(&mut self, source: Option<String>) {
        let old = std::mem::replace(&mut self.params.logo_image, source.clone());
        self.swap_source(old, source);
    }

    pub fn set_background_image(&mut self, source: Option<String>) {
        let old = std::mem::replace(&mut self.params.background_image, source.clone());
        self.swap_source(old, source);
    }

    pub fn set_banderole_logo_image(&mut self, source: Option<String>) {
        let old = std::mem::replace(&mut self.banderole.logo_image, source.clone());
        self.swap_source(old, source);
    }

    pub fn set_banderole_logo_width_px(&mut self, v: f32) {
        self.banderole.logo_target_width_px = v;
    }

    pub fn set_banderole_rotation_deg(&mut self, v: f32) {
        self.banderole.rotation_deg = v;
    }

    pub fn set_banderole_offset_px(&mut self, x: f32, y: f32) {
        self.banderole.offset_x_px = x;
        self.banderole.offset_y_px = y;
    }

    pub fn set_panels(&mut self, panels: Vec<Panel>) {
        self.outputs = vec![None; panels.len()];
        self.panels = panels;
    }

    // Old source is dropped from the cache unless another slot still uses it.
    fn swap_source(&mut self, old: Option<String>, new: Option<String>) {
        if old == new {
            return;
        }
        if let Some(old) = old
            && !self.source_in_use(&old)
        {
            self.cache.forget(&old);
        }
        if let Some(new) = new {
            self.cache.request(&new);
        }
    }

    fn source_in_use(&self, source: &str) -> bool {
        [
            &self.params.logo_image,
            &self.params.background_image,
            &self.banderole.logo_image,
        ]
        .into_iter()
        .any(|s| s.as_deref() == Some(source))
    }

    /// Decodes every current source on this thread.
    pub fn load_images_blocking(&mut self) {
        for source in [
            self.params.logo_image.clone(),
            self.params.background_image.clone(),
            self.banderole.logo_image.clone(),
        ]
        .into_iter()
        .flatten()
        {
            self.cache.load_blocking(&source);
        }
    }

    pub fn has_pending_images(&self) -> bool {
        self.cache.has_pending()
    }

    fn handle(&self, source: &Option<String>) -> RasterHandle {
        match source {
            Some(s) => self.cache.handle(s),
            None => RasterHandle::empty(),
        }
    }

    pub fn images(&self) -> PanelImages {
        PanelImages {
            logo: self.handle(&self.params.logo_image),
            background: self.handle(&self.params.background_image),
            banderole_logo: self.handle(&self.banderole.logo_image),
        }
    }

    /// Recomputes every panel buffer. Undecoded images render as absent.
    pub fn render(&mut self) -> Result<()> {
        self.params.validate()?;
        panel::check_names(&self.panels)?;
        let images = self.images();
        for (panel, slot) in self.panels.iter().zip(self.outputs.iter_mut()) {
            let out = compositor::render(
                panel,
                &self.params,
                &self.banderole,
                &images,
                &self.fonts,
                self.density,
            )?;
            *slot = Some(out);
        }
        Ok(())
    }

    /// Installs finished decodes and re-renders once if any arrived.
    pub fn pump(&mut self) -> Result<bool> {
        if self.cache.poll() == 0 {
            return Ok(false);
        }
        self.render()?;
        Ok(true)
    }

    pub fn output(&self, index: usize) -> Option<&RenderOutput> {
        self.outputs.get(index).and_then(Option::as_ref)
    }

    pub fn outputs(&self) -> impl Iterator<Item = &RenderOutput> {
        self.outputs.iter().flatten()
    }

    /// Downscaled copies of every rendered panel for the given viewport.
    pub fn preview(&self, viewport_width: f32, viewport_height: f32) -> Result<Vec<RenderOutput>> {
        let scale = preview::preview_scale(viewport_width, viewport_height);
        self.outputs()
            .map(|out| {
                Ok(RenderOutput {
                    panel: out.panel.clone(),
                    pixmap: preview::downscale(&out.pixmap, scale)?,
                })
            })
            .collect()
    }

    /// Writes one panel. `Ok(None)` when that panel has not been rendered.
    pub fn export_panel(
        &self,
        index: usize,
        format: ExportFormat,
        dir: &Path,
    ) -> Result<Option<PathBuf>> {
        match self.output(index) {
            Some(out) => export::write_output(out, format, dir).map(Some),
            None => {
                log::debug!("export of panel {index} skipped: nothing rendered");
                Ok(None)
            }
        }
    }

    /// Writes every rendered panel, each under its own name.
    pub fn export_all(&self, format: ExportFormat, dir: &Path) -> Result<Vec<PathBuf>> {
        let mut written = Vec::new();
        for index in 0..self.panels.len() {
            if let Some(path) = self.export_panel(index, format, dir)? {
                written.push(path);
            }
        }
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use base64::{Engine, engine::general_purpose::STANDARD};

    use super::*;
    use crate::panel::{PanelLayout, PanelSize};

    fn png_data_url(w: u32, h: u32, rgba: [u8; 4]) -> String {
        let data: Vec<u8> = rgba.iter().copied().cycle().take((w * h * 4) as usize).collect();
        let png = export::encode_rgba_png(w, h, &data).unwrap();
        format!("data:image/png;base64,{}", STANDARD.encode(png))
    }

    fn session() -> DesignSession {
        let panels = vec![Panel::new("front", PanelSize::Px { width: 60, height: 40 })];
        let mut s = DesignSession::new(panels, Density::Preview, FontBook::empty());
        s.set_background_color(Rgb::new(0, 0, 255));
        s
    }

    fn center_rgb(s: &DesignSession) -> (u8, u8, u8) {
        let out = s.output(0).unwrap();
        let px = out.pixmap.pixel(30, 20).unwrap();
        (px.red(), px.green(), px.blue())
    }

    fn pump_until_changed(s: &mut DesignSession) {
        let start = Instant::now();
        while !s.pump().unwrap() {
            assert!(start.elapsed() < Duration::from_secs(10), "decode never finished");
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn nothing_rendered_before_first_render() {
        let s = session();
        assert!(s.output(0).is_none());
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(s.export_panel(0, ExportFormat::Png, dir.path()).unwrap(), None);
        assert!(s.export_all(ExportFormat::Png, dir.path()).unwrap().is_empty());
    }

    #[test]
    fn pending_logo_renders_plain_background_then_pump_redraws() {
        let mut s = session();
        s.set_logo_target_width_px(200.0);
        s.set_logo_image(Some(png_data_url(4, 4, [255, 0, 0, 255])));
        s.render().unwrap();
        // decode may already be done, but nothing is installed until pump
        assert_eq!(center_rgb(&s), (0, 0, 255));

        pump_until_changed(&mut s);
        assert_eq!(center_rgb(&s), (255, 0, 0));
        assert!(!s.has_pending_images());
        // no further changes, no re-render
        assert!(!s.pump().unwrap());
    }

    #[test]
    fn invalid_width_fails_and_keeps_previous_buffer() {
        let mut s = session();
        s.render().unwrap();
        s.set_logo_target_width_px(0.0);
        assert!(matches!(s.render(), Err(crate::Error::InvalidLogoWidth(_))));
        assert_eq!(center_rgb(&s), (0, 0, 255));
    }

    #[test]
    fn shared_source_survives_replacement_in_one_slot() {
        let mut s = session();
        let url = png_data_url(2, 2, [0, 255, 0, 255]);
        s.set_logo_image(Some(url.clone()));
        s.set_banderole_logo_image(Some(url.clone()));
        s.load_images_blocking();
        s.set_logo_image(None);
        assert!(s.images().banderole_logo.is_ready());
        assert!(!s.images().logo.is_ready());
    }

    #[test]
    fn preview_and_export_use_rendered_buffers() {
        let mut s = session();
        s.render().unwrap();
        let previews = s.preview(2065.0, 413.0).unwrap();
        assert_eq!(previews.len(), 1);
        assert_eq!(previews[0].panel, "front");
        assert_eq!((previews[0].width(), previews[0].height()), (6, 4));

        let dir = tempfile::tempdir().unwrap();
        let written = s.export_all(ExportFormat::Pdf, dir.path()).unwrap();
        assert_eq!(written, vec![dir.path().join("front.pdf")]);
        assert!(written[0].exists());
    }

    #[test]
    fn clashing_or_unsafe_panel_names_never_export() {
        let root = tempfile::tempdir().unwrap();
        let out = root.path().join("out");
        std::fs::create_dir(&out).unwrap();
        let size = PanelSize::Px { width: 8, height: 8 };
        let mut s = session();

        s.set_panels(vec![Panel::new("a", size.clone()), Panel::new("a", size.clone())]);
        assert!(matches!(s.render(), Err(crate::Error::DuplicatePanelName(_))));
        assert!(s.export_all(ExportFormat::Png, &out).unwrap().is_empty());

        s.set_panels(vec![Panel::new("a", size.clone()), Panel::new("../escaped", size)]);
        assert!(matches!(s.render(), Err(crate::Error::InvalidPanelName(_))));
        assert!(s.export_all(ExportFormat::Png, &out).unwrap().is_empty());
        assert!(!root.path().join("escaped.png").exists());
        assert_eq!(std::fs::read_dir(&out).unwrap().count(), 0);
    }

    #[test]
    fn replacing_panels_clears_outputs() {
        let mut s = session();
        s.render().unwrap();
        s.set_panels(PanelLayout::Packed.panels(Density::Preview));
        assert_eq!(s.outputs().count(), 0);
        s.render().unwrap();
        let names: Vec<_> = s.outputs().map(|o| o.panel.as_str()).collect();
        assert_eq!(names, ["front", "back", "banderole-front", "banderole-back"]);
    }
}
