//! Serialises finished panel buffers to PNG or single-page PDF.

use std::io::Write;
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::write::ZlibEncoder;
use pdf_writer::{Content, Filter, Finish, Name, Pdf, Rect, Ref};
use png::{BitDepth, ColorType, Encoder};
use serde::{Deserialize, Serialize};
use tiny_skia::Pixmap;

use crate::compositor::RenderOutput;
use crate::error::Result;
use crate::panel::check_name;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Png,
    Pdf,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Png => "png",
            ExportFormat::Pdf => "pdf",
        }
    }
}

// Shared PNG encoder: RGBA -> PNG bytes (deterministic for same input)
pub fn encode_rgba_png(width: u32, height: u32, rgba: &[u8]) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    {
        let mut enc = Encoder::new(&mut buf, width, height);
        enc.set_color(ColorType::Rgba);
        enc.set_depth(BitDepth::Eight);
        let mut writer = enc.write_header()?;
        writer.write_image_data(rgba)?;
        writer.finish()?;
    }
    Ok(buf)
}

/// Straight-alpha RGBA8 of a premultiplied pixmap.
pub fn demultiplied_rgba(pixmap: &Pixmap) -> Vec<u8> {
    pixmap
        .pixels()
        .iter()
        .flat_map(|p| {
            let c = p.demultiply();
            [c.red(), c.green(), c.blue(), c.alpha()]
        })
        .collect()
}

pub fn encode_png(pixmap: &Pixmap) -> Result<Vec<u8>> {
    encode_rgba_png(pixmap.width(), pixmap.height(), &demultiplied_rgba(pixmap))
}

/// One page whose media box is the buffer size (1 px = 1 pt), with the
/// buffer drawn at 1:1 as a Flate-compressed DeviceRGB image.
pub fn encode_pdf(pixmap: &Pixmap) -> Result<Vec<u8>> {
    let (w, h) = (pixmap.width(), pixmap.height());
    let mut rgb = Vec::with_capacity((w * h * 3) as usize);
    for p in pixmap.pixels() {
        // premultiplied over white
        let inv = 255 - p.alpha();
        rgb.extend_from_slice(&[
            p.red().saturating_add(inv),
            p.green().saturating_add(inv),
            p.blue().saturating_add(inv),
        ]);
    }
    let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
    enc.write_all(&rgb)?;
    let compressed = enc.finish()?;

    let catalog_id = Ref::new(1);
    let page_tree_id = Ref::new(2);
    let page_id = Ref::new(3);
    let image_id = Ref::new(4);
    let content_id = Ref::new(5);
    let image_name = Name(b"Im1");

    let mut pdf = Pdf::new();
    pdf.catalog(catalog_id).pages(page_tree_id);
    pdf.pages(page_tree_id).kids([page_id]).count(1);

    let mut page = pdf.page(page_id);
    page.media_box(Rect::new(0.0, 0.0, w as f32, h as f32));
    page.parent(page_tree_id);
    page.contents(content_id);
    page.resources().x_objects().pair(image_name, image_id);
    page.finish();

    let mut image = pdf.image_xobject(image_id, &compressed);
    image.filter(Filter::FlateDecode);
    image.width(w as i32);
    image.height(h as i32);
    image.color_space().device_rgb();
    image.bits_per_component(8);
    image.finish();

    let mut content = Content::new();
    content.save_state();
    content.transform([w as f32, 0.0, 0.0, h as f32, 0.0, 0.0]);
    content.x_object(image_name);
    content.restore_state();
    pdf.stream(content_id, &content.finish());

    Ok(pdf.finish())
}

pub fn encode(pixmap: &Pixmap, format: ExportFormat) -> Result<Vec<u8>> {
    match format {
        ExportFormat::Png => encode_png(pixmap),
        ExportFormat::Pdf => encode_pdf(pixmap),
    }
}

/// Writes `<dir>/<panel>.<ext>` and returns the path. Names that would
/// leave `dir` are refused.
pub fn write_output(output: &RenderOutput, format: ExportFormat, dir: &Path) -> Result<PathBuf> {
    check_name(&output.panel)?;
    let path = dir.join(format!("{}.{}", output.panel, format.extension()));
    let bytes = encode(&output.pixmap, format)?;
    std::fs::write(&path, &bytes)?;
    log::info!(
        "wrote {} ({}x{}, {} bytes)",
        path.display(),
        output.width(),
        output.height(),
        bytes.len()
    );
    Ok(path)
}
