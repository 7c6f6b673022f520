//! Turns an image source string into a premultiplied raster.
//!
//! A source is either a `data:` URL (base64 or percent-encoded payload) or a
//! filesystem path. PNG and JPEG go through `image`; SVG is rasterised at its
//! intrinsic size with `resvg`.

use std::sync::Arc;

use base64::{Engine, engine::general_purpose::STANDARD};
use tiny_skia::{Pixmap, Transform};
use usvg::fontdb;

use crate::error::{Error, Result};

pub fn decode_source(source: &str, fontdb: Option<Arc<fontdb::Database>>) -> Result<Pixmap> {
    let (mime, bytes) = if source.starts_with("data:") {
        let (mime, bytes) = parse_data_url(source).ok_or(Error::MalformedDataUrl)?;
        (Some(mime), bytes)
    } else {
        let bytes = std::fs::read(source).map_err(|e| Error::ReadSource {
            path: source.to_string(),
            source: e,
        })?;
        (None, bytes)
    };
    decode_bytes(&bytes, mime.as_deref(), fontdb)
}

pub fn decode_bytes(
    data: &[u8],
    mime: Option<&str>,
    fontdb: Option<Arc<fontdb::Database>>,
) -> Result<Pixmap> {
    if looks_like_svg(data, mime) {
        return rasterize_svg(data, fontdb);
    }
    let format = match mime {
        Some(m) if m.contains("png") => Some(image::ImageFormat::Png),
        Some(m) if m.contains("jpeg") || m.contains("jpg") => Some(image::ImageFormat::Jpeg),
        _ => image::guess_format(data).ok(),
    };
    let decoded = match format {
        Some(fmt) => image::load_from_memory_with_format(data, fmt)?,
        None => image::load_from_memory(data)?,
    };
    let rgba = decoded.to_rgba8();
    let (width, height) = rgba.dimensions();
    rgba_to_pixmap(width, height, rgba.as_raw())
}

/// Straight-alpha RGBA8 into a premultiplied pixmap.
pub fn rgba_to_pixmap(width: u32, height: u32, rgba: &[u8]) -> Result<Pixmap> {
    let mut pixmap = Pixmap::new(width, height).ok_or(Error::PixmapAlloc { width, height })?;
    for (src, dst) in rgba.chunks_exact(4).zip(pixmap.data_mut().chunks_exact_mut(4)) {
        let a = src[3];
        dst[0] = premul_u8(src[0], a);
        dst[1] = premul_u8(src[1], a);
        dst[2] = premul_u8(src[2], a);
        dst[3] = a;
    }
    Ok(pixmap)
}

fn premul_u8(channel: u8, alpha: u8) -> u8 {
    let prod = (channel as u16) * (alpha as u16) + 127;
    ((prod + (prod >> 8)) >> 8) as u8
}

fn looks_like_svg(data: &[u8], mime: Option<&str>) -> bool {
    if let Some(m) = mime {
        return m.contains("svg");
    }
    let head = &data[..data.len().min(256)];
    let head = String::from_utf8_lossy(head);
    let head = head.trim_start();
    head.starts_with("<svg") || (head.starts_with("<?xml") && head.contains("<svg"))
}

fn rasterize_svg(data: &[u8], fontdb: Option<Arc<fontdb::Database>>) -> Result<Pixmap> {
    let mut opt = usvg::Options::default();
    if let Some(db) = fontdb {
        opt.fontdb = db;
    }
    let tree = usvg::Tree::from_data(data, &opt)?;
    let width = tree.size().width().ceil() as u32;
    let height = tree.size().height().ceil() as u32;
    let mut pixmap = Pixmap::new(width, height).ok_or(Error::PixmapAlloc { width, height })?;
    resvg::render(&tree, Transform::identity(), &mut pixmap.as_mut());
    Ok(pixmap)
}

/// Splits `data:<mime>[;base64],<payload>`. Returns `None` for anything malformed.
pub fn parse_data_url(uri: &str) -> Option<(String, Vec<u8>)> {
    let rest = uri.strip_prefix("data:")?;
    let (header, payload) = rest.split_once(',')?;
    let mime = header
        .split(';')
        .next()
        .filter(|v| !v.is_empty())
        .unwrap_or("text/plain")
        .to_ascii_lowercase();
    let data = if header.split(';').any(|p| p.eq_ignore_ascii_case("base64")) {
        // tolerate line-wrapped payloads
        let compact: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        STANDARD.decode(compact).ok()?
    } else {
        percent_encoding::percent_decode_str(payload).collect()
    };
    Some((mime, data))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_bytes(w: u32, h: u32, rgba: [u8; 4]) -> Vec<u8> {
        let data: Vec<u8> = (0..w * h).flat_map(|_| rgba).collect();
        crate::export::encode_rgba_png(w, h, &data).unwrap()
    }

    #[test]
    fn base64_data_url() {
        let (mime, data) = parse_data_url("data:text/plain;base64,SGVsbG8=").unwrap();
        assert_eq!(mime, "text/plain");
        assert_eq!(data, b"Hello");
    }

    #[test]
    fn percent_encoded_data_url() {
        let (mime, data) = parse_data_url("data:image/svg+xml,%3Csvg%3E").unwrap();
        assert_eq!(mime, "image/svg+xml");
        assert_eq!(data, b"<svg>");
    }

    #[test]
    fn malformed_data_urls() {
        assert!(parse_data_url("data:image/png;base64").is_none());
        assert!(parse_data_url("data:image/png;base64,@@@").is_none());
        assert!(parse_data_url("image/png;base64,AAAA").is_none());
        assert!(matches!(
            decode_source("data:image/png;base64", None),
            Err(Error::MalformedDataUrl)
        ));
    }

    #[test]
    fn decodes_png_data_url() {
        let bytes = png_bytes(3, 2, [255, 0, 0, 255]);
        let url = format!("data:image/png;base64,{}", STANDARD.encode(&bytes));
        let pixmap = decode_source(&url, None).unwrap();
        assert_eq!((pixmap.width(), pixmap.height()), (3, 2));
        let px = pixmap.pixel(1, 1).unwrap();
        assert_eq!((px.red(), px.green(), px.blue(), px.alpha()), (255, 0, 0, 255));
    }

    #[test]
    fn premultiplies_alpha() {
        let pixmap = rgba_to_pixmap(1, 1, &[255, 255, 255, 128]).unwrap();
        let px = pixmap.pixel(0, 0).unwrap();
        assert_eq!(px.alpha(), 128);
        assert_eq!(px.red(), 128);
    }

    #[test]
    fn rasterizes_svg_at_intrinsic_size() {
        let svg = r##"<svg xmlns="http://www.w3.org/2000/svg" width="40" height="20"><rect width="40" height="20" fill="#00ff00"/></svg>"##;
        let pixmap = decode_bytes(svg.as_bytes(), None, None).unwrap();
        assert_eq!((pixmap.width(), pixmap.height()), (40, 20));
        let px = pixmap.pixel(20, 10).unwrap();
        assert_eq!((px.green(), px.alpha()), (255, 255));
    }

    #[test]
    fn garbage_bytes_are_an_error() {
        assert!(decode_bytes(b"definitely not an image", Some("image/png"), None).is_err());
    }

    #[test]
    fn missing_file_is_read_error() {
        let r = decode_source("/nonexistent/logo.png", None);
        assert!(matches!(r, Err(Error::ReadSource { .. })));
    }
}
