use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Opaque RGB colour, serialised as `#rrggbb`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);
    pub const RED: Rgb = Rgb::new(255, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Rgb { r, g, b }
    }

    /// Accepts `#rgb` and `#rrggbb`, with or without the leading `#`.
    pub fn parse_hex(s: &str) -> Option<Rgb> {
        let hex = s.trim().trim_start_matches('#');
        if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        let channel = |i: usize, len: usize| u8::from_str_radix(hex.get(i..i + len)?, 16).ok();
        match hex.len() {
            6 => Some(Rgb::new(channel(0, 2)?, channel(2, 2)?, channel(4, 2)?)),
            3 => {
                let r = channel(0, 1)?;
                let g = channel(1, 1)?;
                let b = channel(2, 1)?;
                Some(Rgb::new(r * 17, g * 17, b * 17))
            }
            _ => None,
        }
    }

    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    pub fn to_color(self) -> tiny_skia::Color {
        tiny_skia::Color::from_rgba8(self.r, self.g, self.b, 255)
    }
}

impl TryFrom<String> for Rgb {
    type Error = String;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        Rgb::parse_hex(&s).ok_or_else(|| format!("invalid colour {s:?}, expected #rrggbb"))
    }
}

impl From<Rgb> for String {
    fn from(c: Rgb) -> Self {
        c.to_hex()
    }
}

/// Parameters of one render. Immutable for the duration of a render pass.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DesignParameters {
    pub physical_width_cm: f64,
    pub physical_height_cm: f64,
    /// Pattern rotation, −180..180.
    pub rotation_deg: f32,
    /// Rendered logo width; height follows the source aspect ratio.
    pub logo_target_width_px: f32,
    pub x_gap_px: f32,
    pub y_gap_px: f32,
    /// Extra horizontal shift of every odd row (brick tiling).
    pub x_stagger_offset_px: f32,
    pub background_color: Rgb,
    pub background_image: Option<String>,
    pub logo_image: Option<String>,
}

impl Default for DesignParameters {
    fn default() -> Self {
        DesignParameters {
            physical_width_cm: 25.0,
            physical_height_cm: 25.0,
            rotation_deg: 0.0,
            logo_target_width_px: 200.0,
            x_gap_px: 0.0,
            y_gap_px: 0.0,
            x_stagger_offset_px: 0.0,
            background_color: Rgb::new(0x08, 0x03, 0xaf),
            background_image: None,
            logo_image: None,
        }
    }
}

impl DesignParameters {
    /// The only range check the core performs; everything else is clamped by the input surface.
    pub fn validate(&self) -> Result<()> {
        let w = self.logo_target_width_px;
        if !w.is_finite() || w <= 0.0 {
            return Err(Error::InvalidLogoWidth(w));
        }
        Ok(())
    }
}

/// Secondary logo placed on the label patch of a banderole panel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BanderoleParameters {
    pub logo_image: Option<String>,
    pub logo_target_width_px: f32,
    /// Rotation around the logo's own centre.
    pub rotation_deg: f32,
    pub offset_x_px: f32,
    pub offset_y_px: f32,
    pub patch_width_cm: f64,
    pub patch_height_cm: f64,
}

impl Default for BanderoleParameters {
    fn default() -> Self {
        BanderoleParameters {
            logo_image: None,
            logo_target_width_px: 300.0,
            rotation_deg: 0.0,
            offset_x_px: 0.0,
            offset_y_px: 0.0,
            patch_width_cm: 10.0,
            patch_height_cm: 5.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hex_colours() {
        assert_eq!(Rgb::parse_hex("#0803AF"), Some(Rgb::new(8, 3, 175)));
        assert_eq!(Rgb::parse_hex("fff"), Some(Rgb::WHITE));
        assert_eq!(Rgb::parse_hex("#12345"), None);
        assert_eq!(Rgb::parse_hex("#zzzzzz"), None);
        assert_eq!(Rgb::parse_hex("#+f+f+f"), None);
        assert_eq!(Rgb::parse_hex("+ff"), None);
        assert_eq!(Rgb::new(8, 3, 175).to_hex(), "#0803af");
    }

    #[test]
    fn partial_json_uses_defaults() {
        let p: DesignParameters =
            serde_json::from_str(r##"{"rotation_deg": 45, "background_color": "#ff0000"}"##)
                .unwrap();
        assert_eq!(p.rotation_deg, 45.0);
        assert_eq!(p.background_color, Rgb::RED);
        assert_eq!(p.logo_target_width_px, 200.0);
        assert!(p.logo_image.is_none());
    }

    #[test]
    fn rejects_bad_colour() {
        let r = serde_json::from_str::<DesignParameters>(r#"{"background_color": "blue"}"#);
        assert!(r.is_err());
    }

    #[test]
    fn validate_rejects_non_positive_width() {
        let mut p = DesignParameters::default();
        assert!(p.validate().is_ok());
        p.logo_target_width_px = 0.0;
        assert!(matches!(p.validate(), Err(Error::InvalidLogoWidth(_))));
        p.logo_target_width_px = -5.0;
        assert!(p.validate().is_err());
        p.logo_target_width_px = f32::NAN;
        assert!(p.validate().is_err());
    }
}
