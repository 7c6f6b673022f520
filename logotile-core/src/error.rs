use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("logo target width must be a positive number of pixels, got {0}")]
    InvalidLogoWidth(f32),

    #[error("cannot allocate a {width}x{height} pixel buffer")]
    PixmapAlloc { width: u32, height: u32 },

    #[error("panel name {0:?} cannot be used as a file name")]
    InvalidPanelName(String),

    #[error("more than one panel is named {0:?}")]
    DuplicatePanelName(String),

    #[error("malformed data URL")]
    MalformedDataUrl,

    #[error("failed to read image source {path}: {source}")]
    ReadSource {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported or corrupt image data: {0}")]
    Image(#[from] image::ImageError),

    #[error("SVG parse error: {0}")]
    Svg(#[from] usvg::Error),

    #[error("PNG encoding failed: {0}")]
    Png(#[from] png::EncodingError),

    #[error("design file is not valid JSON: {0}")]
    Config(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
