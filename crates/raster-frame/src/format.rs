/// Source format of a decoded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ImageFormat {
    /// Raw RGBA pixels handed in by the caller, not decoded from a stream.
    Plain,
    Jpeg,
    Png,
    Gif,
    Webp,
}

impl std::fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Plain => write!(f, "plain"),
            Self::Jpeg => write!(f, "JPEG"),
            Self::Png => write!(f, "PNG"),
            Self::Gif => write!(f, "GIF"),
            Self::Webp => write!(f, "WebP"),
        }
    }
}

/// Header-level facts about an image, obtained without a full decode.
#[derive(Debug, Clone, Copy)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
    pub format: ImageFormat,
    pub opaque: bool,
    /// `None` when the format cannot report a frame count without decoding
    /// every frame (GIF).
    pub frame_count: Option<u32>,
}
