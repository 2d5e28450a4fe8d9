//! Which formats this build can decode.
//!
//! Codec backends are compiled in through cargo features; a format missing
//! from this registry simply was not built, and the dispatcher reports it
//! like any other unrecognized stream.
use crate::ImageFormat;
#[allow(unused_imports)]
use crate::formats;

/// Matches sniffed magic bytes against the compiled-in formats, in fixed
/// priority order.
pub(crate) fn match_magic(magic: [u8; 2]) -> Option<ImageFormat> {
    #[cfg(feature = "jpeg")]
    if magic == [0xff, 0xd8] {
        return Some(ImageFormat::Jpeg);
    }
    #[cfg(feature = "png")]
    if magic == [0x89, b'P'] {
        return Some(ImageFormat::Png);
    }
    #[cfg(feature = "gif")]
    if magic == *b"GI" {
        return Some(ImageFormat::Gif);
    }
    #[cfg(feature = "webp")]
    if magic == *b"RI" {
        return Some(ImageFormat::Webp);
    }
    let _ = magic;
    None
}

/// Formats this build can decode, plus the plain passthrough.
pub fn supported_formats() -> Vec<ImageFormat> {
    let mut formats = vec![ImageFormat::Plain];
    #[cfg(feature = "jpeg")]
    formats.push(ImageFormat::Jpeg);
    #[cfg(feature = "png")]
    formats.push(ImageFormat::Png);
    #[cfg(feature = "gif")]
    formats.push(ImageFormat::Gif);
    #[cfg(feature = "webp")]
    formats.push(ImageFormat::Webp);
    formats
}

/// Human-readable description of the codec backing a format, for
/// diagnostics. `None` when the format is not compiled in.
pub fn describe(format: ImageFormat) -> Option<&'static str> {
    match format {
        ImageFormat::Plain => Some("raw RGBA passthrough"),
        #[cfg(feature = "jpeg")]
        ImageFormat::Jpeg => Some(formats::jpeg::DESCRIPTION),
        #[cfg(feature = "png")]
        ImageFormat::Png => Some(formats::png::DESCRIPTION),
        #[cfg(feature = "gif")]
        ImageFormat::Gif => Some(formats::gif::DESCRIPTION),
        #[cfg(feature = "webp")]
        ImageFormat::Webp => Some(formats::webp::DESCRIPTION),
        #[allow(unreachable_patterns)]
        _ => None,
    }
}
