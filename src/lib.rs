//! raster-oxide decodes still and animated raster images (GIF, PNG/APNG,
//! JPEG, WebP) into packed RGBA8888 buffers, and resamples those buffers into
//! caller-supplied RGBA8888 or RGB565 destinations at arbitrary integer
//! downscale ratios. It is internally organized into a few small crates; this
//! crate wires the per-format decoders to the shared composition and
//! conversion engines and provides the public interface.
//!
//! # Decoding an image
//!
//! Hand a [`Stream`] to [`decode`]; the format is sniffed from the magic
//! bytes:
//!
//! ```no_run
//! use raster_oxide::{DelegateImage, Image, MemoryStream};
//!
//! # fn main() -> raster_oxide::Result<()> {
//! # let data = Vec::new();
//! let stream = MemoryStream::new(data);
//! match raster_oxide::decode(Box::new(stream), false)? {
//!     Image::Static(image) => {
//!         println!("{}x{} {}", image.width(), image.height(), image.format());
//!     }
//!     Image::Animated(mut image) => {
//!         let mut canvas = DelegateImage::new(image.width(), image.height());
//!         for _ in 0..image.frame_count() {
//!             image.advance(&mut canvas);
//!         }
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Passing `partially = true` decodes only the first frame of a multi-frame
//! image; the rest are produced later by
//! [`AnimatedImage::complete`]. An animated image that is not yet completed
//! still owns its source stream; do not close the stream until
//! [`AnimatedImage::is_completed`] reports `true`.
//!
//! # Rendering into a destination buffer
//!
//! [`convert`] and [`copy_pixels`] resample any decoded buffer into a
//! destination rectangle, optionally downscaling with a box filter;
//! [`decode_buffer`] goes straight from a stream into a caller-allocated
//! buffer without materializing a full-resolution intermediate.
mod registry;

pub(crate) mod formats;

pub use raster_frame::{
    AnimatedImage, BlendOp, BufferContainer, DelegateImage, Disposal, FramePatch, ImageFormat,
    ImageInfo, Prepare, StaticImage, VecContainer, compose,
};
pub use raster_grid::{Converter, PixelConfig, convert, copy_pixels};
pub use raster_stream::{MemoryStream, ReaderStream, SharedStream, Stream, StreamReader};

pub use registry::{describe, supported_formats};

#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    Io(std::io::Error),
    /// No registered format matched; carries the sniffed magic bytes.
    Unrecognized([u8; 2]),
    Frame(raster_frame::Error),
    Grid(raster_grid::Error),
    /// The stream was recognized but its content is not a decodable image.
    InvalidImage(&'static str),
    /// The host refused to allocate the destination buffer.
    NoBuffer,
    #[cfg(feature = "gif")]
    Gif(gif::DecodingError),
    #[cfg(feature = "png")]
    Png(png::DecodingError),
    #[cfg(feature = "jpeg")]
    Jpeg(jpeg_decoder::Error),
    #[cfg(feature = "webp")]
    Webp(image_webp::DecodingError),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<raster_frame::Error> for Error {
    fn from(err: raster_frame::Error) -> Self {
        Self::Frame(err)
    }
}

impl From<raster_grid::Error> for Error {
    fn from(err: raster_grid::Error) -> Self {
        Self::Grid(err)
    }
}

#[cfg(feature = "gif")]
impl From<gif::DecodingError> for Error {
    fn from(err: gif::DecodingError) -> Self {
        Self::Gif(err)
    }
}

#[cfg(feature = "png")]
impl From<png::DecodingError> for Error {
    fn from(err: png::DecodingError) -> Self {
        Self::Png(err)
    }
}

#[cfg(feature = "jpeg")]
impl From<jpeg_decoder::Error> for Error {
    fn from(err: jpeg_decoder::Error) -> Self {
        Self::Jpeg(err)
    }
}

#[cfg(feature = "webp")]
impl From<image_webp::DecodingError> for Error {
    fn from(err: image_webp::DecodingError) -> Self {
        Self::Webp(err)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "stream error: {err}"),
            Self::Unrecognized(magic) => write!(
                f,
                "cannot recognize the stream with starting bytes 0x{:02x} 0x{:02x}",
                magic[0], magic[1],
            ),
            Self::Frame(err) => write!(f, "{err}"),
            Self::Grid(err) => write!(f, "{err}"),
            Self::InvalidImage(what) => write!(f, "invalid image: {what}"),
            Self::NoBuffer => write!(f, "no destination buffer"),
            #[cfg(feature = "gif")]
            Self::Gif(err) => write!(f, "gif error: {err}"),
            #[cfg(feature = "png")]
            Self::Png(err) => write!(f, "png error: {err}"),
            #[cfg(feature = "jpeg")]
            Self::Jpeg(err) => write!(f, "jpeg error: {err}"),
            #[cfg(feature = "webp")]
            Self::Webp(err) => write!(f, "webp error: {err}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Frame(err) => Some(err),
            Self::Grid(err) => Some(err),
            #[cfg(feature = "gif")]
            Self::Gif(err) => Some(err),
            #[cfg(feature = "png")]
            Self::Png(err) => Some(err),
            #[cfg(feature = "jpeg")]
            Self::Jpeg(err) => Some(err),
            #[cfg(feature = "webp")]
            Self::Webp(err) => Some(err),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// A decoded image: either a single still frame or an animation.
pub enum Image {
    Static(StaticImage),
    Animated(Box<dyn AnimatedImage>),
}

impl Image {
    #[inline]
    pub fn is_animated(&self) -> bool {
        matches!(self, Self::Animated(_))
    }

    pub fn width(&self) -> u32 {
        match self {
            Self::Static(image) => image.width(),
            Self::Animated(image) => image.width(),
        }
    }

    pub fn height(&self) -> u32 {
        match self {
            Self::Static(image) => image.height(),
            Self::Animated(image) => image.height(),
        }
    }

    pub fn format(&self) -> ImageFormat {
        match self {
            Self::Static(image) => image.format(),
            Self::Animated(image) => image.format(),
        }
    }

    pub fn is_opaque(&self) -> bool {
        match self {
            Self::Static(image) => image.is_opaque(),
            Self::Animated(image) => image.is_opaque(),
        }
    }
}

/// Pixel layout requested for a [`decode_buffer`] destination.
///
/// `Auto` is resolved against the source's opacity before any pixels move:
/// opaque sources render to RGB565, everything else to RGBA8888. The
/// conversion layer itself only accepts the two explicit configs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BitmapConfig {
    #[default]
    Auto,
    Rgba8888,
    Rgb565,
}

impl BitmapConfig {
    pub fn resolve(self, opaque: bool) -> PixelConfig {
        match self {
            Self::Auto => {
                if opaque {
                    PixelConfig::Rgb565
                } else {
                    PixelConfig::Rgba8888
                }
            }
            Self::Rgba8888 => PixelConfig::Rgba8888,
            Self::Rgb565 => PixelConfig::Rgb565,
        }
    }
}

/// Source rectangle of a clipped [`decode_buffer`] request, in source pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClipRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Determines which registered format claims the stream.
///
/// Peeks the magic bytes without advancing the stream. When nothing matches,
/// the two sniffed bytes are reported in the error.
pub fn sniff(stream: &mut dyn Stream) -> Result<ImageFormat> {
    let mut magic = [0u8; 2];
    let read = stream.peek(&mut magic)?;
    if read < magic.len() {
        tracing::error!(read, "cannot read magic bytes from stream");
        return Err(Error::InvalidImage("stream shorter than a magic number"));
    }

    if let Some(format) = registry::match_magic(magic) {
        return Ok(format);
    }

    tracing::error!(
        "cannot recognize the stream with starting bytes: 0x{:02x} 0x{:02x}",
        magic[0],
        magic[1],
    );
    Err(Error::Unrecognized(magic))
}

/// Decodes a stream into a still image or an animation.
///
/// With `partially` set, multi-frame media decode only frame 0 up front and
/// the image is returned uncompleted; media that turn out to have exactly one
/// frame come back completed regardless. The stream stays owned by an
/// uncompleted animation until [`AnimatedImage::complete`] or
/// [`AnimatedImage::recycle`] releases it.
pub fn decode(stream: Box<dyn Stream>, partially: bool) -> Result<Image> {
    let mut stream = SharedStream::from_boxed(stream);
    let format = sniff(&mut stream)?;
    match format {
        #[cfg(feature = "jpeg")]
        ImageFormat::Jpeg => formats::jpeg::decode(stream),
        #[cfg(feature = "png")]
        ImageFormat::Png => formats::png::decode(stream, partially),
        #[cfg(feature = "gif")]
        ImageFormat::Gif => formats::gif::decode(stream, partially),
        #[cfg(feature = "webp")]
        ImageFormat::Webp => formats::webp::decode(stream, partially),
        _ => {
            tracing::error!(%format, "no decoder compiled in for format");
            Err(Error::InvalidImage("format support not compiled in"))
        }
    }
}

/// Reads header-level image facts without decoding pixel data.
pub fn decode_info(stream: &mut dyn Stream) -> Result<ImageInfo> {
    let format = sniff(stream)?;
    match format {
        #[cfg(feature = "jpeg")]
        ImageFormat::Jpeg => formats::jpeg::decode_info(stream),
        #[cfg(feature = "png")]
        ImageFormat::Png => formats::png::decode_info(stream),
        #[cfg(feature = "gif")]
        ImageFormat::Gif => formats::gif::decode_info(stream),
        #[cfg(feature = "webp")]
        ImageFormat::Webp => formats::webp::decode_info(stream),
        _ => {
            tracing::error!(%format, "no decoder compiled in for format");
            Err(Error::InvalidImage("format support not compiled in"))
        }
    }
}

/// Decodes a stream directly into a host-allocated buffer, downscaled by
/// `ratio` and converted to `config`, without keeping a full-resolution
/// intermediate around afterwards.
///
/// `clip` selects a source rectangle; `None` renders the whole image. The
/// destination buffer is requested from `container` at the downscaled size,
/// and `release_buffer` is called exactly once whether or not decoding
/// succeeds.
pub fn decode_buffer(
    stream: Box<dyn Stream>,
    clip: Option<ClipRect>,
    config: BitmapConfig,
    ratio: u32,
    container: &mut dyn BufferContainer,
) -> Result<()> {
    let mut stream = SharedStream::from_boxed(stream);
    let ratio = ratio.max(1);
    let result = sniff(&mut stream).and_then(|format| match format {
        #[cfg(feature = "jpeg")]
        ImageFormat::Jpeg => formats::jpeg::decode_buffer(stream, clip, config, ratio, container),
        #[cfg(feature = "png")]
        ImageFormat::Png => formats::png::decode_buffer(stream, clip, config, ratio, container),
        #[cfg(feature = "gif")]
        ImageFormat::Gif => {
            let image = formats::gif::decode(stream, true)?;
            formats::render_to_container(image, clip, config, ratio, container)
        }
        #[cfg(feature = "webp")]
        ImageFormat::Webp => {
            let image = formats::webp::decode(stream, true)?;
            formats::render_to_container(image, clip, config, ratio, container)
        }
        _ => {
            tracing::error!(%format, "no decoder compiled in for format");
            Err(Error::InvalidImage("format support not compiled in"))
        }
    });
    container.release_buffer();
    result
}

/// Wraps caller-provided RGBA pixels in a [`StaticImage`] without decoding.
pub fn create(width: u32, height: u32, pixels: &[u8]) -> Result<StaticImage> {
    // Opacity of foreign pixels is unknown; assume not opaque.
    StaticImage::new(width, height, ImageFormat::Plain, false, pixels.to_vec()).map_err(Error::from)
}
