//! Per-format decoder adapters.
//!
//! Each adapter owns the glue to one third-party codec crate and feeds the
//! decoded scanlines and frame metadata into the shared composition and
//! conversion engines. The codec crates do the entropy decoding; disposal,
//! blending and canvas state are handled here and in `raster-frame`.
#[cfg(feature = "gif")]
pub(crate) mod gif;
#[cfg(feature = "jpeg")]
pub(crate) mod jpeg;
#[cfg(feature = "png")]
pub(crate) mod png;
#[cfg(feature = "webp")]
pub(crate) mod webp;

use raster_frame::{BufferContainer, DelegateImage};
use raster_grid::{PixelConfig, convert, floor_multiple};
use raster_stream::Stream;

use crate::{BitmapConfig, ClipRect, Error, Image, Result};

/// `std::io::Read` view of a borrowed stream, for header-only decodes.
pub(crate) struct BorrowedReader<'a>(pub &'a mut dyn Stream);

impl std::io::Read for BorrowedReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.0.read(buf)
    }
}

/// Fallback `decode_buffer` path: materialize frame 0, then resample it into
/// the container. Formats without a row-streaming decode go through here.
pub(crate) fn render_to_container(
    image: Image,
    clip: Option<ClipRect>,
    config: BitmapConfig,
    ratio: u32,
    container: &mut dyn BufferContainer,
) -> Result<()> {
    let (width, height, opaque, canvas) = match image {
        Image::Static(image) => (
            image.width(),
            image.height(),
            image.is_opaque(),
            image.into_buffer(),
        ),
        Image::Animated(mut image) => {
            let mut delegate = DelegateImage::new(image.width(), image.height());
            image.advance(&mut delegate);
            let canvas = delegate.shown().to_vec();
            let meta = (image.width(), image.height(), image.is_opaque(), canvas);
            image.recycle();
            meta
        }
    };

    let clip = clip.unwrap_or(ClipRect {
        x: 0,
        y: 0,
        width,
        height,
    });
    let crop_w = floor_multiple(clip.width.min(width.saturating_sub(clip.x)), ratio);
    let crop_h = floor_multiple(clip.height.min(height.saturating_sub(clip.y)), ratio);
    if crop_w == 0 || crop_h == 0 {
        return Err(Error::InvalidImage("clip region smaller than the ratio"));
    }

    let pixel_config = config.resolve(opaque);
    let (dst_w, dst_h) = (crop_w / ratio, crop_h / ratio);
    if !container.create_buffer(dst_w, dst_h, pixel_config) {
        return Err(Error::NoBuffer);
    }
    let buffer = container.buffer_mut().ok_or(Error::NoBuffer)?;

    let converted = convert(
        buffer,
        pixel_config,
        dst_w,
        dst_h,
        0,
        0,
        &canvas,
        PixelConfig::Rgba8888,
        width,
        height,
        clip.x as i32,
        clip.y as i32,
        crop_w,
        crop_h,
        ratio,
        false,
        [0; 4],
    );
    if converted {
        Ok(())
    } else {
        Err(Error::InvalidImage("unsatisfiable scale request"))
    }
}
