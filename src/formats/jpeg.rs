//! JPEG adapter over the `jpeg-decoder` crate. Always produces a still
//! image.
use jpeg_decoder::PixelFormat;
use raster_frame::{BufferContainer, ImageFormat, ImageInfo, StaticImage};
use raster_stream::{SharedStream, Stream, StreamReader};

use super::BorrowedReader;
use crate::{BitmapConfig, ClipRect, Error, Image, Result};

pub(crate) const DESCRIPTION: &str = "JPEG via the jpeg-decoder crate (baseline + progressive)";

fn to_rgba(format: PixelFormat, src: &[u8]) -> Result<Vec<u8>> {
    match format {
        PixelFormat::RGB24 => {
            let mut out = vec![0u8; src.len() / 3 * 4];
            for (px, rgb) in out.chunks_exact_mut(4).zip(src.chunks_exact(3)) {
                px[..3].copy_from_slice(rgb);
                px[3] = 0xff;
            }
            Ok(out)
        }
        PixelFormat::L8 => {
            let mut out = vec![0u8; src.len() * 4];
            for (px, &luma) in out.chunks_exact_mut(4).zip(src.iter()) {
                px.copy_from_slice(&[luma, luma, luma, 0xff]);
            }
            Ok(out)
        }
        PixelFormat::L16 => {
            // Big-endian 16-bit luma; keep the high byte.
            let mut out = vec![0u8; src.len() / 2 * 4];
            for (px, luma) in out.chunks_exact_mut(4).zip(src.chunks_exact(2)) {
                px.copy_from_slice(&[luma[0], luma[0], luma[0], 0xff]);
            }
            Ok(out)
        }
        PixelFormat::CMYK32 => {
            let mut out = vec![0u8; src.len() / 4 * 4];
            for (px, cmyk) in out.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
                let k = cmyk[3] as u32;
                px[0] = (cmyk[0] as u32 * k / 255) as u8;
                px[1] = (cmyk[1] as u32 * k / 255) as u8;
                px[2] = (cmyk[2] as u32 * k / 255) as u8;
                px[3] = 0xff;
            }
            Ok(out)
        }
    }
}

pub(crate) fn decode(stream: SharedStream) -> Result<Image> {
    let mut decoder = jpeg_decoder::Decoder::new(StreamReader::new(stream));
    let pixels = decoder.decode()?;
    let info = decoder
        .info()
        .ok_or(Error::InvalidImage("jpeg header missing after decode"))?;

    let rgba = to_rgba(info.pixel_format, &pixels)?;
    let image = StaticImage::new(
        info.width as u32,
        info.height as u32,
        ImageFormat::Jpeg,
        true,
        rgba,
    )?;
    Ok(Image::Static(image))
}

pub(crate) fn decode_info(stream: &mut dyn Stream) -> Result<ImageInfo> {
    let mut decoder = jpeg_decoder::Decoder::new(BorrowedReader(stream));
    decoder.read_info()?;
    let info = decoder
        .info()
        .ok_or(Error::InvalidImage("jpeg header missing after read_info"))?;

    Ok(ImageInfo {
        width: info.width as u32,
        height: info.height as u32,
        format: ImageFormat::Jpeg,
        opaque: true,
        frame_count: Some(1),
    })
}

/// Scaled decode into a host buffer.
///
/// The decoder is dropped as soon as the needed scanlines are converted;
/// trailing stream data (restart padding, EOI) is never drained or
/// validated. That is an intentional speed trade-off: the discarded
/// decompressor state cannot affect the pixels already produced.
pub(crate) fn decode_buffer(
    stream: SharedStream,
    clip: Option<ClipRect>,
    config: BitmapConfig,
    ratio: u32,
    container: &mut dyn BufferContainer,
) -> Result<()> {
    let image = decode(stream)?;
    super::render_to_container(image, clip, config, ratio, container)
}
