//! PNG and APNG adapter over the `png` crate.
//!
//! The codec hands back raw APNG subframes and their fcTL metadata without
//! compositing; reconstruction of the canvas happens in the shared engine.
//! A PNG without an acTL chunk, and an APNG with a single frame, decode to a
//! [`StaticImage`]. An APNG whose default image is not part of the animation
//! (no fcTL before IDAT) has that image decoded and discarded.
use std::io::Read;

use png::{ColorType, Transformations};
use raster_frame::{
    AnimatedImage, BlendOp, DelegateImage, Disposal, FramePatch, ImageFormat, ImageInfo, Prepare,
    StaticImage, compose,
};
use raster_grid::{Converter, PixelConfig, convert, copy_pixels, floor_multiple};
use raster_stream::{SharedStream, Stream, StreamReader};

use super::BorrowedReader;
use crate::{BitmapConfig, ClipRect, Error, Image, Result};

pub(crate) const DESCRIPTION: &str = "PNG/APNG via the png crate (pure Rust)";

struct PngFrame {
    width: u32,
    height: u32,
    offset_x: u32,
    offset_y: u32,
    delay_ms: u32,
    disposal: Disposal,
    blend: BlendOp,
    prepare: Prepare,
    pixels: Vec<u8>,
}

pub(crate) struct PngImage {
    width: u32,
    height: u32,
    opaque: bool,
    completed: bool,
    declared_frames: u32,
    frames: Vec<PngFrame>,
    reader: Option<png::Reader<StreamReader>>,
    scratch: Vec<u8>,
    stream: Option<SharedStream>,
}

fn new_reader<R: Read>(source: R) -> Result<png::Reader<R>> {
    let mut decoder = png::Decoder::new(source);
    decoder.set_transformations(Transformations::EXPAND | Transformations::STRIP_16);
    Ok(decoder.read_info()?)
}

/// Expands any 8-bit post-transformation row to packed RGBA.
fn to_rgba_into(color_type: ColorType, src: &[u8], dst: &mut [u8]) -> Result<()> {
    match color_type {
        ColorType::Rgba => dst[..src.len()].copy_from_slice(src),
        ColorType::Rgb => {
            for (out, px) in dst.chunks_exact_mut(4).zip(src.chunks_exact(3)) {
                out[..3].copy_from_slice(px);
                out[3] = 0xff;
            }
        }
        ColorType::Grayscale => {
            for (out, &gray) in dst.chunks_exact_mut(4).zip(src.iter()) {
                out.copy_from_slice(&[gray, gray, gray, 0xff]);
            }
        }
        ColorType::GrayscaleAlpha => {
            for (out, px) in dst.chunks_exact_mut(4).zip(src.chunks_exact(2)) {
                out.copy_from_slice(&[px[0], px[0], px[0], px[1]]);
            }
        }
        ColorType::Indexed => {
            return Err(Error::InvalidImage("indexed pixels left after expansion"));
        }
    }
    Ok(())
}

fn to_rgba(color_type: ColorType, src: &[u8]) -> Result<Vec<u8>> {
    let samples = color_type.samples();
    let mut out = vec![0u8; src.len() / samples * 4];
    to_rgba_into(color_type, src, &mut out)?;
    Ok(out)
}

/// Decodes the next animation frame and pairs it with its fcTL, which the
/// reader has parsed by the time the frame data is consumed.
fn read_animation_frame<R: Read>(
    reader: &mut png::Reader<R>,
    scratch: &mut [u8],
) -> Result<(png::FrameControl, Vec<u8>)> {
    let out = reader.next_frame(scratch)?;
    let control = reader
        .info()
        .frame_control
        .clone()
        .ok_or(Error::InvalidImage("animation frame without fcTL"))?;
    let pixels = to_rgba(out.color_type, &scratch[..out.buffer_size()])?;
    Ok((control, pixels))
}

fn frame_from_control(
    control: &png::FrameControl,
    pixels: Vec<u8>,
    previous: Option<&PngFrame>,
    is_first: bool,
) -> PngFrame {
    let mut disposal = match control.dispose_op {
        png::DisposeOp::None => Disposal::None,
        png::DisposeOp::Background => Disposal::Background,
        png::DisposeOp::Previous => Disposal::Previous,
    };
    // There is nothing previous to the first frame to restore.
    if is_first && disposal == Disposal::Previous {
        disposal = Disposal::Background;
    }

    let delay_ms = if control.delay_den == 0 {
        0
    } else {
        1000 * control.delay_num as u32 / control.delay_den as u32
    };

    PngFrame {
        width: control.width,
        height: control.height,
        offset_x: control.x_offset,
        offset_y: control.y_offset,
        delay_ms,
        disposal,
        blend: match control.blend_op {
            png::BlendOp::Source => BlendOp::Source,
            png::BlendOp::Over => BlendOp::Over,
        },
        prepare: Prepare::after(previous.map(|frame| frame.disposal)),
        pixels,
    }
}

pub(crate) fn decode(stream: SharedStream, partially: bool) -> Result<Image> {
    let mut partially = partially;
    let mut reader = new_reader(StreamReader::new(stream.clone()))?;

    let info = reader.info();
    let width = info.width;
    let height = info.height;
    let animation = info.animation_control.clone();
    let first_control = info.frame_control.clone();
    if width == 0 || height == 0 {
        return Err(Error::InvalidImage("zero-sized png"));
    }
    let out_color = reader.output_color_type().0;
    let opaque = matches!(out_color, ColorType::Rgb | ColorType::Grayscale);

    let Some(animation) = animation else {
        // Plain PNG.
        let mut buf = vec![0u8; reader.output_buffer_size()];
        let out = reader.next_frame(&mut buf)?;
        let pixels = to_rgba(out.color_type, &buf[..out.buffer_size()])?;
        let image = StaticImage::new(width, height, ImageFormat::Png, opaque, pixels)?;
        return Ok(Image::Static(image));
    };

    let declared_frames = animation.num_frames;
    if declared_frames == 0 {
        return Err(Error::InvalidImage("apng with zero frames"));
    }
    // A single frame gains nothing from laziness.
    if declared_frames == 1 {
        partially = false;
    }

    let mut scratch = vec![0u8; reader.output_buffer_size()];

    // No fcTL ahead of IDAT means the default image is not an animation
    // frame; decode it to advance the stream and drop the pixels.
    if first_control.is_none() {
        reader.next_frame(&mut scratch)?;
    }

    let (control, pixels) = read_animation_frame(&mut reader, &mut scratch)?;
    let mut frames = vec![frame_from_control(&control, pixels, None, true)];

    if !partially {
        for _ in 1..declared_frames {
            let (control, pixels) = read_animation_frame(&mut reader, &mut scratch)?;
            let record = frame_from_control(&control, pixels, frames.last(), false);
            frames.push(record);
        }
    }

    if declared_frames == 1 {
        // Single-frame animation: composite onto a transparent canvas and
        // hand back a still image.
        let frame = &frames[0];
        let mut canvas = vec![0u8; width as usize * height as usize * 4];
        copy_pixels(
            &frame.pixels,
            frame.width,
            frame.height,
            0,
            0,
            &mut canvas,
            width,
            height,
            frame.offset_x as i32,
            frame.offset_y as i32,
            frame.width,
            frame.height,
            false,
            [0; 4],
        );
        let image = StaticImage::new(width, height, ImageFormat::Png, opaque, canvas)?;
        return Ok(Image::Static(image));
    }

    let image = PngImage {
        width,
        height,
        opaque,
        completed: !partially,
        declared_frames,
        frames,
        reader: if partially { Some(reader) } else { None },
        scratch: if partially { scratch } else { Vec::new() },
        stream: if partially { Some(stream) } else { None },
    };
    Ok(Image::Animated(Box::new(image)))
}

pub(crate) fn decode_info(stream: &mut dyn Stream) -> Result<ImageInfo> {
    let reader = new_reader(BorrowedReader(stream))?;
    let info = reader.info();
    let frame_count = info
        .animation_control
        .clone()
        .map(|animation| animation.num_frames)
        .unwrap_or(1);
    let opaque = matches!(
        reader.output_color_type().0,
        ColorType::Rgb | ColorType::Grayscale
    );

    Ok(ImageInfo {
        width: info.width,
        height: info.height,
        format: ImageFormat::Png,
        opaque,
        frame_count: Some(frame_count),
    })
}

/// Streams IDAT rows straight through a [`Converter`] into the destination
/// buffer, so no full-resolution intermediate is ever allocated. Interlaced
/// images fall back to a whole-frame decode; for an APNG this renders the
/// default image.
pub(crate) fn decode_buffer(
    stream: SharedStream,
    clip: Option<ClipRect>,
    config: BitmapConfig,
    ratio: u32,
    container: &mut dyn raster_frame::BufferContainer,
) -> Result<()> {
    let mut reader = new_reader(StreamReader::new(stream))?;
    let info = reader.info();
    let (width, height) = (info.width, info.height);
    let interlaced = info.interlaced;
    let out_color = reader.output_color_type().0;
    let opaque = matches!(out_color, ColorType::Rgb | ColorType::Grayscale);
    let pixel_config = config.resolve(opaque);

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
    let (dst_w, dst_h) = (crop_w / ratio, crop_h / ratio);

    if !container.create_buffer(dst_w, dst_h, pixel_config) {
        return Err(Error::NoBuffer);
    }

    if interlaced {
        let mut buf = vec![0u8; reader.output_buffer_size()];
        let out = reader.next_frame(&mut buf)?;
        let rgba = to_rgba(out.color_type, &buf[..out.buffer_size()])?;
        let buffer = container.buffer_mut().ok_or(Error::NoBuffer)?;
        convert(
            buffer,
            pixel_config,
            dst_w,
            dst_h,
            0,
            0,
            &rgba,
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
        return Ok(());
    }

    let buffer = container.buffer_mut().ok_or(Error::NoBuffer)?;
    let mut converter = Converter::new(PixelConfig::Rgba8888, pixel_config, ratio, dst_w as usize)?;
    let in_bpp = out_color.samples();
    let dst_row_bytes = dst_w as usize * pixel_config.bytes_per_pixel();
    let mut rgba_row = vec![0u8; crop_w as usize * 4];

    let mut y = 0u32;
    let mut written = 0usize;
    while let Some(row) = reader.next_row()? {
        if y >= clip.y && y < clip.y + crop_h {
            let start = clip.x as usize * in_bpp;
            let slice = &row.data()[start..start + crop_w as usize * in_bpp];
            to_rgba_into(out_color, slice, &mut rgba_row)?;

            let ready = if ratio == 1 {
                let dst = &mut buffer[written * dst_row_bytes..][..dst_row_bytes];
                converter.convert_row(dst, &rgba_row);
                true
            } else {
                converter.push_row(&rgba_row);
                if converter.ready() {
                    let dst = &mut buffer[written * dst_row_bytes..][..dst_row_bytes];
                    converter.take_row(dst);
                    true
                } else {
                    false
                }
            };
            if ready {
                written += 1;
                if written as u32 == dst_h {
                    break;
                }
            }
        }
        y += 1;
    }

    Ok(())
}

impl AnimatedImage for PngImage {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn format(&self) -> ImageFormat {
        ImageFormat::Png
    }

    fn is_opaque(&self) -> bool {
        self.opaque
    }

    fn is_completed(&self) -> bool {
        self.completed
    }

    fn frame_count(&self) -> usize {
        self.frames.len()
    }

    fn delay_ms(&self, index: usize) -> u32 {
        match self.frames.get(index) {
            Some(frame) => frame.delay_ms,
            None => {
                tracing::error!(
                    frame_count = self.frames.len(),
                    index,
                    "delay requested for an out-of-range frame"
                );
                0
            }
        }
    }

    fn byte_count(&self) -> usize {
        self.frames.iter().map(|frame| frame.pixels.len()).sum()
    }

    fn advance(&mut self, delegate: &mut DelegateImage) {
        let count = self.frames.len() as i32;
        if count == 0 {
            return;
        }
        let mut target = delegate.index() + 1;
        if target < 0 || target >= count {
            target = 0;
        }
        if target == delegate.index() {
            return;
        }

        let frame = &self.frames[target as usize];
        compose(
            delegate,
            target as usize,
            &FramePatch {
                pixels: &frame.pixels,
                width: frame.width,
                height: frame.height,
                offset_x: frame.offset_x,
                offset_y: frame.offset_y,
                disposal: frame.disposal,
                blend: frame.blend,
                prepare: frame.prepare,
                background: [0; 4],
            },
        );
    }

    fn complete(&mut self) {
        if self.completed {
            return;
        }

        if let Some(reader) = &mut self.reader {
            while (self.frames.len() as u32) < self.declared_frames {
                match read_animation_frame(reader, &mut self.scratch) {
                    Ok((control, pixels)) => {
                        let record =
                            frame_from_control(&control, pixels, self.frames.last(), false);
                        self.frames.push(record);
                    }
                    Err(err) => {
                        // Truncate to the frames read so far.
                        tracing::warn!(
                            %err,
                            decoded = self.frames.len(),
                            declared = self.declared_frames,
                            "apng stream broke during completion"
                        );
                        break;
                    }
                }
            }
        }

        self.reader = None;
        self.scratch = Vec::new();
        if let Some(stream) = self.stream.take() {
            stream.close();
        }
        self.completed = true;
    }

    fn recycle(&mut self) {
        self.frames = Vec::new();
        self.reader = None;
        self.scratch = Vec::new();
        if let Some(stream) = self.stream.take() {
            stream.close();
        }
    }

    fn stream(&self) -> Option<SharedStream> {
        self.stream.clone()
    }
}
