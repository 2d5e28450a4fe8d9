//! WebP adapter: a thin RIFF demuxer feeding the `image-webp` codec.
//!
//! The container is read into memory up front (the codec needs random
//! access) and the source stream is closed immediately, mirroring the other
//! all-at-once formats. Animated files keep the raw buffer around while
//! uncompleted; each ANMF payload is re-wrapped as a standalone WebP and
//! decoded on demand.
mod demux;

use std::collections::VecDeque;
use std::io::Cursor;

use image_webp::WebPDecoder;
use raster_frame::{
    AnimatedImage, BlendOp, DelegateImage, Disposal, FramePatch, ImageFormat, ImageInfo, Prepare,
    StaticImage, compose,
};
use raster_stream::{SharedStream, Stream, read_all};

use crate::{Error, Image, Result};

pub(crate) const DESCRIPTION: &str = "WebP via the image-webp crate (pure Rust VP8/VP8L)";

struct WebpFrame {
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

impl WebpFrame {
    fn read(raw: &demux::AnmfFrame, data: &[u8], previous: Option<&WebpFrame>) -> Result<Self> {
        let pixels = decode_frame_pixels(raw, data)?;
        Ok(Self {
            width: raw.width,
            height: raw.height,
            offset_x: raw.x,
            offset_y: raw.y,
            delay_ms: raw.duration_ms,
            disposal: if raw.dispose_background {
                Disposal::Background
            } else {
                Disposal::None
            },
            blend: if raw.blend_over {
                BlendOp::Over
            } else {
                BlendOp::Source
            },
            prepare: Prepare::after(previous.map(|frame| frame.disposal)),
            pixels,
        })
    }
}

pub(crate) struct WebpImage {
    width: u32,
    height: u32,
    opaque: bool,
    completed: bool,
    frames: Vec<WebpFrame>,
    pending: VecDeque<demux::AnmfFrame>,
    /// Raw container bytes, kept only while frames are still pending.
    data: Option<Vec<u8>>,
    stream: Option<SharedStream>,
}

fn expand_rgb(buf: Vec<u8>) -> Vec<u8> {
    let mut out = vec![0u8; buf.len() / 3 * 4];
    for (px, rgb) in out.chunks_exact_mut(4).zip(buf.chunks_exact(3)) {
        px[..3].copy_from_slice(rgb);
        px[3] = 0xff;
    }
    out
}

/// Decodes one whole WebP file (or re-wrapped frame) to RGBA.
fn decode_webp_rgba(data: &[u8]) -> Result<(u32, u32, bool, Vec<u8>)> {
    let mut decoder = WebPDecoder::new(Cursor::new(data))?;
    let (width, height) = decoder.dimensions();
    let has_alpha = decoder.has_alpha();
    let len = decoder
        .output_buffer_size()
        .ok_or(Error::InvalidImage("webp output too large"))?;
    let mut buf = vec![0u8; len];
    decoder.read_image(&mut buf)?;

    let rgba = if has_alpha { buf } else { expand_rgb(buf) };
    Ok((width, height, has_alpha, rgba))
}

fn decode_frame_pixels(raw: &demux::AnmfFrame, data: &[u8]) -> Result<Vec<u8>> {
    let file = demux::standalone_frame(raw.width, raw.height, &data[raw.payload.clone()]);
    let (width, height, _, rgba) = decode_webp_rgba(&file)?;
    if (width, height) != (raw.width, raw.height) {
        tracing::warn!(
            anmf_width = raw.width,
            anmf_height = raw.height,
            width,
            height,
            "webp frame dimensions disagree with its ANMF header"
        );
        return Err(Error::InvalidImage("webp frame dimension mismatch"));
    }
    Ok(rgba)
}

pub(crate) fn decode(stream: SharedStream, partially: bool) -> Result<Image> {
    let mut stream = stream;
    let data = read_all(&mut stream)?;
    // The codec needs the whole container; nothing more to read.
    stream.close();

    let info = demux::demux(&data)?;
    if !info.has_animation {
        let (width, height, has_alpha, rgba) = decode_webp_rgba(&data)?;
        let image = StaticImage::new(width, height, ImageFormat::Webp, !has_alpha, rgba)?;
        return Ok(Image::Static(image));
    }

    if info.frames.is_empty() {
        return Err(Error::InvalidImage("animated webp without frames"));
    }
    let partially = partially && info.frames.len() > 1;

    let mut pending: VecDeque<demux::AnmfFrame> = info.frames.into();
    let first = pending.pop_front().expect("checked non-empty");
    let mut frames = vec![WebpFrame::read(&first, &data, None)?];

    if !partially {
        while let Some(raw) = pending.pop_front() {
            match WebpFrame::read(&raw, &data, frames.last()) {
                Ok(frame) => frames.push(frame),
                Err(err) => {
                    // Keep what decoded; a truncated animation beats none.
                    tracing::warn!(%err, decoded = frames.len(), "webp frame broke mid-decode");
                    pending.clear();
                    break;
                }
            }
        }
    }

    let completed = pending.is_empty();
    let image = WebpImage {
        width: info.width,
        height: info.height,
        opaque: !info.has_alpha,
        completed,
        frames,
        pending,
        data: if completed { None } else { Some(data) },
        stream: if completed { None } else { Some(stream) },
    };
    Ok(Image::Animated(Box::new(image)))
}

pub(crate) fn decode_info(stream: &mut dyn Stream) -> Result<ImageInfo> {
    let data = read_all(stream)?;
    let info = demux::demux(&data)?;
    if info.has_animation {
        return Ok(ImageInfo {
            width: info.width,
            height: info.height,
            format: ImageFormat::Webp,
            opaque: !info.has_alpha,
            frame_count: Some(info.frames.len() as u32),
        });
    }

    let mut decoder = WebPDecoder::new(Cursor::new(&data[..]))?;
    let (width, height) = decoder.dimensions();
    Ok(ImageInfo {
        width,
        height,
        format: ImageFormat::Webp,
        opaque: !decoder.has_alpha(),
        frame_count: Some(1),
    })
}

impl AnimatedImage for WebpImage {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn format(&self) -> ImageFormat {
        ImageFormat::Webp
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
                // Disposal clears to transparent; the ANIM background color
                // is only a compositing hint for the embedder.
                background: [0; 4],
            },
        );
    }

    fn complete(&mut self) {
        if self.completed {
            return;
        }

        if let Some(data) = &self.data {
            while let Some(raw) = self.pending.pop_front() {
                match WebpFrame::read(&raw, data, self.frames.last()) {
                    Ok(frame) => self.frames.push(frame),
                    Err(err) => {
                        // Truncate to the frames read so far.
                        tracing::warn!(
                            %err,
                            decoded = self.frames.len(),
                            "webp frame broke during completion"
                        );
                        self.pending.clear();
                        break;
                    }
                }
            }
        }

        self.data = None;
        self.pending = VecDeque::new();
        if let Some(stream) = self.stream.take() {
            stream.close();
        }
        self.completed = true;
    }

    fn recycle(&mut self) {
        self.frames = Vec::new();
        self.pending = VecDeque::new();
        self.data = None;
        if let Some(stream) = self.stream.take() {
            stream.close();
        }
    }

    fn stream(&self) -> Option<SharedStream> {
        self.stream.clone()
    }
}
