//! GIF adapter over the `gif` crate.
//!
//! The decoder streams one frame at a time, which maps directly onto partial
//! decoding: frame 0 is read up front and the open decoder is kept inside
//! the image until `complete` drains the rest. GIF cannot report its frame
//! count without walking the whole stream, so `decode_info` leaves it
//! unknown.
use gif::{ColorOutput, DecodeOptions, DisposalMethod};
use raster_frame::{
    AnimatedImage, BlendOp, DelegateImage, Disposal, FramePatch, ImageFormat, ImageInfo, Prepare,
    compose,
};
use raster_stream::{SharedStream, Stream, StreamReader};

use super::BorrowedReader;
use crate::{Error, Image, Result};

pub(crate) const DESCRIPTION: &str = "GIF via the gif crate (pure Rust, streaming)";

struct GifFrame {
    width: u32,
    height: u32,
    left: u32,
    top: u32,
    delay_ms: u32,
    disposal: Disposal,
    prepare: Prepare,
    transparent: bool,
    pixels: Vec<u8>,
}

impl GifFrame {
    fn read(frame: &gif::Frame<'_>, previous: Option<&GifFrame>) -> Self {
        let disposal = match frame.dispose {
            DisposalMethod::Any | DisposalMethod::Keep => Disposal::None,
            DisposalMethod::Background => Disposal::Background,
            DisposalMethod::Previous => Disposal::Previous,
        };

        Self {
            width: frame.width as u32,
            height: frame.height as u32,
            left: frame.left as u32,
            top: frame.top as u32,
            // GIF delays are in centiseconds.
            delay_ms: frame.delay as u32 * 10,
            disposal,
            prepare: Prepare::after(previous.map(|frame| frame.disposal)),
            transparent: frame.transparent.is_some(),
            pixels: frame.buffer.to_vec(),
        }
    }
}

pub(crate) struct GifImage {
    width: u32,
    height: u32,
    opaque: bool,
    completed: bool,
    background: [u8; 4],
    frames: Vec<GifFrame>,
    decoder: Option<gif::Decoder<StreamReader>>,
    stream: Option<SharedStream>,
}

fn background_color(decoder: &gif::Decoder<StreamReader>) -> [u8; 4] {
    match (decoder.global_palette(), decoder.bg_color()) {
        (Some(palette), Some(index)) if (index + 1) * 3 <= palette.len() => [
            palette[index * 3],
            palette[index * 3 + 1],
            palette[index * 3 + 2],
            0xff,
        ],
        _ => [0; 4],
    }
}

pub(crate) fn decode(stream: SharedStream, partially: bool) -> Result<Image> {
    let mut options = DecodeOptions::new();
    options.set_color_output(ColorOutput::RGBA);
    let mut decoder = options.read_info(StreamReader::new(stream.clone()))?;

    let width = decoder.width() as u32;
    let height = decoder.height() as u32;
    let background = background_color(&decoder);

    let first = decoder
        .read_next_frame()?
        .ok_or(Error::InvalidImage("no frame"))?;
    let mut frames = vec![GifFrame::read(first, None)];

    let mut exhausted = false;
    if !partially {
        loop {
            match decoder.read_next_frame() {
                Ok(Some(frame)) => {
                    let record = GifFrame::read(frame, frames.last());
                    frames.push(record);
                }
                Ok(None) => {
                    exhausted = true;
                    break;
                }
                Err(err) => {
                    // Keep what decoded; a truncated animation beats none.
                    tracing::warn!(%err, decoded = frames.len(), "gif stream broke mid-decode");
                    exhausted = true;
                    break;
                }
            }
        }
    }

    let opaque = !frames[0].transparent;
    let image = GifImage {
        width,
        height,
        opaque,
        completed: exhausted,
        background,
        frames,
        decoder: if exhausted { None } else { Some(decoder) },
        stream: if exhausted { None } else { Some(stream) },
    };
    Ok(Image::Animated(Box::new(image)))
}

pub(crate) fn decode_info(stream: &mut dyn Stream) -> Result<ImageInfo> {
    let mut options = DecodeOptions::new();
    options.set_color_output(ColorOutput::RGBA);
    let decoder = options.read_info(BorrowedReader(stream))?;

    Ok(ImageInfo {
        width: decoder.width() as u32,
        height: decoder.height() as u32,
        format: ImageFormat::Gif,
        // Opacity is per-frame; unknowable from the header alone.
        opaque: false,
        // Counting frames requires decoding them all.
        frame_count: None,
    })
}

impl AnimatedImage for GifImage {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn format(&self) -> ImageFormat {
        ImageFormat::Gif
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
                offset_x: frame.left,
                offset_y: frame.top,
                disposal: frame.disposal,
                // GIF pixels are fully opaque or fully transparent;
                // transparent pixels keep the canvas.
                blend: BlendOp::Over,
                prepare: frame.prepare,
                background: self.background,
            },
        );
    }

    fn complete(&mut self) {
        if self.completed {
            return;
        }

        if let Some(decoder) = &mut self.decoder {
            loop {
                match decoder.read_next_frame() {
                    Ok(Some(frame)) => {
                        let record = GifFrame::read(frame, self.frames.last());
                        self.frames.push(record);
                    }
                    Ok(None) => break,
                    Err(err) => {
                        tracing::warn!(
                            %err,
                            decoded = self.frames.len(),
                            "gif stream broke during completion"
                        );
                        break;
                    }
                }
            }
        }

        self.decoder = None;
        if let Some(stream) = self.stream.take() {
            stream.close();
        }
        self.completed = true;
    }

    fn recycle(&mut self) {
        self.frames = Vec::new();
        self.decoder = None;
        if let Some(stream) = self.stream.take() {
            stream.close();
        }
    }

    fn stream(&self) -> Option<SharedStream> {
        self.stream.clone()
    }
}
