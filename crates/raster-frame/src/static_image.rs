use crate::{Error, ImageFormat, Result};

/// An immutable decoded single-frame image, packed RGBA8888.
#[derive(Debug, Clone)]
pub struct StaticImage {
    width: u32,
    height: u32,
    format: ImageFormat,
    opaque: bool,
    buffer: Vec<u8>,
}

impl StaticImage {
    /// Wraps a decoded pixel buffer. `buffer` must hold exactly
    /// `width * height * 4` bytes.
    pub fn new(
        width: u32,
        height: u32,
        format: ImageFormat,
        opaque: bool,
        buffer: Vec<u8>,
    ) -> Result<Self> {
        let expected = width as usize * height as usize * 4;
        if buffer.len() != expected {
            return Err(Error::BufferLength {
                expected,
                actual: buffer.len(),
            });
        }
        Ok(Self {
            width,
            height,
            format,
            opaque,
            buffer,
        })
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn format(&self) -> ImageFormat {
        self.format
    }

    #[inline]
    pub fn is_opaque(&self) -> bool {
        self.opaque
    }

    #[inline]
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    pub fn byte_count(&self) -> usize {
        self.buffer.len()
    }

    pub fn into_buffer(self) -> Vec<u8> {
        self.buffer
    }
}
