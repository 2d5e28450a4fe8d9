use raster_grid::PixelConfig;

/// Destination-buffer allocation contract for direct-to-buffer decoding.
///
/// The host owns the allocation (it may pin a foreign bitmap);
/// [`create_buffer`][Self::create_buffer] is called at most once per
/// container, and [`release_buffer`][Self::release_buffer] exactly once
/// afterwards, whether or not the decode succeeded.
pub trait BufferContainer {
    /// Allocates a `width x height` buffer in `config`. Returns `false` when
    /// the host cannot provide one.
    fn create_buffer(&mut self, width: u32, height: u32, config: PixelConfig) -> bool;

    /// The allocated pixels, between `create_buffer` and `release_buffer`.
    fn buffer_mut(&mut self) -> Option<&mut [u8]>;

    /// Finalizes the buffer.
    fn release_buffer(&mut self);
}

/// Plain heap-backed container.
#[derive(Default)]
pub struct VecContainer {
    buffer: Option<Vec<u8>>,
    width: u32,
    height: u32,
    config: Option<PixelConfig>,
}

impl VecContainer {
    pub fn new() -> Self {
        Self::default()
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
    pub fn config(&self) -> Option<PixelConfig> {
        self.config
    }

    /// Takes the decoded pixels out of the container.
    pub fn into_buffer(self) -> Option<Vec<u8>> {
        self.buffer
    }
}

impl BufferContainer for VecContainer {
    fn create_buffer(&mut self, width: u32, height: u32, config: PixelConfig) -> bool {
        debug_assert!(self.buffer.is_none(), "create_buffer called twice");
        self.width = width;
        self.height = height;
        self.config = Some(config);
        self.buffer = Some(vec![
            0;
            width as usize * height as usize * config.bytes_per_pixel()
        ]);
        true
    }

    fn buffer_mut(&mut self) -> Option<&mut [u8]> {
        self.buffer.as_deref_mut()
    }

    fn release_buffer(&mut self) {}
}
