use raster_stream::SharedStream;

use crate::{DelegateImage, ImageFormat};

/// A multi-frame image decoded either completely or frame 0 only.
///
/// While [`is_completed`][Self::is_completed] is `false` the image keeps its
/// decode context and source stream alive; [`complete`][Self::complete] reads
/// the remaining frames and releases both. Implementations are driven by one
/// caller at a time; calls may hop between threads but never overlap.
pub trait AnimatedImage: Send {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    fn format(&self) -> ImageFormat;
    fn is_opaque(&self) -> bool;

    /// Whether every frame of the animation is decoded.
    fn is_completed(&self) -> bool;

    /// Number of frames decoded so far. Only final once completed.
    fn frame_count(&self) -> usize;

    /// Display duration of a frame in milliseconds. An out-of-range index is
    /// answered with 0.
    fn delay_ms(&self, index: usize) -> u32;

    /// Memory held by decoded frame pixels, in bytes.
    fn byte_count(&self) -> usize;

    /// Materializes the frame after `delegate.index()` (wrapping past the
    /// last frame) onto the delegate canvas. Never fails; a single-frame
    /// animation resting on its only frame is a no-op.
    fn advance(&mut self, delegate: &mut DelegateImage);

    /// Decodes all remaining frames, closes the stream and releases the
    /// decode context. A decode error truncates the animation to the frames
    /// read so far (never fewer than one) instead of failing. No-op once
    /// completed.
    fn complete(&mut self);

    /// Releases frame buffers, the decode context and the stream, if still
    /// open. The image is unusable afterwards; calling twice is harmless.
    fn recycle(&mut self);

    /// Handle to the source stream while decoding is still in progress.
    ///
    /// Callers must not close the stream before the image is completed.
    fn stream(&self) -> Option<SharedStream>;
}
