//! Image models and the animation frame-composition engine.
//!
//! A decoded still image is a [`StaticImage`]. Animations are materialized
//! frame by frame into a [`DelegateImage`], the mutable render surface; the
//! per-format decoders describe each frame as a [`FramePatch`] and
//! [`compose`] reconstructs the canvas from the previous state using the
//! frame's disposal, blend and prepare operators. [`AnimatedImage`] is the
//! contract every animated format implements on top of this engine.
mod animated;
mod compose;
mod container;
mod delegate;
mod format;
mod static_image;

pub use animated::AnimatedImage;
pub use compose::{BlendOp, Disposal, FramePatch, Prepare, compose};
pub use container::{BufferContainer, VecContainer};
pub use delegate::DelegateImage;
pub use format::{ImageFormat, ImageInfo};
pub use static_image::StaticImage;

#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    BufferLength { expected: usize, actual: usize },
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BufferLength { expected, actual } => {
                write!(f, "expected a buffer of {expected} byte(s), got {actual}")
            }
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;
