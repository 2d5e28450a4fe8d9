/// The live render target of an animation.
///
/// `buffer` is the compositing canvas, `shown` the last presented copy
/// (double-buffered so a consumer never observes a half-composed frame), and
/// `backup` a lazily allocated one-slot snapshot used by the
/// restore-to-previous disposal mode. `index` is the currently materialized
/// frame, `-1` before the first [`advance`][crate::AnimatedImage::advance].
pub struct DelegateImage {
    width: u32,
    height: u32,
    index: i32,
    buffer: Vec<u8>,
    shown: Vec<u8>,
    backup: Option<Vec<u8>>,
}

impl DelegateImage {
    pub fn new(width: u32, height: u32) -> Self {
        let len = width as usize * height as usize * 4;
        Self {
            width,
            height,
            index: -1,
            buffer: vec![0; len],
            shown: vec![0; len],
            backup: None,
        }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Index of the materialized frame, `-1` when none is.
    #[inline]
    pub fn index(&self) -> i32 {
        self.index
    }

    pub(crate) fn set_index(&mut self, index: i32) {
        self.index = index;
    }

    /// Forgets the current position so the next advance materializes frame 0.
    pub fn reset(&mut self) {
        self.index = -1;
    }

    #[inline]
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    pub(crate) fn buffer_mut(&mut self) -> &mut [u8] {
        &mut self.buffer
    }

    /// The last fully composed frame.
    #[inline]
    pub fn shown(&self) -> &[u8] {
        &self.shown
    }

    /// Snapshots the canvas into the backup slot, allocating it on first use.
    pub(crate) fn backup(&mut self) {
        match &mut self.backup {
            Some(backup) => backup.copy_from_slice(&self.buffer),
            None => self.backup = Some(self.buffer.clone()),
        }
    }

    /// Restores the canvas from the backup slot.
    pub(crate) fn restore(&mut self) {
        match &self.backup {
            Some(backup) => self.buffer.copy_from_slice(backup),
            None => tracing::error!("cannot restore canvas: no backup was taken"),
        }
    }

    /// Swaps canvas and backup instead of copying; degrades to a plain
    /// snapshot when no backup exists yet.
    pub(crate) fn switch_backup(&mut self) {
        match &mut self.backup {
            Some(backup) => std::mem::swap(&mut self.buffer, backup),
            None => self.backup(),
        }
    }

    /// Publishes the canvas to `shown`.
    pub(crate) fn apply(&mut self) {
        self.shown.copy_from_slice(&self.buffer);
    }

    pub(crate) fn clear(&mut self, color: [u8; 4]) {
        if color == [0; 4] {
            self.buffer.fill(0);
        } else {
            for px in self.buffer.chunks_exact_mut(4) {
                px.copy_from_slice(&color);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backup_is_lazy() {
        let mut image = DelegateImage::new(2, 2);
        assert!(image.backup.is_none());

        image.buffer_mut().fill(7);
        image.backup();
        image.buffer_mut().fill(9);
        image.restore();
        assert!(image.buffer().iter().all(|&b| b == 7));
    }

    #[test]
    fn switch_backup_swaps_in_place() {
        let mut image = DelegateImage::new(1, 1);
        image.buffer_mut().copy_from_slice(&[1, 2, 3, 4]);
        image.backup();
        image.buffer_mut().copy_from_slice(&[5, 6, 7, 8]);

        image.switch_backup();
        assert_eq!(image.buffer(), &[1, 2, 3, 4]);
        assert_eq!(image.backup.as_deref().unwrap(), &[5, 6, 7, 8]);
    }
}
