//! Runtime-selected fast paths for the hottest row kernels.
//!
//! The CPU probe runs once per process; the chosen function pointer is cached
//! in a `OnceLock` and a scalar kernel is always available as the fallback.
use std::sync::OnceLock;

use crate::row::{DirectRowFn, rgba8888_to_rgb565_row_scalar};

pub(crate) fn select_rgba8888_to_rgb565() -> DirectRowFn {
    static SELECTED: OnceLock<DirectRowFn> = OnceLock::new();
    *SELECTED.get_or_init(pick_rgba8888_to_rgb565)
}

fn pick_rgba8888_to_rgb565() -> DirectRowFn {
    #[cfg(target_arch = "x86_64")]
    {
        use std::arch::is_x86_feature_detected;
        if is_x86_feature_detected!("sse4.1") {
            tracing::debug!("rgba8888 to rgb565 row kernel: sse4.1");
            return x86_64::rgba8888_to_rgb565_row;
        }
    }

    tracing::debug!("rgba8888 to rgb565 row kernel: scalar");
    rgba8888_to_rgb565_row_scalar
}

#[cfg(target_arch = "x86_64")]
mod x86_64 {
    use super::rgba8888_to_rgb565_row_scalar;

    pub(crate) fn rgba8888_to_rgb565_row(dst: &mut [u8], src: &[u8], width: usize) {
        assert!(src.len() >= width * 4);
        assert!(dst.len() >= width * 2);
        // SAFETY: selected only after an sse4.1 probe; bounds checked above.
        unsafe { rgba8888_to_rgb565_row_sse41(dst, src, width) }
    }

    #[target_feature(enable = "sse4.1")]
    unsafe fn rgba8888_to_rgb565_row_sse41(dst: &mut [u8], src: &[u8], width: usize) {
        use std::arch::x86_64::*;

        let chunks = width / 4;
        let mut sp = src.as_ptr();
        let mut dp = dst.as_mut_ptr();
        for _ in 0..chunks {
            // Each 32-bit lane holds one pixel as A<<24 | B<<16 | G<<8 | R.
            unsafe {
                let px = _mm_loadu_si128(sp.cast());
                let r = _mm_slli_epi32::<8>(_mm_and_si128(px, _mm_set1_epi32(0x0000_00f8)));
                let g = _mm_srli_epi32::<5>(_mm_and_si128(px, _mm_set1_epi32(0x0000_fc00)));
                let b = _mm_srli_epi32::<19>(_mm_and_si128(px, _mm_set1_epi32(0x00f8_0000)));
                let texels = _mm_or_si128(_mm_or_si128(r, g), b);
                let packed = _mm_packus_epi32(texels, texels);
                _mm_storel_epi64(dp.cast(), packed);
                sp = sp.add(16);
                dp = dp.add(8);
            }
        }

        let done = chunks * 4;
        rgba8888_to_rgb565_row_scalar(&mut dst[done * 2..], &src[done * 4..], width - done);
    }

}
