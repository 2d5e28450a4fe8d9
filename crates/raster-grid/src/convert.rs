use crate::config::PixelConfig;
use crate::row::Converter;

/// Fills `dst` with a repeated packed pixel pattern.
fn fill_pixels(dst: &mut [u8], pattern: &[u8]) {
    for px in dst.chunks_exact_mut(pattern.len()) {
        px.copy_from_slice(pattern);
    }
}

#[inline]
fn floor_multiple_i64(value: i64, multiple: i64) -> i64 {
    value - value.rem_euclid(multiple)
}

#[inline]
fn ceil_multiple_i64(value: i64, multiple: i64) -> i64 {
    let remainder = value.rem_euclid(multiple);
    if remainder == 0 {
        value
    } else {
        value - remainder + multiple
    }
}

/// Converts a crop rectangle of `src` into `dst`, downscaling by an integer
/// `ratio` with a box filter and translating between pixel configs.
///
/// `(src_x, src_y)` and `(dst_x, dst_y)` may be negative and the crop may
/// overhang any edge; the overlapping region is clamped to a ratio-aligned
/// rectangle valid in both buffers. When `fill_blank` is set, destination
/// area not covered by the converted region is filled with `fill_color`
/// (given as RGBA and packed into the destination config), and a request
/// with no valid overlap at all fills the whole destination instead.
///
/// Returns whether any source pixels were converted.
#[allow(clippy::too_many_arguments)]
pub fn convert(
    dst: &mut [u8],
    dst_config: PixelConfig,
    dst_w: u32,
    dst_h: u32,
    dst_x: i32,
    dst_y: i32,
    src: &[u8],
    src_config: PixelConfig,
    src_w: u32,
    src_h: u32,
    src_x: i32,
    src_y: i32,
    width: u32,
    height: u32,
    ratio: u32,
    fill_blank: bool,
    fill_color: [u8; 4],
) -> bool {
    assert!(dst.len() >= dst_w as usize * dst_h as usize * dst_config.bytes_per_pixel());
    assert!(src.len() >= src_w as usize * src_h as usize * src_config.bytes_per_pixel());

    let (pattern, pattern_len) = dst_config.pack_color(fill_color);
    let pattern = &pattern[..pattern_len];

    let converted = convert_internal(
        dst, dst_config, dst_w, dst_h, dst_x, dst_y, src, src_config, src_w, src_h, src_x, src_y,
        width, height, ratio, fill_blank, pattern,
    );
    if !converted && fill_blank {
        let total = dst_w as usize * dst_h as usize * dst_config.bytes_per_pixel();
        fill_pixels(&mut dst[..total], pattern);
    }
    converted
}

#[allow(clippy::too_many_arguments)]
fn convert_internal(
    dst: &mut [u8],
    dst_config: PixelConfig,
    dst_w: u32,
    dst_h: u32,
    dst_x: i32,
    dst_y: i32,
    src: &[u8],
    src_config: PixelConfig,
    src_w: u32,
    src_h: u32,
    src_x: i32,
    src_y: i32,
    width: u32,
    height: u32,
    ratio: u32,
    fill_blank: bool,
    pattern: &[u8],
) -> bool {
    if ratio == 0 {
        tracing::error!(ratio, "invalid downscale ratio");
        return false;
    }

    let ratio = ratio as i64;
    let (dst_w, dst_h) = (dst_w as i64, dst_h as i64);
    let (src_w, src_h) = (src_w as i64, src_h as i64);
    let (mut dst_x, mut dst_y) = (dst_x as i64, dst_y as i64);
    let (mut src_x, mut src_y) = (src_x as i64, src_y as i64);

    // The crop covers whole ratio-sized blocks only.
    let mut width = floor_multiple_i64(width as i64, ratio);
    let mut height = floor_multiple_i64(height as i64, ratio);

    // A ratio larger than the crop cannot produce a single pixel.
    if ratio > width || ratio > height {
        return false;
    }

    // Clamp x >= 0 on both sides.
    if src_x < 0 {
        let advance = ceil_multiple_i64(-src_x, ratio);
        src_x += advance;
        dst_x += advance / ratio;
        width -= advance;
    }
    if dst_x < 0 {
        let advance = -dst_x * ratio;
        src_x += advance;
        dst_x = 0;
        width -= advance;
    }
    if width <= 0 {
        return false;
    }

    // Clamp y >= 0 on both sides.
    if src_y < 0 {
        let advance = ceil_multiple_i64(-src_y, ratio);
        src_y += advance;
        dst_y += advance / ratio;
        height -= advance;
    }
    if dst_y < 0 {
        let advance = -dst_y * ratio;
        src_y += advance;
        dst_y = 0;
        height -= advance;
    }
    if height <= 0 {
        return false;
    }

    // Clamp x + width within both buffers.
    let overflow = src_x + width - src_w;
    if overflow > 0 {
        width -= ceil_multiple_i64(overflow, ratio);
    }
    let overflow = dst_x + width / ratio - dst_w;
    if overflow > 0 {
        width -= overflow * ratio;
    }
    if width <= 0 {
        return false;
    }

    // Clamp y + height within both buffers.
    let overflow = src_y + height - src_h;
    if overflow > 0 {
        height -= ceil_multiple_i64(overflow, ratio);
    }
    let overflow = dst_y + height / ratio - dst_h;
    if overflow > 0 {
        height -= overflow * ratio;
    }
    if height <= 0 {
        return false;
    }

    let d_width = (width / ratio) as usize;
    let d_height = (height / ratio) as usize;
    let mut converter = match Converter::new(src_config, dst_config, ratio as u32, d_width) {
        Ok(converter) => converter,
        Err(err) => {
            tracing::error!(%err, "cannot bind a row function");
            return false;
        }
    };

    let src_bpp = src_config.bytes_per_pixel();
    let dst_bpp = dst_config.bytes_per_pixel();
    let (ratio, dst_w) = (ratio as usize, dst_w as usize);
    let (dst_x, dst_y) = (dst_x as usize, dst_y as usize);
    let (src_x, src_y) = (src_x as usize, src_y as usize);
    let src_row_bytes = width as usize * src_bpp;
    let src_stride = src_w as usize * src_bpp;

    // Leading blank rows.
    if fill_blank && dst_y > 0 {
        fill_pixels(&mut dst[..dst_y * dst_w * dst_bpp], pattern);
    }

    for i in 0..d_height {
        let row_start = (dst_y + i) * dst_w * dst_bpp;
        let row = &mut dst[row_start..row_start + dst_w * dst_bpp];
        let (left, rest) = row.split_at_mut(dst_x * dst_bpp);
        let (mid, right) = rest.split_at_mut(d_width * dst_bpp);
        if fill_blank {
            fill_pixels(left, pattern);
            fill_pixels(right, pattern);
        }

        if ratio == 1 {
            let start = (src_y + i) * src_stride + src_x * src_bpp;
            converter.convert_row(mid, &src[start..start + src_row_bytes]);
        } else {
            for k in 0..ratio {
                let start = (src_y + i * ratio + k) * src_stride + src_x * src_bpp;
                converter.push_row(&src[start..start + src_row_bytes]);
            }
            converter.take_row(mid);
        }
    }

    // Trailing blank rows.
    let consumed = (dst_y + d_height) * dst_w;
    let total = dst_w * dst_h as usize;
    if fill_blank && consumed < total {
        fill_pixels(&mut dst[consumed * dst_bpp..total * dst_bpp], pattern);
    }

    true
}

/// RGBA8888-only 1:1 region copy, the render-path shorthand over [`convert`].
#[allow(clippy::too_many_arguments)]
pub fn copy_pixels(
    src: &[u8],
    src_w: u32,
    src_h: u32,
    src_x: i32,
    src_y: i32,
    dst: &mut [u8],
    dst_w: u32,
    dst_h: u32,
    dst_x: i32,
    dst_y: i32,
    width: u32,
    height: u32,
    fill_blank: bool,
    fill_color: [u8; 4],
) -> bool {
    convert(
        dst,
        PixelConfig::Rgba8888,
        dst_w,
        dst_h,
        dst_x,
        dst_y,
        src,
        PixelConfig::Rgba8888,
        src_w,
        src_h,
        src_x,
        src_y,
        width,
        height,
        1,
        fill_blank,
        fill_color,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rgba_image(width: usize, height: usize) -> Vec<u8> {
        (0..width * height * 4)
            .map(|i| (i * 31 % 251) as u8)
            .collect()
    }

    #[test]
    fn ratio_one_same_config_is_identity() {
        let src = rgba_image(4, 4);
        let mut dst = vec![0u8; 4 * 4 * 4];
        let ok = convert(
            &mut dst,
            PixelConfig::Rgba8888,
            4,
            4,
            0,
            0,
            &src,
            PixelConfig::Rgba8888,
            4,
            4,
            0,
            0,
            4,
            4,
            1,
            false,
            [0; 4],
        );
        assert!(ok);
        assert_eq!(dst, src);
    }

    #[test]
    fn ratio_one_cross_config_shifts_channels() {
        // One opaque colored pixel and one transparent black pixel.
        let src = [200u8, 100, 50, 255, 0, 0, 0, 0];
        let mut dst = vec![0u8; 4];
        let ok = convert(
            &mut dst,
            PixelConfig::Rgb565,
            2,
            1,
            0,
            0,
            &src,
            PixelConfig::Rgba8888,
            2,
            1,
            0,
            0,
            2,
            1,
            1,
            false,
            [0; 4],
        );
        assert!(ok);

        let expected = ((200u16 >> 3) << 11) | ((100u16 >> 2) << 5) | (50 >> 3);
        assert_eq!(u16::from_le_bytes([dst[0], dst[1]]), expected);
        assert_eq!(u16::from_le_bytes([dst[2], dst[3]]), 0);
    }

    #[test]
    fn box_filter_preserves_constant_color() {
        let px = [120u8, 60, 30, 255];
        let src: Vec<u8> = px.repeat(8 * 8);
        let mut dst = vec![0u8; 2 * 2 * 4];
        let ok = convert(
            &mut dst,
            PixelConfig::Rgba8888,
            2,
            2,
            0,
            0,
            &src,
            PixelConfig::Rgba8888,
            8,
            8,
            0,
            0,
            8,
            8,
            4,
            false,
            [0; 4],
        );
        assert!(ok);
        for out in dst.chunks_exact(4) {
            assert_eq!(out, px);
        }
    }

    #[test]
    fn red_four_by_four_to_rgb565_at_ratio_two() {
        let src: Vec<u8> = [0xff, 0x00, 0x00, 0xff].repeat(16);
        let mut dst = vec![0u8; 2 * 2 * 2];
        let ok = convert(
            &mut dst,
            PixelConfig::Rgb565,
            2,
            2,
            0,
            0,
            &src,
            PixelConfig::Rgba8888,
            4,
            4,
            0,
            0,
            4,
            4,
            2,
            false,
            [0; 4],
        );
        assert!(ok);
        for texel in dst.chunks_exact(2) {
            assert_eq!(u16::from_le_bytes([texel[0], texel[1]]), 0xf800);
        }
    }

    #[test]
    fn negative_dst_origin_advances_source() {
        // dst_x = -3 at ratio 2 must consume 6 extra source columns and
        // start writing at destination column 0.
        let mut src = vec![0u8; 16 * 2 * 4];
        // Mark source column 6..8, rows 0..2 red: the block that lands at
        // destination pixel (0, 0).
        for y in 0..2 {
            for x in 6..8 {
                let at = (y * 16 + x) * 4;
                src[at..at + 4].copy_from_slice(&[255, 0, 0, 255]);
            }
        }
        let mut dst = vec![0u8; 8 * 1 * 4];
        let ok = convert(
            &mut dst,
            PixelConfig::Rgba8888,
            8,
            1,
            -3,
            0,
            &src,
            PixelConfig::Rgba8888,
            16,
            2,
            0,
            0,
            16,
            2,
            2,
            false,
            [0; 4],
        );
        assert!(ok);
        assert_eq!(&dst[..4], &[255, 0, 0, 255]);
        assert!(dst[4..].iter().all(|&b| b == 0));
    }

    #[test]
    fn clamping_never_leaves_buffer_bounds() {
        let src = rgba_image(13, 11);
        for ratio in [1u32, 2, 3, 4, 8] {
            for &(sx, sy) in &[(-7i32, -5i32), (0, 0), (5, 9), (20, 3)] {
                for &(dx, dy) in &[(-3i32, -2i32), (0, 0), (4, 6), (9, 9)] {
                    for &(w, h) in &[(64u32, 64u32), (13, 11), (3, 30)] {
                        let mut dst = vec![0u8; 10 * 10 * 4];
                        // Out-of-bounds access would panic via slice indexing.
                        convert(
                            &mut dst,
                            PixelConfig::Rgba8888,
                            10,
                            10,
                            dx,
                            dy,
                            &src,
                            PixelConfig::Rgba8888,
                            13,
                            11,
                            sx,
                            sy,
                            w,
                            h,
                            ratio,
                            true,
                            [1, 2, 3, 4],
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn infeasible_request_fills_whole_destination() {
        let src = rgba_image(2, 2);
        let mut dst = vec![0u8; 4 * 4 * 2];
        // ratio 8 cannot be satisfied by a 2x2 source.
        let ok = convert(
            &mut dst,
            PixelConfig::Rgb565,
            4,
            4,
            0,
            0,
            &src,
            PixelConfig::Rgba8888,
            2,
            2,
            0,
            0,
            2,
            2,
            8,
            true,
            [0xff, 0x00, 0x00, 0xff],
        );
        assert!(!ok);
        for texel in dst.chunks_exact(2) {
            assert_eq!(u16::from_le_bytes([texel[0], texel[1]]), 0xf800);
        }
    }

    #[test]
    fn filled_border_matches_converted_pixels() {
        // A solid source converted into the middle of a larger destination
        // with the same fill color must come out uniform.
        let color = [31u8, 200, 96, 255];
        let src: Vec<u8> = color.repeat(4);
        let mut dst = vec![0u8; 4 * 4 * 2];
        let ok = convert(
            &mut dst,
            PixelConfig::Rgb565,
            4,
            4,
            1,
            1,
            &src,
            PixelConfig::Rgba8888,
            2,
            2,
            0,
            0,
            2,
            2,
            1,
            true,
            color,
        );
        assert!(ok);
        let first = [dst[0], dst[1]];
        for texel in dst.chunks_exact(2) {
            assert_eq!(texel, &first);
        }
    }

    #[test]
    fn unsupported_pairing_fails_and_fills() {
        let src = vec![0u8; 2 * 2 * 2];
        let mut dst = vec![0u8; 2 * 2 * 4];
        let ok = convert(
            &mut dst,
            PixelConfig::Rgba8888,
            2,
            2,
            0,
            0,
            &src,
            PixelConfig::Rgb565,
            2,
            2,
            0,
            0,
            2,
            2,
            1,
            true,
            [9, 9, 9, 9],
        );
        assert!(!ok);
        for px in dst.chunks_exact(4) {
            assert_eq!(px, [9, 9, 9, 9]);
        }
    }

    #[test]
    fn copy_pixels_copies_subregion() {
        let src = rgba_image(6, 6);
        let mut dst = vec![0u8; 3 * 3 * 4];
        let ok = copy_pixels(&src, 6, 6, 2, 2, &mut dst, 3, 3, 0, 0, 3, 3, false, [0; 4]);
        assert!(ok);
        for y in 0..3usize {
            let src_at = ((y + 2) * 6 + 2) * 4;
            let dst_at = y * 3 * 4;
            assert_eq!(&dst[dst_at..dst_at + 12], &src[src_at..src_at + 12]);
        }
    }
}
