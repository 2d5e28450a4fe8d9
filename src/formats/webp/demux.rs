//! Minimal RIFF container walk for WebP.
//!
//! Only the chunk structure is interpreted here: frame rectangles,
//! durations and the dispose/blend flags that must flow into the shared
//! composition engine. The VP8/VP8L/ALPH payloads themselves are handed to
//! the codec untouched.
use std::ops::Range;

use crate::{Error, Result};

#[derive(Debug)]
pub(crate) struct WebpInfo {
    pub width: u32,
    pub height: u32,
    pub has_alpha: bool,
    pub has_animation: bool,
    pub loop_count: u16,
    /// ANIM background color hint, converted to RGBA byte order.
    pub background: [u8; 4],
    pub frames: Vec<AnmfFrame>,
}

#[derive(Debug, Clone)]
pub(crate) struct AnmfFrame {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub duration_ms: u32,
    pub dispose_background: bool,
    pub blend_over: bool,
    /// Sub-chunks (ALPH? + VP8/VP8L) inside the source buffer.
    pub payload: Range<usize>,
}

#[inline]
fn u24le(bytes: &[u8]) -> u32 {
    bytes[0] as u32 | (bytes[1] as u32) << 8 | (bytes[2] as u32) << 16
}

pub(crate) fn demux(data: &[u8]) -> Result<WebpInfo> {
    if data.len() < 12 || &data[0..4] != b"RIFF" || &data[8..12] != b"WEBP" {
        return Err(Error::InvalidImage("not a webp container"));
    }

    let mut info = WebpInfo {
        width: 0,
        height: 0,
        has_alpha: false,
        has_animation: false,
        loop_count: 0,
        background: [0; 4],
        frames: Vec::new(),
    };

    let mut offset = 12usize;
    while offset + 8 <= data.len() {
        let fourcc: [u8; 4] = data[offset..offset + 4].try_into().unwrap();
        let size = u32::from_le_bytes(data[offset + 4..offset + 8].try_into().unwrap()) as usize;
        let body = offset + 8;
        let body_end = body
            .checked_add(size)
            .filter(|&end| end <= data.len())
            .ok_or(Error::InvalidImage("truncated webp chunk"))?;

        match &fourcc {
            b"VP8X" if size >= 10 => {
                let flags = data[body];
                info.has_alpha = flags & 0x10 != 0;
                info.has_animation = flags & 0x02 != 0;
                info.width = 1 + u24le(&data[body + 4..]);
                info.height = 1 + u24le(&data[body + 7..]);
            }
            b"ANIM" if size >= 6 => {
                // Stored as [B, G, R, A].
                info.background = [
                    data[body + 2],
                    data[body + 1],
                    data[body],
                    data[body + 3],
                ];
                info.loop_count = u16::from_le_bytes([data[body + 4], data[body + 5]]);
            }
            b"ANMF" if size >= 16 => {
                let flags = data[body + 15];
                info.frames.push(AnmfFrame {
                    // Offsets are stored halved.
                    x: 2 * u24le(&data[body..]),
                    y: 2 * u24le(&data[body + 3..]),
                    width: 1 + u24le(&data[body + 6..]),
                    height: 1 + u24le(&data[body + 9..]),
                    duration_ms: u24le(&data[body + 12..]),
                    dispose_background: flags & 0x01 != 0,
                    blend_over: flags & 0x02 == 0,
                    payload: body + 16..body_end,
                });
            }
            _ => {}
        }

        // Chunks are padded to even sizes.
        offset = body_end + (size & 1);
    }

    Ok(info)
}

/// Re-wraps one ANMF payload as a standalone WebP file the codec can decode.
///
/// Lossy frames with a separate alpha plane need the extended layout with a
/// VP8X header; everything else round-trips through the simple layout.
pub(crate) fn standalone_frame(width: u32, height: u32, payload: &[u8]) -> Vec<u8> {
    let has_alph = payload.len() >= 4 && &payload[0..4] == b"ALPH";

    let mut body = Vec::with_capacity(payload.len() + 30);
    body.extend_from_slice(b"WEBP");
    if has_alph {
        let mut vp8x = [0u8; 10];
        vp8x[0] = 0x10; // alpha flag
        vp8x[4..7].copy_from_slice(&(width - 1).to_le_bytes()[..3]);
        vp8x[7..10].copy_from_slice(&(height - 1).to_le_bytes()[..3]);
        body.extend_from_slice(b"VP8X");
        body.extend_from_slice(&10u32.to_le_bytes());
        body.extend_from_slice(&vp8x);
    }
    body.extend_from_slice(payload);
    if body.len() % 2 != 0 {
        body.push(0);
    }

    let mut file = Vec::with_capacity(body.len() + 8);
    file.extend_from_slice(b"RIFF");
    file.extend_from_slice(&(body.len() as u32).to_le_bytes());
    file.extend_from_slice(&body);
    file
}
