use std::borrow::Cow;

use raster_oxide::{DelegateImage, Image, MemoryStream};

const RED: [u8; 4] = [0xff, 0x00, 0x00, 0xff];
const GREEN: [u8; 4] = [0x00, 0xff, 0x00, 0xff];
const BLUE: [u8; 4] = [0x00, 0x00, 0xff, 0xff];

fn encode_gif(frames: &[(u8, u16)]) -> Vec<u8> {
    let mut out = Vec::new();
    {
        let color_map = &[
            0xff, 0x00, 0x00, 0x00, 0xff, 0x00, 0x00, 0x00, 0xff, 0x00, 0x00, 0x00,
        ];
        let mut encoder = gif::Encoder::new(&mut out, 4, 4, color_map).unwrap();
        encoder.set_repeat(gif::Repeat::Infinite).unwrap();
        for &(index, delay) in frames {
            let mut frame = gif::Frame::default();
            frame.width = 4;
            frame.height = 4;
            frame.buffer = Cow::Owned(vec![index; 16]);
            frame.delay = delay;
            encoder.write_frame(&frame).unwrap();
        }
    }
    out
}

struct ApngFrame<'a> {
    width: u32,
    height: u32,
    x: u32,
    y: u32,
    delay: (u16, u16),
    dispose: png::DisposeOp,
    blend: png::BlendOp,
    pixels: &'a [u8],
}

fn encode_apng(width: u32, height: u32, frames: &[ApngFrame<'_>]) -> Vec<u8> {
    let mut out = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut out, width, height);
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        encoder.set_animated(frames.len() as u32, 0).unwrap();
        let mut writer = encoder.write_header().unwrap();
        for frame in frames {
            writer.set_frame_dimension(frame.width, frame.height).unwrap();
            writer.set_frame_position(frame.x, frame.y).unwrap();
            writer.set_frame_delay(frame.delay.0, frame.delay.1).unwrap();
            writer.set_dispose_op(frame.dispose).unwrap();
            writer.set_blend_op(frame.blend).unwrap();
            writer.write_image_data(frame.pixels).unwrap();
        }
        writer.finish().unwrap();
    }
    out
}

fn decode_animated(data: Vec<u8>, partially: bool) -> Box<dyn raster_oxide::AnimatedImage> {
    match raster_oxide::decode(Box::new(MemoryStream::new(data)), partially).unwrap() {
        Image::Animated(image) => image,
        Image::Static(_) => panic!("expected an animation"),
    }
}

fn assert_solid(buffer: &[u8], color: [u8; 4]) {
    for px in buffer.chunks_exact(4) {
        assert_eq!(px, color);
    }
}

#[test]
fn gif_full_decode_reports_frames_and_delays() {
    let image = decode_animated(encode_gif(&[(0, 10), (1, 20), (2, 30)]), false);
    assert!(image.is_completed());
    assert_eq!(image.frame_count(), 3);
    assert_eq!(
        [image.delay_ms(0), image.delay_ms(1), image.delay_ms(2)],
        [100, 200, 300]
    );
    // Out of range is answered with a safe default.
    assert_eq!(image.delay_ms(3), 0);
    assert!(image.stream().is_none());
}

#[test]
fn gif_advance_cycles_through_frames() {
    let mut image = decode_animated(encode_gif(&[(0, 10), (1, 10), (2, 10)]), false);
    let mut delegate = DelegateImage::new(4, 4);
    assert_eq!(delegate.index(), -1);

    for (expected_index, color) in [(0, RED), (1, GREEN), (2, BLUE), (0, RED)] {
        image.advance(&mut delegate);
        assert_eq!(delegate.index(), expected_index);
        assert_solid(delegate.shown(), color);
    }

    // Reset forces frame 0 again regardless of position.
    delegate.reset();
    image.advance(&mut delegate);
    assert_eq!(delegate.index(), 0);
    assert_solid(delegate.shown(), RED);
}

#[test]
fn gif_partial_then_complete_matches_full_decode() {
    let data = encode_gif(&[(0, 10), (1, 20), (2, 30)]);

    let full = decode_animated(data.clone(), false);
    let mut partial = decode_animated(data, true);

    assert!(!partial.is_completed());
    assert_eq!(partial.frame_count(), 1);
    let stream = partial.stream().expect("uncompleted image owns its stream");
    assert!(!stream.is_closed());

    partial.complete();
    assert!(partial.is_completed());
    assert!(stream.is_closed());
    assert!(partial.stream().is_none());

    assert_eq!(partial.frame_count(), full.frame_count());
    for index in 0..full.frame_count() {
        assert_eq!(partial.delay_ms(index), full.delay_ms(index));
    }
}

#[test]
fn gif_advance_resumes_after_late_completion() {
    let mut image = decode_animated(encode_gif(&[(0, 10), (1, 10)]), true);
    let mut delegate = DelegateImage::new(4, 4);

    image.advance(&mut delegate);
    assert_solid(delegate.shown(), RED);
    // Only one frame known yet; advancing wraps onto itself and is a no-op.
    image.advance(&mut delegate);
    assert_eq!(delegate.index(), 0);

    image.complete();
    assert_eq!(image.frame_count(), 2);
    image.advance(&mut delegate);
    assert_eq!(delegate.index(), 1);
    assert_solid(delegate.shown(), GREEN);
}

#[test]
fn gif_single_frame_completes_to_one_frame() {
    let mut image = decode_animated(encode_gif(&[(0, 10)]), true);
    // The frame count of a partially decoded GIF is unknowable up front.
    assert!(!image.is_completed());
    image.complete();
    assert!(image.is_completed());
    assert_eq!(image.frame_count(), 1);

    // Completing again is a no-op.
    image.complete();
    assert_eq!(image.frame_count(), 1);
}

#[test]
fn gif_recycle_is_idempotent_and_disarms_the_image() {
    let mut image = decode_animated(encode_gif(&[(0, 10), (1, 10)]), true);
    let stream = image.stream().unwrap();

    image.recycle();
    assert!(stream.is_closed());
    assert_eq!(image.frame_count(), 0);
    assert_eq!(image.delay_ms(0), 0);

    let mut delegate = DelegateImage::new(4, 4);
    image.advance(&mut delegate);
    assert_eq!(delegate.index(), -1);

    image.recycle();
}

#[test]
fn apng_restore_previous_roundtrips_the_canvas() {
    let full_red: Vec<u8> = RED.repeat(16);
    let data = encode_apng(
        4,
        4,
        &[
            ApngFrame {
                width: 4,
                height: 4,
                x: 0,
                y: 0,
                delay: (1, 10),
                dispose: png::DisposeOp::None,
                blend: png::BlendOp::Source,
                pixels: &full_red,
            },
            ApngFrame {
                width: 1,
                height: 1,
                x: 0,
                y: 0,
                delay: (1, 10),
                dispose: png::DisposeOp::Previous,
                blend: png::BlendOp::Source,
                pixels: &BLUE,
            },
            ApngFrame {
                width: 1,
                height: 1,
                x: 3,
                y: 3,
                delay: (1, 10),
                dispose: png::DisposeOp::None,
                blend: png::BlendOp::Source,
                pixels: &GREEN,
            },
        ],
    );

    let mut image = decode_animated(data, false);
    assert_eq!(image.frame_count(), 3);

    let mut delegate = DelegateImage::new(4, 4);
    image.advance(&mut delegate); // frame 0: solid red
    image.advance(&mut delegate); // frame 1: blue dot, disposes to previous
    let first_visit = delegate.shown().to_vec();

    image.advance(&mut delegate); // frame 2: restores red, green dot
    image.advance(&mut delegate); // frame 0 again
    image.advance(&mut delegate); // frame 1 again

    assert_eq!(delegate.index(), 1);
    assert_eq!(delegate.shown(), &first_visit[..]);
}

#[test]
fn apng_partial_then_complete_matches_full_decode() {
    let full_red: Vec<u8> = RED.repeat(16);
    let green_bar: Vec<u8> = GREEN.repeat(4);
    let frames = [
        ApngFrame {
            width: 4,
            height: 4,
            x: 0,
            y: 0,
            delay: (1, 10),
            dispose: png::DisposeOp::Background,
            blend: png::BlendOp::Source,
            pixels: &full_red,
        },
        ApngFrame {
            width: 4,
            height: 1,
            x: 0,
            y: 1,
            delay: (1, 4),
            dispose: png::DisposeOp::None,
            blend: png::BlendOp::Over,
            pixels: &green_bar,
        },
        ApngFrame {
            width: 4,
            height: 1,
            x: 0,
            y: 2,
            delay: (3, 100),
            dispose: png::DisposeOp::None,
            blend: png::BlendOp::Over,
            pixels: &green_bar,
        },
    ];
    let data = encode_apng(4, 4, &frames);

    let full = decode_animated(data.clone(), false);
    assert!(full.is_completed());
    assert_eq!(full.frame_count(), 3);
    assert_eq!(
        [full.delay_ms(0), full.delay_ms(1), full.delay_ms(2)],
        [100, 250, 30]
    );

    let mut partial = decode_animated(data, true);
    assert!(!partial.is_completed());
    assert_eq!(partial.frame_count(), 1);

    partial.complete();
    assert!(partial.is_completed());
    assert_eq!(partial.frame_count(), full.frame_count());
    for index in 0..full.frame_count() {
        assert_eq!(partial.delay_ms(index), full.delay_ms(index));
    }

    partial.complete();
    assert_eq!(partial.frame_count(), 3);
}

#[test]
fn apng_background_disposal_clears_the_canvas() {
    let full_red: Vec<u8> = RED.repeat(16);
    let data = encode_apng(
        4,
        4,
        &[
            ApngFrame {
                width: 4,
                height: 4,
                x: 0,
                y: 0,
                delay: (1, 10),
                dispose: png::DisposeOp::Background,
                blend: png::BlendOp::Source,
                pixels: &full_red,
            },
            ApngFrame {
                width: 1,
                height: 1,
                x: 2,
                y: 2,
                delay: (1, 10),
                dispose: png::DisposeOp::None,
                blend: png::BlendOp::Over,
                pixels: &BLUE,
            },
        ],
    );

    let mut image = decode_animated(data, false);
    let mut delegate = DelegateImage::new(4, 4);
    image.advance(&mut delegate);
    assert_solid(delegate.shown(), RED);

    // Frame 0 disposed to background: everything but the new dot is
    // transparent.
    image.advance(&mut delegate);
    let shown = delegate.shown();
    let dot = (2 * 4 + 2) * 4;
    assert_eq!(&shown[dot..dot + 4], &BLUE);
    assert_eq!(&shown[..4], &[0; 4]);
}

#[test]
fn apng_byte_count_tracks_decoded_frames() {
    let full_red: Vec<u8> = RED.repeat(16);
    let data = encode_apng(
        4,
        4,
        &[
            ApngFrame {
                width: 4,
                height: 4,
                x: 0,
                y: 0,
                delay: (1, 10),
                dispose: png::DisposeOp::None,
                blend: png::BlendOp::Source,
                pixels: &full_red,
            },
            ApngFrame {
                width: 1,
                height: 1,
                x: 0,
                y: 0,
                delay: (1, 10),
                dispose: png::DisposeOp::None,
                blend: png::BlendOp::Source,
                pixels: &BLUE,
            },
        ],
    );

    let mut image = decode_animated(data, true);
    assert_eq!(image.byte_count(), 64);
    image.complete();
    assert_eq!(image.byte_count(), 64 + 4);
}
