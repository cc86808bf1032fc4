// Common test utilities for pipeline integration tests
//
// Provides frame constructors, table builders and a recording destination
// shared by the engine and graph test suites.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use dmd_rs::frame::checksum;
use dmd_rs::{
    Animation, AnimationFrame, AnimationSet, ColorMapping, ColorTable, FrameDestination,
    MappingMode, OutputFrame, Palette, RawFrame, Rgb, SwitchMode,
};

/// Install a subscriber so `RUST_LOG=debug cargo test` shows pipeline logs
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Panel dimensions used throughout the integration tests
pub const WIDTH: usize = 128;
pub const HEIGHT: usize = 32;

/// Plane length in bytes for the test dimensions
pub const PLANE_LEN: usize = WIDTH * HEIGHT / 8;

/// A 2-bit frame filled with one gray level
pub fn flat_frame(level: u8) -> RawFrame {
    RawFrame::new(2, WIDTH, HEIGHT, vec![level; WIDTH * HEIGHT])
}

/// A 2-bit frame with a seed-dependent pattern, so different seeds produce
/// different plane checksums
pub fn patterned_frame(seed: u8) -> RawFrame {
    let data = (0..WIDTH * HEIGHT)
        .map(|i| {
            let x = (i as u32)
                .wrapping_mul(2_654_435_761)
                .wrapping_add(u32::from(seed).wrapping_mul(0x9E37_79B9));
            ((x >> 8) % 4) as u8
        })
        .collect();
    RawFrame::new(2, WIDTH, HEIGHT, data)
}

/// Checksum of the frame's low-order plane
pub fn plane0_checksum(frame: &RawFrame) -> u32 {
    checksum(&frame.split_planes()[0])
}

/// A black-to-red test palette
pub fn red_palette() -> Palette {
    Palette::ramp(Rgb::BLACK, Rgb::new(255, 0, 0), 4)
}

/// A Replace-mode animation whose frames are distinguishable by their first
/// plane byte
pub fn replace_animation(num_frames: usize, delay_ms: u32) -> Animation {
    let frames = (0..num_frames)
        .map(|i| AnimationFrame {
            bit_length: 2,
            delay_ms,
            planes: vec![vec![i as u8; PLANE_LEN], vec![0; PLANE_LEN]],
        })
        .collect();
    Animation::new(SwitchMode::Replace, frames)
}

/// An Enhance-mode animation supplying two high-order planes per frame
pub fn enhance_animation(num_frames: usize) -> Animation {
    let frames = (0..num_frames)
        .map(|i| AnimationFrame {
            bit_length: 2,
            delay_ms: 40,
            planes: vec![vec![0xC0 | i as u8; PLANE_LEN], vec![0x30 | i as u8; PLANE_LEN]],
        })
        .collect();
    Animation::new(SwitchMode::Enhance, frames)
}

/// A table with one mapping and one palette at index 2
pub fn table_with_mapping(mode: MappingMode, trigger: u32, index: u32, duration: u32) -> ColorTable {
    ColorTable::new(
        Palette::default_ramp(2),
        vec![
            Palette::default_ramp(2),
            Palette::default_ramp(2),
            red_palette(),
        ],
        vec![],
        vec![ColorMapping {
            checksum: trigger,
            mode,
            index,
            duration,
        }],
        AnimationSet::empty(),
    )
}

/// A table whose single mapping starts the given animation at index 0
pub fn table_with_animation(mode: MappingMode, trigger: u32, animation: Animation) -> ColorTable {
    ColorTable::new(
        Palette::default_ramp(2),
        vec![],
        vec![],
        vec![ColorMapping {
            checksum: trigger,
            mode,
            index: 0,
            duration: 0,
        }],
        AnimationSet::new(vec![animation]),
    )
}

/// RGB bytes of the first pixel in `frame` that holds `level`
///
/// `rgb` is the RGB24 rendering of `frame`; returns `None` when no pixel
/// has that level.
pub fn rgb_of_level(frame: &RawFrame, rgb: &[u8], level: u8) -> Option<[u8; 3]> {
    let i = frame.data.iter().position(|&v| v == level)?;
    Some([rgb[i * 3], rgb[i * 3 + 1], rgb[i * 3 + 2]])
}

/// What a recording destination has seen so far
#[derive(Clone, Default)]
pub struct Capture {
    pub frames: Arc<Mutex<Vec<OutputFrame>>>,
    pub palettes: Arc<Mutex<Vec<Vec<Rgb>>>>,
    pub disposed: Arc<Mutex<bool>>,
}

impl Capture {
    pub fn frame_count(&self) -> usize {
        self.frames.lock().unwrap().len()
    }

    pub fn frame(&self, index: usize) -> OutputFrame {
        self.frames.lock().unwrap()[index].clone()
    }

    pub fn last_frame(&self) -> Option<OutputFrame> {
        self.frames.lock().unwrap().last().cloned()
    }

    pub fn is_disposed(&self) -> bool {
        *self.disposed.lock().unwrap()
    }
}

/// A destination that records everything it is asked to render
pub struct CapturingDestination {
    name: String,
    rgb: bool,
    gray4: bool,
    capture: Capture,
}

impl CapturingDestination {
    pub fn new(name: &str, rgb: bool, gray4: bool) -> (Self, Capture) {
        let capture = Capture::default();
        (
            CapturingDestination {
                name: name.into(),
                rgb,
                gray4,
                capture: capture.clone(),
            },
            capture,
        )
    }
}

impl FrameDestination for CapturingDestination {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_rgb(&self) -> bool {
        self.rgb
    }

    fn supports_gray4(&self) -> bool {
        self.gray4
    }

    fn render(&mut self, frame: &OutputFrame) {
        self.capture.frames.lock().unwrap().push(frame.clone());
    }

    fn set_palette(&mut self, colors: &[Rgb]) {
        self.capture.palettes.lock().unwrap().push(colors.to_vec());
    }

    fn dispose(&mut self) {
        *self.capture.disposed.lock().unwrap() = true;
    }
}
