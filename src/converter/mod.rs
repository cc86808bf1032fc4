// Converter module - the colorizer engine
//
// Turns raw grayscale frames into colorized output. One engine instance
// exists per render graph; it owns the only mutable colorization state (the
// active palette, the reset timer and the animation player) and is driven
// exclusively from the graph's processing timeline, so no locking is needed.
//
// Recognition works on the split bitplanes: a matched mapping either swaps
// the palette (optionally reverting after a duration), starts an animation,
// or is deliberately ignored. Frames that match nothing are colorized with
// whatever palette is currently active.

mod matcher;

pub use matcher::{recognize, Match};

use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::animation::AnimationPlayer;
use crate::coloring::{ColorMapping, ColorTable, MappingMode, Palette};
use crate::frame::{ColoredFrame, RawFrame};

#[derive(Debug, Clone, Copy)]
struct ResetDeadline {
    at: Instant,
    generation: u64,
}

/// The colorization engine, parameterized by source bit depth
///
/// The 2-bit and 4-bit variants differ only in how many planes they split
/// and how many colors the working palette carries; everything else is this
/// one type.
pub struct Colorizer {
    bit_length: u8,
    width: usize,
    height: usize,
    table: ColorTable,
    palette: Palette,
    default_palette: Palette,
    palette_reset: Option<ResetDeadline>,
    reset_generation: u64,
    player: AnimationPlayer,
    last_checksum: Option<u32>,
}

impl Colorizer {
    /// Create an engine for the given bit depth and dimensions
    ///
    /// # Panics
    /// Panics if `bit_length` is not 2 or 4
    pub fn new(bit_length: u8, width: usize, height: usize, table: ColorTable) -> Self {
        assert!(
            bit_length == 2 || bit_length == 4,
            "Only 2-bit and 4-bit sources are supported"
        );
        let default_palette = table.default_palette().clone();
        debug!(
            "[colorize] Initialized {}-bit engine with {} mappings.",
            bit_length,
            table.mapping_count()
        );
        Colorizer {
            bit_length,
            width,
            height,
            table,
            palette: default_palette.clone(),
            default_palette,
            palette_reset: None,
            reset_generation: 0,
            player: AnimationPlayer::new(),
            last_checksum: None,
        }
    }

    /// An engine that recognizes nothing and colorizes with the built-in
    /// amber ramp
    ///
    /// This is the degraded mode used when the color table failed to load:
    /// output keeps flowing, just without colorization.
    pub fn passthrough(bit_length: u8, width: usize, height: usize) -> Self {
        Self::new(bit_length, width, height, ColorTable::empty(bit_length))
    }

    pub fn bit_length(&self) -> u8 {
        self.bit_length
    }

    /// The currently active palette
    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    /// True while a Replace-mode animation owns the output
    pub fn is_replacing(&self) -> bool {
        self.player.is_replacing()
    }

    /// Process one live frame
    ///
    /// Returns the colorized frame, or `None` while a Replace-mode animation
    /// owns the output (its frames are emitted from [`tick`](Self::tick)
    /// instead).
    pub fn convert(&mut self, frame: &RawFrame, now: Instant) -> Option<ColoredFrame> {
        if frame.bit_length != self.bit_length {
            warn!(
                "[colorize] Got a {}-bit frame on a {}-bit engine.",
                frame.bit_length, self.bit_length
            );
        }
        let planes = frame.split_planes();

        // Clone the mapping out so the table borrow ends before we mutate
        let found = recognize(&planes, &self.table)
            .map(|m| (m.mapping.clone(), m.checksum, m.masked));
        if let Some((mapping, sum, masked)) = found {
            self.apply_mapping(&mapping, sum, masked, now);
        }

        if self.player.is_replacing() {
            // Animation output supersedes the live frame
            return None;
        }

        if self.player.is_enhancing() {
            if let Some(enhanced) = self.player.next_frame(self.table.animations(), &planes) {
                let colored = self.colored(frame.width, frame.height, enhanced.planes);
                if enhanced.finished {
                    debug!("[colorize] Enhanced animation finished, restoring default palette.");
                    self.palette = self.default_palette.clone();
                    self.last_checksum = None;
                }
                return Some(colored);
            }
        }

        Some(self.colored(frame.width, frame.height, planes))
    }

    /// Fire due timers: animation frame pacing and the palette reset
    ///
    /// Returns the animation frames that came due, colorized with the
    /// palette active at emission time.
    pub fn tick(&mut self, now: Instant) -> Vec<ColoredFrame> {
        let replay = self.player.tick(self.table.animations(), now);
        let emitted = replay
            .frames
            .into_iter()
            .map(|f| self.colored(self.width, self.height, f.planes))
            .collect();
        if replay.completed {
            info!("[colorize] Animation finished, restoring default palette.");
            self.palette = self.default_palette.clone();
            self.last_checksum = None;
        }

        if let Some(reset) = self.palette_reset {
            if reset.generation == self.reset_generation && reset.at <= now {
                info!("[colorize] Resetting to default palette.");
                self.palette = self.default_palette.clone();
                self.palette_reset = None;
            }
        }

        emitted
    }

    /// Deadline of the next pending timer, if any
    ///
    /// Covers both the palette reset and animation pacing; lets a host sleep
    /// until something is actually due instead of polling.
    pub fn next_deadline(&self) -> Option<Instant> {
        let reset = self
            .palette_reset
            .filter(|r| r.generation == self.reset_generation)
            .map(|r| r.at);
        match (reset, self.player.next_deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Install a palette as the currently active one
    pub fn set_palette(&mut self, palette: Palette) {
        debug!("[colorize] Setting new palette of {} colors.", palette.len());
        self.palette = palette;
    }

    /// Install a palette as both the active and the default palette
    ///
    /// The default is what reset timers and finishing animations restore.
    pub fn set_default_palette(&mut self, palette: Palette) {
        self.default_palette = palette.clone();
        self.palette = palette;
    }

    /// Side channel: activate a numbered palette without checksum recognition
    ///
    /// An invalid index logs and changes nothing.
    pub fn load_palette(&mut self, index: u32) {
        match self.table.get_palette(index) {
            Some(palette) => {
                info!(
                    "[colorize] Setting palette of {} colors via side channel...",
                    palette.len()
                );
                let palette = palette.clone();
                self.set_palette(palette);
            }
            None => {
                warn!(
                    "[colorize] No palette with index {} found to load through side channel.",
                    index
                );
            }
        }
    }

    /// Cancel all pending timers and stop any running animation
    ///
    /// Called when the owning graph stops; afterwards no deadline scheduled
    /// before this call can fire.
    pub fn stop(&mut self) {
        self.player.stop();
        self.palette_reset = None;
        self.reset_generation += 1;
        self.last_checksum = None;
    }

    fn apply_mapping(&mut self, mapping: &ColorMapping, sum: u32, masked: bool, now: Instant) {
        let origin = if masked { "masked" } else { "unmasked" };
        match mapping.mode {
            MappingMode::Recolor => {
                let Some(palette) = self.table.get_palette(mapping.index) else {
                    warn!(
                        "[colorize] No palette found at index {} for {} frame.",
                        mapping.index, origin
                    );
                    return;
                };
                info!(
                    "[colorize] Setting palette {} of {} colors via {} frame.",
                    mapping.index,
                    palette.len(),
                    origin
                );
                let palette = palette.clone();
                self.cancel_palette_reset();
                self.set_palette(palette);
                if mapping.duration > 0 {
                    self.palette_reset = Some(ResetDeadline {
                        at: now + Duration::from_millis(u64::from(mapping.duration)),
                        generation: self.reset_generation,
                    });
                }
                self.last_checksum = Some(sum);
            }
            MappingMode::Replace => {
                let Some(animation) = self.table.animations().find(mapping.index) else {
                    warn!(
                        "[colorize] No animation found at index {} for {} frame.",
                        mapping.index, origin
                    );
                    return;
                };
                if animation.num_frames() == 0 {
                    warn!(
                        "[colorize] Animation at index {} has no frames.",
                        mapping.index
                    );
                    return;
                }
                if !self.player.is_idle() && self.last_checksum == Some(sum) {
                    // Same trigger repeating; let the animation run out
                    return;
                }
                info!(
                    "[colorize] Playing animation of {} frames via {} frame.",
                    animation.num_frames(),
                    origin
                );
                self.cancel_palette_reset();
                self.player.start_replace(mapping.index, now);
                self.last_checksum = Some(sum);
            }
            MappingMode::Enhance => {
                let Some(animation) = self.table.animations().find(mapping.index) else {
                    warn!(
                        "[colorize] No animation found at index {} for {} frame.",
                        mapping.index, origin
                    );
                    return;
                };
                if animation.num_frames() == 0 {
                    warn!(
                        "[colorize] Animation at index {} has no frames.",
                        mapping.index
                    );
                    return;
                }
                if !self.player.is_idle() && self.last_checksum == Some(sum) {
                    return;
                }
                info!(
                    "[colorize] Enhancing animation of {} frames via {} frame.",
                    animation.num_frames(),
                    origin
                );
                self.cancel_palette_reset();
                self.player.start_enhance(mapping.index);
                self.last_checksum = Some(sum);
            }
            MappingMode::Ignore => {
                // Recognized but deliberately without effect
            }
        }
    }

    fn cancel_palette_reset(&mut self) {
        self.palette_reset = None;
        self.reset_generation += 1;
    }

    fn colored(&self, width: usize, height: usize, planes: Vec<Vec<u8>>) -> ColoredFrame {
        let colors = 1usize << planes.len();
        ColoredFrame {
            width,
            height,
            palette: self.palette.resample(colors),
            planes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::{Animation, AnimationFrame, AnimationSet, SwitchMode};
    use crate::coloring::{ColorMapping, Rgb};
    use crate::frame::checksum;

    const W: usize = 16;
    const H: usize = 8;

    fn frame_with_levels(level: u8) -> RawFrame {
        RawFrame::new(2, W, H, vec![level; W * H])
    }

    fn red_palette() -> Palette {
        Palette::ramp(Rgb::BLACK, Rgb::new(255, 0, 0), 4)
    }

    fn table_with_mapping(mode: MappingMode, checksum: u32, index: u32, duration: u32) -> ColorTable {
        ColorTable::new(
            Palette::default_ramp(2),
            vec![Palette::default_ramp(2), Palette::default_ramp(2), red_palette()],
            vec![],
            vec![ColorMapping {
                checksum,
                mode,
                index,
                duration,
            }],
            AnimationSet::empty(),
        )
    }

    fn plane0_checksum(frame: &RawFrame) -> u32 {
        checksum(&frame.split_planes()[0])
    }

    #[test]
    fn test_passthrough_uses_default_ramp() {
        let mut engine = Colorizer::passthrough(2, W, H);
        let frame = frame_with_levels(3);
        let colored = engine
            .convert(&frame, Instant::now())
            .expect("no output frame");
        assert_eq!(colored.palette.color(3), Rgb::ORANGE);
        assert_eq!(colored.to_gray(), frame.data);
    }

    #[test]
    fn test_recolor_switches_palette_immediately() {
        let frame = frame_with_levels(1);
        let table = table_with_mapping(MappingMode::Recolor, plane0_checksum(&frame), 2, 0);
        let mut engine = Colorizer::new(2, W, H, table);

        let colored = engine
            .convert(&frame, Instant::now())
            .expect("no output frame");
        assert_eq!(colored.palette.color(3), Rgb::new(255, 0, 0));
    }

    #[test]
    fn test_recolor_duration_reverts_after_timeout() {
        let frame = frame_with_levels(1);
        let table = table_with_mapping(MappingMode::Recolor, plane0_checksum(&frame), 2, 500);
        let mut engine = Colorizer::new(2, W, H, table);
        let t0 = Instant::now();

        engine.convert(&frame, t0);
        assert_eq!(engine.palette().color(3), Rgb::new(255, 0, 0));

        engine.tick(t0 + Duration::from_millis(499));
        assert_eq!(engine.palette().color(3), Rgb::new(255, 0, 0));

        engine.tick(t0 + Duration::from_millis(500));
        assert_eq!(engine.palette().color(3), Rgb::ORANGE);
    }

    #[test]
    fn test_recolor_zero_duration_never_reverts() {
        let frame = frame_with_levels(1);
        let table = table_with_mapping(MappingMode::Recolor, plane0_checksum(&frame), 2, 0);
        let mut engine = Colorizer::new(2, W, H, table);
        let t0 = Instant::now();

        engine.convert(&frame, t0);
        assert!(engine.next_deadline().is_none());
        engine.tick(t0 + Duration::from_secs(3600));
        assert_eq!(engine.palette().color(3), Rgb::new(255, 0, 0));
    }

    #[test]
    fn test_new_trigger_cancels_pending_reset() {
        let frame_a = frame_with_levels(1);
        let frame_b = frame_with_levels(2);
        let table = ColorTable::new(
            Palette::default_ramp(2),
            vec![red_palette(), Palette::ramp(Rgb::BLACK, Rgb::new(0, 255, 0), 4)],
            vec![],
            vec![
                ColorMapping {
                    checksum: plane0_checksum(&frame_a),
                    mode: MappingMode::Recolor,
                    index: 0,
                    duration: 500,
                },
                ColorMapping {
                    checksum: plane0_checksum(&frame_b),
                    mode: MappingMode::Recolor,
                    index: 1,
                    duration: 0,
                },
            ],
            AnimationSet::empty(),
        );
        let mut engine = Colorizer::new(2, W, H, table);
        let t0 = Instant::now();

        engine.convert(&frame_a, t0);
        engine.convert(&frame_b, t0 + Duration::from_millis(100));

        // The first mapping's reset must not fire
        engine.tick(t0 + Duration::from_millis(600));
        assert_eq!(engine.palette().color(3), Rgb::new(0, 255, 0));
    }

    #[test]
    fn test_missing_palette_leaves_state_unchanged() {
        let frame = frame_with_levels(1);
        let table = table_with_mapping(MappingMode::Recolor, plane0_checksum(&frame), 99, 0);
        let mut engine = Colorizer::new(2, W, H, table);

        let colored = engine
            .convert(&frame, Instant::now())
            .expect("no output frame");
        // Falls through to the default palette
        assert_eq!(colored.palette.color(3), Rgb::ORANGE);
    }

    #[test]
    fn test_missing_animation_falls_back_to_colorization() {
        let frame = frame_with_levels(1);
        let table = table_with_mapping(MappingMode::Replace, plane0_checksum(&frame), 5, 0);
        let mut engine = Colorizer::new(2, W, H, table);

        let colored = engine.convert(&frame, Instant::now());
        assert!(colored.is_some());
        assert!(!engine.is_replacing());
    }

    #[test]
    fn test_ignore_mapping_has_no_effect() {
        let frame = frame_with_levels(1);
        let table = table_with_mapping(MappingMode::Ignore, plane0_checksum(&frame), 2, 0);
        let mut engine = Colorizer::new(2, W, H, table);

        let colored = engine
            .convert(&frame, Instant::now())
            .expect("no output frame");
        assert_eq!(colored.palette.color(3), Rgb::ORANGE);
    }

    #[test]
    fn test_set_palette_idempotent() {
        let mut engine = Colorizer::passthrough(2, W, H);
        let frame = frame_with_levels(2);
        let t0 = Instant::now();

        engine.set_palette(red_palette());
        let first = engine.convert(&frame, t0).expect("no output frame");
        engine.set_palette(red_palette());
        let second = engine.convert(&frame, t0).expect("no output frame");
        assert_eq!(first, second);
    }

    #[test]
    fn test_set_default_palette_changes_reset_target() {
        let frame = frame_with_levels(1);
        let table = table_with_mapping(MappingMode::Recolor, plane0_checksum(&frame), 2, 100);
        let mut engine = Colorizer::new(2, W, H, table);
        let t0 = Instant::now();

        let green = Palette::ramp(Rgb::BLACK, Rgb::new(0, 255, 0), 4);
        engine.set_default_palette(green.clone());

        engine.convert(&frame, t0);
        assert_eq!(engine.palette().color(3), Rgb::new(255, 0, 0));
        engine.tick(t0 + Duration::from_millis(100));
        assert_eq!(engine.palette().color(3), Rgb::new(0, 255, 0));
    }

    #[test]
    fn test_load_palette_side_channel() {
        let frame = frame_with_levels(0);
        let table = table_with_mapping(MappingMode::Recolor, 0xFFFF_FFFF, 0, 0);
        let mut engine = Colorizer::new(2, W, H, table);

        engine.load_palette(2);
        assert_eq!(engine.palette().color(3), Rgb::new(255, 0, 0));

        // Invalid index is a no-op
        engine.load_palette(42);
        assert_eq!(engine.palette().color(3), Rgb::new(255, 0, 0));

        let colored = engine
            .convert(&frame, Instant::now())
            .expect("no output frame");
        assert_eq!(colored.palette.color(3), Rgb::new(255, 0, 0));
    }

    fn replace_table(trigger: u32) -> ColorTable {
        let frames = (0..3)
            .map(|i| AnimationFrame {
                bit_length: 2,
                delay_ms: 40,
                planes: vec![vec![i as u8; W * H / 8], vec![0; W * H / 8]],
            })
            .collect();
        ColorTable::new(
            Palette::default_ramp(2),
            vec![],
            vec![],
            vec![ColorMapping {
                checksum: trigger,
                mode: MappingMode::Replace,
                index: 0,
                duration: 0,
            }],
            AnimationSet::new(vec![Animation::new(SwitchMode::Replace, frames)]),
        )
    }

    #[test]
    fn test_replace_animation_supersedes_live_frames() {
        let frame = frame_with_levels(1);
        let table = replace_table(plane0_checksum(&frame));
        let mut engine = Colorizer::new(2, W, H, table);
        let t0 = Instant::now();

        // Trigger frame is dropped, animation owns the output
        assert!(engine.convert(&frame, t0).is_none());
        let emitted = engine.tick(t0);
        assert_eq!(emitted.len(), 1);

        // Live frames while replacing are dropped too
        assert!(engine.convert(&frame, t0 + Duration::from_millis(10)).is_none());

        let emitted = engine.tick(t0 + Duration::from_millis(40));
        assert_eq!(emitted.len(), 1);
        let emitted = engine.tick(t0 + Duration::from_millis(80));
        assert_eq!(emitted.len(), 1);

        // After the last frame's delay the engine goes back to passthrough.
        // Level 0 keeps both planes clear of the trigger checksum.
        let emitted = engine.tick(t0 + Duration::from_millis(120));
        assert!(emitted.is_empty());
        assert!(!engine.is_replacing());
        let other = frame_with_levels(0);
        assert!(engine
            .convert(&other, t0 + Duration::from_millis(121))
            .is_some());
    }

    #[test]
    fn test_repeated_trigger_does_not_restart() {
        let frame = frame_with_levels(1);
        let table = replace_table(plane0_checksum(&frame));
        let mut engine = Colorizer::new(2, W, H, table);
        let t0 = Instant::now();

        engine.convert(&frame, t0);
        engine.tick(t0); // frame 0 out

        // Same checksum again must not reset the animation to frame 0
        engine.convert(&frame, t0 + Duration::from_millis(20));
        let emitted = engine.tick(t0 + Duration::from_millis(40));
        assert_eq!(emitted.len(), 1);
        assert_eq!(emitted[0].planes[0][0], 1); // second frame, not a restart
    }

    #[test]
    fn test_trigger_restarts_after_idle() {
        let frame = frame_with_levels(1);
        let table = replace_table(plane0_checksum(&frame));
        let mut engine = Colorizer::new(2, W, H, table);
        let t0 = Instant::now();

        engine.convert(&frame, t0);
        engine.tick(t0 + Duration::from_millis(200)); // play everything out
        engine.tick(t0 + Duration::from_millis(201));
        assert!(!engine.is_replacing());

        // Same checksum can start the animation again once idle
        let t1 = t0 + Duration::from_millis(300);
        assert!(engine.convert(&frame, t1).is_none());
        assert_eq!(engine.tick(t1).len(), 1);
    }

    #[test]
    fn test_stop_cancels_timers() {
        let frame = frame_with_levels(1);
        let table = replace_table(plane0_checksum(&frame));
        let mut engine = Colorizer::new(2, W, H, table);
        let t0 = Instant::now();

        engine.convert(&frame, t0);
        engine.stop();
        assert!(engine.tick(t0 + Duration::from_secs(10)).is_empty());
        assert!(!engine.is_replacing());
    }
}
