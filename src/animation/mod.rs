// Animation module - pre-rendered frame sequences and their playback
//
// Animations come from the companion animation file and live for the whole
// session; starting and stopping only touches the player's cursor and
// timers, never the frame data.

mod player;

pub use player::{AnimationPlayer, Enhanced, PlayerState, ReplayTick};

/// How an animation's frames are applied to the output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchMode {
    /// The animation fully owns the output while it runs
    Replace,

    /// The animation contributes only high-order planes; live frames supply
    /// the rest
    Enhance,
}

impl SwitchMode {
    /// Decode the switch-mode tag from an animation file
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(SwitchMode::Replace),
            1 => Some(SwitchMode::Enhance),
            _ => None,
        }
    }

    /// Encode the switch-mode tag for an animation file
    pub fn tag(self) -> u8 {
        match self {
            SwitchMode::Replace => 0,
            SwitchMode::Enhance => 1,
        }
    }
}

/// One pre-rendered animation frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnimationFrame {
    /// Number of bitplanes
    pub bit_length: u8,

    /// How long this frame is shown, in whole milliseconds
    pub delay_ms: u32,

    /// Packed bitplanes, low-order plane first
    pub planes: Vec<Vec<u8>>,
}

/// An ordered sequence of animation frames with a switch mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Animation {
    switch_mode: SwitchMode,
    frames: Vec<AnimationFrame>,
}

impl Animation {
    pub fn new(switch_mode: SwitchMode, frames: Vec<AnimationFrame>) -> Self {
        Animation {
            switch_mode,
            frames,
        }
    }

    pub fn switch_mode(&self) -> SwitchMode {
        self.switch_mode
    }

    /// Number of frames in the sequence
    pub fn num_frames(&self) -> usize {
        self.frames.len()
    }

    /// Frame at `index`
    ///
    /// # Panics
    /// Panics if `index` is out of range
    pub fn frame(&self, index: usize) -> &AnimationFrame {
        &self.frames[index]
    }

    /// Bit length of the animation's frames (0 for an empty sequence)
    pub fn bit_length(&self) -> u8 {
        self.frames.first().map_or(0, |f| f.bit_length)
    }

    /// Sum of all frame delays in milliseconds
    pub fn duration_ms(&self) -> u32 {
        self.frames.iter().map(|f| f.delay_ms).sum()
    }
}

/// All animations of one color table, addressed by table index
#[derive(Debug, Clone, Default)]
pub struct AnimationSet {
    animations: Vec<Animation>,
}

impl AnimationSet {
    pub fn new(animations: Vec<Animation>) -> Self {
        AnimationSet { animations }
    }

    /// A set without any animations
    pub fn empty() -> Self {
        AnimationSet {
            animations: Vec::new(),
        }
    }

    /// Animation at `index`
    pub fn find(&self, index: u32) -> Option<&Animation> {
        self.animations.get(index as usize)
    }

    pub fn len(&self) -> usize {
        self.animations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.animations.is_empty()
    }
}
