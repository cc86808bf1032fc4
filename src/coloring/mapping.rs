// Checksum mappings - rules that associate a recognized frame with an action

/// What a matched mapping does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingMode {
    /// Swap the active palette, optionally reverting after a duration
    Recolor,

    /// Play an animation that fully replaces the live frames
    Replace,

    /// Overlay an animation's high-order planes onto the live frames
    Enhance,

    /// Recognized but deliberately without effect
    Ignore,
}

impl MappingMode {
    /// Decode the mode byte from a color table file
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(MappingMode::Recolor),
            1 => Some(MappingMode::Replace),
            2 => Some(MappingMode::Enhance),
            3 => Some(MappingMode::Ignore),
            _ => None,
        }
    }

    /// Encode the mode byte for a color table file
    pub fn tag(self) -> u8 {
        match self {
            MappingMode::Recolor => 0,
            MappingMode::Replace => 1,
            MappingMode::Enhance => 2,
            MappingMode::Ignore => 3,
        }
    }
}

/// A rule keyed by plane checksum
///
/// `index` addresses a palette (Recolor) or an animation in the animation
/// set (Replace, Enhance). `duration` only matters for Recolor: a non-zero
/// value reverts to the default palette after that many milliseconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorMapping {
    pub checksum: u32,
    pub mode: MappingMode,
    pub index: u32,
    pub duration: u32,
}
