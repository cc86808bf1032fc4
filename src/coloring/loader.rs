// Color table file parsing
//
// Two binary formats, both big-endian:
//
// Color table ("DMCT"):
//   magic (4) | version (1)
//   default palette: 16 RGB triples
//   palette count (u16), then per palette: color count (u16), RGB triples
//   mask count (u16), then per mask: pixels/8 bytes
//   mapping count (u32), then per mapping:
//     checksum (u32) | mode (u8) | index (u32) | duration (u32)
//
// Animation set ("DMAN"):
//   magic (4) | version (1)
//   animation count (u16), then per animation: switch mode (u8),
//   frame count (u16), then per frame:
//     bit length (u8) | delay ms (u32) | bit length * pixels/8 plane bytes
//
// Loading is all-or-nothing: any malformed header or truncated record fails
// the whole load and leaves no partial state behind.

use std::collections::HashMap;
use std::io;

use crate::animation::{Animation, AnimationFrame, AnimationSet, SwitchMode};
use crate::coloring::{ColorMapping, MappingMode, Palette, Rgb};

/// Magic bytes of a color table file
pub const TABLE_MAGIC: &[u8; 4] = b"DMCT";

/// Magic bytes of an animation set file
pub const ANIMATION_MAGIC: &[u8; 4] = b"DMAN";

/// Supported format version for both file types
pub const FORMAT_VERSION: u8 = 1;

/// Number of colors in the fixed-size default palette header
pub const DEFAULT_PALETTE_COLORS: usize = 16;

/// Errors that can occur while loading color table or animation files
#[derive(Debug)]
pub enum LoadError {
    /// I/O error
    Io(io::Error),

    /// File does not start with the expected magic bytes
    BadMagic,

    /// Format version not understood by this reader
    UnsupportedVersion(u8),

    /// File ended in the middle of a record
    Truncated,

    /// Mapping record carries an unknown mode byte
    InvalidMode(u8),

    /// Animation frame carries an unusable bit length
    InvalidBitLength(u8),
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadError::Io(e) => write!(f, "I/O error: {}", e),
            LoadError::BadMagic => write!(f, "Not a color table or animation file"),
            LoadError::UnsupportedVersion(v) => write!(f, "Unsupported format version {}", v),
            LoadError::Truncated => write!(f, "File is truncated"),
            LoadError::InvalidMode(m) => write!(f, "Unknown mapping mode {}", m),
            LoadError::InvalidBitLength(b) => write!(f, "Invalid animation bit length {}", b),
        }
    }
}

impl std::error::Error for LoadError {}

impl From<io::Error> for LoadError {
    fn from(e: io::Error) -> Self {
        LoadError::Io(e)
    }
}

/// Big-endian cursor over a byte buffer
struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Reader { data, pos: 0 }
    }

    fn bytes(&mut self, len: usize) -> Result<&'a [u8], LoadError> {
        if self.pos + len > self.data.len() {
            return Err(LoadError::Truncated);
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8, LoadError> {
        Ok(self.bytes(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, LoadError> {
        let b = self.bytes(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32, LoadError> {
        let b = self.bytes(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn magic(&mut self, expected: &[u8; 4]) -> Result<(), LoadError> {
        if self.bytes(4)? != expected {
            return Err(LoadError::BadMagic);
        }
        Ok(())
    }

    fn version(&mut self) -> Result<(), LoadError> {
        let version = self.u8()?;
        if version != FORMAT_VERSION {
            return Err(LoadError::UnsupportedVersion(version));
        }
        Ok(())
    }
}

/// Decoded sections of a color table file
pub(crate) struct ParsedTable {
    pub default_palette: Palette,
    pub palettes: Vec<Palette>,
    pub masks: Vec<Vec<u8>>,
    pub mappings: HashMap<u32, ColorMapping>,
}

fn read_palette(reader: &mut Reader<'_>, count: usize) -> Result<Palette, LoadError> {
    let mut colors = Vec::with_capacity(count);
    for _ in 0..count {
        let rgb = reader.bytes(3)?;
        colors.push(Rgb::new(rgb[0], rgb[1], rgb[2]));
    }
    Ok(Palette::new(colors))
}

/// Parse a color table from raw file bytes
///
/// `width` and `height` size the mask buffers; the file itself does not
/// carry dimensions.
pub(crate) fn parse_table(
    data: &[u8],
    width: usize,
    height: usize,
) -> Result<ParsedTable, LoadError> {
    let mut reader = Reader::new(data);
    reader.magic(TABLE_MAGIC)?;
    reader.version()?;

    let default_palette = read_palette(&mut reader, DEFAULT_PALETTE_COLORS)?;

    let palette_count = reader.u16()?;
    let mut palettes = Vec::with_capacity(palette_count as usize);
    for _ in 0..palette_count {
        let color_count = reader.u16()?;
        if color_count == 0 {
            return Err(LoadError::Truncated);
        }
        palettes.push(read_palette(&mut reader, color_count as usize)?);
    }

    let mask_len = width * height / 8;
    let mask_count = reader.u16()?;
    let mut masks = Vec::with_capacity(mask_count as usize);
    for _ in 0..mask_count {
        masks.push(reader.bytes(mask_len)?.to_vec());
    }

    let mapping_count = reader.u32()?;
    let mut mappings = HashMap::with_capacity(mapping_count as usize);
    for _ in 0..mapping_count {
        let checksum = reader.u32()?;
        let mode_tag = reader.u8()?;
        let mode = MappingMode::from_tag(mode_tag).ok_or(LoadError::InvalidMode(mode_tag))?;
        let index = reader.u32()?;
        let duration = reader.u32()?;
        // Last record wins on duplicate checksums
        mappings.insert(
            checksum,
            ColorMapping {
                checksum,
                mode,
                index,
                duration,
            },
        );
    }

    Ok(ParsedTable {
        default_palette,
        palettes,
        masks,
        mappings,
    })
}

/// Parse an animation set from raw file bytes
pub(crate) fn parse_animations(
    data: &[u8],
    width: usize,
    height: usize,
) -> Result<AnimationSet, LoadError> {
    let mut reader = Reader::new(data);
    reader.magic(ANIMATION_MAGIC)?;
    reader.version()?;

    let plane_len = width * height / 8;
    let animation_count = reader.u16()?;
    let mut animations = Vec::with_capacity(animation_count as usize);
    for _ in 0..animation_count {
        let mode_tag = reader.u8()?;
        let switch_mode =
            SwitchMode::from_tag(mode_tag).ok_or(LoadError::InvalidMode(mode_tag))?;
        let frame_count = reader.u16()?;
        let mut frames = Vec::with_capacity(frame_count as usize);
        for _ in 0..frame_count {
            let bit_length = reader.u8()?;
            if bit_length == 0 || bit_length > 8 {
                return Err(LoadError::InvalidBitLength(bit_length));
            }
            let delay_ms = reader.u32()?;
            let mut planes = Vec::with_capacity(bit_length as usize);
            for _ in 0..bit_length {
                planes.push(reader.bytes(plane_len)?.to_vec());
            }
            frames.push(AnimationFrame {
                bit_length,
                delay_ms,
                planes,
            });
        }
        animations.push(Animation::new(switch_mode, frames));
    }

    Ok(AnimationSet::new(animations))
}

#[cfg(test)]
pub(crate) mod test_files {
    // Byte-level builders for the unit tests; the writers live with the
    // authoring tools, not in this crate.

    use super::*;

    pub fn push_u16(buf: &mut Vec<u8>, v: u16) {
        buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn push_u32(buf: &mut Vec<u8>, v: u32) {
        buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn table_header() -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(TABLE_MAGIC);
        buf.push(FORMAT_VERSION);
        for i in 0..DEFAULT_PALETTE_COLORS {
            buf.extend_from_slice(&[(i * 17) as u8, 0, 0]);
        }
        buf
    }

    pub fn empty_table_file() -> Vec<u8> {
        let mut buf = table_header();
        push_u16(&mut buf, 0); // palettes
        push_u16(&mut buf, 0); // masks
        push_u32(&mut buf, 0); // mappings
        buf
    }
}
