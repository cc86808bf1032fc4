// Coloring module - the immutable per-game color table
//
// A color table bundles everything loaded for one identified game: the
// default palette, the numbered palette table, recognition masks, the
// checksum-to-mapping table and the optional animation set. It never changes
// during play; the "currently active palette" is engine state, not table
// state.

mod loader;
mod mapping;
mod palette;

pub use loader::LoadError;
pub use mapping::{ColorMapping, MappingMode};
pub use palette::{Palette, Rgb};

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::animation::AnimationSet;

/// Immutable-after-load store of palettes, masks, mappings and animations
#[derive(Debug, Clone)]
pub struct ColorTable {
    default_palette: Palette,
    palettes: Vec<Palette>,
    masks: Vec<Vec<u8>>,
    mappings: HashMap<u32, ColorMapping>,
    animations: AnimationSet,
}

impl ColorTable {
    /// Build a table from already-decoded parts
    ///
    /// Useful for hosts that generate coloring data programmatically instead
    /// of loading the binary files.
    pub fn new(
        default_palette: Palette,
        palettes: Vec<Palette>,
        masks: Vec<Vec<u8>>,
        mappings: Vec<ColorMapping>,
        animations: AnimationSet,
    ) -> Self {
        let mappings = mappings
            .into_iter()
            .map(|m| (m.checksum, m))
            .collect();
        ColorTable {
            default_palette,
            palettes,
            masks,
            mappings,
            animations,
        }
    }

    /// A table with only the built-in amber ramp: no masks, no mappings, no
    /// animations
    ///
    /// This is the degraded-mode table used when no coloring files exist for
    /// a game (or when loading them failed); every frame falls through to
    /// direct ramp colorization.
    pub fn empty(bit_length: u8) -> Self {
        ColorTable {
            default_palette: Palette::default_ramp(bit_length),
            palettes: Vec::new(),
            masks: Vec::new(),
            mappings: HashMap::new(),
            animations: AnimationSet::empty(),
        }
    }

    /// Load a color table file
    ///
    /// # Arguments
    /// * `path` - Path to the table file
    /// * `width` - Frame width in pixels, sizes the mask buffers
    /// * `height` - Frame height in pixels
    ///
    /// # Returns
    /// The loaded table, or a [`LoadError`] leaving no partial state
    pub fn load<P: AsRef<Path>>(path: P, width: usize, height: usize) -> Result<Self, LoadError> {
        let data = fs::read(path)?;
        let parsed = loader::parse_table(&data, width, height)?;
        Ok(ColorTable {
            default_palette: parsed.default_palette,
            palettes: parsed.palettes,
            masks: parsed.masks,
            mappings: parsed.mappings,
            animations: AnimationSet::empty(),
        })
    }

    /// Load a color table file together with its companion animation file
    ///
    /// A missing or malformed animation file fails the whole load.
    pub fn load_with_animations<P: AsRef<Path>>(
        table_path: P,
        animation_path: P,
        width: usize,
        height: usize,
    ) -> Result<Self, LoadError> {
        let mut table = Self::load(table_path, width, height)?;
        let data = fs::read(animation_path)?;
        table.animations = loader::parse_animations(&data, width, height)?;
        Ok(table)
    }

    /// Exact-match mapping lookup by checksum
    pub fn find_mapping(&self, checksum: u32) -> Option<&ColorMapping> {
        self.mappings.get(&checksum)
    }

    /// Palette at `index` in the numbered palette table
    pub fn get_palette(&self, index: u32) -> Option<&Palette> {
        self.palettes.get(index as usize)
    }

    /// The palette active when nothing else has been triggered
    pub fn default_palette(&self) -> &Palette {
        &self.default_palette
    }

    /// Recognition masks in declaration order
    pub fn masks(&self) -> &[Vec<u8>] {
        &self.masks
    }

    /// The animation set (possibly empty)
    pub fn animations(&self) -> &AnimationSet {
        &self.animations
    }

    /// Number of loaded mappings
    pub fn mapping_count(&self) -> usize {
        self.mappings.len()
    }
}

#[cfg(test)]
mod tests {
    use super::loader::test_files;
    use super::*;
    use std::path::PathBuf;

    fn temp_path(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("dmd_rs_table_{}_{}.dmct", tag, std::process::id()))
    }

    #[test]
    fn test_load_from_file() {
        let path = temp_path("ok");
        fs::write(&path, test_files::empty_table_file()).expect("write failed");
        let table = ColorTable::load(&path, 128, 32).expect("load failed");
        assert_eq!(table.default_palette().len(), 16);
        assert_eq!(table.mapping_count(), 0);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let result = ColorTable::load("does/not/exist.dmct", 128, 32);
        assert!(matches!(result, Err(LoadError::Io(_))));
    }

    #[test]
    fn test_load_garbage_fails_without_partial_state() {
        let path = temp_path("bad");
        fs::write(&path, b"garbage").expect("write failed");
        assert!(ColorTable::load(&path, 128, 32).is_err());
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_empty_table() {
        let table = ColorTable::empty(2);
        assert_eq!(table.default_palette().len(), 4);
        assert!(table.masks().is_empty());
        assert_eq!(table.mapping_count(), 0);
        assert!(table.animations().is_empty());
        assert!(table.find_mapping(0x1234).is_none());
        assert!(table.get_palette(0).is_none());
    }

    #[test]
    fn test_mapping_roundtrip() {
        let mapping = ColorMapping {
            checksum: 0xABCD_EF01,
            mode: MappingMode::Recolor,
            index: 2,
            duration: 500,
        };
        let table = ColorTable::new(
            Palette::default_ramp(2),
            vec![],
            vec![],
            vec![mapping.clone()],
            AnimationSet::empty(),
        );
        assert_eq!(table.find_mapping(0xABCD_EF01), Some(&mapping));
    }

    #[test]
    fn test_get_palette_by_index() {
        let table = ColorTable::new(
            Palette::default_ramp(2),
            vec![Palette::default_ramp(2), Palette::default_ramp(4)],
            vec![],
            vec![],
            AnimationSet::empty(),
        );
        assert_eq!(table.get_palette(1).map(Palette::len), Some(16));
        assert!(table.get_palette(2).is_none());
    }
}
