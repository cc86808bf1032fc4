// Configuration management
//
// Session setup for a render pipeline: panel dimensions, coloring file
// paths and the frame dump sink. Hosts can load this from a TOML file or
// construct everything programmatically; the crate itself never writes
// settings.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::frame::{DMD_HEIGHT, DMD_WIDTH};

/// Default configuration file path
const CONFIG_FILE: &str = "dmd_config.toml";

/// Session configuration for one render pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DmdConfig {
    /// Display settings
    pub display: DisplayConfig,

    /// Coloring file locations
    pub coloring: ColoringConfig,

    /// Frame dump settings
    pub dump: DumpConfig,
}

/// Display settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Panel width in pixels
    pub width: usize,

    /// Panel height in pixels
    pub height: usize,

    /// Send raw 4-bit grayscale to destinations that support it
    pub prefer_gray4: bool,
}

/// Coloring file locations
///
/// Both paths are optional; without them the pipeline runs in passthrough
/// mode with the built-in amber ramp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColoringConfig {
    /// Color table file for the current game
    pub palette_file: Option<PathBuf>,

    /// Companion animation file
    pub animation_file: Option<PathBuf>,
}

/// Frame dump settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DumpConfig {
    /// Write every rendered frame as a PNG
    pub enabled: bool,

    /// Base directory for dump sessions
    pub directory: PathBuf,
}

impl Default for DmdConfig {
    fn default() -> Self {
        DmdConfig {
            display: DisplayConfig {
                width: DMD_WIDTH,
                height: DMD_HEIGHT,
                prefer_gray4: false,
            },
            coloring: ColoringConfig {
                palette_file: None,
                animation_file: None,
            },
            dump: DumpConfig {
                enabled: false,
                directory: PathBuf::from("frames"),
            },
        }
    }
}

impl DmdConfig {
    /// Load the configuration from the default file, falling back to
    /// defaults when it is missing or unreadable
    pub fn load_or_default() -> Self {
        Self::load(CONFIG_FILE).unwrap_or_default()
    }

    /// Load a configuration file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, io::Error> {
        let contents = fs::read_to_string(path)?;
        toml::from_str(&contents).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    /// Save the configuration to a file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), io::Error> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        fs::write(path, contents)
    }
}
