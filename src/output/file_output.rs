// File output - dumps every rendered frame as a PNG
//
// Each instance writes into its own timestamped session directory so
// consecutive runs never clobber each other. Grayscale frames are rendered
// through the installed palette, the tint ramp, or a neutral gray expansion,
// in that order of preference.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::coloring::{Palette, Rgb};
use crate::render::{DeviceError, FrameDestination, OutputFrame};

/// Errors that can occur while writing a frame
#[derive(Debug)]
pub enum FileOutputError {
    /// I/O error
    Io(io::Error),

    /// PNG encoding error
    PngEncoding(png::EncodingError),
}

impl std::fmt::Display for FileOutputError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileOutputError::Io(e) => write!(f, "I/O error: {}", e),
            FileOutputError::PngEncoding(e) => write!(f, "PNG encoding error: {}", e),
        }
    }
}

impl std::error::Error for FileOutputError {}

impl From<io::Error> for FileOutputError {
    fn from(e: io::Error) -> Self {
        FileOutputError::Io(e)
    }
}

impl From<png::EncodingError> for FileOutputError {
    fn from(e: png::EncodingError) -> Self {
        FileOutputError::PngEncoding(e)
    }
}

/// A destination that writes rendered frames as PNG files
pub struct FileOutput {
    directory: PathBuf,
    frame_counter: u64,
    palette: Option<Vec<Rgb>>,
    tint: Option<Rgb>,
}

impl FileOutput {
    /// Create the session directory under `base` and open the sink
    ///
    /// # Arguments
    /// * `base` - Base dump directory; a `session_<timestamp>` subdirectory
    ///   is created inside it
    ///
    /// # Returns
    /// The destination, or [`DeviceError::NotAvailable`] when the directory
    /// cannot be created
    pub fn new<P: AsRef<Path>>(base: P) -> Result<Self, DeviceError> {
        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let directory = base.as_ref().join(format!("session_{}", timestamp));
        fs::create_dir_all(&directory)
            .map_err(|e| DeviceError::NotAvailable(format!("{}: {}", directory.display(), e)))?;
        info!("[dump] Writing frames to {}.", directory.display());
        Ok(FileOutput {
            directory,
            frame_counter: 0,
            palette: None,
            tint: None,
        })
    }

    /// Directory this session writes into
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Number of frames written so far
    pub fn frames_written(&self) -> u64 {
        self.frame_counter
    }

    fn write_frame(&mut self, frame: &OutputFrame) -> Result<(), FileOutputError> {
        let path = self
            .directory
            .join(format!("frame_{:06}.png", self.frame_counter));
        match frame {
            OutputFrame::Rgb24 {
                width,
                height,
                data,
            } => {
                save_png(&path, data, *width as u32, *height as u32)?;
            }
            OutputFrame::Gray {
                bit_length,
                width,
                height,
                data,
            } => {
                let rgb = self.expand_gray(*bit_length, data);
                save_png(&path, &rgb, *width as u32, *height as u32)?;
            }
        }
        self.frame_counter += 1;
        Ok(())
    }

    /// Expand grayscale levels to RGB using palette, tint or neutral gray
    fn expand_gray(&self, bit_length: u8, data: &[u8]) -> Vec<u8> {
        let levels = 1usize << bit_length;
        let palette = match (&self.palette, self.tint) {
            (Some(colors), _) if colors.len() >= levels => Palette::new(colors.clone()),
            (_, Some(color)) => Palette::ramp(Rgb::BLACK, color, levels),
            _ => Palette::ramp(Rgb::BLACK, Rgb::new(255, 255, 255), levels),
        };
        let mut rgb = Vec::with_capacity(data.len() * 3);
        for &level in data {
            let color = palette.color(level as usize);
            rgb.push(color.r);
            rgb.push(color.g);
            rgb.push(color.b);
        }
        rgb
    }
}

impl FrameDestination for FileOutput {
    fn name(&self) -> &str {
        "File Output"
    }

    fn is_rgb(&self) -> bool {
        true
    }

    fn supports_gray4(&self) -> bool {
        true
    }

    fn is_fixed_size(&self) -> bool {
        false
    }

    fn render(&mut self, frame: &OutputFrame) {
        if let Err(e) = self.write_frame(frame) {
            warn!("[dump] Failed to write frame: {}", e);
        }
    }

    fn set_palette(&mut self, colors: &[Rgb]) {
        self.palette = Some(colors.to_vec());
    }

    fn clear_palette(&mut self) {
        self.palette = None;
    }

    fn set_color(&mut self, color: Rgb) {
        self.tint = Some(color);
    }

    fn clear_color(&mut self) {
        self.tint = None;
    }

    fn dispose(&mut self) {
        info!(
            "[dump] Wrote {} frame(s) to {}.",
            self.frame_counter,
            self.directory.display()
        );
    }
}

/// Save RGB data as a PNG file
fn save_png(path: &Path, data: &[u8], width: u32, height: u32) -> Result<(), FileOutputError> {
    let file = fs::File::create(path)?;
    let w = io::BufWriter::new(file);

    let mut encoder = png::Encoder::new(w, width, height);
    encoder.set_color(png::ColorType::Rgb);
    encoder.set_depth(png::BitDepth::Eight);

    let mut writer = encoder.write_header()?;
    writer.write_image_data(data)?;

    Ok(())
}
