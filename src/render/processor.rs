// Frame processors - optional transformations between source and colorization

use crate::frame::RawFrame;

/// A transformation applied to raw frames before colorization
///
/// Processors run in registration order. A grayscale-only processor is
/// skipped on the passthrough path of RGB-only destinations; disabled
/// processors are skipped everywhere.
pub trait FrameProcessor {
    fn name(&self) -> &str;

    fn enabled(&self) -> bool {
        true
    }

    /// True if the transformation only makes sense for grayscale output
    fn grayscale_only(&self) -> bool {
        false
    }

    /// Transform one frame
    fn process(&mut self, frame: RawFrame) -> RawFrame;
}
