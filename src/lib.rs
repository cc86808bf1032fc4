// DMD Render Pipeline Library
// Colorizes low-bit-depth grayscale DMD frames and fans them out to
// heterogeneous display devices.

// Public modules
pub mod animation;
pub mod coloring;
pub mod config;
pub mod converter;
pub mod frame;
pub mod output;
pub mod render;

// Re-export main types for convenience
pub use animation::{Animation, AnimationFrame, AnimationPlayer, AnimationSet, SwitchMode};
pub use coloring::{ColorMapping, ColorTable, LoadError, MappingMode, Palette, Rgb};
pub use config::DmdConfig;
pub use converter::Colorizer;
pub use frame::{ColoredFrame, RawFrame, DMD_HEIGHT, DMD_WIDTH};
pub use output::FileOutput;
pub use render::{
    DeviceError, FrameDestination, FrameProcessor, FrameSource, OutputFrame, PushHandle,
    PushSource, RenderGraph, RenderGraphError, SourceEvent,
};
