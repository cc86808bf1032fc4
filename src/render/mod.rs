// Render module - the pipeline from one source to many destinations
//
// A render graph wires one frame source through optional processors and an
// optional colorizer into any number of destinations. Every frame is
// processed exactly once on the graph's timeline (the caller's pump loop)
// and then fanned out according to each destination's capabilities.

mod destination;
mod processor;
mod source;

pub use destination::{DeviceError, FrameDestination, OutputFrame};
pub use processor::FrameProcessor;
pub use source::{FrameSource, PushHandle, PushSource, SourceEvent};

use std::sync::mpsc::Receiver;
use std::time::Instant;

use tracing::{debug, info};

use crate::converter::Colorizer;
use crate::frame::{ColoredFrame, RawFrame};

/// Errors from render graph lifecycle operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderGraphError {
    /// `start` was called while the graph was already running
    AlreadyRunning,

    /// `start` was called with no destinations; a graph never runs without
    /// sinks
    NoDestinations,
}

impl std::fmt::Display for RenderGraphError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RenderGraphError::AlreadyRunning => {
                write!(f, "Rendering already active, stop before re-launching")
            }
            RenderGraphError::NoDestinations => {
                write!(f, "No destinations to render to")
            }
        }
    }
}

impl std::error::Error for RenderGraphError {}

/// A render pipeline: one source, optional processors, an optional
/// colorizer, N destinations
///
/// Sources and destinations are supplied by the host; the graph owns the
/// subscription lifecycle and the converter's timers. Stopping tears both
/// down synchronously, so no callback can reach a destination afterwards.
pub struct RenderGraph {
    source: Box<dyn FrameSource>,
    processors: Vec<Box<dyn FrameProcessor>>,
    converter: Option<Colorizer>,
    destinations: Vec<Box<dyn FrameDestination>>,
    prefer_gray4: bool,
    events: Option<Receiver<SourceEvent>>,
    disposed: bool,
}

impl RenderGraph {
    pub fn new(source: Box<dyn FrameSource>) -> Self {
        RenderGraph {
            source,
            processors: Vec::new(),
            converter: None,
            destinations: Vec::new(),
            prefer_gray4: false,
            events: None,
            disposed: false,
        }
    }

    /// Install the colorizer engine
    pub fn set_converter(&mut self, converter: Colorizer) {
        self.converter = Some(converter);
    }

    /// Access the colorizer, e.g. for the `LoadPalette` side channel
    pub fn converter_mut(&mut self) -> Option<&mut Colorizer> {
        self.converter.as_mut()
    }

    /// Append a processor; processors run in registration order
    pub fn add_processor(&mut self, processor: Box<dyn FrameProcessor>) {
        self.processors.push(processor);
    }

    /// Append a destination
    ///
    /// The caller must have checked availability already; the graph does not
    /// retry absent devices.
    pub fn add_destination(&mut self, destination: Box<dyn FrameDestination>) {
        self.destinations.push(destination);
    }

    /// Prefer the raw 4-bit grayscale path for destinations that support it
    pub fn set_prefer_gray4(&mut self, prefer: bool) {
        self.prefer_gray4 = prefer;
    }

    pub fn is_running(&self) -> bool {
        self.events.is_some()
    }

    /// Open the source subscription and begin rendering
    pub fn start(&mut self) -> Result<(), RenderGraphError> {
        if self.events.is_some() {
            return Err(RenderGraphError::AlreadyRunning);
        }
        if self.destinations.is_empty() {
            return Err(RenderGraphError::NoDestinations);
        }
        for dest in &self.destinations {
            if self.prefer_gray4 && dest.supports_gray4() {
                info!(
                    "[graph] Enabling 4-bit grayscale rendering for {}.",
                    dest.name()
                );
            }
        }
        self.events = Some(self.source.subscribe());
        info!(
            "[graph] Rendering from {} to {} destination(s).",
            self.source.name(),
            self.destinations.len()
        );
        Ok(())
    }

    /// Drain pending source events and fire due converter timers
    ///
    /// All processing and fan-out happens here, on the caller's thread, in
    /// arrival order. Does nothing while the graph is stopped.
    pub fn pump(&mut self, now: Instant) {
        let Some(events) = &self.events else {
            return;
        };
        let mut batch = Vec::new();
        while let Ok(event) = events.try_recv() {
            batch.push(event);
        }
        for event in batch {
            match event {
                SourceEvent::Frame(frame) => self.process_frame(frame, now),
                SourceEvent::Resumed => info!("[graph] Source {} resumed.", self.source.name()),
                SourceEvent::Paused => info!("[graph] Source {} paused.", self.source.name()),
            }
        }

        let emitted = match self.converter.as_mut() {
            Some(converter) => converter.tick(now),
            None => Vec::new(),
        };
        for colored in &emitted {
            self.dispatch_colored(colored);
        }
    }

    /// Release the source subscription and cancel converter timers
    ///
    /// Safe to call when not running.
    pub fn stop(&mut self) {
        if self.events.take().is_some() {
            if let Some(converter) = self.converter.as_mut() {
                converter.stop();
            }
            info!(
                "[graph] Rendering stopped for {} destination(s).",
                self.destinations.len()
            );
        }
    }

    /// Stop rendering and dispose every destination
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        debug!("[graph] Disposing render graph.");
        self.stop();
        for dest in self.destinations.iter_mut() {
            dest.dispose();
        }
    }

    fn process_frame(&mut self, frame: RawFrame, now: Instant) {
        // Does any RGB destination take the passthrough path with a reduced
        // processor chain?
        let needs_rgb_variant = self.converter.is_none()
            && self
                .processors
                .iter()
                .any(|p| p.enabled() && p.grayscale_only())
            && self
                .destinations
                .iter()
                .any(|d| d.is_rgb() && !(self.prefer_gray4 && d.supports_gray4()));
        let original = if needs_rgb_variant {
            Some(frame.clone())
        } else {
            None
        };

        let mut full = frame;
        for processor in self.processors.iter_mut().filter(|p| p.enabled()) {
            full = processor.process(full);
        }

        let rgb_variant = original.map(|frame| {
            let mut reduced = frame;
            for processor in self
                .processors
                .iter_mut()
                .filter(|p| p.enabled() && !p.grayscale_only())
            {
                reduced = processor.process(reduced);
            }
            reduced
        });

        // Outer None: no converter configured. Inner None: a Replace-mode
        // animation owns the output right now.
        let converted: Option<Option<ColoredFrame>> =
            self.converter.as_mut().map(|c| c.convert(&full, now));

        let prefer_gray4 = self.prefer_gray4;
        let mut raw_gray4: Option<RawFrame> = None;
        for dest in self.destinations.iter_mut() {
            if prefer_gray4 && dest.supports_gray4() {
                let gray4 = raw_gray4.get_or_insert_with(|| full.to_gray4());
                dest.render(&OutputFrame::Gray {
                    bit_length: 4,
                    width: gray4.width,
                    height: gray4.height,
                    data: gray4.data.clone(),
                });
                continue;
            }
            match &converted {
                Some(Some(colored)) => render_colored(dest.as_mut(), colored),
                Some(None) => {}
                None => {
                    let raw = match &rgb_variant {
                        Some(variant) if dest.is_rgb() => variant,
                        _ => &full,
                    };
                    dest.render(&OutputFrame::Gray {
                        bit_length: raw.bit_length,
                        width: raw.width,
                        height: raw.height,
                        data: raw.data.clone(),
                    });
                }
            }
        }
    }

    fn dispatch_colored(&mut self, colored: &ColoredFrame) {
        let prefer_gray4 = self.prefer_gray4;
        for dest in self.destinations.iter_mut() {
            // Raw-path destinations only ever see live frames
            if prefer_gray4 && dest.supports_gray4() {
                continue;
            }
            render_colored(dest.as_mut(), colored);
        }
    }
}

impl Drop for RenderGraph {
    fn drop(&mut self) {
        self.dispose();
    }
}

fn render_colored(dest: &mut dyn FrameDestination, colored: &ColoredFrame) {
    if dest.is_rgb() {
        dest.render(&OutputFrame::Rgb24 {
            width: colored.width,
            height: colored.height,
            data: colored.to_rgb24(),
        });
    } else {
        dest.set_palette(colored.palette.colors());
        dest.render(&OutputFrame::Gray {
            bit_length: colored.bit_length(),
            width: colored.width,
            height: colored.height,
            data: colored.to_gray(),
        });
    }
}
