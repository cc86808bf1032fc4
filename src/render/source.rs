// Frame sources - where raw frames come from
//
// A source pushes frames; the graph drains them on its own timeline. The
// observable plumbing of classic render pipelines maps onto plain mpsc
// channels here: subscribing hands out a fresh receiver, dropping the
// receiver unsubscribes.

use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex};

use crate::frame::RawFrame;

/// One event on a source's stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceEvent {
    /// A raw grayscale frame
    Frame(RawFrame),

    /// Capture started or came back
    Resumed,

    /// Capture stopped; no frames until the next resume
    Paused,
}

/// Something that produces raw frames at an arbitrary rate
///
/// One source can feed several graphs; every call to `subscribe` returns an
/// independent stream.
pub trait FrameSource {
    fn name(&self) -> &str;

    /// Register a new subscriber and return its event stream
    fn subscribe(&mut self) -> Receiver<SourceEvent>;
}

type SharedSenders = Arc<Mutex<Vec<Sender<SourceEvent>>>>;

/// A source fed by the hosting integration
///
/// The host keeps a [`PushHandle`] and injects whatever its capture layer
/// produces; the handle is clonable and may live on another thread.
pub struct PushSource {
    name: String,
    senders: SharedSenders,
}

impl PushSource {
    pub fn new(name: impl Into<String>) -> Self {
        PushSource {
            name: name.into(),
            senders: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A handle for pushing events into this source
    pub fn handle(&self) -> PushHandle {
        PushHandle {
            senders: Arc::clone(&self.senders),
        }
    }
}

impl FrameSource for PushSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn subscribe(&mut self) -> Receiver<SourceEvent> {
        let (tx, rx) = channel();
        if let Ok(mut senders) = self.senders.lock() {
            senders.push(tx);
        }
        rx
    }
}

/// Clonable feed handle of a [`PushSource`]
#[derive(Clone)]
pub struct PushHandle {
    senders: SharedSenders,
}

impl PushHandle {
    /// Push one frame to every subscriber
    pub fn push(&self, frame: RawFrame) {
        self.send(SourceEvent::Frame(frame));
    }

    /// Signal that capture resumed
    pub fn resume(&self) {
        self.send(SourceEvent::Resumed);
    }

    /// Signal that capture paused
    pub fn pause(&self) {
        self.send(SourceEvent::Paused);
    }

    fn send(&self, event: SourceEvent) {
        if let Ok(mut senders) = self.senders.lock() {
            // Dead receivers drop out on the next send
            senders.retain(|tx| tx.send(event.clone()).is_ok());
        }
    }
}
