// Animation player - the playback state machine
//
// At most one animation runs per engine instance. The player is driven from
// the engine's processing timeline: `tick` fires due Replace-mode frames and
// the completion deadline, `next_frame` merges one Enhance-mode frame per
// live frame. The player never reads the wall clock; every operation takes
// the caller's `now`, which keeps playback deterministic.
//
// Deadlines carry a generation counter. Stopping or restarting bumps the
// generation, so a deadline scheduled before the restart can never fire
// afterwards, even if its instant has already passed.

use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::{AnimationFrame, AnimationSet};

/// Playback state, tagged with the animation's table index and the frame
/// cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    /// Nothing playing
    Idle,

    /// A Replace-mode animation owns the output
    Replacing { index: u32, cursor: usize },

    /// An Enhance-mode animation extends live frames
    Enhancing { index: u32, cursor: usize },
}

/// Result of a `tick`: frames that came due, and whether playback finished
#[derive(Debug, Default)]
pub struct ReplayTick {
    pub frames: Vec<AnimationFrame>,
    pub completed: bool,
}

/// Result of merging one live frame in Enhancing state
#[derive(Debug)]
pub struct Enhanced {
    /// Live low-order planes followed by the animation's high-order planes
    pub planes: Vec<Vec<u8>>,

    /// True when this merge consumed the last animation frame
    pub finished: bool,
}

#[derive(Debug, Clone, Copy)]
struct Deadline {
    at: Instant,
    generation: u64,
}

/// Stateful sequencer for one engine instance
#[derive(Debug)]
pub struct AnimationPlayer {
    state: PlayerState,
    next_frame_at: Option<Deadline>,
    completes_at: Option<Deadline>,
    generation: u64,
}

impl AnimationPlayer {
    pub fn new() -> Self {
        AnimationPlayer {
            state: PlayerState::Idle,
            next_frame_at: None,
            completes_at: None,
            generation: 0,
        }
    }

    pub fn state(&self) -> PlayerState {
        self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == PlayerState::Idle
    }

    pub fn is_replacing(&self) -> bool {
        matches!(self.state, PlayerState::Replacing { .. })
    }

    pub fn is_enhancing(&self) -> bool {
        matches!(self.state, PlayerState::Enhancing { .. })
    }

    /// Start a Replace-mode animation
    ///
    /// Any running animation is stopped first. The first frame is due
    /// immediately; the next `tick` emits it.
    pub fn start_replace(&mut self, index: u32, now: Instant) {
        self.stop();
        self.state = PlayerState::Replacing { index, cursor: 0 };
        self.next_frame_at = Some(Deadline {
            at: now,
            generation: self.generation,
        });
    }

    /// Start an Enhance-mode animation
    ///
    /// Any running animation is stopped first. Frames advance only through
    /// `next_frame`.
    pub fn start_enhance(&mut self, index: u32) {
        self.stop();
        self.state = PlayerState::Enhancing { index, cursor: 0 };
    }

    /// Stop playback: cancel all pending deadlines and reset the cursor
    pub fn stop(&mut self) {
        if self.state != PlayerState::Idle {
            debug!("[anim] Stopping playback in state {:?}.", self.state);
        }
        self.state = PlayerState::Idle;
        self.next_frame_at = None;
        self.completes_at = None;
        self.generation += 1;
    }

    /// Fire all deadlines that are due at `now`
    ///
    /// In Replacing state this emits every frame whose scheduled instant has
    /// passed (several at once if the caller pumps slowly) and, after the
    /// last frame's delay, completes playback. Other states do nothing.
    pub fn tick(&mut self, set: &AnimationSet, now: Instant) -> ReplayTick {
        let mut result = ReplayTick::default();

        loop {
            let PlayerState::Replacing { index, cursor } = self.state else {
                break;
            };
            let Some(animation) = set.find(index) else {
                warn!("[anim] Animation {} vanished mid-playback, stopping.", index);
                self.stop();
                break;
            };

            if cursor < animation.num_frames() {
                let Some(deadline) = self.next_frame_at else {
                    break;
                };
                if deadline.generation != self.generation || deadline.at > now {
                    break;
                }
                let frame = animation.frame(cursor);
                result.frames.push(frame.clone());

                let next_at = deadline.at + Duration::from_millis(u64::from(frame.delay_ms));
                let next_cursor = cursor + 1;
                self.state = PlayerState::Replacing {
                    index,
                    cursor: next_cursor,
                };
                if next_cursor < animation.num_frames() {
                    self.next_frame_at = Some(Deadline {
                        at: next_at,
                        generation: self.generation,
                    });
                } else {
                    // Last frame emitted; hold it for its own delay
                    self.next_frame_at = None;
                    self.completes_at = Some(Deadline {
                        at: next_at,
                        generation: self.generation,
                    });
                }
                continue;
            }

            if let Some(deadline) = self.completes_at {
                if deadline.generation == self.generation && deadline.at <= now {
                    self.stop();
                    result.completed = true;
                }
            }
            break;
        }

        result
    }

    /// Earliest pending deadline, if any
    ///
    /// Lets a host sleep until something is actually due instead of polling.
    pub fn next_deadline(&self) -> Option<Instant> {
        let frame = self
            .next_frame_at
            .filter(|d| d.generation == self.generation)
            .map(|d| d.at);
        let completion = self
            .completes_at
            .filter(|d| d.generation == self.generation)
            .map(|d| d.at);
        match (frame, completion) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Merge one live frame with the next Enhance-mode animation frame
    ///
    /// Returns the merged planes (live planes first, animation planes
    /// appended as high-order bits). Returns `None` when not enhancing or
    /// when the animation's planes do not fit the live frame, in which case
    /// playback stops and the caller colorizes the live frame as-is.
    pub fn next_frame(&mut self, set: &AnimationSet, live_planes: &[Vec<u8>]) -> Option<Enhanced> {
        let PlayerState::Enhancing { index, cursor } = self.state else {
            return None;
        };
        let Some(animation) = set.find(index) else {
            warn!("[anim] Animation {} vanished mid-playback, stopping.", index);
            self.stop();
            return None;
        };
        if cursor >= animation.num_frames() {
            self.stop();
            return None;
        }

        let frame = animation.frame(cursor);
        let live_len = live_planes.first().map_or(0, Vec::len);
        if frame.planes.iter().any(|p| p.len() != live_len) {
            warn!(
                "[anim] Enhance frame planes do not match the live frame ({} bytes), stopping.",
                live_len
            );
            self.stop();
            return None;
        }
        if live_planes.len() + frame.planes.len() > 8 {
            warn!(
                "[anim] Enhance would exceed 8 planes ({} live + {} animation), stopping.",
                live_planes.len(),
                frame.planes.len()
            );
            self.stop();
            return None;
        }

        let mut planes = live_planes.to_vec();
        planes.extend(frame.planes.iter().cloned());

        let next_cursor = cursor + 1;
        let finished = next_cursor >= animation.num_frames();
        if finished {
            self.stop();
        } else {
            self.state = PlayerState::Enhancing {
                index,
                cursor: next_cursor,
            };
        }
        Some(Enhanced { planes, finished })
    }
}

impl Default for AnimationPlayer {
    fn default() -> Self {
        Self::new()
    }
}
