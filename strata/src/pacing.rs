// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Frame pacing: decides when the producer is asked for a new tree.
//!
//! The scheduler sits between three parties: the producer requesting
//! frames ([`FrameScheduler::schedule_frame`]), the platform's vsync-style
//! timer firing ticks ([`FrameScheduler::begin_frame`]), and the raster
//! context retiring presented frames ([`FrameScheduler::frame_complete`]).
//! It enforces two invariants:
//!
//! * at most one wakeup timer is armed at a time, so a burst of requests
//!   coalesces into a single tick;
//! * at most `depth` frames are in flight between producer and display.
//!   Requests beyond that are not dropped: a sticky deferred flag replays
//!   exactly one request when a slot frees up.
//!
//! The scheduler owns no clock and no thread. Methods returning `bool`
//! tell the caller "arm a wakeup [`FrameSchedulerConfig::frame_interval`]
//! from now"; wiring that to a timer lives with the embedder (see
//! [`crate::runloop`]).

use std::collections::VecDeque;
use std::time::Duration;

use crate::tree::LayerTree;
use crate::{Error, Result};

/// Tunable pacing parameters.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FrameSchedulerConfig {
    /// Maximum frames in flight between producer and display. Deeper
    /// pipelines absorb raster hiccups at the cost of latency.
    pub depth: usize,
    /// Interval between a frame request and the producer wakeup.
    pub frame_interval: Duration,
}

impl Default for FrameSchedulerConfig {
    fn default() -> Self {
        Self {
            depth: 3,
            frame_interval: Duration::from_micros(16_667),
        }
    }
}

/// Externally observable scheduler state, mostly for logging and tests.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SchedulerState {
    /// Nothing requested, nothing in flight.
    Idle,
    /// A wakeup timer is armed; the producer will be called on the tick.
    Requested,
    /// Produced trees are waiting for the raster context.
    Scheduled,
    /// Frames are in flight but none are waiting to be drawn.
    Drawing,
    /// The pipeline is full and a request is parked until a slot frees.
    Deferred,
}

/// The frame-pacing state machine. See the module docs.
pub struct FrameScheduler {
    config: FrameSchedulerConfig,
    /// Frames begun and not yet retired by [`FrameScheduler::frame_complete`].
    outstanding: usize,
    timer_armed: bool,
    deferred: bool,
    frames: VecDeque<LayerTree>,
}

impl FrameScheduler {
    pub fn new(config: FrameSchedulerConfig) -> Self {
        Self {
            config,
            outstanding: 0,
            timer_armed: false,
            deferred: false,
            frames: VecDeque::new(),
        }
    }

    pub fn config(&self) -> FrameSchedulerConfig {
        self.config
    }

    /// Frames currently in flight.
    pub fn outstanding_frames(&self) -> usize {
        self.outstanding
    }

    pub fn state(&self) -> SchedulerState {
        if self.deferred {
            SchedulerState::Deferred
        } else if self.timer_armed {
            SchedulerState::Requested
        } else if !self.frames.is_empty() {
            SchedulerState::Scheduled
        } else if self.outstanding > 0 {
            SchedulerState::Drawing
        } else {
            SchedulerState::Idle
        }
    }

    /// Asks for a producer wakeup. Returns whether the caller must arm a
    /// timer; `false` means the request folded into an already-armed
    /// timer or was deferred behind a full pipeline.
    pub fn schedule_frame(&mut self) -> bool {
        if self.timer_armed {
            return false;
        }
        if self.outstanding >= self.config.depth {
            log::trace!(
                "pipeline full ({} in flight), deferring frame request",
                self.outstanding
            );
            self.deferred = true;
            return false;
        }
        self.timer_armed = true;
        true
    }

    /// Delivers a timer tick: takes the armed wakeup and runs `producer`
    /// inside a [`FrameWindow`]. Returns whether a new timer must be
    /// armed (the producer asked for a follow-up frame, or an empty frame
    /// freed a slot a deferred request was waiting on).
    ///
    /// A tick with no armed wakeup is ignored; stale platform timers can
    /// outlive the request they were armed for.
    pub fn begin_frame(&mut self, producer: impl FnOnce(&mut FrameWindow<'_>)) -> bool {
        if !self.timer_armed {
            log::warn!("frame tick without a scheduled frame");
            return false;
        }
        self.timer_armed = false;
        self.outstanding += 1;
        let mut window = FrameWindow {
            frames: &mut self.frames,
            rendered: false,
            frame_requested: false,
        };
        producer(&mut window);
        let rendered = window.rendered;
        let requested = window.frame_requested;

        let mut rearm = false;
        if !rendered {
            // The producer declined to draw; retire the slot immediately
            // so an empty frame does not consume pipeline depth.
            rearm |= self.retire_one();
        }
        if requested {
            rearm |= self.schedule_frame();
        }
        rearm
    }

    /// Next produced tree for the raster context, oldest first.
    pub fn take_frame(&mut self) -> Option<LayerTree> {
        self.frames.pop_front()
    }

    /// Retires one in-flight frame after presentation. Returns whether a
    /// timer must be armed to replay a deferred request.
    ///
    /// # Panics
    ///
    /// Panics if no frame is in flight; a spurious completion means the
    /// display and the scheduler disagree about pipeline occupancy.
    pub fn frame_complete(&mut self) -> bool {
        self.retire_one()
    }

    fn retire_one(&mut self) -> bool {
        assert!(
            self.outstanding > 0,
            "frame completed with no frame in flight"
        );
        self.outstanding -= 1;
        if self.deferred {
            // Exactly one replay no matter how many requests were parked.
            self.deferred = false;
            return self.schedule_frame();
        }
        false
    }
}

/// Handle the producer renders through, alive only for the duration of
/// one [`FrameScheduler::begin_frame`] callback. Confining `render` to
/// the callback makes out-of-band rendering unrepresentable.
pub struct FrameWindow<'a> {
    frames: &'a mut VecDeque<LayerTree>,
    rendered: bool,
    frame_requested: bool,
}

impl FrameWindow<'_> {
    /// Submits the tree for this frame.
    pub fn render(&mut self, tree: LayerTree) -> Result<()> {
        if self.rendered {
            return Err(Error::FrameAlreadyRendered);
        }
        self.rendered = true;
        self.frames.push_back(tree);
        Ok(())
    }

    /// Requests a follow-up frame, e.g. for a running animation. Folded
    /// into the `begin_frame` return value.
    pub fn request_frame(&mut self) {
        self.frame_requested = true;
    }
}
