// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Recorded drawing command lists.
//!
//! A [`Picture`] is the leaf content of the layer tree: an immutable
//! sequence of draw operations recorded by the producer, replayed onto a
//! [`Canvas`] during paint. Pictures carry a stable identity used as a
//! raster-cache key and by the frame differ.

use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use peniko::kurbo::{BezPath, Rect, Shape};

use crate::canvas::{Canvas, Paint};
use crate::geometry;

/// Stable identity of a recorded picture.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct PictureId(pub NonZeroU64);

impl PictureId {
    /// Allocates the next id.
    pub fn next() -> Self {
        // We initialize with 1 so that the conversion below succeeds
        static ID_COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(NonZeroU64::new(ID_COUNTER.fetch_add(1, Ordering::Relaxed)).unwrap())
    }
}

/// One recorded drawing operation.
#[derive(Clone, Debug, PartialEq)]
pub enum DrawOp {
    Rect(Rect, Paint),
    Path(BezPath, Paint),
}

impl DrawOp {
    fn bounds(&self) -> Rect {
        match self {
            Self::Rect(r, _) => *r,
            Self::Path(p, _) => p.bounding_box(),
        }
    }
}

/// Content comparison gives up beyond this many operations; the raster
/// cache and differ treat such pictures as changed unless they are the
/// same allocation. Full comparison is only worth it for simple content.
const THOROUGH_COMPARE_MAX_OPS: usize = 10;

/// An immutable sequence of drawing commands.
pub struct Picture {
    id: PictureId,
    ops: Vec<DrawOp>,
    cull_rect: Rect,
}

impl Picture {
    /// The picture's stable identity.
    pub fn id(&self) -> PictureId {
        self.id
    }

    /// Number of recorded operations, used as the complexity measure for
    /// cache-eligibility heuristics.
    pub fn op_count(&self) -> usize {
        self.ops.len()
    }

    /// The rect outside which this picture draws nothing.
    pub fn cull_rect(&self) -> Rect {
        self.cull_rect
    }

    /// Replays the recorded operations onto `canvas`.
    pub fn playback(&self, canvas: &mut dyn Canvas) {
        self.playback_with_opacity(canvas, 1.0);
    }

    /// Replays with an extra `opacity` multiplied into every op's paint.
    ///
    /// This is how inherited group opacity reaches leaf content without an
    /// offscreen layer; see [`crate::layer::OpacityLayer`].
    pub fn playback_with_opacity(&self, canvas: &mut dyn Canvas, opacity: f32) {
        for op in &self.ops {
            if opacity >= 1.0 {
                match op {
                    DrawOp::Rect(rect, paint) => canvas.draw_rect(*rect, paint),
                    DrawOp::Path(path, paint) => canvas.draw_path(path, paint),
                }
            } else {
                match op {
                    DrawOp::Rect(rect, paint) => {
                        let mut paint = paint.clone();
                        paint.alpha *= opacity;
                        canvas.draw_rect(*rect, &paint);
                    }
                    DrawOp::Path(path, paint) => {
                        let mut paint = paint.clone();
                        paint.alpha *= opacity;
                        canvas.draw_path(path, &paint);
                    }
                }
            }
        }
    }

    /// Whether two pictures draw the same content.
    ///
    /// Three tiers, cheapest first: allocation identity, then op count and
    /// cull rect (bailing out entirely above a small op-count ceiling),
    /// then a full structural comparison of the recorded operations.
    pub fn same_content(a: &Arc<Self>, b: &Arc<Self>) -> bool {
        if Arc::ptr_eq(a, b) {
            return true;
        }
        if a.ops.len() != b.ops.len() || a.cull_rect != b.cull_rect {
            return false;
        }
        if a.ops.len() > THOROUGH_COMPARE_MAX_OPS {
            return false;
        }
        a.ops == b.ops
    }
}

impl std::fmt::Debug for Picture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Picture")
            .field("id", &self.id)
            .field("op_count", &self.ops.len())
            .field("cull_rect", &self.cull_rect)
            .finish()
    }
}

/// Records drawing operations into a [`Picture`].
#[derive(Default)]
pub struct PictureRecorder {
    ops: Vec<DrawOp>,
    bounds: Rect,
}

impl PictureRecorder {
    /// A fresh recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a filled rectangle.
    pub fn draw_rect(&mut self, rect: Rect, paint: Paint) {
        self.bounds = geometry::union(self.bounds, rect);
        self.ops.push(DrawOp::Rect(rect, paint));
    }

    /// Records a filled path.
    pub fn draw_path(&mut self, path: BezPath, paint: Paint) {
        self.bounds = geometry::union(self.bounds, path.bounding_box());
        self.ops.push(DrawOp::Path(path, paint));
    }

    /// Finishes recording. The cull rect defaults to the accumulated
    /// bounds of the recorded operations if not given explicitly.
    pub fn finish(self, cull_rect: Option<Rect>) -> Arc<Picture> {
        Arc::new(Picture {
            id: PictureId::next(),
            cull_rect: cull_rect.unwrap_or(self.bounds),
            ops: self.ops,
        })
    }
}
