// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Empty-aware rectangle helpers.
//!
//! [`Rect`] has no dedicated empty value; `Rect::ZERO` unioned with
//! another rect would incorrectly drag the result towards the origin. The
//! helpers here treat any rect without positive area as "nothing" so that
//! bounds aggregation over child layers behaves like the usual join/meet
//! on paint regions.

use peniko::kurbo::{Affine, Rect};

/// A rect large enough to stand in for "unbounded" when a cull rect cannot
/// be mapped through a non-invertible transform.
pub const GIANT_RECT: Rect = Rect::new(-1e9, -1e9, 1e9, 1e9);

/// Whether `rect` covers no pixels.
#[inline]
pub fn is_empty(rect: Rect) -> bool {
    rect.width() <= 0.0 || rect.height() <= 0.0
}

/// Union of two paint regions, where an empty rect contributes nothing.
pub fn union(a: Rect, b: Rect) -> Rect {
    if is_empty(a) {
        b
    } else if is_empty(b) {
        a
    } else {
        a.union(b)
    }
}

/// Intersection of two paint regions; empty inputs produce `Rect::ZERO`.
pub fn intersect(a: Rect, b: Rect) -> Rect {
    if is_empty(a) || is_empty(b) {
        return Rect::ZERO;
    }
    let r = a.intersect(b);
    if is_empty(r) {
        Rect::ZERO
    } else {
        r
    }
}

/// Whether two paint regions overlap; empty rects overlap nothing.
#[inline]
pub fn intersects(a: Rect, b: Rect) -> bool {
    !is_empty(intersect(a, b))
}

/// Maps a paint region through a transform, preserving emptiness.
pub fn transform(affine: Affine, rect: Rect) -> Rect {
    if is_empty(rect) {
        Rect::ZERO
    } else {
        affine.transform_rect_bbox(rect)
    }
}
