// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Shared helpers for Strata's integration tests.

// LINEBENDER LINT SET - lib.rs - v2
// See https://linebender.org/wiki/canonical-lints/
// These lints aren't included in Cargo.toml because they
// shouldn't apply to examples and tests
#![warn(unused_crate_dependencies)]
#![warn(clippy::print_stdout, clippy::print_stderr)]
// Targeting e.g. 32-bit means structs containing usize can give false positives for 64-bit.
#![cfg_attr(target_pointer_width = "64", warn(clippy::trivially_copy_pass_by_ref))]
// END LINEBENDER LINT SET

use std::sync::Arc;

use strata::embedder::{EmbeddedViewParams, ViewEmbedder, ViewId};
use strata::kurbo::{Rect, Size};
use strata::peniko::Color;
use strata::{
    CacheImage, Canvas, ImageId, Layer, LayerTree, Paint, Picture, PictureRecorder,
    RecordingCanvas, Rasterizer,
};

// Used by the integration tests under tests/, which compile separately.
use anyhow as _;

/// A [`Rasterizer`] that mints images without a GPU and counts how often
/// it is asked to rasterize.
#[derive(Default)]
pub struct CountingRasterizer {
    pub rasterized: usize,
}

impl Rasterizer for CountingRasterizer {
    fn rasterize(
        &mut self,
        device_bounds: Rect,
        paint: &mut dyn FnMut(&mut dyn Canvas),
    ) -> Option<CacheImage> {
        self.rasterized += 1;
        let mut canvas = RecordingCanvas::new();
        paint(&mut canvas);
        Some(CacheImage {
            id: ImageId::next(),
            device_bounds,
        })
    }
}

/// A [`ViewEmbedder`] that records every call it receives.
#[derive(Default)]
pub struct RecordingEmbedder {
    pub prerolled: Vec<(ViewId, EmbeddedViewParams)>,
    pub composited: Vec<ViewId>,
    overlay: RecordingCanvas,
}

impl ViewEmbedder for RecordingEmbedder {
    fn preroll_composite_view(&mut self, view_id: ViewId, params: EmbeddedViewParams) {
        self.prerolled.push((view_id, params));
    }

    fn composite_view(&mut self, view_id: ViewId) -> Option<&mut dyn Canvas> {
        self.composited.push(view_id);
        Some(&mut self.overlay)
    }
}

/// A picture with a single solid rect.
pub fn solid_picture(rect: Rect, color: Color) -> Arc<Picture> {
    let mut recorder = PictureRecorder::new();
    recorder.draw_rect(rect, Paint::from_color(color));
    recorder.finish(None)
}

/// A picture with enough ops to pass the raster cache's complexity
/// heuristic without an explicit hint.
pub fn complex_picture(origin: (f64, f64)) -> Arc<Picture> {
    let mut recorder = PictureRecorder::new();
    for i in 0..8 {
        recorder.draw_rect(
            Rect::new(
                origin.0,
                origin.1,
                origin.0 + 10.0 + i as f64,
                origin.1 + 10.0,
            ),
            Paint::from_color(Color::RED),
        );
    }
    recorder.finish(None)
}

/// A 100x100 logical tree at 1.0 dpr around `root`.
pub fn tree(root: Layer) -> LayerTree {
    LayerTree::new(root, Size::new(100.0, 100.0), 1.0)
}
