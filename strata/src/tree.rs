// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A whole frame's scene: the layer tree plus the surface geometry it was
//! built for.

use peniko::kurbo::{Affine, Rect, Size};
use static_assertions::assert_impl_all;

use crate::layer::{Layer, PaintContext, PrerollContext};

/// The root of one frame's retained scene.
///
/// Built by the producer, handed across the pipeline to the raster
/// context, prerolled exactly once and painted once per presentation of
/// the frame. Prerolling is the tree's own responsibility so that derived
/// state (paint bounds, cull decisions, cache warmth) can never be
/// observed half-initialized.
pub struct LayerTree {
    root: Layer,
    /// Surface size in logical units.
    frame_size: Size,
    device_pixel_ratio: f64,
    prerolled: bool,
    surface_needs_readback: bool,
}

assert_impl_all!(LayerTree: Send);

impl LayerTree {
    pub fn new(root: Layer, frame_size: Size, device_pixel_ratio: f64) -> Self {
        Self {
            root,
            frame_size,
            device_pixel_ratio,
            prerolled: false,
            surface_needs_readback: false,
        }
    }

    pub fn root(&self) -> &Layer {
        &self.root
    }

    /// Surface size in logical units.
    pub fn frame_size(&self) -> Size {
        self.frame_size
    }

    pub fn device_pixel_ratio(&self) -> f64 {
        self.device_pixel_ratio
    }

    /// Whether preroll has run.
    pub fn is_prerolled(&self) -> bool {
        self.prerolled
    }

    /// Whether any layer in the tree samples the surface beneath it.
    /// Valid after preroll.
    pub fn surface_needs_readback(&self) -> bool {
        self.surface_needs_readback
    }

    /// Root transform mapping logical units to device pixels.
    pub fn root_transform(&self) -> Affine {
        Affine::scale(self.device_pixel_ratio)
    }

    /// First pass over the tree. `context.cull_rect` is overwritten with
    /// the frame's viewport; the other context fields are honored as the
    /// caller set them up.
    pub fn preroll(&mut self, context: &mut PrerollContext<'_>) {
        context.cull_rect = Rect::from_origin_size((0.0, 0.0), self.frame_size);
        context.device_pixel_ratio = self.device_pixel_ratio;
        self.root.preroll(context, self.root_transform());
        self.surface_needs_readback = context.surface_needs_readback;
        self.prerolled = true;
        log::trace!(
            "prerolled {:?} tree, root bounds {:?}",
            self.frame_size,
            self.root.paint_bounds()
        );
    }

    /// Second pass: replays the tree onto the context canvas.
    ///
    /// # Panics
    ///
    /// Panics if the tree has not been prerolled; painting would read
    /// uninitialized bounds and silently skip every layer.
    pub fn paint(&self, context: &mut PaintContext<'_>) {
        assert!(self.prerolled, "layer tree painted before preroll");
        context.canvas.save();
        context.canvas.transform(self.root_transform());
        self.root.paint(context);
        context.canvas.restore();
    }
}
