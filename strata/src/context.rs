// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-surface state that outlives individual frames.
//!
//! A [`CompositorContext`] owns the raster cache and the texture registry
//! for one render surface. Rasterizing a tree happens inside an
//! [`ScopedFrame`] acquired from the context; the frame brackets the
//! cache's begin/end hooks so eviction runs exactly once per frame no
//! matter how the raster loop is structured.

use peniko::kurbo::Rect;

use crate::canvas::Canvas;
use crate::embedder::{MutatorStack, TextureRegistry, ViewEmbedder};
use crate::layer::{PaintContext, PrerollContext};
use crate::raster_cache::{RasterCache, RasterCacheConfig, Rasterizer};
use crate::tree::LayerTree;

/// Long-lived compositor state for one surface.
pub struct CompositorContext {
    raster_cache: RasterCache,
    texture_registry: TextureRegistry,
    frame_count: u64,
}

impl Default for CompositorContext {
    fn default() -> Self {
        Self::new(RasterCacheConfig::default())
    }
}

impl CompositorContext {
    pub fn new(cache_config: RasterCacheConfig) -> Self {
        Self {
            raster_cache: RasterCache::new(cache_config),
            texture_registry: TextureRegistry::new(),
            frame_count: 0,
        }
    }

    pub fn raster_cache(&self) -> &RasterCache {
        &self.raster_cache
    }

    pub fn texture_registry(&mut self) -> &mut TextureRegistry {
        &mut self.texture_registry
    }

    /// Frames rastered so far.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Begins a frame. The returned guard must outlive all raster work for
    /// the frame; dropping it runs cache eviction.
    pub fn acquire_frame<'a>(
        &'a mut self,
        canvas: &'a mut dyn Canvas,
        rasterizer: Option<&'a mut dyn Rasterizer>,
        view_embedder: Option<&'a mut dyn ViewEmbedder>,
        ignore_raster_cache: bool,
    ) -> ScopedFrame<'a> {
        self.raster_cache.begin_frame();
        self.frame_count += 1;
        ScopedFrame {
            context: self,
            canvas,
            rasterizer,
            view_embedder,
            ignore_raster_cache,
        }
    }
}

/// One frame's raster pass over a layer tree.
pub struct ScopedFrame<'a> {
    context: &'a mut CompositorContext,
    canvas: &'a mut dyn Canvas,
    rasterizer: Option<&'a mut dyn Rasterizer>,
    view_embedder: Option<&'a mut dyn ViewEmbedder>,
    /// Diagnostics switch: preroll still runs but nothing is cached or
    /// blitted from cache.
    ignore_raster_cache: bool,
}

impl ScopedFrame<'_> {
    /// Prerolls and paints `tree` onto the frame's canvas.
    pub fn raster(&mut self, tree: &mut LayerTree) {
        let use_cache = !self.ignore_raster_cache && self.rasterizer.is_some();
        {
            // Reborrow the trait objects at the call lifetime; handing the
            // `'a`-pinned references straight to the context would hold
            // them past the preroll pass.
            let rasterizer = match self.rasterizer.as_deref_mut() {
                Some(rasterizer) => Some(rasterizer as &mut dyn Rasterizer),
                None => None,
            };
            let view_embedder = match self.view_embedder.as_deref_mut() {
                Some(embedder) => Some(embedder as &mut dyn ViewEmbedder),
                None => None,
            };
            let mut preroll_context = PrerollContext {
                raster_cache: use_cache.then_some(&mut self.context.raster_cache),
                rasterizer,
                view_embedder,
                texture_registry: &mut self.context.texture_registry,
                mutators: MutatorStack::new(),
                cull_rect: Rect::ZERO,
                surface_needs_readback: false,
                has_platform_view: false,
                has_texture_layer: false,
                subtree_can_inherit_opacity: true,
                device_pixel_ratio: tree.device_pixel_ratio(),
            };
            tree.preroll(&mut preroll_context);
        }

        let view_embedder = match self.view_embedder.as_deref_mut() {
            Some(embedder) => Some(embedder as &mut dyn ViewEmbedder),
            None => None,
        };
        let mut paint_context = PaintContext {
            canvas: &mut *self.canvas,
            raster_cache: (!self.ignore_raster_cache).then_some(&self.context.raster_cache),
            view_embedder,
            texture_registry: &mut self.context.texture_registry,
            inherited_opacity: 1.0,
            device_pixel_ratio: tree.device_pixel_ratio(),
        };
        tree.paint(&mut paint_context);
    }
}

impl Drop for ScopedFrame<'_> {
    fn drop(&mut self) {
        self.context.raster_cache.end_frame();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::{CacheImage, CanvasCall, ImageId, Paint, RecordingCanvas};
    use crate::embedder::{EmbeddedViewParams, ViewId};
    use crate::layer::Layer;
    use crate::picture::PictureRecorder;
    use peniko::kurbo::{Point, Size, Vec2};
    use peniko::Color;

    struct CountingRasterizer {
        rasterized: usize,
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

    fn complex_tree() -> LayerTree {
        let mut rec = PictureRecorder::new();
        for i in 0..8 {
            rec.draw_rect(
                Rect::new(0.0, 0.0, 10.0 + i as f64, 10.0),
                Paint::from_color(Color::RED),
            );
        }
        let root = Layer::picture(Vec2::ZERO, rec.finish(None), false, false);
        LayerTree::new(root, Size::new(100.0, 100.0), 1.0)
    }

    #[test]
    fn repeated_frames_hit_the_cache() {
        let mut context = CompositorContext::default();
        let mut rasterizer = CountingRasterizer { rasterized: 0 };
        let mut tree = complex_tree();

        let threshold = RasterCacheConfig::default().access_threshold;
        let mut hit_frame = None;
        for frame in 0..threshold + 1 {
            let mut canvas = RecordingCanvas::new();
            let mut scoped =
                context.acquire_frame(&mut canvas, Some(&mut rasterizer), None, false);
            scoped.raster(&mut tree);
            drop(scoped);
            let blitted = canvas
                .calls()
                .iter()
                .any(|c| matches!(c, CanvasCall::DrawCacheImage { .. }));
            if blitted && hit_frame.is_none() {
                hit_frame = Some(frame);
            }
        }
        assert_eq!(rasterizer.rasterized, 1);
        // Third encounter rasterizes and blits in the same frame.
        assert_eq!(hit_frame, Some(threshold - 1));
        assert_eq!(context.frame_count(), (threshold + 1) as u64);
    }

    #[derive(Default)]
    struct NullEmbedder {
        prerolled: usize,
        composited: usize,
    }

    impl ViewEmbedder for NullEmbedder {
        fn preroll_composite_view(&mut self, _view_id: ViewId, _params: EmbeddedViewParams) {
            self.prerolled += 1;
        }

        fn composite_view(&mut self, _view_id: ViewId) -> Option<&mut dyn Canvas> {
            self.composited += 1;
            None
        }
    }

    #[test]
    fn rasterizer_and_embedder_share_one_frame() {
        let mut context = CompositorContext::default();
        let mut rasterizer = CountingRasterizer { rasterized: 0 };
        let mut embedder = NullEmbedder::default();

        let mut rec = PictureRecorder::new();
        for i in 0..8 {
            rec.draw_rect(
                Rect::new(0.0, 0.0, 10.0 + i as f64, 10.0),
                Paint::from_color(Color::RED),
            );
        }
        let mut tree = LayerTree::new(
            Layer::container(vec![
                Layer::picture(Vec2::ZERO, rec.finish(None), false, false),
                Layer::platform_view(Point::new(50.0, 50.0), Size::new(10.0, 10.0), ViewId(1)),
            ]),
            Size::new(100.0, 100.0),
            1.0,
        );

        let threshold = RasterCacheConfig::default().access_threshold;
        for _ in 0..threshold {
            let mut canvas = RecordingCanvas::new();
            let mut scoped =
                context.acquire_frame(&mut canvas, Some(&mut rasterizer), Some(&mut embedder), false);
            scoped.raster(&mut tree);
        }
        // Both sides saw every frame: the embedder through preroll and
        // paint, the rasterizer once the picture crossed the threshold.
        assert_eq!(embedder.prerolled, threshold);
        assert_eq!(embedder.composited, threshold);
        assert_eq!(rasterizer.rasterized, 1);
    }

    #[test]
    fn ignore_raster_cache_paints_directly() {
        let mut context = CompositorContext::default();
        let mut rasterizer = CountingRasterizer { rasterized: 0 };
        let mut tree = complex_tree();
        for _ in 0..4 {
            let mut canvas = RecordingCanvas::new();
            let mut scoped =
                context.acquire_frame(&mut canvas, Some(&mut rasterizer), None, true);
            scoped.raster(&mut tree);
            drop(scoped);
            assert_eq!(canvas.draw_count(), 8);
        }
        assert_eq!(rasterizer.rasterized, 0);
        assert_eq!(context.raster_cache().entry_count(), 0);
    }

    #[test]
    fn dropping_the_frame_sweeps_stale_entries() {
        let mut context = CompositorContext::default();
        let mut rasterizer = CountingRasterizer { rasterized: 0 };
        let mut tree = complex_tree();
        for _ in 0..3 {
            let mut canvas = RecordingCanvas::new();
            let mut scoped =
                context.acquire_frame(&mut canvas, Some(&mut rasterizer), None, false);
            scoped.raster(&mut tree);
        }
        assert_eq!(context.raster_cache().image_count(), 1);

        // Two frames of an unrelated tree: the old entry goes stale and is
        // evicted.
        let mut other = complex_tree();
        for _ in 0..2 {
            let mut canvas = RecordingCanvas::new();
            let mut scoped =
                context.acquire_frame(&mut canvas, Some(&mut rasterizer), None, false);
            scoped.raster(&mut other);
        }
        assert!(context
            .raster_cache()
            .entry_count()
            <= 1);
    }
}
