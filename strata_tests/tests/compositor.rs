// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! End-to-end raster passes through a [`CompositorContext`].

use strata::embedder::{ExternalTexture, Mutator, TextureId, ViewId};
use strata::kurbo::{Affine, Point, Rect, Size, Vec2};
use strata::peniko::{BlendMode, Brush, Color};
use strata::{
    Canvas, CanvasCall, ClipMode, ClipShape, CompositorContext, Layer, LayerId, Paint,
    RasterCacheConfig, RecordingCanvas,
};
use strata_tests::{complex_picture, solid_picture, tree, CountingRasterizer, RecordingEmbedder};

fn blit_count(canvas: &RecordingCanvas) -> usize {
    canvas
        .calls()
        .iter()
        .filter(|c| matches!(c, CanvasCall::DrawCacheImage { .. }))
        .count()
}

#[test]
fn complex_content_migrates_into_the_cache() {
    let mut context = CompositorContext::default();
    let mut rasterizer = CountingRasterizer::default();
    let mut scene = tree(Layer::container(vec![
        Layer::picture(Vec2::ZERO, complex_picture((0.0, 0.0)), false, false),
        // Too simple to ever be cached.
        Layer::picture(Vec2::ZERO, solid_picture(Rect::new(50.0, 50.0, 60.0, 60.0), Color::BLUE), false, false),
    ]));

    let threshold = RasterCacheConfig::default().access_threshold;
    for frame in 0..threshold {
        let mut canvas = RecordingCanvas::new();
        let mut scoped = context.acquire_frame(&mut canvas, Some(&mut rasterizer), None, false);
        scoped.raster(&mut scene);
        drop(scoped);
        if frame < threshold - 1 {
            assert_eq!(blit_count(&canvas), 0, "frame {frame} should paint directly");
            assert_eq!(canvas.draw_count(), 9);
        } else {
            assert_eq!(blit_count(&canvas), 1, "frame {frame} should blit the cache");
            // The simple picture still paints directly.
            assert_eq!(canvas.draw_count(), 2);
        }
    }
    assert_eq!(rasterizer.rasterized, 1);
    assert_eq!(context.raster_cache().image_count(), 1);
}

#[test]
fn moving_content_misses_the_cache() {
    let mut context = CompositorContext::default();
    let mut rasterizer = CountingRasterizer::default();
    let picture = complex_picture((0.0, 0.0));

    // Same picture, new whole-pixel position every frame: the transform
    // key never repeats, so nothing reaches the access threshold.
    for frame in 0..6 {
        let mut scene = tree(Layer::transform(
            Affine::translate((frame as f64, 0.0)),
            vec![Layer::picture(Vec2::ZERO, picture.clone(), false, false)],
        ));
        let mut canvas = RecordingCanvas::new();
        let mut scoped = context.acquire_frame(&mut canvas, Some(&mut rasterizer), None, false);
        scoped.raster(&mut scene);
        drop(scoped);
        assert_eq!(blit_count(&canvas), 0);
    }
    assert_eq!(rasterizer.rasterized, 0);
}

#[test]
fn cached_opacity_children_blit_with_alpha() {
    let mut context = CompositorContext::default();
    let mut rasterizer = CountingRasterizer::default();
    // Two overlapping children force the offscreen opacity path, which is
    // what the children cache accelerates.
    let mut scene = tree(Layer::opacity(
        0.5,
        Vec2::ZERO,
        vec![
            Layer::picture(Vec2::ZERO, solid_picture(Rect::new(0.0, 0.0, 20.0, 20.0), Color::RED), false, false),
            Layer::picture(Vec2::ZERO, solid_picture(Rect::new(10.0, 10.0, 30.0, 30.0), Color::BLUE), false, false),
        ],
    ));

    let threshold = RasterCacheConfig::default().access_threshold;
    let mut last = RecordingCanvas::new();
    for _ in 0..threshold {
        let mut canvas = RecordingCanvas::new();
        let mut scoped = context.acquire_frame(&mut canvas, Some(&mut rasterizer), None, false);
        scoped.raster(&mut scene);
        drop(scoped);
        last = canvas;
    }
    let alpha_blit = last.calls().iter().any(|c| {
        matches!(
            c,
            CanvasCall::DrawCacheImage {
                paint: Some(paint),
                ..
            } if paint.alpha == 0.5
        )
    });
    assert!(alpha_blit, "expected the cached children blitted through an alpha paint");
    assert!(!last
        .calls()
        .iter()
        .any(|c| matches!(c, CanvasCall::SaveLayer { .. })));
}

#[test]
fn filter_layers_graduate_to_caching_their_filtered_output() {
    let mut context = CompositorContext::default();
    let mut rasterizer = CountingRasterizer::default();
    let mut scene = tree(Layer::image_filter(
        strata::ImageFilter::Blur {
            sigma_x: 2.0,
            sigma_y: 2.0,
        },
        vec![Layer::picture(
            Vec2::ZERO,
            solid_picture(Rect::new(10.0, 10.0, 30.0, 30.0), Color::RED),
            false,
            false,
        )],
    ));

    let mut frames = Vec::new();
    for _ in 0..6 {
        let mut canvas = RecordingCanvas::new();
        let mut scoped = context.acquire_frame(&mut canvas, Some(&mut rasterizer), None, false);
        scoped.raster(&mut scene);
        drop(scoped);
        frames.push(canvas);
    }

    // Early frames cache the unfiltered children and blit them through the
    // filter; once the layer has rendered enough times the filtered output
    // itself is cached and blits with no filter at all.
    let filtered_blit = frames[2].calls().iter().any(|c| {
        matches!(
            c,
            CanvasCall::DrawCacheImage {
                paint: Some(paint),
                ..
            } if paint.image_filter.is_some()
        )
    });
    assert!(filtered_blit, "expected the children blitted through the filter");
    let plain_blit = frames[5]
        .calls()
        .iter()
        .any(|c| matches!(c, CanvasCall::DrawCacheImage { paint: None, .. }));
    assert!(plain_blit, "expected the filtered output blitted directly");
    assert!(!frames[5]
        .calls()
        .iter()
        .any(|c| matches!(c, CanvasCall::SaveLayer { .. })));
    // One rasterization for the children, one for the filtered layer.
    assert_eq!(rasterizer.rasterized, 2);
}

#[test]
fn shader_masks_cache_their_masked_output() {
    let mut context = CompositorContext::default();
    let mut rasterizer = CountingRasterizer::default();
    let mut scene = tree(Layer::shader_mask(
        Brush::Solid(Color::BLUE),
        Rect::new(0.0, 0.0, 20.0, 20.0),
        BlendMode::default(),
        vec![Layer::picture(
            Vec2::ZERO,
            solid_picture(Rect::new(0.0, 0.0, 20.0, 20.0), Color::RED),
            false,
            false,
        )],
    ));

    let threshold = RasterCacheConfig::default().access_threshold;
    let mut last = RecordingCanvas::new();
    for _ in 0..threshold {
        let mut canvas = RecordingCanvas::new();
        let mut scoped = context.acquire_frame(&mut canvas, Some(&mut rasterizer), None, false);
        scoped.raster(&mut scene);
        drop(scoped);
        last = canvas;
    }
    // The mask is baked into the cached image, so the hit is a plain blit
    // with no offscreen pass.
    assert_eq!(rasterizer.rasterized, 1);
    assert_eq!(blit_count(&last), 1);
    assert!(!last
        .calls()
        .iter()
        .any(|c| matches!(c, CanvasCall::SaveLayer { .. })));
}

#[test]
fn retained_ids_carry_cache_identity_across_rebuilt_trees() {
    let mut context = CompositorContext::default();
    let mut rasterizer = CountingRasterizer::default();
    let group_id = LayerId::next();
    let front = solid_picture(Rect::new(0.0, 0.0, 20.0, 20.0), Color::RED);
    let back = solid_picture(Rect::new(10.0, 10.0, 30.0, 30.0), Color::BLUE);

    let threshold = RasterCacheConfig::default().access_threshold;
    let mut last = RecordingCanvas::new();
    for _ in 0..threshold {
        // A fresh tree every frame, the way a producer builds one; only
        // the retained id connects this frame's group to the last.
        let mut scene = tree(
            Layer::opacity(
                0.5,
                Vec2::ZERO,
                vec![
                    Layer::picture(Vec2::ZERO, front.clone(), false, false),
                    Layer::picture(Vec2::ZERO, back.clone(), false, false),
                ],
            )
            .with_id(group_id),
        );
        let mut canvas = RecordingCanvas::new();
        let mut scoped = context.acquire_frame(&mut canvas, Some(&mut rasterizer), None, false);
        scoped.raster(&mut scene);
        drop(scoped);
        last = canvas;
    }
    assert_eq!(rasterizer.rasterized, 1);
    let alpha_blit = last.calls().iter().any(|c| {
        matches!(
            c,
            CanvasCall::DrawCacheImage {
                paint: Some(paint),
                ..
            } if paint.alpha == 0.5
        )
    });
    assert!(alpha_blit, "expected the rebuilt group to hit the cache");
}

#[test]
fn platform_views_route_through_the_embedder() {
    let mut context = CompositorContext::default();
    let mut embedder = RecordingEmbedder::default();
    let view = Layer::platform_view(Point::new(10.0, 10.0), Size::new(30.0, 30.0), ViewId(5));
    let mut scene = tree(Layer::clip(
        ClipShape::Rect(Rect::new(0.0, 0.0, 50.0, 50.0)),
        ClipMode::HardEdge,
        vec![view],
    ));

    let mut canvas = RecordingCanvas::new();
    let mut scoped = context.acquire_frame(&mut canvas, None, Some(&mut embedder), false);
    scoped.raster(&mut scene);
    drop(scoped);

    assert_eq!(embedder.composited, vec![ViewId(5)]);
    let (view_id, params) = &embedder.prerolled[0];
    assert_eq!(*view_id, ViewId(5));
    // Root dpr is 1.0, so pixels equal logical units here.
    assert_eq!(params.offset_pixels, Point::new(10.0, 10.0));
    assert!(params
        .mutators
        .iter()
        .any(|m| matches!(m, Mutator::Clip(_))));
}

struct SolidTexture;

impl ExternalTexture for SolidTexture {
    fn paint(&mut self, canvas: &mut dyn Canvas, bounds: Rect, _freeze: bool) {
        canvas.draw_rect(bounds, &Paint::from_color(Color::BLUE));
    }
}

#[test]
fn textures_resolve_through_the_context_registry() {
    let mut context = CompositorContext::default();
    context
        .texture_registry()
        .register(TextureId(2), Box::new(SolidTexture));
    let mut scene = tree(Layer::texture(
        Point::new(5.0, 5.0),
        Size::new(20.0, 20.0),
        TextureId(2),
        false,
    ));

    let mut canvas = RecordingCanvas::new();
    let mut scoped = context.acquire_frame(&mut canvas, None, None, false);
    scoped.raster(&mut scene);
    drop(scoped);
    assert_eq!(canvas.draw_count(), 1);

    // Unregister and raster again: the stale reference is skipped.
    context.texture_registry().unregister(TextureId(2));
    let mut canvas = RecordingCanvas::new();
    let mut scoped = context.acquire_frame(&mut canvas, None, None, false);
    scoped.raster(&mut scene);
    drop(scoped);
    assert_eq!(canvas.draw_count(), 0);
}

#[test]
fn backdrop_filter_marks_the_tree_for_readback() {
    let mut context = CompositorContext::default();
    let mut scene = tree(Layer::backdrop_filter(
        strata::ImageFilter::Blur {
            sigma_x: 2.0,
            sigma_y: 2.0,
        },
        vec![Layer::picture(
            Vec2::ZERO,
            solid_picture(Rect::new(0.0, 0.0, 10.0, 10.0), Color::RED),
            false,
            false,
        )],
    ));
    let mut canvas = RecordingCanvas::new();
    let mut scoped = context.acquire_frame(&mut canvas, None, None, false);
    scoped.raster(&mut scene);
    drop(scoped);
    assert!(scene.surface_needs_readback());
}
