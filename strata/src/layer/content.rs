// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Content layers: recorded pictures, image filters, backdrop filters and
//! shader masks.

use std::sync::Arc;

use peniko::kurbo::{Affine, Point, Rect, Vec2};
use peniko::{BlendMode, Brush};

use crate::canvas::{ImageFilter, Paint};
use crate::geometry;
use crate::picture::Picture;
use crate::raster_cache::{integral_transform, CacheId};

use super::{paint_children, preroll_children, Layer, LayerId, PaintContext, PrerollContext};

/// Leaf layer replaying a recorded [`Picture`].
pub struct PictureLayer {
    pub offset: Vec2,
    pub picture: Arc<Picture>,
    /// Producer hint that the content is expensive to replay, overriding
    /// the op-count cache heuristic.
    pub is_complex: bool,
    /// Producer hint that the content is about to change, suppressing
    /// caching entirely.
    pub will_change: bool,
}

impl PictureLayer {
    pub(super) fn preroll(&mut self, context: &mut PrerollContext<'_>, matrix: Affine) -> Rect {
        let bounds = self.picture.cull_rect() + self.offset;
        if geometry::intersects(bounds, context.cull_rect) {
            let ctm = matrix * Affine::translate(self.offset);
            let PrerollContext {
                raster_cache,
                rasterizer,
                ..
            } = context;
            if let (Some(cache), Some(rasterizer)) =
                (raster_cache.as_deref_mut(), rasterizer.as_deref_mut())
            {
                cache.prepare_picture(
                    rasterizer,
                    &self.picture,
                    ctm,
                    self.is_complex,
                    self.will_change,
                );
            }
        }
        bounds
    }

    pub(super) fn paint(&self, context: &mut PaintContext<'_>) {
        context.canvas.save();
        context.canvas.translate(self.offset.x, self.offset.y);
        // Snap to the same pixel grid the cached image (if any) was
        // rasterized on, so hits and misses land identically.
        let snapped = integral_transform(context.canvas.current_transform());
        context.canvas.set_transform(snapped);

        // A cached image was rasterized at full opacity; only use it when
        // no ancestor pushed a group opacity down to us.
        if context.inherited_opacity >= 1.0 {
            if let Some(cache) = context.raster_cache {
                if cache.draw_picture(self.picture.id(), snapped, context.canvas) {
                    context.canvas.restore();
                    return;
                }
            }
        }
        self.picture
            .playback_with_opacity(context.canvas, context.inherited_opacity);
        context.canvas.restore();
    }
}

/// Renders this many times before the filtered output itself is worth
/// caching; until then only the unfiltered children are cached, since an
/// animating filter would invalidate the filtered image every frame.
const MIN_RENDERS_BEFORE_CACHING_FILTER: usize = 3;

/// Applies an [`ImageFilter`] to the rasterized output of its children.
pub struct ImageFilterLayer {
    pub filter: ImageFilter,
    pub children: Vec<Layer>,
    /// Unfiltered bounds of the children, kept for the offscreen layer.
    pub(crate) child_paint_bounds: Rect,
    /// Times this layer has been prerolled with an unchanged filter.
    pub(crate) render_count: usize,
}

impl ImageFilterLayer {
    pub(super) fn preroll(
        &mut self,
        context: &mut PrerollContext<'_>,
        matrix: Affine,
        id: LayerId,
    ) -> Rect {
        let saved_platform_view = context.has_platform_view;
        let saved_texture = context.has_texture_layer;
        context.has_platform_view = false;
        context.has_texture_layer = false;

        let child_bounds = preroll_children(&mut self.children, context, matrix);
        self.child_paint_bounds = child_bounds;
        let bounds = self.filter.map_bounds(child_bounds);

        let subtree_platform_view = context.has_platform_view;
        let subtree_texture = context.has_texture_layer;
        if !subtree_platform_view
            && !subtree_texture
            && !geometry::is_empty(child_bounds)
            && geometry::intersects(bounds, context.cull_rect)
        {
            let PrerollContext {
                raster_cache,
                rasterizer,
                texture_registry,
                device_pixel_ratio,
                ..
            } = context;
            if let (Some(cache), Some(rasterizer)) =
                (raster_cache.as_deref_mut(), rasterizer.as_deref_mut())
            {
                let registry = &mut **texture_registry;
                let dpr = *device_pixel_ratio;
                if self.render_count >= MIN_RENDERS_BEFORE_CACHING_FILTER {
                    // Stable enough to cache the filtered output itself,
                    // skipping the filter entirely on a hit.
                    let layer = &*self;
                    cache.prepare_layer(
                        rasterizer,
                        CacheId::Layer(id),
                        matrix,
                        bounds,
                        &mut |canvas| {
                            let mut paint_context = PaintContext {
                                canvas,
                                raster_cache: None,
                                view_embedder: None,
                                texture_registry: &mut *registry,
                                inherited_opacity: 1.0,
                                device_pixel_ratio: dpr,
                            };
                            layer.paint_filtered(&mut paint_context);
                        },
                    );
                } else {
                    self.render_count += 1;
                    let children = &self.children;
                    cache.prepare_layer(
                        rasterizer,
                        CacheId::LayerChildren(id),
                        matrix,
                        child_bounds,
                        &mut |canvas| {
                            let mut paint_context = PaintContext {
                                canvas,
                                raster_cache: None,
                                view_embedder: None,
                                texture_registry: &mut *registry,
                                inherited_opacity: 1.0,
                                device_pixel_ratio: dpr,
                            };
                            paint_children(children, &mut paint_context);
                        },
                    );
                }
            }
        }

        context.has_platform_view = saved_platform_view || subtree_platform_view;
        context.has_texture_layer = saved_texture || subtree_texture;
        context.subtree_can_inherit_opacity = false;
        bounds
    }

    pub(super) fn paint(&self, context: &mut PaintContext<'_>, id: LayerId) {
        if let Some(cache) = context.raster_cache {
            let ctm = context.canvas.current_transform();
            // Best case: the filtered output itself was cached.
            if cache.draw_layer(CacheId::Layer(id), ctm, context.canvas, None) {
                return;
            }
            // The children were cached unfiltered; the filter moves onto
            // the blit when it can be rewritten for the device transform.
            if let Some(filter) = self.filter.with_local_matrix(ctm) {
                if cache.draw_layer(
                    CacheId::LayerChildren(id),
                    ctm,
                    context.canvas,
                    Some(&Paint::from_image_filter(filter)),
                ) {
                    return;
                }
            }
        }
        self.paint_filtered(context);
    }

    fn paint_filtered(&self, context: &mut PaintContext<'_>) {
        context.canvas.save_layer(
            self.child_paint_bounds,
            Some(&Paint::from_image_filter(self.filter.clone())),
        );
        paint_children(&self.children, context);
        context.canvas.restore();
    }
}

/// Filters everything already on the surface beneath this layer, then
/// paints its children on top.
pub struct BackdropFilterLayer {
    pub filter: ImageFilter,
    pub children: Vec<Layer>,
}

impl BackdropFilterLayer {
    pub(super) fn preroll(&mut self, context: &mut PrerollContext<'_>, matrix: Affine) -> Rect {
        // Reading back the surface forces the backend to resolve pending
        // work; the frame must know before any pixel is produced.
        context.surface_needs_readback = true;
        let child_bounds = preroll_children(&mut self.children, context, matrix);
        context.subtree_can_inherit_opacity = false;
        // The filter touches the whole visible region, not just the
        // children.
        geometry::union(context.cull_rect, child_bounds)
    }

    pub(super) fn paint(&self, context: &mut PaintContext<'_>, paint_bounds: Rect) {
        context
            .canvas
            .save_layer_with_backdrop(paint_bounds, None, &self.filter);
        paint_children(&self.children, context);
        context.canvas.restore();
    }
}

/// Masks its children by compositing a shader-filled rect over them.
pub struct ShaderMaskLayer {
    pub shader: Brush,
    pub mask_rect: Rect,
    pub blend: BlendMode,
    pub children: Vec<Layer>,
}

impl ShaderMaskLayer {
    pub(super) fn preroll(
        &mut self,
        context: &mut PrerollContext<'_>,
        matrix: Affine,
        id: LayerId,
    ) -> Rect {
        let saved_platform_view = context.has_platform_view;
        let saved_texture = context.has_texture_layer;
        context.has_platform_view = false;
        context.has_texture_layer = false;

        let bounds = preroll_children(&mut self.children, context, matrix);

        let subtree_platform_view = context.has_platform_view;
        let subtree_texture = context.has_texture_layer;
        if !subtree_platform_view
            && !subtree_texture
            && !geometry::is_empty(bounds)
            && geometry::intersects(bounds, context.cull_rect)
        {
            let PrerollContext {
                raster_cache,
                rasterizer,
                texture_registry,
                device_pixel_ratio,
                ..
            } = context;
            if let (Some(cache), Some(rasterizer)) =
                (raster_cache.as_deref_mut(), rasterizer.as_deref_mut())
            {
                let registry = &mut **texture_registry;
                let dpr = *device_pixel_ratio;
                // The mask is baked into the cached image, so a hit blits
                // the already-masked output.
                let layer = &*self;
                cache.prepare_layer(
                    rasterizer,
                    CacheId::Layer(id),
                    matrix,
                    bounds,
                    &mut |canvas| {
                        let mut paint_context = PaintContext {
                            canvas,
                            raster_cache: None,
                            view_embedder: None,
                            texture_registry: &mut *registry,
                            inherited_opacity: 1.0,
                            device_pixel_ratio: dpr,
                        };
                        layer.paint_masked(&mut paint_context, bounds);
                    },
                );
            }
        }

        context.has_platform_view = saved_platform_view || subtree_platform_view;
        context.has_texture_layer = saved_texture || subtree_texture;
        context.subtree_can_inherit_opacity = false;
        bounds
    }

    pub(super) fn paint(&self, context: &mut PaintContext<'_>, id: LayerId, paint_bounds: Rect) {
        if let Some(cache) = context.raster_cache {
            let ctm = context.canvas.current_transform();
            if cache.draw_layer(CacheId::Layer(id), ctm, context.canvas, None) {
                return;
            }
        }
        self.paint_masked(context, paint_bounds);
    }

    fn paint_masked(&self, context: &mut PaintContext<'_>, paint_bounds: Rect) {
        context.canvas.save_layer(paint_bounds, None);
        paint_children(&self.children, context);

        let mask_paint = Paint {
            brush: self.shader.clone(),
            blend: self.blend,
            ..Paint::default()
        };
        context
            .canvas
            .translate(self.mask_rect.x0, self.mask_rect.y0);
        context.canvas.draw_rect(
            Rect::from_origin_size(Point::ORIGIN, self.mask_rect.size()),
            &mask_paint,
        );
        context.canvas.restore();
    }
}
