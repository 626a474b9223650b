// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Structural layers: grouping, transform, group opacity and clips.

use peniko::kurbo::{Affine, Rect, Vec2};

use crate::canvas::{ClipMode, ClipShape, Paint};
use crate::geometry;
use crate::raster_cache::CacheId;

use super::{paint_children, preroll_children, Layer, LayerId, PaintContext, PrerollContext};

/// Plain grouping node with no effect of its own.
pub struct ContainerLayer {
    pub children: Vec<Layer>,
}

impl ContainerLayer {
    pub(super) fn preroll(&mut self, context: &mut PrerollContext<'_>, matrix: Affine) -> Rect {
        let bounds = preroll_children(&mut self.children, context, matrix);
        // Overlapping siblings double-blend if a group opacity is pushed
        // into their individual paints; only single-child groups pass an
        // inherited opacity through.
        if self.children.iter().filter(|c| c.needs_painting()).count() > 1 {
            context.subtree_can_inherit_opacity = false;
        }
        bounds
    }

    pub(super) fn paint(&self, context: &mut PaintContext<'_>) {
        paint_children(&self.children, context);
    }
}

/// Applies an affine transform to its children.
pub struct TransformLayer {
    pub transform: Affine,
    pub children: Vec<Layer>,
}

impl TransformLayer {
    pub(super) fn preroll(&mut self, context: &mut PrerollContext<'_>, matrix: Affine) -> Rect {
        let child_matrix = matrix * self.transform;
        context.mutators.push_transform(self.transform);
        let saved_cull = context.cull_rect;
        // A singular transform cannot map the cull rect into child space;
        // give up on culling rather than wrongly prune the subtree.
        context.cull_rect = if self.transform.determinant().abs() < 1e-12 {
            geometry::GIANT_RECT
        } else {
            geometry::transform(self.transform.inverse(), saved_cull)
        };
        let child_bounds = preroll_children(&mut self.children, context, child_matrix);
        context.cull_rect = saved_cull;
        context.mutators.pop();
        geometry::transform(self.transform, child_bounds)
    }

    pub(super) fn paint(&self, context: &mut PaintContext<'_>) {
        context.canvas.save();
        context.canvas.transform(self.transform);
        paint_children(&self.children, context);
        context.canvas.restore();
    }
}

/// Applies group opacity to its children, plus an offset so a moving
/// fade does not invalidate the cached children.
pub struct OpacityLayer {
    /// Group opacity in `0.0..=1.0`.
    pub alpha: f32,
    pub offset: Vec2,
    pub children: Vec<Layer>,
    /// Decided during preroll: when set, paint pushes the opacity into the
    /// children's own paints and skips the offscreen compositing pass.
    pub(crate) children_can_accept_opacity: bool,
}

impl OpacityLayer {
    pub(super) fn preroll(
        &mut self,
        context: &mut PrerollContext<'_>,
        matrix: Affine,
        id: LayerId,
    ) -> Rect {
        let offset = Affine::translate(self.offset);
        let child_matrix = matrix * offset;
        context.mutators.push_transform(offset);
        context.mutators.push_opacity(self.alpha);

        let saved_cull = context.cull_rect;
        context.cull_rect = geometry::transform(Affine::translate(-self.offset), saved_cull);
        let saved_platform_view = context.has_platform_view;
        let saved_texture = context.has_texture_layer;
        context.has_platform_view = false;
        context.has_texture_layer = false;
        context.subtree_can_inherit_opacity = true;

        let child_bounds = preroll_children(&mut self.children, context, child_matrix);
        if self.children.iter().filter(|c| c.needs_painting()).count() > 1 {
            context.subtree_can_inherit_opacity = false;
        }
        self.children_can_accept_opacity = context.subtree_can_inherit_opacity;

        let subtree_platform_view = context.has_platform_view;
        let subtree_texture = context.has_texture_layer;
        if !self.children_can_accept_opacity
            && !subtree_platform_view
            && !subtree_texture
            && !geometry::is_empty(child_bounds)
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
                let children = &self.children;
                let dpr = *device_pixel_ratio;
                cache.prepare_layer(
                    rasterizer,
                    CacheId::LayerChildren(id),
                    child_matrix,
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

        context.has_platform_view = saved_platform_view || subtree_platform_view;
        context.has_texture_layer = saved_texture || subtree_texture;
        context.cull_rect = saved_cull;
        // A nested opacity group still needs its own compositing pass;
        // don't let an outer group bypass this one.
        context.subtree_can_inherit_opacity = false;
        context.mutators.pop();
        context.mutators.pop();

        child_bounds + self.offset
    }

    pub(super) fn paint(&self, context: &mut PaintContext<'_>, id: LayerId, paint_bounds: Rect) {
        let opacity = self.alpha.clamp(0.0, 1.0) * context.inherited_opacity;
        if opacity <= 0.0 {
            return;
        }
        context.canvas.save();
        context.canvas.translate(self.offset.x, self.offset.y);

        if self.children_can_accept_opacity {
            let saved = context.inherited_opacity;
            context.inherited_opacity = opacity;
            paint_children(&self.children, context);
            context.inherited_opacity = saved;
            context.canvas.restore();
            return;
        }

        let alpha_paint = Paint::from_alpha(opacity);
        if let Some(cache) = context.raster_cache {
            let ctm = context.canvas.current_transform();
            if cache.draw_layer(
                CacheId::LayerChildren(id),
                ctm,
                context.canvas,
                Some(&alpha_paint),
            ) {
                context.canvas.restore();
                return;
            }
        }

        context
            .canvas
            .save_layer(paint_bounds - self.offset, Some(&alpha_paint));
        let saved = context.inherited_opacity;
        context.inherited_opacity = 1.0;
        paint_children(&self.children, context);
        context.inherited_opacity = saved;
        context.canvas.restore();
        context.canvas.restore();
    }
}

/// Clips its children to a shape.
pub struct ClipLayer {
    pub shape: ClipShape,
    pub mode: ClipMode,
    pub children: Vec<Layer>,
}

impl ClipLayer {
    pub(super) fn preroll(&mut self, context: &mut PrerollContext<'_>, matrix: Affine) -> Rect {
        if matches!(self.mode, ClipMode::None) {
            return preroll_children(&mut self.children, context, matrix);
        }
        let clip_bounds = self.shape.bounds();
        context.mutators.push_clip(self.shape.clone());
        let saved_cull = context.cull_rect;
        context.cull_rect = geometry::intersect(saved_cull, clip_bounds);
        let child_bounds = preroll_children(&mut self.children, context, matrix);
        context.cull_rect = saved_cull;
        context.mutators.pop();
        context.subtree_can_inherit_opacity = false;
        geometry::intersect(child_bounds, clip_bounds)
    }

    pub(super) fn paint(&self, context: &mut PaintContext<'_>, paint_bounds: Rect) {
        if matches!(self.mode, ClipMode::None) {
            paint_children(&self.children, context);
            return;
        }
        context.canvas.save();
        context
            .canvas
            .clip_shape(&self.shape, !matches!(self.mode, ClipMode::HardEdge));
        let uses_save_layer = matches!(self.mode, ClipMode::AntiAliasWithSaveLayer);
        if uses_save_layer {
            context.canvas.save_layer(paint_bounds, None);
        }
        paint_children(&self.children, context);
        if uses_save_layer {
            context.canvas.restore();
        }
        context.canvas.restore();
    }
}
