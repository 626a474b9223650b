// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Elevated shapes with material-style drop shadows.

use peniko::kurbo::{Affine, BezPath, Rect, Shape};
use peniko::Color;

use crate::canvas::{ClipMode, ClipShape, Paint};
use crate::geometry;

use super::{paint_children, preroll_children, Layer, PaintContext, PrerollContext};

/// The standard overhead light rig shadows are computed against: a disc
/// light of radius [`LIGHT_RADIUS`] device pixels centered
/// [`LIGHT_HEIGHT`] logical units above the surface.
pub const LIGHT_RADIUS: f64 = 800.0;
pub const LIGHT_HEIGHT: f64 = 600.0;

/// How far a shadow can extend past the occluder, per axis.
///
/// Projecting the light's disc past the occluder's edge onto the surface
/// gives a penumbra that grows with elevation and with the occluder's own
/// extent under the off-center parts of the light.
pub fn shadow_bounds(content: Rect, elevation: f64, device_pixel_ratio: f64) -> Rect {
    if elevation <= 0.0 || geometry::is_empty(content) {
        return content;
    }
    let radius = LIGHT_RADIUS * device_pixel_ratio;
    content.inflate(
        elevation * (radius + content.width() / 2.0) / LIGHT_HEIGHT,
        elevation * (radius + content.height() / 2.0) / LIGHT_HEIGHT,
    )
}

/// A shape drawn with a solid color, an optional drop shadow, and its
/// children clipped to the shape.
pub struct PhysicalShapeLayer {
    pub color: Color,
    pub shadow_color: Color,
    /// Height above the surface in logical units; zero casts no shadow.
    pub elevation: f64,
    pub path: BezPath,
    pub clip_mode: ClipMode,
    pub children: Vec<Layer>,
    clip: ClipShape,
}

impl PhysicalShapeLayer {
    pub(super) fn new(
        color: Color,
        shadow_color: Color,
        elevation: f64,
        path: BezPath,
        clip_mode: ClipMode,
        children: Vec<Layer>,
    ) -> Self {
        let clip = ClipShape::Path(path.clone());
        Self {
            color,
            shadow_color,
            elevation,
            path,
            clip_mode,
            children,
            clip,
        }
    }

    pub(super) fn preroll(&mut self, context: &mut PrerollContext<'_>, matrix: Affine) -> Rect {
        let path_bounds = self.path.bounding_box();
        let clips_children = !matches!(self.clip_mode, ClipMode::None);

        let child_bounds = if clips_children {
            context.mutators.push_clip(self.clip.clone());
            let saved_cull = context.cull_rect;
            context.cull_rect = geometry::intersect(saved_cull, path_bounds);
            let child_bounds = preroll_children(&mut self.children, context, matrix);
            context.cull_rect = saved_cull;
            context.mutators.pop();
            geometry::intersect(child_bounds, path_bounds)
        } else {
            preroll_children(&mut self.children, context, matrix)
        };

        context.subtree_can_inherit_opacity = false;
        geometry::union(
            shadow_bounds(path_bounds, self.elevation, context.device_pixel_ratio),
            child_bounds,
        )
    }

    pub(super) fn paint(&self, context: &mut PaintContext<'_>, paint_bounds: Rect) {
        if self.elevation > 0.0 {
            context.canvas.draw_shadow(
                &self.path,
                self.shadow_color,
                self.elevation,
                self.color.a < u8::MAX,
                context.device_pixel_ratio,
            );
        }
        match self.clip_mode {
            ClipMode::AntiAliasWithSaveLayer => {
                context.canvas.save();
                context.canvas.clip_shape(&self.clip, true);
                context.canvas.save_layer(paint_bounds, None);
                // Flood the clip instead of drawing the path again; the
                // layer edge and the clip edge would otherwise both be
                // anti-aliased and blend against each other.
                context.canvas.draw_paint(&Paint::from_color(self.color));
                paint_children(&self.children, context);
                context.canvas.restore();
                context.canvas.restore();
            }
            mode => {
                let mut interior = Paint::from_color(self.color);
                interior.anti_alias = !matches!(mode, ClipMode::HardEdge);
                context.canvas.draw_path(&self.path, &interior);
                if matches!(mode, ClipMode::None) {
                    paint_children(&self.children, context);
                } else {
                    context.canvas.save();
                    context
                        .canvas
                        .clip_shape(&self.clip, matches!(mode, ClipMode::AntiAlias));
                    paint_children(&self.children, context);
                    context.canvas.restore();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::CanvasCall;
    use crate::layer::testing::{preroll_and_paint, solid_rect_layer};

    const VIEWPORT: Rect = Rect::new(0.0, 0.0, 1000.0, 1000.0);

    fn rect_path(rect: Rect) -> BezPath {
        rect.to_path(0.1)
    }

    #[test]
    fn shadow_extent_scales_with_elevation_and_dpr() {
        let content = Rect::new(0.0, 0.0, 100.0, 100.0);
        let bounds = shadow_bounds(content, 10.0, 1.0);
        // 10 * (800 + 50) / 600 per axis.
        let extent = 10.0 * (LIGHT_RADIUS + 50.0) / LIGHT_HEIGHT;
        assert!((bounds.x0 - (content.x0 - extent)).abs() < 1e-9);
        assert!((bounds.x1 - (content.x1 + extent)).abs() < 1e-9);

        // Doubling the pixel ratio widens the effective light disc.
        let hidpi = shadow_bounds(content, 10.0, 2.0);
        let hidpi_extent = 10.0 * (2.0 * LIGHT_RADIUS + 50.0) / LIGHT_HEIGHT;
        assert!((hidpi.x0 - (content.x0 - hidpi_extent)).abs() < 1e-9);
    }

    #[test]
    fn zero_elevation_keeps_content_bounds() {
        let content = Rect::new(0.0, 0.0, 100.0, 50.0);
        assert_eq!(shadow_bounds(content, 0.0, 1.0), content);
    }

    #[test]
    fn elevated_shape_draws_shadow_then_interior() {
        let mut layer = Layer::physical_shape(
            Color::BLUE,
            Color::BLACK,
            4.0,
            rect_path(Rect::new(10.0, 10.0, 50.0, 50.0)),
            ClipMode::AntiAlias,
            vec![solid_rect_layer(Rect::new(10.0, 10.0, 20.0, 20.0))],
        );
        let canvas = preroll_and_paint(&mut layer, VIEWPORT);
        let calls = canvas.calls();
        let shadow_at = calls
            .iter()
            .position(|c| matches!(c, CanvasCall::DrawShadow { .. }))
            .unwrap();
        let interior_at = calls
            .iter()
            .position(|c| matches!(c, CanvasCall::DrawPath { .. }))
            .unwrap();
        assert!(shadow_at < interior_at);
        match &calls[shadow_at] {
            CanvasCall::DrawShadow { elevation, .. } => assert_eq!(*elevation, 4.0),
            _ => unreachable!(),
        }
        assert!(layer.paint_bounds().x0 < 10.0);
    }

    #[test]
    fn flat_shape_casts_no_shadow() {
        let mut layer = Layer::physical_shape(
            Color::BLUE,
            Color::BLACK,
            0.0,
            rect_path(Rect::new(10.0, 10.0, 50.0, 50.0)),
            ClipMode::HardEdge,
            Vec::new(),
        );
        let canvas = preroll_and_paint(&mut layer, VIEWPORT);
        assert!(!canvas
            .calls()
            .iter()
            .any(|c| matches!(c, CanvasCall::DrawShadow { .. })));
        assert_eq!(layer.paint_bounds(), Rect::new(10.0, 10.0, 50.0, 50.0));
    }

    #[test]
    fn save_layer_mode_floods_the_clip() {
        let mut layer = Layer::physical_shape(
            Color::BLUE,
            Color::BLACK,
            0.0,
            rect_path(Rect::new(0.0, 0.0, 40.0, 40.0)),
            ClipMode::AntiAliasWithSaveLayer,
            Vec::new(),
        );
        let canvas = preroll_and_paint(&mut layer, VIEWPORT);
        let calls = canvas.calls();
        assert!(matches!(calls[0], CanvasCall::Save));
        assert!(matches!(calls[1], CanvasCall::ClipShape { .. }));
        assert!(matches!(calls[2], CanvasCall::SaveLayer { .. }));
        assert!(matches!(calls[3], CanvasCall::DrawPaint { .. }));
    }

    #[test]
    fn children_are_clipped_to_the_shape() {
        let mut layer = Layer::physical_shape(
            Color::BLUE,
            Color::BLACK,
            0.0,
            rect_path(Rect::new(0.0, 0.0, 20.0, 20.0)),
            ClipMode::HardEdge,
            // Outside the shape: culled during preroll.
            vec![solid_rect_layer(Rect::new(100.0, 100.0, 120.0, 120.0))],
        );
        let canvas = preroll_and_paint(&mut layer, VIEWPORT);
        // Only the interior path draw remains.
        assert_eq!(canvas.draw_count(), 1);
    }
}
