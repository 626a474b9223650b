// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Leaves whose content comes from outside the compositor: embedded
//! platform views and external textures.

use peniko::kurbo::{Affine, Point, Rect, Size};

use crate::embedder::{EmbeddedViewParams, TextureId, ViewId};

use super::{PaintContext, PrerollContext};

/// Reserves space for a native view composited by the platform.
///
/// The layer draws nothing itself; preroll hands the view's geometry and
/// the mutators above it to the [`crate::embedder::ViewEmbedder`], which
/// slots the native surface between the painted content.
pub struct PlatformViewLayer {
    pub offset: Point,
    pub size: Size,
    pub view_id: ViewId,
}

impl PlatformViewLayer {
    pub(super) fn preroll(&mut self, context: &mut PrerollContext<'_>, matrix: Affine) -> Rect {
        context.subtree_can_inherit_opacity = false;
        match context.view_embedder.as_deref_mut() {
            None => {
                log::error!(
                    "platform view {} in a scene but no view embedder is attached; \
                     the view will not be composited",
                    self.view_id.0
                );
            }
            Some(embedder) => {
                context.has_platform_view = true;
                embedder.preroll_composite_view(
                    self.view_id,
                    EmbeddedViewParams {
                        offset_pixels: matrix * self.offset,
                        size_points: self.size,
                        mutators: context.mutators.clone(),
                    },
                );
            }
        }
        Rect::from_origin_size(self.offset, self.size)
    }

    pub(super) fn paint(&self, context: &mut PaintContext<'_>) {
        let Some(embedder) = context.view_embedder.as_deref_mut() else {
            return;
        };
        if embedder.composite_view(self.view_id).is_none() {
            log::error!("embedder failed to composite view {}", self.view_id.0);
        }
    }
}

/// Presents the latest frame of an externally-produced texture.
pub struct TextureLayer {
    pub offset: Point,
    pub size: Size,
    pub texture_id: TextureId,
    /// When set the texture presents its last frame instead of pulling a
    /// new one, used while the surface is being reconfigured.
    pub freeze: bool,
}

impl TextureLayer {
    pub(super) fn preroll(&mut self, context: &mut PrerollContext<'_>) -> Rect {
        context.has_texture_layer = true;
        context.subtree_can_inherit_opacity = false;
        Rect::from_origin_size(self.offset, self.size)
    }

    pub(super) fn paint(&self, context: &mut PaintContext<'_>, paint_bounds: Rect) {
        let PaintContext {
            canvas,
            texture_registry,
            ..
        } = context;
        // A texture can be unregistered while a tree referencing it is
        // still in flight; skip rather than fail the frame.
        let Some(texture) = texture_registry.get_mut(self.texture_id) else {
            return;
        };
        texture.paint(&mut **canvas, paint_bounds, self.freeze);
    }
}
