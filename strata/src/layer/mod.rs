// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The retained layer tree.
//!
//! A [`Layer`] is one node of the scene the producer hands to the raster
//! context each frame. Layers are visited in two passes: preroll walks the
//! tree bottom-up computing paint bounds under the accumulated transform
//! and deciding what to raster-cache, then paint replays the tree onto a
//! [`Canvas`], skipping subtrees whose bounds miss the cull rect.
//!
//! The node set is a closed enum rather than a trait object per node; every
//! traversal is a `match`, so adding a variant is a compile error in each
//! pass until its semantics are spelled out.

mod container;
mod content;
mod embedded;
mod physical_shape;

pub use container::{ClipLayer, ContainerLayer, OpacityLayer, TransformLayer};
pub use content::{BackdropFilterLayer, ImageFilterLayer, PictureLayer, ShaderMaskLayer};
pub use embedded::{PlatformViewLayer, TextureLayer};
pub use physical_shape::PhysicalShapeLayer;

use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use peniko::kurbo::{Affine, BezPath, Point, Rect, Size, Vec2};
use peniko::{BlendMode, Brush, Color};

use crate::canvas::{Canvas, ClipMode, ClipShape, ImageFilter};
use crate::embedder::{MutatorStack, TextureId, TextureRegistry, ViewEmbedder, ViewId};
use crate::geometry;
use crate::picture::Picture;
use crate::raster_cache::{RasterCache, Rasterizer};

/// Stable identity of a layer, used as a raster-cache key.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct LayerId(pub NonZeroU64);

impl LayerId {
    /// Allocates the next id.
    pub fn next() -> Self {
        // We initialize with 1 so that the conversion below succeeds
        static ID_COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(NonZeroU64::new(ID_COUNTER.fetch_add(1, Ordering::Relaxed)).unwrap())
    }
}

/// State threaded through the preroll pass.
///
/// The cull rect is kept in the coordinate space of the layer currently
/// being visited; transform and clip layers rewrite it around their
/// children and restore it afterwards. The boolean flags accumulate
/// upwards: layers only ever set them, parents that need subtree-local
/// values save and clear them around their children.
pub struct PrerollContext<'a> {
    pub raster_cache: Option<&'a mut RasterCache>,
    pub rasterizer: Option<&'a mut dyn Rasterizer>,
    pub view_embedder: Option<&'a mut dyn ViewEmbedder>,
    pub texture_registry: &'a mut TextureRegistry,
    /// Mutators between the root and the current layer, for embedded views.
    pub mutators: MutatorStack,
    /// Region of the current layer's space that can reach the surface.
    pub cull_rect: Rect,
    /// Set when a layer needs to sample the surface below it.
    pub surface_needs_readback: bool,
    /// Set when the subtree contains an embedded platform view.
    pub has_platform_view: bool,
    /// Set when the subtree contains an external texture.
    pub has_texture_layer: bool,
    /// Cleared by any layer whose content cannot take a group opacity
    /// multiplied into its paints instead of an offscreen compositing pass.
    pub subtree_can_inherit_opacity: bool,
    pub device_pixel_ratio: f64,
}

/// State threaded through the paint pass.
pub struct PaintContext<'a> {
    pub canvas: &'a mut dyn Canvas,
    pub raster_cache: Option<&'a RasterCache>,
    pub view_embedder: Option<&'a mut dyn ViewEmbedder>,
    pub texture_registry: &'a mut TextureRegistry,
    /// Group opacity pushed down from an ancestor [`OpacityLayer`];
    /// multiplied into leaf paints during picture playback.
    pub inherited_opacity: f32,
    pub device_pixel_ratio: f64,
}

/// One node of the layer tree.
pub struct Layer {
    id: LayerId,
    paint_bounds: Rect,
    needs_painting: bool,
    kind: LayerKind,
}

/// The closed set of layer variants.
pub enum LayerKind {
    Container(ContainerLayer),
    Transform(TransformLayer),
    Opacity(OpacityLayer),
    Clip(ClipLayer),
    Picture(PictureLayer),
    ImageFilter(ImageFilterLayer),
    BackdropFilter(BackdropFilterLayer),
    ShaderMask(ShaderMaskLayer),
    PhysicalShape(PhysicalShapeLayer),
    PlatformView(PlatformViewLayer),
    Texture(TextureLayer),
}

impl Layer {
    fn new(kind: LayerKind) -> Self {
        Self {
            id: LayerId::next(),
            paint_bounds: Rect::ZERO,
            needs_painting: false,
            kind,
        }
    }

    /// A plain grouping node.
    pub fn container(children: Vec<Layer>) -> Self {
        Self::new(LayerKind::Container(ContainerLayer { children }))
    }

    /// Applies `transform` to its children.
    pub fn transform(transform: Affine, children: Vec<Layer>) -> Self {
        Self::new(LayerKind::Transform(TransformLayer {
            transform,
            children,
        }))
    }

    /// Applies group opacity `alpha` (and an offset) to its children.
    pub fn opacity(alpha: f32, offset: Vec2, children: Vec<Layer>) -> Self {
        Self::new(LayerKind::Opacity(OpacityLayer {
            alpha,
            offset,
            children,
            children_can_accept_opacity: false,
        }))
    }

    /// Clips its children to `shape`.
    pub fn clip(shape: ClipShape, mode: ClipMode, children: Vec<Layer>) -> Self {
        Self::new(LayerKind::Clip(ClipLayer {
            shape,
            mode,
            children,
        }))
    }

    /// Leaf node holding recorded drawing commands.
    pub fn picture(offset: Vec2, picture: Arc<Picture>, is_complex: bool, will_change: bool) -> Self {
        Self::new(LayerKind::Picture(PictureLayer {
            offset,
            picture,
            is_complex,
            will_change,
        }))
    }

    /// Filters its children's rasterized output.
    pub fn image_filter(filter: ImageFilter, children: Vec<Layer>) -> Self {
        Self::new(LayerKind::ImageFilter(ImageFilterLayer {
            filter,
            children,
            child_paint_bounds: Rect::ZERO,
            render_count: 0,
        }))
    }

    /// Filters the surface content beneath it before painting children.
    pub fn backdrop_filter(filter: ImageFilter, children: Vec<Layer>) -> Self {
        Self::new(LayerKind::BackdropFilter(BackdropFilterLayer {
            filter,
            children,
        }))
    }

    /// Masks its children with a shader-filled rect.
    pub fn shader_mask(
        shader: Brush,
        mask_rect: Rect,
        blend: BlendMode,
        children: Vec<Layer>,
    ) -> Self {
        Self::new(LayerKind::ShaderMask(ShaderMaskLayer {
            shader,
            mask_rect,
            blend,
            children,
        }))
    }

    /// An elevated, shadow-casting shape clipping its children.
    pub fn physical_shape(
        color: Color,
        shadow_color: Color,
        elevation: f64,
        path: BezPath,
        clip_mode: ClipMode,
        children: Vec<Layer>,
    ) -> Self {
        Self::new(LayerKind::PhysicalShape(PhysicalShapeLayer::new(
            color,
            shadow_color,
            elevation,
            path,
            clip_mode,
            children,
        )))
    }

    /// Placeholder for an embedded platform view.
    pub fn platform_view(offset: Point, size: Size, view_id: ViewId) -> Self {
        Self::new(LayerKind::PlatformView(PlatformViewLayer {
            offset,
            size,
            view_id,
        }))
    }

    /// Leaf presenting an externally-produced texture.
    pub fn texture(offset: Point, size: Size, texture_id: TextureId, freeze: bool) -> Self {
        Self::new(LayerKind::Texture(TextureLayer {
            offset,
            size,
            texture_id,
            freeze,
        }))
    }

    /// Replaces the freshly-minted id with one retained from a previous
    /// frame's tree. Cache entries and diff state are keyed by id, so a
    /// producer that rebuilds its tree every frame carries ids forward for
    /// layers whose output is worth caching.
    pub fn with_id(mut self, id: LayerId) -> Self {
        self.id = id;
        self
    }

    pub fn id(&self) -> LayerId {
        self.id
    }

    /// Bounds this layer may paint into, in its parent's coordinate space.
    /// Valid after preroll.
    pub fn paint_bounds(&self) -> Rect {
        self.paint_bounds
    }

    /// Whether paint will touch any pixels. Valid after preroll.
    pub fn needs_painting(&self) -> bool {
        self.needs_painting
    }

    pub fn kind(&self) -> &LayerKind {
        &self.kind
    }

    /// First pass: computes paint bounds under the accumulated `matrix`
    /// and warms the raster cache.
    pub fn preroll(&mut self, context: &mut PrerollContext<'_>, matrix: Affine) {
        let bounds = match &mut self.kind {
            LayerKind::Container(l) => l.preroll(context, matrix),
            LayerKind::Transform(l) => l.preroll(context, matrix),
            LayerKind::Opacity(l) => l.preroll(context, matrix, self.id),
            LayerKind::Clip(l) => l.preroll(context, matrix),
            LayerKind::Picture(l) => l.preroll(context, matrix),
            LayerKind::ImageFilter(l) => l.preroll(context, matrix, self.id),
            LayerKind::BackdropFilter(l) => l.preroll(context, matrix),
            LayerKind::ShaderMask(l) => l.preroll(context, matrix, self.id),
            LayerKind::PhysicalShape(l) => l.preroll(context, matrix),
            LayerKind::PlatformView(l) => l.preroll(context, matrix),
            LayerKind::Texture(l) => l.preroll(context),
        };
        self.paint_bounds = bounds;
        self.needs_painting =
            !geometry::is_empty(bounds) && geometry::intersects(bounds, context.cull_rect);
    }

    /// Second pass: replays the layer onto the context canvas. A no-op for
    /// layers preroll found empty or fully culled.
    pub fn paint(&self, context: &mut PaintContext<'_>) {
        if !self.needs_painting {
            return;
        }
        match &self.kind {
            LayerKind::Container(l) => l.paint(context),
            LayerKind::Transform(l) => l.paint(context),
            LayerKind::Opacity(l) => l.paint(context, self.id, self.paint_bounds),
            LayerKind::Clip(l) => l.paint(context, self.paint_bounds),
            LayerKind::Picture(l) => l.paint(context),
            LayerKind::ImageFilter(l) => l.paint(context, self.id),
            LayerKind::BackdropFilter(l) => l.paint(context, self.paint_bounds),
            LayerKind::ShaderMask(l) => l.paint(context, self.id, self.paint_bounds),
            LayerKind::PhysicalShape(l) => l.paint(context, self.paint_bounds),
            LayerKind::PlatformView(l) => l.paint(context),
            LayerKind::Texture(l) => l.paint(context, self.paint_bounds),
        }
    }
}

/// Prerolls each child under `matrix` and returns the union of their
/// paint bounds.
pub(crate) fn preroll_children(
    children: &mut [Layer],
    context: &mut PrerollContext<'_>,
    matrix: Affine,
) -> Rect {
    let mut bounds = Rect::ZERO;
    for child in children {
        child.preroll(context, matrix);
        bounds = geometry::union(bounds, child.paint_bounds);
    }
    bounds
}

/// Paints each child that preroll decided needs painting.
pub(crate) fn paint_children(children: &[Layer], context: &mut PaintContext<'_>) {
    for child in children {
        child.paint(context);
    }
}
