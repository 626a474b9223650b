// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Frame differ: computes the surface damage between two layer trees.
//!
//! Walks the previous and current trees in lockstep. Where the trees agree
//! (same variant, same attributes, same picture content) no damage is
//! produced and the walk descends; at the first disagreement the union of
//! the old and new paint bounds is damaged under the accumulated transform
//! and the walk stops for that subtree, since everything below it repaints
//! anyway. The result is conservative: it may over-report, never
//! under-report.

use peniko::kurbo::{Affine, Rect};
use smallvec::SmallVec;

use crate::geometry;
use crate::layer::{Layer, LayerKind};
use crate::picture::Picture;
use crate::raster_cache::integral_transform;
use crate::tree::LayerTree;

/// Accumulated damage in device pixels.
///
/// Overlapping contributions are merged as they arrive, so the region
/// stays small for the common case of localized updates.
#[derive(Clone, Debug, Default)]
pub struct DamageRegion {
    rects: SmallVec<[Rect; 4]>,
}

impl DamageRegion {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a damaged rect, merging it with any accumulated rect it
    /// overlaps.
    pub fn add(&mut self, rect: Rect) {
        if geometry::is_empty(rect) {
            return;
        }
        // Damage is consumed as whole device pixels; a fractional edge
        // would leave the partially-covered pixel unrepainted.
        let mut rect = rect.expand();
        let mut i = 0;
        while i < self.rects.len() {
            if geometry::intersects(self.rects[i], rect) {
                rect = geometry::union(self.rects.swap_remove(i), rect);
                // Growing the rect may have created new overlaps.
                i = 0;
            } else {
                i += 1;
            }
        }
        self.rects.push(rect);
    }

    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }

    /// The disjoint damaged rects.
    pub fn rects(&self) -> &[Rect] {
        &self.rects
    }

    /// Smallest single rect covering all damage.
    pub fn bounding_box(&self) -> Rect {
        self.rects
            .iter()
            .copied()
            .fold(Rect::ZERO, geometry::union)
    }
}

/// Damage between the tree presented last frame and the tree about to be
/// presented.
///
/// # Panics
///
/// Panics if either tree has not been prerolled; paint bounds are computed
/// there and the differ reads them.
pub fn diff_layer_trees(new: &LayerTree, old: &LayerTree) -> DamageRegion {
    assert!(
        new.is_prerolled() && old.is_prerolled(),
        "diffing layer trees before preroll"
    );
    let mut context = DiffContext {
        transform: integral_transform(new.root_transform()),
        damage: DamageRegion::new(),
    };
    if new.frame_size() != old.frame_size()
        || new.device_pixel_ratio() != old.device_pixel_ratio()
    {
        // Surface geometry changed; every pixel is suspect.
        let viewport = Rect::from_origin_size((0.0, 0.0), new.frame_size());
        context.damage.add(geometry::transform(context.transform, viewport));
        return context.damage;
    }
    diff_layer(new.root(), old.root(), &mut context);
    context.damage
}

struct DiffContext {
    /// Accumulated transform from layer space to device pixels.
    transform: Affine,
    damage: DamageRegion,
}

impl DiffContext {
    fn damage_bounds(&mut self, bounds: Rect) {
        self.damage.add(geometry::transform(self.transform, bounds));
    }

    /// Damages the union of a replaced node's old and new footprint. Both
    /// bounds are in the same parent space since the walk only descends
    /// where transforms agree.
    fn damage_replaced(&mut self, new: &Layer, old: &Layer) {
        self.damage_bounds(new.paint_bounds());
        self.damage_bounds(old.paint_bounds());
    }

    /// Descends with the child transform snapped the same way the paint
    /// pass snaps its canvas transform, so damage bounds land on the same
    /// pixel grid the snapped painting touches.
    fn with_transform(&mut self, transform: Affine, f: impl FnOnce(&mut Self)) {
        let saved = self.transform;
        self.transform = integral_transform(saved * transform);
        f(self);
        self.transform = saved;
    }
}

fn diff_layer(new: &Layer, old: &Layer, context: &mut DiffContext) {
    use LayerKind as K;
    match (new.kind(), old.kind()) {
        (K::Container(n), K::Container(o)) => {
            diff_children(&n.children, &o.children, context);
        }
        (K::Transform(n), K::Transform(o)) => {
            if n.transform != o.transform {
                context.damage_replaced(new, old);
            } else {
                context.with_transform(n.transform, |context| {
                    diff_children(&n.children, &o.children, context);
                });
            }
        }
        (K::Opacity(n), K::Opacity(o)) => {
            if n.alpha != o.alpha || n.offset != o.offset {
                context.damage_replaced(new, old);
            } else {
                context.with_transform(Affine::translate(n.offset), |context| {
                    diff_children(&n.children, &o.children, context);
                });
            }
        }
        (K::Clip(n), K::Clip(o)) => {
            if n.shape != o.shape || n.mode != o.mode {
                context.damage_replaced(new, old);
            } else {
                diff_children(&n.children, &o.children, context);
            }
        }
        (K::Picture(n), K::Picture(o)) => {
            if n.offset != o.offset || !Picture::same_content(&n.picture, &o.picture) {
                context.damage_replaced(new, old);
            }
        }
        (K::ImageFilter(n), K::ImageFilter(o)) => {
            if n.filter != o.filter {
                context.damage_replaced(new, old);
            } else {
                diff_children(&n.children, &o.children, context);
            }
        }
        (K::BackdropFilter(n), K::BackdropFilter(o)) => {
            if n.filter != o.filter {
                context.damage_replaced(new, old);
            } else {
                diff_children(&n.children, &o.children, context);
            }
        }
        (K::ShaderMask(n), K::ShaderMask(o)) => {
            if n.shader != o.shader || n.mask_rect != o.mask_rect || n.blend != o.blend {
                context.damage_replaced(new, old);
            } else {
                diff_children(&n.children, &o.children, context);
            }
        }
        (K::PhysicalShape(n), K::PhysicalShape(o)) => {
            if n.color != o.color
                || n.shadow_color != o.shadow_color
                || n.elevation != o.elevation
                || n.clip_mode != o.clip_mode
                || n.path != o.path
            {
                context.damage_replaced(new, old);
            } else {
                diff_children(&n.children, &o.children, context);
            }
        }
        (K::PlatformView(n), K::PlatformView(o)) => {
            if n.view_id != o.view_id || n.offset != o.offset || n.size != o.size {
                context.damage_replaced(new, old);
            }
        }
        // Texture content is produced outside the compositor and can have
        // advanced a frame regardless of what the tree says.
        (K::Texture(_), K::Texture(_)) => {
            context.damage_replaced(new, old);
        }
        // Different variants at the same position: full replacement.
        _ => context.damage_replaced(new, old),
    }
}

fn diff_children(new: &[Layer], old: &[Layer], context: &mut DiffContext) {
    let common = new.len().min(old.len());
    for (new_child, old_child) in new[..common].iter().zip(&old[..common]) {
        diff_layer(new_child, old_child, context);
    }
    for added in &new[common..] {
        context.damage_bounds(added.paint_bounds());
    }
    for removed in &old[common..] {
        context.damage_bounds(removed.paint_bounds());
    }
}
