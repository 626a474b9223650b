// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Content-addressed cache of rasterized subtrees.
//!
//! Repeatedly painted content (a complex picture, a filtered layer, an
//! opacity group's children) is rasterized once into a backend image and
//! blitted on subsequent frames. Entries are keyed by content identity
//! plus the exact transform in effect, snapped to integer translation, so
//! a cached bitmap is never resampled at a sub-pixel offset.
//!
//! The cache is owned by a [`crate::context::CompositorContext`] and lives
//! entirely on the raster context; its lifecycle is driven by explicit
//! frame hooks rather than a process-wide singleton so that multiple
//! independent render surfaces can coexist in one process.

use std::cell::Cell;
use std::collections::HashMap;
use std::sync::Arc;

use peniko::kurbo::{Affine, Rect};

use crate::canvas::{CacheImage, Canvas, Paint};
use crate::layer::LayerId;
use crate::picture::{Picture, PictureId};

/// Snaps a transform's translation to integer pixel offsets.
///
/// Cached bitmaps are blitted in device space; without snapping, two
/// frames whose transforms differ by a fraction of a pixel would produce
/// visible seams between cached and directly-painted content. Compiled out
/// by the `fractional_translation` feature.
pub fn integral_transform(affine: Affine) -> Affine {
    if cfg!(feature = "fractional_translation") {
        return affine;
    }
    let [a, b, c, d, e, f] = affine.as_coeffs();
    Affine::new([a, b, c, d, e.round(), f.round()])
}

/// Rasterizes content into backend images on behalf of the cache.
///
/// Implemented by the GPU backend. The canvas handed to `paint` is in
/// device space with an identity transform, clipped to `device_bounds`;
/// returning `None` is a soft failure (out of memory, context lost) and
/// callers fall back to direct painting.
pub trait Rasterizer {
    fn rasterize(
        &mut self,
        device_bounds: Rect,
        paint: &mut dyn FnMut(&mut dyn Canvas),
    ) -> Option<CacheImage>;
}

/// Tunable heuristics for cache admission.
///
/// The thresholds are heuristic, not correctness requirements; the
/// defaults match what works for typical UI scenes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RasterCacheConfig {
    /// Number of times a key must be encountered before its content is
    /// actually rasterized. Skipping the first encounters keeps one-shot
    /// content from paying cache-maintenance cost.
    pub access_threshold: usize,
    /// Minimum recorded op count for a picture to be worth caching
    /// without an explicit complexity hint.
    pub min_picture_ops: usize,
}

impl Default for RasterCacheConfig {
    fn default() -> Self {
        Self {
            access_threshold: 3,
            min_picture_ops: 5,
        }
    }
}

/// Identity half of a cache key.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CacheId {
    /// A picture's recorded content.
    Picture(PictureId),
    /// A layer's full painted output (e.g. a filtered layer).
    Layer(LayerId),
    /// A layer's children only (e.g. an opacity group that applies its
    /// alpha at blit time).
    LayerChildren(LayerId),
}

/// Bit-exact transform key. Two transforms match only if every
/// coefficient matches after integral snapping.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
struct TransformKey([u64; 6]);

impl TransformKey {
    fn new(affine: Affine) -> Self {
        let c = affine.as_coeffs();
        Self(c.map(f64::to_bits))
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    id: CacheId,
    transform: TransformKey,
}

struct CacheEntry {
    access_count: usize,
    // Touched from `draw`, which runs with a shared borrow during paint;
    // the cache is confined to the raster context so a Cell suffices.
    used_this_frame: Cell<bool>,
    image: Option<CacheImage>,
}

/// The raster cache. See the module docs.
#[derive(Default)]
pub struct RasterCache {
    config: RasterCacheConfig,
    entries: HashMap<CacheKey, CacheEntry>,
}

impl RasterCache {
    /// A cache with the given admission config.
    pub fn new(config: RasterCacheConfig) -> Self {
        Self {
            config,
            entries: HashMap::default(),
        }
    }

    /// Number of live entries (with or without an image).
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Number of entries holding a rasterized image.
    pub fn image_count(&self) -> usize {
        self.entries.values().filter(|e| e.image.is_some()).count()
    }

    /// Marks the start of a frame. Paired with [`RasterCache::end_frame`].
    pub fn begin_frame(&mut self) {}

    /// Marks the end of a frame: sweeps every entry that was not touched
    /// by a prepare or draw since [`RasterCache::begin_frame`].
    pub fn end_frame(&mut self) {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.used_this_frame.get());
        if self.entries.len() != before {
            log::debug!(
                "raster cache swept {} stale entries, {} remain",
                before - self.entries.len(),
                self.entries.len()
            );
        }
        for entry in self.entries.values_mut() {
            entry.used_this_frame.set(false);
        }
    }

    /// Considers `picture` for caching at the given transform, honoring
    /// the complexity and repeated-encounter heuristics. Returns whether a
    /// usable image exists after the call.
    pub fn prepare_picture(
        &mut self,
        rasterizer: &mut dyn Rasterizer,
        picture: &Arc<Picture>,
        ctm: Affine,
        is_complex: bool,
        will_change: bool,
    ) -> bool {
        if will_change {
            // Content the producer expects to change soon; caching it
            // would only churn entries.
            return false;
        }
        if !is_complex && picture.op_count() <= self.config.min_picture_ops {
            return false;
        }
        let ctm = integral_transform(ctm);
        self.prepare(
            rasterizer,
            CacheId::Picture(picture.id()),
            ctm,
            picture.cull_rect(),
            &mut |canvas| picture.playback(canvas),
        )
    }

    /// Considers a layer (or its children) for caching. `paint_bounds` is
    /// in the layer's own coordinate space; `paint` replays the content in
    /// that space.
    pub fn prepare_layer(
        &mut self,
        rasterizer: &mut dyn Rasterizer,
        id: CacheId,
        ctm: Affine,
        paint_bounds: Rect,
        paint: &mut dyn FnMut(&mut dyn Canvas),
    ) -> bool {
        let ctm = integral_transform(ctm);
        self.prepare(rasterizer, id, ctm, paint_bounds, paint)
    }

    fn prepare(
        &mut self,
        rasterizer: &mut dyn Rasterizer,
        id: CacheId,
        ctm: Affine,
        paint_bounds: Rect,
        paint: &mut dyn FnMut(&mut dyn Canvas),
    ) -> bool {
        if crate::geometry::is_empty(paint_bounds) {
            return false;
        }
        let key = CacheKey {
            id,
            transform: TransformKey::new(ctm),
        };
        let threshold = self.config.access_threshold;
        let entry = self.entries.entry(key).or_insert_with(|| CacheEntry {
            access_count: 0,
            used_this_frame: Cell::new(false),
            image: None,
        });
        entry.access_count += 1;
        entry.used_this_frame.set(true);
        if entry.image.is_some() {
            return true;
        }
        if entry.access_count < threshold {
            return false;
        }
        let device_bounds = crate::geometry::transform(ctm, paint_bounds);
        entry.image = rasterizer.rasterize(device_bounds, &mut |canvas| {
            canvas.set_transform(ctm);
            paint(canvas);
        });
        if entry.image.is_none() {
            log::debug!("rasterization failed for {id:?}; falling back to direct paint");
        }
        entry.image.is_some()
    }

    /// Blits the cached image for `picture` if one exists for the exact
    /// snapped transform. Returns false on a miss; the caller must paint
    /// directly.
    pub fn draw_picture(&self, picture_id: PictureId, ctm: Affine, canvas: &mut dyn Canvas) -> bool {
        self.draw(CacheId::Picture(picture_id), ctm, canvas, None)
    }

    /// Blits a cached layer image, optionally through `paint` (e.g. an
    /// alpha paint for cached opacity-group children).
    pub fn draw_layer(
        &self,
        id: CacheId,
        ctm: Affine,
        canvas: &mut dyn Canvas,
        paint: Option<&Paint>,
    ) -> bool {
        self.draw(id, ctm, canvas, paint)
    }

    fn draw(&self, id: CacheId, ctm: Affine, canvas: &mut dyn Canvas, paint: Option<&Paint>) -> bool {
        let key = CacheKey {
            id,
            transform: TransformKey::new(integral_transform(ctm)),
        };
        let Some(entry) = self.entries.get(&key) else {
            return false;
        };
        let Some(image) = &entry.image else {
            // Seen before but not yet rasterized; still counts as a touch
            // so the pending entry survives the sweep.
            entry.used_this_frame.set(true);
            return false;
        };
        entry.used_this_frame.set(true);
        canvas.save();
        // Cached images live in device space.
        canvas.set_transform(Affine::IDENTITY);
        canvas.draw_cache_image(image, paint);
        canvas.restore();
        true
    }
}
