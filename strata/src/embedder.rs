// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! External content woven into the composited frame.
//!
//! Platform views (native UI embedded between layers) and external
//! textures (video or camera frames) are produced outside the compositor.
//! The layer tree only carries opaque identifiers; the traits here are the
//! narrow seams through which the embedding shell supplies the content.
//!
//! Everything in this module is confined to the raster context by
//! convention: all callers already run there, so access is documented as a
//! precondition rather than guarded by a lock.

use std::collections::BTreeMap;

use peniko::kurbo::{Affine, Point, Rect, Size};
use smallvec::SmallVec;

use crate::canvas::{Canvas, ClipShape};

/// Identifier for an embedded platform view.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ViewId(pub i64);

/// Identifier for an externally-produced texture.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TextureId(pub i64);

/// One transformation applied between the root and an embedded view.
#[derive(Clone, Debug, PartialEq)]
pub enum Mutator {
    Transform(Affine),
    Clip(ClipShape),
    Opacity(f32),
}

/// The stack of mutators in effect at an embedded view's position,
/// outermost first. The embedder replays these onto the platform
/// compositor so native content lines up with painted content.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MutatorStack {
    stack: SmallVec<[Mutator; 8]>,
}

impl MutatorStack {
    /// An empty stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes a transform mutator.
    pub fn push_transform(&mut self, affine: Affine) {
        self.stack.push(Mutator::Transform(affine));
    }

    /// Pushes a clip mutator.
    pub fn push_clip(&mut self, shape: ClipShape) {
        self.stack.push(Mutator::Clip(shape));
    }

    /// Pushes an opacity mutator.
    pub fn push_opacity(&mut self, alpha: f32) {
        self.stack.push(Mutator::Opacity(alpha));
    }

    /// Pops the most recent mutator.
    pub fn pop(&mut self) {
        self.stack.pop();
    }

    /// Iterates outermost to innermost.
    pub fn iter(&self) -> impl Iterator<Item = &Mutator> {
        self.stack.iter()
    }

    /// The accumulated transform of all transform mutators.
    pub fn total_transform(&self) -> Affine {
        self.stack.iter().fold(Affine::IDENTITY, |acc, m| match m {
            Mutator::Transform(t) => acc * *t,
            _ => acc,
        })
    }
}

/// Geometry and mutator state an embedded view must be composited with,
/// captured during preroll.
#[derive(Clone, Debug, PartialEq)]
pub struct EmbeddedViewParams {
    /// Root-space position of the view, in physical pixels.
    pub offset_pixels: Point,
    /// Size of the view in logical points.
    pub size_points: Size,
    /// Mutators between the root and the view.
    pub mutators: MutatorStack,
}

/// Composites platform views with painted content.
///
/// Platform composition is asynchronous relative to the canvas paint pass,
/// so views must be registered during preroll
/// ([`ViewEmbedder::preroll_composite_view`]) before
/// [`ViewEmbedder::composite_view`] runs during paint; compositing an
/// unregistered view is a caller contract violation the embedder is
/// entitled to treat as fatal.
pub trait ViewEmbedder {
    /// Registers `view_id` for composition this frame with the given
    /// geometry and mutators.
    fn preroll_composite_view(&mut self, view_id: ViewId, params: EmbeddedViewParams);

    /// Returns the overlay canvas for content painted above `view_id`, or
    /// `None` if the embedder cannot composite the view this frame.
    fn composite_view(&mut self, view_id: ViewId) -> Option<&mut dyn Canvas>;
}

/// An externally-produced texture, painted on the raster context.
pub trait ExternalTexture {
    /// Paints the current frame of the texture into `bounds`. When
    /// `freeze` is set the texture must keep presenting its last frame
    /// (used across surface reconfiguration).
    fn paint(&mut self, canvas: &mut dyn Canvas, bounds: Rect, freeze: bool);

    /// Called when the GPU context is (re)created.
    fn on_context_created(&mut self) {}

    /// Called when the GPU context is about to be destroyed; the texture
    /// must drop any GPU resources it holds.
    fn on_context_destroyed(&mut self) {}
}

/// Maps opaque texture identifiers to their producers.
///
/// Owned by the raster context; registration and lookup both happen there.
#[derive(Default)]
pub struct TextureRegistry {
    mapping: BTreeMap<TextureId, Box<dyn ExternalTexture>>,
}

impl TextureRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a texture, replacing any previous producer with the
    /// same id.
    pub fn register(&mut self, id: TextureId, texture: Box<dyn ExternalTexture>) {
        if self.mapping.insert(id, texture).is_some() {
            log::warn!("replacing texture already registered with id {}", id.0);
        }
    }

    /// Unregisters a texture; unknown ids are ignored.
    pub fn unregister(&mut self, id: TextureId) {
        if self.mapping.remove(&id).is_none() {
            log::warn!("unregistering unknown texture id {}", id.0);
        }
    }

    /// Looks up a texture producer.
    pub fn get_mut(&mut self, id: TextureId) -> Option<&mut (dyn ExternalTexture + '_)> {
        match self.mapping.get_mut(&id) {
            Some(texture) => Some(&mut **texture),
            None => None,
        }
    }

    /// Number of registered textures.
    pub fn len(&self) -> usize {
        self.mapping.len()
    }

    /// Whether no textures are registered.
    pub fn is_empty(&self) -> bool {
        self.mapping.is_empty()
    }

    /// Notifies every texture that the GPU context was created.
    pub fn on_context_created(&mut self) {
        for texture in self.mapping.values_mut() {
            texture.on_context_created();
        }
    }

    /// Notifies every texture that the GPU context is going away.
    pub fn on_context_destroyed(&mut self) {
        for texture in self.mapping.values_mut() {
            texture.on_context_destroyed();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct CountingTexture {
        created: Arc<AtomicUsize>,
        destroyed: Arc<AtomicUsize>,
    }

    impl ExternalTexture for CountingTexture {
        fn paint(&mut self, _canvas: &mut dyn Canvas, _bounds: Rect, _freeze: bool) {}

        fn on_context_created(&mut self) {
            self.created.fetch_add(1, Ordering::Relaxed);
        }

        fn on_context_destroyed(&mut self) {
            self.destroyed.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[test]
    fn registry_register_lookup_unregister() {
        let mut registry = TextureRegistry::new();
        registry.register(TextureId(7), Box::new(CountingTexture::default()));
        assert!(registry.get_mut(TextureId(7)).is_some());
        assert!(registry.get_mut(TextureId(8)).is_none());
        registry.unregister(TextureId(7));
        assert!(registry.is_empty());
    }

    #[test]
    fn context_notifications_reach_all_textures() {
        let created = Arc::new(AtomicUsize::new(0));
        let destroyed = Arc::new(AtomicUsize::new(0));
        let mut registry = TextureRegistry::new();
        registry.register(
            TextureId(1),
            Box::new(CountingTexture {
                created: created.clone(),
                destroyed: destroyed.clone(),
            }),
        );
        registry.on_context_created();
        registry.on_context_destroyed();
        assert_eq!(created.load(Ordering::Relaxed), 1);
        assert_eq!(destroyed.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn mutator_stack_accumulates_transforms() {
        let mut stack = MutatorStack::new();
        stack.push_transform(Affine::translate((10.0, 0.0)));
        stack.push_opacity(0.5);
        stack.push_transform(Affine::translate((0.0, 5.0)));
        assert_eq!(
            stack.total_transform(),
            Affine::translate((10.0, 0.0)) * Affine::translate((0.0, 5.0))
        );
        stack.pop();
        assert_eq!(stack.total_transform(), Affine::translate((10.0, 0.0)));
    }
}
