// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Strata is a retained-mode compositor core: a layer tree, a raster
//! cache, a frame differ and a frame-pacing scheduler, with no GPU code of
//! its own.
//!
//! The producer (a UI toolkit, an animation runtime) records content into
//! [`Picture`]s and assembles them with transforms, clips, opacity groups
//! and filters into a [`LayerTree`]; one tree describes one frame. The
//! raster context replays trees through a [`CompositorContext`] onto
//! whatever [`Canvas`] the backend provides, reusing rasterized content
//! across frames via the [`RasterCache`] and, with
//! [`diff_layer_trees`], repainting only the pixels that changed.
//! [`FrameScheduler`] paces how trees flow from producer to display.
//!
//! ## Coordinate spaces
//!
//! Layer content is authored in logical units; the tree's device pixel
//! ratio maps those to device pixels at the root. Cached images, damage
//! regions and embedded-view offsets are all expressed in device pixels.
//!
//! ## Threading
//!
//! Trees are `Send`: built on the producer thread, rastered on the raster
//! thread. Everything hanging off [`CompositorContext`] is confined to
//! the raster thread; [`runloop`] has the pieces for wiring the threads
//! together.

// LINEBENDER LINT SET - lib.rs - v2
// See https://linebender.org/wiki/canonical-lints/
// These lints aren't included in Cargo.toml because they
// shouldn't apply to examples and tests
#![warn(unused_crate_dependencies)]
#![warn(clippy::print_stdout, clippy::print_stderr)]
// Targeting e.g. 32-bit means structs containing usize can give false positives for 64-bit.
#![cfg_attr(target_pointer_width = "64", warn(clippy::trivially_copy_pass_by_ref))]
// END LINEBENDER LINT SET
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

mod canvas;
mod context;
mod diff;
mod geometry;
mod picture;
mod raster_cache;
mod tree;

pub mod embedder;
pub mod layer;
pub mod pacing;
pub mod runloop;

/// Re-export of the geometry and paint types used throughout the public
/// API.
pub use peniko;
pub use peniko::kurbo;

pub use canvas::{
    CacheImage, Canvas, CanvasCall, ClipMode, ClipShape, ImageFilter, ImageId, Paint,
    RecordingCanvas,
};
pub use context::{CompositorContext, ScopedFrame};
pub use diff::{diff_layer_trees, DamageRegion};
pub use layer::{Layer, LayerId, LayerKind, PaintContext, PrerollContext};
pub use pacing::{FrameScheduler, FrameSchedulerConfig, FrameWindow, SchedulerState};
pub use picture::{DrawOp, Picture, PictureId, PictureRecorder};
pub use raster_cache::{
    integral_transform, CacheId, RasterCache, RasterCacheConfig, Rasterizer,
};
pub use tree::LayerTree;

/// Errors thrown by methods in this crate.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// A [`FrameWindow`] was asked to render a second tree.
    #[error("frame already rendered in this frame window")]
    FrameAlreadyRendered,
}

pub(crate) type Result<T, E = Error> = std::result::Result<T, E>;
