// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The drawing interface the compositor issues calls against.
//!
//! The core never talks to a GPU API directly; the paint pass of the layer
//! tree is expressed entirely in terms of [`Canvas`], a PostScript-style
//! save/restore surface with clipping, layer composition and a small set of
//! draw primitives. Backends (wgpu, software, a test recorder) implement
//! this trait; the swapchain and surface lifetime stay on their side.

use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU64, Ordering};

use peniko::kurbo::{Affine, BezPath, Rect, RoundedRect, Shape};
use peniko::{BlendMode, Brush, Color};

/// Paint state applied to a draw primitive or an offscreen layer.
#[derive(Clone, Debug, PartialEq)]
pub struct Paint {
    /// Color, gradient or image source.
    pub brush: Brush,
    /// How the primitive composes against the destination.
    pub blend: BlendMode,
    /// Extra alpha in `0.0..=1.0`, multiplied into the brush.
    pub alpha: f32,
    /// Whether edges are anti-aliased.
    pub anti_alias: bool,
    /// Filter applied to the primitive (or to an offscreen layer's
    /// contents when used with [`Canvas::save_layer`]).
    pub image_filter: Option<ImageFilter>,
}

impl Default for Paint {
    fn default() -> Self {
        Self {
            brush: Brush::Solid(Color::BLACK),
            blend: BlendMode::default(),
            alpha: 1.0,
            anti_alias: true,
            image_filter: None,
        }
    }
}

impl Paint {
    /// A default paint with a solid color brush.
    pub fn from_color(color: Color) -> Self {
        Self {
            brush: Brush::Solid(color),
            ..Self::default()
        }
    }

    /// A paint that only modulates alpha, for group opacity layers.
    pub fn from_alpha(alpha: f32) -> Self {
        Self {
            alpha: alpha.clamp(0.0, 1.0),
            ..Self::default()
        }
    }

    /// A paint that applies an image filter to an offscreen layer.
    pub fn from_image_filter(filter: ImageFilter) -> Self {
        Self {
            image_filter: Some(filter),
            ..Self::default()
        }
    }
}

/// A filter kernel applied to rasterized content.
///
/// The variants are deliberately closed; bounds mapping must be computable
/// on the CPU during preroll, before any pixels exist.
#[derive(Clone, Debug, PartialEq)]
pub enum ImageFilter {
    /// Gaussian blur with independent horizontal and vertical sigmas.
    Blur { sigma_x: f64, sigma_y: f64 },
    /// Morphological dilate (grows bright regions).
    Dilate { radius_x: f64, radius_y: f64 },
    /// Morphological erode (shrinks bright regions).
    Erode { radius_x: f64, radius_y: f64 },
}

impl ImageFilter {
    /// Maps input content bounds to the bounds the filtered output may
    /// touch. Conservative: never under-reports.
    pub fn map_bounds(&self, input: Rect) -> Rect {
        if crate::geometry::is_empty(input) {
            return Rect::ZERO;
        }
        match *self {
            // Gaussian support is infinite; 3 sigma covers >99.7% of the
            // kernel mass, matching what rasterizers actually sample.
            Self::Blur { sigma_x, sigma_y } => input.inflate(3.0 * sigma_x, 3.0 * sigma_y),
            Self::Dilate { radius_x, radius_y } => input.inflate(radius_x, radius_y),
            Self::Erode { radius_x, radius_y } => {
                let r = input.inflate(-radius_x, -radius_y);
                if crate::geometry::is_empty(r) {
                    Rect::ZERO
                } else {
                    r
                }
            }
        }
    }

    /// Rewrites the filter so it can be applied to content that was
    /// rasterized under `transform`, or `None` if the composition cannot be
    /// expressed with a local matrix (rotation or skew present).
    pub fn with_local_matrix(&self, transform: Affine) -> Option<Self> {
        let [a, b, c, d, _, _] = transform.as_coeffs();
        if b != 0.0 || c != 0.0 {
            return None;
        }
        let (sx, sy) = (a.abs(), d.abs());
        Some(match *self {
            Self::Blur { sigma_x, sigma_y } => Self::Blur {
                sigma_x: sigma_x * sx,
                sigma_y: sigma_y * sy,
            },
            Self::Dilate { radius_x, radius_y } => Self::Dilate {
                radius_x: radius_x * sx,
                radius_y: radius_y * sy,
            },
            Self::Erode { radius_x, radius_y } => Self::Erode {
                radius_x: radius_x * sx,
                radius_y: radius_y * sy,
            },
        })
    }
}

/// Shape a clip operation is performed with.
#[derive(Clone, Debug, PartialEq)]
pub enum ClipShape {
    Rect(Rect),
    RoundedRect(RoundedRect),
    Path(BezPath),
}

impl ClipShape {
    /// Axis-aligned bounds of the clip shape.
    pub fn bounds(&self) -> Rect {
        match self {
            Self::Rect(r) => *r,
            Self::RoundedRect(rr) => rr.rect(),
            Self::Path(p) => p.bounding_box(),
        }
    }
}

/// How a layer clips its children.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ClipMode {
    /// No clip is applied.
    None,
    /// Aliased clip; cheapest.
    HardEdge,
    /// Anti-aliased clip.
    AntiAlias,
    /// Anti-aliased clip rendered through an offscreen layer. Avoids the
    /// bleeding-edge artifact where anti-aliased clip edges and
    /// anti-aliased geometry edges blend against each other.
    AntiAliasWithSaveLayer,
}

/// Identifier for a backend image produced by a [`crate::Rasterizer`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ImageId(pub NonZeroU64);

impl ImageId {
    /// Allocates the next id.
    pub fn next() -> Self {
        // We initialize with 1 so that the conversion below succeeds
        static ID_COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(NonZeroU64::new(ID_COUNTER.fetch_add(1, Ordering::Relaxed)).unwrap())
    }
}

/// Handle to a rasterized bitmap held by the backend.
///
/// The compositor core never sees pixels; it tracks where the image was
/// rasterized in device space so a cache hit can blit it back without
/// resampling.
#[derive(Clone, Debug, PartialEq)]
pub struct CacheImage {
    /// Backend identifier for the stored bitmap.
    pub id: ImageId,
    /// Device-space rect the image was rasterized at.
    pub device_bounds: Rect,
}

/// Canvas-like drawing surface exposed by the GPU backend.
///
/// Transforms accumulate like Skia's: `save`/`restore` bracket transform
/// and clip state, `save_layer` additionally redirects drawing into an
/// offscreen that is composited on restore using the given paint.
pub trait Canvas {
    /// Saves transform and clip state.
    fn save(&mut self);

    /// Saves state and redirects subsequent drawing into an offscreen
    /// layer covering `bounds`, composited on the matching `restore`.
    fn save_layer(&mut self, bounds: Rect, paint: Option<&Paint>);

    /// Like [`Canvas::save_layer`], but the layer is initialized with the
    /// current surface content filtered through `backdrop`.
    fn save_layer_with_backdrop(
        &mut self,
        bounds: Rect,
        paint: Option<&Paint>,
        backdrop: &ImageFilter,
    );

    /// Restores to the most recent save.
    fn restore(&mut self);

    /// Translates the current transform.
    fn translate(&mut self, dx: f64, dy: f64);

    /// Composes `affine` onto the current transform.
    fn transform(&mut self, affine: Affine);

    /// Replaces the current transform outright.
    fn set_transform(&mut self, affine: Affine);

    /// The current accumulated transform.
    fn current_transform(&self) -> Affine;

    /// Intersects the current clip with `shape`.
    fn clip_shape(&mut self, shape: &ClipShape, anti_alias: bool);

    /// Fills a rectangle.
    fn draw_rect(&mut self, rect: Rect, paint: &Paint);

    /// Fills a path.
    fn draw_path(&mut self, path: &BezPath, paint: &Paint);

    /// Fills the entire current clip.
    fn draw_paint(&mut self, paint: &Paint);

    /// Blits a previously rasterized image at its device bounds. The
    /// caller is responsible for resetting the transform first; cached
    /// images are stored in device space.
    fn draw_cache_image(&mut self, image: &CacheImage, paint: Option<&Paint>);

    /// Draws a drop shadow for `path` as cast by the standard overhead
    /// light rig (see [`crate::layer::PhysicalShapeLayer`]).
    fn draw_shadow(
        &mut self,
        path: &BezPath,
        color: Color,
        elevation: f64,
        transparent_occluder: bool,
        device_pixel_ratio: f64,
    );
}

/// One recorded [`Canvas`] call.
#[derive(Clone, Debug, PartialEq)]
pub enum CanvasCall {
    Save,
    SaveLayer {
        bounds: Rect,
        paint: Option<Paint>,
    },
    SaveLayerWithBackdrop {
        bounds: Rect,
        paint: Option<Paint>,
        backdrop: ImageFilter,
    },
    Restore,
    ClipShape {
        shape: ClipShape,
        anti_alias: bool,
    },
    DrawRect {
        rect: Rect,
        paint: Paint,
    },
    DrawPath {
        path: BezPath,
        paint: Paint,
    },
    DrawPaint {
        paint: Paint,
    },
    DrawCacheImage {
        image: CacheImage,
        paint: Option<Paint>,
    },
    DrawShadow {
        bounds: Rect,
        color: Color,
        elevation: f64,
    },
}

/// A [`Canvas`] that records the calls it receives.
///
/// Maintains a real transform stack so code that consults
/// [`Canvas::current_transform`] (integral snapping, cache lookups) behaves
/// exactly as it would against a live backend. Used by the test suites and
/// useful as a tracing shim around a real backend.
#[derive(Default)]
pub struct RecordingCanvas {
    calls: Vec<CanvasCall>,
    transform: Affine,
    saved: Vec<Affine>,
}

impl RecordingCanvas {
    /// A fresh recorder with an identity transform.
    pub fn new() -> Self {
        Self::default()
    }

    /// All calls recorded so far, in order.
    pub fn calls(&self) -> &[CanvasCall] {
        &self.calls
    }

    /// Number of draw calls (excluding state management).
    pub fn draw_count(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| {
                matches!(
                    c,
                    CanvasCall::DrawRect { .. }
                        | CanvasCall::DrawPath { .. }
                        | CanvasCall::DrawPaint { .. }
                        | CanvasCall::DrawCacheImage { .. }
                        | CanvasCall::DrawShadow { .. }
                )
            })
            .count()
    }
}

impl Canvas for RecordingCanvas {
    fn save(&mut self) {
        self.saved.push(self.transform);
        self.calls.push(CanvasCall::Save);
    }

    fn save_layer(&mut self, bounds: Rect, paint: Option<&Paint>) {
        self.saved.push(self.transform);
        self.calls.push(CanvasCall::SaveLayer {
            bounds,
            paint: paint.cloned(),
        });
    }

    fn save_layer_with_backdrop(
        &mut self,
        bounds: Rect,
        paint: Option<&Paint>,
        backdrop: &ImageFilter,
    ) {
        self.saved.push(self.transform);
        self.calls.push(CanvasCall::SaveLayerWithBackdrop {
            bounds,
            paint: paint.cloned(),
            backdrop: backdrop.clone(),
        });
    }

    fn restore(&mut self) {
        if let Some(t) = self.saved.pop() {
            self.transform = t;
        } else {
            log::warn!("restore without matching save on RecordingCanvas");
        }
        self.calls.push(CanvasCall::Restore);
    }

    fn translate(&mut self, dx: f64, dy: f64) {
        self.transform *= Affine::translate((dx, dy));
    }

    fn transform(&mut self, affine: Affine) {
        self.transform *= affine;
    }

    fn set_transform(&mut self, affine: Affine) {
        self.transform = affine;
    }

    fn current_transform(&self) -> Affine {
        self.transform
    }

    fn clip_shape(&mut self, shape: &ClipShape, anti_alias: bool) {
        self.calls.push(CanvasCall::ClipShape {
            shape: shape.clone(),
            anti_alias,
        });
    }

    fn draw_rect(&mut self, rect: Rect, paint: &Paint) {
        self.calls.push(CanvasCall::DrawRect {
            rect,
            paint: paint.clone(),
        });
    }

    fn draw_path(&mut self, path: &BezPath, paint: &Paint) {
        self.calls.push(CanvasCall::DrawPath {
            path: path.clone(),
            paint: paint.clone(),
        });
    }

    fn draw_paint(&mut self, paint: &Paint) {
        self.calls.push(CanvasCall::DrawPaint {
            paint: paint.clone(),
        });
    }

    fn draw_cache_image(&mut self, image: &CacheImage, paint: Option<&Paint>) {
        self.calls.push(CanvasCall::DrawCacheImage {
            image: image.clone(),
            paint: paint.cloned(),
        });
    }

    fn draw_shadow(
        &mut self,
        path: &BezPath,
        color: Color,
        elevation: f64,
        _transparent_occluder: bool,
        _device_pixel_ratio: f64,
    ) {
        self.calls.push(CanvasCall::DrawShadow {
            bounds: path.bounding_box(),
            color,
            elevation,
        });
    }
}
