//! Stagehand is a 2D sprite compositor for a Scratch-compatible stage.
//!
//! It renders a stage backdrop, a persistent pen layer, and a z-ordered list
//! of sprites into a single frame, and answers the pixel-exact spatial
//! queries (point-in-sprite, sprite intersection, color touching) that
//! scripting primitives are built on. Per-sprite image effects (ghost,
//! brightness, hue, mosaic, whirl, fisheye, pixelate) reproduce the Scratch
//! 3.0 pixel semantics.
//!
//! # Backends
//!
//! - [`SoftwareRenderer`]: self-contained CPU rasterizer over premultiplied
//!   RGBA8 surfaces; exact nearest-neighbor compositing, all queries.
//! - [`GpuRenderer`]: wgpu-accelerated; shape-warping effects run in a
//!   flag-gated shader, and queries the GPU has no advantage on delegate to
//!   an embedded software renderer.
//!
//! The key design constraints:
//!
//! - **No unsafe**: `unsafe` is forbidden in this crate.
//! - **One compositing contract**: queries read pixels through the same
//!   transform and effect pipeline that rendering uses, on both backends.
//! - **Premultiplied RGBA8** end-to-end: composed frames read back
//!   premultiplied pixels.
//! - **Single-threaded cooperative**: every operation runs synchronously on
//!   the caller's thread; `&mut self` makes queries non-reentrant.
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod foundation;
mod model;
mod render;

pub use foundation::core::{
    Bounds, FrameRgba, Rgb24, Rgba8Premul, STAGE_HEIGHT, STAGE_WIDTH, stage_to_screen,
};
pub use foundation::error::{RenderError, RenderResult};
pub use foundation::math::{Mat3, hsv_to_rgb, rgb_to_hsv};

pub use model::costume::{Costume, CostumeLod};
pub use model::filters::Filters;
pub use model::pen::PenColor;
pub use model::target::{Child, RotationStyle, Sprite, Stage};

pub use render::gpu::GpuRenderer;
pub use render::software::SoftwareRenderer;
pub use render::{
    BackendKind, ProjectRenderer, RendererConfig, SpriteRenderer, create_backend,
};
