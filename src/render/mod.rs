//! Renderer traits, shared configuration, and the child transform chain.

use kurbo::Affine;

use crate::foundation::core::{FrameRgba, Rgb24, stage_to_screen};
use crate::foundation::error::RenderResult;
use crate::model::costume::Costume;
use crate::model::pen::PenColor;
use crate::model::target::{Child, Placement, RotationStyle, Stage};

pub mod effects;
pub mod gpu;
pub mod software;
pub mod surface;
pub mod texture_cache;

/// Host-supplied rendering configuration, read at draw time.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RendererConfig {
    /// Global output scale applied on top of the stage zoom.
    pub scale: f64,
    /// Use exact Scratch pixel math for color/brightness instead of the CSS
    /// approximation.
    pub accurate_filters: bool,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            scale: 1.0,
            accurate_filters: false,
        }
    }
}

/// Something that can rasterize a single stage child.
pub trait SpriteRenderer {
    /// Render one sprite or the stage backdrop onto the output under the
    /// current transform state. Children without a current costume and
    /// degenerate (sub-pixel) draws are skipped silently.
    fn draw_child(&mut self, child: Child<'_>) -> RenderResult<()>;
}

/// A full stage renderer: frame composition, the pen layer, and the pixel
/// queries the interpreter's sensing primitives are built on.
///
/// Sprites are addressed by index into `stage.children` (z-order, bottom to
/// top). Queries are synchronous and reflect the state as of the last
/// completed frame plus any pen writes since then.
pub trait ProjectRenderer: SpriteRenderer {
    /// Compose a frame: backdrop, pen layer, then visible children in order.
    fn draw_frame(&mut self, stage: &Stage) -> RenderResult<()>;

    /// Read back the most recently composed frame as premultiplied RGBA8.
    fn frame(&mut self) -> RenderResult<FrameRgba>;

    /// Invalidate cached stage rendering after a stage filter change.
    fn on_stage_filters_changed(&mut self);

    /// Change the stage zoom. The output target resizes immediately; the pen
    /// layer only ever grows immediately and defers shrinking until the next
    /// [`ProjectRenderer::pen_clear`] so drawn detail survives.
    fn resize(&mut self, zoom: f64);

    /// Stroke a round-capped pen line between two stage points.
    fn pen_line(
        &mut self,
        color: &PenColor,
        size: f64,
        x1: f64,
        y1: f64,
        x2: f64,
        y2: f64,
    ) -> RenderResult<()>;

    /// Fill a pen dot of diameter `size` centered on a stage point.
    fn pen_dot(&mut self, color: &PenColor, size: f64, x: f64, y: f64) -> RenderResult<()>;

    /// Composite one sprite onto the pen layer through the regular draw path
    /// (effects honored).
    fn pen_stamp(&mut self, stage: &Stage, sprite: usize) -> RenderResult<()>;

    /// Clear the pen layer to transparent and commit any deferred shrink.
    fn pen_clear(&mut self) -> RenderResult<()>;

    /// Whether the sprite's costume has non-transparent pixels at a stage
    /// point.
    fn sprite_touches_point(
        &mut self,
        stage: &Stage,
        sprite: usize,
        x: f64,
        y: f64,
    ) -> RenderResult<bool>;

    /// Whether the sprite overlaps any of the listed visible sprites,
    /// pixel-exactly.
    fn sprites_intersect(
        &mut self,
        stage: &Stage,
        sprite: usize,
        others: &[usize],
    ) -> RenderResult<bool>;

    /// Whether the sprite touches a pixel of the given 24-bit color in the
    /// rest of the composed stage (backdrop, pen, other sprites).
    fn sprite_touches_color(
        &mut self,
        stage: &Stage,
        sprite: usize,
        color: Rgb24,
    ) -> RenderResult<bool>;

    /// Whether a pixel of `sprite_color` inside the sprite sits on a pixel of
    /// `other_color` in the rest of the composed stage.
    fn sprite_color_touches_color(
        &mut self,
        stage: &Stage,
        sprite: usize,
        sprite_color: Rgb24,
        other_color: Rgb24,
    ) -> RenderResult<bool>;
}

/// Available backend kinds.
#[derive(Clone, Copy, Debug)]
pub enum BackendKind {
    /// Self-contained CPU rasterizer; always available.
    Software,
    /// wgpu-accelerated backend; requires a compatible adapter.
    Gpu,
}

/// Create a stage renderer of the given kind.
pub fn create_backend(
    kind: BackendKind,
    config: RendererConfig,
) -> RenderResult<Box<dyn ProjectRenderer>> {
    match kind {
        BackendKind::Software => Ok(Box::new(software::SoftwareRenderer::new(config))),
        BackendKind::Gpu => Ok(Box::new(gpu::GpuRenderer::new(config)?)),
    }
}

/// The per-child transform chain shared by both backends: primary-bitmap
/// pixels to output device pixels.
///
/// `k` is device pixels per stage unit (stage zoom times the global output
/// scale); the screen-position translate is snapped to integer pixels of
/// that effective grid to avoid seam shimmer.
pub(crate) fn placement_transform(p: &Placement, costume: &Costume, k: f64) -> Affine {
    let (sx, sy) = stage_to_screen(p.x, p.y, 1.0);
    let tx = (sx * k).round() / k;
    let ty = (sy * k).round() / k;

    let orient = match p.rotation_style {
        RotationStyle::Normal if p.direction != 90.0 => {
            Affine::rotate((p.direction - 90.0).to_radians())
        }
        RotationStyle::LeftRight if p.direction < 0.0 => Affine::scale_non_uniform(-1.0, 1.0),
        _ => Affine::IDENTITY,
    };

    let object_scale = costume.scale() * p.scale;
    Affine::scale(k)
        * Affine::translate((tx, ty))
        * orient
        * Affine::scale(object_scale)
        * Affine::translate((-costume.rotation_center_x(), -costume.rotation_center_y()))
}
