//! The self-contained software backend.
//!
//! Three stacked layers mirror the output surfaces of the original host:
//! a lazily re-rendered backdrop, the persistent pen layer, and a sprite
//! layer cleared every frame. All pixel queries run here, at zoom 1 in
//! stage pixels, over two working surfaces owned by the renderer (queries
//! are non-reentrant by construction: every entry point takes `&mut self`).

use std::collections::HashMap;

use kurbo::Affine;
use tracing::{debug, info};

use crate::foundation::core::{
    Bounds, FrameRgba, Rgb24, STAGE_HEIGHT, STAGE_WIDTH, stage_to_screen,
};
use crate::foundation::error::{RenderError, RenderResult};
use crate::model::pen::PenColor;
use crate::model::target::{Child, RotationStyle, Sprite, Stage};
use crate::render::effects::PixelFx;
use crate::render::surface::{Compose, SourceImage, Surface, unpremultiply};
use crate::render::{ProjectRenderer, RendererConfig, SpriteRenderer, placement_transform};

/// Per-draw options for [`SoftwareRenderer::render_child`].
#[derive(Clone, Copy)]
struct ChildDrawOpts {
    /// Stage zoom used for LOD selection.
    zoom: f64,
    /// Device pixels per stage unit.
    k: f64,
    /// Device-pixel offset subtracted after the transform (query clip rects).
    origin: (f64, f64),
    /// Suppress ghost and color effects (color-query masking).
    no_effects: bool,
    compose: Compose,
}

impl ChildDrawOpts {
    fn frame(zoom: f64, k: f64) -> Self {
        Self {
            zoom,
            k,
            origin: (0.0, 0.0),
            no_effects: false,
            compose: Compose::SourceOver,
        }
    }

    fn query(origin: (i32, i32)) -> Self {
        Self {
            zoom: 1.0,
            k: 1.0,
            origin: (f64::from(origin.0), f64::from(origin.1)),
            no_effects: false,
            compose: Compose::SourceOver,
        }
    }
}

/// CPU stage renderer over premultiplied RGBA8 surfaces.
pub struct SoftwareRenderer {
    config: RendererConfig,
    zoom: f64,

    stage_surface: Surface,
    pen_surface: Surface,
    sprite_surface: Surface,

    pen_zoom: f64,
    pending_pen_zoom: Option<f64>,
    pen_written: bool,

    stage_rendered_costume: Option<usize>,

    work_a: Surface,
    work_b: Surface,
    hue_memo: HashMap<u32, [u8; 3]>,
}

fn surface_dims(zoom: f64) -> (u32, u32) {
    (
        ((f64::from(STAGE_WIDTH) * zoom).round().max(1.0)) as u32,
        ((f64::from(STAGE_HEIGHT) * zoom).round().max(1.0)) as u32,
    )
}

impl SoftwareRenderer {
    /// Build a software renderer with surfaces sized for zoom 1.
    pub fn new(config: RendererConfig) -> Self {
        let (w, h) = surface_dims(config.scale);
        info!(scale = config.scale, accurate = config.accurate_filters, "software renderer up");
        Self {
            config,
            zoom: 1.0,
            stage_surface: Surface::new(w, h),
            pen_surface: Surface::new(STAGE_WIDTH, STAGE_HEIGHT),
            sprite_surface: Surface::new(w, h),
            pen_zoom: 1.0,
            pending_pen_zoom: None,
            pen_written: false,
            stage_rendered_costume: None,
            work_a: Surface::new(1, 1),
            work_b: Surface::new(1, 1),
            hue_memo: HashMap::new(),
        }
    }

    /// The renderer's configuration.
    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    fn k(&self) -> f64 {
        self.zoom * self.config.scale
    }

    /// Draw one child onto a surface. Missing costumes and degenerate
    /// (sub-unit or non-finite) destination rects are skipped; every exit
    /// path leaves the surface consistent.
    fn render_child(
        config: &RendererConfig,
        surface: &mut Surface,
        memo: &mut HashMap<u32, [u8; 3]>,
        child: Child<'_>,
        opts: ChildDrawOpts,
    ) {
        let Some(costume) = child.costume() else {
            return;
        };
        let p = child.placement();
        let object_scale = costume.scale() * p.scale;
        let w = costume.width() as f64 * object_scale;
        let h = costume.height() as f64 * object_scale;
        if !(w >= 1.0 && h >= 1.0) {
            return;
        }

        let lod = costume.lod(object_scale * opts.zoom);
        let transform = Affine::translate((-opts.origin.0, -opts.origin.1))
            * placement_transform(&p, costume, opts.k)
            * Affine::scale(costume.lod_pixel_scale(lod));

        let filters = child.filters();
        let (opacity, mut fx) = if opts.no_effects {
            (1.0, None)
        } else {
            (
                filters.ghost_opacity(),
                PixelFx::build(filters, config.accurate_filters, memo),
            )
        };

        surface.draw_image(
            &SourceImage {
                pixels: lod.pixels(),
                width: lod.width(),
                height: lod.height(),
            },
            transform,
            opacity,
            opts.compose,
            fx.as_mut(),
        );
    }

    fn sprite<'a>(&self, stage: &'a Stage, index: usize) -> RenderResult<&'a Sprite> {
        stage
            .children
            .get(index)
            .ok_or_else(|| RenderError::resource(format!("no sprite at index {index}")))
    }

    /// Render everything except `skip` (backdrop, pen, other visible
    /// children) into `work_a` over the given clip rect.
    fn render_others(&mut self, stage: &Stage, skip: usize, origin: (i32, i32)) {
        Self::render_child(
            &self.config,
            &mut self.work_a,
            &mut self.hue_memo,
            Child::Stage(stage),
            ChildDrawOpts::query(origin),
        );
        let pen_transform = Affine::translate((-f64::from(origin.0), -f64::from(origin.1)))
            * Affine::scale(1.0 / self.pen_zoom);
        self.work_a
            .draw_surface(&self.pen_surface, pen_transform, 1.0, Compose::SourceOver);
        for (i, child) in stage.children.iter().enumerate() {
            if i == skip || !child.visible {
                continue;
            }
            Self::render_child(
                &self.config,
                &mut self.work_a,
                &mut self.hue_memo,
                Child::Sprite(child),
                ChildDrawOpts::query(origin),
            );
        }
    }
}

/// Integer screen-space clip rect for a stage-space bounds, or `None` when
/// the rect is degenerate (sub-pixel or NaN).
fn screen_rect(b: &Bounds) -> Option<(i32, i32, u32, u32)> {
    let left = 240.0 + b.left;
    let top = 180.0 - b.top;
    let right = 240.0 + b.right;
    let bottom = 180.0 - b.bottom;
    let w = right - left;
    let h = bottom - top;
    if !(w >= 1.0) || !(h >= 1.0) {
        return None;
    }
    let x0 = left.floor();
    let y0 = top.floor();
    let x1 = right.ceil();
    let y1 = bottom.ceil();
    if !(x0.is_finite() && y0.is_finite() && x1.is_finite() && y1.is_finite()) {
        return None;
    }
    Some((x0 as i32, y0 as i32, (x1 - x0) as u32, (y1 - y0) as u32))
}

fn pack_rgb(px: [u8; 4]) -> u32 {
    (u32::from(px[0]) << 16) | (u32::from(px[1]) << 8) | u32::from(px[2])
}

impl SpriteRenderer for SoftwareRenderer {
    fn draw_child(&mut self, child: Child<'_>) -> RenderResult<()> {
        let opts = ChildDrawOpts::frame(self.zoom, self.k());
        Self::render_child(
            &self.config,
            &mut self.sprite_surface,
            &mut self.hue_memo,
            child,
            opts,
        );
        Ok(())
    }
}

impl ProjectRenderer for SoftwareRenderer {
    fn draw_frame(&mut self, stage: &Stage) -> RenderResult<()> {
        let k = self.k();
        let (w, h) = surface_dims(k);

        let stage_stale = self.stage_surface.width() != w
            || self.stage_surface.height() != h
            || self.stage_rendered_costume != Some(stage.current_costume);
        if stage_stale {
            self.stage_surface.resize_clearing(w, h);
            Self::render_child(
                &self.config,
                &mut self.stage_surface,
                &mut self.hue_memo,
                Child::Stage(stage),
                ChildDrawOpts::frame(self.zoom, k),
            );
            self.stage_rendered_costume = Some(stage.current_costume);
        }

        self.sprite_surface.resize_clearing(w, h);
        for child in &stage.children {
            if !child.visible {
                continue;
            }
            Self::render_child(
                &self.config,
                &mut self.sprite_surface,
                &mut self.hue_memo,
                Child::Sprite(child),
                ChildDrawOpts::frame(self.zoom, k),
            );
        }
        Ok(())
    }

    fn frame(&mut self) -> RenderResult<FrameRgba> {
        let (w, h) = surface_dims(self.k());
        let mut out = Surface::new(w, h);

        let stage_scale = w as f64 / f64::from(self.stage_surface.width().max(1));
        out.draw_surface(
            &self.stage_surface,
            Affine::scale(stage_scale),
            1.0,
            Compose::SourceOver,
        );
        out.draw_surface(
            &self.pen_surface,
            Affine::scale(self.k() / self.pen_zoom),
            1.0,
            Compose::SourceOver,
        );
        let sprite_scale = w as f64 / f64::from(self.sprite_surface.width().max(1));
        out.draw_surface(
            &self.sprite_surface,
            Affine::scale(sprite_scale),
            1.0,
            Compose::SourceOver,
        );

        Ok(FrameRgba {
            width: w,
            height: h,
            data: out.data().to_vec(),
        })
    }

    fn on_stage_filters_changed(&mut self) {
        self.stage_rendered_costume = None;
    }

    fn resize(&mut self, zoom: f64) {
        self.zoom = zoom;
        self.stage_rendered_costume = None;

        if zoom > self.pen_zoom {
            // Grow immediately, rescaling existing content.
            let (w, h) = surface_dims(zoom);
            let mut grown = Surface::new(w, h);
            grown.draw_surface(
                &self.pen_surface,
                Affine::scale(zoom / self.pen_zoom),
                1.0,
                Compose::SourceOver,
            );
            self.pen_surface = grown;
            self.pen_zoom = zoom;
            self.pending_pen_zoom = None;
            debug!(zoom, "pen layer grown");
        } else if zoom < self.pen_zoom {
            if self.pen_written {
                // Shrinking would destroy drawn detail; wait for pen_clear.
                self.pending_pen_zoom = Some(zoom);
            } else {
                let (w, h) = surface_dims(zoom);
                self.pen_surface.resize_clearing(w, h);
                self.pen_zoom = zoom;
                self.pending_pen_zoom = None;
            }
        }
    }

    fn pen_line(
        &mut self,
        color: &PenColor,
        size: f64,
        x1: f64,
        y1: f64,
        x2: f64,
        y2: f64,
    ) -> RenderResult<()> {
        let z = self.pen_zoom;
        let (mut sx1, mut sy1) = stage_to_screen(x1, y1, 1.0);
        let (mut sx2, mut sy2) = stage_to_screen(x2, y2, 1.0);
        if z == 1.0 {
            // Odd-width strokes land on pixel centers.
            let m = size.rem_euclid(2.0);
            if m > 0.5 && m < 1.5 {
                sx1 -= 0.5;
                sy1 -= 0.5;
                sx2 -= 0.5;
                sy2 -= 0.5;
            }
        }
        self.pen_surface.stroke_line_round(
            sx1 * z,
            sy1 * z,
            sx2 * z,
            sy2 * z,
            (size / 2.0) * z,
            color.to_rgba8(),
        );
        self.pen_written = true;
        Ok(())
    }

    fn pen_dot(&mut self, color: &PenColor, size: f64, x: f64, y: f64) -> RenderResult<()> {
        let z = self.pen_zoom;
        let (sx, sy) = stage_to_screen(x, y, z);
        self.pen_surface
            .fill_circle(sx, sy, (size / 2.0) * z, color.to_rgba8());
        self.pen_written = true;
        Ok(())
    }

    fn pen_stamp(&mut self, stage: &Stage, sprite: usize) -> RenderResult<()> {
        let sprite = self.sprite(stage, sprite)?;
        let opts = ChildDrawOpts::frame(self.pen_zoom, self.pen_zoom);
        Self::render_child(
            &self.config,
            &mut self.pen_surface,
            &mut self.hue_memo,
            Child::Sprite(sprite),
            opts,
        );
        self.pen_written = true;
        Ok(())
    }

    fn pen_clear(&mut self) -> RenderResult<()> {
        if let Some(zoom) = self.pending_pen_zoom.take() {
            let (w, h) = surface_dims(zoom);
            self.pen_surface.resize_clearing(w, h);
            self.pen_zoom = zoom;
        } else {
            self.pen_surface.clear();
        }
        self.pen_written = false;
        Ok(())
    }

    fn sprite_touches_point(
        &mut self,
        stage: &Stage,
        sprite: usize,
        x: f64,
        y: f64,
    ) -> RenderResult<bool> {
        let sprite = self.sprite(stage, sprite)?;
        if !sprite.rotated_bounds().contains(x, y) {
            return Ok(false);
        }
        let Some(costume) = sprite.costume() else {
            return Ok(false);
        };

        // Undo the sprite's scale and orientation to land in costume space.
        let mut cx = (x - sprite.x) / sprite.scale;
        let mut cy = (sprite.y - y) / sprite.scale;
        match sprite.rotation_style {
            RotationStyle::Normal if sprite.direction != 90.0 => {
                let d = (90.0 - sprite.direction).to_radians();
                let (sin, cos) = d.sin_cos();
                let ox = cx;
                cx = cos * ox - sin * cy;
                cy = sin * ox + cos * cy;
            }
            RotationStyle::LeftRight if sprite.direction < 0.0 => cx = -cx,
            _ => {}
        }

        let px = (cx * costume.bitmap_resolution() + costume.rotation_center_x()).round();
        let py = (cy * costume.bitmap_resolution() + costume.rotation_center_y()).round();
        Ok(costume
            .primary_lod()
            .pixel(px as i64, py as i64)
            .is_some_and(|p| p[3] != 0))
    }

    fn sprites_intersect(
        &mut self,
        stage: &Stage,
        sprite: usize,
        others: &[usize],
    ) -> RenderResult<bool> {
        let a_index = sprite;
        let mb = self.sprite(stage, a_index)?.rotated_bounds();

        for &other in others {
            if other == a_index {
                continue;
            }
            let b = self.sprite(stage, other)?;
            if !b.visible {
                continue;
            }
            let rb = b.rotated_bounds();
            if !mb.overlaps(&rb) {
                continue;
            }
            let Some(clip) = mb.intersection(&rb) else {
                continue;
            };
            let Some((ox, oy, w, h)) = screen_rect(&clip) else {
                continue;
            };

            self.work_a.resize_clearing(w, h);
            let a = self.sprite(stage, a_index)?;
            Self::render_child(
                &self.config,
                &mut self.work_a,
                &mut self.hue_memo,
                Child::Sprite(a),
                ChildDrawOpts::query((ox, oy)),
            );
            let b = self.sprite(stage, other)?;
            Self::render_child(
                &self.config,
                &mut self.work_a,
                &mut self.hue_memo,
                Child::Sprite(b),
                ChildDrawOpts {
                    compose: Compose::SourceIn,
                    ..ChildDrawOpts::query((ox, oy))
                },
            );
            if self.work_a.any_pixel(|p| p[3] != 0) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn sprite_touches_color(
        &mut self,
        stage: &Stage,
        sprite: usize,
        color: Rgb24,
    ) -> RenderResult<bool> {
        let index = sprite;
        let bounds = self.sprite(stage, index)?.rotated_bounds().clamped_to_stage();
        let Some((ox, oy, w, h)) = screen_rect(&bounds) else {
            return Ok(false);
        };

        self.work_a.resize_clearing(w, h);
        self.render_others(stage, index, (ox, oy));

        let probe = self.sprite(stage, index)?;
        Self::render_child(
            &self.config,
            &mut self.work_a,
            &mut self.hue_memo,
            Child::Sprite(probe),
            ChildDrawOpts {
                no_effects: true,
                compose: Compose::DestinationIn,
                ..ChildDrawOpts::query((ox, oy))
            },
        );

        let want = color.value();
        Ok(self.work_a.any_pixel(|p| {
            p[3] != 0 && pack_rgb(unpremultiply(p)) == want
        }))
    }

    fn sprite_color_touches_color(
        &mut self,
        stage: &Stage,
        sprite: usize,
        sprite_color: Rgb24,
        other_color: Rgb24,
    ) -> RenderResult<bool> {
        let index = sprite;
        let bounds = self.sprite(stage, index)?.rotated_bounds().clamped_to_stage();
        let Some((ox, oy, w, h)) = screen_rect(&bounds) else {
            return Ok(false);
        };

        self.work_a.resize_clearing(w, h);
        self.render_others(stage, index, (ox, oy));

        self.work_b.resize_clearing(w, h);
        let probe = self.sprite(stage, index)?;
        // Effects stay on: the probe side compares against the sprite's
        // displayed color, not its raw costume.
        Self::render_child(
            &self.config,
            &mut self.work_b,
            &mut self.hue_memo,
            Child::Sprite(probe),
            ChildDrawOpts::query((ox, oy)),
        );

        let want_sprite = sprite_color.value();
        let want_other = other_color.value();
        for (pa, pb) in self
            .work_a
            .data()
            .chunks_exact(4)
            .zip(self.work_b.data().chunks_exact(4))
        {
            if pa[3] == 0 || pb[3] == 0 {
                continue;
            }
            let pa = [pa[0], pa[1], pa[2], pa[3]];
            let pb = [pb[0], pb[1], pb[2], pb[3]];
            if pack_rgb(unpremultiply(pb)) == want_sprite
                && pack_rgb(unpremultiply(pa)) == want_other
            {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/software.rs"]
mod tests;
