//! Per-sprite image effect values and their derived shader quantities.

/// The six-channel effect record attached to every sprite and the stage.
///
/// All channels default to 0 (no effect). Semantics follow Scratch 3.0:
/// `ghost` in `[0, 100]` fades alpha, `brightness` in `[-100, 100]` offsets
/// each channel, `color` shifts hue in 1/200ths of a turn, and the four
/// shape channels (`mosaic`, `pixelate`, `whirl`, `fisheye`) warp texture
/// coordinates before sampling.
#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Filters {
    /// Opacity fade: opacity is `1 - ghost/100`.
    pub ghost: f64,
    /// Additive channel offset, `brightness/100` per channel.
    pub brightness: f64,
    /// Hue shift in 1/200ths of a full turn.
    pub color: f64,
    /// Tiling repeat count input.
    pub mosaic: f64,
    /// Pixelation block size input.
    pub pixelate: f64,
    /// Swirl angle in degrees.
    pub whirl: f64,
    /// Lens distortion input.
    pub fisheye: f64,
}

impl Filters {
    /// True when any texture-coordinate-warping channel is active. Such
    /// filters change a sprite's shape, so pixel queries cannot use the
    /// plain costume raster.
    pub fn is_shape_affecting(&self) -> bool {
        self.fisheye != 0.0 || self.mosaic != 0.0 || self.pixelate != 0.0 || self.whirl != 0.0
    }

    /// True when a per-pixel color transform is needed (hue or brightness).
    pub(crate) fn has_color_transform(&self) -> bool {
        self.color != 0.0 || self.brightness != 0.0
    }

    /// CSS filter string approximating the color effects, for hosts with a
    /// declarative filter surface. Ghost is intentionally excluded; callers
    /// apply it through the surface's global alpha instead.
    pub fn css_approximation(&self) -> String {
        let mut parts = Vec::new();
        if self.brightness != 0.0 {
            parts.push(format!("brightness({}%)", 100.0 + self.brightness));
        }
        if self.color != 0.0 {
            parts.push(format!("hue-rotate({}deg)", (self.color / 200.0) * 360.0));
        }
        parts.join(" ")
    }

    /// Draw opacity from the ghost channel, clamped to `[0, 1]`.
    pub fn ghost_opacity(&self) -> f64 {
        (1.0 - self.ghost / 100.0).clamp(0.0, 1.0)
    }

    /// Per-channel brightness offset in `[-1, 1]`.
    pub fn brightness_offset(&self) -> f64 {
        (self.brightness / 100.0).clamp(-1.0, 1.0)
    }

    /// Hue shift in fractional turns (may be any real; wrapping happens at
    /// application time).
    pub fn color_shift(&self) -> f64 {
        self.color / 200.0
    }

    /// Mosaic tile count: `round((|m| + 10) / 10)` clamped to `[1, 512]`.
    pub fn mosaic_steps(&self) -> f32 {
        (((self.mosaic.abs() + 10.0) / 10.0).round()).clamp(1.0, 512.0) as f32
    }

    /// Pixelation block edge in texels, `|p| / 10`.
    pub fn pixelate_size(&self) -> f32 {
        (self.pixelate.abs() / 10.0) as f32
    }

    /// Whirl angle in radians, negated to match the stage's handedness.
    pub fn whirl_radians(&self) -> f32 {
        (-self.whirl.to_radians()) as f32
    }

    /// Fisheye exponent `max(0, (f + 100) / 100)`; 1 is neutral.
    pub fn fisheye_power(&self) -> f32 {
        (((self.fisheye + 100.0) / 100.0).max(0.0)) as f32
    }
}

#[cfg(test)]
#[path = "../../tests/unit/model/filters.rs"]
mod tests;
