//! Per-pixel color effect evaluation for the software backend.
//!
//! Two modes mirror the rendering contract: accurate mode reproduces the
//! Scratch hue/brightness pixel math exactly (the same HSV kernel the shader
//! uses), approximate mode applies the color matrix equivalent of the CSS
//! filter string from [`Filters::css_approximation`].

use std::collections::HashMap;

use crate::foundation::math::{hsv_to_rgb, rgb_to_hsv};
use crate::model::filters::Filters;

/// Hue shift with the Scratch saturation/value floor.
///
/// Near-black inputs are forced to `(h, s, v) = (0, 1, 0.055)` and
/// near-gray inputs to saturation 0.09 before the shift, so both pick up a
/// visible hue change.
pub(crate) fn scratch_hue_shift(rgb: [u8; 3], shift: f64) -> [u8; 3] {
    const MIN_VALUE: f32 = 0.11 / 2.0;
    const MIN_SATURATION: f32 = 0.09;

    let mut hsv = rgb_to_hsv(rgb);
    if hsv[2] < MIN_VALUE {
        hsv = [0.0, 1.0, MIN_VALUE];
    } else if hsv[1] < MIN_SATURATION {
        hsv = [0.0, MIN_SATURATION, hsv[2]];
    }
    let h = (f64::from(hsv[0]) + shift).rem_euclid(1.0);
    hsv_to_rgb([h as f32, hsv[1], hsv[2]])
}

/// 4x5 color matrix equivalent of `brightness(…%) hue-rotate(…deg)`.
///
/// Row-major `[r-row, g-row, b-row, a-row]`, each row `[r g b a offset]`,
/// offsets in `[0, 1]` color space.
pub(crate) fn css_filter_matrix(filters: &Filters) -> [f32; 20] {
    let p = ((100.0 + filters.brightness) / 100.0).max(0.0) as f32;
    let theta = ((filters.color / 200.0) * 360.0).to_radians();
    let (sin, cos) = (theta.sin() as f32, theta.cos() as f32);

    // CSS hue-rotate in linear RGB with Rec. 601 luma weights.
    let rr = 0.213 + cos * 0.787 - sin * 0.213;
    let rg = 0.715 - cos * 0.715 - sin * 0.715;
    let rb = 0.072 - cos * 0.072 + sin * 0.928;
    let gr = 0.213 - cos * 0.213 + sin * 0.143;
    let gg = 0.715 + cos * 0.285 + sin * 0.140;
    let gb = 0.072 - cos * 0.072 - sin * 0.283;
    let br = 0.213 - cos * 0.213 - sin * 0.787;
    let bg = 0.715 - cos * 0.715 + sin * 0.715;
    let bb = 0.072 + cos * 0.928 + sin * 0.072;

    [
        rr * p,
        rg * p,
        rb * p,
        0.0,
        0.0,
        gr * p,
        gg * p,
        gb * p,
        0.0,
        0.0,
        br * p,
        bg * p,
        bb * p,
        0.0,
        0.0,
        0.0,
        0.0,
        0.0,
        1.0,
        0.0,
    ]
}

enum FxMode {
    Accurate { shift: f64, brightness_add: i32 },
    Matrix([f32; 20]),
}

/// A per-draw color transform over straight RGBA8 samples.
///
/// Accurate hue shifts memoize per packed `0xRRGGBB` input, so repeated
/// colors skip the HSV round trip. The memo is borrowed from the renderer
/// and cleared by the caller at the start of each draw.
pub(crate) struct PixelFx<'a> {
    mode: FxMode,
    memo: &'a mut HashMap<u32, [u8; 3]>,
}

impl<'a> PixelFx<'a> {
    /// Build the evaluator for a child's filters, or `None` when no per-pixel
    /// work is needed (ghost is applied through the draw opacity instead).
    pub(crate) fn build(
        filters: &Filters,
        accurate: bool,
        memo: &'a mut HashMap<u32, [u8; 3]>,
    ) -> Option<Self> {
        if !filters.has_color_transform() {
            return None;
        }
        memo.clear();
        let mode = if accurate {
            FxMode::Accurate {
                shift: if filters.color != 0.0 {
                    filters.color_shift()
                } else {
                    0.0
                },
                brightness_add: if filters.brightness != 0.0 {
                    (filters.brightness_offset() * 255.0).round() as i32
                } else {
                    0
                },
            }
        } else {
            FxMode::Matrix(css_filter_matrix(filters))
        };
        Some(Self { mode, memo })
    }

    /// Transform one straight-alpha sample; alpha is preserved.
    pub(crate) fn apply(&mut self, px: [u8; 4]) -> [u8; 4] {
        match &self.mode {
            FxMode::Accurate {
                shift,
                brightness_add,
            } => {
                let mut rgb = [px[0], px[1], px[2]];
                if *shift != 0.0 {
                    let key = (u32::from(rgb[0]) << 16) | (u32::from(rgb[1]) << 8) | u32::from(rgb[2]);
                    rgb = match self.memo.get(&key) {
                        Some(cached) => *cached,
                        None => {
                            let shifted = scratch_hue_shift(rgb, *shift);
                            self.memo.insert(key, shifted);
                            shifted
                        }
                    };
                }
                if *brightness_add != 0 {
                    for c in &mut rgb {
                        *c = (i32::from(*c) + brightness_add).clamp(0, 255) as u8;
                    }
                }
                [rgb[0], rgb[1], rgb[2], px[3]]
            }
            FxMode::Matrix(m) => {
                let input = [
                    f32::from(px[0]) / 255.0,
                    f32::from(px[1]) / 255.0,
                    f32::from(px[2]) / 255.0,
                    f32::from(px[3]) / 255.0,
                ];
                let mut out = [0u8; 4];
                for row in 0..4 {
                    let v = m[row * 5] * input[0]
                        + m[row * 5 + 1] * input[1]
                        + m[row * 5 + 2] * input[2]
                        + m[row * 5 + 3] * input[3]
                        + m[row * 5 + 4];
                    out[row] = (v * 255.0).round().clamp(0.0, 255.0) as u8;
                }
                out
            }
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/effects.rs"]
mod tests;
