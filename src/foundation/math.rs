//! Small math kernel shared by both backends.
//!
//! The HSV conversions are the same closed forms the sprite shader uses, so
//! CPU-side accurate filtering and GPU-side filtering agree pixel for pixel.

use kurbo::Affine;

/// Row-major 3x3 matrix for the GPU transform chain.
///
/// Affine content lives in the top two rows; the third row stays `(0, 0, 1)`
/// for everything but [`Mat3::projection`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Mat3(pub [f32; 9]);

impl Mat3 {
    /// Identity matrix.
    pub fn identity() -> Self {
        Self([1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0])
    }

    /// Translation by `(tx, ty)`.
    pub fn translation(tx: f32, ty: f32) -> Self {
        Self([1.0, 0.0, tx, 0.0, 1.0, ty, 0.0, 0.0, 1.0])
    }

    /// Rotation by `degrees`, positive counter-clockwise.
    pub fn rotation(degrees: f32) -> Self {
        let r = degrees.to_radians();
        let (s, c) = r.sin_cos();
        Self([c, -s, 0.0, s, c, 0.0, 0.0, 0.0, 1.0])
    }

    /// Non-uniform scale.
    pub fn scaling(sx: f32, sy: f32) -> Self {
        Self([sx, 0.0, 0.0, 0.0, sy, 0.0, 0.0, 0.0, 1.0])
    }

    /// Map pixel coordinates (origin top-left, +Y down) onto clip space:
    /// `(0,0)` lands at `(-1, 1)` and `(w,h)` at `(1, -1)`.
    pub fn projection(width: f32, height: f32) -> Self {
        Self([
            2.0 / width,
            0.0,
            -1.0,
            0.0,
            -2.0 / height,
            1.0,
            0.0,
            0.0,
            1.0,
        ])
    }

    /// Lossy import of a kurbo affine (`x' = a·x + c·y + e`).
    pub fn from_affine(t: Affine) -> Self {
        let [a, b, c, d, e, f] = t.as_coeffs();
        Self([
            a as f32, c as f32, e as f32, b as f32, d as f32, f as f32, 0.0, 0.0, 1.0,
        ])
    }

    /// Post-multiply in place: `self = self * rhs` (rhs applies first).
    pub fn multiply(&mut self, rhs: &Mat3) {
        let a = self.0;
        let b = rhs.0;
        let mut out = [0.0f32; 9];
        for row in 0..3 {
            for col in 0..3 {
                out[row * 3 + col] = a[row * 3] * b[col]
                    + a[row * 3 + 1] * b[3 + col]
                    + a[row * 3 + 2] * b[6 + col];
            }
        }
        self.0 = out;
    }

    /// Transform a point.
    pub fn transform_point(&self, x: f32, y: f32) -> (f32, f32) {
        let m = self.0;
        (
            m[0] * x + m[1] * y + m[2],
            m[3] * x + m[4] * y + m[5],
        )
    }

    /// Repack as padded column vectors, the `mat3x3<f32>` uniform layout.
    pub fn to_gpu_columns(&self) -> [[f32; 4]; 3] {
        let m = self.0;
        [
            [m[0], m[3], m[6], 0.0],
            [m[1], m[4], m[7], 0.0],
            [m[2], m[5], m[8], 0.0],
        ]
    }
}

/// RGB8 to HSV with `h in [0,1)`, `s, v in [0,1]`.
///
/// Same closed form as the fragment shader (branchless select written out as
/// branches), so both paths produce the same hue for the same byte.
pub fn rgb_to_hsv(rgb: [u8; 3]) -> [f32; 3] {
    const E: f32 = 1.0e-10;
    let r = f32::from(rgb[0]) / 255.0;
    let g = f32::from(rgb[1]) / 255.0;
    let b = f32::from(rgb[2]) / 255.0;

    // p = mix(vec4(c.bg, K.wz), vec4(c.gb, K.xy), step(c.b, c.g))
    let p: [f32; 4] = if g >= b {
        [g, b, 0.0, -1.0 / 3.0]
    } else {
        [b, g, -1.0, 2.0 / 3.0]
    };
    // q = mix(vec4(p.xyw, c.r), vec4(c.r, p.yzx), step(p.x, c.r))
    let q: [f32; 4] = if r >= p[0] {
        [r, p[1], p[2], p[0]]
    } else {
        [p[0], p[1], p[3], r]
    };

    let d = q[0] - q[3].min(q[1]);
    let h = (q[2] + (q[3] - q[1]) / (6.0 * d + E)).abs();
    let s = d / (q[0] + E);
    [h, s, q[0]]
}

/// HSV back to RGB8, rounding each channel.
pub fn hsv_to_rgb(hsv: [f32; 3]) -> [u8; 3] {
    let [h, s, v] = hsv;
    let channel = |offset: f32| -> u8 {
        let p = ((h + offset).fract() * 6.0 - 3.0).abs();
        let c = v * (1.0 + s * ((p - 1.0).clamp(0.0, 1.0) - 1.0));
        (c * 255.0).round().clamp(0.0, 255.0) as u8
    };
    [channel(1.0), channel(2.0 / 3.0), channel(1.0 / 3.0)]
}

/// `x * y / 255` with rounding, the premultiplication workhorse.
pub(crate) fn mul_div255(x: u16, y: u16) -> u8 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u8
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/math.rs"]
mod tests;
