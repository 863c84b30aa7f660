/// A pen color with components in `[0, 1]`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PenColor {
    /// Red.
    pub r: f64,
    /// Green.
    pub g: f64,
    /// Blue.
    pub b: f64,
    /// Alpha.
    pub a: f64,
}

impl PenColor {
    /// Build a color, clamping every component into `[0, 1]`.
    pub fn new(r: f64, g: f64, b: f64, a: f64) -> Self {
        Self {
            r: r.clamp(0.0, 1.0),
            g: g.clamp(0.0, 1.0),
            b: b.clamp(0.0, 1.0),
            a: a.clamp(0.0, 1.0),
        }
    }

    /// Opaque color from three components.
    pub fn opaque(r: f64, g: f64, b: f64) -> Self {
        Self::new(r, g, b, 1.0)
    }

    /// The `(r, g, b, a)` quadruple the GPU backend uploads.
    pub fn to_parts(&self) -> (f32, f32, f32, f32) {
        (self.r as f32, self.g as f32, self.b as f32, self.a as f32)
    }

    /// CSS `rgba(...)` string for hosts that paint through a 2D canvas.
    pub fn to_css(&self) -> String {
        format!(
            "rgba({}, {}, {}, {})",
            (self.r * 255.0).round() as u8,
            (self.g * 255.0).round() as u8,
            (self.b * 255.0).round() as u8,
            self.a
        )
    }

    /// Straight RGBA8 for the software rasterizer.
    pub fn to_rgba8(&self) -> [u8; 4] {
        [
            (self.r * 255.0).round() as u8,
            (self.g * 255.0).round() as u8,
            (self.b * 255.0).round() as u8,
            (self.a * 255.0).round() as u8,
        ]
    }
}

#[cfg(test)]
#[path = "../../tests/unit/model/pen.rs"]
mod tests;
