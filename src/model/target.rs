//! The stage/sprite object model as seen by the compositor.

use crate::foundation::core::Bounds;
use crate::model::costume::Costume;
use crate::model::filters::Filters;

/// How a sprite responds to its `direction`.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize,
)]
pub enum RotationStyle {
    /// Free rotation by `direction - 90` degrees.
    #[default]
    Normal,
    /// Horizontal mirror when facing left (`direction < 0`), never rotated.
    LeftRight,
    /// Always drawn upright.
    None,
}

/// The stage: backdrop costumes, stage-level filters, and the z-ordered
/// children (bottom to top). Children never include the stage itself.
#[derive(Debug, Default)]
pub struct Stage {
    /// Backdrop costumes.
    pub costumes: Vec<Costume>,
    /// Index of the active backdrop.
    pub current_costume: usize,
    /// Stage-level image effects.
    pub filters: Filters,
    /// Sprites in z-order, bottom to top.
    pub children: Vec<Sprite>,
}

impl Stage {
    /// Stage with the given backdrops and no children.
    pub fn new(costumes: Vec<Costume>) -> Self {
        Self {
            costumes,
            ..Self::default()
        }
    }

    /// The active backdrop, if the index is valid.
    pub fn costume(&self) -> Option<&Costume> {
        self.costumes.get(self.current_costume)
    }
}

/// A positioned, oriented, filterable costume instance.
#[derive(Debug)]
pub struct Sprite {
    /// Costumes of this sprite.
    pub costumes: Vec<Costume>,
    /// Index of the active costume.
    pub current_costume: usize,
    /// Image effects.
    pub filters: Filters,
    /// Stage X, origin centered, +X right.
    pub x: f64,
    /// Stage Y, origin centered, +Y up.
    pub y: f64,
    /// Heading in degrees; 90 is right, 0 is up.
    pub direction: f64,
    /// Uniform size multiplier (1 = 100%).
    pub scale: f64,
    /// Rotation style.
    pub rotation_style: RotationStyle,
    /// Whether the sprite is drawn at all.
    pub visible: bool,
}

impl Sprite {
    /// Sprite at the origin with defaults (direction 90, scale 1, visible).
    pub fn new(costumes: Vec<Costume>) -> Self {
        Self {
            costumes,
            current_costume: 0,
            filters: Filters::default(),
            x: 0.0,
            y: 0.0,
            direction: 90.0,
            scale: 1.0,
            rotation_style: RotationStyle::Normal,
            visible: true,
        }
    }

    /// The active costume, if the index is valid.
    pub fn costume(&self) -> Option<&Costume> {
        self.costumes.get(self.current_costume)
    }

    /// Stage-space axis-aligned bounds after rotation style, direction, and
    /// scale. A sprite without a costume collapses to its position.
    pub fn rotated_bounds(&self) -> Bounds {
        let Some(costume) = self.costume() else {
            return Bounds {
                left: self.x,
                right: self.x,
                top: self.y,
                bottom: self.y,
            };
        };

        let s = costume.scale() * self.scale;
        let left = -costume.rotation_center_x() * s;
        let top = costume.rotation_center_y() * s;
        let right = left + costume.width() as f64 * s;
        let bottom = top - costume.height() as f64 * s;

        let corners: [(f64, f64); 4] = match self.rotation_style {
            RotationStyle::Normal if self.direction != 90.0 => {
                let a = (90.0 - self.direction).to_radians();
                let (sin, cos) = a.sin_cos();
                let rot = |x: f64, y: f64| (x * cos - y * sin, x * sin + y * cos);
                [
                    rot(left, top),
                    rot(right, top),
                    rot(left, bottom),
                    rot(right, bottom),
                ]
            }
            RotationStyle::LeftRight if self.direction < 0.0 => [
                (-right, top),
                (-left, top),
                (-right, bottom),
                (-left, bottom),
            ],
            _ => [(left, top), (right, top), (left, bottom), (right, bottom)],
        };

        let mut out = Bounds {
            left: f64::INFINITY,
            right: f64::NEG_INFINITY,
            top: f64::NEG_INFINITY,
            bottom: f64::INFINITY,
        };
        for (x, y) in corners {
            out.left = out.left.min(x);
            out.right = out.right.max(x);
            out.top = out.top.max(y);
            out.bottom = out.bottom.min(y);
        }
        out.left += self.x;
        out.right += self.x;
        out.top += self.y;
        out.bottom += self.y;
        out
    }
}

/// A drawable child: the stage backdrop or one sprite.
#[derive(Clone, Copy, Debug)]
pub enum Child<'a> {
    /// The stage backdrop.
    Stage(&'a Stage),
    /// One sprite.
    Sprite(&'a Sprite),
}

impl<'a> Child<'a> {
    /// Tag check replacing the original duck typing.
    pub fn is_sprite(&self) -> bool {
        matches!(self, Child::Sprite(_))
    }

    /// The child's active costume.
    pub fn costume(&self) -> Option<&'a Costume> {
        match self {
            Child::Stage(s) => s.costume(),
            Child::Sprite(s) => s.costume(),
        }
    }

    /// The child's effect record.
    pub fn filters(&self) -> &'a Filters {
        match self {
            Child::Stage(s) => &s.filters,
            Child::Sprite(s) => &s.filters,
        }
    }

    /// Placement of the child on the stage. The stage itself sits at the
    /// origin, unrotated and unscaled.
    pub(crate) fn placement(&self) -> Placement {
        match self {
            Child::Stage(_) => Placement {
                x: 0.0,
                y: 0.0,
                direction: 90.0,
                scale: 1.0,
                rotation_style: RotationStyle::None,
            },
            Child::Sprite(s) => Placement {
                x: s.x,
                y: s.y,
                direction: s.direction,
                scale: s.scale,
                rotation_style: s.rotation_style,
            },
        }
    }
}

/// Flattened placement values the draw path consumes.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Placement {
    pub(crate) x: f64,
    pub(crate) y: f64,
    pub(crate) direction: f64,
    pub(crate) scale: f64,
    pub(crate) rotation_style: RotationStyle,
}

#[cfg(test)]
#[path = "../../tests/unit/model/target.rs"]
mod tests;
