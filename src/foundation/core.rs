pub use kurbo::{Point, Vec2};

use crate::viewport::Viewport;

/// Identifies one Timeline instance. Wakes carrying an older generation are ignored.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize,
    serde::Deserialize,
)]
pub struct Generation(pub u64);

impl Generation {
    /// The generation that supersedes this one.
    pub fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

/// Stable entity identifier: its insertion index within the cycle.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct EntityId(pub u32);

/// A point expressed relative to the viewport: `(fx * width + dx, fy * height + dy)`.
///
/// Pure pixel coordinates use `fx = fy = 0`; layout that must follow the host surface on
/// resize uses the fractional parts.
#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Anchor {
    pub fx: f64,
    pub fy: f64,
    pub dx: f64,
    pub dy: f64,
}

impl Anchor {
    pub const fn px(x: f64, y: f64) -> Self {
        Self {
            fx: 0.0,
            fy: 0.0,
            dx: x,
            dy: y,
        }
    }

    pub const fn frac(fx: f64, fy: f64) -> Self {
        Self {
            fx,
            fy,
            dx: 0.0,
            dy: 0.0,
        }
    }

    pub const fn offset(self, dx: f64, dy: f64) -> Self {
        Self {
            dx: self.dx + dx,
            dy: self.dy + dy,
            ..self
        }
    }

    pub fn resolve(self, vp: &Viewport) -> Point {
        Point::new(
            self.fx * vp.width + self.dx,
            self.fy * vp.height + self.dy,
        )
    }
}

/// Where a placement sits before its offset is applied.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Spot {
    At(Anchor),
    /// The entity's slot in the cycle's stack layout.
    StackSlot,
}

/// Source or target geometry of an entity.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Placement {
    pub spot: Spot,
    #[serde(default = "zero_vec")]
    pub offset: Vec2,
    #[serde(default = "one")]
    pub scale: f64,
    #[serde(default = "one")]
    pub opacity: f64,
}

fn zero_vec() -> Vec2 {
    Vec2::ZERO
}

fn one() -> f64 {
    1.0
}

impl Placement {
    pub fn at(anchor: Anchor) -> Self {
        Self {
            spot: Spot::At(anchor),
            offset: Vec2::ZERO,
            scale: 1.0,
            opacity: 1.0,
        }
    }

    pub fn stack_slot() -> Self {
        Self {
            spot: Spot::StackSlot,
            offset: Vec2::ZERO,
            scale: 1.0,
            opacity: 1.0,
        }
    }

    pub fn with_offset(mut self, dx: f64, dy: f64) -> Self {
        self.offset = Vec2::new(dx, dy);
        self
    }

    pub fn with_opacity(mut self, opacity: f64) -> Self {
        self.opacity = opacity;
        self
    }

    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    pub fn uses_stack(&self) -> bool {
        matches!(self.spot, Spot::StackSlot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anchor_follows_viewport() {
        let a = Anchor::frac(0.5, 1.0).offset(-10.0, -60.0);
        let small = Viewport::new(200.0, 100.0, 1.0).unwrap();
        let big = Viewport::new(800.0, 400.0, 2.0).unwrap();
        assert_eq!(a.resolve(&small), Point::new(90.0, 40.0));
        assert_eq!(a.resolve(&big), Point::new(390.0, 340.0));
    }

    #[test]
    fn generation_next_is_strictly_newer() {
        let g = Generation(41);
        assert!(g.next() > g);
        assert_eq!(Generation(u64::MAX).next(), Generation(0));
    }

    #[test]
    fn placement_defaults_from_json() {
        let p: Placement = serde_json::from_str(r#"{ "spot": "stack_slot" }"#).unwrap();
        assert_eq!(p, Placement::stack_slot());
    }
}
