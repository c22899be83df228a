//! Rectangles.

use crate::object::{Number, Object};

/// A rectangle, as used by the page boundary boxes.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Rect {
    /// The left edge.
    pub x0: f64,
    /// The bottom edge.
    pub y0: f64,
    /// The right edge.
    pub x1: f64,
    /// The top edge.
    pub y1: f64,
}

impl Rect {
    /// A US Letter sized page, used when a page doesn't define a media box.
    pub const LETTER: Self = Self::new(0.0, 0.0, 612.0, 792.0);

    /// Create a rectangle from its lower left and upper right corners.
    pub const fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// Read a rectangle from an array of four numbers. The corners are normalized so
    /// that `x0 <= x1` and `y0 <= y1`.
    pub fn from_object(obj: &Object) -> Option<Self> {
        let [a, b, c, d] = obj.as_array()? else {
            return None;
        };
        let [x0, y0, x1, y1] = [a.as_f64()?, b.as_f64()?, c.as_f64()?, d.as_f64()?];

        Some(Self::new(x0.min(x1), y0.min(y1), x0.max(x1), y0.max(y1)))
    }

    /// The width of the rectangle.
    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    /// The height of the rectangle.
    pub fn height(&self) -> f64 {
        self.y1 - self.y0
    }

    /// Convert the rectangle back into an array object. Whole numbers are written
    /// as integers.
    pub fn to_object(&self) -> Object {
        let num = |v: f64| {
            if v.fract() == 0.0 && v.abs() < i64::MAX as f64 {
                Object::Number(Number::Integer(v as i64))
            } else {
                Object::Number(Number::Real(v))
            }
        };

        Object::Array(vec![num(self.x0), num(self.y0), num(self.x1), num(self.y1)])
    }
}
