use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

/// Number of fractional digits compared by `Vector2D::eq`.
const EQ_DIGITS: i32 = 13;

/// Immutable two dimensional vector. All operations return new values.
///
/// Equality is tolerant: both components are rounded to 13 fractional digits before they are
/// compared, so values that only differ by accumulated floating point noise are equal.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Vector2D {
    pub x: f64,
    pub y: f64,
}

impl Vector2D {
    pub const ZERO: Vector2D = Vector2D { x: 0.0, y: 0.0 };

    pub const fn new(x: f64, y: f64) -> Self {
        Vector2D { x, y }
    }

    pub fn dot(self, other: Vector2D) -> f64 {
        self.x * other.x + self.y * other.y
    }

    pub fn length(self) -> f64 {
        self.x.hypot(self.y)
    }

    /// Rotates counter-clockwise by `rad` radians.
    pub fn rotate(self, rad: f64) -> Self {
        let (sin, cos) = rad.sin_cos();
        Vector2D::new(self.x * cos - self.y * sin, self.x * sin + self.y * cos)
    }

    /// Rotates counter-clockwise by `deg` degrees.
    pub fn rotate_deg(self, deg: f64) -> Self {
        self.rotate(deg.to_radians())
    }

    /// Left perpendicular `(-y, x)`.
    pub fn perp(self) -> Self {
        Vector2D::new(-self.y, self.x)
    }

    /// Unit vector in the same direction, or `ZERO` for a zero length vector.
    pub fn normalize_or_zero(self) -> Self {
        let length = self.length();
        if length > 0.0 {
            Vector2D::new(self.x / length, self.y / length)
        } else {
            Vector2D::ZERO
        }
    }

    pub fn is_zero(self) -> bool {
        self.x == 0.0 && self.y == 0.0
    }

    pub fn distance(self, other: Vector2D) -> f64 {
        (other - self).length()
    }

    pub fn extract(self) -> (f64, f64) {
        (self.x, self.y)
    }
}

fn round_digits(value: f64) -> f64 {
    let factor = 10f64.powi(EQ_DIGITS);
    (value * factor).round() / factor
}

impl PartialEq for Vector2D {
    fn eq(&self, other: &Self) -> bool {
        round_digits(self.x) == round_digits(other.x) && round_digits(self.y) == round_digits(other.y)
    }
}

impl From<[f64; 2]> for Vector2D {
    fn from(value: [f64; 2]) -> Self {
        Vector2D::new(value[0], value[1])
    }
}

impl From<Vector2D> for [f64; 2] {
    fn from(value: Vector2D) -> Self {
        [value.x, value.y]
    }
}

impl From<(f64, f64)> for Vector2D {
    fn from(value: (f64, f64)) -> Self {
        Vector2D::new(value.0, value.1)
    }
}

impl Add for Vector2D {
    type Output = Vector2D;

    fn add(self, other: Self) -> Self {
        Vector2D::new(self.x + other.x, self.y + other.y)
    }
}

impl Sub for Vector2D {
    type Output = Vector2D;

    fn sub(self, other: Self) -> Self {
        Vector2D::new(self.x - other.x, self.y - other.y)
    }
}

impl Mul<f64> for Vector2D {
    type Output = Vector2D;

    fn mul(self, scalar: f64) -> Self {
        Vector2D::new(self.x * scalar, self.y * scalar)
    }
}

impl Mul<Vector2D> for f64 {
    type Output = Vector2D;

    fn mul(self, vector: Vector2D) -> Vector2D {
        vector * self
    }
}

impl Neg for Vector2D {
    type Output = Vector2D;

    fn neg(self) -> Self {
        Vector2D::new(-self.x, -self.y)
    }
}

impl AddAssign for Vector2D {
    fn add_assign(&mut self, other: Self) {
        *self = *self + other;
    }
}

impl SubAssign for Vector2D {
    fn sub_assign(&mut self, other: Self) {
        *self = *self - other;
    }
}

impl Display for Vector2D {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}
