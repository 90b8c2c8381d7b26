use crate::simulation::error::{Result, SimError};
use crate::simulation::vector::Vector2D;
use itertools::Itertools;

/// Oriented rectangle. `pos` is the pivot of the owning object, the geometric center sits at
/// `pos + bound_offset` rotated by `angle` (degrees, counter-clockwise, unbounded).
/// `length` extends along the local x axis, `width` along the local y axis.
#[derive(Debug, Clone, PartialEq)]
pub struct Rectangle {
    pub(crate) pos: Vector2D,
    pub(crate) angle: f64,
    pub(crate) width: f64,
    pub(crate) length: f64,
    pub(crate) bound_offset: Vector2D,
}

impl Rectangle {
    pub fn new(pos: Vector2D, angle: f64, width: f64, length: f64) -> Result<Self> {
        check_dimension("width", width)?;
        check_dimension("length", length)?;
        Ok(Rectangle {
            pos,
            angle,
            width,
            length,
            bound_offset: Vector2D::ZERO,
        })
    }

    pub fn with_bound_offset(mut self, bound_offset: Vector2D) -> Self {
        self.bound_offset = bound_offset;
        self
    }

    pub fn pos(&self) -> Vector2D {
        self.pos
    }

    pub fn set_pos(&mut self, pos: Vector2D) {
        self.pos = pos;
    }

    pub fn translate(&mut self, by: Vector2D) {
        self.pos += by;
    }

    pub fn angle(&self) -> f64 {
        self.angle
    }

    /// The heading folded into `[0, 360)`.
    pub fn wrapped_angle(&self) -> f64 {
        self.angle.rem_euclid(360.0)
    }

    pub fn set_angle(&mut self, angle: f64) {
        self.angle = angle;
    }

    pub fn rotate_by(&mut self, delta: f64) {
        self.angle += delta;
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn length(&self) -> f64 {
        self.length
    }

    pub fn bound_offset(&self) -> Vector2D {
        self.bound_offset
    }

    /// Resizes the rectangle. A zero value keeps the current dimension.
    pub fn set_dimensions(&mut self, width: f64, length: f64) -> Result<()> {
        check_dimension("width", width)?;
        check_dimension("length", length)?;
        if width > 0.0 {
            self.width = width;
        }
        if length > 0.0 {
            self.length = length;
        }
        Ok(())
    }

    pub fn center(&self) -> Vector2D {
        self.pos + self.bound_offset.rotate_deg(self.angle)
    }

    /// Corners in bottom-left, bottom-right, top-right, top-left order.
    pub fn corners(&self) -> [Vector2D; 4] {
        let half_width = self.width / 2.0;
        let half_length = self.length / 2.0;
        let rad = self.angle.to_radians();
        let center = self.center();

        [
            Vector2D::new(-half_length, -half_width),
            Vector2D::new(half_length, -half_width),
            Vector2D::new(half_length, half_width),
            Vector2D::new(-half_length, half_width),
        ]
        .map(|corner| corner.rotate(rad) + center)
    }

    /// The four edges as `(start, end)` pairs, following the corner order and closing the loop.
    pub fn edges(&self) -> [(Vector2D, Vector2D); 4] {
        let corners = self.corners();
        let mut edges = [(Vector2D::ZERO, Vector2D::ZERO); 4];
        for (i, (start, end)) in corners.iter().circular_tuple_windows().enumerate() {
            edges[i] = (*start, *end);
        }
        edges
    }

    /// Unit normals of the edges. A zero length edge yields `ZERO`.
    pub fn axes(&self) -> [Vector2D; 4] {
        self.edges()
            .map(|(start, end)| (end - start).perp().normalize_or_zero())
    }

    /// Separating axis test against `other`.
    ///
    /// Returns whether the rectangles touch or overlap and, if so, the minimum translation
    /// vector. Subtracting the vector from `self.pos` separates the two rectangles along the
    /// axis of smallest overlap. On equal overlaps the first tested axis wins.
    pub fn check_collision(&self, other: &Rectangle) -> (bool, Vector2D) {
        let corners = self.corners();
        let other_corners = other.corners();

        let mut min_overlap = f64::INFINITY;
        let mut min_axis: Option<Vector2D> = None;

        // zero axes come from degenerate edges and project everything onto a single point
        let axes = self.axes().into_iter().chain(other.axes()).filter(|a| !a.is_zero());
        for axis in axes {
            let (min1, max1) = project(axis, &corners);
            let (min2, max2) = project(axis, &other_corners);

            if max1 < min2 || max2 < min1 {
                return (false, Vector2D::ZERO);
            }

            let overlap = overlap_amount(min1, max1, min2, max2);
            if overlap < min_overlap {
                min_overlap = overlap;
                min_axis = Some(axis);
            }
        }

        let Some(mut axis) = min_axis else {
            return (false, Vector2D::ZERO);
        };

        let direction = other.center() - self.center();
        if direction.dot(axis) < 0.0 {
            axis = -axis;
        }

        (true, axis * min_overlap)
    }
}

/// Anything that occupies a rectangle in the world.
pub trait Collider {
    fn rectangle(&self) -> &Rectangle;

    fn check_collision(&self, other: &dyn Collider) -> (bool, Vector2D) {
        self.rectangle().check_collision(other.rectangle())
    }
}

impl Collider for Rectangle {
    fn rectangle(&self) -> &Rectangle {
        self
    }
}

/// Projects `corners` onto `axis` and returns the extent `(min, max)`.
pub fn project(axis: Vector2D, corners: &[Vector2D]) -> (f64, f64) {
    corners
        .iter()
        .map(|corner| corner.dot(axis))
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), dot| {
            (lo.min(dot), hi.max(dot))
        })
}

pub fn overlap_amount(min1: f64, max1: f64, min2: f64, max2: f64) -> f64 {
    f64::max(0.0, f64::min(max1, max2) - f64::max(min1, min2))
}

fn check_dimension(name: &'static str, value: f64) -> Result<()> {
    if !(value.is_finite() && value >= 0.0) {
        return Err(SimError::InvalidDimension { name, value });
    }
    Ok(())
}
