use crate::simulation::engines::ObjectRef;
use crate::simulation::error::{Result, SimError};
use crate::simulation::geometry::Rectangle;
use crate::simulation::sensors::LidarScan;
use crate::simulation::vector::Vector2D;
use tracing::instrument;

pub const DEFAULT_MAX_RANGE: f64 = 1000.0;
/// Upper bound for the number of rays of one scan.
pub const MAX_RAY_COUNT: usize = 1 << 20;

/// A rotating range finder. Casts a fan of rays and reports the distance to the nearest edge
/// along each ray.
#[derive(Debug, Clone, PartialEq)]
pub struct Lidar {
    num_rays: u32,
    ray_angle_increment: f64,
    max_range: f64,
    ray_count: usize,
}

impl Lidar {
    pub fn new(num_rays: u32, ray_angle_increment: f64) -> Result<Self> {
        Self::with_max_range(num_rays, ray_angle_increment, DEFAULT_MAX_RANGE)
    }

    pub fn with_max_range(num_rays: u32, ray_angle_increment: f64, max_range: f64) -> Result<Self> {
        if !(ray_angle_increment.is_finite() && ray_angle_increment > 0.0) {
            return Err(SimError::InvalidRayIncrement(ray_angle_increment));
        }
        if !(max_range.is_finite() && max_range > 0.0) {
            return Err(SimError::InvalidMaxRange(max_range));
        }
        let ray_count = (num_rays as f64 / ray_angle_increment).floor();
        if !(ray_count.is_finite() && ray_count <= MAX_RAY_COUNT as f64) {
            return Err(SimError::InvalidRayIncrement(ray_angle_increment));
        }
        Ok(Lidar {
            num_rays,
            ray_angle_increment,
            max_range,
            ray_count: ray_count as usize,
        })
    }

    /// Number of entries of a scan: `num_rays / ray_angle_increment`, rounded down.
    pub fn ray_count(&self) -> usize {
        self.ray_count
    }

    pub fn num_rays(&self) -> u32 {
        self.num_rays
    }

    pub fn ray_angle_increment(&self) -> f64 {
        self.ray_angle_increment
    }

    pub fn max_range(&self) -> f64 {
        self.max_range
    }

    /// Casts all rays from `origin`, the first one at `angle` degrees. Objects listed in `ignore`
    /// are invisible to the scan, typically the vehicle carrying the sensor.
    ///
    /// Returns `f64::INFINITY` for rays which hit nothing within the max range.
    #[instrument(level = "trace", skip(self, objects, ignore))]
    pub fn scan(
        &self,
        origin: Vector2D,
        angle: f64,
        objects: &[(ObjectRef, Rectangle)],
        ignore: &[ObjectRef],
    ) -> Vec<f64> {
        let edges: Vec<(Vector2D, Vector2D)> = objects
            .iter()
            .filter(|(object_ref, _)| !ignore.contains(object_ref))
            .flat_map(|(_, rectangle)| rectangle.edges())
            .collect();

        (0..self.ray_count())
            .map(|k| {
                let ray_angle = angle + k as f64 * self.ray_angle_increment;
                self.cast(origin, ray_angle, &edges)
            })
            .collect()
    }

    /// Same as [`Self::scan`], bundled with the pose it was taken from.
    pub fn measure(
        &self,
        origin: Vector2D,
        angle: f64,
        objects: &[(ObjectRef, Rectangle)],
        ignore: &[ObjectRef],
        time: f64,
    ) -> LidarScan {
        LidarScan {
            origin,
            angle,
            angle_increment: self.ray_angle_increment,
            ranges: self.scan(origin, angle, objects, ignore),
            time,
        }
    }

    fn cast(&self, origin: Vector2D, ray_angle: f64, edges: &[(Vector2D, Vector2D)]) -> f64 {
        let end = origin + Vector2D::new(self.max_range, 0.0).rotate_deg(ray_angle);
        edges
            .iter()
            .filter_map(|(a, b)| segment_intersection(origin, end, *a, *b))
            .map(|t| t * self.max_range)
            .filter(|distance| *distance <= self.max_range)
            .fold(f64::INFINITY, f64::min)
    }
}

/// Intersects the segments `p1 -> p2` and `p3 -> p4`. Returns the parameter `t` in `[0, 1]` of
/// the intersection point along the first segment. Parallel segments never intersect.
pub fn segment_intersection(p1: Vector2D, p2: Vector2D, p3: Vector2D, p4: Vector2D) -> Option<f64> {
    let denominator = (p4.y - p3.y) * (p2.x - p1.x) - (p4.x - p3.x) * (p2.y - p1.y);
    if denominator == 0.0 {
        return None;
    }

    let t = ((p4.x - p3.x) * (p1.y - p3.y) - (p4.y - p3.y) * (p1.x - p3.x)) / denominator;
    if !(0.0..=1.0).contains(&t) {
        return None;
    }

    let u = ((p2.x - p1.x) * (p1.y - p3.y) - (p2.y - p1.y) * (p1.x - p3.x)) / denominator;
    (0.0..=1.0).contains(&u).then_some(t)
}
