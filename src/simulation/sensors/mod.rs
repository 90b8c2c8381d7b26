use crate::simulation::vector::Vector2D;

pub mod lidar;

/// One full sweep of a [`lidar::Lidar`]. `ranges[k]` belongs to the ray at
/// `angle + k * angle_increment` degrees. Rays without a hit report `f64::INFINITY`.
#[derive(Debug, Clone, PartialEq)]
pub struct LidarScan {
    pub origin: Vector2D,
    pub angle: f64,
    pub angle_increment: f64,
    pub ranges: Vec<f64>,
    /// Simulated time at which the world snapshot was taken.
    pub time: f64,
}

impl LidarScan {
    /// The ranges divided by `factor`, e.g. 100 to convert world units to meters.
    pub fn scaled(&self, factor: f64) -> Vec<f64> {
        self.ranges.iter().map(|r| r / factor).collect()
    }

    pub fn hits(&self) -> usize {
        self.ranges.iter().filter(|r| r.is_finite()).count()
    }

    pub fn nearest(&self) -> Option<f64> {
        self.ranges
            .iter()
            .copied()
            .filter(|r| r.is_finite())
            .min_by(f64::total_cmp)
    }
}

/// Receives every scan produced by the lidar thread.
pub trait ScanSink: Send {
    fn receive(&mut self, scan: &LidarScan);
}

impl<F> ScanSink for F
where
    F: FnMut(&LidarScan) + Send,
{
    fn receive(&mut self, scan: &LidarScan) {
        self(scan)
    }
}
