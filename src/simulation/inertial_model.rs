use crate::simulation::error::{Result, SimError};

/// Speeds with a smaller magnitude are snapped to zero after each update.
pub const DEAD_ZONE: f64 = 0.001;

/// One dimensional inertial model. Forces change the speed proportionally to the inverse mass,
/// friction decays it linearly with the time step.
#[derive(Debug, Clone, PartialEq)]
pub struct InertialModel1D {
    speed: f64,
    mass: f64,
    friction: f64,
}

impl InertialModel1D {
    pub fn new(mass: f64, friction: f64) -> Result<Self> {
        Self::with_speed(0.0, mass, friction)
    }

    pub fn with_speed(speed: f64, mass: f64, friction: f64) -> Result<Self> {
        if !(mass.is_finite() && mass > 0.0) {
            return Err(SimError::InvalidMass(mass));
        }
        Self::check_friction(friction)?;
        Ok(InertialModel1D {
            speed,
            mass,
            friction,
        })
    }

    pub fn apply_force(&mut self, force: f64) {
        self.speed += force / self.mass;
    }

    /// Applies friction for `dt` and snaps residual speed inside the dead zone to zero.
    ///
    /// `friction * dt` must be below 1; callers check this with [`Self::max_stable_dt`].
    pub fn update(&mut self, dt: f64) {
        debug_assert!(
            self.friction * dt < 1.0,
            "friction {} with dt {dt} is unstable",
            self.friction
        );
        self.speed *= 1.0 - self.friction * dt;

        if self.speed.abs() < DEAD_ZONE {
            self.speed = 0.0;
        }
    }

    /// The largest time step for which `update` still decays the speed without flipping its sign.
    /// Steps must be strictly smaller than this value.
    pub fn max_stable_dt(&self) -> f64 {
        if self.friction > 0.0 {
            1.0 / self.friction
        } else {
            f64::INFINITY
        }
    }

    pub fn check_dt(&self, dt: f64) -> Result<()> {
        if self.friction * dt >= 1.0 {
            return Err(SimError::UnstableFriction {
                friction: self.friction,
                dt,
            });
        }
        Ok(())
    }

    pub fn set_friction(&mut self, friction: f64) -> Result<()> {
        Self::check_friction(friction)?;
        self.friction = friction;
        Ok(())
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn mass(&self) -> f64 {
        self.mass
    }

    pub fn friction(&self) -> f64 {
        self.friction
    }

    fn check_friction(friction: f64) -> Result<()> {
        if !(friction.is_finite() && friction >= 0.0) {
            return Err(SimError::InvalidFriction(friction));
        }
        Ok(())
    }
}
