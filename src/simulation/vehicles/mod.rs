pub mod vehicle_model;

use crate::simulation::engines::DynamicObject;
use crate::simulation::error::{Result, SimError};
use crate::simulation::geometry::{Collider, Rectangle};
use crate::simulation::inertial_model::InertialModel1D;
use crate::simulation::vector::Vector2D;
use crate::simulation::vehicles::vehicle_model::VehicleModel;
use serde::{Deserialize, Serialize};
use std::any::Any;
use tracing::trace;

/// Scales `throttle * dt` into the force applied to the inertial model.
pub const FORCE_SCALE: f64 = 5000.0;
/// Scales `speed * dt` into the distance travelled in world units.
pub const DISTANCE_SCALE: f64 = 100.0;

const STEERING_EPSILON: f64 = 1e-6;
const SPEED_EPSILON: f64 = 1e-6;

/// Pose and control state of a vehicle as seen by renderers and bridges.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VehicleTelemetry {
    pub pos: Vector2D,
    pub angle: f64,
    pub speed: f64,
    pub steering: f64,
}

/// A car-like vehicle with bicycle kinematics.
///
/// `pos` is the rear axle, the body rectangle is centered half a wheel base ahead of it.
/// At angle 0 the vehicle faces +x, positive steering turns counter-clockwise.
#[derive(Debug, Clone, PartialEq)]
pub struct Vehicle {
    rectangle: Rectangle,
    inertial_model: InertialModel1D,
    throttle: f64,
    max_steering_angle: f64,
    steering_angle: f64,
    wheel_base: f64,
    wheel_tread: f64,
    wheel_base_offset: f64,
    wheel_diameter: f64,
    name: Option<String>,
}

impl Vehicle {
    pub fn new(pos: Vector2D, angle: f64, model: &VehicleModel) -> Result<Self> {
        let axle = model.axle_or_default();
        if !(axle.wheel_base.is_finite() && axle.wheel_base > 0.0) {
            return Err(SimError::InvalidWheelBase(axle.wheel_base));
        }
        if !(0.0..90.0).contains(&model.steering_angle) {
            return Err(SimError::InvalidSteeringAngle(model.steering_angle));
        }

        let rectangle = Rectangle::new(pos, angle, model.width, model.length)?
            .with_bound_offset(Vector2D::new(axle.wheel_base / 2.0, 0.0));

        Ok(Vehicle {
            rectangle,
            inertial_model: InertialModel1D::new(model.mass, model.friction)?,
            throttle: 0.0,
            max_steering_angle: model.steering_angle,
            steering_angle: 0.0,
            wheel_base: axle.wheel_base,
            wheel_tread: axle.wheel_tread,
            wheel_base_offset: axle.wheel_base_offset,
            wheel_diameter: model.wheel_diameter,
            name: None,
        })
    }

    /// Sets the throttle, clamped to `[-1, 1]`. Negative values brake and reverse, NaN releases
    /// the throttle.
    pub fn set_throttle(&mut self, throttle: f64) {
        self.throttle = clamp_control(throttle);
    }

    pub fn throttle(&self) -> f64 {
        self.throttle
    }

    /// Sets the steering as a share of the maximum steering angle, clamped to `[-1, 1]`. NaN
    /// centers the wheels.
    pub fn set_steering(&mut self, steering: f64) {
        self.steering_angle = self.max_steering_angle * clamp_control(steering);
    }

    pub fn steering(&self) -> f64 {
        if self.max_steering_angle > 0.0 {
            self.steering_angle / self.max_steering_angle
        } else {
            0.0
        }
    }

    pub fn steering_angle(&self) -> f64 {
        self.steering_angle
    }

    pub fn max_steering_angle(&self) -> f64 {
        self.max_steering_angle
    }

    pub fn speed(&self) -> f64 {
        self.inertial_model.speed()
    }

    pub fn inertial_model(&self) -> &InertialModel1D {
        &self.inertial_model
    }

    pub fn pos(&self) -> Vector2D {
        self.rectangle.pos()
    }

    pub fn set_pos(&mut self, pos: Vector2D) {
        self.rectangle.set_pos(pos);
    }

    pub fn angle(&self) -> f64 {
        self.rectangle.angle()
    }

    pub fn wheel_base(&self) -> f64 {
        self.wheel_base
    }

    pub fn wheel_tread(&self) -> f64 {
        self.wheel_tread
    }

    pub fn wheel_base_offset(&self) -> f64 {
        self.wheel_base_offset
    }

    pub fn wheel_diameter(&self) -> f64 {
        self.wheel_diameter
    }

    pub fn set_dimensions(&mut self, width: f64, length: f64) -> Result<()> {
        self.rectangle.set_dimensions(width, length)
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = Some(name.into());
    }

    pub fn telemetry(&self) -> VehicleTelemetry {
        VehicleTelemetry {
            pos: self.pos(),
            angle: self.angle(),
            speed: self.speed(),
            steering: self.steering(),
        }
    }

    /// Radius of the turning circle of the rear axle for the current steering angle.
    /// Positive radii turn left. `None` while driving straight.
    pub fn turning_radius(&self) -> Option<f64> {
        if self.steering_angle.abs() > STEERING_EPSILON {
            Some(self.wheel_base / self.steering_angle.to_radians().tan())
        } else {
            None
        }
    }

    /// Advances the vehicle by `dt` seconds.
    pub fn tick(&mut self, dt: f64) {
        self.inertial_model.apply_force(self.throttle * dt * FORCE_SCALE);
        self.inertial_model.update(dt);
        let speed = self.inertial_model.speed();

        match self.turning_radius() {
            Some(icr) => {
                // arc length / radius
                let delta_theta = speed * DISTANCE_SCALE * dt / icr;
                let rx = icr * delta_theta.cos() - icr;
                let ry = icr * delta_theta.sin();

                if speed.abs() > SPEED_EPSILON {
                    self.move_local(rx, ry);
                    self.rectangle.rotate_by(delta_theta.to_degrees());
                }
            }
            None => {
                let ry = speed * DISTANCE_SCALE * dt;
                self.move_local(0.0, ry);
            }
        }

        trace!(
            speed,
            x = self.pos().x,
            y = self.pos().y,
            angle = self.angle(),
            "vehicle ticked"
        );
    }

    /// Moves by `ry` along the heading and by `rx` along its right hand side.
    fn move_local(&mut self, rx: f64, ry: f64) {
        let displacement = Vector2D::new(ry, -rx).rotate_deg(self.rectangle.angle());
        self.rectangle.translate(displacement);
    }
}

impl Collider for Vehicle {
    fn rectangle(&self) -> &Rectangle {
        &self.rectangle
    }
}

impl DynamicObject for Vehicle {
    fn tick(&mut self, dt: f64) {
        Vehicle::tick(self, dt)
    }

    fn check_dt(&self, dt: f64) -> Result<()> {
        self.inertial_model.check_dt(dt)
    }

    fn rectangle_mut(&mut self) -> &mut Rectangle {
        &mut self.rectangle
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

// f64::clamp passes NaN through
fn clamp_control(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(-1.0, 1.0)
    }
}
