use crate::simulation::engines::{DynamicObject, ObjectRef};
use crate::simulation::error::{Result, SimError};
use crate::simulation::geometry::{Collider, Rectangle};
use crate::simulation::scene_object::SceneObject;
use crate::simulation::vector::Vector2D;
use crate::simulation::vehicles::Vehicle;
use tracing::{debug, instrument};

/// A collision found and resolved during a tick. `pushback` was subtracted from the position of
/// `subject`. Touching objects report a contact with a zero pushback.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contact {
    pub subject: ObjectRef,
    pub other: ObjectRef,
    pub pushback: Vector2D,
}

/// Holds all objects of the scene. Objects are appended and never removed, so an [`ObjectRef`]
/// stays valid for the lifetime of the engine.
#[derive(Debug, Default)]
pub struct SimEngine {
    static_objects: Vec<SceneObject>,
    dynamic_objects: Vec<Box<dyn DynamicObject>>,
    now: f64,
    ticks: u64,
}

impl SimEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_static_object(&mut self, object: SceneObject) -> ObjectRef {
        self.static_objects.push(object);
        ObjectRef::Static(self.static_objects.len() - 1)
    }

    pub fn register_dynamic_object(&mut self, object: Box<dyn DynamicObject>) -> ObjectRef {
        self.dynamic_objects.push(object);
        ObjectRef::Dynamic(self.dynamic_objects.len() - 1)
    }

    /// Advances all dynamic objects by `dt` and resolves collisions afterward.
    ///
    /// Every dynamic object is first collided with the static objects and then with the other
    /// dynamic objects, each in registration order. A hit moves the object out immediately, so
    /// later checks see the corrected position. Velocities are left untouched.
    ///
    /// Nothing is mutated if `dt` is rejected.
    #[instrument(level = "trace", skip(self), fields(tick = self.ticks))]
    pub fn tick(&mut self, dt: f64) -> Result<Vec<Contact>> {
        if !(dt.is_finite() && dt >= 0.0) {
            return Err(SimError::InvalidTimeStep(dt));
        }
        for object in &self.dynamic_objects {
            object.check_dt(dt)?;
        }

        for object in self.dynamic_objects.iter_mut() {
            object.tick(dt);
        }

        let mut contacts = Vec::new();
        for i in 0..self.dynamic_objects.len() {
            for (s, other) in self.static_objects.iter().enumerate() {
                let (collided, pushback) = self.dynamic_objects[i]
                    .rectangle()
                    .check_collision(other.rectangle());
                if collided {
                    self.dynamic_objects[i].rectangle_mut().translate(-pushback);
                    contacts.push(Contact {
                        subject: ObjectRef::Dynamic(i),
                        other: ObjectRef::Static(s),
                        pushback,
                    });
                }
            }

            for j in 0..self.dynamic_objects.len() {
                if i == j {
                    continue;
                }
                let (collided, pushback) = self.dynamic_objects[i]
                    .rectangle()
                    .check_collision(self.dynamic_objects[j].rectangle());
                if collided {
                    self.dynamic_objects[i].rectangle_mut().translate(-pushback);
                    contacts.push(Contact {
                        subject: ObjectRef::Dynamic(i),
                        other: ObjectRef::Dynamic(j),
                        pushback,
                    });
                }
            }
        }

        self.now += dt;
        self.ticks += 1;
        if !contacts.is_empty() {
            debug!(now = self.now, contacts = contacts.len(), "resolved collisions");
        }
        Ok(contacts)
    }

    /// Copies the geometry of all objects, static objects first.
    pub fn snapshot(&self) -> Vec<(ObjectRef, Rectangle)> {
        self.all_objects()
            .map(|(object_ref, rectangle)| (object_ref, rectangle.clone()))
            .collect()
    }

    pub fn all_objects(&self) -> impl Iterator<Item = (ObjectRef, &Rectangle)> {
        let statics = self
            .static_objects
            .iter()
            .enumerate()
            .map(|(i, o)| (ObjectRef::Static(i), o.rectangle()));
        let dynamics = self
            .dynamic_objects
            .iter()
            .enumerate()
            .map(|(i, o)| (ObjectRef::Dynamic(i), o.rectangle()));
        statics.chain(dynamics)
    }

    pub fn static_objects(&self) -> &[SceneObject] {
        &self.static_objects
    }

    pub fn dynamic_objects(&self) -> &[Box<dyn DynamicObject>] {
        &self.dynamic_objects
    }

    pub fn rectangle(&self, object_ref: ObjectRef) -> Result<&Rectangle> {
        let rectangle = match object_ref {
            ObjectRef::Static(i) => self.static_objects.get(i).map(|o| o.rectangle()),
            ObjectRef::Dynamic(i) => self.dynamic_objects.get(i).map(|o| o.rectangle()),
        };
        rectangle.ok_or(SimError::UnknownObject(object_ref))
    }

    pub fn vehicle(&self, object_ref: ObjectRef) -> Result<&Vehicle> {
        let ObjectRef::Dynamic(i) = object_ref else {
            return Err(SimError::UnknownObject(object_ref));
        };
        self.dynamic_objects
            .get(i)
            .and_then(|o| o.as_any().downcast_ref::<Vehicle>())
            .ok_or(SimError::UnknownObject(object_ref))
    }

    pub fn vehicle_mut(&mut self, object_ref: ObjectRef) -> Result<&mut Vehicle> {
        let ObjectRef::Dynamic(i) = object_ref else {
            return Err(SimError::UnknownObject(object_ref));
        };
        self.dynamic_objects
            .get_mut(i)
            .and_then(|o| o.as_any_mut().downcast_mut::<Vehicle>())
            .ok_or(SimError::UnknownObject(object_ref))
    }

    /// Forwards control input to a vehicle. Non-finite input is rejected and leaves the vehicle
    /// unchanged.
    pub fn set_throttle(&mut self, object_ref: ObjectRef, throttle: f64) -> Result<()> {
        check_control("throttle", throttle)?;
        self.vehicle_mut(object_ref)?.set_throttle(throttle);
        Ok(())
    }

    pub fn set_steering(&mut self, object_ref: ObjectRef, steering: f64) -> Result<()> {
        check_control("steering", steering)?;
        self.vehicle_mut(object_ref)?.set_steering(steering);
        Ok(())
    }

    /// Simulated seconds since the engine was created.
    pub fn now(&self) -> f64 {
        self.now
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }
}

fn check_control(input: &'static str, value: f64) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(SimError::InvalidControl { input, value })
    }
}
