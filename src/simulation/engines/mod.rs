use crate::simulation::error::Result;
use crate::simulation::geometry::{Collider, Rectangle};
use std::any::Any;
use std::fmt::Debug;

pub mod sim_engine;

/// Identifies an object registered with the [`sim_engine::SimEngine`]. The index is the
/// registration position inside the respective collection and never changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectRef {
    Static(usize),
    Dynamic(usize),
}

impl ObjectRef {
    pub fn index(&self) -> usize {
        match self {
            ObjectRef::Static(i) | ObjectRef::Dynamic(i) => *i,
        }
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self, ObjectRef::Dynamic(_))
    }
}

/// Objects which move on their own or are moved by collision resolution.
pub trait DynamicObject: Collider + Debug + Send + Sync {
    fn tick(&mut self, dt: f64);

    /// Fails if `dt` can not be simulated by this object. Called before any object is ticked.
    fn check_dt(&self, _dt: f64) -> Result<()> {
        Ok(())
    }

    fn rectangle_mut(&mut self) -> &mut Rectangle;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}
