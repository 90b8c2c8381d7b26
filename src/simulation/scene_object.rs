use crate::simulation::engines::DynamicObject;
use crate::simulation::error::Result;
use crate::simulation::geometry::{Collider, Rectangle};
use crate::simulation::vector::Vector2D;
use serde::{Deserialize, Serialize};
use std::any::Any;

/// Model data of a plain rectangular object, e.g. a wall.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct SceneObjectModel {
    #[serde(default)]
    pub width: f64,
    #[serde(default)]
    pub length: f64,
    #[serde(default)]
    pub resizable: bool,
}

/// A rectangle placed in the scene. Usually registered as a static object.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneObject {
    rectangle: Rectangle,
    resizable: bool,
    name: Option<String>,
    alias: Option<String>,
}

impl SceneObject {
    pub fn new(pos: Vector2D, angle: f64, width: f64, length: f64) -> Result<Self> {
        Ok(SceneObject {
            rectangle: Rectangle::new(pos, angle, width, length)?,
            resizable: false,
            name: None,
            alias: None,
        })
    }

    pub fn from_model(pos: Vector2D, angle: f64, model: &SceneObjectModel) -> Result<Self> {
        let mut object = Self::new(pos, angle, model.width, model.length)?;
        object.resizable = model.resizable;
        Ok(object)
    }

    pub fn pos(&self) -> Vector2D {
        self.rectangle.pos()
    }

    pub fn angle(&self) -> f64 {
        self.rectangle.angle()
    }

    pub fn set_dimensions(&mut self, width: f64, length: f64) -> Result<()> {
        self.rectangle.set_dimensions(width, length)
    }

    pub fn is_resizable(&self) -> bool {
        self.resizable
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = Some(name.into());
    }

    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    pub fn set_alias(&mut self, alias: impl Into<String>) {
        self.alias = Some(alias.into());
    }
}

impl Collider for SceneObject {
    fn rectangle(&self) -> &Rectangle {
        &self.rectangle
    }
}

// A scene object registered as dynamic gets pushed around but never moves by itself.
impl DynamicObject for SceneObject {
    fn tick(&mut self, _dt: f64) {}

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
