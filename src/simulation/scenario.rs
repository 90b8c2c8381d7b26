use crate::simulation::config::{Config, EgoVehicle};
use crate::simulation::engines::sim_engine::SimEngine;
use crate::simulation::engines::{DynamicObject, ObjectRef};
use crate::simulation::error::{Result, SimError};
use crate::simulation::io;
use crate::simulation::scene_object::{SceneObject, SceneObjectModel};
use crate::simulation::vector::Vector2D;
use crate::simulation::vehicles::Vehicle;
use crate::simulation::vehicles::vehicle_model::VehicleModel;
use ahash::HashMap;
use derive_more::Debug;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Content of a scenario file.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ScenarioFile {
    #[serde(default)]
    pub aliases: Vec<Alias>,
    pub objects: Objects,
}

/// Binds a name to an object type and optional model data, so that placements can reuse it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Alias {
    pub name: String,
    #[serde(rename = "type")]
    pub object_type: String,
    /// Name of a render type. Only kept so that the scenario stays readable by renderers.
    #[serde(default)]
    pub render: Option<String>,
    #[serde(default)]
    pub model: Option<PathBuf>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct Objects {
    #[serde(default, rename = "static")]
    pub static_objects: Vec<ObjectPlacement>,
    #[serde(default, rename = "dynamic")]
    pub dynamic_objects: Vec<ObjectPlacement>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ObjectPlacement {
    pub alias: String,
    pub loc: Vector2D,
    #[serde(default)]
    pub angle: f64,
    /// `[width, length]`. Zero keeps the value of the model.
    #[serde(default)]
    pub dim: Option<[f64; 2]>,
    #[serde(default)]
    pub name: Option<String>,
}

type StaticConstructor =
    Box<dyn Fn(&ObjectPlacement, Option<&Value>) -> Result<SceneObject> + Send + Sync>;
type DynamicConstructor =
    Box<dyn Fn(&ObjectPlacement, Option<&Value>) -> Result<Box<dyn DynamicObject>> + Send + Sync>;

/// Maps the object type of an alias to a constructor. Static and dynamic objects are registered
/// separately, as only [`SceneObject`]s can be static.
#[derive(Debug, Default)]
pub struct ObjectFactory {
    #[debug(skip)]
    static_constructors: HashMap<String, StaticConstructor>,
    #[debug(skip)]
    dynamic_constructors: HashMap<String, DynamicConstructor>,
}

impl ObjectFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// A factory knowing `SceneObject` (static and dynamic) and `Vehicle` (dynamic).
    pub fn with_defaults() -> Self {
        let mut factory = Self::new();
        factory.register_static("SceneObject", create_scene_object);
        factory.register_dynamic("SceneObject", |placement, model| {
            Ok(Box::new(create_scene_object(placement, model)?) as Box<dyn DynamicObject>)
        });
        factory.register_dynamic("Vehicle", |placement, model| {
            Ok(Box::new(create_vehicle(placement, model)?) as Box<dyn DynamicObject>)
        });
        factory
    }

    pub fn register_static<F>(&mut self, object_type: impl Into<String>, constructor: F)
    where
        F: Fn(&ObjectPlacement, Option<&Value>) -> Result<SceneObject> + Send + Sync + 'static,
    {
        self.static_constructors
            .insert(object_type.into(), Box::new(constructor));
    }

    pub fn register_dynamic<F>(&mut self, object_type: impl Into<String>, constructor: F)
    where
        F: Fn(&ObjectPlacement, Option<&Value>) -> Result<Box<dyn DynamicObject>>
            + Send
            + Sync
            + 'static,
    {
        self.dynamic_constructors
            .insert(object_type.into(), Box::new(constructor));
    }

    pub fn create_static(
        &self,
        object_type: &str,
        placement: &ObjectPlacement,
        model: Option<&Value>,
    ) -> Result<SceneObject> {
        let constructor = self
            .static_constructors
            .get(object_type)
            .ok_or_else(|| SimError::UnknownObjectType(object_type.to_string()))?;
        constructor(placement, model)
    }

    pub fn create_dynamic(
        &self,
        object_type: &str,
        placement: &ObjectPlacement,
        model: Option<&Value>,
    ) -> Result<Box<dyn DynamicObject>> {
        let constructor = self
            .dynamic_constructors
            .get(object_type)
            .ok_or_else(|| SimError::UnknownObjectType(object_type.to_string()))?;
        constructor(placement, model)
    }
}

fn parse_model<T: serde::de::DeserializeOwned>(alias: &str, model: &Value) -> Result<T> {
    serde_yaml::from_value(model.clone()).map_err(|source| SimError::InvalidModel {
        alias: alias.to_string(),
        source,
    })
}

fn create_scene_object(placement: &ObjectPlacement, model: Option<&Value>) -> Result<SceneObject> {
    let model = match model {
        Some(model) => parse_model(&placement.alias, model)?,
        None => SceneObjectModel::default(),
    };
    let mut object = SceneObject::from_model(placement.loc, placement.angle, &model)?;
    object.set_alias(placement.alias.as_str());
    if let Some(name) = &placement.name {
        object.set_name(name.as_str());
    }
    Ok(object)
}

fn create_vehicle(placement: &ObjectPlacement, model: Option<&Value>) -> Result<Vehicle> {
    let model = model.ok_or_else(|| SimError::MissingModel(placement.alias.clone()))?;
    let model: VehicleModel = parse_model(&placement.alias, model)?;
    let mut vehicle = Vehicle::new(placement.loc, placement.angle, &model)?;
    if let Some(name) = &placement.name {
        vehicle.set_name(name.as_str());
    }
    Ok(vehicle)
}

/// References to the objects a scenario registered with the engine.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SceneHandles {
    pub ego: Option<ObjectRef>,
    pub named_objects: HashMap<String, ObjectRef>,
}

impl SceneHandles {
    pub fn get(&self, name: &str) -> Option<ObjectRef> {
        self.named_objects.get(name).copied()
    }
}

/// The scenario with all model files loaded.
#[derive(Debug)]
pub struct Scenario {
    pub file: ScenarioFile,
    models: HashMap<String, Value>,
    ego: Option<(EgoVehicle, VehicleModel)>,
    // shared with the controller threads
    pub config: Arc<Config>,
}

impl Scenario {
    /// Loads the scenario file and the ego vehicle named in the config. Both are optional, a
    /// config without either yields an empty scene.
    pub fn load(config: Arc<Config>) -> Result<Self> {
        info!("Start loading scenario.");

        let (file, models) = match config.scenario() {
            Some(source) => {
                let path = io::resolve_path(config.context(), &source.path);
                info!("Loading scenario from {path:?}");
                let file: ScenarioFile = io::read_yaml(&path)?;
                let models = Self::load_models(&file, &path)?;
                (file, models)
            }
            None => (
                ScenarioFile {
                    aliases: Vec::new(),
                    objects: Objects::default(),
                },
                HashMap::default(),
            ),
        };

        let ego = match config.ego_vehicle() {
            Some(ego) => {
                let path = io::resolve_path(config.context(), &ego.model);
                info!("Loading ego vehicle model from {path:?}");
                let model: VehicleModel = io::read_yaml(&path)?;
                Some((ego, model))
            }
            None => None,
        };

        Ok(Scenario {
            file,
            models,
            ego,
            config,
        })
    }

    /// Loads the model files of all aliases. Model paths are relative to the scenario file.
    fn load_models(file: &ScenarioFile, scenario_path: &Path) -> Result<HashMap<String, Value>> {
        let context = Some(scenario_path.to_path_buf());
        let mut models = HashMap::default();
        for alias in &file.aliases {
            if let Some(model) = &alias.model {
                let path = io::resolve_path(&context, model);
                debug!("Loading model of alias {} from {path:?}", alias.name);
                let value: Value = io::read_yaml(&path)?;
                models.insert(alias.name.clone(), value);
            }
        }
        Ok(models)
    }

    fn alias(&self, name: &str) -> Result<&Alias> {
        // later definitions win, like overwriting a key in a map
        self.file
            .aliases
            .iter()
            .rev()
            .find(|a| a.name == name)
            .ok_or_else(|| SimError::UnknownAlias(name.to_string()))
    }

    /// Creates all objects and registers them with `engine`: the ego vehicle first, then the
    /// static objects, then the dynamic objects, each in file order.
    ///
    /// All objects are created before the first one is registered, so the engine is left
    /// untouched if any object is invalid.
    pub fn instantiate(&self, engine: &mut SimEngine, factory: &ObjectFactory) -> Result<SceneHandles> {
        let ego = match &self.ego {
            Some((ego, model)) => {
                let mut vehicle = Vehicle::new(ego.position, ego.angle, model)?;
                vehicle.set_name(ego.name.as_str());
                Some((ego.name.clone(), vehicle))
            }
            None => None,
        };

        let mut statics = Vec::new();
        for placement in &self.file.objects.static_objects {
            let alias = self.alias(&placement.alias)?;
            let mut object =
                factory.create_static(&alias.object_type, placement, self.models.get(&alias.name))?;
            if let Some([width, length]) = placement.dim {
                object.set_dimensions(width, length)?;
            }
            statics.push((placement.name.clone(), object));
        }

        let mut dynamics = Vec::new();
        for placement in &self.file.objects.dynamic_objects {
            let alias = self.alias(&placement.alias)?;
            let mut object =
                factory.create_dynamic(&alias.object_type, placement, self.models.get(&alias.name))?;
            if let Some([width, length]) = placement.dim {
                object.rectangle_mut().set_dimensions(width, length)?;
            }
            dynamics.push((placement.name.clone(), object));
        }

        let mut handles = SceneHandles::default();
        if let Some((name, vehicle)) = ego {
            let object_ref = engine.register_dynamic_object(Box::new(vehicle));
            handles.ego = Some(object_ref);
            handles.named_objects.insert(name, object_ref);
        }
        for (name, object) in statics {
            let object_ref = engine.register_static_object(object);
            Self::insert_name(&mut handles, name, object_ref);
        }
        for (name, object) in dynamics {
            let object_ref = engine.register_dynamic_object(object);
            Self::insert_name(&mut handles, name, object_ref);
        }

        info!(
            statics = engine.static_objects().len(),
            dynamics = engine.dynamic_objects().len(),
            "Scenario instantiated."
        );
        Ok(handles)
    }

    fn insert_name(handles: &mut SceneHandles, name: Option<String>, object_ref: ObjectRef) {
        if let Some(name) = name {
            if let Some(previous) = handles.named_objects.insert(name.clone(), object_ref) {
                warn!("Object name {name} is used twice, {previous:?} is no longer reachable by name.");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::simulation::config::{Config, EgoVehicle, ScenarioSource};
    use crate::simulation::engines::ObjectRef;
    use crate::simulation::engines::sim_engine::SimEngine;
    use crate::simulation::error::SimError;
    use crate::simulation::geometry::Collider;
    use crate::simulation::scenario::{ObjectFactory, ObjectPlacement, Scenario, ScenarioFile};
    use crate::simulation::scene_object::SceneObject;
    use crate::simulation::vector::Vector2D;
    use std::fs;
    use std::path::Path;
    use std::sync::Arc;
    use tempfile::TempDir;

    const CAR: &str = r#"
mass: 1000
friction: 0.5
width: 50
length: 100
steeringAngle: 30
wheelDiameter: 20
"#;

    const SCENARIO: &str = r#"
aliases:
  - name: wall
    type: SceneObject
    render: SimpleRender
    model: models/wall.yml
  - name: box
    type: SceneObject
  - name: car
    type: Vehicle
    render: SimpleVehicleRender
    model: models/car.yml
objects:
  static:
    - alias: wall
      loc: [0, -300]
      angle: 0
      dim: [20, 1000]
      name: south
    - alias: wall
      loc: [0, 300]
      angle: 0
      dim: [0, 0]
  dynamic:
    - alias: box
      loc: [200, 0]
      angle: 45
      dim: [30, 30]
      name: crate
    - alias: car
      loc: [-200, 0]
      angle: 180
"#;

    fn write(dir: &Path, file: &str, content: &str) {
        let path = dir.join(file);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn scenario_dir() -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "scenario/scenario.yml", SCENARIO);
        write(
            dir.path(),
            "scenario/models/wall.yml",
            "width: 10\nlength: 500\n",
        );
        write(dir.path(), "scenario/models/car.yml", CAR);
        write(dir.path(), "ego.yml", CAR);
        dir
    }

    fn config(dir: &TempDir, with_ego: bool) -> Arc<Config> {
        let mut config = Config::default();
        config.set_context(Some(dir.path().join("config.yml")));
        config.set_scenario(ScenarioSource {
            path: "scenario/scenario.yml".into(),
        });
        if with_ego {
            config.set_ego_vehicle(EgoVehicle::new("ego.yml"));
        }
        Arc::new(config)
    }

    #[test]
    fn load_and_instantiate() {
        let dir = scenario_dir();
        let scenario = Scenario::load(config(&dir, true)).unwrap();
        let mut engine = SimEngine::new();

        let handles = scenario
            .instantiate(&mut engine, &ObjectFactory::with_defaults())
            .unwrap();

        assert_eq!(2, engine.static_objects().len());
        assert_eq!(3, engine.dynamic_objects().len());
        assert_eq!(Some(ObjectRef::Dynamic(0)), handles.ego);
        assert_eq!(Some(ObjectRef::Dynamic(0)), handles.get("ego"));
        assert_eq!(Some(ObjectRef::Static(0)), handles.get("south"));
        assert_eq!(Some(ObjectRef::Dynamic(1)), handles.get("crate"));
        assert_eq!(3, handles.named_objects.len());

        let ego = engine.vehicle(ObjectRef::Dynamic(0)).unwrap();
        assert_eq!(Vector2D::new(100., 100.), ego.pos());
        assert_eq!(Some("ego"), ego.name());

        let south = &engine.static_objects()[0];
        assert_eq!(20., south.rectangle().width());
        assert_eq!(1000., south.rectangle().length());
        assert_eq!(Some("wall"), south.alias());
        assert_eq!(Some("south"), south.name());

        // zero dimensions keep the model values
        let north = &engine.static_objects()[1];
        assert_eq!(10., north.rectangle().width());
        assert_eq!(500., north.rectangle().length());

        let crate_box = engine.rectangle(ObjectRef::Dynamic(1)).unwrap();
        assert_eq!(30., crate_box.width());
        assert_eq!(45., crate_box.angle());

        let car = engine.vehicle(ObjectRef::Dynamic(2)).unwrap();
        assert_eq!(Vector2D::new(-200., 0.), car.pos());
        assert_eq!(180., car.angle());
        assert_eq!(20., car.wheel_diameter());
    }

    #[test]
    fn scene_without_ego() {
        let dir = scenario_dir();
        let scenario = Scenario::load(config(&dir, false)).unwrap();
        let mut engine = SimEngine::new();
        let handles = scenario
            .instantiate(&mut engine, &ObjectFactory::with_defaults())
            .unwrap();
        assert_eq!(None, handles.ego);
        assert_eq!(Some(ObjectRef::Dynamic(0)), handles.get("crate"));
    }

    #[test]
    fn empty_config_gives_empty_scene() {
        let scenario = Scenario::load(Arc::new(Config::default())).unwrap();
        let mut engine = SimEngine::new();
        let handles = scenario
            .instantiate(&mut engine, &ObjectFactory::with_defaults())
            .unwrap();
        assert_eq!(0, engine.snapshot().len());
        assert!(handles.named_objects.is_empty());
    }

    #[test]
    fn missing_model_file() {
        let dir = scenario_dir();
        fs::remove_file(dir.path().join("scenario/models/car.yml")).unwrap();
        assert!(matches!(
            Scenario::load(config(&dir, false)),
            Err(SimError::Io { .. })
        ));
    }

    fn instantiate_yaml(yaml: &str) -> (SimEngine, Result<(), SimError>) {
        let dir = scenario_dir();
        write(dir.path(), "scenario/scenario.yml", yaml);
        let scenario = Scenario::load(config(&dir, true)).unwrap();
        let mut engine = SimEngine::new();
        let result = scenario
            .instantiate(&mut engine, &ObjectFactory::with_defaults())
            .map(|_| ());
        (engine, result)
    }

    #[test]
    fn unknown_alias_aborts_without_registering() {
        let (engine, result) = instantiate_yaml(
            r#"
objects:
  static:
    - alias: tree
      loc: [0, 0]
"#,
        );
        assert!(matches!(result, Err(SimError::UnknownAlias(alias)) if alias == "tree"));
        assert!(engine.snapshot().is_empty());
    }

    #[test]
    fn vehicle_can_not_be_static() {
        let (_, result) = instantiate_yaml(
            r#"
aliases:
  - name: car
    type: Vehicle
    model: models/car.yml
objects:
  static:
    - alias: car
      loc: [0, 0]
"#,
        );
        assert!(matches!(result, Err(SimError::UnknownObjectType(t)) if t == "Vehicle"));
    }

    #[test]
    fn vehicle_requires_model() {
        let (_, result) = instantiate_yaml(
            r#"
aliases:
  - name: car
    type: Vehicle
objects:
  dynamic:
    - alias: car
      loc: [0, 0]
"#,
        );
        assert!(matches!(result, Err(SimError::MissingModel(alias)) if alias == "car"));
    }

    #[test]
    fn invalid_model_data() {
        let (_, result) = instantiate_yaml(
            r#"
aliases:
  - name: board
    type: Vehicle
    model: models/wall.yml
objects:
  dynamic:
    - alias: board
      loc: [0, 0]
"#,
        );
        assert!(matches!(result, Err(SimError::InvalidModel { .. })));
    }

    #[test]
    fn negative_dimension_is_rejected() {
        let (_, result) = instantiate_yaml(
            r#"
aliases:
  - name: box
    type: SceneObject
objects:
  static:
    - alias: box
      loc: [0, 0]
      dim: [-1, 10]
"#,
        );
        assert!(matches!(result, Err(SimError::InvalidDimension { .. })));
    }

    #[test]
    fn objects_section_is_required() {
        assert!(serde_yaml::from_str::<ScenarioFile>("aliases: []").is_err());
    }

    #[test]
    fn custom_constructor() {
        let mut factory = ObjectFactory::new();
        factory.register_static("Pillar", |placement: &ObjectPlacement, _| {
            SceneObject::new(placement.loc, 0., 10., 10.)
        });

        let placement = ObjectPlacement {
            alias: "pillar".to_string(),
            loc: Vector2D::new(3., 4.),
            angle: 0.,
            dim: None,
            name: None,
        };
        let pillar = factory.create_static("Pillar", &placement, None).unwrap();
        assert_eq!(10., pillar.rectangle().width());
        assert!(matches!(
            factory.create_dynamic("Pillar", &placement, None),
            Err(SimError::UnknownObjectType(_))
        ));
    }
}
