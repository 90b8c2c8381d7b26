use serde::{Deserialize, Serialize};

/// Share of the vehicle length used as wheel base when the model has no axle section.
const DEFAULT_WHEEL_BASE_RATIO: f64 = 0.7;

/// Static description of a vehicle as read from a model file.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VehicleModel {
    pub mass: f64,
    pub friction: f64,
    pub width: f64,
    pub length: f64,
    /// Maximum steering angle in degrees.
    pub steering_angle: f64,
    #[serde(default)]
    pub wheel_diameter: f64,
    #[serde(default)]
    pub axle: Option<Axle>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Axle {
    pub wheel_base: f64,
    pub wheel_tread: f64,
    #[serde(default)]
    pub wheel_base_offset: f64,
}

impl VehicleModel {
    /// The axle of the model, or one derived from the body dimensions.
    pub fn axle_or_default(&self) -> Axle {
        self.axle.unwrap_or(Axle {
            wheel_base: self.length * DEFAULT_WHEEL_BASE_RATIO,
            wheel_tread: self.width,
            wheel_base_offset: 0.0,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::simulation::vehicles::vehicle_model::{Axle, VehicleModel};
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn parse_camel_case() {
        let yaml = r#"
        mass: 1500
        friction: 0.5
        width: 60
        length: 120
        steeringAngle: 30
        wheelDiameter: 20
        axle:
          wheelBase: 80
          wheelTread: 50
          wheelBaseOffset: 5
        "#;
        let model: VehicleModel = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(model.mass, 1500.);
        assert_eq!(model.steering_angle, 30.);
        assert_eq!(model.wheel_diameter, 20.);
        assert_eq!(
            model.axle,
            Some(Axle {
                wheel_base: 80.,
                wheel_tread: 50.,
                wheel_base_offset: 5.,
            })
        );
        assert_eq!(model.axle_or_default().wheel_base, 80.);
    }

    #[test]
    fn default_axle_from_body() {
        let yaml = "{mass: 1, friction: 0.1, width: 60, length: 100, steeringAngle: 25}";
        let model: VehicleModel = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(model.axle, None);

        let axle = model.axle_or_default();
        assert_approx_eq!(70., axle.wheel_base);
        assert_eq!(60., axle.wheel_tread);
        assert_eq!(0., axle.wheel_base_offset);
    }

    #[test]
    fn missing_mass_is_an_error() {
        let yaml = "{friction: 0.1, width: 60, length: 100, steeringAngle: 25}";
        assert!(serde_yaml::from_str::<VehicleModel>(yaml).is_err());
    }
}
