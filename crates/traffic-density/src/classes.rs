use std::collections::HashMap;

use serde::Deserialize;

/// Detector class counted as a vehicle, with its display label.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct VehicleClass {
    pub id: i64,
    pub name: String,
}

impl VehicleClass {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// Fixed lookup of vehicle class ids to labels.
#[derive(Clone, Debug, Default)]
pub struct VehicleClassSet {
    names: HashMap<i64, String>,
}

impl VehicleClassSet {
    pub fn new(classes: impl IntoIterator<Item = VehicleClass>) -> Self {
        Self {
            names: classes.into_iter().map(|c| (c.id, c.name)).collect(),
        }
    }

    pub fn contains(&self, class_id: i64) -> bool {
        self.names.contains_key(&class_id)
    }

    pub fn name(&self, class_id: i64) -> Option<&str> {
        self.names.get(&class_id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Classes of the bundled traffic model.
pub fn default_vehicle_classes() -> Vec<VehicleClass> {
    vec![
        VehicleClass::new(0, "bicycle"),
        VehicleClass::new(1, "bus"),
        VehicleClass::new(2, "car"),
        VehicleClass::new(3, "motorbike"),
    ]
}
