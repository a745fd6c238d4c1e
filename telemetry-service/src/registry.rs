use std::collections::{BTreeMap, HashMap};

use plant_client::domain::PlantDefinition;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum RegistryError {
    #[error("plant {0} must have at least one unit")]
    NoUnits(i32),
    #[error("plant id {0} is configured more than once")]
    DuplicateId(i32),
    #[error("plant name '{0}' is configured more than once")]
    DuplicateName(String),
    #[error("plant name '{0}' must be a non-empty alphanumeric token")]
    InvalidName(String),
}

/// Immutable plant table built once at startup and shared by reference.
#[derive(Debug, Clone)]
pub struct PlantRegistry {
    plants: BTreeMap<i32, PlantDefinition>,
    by_token: HashMap<String, i32>,
}

impl PlantRegistry {
    pub fn new(definitions: Vec<PlantDefinition>) -> Result<Self, RegistryError> {
        let mut plants = BTreeMap::new();
        let mut by_token = HashMap::new();

        for def in definitions {
            if def.unit_count < 1 {
                return Err(RegistryError::NoUnits(def.id));
            }
            if def.name.is_empty() || !def.name.chars().all(|c| c.is_ascii_alphanumeric()) {
                return Err(RegistryError::InvalidName(def.name));
            }

            let token = def.name.to_ascii_lowercase();
            if by_token.contains_key(&token) {
                return Err(RegistryError::DuplicateName(def.name));
            }
            if plants.contains_key(&def.id) {
                return Err(RegistryError::DuplicateId(def.id));
            }

            by_token.insert(token, def.id);
            plants.insert(def.id, def);
        }

        Ok(Self { plants, by_token })
    }

    /// True when the plant is known and `1 <= unit_id <= unit_count`.
    pub fn validate(&self, plant_id: i32, unit_id: i32) -> bool {
        self.unit_count(plant_id)
            .is_some_and(|count| (1..=count).contains(&unit_id))
    }

    pub fn unit_count(&self, plant_id: i32) -> Option<i32> {
        self.plants.get(&plant_id).map(|p| p.unit_count)
    }

    pub fn display_name(&self, plant_id: i32) -> String {
        self.plants
            .get(&plant_id)
            .map(|p| p.name.clone())
            .unwrap_or_else(|| format!("Plant{plant_id}"))
    }

    /// Resolve a wire token such as `pta` or `PTA` to its plant id.
    pub fn resolve_token(&self, token: &str) -> Option<i32> {
        self.by_token.get(&token.to_ascii_lowercase()).copied()
    }

    pub fn contains(&self, plant_id: i32) -> bool {
        self.plants.contains_key(&plant_id)
    }

    /// All plants in ascending id order.
    pub fn plants(&self) -> impl Iterator<Item = &PlantDefinition> {
        self.plants.values()
    }

    pub fn total_units(&self) -> i32 {
        self.plants.values().map(|p| p.unit_count).sum()
    }
}

#[cfg(test)]
pub(crate) fn test_registry() -> PlantRegistry {
    PlantRegistry::new(vec![
        PlantDefinition {
            id: 1,
            name: "PTA".to_string(),
            unit_count: 1,
        },
        PlantDefinition {
            id: 2,
            name: "BGD".to_string(),
            unit_count: 2,
        },
        PlantDefinition {
            id: 5,
            name: "GRU".to_string(),
            unit_count: 3,
        },
    ])
    .expect("test registry is valid")
}
