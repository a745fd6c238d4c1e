use serde::Deserialize;

/// Static description of one plant, loaded from configuration at startup.
///
/// `name` doubles as the wire token that field devices prefix their keys
/// with; it is matched case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PlantDefinition {
    pub id: i32,
    pub name: String,
    pub unit_count: i32,
}
