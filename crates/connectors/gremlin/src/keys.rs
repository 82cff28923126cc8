//! Split properties, pass-through arguments and structural element keys.

use crate::traversal::{Direction, ElementKind};

/// Split property holding the element kind (`vertex` or `edge`).
pub const GRAPH_TYPE: &str = "graph_type";
/// Split property holding the element label the table maps to.
pub const LABEL: &str = "label";

/// Pass-through argument naming the graph database.
pub const DATABASE: &str = "database";
/// Pass-through argument describing the result shape of the raw traversal.
pub const COMPONENT_TYPE: &str = "component_type";

/// Columns that address element structure instead of a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpecialKey {
    Id,
    Label,
    In,
    Out,
}

impl SpecialKey {
    /// Matches a column name case-insensitively. Endpoints only exist on
    /// edges; on vertices `in` and `out` are ordinary properties.
    pub fn for_column(name: &str, kind: ElementKind) -> Option<Self> {
        let key = match name.to_ascii_lowercase().as_str() {
            "id" => SpecialKey::Id,
            "label" => SpecialKey::Label,
            "in" => SpecialKey::In,
            "out" => SpecialKey::Out,
            _ => return None,
        };
        match (key, kind) {
            (SpecialKey::In | SpecialKey::Out, ElementKind::Vertex) => None,
            _ => Some(key),
        }
    }

    /// The key the value is stored under in a returned element map.
    pub fn record_key(&self) -> &'static str {
        match self {
            SpecialKey::Id => "T.id",
            SpecialKey::Label => "T.label",
            SpecialKey::In => "IN",
            SpecialKey::Out => "OUT",
        }
    }

    pub fn from_record_key(key: &str) -> Option<Self> {
        [SpecialKey::Id, SpecialKey::Label, SpecialKey::In, SpecialKey::Out]
            .into_iter()
            .find(|special| special.record_key() == key)
    }

    pub fn direction(&self) -> Option<Direction> {
        match self {
            SpecialKey::In => Some(Direction::In),
            SpecialKey::Out => Some(Direction::Out),
            _ => None,
        }
    }
}

/// Result shape of a pass-through traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentType {
    Vertex,
    Edge,
    ValueMap,
}

impl std::str::FromStr for ComponentType {
    type Err = floe_common::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "vertex" => Ok(ComponentType::Vertex),
            "edge" => Ok(ComponentType::Edge),
            "valuemap" => Ok(ComponentType::ValueMap),
            other => Err(floe_common::Error::malformed(format!(
                "invalid component_type '{other}', expected vertex, edge or valuemap"
            ))),
        }
    }
}

impl From<ElementKind> for ComponentType {
    fn from(kind: ElementKind) -> Self {
        match kind {
            ElementKind::Vertex => ComponentType::Vertex,
            ElementKind::Edge => ComponentType::Edge,
        }
    }
}
