//! Type tags for target-list entries and the small common-type lattice the
//! UNION planner unifies columns with.

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Host-side type of a projected column. `Unknown` plays the role untyped
/// constants play in SQL: it unifies with anything and gets coerced late.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeTag {
    Unknown,
    Boolean,
    Integer,
    Float,
    Numeric,
    String,
    Vertex,
    Edge,
    Traversal,
    VariableEdge,
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TypeTag::Unknown => "unknown",
            TypeTag::Boolean => "boolean",
            TypeTag::Integer => "integer",
            TypeTag::Float => "float",
            TypeTag::Numeric => "numeric",
            TypeTag::String => "string",
            TypeTag::Vertex => "vertex",
            TypeTag::Edge => "edge",
            TypeTag::Traversal => "traversal",
            TypeTag::VariableEdge => "variable_edge",
        };
        f.write_str(name)
    }
}

lazy_static! {
    /// Names accepted on the right of `::`.
    static ref TYPECAST_TARGETS: HashMap<&'static str, TypeTag> = {
        let mut m = HashMap::new();
        m.insert("integer", TypeTag::Integer);
        m.insert("float", TypeTag::Float);
        m.insert("numeric", TypeTag::Numeric);
        m.insert("string", TypeTag::String);
        m.insert("boolean", TypeTag::Boolean);
        m.insert("vertex", TypeTag::Vertex);
        m.insert("edge", TypeTag::Edge);
        m.insert("traversal", TypeTag::Traversal);
        m.insert("variable_edge", TypeTag::VariableEdge);
        m
    };
}

/// Resolve a typecast target name (case-insensitive).
pub fn typecast_target(name: &str) -> Option<TypeTag> {
    TYPECAST_TARGETS
        .get(name.to_ascii_lowercase().as_str())
        .copied()
}

/// The SQL-flavoured common-type rule used per UNION column position.
/// Numeric types widen `integer → numeric → float`; `Unknown` defers to the
/// other side; anything else must match exactly.
pub fn common_type(a: TypeTag, b: TypeTag) -> Option<TypeTag> {
    use TypeTag::*;
    if a == b {
        return Some(a);
    }
    match (a, b) {
        (Unknown, other) | (other, Unknown) => Some(other),
        (Integer, Numeric) | (Numeric, Integer) => Some(Numeric),
        (Integer, Float) | (Float, Integer) => Some(Float),
        (Numeric, Float) | (Float, Numeric) => Some(Float),
        _ => None,
    }
}

/// Equality operator used to eliminate duplicates for a UNION (not ALL)
/// column of the given type.
pub fn equality_operator(tag: TypeTag) -> &'static str {
    match tag {
        TypeTag::Unknown => "eq_gtype",
        TypeTag::Boolean => "eq_boolean",
        TypeTag::Integer => "eq_integer",
        TypeTag::Float => "eq_float",
        TypeTag::Numeric => "eq_numeric",
        TypeTag::String => "eq_string",
        TypeTag::Vertex => "eq_vertex",
        TypeTag::Edge => "eq_edge",
        TypeTag::Traversal => "eq_traversal",
        TypeTag::VariableEdge => "eq_variable_edge",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("integer", Some(TypeTag::Integer))]
    #[test_case("STRING", Some(TypeTag::String))]
    #[test_case("variable_edge", Some(TypeTag::VariableEdge))]
    #[test_case("timestamp", None)]
    fn test_typecast_targets(name: &str, expected: Option<TypeTag>) {
        assert_eq!(typecast_target(name), expected);
    }

    #[test]
    fn test_common_type_lattice() {
        use TypeTag::*;
        assert_eq!(common_type(Integer, Integer), Some(Integer));
        assert_eq!(common_type(Integer, Float), Some(Float));
        assert_eq!(common_type(Numeric, Integer), Some(Numeric));
        assert_eq!(common_type(Numeric, Float), Some(Float));
        assert_eq!(common_type(Unknown, String), Some(String));
        assert_eq!(common_type(Vertex, Unknown), Some(Vertex));
        assert_eq!(common_type(String, Integer), None);
        assert_eq!(common_type(Vertex, Edge), None);
    }
}
