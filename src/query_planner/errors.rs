use thiserror::Error;

use crate::graph_catalog::CatalogError;
use crate::query_planner::types::TypeTag;

/// Taxonomy bucket of a planning error, mirrored in the public error
/// surface so callers can route without string matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Syntax,
    Binding,
    Semantic,
    Type,
    NotSupported,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlanError {
    // --- binding errors ---
    #[error("duplicate alias \"{0}\"")]
    DuplicateBinding(String),
    #[error("variable \"{0}\" does not exist")]
    UnknownVariable(String),
    #[error("variable \"{0}\" already exists with a different kind")]
    BindingKindConflict(String),
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    // --- semantic errors ---
    #[error("only directed relationships are allowed in CREATE")]
    DirectedEdgeRequired,
    #[error("relationships in CREATE must provide a label")]
    CreateEdgeLabelRequired,
    #[error("CREATE may not add a label or properties to the existing variable \"{0}\"")]
    CreateRedeclaresVariable(String),
    #[error("edge variable \"{0}\" declared in MERGE cannot be reused")]
    MergeEdgeReused(String),
    #[error("DELETE requires a preceding clause that can produce variables")]
    DeleteWithoutSource,
    #[error("parameter property maps are not allowed in {0}")]
    PropertyParameterInWriter(&'static str),
    #[error("{0} target must be of the form variable.property_name")]
    InvalidSetTarget(&'static str),
    #[error("DELETE requires a vertex or edge variable reference")]
    InvalidDeleteTarget,
    #[error("variable-length relationships are not allowed in {0}")]
    VarLenNotAllowedHere(&'static str),

    // --- type errors ---
    #[error("UNION column {position} has mismatched types ({left} vs {right})")]
    UnionColumnType {
        position: usize,
        left: TypeTag,
        right: TypeTag,
    },
    #[error("UNION branches must return the same number of columns ({left} vs {right})")]
    UnionColumnCount { left: usize, right: usize },
    #[error("LIMIT/SKIP may only reference parameters or constants")]
    IllegalLimit,
    #[error("WHERE expression must evaluate to a boolean, found {0}")]
    NonBooleanWhere(TypeTag),
    #[error("unknown typecast target \"{0}\"")]
    UnknownTypecastTarget(String),
    #[error("every non-variable expression in WITH must be aliased")]
    MissingAlias,
    #[error("ORDER BY on a UNION may only reference output column names")]
    InvalidUnionOrderBy,

    // --- syntax errors surfacing at transform time ---
    #[error("invalid regular expression: {0}")]
    InvalidRegex(String),

    // --- not supported ---
    #[error("CALL/YIELD procedures are not supported")]
    CallNotSupported,
    #[error("grouping sets are not supported")]
    GroupingSetsNotSupported,
    #[error("recursive queries inside UNION are not supported")]
    RecursiveUnionNotSupported,
    #[error("parameter \"{0}\" is not bound")]
    UnboundParameter(String),
}

impl PlanError {
    pub fn category(&self) -> ErrorCategory {
        use PlanError::*;
        match self {
            DuplicateBinding(_) | UnknownVariable(_) | BindingKindConflict(_) | Catalog(_) => {
                ErrorCategory::Binding
            }
            DirectedEdgeRequired
            | CreateEdgeLabelRequired
            | CreateRedeclaresVariable(_)
            | MergeEdgeReused(_)
            | DeleteWithoutSource
            | PropertyParameterInWriter(_)
            | InvalidSetTarget(_)
            | InvalidDeleteTarget
            | VarLenNotAllowedHere(_) => ErrorCategory::Semantic,
            UnionColumnType { .. }
            | UnionColumnCount { .. }
            | IllegalLimit
            | NonBooleanWhere(_)
            | UnknownTypecastTarget(_)
            | MissingAlias
            | InvalidUnionOrderBy => ErrorCategory::Type,
            InvalidRegex(_) => ErrorCategory::Syntax,
            CallNotSupported
            | GroupingSetsNotSupported
            | RecursiveUnionNotSupported
            | UnboundParameter(_) => ErrorCategory::NotSupported,
        }
    }
}

pub type PlanResult<T> = Result<T, PlanError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_taxonomy_buckets() {
        assert_eq!(
            PlanError::UnknownVariable("x".into()).category(),
            ErrorCategory::Binding
        );
        assert_eq!(
            PlanError::DirectedEdgeRequired.category(),
            ErrorCategory::Semantic
        );
        assert_eq!(PlanError::IllegalLimit.category(), ErrorCategory::Type);
        assert_eq!(
            PlanError::InvalidRegex("(".into()).category(),
            ErrorCategory::Syntax
        );
        assert_eq!(
            PlanError::CallNotSupported.category(),
            ErrorCategory::NotSupported
        );
    }

    #[test]
    fn test_messages_name_the_offender() {
        let err = PlanError::DuplicateBinding("friend".into());
        assert!(err.to_string().contains("friend"));
        let err = PlanError::InvalidSetTarget("REMOVE");
        assert!(err.to_string().starts_with("REMOVE"));
    }
}
