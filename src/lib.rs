//! graphrel - openCypher front-end for relational engines
//!
//! This crate turns openCypher source text into a fully-typed relational
//! query tree, the same shape the host's SQL front-end would have produced:
//! - Parsing into a clause/expression AST
//! - Name resolution, expression lowering and pattern-to-join planning
//! - UNION normalization and writer-directive packaging
//! - A runtime depth-first traversal engine for variable-length edges
//!
//! Execution stays with the host: the emitted [`query_planner::logical_plan::Query`]
//! tree defers aggregation, sorting and tuple iteration to the embedding
//! engine, which drives [`vle::VleTraversal`] one path per call for each
//! `vle(…)` range-table function the plan contains.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

pub mod config;
pub mod graph_catalog;
pub mod open_cypher_parser;
pub mod query_planner;
pub mod utils;
pub mod value;
pub mod vle;

pub use config::FrontendConfig;
pub use graph_catalog::{GraphCatalog, GraphRecord};
pub use open_cypher_parser::SyntaxError;
pub use query_planner::errors::{ErrorCategory, PlanError};
pub use query_planner::logical_plan::Query;
pub use value::Value;

use query_planner::logical_plan::plan_builder::Planner;
use query_planner::plan_ctx::NameArena;

/// Any error the front-end surfaces. Nothing is recovered silently: a
/// partially-built query is discarded, and no writer directive has executed
/// during transform.
#[derive(Error, Debug)]
pub enum FrontendError {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),
    #[error(transparent)]
    Plan(#[from] PlanError),
    #[error(transparent)]
    Config(#[from] config::ConfigError),
    #[error(transparent)]
    Traversal(#[from] vle::TraversalError),
}

/// The result of compiling one statement.
#[derive(Debug)]
pub struct CompiledQuery {
    pub query: Arc<Query>,
    pub graph: GraphRecord,
}

/// The query-entry surface the host's `cypher(graph, text, params)` function
/// reaches: strip comments, parse, and transform against the catalog.
///
/// `params` maps `$name` markers to values; when
/// [`FrontendConfig::validate_parameters`] is set and a map is supplied,
/// unbound markers fail compilation instead of execution.
pub fn compile(
    catalog: &mut GraphCatalog,
    config: &FrontendConfig,
    graph_name: &str,
    source: &str,
    params: Option<&HashMap<String, Value>>,
) -> Result<CompiledQuery, FrontendError> {
    let graph_name = if graph_name.is_empty() {
        config.default_graph.as_str()
    } else {
        graph_name
    };
    let graph = catalog.graph(graph_name).map_err(PlanError::from)?.clone();

    let stripped = open_cypher_parser::strip_comments(source);
    let statement = open_cypher_parser::parse_cypher(&stripped)?;
    log::debug!("compile: parsed statement for graph \"{}\"", graph.name);

    let arena = NameArena::new();
    let mut planner = Planner::new(catalog, graph.clone(), config, params, &arena);
    let query = planner.plan_statement(&statement)?;

    #[cfg(debug_assertions)]
    if let Err(violation) = query_planner::logical_plan::validate::check_invariants(&query) {
        panic!("{}", violation);
    }
    log::trace!("compile: emitted plan\n{}", query.explain());

    Ok(CompiledQuery { query, graph })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (GraphCatalog, FrontendConfig) {
        let mut catalog = GraphCatalog::new();
        catalog.create_graph("g");
        (catalog, FrontendConfig::default())
    }

    #[test]
    fn test_compile_simple_match() {
        let (mut catalog, config) = setup();
        let compiled = compile(
            &mut catalog,
            &config,
            "g",
            "MATCH (a)-[r]->(b) RETURN a, r, b",
            None,
        )
        .unwrap();
        assert_eq!(compiled.query.targets.len(), 3);
    }

    #[test]
    fn test_compile_strips_comments() {
        let (mut catalog, config) = setup();
        let compiled = compile(
            &mut catalog,
            &config,
            "g",
            "// leading comment\nMATCH (a) RETURN a /* trailing */",
            None,
        )
        .unwrap();
        assert_eq!(compiled.query.targets.len(), 1);
    }

    #[test]
    fn test_unknown_graph_is_a_binding_error() {
        let mut catalog = GraphCatalog::new();
        let config = FrontendConfig::default();
        let err = compile(&mut catalog, &config, "missing", "MATCH (a) RETURN a", None)
            .unwrap_err();
        match err {
            FrontendError::Plan(e) => assert_eq!(e.category(), ErrorCategory::Binding),
            other => panic!("expected plan error, got {other:?}"),
        }
    }

    #[test]
    fn test_default_graph_fallback() {
        let mut catalog = GraphCatalog::new();
        catalog.create_graph("default");
        let config = FrontendConfig::default();
        assert!(compile(&mut catalog, &config, "", "MATCH (a) RETURN a", None).is_ok());
    }

    #[test]
    fn test_unbound_parameter_is_rejected_when_validating() {
        let (mut catalog, config) = setup();
        let params = HashMap::new();
        let err = compile(
            &mut catalog,
            &config,
            "g",
            "MATCH (a) WHERE a.k = $missing RETURN a",
            Some(&params),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            FrontendError::Plan(PlanError::UnboundParameter(_))
        ));
    }

    #[test]
    fn test_call_is_not_supported() {
        let (mut catalog, config) = setup();
        let err = compile(
            &mut catalog,
            &config,
            "g",
            "CALL db.labels() YIELD label RETURN label",
            None,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            FrontendError::Plan(PlanError::CallNotSupported)
        ));
    }
}
