//! Name resolution for the transform pass.
//!
//! A [`PlanCtx`] tracks the ordered list of bindings visible to the clause
//! being planned. Bindings are declared by patterns and projections, looked
//! up by expression lowering, and re-pointed at the previous clause's
//! subquery at every clause boundary ([`PlanCtx::advance`]).
//!
//! Anonymous pattern entities receive deterministic `_default_<n>` names
//! allocated from a [`NameArena`]; the arena outlives the context so names
//! can be borrowed just like source identifiers.

use bumpalo::Bump;

use crate::query_planner::errors::{PlanError, PlanResult};
use crate::query_planner::logical_expr::LogicalExpr;
use crate::query_planner::types::TypeTag;

/// Arena for names generated during a single transform pass. Dropped as a
/// whole when planning finishes.
#[derive(Default)]
pub struct NameArena {
    bump: Bump,
}

impl NameArena {
    pub fn new() -> Self {
        Self { bump: Bump::new() }
    }

    pub fn alloc(&self, s: &str) -> &str {
        self.bump.alloc_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    Vertex,
    Edge,
    VleEdge,
    Scalar,
}

impl BindingKind {
    /// Default column type for a binding of this kind.
    pub fn type_tag(self) -> TypeTag {
        match self {
            BindingKind::Vertex => TypeTag::Vertex,
            BindingKind::Edge => TypeTag::Edge,
            BindingKind::VleEdge => TypeTag::VariableEdge,
            BindingKind::Scalar => TypeTag::Unknown,
        }
    }
}

/// One visible name.
#[derive(Debug, Clone, PartialEq)]
pub struct Binding<'t> {
    pub name: &'t str,
    pub kind: BindingKind,
    pub declared_in_current_clause: bool,
    /// The value of the binding as an expression over the current clause's
    /// range table (an entity constructor for freshly matched entities, a
    /// column reference after a projection boundary).
    pub expr: LogicalExpr,
    /// Expression for the entity's `properties`, when the kind has one
    pub properties_expr: Option<LogicalExpr>,
    /// Expression for the entity's `id`, when the kind has one
    pub id_expr: Option<LogicalExpr>,
    /// Label the entity was declared with, when known
    pub label: Option<String>,
    /// Column type the binding projects as
    pub ty: TypeTag,
}

/// Scope chain of bindings. The top scope is the one clauses declare into;
/// nested scopes serve correlated sub-patterns (EXISTS).
pub struct PlanCtx<'t> {
    arena: &'t NameArena,
    scopes: Vec<Vec<Binding<'t>>>,
    anon_counter: u32,
}

impl<'t> PlanCtx<'t> {
    pub fn new(arena: &'t NameArena) -> Self {
        PlanCtx {
            arena,
            scopes: vec![Vec::new()],
            anon_counter: 0,
        }
    }

    /// Generate the next `_default_<n>` name. Counters are per-query, so no
    /// two anonymous entities of one statement share a name.
    pub fn anonymous_name(&mut self) -> &'t str {
        let name = self.arena.alloc(&format!("_default_{}", self.anon_counter));
        self.anon_counter += 1;
        name
    }

    /// Intern a runtime-built name so it can live in a binding.
    pub fn intern(&self, name: &str) -> &'t str {
        self.arena.alloc(name)
    }

    fn top(&mut self) -> &mut Vec<Binding<'t>> {
        self.scopes.last_mut().expect("scope stack never empty")
    }

    /// Declare a binding in the current scope. Re-declaring a name with the
    /// same kind hands back the existing binding (patterns mention the same
    /// variable freely); a conflicting kind is an error.
    pub fn declare(&mut self, binding: Binding<'t>) -> PlanResult<&Binding<'t>> {
        if let Some(pos) = self.top().iter().position(|b| b.name == binding.name) {
            let existing = &self.scopes.last().expect("scope stack never empty")[pos];
            if existing.kind != binding.kind {
                return Err(PlanError::BindingKindConflict(binding.name.to_string()));
            }
            return Ok(&self.scopes.last().expect("scope stack never empty")[pos]);
        }
        log::debug!("plan_ctx: declaring {:?} \"{}\"", binding.kind, binding.name);
        self.top().push(binding);
        Ok(self
            .scopes
            .last()
            .expect("scope stack never empty")
            .last()
            .expect("just pushed"))
    }

    /// First binding with this name, in insertion order, searching inner
    /// scopes before outer ones.
    pub fn lookup(&self, name: &str) -> Option<&Binding<'t>> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.iter().find(|b| b.name == name))
    }

    pub fn lookup_required(&self, name: &str) -> PlanResult<&Binding<'t>> {
        self.lookup(name)
            .ok_or_else(|| PlanError::UnknownVariable(name.to_string()))
    }

    /// All bindings of the current scope, in declaration order.
    pub fn bindings(&self) -> &[Binding<'t>] {
        self.scopes.last().expect("scope stack never empty")
    }

    /// Clause boundary: clear the declared-here flags and re-point each
    /// binding at the previous clause's output via `rebind`.
    pub fn advance(&mut self, mut rebind: impl FnMut(&Binding<'t>) -> Binding<'t>) {
        let top = self.top();
        for binding in top.iter_mut() {
            let mut replacement = rebind(binding);
            replacement.declared_in_current_clause = false;
            *binding = replacement;
        }
    }

    /// Replace the visible bindings wholesale (projection boundaries).
    pub fn reset(&mut self, bindings: Vec<Binding<'t>>) {
        *self.top() = bindings;
    }

    /// Enter a correlated sub-pattern scope: outer bindings stay visible,
    /// new declarations stay local.
    pub fn push_scope(&mut self) {
        self.scopes.push(Vec::new());
    }

    pub fn pop_scope(&mut self) {
        self.scopes.pop();
        debug_assert!(!self.scopes.is_empty(), "popped the root scope");
    }

    /// Snapshot and clear the current scope (used per UNION branch).
    pub fn take_scope(&mut self) -> Vec<Binding<'t>> {
        std::mem::take(self.top())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scalar<'t>(name: &'t str) -> Binding<'t> {
        Binding {
            name,
            kind: BindingKind::Scalar,
            declared_in_current_clause: true,
            expr: LogicalExpr::Parameter(name.to_string()),
            properties_expr: None,
            id_expr: None,
            label: None,
            ty: TypeTag::Unknown,
        }
    }

    #[test]
    fn test_declare_and_lookup() {
        let arena = NameArena::new();
        let mut ctx = PlanCtx::new(&arena);
        ctx.declare(scalar("a")).unwrap();
        assert!(ctx.lookup("a").is_some());
        assert!(ctx.lookup("b").is_none());
        assert!(matches!(
            ctx.lookup_required("b"),
            Err(PlanError::UnknownVariable(_))
        ));
    }

    #[test]
    fn test_redeclare_same_kind_is_noop() {
        let arena = NameArena::new();
        let mut ctx = PlanCtx::new(&arena);
        ctx.declare(scalar("a")).unwrap();
        ctx.declare(scalar("a")).unwrap();
        assert_eq!(ctx.bindings().len(), 1);
    }

    #[test]
    fn test_conflicting_kind_is_error() {
        let arena = NameArena::new();
        let mut ctx = PlanCtx::new(&arena);
        ctx.declare(scalar("a")).unwrap();
        let mut vertex = scalar("a");
        vertex.kind = BindingKind::Vertex;
        assert!(matches!(
            ctx.declare(vertex),
            Err(PlanError::BindingKindConflict(_))
        ));
    }

    #[test]
    fn test_anonymous_names_are_unique_and_deterministic() {
        let arena = NameArena::new();
        let mut ctx = PlanCtx::new(&arena);
        assert_eq!(ctx.anonymous_name(), "_default_0");
        assert_eq!(ctx.anonymous_name(), "_default_1");
        assert_eq!(ctx.anonymous_name(), "_default_2");
    }

    #[test]
    fn test_advance_clears_declared_flag() {
        let arena = NameArena::new();
        let mut ctx = PlanCtx::new(&arena);
        ctx.declare(scalar("a")).unwrap();
        assert!(ctx.bindings()[0].declared_in_current_clause);
        ctx.advance(|b| b.clone());
        assert!(!ctx.bindings()[0].declared_in_current_clause);
    }

    #[test]
    fn test_scope_chain_for_subpatterns() {
        let arena = NameArena::new();
        let mut ctx = PlanCtx::new(&arena);
        ctx.declare(scalar("outer")).unwrap();
        ctx.push_scope();
        ctx.declare(scalar("inner")).unwrap();
        assert!(ctx.lookup("outer").is_some());
        assert!(ctx.lookup("inner").is_some());
        ctx.pop_scope();
        assert!(ctx.lookup("inner").is_none());
    }
}
