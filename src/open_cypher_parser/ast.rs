//! Abstract syntax tree for openCypher statements.
//!
//! Every node borrows its identifiers and string literals from the source
//! text, so a parsed statement is valid exactly as long as the (comment
//! stripped) query string it came from.
//!
//! `Display` implementations print the canonical textual form used by the
//! round-trip tests: re-parsing the printed form of an expression prints
//! identically.

use std::fmt;

/// A complete statement: a single query, or a UNION tree over queries.
#[derive(Debug, PartialEq, Clone)]
pub enum CypherStatement<'a> {
    Single(SingleQuery<'a>),
    Union {
        /// `UNION ALL` keeps duplicates; plain `UNION` removes them
        all: bool,
        larg: Box<CypherStatement<'a>>,
        rarg: Box<CypherStatement<'a>>,
    },
}

/// One query: its clauses in program order.
#[derive(Debug, PartialEq, Clone)]
pub struct SingleQuery<'a> {
    pub clauses: Vec<Clause<'a>>,
}

#[derive(Debug, PartialEq, Clone)]
pub enum Clause<'a> {
    Match(MatchClause<'a>),
    Create(CreateClause<'a>),
    Merge(MergeClause<'a>),
    /// SET and REMOVE share one node; `is_remove` distinguishes them
    Set(SetClause<'a>),
    Delete(DeleteClause<'a>),
    Unwind(UnwindClause<'a>),
    With(WithClause<'a>),
    Return(ReturnClause<'a>),
    Call(CallClause<'a>),
}

impl Clause<'_> {
    /// Clause keyword for diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            Clause::Match(m) if m.optional => "OPTIONAL MATCH",
            Clause::Match(_) => "MATCH",
            Clause::Create(_) => "CREATE",
            Clause::Merge(_) => "MERGE",
            Clause::Set(s) if s.is_remove => "REMOVE",
            Clause::Set(_) => "SET",
            Clause::Delete(_) => "DELETE",
            Clause::Unwind(_) => "UNWIND",
            Clause::With(_) => "WITH",
            Clause::Return(_) => "RETURN",
            Clause::Call(_) => "CALL",
        }
    }

    /// Updating clauses mutate the graph; everything else reads.
    pub fn is_updating(&self) -> bool {
        matches!(
            self,
            Clause::Create(_) | Clause::Merge(_) | Clause::Set(_) | Clause::Delete(_)
        )
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct MatchClause<'a> {
    pub optional: bool,
    pub patterns: Vec<PathPattern<'a>>,
    pub where_clause: Option<Expression<'a>>,
}

#[derive(Debug, PartialEq, Clone)]
pub struct CreateClause<'a> {
    pub patterns: Vec<PathPattern<'a>>,
}

#[derive(Debug, PartialEq, Clone)]
pub struct MergeClause<'a> {
    pub path: PathPattern<'a>,
}

#[derive(Debug, PartialEq, Clone)]
pub struct SetClause<'a> {
    pub is_remove: bool,
    pub items: Vec<SetItem<'a>>,
}

/// One `target = value` (SET) or bare `target` (REMOVE) item. The transform
/// enforces that `target` is a simple `variable.property` access.
#[derive(Debug, PartialEq, Clone)]
pub struct SetItem<'a> {
    pub target: Expression<'a>,
    pub value: Option<Expression<'a>>,
}

#[derive(Debug, PartialEq, Clone)]
pub struct DeleteClause<'a> {
    pub detach: bool,
    pub exprs: Vec<Expression<'a>>,
}

#[derive(Debug, PartialEq, Clone)]
pub struct UnwindClause<'a> {
    pub expr: Expression<'a>,
    pub as_name: &'a str,
}

#[derive(Debug, PartialEq, Clone)]
pub struct WithClause<'a> {
    pub distinct: bool,
    pub items: Vec<ProjectionItem<'a>>,
    pub order_by: Vec<SortItem<'a>>,
    pub skip: Option<Expression<'a>>,
    pub limit: Option<Expression<'a>>,
    pub where_clause: Option<Expression<'a>>,
}

#[derive(Debug, PartialEq, Clone)]
pub struct ReturnClause<'a> {
    pub distinct: bool,
    pub items: Vec<ProjectionItem<'a>>,
    pub order_by: Vec<SortItem<'a>>,
    pub skip: Option<Expression<'a>>,
    pub limit: Option<Expression<'a>>,
}

#[derive(Debug, PartialEq, Clone)]
pub enum ProjectionItem<'a> {
    /// `*`: every visible binding, in binding order
    Star,
    Expr {
        expr: Expression<'a>,
        alias: Option<&'a str>,
    },
}

#[derive(Debug, PartialEq, Clone)]
pub struct SortItem<'a> {
    pub expr: Expression<'a>,
    pub descending: bool,
}

/// `CALL proc(args) YIELD items`. Parsed for error quality; the planner
/// reports it as not supported.
#[derive(Debug, PartialEq, Clone)]
pub struct CallClause<'a> {
    pub procedure: &'a str,
    pub args: Vec<Expression<'a>>,
    pub yield_items: Option<Vec<&'a str>>,
}

// ---------------------------------------------------------------------------
// Patterns
// ---------------------------------------------------------------------------

/// `(n0)-[e0]-(n1)-…`: a start node plus zero or more steps. The
/// odd-length node/relationship alternation of a path holds by
/// construction: `entity_count() == 1 + 2 * steps.len()`.
#[derive(Debug, PartialEq, Clone)]
pub struct PathPattern<'a> {
    /// `p` in `p = (a)-[r]->(b)`: aliases the whole path
    pub var_name: Option<&'a str>,
    pub start: NodePattern<'a>,
    pub steps: Vec<PathStep<'a>>,
}

#[derive(Debug, PartialEq, Clone)]
pub struct PathStep<'a> {
    pub rel: RelationshipPattern<'a>,
    pub node: NodePattern<'a>,
}

impl<'a> PathPattern<'a> {
    pub fn single_node(&self) -> bool {
        self.steps.is_empty()
    }

    /// Entity count: always odd, nodes at even positions and relationships
    /// at odd ones.
    pub fn entity_count(&self) -> usize {
        1 + 2 * self.steps.len()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &NodePattern<'a>> {
        std::iter::once(&self.start).chain(self.steps.iter().map(|s| &s.node))
    }

    pub fn relationships(&self) -> impl Iterator<Item = &RelationshipPattern<'a>> {
        self.steps.iter().map(|s| &s.rel)
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct NodePattern<'a> {
    pub name: Option<&'a str>,
    pub label: Option<&'a str>,
    pub props: Option<PropertyMap<'a>>,
}

#[derive(Debug, PartialEq, Clone)]
pub struct RelationshipPattern<'a> {
    pub name: Option<&'a str>,
    pub label: Option<&'a str>,
    pub direction: Direction,
    pub props: Option<PropertyMap<'a>>,
    /// Present iff this is a variable-length relationship
    pub varlen: Option<VarLenRange>,
}

/// Property constraints: an inline map or a `$param` standing for one.
#[derive(Debug, PartialEq, Clone)]
pub enum PropertyMap<'a> {
    Literal(Vec<(&'a str, Expression<'a>)>),
    Parameter(&'a str),
}

#[derive(Debug, PartialEq, Clone, Copy, Eq)]
pub enum Direction {
    Outgoing,
    Incoming,
    Either,
}

/// `*lo..hi` bounds with defaults applied: `*` is `1..`, `*n` is `n..n`,
/// `*..u` is `1..u`. `hi == None` means unbounded.
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct VarLenRange {
    pub lo: u32,
    pub hi: Option<u32>,
}

// ---------------------------------------------------------------------------
// Expressions
// ---------------------------------------------------------------------------

#[derive(Debug, PartialEq, Clone)]
pub enum Literal<'a> {
    Integer(i64),
    Float(f64),
    Boolean(bool),
    String(&'a str),
    Null,
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum ArithOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Power,
}

#[derive(Debug, PartialEq, Clone, Copy, Eq)]
pub enum CompOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum StringOp {
    StartsWith,
    EndsWith,
    Contains,
    /// `=~`, lowered to a `regex_match` call by the transform
    Regex,
}

#[derive(Debug, PartialEq, Clone)]
pub enum Expression<'a> {
    Literal(Literal<'a>),
    Variable(&'a str),
    /// `$name`
    Parameter(&'a str),
    List(Vec<Expression<'a>>),
    Map(Vec<(&'a str, Expression<'a>)>),
    FunctionCall {
        name: &'a str,
        distinct: bool,
        args: Vec<Expression<'a>>,
    },
    PropertyAccess {
        base: Box<Expression<'a>>,
        key: &'a str,
    },
    Subscript {
        base: Box<Expression<'a>>,
        index: Box<Expression<'a>>,
    },
    Slice {
        base: Box<Expression<'a>>,
        lo: Option<Box<Expression<'a>>>,
        hi: Option<Box<Expression<'a>>>,
    },
    Arithmetic {
        op: ArithOp,
        left: Box<Expression<'a>>,
        right: Box<Expression<'a>>,
    },
    /// Unary minus that could not be folded into a numeric literal
    Negate(Box<Expression<'a>>),
    /// Conjunction, maximally flattened: no operand is itself `And`
    And(Vec<Expression<'a>>),
    /// Disjunction, maximally flattened: no operand is itself `Or`
    Or(Vec<Expression<'a>>),
    Not(Box<Expression<'a>>),
    /// A comparison chain `a < b <= c`: one more term than ops. Lowered to
    /// a conjunction of pairwise comparisons at transform time.
    ChainCmp {
        terms: Vec<Expression<'a>>,
        ops: Vec<CompOp>,
    },
    StringMatch {
        op: StringOp,
        left: Box<Expression<'a>>,
        right: Box<Expression<'a>>,
    },
    In {
        needle: Box<Expression<'a>>,
        list: Box<Expression<'a>>,
        negated: bool,
    },
    IsNull {
        expr: Box<Expression<'a>>,
        negated: bool,
    },
    Case {
        /// Present in the simple form `CASE x WHEN …`
        operand: Option<Box<Expression<'a>>>,
        branches: Vec<(Expression<'a>, Expression<'a>)>,
        else_expr: Option<Box<Expression<'a>>>,
    },
    Exists {
        pattern: Box<PathPattern<'a>>,
        where_clause: Option<Box<Expression<'a>>>,
    },
    /// `expr :: type_name`; the transform checks the target name
    TypeCast {
        expr: Box<Expression<'a>>,
        type_name: &'a str,
    },
}

impl<'a> Expression<'a> {
    /// Expressions that print without surrounding parentheses when used as
    /// an operand.
    fn is_atom(&self) -> bool {
        matches!(
            self,
            Expression::Literal(_)
                | Expression::Variable(_)
                | Expression::Parameter(_)
                | Expression::List(_)
                | Expression::Map(_)
                | Expression::FunctionCall { .. }
                | Expression::PropertyAccess { .. }
                | Expression::Subscript { .. }
                | Expression::Slice { .. }
                | Expression::Case { .. }
                | Expression::Exists { .. }
        )
    }
}

// ---------------------------------------------------------------------------
// Canonical printing
// ---------------------------------------------------------------------------

impl fmt::Display for Literal<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Integer(i) => write!(f, "{}", i),
            Literal::Float(x) => write!(f, "{:?}", x),
            Literal::Boolean(b) => f.write_str(if *b { "true" } else { "false" }),
            Literal::String(s) => write!(f, "'{}'", s),
            Literal::Null => f.write_str("null"),
        }
    }
}

impl fmt::Display for CompOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CompOp::Eq => "=",
            CompOp::NotEq => "<>",
            CompOp::Lt => "<",
            CompOp::LtEq => "<=",
            CompOp::Gt => ">",
            CompOp::GtEq => ">=",
        })
    }
}

impl fmt::Display for ArithOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ArithOp::Add => "+",
            ArithOp::Subtract => "-",
            ArithOp::Multiply => "*",
            ArithOp::Divide => "/",
            ArithOp::Modulo => "%",
            ArithOp::Power => "^",
        })
    }
}

/// Print an operand, parenthesizing anything that is not an atom so the
/// printed form re-parses into the identical tree.
fn fmt_operand(f: &mut fmt::Formatter<'_>, e: &Expression<'_>) -> fmt::Result {
    if e.is_atom() {
        write!(f, "{}", e)
    } else {
        write!(f, "({})", e)
    }
}

impl fmt::Display for Expression<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Literal(lit) => write!(f, "{}", lit),
            Expression::Variable(name) => f.write_str(name),
            Expression::Parameter(name) => write!(f, "${}", name),
            Expression::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            Expression::Map(entries) => {
                f.write_str("{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", key, value)?;
                }
                f.write_str("}")
            }
            Expression::FunctionCall {
                name,
                distinct,
                args,
            } => {
                write!(f, "{}(", name)?;
                if *distinct {
                    f.write_str("DISTINCT ")?;
                }
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                f.write_str(")")
            }
            Expression::PropertyAccess { base, key } => {
                fmt_operand(f, base)?;
                write!(f, ".{}", key)
            }
            Expression::Subscript { base, index } => {
                fmt_operand(f, base)?;
                write!(f, "[{}]", index)
            }
            Expression::Slice { base, lo, hi } => {
                fmt_operand(f, base)?;
                f.write_str("[")?;
                if let Some(lo) = lo {
                    write!(f, "{}", lo)?;
                }
                f.write_str("..")?;
                if let Some(hi) = hi {
                    write!(f, "{}", hi)?;
                }
                f.write_str("]")
            }
            Expression::Arithmetic { op, left, right } => {
                fmt_operand(f, left)?;
                write!(f, " {} ", op)?;
                fmt_operand(f, right)
            }
            Expression::Negate(e) => {
                f.write_str("-")?;
                fmt_operand(f, e)
            }
            Expression::And(operands) => {
                for (i, operand) in operands.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" AND ")?;
                    }
                    fmt_operand(f, operand)?;
                }
                Ok(())
            }
            Expression::Or(operands) => {
                for (i, operand) in operands.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" OR ")?;
                    }
                    fmt_operand(f, operand)?;
                }
                Ok(())
            }
            Expression::Not(e) => {
                f.write_str("NOT ")?;
                fmt_operand(f, e)
            }
            Expression::ChainCmp { terms, ops } => {
                fmt_operand(f, &terms[0])?;
                for (op, term) in ops.iter().zip(terms.iter().skip(1)) {
                    write!(f, " {} ", op)?;
                    fmt_operand(f, term)?;
                }
                Ok(())
            }
            Expression::StringMatch { op, left, right } => {
                fmt_operand(f, left)?;
                f.write_str(match op {
                    StringOp::StartsWith => " STARTS WITH ",
                    StringOp::EndsWith => " ENDS WITH ",
                    StringOp::Contains => " CONTAINS ",
                    StringOp::Regex => " =~ ",
                })?;
                fmt_operand(f, right)
            }
            Expression::In {
                needle,
                list,
                negated,
            } => {
                fmt_operand(f, needle)?;
                f.write_str(if *negated { " NOT IN " } else { " IN " })?;
                fmt_operand(f, list)
            }
            Expression::IsNull { expr, negated } => {
                fmt_operand(f, expr)?;
                f.write_str(if *negated { " IS NOT NULL" } else { " IS NULL" })
            }
            Expression::Case {
                operand,
                branches,
                else_expr,
            } => {
                f.write_str("CASE")?;
                if let Some(operand) = operand {
                    write!(f, " {}", operand)?;
                }
                for (when, then) in branches {
                    write!(f, " WHEN {} THEN {}", when, then)?;
                }
                if let Some(else_expr) = else_expr {
                    write!(f, " ELSE {}", else_expr)?;
                }
                f.write_str(" END")
            }
            Expression::Exists {
                pattern,
                where_clause,
            } => {
                write!(f, "EXISTS {{ {}", pattern)?;
                if let Some(where_clause) = where_clause {
                    write!(f, " WHERE {}", where_clause)?;
                }
                f.write_str(" }")
            }
            Expression::TypeCast { expr, type_name } => {
                fmt_operand(f, expr)?;
                write!(f, " :: {}", type_name)
            }
        }
    }
}

impl fmt::Display for PropertyMap<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyMap::Literal(entries) => {
                f.write_str("{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", key, value)?;
                }
                f.write_str("}")
            }
            PropertyMap::Parameter(name) => write!(f, "${}", name),
        }
    }
}

impl fmt::Display for NodePattern<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        if let Some(name) = self.name {
            f.write_str(name)?;
        }
        if let Some(label) = self.label {
            write!(f, ":{}", label)?;
        }
        if let Some(props) = &self.props {
            if self.name.is_some() || self.label.is_some() {
                f.write_str(" ")?;
            }
            write!(f, "{}", props)?;
        }
        f.write_str(")")
    }
}

impl fmt::Display for RelationshipPattern<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.direction == Direction::Incoming {
            f.write_str("<")?;
        }
        f.write_str("-[")?;
        if let Some(name) = self.name {
            f.write_str(name)?;
        }
        if let Some(label) = self.label {
            write!(f, ":{}", label)?;
        }
        if let Some(range) = &self.varlen {
            match (range.lo, range.hi) {
                (1, None) => f.write_str("*")?,
                (lo, None) => write!(f, "*{}..", lo)?,
                (lo, Some(hi)) if lo == hi => write!(f, "*{}", lo)?,
                (lo, Some(hi)) => write!(f, "*{}..{}", lo, hi)?,
            }
        }
        if let Some(props) = &self.props {
            f.write_str(" ")?;
            write!(f, "{}", props)?;
        }
        f.write_str("]-")?;
        if self.direction == Direction::Outgoing {
            f.write_str(">")?;
        }
        Ok(())
    }
}

impl fmt::Display for PathPattern<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(var) = self.var_name {
            write!(f, "{} = ", var)?;
        }
        write!(f, "{}", self.start)?;
        for step in &self.steps {
            write!(f, "{}{}", step.rel, step.node)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_length_invariant() {
        let path = PathPattern {
            var_name: None,
            start: NodePattern {
                name: Some("a"),
                label: None,
                props: None,
            },
            steps: vec![PathStep {
                rel: RelationshipPattern {
                    name: Some("r"),
                    label: None,
                    direction: Direction::Outgoing,
                    props: None,
                    varlen: None,
                },
                node: NodePattern {
                    name: Some("b"),
                    label: None,
                    props: None,
                },
            }],
        };
        assert_eq!(path.entity_count(), 3);
        assert_eq!(path.nodes().count(), 2);
        assert_eq!(path.relationships().count(), 1);
    }

    #[test]
    fn test_display_node_and_rel() {
        let node = NodePattern {
            name: Some("a"),
            label: Some("Person"),
            props: None,
        };
        assert_eq!(node.to_string(), "(a:Person)");

        let rel = RelationshipPattern {
            name: None,
            label: Some("KNOWS"),
            direction: Direction::Outgoing,
            props: None,
            varlen: Some(VarLenRange { lo: 2, hi: Some(4) }),
        };
        assert_eq!(rel.to_string(), "-[:KNOWS*2..4]->");
    }

    #[test]
    fn test_display_flattened_booleans() {
        let e = Expression::And(vec![
            Expression::Variable("a"),
            Expression::Variable("b"),
            Expression::Or(vec![Expression::Variable("c"), Expression::Variable("d")]),
        ]);
        assert_eq!(e.to_string(), "a AND b AND (c OR d)");
    }

    #[test]
    fn test_display_chain() {
        let e = Expression::ChainCmp {
            terms: vec![
                Expression::Variable("a"),
                Expression::Variable("b"),
                Expression::Literal(Literal::Integer(3)),
            ],
            ops: vec![CompOp::Lt, CompOp::LtEq],
        };
        assert_eq!(e.to_string(), "a < b <= 3");
    }
}
