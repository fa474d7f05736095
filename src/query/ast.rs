#![allow(missing_docs)]

//! Store-agnostic filter expression model.
//!
//! A [`Query`] is an implicit junction of root-level [`Criterion`]s over one
//! entity [`Schema`], plus ordering and paging. The planner splits a query into
//! a persisted part and an in-memory part; it never mutates the caller's query
//! in place.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::query::path::QueryPath;
use crate::query::Value;
use crate::schema::{PropertyKind, Schema};

/// Boolean connective of a [`Junction`] or of a query's root criteria.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum JunctionKind {
    /// Every child must match.
    #[default]
    And,
    /// At least one child must match.
    Or,
}

impl fmt::Display for JunctionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JunctionKind::And => f.write_str("AND"),
            JunctionKind::Or => f.write_str("OR"),
        }
    }
}

/// Where a `like` pattern must occur inside the candidate string.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum MatchMode {
    /// Whole string equals the pattern.
    Exact,
    /// Pattern occurs anywhere.
    #[default]
    Anywhere,
    /// String starts with the pattern.
    Start,
    /// String ends with the pattern.
    End,
}

/// Predicate applied to the value(s) reached by a restriction path.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Operator {
    Eq(Value),
    Ne(Value),
    Gt(Value),
    Ge(Value),
    Lt(Value),
    Le(Value),
    /// Inclusive range.
    Between(Value, Value),
    In(Vec<Value>),
    NotIn(Vec<Value>),
    Like {
        pattern: String,
        mode: MatchMode,
        case_insensitive: bool,
        negated: bool,
    },
    /// Value is null or the relation is unset.
    Null,
    NotNull,
    /// Collection has no items.
    Empty,
    NotEmpty,
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operator::Eq(v) => write!(f, "= {v}"),
            Operator::Ne(v) => write!(f, "!= {v}"),
            Operator::Gt(v) => write!(f, "> {v}"),
            Operator::Ge(v) => write!(f, ">= {v}"),
            Operator::Lt(v) => write!(f, "< {v}"),
            Operator::Le(v) => write!(f, "<= {v}"),
            Operator::Between(lo, hi) => write!(f, "between {lo} and {hi}"),
            Operator::In(values) => write!(f, "in {}", join_values(values)),
            Operator::NotIn(values) => write!(f, "not in {}", join_values(values)),
            Operator::Like {
                pattern,
                mode,
                case_insensitive,
                negated,
            } => {
                let not = if *negated { "not " } else { "" };
                let op = if *case_insensitive { "ilike" } else { "like" };
                write!(f, "{not}{op} {pattern:?} ({mode:?})")
            }
            Operator::Null => f.write_str("is null"),
            Operator::NotNull => f.write_str("is not null"),
            Operator::Empty => f.write_str("is empty"),
            Operator::NotEmpty => f.write_str("is not empty"),
        }
    }
}

fn join_values(values: &[Value]) -> String {
    let parts: Vec<String> = values.iter().map(ToString::to_string).collect();
    format!("[{}]", parts.join(", "))
}

/// Leaf predicate over a dotted property path.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Restriction {
    /// Dotted property reference, e.g. `parent.name`.
    pub path: String,
    /// Predicate applied to the value at `path`.
    pub operator: Operator,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    query_path: Option<QueryPath>,
}

impl Restriction {
    /// Creates an unresolved restriction.
    pub fn new(path: impl Into<String>, operator: Operator) -> Self {
        Self {
            path: path.into(),
            operator,
            query_path: None,
        }
    }

    /// Path resolved during planning, if planning has visited this restriction.
    pub fn query_path(&self) -> Option<&QueryPath> {
        self.query_path.as_ref()
    }

    pub(crate) fn with_query_path(mut self, path: QueryPath) -> Self {
        self.query_path = Some(path);
        self
    }
}

impl fmt::Display for Restriction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.path, self.operator)
    }
}

/// Boolean group of criteria.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Junction {
    pub kind: JunctionKind,
    /// Children; order carries no meaning but is preserved.
    pub criteria: Vec<Criterion>,
    /// Join aliases required by any descendant restriction.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub aliases: BTreeSet<String>,
}

impl Junction {
    /// Creates an empty junction.
    pub fn new(kind: JunctionKind) -> Self {
        Self {
            kind,
            criteria: Vec::new(),
            aliases: BTreeSet::new(),
        }
    }

    /// Creates an empty conjunction.
    pub fn and() -> Self {
        Self::new(JunctionKind::And)
    }

    /// Creates an empty disjunction.
    pub fn or() -> Self {
        Self::new(JunctionKind::Or)
    }

    /// Appends a child criterion.
    pub fn add(mut self, criterion: impl Into<Criterion>) -> Self {
        self.criteria.push(criterion.into());
        self
    }

    /// Returns `true` when the junction has no children.
    pub fn is_empty(&self) -> bool {
        self.criteria.is_empty()
    }
}

/// Node of a filter expression tree.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Criterion {
    Restriction(Restriction),
    Junction(Junction),
}

impl Criterion {
    /// Nesting depth of this node; a restriction has depth 1.
    pub fn depth(&self) -> usize {
        match self {
            Criterion::Restriction(_) => 1,
            Criterion::Junction(junction) => {
                1 + junction
                    .criteria
                    .iter()
                    .map(Criterion::depth)
                    .max()
                    .unwrap_or(0)
            }
        }
    }
}

impl From<Restriction> for Criterion {
    fn from(value: Restriction) -> Self {
        Criterion::Restriction(value)
    }
}

impl From<Junction> for Criterion {
    fn from(value: Junction) -> Self {
        Criterion::Junction(value)
    }
}

/// Sort direction.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

/// Sort key over a property path.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Order {
    pub property: String,
    pub direction: Direction,
}

impl Order {
    /// Ascending order on `property`.
    pub fn asc(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            direction: Direction::Asc,
        }
    }

    /// Descending order on `property`.
    pub fn desc(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            direction: Direction::Desc,
        }
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.direction {
            Direction::Asc => write!(f, "{} asc", self.property),
            Direction::Desc => write!(f, "{} desc", self.property),
        }
    }
}

/// Caller identity carried along with a query. Opaque to the planner.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Principal {
    pub username: String,
}

impl Principal {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
        }
    }
}

/// Top-level filter expression over one entity schema.
#[derive(Clone, Debug, PartialEq)]
pub struct Query {
    /// Entity schema being queried.
    pub schema: Arc<Schema>,
    /// Connective joining [`Query::criteria`]; only meaningful with more than one criterion.
    pub root_junction: JunctionKind,
    pub criteria: Vec<Criterion>,
    pub orders: Vec<Order>,
    pub first_result: usize,
    /// `None` means unbounded.
    pub max_results: Option<usize>,
    /// When set, consumers must ignore `first_result`/`max_results`.
    pub skip_paging: bool,
    /// Set on queries produced by the planner.
    pub planned: bool,
    /// Join aliases required by root-level restrictions and junctions.
    pub aliases: BTreeSet<String>,
    pub principal: Option<Arc<Principal>>,
}

impl Query {
    /// Creates an empty AND query over `schema`.
    pub fn new(schema: Arc<Schema>) -> Self {
        Self::with_root_junction(schema, JunctionKind::And)
    }

    /// Creates an empty query whose root criteria are joined by `kind`.
    pub fn with_root_junction(schema: Arc<Schema>, kind: JunctionKind) -> Self {
        Self {
            schema,
            root_junction: kind,
            criteria: Vec::new(),
            orders: Vec::new(),
            first_result: 0,
            max_results: None,
            skip_paging: false,
            planned: false,
            aliases: BTreeSet::new(),
            principal: None,
        }
    }

    /// Planned query with no criteria, orders, or paging.
    pub fn unrestricted(schema: Arc<Schema>) -> Self {
        let mut query = Self::new(schema);
        query.planned = true;
        query
    }

    /// Planned working copy of `query`.
    pub fn copy_of(query: &Query) -> Self {
        let mut copy = query.clone();
        copy.planned = true;
        copy
    }

    /// Appends a root-level criterion.
    pub fn add(&mut self, criterion: impl Into<Criterion>) -> &mut Self {
        self.criteria.push(criterion.into());
        self
    }

    /// Appends a sort key.
    pub fn add_order(&mut self, order: Order) -> &mut Self {
        self.orders.push(order);
        self
    }

    /// Sets the paging window.
    pub fn set_paging(&mut self, first_result: usize, max_results: Option<usize>) -> &mut Self {
        self.first_result = first_result;
        self.max_results = max_results;
        self
    }

    /// Attaches the caller identity.
    pub fn set_principal(&mut self, principal: Option<Arc<Principal>>) -> &mut Self {
        self.principal = principal;
        self
    }

    /// Root connective actually in effect: a single criterion is always AND.
    pub fn effective_root_kind(&self) -> JunctionKind {
        if self.criteria.len() <= 1 {
            JunctionKind::And
        } else {
            self.root_junction
        }
    }

    /// Orders by `name` then `id` when the query has no orders yet.
    ///
    /// Each key is only added when the schema exposes it as a persisted,
    /// orderable simple property.
    pub fn set_default_order(&mut self) -> &mut Self {
        if !self.orders.is_empty() {
            return self;
        }
        for name in ["name", "id"] {
            let usable = self.schema.property(name).is_some_and(|p| {
                p.persisted && p.orderable && p.kind == PropertyKind::Simple
            });
            if usable {
                self.orders.push(Order::asc(name));
            }
        }
        self
    }

    /// Maximum nesting depth of the criteria; an empty query has depth 0.
    pub fn criteria_depth(&self) -> usize {
        self.criteria.iter().map(Criterion::depth).max().unwrap_or(0)
    }
}
