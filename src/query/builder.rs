//! Restriction constructors and a fluent query builder.

use std::sync::Arc;

use crate::query::ast::{
    Criterion, Junction, JunctionKind, MatchMode, Operator, Order, Principal, Query, Restriction,
};
use crate::query::Value;
use crate::schema::Schema;

/// `path = value`
pub fn eq(path: impl Into<String>, value: impl Into<Value>) -> Restriction {
    Restriction::new(path, Operator::Eq(value.into()))
}

/// `path != value`
pub fn ne(path: impl Into<String>, value: impl Into<Value>) -> Restriction {
    Restriction::new(path, Operator::Ne(value.into()))
}

/// `path > value`
pub fn gt(path: impl Into<String>, value: impl Into<Value>) -> Restriction {
    Restriction::new(path, Operator::Gt(value.into()))
}

/// `path >= value`
pub fn ge(path: impl Into<String>, value: impl Into<Value>) -> Restriction {
    Restriction::new(path, Operator::Ge(value.into()))
}

/// `path < value`
pub fn lt(path: impl Into<String>, value: impl Into<Value>) -> Restriction {
    Restriction::new(path, Operator::Lt(value.into()))
}

/// `path <= value`
pub fn le(path: impl Into<String>, value: impl Into<Value>) -> Restriction {
    Restriction::new(path, Operator::Le(value.into()))
}

/// `low <= path <= high`
pub fn between(
    path: impl Into<String>,
    low: impl Into<Value>,
    high: impl Into<Value>,
) -> Restriction {
    Restriction::new(path, Operator::Between(low.into(), high.into()))
}

/// `path` equals one of `values`.
pub fn in_list<I, V>(path: impl Into<String>, values: I) -> Restriction
where
    I: IntoIterator<Item = V>,
    V: Into<Value>,
{
    Restriction::new(
        path,
        Operator::In(values.into_iter().map(Into::into).collect()),
    )
}

/// `path` equals none of `values`.
pub fn not_in<I, V>(path: impl Into<String>, values: I) -> Restriction
where
    I: IntoIterator<Item = V>,
    V: Into<Value>,
{
    Restriction::new(
        path,
        Operator::NotIn(values.into_iter().map(Into::into).collect()),
    )
}

fn like_op(pattern: impl Into<String>, mode: MatchMode, case_insensitive: bool, negated: bool) -> Operator {
    Operator::Like {
        pattern: pattern.into(),
        mode,
        case_insensitive,
        negated,
    }
}

/// Case-sensitive pattern match.
pub fn like(path: impl Into<String>, pattern: impl Into<String>, mode: MatchMode) -> Restriction {
    Restriction::new(path, like_op(pattern, mode, false, false))
}

/// Case-insensitive pattern match.
pub fn ilike(path: impl Into<String>, pattern: impl Into<String>, mode: MatchMode) -> Restriction {
    Restriction::new(path, like_op(pattern, mode, true, false))
}

/// Negated case-sensitive pattern match.
pub fn not_like(path: impl Into<String>, pattern: impl Into<String>, mode: MatchMode) -> Restriction {
    Restriction::new(path, like_op(pattern, mode, false, true))
}

/// Negated case-insensitive pattern match.
pub fn not_ilike(
    path: impl Into<String>,
    pattern: impl Into<String>,
    mode: MatchMode,
) -> Restriction {
    Restriction::new(path, like_op(pattern, mode, true, true))
}

/// Value at `path` is null, or the relation is unset.
pub fn is_null(path: impl Into<String>) -> Restriction {
    Restriction::new(path, Operator::Null)
}

/// Value at `path` is present.
pub fn is_not_null(path: impl Into<String>) -> Restriction {
    Restriction::new(path, Operator::NotNull)
}

/// Collection at `path` has no items.
pub fn is_empty(path: impl Into<String>) -> Restriction {
    Restriction::new(path, Operator::Empty)
}

/// Collection at `path` has at least one item.
pub fn is_not_empty(path: impl Into<String>) -> Restriction {
    Restriction::new(path, Operator::NotEmpty)
}

/// Collects the children of a nested junction.
pub struct JunctionBuilder {
    junction: Junction,
}

impl JunctionBuilder {
    fn new(kind: JunctionKind) -> Self {
        Self {
            junction: Junction::new(kind),
        }
    }

    /// Adds a restriction or prebuilt junction.
    pub fn filter(&mut self, criterion: impl Into<Criterion>) -> &mut Self {
        self.junction.criteria.push(criterion.into());
        self
    }

    /// Adds a nested conjunction.
    pub fn all<F>(&mut self, build: F) -> &mut Self
    where
        F: FnOnce(&mut JunctionBuilder),
    {
        if let Some(junction) = nested(JunctionKind::And, build) {
            self.junction.criteria.push(junction.into());
        }
        self
    }

    /// Adds a nested disjunction.
    pub fn any<F>(&mut self, build: F) -> &mut Self
    where
        F: FnOnce(&mut JunctionBuilder),
    {
        if let Some(junction) = nested(JunctionKind::Or, build) {
            self.junction.criteria.push(junction.into());
        }
        self
    }
}

// Groups left empty by the closure are dropped.
fn nested<F>(kind: JunctionKind, build: F) -> Option<Junction>
where
    F: FnOnce(&mut JunctionBuilder),
{
    let mut builder = JunctionBuilder::new(kind);
    build(&mut builder);
    (!builder.junction.is_empty()).then_some(builder.junction)
}

/// Fluent builder for [`Query`].
pub struct QueryBuilder {
    query: Query,
}

impl QueryBuilder {
    /// Starts an empty AND query over `schema`.
    pub fn new(schema: Arc<Schema>) -> Self {
        Self {
            query: Query::new(schema),
        }
    }

    /// Sets the connective joining root-level criteria.
    pub fn root_junction(mut self, kind: JunctionKind) -> Self {
        self.query.root_junction = kind;
        self
    }

    /// Adds a root-level restriction or junction.
    pub fn filter(mut self, criterion: impl Into<Criterion>) -> Self {
        self.query.criteria.push(criterion.into());
        self
    }

    /// Adds a root-level conjunction built by `build`.
    pub fn all<F>(mut self, build: F) -> Self
    where
        F: FnOnce(&mut JunctionBuilder),
    {
        if let Some(junction) = nested(JunctionKind::And, build) {
            self.query.criteria.push(junction.into());
        }
        self
    }

    /// Adds a root-level disjunction built by `build`.
    pub fn any<F>(mut self, build: F) -> Self
    where
        F: FnOnce(&mut JunctionBuilder),
    {
        if let Some(junction) = nested(JunctionKind::Or, build) {
            self.query.criteria.push(junction.into());
        }
        self
    }

    /// Appends a sort key.
    pub fn order(mut self, order: Order) -> Self {
        self.query.orders.push(order);
        self
    }

    /// Falls back to `name`/`id` ordering when no order was given.
    pub fn default_order(mut self) -> Self {
        self.query.set_default_order();
        self
    }

    /// Sets the paging window.
    pub fn page(mut self, first_result: usize, max_results: usize) -> Self {
        self.query.set_paging(first_result, Some(max_results));
        self
    }

    /// Attaches the caller identity.
    pub fn principal(mut self, principal: Principal) -> Self {
        self.query.principal = Some(Arc::new(principal));
        self
    }

    /// Finishes the query.
    pub fn build(self) -> Query {
        self.query
    }
}
