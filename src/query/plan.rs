//! Planner output.

use std::sync::Arc;

use crate::query::ast::{Principal, Query};
use crate::query::explain::{explain_plan, ExplainNode};
use crate::schema::Schema;

/// Persisted and in-memory halves of a planned query.
///
/// Executing `persisted_query` against the store and then evaluating
/// `non_persisted_query` over the returned rows is equivalent to evaluating the
/// original query directly.
#[derive(Clone, Debug, PartialEq)]
pub struct QueryPlan {
    /// Sub-query the backing store evaluates.
    pub persisted_query: Query,
    /// Criteria, orders, and paging left for memory.
    pub non_persisted_query: Query,
}

impl QueryPlan {
    /// Bundles the two sub-queries.
    pub fn new(persisted_query: Query, non_persisted_query: Query) -> Self {
        Self {
            persisted_query,
            non_persisted_query,
        }
    }

    /// Schema both sub-queries run against.
    pub fn schema(&self) -> &Arc<Schema> {
        &self.persisted_query.schema
    }

    /// Caller identity, taken from the persisted query when it has one.
    pub fn principal(&self) -> Option<&Arc<Principal>> {
        self.persisted_query
            .principal
            .as_ref()
            .or(self.non_persisted_query.principal.as_ref())
    }

    /// Returns `true` when memory has criteria or orders left to apply.
    pub fn has_residual(&self) -> bool {
        !self.non_persisted_query.criteria.is_empty() || !self.non_persisted_query.orders.is_empty()
    }

    /// Human-readable tree of both halves.
    pub fn explain(&self) -> ExplainNode {
        explain_plan(self)
    }

    /// Splits the plan into `(persisted, non_persisted)`.
    pub fn into_parts(self) -> (Query, Query) {
        (self.persisted_query, self.non_persisted_query)
    }
}
