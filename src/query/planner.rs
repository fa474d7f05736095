//! Hybrid query planner.
//!
//! [`Planner::plan`] splits a [`Query`] into a persisted sub-query the backing
//! store can evaluate and a residual sub-query evaluated in memory over the
//! store's rows. Running the first and then the second is equivalent to
//! evaluating the original query directly.
//!
//! The split is conservative:
//!
//! * a root-level OR, or any restriction whose literal name is not a persisted
//!   property, makes the planner give up and fetch an unrestricted candidate
//!   set (unless a persisted-only plan was requested);
//! * restrictions inside nested junctions may cross at most one join;
//! * a disjunction moves to the store only as a whole;
//! * paging is pushed down only when nothing is left for memory to filter or
//!   sort;
//! * orders are pushed down only when every one of them is persisted.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::config::PlannerConfig;
use crate::query::ast::{Criterion, Junction, JunctionKind, Query, Restriction};
use crate::query::errors::{PathError, PlanError};
use crate::query::path::{resolve_path, QueryPath};
use crate::query::plan::QueryPlan;
use crate::schema::{Schema, SchemaProvider};

/// Join aliases a restriction inside a nested junction may require.
const MAX_NESTED_ALIASES: usize = 1;

/// Splits queries into persisted and in-memory parts.
pub struct Planner {
    schemas: Arc<dyn SchemaProvider>,
    config: PlannerConfig,
}

impl Planner {
    /// Creates a planner with the given configuration and schema catalog.
    pub fn new(config: PlannerConfig, schemas: Arc<dyn SchemaProvider>) -> Self {
        Self { schemas, config }
    }

    /// Creates a planner with [`PlannerConfig::default`].
    pub fn with_defaults(schemas: Arc<dyn SchemaProvider>) -> Self {
        Self::new(PlannerConfig::default(), schemas)
    }

    /// Active configuration.
    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Resolves `path` against `schema` using this planner's catalog.
    pub fn resolve_path(&self, schema: &Schema, path: &str) -> Result<QueryPath, PathError> {
        resolve_path(self.schemas.as_ref(), schema, path)
    }

    /// Plans `query`.
    ///
    /// With `persisted_only` the planner never falls back to an unrestricted
    /// fetch; every restriction must be pushable or planning fails with
    /// [`PlanError::PersistedOnlyViolation`].
    pub fn plan(&self, query: &Query, persisted_only: bool) -> Result<QueryPlan, PlanError> {
        let depth = query.criteria_depth();
        if depth > self.config.max_criteria_depth {
            return Err(PlanError::CriteriaTooDeep {
                depth,
                max: self.config.max_criteria_depth,
            });
        }

        let root_kind = query.effective_root_kind();
        let fully_persisted = is_fully_persisted(query);
        if (!fully_persisted || root_kind == JunctionKind::Or) && !persisted_only {
            debug!(
                schema = query.schema.name(),
                fully_persisted,
                root = %root_kind,
                criteria = query.criteria.len(),
                "planner.fallback"
            );
            return Ok(QueryPlan::new(
                Query::unrestricted(Arc::clone(&query.schema)),
                Query::copy_of(query),
            ));
        }

        let mut residual = Query::copy_of(query);
        let mut pushed = Query::unrestricted(Arc::clone(&query.schema));
        pushed.root_junction = query.root_junction;
        pushed.principal = query.principal.clone();

        let partitions = query
            .criteria
            .iter()
            .map(|criterion| self.partition(&query.schema, criterion, 0, persisted_only))
            .collect::<Result<Vec<_>, _>>()?;
        let (pushed_criteria, retained, aliases) = combine(root_kind, partitions);
        pushed.criteria = pushed_criteria;
        pushed.aliases.extend(aliases);
        residual.criteria = retained;

        if self.config.push_down_orders
            && !residual.orders.is_empty()
            && self.orders_persisted(&residual)?
        {
            debug!(orders = residual.orders.len(), "planner.orders.pushed");
            pushed.orders = std::mem::take(&mut residual.orders);
        }

        // Paging before an in-memory filter or sort would drop rows.
        if residual.criteria.is_empty() && residual.orders.is_empty() {
            pushed.first_result = residual.first_result;
            pushed.max_results = residual.max_results;
            pushed.skip_paging = residual.skip_paging;
            residual.first_result = 0;
            residual.max_results = None;
        } else {
            pushed.skip_paging = true;
        }

        debug!(
            schema = query.schema.name(),
            pushed = pushed.criteria.len(),
            retained = residual.criteria.len(),
            orders_pushed = !pushed.orders.is_empty(),
            skip_paging = pushed.skip_paging,
            "planner.split"
        );
        Ok(QueryPlan::new(pushed, residual))
    }

    fn orders_persisted(&self, query: &Query) -> Result<bool, PlanError> {
        for order in &query.orders {
            if !self.resolve_path(&query.schema, &order.property)?.persisted {
                trace!(property = %order.property, "planner.orders.retained");
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn partition(
        &self,
        schema: &Schema,
        criterion: &Criterion,
        depth: usize,
        persisted_only: bool,
    ) -> Result<Partition, PlanError> {
        match criterion {
            Criterion::Restriction(restriction) => {
                self.partition_restriction(schema, restriction, depth, persisted_only)
            }
            Criterion::Junction(junction) => {
                let children = junction
                    .criteria
                    .iter()
                    .map(|child| self.partition(schema, child, depth + 1, persisted_only))
                    .collect::<Result<Vec<_>, _>>()?;
                let resolved = Junction {
                    kind: junction.kind,
                    criteria: children.iter().map(|p| p.resolved.clone()).collect(),
                    aliases: junction.aliases.clone(),
                };
                let (pushed, retained, aliases) = combine(junction.kind, children);
                let pushed = (!pushed.is_empty()).then(|| {
                    Criterion::Junction(Junction {
                        kind: junction.kind,
                        criteria: pushed,
                        aliases: aliases.clone(),
                    })
                });
                let retained = (!retained.is_empty()).then(|| {
                    Criterion::Junction(Junction {
                        kind: junction.kind,
                        criteria: retained,
                        aliases: junction.aliases.clone(),
                    })
                });
                Ok(Partition {
                    resolved: Criterion::Junction(resolved),
                    pushed,
                    retained,
                    aliases,
                })
            }
        }
    }

    fn partition_restriction(
        &self,
        schema: &Schema,
        restriction: &Restriction,
        depth: usize,
        persisted_only: bool,
    ) -> Result<Partition, PlanError> {
        let path = self.resolve_path(schema, &restriction.path)?;
        let eligible = path.persisted && (depth == 0 || !path.exceeds_aliases(MAX_NESTED_ALIASES));
        let aliases: BTreeSet<String> = path.alias_chain.iter().cloned().collect();
        let resolved = Criterion::Restriction(restriction.clone().with_query_path(path));

        if eligible {
            trace!(path = %restriction.path, depth, "planner.restriction.pushed");
            return Ok(Partition {
                pushed: Some(resolved.clone()),
                retained: None,
                resolved,
                aliases,
            });
        }
        if persisted_only {
            return Err(PlanError::PersistedOnlyViolation {
                path: restriction.path.clone(),
            });
        }
        trace!(path = %restriction.path, depth, "planner.restriction.retained");
        Ok(Partition {
            pushed: None,
            retained: Some(resolved.clone()),
            resolved,
            aliases: BTreeSet::new(),
        })
    }
}

/// Returns `true` when every restriction path and every order property of
/// `query` is literally a persisted property name of its schema.
///
/// Dotted paths are not resolved hop by hop: `parent.name` only counts when a
/// property is registered under that exact name.
pub fn is_fully_persisted(query: &Query) -> bool {
    fn criteria_persisted(schema: &Schema, criteria: &[Criterion]) -> bool {
        criteria.iter().all(|criterion| match criterion {
            Criterion::Restriction(restriction) => schema.has_persisted_property(&restriction.path),
            Criterion::Junction(junction) => criteria_persisted(schema, &junction.criteria),
        })
    }

    criteria_persisted(&query.schema, &query.criteria)
        && query
            .orders
            .iter()
            .all(|order| query.schema.has_persisted_property(&order.property))
}

/// Split of one criterion.
struct Partition {
    /// The input criterion with every restriction's path attached.
    resolved: Criterion,
    /// Part the store evaluates.
    pushed: Option<Criterion>,
    /// Part left for memory; `None` once everything moved.
    retained: Option<Criterion>,
    /// Join aliases required by `pushed`.
    aliases: BTreeSet<String>,
}

/// Combines sibling partitions under a `kind` connective.
///
/// Conjunctions split freely: `pushed AND retained` equals the original. A
/// disjunction with anything left in memory stays whole in memory, since
/// pushing half of it would drop rows only the other half matches.
fn combine(
    kind: JunctionKind,
    partitions: Vec<Partition>,
) -> (Vec<Criterion>, Vec<Criterion>, BTreeSet<String>) {
    let mixed = partitions.iter().any(|p| p.retained.is_some());
    if kind == JunctionKind::Or && mixed {
        if partitions.iter().any(|p| p.pushed.is_some()) {
            trace!(children = partitions.len(), "planner.disjunction.retained");
        }
        let retained = partitions.into_iter().map(|p| p.resolved).collect();
        return (Vec::new(), retained, BTreeSet::new());
    }

    let mut pushed = Vec::new();
    let mut retained = Vec::new();
    let mut aliases = BTreeSet::new();
    for partition in partitions {
        if let Some(criterion) = partition.pushed {
            aliases.extend(partition.aliases);
            pushed.push(criterion);
        }
        if let Some(criterion) = partition.retained {
            retained.push(criterion);
        }
    }
    (pushed, retained, aliases)
}
