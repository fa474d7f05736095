//! Dotted property path resolution.
//!
//! [`resolve_path`] walks a path such as `groups.name` hop by hop through the
//! schema catalog and reports the terminal property, whether every hop is
//! persisted, and the join aliases needed to reach it. [`resolve_joined`] runs
//! the same walk against a caller's [`JoinContext`] so a store adapter can emit
//! one join per relation or collection hop.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::query::errors::PathError;
use crate::schema::{Property, PropertyKind, Schema, SchemaProvider};

/// Resolved form of a dotted path.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryPath {
    /// Path as written by the caller.
    pub path: String,
    /// Property the path ends on. May be a relation or collection.
    pub property: Property,
    /// `true` only when every hop is persisted.
    pub persisted: bool,
    /// Store field names of the traversed relation/collection hops, in order.
    pub alias_chain: Vec<String>,
}

impl QueryPath {
    /// Returns `true` when reaching the property requires at least one join.
    pub fn has_alias(&self) -> bool {
        !self.alias_chain.is_empty()
    }

    /// Returns `true` when more than `limit` joins are required.
    pub fn exceeds_aliases(&self, limit: usize) -> bool {
        self.alias_chain.len() > limit
    }
}

/// Store-side query construction context driven by [`resolve_joined`].
pub trait JoinContext {
    /// Handle the store uses to refer to a joined entity.
    type Alias;

    /// Handle of the queried (root) entity.
    fn root(&mut self) -> Self::Alias;

    /// Emits a join from `parent` across `property` and returns its handle.
    fn join(&mut self, parent: &Self::Alias, property: &Property) -> Self::Alias;
}

/// Outcome of [`resolve_joined`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JoinedPath<A> {
    /// Same result [`resolve_path`] yields for the path.
    pub query_path: QueryPath,
    /// Handle of the entity the terminal property lives on.
    pub alias: A,
}

/// Resolves `path` against `schema`, following relation and collection hops
/// through `provider`.
pub fn resolve_path(
    provider: &dyn SchemaProvider,
    schema: &Schema,
    path: &str,
) -> Result<QueryPath, PathError> {
    walk(provider, schema, path, |_| {})
}

/// Resolves `path` like [`resolve_path`] while emitting one join into `ctx` per
/// traversed relation or collection.
pub fn resolve_joined<C: JoinContext>(
    provider: &dyn SchemaProvider,
    schema: &Schema,
    path: &str,
    ctx: &mut C,
) -> Result<JoinedPath<C::Alias>, PathError> {
    let mut alias = ctx.root();
    let query_path = walk(provider, schema, path, |property| {
        alias = ctx.join(&alias, property);
    })?;
    Ok(JoinedPath { query_path, alias })
}

fn walk<F>(
    provider: &dyn SchemaProvider,
    schema: &Schema,
    path: &str,
    mut on_hop: F,
) -> Result<QueryPath, PathError>
where
    F: FnMut(&Property),
{
    let segments: Vec<&str> = path.split('.').collect();
    if segments.iter().any(|segment| segment.is_empty()) {
        return Err(PathError::EmptyPath { path: path.into() });
    }

    let mut hop_schema: Option<Arc<Schema>> = None;
    let mut persisted = true;
    let mut alias_chain = Vec::new();

    for (idx, segment) in segments.iter().enumerate() {
        let current = hop_schema.as_deref().unwrap_or(schema);
        let property = current
            .property(segment)
            .cloned()
            .ok_or_else(|| PathError::InvalidPathProperty {
                property: (*segment).to_owned(),
                path: path.into(),
            })?;
        persisted &= property.persisted;
        let last = idx + 1 == segments.len();

        if last {
            trace!(path, property = %property.name, persisted, hops = alias_chain.len(), "path.resolve.done");
            return Ok(QueryPath {
                path: path.into(),
                property,
                persisted,
                alias_chain,
            });
        }

        let target = match &property.kind {
            PropertyKind::Collection { item } => item,
            PropertyKind::Relation { target } => target,
            PropertyKind::Simple => {
                return Err(PathError::ScalarTraversal {
                    property: property.name.clone(),
                    path: path.into(),
                })
            }
        };
        let next = provider
            .schema_of(target)
            .ok_or_else(|| PathError::UnknownSchema {
                type_name: target.clone(),
                path: path.into(),
            })?;
        trace!(path, property = %property.name, target = %target, "path.resolve.hop");
        on_hop(&property);
        alias_chain.push(property.storage_field_name.clone());
        hop_schema = Some(next);
    }

    // `split` always yields at least one segment, and the loop returns on it.
    Err(PathError::EmptyPath { path: path.into() })
}
