#![forbid(unsafe_code)]

//! Query model and hybrid planning.
//!
//! A [`Query`] is a tree of restrictions and junctions over one entity
//! [`Schema`](crate::schema::Schema). The [`Planner`] splits it into a part the
//! backing store evaluates and a residual evaluated in memory.

/// Filter expression tree: restrictions, junctions, orders, and paging.
pub mod ast;

/// Fluent construction of queries and restrictions.
pub mod builder;

/// Error types raised while resolving paths and planning.
pub mod errors;

/// In-memory evaluation of queries and plan execution.
pub mod eval;

/// Human-readable plan trees.
pub mod explain;

/// Property path resolution against the schema catalog.
pub mod path;

/// Planner output.
pub mod plan;

/// Split of a query into persisted and in-memory halves.
pub mod planner;

/// Literal values carried by restrictions.
pub mod value;

pub use ast::{
    Criterion, Direction, Junction, JunctionKind, MatchMode, Operator, Order, Principal, Query,
    Restriction,
};
pub use builder::QueryBuilder;
pub use errors::{PathError, PlanError, WithCode};
pub use eval::{execute_plan, Field, InMemoryEngine, MemoryStore, PersistedStore, Record};
pub use explain::{ExplainNode, ExplainProp};
pub use path::{resolve_joined, resolve_path, JoinContext, JoinedPath, QueryPath};
pub use plan::QueryPlan;
pub use planner::{is_fully_persisted, Planner};
pub use value::Value;
