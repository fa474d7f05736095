//! Hybrid query planning.
//!
//! Entity queries are split into a persisted sub-query, handed to the store,
//! and an in-memory sub-query applied to the rows the store returns.
//!
//! ```
//! use std::sync::Arc;
//!
//! use hybrid_planner::query::builder::{eq, gt};
//! use hybrid_planner::query::{Planner, QueryBuilder};
//! use hybrid_planner::schema::{InMemorySchemas, Property, Schema};
//!
//! let schema = Schema::new("DataElement")
//!     .with_property(Property::simple("name"))
//!     .with_property(Property::simple("computedScore").transient());
//! let schemas = InMemorySchemas::new().with_schema(schema.clone());
//! let planner = Planner::with_defaults(Arc::new(schemas));
//!
//! let query = QueryBuilder::new(Arc::new(schema))
//!     .filter(eq("name", "ANC"))
//!     .build();
//! let plan = planner.plan(&query, false).unwrap();
//! assert_eq!(plan.persisted_query.criteria.len(), 1);
//! assert!(plan.non_persisted_query.criteria.is_empty());
//!
//! let query = QueryBuilder::new(plan.schema().clone())
//!     .filter(gt("computedScore", 5))
//!     .build();
//! let plan = planner.plan(&query, false).unwrap();
//! assert!(plan.persisted_query.criteria.is_empty());
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod query;
pub mod schema;

pub use config::{ConfigError, PlannerConfig};
pub use query::{PlanError, Planner, Query, QueryPlan};
