#![allow(missing_docs)]

use std::fmt;

use thiserror::Error;

/// Failures raised while resolving a dotted property path against a schema.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PathError {
    /// The path string was empty or contained an empty segment.
    #[error("property path '{path}' is empty or has an empty segment")]
    EmptyPath { path: String },
    /// A hop named a property the current schema does not define.
    #[error("invalid property '{property}' in path '{path}'")]
    InvalidPathProperty { property: String, path: String },
    /// The path continued past a scalar property.
    #[error("property '{property}' in path '{path}' is a simple value and cannot be traversed")]
    ScalarTraversal { property: String, path: String },
    /// A relation or collection pointed at an entity type the catalog lacks.
    #[error("unknown schema '{type_name}' referenced by path '{path}'")]
    UnknownSchema { type_name: String, path: String },
}

impl PathError {
    /// Returns a machine-readable code for the error variant.
    pub fn code(&self) -> &'static str {
        match self {
            PathError::EmptyPath { .. } => "EmptyPath",
            PathError::InvalidPathProperty { .. } => "InvalidPathProperty",
            PathError::ScalarTraversal { .. } => "InvalidPath",
            PathError::UnknownSchema { .. } => "UnknownSchema",
        }
    }

    /// The full path that failed to resolve.
    pub fn path(&self) -> &str {
        match self {
            PathError::EmptyPath { path }
            | PathError::InvalidPathProperty { path, .. }
            | PathError::ScalarTraversal { path, .. }
            | PathError::UnknownSchema { path, .. } => path,
        }
    }
}

/// Failures raised by [`Planner::plan`](crate::query::planner::Planner::plan).
///
/// Planning is a pure function of the query and the schema, so none of these
/// are transient. Callers should surface them as request-level failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlanError {
    /// A restriction or order referenced an unresolvable path.
    #[error(transparent)]
    Path(#[from] PathError),
    /// A persisted-only plan met a restriction the store cannot evaluate.
    #[error("cannot build a fully persisted plan: restriction on '{path}' is not persisted")]
    PersistedOnlyViolation { path: String },
    /// Criterion nesting exceeds the configured depth.
    #[error("criteria tree exceeds depth {max} (got {depth})")]
    CriteriaTooDeep { depth: usize, max: usize },
}

impl PlanError {
    /// Returns a machine-readable code for the error variant.
    pub fn code(&self) -> &'static str {
        match self {
            PlanError::Path(err) => err.code(),
            PlanError::PersistedOnlyViolation { .. } => "PersistedOnlyViolation",
            PlanError::CriteriaTooDeep { .. } => "CriteriaTooDeep",
        }
    }
}

/// Formats an error as `[Code] message`.
pub struct WithCode<'a, E>(pub &'a E);

impl fmt::Display for WithCode<'_, PathError> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.0.code(), self.0)
    }
}

impl fmt::Display for WithCode<'_, PlanError> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.0.code(), self.0)
    }
}
