//! In-memory query evaluation.
//!
//! [`InMemoryEngine`] evaluates a [`Query`] over already-loaded [`Record`]s:
//! filter, then stable sort, then page. It runs the residual half of a
//! [`QueryPlan`] and doubles as the reference interpreter the split is checked
//! against. [`execute_plan`] chains a [`PersistedStore`] fetch with the
//! in-memory pass.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::convert::Infallible;

use tracing::trace;

use crate::query::ast::{Criterion, Direction, JunctionKind, MatchMode, Operator, Query, Restriction};
use crate::query::plan::QueryPlan;
use crate::query::Value;

/// Value stored under a record field.
#[derive(Clone, Debug, PartialEq)]
pub enum Field {
    /// Scalar value.
    Value(Value),
    /// Single related entity.
    Object(Record),
    /// Related entities of a collection.
    List(Vec<Record>),
}

/// Loaded entity: named fields, possibly nested.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Record {
    fields: BTreeMap<String, Field>,
}

impl Record {
    /// Creates an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a scalar field.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), Field::Value(value.into()));
        self
    }

    /// Sets a relation field.
    pub fn with_object(mut self, name: impl Into<String>, record: Record) -> Self {
        self.fields.insert(name.into(), Field::Object(record));
        self
    }

    /// Sets a collection field.
    pub fn with_list(mut self, name: impl Into<String>, records: Vec<Record>) -> Self {
        self.fields.insert(name.into(), Field::List(records));
        self
    }

    /// Returns the field stored under `name`.
    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }
}

/// Something reached by following a path into a record.
#[derive(Clone, Copy, Debug)]
enum Reached<'a> {
    Missing,
    Value(&'a Value),
    Object,
    List(usize),
}

impl<'a> Reached<'a> {
    fn is_absent(&self) -> bool {
        matches!(self, Reached::Missing | Reached::Value(Value::Null))
    }

    fn value(self) -> Option<&'a Value> {
        match self {
            Reached::Value(value) if !value.is_null() => Some(value),
            _ => None,
        }
    }
}

fn reach<'a>(record: &'a Record, segments: &[&str], out: &mut Vec<Reached<'a>>) {
    let Some((head, rest)) = segments.split_first() else {
        return;
    };
    match (record.get(head), rest.is_empty()) {
        (None, _) => out.push(Reached::Missing),
        (Some(Field::Value(value)), true) => out.push(Reached::Value(value)),
        (Some(Field::Object(_)), true) => out.push(Reached::Object),
        (Some(Field::List(items)), true) => out.push(Reached::List(items.len())),
        (Some(Field::Value(_)), false) => out.push(Reached::Missing),
        (Some(Field::Object(next)), false) => reach(next, rest, out),
        (Some(Field::List(items)), false) => {
            if items.is_empty() {
                out.push(Reached::Missing);
            }
            for item in items {
                reach(item, rest, out);
            }
        }
    }
}

fn values_at<'a>(record: &'a Record, path: &str) -> Vec<Reached<'a>> {
    let segments: Vec<&str> = path.split('.').collect();
    let mut out = Vec::new();
    reach(record, &segments, &mut out);
    out
}

fn like_matches(candidate: &str, pattern: &str, mode: MatchMode, case_insensitive: bool) -> bool {
    let (candidate, pattern) = if case_insensitive {
        (candidate.to_lowercase(), pattern.to_lowercase())
    } else {
        (candidate.to_owned(), pattern.to_owned())
    };
    match mode {
        MatchMode::Exact => candidate == pattern,
        MatchMode::Anywhere => candidate.contains(&pattern),
        MatchMode::Start => candidate.starts_with(&pattern),
        MatchMode::End => candidate.ends_with(&pattern),
    }
}

fn any_value<F>(reached: &[Reached<'_>], pred: F) -> bool
where
    F: Fn(&Value) -> bool,
{
    reached.iter().filter_map(|r| r.value()).any(pred)
}

fn cmp_is(value: &Value, literal: &Value, accept: fn(Ordering) -> bool) -> bool {
    value.compare(literal).is_some_and(accept)
}

/// Returns `true` when `record` satisfies `restriction`.
///
/// Paths crossing collections match when any reached value matches.
pub fn restriction_matches(restriction: &Restriction, record: &Record) -> bool {
    let reached = values_at(record, &restriction.path);
    match &restriction.operator {
        Operator::Eq(Value::Null) | Operator::Null => reached.iter().all(Reached::is_absent),
        Operator::Ne(Value::Null) | Operator::NotNull => !reached.iter().all(Reached::is_absent),
        Operator::Eq(literal) => any_value(&reached, |v| cmp_is(v, literal, Ordering::is_eq)),
        Operator::Ne(literal) => any_value(&reached, |v| !cmp_is(v, literal, Ordering::is_eq)),
        Operator::Gt(literal) => any_value(&reached, |v| cmp_is(v, literal, Ordering::is_gt)),
        Operator::Ge(literal) => any_value(&reached, |v| cmp_is(v, literal, Ordering::is_ge)),
        Operator::Lt(literal) => any_value(&reached, |v| cmp_is(v, literal, Ordering::is_lt)),
        Operator::Le(literal) => any_value(&reached, |v| cmp_is(v, literal, Ordering::is_le)),
        Operator::Between(low, high) => any_value(&reached, |v| {
            cmp_is(v, low, Ordering::is_ge) && cmp_is(v, high, Ordering::is_le)
        }),
        Operator::In(literals) => {
            any_value(&reached, |v| literals.iter().any(|l| cmp_is(v, l, Ordering::is_eq)))
        }
        Operator::NotIn(literals) => {
            any_value(&reached, |v| !literals.iter().any(|l| cmp_is(v, l, Ordering::is_eq)))
        }
        Operator::Like {
            pattern,
            mode,
            case_insensitive,
            negated,
        } => any_value(&reached, |v| match v {
            Value::String(s) => like_matches(s, pattern, *mode, *case_insensitive) != *negated,
            _ => false,
        }),
        Operator::Empty => reached
            .iter()
            .all(|r| matches!(r, Reached::Missing | Reached::List(0))),
        Operator::NotEmpty => reached
            .iter()
            .any(|r| matches!(r, Reached::List(n) if *n > 0)),
    }
}

fn criteria_match(kind: JunctionKind, criteria: &[Criterion], record: &Record) -> bool {
    let matches = |criterion: &Criterion| match criterion {
        Criterion::Restriction(restriction) => restriction_matches(restriction, record),
        Criterion::Junction(junction) => {
            junction.is_empty() || criteria_match(junction.kind, &junction.criteria, record)
        }
    };
    match kind {
        JunctionKind::And => criteria.iter().all(matches),
        JunctionKind::Or => criteria.is_empty() || criteria.iter().any(matches),
    }
}

fn sort_key<'a>(record: &'a Record, path: &str) -> &'a Value {
    const NULL: &Value = &Value::Null;
    values_at(record, path)
        .into_iter()
        .find_map(|r| match r {
            Reached::Value(value) => Some(value),
            _ => None,
        })
        .unwrap_or(NULL)
}

/// Evaluates queries over loaded records.
#[derive(Clone, Copy, Debug, Default)]
pub struct InMemoryEngine;

impl InMemoryEngine {
    /// Returns `true` when `record` satisfies the criteria of `query`.
    pub fn matches(&self, query: &Query, record: &Record) -> bool {
        criteria_match(query.effective_root_kind(), &query.criteria, record)
    }

    /// Filters, sorts, and pages `records` according to `query`.
    pub fn query<I>(&self, query: &Query, records: I) -> Vec<Record>
    where
        I: IntoIterator<Item = Record>,
    {
        let mut rows: Vec<Record> = records
            .into_iter()
            .filter(|record| self.matches(query, record))
            .collect();

        if !query.orders.is_empty() {
            rows.sort_by(|a, b| {
                query
                    .orders
                    .iter()
                    .map(|order| {
                        let ord = sort_key(a, &order.property).sort_cmp(sort_key(b, &order.property));
                        match order.direction {
                            Direction::Asc => ord,
                            Direction::Desc => ord.reverse(),
                        }
                    })
                    .find(|ord| ord.is_ne())
                    .unwrap_or(Ordering::Equal)
            });
        }

        let matched = rows.len();
        if !query.skip_paging {
            rows = rows
                .into_iter()
                .skip(query.first_result)
                .take(query.max_results.unwrap_or(usize::MAX))
                .collect();
        }
        trace!(matched, returned = rows.len(), "eval.query");
        rows
    }

    /// Counts the records matching `query`, ignoring orders and paging.
    pub fn count<'a, I>(&self, query: &Query, records: I) -> usize
    where
        I: IntoIterator<Item = &'a Record>,
    {
        records
            .into_iter()
            .filter(|record| self.matches(query, record))
            .count()
    }
}

/// Backing store able to evaluate the persisted half of a plan.
pub trait PersistedStore {
    /// Store failure type.
    type Error;

    /// Returns the rows matching `query`, honoring its orders and paging.
    fn fetch(&self, query: &Query) -> Result<Vec<Record>, Self::Error>;
}

/// Store holding its rows in a vector, evaluated with [`InMemoryEngine`].
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    rows: Vec<Record>,
}

impl MemoryStore {
    /// Creates a store over `rows`.
    pub fn new(rows: Vec<Record>) -> Self {
        Self { rows }
    }

    /// Stored rows in insertion order.
    pub fn rows(&self) -> &[Record] {
        &self.rows
    }
}

impl PersistedStore for MemoryStore {
    type Error = Infallible;

    fn fetch(&self, query: &Query) -> Result<Vec<Record>, Self::Error> {
        Ok(InMemoryEngine.query(query, self.rows.iter().cloned()))
    }
}

/// Runs the persisted half of `plan` on `store`, then the residual in memory.
pub fn execute_plan<S>(plan: &QueryPlan, store: &S) -> Result<Vec<Record>, S::Error>
where
    S: PersistedStore,
{
    let candidates = store.fetch(&plan.persisted_query)?;
    trace!(candidates = candidates.len(), "eval.plan.candidates");
    Ok(InMemoryEngine.query(&plan.non_persisted_query, candidates))
}
