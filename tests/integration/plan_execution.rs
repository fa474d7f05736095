#![forbid(unsafe_code)]

use std::cell::RefCell;
use std::sync::Arc;

use hybrid_planner::query::builder::{eq, gt, ilike, is_empty, is_not_null, like, lt};
use hybrid_planner::query::{
    execute_plan, Criterion, Field, InMemoryEngine, JunctionKind, MatchMode, MemoryStore, Order,
    PersistedStore, Planner, Query, QueryBuilder, QueryPlan, Record, Value,
};
use hybrid_planner::schema::{InMemorySchemas, Property, Schema};

fn catalog() -> InMemorySchemas {
    InMemorySchemas::new()
        .with_schema(
            Schema::new("DataElement")
                .with_property(Property::simple("id"))
                .with_property(Property::simple("name"))
                .with_property(Property::simple("code"))
                .with_property(Property::simple("score").transient())
                .with_property(Property::relation("categoryCombo", "CategoryCombo"))
                .with_property(Property::collection("groups", "DataElementGroup")),
        )
        .with_schema(Schema::new("CategoryCombo").with_property(Property::simple("name")))
        .with_schema(Schema::new("DataElementGroup").with_property(Property::simple("name")))
}

fn element(id: &str, name: &str, score: i64, combo: &str, groups: &[&str]) -> Record {
    Record::new()
        .with("id", id)
        .with("name", name)
        .with("code", format!("DE_{id}"))
        .with("score", score)
        .with_object("categoryCombo", Record::new().with("name", combo))
        .with_list(
            "groups",
            groups.iter().map(|g| Record::new().with("name", *g)).collect(),
        )
}

fn rows() -> Vec<Record> {
    vec![
        element("a", "ANC 1st visit", 40, "default", &["ANC"]),
        element("b", "ANC 2nd visit", 75, "default", &["ANC"]),
        element("c", "BCG doses", 90, "Age", &["Immunization"]),
        element("d", "Malaria cases", 10, "Sex", &[]),
        element("e", "ANC 3rd visit", 80, "Age", &["ANC", "Immunization"]),
        element("f", "Measles doses", 55, "default", &["Immunization"]),
    ]
}

fn ids(rows: &[Record]) -> Vec<String> {
    rows.iter()
        .map(|r| match r.get("id") {
            Some(Field::Value(Value::String(id))) => id.clone(),
            other => panic!("record without id: {other:?}"),
        })
        .collect()
}

/// Store that refuses restrictions it cannot evaluate and remembers the
/// queries it was asked to run.
struct StrictStore {
    inner: MemoryStore,
    seen: RefCell<Vec<Query>>,
}

impl StrictStore {
    fn new() -> Self {
        Self {
            inner: MemoryStore::new(rows()),
            seen: RefCell::new(Vec::new()),
        }
    }
}

fn check_persisted(criteria: &[Criterion]) -> Result<(), String> {
    for criterion in criteria {
        match criterion {
            Criterion::Restriction(r) => match r.query_path() {
                Some(path) if path.persisted => {}
                _ => return Err(format!("store cannot evaluate '{}'", r.path)),
            },
            Criterion::Junction(j) => check_persisted(&j.criteria)?,
        }
    }
    Ok(())
}

impl PersistedStore for StrictStore {
    type Error = String;

    fn fetch(&self, query: &Query) -> Result<Vec<Record>, String> {
        check_persisted(&query.criteria)?;
        self.seen.borrow_mut().push(query.clone());
        match self.inner.fetch(query) {
            Ok(rows) => Ok(rows),
            Err(never) => match never {},
        }
    }
}

fn planner() -> (Planner, Arc<Schema>) {
    let catalog = catalog();
    let schema = catalog.get("DataElement").unwrap();
    (Planner::with_defaults(Arc::new(catalog)), schema)
}

fn assert_equivalent(query: &Query, persisted_only: bool) -> Vec<String> {
    let (planner, _) = planner();
    let plan = planner.plan(query, persisted_only).unwrap();
    let store = StrictStore::new();
    let planned = execute_plan(&plan, &store).unwrap();
    let direct = InMemoryEngine.query(query, rows());
    assert_eq!(ids(&planned), ids(&direct));
    ids(&planned)
}

#[test]
fn fallback_and_persisted_only_plans_match_direct_evaluation() {
    let (_, schema) = planner();
    let query = QueryBuilder::new(Arc::clone(&schema))
        .filter(like("name", "ANC", MatchMode::Start))
        .filter(gt("score", 50))
        .order(Order::desc("name"))
        .page(0, 1)
        .build();
    assert_eq!(assert_equivalent(&query, false), vec!["e"]);

    let query = QueryBuilder::new(schema)
        .filter(like("name", "ANC", MatchMode::Start))
        .filter(eq("categoryCombo.name", "default"))
        .order(Order::desc("name"))
        .page(0, 1)
        .build();
    assert_eq!(assert_equivalent(&query, false), vec!["b"]);
    assert_eq!(assert_equivalent(&query, true), vec!["b"]);
}

#[test]
fn transient_order_defers_paging_to_memory() {
    let (planner, schema) = planner();
    let query = QueryBuilder::new(schema)
        .filter(eq("categoryCombo.name", "default"))
        .order(Order::desc("score"))
        .page(1, 1)
        .build();
    assert_eq!(assert_equivalent(&query, true), vec!["f"]);

    let plan = planner.plan(&query, true).unwrap();
    let store = StrictStore::new();
    execute_plan(&plan, &store).unwrap();
    let seen = store.seen.borrow();
    assert!(seen[0].skip_paging);
    assert!(seen[0].orders.is_empty());
    assert_eq!(seen[0].criteria.len(), 1);
}

#[test]
fn disjunctions_and_collections_survive_the_split() {
    let (_, schema) = planner();
    let query = QueryBuilder::new(schema)
        .filter(eq("groups.name", "Immunization"))
        .any(|or| {
            or.filter(lt("score", 60))
                .filter(ilike("name", "bcg", MatchMode::Anywhere));
        })
        .default_order()
        .build();

    assert_eq!(assert_equivalent(&query, false), vec!["c", "f"]);
}

#[test]
fn root_or_is_evaluated_entirely_in_memory() {
    let (planner, schema) = planner();
    let query = QueryBuilder::new(schema)
        .root_junction(JunctionKind::Or)
        .filter(is_empty("groups"))
        .filter(eq("categoryCombo.name", "Age"))
        .order(Order::asc("id"))
        .build();

    assert_eq!(assert_equivalent(&query, false), vec!["c", "d", "e"]);

    let plan = planner.plan(&query, false).unwrap();
    let store = StrictStore::new();
    execute_plan(&plan, &store).unwrap();
    assert!(store.seen.borrow()[0].criteria.is_empty());
}

#[test]
fn store_rejects_unresolved_criteria() {
    let (_, schema) = planner();
    let mut unplanned = Query::new(Arc::clone(&schema));
    unplanned.add(eq("name", "BCG doses"));
    let plan = QueryPlan::new(unplanned, Query::unrestricted(schema));
    let err = execute_plan(&plan, &StrictStore::new()).unwrap_err();
    assert!(err.contains("'name'"));
}

#[test]
fn count_ignores_paging() {
    let (_, schema) = planner();
    let query = QueryBuilder::new(schema)
        .filter(like("name", "visit", MatchMode::End))
        .page(0, 1)
        .build();
    let rows = rows();
    assert_eq!(InMemoryEngine.count(&query, &rows), 3);
    assert_eq!(InMemoryEngine.query(&query, rows).len(), 1);
}

fn combo_catalog() -> InMemorySchemas {
    InMemorySchemas::new()
        .with_schema(
            Schema::new("DataElement")
                .with_property(Property::simple("id"))
                .with_property(Property::simple("name"))
                .with_property(Property::simple("code"))
                .with_property(Property::relation("categoryCombo", "CategoryCombo"))
                .with_property(Property::simple("categoryCombo.categories.name")),
        )
        .with_schema(
            Schema::new("CategoryCombo")
                .with_property(Property::simple("name"))
                .with_property(Property::collection("categories", "Category")),
        )
        .with_schema(Schema::new("Category").with_property(Property::simple("name")))
}

fn combo_element(id: u32, name: &str, categories: &[&str]) -> Record {
    Record::new()
        .with("id", id.to_string())
        .with("name", name)
        .with("code", format!("DE_{id}"))
        .with_object(
            "categoryCombo",
            Record::new().with_list(
                "categories",
                categories
                    .iter()
                    .map(|c| Record::new().with("name", *c))
                    .collect(),
            ),
        )
}

#[test]
fn nested_joins_split_between_store_and_memory() {
    let catalog = combo_catalog();
    let schema = catalog.get("DataElement").unwrap();
    let planner = Planner::with_defaults(Arc::new(catalog));
    let rows = vec![
        combo_element(1, "ANC", &["Sex"]),
        combo_element(2, "ANC", &["Age"]),
        combo_element(3, "BCG", &["Sex", "Age"]),
        combo_element(4, "Malaria", &[]),
        combo_element(5, "Measles", &["Sex", "Age"]),
    ];
    let query = QueryBuilder::new(schema)
        .filter(is_not_null("code"))
        .any(|or| {
            or.filter(eq("name", "BCG"))
                .filter(eq("categoryCombo.categories.name", "Sex"));
        })
        .all(|and| {
            and.filter(gt("code", "DE_1"))
                .filter(eq("categoryCombo.categories.name", "Age"));
        })
        .order(Order::asc("id"))
        .build();

    let plan = planner.plan(&query, false).unwrap();
    // The disjunction stays whole; the conjunction leaves only its joined half.
    assert_eq!(plan.persisted_query.criteria.len(), 2);
    assert_eq!(plan.non_persisted_query.criteria.len(), 2);
    check_persisted(&plan.persisted_query.criteria).unwrap();

    let store = MemoryStore::new(rows.clone());
    let planned = match execute_plan(&plan, &store) {
        Ok(rows) => rows,
        Err(never) => match never {},
    };
    let direct = InMemoryEngine.query(&query, rows);
    assert_eq!(ids(&planned), vec!["3", "5"]);
    assert_eq!(ids(&planned), ids(&direct));
}
