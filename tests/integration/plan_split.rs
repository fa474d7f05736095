#![forbid(unsafe_code)]

use std::sync::{Arc, Once};

use hybrid_planner::config::PlannerConfig;
use hybrid_planner::query::builder::{eq, ge, gt, ilike, in_list, is_not_null, like, lt};
use hybrid_planner::query::{
    is_fully_persisted, Criterion, JunctionKind, MatchMode, Order, PlanError, Planner, Principal,
    QueryBuilder, WithCode,
};
use hybrid_planner::schema::{InMemorySchemas, Property, Schema};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("hybrid_planner=debug"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .try_init();
    });
}

fn catalog() -> InMemorySchemas {
    InMemorySchemas::new()
        .with_schema(
            Schema::new("DataElement")
                .with_property(Property::simple("id"))
                .with_property(Property::simple("name"))
                .with_property(Property::simple("code"))
                .with_property(Property::simple("valueType"))
                .with_property(Property::simple("displayName").transient())
                .with_property(Property::relation("categoryCombo", "CategoryCombo"))
                .with_property(Property::collection("groups", "DataElementGroup")),
        )
        .with_schema(
            Schema::new("CategoryCombo")
                .with_property(Property::simple("name"))
                .with_property(Property::collection("categories", "Category")),
        )
        .with_schema(Schema::new("Category").with_property(Property::simple("name")))
        .with_schema(Schema::new("DataElementGroup").with_property(Property::simple("name")))
}

fn setup() -> (Planner, Arc<Schema>) {
    init_tracing();
    let catalog = catalog();
    let schema = catalog.get("DataElement").expect("schema registered");
    (Planner::with_defaults(Arc::new(catalog)), schema)
}

#[test]
fn transient_restriction_forces_unrestricted_fetch() {
    let (planner, schema) = setup();
    let query = QueryBuilder::new(schema)
        .filter(eq("valueType", "NUMBER"))
        .filter(like("displayName", "ANC", MatchMode::Start))
        .order(Order::asc("name"))
        .page(10, 5)
        .principal(Principal::new("admin"))
        .build();

    let plan = planner.plan(&query, false).unwrap();

    let persisted = &plan.persisted_query;
    assert!(persisted.criteria.is_empty());
    assert!(persisted.orders.is_empty());
    assert!(persisted.planned);
    assert_eq!(persisted.first_result, 0);
    assert_eq!(persisted.max_results, None);

    let residual = &plan.non_persisted_query;
    assert_eq!(residual.criteria, query.criteria);
    assert_eq!(residual.orders, query.orders);
    assert_eq!((residual.first_result, residual.max_results), (10, Some(5)));
    assert!(residual.planned);
    assert_eq!(plan.principal().unwrap().username, "admin");
}

#[test]
fn persisted_conjunction_moves_entirely() {
    let (planner, schema) = setup();
    let query = QueryBuilder::new(schema)
        .filter(eq("valueType", "NUMBER"))
        .filter(in_list("code", ["DE_1", "DE_2"]))
        .all(|and| {
            and.filter(ge("name", "A")).filter(lt("name", "M"));
        })
        .default_order()
        .page(0, 50)
        .build();
    assert!(is_fully_persisted(&query));

    let plan = planner.plan(&query, false).unwrap();

    assert_eq!(plan.persisted_query.criteria.len(), 3);
    assert_eq!(
        plan.persisted_query.orders,
        vec![Order::asc("name"), Order::asc("id")]
    );
    assert_eq!(plan.persisted_query.max_results, Some(50));
    assert!(!plan.persisted_query.skip_paging);
    assert!(!plan.has_residual());
    assert_eq!(plan.non_persisted_query.max_results, None);
}

#[test]
fn persisted_only_keeps_joined_restrictions_out_of_nested_groups() {
    let (planner, schema) = setup();
    let query = QueryBuilder::new(schema)
        .filter(eq("name", "ANC 1st visit"))
        .all(|and| {
            and.filter(eq("categoryCombo.name", "default"))
                .filter(is_not_null("code"));
        })
        .page(0, 20)
        .build();

    let plan = planner.plan(&query, true).unwrap();

    assert_eq!(plan.persisted_query.criteria.len(), 2);
    let Criterion::Junction(nested) = &plan.persisted_query.criteria[1] else {
        panic!("nested group pushed as a junction");
    };
    assert_eq!(nested.criteria.len(), 2);
    assert!(nested.aliases.contains("categoryCombo"));
    assert!(plan.persisted_query.aliases.contains("categoryCombo"));
    assert!(plan.non_persisted_query.criteria.is_empty());
    assert_eq!(plan.persisted_query.max_results, Some(20));
}

#[test]
fn persisted_only_rejects_transient_restrictions() {
    let (planner, schema) = setup();
    let query = QueryBuilder::new(schema)
        .filter(eq("name", "X"))
        .filter(ilike("displayName", "x", MatchMode::Anywhere))
        .build();

    let err = planner.plan(&query, true).unwrap_err();
    assert!(matches!(err, PlanError::PersistedOnlyViolation { ref path } if path == "displayName"));
    assert_eq!(err.code(), "PersistedOnlyViolation");
    assert!(WithCode(&err).to_string().starts_with("[PersistedOnlyViolation] "));
}

#[test]
fn root_disjunction_is_never_split() {
    let (planner, schema) = setup();
    let query = QueryBuilder::new(schema)
        .root_junction(JunctionKind::Or)
        .filter(eq("name", "A"))
        .filter(eq("code", "B"))
        .page(0, 10)
        .build();

    let plan = planner.plan(&query, false).unwrap();
    assert!(plan.persisted_query.criteria.is_empty());
    assert_eq!(plan.non_persisted_query.criteria.len(), 2);
    assert_eq!(plan.non_persisted_query.root_junction, JunctionKind::Or);
    assert_eq!(plan.non_persisted_query.max_results, Some(10));
}

#[test]
fn single_criterion_under_or_root_is_treated_as_and() {
    let (planner, schema) = setup();
    let query = QueryBuilder::new(schema)
        .root_junction(JunctionKind::Or)
        .filter(gt("name", "M"))
        .build();

    let plan = planner.plan(&query, false).unwrap();
    assert_eq!(plan.persisted_query.criteria.len(), 1);
    assert!(plan.non_persisted_query.criteria.is_empty());
}

#[test]
fn unknown_path_reports_code() {
    let (planner, schema) = setup();
    let query = QueryBuilder::new(schema)
        .filter(eq("categoryCombo.nope", "x"))
        .build();

    let err = planner.plan(&query, true).unwrap_err();
    assert_eq!(err.code(), "InvalidPathProperty");
}

#[test]
fn config_file_controls_depth_limit() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("planner.toml");
    std::fs::write(&path, "max_criteria_depth = 2\n").unwrap();
    let config = PlannerConfig::load(&path).unwrap();

    let catalog = catalog();
    let schema = catalog.get("DataElement").unwrap();
    let planner = Planner::new(config, Arc::new(catalog));
    let query = QueryBuilder::new(schema)
        .all(|and| {
            and.any(|or| {
                or.filter(eq("name", "A")).filter(eq("name", "B"));
            });
        })
        .build();

    let err = planner.plan(&query, false).unwrap_err();
    assert!(matches!(err, PlanError::CriteriaTooDeep { depth: 3, max: 2 }));
}

#[test]
fn replanning_the_persisted_half_is_stable() {
    let (planner, schema) = setup();
    let query = QueryBuilder::new(schema)
        .filter(eq("name", "X"))
        .filter(eq("categoryCombo.name", "default"))
        .order(Order::desc("code"))
        .build();

    let plan = planner.plan(&query, true).unwrap();
    let again = planner.plan(&plan.persisted_query, true).unwrap();
    assert_eq!(again.persisted_query.criteria, plan.persisted_query.criteria);
    assert_eq!(again.persisted_query.orders, plan.persisted_query.orders);
    assert!(!again.has_residual());
}
