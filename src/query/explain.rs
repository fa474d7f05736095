//! Human-readable rendering of a [`QueryPlan`].

use std::fmt::{self, Write as _};

use crate::query::ast::{Criterion, Query};
use crate::query::plan::QueryPlan;

/// Explain node representing a plan element with optional metadata.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExplainNode {
    /// Element name.
    pub op: String,
    /// Additional properties describing the element.
    pub props: Vec<ExplainProp>,
    /// Child elements.
    pub inputs: Vec<ExplainNode>,
}

impl ExplainNode {
    /// Creates a new explain node with the given name.
    pub fn new(op: impl Into<String>) -> Self {
        Self {
            op: op.into(),
            props: Vec::new(),
            inputs: Vec::new(),
        }
    }

    fn prop(mut self, prop: ExplainProp) -> Self {
        self.props.push(prop);
        self
    }

    fn input(mut self, node: ExplainNode) -> Self {
        self.inputs.push(node);
        self
    }

    /// Renders the tree, replacing literal values with `?` when `redact` is set.
    pub fn render(&self, redact: bool) -> String {
        let mut out = String::new();
        self.render_into(&mut out, 0, redact);
        out
    }

    fn render_into(&self, out: &mut String, indent: usize, redact: bool) {
        let _ = write!(out, "{:width$}{}", "", self.op, width = indent * 2);
        for prop in &self.props {
            let value = if redact && prop.redactable {
                "?"
            } else {
                prop.value.as_str()
            };
            let _ = write!(out, " {}={}", prop.key, value);
        }
        out.push('\n');
        for input in &self.inputs {
            input.render_into(out, indent + 1, redact);
        }
    }
}

impl fmt::Display for ExplainNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(false))
    }
}

/// Single property associated with an [`ExplainNode`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExplainProp {
    /// Property key.
    pub key: String,
    /// Property value serialized for display.
    pub value: String,
    /// Whether this property contains literal data that may be redacted.
    pub redactable: bool,
}

impl ExplainProp {
    fn plain(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            redactable: false,
        }
    }

    fn literal(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            redactable: true,
        }
    }
}

pub(crate) fn explain_plan(plan: &QueryPlan) -> ExplainNode {
    ExplainNode::new("Plan")
        .prop(ExplainProp::plain("schema", plan.schema().name()))
        .input(explain_query("Persisted", &plan.persisted_query))
        .input(explain_query("InMemory", &plan.non_persisted_query))
}

fn explain_query(op: &str, query: &Query) -> ExplainNode {
    let mut node = ExplainNode::new(op).prop(ExplainProp::plain(
        "root",
        query.effective_root_kind().to_string(),
    ));
    if query.skip_paging {
        node = node.prop(ExplainProp::plain("paging", "skip"));
    } else if query.first_result > 0 || query.max_results.is_some() {
        let max = query
            .max_results
            .map_or_else(|| "all".to_string(), |max| max.to_string());
        node = node.prop(ExplainProp::plain(
            "paging",
            format!("{}+{max}", query.first_result),
        ));
    }
    if !query.aliases.is_empty() {
        node = node.prop(ExplainProp::plain(
            "aliases",
            query.aliases.iter().cloned().collect::<Vec<_>>().join(","),
        ));
    }
    if !query.orders.is_empty() {
        let orders: Vec<String> = query.orders.iter().map(ToString::to_string).collect();
        node = node.prop(ExplainProp::plain("order", orders.join(", ")));
    }
    for criterion in &query.criteria {
        node = node.input(explain_criterion(criterion));
    }
    node
}

fn explain_criterion(criterion: &Criterion) -> ExplainNode {
    match criterion {
        Criterion::Restriction(restriction) => {
            let mut node = ExplainNode::new("Restriction")
                .prop(ExplainProp::plain("path", restriction.path.as_str()))
                .prop(ExplainProp::literal("op", restriction.operator.to_string()));
            if let Some(path) = restriction.query_path() {
                if path.has_alias() {
                    node = node.prop(ExplainProp::plain("joins", path.alias_chain.join(".")));
                }
            }
            node
        }
        Criterion::Junction(junction) => junction
            .criteria
            .iter()
            .fold(ExplainNode::new(junction.kind.to_string()), |node, child| {
                node.input(explain_criterion(child))
            }),
    }
}
