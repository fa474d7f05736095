//! Property schema catalog consumed by the planner.
//!
//! The planner never owns entity metadata. It asks a [`SchemaProvider`] for the
//! [`Schema`] of an entity type and inspects [`Property`] descriptors to decide
//! whether a path is persisted and which joins it crosses. [`InMemorySchemas`]
//! is a simple provider for tests and embedding callers.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Shape of a property's value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PropertyKind {
    /// Scalar value stored directly on the entity.
    Simple,
    /// Single-valued reference to another entity type.
    Relation {
        /// Entity type on the far side of the relation.
        target: String,
    },
    /// Multi-valued reference to another entity type.
    Collection {
        /// Entity type of the collection items.
        item: String,
    },
}

/// Property descriptor reported by the catalog.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    /// Name used in query paths.
    pub name: String,
    /// Field name used by the store; becomes the join alias for non-simple hops.
    pub storage_field_name: String,
    /// Value shape.
    pub kind: PropertyKind,
    /// Whether the backing store can filter, sort, and page on this property.
    pub persisted: bool,
    /// Whether the property may be used as a sort key.
    pub orderable: bool,
}

impl Property {
    /// Persisted, orderable scalar property whose storage name equals its name.
    pub fn simple(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            storage_field_name: name.clone(),
            name,
            kind: PropertyKind::Simple,
            persisted: true,
            orderable: true,
        }
    }

    /// Persisted single-valued relation to `target`.
    pub fn relation(name: impl Into<String>, target: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            storage_field_name: name.clone(),
            name,
            kind: PropertyKind::Relation {
                target: target.into(),
            },
            persisted: true,
            orderable: false,
        }
    }

    /// Persisted collection of `item` entities.
    pub fn collection(name: impl Into<String>, item: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            storage_field_name: name.clone(),
            name,
            kind: PropertyKind::Collection { item: item.into() },
            persisted: true,
            orderable: false,
        }
    }

    /// Marks the property as computed in application memory only.
    pub fn transient(mut self) -> Self {
        self.persisted = false;
        self
    }

    /// Overrides the store field name.
    pub fn stored_as(mut self, field: impl Into<String>) -> Self {
        self.storage_field_name = field.into();
        self
    }

    /// Overrides whether the property may be sorted on.
    pub fn with_orderable(mut self, orderable: bool) -> Self {
        self.orderable = orderable;
        self
    }

    /// Returns `true` for scalar properties.
    pub fn is_simple(&self) -> bool {
        matches!(self.kind, PropertyKind::Simple)
    }

    /// Returns `true` for collection properties.
    pub fn is_collection(&self) -> bool {
        matches!(self.kind, PropertyKind::Collection { .. })
    }

    /// Entity type reached by traversing this property, if any.
    pub fn target_type(&self) -> Option<&str> {
        match &self.kind {
            PropertyKind::Simple => None,
            PropertyKind::Relation { target } => Some(target),
            PropertyKind::Collection { item } => Some(item),
        }
    }
}

/// Property set of one entity type.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    name: String,
    properties: BTreeMap<String, Property>,
}

impl Schema {
    /// Creates an empty schema for the named entity type.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: BTreeMap::new(),
        }
    }

    /// Registers a property, replacing any previous one with the same name.
    pub fn with_property(mut self, property: Property) -> Self {
        self.properties.insert(property.name.clone(), property);
        self
    }

    /// Entity type name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Looks up a property by its exact registered name.
    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.get(name)
    }

    /// Iterates over every registered property.
    pub fn properties(&self) -> impl Iterator<Item = &Property> {
        self.properties.values()
    }

    /// Flat set of persisted property names.
    ///
    /// Names are matched literally: a dotted name is only present when a
    /// property was registered under that exact string.
    pub fn persisted_property_names(&self) -> BTreeSet<&str> {
        self.properties
            .values()
            .filter(|p| p.persisted)
            .map(|p| p.name.as_str())
            .collect()
    }

    /// Returns `true` when `name` is registered and persisted.
    pub fn has_persisted_property(&self, name: &str) -> bool {
        self.properties.get(name).is_some_and(|p| p.persisted)
    }
}

/// Resolves entity type names to their schemas.
pub trait SchemaProvider: Send + Sync {
    /// Returns the schema for `type_name`, if the type is known.
    fn schema_of(&self, type_name: &str) -> Option<Arc<Schema>>;
}

/// Simple in-memory schema provider used for tests or embedding.
#[derive(Clone, Debug, Default)]
pub struct InMemorySchemas {
    schemas: HashMap<String, Arc<Schema>>,
}

impl InMemorySchemas {
    /// Creates an empty provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a schema under its own name.
    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.schemas
            .insert(schema.name().to_owned(), Arc::new(schema));
        self
    }

    /// Returns the schema registered for `type_name`.
    pub fn get(&self, type_name: &str) -> Option<Arc<Schema>> {
        self.schemas.get(type_name).cloned()
    }
}

impl SchemaProvider for InMemorySchemas {
    fn schema_of(&self, type_name: &str) -> Option<Arc<Schema>> {
        self.get(type_name)
    }
}
