use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_graphql::dynamic::{Object, Schema, SchemaError, Subscription, Type};
use thiserror::Error;

use docql_infra::DocumentStore;

use super::entity::{EntityType, FieldKind};
use super::mutations::{create_field, delete_field, update_field};
use super::queries::{list_query_field, single_query_field, subcollection_field};
use super::subscriptions::added_subscription_field;
use super::types::{resource_id_object, scalar_field, RESOURCE_ID};
use crate::state::AppState;

pub const QUERY: &str = "Query";
pub const MUTATION: &str = "Mutation";
pub const SUBSCRIPTION: &str = "Subscription";

#[derive(Debug, Error)]
pub enum SchemaBuildError {
    #[error("no entity types declared")]
    NoEntities,

    #[error("type `{0}` is declared more than once")]
    DuplicateType(String),

    #[error("root field `{root}.{field}` is declared more than once")]
    DuplicateField { root: &'static str, field: String },

    #[error("filter key `{key}` of `{entity}` is generated by more than one field")]
    DuplicateFilterKey { entity: String, key: String },

    #[error("entity `{0}` declares no fields besides `id`")]
    EmptyEntity(String),

    #[error("field `{entity}.{field}` refers to unknown entity `{target}`")]
    UnknownEntity {
        entity: String,
        field: String,
        target: String,
    },

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

/// Named types of one schema under construction.
#[derive(Default)]
pub struct TypeRegistry {
    names: HashSet<String>,
    types: Vec<Type>,
}

impl TypeRegistry {
    pub fn register(&mut self, name: &str, ty: impl Into<Type>) -> Result<(), SchemaBuildError> {
        self.reserve(name)?;
        self.types.push(ty.into());
        Ok(())
    }

    /// Claim a name that is registered some other way (the root types).
    pub fn reserve(&mut self, name: &str) -> Result<(), SchemaBuildError> {
        if !self.names.insert(name.to_string()) {
            return Err(SchemaBuildError::DuplicateType(name.to_string()));
        }
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    fn into_types(self) -> Vec<Type> {
        self.types
    }
}

#[derive(Debug, Clone)]
pub struct SchemaConfig {
    pub depth_limit: usize,
    pub complexity_limit: usize,
    pub introspection: bool,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            depth_limit: 15,
            complexity_limit: 200,
            introspection: false,
        }
    }
}

/// Root fields claimed so far, keyed by root type.
#[derive(Default)]
struct RootFields(HashSet<(&'static str, String)>);

impl RootFields {
    fn claim(&mut self, root: &'static str, field: String) -> Result<(), SchemaBuildError> {
        if !self.0.insert((root, field.clone())) {
            return Err(SchemaBuildError::DuplicateField { root, field });
        }
        Ok(())
    }
}

/// Synthesizes the query, mutation and subscription surface of a set of
/// entity types over one document store.
pub struct SchemaBuilder {
    store: Arc<dyn DocumentStore>,
    entities: Vec<EntityType>,
    config: SchemaConfig,
}

impl SchemaBuilder {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            entities: Vec::new(),
            config: SchemaConfig::default(),
        }
    }

    pub fn entity(mut self, entity: EntityType) -> Self {
        self.entities.push(entity);
        self
    }

    pub fn entities(mut self, entities: impl IntoIterator<Item = EntityType>) -> Self {
        self.entities.extend(entities);
        self
    }

    pub fn config(mut self, config: SchemaConfig) -> Self {
        self.config = config;
        self
    }

    pub fn finish(self) -> Result<Schema, SchemaBuildError> {
        if self.entities.is_empty() {
            return Err(SchemaBuildError::NoEntities);
        }

        let mut registry = TypeRegistry::default();
        for root in [QUERY, MUTATION, SUBSCRIPTION] {
            registry.reserve(root)?;
        }
        registry.register(RESOURCE_ID, resource_id_object())?;

        let by_name: HashMap<&str, &EntityType> = self.entities.iter().map(|e| (e.name(), e)).collect();
        let mut roots = RootFields::default();
        let mut query = Object::new(QUERY);
        let mut mutation = Object::new(MUTATION);
        let mut subscription = Subscription::new(SUBSCRIPTION);

        for entity in &self.entities {
            if entity.data_fields().is_empty() {
                return Err(SchemaBuildError::EmptyEntity(entity.name().to_string()));
            }
            if let Some(key) = entity.filter().duplicate_key() {
                return Err(SchemaBuildError::DuplicateFilterKey {
                    entity: entity.name().to_string(),
                    key: key.to_string(),
                });
            }

            registry.register(entity.name(), self.object_type(entity, &by_name)?)?;
            registry.register(entity.filter().type_name(), entity.filter().to_input_object())?;
            registry.register(entity.order().type_name(), entity.order().to_enum())?;

            let store = &self.store;
            roots.claim(QUERY, entity.singular_name())?;
            roots.claim(QUERY, entity.plural_name())?;
            query = query
                .field(single_query_field(entity, store.clone()))
                .field(list_query_field(entity, store.clone()));

            for verb in ["create", "update", "delete"] {
                roots.claim(MUTATION, format!("{verb}{}", entity.name()))?;
            }
            mutation = mutation
                .field(create_field(entity, store.clone()))
                .field(update_field(entity, store.clone()))
                .field(delete_field(entity, store.clone()));

            roots.claim(SUBSCRIPTION, format!("{}Added", entity.singular_name()))?;
            subscription = subscription.field(added_subscription_field(entity, store.clone()));
        }

        let type_count = registry.len();
        let mut builder = Schema::build(QUERY, Some(MUTATION), Some(SUBSCRIPTION))
            .register(query)
            .register(mutation)
            .register(subscription);
        for ty in registry.into_types() {
            builder = builder.register(ty);
        }
        builder = builder
            .limit_depth(self.config.depth_limit)
            .limit_complexity(self.config.complexity_limit);
        if !self.config.introspection {
            builder = builder.disable_introspection();
        }

        let schema = builder.finish()?;
        tracing::info!(entities = self.entities.len(), types = type_count, "GraphQL schema built");
        Ok(schema)
    }

    fn object_type(&self, entity: &EntityType, by_name: &HashMap<&str, &EntityType>) -> Result<Object, SchemaBuildError> {
        let object = entity
            .scalar_fields()
            .iter()
            .fold(Object::new(entity.name()), |object, def| object.field(scalar_field(def)));

        entity.subcollection_fields().iter().try_fold(object, |object, def| {
            let FieldKind::Collection { entity: target } = &def.kind else {
                return Ok(object);
            };
            let target_type = by_name.get(target.as_str()).ok_or_else(|| SchemaBuildError::UnknownEntity {
                entity: entity.name().to_string(),
                field: def.name.clone(),
                target: target.clone(),
            })?;
            Ok(object.field(subcollection_field(&def.name, target_type, self.store.clone())))
        })
    }
}

/// Build the GraphQL schema over the store held by `state`.
pub fn build_schema(
    state: &AppState,
    entities: Vec<EntityType>,
    config: SchemaConfig,
) -> Result<Schema, SchemaBuildError> {
    SchemaBuilder::new(state.store.clone())
        .entities(entities)
        .config(config)
        .finish()
}
