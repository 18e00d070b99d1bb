use async_graphql::dynamic::TypeRef;
use serde::Deserialize;

use docql_infra::ID_FIELD;

use super::contracts::{FilterContract, OrderContract};

/// Leaf types a stored attribute can be exposed as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum ScalarType {
    #[serde(rename = "ID")]
    Id,
    String,
    Int,
    Float,
    Boolean,
}

impl ScalarType {
    pub fn type_name(&self) -> &'static str {
        match self {
            ScalarType::Id => TypeRef::ID,
            ScalarType::String => TypeRef::STRING,
            ScalarType::Int => TypeRef::INT,
            ScalarType::Float => TypeRef::FLOAT,
            ScalarType::Boolean => TypeRef::BOOLEAN,
        }
    }
}

/// Classification of a field, fixed when the field is declared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    Scalar { ty: ScalarType, required: bool },
    /// Nested collection of documents of another entity type.
    Collection { entity: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    pub name: String,
    pub kind: FieldKind,
}

impl FieldDef {
    pub fn scalar(name: impl Into<String>, ty: ScalarType) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Scalar {
                ty,
                required: false,
            },
        }
    }

    pub fn required(name: impl Into<String>, ty: ScalarType) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Scalar { ty, required: true },
        }
    }

    pub fn collection(name: impl Into<String>, entity: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Collection {
                entity: entity.into(),
            },
        }
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self.kind, FieldKind::Scalar { .. })
    }

    /// Output type as declared on the object type.
    pub fn type_ref(&self) -> TypeRef {
        match &self.kind {
            FieldKind::Scalar { ty, required: true } => TypeRef::named_nn(ty.type_name()),
            FieldKind::Scalar { ty, required: false } => TypeRef::named(ty.type_name()),
            FieldKind::Collection { entity } => TypeRef::named_nn_list_nn(entity),
        }
    }

    /// Same leaf type with the non-null wrapper removed.
    pub fn nullable_type_ref(&self) -> TypeRef {
        match &self.kind {
            FieldKind::Scalar { ty, .. } => TypeRef::named(ty.type_name()),
            FieldKind::Collection { entity } => TypeRef::named_list(entity),
        }
    }
}

/// Split declared fields into scalar and nested-collection fields, keeping
/// their relative order.
pub fn classify(fields: &[FieldDef]) -> (Vec<FieldDef>, Vec<FieldDef>) {
    fields.iter().cloned().partition(FieldDef::is_scalar)
}

/// A named object type backed by one collection of the document store.
#[derive(Debug, Clone)]
pub struct EntityType {
    name: String,
    collection: String,
    scalar_fields: Vec<FieldDef>,
    subcollection_fields: Vec<FieldDef>,
    filter: FilterContract,
    order: OrderContract,
}

impl EntityType {
    /// `id: ID!` is always the first scalar field, whatever was declared for it.
    pub fn new(name: impl Into<String>, collection: impl Into<String>, fields: Vec<FieldDef>) -> Self {
        let name = name.into();
        let (declared, subcollection_fields) = classify(&fields);

        let mut scalar_fields = vec![FieldDef::required(ID_FIELD, ScalarType::Id)];
        scalar_fields.extend(declared.into_iter().filter(|f| f.name != ID_FIELD));

        let filter = FilterContract::new(&scalar_fields[1..], &name);
        let order = OrderContract::new(&scalar_fields, &name);

        Self {
            name,
            collection: collection.into(),
            scalar_fields,
            subcollection_fields,
            filter,
            order,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn scalar_fields(&self) -> &[FieldDef] {
        &self.scalar_fields
    }

    /// Scalar fields other than `id`; the mutable payload of a document.
    pub fn data_fields(&self) -> &[FieldDef] {
        &self.scalar_fields[1..]
    }

    pub fn subcollection_fields(&self) -> &[FieldDef] {
        &self.subcollection_fields
    }

    pub fn filter(&self) -> &FilterContract {
        &self.filter
    }

    pub fn order(&self) -> &OrderContract {
        &self.order
    }

    /// `BlogPost` -> `blogPost`
    pub fn singular_name(&self) -> String {
        lower_first(&self.name)
    }

    /// `BlogPost` -> `blogPosts`
    pub fn plural_name(&self) -> String {
        lower_first(&pluralize(&self.name))
    }
}

fn lower_first(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn pluralize(word: &str) -> String {
    let lower = word.to_lowercase();
    if ["s", "x", "z", "ch", "sh"].iter().any(|end| lower.ends_with(end)) {
        return format!("{word}es");
    }
    if let Some(stem) = word.strip_suffix('y').or_else(|| word.strip_suffix('Y')) {
        let vowel_before = stem
            .chars()
            .last()
            .is_some_and(|c| "aeiouAEIOU".contains(c));
        if !vowel_before && !stem.is_empty() {
            return format!("{stem}ies");
        }
    }
    format!("{word}s")
}
