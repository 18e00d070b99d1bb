use async_graphql::dynamic::{Field, FieldFuture, FieldValue, Object, TypeRef};
use async_graphql::Value as GqlValue;
use serde_json::Value;

use docql_infra::{Document, ID_FIELD};

use super::entity::FieldDef;

/// Shared payload type of update and delete mutations.
pub const RESOURCE_ID: &str = "ResourceID";

/// One resolved document together with the collection it was read from.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub collection: String,
    pub document: Document,
}

impl Record {
    pub fn new(collection: impl Into<String>, document: Document) -> Self {
        Self {
            collection: collection.into(),
            document,
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.document.get(ID_FIELD).and_then(Value::as_str)
    }

    /// Path of the nested collection `field` under this document.
    pub fn subcollection_path(&self, field: &str) -> Option<String> {
        self.id()
            .map(|id| format!("{}/{}/{}", self.collection, id, field))
    }

    pub fn into_field_value(self) -> FieldValue<'static> {
        FieldValue::owned_any(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceId(pub String);

impl ResourceId {
    pub fn into_field_value(self) -> FieldValue<'static> {
        FieldValue::owned_any(self)
    }
}

pub fn resource_id_object() -> Object {
    Object::new(RESOURCE_ID)
        .description("Identifier of a document touched by a mutation")
        .field(Field::new(ID_FIELD, TypeRef::named_nn(TypeRef::ID), |ctx| {
            FieldFuture::new(async move {
                let resource = ctx.parent_value.try_downcast_ref::<ResourceId>()?;
                Ok(Some(GqlValue::String(resource.0.clone())))
            })
        }))
}

/// Output field reading one attribute of the parent [`Record`].
pub fn scalar_field(def: &FieldDef) -> Field {
    let name = def.name.clone();
    Field::new(def.name.clone(), def.type_ref(), move |ctx| {
        let name = name.clone();
        FieldFuture::new(async move {
            let record = ctx.parent_value.try_downcast_ref::<Record>()?;
            match record.document.get(&name) {
                None | Some(Value::Null) => Ok(None),
                Some(value) => Ok(Some(GqlValue::from_json(value.clone())?)),
            }
        })
    })
}
