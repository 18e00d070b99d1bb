//! Derived argument contracts of the plural query field.
//!
//! Every non-id scalar `f` yields the filter keys `f`, `f_gt`, `f_gte`, `f_lt`
//! and `f_lte`. Every scalar, `id` included, yields the order enumerants
//! `F_ASC` and `F_DESC` whose wire values are `f.asc` and `f.desc`.

use std::collections::HashSet;

use async_graphql::dynamic::{Enum, EnumItem, InputObject, InputValue, TypeRef};
use docql_infra::{Direction, WhereOp};

use super::entity::FieldDef;
use super::translate::{FilterKey, OrderKey};

const FILTER_SUFFIXES: [(&str, WhereOp); 4] = [
    ("gt", WhereOp::Gt),
    ("gte", WhereOp::Gte),
    ("lt", WhereOp::Lt),
    ("lte", WhereOp::Lte),
];

/// Operator spelled by a filter-key suffix.
pub fn suffix_operator(suffix: &str) -> Option<WhereOp> {
    FILTER_SUFFIXES
        .iter()
        .find(|(s, _)| *s == suffix)
        .map(|(_, op)| *op)
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterKeyDef {
    pub key: String,
    pub field: FieldDef,
    pub op: WhereOp,
}

/// Input object `<Prefix>Filter`.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterContract {
    type_name: String,
    keys: Vec<FilterKeyDef>,
}

impl FilterContract {
    /// Callers pass the fields to expose; `id` is expected to be left out.
    pub fn new(fields: &[FieldDef], prefix: &str) -> Self {
        let keys = fields
            .iter()
            .flat_map(|field| {
                std::iter::once((field.name.clone(), WhereOp::Eq))
                    .chain(
                        FILTER_SUFFIXES
                            .iter()
                            .map(|(s, op)| (format!("{}_{s}", field.name), *op)),
                    )
                    .map(|(key, op)| FilterKeyDef {
                        key,
                        field: field.clone(),
                        op,
                    })
            })
            .collect();

        Self {
            type_name: format!("{prefix}Filter"),
            keys,
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(|k| k.key.as_str())
    }

    /// Field and operator a declared key stands for. `size_lt` on a field
    /// named `size_lt` is equality on that field, not `size < v`.
    pub fn resolve(&self, key: &str) -> Option<FilterKey> {
        self.keys.iter().find(|def| def.key == key).map(|def| FilterKey {
            path: def.field.name.clone(),
            op: def.op,
        })
    }

    /// First key generated by two different fields, e.g. `a_lt` from both
    /// `a` and `a_lt`.
    pub fn duplicate_key(&self) -> Option<&str> {
        let mut seen = HashSet::new();
        self.keys
            .iter()
            .map(|def| def.key.as_str())
            .find(|key| !seen.insert(*key))
    }

    pub fn to_input_object(&self) -> InputObject {
        self.keys.iter().fold(
            InputObject::new(&self.type_name)
                .description(format!("Field comparisons ANDed into one `{}` query", self.type_name)),
            |object, def| object.field(InputValue::new(&def.key, def.field.nullable_type_ref())),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderItem {
    pub name: String,
    pub value: String,
}

/// Enum `<Prefix>OrderBy`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderContract {
    type_name: String,
    items: Vec<OrderItem>,
}

impl OrderContract {
    pub fn new(fields: &[FieldDef], prefix: &str) -> Self {
        let items = fields
            .iter()
            .flat_map(|field| {
                [Direction::Asc, Direction::Desc].map(|direction| OrderItem {
                    name: format!(
                        "{}_{}",
                        field.name.to_uppercase(),
                        direction.as_str().to_uppercase()
                    ),
                    value: OrderKey::encode(&field.name, direction),
                })
            })
            .collect();

        Self {
            type_name: format!("{prefix}OrderBy"),
            items,
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    /// Wire value (`age.desc`) of an enumerant (`AGE_DESC`).
    pub fn value_of(&self, name: &str) -> Option<&str> {
        self.items
            .iter()
            .find(|item| item.name == name)
            .map(|item| item.value.as_str())
    }

    pub fn to_enum(&self) -> Enum {
        self.items.iter().fold(Enum::new(&self.type_name), |e, item| {
            e.item(EnumItem::new(&item.name).description(format!("Sort by `{}`", item.value)))
        })
    }
}

/// Argument list of a plural query field over an entity with these contracts.
pub fn list_arguments(filter: &FilterContract, order: &OrderContract) -> [InputValue; 3] {
    [
        InputValue::new("cursor", TypeRef::named(TypeRef::ID)),
        InputValue::new("filter", TypeRef::named(filter.type_name())),
        InputValue::new("orderBy", TypeRef::named_list(order.type_name())),
    ]
}
