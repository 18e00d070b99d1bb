//! Translation of list arguments into store queries, and reshaping of store
//! snapshots into output documents.
//!
//! Filter keys arrive already resolved against the entity's filter contract.
//! `FilterKey::decode` covers keys with no contract: they are split at their
//! last underscore, a recognised suffix (`gt`, `gte`, `lt`, `lte`) selects the
//! operator, and anything else is equality on the whole key.

use serde_json::Value;
use thiserror::Error;

use docql_infra::{CollectionQuery, Direction, Document, DocumentStore, StoreError, WhereOp};

use super::contracts::suffix_operator;

#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("Document with {id} not found")]
    NotFound { id: String },

    #[error("invalid order key `{0}`")]
    InvalidOrderKey(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterKey {
    pub path: String,
    pub op: WhereOp,
}

impl FilterKey {
    pub fn decode(key: &str) -> Self {
        match key.rsplit_once('_') {
            Some((path, suffix)) if !path.is_empty() => match suffix_operator(suffix) {
                Some(op) => Self {
                    path: path.to_string(),
                    op,
                },
                None => Self::equality(key),
            },
            _ => Self::equality(key),
        }
    }

    fn equality(key: &str) -> Self {
        Self {
            path: key.to_string(),
            op: WhereOp::Eq,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderKey {
    pub path: String,
    pub direction: Direction,
}

impl OrderKey {
    pub fn decode(value: &str) -> Result<Self, TranslateError> {
        let invalid = || TranslateError::InvalidOrderKey(value.to_string());
        let (path, direction) = value.rsplit_once('.').ok_or_else(invalid)?;
        if path.is_empty() {
            return Err(invalid());
        }
        Ok(Self {
            path: path.to_string(),
            direction: direction.parse().map_err(|_| invalid())?,
        })
    }

    pub fn encode(path: &str, direction: Direction) -> String {
        format!("{path}.{}", direction.as_str())
    }
}

/// Arguments of a plural query field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListArgs {
    /// Accepted for interface compatibility; pagination is not applied.
    pub cursor: Option<String>,
    /// Filter entries in the order they were supplied.
    pub filter: Vec<(FilterKey, Value)>,
    /// Wire values (`age.desc`), highest priority first.
    pub order_by: Vec<String>,
}

pub fn translate(collection: &str, args: &ListArgs) -> Result<CollectionQuery, TranslateError> {
    let query = args
        .filter
        .iter()
        .fold(CollectionQuery::new(collection), |query, (key, value)| {
            query.filter(key.path.clone(), key.op, value.clone())
        });

    args.order_by.iter().try_fold(query, |query, value| {
        let key = OrderKey::decode(value)?;
        Ok(query.order_by(key.path, key.direction))
    })
}

pub async fn list(
    store: &dyn DocumentStore,
    collection: &str,
    args: &ListArgs,
) -> Result<Vec<Document>, TranslateError> {
    let query = translate(collection, args)?;
    tracing::debug!(
        collection,
        predicates = query.predicates.len(),
        sort_keys = query.sort_keys.len(),
        "running list query"
    );

    let snapshots = store.query(&query).await?;
    Ok(snapshots.into_iter().map(|s| s.into_document()).collect())
}

pub async fn get(store: &dyn DocumentStore, collection: &str, id: &str) -> Result<Document, TranslateError> {
    store
        .get(collection, id)
        .await?
        .map(|s| s.into_document())
        .ok_or_else(|| TranslateError::NotFound { id: id.to_string() })
}
