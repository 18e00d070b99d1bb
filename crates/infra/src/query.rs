use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde_json::Value;
use thiserror::Error;

use crate::models::{Document, DocumentSnapshot, ID_FIELD};

/// Comparison operator of a `where` predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WhereOp {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl WhereOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            WhereOp::Eq => "==",
            WhereOp::Gt => ">",
            WhereOp::Gte => ">=",
            WhereOp::Lt => "<",
            WhereOp::Lte => "<=",
        }
    }

    /// SQL spelling of the operator.
    pub fn sql(&self) -> &'static str {
        match self {
            WhereOp::Eq => "=",
            other => other.symbol(),
        }
    }

    fn accepts(&self, ordering: Ordering) -> bool {
        match self {
            WhereOp::Eq => ordering == Ordering::Equal,
            WhereOp::Gt => ordering == Ordering::Greater,
            WhereOp::Gte => ordering != Ordering::Less,
            WhereOp::Lt => ordering == Ordering::Less,
            WhereOp::Lte => ordering != Ordering::Greater,
        }
    }
}

impl fmt::Display for WhereOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Asc => "asc",
            Direction::Desc => "desc",
        }
    }

    pub fn sql(&self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown sort direction `{0}`")]
pub struct UnknownDirection(pub String);

impl FromStr for Direction {
    type Err = UnknownDirection;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "asc" => Ok(Direction::Asc),
            "desc" => Ok(Direction::Desc),
            other => Err(UnknownDirection(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub path: String,
    pub op: WhereOp,
    pub value: Value,
}

impl Predicate {
    /// A missing attribute, or one of a different JSON kind, never matches.
    pub fn matches(&self, snapshot: &DocumentSnapshot) -> bool {
        field(snapshot, &self.path)
            .and_then(|actual| compare_values(&actual, &self.value))
            .is_some_and(|ordering| self.op.accepts(ordering))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub path: String,
    pub direction: Direction,
}

/// A composed list query against one collection.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionQuery {
    pub collection: String,
    pub predicates: Vec<Predicate>,
    pub sort_keys: Vec<SortKey>,
}

impl CollectionQuery {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            predicates: Vec::new(),
            sort_keys: Vec::new(),
        }
    }

    pub fn filter(mut self, path: impl Into<String>, op: WhereOp, value: Value) -> Self {
        self.predicates.push(Predicate {
            path: path.into(),
            op,
            value,
        });
        self
    }

    pub fn order_by(mut self, path: impl Into<String>, direction: Direction) -> Self {
        self.sort_keys.push(SortKey {
            path: path.into(),
            direction,
        });
        self
    }

    /// Whether a document belongs to the result set. Ordering on a path
    /// excludes documents that lack it.
    pub fn matches(&self, snapshot: &DocumentSnapshot) -> bool {
        self.predicates.iter().all(|p| p.matches(snapshot))
            && self
                .sort_keys
                .iter()
                .all(|key| field(snapshot, &key.path).is_some())
    }

    /// Stable multi-key sort; document id ascending breaks remaining ties.
    pub fn sort(&self, snapshots: &mut [DocumentSnapshot]) {
        snapshots.sort_by(|a, b| {
            for key in &self.sort_keys {
                let ordering = sort_order(field(a, &key.path).as_deref(), field(b, &key.path).as_deref());
                let ordering = match key.direction {
                    Direction::Asc => ordering,
                    Direction::Desc => ordering.reverse(),
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            a.id.cmp(&b.id)
        });
    }

    /// Filter then sort a candidate set.
    pub fn apply(&self, snapshots: impl IntoIterator<Item = DocumentSnapshot>) -> Vec<DocumentSnapshot> {
        let mut out: Vec<DocumentSnapshot> = snapshots
            .into_iter()
            .filter(|s| self.matches(s))
            .collect();
        self.sort(&mut out);
        out
    }
}

/// Value at `path` of a snapshot. The `id` path names the document
/// identifier rather than a stored attribute.
fn field<'a>(snapshot: &'a DocumentSnapshot, path: &str) -> Option<Cow<'a, Value>> {
    if path == ID_FIELD {
        return Some(Cow::Owned(Value::String(snapshot.id.clone())));
    }
    lookup(&snapshot.data, path).map(Cow::Borrowed)
}

/// Resolve a dotted attribute path.
pub fn lookup<'a>(document: &'a Document, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = document.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Same-kind comparison; `None` when the values are not comparable.
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => Some(x.cmp(&y)),
            _ => x.as_f64()?.partial_cmp(&y.as_f64()?),
        },
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (x, y) if x == y => Some(Ordering::Equal),
        _ => None,
    }
}

fn kind_rank(value: Option<&Value>) -> u8 {
    match value {
        None => 0,
        Some(Value::Null) => 1,
        Some(Value::Bool(_)) => 2,
        Some(Value::Number(_)) => 3,
        Some(Value::String(_)) => 4,
        Some(Value::Array(_)) => 5,
        Some(Value::Object(_)) => 6,
    }
}

fn sort_order(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    kind_rank(a).cmp(&kind_rank(b)).then_with(|| match (a, b) {
        (Some(a), Some(b)) => compare_values(a, b).unwrap_or(Ordering::Equal),
        _ => Ordering::Equal,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn snapshot(id: &str, data: Value) -> DocumentSnapshot {
        DocumentSnapshot::new(id, data.as_object().cloned().unwrap())
    }

    #[test]
    fn predicates_compare_within_one_kind() {
        let doc = &snapshot("u1", json!({ "age": 30, "name": "Ada" }));

        let gt = Predicate { path: "age".into(), op: WhereOp::Gt, value: json!(29) };
        let lte = Predicate { path: "age".into(), op: WhereOp::Lte, value: json!(30.0) };
        let mixed = Predicate { path: "age".into(), op: WhereOp::Gt, value: json!("29") };
        let missing = Predicate { path: "email".into(), op: WhereOp::Eq, value: json!(null) };

        assert!(gt.matches(doc));
        assert!(lte.matches(doc));
        assert!(!mixed.matches(doc));
        assert!(!missing.matches(doc));
    }

    #[test]
    fn nested_paths_resolve_through_objects() {
        let doc = json!({ "address": { "city": "Ghent" } });
        let doc = doc.as_object().unwrap();

        assert_eq!(lookup(doc, "address.city"), Some(&json!("Ghent")));
        assert_eq!(lookup(doc, "address.zip"), None);
    }

    #[test]
    fn sort_keys_apply_in_priority_order() {
        let query = CollectionQuery::new("users")
            .order_by("team", Direction::Asc)
            .order_by("age", Direction::Desc);

        let out = query.apply(vec![
            snapshot("a", json!({ "team": "red", "age": 20 })),
            snapshot("b", json!({ "team": "blue", "age": 20 })),
            snapshot("c", json!({ "team": "red", "age": 40 })),
            snapshot("d", json!({ "age": 99 })),
        ]);

        let ids: Vec<&str> = out.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
    }

    #[test]
    fn mixed_kinds_sort_by_kind_before_value() {
        let query = CollectionQuery::new("things").order_by("v", Direction::Asc);

        let out = query.apply(vec![
            snapshot("s", json!({ "v": "a" })),
            snapshot("n", json!({ "v": 10 })),
            snapshot("b", json!({ "v": true })),
            snapshot("z", json!({ "v": null })),
        ]);

        let ids: Vec<&str> = out.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["z", "b", "n", "s"]);
    }

    #[test]
    fn ties_fall_back_to_document_id() {
        let query = CollectionQuery::new("users").order_by("age", Direction::Asc);

        let out = query.apply(vec![
            snapshot("b", json!({ "age": 1 })),
            snapshot("a", json!({ "age": 1 })),
        ]);

        assert_eq!(out[0].id, "a");
        assert_eq!(out[1].id, "b");
    }

    #[test]
    fn id_path_refers_to_the_document_identifier() {
        let query = CollectionQuery::new("users")
            .filter("id", WhereOp::Gte, json!("b"))
            .order_by("id", Direction::Desc);

        let out = query.apply(vec![
            snapshot("a", json!({})),
            snapshot("c", json!({ "id": "stale" })),
            snapshot("b", json!({})),
        ]);

        let ids: Vec<&str> = out.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "b"]);
    }

    #[test]
    fn directions_parse_from_wire_spelling() {
        assert_eq!("asc".parse::<Direction>(), Ok(Direction::Asc));
        assert_eq!("desc".parse::<Direction>(), Ok(Direction::Desc));
        assert!("DESC".parse::<Direction>().is_err());
    }
}
