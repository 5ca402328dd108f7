//! In-process evaluation of `StructuredQuery` over raw documents.
//!
//! Mirrors the hosted store's documented semantics closely enough for
//! local and test stores:
//! - value ordering is null < bool < number < string < array < map;
//! - range filters only match values of the operand's type class;
//! - `!=` and `not-in` never match missing or null fields;
//! - documents missing an `order_by` field are excluded;
//! - ties and unordered results fall back to document id order.

use super::{Condition, Direction, Operator, StructuredQuery};
use crate::model::document::Document;
use serde_json::Value;
use std::cmp::Ordering;

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

fn compare_numbers(left: &serde_json::Number, right: &serde_json::Number) -> Ordering {
    if let (Some(a), Some(b)) = (left.as_i64(), right.as_i64()) {
        return a.cmp(&b);
    }
    if let (Some(a), Some(b)) = (left.as_u64(), right.as_u64()) {
        return a.cmp(&b);
    }
    let a = left.as_f64().unwrap_or(f64::NAN);
    let b = right.as_f64().unwrap_or(f64::NAN);
    // NaN sorts before every other number.
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}

/// Total order over JSON values following the store's type ordering.
pub fn compare_values(left: &Value, right: &Value) -> Ordering {
    let rank = type_rank(left).cmp(&type_rank(right));
    if rank != Ordering::Equal {
        return rank;
    }

    match (left, right) {
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (Value::Number(a), Value::Number(b)) => compare_numbers(a, b),
        (Value::String(a), Value::String(b)) => a.cmp(b),
        (Value::Array(a), Value::Array(b)) => {
            for (x, y) in a.iter().zip(b.iter()) {
                let ordering = compare_values(x, y);
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            a.len().cmp(&b.len())
        }
        (Value::Object(a), Value::Object(b)) => {
            let mut left_keys: Vec<&String> = a.keys().collect();
            let mut right_keys: Vec<&String> = b.keys().collect();
            left_keys.sort();
            right_keys.sort();
            for (x, y) in left_keys.iter().zip(right_keys.iter()) {
                let ordering = x
                    .cmp(y)
                    .then_with(|| compare_values(&a[x.as_str()], &b[y.as_str()]));
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            left_keys.len().cmp(&right_keys.len())
        }
        _ => Ordering::Equal,
    }
}

pub fn values_equal(left: &Value, right: &Value) -> bool {
    compare_values(left, right) == Ordering::Equal
}

fn range_matches(field: &Value, operand: &Value, accept: fn(Ordering) -> bool) -> bool {
    if field.is_null() || type_rank(field) != type_rank(operand) {
        return false;
    }
    accept(compare_values(field, operand))
}

fn contains(candidates: &Value, value: &Value) -> bool {
    candidates
        .as_array()
        .is_some_and(|items| items.iter().any(|item| values_equal(item, value)))
}

/// Whether `document` satisfies one filter.
pub fn matches_condition(document: &Document, condition: &Condition) -> bool {
    let Some(field) = document.field(&condition.field) else {
        return false;
    };
    let operand = &condition.value;

    match condition.op {
        Operator::Equal => values_equal(field, operand),
        Operator::NotEqual => !field.is_null() && !values_equal(field, operand),
        Operator::LessThan => range_matches(field, operand, Ordering::is_lt),
        Operator::LessThanOrEqual => range_matches(field, operand, Ordering::is_le),
        Operator::GreaterThan => range_matches(field, operand, Ordering::is_gt),
        Operator::GreaterThanOrEqual => range_matches(field, operand, Ordering::is_ge),
        Operator::In => contains(operand, field),
        Operator::NotIn => !field.is_null() && operand.is_array() && !contains(operand, field),
        Operator::ArrayContains => contains(field, operand),
        Operator::ArrayContainsAny => operand
            .as_array()
            .is_some_and(|wanted| wanted.iter().any(|value| contains(field, value))),
    }
}

pub fn matches_all(document: &Document, query: &StructuredQuery) -> bool {
    query
        .filters
        .iter()
        .all(|condition| matches_condition(document, condition))
}

/// Filters, orders and limits `documents` according to `query`.
pub fn apply_query(
    documents: impl IntoIterator<Item = Document>,
    query: &StructuredQuery,
) -> Vec<Document> {
    let mut selected: Vec<Document> = documents
        .into_iter()
        .filter(|document| matches_all(document, query))
        .filter(|document| {
            query
                .order_by
                .iter()
                .all(|order| document.field(&order.field).is_some())
        })
        .collect();

    selected.sort_by(|a, b| {
        for order in &query.order_by {
            let (Some(left), Some(right)) = (a.field(&order.field), b.field(&order.field)) else {
                continue;
            };
            let ordering = match order.direction {
                Direction::Ascending => compare_values(left, right),
                Direction::Descending => compare_values(right, left),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        a.id.cmp(&b.id)
    });

    if let Some(limit) = query.limit.filter(|limit| *limit > 0) {
        selected.truncate(limit);
    }
    selected
}

#[cfg(test)]
mod tests {
    use super::{apply_query, compare_values, matches_condition};
    use crate::model::document::{Document, DocumentId};
    use crate::query::{Condition, Operator, OrderBy, StructuredQuery};
    use serde_json::{json, Value};
    use std::cmp::Ordering;

    fn doc(id: &str, fields: Value) -> Document {
        Document::new(
            DocumentId::parse(id).unwrap(),
            fields.as_object().cloned().unwrap_or_default(),
        )
    }

    fn ids(docs: &[Document]) -> Vec<&str> {
        docs.iter().map(|d| d.id.as_str()).collect()
    }

    #[test]
    fn type_ordering_and_numeric_comparison() {
        assert_eq!(compare_values(&json!(null), &json!(false)), Ordering::Less);
        assert_eq!(compare_values(&json!(true), &json!(0)), Ordering::Less);
        assert_eq!(compare_values(&json!(99), &json!("a")), Ordering::Less);
        assert_eq!(compare_values(&json!(1), &json!(1.0)), Ordering::Equal);
        assert_eq!(compare_values(&json!(1.5), &json!(2)), Ordering::Less);
        assert_eq!(compare_values(&json!([1, 2]), &json!([1, 2, 0])), Ordering::Less);
    }

    #[test]
    fn range_filters_ignore_other_types() {
        let numeric = doc("a", json!({"age": 30}));
        let text = doc("b", json!({"age": "30"}));
        let cond = Condition::new("age", Operator::GreaterThan, 18);
        assert!(matches_condition(&numeric, &cond));
        assert!(!matches_condition(&text, &cond));
    }

    #[test]
    fn not_equal_skips_missing_and_null() {
        let cond = Condition::new("name", Operator::NotEqual, "x");
        assert!(matches_condition(&doc("a", json!({"name": "y"})), &cond));
        assert!(!matches_condition(&doc("b", json!({"name": null})), &cond));
        assert!(!matches_condition(&doc("c", json!({})), &cond));
    }

    #[test]
    fn array_operators() {
        let tagged = doc("a", json!({"tags": ["red", "blue"]}));
        assert!(matches_condition(
            &tagged,
            &Condition::new("tags", Operator::ArrayContains, "red")
        ));
        assert!(matches_condition(
            &tagged,
            &Condition::new("tags", Operator::ArrayContainsAny, json!(["green", "blue"]))
        ));
        assert!(!matches_condition(
            &tagged,
            &Condition::new("tags", Operator::ArrayContainsAny, json!(["green"]))
        ));
        assert!(matches_condition(
            &doc("b", json!({"color": "red"})),
            &Condition::new("color", Operator::In, json!(["red", "blue"]))
        ));
        assert!(matches_condition(
            &doc("b", json!({"color": "red"})),
            &Condition::new("color", Operator::NotIn, json!(["blue"]))
        ));
    }

    #[test]
    fn ordering_excludes_missing_fields_and_breaks_ties_by_id() {
        let docs = vec![
            doc("d", json!({"score": 2})),
            doc("c", json!({"score": 1})),
            doc("b", json!({})),
            doc("a", json!({"score": 2})),
        ];
        let query = StructuredQuery::all().order_by(OrderBy::desc("score"));
        let result = apply_query(docs, &query);
        assert_eq!(ids(&result), vec!["a", "d", "c"]);
    }

    #[test]
    fn unordered_results_follow_id_order_and_limit() {
        let docs = vec![
            doc("c", json!({"v": 1})),
            doc("a", json!({"v": 1})),
            doc("b", json!({"v": 2})),
        ];
        let query = StructuredQuery::all()
            .filter(Condition::eq("v", 1))
            .limit(1);
        assert_eq!(ids(&apply_query(docs, &query)), vec!["a"]);
    }
}
