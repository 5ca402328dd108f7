//! Shapes caller conditions into store requests.
//!
//! # Invariants
//! - At most one `in` condition per request.
//! - An `in` condition fans out into chunks of `MAX_IN_VALUES` values, each
//!   carrying the remaining conditions and the limit.
//! - `order_by` cannot be combined with `in`.
//! - Without an `in` condition, distinct operators may only be mixed when
//!   all are in the mixable set.

use super::{
    Condition, Operator, OrderBy, QueryError, QueryResult, StructuredQuery, MAX_IN_CHUNKS,
    MAX_IN_VALUES,
};
use crate::model::document::Document;
use crate::schema::validate::validate_field_path;
use crate::store::{DocumentStore, StoreResult};
use serde_json::Value;

/// Store requests derived from one caller query.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryPlan {
    Single(StructuredQuery),
    /// One request per `in` chunk; results are concatenated in chunk order.
    FanOut {
        queries: Vec<StructuredQuery>,
        limit: Option<usize>,
    },
}

impl QueryPlan {
    pub fn queries(&self) -> &[StructuredQuery] {
        match self {
            Self::Single(query) => std::slice::from_ref(query),
            Self::FanOut { queries, .. } => queries,
        }
    }

    /// Overall result cap across all requests.
    pub fn limit(&self) -> Option<usize> {
        match self {
            Self::Single(query) => query.limit,
            Self::FanOut { limit, .. } => *limit,
        }
    }
}

/// Validates conditions and builds the store requests for them.
///
/// `limit` of `Some(0)` is treated as no limit.
pub fn plan_query(
    conditions: Vec<Condition>,
    limit: Option<usize>,
    order_by: &[OrderBy],
) -> QueryResult<QueryPlan> {
    let limit = limit.filter(|value| *value > 0);

    for condition in &conditions {
        validate_field_path(&condition.field)?;
        if condition.op.takes_array() && !condition.value.is_array() {
            return Err(QueryError::ExpectedArray {
                field: condition.field.clone(),
                op: condition.op,
            });
        }
    }
    for order in order_by {
        validate_field_path(&order.field)?;
    }

    let in_count = conditions
        .iter()
        .filter(|condition| condition.op == Operator::In)
        .count();
    if in_count > 1 {
        return Err(QueryError::MultipleIn);
    }

    if in_count == 0 {
        check_mixable(&conditions)?;
        return Ok(QueryPlan::Single(StructuredQuery {
            filters: conditions,
            order_by: order_by.to_vec(),
            limit,
        }));
    }

    if !order_by.is_empty() {
        return Err(QueryError::OrderByWithIn);
    }

    let (in_conditions, rest): (Vec<Condition>, Vec<Condition>) = conditions
        .into_iter()
        .partition(|condition| condition.op == Operator::In);
    let Some(in_condition) = in_conditions.into_iter().next() else {
        return Err(QueryError::MultipleIn);
    };
    let values = match in_condition.value {
        Value::Array(values) => values,
        _ => {
            return Err(QueryError::ExpectedArray {
                field: in_condition.field,
                op: Operator::In,
            })
        }
    };

    let max_values = MAX_IN_VALUES * MAX_IN_CHUNKS;
    if values.len() > max_values {
        return Err(QueryError::TooManyInValues {
            values: values.len(),
            max: max_values,
        });
    }

    let queries = values
        .chunks(MAX_IN_VALUES)
        .map(|chunk| {
            let mut filters = Vec::with_capacity(rest.len() + 1);
            filters.push(Condition::new(
                in_condition.field.clone(),
                Operator::In,
                Value::Array(chunk.to_vec()),
            ));
            filters.extend(rest.iter().cloned());
            StructuredQuery {
                filters,
                order_by: Vec::new(),
                limit,
            }
        })
        .collect();

    Ok(QueryPlan::FanOut { queries, limit })
}

/// Runs every request of `plan` against `store` and caps the concatenated
/// result at the plan limit.
pub fn run_plan<St: DocumentStore + ?Sized>(
    store: &St,
    collection: &str,
    plan: &QueryPlan,
) -> StoreResult<Vec<Document>> {
    let mut documents = Vec::new();
    for query in plan.queries() {
        documents.extend(store.run_query(collection, query)?);
    }
    if let Some(limit) = plan.limit() {
        documents.truncate(limit);
    }
    Ok(documents)
}

/// Distinct operators may only be combined when all of them are mixable.
fn check_mixable(conditions: &[Condition]) -> QueryResult<()> {
    let mut distinct_ops: Vec<Operator> = Vec::new();
    for condition in conditions {
        if !distinct_ops.contains(&condition.op) {
            distinct_ops.push(condition.op);
        }
    }
    if distinct_ops.len() > 1 && distinct_ops.iter().any(|op| !op.is_mixable()) {
        return Err(QueryError::UnmixableOperators(distinct_ops));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{plan_query, run_plan, QueryPlan};
    use crate::model::document::DocumentId;
    use crate::query::{Condition, Operator, OrderBy, QueryError};
    use crate::store::{DocumentStore, MemoryDocumentStore, SetMode};
    use serde_json::{json, Value};

    fn in_values(count: usize) -> Value {
        Value::Array((0..count).map(|i| json!(i)).collect())
    }

    #[test]
    fn equality_query_is_single_request() {
        let plan = plan_query(
            vec![Condition::eq("email", "john@doe.com")],
            Some(5),
            &[OrderBy::desc("created_at")],
        )
        .unwrap();
        match plan {
            QueryPlan::Single(query) => {
                assert_eq!(query.filters.len(), 1);
                assert_eq!(query.order_by, vec![OrderBy::desc("created_at")]);
                assert_eq!(query.limit, Some(5));
            }
            other => panic!("unexpected plan: {other:?}"),
        }
    }

    #[test]
    fn zero_limit_means_unbounded() {
        let plan = plan_query(Vec::new(), Some(0), &[]).unwrap();
        assert_eq!(plan.limit(), None);
    }

    #[test]
    fn in_condition_splits_into_chunks_of_ten() {
        let plan = plan_query(
            vec![
                Condition::new("age", Operator::In, in_values(25)),
                Condition::eq("active", true),
            ],
            Some(3),
            &[],
        )
        .unwrap();

        let queries = plan.queries();
        assert_eq!(queries.len(), 3);
        assert_eq!(queries[0].filters[0].value.as_array().unwrap().len(), 10);
        assert_eq!(queries[2].filters[0].value.as_array().unwrap().len(), 5);
        for query in queries {
            assert_eq!(query.filters.len(), 2);
            assert_eq!(query.filters[1], Condition::eq("active", true));
            assert_eq!(query.limit, Some(3));
        }
        assert_eq!(plan.limit(), Some(3));
    }

    #[test]
    fn empty_in_list_plans_no_requests() {
        let plan = plan_query(
            vec![Condition::new("age", Operator::In, json!([]))],
            None,
            &[],
        )
        .unwrap();
        assert!(plan.queries().is_empty());
    }

    #[test]
    fn more_than_hundred_in_values_is_rejected() {
        let err = plan_query(
            vec![Condition::new("age", Operator::In, in_values(101))],
            None,
            &[],
        )
        .unwrap_err();
        assert_eq!(
            err,
            QueryError::TooManyInValues {
                values: 101,
                max: 100
            }
        );

        assert!(plan_query(
            vec![Condition::new("age", Operator::In, in_values(100))],
            None,
            &[]
        )
        .is_ok());
    }

    #[test]
    fn two_in_conditions_are_rejected() {
        let err = plan_query(
            vec![
                Condition::new("a", Operator::In, json!([1])),
                Condition::new("b", Operator::In, json!([2])),
            ],
            None,
            &[],
        )
        .unwrap_err();
        assert_eq!(err, QueryError::MultipleIn);
    }

    #[test]
    fn order_by_with_in_is_rejected() {
        let err = plan_query(
            vec![Condition::new("a", Operator::In, json!([1]))],
            None,
            &[OrderBy::asc("a")],
        )
        .unwrap_err();
        assert_eq!(err, QueryError::OrderByWithIn);
    }

    #[test]
    fn unmixable_operators_are_rejected() {
        let err = plan_query(
            vec![
                Condition::eq("a", 1),
                Condition::new("tags", Operator::ArrayContains, "x"),
            ],
            None,
            &[],
        )
        .unwrap_err();
        assert!(matches!(err, QueryError::UnmixableOperators(_)));

        assert!(plan_query(
            vec![
                Condition::new("age", Operator::GreaterThanOrEqual, 18),
                Condition::new("age", Operator::LessThan, 65),
                Condition::eq("active", true),
            ],
            None,
            &[],
        )
        .is_ok());
    }

    #[test]
    fn repeated_unmixable_operator_alone_is_fine() {
        assert!(plan_query(
            vec![
                Condition::new("a", Operator::NotEqual, 1),
                Condition::new("a", Operator::NotEqual, 2),
            ],
            None,
            &[],
        )
        .is_ok());
    }

    #[test]
    fn array_operators_require_array_operand() {
        let err = plan_query(
            vec![Condition::new("a", Operator::NotIn, 3)],
            None,
            &[],
        )
        .unwrap_err();
        assert!(matches!(err, QueryError::ExpectedArray { .. }));
    }

    #[test]
    fn in_combines_with_any_other_operator() {
        let plan = plan_query(
            vec![
                Condition::new("age", Operator::In, json!([1, 2])),
                Condition::new("tags", Operator::ArrayContains, "x"),
            ],
            None,
            &[],
        )
        .unwrap();
        assert!(matches!(plan, QueryPlan::FanOut { .. }));
        assert_eq!(plan.queries()[0].filters.len(), 2);
    }

    #[test]
    fn run_plan_concatenates_chunks_and_applies_limit() {
        let store = MemoryDocumentStore::new();
        for age in 0..15 {
            let id = DocumentId::parse(format!("u{age:02}")).unwrap();
            let fields = json!({"age": age}).as_object().unwrap().clone();
            store
                .set_document("users", &id, fields, SetMode::Overwrite)
                .unwrap();
        }

        let plan = plan_query(
            vec![Condition::new("age", Operator::In, in_values(15))],
            Some(12),
            &[],
        )
        .unwrap();
        assert_eq!(plan.queries().len(), 2);

        let documents = run_plan(&store, "users", &plan).unwrap();
        assert_eq!(documents.len(), 12);
        assert_eq!(documents[0].id.as_str(), "u00");
        assert_eq!(documents[11].id.as_str(), "u11");
    }

    #[test]
    fn empty_field_segments_are_rejected() {
        let err = plan_query(vec![Condition::eq("a..b", 1)], None, &[]).unwrap_err();
        assert!(matches!(err, QueryError::InvalidFieldPath(_)));
    }
}
