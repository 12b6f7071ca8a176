use std::cmp::Ordering;

use serde_json::Value;

use crate::store::Document;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldFilter {
    Eq { field: String, value: Value },
}

impl FieldFilter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Eq {
            field: field.into(),
            value: value.into(),
        }
    }

    fn matches(&self, doc: &Document) -> bool {
        match self {
            Self::Eq { field, value } => doc.get(field).is_some_and(|v| values_equal(v, value)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

/// Range query over the direct children of a collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filter: Option<FieldFilter>,
    pub order_by: Option<OrderBy>,
}

impl Query {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: FieldFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order_by = Some(OrderBy {
            field: field.into(),
            direction,
        });
        self
    }

    /// Evaluate against `(document id, document)` pairs.  Results are in
    /// document-id order unless an `order_by` is given; documents missing the
    /// ordering field are left out, the same as a hosted document store does.
    pub fn apply(&self, mut docs: Vec<(String, Document)>) -> Vec<Document> {
        docs.sort_by(|a, b| a.0.cmp(&b.0));
        let mut docs: Vec<Document> = docs
            .into_iter()
            .map(|(_, doc)| doc)
            .filter(|doc| self.filter.as_ref().is_none_or(|f| f.matches(doc)))
            .collect();

        if let Some(order) = &self.order_by {
            docs.retain(|doc| doc.get(&order.field).is_some());
            docs.sort_by(|a, b| {
                let ord = compare_values(&a[&order.field], &b[&order.field]);
                match order.direction {
                    Direction::Ascending => ord,
                    Direction::Descending => ord.reverse(),
                }
            });
        }
        docs
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => x
                .as_f64()
                .partial_cmp(&y.as_f64())
                .unwrap_or(Ordering::Equal),
        },
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => Ordering::Equal,
    }
}
