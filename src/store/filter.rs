use serde_json::Value;

/// Comparison operators supported by the record store interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Ne,
    In,
}

#[derive(Debug, Clone)]
pub struct Condition {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

/// Conjunctive filter predicate for list/count queries.
///
/// Handlers build these from the request context; the tenant-scope condition
/// is always appended server-side, never taken from the query string.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    pub conditions: Vec<Condition>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push(Condition {
            field: field.into(),
            op: FilterOp::Eq,
            value: value.into(),
        });
        self
    }

    pub fn ne(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push(Condition {
            field: field.into(),
            op: FilterOp::Ne,
            value: value.into(),
        });
        self
    }

    pub fn is_in(mut self, field: impl Into<String>, values: Vec<Value>) -> Self {
        self.conditions.push(Condition {
            field: field.into(),
            op: FilterOp::In,
            value: Value::Array(values),
        });
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Evaluate the predicate against a record (in-memory store path).
    pub fn matches(&self, record: &serde_json::Map<String, Value>) -> bool {
        self.conditions.iter().all(|cond| {
            let actual = record.get(&cond.field).unwrap_or(&Value::Null);
            match cond.op {
                FilterOp::Eq => values_equal(actual, &cond.value),
                FilterOp::Ne => !values_equal(actual, &cond.value),
                FilterOp::In => cond
                    .value
                    .as_array()
                    .map(|candidates| candidates.iter().any(|c| values_equal(actual, c)))
                    .unwrap_or(false),
            }
        })
    }
}

/// Loose equality: UUIDs and other identifiers may arrive as strings on one
/// side and typed values on the other.
fn values_equal(a: &Value, b: &Value) -> bool {
    if a == b {
        return true;
    }
    match (a, b) {
        (Value::String(s), other) | (other, Value::String(s)) => match other {
            Value::Number(n) => s == &n.to_string(),
            Value::Bool(v) => s == &v.to_string(),
            _ => false,
        },
        _ => false,
    }
}
