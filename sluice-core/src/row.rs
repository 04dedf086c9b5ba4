use serde_json::Value;
use std::sync::Arc;

/// Shared reference-counted column name list, one allocation per result set.
pub type RowNames = Arc<[String]>;

/// A result row with its corresponding column labels. Values are kept in the
/// driver-independent JSON representation, they exist to be measured,
/// bounded and printed rather than decoded into domain types.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub labels: RowNames,
    pub values: Box<[Value]>,
}

impl Row {
    pub fn new(labels: RowNames, values: Box<[Value]>) -> Self {
        Self { labels, values }
    }

    pub fn names(&self) -> &[String] {
        &self.labels
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn get_column(&self, name: &str) -> Option<&Value> {
        self.labels
            .iter()
            .position(|v| v == name)
            .map(|i| &self.values[i])
    }

    /// Deterministic serialization used for size accounting: a JSON object
    /// rendered in column order, independent of any map ordering.
    pub fn serialized(&self) -> String {
        let mut out = String::from("{");
        for (i, (label, value)) in self.labels.iter().zip(self.values.iter()).enumerate() {
            if i > 0 {
                out.push(',');
            }
            out.push_str(&Value::from(label.as_str()).to_string());
            out.push(':');
            out.push_str(&value.to_string());
        }
        out.push('}');
        out
    }
}
