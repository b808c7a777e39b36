//! Caller-facing argument types of the CRUD engine.

use crate::analyzer::AnalysisResult;
use crate::error::DataError;
use crate::session::Values;
use serde::Serialize;
use serde_json::Value;

/// How a caller names one record.
#[derive(Debug, Clone, PartialEq)]
pub enum Identity {
    /// A single key value. Only valid for single-column primary keys.
    Positional(Value),
    /// Column/value pairs naming exactly the primary-key columns.
    Keyed(Values),
}

impl Identity {
    /// Resolve to `(column, value)` pairs in primary-key declaration order.
    pub fn resolve(&self, analysis: &AnalysisResult) -> Result<Vec<(&'static str, Value)>, DataError> {
        let keys = analysis.primary_key_names();
        match self {
            Identity::Positional(value) => {
                if keys.len() != 1 {
                    return Err(DataError::Argument(format!(
                        "{} has a composite primary key ({}); identify records by name",
                        analysis.entity.name,
                        keys.join(", ")
                    )));
                }
                Ok(vec![(keys[0], value.clone())])
            }
            Identity::Keyed(values) => {
                if values.len() != keys.len() || !keys.iter().all(|k| values.contains_key(*k)) {
                    let given: Vec<&str> = values.keys().map(String::as_str).collect();
                    return Err(DataError::Argument(format!(
                        "{} is identified by ({}), got ({})",
                        analysis.entity.name,
                        keys.join(", "),
                        given.join(", ")
                    )));
                }
                Ok(keys
                    .into_iter()
                    .map(|k| (k, values.get(k).cloned().unwrap_or(Value::Null)))
                    .collect())
            }
        }
    }
}

impl From<Value> for Identity {
    fn from(value: Value) -> Self {
        Identity::Positional(value)
    }
}

impl From<Values> for Identity {
    fn from(values: Values) -> Self {
        Identity::Keyed(values)
    }
}

macro_rules! positional_from {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Identity {
                fn from(value: $ty) -> Self {
                    Identity::Positional(Value::from(value))
                }
            }
        )*
    };
}

positional_from!(i32, i64, u32, u64, String, &str);

impl<K: Into<String>, V: Into<Value>, const N: usize> From<[(K, V); N]> for Identity {
    fn from(pairs: [(K, V); N]) -> Self {
        Identity::Keyed(pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Values for `create`, `update` and `upsert`: either a serializable
/// object or individual fields, never both.
#[derive(Debug, Clone, Default)]
pub struct Args {
    object: Option<Values>,
    fields: Values,
}

impl Args {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take values from a serializable payload object.
    pub fn object<T: Serialize>(payload: &T) -> Result<Self, DataError> {
        match serde_json::to_value(payload)? {
            Value::Object(map) => Ok(Self {
                object: Some(map),
                fields: Values::new(),
            }),
            other => Err(DataError::Argument(format!(
                "payload must serialize to an object, got {other}"
            ))),
        }
    }

    pub fn set(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(column.to_string(), value.into());
        self
    }

    /// Combine an object payload with individual fields. Resolving the result
    /// fails when both carry values.
    pub fn with_object(mut self, object: Values) -> Self {
        self.object = Some(object);
        self
    }

    /// The single value source, with relationship keys dropped and unknown
    /// keys rejected.
    pub(crate) fn resolve(self, analysis: &AnalysisResult) -> Result<Values, DataError> {
        let raw = match (self.object, self.fields.is_empty()) {
            (Some(_), false) => {
                return Err(DataError::Argument(
                    "pass either an object or individual fields, not both".to_string(),
                ))
            }
            (Some(object), true) => object,
            (None, _) => self.fields,
        };
        let entity = analysis.entity;
        let mut values = Values::new();
        for (key, value) in raw {
            if entity.column(&key).is_some() {
                values.insert(key, value);
            } else if entity.relationship(&key).is_none() {
                return Err(DataError::Argument(format!(
                    "{} has no column named {key}",
                    entity.name
                )));
            }
        }
        Ok(values)
    }
}

impl From<Values> for Args {
    fn from(fields: Values) -> Self {
        Self {
            object: None,
            fields,
        }
    }
}
