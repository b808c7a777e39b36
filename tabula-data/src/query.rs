//! SQL rendering primitives shared by every statement kind: dialects,
//! identifier policy, WHERE conditions and the parameter-collecting renderer.

use crate::error::DataError;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// Generic SQL using `?` placeholders (default).
    #[default]
    Generic,
    /// SQLite-style `?` placeholders.
    Sqlite,
    /// Postgres-style `$1, $2, ...` placeholders.
    Postgres,
}

impl Dialect {
    fn placeholder(self, index: usize) -> String {
        match self {
            Dialect::Postgres => format!("${index}"),
            Dialect::Generic | Dialect::Sqlite => "?".to_string(),
        }
    }

    fn quote_char(self) -> char {
        '"'
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentifierPolicy {
    /// Do not validate or quote identifiers.
    Raw,
    /// Validate identifiers against a conservative pattern.
    #[default]
    Validate,
    /// Validate and quote identifiers using the dialect quoting style.
    Quote,
}

impl IdentifierPolicy {
    /// The policy used when a template is verified before caching: never
    /// weaker than `Validate`.
    pub(crate) fn strict(self) -> Self {
        match self {
            IdentifierPolicy::Raw => IdentifierPolicy::Validate,
            other => other,
        }
    }
}

/// One WHERE predicate. Predicates are joined with `AND`.
#[derive(Debug, Clone)]
pub enum Condition {
    Eq(String, Value),
    NotEq(String, Value),
    Like(String, String),
    Gt(String, Value),
    Lt(String, Value),
    In(String, Vec<Value>),
    IsNull(String),
    IsNotNull(String),
}

/// Fluent WHERE refinement, shared by select, update and delete statements.
///
/// Unqualified column names are qualified with the statement's table.
pub trait Filter: Sized {
    #[doc(hidden)]
    fn push_condition(&mut self, condition: Condition);

    fn where_eq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.push_condition(Condition::Eq(column.to_string(), value.into()));
        self
    }

    fn where_not_eq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.push_condition(Condition::NotEq(column.to_string(), value.into()));
        self
    }

    fn where_like(mut self, column: &str, pattern: &str) -> Self {
        self.push_condition(Condition::Like(column.to_string(), pattern.to_string()));
        self
    }

    fn where_gt(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.push_condition(Condition::Gt(column.to_string(), value.into()));
        self
    }

    fn where_lt(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.push_condition(Condition::Lt(column.to_string(), value.into()));
        self
    }

    fn where_in<V: Into<Value>>(mut self, column: &str, values: impl IntoIterator<Item = V>) -> Self {
        self.push_condition(Condition::In(
            column.to_string(),
            values.into_iter().map(Into::into).collect(),
        ));
        self
    }

    fn where_null(mut self, column: &str) -> Self {
        self.push_condition(Condition::IsNull(column.to_string()));
        self
    }

    fn where_not_null(mut self, column: &str) -> Self {
        self.push_condition(Condition::IsNotNull(column.to_string()));
        self
    }
}

/// Accumulates SQL text and bind parameters for one statement.
pub(crate) struct Renderer {
    dialect: Dialect,
    policy: IdentifierPolicy,
    sql: String,
    params: Vec<Value>,
}

impl Renderer {
    pub(crate) fn new(dialect: Dialect, policy: IdentifierPolicy) -> Self {
        Self {
            dialect,
            policy,
            sql: String::new(),
            params: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, fragment: &str) {
        self.sql.push_str(fragment);
    }

    /// Format a single identifier (table, column or alias name).
    pub(crate) fn ident(&self, ident: &str, kind: &'static str) -> Result<String, DataError> {
        self.format_identifier(ident, false, kind)
    }

    /// Format `table.column`, or a caller-supplied column that is already qualified.
    pub(crate) fn qualified(&self, table: &str, column: &str) -> Result<String, DataError> {
        if column.contains('.') {
            self.format_identifier(column, false, "column")
        } else {
            self.format_identifier(&format!("{table}.{column}"), false, "column")
        }
    }

    /// Result-column alias. Always quoted, since relationship aliases contain a dot.
    pub(crate) fn alias(&self, alias: &str) -> String {
        let quote = self.dialect.quote_char();
        format!("{quote}{alias}{quote}")
    }

    /// Bind a value and return the SQL fragment standing for it.
    ///
    /// `NULL` is inlined: typed backends cannot infer a parameter type from a
    /// bare null.
    pub(crate) fn bind(&mut self, value: Value) -> String {
        if value.is_null() {
            return "NULL".to_string();
        }
        self.params.push(value);
        self.dialect.placeholder(self.params.len())
    }

    pub(crate) fn conditions(
        &mut self,
        table: &str,
        conditions: &[Condition],
    ) -> Result<(), DataError> {
        if conditions.is_empty() {
            return Ok(());
        }
        self.push(" WHERE ");
        let mut first = true;
        for cond in conditions {
            if !first {
                self.push(" AND ");
            }
            first = false;
            let fragment = match cond {
                Condition::Eq(col, Value::Null) | Condition::IsNull(col) => {
                    format!("{} IS NULL", self.qualified(table, col)?)
                }
                Condition::NotEq(col, Value::Null) | Condition::IsNotNull(col) => {
                    format!("{} IS NOT NULL", self.qualified(table, col)?)
                }
                Condition::Eq(col, val) => {
                    let col = self.qualified(table, col)?;
                    format!("{col} = {}", self.bind(val.clone()))
                }
                Condition::NotEq(col, val) => {
                    let col = self.qualified(table, col)?;
                    format!("{col} != {}", self.bind(val.clone()))
                }
                Condition::Like(col, pat) => {
                    let col = self.qualified(table, col)?;
                    format!("{col} LIKE {}", self.bind(Value::String(pat.clone())))
                }
                Condition::Gt(col, val) => {
                    let col = self.qualified(table, col)?;
                    format!("{col} > {}", self.bind(val.clone()))
                }
                Condition::Lt(col, val) => {
                    let col = self.qualified(table, col)?;
                    format!("{col} < {}", self.bind(val.clone()))
                }
                Condition::In(_, vals) if vals.is_empty() => "1 != 1".to_string(),
                Condition::In(col, vals) => {
                    let col = self.qualified(table, col)?;
                    let placeholders: Vec<_> = vals.iter().map(|v| self.bind(v.clone())).collect();
                    format!("{col} IN ({})", placeholders.join(", "))
                }
            };
            self.push(&fragment);
        }
        Ok(())
    }

    pub(crate) fn order(&mut self, table: &str, order: &[(String, bool)]) -> Result<(), DataError> {
        if order.is_empty() {
            return Ok(());
        }
        let mut clauses = Vec::with_capacity(order.len());
        for (col, asc) in order {
            let col = self.qualified(table, col)?;
            if *asc {
                clauses.push(format!("{col} ASC"));
            } else {
                clauses.push(format!("{col} DESC"));
            }
        }
        self.push(" ORDER BY ");
        self.push(&clauses.join(", "));
        Ok(())
    }

    pub(crate) fn limit_offset(&mut self, limit: Option<u64>, offset: Option<u64>) {
        match (limit, offset) {
            (Some(limit), _) => self.push(&format!(" LIMIT {limit}")),
            // SQLite only accepts OFFSET after a LIMIT; -1 means unbounded.
            (None, Some(_)) if self.dialect == Dialect::Sqlite => self.push(" LIMIT -1"),
            (None, _) => {}
        }
        if let Some(offset) = offset {
            self.push(&format!(" OFFSET {offset}"));
        }
    }

    /// Finish rendering, checking that every placeholder has a parameter.
    pub(crate) fn finish(self) -> Result<(String, Vec<Value>), DataError> {
        let placeholders = match self.dialect {
            Dialect::Postgres => self
                .sql
                .as_bytes()
                .windows(2)
                .filter(|w| w[0] == b'$' && w[1].is_ascii_digit())
                .count(),
            Dialect::Generic | Dialect::Sqlite => self.sql.matches('?').count(),
        };
        if placeholders != self.params.len() {
            return Err(DataError::Build(format!(
                "statement has {placeholders} placeholders but {} parameters: {}",
                self.params.len(),
                self.sql
            )));
        }
        Ok((self.sql, self.params))
    }

    /// Check `ident` against the policy and render it. Identifiers are
    /// dot-separated segments of `[A-Za-z_][A-Za-z0-9_]*`; with `allow_star`
    /// the last segment may be `*`.
    fn format_identifier(
        &self,
        ident: &str,
        allow_star: bool,
        kind: &'static str,
    ) -> Result<String, DataError> {
        if self.policy == IdentifierPolicy::Raw {
            return Ok(ident.to_string());
        }
        let segments: Vec<&str> = ident.split('.').collect();
        let last = segments.len() - 1;
        let mut rendered = Vec::with_capacity(segments.len());
        for (idx, segment) in segments.into_iter().enumerate() {
            if allow_star && idx == last && segment == "*" {
                rendered.push(segment.to_string());
            } else if plain_segment(segment) {
                rendered.push(self.quote_segment(segment));
            } else {
                return Err(DataError::Build(format!("Invalid {kind} identifier: {ident}")));
            }
        }
        Ok(rendered.join("."))
    }

    fn quote_segment(&self, segment: &str) -> String {
        match self.policy {
            IdentifierPolicy::Quote => {
                let quote = self.dialect.quote_char();
                format!("{quote}{segment}{quote}")
            }
            IdentifierPolicy::Raw | IdentifierPolicy::Validate => segment.to_string(),
        }
    }

    pub(crate) fn star(&self, table: &str) -> Result<String, DataError> {
        self.format_identifier(&format!("{table}.*"), true, "table")
    }
}

fn plain_segment(segment: &str) -> bool {
    let mut bytes = segment.bytes();
    matches!(bytes.next(), Some(b) if b.is_ascii_alphabetic() || b == b'_')
        && bytes.all(|b| b.is_ascii_alphanumeric() || b == b'_')
}
