//! [`SqlxSession`]: the `tabula-data` session capabilities over an SQLx
//! pool, with an optional open transaction.

use crate::error::SqlxErrorExt;
use serde_json::{Number, Value};
use sqlx::{Database, Pool, Transaction};
use tabula_data::{DataError, Row};

/// Trait for application states that contain a database pool.
///
/// ```ignore
/// impl HasPool<Sqlite> for AppState {
///     fn pool(&self) -> &Pool<Sqlite> {
///         &self.pool
///     }
/// }
/// ```
pub trait HasPool<DB: Database> {
    fn pool(&self) -> &Pool<DB>;
}

/// One unit of work against an SQLx pool.
///
/// Outside a transaction every statement runs on a pooled connection.
/// Between [`begin`](tabula_data::UnitOfWork::begin) and
/// `commit`/`rollback` all statements run on the transaction's connection.
/// Dropping the session with an open transaction rolls it back.
///
/// Writes are sent immediately, so `flush` has nothing to do, and there is
/// no identity map to detach records from.
pub struct SqlxSession<DB: Database> {
    pool: Pool<DB>,
    tx: Option<Transaction<'static, DB>>,
}

impl<DB: Database> SqlxSession<DB> {
    pub fn new(pool: Pool<DB>) -> Self {
        Self { pool, tx: None }
    }

    pub fn from_state<S: HasPool<DB>>(state: &S) -> Self {
        Self::new(state.pool().clone())
    }

    pub fn pool(&self) -> &Pool<DB> {
        &self.pool
    }

    pub fn in_transaction(&self) -> bool {
        self.tx.is_some()
    }
}

fn no_transaction() -> DataError {
    DataError::Other("no transaction is open on this session".into())
}

fn number(value: f64) -> Value {
    Number::from_f64(value).map_or(Value::Null, Value::Number)
}

fn bytes(value: Vec<u8>) -> Value {
    Value::Array(value.into_iter().map(Value::from).collect())
}

macro_rules! impl_sqlx_session {
    ($feature:literal, $db:ty, $decode:path) => {
        #[cfg(feature = $feature)]
        impl tabula_data::Session for SqlxSession<$db> {
            async fn execute(
                &mut self,
                statement: &tabula_data::CompiledStatement,
            ) -> Result<Vec<Row>, DataError> {
                tracing::trace!(sql = %statement.sql, params = statement.params.len(), "sqlx execute");
                let mut query = sqlx::query::<$db>(&statement.sql);
                for value in &statement.params {
                    query = match value {
                        Value::Bool(b) => query.bind(*b),
                        Value::Number(n) => match n.as_i64() {
                            Some(i) => query.bind(i),
                            None => query.bind(n.as_f64().unwrap_or_default()),
                        },
                        Value::String(s) => query.bind(s.clone()),
                        Value::Null => query.bind(None::<String>),
                        other => query.bind(sqlx::types::Json(other.clone())),
                    };
                }
                let rows = match self.tx.as_mut() {
                    Some(tx) => query.fetch_all(&mut **tx).await,
                    None => query.fetch_all(&self.pool).await,
                }
                .map_err(SqlxErrorExt::into_data_error)?;
                rows.iter().map($decode).collect()
            }

            async fn flush(&mut self) -> Result<(), DataError> {
                Ok(())
            }

            fn detach(&mut self, _record: &Row) {}
        }

        #[cfg(feature = $feature)]
        impl tabula_data::UnitOfWork for SqlxSession<$db> {
            async fn begin(&mut self) -> Result<(), DataError> {
                if self.tx.is_some() {
                    return Err(DataError::Other(
                        "a transaction is already open on this session".into(),
                    ));
                }
                let tx = self.pool.begin().await.map_err(SqlxErrorExt::into_data_error)?;
                self.tx = Some(tx);
                Ok(())
            }

            async fn commit(&mut self) -> Result<(), DataError> {
                let tx = self.tx.take().ok_or_else(no_transaction)?;
                tx.commit().await.map_err(SqlxErrorExt::into_data_error)
            }

            async fn rollback(&mut self) -> Result<(), DataError> {
                let tx = self.tx.take().ok_or_else(no_transaction)?;
                tx.rollback().await.map_err(SqlxErrorExt::into_data_error)
            }
        }
    };
}

impl_sqlx_session!("sqlite", sqlx::Sqlite, sqlite::decode_row);
impl_sqlx_session!("postgres", sqlx::Postgres, postgres::decode_row);

#[cfg(feature = "sqlite")]
mod sqlite {
    use super::{bytes, number};
    use crate::error::{SqlxErrorExt, SqlxResult};
    use serde_json::Value;
    use sqlx::sqlite::SqliteRow;
    use sqlx::{Column, Row as _, TypeInfo, ValueRef};
    use tabula_data::Row;

    /// SQLite values carry their storage class; the declared column type is
    /// only needed to tell booleans from integers.
    pub(super) fn decode_row(row: &SqliteRow) -> SqlxResult<Row> {
        let mut out = Row::new();
        for column in row.columns() {
            let index = column.ordinal();
            let raw = row.try_get_raw(index).map_err(SqlxErrorExt::into_data_error)?;
            let value = if raw.is_null() {
                Value::Null
            } else {
                let declared = column.type_info().name().to_ascii_uppercase();
                let storage = raw.type_info().name().to_string();
                match (declared.as_str(), storage.as_str()) {
                    ("BOOLEAN" | "BOOL", _) => Value::Bool(get(row, index)?),
                    (_, "INTEGER") => Value::from(get::<i64>(row, index)?),
                    (_, "REAL") => number(get(row, index)?),
                    (_, "BLOB") => bytes(get(row, index)?),
                    _ => Value::String(get(row, index)?),
                }
            };
            out.insert(column.name().to_string(), value);
        }
        Ok(out)
    }

    fn get<'r, T>(row: &'r SqliteRow, index: usize) -> SqlxResult<T>
    where
        T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
    {
        row.try_get_unchecked(index)
            .map_err(SqlxErrorExt::into_data_error)
    }
}

#[cfg(feature = "postgres")]
mod postgres {
    use super::{bytes, number};
    use crate::error::{SqlxErrorExt, SqlxResult};
    use serde_json::Value;
    use sqlx::postgres::{PgRow, PgValueFormat};
    use sqlx::types::chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
    use sqlx::types::Uuid;
    use sqlx::{Column, Row as _, TypeInfo, ValueRef};
    use tabula_data::{DataError, Row};

    /// Temporal, UUID and NUMERIC columns decode to their text form, which
    /// serde reads back into `chrono`, `uuid` or decimal types.
    pub(super) fn decode_row(row: &PgRow) -> SqlxResult<Row> {
        let mut out = Row::new();
        for column in row.columns() {
            let index = column.ordinal();
            let raw = row.try_get_raw(index).map_err(SqlxErrorExt::into_data_error)?;
            let value = if raw.is_null() {
                Value::Null
            } else {
                match column.type_info().name() {
                    "BOOL" => Value::Bool(get(row, index)?),
                    "INT2" => Value::from(get::<i16>(row, index)?),
                    "INT4" => Value::from(get::<i32>(row, index)?),
                    "INT8" => Value::from(get::<i64>(row, index)?),
                    "FLOAT4" => number(f64::from(get::<f32>(row, index)?)),
                    "FLOAT8" => number(get(row, index)?),
                    "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" | "CHAR" => Value::String(get(row, index)?),
                    "JSON" | "JSONB" => get::<Value>(row, index)?,
                    "BYTEA" => bytes(get(row, index)?),
                    "UUID" => Value::String(get::<Uuid>(row, index)?.to_string()),
                    "DATE" => Value::String(get::<NaiveDate>(row, index)?.to_string()),
                    "TIME" => Value::String(get::<NaiveTime>(row, index)?.to_string()),
                    "TIMESTAMP" => Value::String(
                        get::<NaiveDateTime>(row, index)?
                            .format("%Y-%m-%dT%H:%M:%S%.f")
                            .to_string(),
                    ),
                    "TIMESTAMPTZ" => Value::String(get::<DateTime<Utc>>(row, index)?.to_rfc3339()),
                    "NUMERIC" => {
                        let text = match raw.format() {
                            PgValueFormat::Text => raw.as_str().ok().map(str::to_string),
                            PgValueFormat::Binary => {
                                raw.as_bytes().ok().and_then(super::numeric::numeric_text)
                            }
                        };
                        Value::String(text.ok_or_else(|| {
                            DataError::Other(format!("column {} holds a malformed NUMERIC", column.name()))
                        })?)
                    }
                    other => {
                        return Err(DataError::Other(format!(
                            "column {} has unsupported type {other}",
                            column.name()
                        )))
                    }
                }
            };
            out.insert(column.name().to_string(), value);
        }
        Ok(out)
    }

    fn get<'r, T>(row: &'r PgRow, index: usize) -> SqlxResult<T>
    where
        T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
    {
        row.try_get(index).map_err(SqlxErrorExt::into_data_error)
    }
}

#[cfg(any(feature = "postgres", test))]
mod numeric {
    const POSITIVE: u16 = 0x0000;
    const NEGATIVE: u16 = 0x4000;
    const NAN: u16 = 0xC000;
    const POS_INFINITY: u16 = 0xD000;
    const NEG_INFINITY: u16 = 0xF000;

    fn word(bytes: &[u8], at: usize) -> Option<u16> {
        Some(u16::from_be_bytes([*bytes.get(at)?, *bytes.get(at + 1)?]))
    }

    /// Text form of a binary Postgres NUMERIC: a header of digit count,
    /// weight, sign and display scale, then base-10000 digits.
    pub(super) fn numeric_text(bytes: &[u8]) -> Option<String> {
        let ndigits = usize::from(word(bytes, 0)?);
        let weight = i64::from(word(bytes, 2)? as i16);
        let sign = word(bytes, 4)?;
        let scale = usize::from(word(bytes, 6)?);
        let digits = (0..ndigits)
            .map(|i| word(bytes, 8 + 2 * i))
            .collect::<Option<Vec<u16>>>()?;
        let digit = |i: i64| -> u16 {
            usize::try_from(i)
                .ok()
                .and_then(|i| digits.get(i).copied())
                .unwrap_or(0)
        };

        let negative = match sign {
            POSITIVE => false,
            NEGATIVE => true,
            NAN => return Some("NaN".into()),
            POS_INFINITY => return Some("Infinity".into()),
            NEG_INFINITY => return Some("-Infinity".into()),
            _ => return None,
        };

        let mut out = String::new();
        if negative {
            out.push('-');
        }
        if weight < 0 {
            out.push('0');
        } else {
            out.push_str(&digit(0).to_string());
            for i in 1..=weight {
                out.push_str(&format!("{:04}", digit(i)));
            }
        }
        if scale > 0 {
            let mut fraction = String::with_capacity(scale + 4);
            let mut i = weight + 1;
            while fraction.len() < scale {
                fraction.push_str(&format!("{:04}", digit(i)));
                i += 1;
            }
            fraction.truncate(scale);
            out.push('.');
            out.push_str(&fraction);
        }
        Some(out)
    }

}
