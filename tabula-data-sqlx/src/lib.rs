//! # tabula-data-sqlx: SQLx backend for the Tabula data layer
//!
//! This crate provides the [SQLx](https://github.com/launchbadge/sqlx)-specific
//! session for Tabula's CRUD engine. It depends on [`tabula-data`] for the
//! abstract traits and types, and adds statement execution, row decoding,
//! transaction handling and error bridging.
//!
//! # What's in this crate
//!
//! | Type | Description |
//! |------|-------------|
//! | [`SqlxSession`] | `Session` + `UnitOfWork` over an `sqlx::Pool<DB>` and an optional open transaction |
//! | [`HasPool`] | Trait for application states that contain a database pool |
//! | [`SqlxErrorExt`] | Extension trait to convert `sqlx::Error` → `DataError` (`.into_data_error()`) |
//! | [`SqlxResult<T>`] | Type alias for `Result<T, DataError>` |
//!
//! # Feature flags
//!
//! | Feature    | Driver |
//! |------------|--------|
//! | `sqlite`   | SQLite via `sqlx/sqlite` (default) |
//! | `postgres` | PostgreSQL via `sqlx/postgres`, with `sqlx/chrono` and `sqlx/uuid` for temporal and UUID columns |
//!
//! Pair the driver with the matching [`Dialect`](tabula_data::Dialect) in
//! the registry's [`DataConfig`](tabula_data::DataConfig); Postgres needs
//! `$n` placeholders.
//!
//! # Quick start
//!
//! ```ignore
//! use tabula_data::prelude::*;
//! use tabula_data_sqlx::SqlxSession;
//!
//! let registry = Registry::new(DataConfig::load("application.yaml")?);
//! let mut session = SqlxSession::new(pool.clone());
//!
//! session.begin().await?;
//! let person = Person::crud(&registry, &mut session)
//!     .create(Args::new().set("name", "Ann"))
//!     .await?;
//! session.commit().await?;
//! ```
//!
//! # Value mapping
//!
//! Parameters bind as `bool`, `i64`, `f64` or `String`; arrays and objects
//! bind as JSON (`JSONB` on Postgres). Result columns decode by their SQL
//! type into the matching JSON value. Binary columns become arrays of bytes.
//! On Postgres, `UUID`, `DATE`, `TIME`, `TIMESTAMP`, `TIMESTAMPTZ` and
//! `NUMERIC` decode to their text form.

pub mod error;
pub mod session;

pub use error::{SqlxErrorExt, SqlxResult};
pub use session::{HasPool, SqlxSession};

/// Re-exports of the most commonly used types from both `tabula-data` and this crate.
pub mod prelude {
    pub use crate::{HasPool, SqlxErrorExt, SqlxSession};
    pub use tabula_data::prelude::*;
}
