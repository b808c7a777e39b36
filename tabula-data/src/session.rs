//! Capabilities consumed from the session owner.
//!
//! The core never opens, pools or closes a session. It borrows one for the
//! duration of a CRUD call and talks to it through [`Session`]; whoever owns
//! the session drives its transaction through [`UnitOfWork`].
//!
//! Both traits use RPITIT (return-position `impl Trait` in traits), so no
//! `async-trait` is needed.

use crate::error::DataError;
use crate::statement::CompiledStatement;
use std::future::Future;

/// A result row or a hydrated record.
///
/// Keys are column names. Columns fetched through an eager-loaded
/// relationship arrive as `"<relationship>.<column>"` and are folded into a
/// nested value by hydration.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Ordered column/value pairs supplied by a caller.
pub type Values = serde_json::Map<String, serde_json::Value>;

/// Statement execution against one database session.
///
/// Implementations must run one statement at a time; the CRUD engine holds
/// the session mutably and never issues a second statement before the first
/// one resolved.
pub trait Session: Send {
    /// Execute a compiled statement and return every produced row.
    fn execute(
        &mut self,
        statement: &CompiledStatement,
    ) -> impl Future<Output = Result<Vec<Row>, DataError>> + Send;

    /// Make pending writes visible to subsequent reads in the same unit of work.
    fn flush(&mut self) -> impl Future<Output = Result<(), DataError>> + Send;

    /// Drop a record from the session's identity map, if it keeps one.
    ///
    /// Called before a fetched record is handed to the output mapping, so the
    /// next statement for the same key is not served from session state.
    fn detach(&mut self, record: &Row);
}

/// Transaction boundary of a session, driven by its owner.
pub trait UnitOfWork: Send {
    fn begin(&mut self) -> impl Future<Output = Result<(), DataError>> + Send;
    fn commit(&mut self) -> impl Future<Output = Result<(), DataError>> + Send;
    fn rollback(&mut self) -> impl Future<Output = Result<(), DataError>> + Send;
}
