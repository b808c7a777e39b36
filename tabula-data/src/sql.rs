use crate::analyzer::AnalysisResult;
use crate::entity::Schema;
use crate::error::DataError;
use crate::registry::Registry;
use crate::session::Values;
use crate::statement::{CompiledStatement, Delete, Insert, Select, Update, Upsert};
use std::marker::PhantomData;
use std::sync::Arc;

/// Statement facade for one schema type.
///
/// Every method starts from the registry's cached template and returns a
/// refined copy; nothing is executed.
///
/// ```ignore
/// let stmt = registry.sql::<Person>().update(values)?.where_eq("id", 1).compile()?;
/// ```
pub struct Sql<'r, S> {
    registry: &'r Registry,
    _marker: PhantomData<fn() -> S>,
}

impl<'r, S: Schema> Sql<'r, S> {
    pub(crate) fn new(registry: &'r Registry) -> Self {
        Self {
            registry,
            _marker: PhantomData,
        }
    }

    pub fn analysis(&self) -> Result<Arc<AnalysisResult>, DataError> {
        self.registry.analyze::<S>()
    }

    pub fn insert(&self, values: Values) -> Result<Insert, DataError> {
        self.registry.get_insert::<S>()?.values(values)
    }

    /// Unconditioned update; the caller adds the WHERE clause.
    pub fn update(&self, values: Values) -> Result<Update, DataError> {
        self.registry.get_update::<S>()?.values(values)
    }

    /// Primary-key columns in `values` become the conflict keys, the rest
    /// the updated columns.
    pub fn upsert(&self, values: Values) -> Result<Upsert, DataError> {
        self.registry.get_upsert::<S>()?.values(values)
    }

    pub fn select(&self) -> Result<Select, DataError> {
        self.registry.get_select::<S>()
    }

    pub fn delete(&self) -> Result<Delete, DataError> {
        self.registry.get_delete::<S>()
    }

    /// `SELECT COUNT(*)` over the whole table.
    pub fn count(&self) -> Result<CompiledStatement, DataError> {
        self.select()?.compile_count()
    }
}

impl<S> Clone for Sql<'_, S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S> Copy for Sql<'_, S> {}
