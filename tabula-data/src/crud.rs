//! Session-bound CRUD engine.
//!
//! A [`Crud`] borrows a registry and one session for as long as the caller
//! needs it, usually a single request. It never opens, commits or closes the
//! session; mutations only flush so that the follow-up read in the same unit
//! of work observes generated and updated values.

use crate::analyzer::AnalysisResult;
use crate::entity::Schema;
use crate::error::DataError;
use crate::identity::{Args, Identity};
use crate::page::{page_offset, Paged, Split};
use crate::query::Filter;
use crate::registry::Registry;
use crate::session::{Row, Session, Values};
use crate::statement::{CompiledStatement, Select};
use serde_json::Value;
use std::marker::PhantomData;

pub struct Crud<'a, S, Sess> {
    registry: &'a Registry,
    session: &'a mut Sess,
    _marker: PhantomData<fn() -> S>,
}

impl<'a, S: Schema, Sess: Session> Crud<'a, S, Sess> {
    pub fn new(registry: &'a Registry, session: &'a mut Sess) -> Self {
        Self {
            registry,
            session,
            _marker: PhantomData,
        }
    }

    pub fn session(&mut self) -> &mut Sess {
        &mut *self.session
    }

    /// Fetch one record, or `None` when no row matches.
    pub async fn get_or_none(&mut self, identity: impl Into<Identity>) -> Result<Option<S>, DataError> {
        let identity = identity.into();
        match self.fetch_one(&identity).await? {
            Some(record) => {
                self.session.detach(&record);
                Ok(Some(S::from_row(record)?))
            }
            None => Ok(None),
        }
    }

    pub async fn get(&mut self, identity: impl Into<Identity>) -> Result<S, DataError> {
        let identity = identity.into();
        let described = format!("{identity:?}");
        self.get_or_none(identity)
            .await?
            .ok_or_else(|| self.not_found(&described))
    }

    pub async fn exist(&mut self, identity: impl Into<Identity>) -> Result<bool, DataError> {
        Ok(self.fetch_one(&identity.into()).await?.is_some())
    }

    /// Insert a record and return it as `get` would. Key fields in the
    /// payload are ignored; the store assigns them.
    pub async fn create(&mut self, args: impl Into<Args>) -> Result<S, DataError> {
        let analysis = self.registry.analyze::<S>()?;
        let values = without_keys(&analysis, args.into().resolve(&analysis)?);
        let statement = self
            .registry
            .get_insert::<S>()?
            .values(values)?
            .returning(analysis.primary_keys.clone())
            .compile()?;
        let rows = self.run(&statement).await?;
        self.session.flush().await?;

        let row = rows.into_iter().next().ok_or_else(|| {
            DataError::Other(format!("insert into {} returned no key", analysis.entity.table))
        })?;
        self.session.detach(&row);
        let identity = key_identity(&analysis, &row)?;
        tracing::debug!(entity = analysis.entity.name, key = ?identity, "Created record");
        self.get(identity).await
    }

    /// Update a record and return its new state, or `None` without writing
    /// anything when it does not exist.
    pub async fn update_or_none(
        &mut self,
        identity: impl Into<Identity>,
        args: impl Into<Args>,
    ) -> Result<Option<S>, DataError> {
        let identity = identity.into();
        let analysis = self.registry.analyze::<S>()?;
        let keys = identity.resolve(&analysis)?;
        let values = without_keys(&analysis, args.into().resolve(&analysis)?);

        if self.fetch_one(&identity).await?.is_none() {
            return Ok(None);
        }

        if !values.is_empty() {
            let mut update = self.registry.get_update::<S>()?.values(values)?;
            for (column, value) in keys {
                update = update.where_eq(column, value);
            }
            self.run(&update.compile()?).await?;
            self.session.flush().await?;
            tracing::debug!(entity = analysis.entity.name, key = ?identity, "Updated record");
        }

        self.get_or_none(identity).await
    }

    pub async fn update(
        &mut self,
        identity: impl Into<Identity>,
        args: impl Into<Args>,
    ) -> Result<S, DataError> {
        let identity = identity.into();
        let described = format!("{identity:?}");
        self.update_or_none(identity, args)
            .await?
            .ok_or_else(|| self.not_found(&described))
    }

    /// Delete a record and return the number of rows removed, 0 or 1.
    pub async fn delete_or_zero(&mut self, identity: impl Into<Identity>) -> Result<u64, DataError> {
        let identity = identity.into();
        let analysis = self.registry.analyze::<S>()?;
        let keys = identity.resolve(&analysis)?;

        if self.fetch_one(&identity).await?.is_none() {
            return Ok(0);
        }

        let mut delete = self.registry.get_delete::<S>()?;
        for (column, value) in keys {
            delete = delete.where_eq(column, value);
        }
        let rows = self.run(&delete.compile()?).await?;
        self.session.flush().await?;
        tracing::debug!(entity = analysis.entity.name, key = ?identity, "Deleted record");
        Ok(rows.len() as u64)
    }

    pub async fn delete(&mut self, identity: impl Into<Identity>) -> Result<(), DataError> {
        let identity = identity.into();
        let described = format!("{identity:?}");
        match self.delete_or_zero(identity).await? {
            0 => Err(self.not_found(&described)),
            _ => Ok(()),
        }
    }

    /// Insert the record, or update its non-key columns when the primary key
    /// already exists, then return it. Every key column must be supplied.
    pub async fn upsert(&mut self, args: impl Into<Args>) -> Result<S, DataError> {
        let analysis = self.registry.analyze::<S>()?;
        let values = args.into().resolve(&analysis)?;

        let mut keys = Values::new();
        for pk in &analysis.primary_keys {
            match values.get(pk.name) {
                Some(value) => keys.insert(pk.name.to_string(), value.clone()),
                None => {
                    return Err(DataError::Argument(format!(
                        "upsert on {} needs key column {}",
                        analysis.entity.name, pk.name
                    )))
                }
            };
        }

        let statement = self.registry.get_upsert::<S>()?.values(values)?.compile()?;
        self.run(&statement).await?;
        self.session.flush().await?;
        self.get(Identity::Keyed(keys)).await
    }

    /// Run the cached select, refined by `modifier`, and map rows lazily.
    pub async fn iter<F>(&mut self, modifier: F) -> Result<Records<S>, DataError>
    where
        F: FnOnce(Select) -> Select,
    {
        let select = modifier(self.registry.get_select::<S>()?);
        self.load(&select).await
    }

    pub async fn all<F>(&mut self, modifier: F) -> Result<Vec<S>, DataError>
    where
        F: FnOnce(Select) -> Select,
    {
        self.iter(modifier).await?.collect()
    }

    /// Number of records matching the refined select.
    pub async fn count<F>(&mut self, modifier: F) -> Result<u64, DataError>
    where
        F: FnOnce(Select) -> Select,
    {
        let select = modifier(self.registry.get_select::<S>()?);
        self.count_select(&select).await
    }

    /// Records `offset..offset + limit`; `count` is the number returned.
    /// Use [`count`](Self::count) for the total.
    pub async fn split<F>(&mut self, modifier: F, offset: u64, limit: u64) -> Result<Split<S>, DataError>
    where
        F: FnOnce(Select) -> Select,
    {
        let limit = match self.registry.config().max_per_page {
            Some(max) => limit.min(max),
            None => limit,
        };
        let select = modifier(self.registry.get_select::<S>()?);
        let result = self
            .load(&select.offset(offset).limit(limit))
            .await?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Split {
            offset,
            count: result.len() as u64,
            result,
        })
    }

    /// 1-based pagination. Page 0 is served as page 1; a page whose offset
    /// does not fit in `u64` is an `Argument` error.
    pub async fn paginate<F>(&mut self, modifier: F, page: u64, per_page: u64) -> Result<Paged<S>, DataError>
    where
        F: FnOnce(Select) -> Select,
    {
        let per_page = self.registry.config().per_page(per_page);
        let (page, offset) = page_offset(page, per_page)?;
        let select = modifier(self.registry.get_select::<S>()?);
        let result = self
            .load(&select.offset(offset).limit(per_page))
            .await?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Paged {
            page,
            count: result.len() as u64,
            result,
        })
    }

    async fn run(&mut self, statement: &CompiledStatement) -> Result<Vec<Row>, DataError> {
        tracing::trace!(sql = %statement.sql, params = ?statement.params, "Executing statement");
        self.session.execute(statement).await
    }

    async fn load(&mut self, select: &Select) -> Result<Records<S>, DataError> {
        let statement = select.compile()?;
        let rows = self.run(&statement).await?;
        Ok(Records::new(statement.hydrate(rows)))
    }

    async fn count_select(&mut self, select: &Select) -> Result<u64, DataError> {
        let statement = select.compile_count()?;
        let rows = self.run(&statement).await?;
        rows.first()
            .and_then(|row| row.get("count"))
            .and_then(Value::as_u64)
            .ok_or_else(|| DataError::Other(format!("count query returned {rows:?}")))
    }

    async fn fetch_one(&mut self, identity: &Identity) -> Result<Option<Row>, DataError> {
        let analysis = self.registry.analyze::<S>()?;
        let mut select = self.registry.get_select::<S>()?;
        for (column, value) in identity.resolve(&analysis)? {
            select = select.where_eq(column, value);
        }
        let statement = select.compile()?;
        let rows = self.run(&statement).await?;
        let mut records = statement.hydrate(rows);
        match records.len() {
            0 | 1 => Ok(records.pop()),
            n => Err(DataError::Other(format!(
                "{n} {} records share one primary key",
                analysis.entity.name
            ))),
        }
    }

    fn not_found(&self, identity: &str) -> DataError {
        DataError::NotFound(format!("{} {identity}", S::descriptor().name))
    }
}

/// Lazily mapped query results.
pub struct Records<S> {
    rows: std::vec::IntoIter<Row>,
    _marker: PhantomData<fn() -> S>,
}

impl<S> Records<S> {
    fn new(rows: Vec<Row>) -> Self {
        Self {
            rows: rows.into_iter(),
            _marker: PhantomData,
        }
    }
}

impl<S: Schema> Iterator for Records<S> {
    type Item = Result<S, DataError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.rows.next().map(S::from_row)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.rows.size_hint()
    }
}

impl<S: Schema> ExactSizeIterator for Records<S> {}

fn without_keys(analysis: &AnalysisResult, values: Values) -> Values {
    values
        .into_iter()
        .filter(|(key, _)| !analysis.is_primary_key(key))
        .collect()
}

fn key_identity(analysis: &AnalysisResult, row: &Row) -> Result<Identity, DataError> {
    let mut keys = Values::new();
    for name in analysis.primary_key_names() {
        let value = row.get(name).cloned().ok_or_else(|| {
            DataError::Other(format!("insert did not return key column {name}"))
        })?;
        keys.insert(name.to_string(), value);
    }
    Ok(Identity::Keyed(keys))
}

/// Obtain a CRUD engine from the schema type itself.
///
/// ```ignore
/// let person = Person::crud(&registry, &mut session).get(1).await?;
/// ```
pub trait CrudExt: Schema {
    fn crud<'a, Sess: Session>(registry: &'a Registry, session: &'a mut Sess) -> Crud<'a, Self, Sess> {
        Crud::new(registry, session)
    }
}

impl<S: Schema> CrudExt for S {}
