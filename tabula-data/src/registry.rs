//! Memoized analysis and statement templates.
//!
//! The [`Registry`] is the single owner of both caches. It is `Send + Sync`
//! and meant to be built once at startup, then shared by reference or `Arc`.
//! Each cache key maps to its own once-cell: concurrent first users of the
//! same schema type block on one computation and all observe its result.
//! Builds that fail are not cached; the next caller retries.

use crate::analyzer::{self, AnalysisResult};
use crate::config::DataConfig;
use crate::crud::Crud;
use crate::entity::Schema;
use crate::error::DataError;
use crate::session::Session;
use crate::sql::Sql;
use crate::statement::{Delete, Insert, Select, Update, Upsert};
use dashmap::DashMap;
use once_cell::sync::OnceCell;
use std::any::TypeId;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// The five canonical statement kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Select,
    Insert,
    Update,
    Delete,
    Upsert,
}

impl Operation {
    pub const ALL: [Operation; 5] = [
        Operation::Select,
        Operation::Insert,
        Operation::Update,
        Operation::Delete,
        Operation::Upsert,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Select => "select",
            Operation::Insert => "insert",
            Operation::Update => "update",
            Operation::Delete => "delete",
            Operation::Upsert => "upsert",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
enum Template {
    Select(Select),
    Insert(Insert),
    Update(Update),
    Delete(Delete),
    Upsert(Upsert),
}

type Slot<T> = Arc<OnceCell<Arc<T>>>;

/// Number of analyses and templates actually computed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryStats {
    pub analyses: usize,
    pub templates: usize,
}

#[derive(Debug, Default)]
pub struct Registry {
    config: DataConfig,
    analyses: DashMap<TypeId, Slot<AnalysisResult>>,
    templates: DashMap<(TypeId, Operation), Slot<Template>>,
    analyses_built: AtomicUsize,
    templates_built: AtomicUsize,
}

impl Registry {
    pub fn new(config: DataConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &DataConfig {
        &self.config
    }

    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            analyses: self.analyses_built.load(Ordering::Relaxed),
            templates: self.templates_built.load(Ordering::Relaxed),
        }
    }

    /// Analyze `S`, computing it at most once per registry.
    pub fn analyze<S: Schema>(&self) -> Result<Arc<AnalysisResult>, DataError> {
        let descriptor = S::descriptor();
        // Clone the cell out so no map shard stays locked during the build.
        let slot = self
            .analyses
            .entry(TypeId::of::<S>())
            .or_default()
            .clone();
        if let Some(result) = slot.get() {
            tracing::trace!(schema = descriptor.name, "analysis cache hit");
            return Ok(result.clone());
        }
        slot.get_or_try_init(|| {
            let result = analyzer::analyze(descriptor)?;
            self.analyses_built.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(
                schema = descriptor.name,
                entity = result.entity.name,
                columns = result.returning.len(),
                eager_loads = result.eager_loads.len(),
                "Analyzed schema type"
            );
            Ok(Arc::new(result))
        })
        .cloned()
    }

    /// Analyze `S` and build all of its templates now instead of on first use.
    pub fn register<S: Schema>(&self) -> Result<(), DataError> {
        self.analyze::<S>()?;
        for op in Operation::ALL {
            self.template::<S>(op)?;
        }
        Ok(())
    }

    pub fn get_select<S: Schema>(&self) -> Result<Select, DataError> {
        match &*self.template::<S>(Operation::Select)? {
            Template::Select(select) => Ok(select.clone()),
            other => Err(mismatch(Operation::Select, other)),
        }
    }

    pub fn get_insert<S: Schema>(&self) -> Result<Insert, DataError> {
        match &*self.template::<S>(Operation::Insert)? {
            Template::Insert(insert) => Ok(insert.clone()),
            other => Err(mismatch(Operation::Insert, other)),
        }
    }

    pub fn get_update<S: Schema>(&self) -> Result<Update, DataError> {
        match &*self.template::<S>(Operation::Update)? {
            Template::Update(update) => Ok(update.clone()),
            other => Err(mismatch(Operation::Update, other)),
        }
    }

    pub fn get_delete<S: Schema>(&self) -> Result<Delete, DataError> {
        match &*self.template::<S>(Operation::Delete)? {
            Template::Delete(delete) => Ok(delete.clone()),
            other => Err(mismatch(Operation::Delete, other)),
        }
    }

    pub fn get_upsert<S: Schema>(&self) -> Result<Upsert, DataError> {
        match &*self.template::<S>(Operation::Upsert)? {
            Template::Upsert(upsert) => Ok(upsert.clone()),
            other => Err(mismatch(Operation::Upsert, other)),
        }
    }

    /// Statement facade for `S`.
    pub fn sql<S: Schema>(&self) -> Sql<'_, S> {
        Sql::new(self)
    }

    /// CRUD engine for `S` bound to one session.
    pub fn crud<'a, S: Schema, Sess: Session>(&'a self, session: &'a mut Sess) -> Crud<'a, S, Sess> {
        Crud::new(self, session)
    }

    fn template<S: Schema>(&self, op: Operation) -> Result<Arc<Template>, DataError> {
        let slot = self
            .templates
            .entry((TypeId::of::<S>(), op))
            .or_default()
            .clone();
        if let Some(template) = slot.get() {
            tracing::trace!(schema = S::descriptor().name, operation = %op, "template cache hit");
            return Ok(template.clone());
        }
        slot.get_or_try_init(|| {
            let analysis = self.analyze::<S>()?;
            let template = self.build(op, &analysis)?;
            self.templates_built.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(
                schema = analysis.schema,
                entity = analysis.entity.name,
                operation = %op,
                "Built statement template"
            );
            Ok(Arc::new(template))
        })
        .cloned()
    }

    fn build(&self, op: Operation, analysis: &AnalysisResult) -> Result<Template, DataError> {
        let dialect = self.config.dialect;
        let policy = self.config.identifier_policy;
        let entity = analysis.entity;
        let template = match op {
            Operation::Select => {
                let select = Select::for_analysis(analysis)?
                    .dialect(dialect)
                    .identifier_policy(policy);
                select.verify()?;
                Template::Select(select)
            }
            Operation::Insert => {
                let insert = Insert::new(entity)
                    .returning(analysis.returning.clone())
                    .dialect(dialect)
                    .identifier_policy(policy);
                insert.verify()?;
                Template::Insert(insert)
            }
            Operation::Update => {
                let update = Update::new(entity)
                    .returning(analysis.returning.clone())
                    .dialect(dialect)
                    .identifier_policy(policy);
                update.verify()?;
                Template::Update(update)
            }
            Operation::Delete => {
                let delete = Delete::new(entity)
                    .returning(analysis.primary_keys.clone())
                    .dialect(dialect)
                    .identifier_policy(policy);
                delete.verify()?;
                Template::Delete(delete)
            }
            Operation::Upsert => {
                let upsert = Upsert::new(entity)
                    .returning(analysis.returning.clone())
                    .dialect(dialect)
                    .identifier_policy(policy);
                upsert.verify()?;
                Template::Upsert(upsert)
            }
        };
        Ok(template)
    }
}

fn mismatch(op: Operation, template: &Template) -> DataError {
    DataError::Other(format!("cached {op} template holds {template:?}"))
}
