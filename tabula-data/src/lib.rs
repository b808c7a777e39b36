pub mod analyzer;
pub mod config;
pub mod crud;
pub mod entity;
pub mod error;
pub mod identity;
pub mod page;
pub mod query;
pub mod registry;
pub mod session;
pub mod sql;
pub mod statement;

pub use analyzer::{AnalysisResult, EagerLoad};
pub use config::DataConfig;
pub use crud::{Crud, CrudExt, Records};
pub use entity::{
    from_row_serde, Attribute, Binding, ColumnMeta, ColumnType, Entity, EntityMeta, RelationKind,
    RelationshipMeta, Schema, SchemaDescriptor,
};
pub use error::DataError;
pub use identity::{Args, Identity};
pub use page::{Paged, Split};
pub use query::{Dialect, Filter, IdentifierPolicy};
pub use registry::{Operation, Registry, RegistryStats};
pub use session::{Row, Session, UnitOfWork, Values};
pub use sql::Sql;
pub use statement::{CompiledStatement, Delete, Insert, LoadPlan, Select, Update, Upsert};

/// Derive macros generating static descriptors.
pub use tabula_macros::{Entity, Schema};

pub mod prelude {
    //! Re-exports of the most commonly used data types.
    pub use crate::{
        Args, Crud, CrudExt, DataConfig, DataError, Entity, Filter, Identity, Paged, Registry,
        Schema, Session, Split, UnitOfWork,
    };
}
