//! Static schema descriptors.
//!
//! Every type that takes part in CRUD mapping exposes a [`SchemaDescriptor`].
//! Storage entities additionally expose an [`EntityMeta`] describing their
//! table, columns and relationship edges. Both are plain `'static` data so
//! that `#[derive(Entity)]` / `#[derive(Schema)]` can emit them as statics,
//! and so that hand-written descriptors look the same as generated ones.

use crate::error::DataError;
use crate::session::Row;
use serde::de::DeserializeOwned;

/// Storage type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    Real,
    Text,
    Boolean,
    Blob,
    Timestamp,
    Json,
}

/// A plain column of an entity table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnMeta {
    pub name: &'static str,
    pub sql_type: ColumnType,
    pub nullable: bool,
    pub primary_key: bool,
    pub unique: bool,
}

impl ColumnMeta {
    pub const fn new(name: &'static str, sql_type: ColumnType) -> Self {
        Self {
            name,
            sql_type,
            nullable: false,
            primary_key: false,
            unique: false,
        }
    }

    pub const fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub const fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Mark the column as carrying a plain unique constraint.
    ///
    /// Unique columns are never used as upsert conflict targets; only the
    /// primary key is.
    pub const fn unique(mut self) -> Self {
        self.unique = true;
        self
    }
}

/// Cardinality of a relationship edge, seen from the entity declaring it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    /// Declared on the "one" side: `Parent.children`.
    OneToMany,
    /// Declared on the "many" side: `Child.parent`.
    ManyToOne,
    OneToOne,
}

/// A named edge from one entity to another.
///
/// `join` lists `(local column, remote column)` pairs that make up the join
/// condition.
#[derive(Debug, Clone, Copy)]
pub struct RelationshipMeta {
    pub name: &'static str,
    pub kind: RelationKind,
    pub target: fn() -> &'static EntityMeta,
    pub join: &'static [(&'static str, &'static str)],
    /// Explicit loading policy. `None` derives it from the edge, see
    /// [`RelationshipMeta::uses_inner_join`].
    pub innerjoin: Option<bool>,
}

impl RelationshipMeta {
    pub const fn new(
        name: &'static str,
        kind: RelationKind,
        target: fn() -> &'static EntityMeta,
        join: &'static [(&'static str, &'static str)],
    ) -> Self {
        Self {
            name,
            kind,
            target,
            join,
            innerjoin: None,
        }
    }

    pub const fn one_to_many(
        name: &'static str,
        target: fn() -> &'static EntityMeta,
        join: &'static [(&'static str, &'static str)],
    ) -> Self {
        Self::new(name, RelationKind::OneToMany, target, join)
    }

    pub const fn many_to_one(
        name: &'static str,
        target: fn() -> &'static EntityMeta,
        join: &'static [(&'static str, &'static str)],
    ) -> Self {
        Self::new(name, RelationKind::ManyToOne, target, join)
    }

    pub const fn one_to_one(
        name: &'static str,
        target: fn() -> &'static EntityMeta,
        join: &'static [(&'static str, &'static str)],
    ) -> Self {
        Self::new(name, RelationKind::OneToOne, target, join)
    }

    pub const fn innerjoin(mut self, inner: bool) -> Self {
        self.innerjoin = Some(inner);
        self
    }

    /// Whether the edge holds a collection of target rows.
    pub fn uselist(&self) -> bool {
        self.kind == RelationKind::OneToMany
    }

    /// Resolve the loading policy for this edge on `owner`.
    ///
    /// An explicit policy wins. Otherwise a scalar edge whose local join
    /// columns are all non-nullable must always find its target and is
    /// loaded with an inner join; collections and optional edges use an
    /// outer join.
    pub fn uses_inner_join(&self, owner: &EntityMeta) -> bool {
        if let Some(inner) = self.innerjoin {
            return inner;
        }
        if self.uselist() || self.join.is_empty() {
            return false;
        }
        self.join.iter().all(|(local, _)| {
            owner
                .column(local)
                .is_some_and(|column| !column.nullable && !column.primary_key)
        })
    }
}

/// One declared attribute of an entity.
///
/// Only columns and relationships can be mapped. Synonyms and composites are
/// representable so that descriptors can mirror what a store declares, but
/// the analyzer rejects them.
#[derive(Debug, Clone, Copy)]
pub enum Attribute {
    Column(ColumnMeta),
    Relationship(RelationshipMeta),
    Synonym {
        name: &'static str,
        target: &'static str,
    },
    Composite {
        name: &'static str,
        columns: &'static [&'static str],
    },
}

impl Attribute {
    pub fn name(&self) -> &'static str {
        match self {
            Attribute::Column(column) => column.name,
            Attribute::Relationship(rel) => rel.name,
            Attribute::Synonym { name, .. } | Attribute::Composite { name, .. } => *name,
        }
    }
}

/// Table-level metadata of a storage entity.
#[derive(Debug)]
pub struct EntityMeta {
    /// Rust type name, used in diagnostics.
    pub name: &'static str,
    pub table: &'static str,
    pub attributes: &'static [Attribute],
}

impl EntityMeta {
    pub const fn new(
        name: &'static str,
        table: &'static str,
        attributes: &'static [Attribute],
    ) -> Self {
        Self {
            name,
            table,
            attributes,
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&'static Attribute> {
        let attributes: &'static [Attribute] = self.attributes;
        attributes.iter().find(|attr| attr.name() == name)
    }

    pub fn columns(&self) -> impl Iterator<Item = &'static ColumnMeta> {
        let attributes: &'static [Attribute] = self.attributes;
        attributes.iter().filter_map(|attr| match attr {
            Attribute::Column(column) => Some(column),
            _ => None,
        })
    }

    pub fn column(&self, name: &str) -> Option<&'static ColumnMeta> {
        self.columns().find(|column| column.name == name)
    }

    pub fn relationship(&self, name: &str) -> Option<&'static RelationshipMeta> {
        let attributes: &'static [Attribute] = self.attributes;
        attributes.iter().find_map(|attr| match attr {
            Attribute::Relationship(rel) if rel.name == name => Some(rel),
            _ => None,
        })
    }

    /// Primary-key columns in declaration order.
    pub fn primary_keys(&self) -> Vec<&'static ColumnMeta> {
        self.columns().filter(|column| column.primary_key).collect()
    }
}

/// How a schema type reaches its storage entity.
#[derive(Debug, Clone, Copy)]
pub enum Binding {
    /// The schema type is the entity.
    Entity(fn() -> &'static EntityMeta),
    /// The schema type projects another schema type (entity or projection).
    MapsTo(fn() -> &'static SchemaDescriptor),
    /// A plain record with no storage binding.
    Unbound,
}

/// Descriptor of any type that can be analyzed.
#[derive(Debug)]
pub struct SchemaDescriptor {
    pub name: &'static str,
    pub binding: Binding,
    /// Ordered attribute names of a projection. Ignored for entities.
    pub fields: &'static [&'static str],
}

impl SchemaDescriptor {
    pub const fn entity(name: &'static str, meta: fn() -> &'static EntityMeta) -> Self {
        Self {
            name,
            binding: Binding::Entity(meta),
            fields: &[],
        }
    }

    pub const fn projection(
        name: &'static str,
        maps_to: fn() -> &'static SchemaDescriptor,
        fields: &'static [&'static str],
    ) -> Self {
        Self {
            name,
            binding: Binding::MapsTo(maps_to),
            fields,
        }
    }

    pub const fn unbound(name: &'static str, fields: &'static [&'static str]) -> Self {
        Self {
            name,
            binding: Binding::Unbound,
            fields,
        }
    }

    pub fn is_entity(&self) -> bool {
        matches!(self.binding, Binding::Entity(_))
    }
}

/// A type with CRUD support.
///
/// `from_row` is the output mapping: it turns one hydrated row (relationship
/// edges already nested) into a value of the schema type.
pub trait Schema: Sized + Send + Sync + 'static {
    fn descriptor() -> &'static SchemaDescriptor;

    fn from_row(row: Row) -> Result<Self, DataError>;
}

/// A schema type that is itself a storage entity.
pub trait Entity: Schema {
    fn meta() -> &'static EntityMeta;
}

/// Default output mapping for serde-deserializable schema types.
pub fn from_row_serde<T: DeserializeOwned>(row: Row) -> Result<T, DataError> {
    Ok(serde_json::from_value(serde_json::Value::Object(row))?)
}
