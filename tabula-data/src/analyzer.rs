//! Type analysis: from a schema descriptor to the columns, keys and edges a
//! statement needs.
//!
//! Analysis is pure. Memoization lives in [`Registry`](crate::Registry).

use crate::entity::{Attribute, Binding, ColumnMeta, EntityMeta, RelationshipMeta, SchemaDescriptor};
use crate::error::DataError;

/// Upper bound on `MapsTo` hops before a binding chain is considered cyclic.
const MAX_BINDING_DEPTH: usize = 16;

/// A relationship edge a projection asked to load with its owner.
#[derive(Debug, Clone)]
pub struct EagerLoad {
    pub relationship: &'static RelationshipMeta,
    /// Further path segments below this edge (`children.toys` → `["toys"]`).
    pub nested: Vec<&'static str>,
}

impl EagerLoad {
    pub fn is_nested(&self) -> bool {
        !self.nested.is_empty()
    }
}

/// Everything derived from one schema type. Immutable once built.
#[derive(Debug)]
pub struct AnalysisResult {
    /// Name of the analyzed schema type.
    pub schema: &'static str,
    pub entity: &'static EntityMeta,
    /// Plain columns reported back by select/insert/update, in order.
    pub returning: Vec<&'static ColumnMeta>,
    /// Always the entity's own primary key.
    pub primary_keys: Vec<&'static ColumnMeta>,
    pub eager_loads: Vec<EagerLoad>,
}

impl AnalysisResult {
    pub fn primary_key_names(&self) -> Vec<&'static str> {
        self.primary_keys.iter().map(|column| column.name).collect()
    }

    pub fn returning_names(&self) -> Vec<&'static str> {
        self.returning.iter().map(|column| column.name).collect()
    }

    pub fn is_primary_key(&self, name: &str) -> bool {
        self.primary_keys.iter().any(|column| column.name == name)
    }
}

/// Follow a descriptor's binding until it reaches an entity.
pub fn resolve_entity(
    descriptor: &'static SchemaDescriptor,
) -> Result<&'static EntityMeta, DataError> {
    let mut current = descriptor;
    for _ in 0..MAX_BINDING_DEPTH {
        match current.binding {
            Binding::Entity(meta) => return Ok(meta()),
            Binding::MapsTo(next) => current = next(),
            Binding::Unbound => {
                return Err(DataError::Resolution(format!(
                    "{} is not an entity and declares no entity binding",
                    descriptor.name
                )))
            }
        }
    }
    Err(DataError::Resolution(format!(
        "binding chain of {} does not reach an entity within {MAX_BINDING_DEPTH} steps",
        descriptor.name
    )))
}

/// Analyze one schema descriptor.
pub fn analyze(descriptor: &'static SchemaDescriptor) -> Result<AnalysisResult, DataError> {
    let entity = resolve_entity(descriptor)?;

    let primary_keys = entity.primary_keys();
    if primary_keys.is_empty() {
        return Err(DataError::Resolution(format!(
            "entity {} declares no primary key",
            entity.name
        )));
    }

    // Entities, and projections that do not narrow anything, take every
    // column and leave relationship loading to the store's default.
    let (returning, eager_loads) = if descriptor.is_entity() || descriptor.fields.is_empty() {
        (all_columns(entity)?, Vec::new())
    } else {
        explicit_fields(entity, descriptor.fields)?
    };

    Ok(AnalysisResult {
        schema: descriptor.name,
        entity,
        returning,
        primary_keys,
        eager_loads,
    })
}

fn all_columns(entity: &'static EntityMeta) -> Result<Vec<&'static ColumnMeta>, DataError> {
    let mut columns = Vec::new();
    for attribute in entity.attributes {
        match attribute {
            Attribute::Column(column) => columns.push(column),
            Attribute::Relationship(_) => {}
            other => return Err(DataError::unsupported_attribute(entity.name, other.name())),
        }
    }
    Ok(columns)
}

fn explicit_fields(
    entity: &'static EntityMeta,
    fields: &'static [&'static str],
) -> Result<(Vec<&'static ColumnMeta>, Vec<EagerLoad>), DataError> {
    let mut columns = Vec::new();
    let mut eager_loads = Vec::new();

    for field in fields {
        let mut path = field.split('.');
        let head = path.next().unwrap_or(*field);
        let nested: Vec<&'static str> = path.collect();

        match entity.attribute(head) {
            Some(Attribute::Column(column)) if nested.is_empty() => columns.push(column),
            Some(Attribute::Relationship(relationship)) => eager_loads.push(EagerLoad {
                relationship,
                nested,
            }),
            _ => return Err(DataError::unsupported_attribute(entity.name, field)),
        }
    }

    Ok((columns, eager_loads))
}
