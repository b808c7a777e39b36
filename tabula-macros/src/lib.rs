extern crate proc_macro;
use proc_macro::TokenStream;

pub(crate) mod crate_path;
pub(crate) mod entity_derive;
pub(crate) mod schema_derive;
pub(crate) mod types;

/// Derive macro for storage entities.
///
/// Generates `Entity::meta()` and `Schema` impls backed by static
/// descriptors. The type must also implement `serde::Deserialize`, which is
/// used to map result rows.
///
/// # Struct-level attribute
///
/// | Attribute | Description |
/// |-----------|-------------|
/// | `#[entity(table = "...")]` | Table name (default: snake_case type name) |
///
/// # Field attributes
///
/// | Attribute | Description |
/// |-----------|-------------|
/// | `#[column(primary_key)]` | Part of the primary key (at least one required) |
/// | `#[column(nullable)]` | Nullable column (implied by `Option<T>`) |
/// | `#[column(unique)]` | Plain unique constraint; never an upsert conflict target |
/// | `#[column(name = "...")]` | Column name (default: field name) |
/// | `#[column(sql_type = "...")]` | `Integer`, `Real`, `Text`, `Boolean`, `Blob`, `Timestamp` or `Json`, when it cannot be inferred |
/// | `#[column(skip)]` | Not a stored column |
/// | `#[relationship(...)]` | Edge to another entity, see below |
///
/// `#[relationship]` accepts `one_to_many`, `many_to_one` or `one_to_one`
/// (default: `one_to_many` for `Vec<T>`, `many_to_one` otherwise),
/// `target = Type` (default: the field's inner type), `local = "..."` /
/// `remote = "..."` join column pairs, and `innerjoin = bool`.
///
/// # Example
///
/// ```ignore
/// #[derive(Entity, Deserialize)]
/// #[entity(table = "parents")]
/// pub struct Parent {
///     #[column(primary_key)]
///     pub id: i64,
///     pub name: String,
///     #[relationship(local = "id", remote = "parent_id")]
///     #[serde(default)]
///     pub children: Vec<Child>,
/// }
/// ```
#[proc_macro_derive(Entity, attributes(entity, column, relationship))]
pub fn derive_entity(input: TokenStream) -> TokenStream {
    entity_derive::expand(input)
}

/// Derive macro for projections and plain records.
///
/// With `#[schema(entity = Type)]` the struct is a projection over `Type`
/// (an entity or another projection) and its fields, in declaration order,
/// name the attributes to load. A field naming a relationship eager-loads
/// it. Without the attribute the struct is an unbound record, which the
/// registry refuses to analyze.
///
/// | Field attribute | Description |
/// |-----------------|-------------|
/// | `#[schema(skip)]` | Not part of the projection |
/// | `#[schema(name = "...")]` | Attribute name or relationship path (default: field name) |
///
/// ```ignore
/// #[derive(Schema, Deserialize)]
/// #[schema(entity = Parent)]
/// pub struct ParentWithChildren {
///     pub name: String,
///     pub children: Vec<Child>,
/// }
/// ```
#[proc_macro_derive(Schema, attributes(schema))]
pub fn derive_schema(input: TokenStream) -> TokenStream {
    schema_derive::expand(input)
}
