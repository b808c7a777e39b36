#![allow(dead_code)]

use serde::Deserialize;
use serde_json::Value;
use std::collections::VecDeque;
use tabula_data::{
    from_row_serde, Attribute, ColumnMeta, ColumnType, CompiledStatement, DataError, Entity,
    EntityMeta, RelationshipMeta, Row, Schema, SchemaDescriptor, Session,
};

/// Session double that records every statement and replays queued results.
#[derive(Default)]
pub struct ScriptedSession {
    responses: VecDeque<Vec<Row>>,
    pub executed: Vec<CompiledStatement>,
    pub flushes: usize,
    pub detached: Vec<Row>,
}

impl ScriptedSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the rows returned by the next unanswered `execute`.
    pub fn respond(mut self, rows: Vec<Value>) -> Self {
        self.responses.push_back(rows.into_iter().map(row).collect());
        self
    }

    pub fn sql(&self) -> Vec<&str> {
        self.executed.iter().map(|s| s.sql.as_str()).collect()
    }
}

impl Session for ScriptedSession {
    async fn execute(&mut self, statement: &CompiledStatement) -> Result<Vec<Row>, DataError> {
        self.executed.push(statement.clone());
        Ok(self.responses.pop_front().unwrap_or_default())
    }

    async fn flush(&mut self) -> Result<(), DataError> {
        self.flushes += 1;
        Ok(())
    }

    fn detach(&mut self, record: &Row) {
        self.detached.push(record.clone());
    }
}

pub fn row(value: Value) -> Row {
    match value {
        Value::Object(map) => map,
        other => panic!("expected an object, got {other}"),
    }
}

// ── Person ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Person {
    pub id: i64,
    pub name: String,
}

static PERSON_ATTRS: [Attribute; 3] = [
    Attribute::Column(ColumnMeta::new("id", ColumnType::Integer).primary_key()),
    Attribute::Column(ColumnMeta::new("name", ColumnType::Text)),
    Attribute::Column(ColumnMeta::new("email", ColumnType::Text).nullable().unique()),
];
static PERSON_META: EntityMeta = EntityMeta::new("Person", "persons", &PERSON_ATTRS);
static PERSON_SCHEMA: SchemaDescriptor = SchemaDescriptor::entity("Person", person_meta);

fn person_meta() -> &'static EntityMeta {
    &PERSON_META
}

impl Schema for Person {
    fn descriptor() -> &'static SchemaDescriptor {
        &PERSON_SCHEMA
    }

    fn from_row(row: Row) -> Result<Self, DataError> {
        from_row_serde(row)
    }
}

impl Entity for Person {
    fn meta() -> &'static EntityMeta {
        &PERSON_META
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PersonName {
    pub name: String,
}

static PERSON_NAME_SCHEMA: SchemaDescriptor =
    SchemaDescriptor::projection("PersonName", <Person as Schema>::descriptor, &["name"]);

impl Schema for PersonName {
    fn descriptor() -> &'static SchemaDescriptor {
        &PERSON_NAME_SCHEMA
    }

    fn from_row(row: Row) -> Result<Self, DataError> {
        from_row_serde(row)
    }
}

// ── Parent / Child ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Child {
    pub id: i64,
    pub name: String,
    pub parent_id: i64,
}

static CHILD_ATTRS: [Attribute; 3] = [
    Attribute::Column(ColumnMeta::new("id", ColumnType::Integer).primary_key()),
    Attribute::Column(ColumnMeta::new("name", ColumnType::Text)),
    Attribute::Column(ColumnMeta::new("parent_id", ColumnType::Integer)),
];
static CHILD_META: EntityMeta = EntityMeta::new("Child", "children", &CHILD_ATTRS);

fn child_meta() -> &'static EntityMeta {
    &CHILD_META
}

static PARENT_ATTRS: [Attribute; 3] = [
    Attribute::Column(ColumnMeta::new("id", ColumnType::Integer).primary_key()),
    Attribute::Column(ColumnMeta::new("name", ColumnType::Text)),
    Attribute::Relationship(RelationshipMeta::one_to_many(
        "children",
        child_meta,
        &[("id", "parent_id")],
    )),
];
static PARENT_META: EntityMeta = EntityMeta::new("Parent", "parents", &PARENT_ATTRS);
static PARENT_SCHEMA: SchemaDescriptor = SchemaDescriptor::entity("Parent", parent_meta);

fn parent_meta() -> &'static EntityMeta {
    &PARENT_META
}

fn parent_schema() -> &'static SchemaDescriptor {
    &PARENT_SCHEMA
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ParentView {
    pub id: i64,
    pub name: String,
    pub children: Vec<Child>,
}

static PARENT_VIEW_SCHEMA: SchemaDescriptor =
    SchemaDescriptor::projection("ParentView", parent_schema, &["id", "name", "children"]);

impl Schema for ParentView {
    fn descriptor() -> &'static SchemaDescriptor {
        &PARENT_VIEW_SCHEMA
    }

    fn from_row(row: Row) -> Result<Self, DataError> {
        from_row_serde(row)
    }
}

/// Asks for a two-level eager load.
pub struct DeepParentView;

static DEEP_PARENT_VIEW_SCHEMA: SchemaDescriptor =
    SchemaDescriptor::projection("DeepParentView", parent_schema, &["id", "children.toys"]);

impl Schema for DeepParentView {
    fn descriptor() -> &'static SchemaDescriptor {
        &DEEP_PARENT_VIEW_SCHEMA
    }

    fn from_row(_row: Row) -> Result<Self, DataError> {
        Ok(DeepParentView)
    }
}

// ── Membership (composite key) ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Membership {
    pub org: String,
    pub user_id: i64,
    pub role: String,
}

static MEMBERSHIP_ATTRS: [Attribute; 3] = [
    Attribute::Column(ColumnMeta::new("org", ColumnType::Text).primary_key()),
    Attribute::Column(ColumnMeta::new("user_id", ColumnType::Integer).primary_key()),
    Attribute::Column(ColumnMeta::new("role", ColumnType::Text)),
];
static MEMBERSHIP_META: EntityMeta = EntityMeta::new("Membership", "memberships", &MEMBERSHIP_ATTRS);
static MEMBERSHIP_SCHEMA: SchemaDescriptor = SchemaDescriptor::entity("Membership", membership_meta);

fn membership_meta() -> &'static EntityMeta {
    &MEMBERSHIP_META
}

impl Schema for Membership {
    fn descriptor() -> &'static SchemaDescriptor {
        &MEMBERSHIP_SCHEMA
    }

    fn from_row(row: Row) -> Result<Self, DataError> {
        from_row_serde(row)
    }
}

// ── Broken declarations ─────────────────────────────────────────────────────

/// A plain record with no entity binding.
pub struct Loose;

static LOOSE_SCHEMA: SchemaDescriptor = SchemaDescriptor::unbound("Loose", &["id"]);

impl Schema for Loose {
    fn descriptor() -> &'static SchemaDescriptor {
        &LOOSE_SCHEMA
    }

    fn from_row(_row: Row) -> Result<Self, DataError> {
        Ok(Loose)
    }
}

/// An entity whose table name is not a valid identifier.
pub struct BadTable;

static BAD_TABLE_ATTRS: [Attribute; 1] =
    [Attribute::Column(ColumnMeta::new("id", ColumnType::Integer).primary_key())];
static BAD_TABLE_META: EntityMeta = EntityMeta::new("BadTable", "bad table", &BAD_TABLE_ATTRS);
static BAD_TABLE_SCHEMA: SchemaDescriptor = SchemaDescriptor::entity("BadTable", bad_table_meta);

fn bad_table_meta() -> &'static EntityMeta {
    &BAD_TABLE_META
}

impl Schema for BadTable {
    fn descriptor() -> &'static SchemaDescriptor {
        &BAD_TABLE_SCHEMA
    }

    fn from_row(_row: Row) -> Result<Self, DataError> {
        Ok(BadTable)
    }
}
