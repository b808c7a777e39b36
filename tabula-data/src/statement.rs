//! Statement builders for the five operation kinds.
//!
//! A builder is the refinable form of a statement: the registry caches one
//! template per schema type and operation, callers clone it and add filters,
//! ordering, values or returning columns, then [`compile`](Select::compile)
//! it into SQL text plus bind parameters.

use crate::analyzer::AnalysisResult;
use crate::entity::{ColumnMeta, EntityMeta, RelationshipMeta};
use crate::error::DataError;
use crate::query::{Condition, Dialect, Filter, IdentifierPolicy, Renderer};
use crate::session::{Row, Values};
use serde_json::Value;
use std::collections::{HashMap, HashSet};

/// SQL text with its bind parameters, ready for a [`Session`](crate::Session).
#[derive(Debug, Clone)]
pub struct CompiledStatement {
    pub sql: String,
    pub params: Vec<Value>,
    /// Present on selects that eager-load relationships.
    pub plan: Option<LoadPlan>,
}

impl CompiledStatement {
    /// Fold flat result rows into records. A no-op without a load plan.
    pub fn hydrate(&self, rows: Vec<Row>) -> Vec<Row> {
        match &self.plan {
            Some(plan) => plan.hydrate(rows),
            None => rows,
        }
    }
}

/// A relationship joined into a select.
#[derive(Debug, Clone)]
pub struct Join {
    pub relationship: &'static RelationshipMeta,
    pub target: &'static EntityMeta,
    pub alias: String,
    pub inner: bool,
}

fn check_columns(entity: &EntityMeta, values: &Values) -> Result<(), DataError> {
    for key in values.keys() {
        if entity.column(key).is_none() {
            return Err(DataError::Argument(format!(
                "{} has no column named {key}",
                entity.name
            )));
        }
    }
    Ok(())
}

fn render_returning(
    r: &mut Renderer,
    returning: &[&'static ColumnMeta],
) -> Result<(), DataError> {
    if returning.is_empty() {
        return Ok(());
    }
    let mut cols = Vec::with_capacity(returning.len());
    for column in returning {
        cols.push(r.ident(column.name, "column")?);
    }
    r.push(" RETURNING ");
    r.push(&cols.join(", "));
    Ok(())
}

// ── Select ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Select {
    entity: &'static EntityMeta,
    columns: Vec<&'static ColumnMeta>,
    joins: Vec<Join>,
    conditions: Vec<Condition>,
    order: Vec<(String, bool)>,
    limit: Option<u64>,
    offset: Option<u64>,
    dialect: Dialect,
    identifier_policy: IdentifierPolicy,
}

impl Select {
    pub fn new(entity: &'static EntityMeta, columns: Vec<&'static ColumnMeta>) -> Self {
        Self {
            entity,
            columns,
            joins: Vec::new(),
            conditions: Vec::new(),
            order: Vec::new(),
            limit: None,
            offset: None,
            dialect: Dialect::default(),
            identifier_policy: IdentifierPolicy::default(),
        }
    }

    /// Select the analyzed columns and join every eager-loaded relationship.
    ///
    /// With joins, the owner's primary-key columns are added to the select
    /// list when the projection leaves them out, since hydration groups the
    /// joined rows by them. The hydrated records then carry those extra keys
    /// next to the projected fields. `AnalysisResult::returning` is unchanged.
    pub fn for_analysis(analysis: &AnalysisResult) -> Result<Self, DataError> {
        let entity = analysis.entity;
        let mut select = Self::new(entity, analysis.returning.clone());
        for (index, load) in analysis.eager_loads.iter().enumerate() {
            let rel = load.relationship;
            if load.is_nested() {
                return Err(DataError::NotImplemented(format!(
                    "nested eager loading of {}.{}.{}",
                    entity.name,
                    rel.name,
                    load.nested.join(".")
                )));
            }
            let target = (rel.target)();
            check_join(entity, rel, target)?;
            select.joins.push(Join {
                relationship: rel,
                target,
                alias: format!("{}_{}", target.table, index + 1),
                inner: rel.uses_inner_join(entity),
            });
        }
        // Grouping joined rows needs the owner's key in every row.
        if !select.joins.is_empty() {
            for (pos, pk) in analysis.primary_keys.iter().enumerate() {
                if !select.columns.iter().any(|c| c.name == pk.name) {
                    select.columns.insert(pos.min(select.columns.len()), *pk);
                }
            }
        }
        Ok(select)
    }

    pub fn entity(&self) -> &'static EntityMeta {
        self.entity
    }

    pub fn joins(&self) -> &[Join] {
        &self.joins
    }

    pub fn dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    pub fn identifier_policy(mut self, policy: IdentifierPolicy) -> Self {
        self.identifier_policy = policy;
        self
    }

    pub fn order_by(mut self, column: &str, asc: bool) -> Self {
        self.order.push((column.to_string(), asc));
        self
    }

    pub fn limit(mut self, n: u64) -> Self {
        self.limit = Some(n);
        self
    }

    pub fn offset(mut self, n: u64) -> Self {
        self.offset = Some(n);
        self
    }

    pub fn get_limit(&self) -> Option<u64> {
        self.limit
    }

    pub fn compile(&self) -> Result<CompiledStatement, DataError> {
        if self.columns.is_empty() && self.joins.is_empty() {
            return Err(DataError::Build(format!(
                "select on {} has no columns",
                self.entity.name
            )));
        }
        let table_name = self.entity.table;
        let mut r = Renderer::new(self.dialect, self.identifier_policy);
        let table = r.ident(table_name, "table")?;

        let mut select_list = Vec::new();
        for column in &self.columns {
            select_list.push(r.qualified(table_name, column.name)?);
        }
        for join in &self.joins {
            for column in join.target.columns() {
                let source = r.qualified(&join.alias, column.name)?;
                let alias = r.alias(&format!("{}.{}", join.relationship.name, column.name));
                select_list.push(format!("{source} AS {alias}"));
            }
        }

        r.push("SELECT ");
        r.push(&select_list.join(", "));

        let wrap = !self.joins.is_empty() && (self.limit.is_some() || self.offset.is_some());
        if wrap {
            // Limit owner rows, not joined rows.
            let star = r.star(table_name)?;
            r.push(&format!(" FROM (SELECT {star} FROM {table}"));
            r.conditions(table_name, &self.conditions)?;
            r.order(table_name, &self.order)?;
            r.limit_offset(self.limit, self.offset);
            r.push(&format!(") AS {table}"));
        } else {
            r.push(&format!(" FROM {table}"));
        }

        for join in &self.joins {
            let target = r.ident(join.target.table, "table")?;
            let alias = r.ident(&join.alias, "table")?;
            let mut on = Vec::with_capacity(join.relationship.join.len());
            for (local, remote) in join.relationship.join {
                on.push(format!(
                    "{} = {}",
                    r.qualified(table_name, local)?,
                    r.qualified(&join.alias, remote)?
                ));
            }
            let kind = if join.inner { "JOIN" } else { "LEFT OUTER JOIN" };
            r.push(&format!(" {kind} {target} AS {alias} ON {}", on.join(" AND ")));
        }

        if wrap {
            r.order(table_name, &self.order)?;
        } else {
            r.conditions(table_name, &self.conditions)?;
            r.order(table_name, &self.order)?;
            r.limit_offset(self.limit, self.offset);
        }

        let plan = (!self.joins.is_empty()).then(|| self.load_plan());
        let (sql, params) = r.finish()?;
        Ok(CompiledStatement { sql, params, plan })
    }

    /// `SELECT COUNT(*)` over the owner rows matching this select's filters.
    pub fn compile_count(&self) -> Result<CompiledStatement, DataError> {
        let table_name = self.entity.table;
        let mut r = Renderer::new(self.dialect, self.identifier_policy);
        let table = r.ident(table_name, "table")?;
        r.push(&format!("SELECT COUNT(*) AS count FROM {table}"));
        r.conditions(table_name, &self.conditions)?;
        let (sql, params) = r.finish()?;
        Ok(CompiledStatement {
            sql,
            params,
            plan: None,
        })
    }

    pub(crate) fn verify(&self) -> Result<(), DataError> {
        let strict = self.identifier_policy.strict();
        self.clone().identifier_policy(strict).compile().map(drop)
    }

    fn load_plan(&self) -> LoadPlan {
        let keys: Vec<&'static str> = self
            .entity
            .primary_keys()
            .iter()
            .map(|c| c.name)
            .collect();
        let edges = self
            .joins
            .iter()
            .map(|join| EdgePlan {
                name: join.relationship.name,
                uselist: join.relationship.uselist(),
                columns: join.target.columns().map(|c| c.name).collect(),
                keys: join.target.primary_keys().iter().map(|c| c.name).collect(),
            })
            .collect();
        LoadPlan { keys, edges }
    }
}

impl Filter for Select {
    fn push_condition(&mut self, condition: Condition) {
        self.conditions.push(condition);
    }
}

fn check_join(
    owner: &EntityMeta,
    rel: &RelationshipMeta,
    target: &EntityMeta,
) -> Result<(), DataError> {
    if rel.join.is_empty() {
        return Err(DataError::Build(format!(
            "relationship {}.{} has no join condition",
            owner.name, rel.name
        )));
    }
    for (local, remote) in rel.join {
        if owner.column(local).is_none() || target.column(remote).is_none() {
            return Err(DataError::Build(format!(
                "relationship {}.{} joins unknown columns {local} = {remote}",
                owner.name, rel.name
            )));
        }
    }
    Ok(())
}

// ── Hydration ───────────────────────────────────────────────────────────────

/// How to fold the flat rows of an eager-loading select into records.
#[derive(Debug, Clone)]
pub struct LoadPlan {
    keys: Vec<&'static str>,
    edges: Vec<EdgePlan>,
}

#[derive(Debug, Clone)]
struct EdgePlan {
    name: &'static str,
    uselist: bool,
    columns: Vec<&'static str>,
    keys: Vec<&'static str>,
}

impl LoadPlan {
    /// Group rows by owner key in first-seen order, nesting joined columns
    /// under their relationship name. Collections are deduplicated by the
    /// target key; a fully null target key means "no related row".
    pub fn hydrate(&self, rows: Vec<Row>) -> Vec<Row> {
        let mut records: Vec<Row> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        // Child keys already attached, per record and edge.
        let mut seen: Vec<Vec<HashSet<String>>> = Vec::new();

        for mut row in rows {
            let nested: Vec<Row> = self
                .edges
                .iter()
                .map(|edge| {
                    edge.columns
                        .iter()
                        .map(|column| {
                            let value = row
                                .remove(&format!("{}.{column}", edge.name))
                                .unwrap_or(Value::Null);
                            (column.to_string(), value)
                        })
                        .collect()
                })
                .collect();

            let owner = key_of(&row, &self.keys);
            let position = match index.get(&owner) {
                Some(&position) => position,
                None => {
                    let mut record = row;
                    for edge in &self.edges {
                        let empty = if edge.uselist {
                            Value::Array(Vec::new())
                        } else {
                            Value::Null
                        };
                        record.insert(edge.name.to_string(), empty);
                    }
                    records.push(record);
                    seen.push(vec![HashSet::new(); self.edges.len()]);
                    index.insert(owner, records.len() - 1);
                    records.len() - 1
                }
            };

            let record = &mut records[position];
            for ((edge, child), seen) in self.edges.iter().zip(nested).zip(seen[position].iter_mut()) {
                if edge.keys.iter().all(|k| child.get(*k).map_or(true, Value::is_null)) {
                    continue;
                }
                if !seen.insert(key_of(&child, &edge.keys)) {
                    continue;
                }
                match record.get_mut(edge.name) {
                    Some(Value::Array(items)) if edge.uselist => items.push(Value::Object(child)),
                    Some(slot) => *slot = Value::Object(child),
                    None => {}
                }
            }
        }

        records
    }
}

/// Canonical text of the key columns of `row`, usable as a map key.
fn key_of(row: &Row, keys: &[&'static str]) -> String {
    let values: Vec<&Value> = keys
        .iter()
        .map(|k| row.get(*k).unwrap_or(&Value::Null))
        .collect();
    serde_json::to_string(&values).unwrap_or_default()
}

// ── Insert ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Insert {
    entity: &'static EntityMeta,
    values: Values,
    returning: Vec<&'static ColumnMeta>,
    dialect: Dialect,
    identifier_policy: IdentifierPolicy,
}

impl Insert {
    pub fn new(entity: &'static EntityMeta) -> Self {
        Self {
            entity,
            values: Values::new(),
            returning: Vec::new(),
            dialect: Dialect::default(),
            identifier_policy: IdentifierPolicy::default(),
        }
    }

    pub fn dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    pub fn identifier_policy(mut self, policy: IdentifierPolicy) -> Self {
        self.identifier_policy = policy;
        self
    }

    /// Set the inserted values. Every key must name a column.
    pub fn values(mut self, values: Values) -> Result<Self, DataError> {
        check_columns(self.entity, &values)?;
        self.values = values;
        Ok(self)
    }

    pub fn returning(mut self, columns: Vec<&'static ColumnMeta>) -> Self {
        self.returning = columns;
        self
    }

    pub fn compile(&self) -> Result<CompiledStatement, DataError> {
        let mut r = Renderer::new(self.dialect, self.identifier_policy);
        let table = r.ident(self.entity.table, "table")?;
        r.push(&format!("INSERT INTO {table}"));
        render_values(&mut r, &self.values)?;
        render_returning(&mut r, &self.returning)?;
        let (sql, params) = r.finish()?;
        Ok(CompiledStatement {
            sql,
            params,
            plan: None,
        })
    }

    pub(crate) fn verify(&self) -> Result<(), DataError> {
        let strict = self.identifier_policy.strict();
        self.clone().identifier_policy(strict).compile().map(drop)
    }
}

fn render_values(r: &mut Renderer, values: &Values) -> Result<(), DataError> {
    if values.is_empty() {
        r.push(" DEFAULT VALUES");
        return Ok(());
    }
    let mut cols = Vec::with_capacity(values.len());
    let mut placeholders = Vec::with_capacity(values.len());
    for (key, value) in values {
        cols.push(r.ident(key, "column")?);
        placeholders.push(r.bind(value.clone()));
    }
    r.push(&format!(" ({}) VALUES ({})", cols.join(", "), placeholders.join(", ")));
    Ok(())
}

// ── Update ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Update {
    entity: &'static EntityMeta,
    values: Values,
    conditions: Vec<Condition>,
    returning: Vec<&'static ColumnMeta>,
    dialect: Dialect,
    identifier_policy: IdentifierPolicy,
}

impl Update {
    pub fn new(entity: &'static EntityMeta) -> Self {
        Self {
            entity,
            values: Values::new(),
            conditions: Vec::new(),
            returning: Vec::new(),
            dialect: Dialect::default(),
            identifier_policy: IdentifierPolicy::default(),
        }
    }

    pub fn dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    pub fn identifier_policy(mut self, policy: IdentifierPolicy) -> Self {
        self.identifier_policy = policy;
        self
    }

    pub fn values(mut self, values: Values) -> Result<Self, DataError> {
        check_columns(self.entity, &values)?;
        self.values = values;
        Ok(self)
    }

    pub fn returning(mut self, columns: Vec<&'static ColumnMeta>) -> Self {
        self.returning = columns;
        self
    }

    pub fn compile(&self) -> Result<CompiledStatement, DataError> {
        if self.values.is_empty() {
            return Err(DataError::Argument(format!(
                "update of {} without values",
                self.entity.name
            )));
        }
        let table_name = self.entity.table;
        let mut r = Renderer::new(self.dialect, self.identifier_policy);
        let table = r.ident(table_name, "table")?;
        let mut sets = Vec::with_capacity(self.values.len());
        for (key, value) in &self.values {
            let col = r.ident(key, "column")?;
            sets.push(format!("{col} = {}", r.bind(value.clone())));
        }
        r.push(&format!("UPDATE {table} SET {}", sets.join(", ")));
        r.conditions(table_name, &self.conditions)?;
        render_returning(&mut r, &self.returning)?;
        let (sql, params) = r.finish()?;
        Ok(CompiledStatement {
            sql,
            params,
            plan: None,
        })
    }

    /// Templates carry no values yet, so only identifiers are checked.
    pub(crate) fn verify(&self) -> Result<(), DataError> {
        let mut r = Renderer::new(self.dialect, self.identifier_policy.strict());
        r.ident(self.entity.table, "table")?;
        for key in self.values.keys() {
            r.ident(key, "column")?;
        }
        r.conditions(self.entity.table, &self.conditions)?;
        render_returning(&mut r, &self.returning)?;
        Ok(())
    }
}

impl Filter for Update {
    fn push_condition(&mut self, condition: Condition) {
        self.conditions.push(condition);
    }
}

// ── Delete ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Delete {
    entity: &'static EntityMeta,
    conditions: Vec<Condition>,
    returning: Vec<&'static ColumnMeta>,
    dialect: Dialect,
    identifier_policy: IdentifierPolicy,
}

impl Delete {
    pub fn new(entity: &'static EntityMeta) -> Self {
        Self {
            entity,
            conditions: Vec::new(),
            returning: Vec::new(),
            dialect: Dialect::default(),
            identifier_policy: IdentifierPolicy::default(),
        }
    }

    pub fn dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    pub fn identifier_policy(mut self, policy: IdentifierPolicy) -> Self {
        self.identifier_policy = policy;
        self
    }

    pub fn returning(mut self, columns: Vec<&'static ColumnMeta>) -> Self {
        self.returning = columns;
        self
    }

    pub fn compile(&self) -> Result<CompiledStatement, DataError> {
        let table_name = self.entity.table;
        let mut r = Renderer::new(self.dialect, self.identifier_policy);
        let table = r.ident(table_name, "table")?;
        r.push(&format!("DELETE FROM {table}"));
        r.conditions(table_name, &self.conditions)?;
        render_returning(&mut r, &self.returning)?;
        let (sql, params) = r.finish()?;
        Ok(CompiledStatement {
            sql,
            params,
            plan: None,
        })
    }

    pub(crate) fn verify(&self) -> Result<(), DataError> {
        let strict = self.identifier_policy.strict();
        self.clone().identifier_policy(strict).compile().map(drop)
    }
}

impl Filter for Delete {
    fn push_condition(&mut self, condition: Condition) {
        self.conditions.push(condition);
    }
}

// ── Upsert ──────────────────────────────────────────────────────────────────

/// Insert-or-update keyed on the primary key.
#[derive(Debug, Clone)]
pub struct Upsert {
    entity: &'static EntityMeta,
    conflict_target: Vec<&'static ColumnMeta>,
    keys: Values,
    values: Values,
    returning: Vec<&'static ColumnMeta>,
    dialect: Dialect,
    identifier_policy: IdentifierPolicy,
}

impl Upsert {
    pub fn new(entity: &'static EntityMeta) -> Self {
        Self {
            entity,
            conflict_target: entity.primary_keys(),
            keys: Values::new(),
            values: Values::new(),
            returning: Vec::new(),
            dialect: Dialect::default(),
            identifier_policy: IdentifierPolicy::default(),
        }
    }

    pub fn dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    pub fn identifier_policy(mut self, policy: IdentifierPolicy) -> Self {
        self.identifier_policy = policy;
        self
    }

    /// Split `values` into key columns and updatable columns.
    pub fn values(mut self, values: Values) -> Result<Self, DataError> {
        check_columns(self.entity, &values)?;
        let mut keys = Values::new();
        let mut rest = Values::new();
        for (key, value) in values {
            if self.conflict_target.iter().any(|c| c.name == key) {
                keys.insert(key, value);
            } else {
                rest.insert(key, value);
            }
        }
        self.keys = keys;
        self.values = rest;
        Ok(self)
    }

    pub fn returning(mut self, columns: Vec<&'static ColumnMeta>) -> Self {
        self.returning = columns;
        self
    }

    pub fn compile(&self) -> Result<CompiledStatement, DataError> {
        let mut r = Renderer::new(self.dialect, self.identifier_policy);
        let table = r.ident(self.entity.table, "table")?;
        r.push(&format!("INSERT INTO {table}"));

        let mut all = self.keys.clone();
        for (key, value) in &self.values {
            all.insert(key.clone(), value.clone());
        }
        render_values(&mut r, &all)?;

        let mut target = Vec::with_capacity(self.conflict_target.len());
        for column in &self.conflict_target {
            target.push(r.ident(column.name, "column")?);
        }
        r.push(&format!(" ON CONFLICT ({})", target.join(", ")));
        if self.values.is_empty() {
            r.push(" DO NOTHING");
        } else {
            let mut sets = Vec::with_capacity(self.values.len());
            for key in self.values.keys() {
                let col = r.ident(key, "column")?;
                sets.push(format!("{col} = excluded.{col}"));
            }
            r.push(&format!(" DO UPDATE SET {}", sets.join(", ")));
        }
        render_returning(&mut r, &self.returning)?;
        let (sql, params) = r.finish()?;
        Ok(CompiledStatement {
            sql,
            params,
            plan: None,
        })
    }

    pub(crate) fn verify(&self) -> Result<(), DataError> {
        if self.conflict_target.is_empty() {
            return Err(DataError::Build(format!(
                "upsert on {} has no conflict target",
                self.entity.name
            )));
        }
        let strict = self.identifier_policy.strict();
        self.clone().identifier_policy(strict).compile().map(drop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::analyze;
    use crate::entity::{Attribute, ColumnType, SchemaDescriptor};
    use serde_json::json;

    static PARENT_ATTRS: [Attribute; 3] = [
        Attribute::Column(ColumnMeta::new("id", ColumnType::Integer).primary_key()),
        Attribute::Column(ColumnMeta::new("name", ColumnType::Text)),
        Attribute::Relationship(RelationshipMeta::one_to_many(
            "children",
            child_meta,
            &[("id", "parent_id")],
        )),
    ];
    static PARENT: EntityMeta = EntityMeta::new("Parent", "parents", &PARENT_ATTRS);

    static CHILD_ATTRS: [Attribute; 3] = [
        Attribute::Column(ColumnMeta::new("id", ColumnType::Integer).primary_key()),
        Attribute::Column(ColumnMeta::new("parent_id", ColumnType::Integer)),
        Attribute::Column(ColumnMeta::new("name", ColumnType::Text)),
    ];
    static CHILD: EntityMeta = EntityMeta::new("Child", "children", &CHILD_ATTRS);

    fn parent_meta() -> &'static EntityMeta {
        &PARENT
    }

    fn child_meta() -> &'static EntityMeta {
        &CHILD
    }

    static PARENT_SCHEMA: SchemaDescriptor = SchemaDescriptor::entity("Parent", parent_meta);

    fn parent_schema() -> &'static SchemaDescriptor {
        &PARENT_SCHEMA
    }

    static WITH_CHILDREN: SchemaDescriptor =
        SchemaDescriptor::projection("ParentWithChildren", parent_schema, &["name", "children"]);

    fn values(pairs: &[(&str, Value)]) -> Values {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_select_with_filter() {
        let analysis = analyze(&PARENT_SCHEMA).unwrap();
        let compiled = Select::for_analysis(&analysis)
            .unwrap()
            .where_eq("id", 3)
            .order_by("name", true)
            .limit(5)
            .compile()
            .unwrap();
        assert_eq!(
            compiled.sql,
            "SELECT parents.id, parents.name FROM parents WHERE parents.id = ? ORDER BY parents.name ASC LIMIT 5"
        );
        assert_eq!(compiled.params, vec![json!(3)]);
        assert!(compiled.plan.is_none());
    }

    #[test]
    fn test_eager_select_joins_once() {
        let analysis = analyze(&WITH_CHILDREN).unwrap();
        let compiled = Select::for_analysis(&analysis).unwrap().compile().unwrap();
        assert_eq!(
            compiled.sql,
            "SELECT parents.id, parents.name, children_1.id AS \"children.id\", \
             children_1.parent_id AS \"children.parent_id\", children_1.name AS \"children.name\" \
             FROM parents LEFT OUTER JOIN children AS children_1 ON parents.id = children_1.parent_id"
        );
        assert!(compiled.plan.is_some());
    }

    #[test]
    fn test_eager_select_limits_owner_rows() {
        let analysis = analyze(&WITH_CHILDREN).unwrap();
        let compiled = Select::for_analysis(&analysis)
            .unwrap()
            .where_gt("id", 1)
            .limit(2)
            .offset(4)
            .compile()
            .unwrap();
        assert!(compiled.sql.contains(
            "FROM (SELECT parents.* FROM parents WHERE parents.id > ? LIMIT 2 OFFSET 4) AS parents"
        ));
        assert_eq!(compiled.params, vec![json!(1)]);
    }

    #[test]
    fn test_hydrate_groups_and_dedups() {
        let analysis = analyze(&WITH_CHILDREN).unwrap();
        let compiled = Select::for_analysis(&analysis).unwrap().compile().unwrap();
        let row = |id: i64, child: Value, child_name: Value| {
            values(&[
                ("id", json!(id)),
                ("name", json!(format!("p{id}"))),
                ("children.id", child),
                ("children.parent_id", json!(id)),
                ("children.name", child_name),
            ])
        };
        let rows = vec![
            row(1, json!(10), json!("a")),
            row(1, json!(11), json!("b")),
            row(1, json!(10), json!("a")),
            row(2, Value::Null, Value::Null),
        ];
        let records = compiled.hydrate(rows);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["children"].as_array().map(Vec::len), Some(2));
        assert_eq!(records[0]["children"][1]["name"], json!("b"));
        assert_eq!(records[1]["children"], json!([]));
        assert!(records[0].get("children.id").is_none());
    }

    #[test]
    fn test_hydrate_many_interleaved_owners() {
        let analysis = analyze(&WITH_CHILDREN).unwrap();
        let compiled = Select::for_analysis(&analysis).unwrap().compile().unwrap();
        let owners = 20_000i64;
        let rows: Vec<Row> = (0..2)
            .flat_map(|round| {
                (0..owners).map(move |id| {
                    values(&[
                        ("id", json!(id)),
                        ("name", json!("p")),
                        ("children.id", json!(id * 2 + round)),
                        ("children.parent_id", json!(id)),
                        ("children.name", json!("c")),
                    ])
                })
            })
            .collect();

        let started = std::time::Instant::now();
        let records = compiled.hydrate(rows);
        assert!(started.elapsed() < std::time::Duration::from_secs(10));

        assert_eq!(records.len(), owners as usize);
        assert_eq!(records[7]["id"], json!(7));
        assert_eq!(records[7]["children"], json!([
            {"id": 14, "parent_id": 7, "name": "c"},
            {"id": 15, "parent_id": 7, "name": "c"},
        ]));
    }

    #[test]
    fn test_eager_select_adds_owner_key_only_to_select_list() {
        let analysis = analyze(&WITH_CHILDREN).unwrap();
        assert_eq!(analysis.returning_names(), vec!["name"]);

        let select = Select::for_analysis(&analysis).unwrap();
        let names: Vec<_> = select.columns.iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["id", "name"]);
        assert_eq!(analysis.returning_names(), vec!["name"]);

        static NAME_ONLY: SchemaDescriptor =
            SchemaDescriptor::projection("NameOnly", parent_schema, &["name"]);
        let plain = analyze(&NAME_ONLY).unwrap();
        let select = Select::for_analysis(&plain).unwrap();
        assert_eq!(select.columns.len(), 1);
    }

    #[test]
    fn test_offset_only_select_on_sqlite() {
        let compiled = Select::new(&PARENT, PARENT.columns().collect())
            .dialect(Dialect::Sqlite)
            .offset(3)
            .compile()
            .unwrap();
        assert_eq!(
            compiled.sql,
            "SELECT parents.id, parents.name FROM parents LIMIT -1 OFFSET 3"
        );
    }

    #[test]
    fn test_insert_returning() {
        let compiled = Insert::new(&PARENT)
            .values(values(&[("name", json!("Ann"))]))
            .unwrap()
            .returning(PARENT.primary_keys())
            .dialect(Dialect::Postgres)
            .compile()
            .unwrap();
        assert_eq!(compiled.sql, "INSERT INTO parents (name) VALUES ($1) RETURNING id");
    }

    #[test]
    fn test_insert_default_values() {
        let compiled = Insert::new(&PARENT).compile().unwrap();
        assert_eq!(compiled.sql, "INSERT INTO parents DEFAULT VALUES");
    }

    #[test]
    fn test_insert_rejects_unknown_column() {
        let err = Insert::new(&PARENT)
            .values(values(&[("age", json!(3))]))
            .unwrap_err();
        assert!(matches!(err, DataError::Argument(_)));
    }

    #[test]
    fn test_update_and_delete() {
        let update = Update::new(&PARENT)
            .values(values(&[("name", json!("Bob")), ("id", Value::Null)]))
            .unwrap()
            .where_eq("id", 1)
            .returning(PARENT.columns().collect())
            .compile()
            .unwrap();
        assert_eq!(
            update.sql,
            "UPDATE parents SET name = ?, id = NULL WHERE parents.id = ? RETURNING id, name"
        );
        assert_eq!(update.params, vec![json!("Bob"), json!(1)]);

        let delete = Delete::new(&PARENT)
            .where_eq("id", 1)
            .returning(PARENT.primary_keys())
            .compile()
            .unwrap();
        assert_eq!(delete.sql, "DELETE FROM parents WHERE parents.id = ? RETURNING id");
    }

    #[test]
    fn test_update_template_verifies_without_values() {
        assert!(Update::new(&PARENT).verify().is_ok());
        assert!(matches!(
            Update::new(&PARENT).compile(),
            Err(DataError::Argument(_))
        ));
    }

    #[test]
    fn test_upsert() {
        let compiled = Upsert::new(&PARENT)
            .values(values(&[("id", json!(1)), ("name", json!("Ann"))]))
            .unwrap()
            .compile()
            .unwrap();
        assert_eq!(
            compiled.sql,
            "INSERT INTO parents (id, name) VALUES (?, ?) ON CONFLICT (id) DO UPDATE SET name = excluded.name"
        );

        let keys_only = Upsert::new(&PARENT)
            .values(values(&[("id", json!(1))]))
            .unwrap()
            .compile()
            .unwrap();
        assert!(keys_only.sql.ends_with("ON CONFLICT (id) DO NOTHING"));
    }

    #[test]
    fn test_quote_policy() {
        let compiled = Select::new(&PARENT, PARENT.columns().collect())
            .identifier_policy(IdentifierPolicy::Quote)
            .where_eq("name", "x")
            .compile()
            .unwrap();
        assert_eq!(
            compiled.sql,
            "SELECT \"parents\".\"id\", \"parents\".\"name\" FROM \"parents\" WHERE \"parents\".\"name\" = ?"
        );
    }

    #[test]
    fn test_broken_join_fails_build() {
        static BROKEN_ATTRS: [Attribute; 2] = [
            Attribute::Column(ColumnMeta::new("id", ColumnType::Integer).primary_key()),
            Attribute::Relationship(RelationshipMeta::one_to_many(
                "children",
                child_meta,
                &[("id", "owner_id")],
            )),
        ];
        static BROKEN: EntityMeta = EntityMeta::new("Broken", "broken", &BROKEN_ATTRS);
        fn broken() -> &'static EntityMeta {
            &BROKEN
        }
        static BROKEN_SCHEMA: SchemaDescriptor = SchemaDescriptor::entity("Broken", broken);
        fn broken_schema() -> &'static SchemaDescriptor {
            &BROKEN_SCHEMA
        }
        static VIEW: SchemaDescriptor =
            SchemaDescriptor::projection("BrokenView", broken_schema, &["id", "children"]);

        let analysis = analyze(&VIEW).unwrap();
        assert!(matches!(
            Select::for_analysis(&analysis),
            Err(DataError::Build(_))
        ));
    }
}
