//! Declaration resolution.
//!
//! `Mapper` turns static `ModelDecl`s into validated `SchemaInfo`, memoized
//! per model name. The cache is filled on first resolution and entries are
//! immutable afterward; declarations are never re-read at request time.

use relmodel_core::decl::{ModelDecl, TableDecl};
use relmodel_core::error::{Error, Result};
use relmodel_core::registry::ModelRegistry;
use relmodel_core::schema::{
    ColumnType, ResolvedColumn, ResolvedIndex, ResolvedManyToOne, SchemaInfo,
};
use relmodel_core::Entity;
use std::collections::HashMap;
use std::sync::Arc;

/// Memoizing resolver from declarations to schema metadata.
#[derive(Default)]
pub struct Mapper {
    cache: HashMap<&'static str, Arc<SchemaInfo>>,
}

impl Mapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a model type's schema.
    pub fn resolve<M: Entity>(&mut self, registry: &ModelRegistry) -> Result<Arc<SchemaInfo>> {
        self.resolve_decl(M::DECL, registry)
    }

    /// Resolve a declaration, returning the cached schema after the first
    /// call.
    pub fn resolve_decl(
        &mut self,
        decl: &'static ModelDecl,
        registry: &ModelRegistry,
    ) -> Result<Arc<SchemaInfo>> {
        if let Some(schema) = self.cache.get(decl.model) {
            return Ok(Arc::clone(schema));
        }

        let schema = Arc::new(build_schema(decl, registry)?);
        tracing::debug!(
            model = decl.model,
            table = schema.table,
            columns = schema.columns.len(),
            "resolved model schema"
        );
        self.cache.insert(decl.model, Arc::clone(&schema));
        Ok(schema)
    }
}

/// Table-level fields after the single-level inheritance merge.
struct MergedTable {
    kind: Option<&'static str>,
    name: Option<&'static str>,
    prefix: Option<&'static str>,
    allow_schema_update: Option<bool>,
    allow_drop: Option<bool>,
    repository: Option<&'static str>,
    column_order: &'static [&'static str],
    translations: bool,
}

/// Merge table-level fields: anything unset on the child is copied from the
/// parent. One level only; the parent's own `inherits` is ignored.
fn merge_table(table: &TableDecl) -> MergedTable {
    let parent = table.inherits;
    let pick = |child: Option<&'static str>, parent_field: fn(&TableDecl) -> Option<&'static str>| {
        child.or_else(|| parent.and_then(parent_field))
    };

    MergedTable {
        kind: pick(table.kind, |p| p.kind),
        name: pick(table.name, |p| p.name),
        prefix: pick(table.prefix, |p| p.prefix),
        allow_schema_update: table
            .allow_schema_update
            .or_else(|| parent.and_then(|p| p.allow_schema_update)),
        allow_drop: table
            .allow_drop
            .or_else(|| parent.and_then(|p| p.allow_drop)),
        repository: pick(table.repository, |p| p.repository),
        column_order: if table.column_order.is_empty() {
            parent.map_or(&[], |p| p.column_order)
        } else {
            table.column_order
        },
        translations: table.translations || parent.is_some_and(|p| p.translations),
    }
}

fn build_schema(decl: &'static ModelDecl, registry: &ModelRegistry) -> Result<SchemaInfo> {
    let merged = merge_table(&decl.table);

    let kind = merged.kind.ok_or(Error::RequiredAnnotationMissing {
        annotation: "type",
        model: decl.model,
    })?;
    let name = merged.name.ok_or(Error::RequiredAnnotationMissing {
        annotation: "name",
        model: decl.model,
    })?;
    let allow_schema_update = merged
        .allow_schema_update
        .ok_or(Error::RequiredAnnotationMissing {
            annotation: "allow_schema_update",
            model: decl.model,
        })?;

    if let Some(repository) = merged.repository {
        if !registry.has_repository(repository) {
            return Err(Error::RepositoryClassNotDefined {
                name: repository.to_string(),
                model: decl.model.to_string(),
            });
        }
    }

    // Indexes come from the child declaration only.
    let mut indexes = Vec::with_capacity(decl.table.indexes.len());
    for index in decl.table.indexes {
        let index_name = index.name.ok_or(Error::IncompleteIndex { model: decl.model })?;
        if index.columns.is_empty() {
            return Err(Error::IncompleteIndex { model: decl.model });
        }
        indexes.push(ResolvedIndex {
            name: index_name,
            columns: index.columns.to_vec(),
        });
    }

    let mut columns = Vec::with_capacity(decl.columns.len());
    for (property, column) in decl.columns {
        let property = *property;
        let kind = ColumnType::parse(column.kind).ok_or_else(|| Error::UnknownColumnType {
            declared: column.kind.to_string(),
            model: decl.model,
        })?;

        let many_to_one = match &column.many_to_one {
            Some(m2o) => {
                let (Some(model), Some(target_property)) = (m2o.model, m2o.property) else {
                    return Err(Error::IncompleteManyToOne {
                        model: decl.model,
                        property,
                    });
                };
                Some(ResolvedManyToOne {
                    model,
                    property: target_property,
                    on_delete: m2o.on_delete,
                })
            }
            None => None,
        };

        // Server-maintained timestamps never join INSERT/UPDATE column sets.
        let allow_update = column.allow_update && kind != ColumnType::Timestamp;

        columns.push(ResolvedColumn {
            property,
            kind,
            length: column.length,
            null: column.null,
            default: column.default,
            primary: column.primary,
            auto_increment: column.auto_increment,
            allow_update,
            i18n: column.i18n,
            many_to_one,
            placeholder: kind.placeholder(),
            schema_string: schema_string(property, kind, column),
        });
    }

    sort_columns(&mut columns, merged.column_order);

    Ok(SchemaInfo {
        model: decl.model,
        kind,
        table: name,
        prefix: merged.prefix,
        allow_schema_update,
        allow_drop: merged.allow_drop.unwrap_or(false),
        repository: merged.repository,
        indexes,
        translations: merged.translations,
        columns,
    })
}

/// DDL fragment for one column.
fn schema_string(
    property: &str,
    kind: ColumnType,
    column: &relmodel_core::decl::ColumnDecl,
) -> String {
    let mut sql = format!("{} {}", property, kind.sql_name());

    if let Some(length) = column.length {
        sql.push_str(&format!("({})", length));
    }
    if let Some(null) = column.null {
        sql.push(' ');
        sql.push_str(null);
    }
    if let Some(default) = column.default {
        sql.push_str(" DEFAULT ");
        sql.push_str(default);
    }
    if column.primary || column.auto_increment {
        sql.push_str(" auto_increment");
    }

    sql
}

/// Apply the explicit column order: listed columns first, in the given
/// order; the rest keep declaration order.
fn sort_columns(columns: &mut Vec<ResolvedColumn>, order: &[&str]) {
    if order.is_empty() {
        return;
    }

    let mut sorted = Vec::with_capacity(columns.len());
    for name in order {
        if let Some(pos) = columns.iter().position(|c| c.property == *name) {
            sorted.push(columns.remove(pos));
        }
    }
    sorted.append(columns);
    *columns = sorted;
}
