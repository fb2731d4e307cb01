//! DDL rendering and guarded schema operations.

use crate::mapper::Mapper;
use relmodel_core::adapter::DatabaseAdapter;
use relmodel_core::error::{Error, Result};
use relmodel_core::registry::ModelRegistry;
use relmodel_core::schema::SchemaInfo;

/// Render the CREATE TABLE statement for a resolved schema.
///
/// Shape: `CREATE TABLE <table> (<col defs>, PRIMARY KEY (<pk>),
/// INDEX <name> (<cols>)) <charset>;`
pub fn create_table_sql(schema: &SchemaInfo, adapter_prefix: &str, charset_collate: &str) -> String {
    let mut parts: Vec<String> = schema
        .columns
        .iter()
        .map(|c| c.schema_string.clone())
        .collect();

    let primary = schema.primary_keys();
    if !primary.is_empty() {
        parts.push(format!("PRIMARY KEY ({})", primary.join(", ")));
    }

    for index in &schema.indexes {
        parts.push(format!("INDEX {} ({})", index.name, index.columns.join(",")));
    }

    format!(
        "CREATE TABLE {} ({}) {};",
        schema.table_name(adapter_prefix),
        parts.join(", "),
        charset_collate
    )
}

/// Render the foreign-key constraint statements for a resolved schema.
///
/// One `ALTER TABLE ... ADD CONSTRAINT fk_<col> FOREIGN KEY ...` per
/// many-to-one; target tables are resolved through the registry.
pub fn foreign_key_sql(
    mapper: &mut Mapper,
    registry: &ModelRegistry,
    schema: &SchemaInfo,
    adapter_prefix: &str,
) -> Result<Vec<String>> {
    let mut statements = Vec::new();

    for (property, many_to_one) in schema.foreign_keys() {
        let factory = registry.require(many_to_one.model, schema.model)?;
        let target = mapper.resolve_decl(factory.decl(), registry)?;

        statements.push(format!(
            "ALTER TABLE {} ADD CONSTRAINT fk_{} FOREIGN KEY ({}) REFERENCES {} ({}) ON DELETE {}",
            schema.table_name(adapter_prefix),
            property,
            property,
            target.table_name(adapter_prefix),
            many_to_one.property,
            many_to_one.on_delete
        ));
    }

    Ok(statements)
}

/// Reconcile the database table with the model schema.
///
/// Refuses with `AllowSchemaUpdateIsFalse` when the declaration pins the
/// table; otherwise delegates to the adapter's migration mechanism.
pub fn update_schema(adapter: &mut dyn DatabaseAdapter, schema: &SchemaInfo) -> Result<()> {
    if !schema.allow_schema_update {
        return Err(Error::AllowSchemaUpdateIsFalse {
            model: schema.model,
        });
    }

    tracing::debug!(model = schema.model, table = schema.table, "updating schema");
    adapter.update_schema(schema)
}

/// Drop the model's table.
///
/// Guarded twice: schema updates must be allowed, and the drop flag must be
/// set explicitly.
pub fn drop_table(adapter: &mut dyn DatabaseAdapter, schema: &SchemaInfo) -> Result<()> {
    if !schema.allow_schema_update {
        return Err(Error::AllowSchemaUpdateIsFalse {
            model: schema.model,
        });
    }
    if !schema.allow_drop {
        return Err(Error::AllowDropIsFalse {
            model: schema.model,
        });
    }

    let table = schema.table_name(adapter.prefix());
    tracing::debug!(model = schema.model, table = %table, "dropping table");
    adapter.execute(&format!("DROP TABLE IF EXISTS {}", table), &[])?;
    Ok(())
}
