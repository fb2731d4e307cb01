//! Schema mapping for relmodel.
//!
//! `relmodel-schema` is the **metadata derivation layer**. It resolves the
//! static declarations emitted by `#[derive(Entity)]` into validated
//! `SchemaInfo` (memoized per model), renders CREATE TABLE and foreign-key
//! DDL, and guards the destructive schema operations behind the per-table
//! `allow_schema_update` / `allow_drop` flags.

pub mod ddl;
pub mod mapper;

pub use ddl::{create_table_sql, drop_table, foreign_key_sql, update_schema};
pub use mapper::Mapper;
