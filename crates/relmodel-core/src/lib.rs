//! Core types and traits for relmodel.
//!
//! This crate provides the foundational abstractions for the ORM:
//!
//! - `Model` / `Entity` traits for declaration-driven struct mapping
//! - `ModelDecl` static declarations (the annotation equivalents)
//! - `SchemaInfo` resolved metadata shared by query and persistence layers
//! - `DatabaseAdapter` and `TranslationService` collaborator boundaries
//! - the error taxonomy and dynamic `Value` type

pub mod adapter;
pub mod decl;
pub mod error;
pub mod i18n;
pub mod model;
pub mod registry;
pub mod row;
pub mod schema;
pub mod value;

pub use adapter::DatabaseAdapter;
pub use decl::{
    ColumnDecl, ID_COLUMN, IndexDecl, MODEL_BASE_TABLE, ManyToOneDecl, ModelDecl, TableDecl,
};
pub use error::{Error, Result};
pub use i18n::TranslationService;
pub use model::{
    Entity, Model, ModelBase, ModelHooks, ModelRef, ObjectToken, SharedModel, erase, read_model,
    shared, write_model,
};
pub use registry::{ModelFactory, ModelRegistry};
pub use row::{ColumnInfo, Row};
pub use schema::{
    ColumnType, Placeholder, ResolvedColumn, ResolvedIndex, ResolvedManyToOne, SchemaInfo,
};
pub use value::{FromValue, Value};
