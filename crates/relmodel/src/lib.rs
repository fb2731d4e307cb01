//! relmodel: an annotation-driven ORM with batched unit-of-work persistence.
//!
//! Models are structs deriving [`Entity`], carrying table and column
//! declarations as `#[orm(...)]` attributes. A [`Session`] owns the database
//! adapter, the schema mapper cache, the model registry, and the
//! unit-of-work tracker; queued changes apply on [`Session::flush`] as one
//! batched statement per table, in update → insert → delete order.
//!
//! ```ignore
//! use relmodel::{Entity, ModelBase, Session, shared};
//!
//! #[derive(Clone, Entity)]
//! #[orm(table(kind = "Entity", name = "bar", allow_schema_update = true))]
//! struct Bar {
//!     base: ModelBase,
//!     #[orm(column(kind = "varchar", length = 100))]
//!     name: String,
//! }
//!
//! let mut session = Session::new(adapter);
//! session.register::<Bar>();
//!
//! let bar = shared(Bar::create());
//! session.persist(&bar);
//! session.flush()?;
//!
//! let found = session.repository::<Bar>().find(1)?;
//! ```

pub use relmodel_core::{
    ColumnDecl, ColumnInfo, ColumnType, DatabaseAdapter, Error, FromValue, ID_COLUMN, IndexDecl,
    MODEL_BASE_TABLE, ManyToOneDecl, Model, ModelBase, ModelDecl, ModelFactory, ModelHooks,
    ModelRef, ModelRegistry, ObjectToken, Placeholder, ResolvedColumn, ResolvedIndex,
    ResolvedManyToOne, Result, Row, SchemaInfo, SharedModel, TableDecl, TranslationService, Value,
    erase, read_model, shared, write_model,
};
pub use relmodel_core::Entity;
pub use relmodel_macros::Entity;
pub use relmodel_query::{
    BuildEnv, BuiltQuery, Comparison, ConditionValue, Connective, GroupBuilder, QueryBuilder,
    SelectPlan, Where,
};
pub use relmodel_schema::{
    Mapper, create_table_sql, drop_table, foreign_key_sql, update_schema,
};
pub use relmodel_session::{
    ChangeKind, Query, Repository, Session, TableData, TrackedCollection,
};
