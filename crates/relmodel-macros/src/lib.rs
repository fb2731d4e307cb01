//! Procedural macros for relmodel.
//!
//! `relmodel-macros` is the **compile-time declaration layer**. The
//! `#[derive(Entity)]` macro turns a struct with `#[orm(...)]` attributes
//! into a static `ModelDecl` (the annotation equivalent, read once by the
//! mapper) plus the `Model`/`Entity` trait implementations with
//! name-matched accessors.

use proc_macro::TokenStream;

mod expand;
mod parse;

/// Derive macro for relmodel entities.
///
/// The struct must carry a `base: ModelBase` field (which provides the
/// inherited `ID` primary column) and derive `Clone`. Fields without a
/// `#[orm(column(...))]` attribute are not mapped and are defaulted on
/// `create()`.
///
/// # Attributes
///
/// Struct level, inside `#[orm(table(...))]`:
///
/// - `kind = "Entity"` — declaration kind (required at resolution)
/// - `name = "foo"` — bare table name (required at resolution)
/// - `prefix = "mod"` — table prefix between the adapter prefix and name
/// - `allow_schema_update = true` — required at resolution
/// - `allow_drop = true` — gate for drop_table
/// - `repository = "FooRepository"` — custom repository name
/// - `inherits = "BAR_TABLE"` — path to a parent `TableDecl` const
/// - `column_order("ID", "date_add")` — explicit column ordering
/// - `index(name = "name_index", columns("name"))` — repeatable
/// - `translations` — this model has a translation shadow table
///
/// `#[orm(custom_hooks)]` skips the generated empty `ModelHooks` impl so
/// the model can provide its own `before_save` / `after_load`.
///
/// Field level, inside `#[orm(column(...))]`:
///
/// - `kind = "varchar"` — declared column type (validated at resolution)
/// - `length = 100`, `null = "NOT NULL"`, `default = "CURRENT_TIMESTAMP"`
/// - `primary`, `auto_increment`, `no_update`, `i18n` — flags
/// - `many_to_one(model = "Bar", property = "ID", on_delete = "CASCADE")`
///
/// # Example
///
/// ```ignore
/// use relmodel::{Entity, ModelBase};
///
/// #[derive(Clone, Entity)]
/// #[orm(table(kind = "Entity", name = "bar", allow_schema_update = true))]
/// struct Bar {
///     base: ModelBase,
///     #[orm(column(kind = "varchar", length = 100))]
///     name: String,
/// }
/// ```
#[proc_macro_derive(Entity, attributes(orm))]
pub fn derive_entity(input: TokenStream) -> TokenStream {
    let input = syn::parse_macro_input!(input as syn::DeriveInput);

    let def = match parse::parse_entity(&input) {
        Ok(def) => def,
        Err(error) => return error.to_compile_error().into(),
    };

    expand::expand(&def).into()
}
