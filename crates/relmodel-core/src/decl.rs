//! Static model declarations.
//!
//! These are the annotation equivalents: `#[derive(Entity)]` emits one
//! `ModelDecl` static per model, read once by the mapper and never again.
//! Declared column types are plain strings here; the mapper validates them
//! against the supported whitelist during resolution.

/// Table-level declaration.
///
/// All required fields are optional at the declaration level; the mapper
/// fails resolution with `RequiredAnnotationMissing` when `kind`, `name`, or
/// `allow_schema_update` is left unset after the inheritance merge.
#[derive(Debug, Clone, Copy)]
pub struct TableDecl {
    /// Declaration kind (surfaced as `type` in diagnostics, e.g. "Entity").
    pub kind: Option<&'static str>,
    /// Bare table name, without prefixes.
    pub name: Option<&'static str>,
    /// Optional table prefix, appended to the adapter prefix with a trailing
    /// underscore.
    pub prefix: Option<&'static str>,
    /// Whether schema updates may touch this table.
    pub allow_schema_update: Option<bool>,
    /// Whether this table may be dropped.
    pub allow_drop: Option<bool>,
    /// Custom repository name; validated against the registry.
    pub repository: Option<&'static str>,
    /// Parent declaration to inherit unset table-level fields from.
    /// Single level only; the parent's own `inherits` is never followed.
    pub inherits: Option<&'static TableDecl>,
    /// Explicit column ordering override; listed columns come first, the
    /// rest keep declaration order.
    pub column_order: &'static [&'static str],
    /// Declared indexes.
    pub indexes: &'static [IndexDecl],
    /// Whether this model has a translation shadow table.
    pub translations: bool,
}

impl TableDecl {
    /// A declaration with every field unset.
    pub const EMPTY: TableDecl = TableDecl {
        kind: None,
        name: None,
        prefix: None,
        allow_schema_update: None,
        allow_drop: None,
        repository: None,
        inherits: None,
        column_order: &[],
        indexes: &[],
        translations: false,
    };
}

/// Index declaration; both fields are required, validated at resolution.
#[derive(Debug, Clone, Copy)]
pub struct IndexDecl {
    pub name: Option<&'static str>,
    pub columns: &'static [&'static str],
}

/// Many-to-one reference declaration.
#[derive(Debug, Clone, Copy)]
pub struct ManyToOneDecl {
    /// Target model name.
    pub model: Option<&'static str>,
    /// Target property on that model.
    pub property: Option<&'static str>,
    /// ON DELETE action for the generated constraint.
    pub on_delete: &'static str,
}

impl ManyToOneDecl {
    pub const DEFAULT_ON_DELETE: &'static str = "SET NULL";
}

/// Per-property column declaration.
#[derive(Debug, Clone, Copy)]
pub struct ColumnDecl {
    /// Declared column type name (validated by the mapper).
    pub kind: &'static str,
    /// Column length, rendered as `type(length)`.
    pub length: Option<u32>,
    /// Nullability clause, rendered verbatim ("NULL" / "NOT NULL").
    pub null: Option<&'static str>,
    /// Default clause expression.
    pub default: Option<&'static str>,
    /// Primary key flag.
    pub primary: bool,
    /// Auto-increment flag.
    pub auto_increment: bool,
    /// Whether this column participates in INSERT/UPDATE column sets.
    /// Forced to false for `timestamp` columns (server-maintained).
    pub allow_update: bool,
    /// Whether this column has per-language overrides in the shadow table.
    pub i18n: bool,
    /// Optional many-to-one reference.
    pub many_to_one: Option<ManyToOneDecl>,
}

impl ColumnDecl {
    /// A plain string-typed column with everything else unset.
    pub const fn plain(kind: &'static str) -> Self {
        ColumnDecl {
            kind,
            length: None,
            null: None,
            default: None,
            primary: false,
            auto_increment: false,
            allow_update: true,
            i18n: false,
            many_to_one: None,
        }
    }
}

/// Complete declaration of one model: table metadata plus ordered columns.
#[derive(Debug, Clone, Copy)]
pub struct ModelDecl {
    /// Model name (the struct identifier).
    pub model: &'static str,
    /// Table-level declaration.
    pub table: TableDecl,
    /// Declared columns in declaration order. The derive injects the
    /// inherited `ID` primary column first.
    pub columns: &'static [(&'static str, ColumnDecl)],
}

impl ModelDecl {
    /// Look up a column declaration by property name.
    pub fn column(&self, property: &str) -> Option<&ColumnDecl> {
        self.columns
            .iter()
            .find(|(name, _)| *name == property)
            .map(|(_, decl)| decl)
    }

    /// Check whether a property is declared.
    pub fn has_column(&self, property: &str) -> bool {
        self.column(property).is_some()
    }
}

/// The implicit base every entity inherits through its `ModelBase` field:
/// the `ID` primary column plus a column order that keeps `ID` first.
pub const MODEL_BASE_TABLE: TableDecl = TableDecl {
    column_order: &["ID"],
    ..TableDecl::EMPTY
};

/// Declaration of the injected `ID` column.
pub const ID_COLUMN: ColumnDecl = ColumnDecl {
    kind: "int",
    length: Some(10),
    null: Some("NOT NULL"),
    default: None,
    primary: true,
    auto_increment: false,
    allow_update: true,
    i18n: false,
    many_to_one: None,
};
