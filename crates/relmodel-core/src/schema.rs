//! Resolved schema metadata.
//!
//! `SchemaInfo` is what the mapper produces from a `ModelDecl`: validated
//! column types, placeholder classes, key material, and the qualified-name
//! lookups the query builder uses. It lives in this crate so the
//! `DatabaseAdapter` trait can accept it without a dependency cycle.

use crate::error::{Error, Result};

/// Validated column types; everything outside this set fails resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    DateTime,
    Timestamp,
    TinyInt,
    SmallInt,
    Int,
    BigInt,
    VarChar,
    TinyText,
    Text,
    MediumText,
    LongText,
    Float,
    Decimal,
    Boolean,
}

impl ColumnType {
    /// Parse a declared type name (case-insensitive).
    pub fn parse(declared: &str) -> Option<Self> {
        Some(match declared.to_lowercase().as_str() {
            "datetime" => ColumnType::DateTime,
            "timestamp" => ColumnType::Timestamp,
            "tinyint" => ColumnType::TinyInt,
            "smallint" => ColumnType::SmallInt,
            "int" => ColumnType::Int,
            "bigint" => ColumnType::BigInt,
            "varchar" => ColumnType::VarChar,
            "tinytext" => ColumnType::TinyText,
            "text" => ColumnType::Text,
            "mediumtext" => ColumnType::MediumText,
            "longtext" => ColumnType::LongText,
            "float" => ColumnType::Float,
            "decimal" => ColumnType::Decimal,
            "boolean" => ColumnType::Boolean,
            _ => return None,
        })
    }

    /// The lowercase SQL name used in DDL.
    pub const fn sql_name(&self) -> &'static str {
        match self {
            ColumnType::DateTime => "datetime",
            ColumnType::Timestamp => "timestamp",
            ColumnType::TinyInt => "tinyint",
            ColumnType::SmallInt => "smallint",
            ColumnType::Int => "int",
            ColumnType::BigInt => "bigint",
            ColumnType::VarChar => "varchar",
            ColumnType::TinyText => "tinytext",
            ColumnType::Text => "text",
            ColumnType::MediumText => "mediumtext",
            ColumnType::LongText => "longtext",
            ColumnType::Float => "float",
            ColumnType::Decimal => "decimal",
            ColumnType::Boolean => "boolean",
        }
    }

    /// Integer column family.
    pub const fn is_integer(&self) -> bool {
        matches!(
            self,
            ColumnType::TinyInt | ColumnType::SmallInt | ColumnType::Int | ColumnType::BigInt
        )
    }

    /// Float/decimal column family.
    pub const fn is_float(&self) -> bool {
        matches!(self, ColumnType::Float | ColumnType::Decimal)
    }

    /// String column family (varchar and the text types).
    pub const fn is_text(&self) -> bool {
        matches!(
            self,
            ColumnType::VarChar
                | ColumnType::TinyText
                | ColumnType::Text
                | ColumnType::MediumText
                | ColumnType::LongText
        )
    }

    /// The placeholder class for parameterized queries.
    pub const fn placeholder(&self) -> Placeholder {
        if self.is_integer() {
            Placeholder::Int
        } else if self.is_float() {
            Placeholder::Float
        } else {
            Placeholder::Str
        }
    }
}

/// Parameter-binding token class used when building parameterized SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
    /// `%s` — string-class columns (default).
    Str,
    /// `%d` — integer family.
    Int,
    /// `%f` — float/decimal family.
    Float,
}

impl Placeholder {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Placeholder::Str => "%s",
            Placeholder::Int => "%d",
            Placeholder::Float => "%f",
        }
    }
}

/// Resolved many-to-one reference (both endpoints validated present).
#[derive(Debug, Clone, Copy)]
pub struct ResolvedManyToOne {
    pub model: &'static str,
    pub property: &'static str,
    pub on_delete: &'static str,
}

/// Resolved index (name and columns validated present).
#[derive(Debug, Clone)]
pub struct ResolvedIndex {
    pub name: &'static str,
    pub columns: Vec<&'static str>,
}

/// One resolved column.
#[derive(Debug, Clone)]
pub struct ResolvedColumn {
    pub property: &'static str,
    pub kind: ColumnType,
    pub length: Option<u32>,
    pub null: Option<&'static str>,
    pub default: Option<&'static str>,
    pub primary: bool,
    pub auto_increment: bool,
    pub allow_update: bool,
    pub i18n: bool,
    pub many_to_one: Option<ResolvedManyToOne>,
    pub placeholder: Placeholder,
    /// DDL fragment for this column (`name type(len) NULL DEFAULT ...`).
    pub schema_string: String,
}

/// The mapper's output for one model: validated, ordered, immutable.
#[derive(Debug, Clone)]
pub struct SchemaInfo {
    pub model: &'static str,
    pub kind: &'static str,
    /// Bare declared table name.
    pub table: &'static str,
    /// Declared table prefix (sits between the adapter prefix and the name).
    pub prefix: Option<&'static str>,
    pub allow_schema_update: bool,
    pub allow_drop: bool,
    pub repository: Option<&'static str>,
    pub indexes: Vec<ResolvedIndex>,
    pub translations: bool,
    /// Columns in final order (column_order override applied).
    pub columns: Vec<ResolvedColumn>,
}

impl SchemaInfo {
    /// Full table name: adapter prefix, declared prefix, declared name.
    pub fn table_name(&self, adapter_prefix: &str) -> String {
        match self.prefix {
            Some(prefix) => format!("{}{}_{}", adapter_prefix, prefix, self.table),
            None => format!("{}{}", adapter_prefix, self.table),
        }
    }

    /// Look up a column, failing with `PropertyDoesNotExist`.
    pub fn column(&self, property: &str) -> Result<&ResolvedColumn> {
        self.columns
            .iter()
            .find(|c| c.property == property)
            .ok_or_else(|| Error::PropertyDoesNotExist {
                property: property.to_string(),
                model: self.model,
            })
    }

    /// Check whether a property is mapped.
    pub fn has_column(&self, property: &str) -> bool {
        self.columns.iter().any(|c| c.property == property)
    }

    /// All mapped property names, in final order.
    pub fn column_names(&self) -> Vec<&'static str> {
        self.columns.iter().map(|c| c.property).collect()
    }

    /// Columns that participate in INSERT/UPDATE column sets.
    pub fn update_columns(&self) -> impl Iterator<Item = &ResolvedColumn> {
        self.columns.iter().filter(|c| c.allow_update)
    }

    /// Primary key property names.
    pub fn primary_keys(&self) -> Vec<&'static str> {
        self.columns
            .iter()
            .filter(|c| c.primary)
            .map(|c| c.property)
            .collect()
    }

    /// Property → many-to-one reference pairs.
    pub fn foreign_keys(&self) -> impl Iterator<Item = (&'static str, &ResolvedManyToOne)> {
        self.columns
            .iter()
            .filter_map(|c| c.many_to_one.as_ref().map(|m| (c.property, m)))
    }

    /// The many-to-one reference declared on a property.
    pub fn foreign_key(&self, property: &str) -> Result<&ResolvedManyToOne> {
        self.column(property)?
            .many_to_one
            .as_ref()
            .ok_or_else(|| Error::NotManyToOneProperty {
                property: property.to_string(),
            })
    }

    /// Placeholder class for a property.
    pub fn placeholder(&self, property: &str) -> Result<Placeholder> {
        Ok(self.column(property)?.placeholder)
    }

    /// Whether the property is a string-class column (used by translation).
    pub fn is_text_property(&self, property: &str) -> Result<bool> {
        Ok(self.column(property)?.kind.is_text())
    }

    /// Fully qualified `table.column` name for a property.
    pub fn qualified_column(&self, adapter_prefix: &str, property: &str) -> Result<String> {
        self.column(property)?;
        Ok(format!("{}.{}", self.table_name(adapter_prefix), property))
    }

    /// Reverse lookup: qualified `table.column` back to the bare property.
    pub fn property_for_qualified(
        &self,
        adapter_prefix: &str,
        qualified: &str,
    ) -> Result<&'static str> {
        let table = self.table_name(adapter_prefix);
        qualified
            .strip_prefix(&table)
            .and_then(|rest| rest.strip_prefix('.'))
            .and_then(|bare| self.columns.iter().find(|c| c.property == bare))
            .map(|c| c.property)
            .ok_or_else(|| Error::PropertyDoesNotExist {
                property: qualified.to_string(),
                model: self.model,
            })
    }

    /// Columns carrying per-language overrides.
    pub fn translated_columns(&self) -> impl Iterator<Item = &ResolvedColumn> {
        self.columns.iter().filter(|c| c.i18n)
    }
}
