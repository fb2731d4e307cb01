//! Parsing for the Entity derive macro.
//!
//! Extracts the `#[orm(table(...))]` struct attribute and `#[orm(column(...))]`
//! field attributes into intermediate definitions used for code generation.

use syn::meta::ParseNestedMeta;
use syn::{Data, DeriveInput, Error, Fields, Ident, LitBool, LitInt, LitStr, Result, Type};

/// Table-level attribute, all fields optional (validated at schema
/// resolution, not at derive time).
#[derive(Default)]
pub struct TableAttr {
    pub kind: Option<String>,
    pub name: Option<String>,
    pub prefix: Option<String>,
    pub allow_schema_update: Option<bool>,
    pub allow_drop: Option<bool>,
    pub repository: Option<String>,
    pub inherits: Option<syn::Path>,
    pub column_order: Vec<String>,
    pub indexes: Vec<IndexAttr>,
    pub translations: bool,
}

#[derive(Default)]
pub struct IndexAttr {
    pub name: Option<String>,
    pub columns: Vec<String>,
}

/// Column-level attribute.
pub struct ColumnAttr {
    pub kind: String,
    pub length: Option<u32>,
    pub null: Option<String>,
    pub default: Option<String>,
    pub primary: bool,
    pub auto_increment: bool,
    pub no_update: bool,
    pub i18n: bool,
    pub many_to_one: Option<ManyToOneAttr>,
}

#[derive(Default)]
pub struct ManyToOneAttr {
    pub model: Option<String>,
    pub property: Option<String>,
    pub on_delete: Option<String>,
}

/// One mapped field.
pub struct FieldDef {
    pub ident: Ident,
    pub ty: Type,
    pub column: ColumnAttr,
}

/// Parsed derive input.
pub struct EntityDef {
    pub name: Ident,
    pub table: TableAttr,
    pub custom_hooks: bool,
    pub fields: Vec<FieldDef>,
    /// Unmapped fields (no column attribute), defaulted by `create`.
    pub extra_fields: Vec<Ident>,
}

pub fn parse_entity(input: &DeriveInput) -> Result<EntityDef> {
    let Data::Struct(data) = &input.data else {
        return Err(Error::new_spanned(input, "Entity can only derive on structs"));
    };
    let Fields::Named(named) = &data.fields else {
        return Err(Error::new_spanned(
            input,
            "Entity requires a struct with named fields",
        ));
    };

    let mut table = TableAttr::default();
    let mut custom_hooks = false;

    for attr in &input.attrs {
        if !attr.path().is_ident("orm") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("table") {
                meta.parse_nested_meta(|table_meta| parse_table_key(&mut table, &table_meta))
            } else if meta.path.is_ident("custom_hooks") {
                custom_hooks = true;
                Ok(())
            } else {
                Err(meta.error("expected `table(...)` or `custom_hooks`"))
            }
        })?;
    }

    let mut fields = Vec::new();
    let mut extra_fields = Vec::new();
    let mut base_found = false;

    for field in &named.named {
        let ident = field
            .ident
            .clone()
            .ok_or_else(|| Error::new_spanned(field, "expected a named field"))?;

        if ident == "base" {
            check_base_type(&field.ty)?;
            base_found = true;
            continue;
        }

        let mut column: Option<ColumnAttr> = None;
        for attr in &field.attrs {
            if !attr.path().is_ident("orm") {
                continue;
            }
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("column") {
                    column = Some(parse_column(&meta)?);
                    Ok(())
                } else {
                    Err(meta.error("expected `column(...)`"))
                }
            })?;
        }

        match column {
            Some(column) => {
                if ident == "ID" {
                    return Err(Error::new_spanned(
                        field,
                        "the ID column is provided by the `base: ModelBase` field",
                    ));
                }
                fields.push(FieldDef {
                    ident,
                    ty: field.ty.clone(),
                    column,
                });
            }
            None => extra_fields.push(ident),
        }
    }

    if !base_found {
        return Err(Error::new_spanned(
            input,
            "Entity requires a `base: ModelBase` field",
        ));
    }

    Ok(EntityDef {
        name: input.ident.clone(),
        table,
        custom_hooks,
        fields,
        extra_fields,
    })
}

fn check_base_type(ty: &Type) -> Result<()> {
    if let Type::Path(path) = ty {
        if let Some(segment) = path.path.segments.last() {
            if segment.ident == "ModelBase" {
                return Ok(());
            }
        }
    }
    Err(Error::new_spanned(ty, "the `base` field must be a ModelBase"))
}

fn parse_table_key(table: &mut TableAttr, meta: &ParseNestedMeta<'_>) -> Result<()> {
    if meta.path.is_ident("kind") {
        table.kind = Some(string_value(meta)?);
    } else if meta.path.is_ident("name") {
        table.name = Some(string_value(meta)?);
    } else if meta.path.is_ident("prefix") {
        table.prefix = Some(string_value(meta)?);
    } else if meta.path.is_ident("repository") {
        table.repository = Some(string_value(meta)?);
    } else if meta.path.is_ident("inherits") {
        let lit: LitStr = meta.value()?.parse()?;
        table.inherits = Some(lit.parse()?);
    } else if meta.path.is_ident("allow_schema_update") {
        table.allow_schema_update = Some(bool_value(meta)?);
    } else if meta.path.is_ident("allow_drop") {
        table.allow_drop = Some(bool_value(meta)?);
    } else if meta.path.is_ident("column_order") {
        table.column_order = string_list(meta)?;
    } else if meta.path.is_ident("index") {
        let mut index = IndexAttr::default();
        meta.parse_nested_meta(|index_meta| {
            if index_meta.path.is_ident("name") {
                index.name = Some(string_value(&index_meta)?);
                Ok(())
            } else if index_meta.path.is_ident("columns") {
                index.columns = string_list(&index_meta)?;
                Ok(())
            } else {
                Err(index_meta.error("expected `name` or `columns(...)`"))
            }
        })?;
        table.indexes.push(index);
    } else if meta.path.is_ident("translations") {
        table.translations = true;
    } else {
        return Err(meta.error("unknown table attribute"));
    }
    Ok(())
}

fn parse_column(meta: &ParseNestedMeta<'_>) -> Result<ColumnAttr> {
    let mut kind: Option<String> = None;
    let mut length: Option<u32> = None;
    let mut null: Option<String> = None;
    let mut default: Option<String> = None;
    let mut primary = false;
    let mut auto_increment = false;
    let mut no_update = false;
    let mut i18n = false;
    let mut many_to_one: Option<ManyToOneAttr> = None;

    meta.parse_nested_meta(|column_meta| {
        if column_meta.path.is_ident("kind") {
            kind = Some(string_value(&column_meta)?);
        } else if column_meta.path.is_ident("length") {
            let lit: LitInt = column_meta.value()?.parse()?;
            length = Some(lit.base10_parse()?);
        } else if column_meta.path.is_ident("null") {
            null = Some(string_value(&column_meta)?);
        } else if column_meta.path.is_ident("default") {
            default = Some(string_value(&column_meta)?);
        } else if column_meta.path.is_ident("primary") {
            primary = bool_value(&column_meta)?;
        } else if column_meta.path.is_ident("auto_increment") {
            auto_increment = bool_value(&column_meta)?;
        } else if column_meta.path.is_ident("no_update") {
            no_update = bool_value(&column_meta)?;
        } else if column_meta.path.is_ident("i18n") {
            i18n = bool_value(&column_meta)?;
        } else if column_meta.path.is_ident("many_to_one") {
            let mut reference = ManyToOneAttr::default();
            column_meta.parse_nested_meta(|m2o_meta| {
                if m2o_meta.path.is_ident("model") {
                    reference.model = Some(string_value(&m2o_meta)?);
                    Ok(())
                } else if m2o_meta.path.is_ident("property") {
                    reference.property = Some(string_value(&m2o_meta)?);
                    Ok(())
                } else if m2o_meta.path.is_ident("on_delete") {
                    reference.on_delete = Some(string_value(&m2o_meta)?);
                    Ok(())
                } else {
                    Err(m2o_meta.error("expected `model`, `property`, or `on_delete`"))
                }
            })?;
            many_to_one = Some(reference);
        } else {
            return Err(column_meta.error("unknown column attribute"));
        }
        Ok(())
    })?;

    let kind = kind.ok_or_else(|| meta.error("column requires a `kind`"))?;

    Ok(ColumnAttr {
        kind,
        length,
        null,
        default,
        primary,
        auto_increment,
        no_update,
        i18n,
        many_to_one,
    })
}

fn string_value(meta: &ParseNestedMeta<'_>) -> Result<String> {
    let lit: LitStr = meta.value()?.parse()?;
    Ok(lit.value())
}

/// A boolean attribute, either bare (`primary`) or explicit
/// (`primary = false`).
fn bool_value(meta: &ParseNestedMeta<'_>) -> Result<bool> {
    if meta.input.peek(syn::Token![=]) {
        let lit: LitBool = meta.value()?.parse()?;
        Ok(lit.value)
    } else {
        Ok(true)
    }
}

/// A parenthesized string list: `columns("a", "b")`.
fn string_list(meta: &ParseNestedMeta<'_>) -> Result<Vec<String>> {
    let content;
    syn::parenthesized!(content in meta.input);
    let lits = content.parse_terminated(|p| p.parse::<LitStr>(), syn::Token![,])?;
    Ok(lits.into_iter().map(|l| l.value()).collect())
}
