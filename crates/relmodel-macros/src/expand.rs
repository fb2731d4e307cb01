//! Code generation for the Entity derive macro.

use crate::parse::{EntityDef, FieldDef};
use proc_macro2::TokenStream;
use quote::{format_ident, quote};

/// SHOUTY_SNAKE_CASE for the generated table-declaration const.
fn shouty_snake(ident: &str) -> String {
    let mut out = String::new();
    for (position, ch) in ident.chars().enumerate() {
        if ch.is_uppercase() && position > 0 {
            out.push('_');
        }
        out.push(ch.to_ascii_uppercase());
    }
    out
}

fn opt_str(value: &Option<String>) -> TokenStream {
    match value {
        Some(s) => quote!(Some(#s)),
        None => quote!(None),
    }
}

fn opt_bool(value: &Option<bool>) -> TokenStream {
    match value {
        Some(b) => quote!(Some(#b)),
        None => quote!(None),
    }
}

fn opt_u32(value: &Option<u32>) -> TokenStream {
    match value {
        Some(v) => quote!(Some(#v)),
        None => quote!(None),
    }
}

fn column_decl(field: &FieldDef) -> TokenStream {
    let column = &field.column;
    let kind = &column.kind;
    let length = opt_u32(&column.length);
    let null = opt_str(&column.null);
    let default = opt_str(&column.default);
    let primary = column.primary;
    let auto_increment = column.auto_increment;
    // Server-maintained timestamps never participate in INSERT/UPDATE sets.
    let allow_update = !column.no_update && column.kind != "timestamp";
    let i18n = column.i18n;
    let many_to_one = match &column.many_to_one {
        Some(reference) => {
            let model = opt_str(&reference.model);
            let property = opt_str(&reference.property);
            let on_delete = match &reference.on_delete {
                Some(action) => quote!(#action),
                None => {
                    quote!(::relmodel_core::decl::ManyToOneDecl::DEFAULT_ON_DELETE)
                }
            };
            quote! {
                Some(::relmodel_core::decl::ManyToOneDecl {
                    model: #model,
                    property: #property,
                    on_delete: #on_delete,
                })
            }
        }
        None => quote!(None),
    };

    quote! {
        ::relmodel_core::decl::ColumnDecl {
            kind: #kind,
            length: #length,
            null: #null,
            default: #default,
            primary: #primary,
            auto_increment: #auto_increment,
            allow_update: #allow_update,
            i18n: #i18n,
            many_to_one: #many_to_one,
        }
    }
}

pub fn expand(def: &EntityDef) -> TokenStream {
    let name = &def.name;
    let model_name = name.to_string();
    let table_const = format_ident!("{}_TABLE", shouty_snake(&model_name));

    // Table declaration const, referenceable from other models' `inherits`.
    let table = &def.table;
    let kind = opt_str(&table.kind);
    let table_name = opt_str(&table.name);
    let prefix = opt_str(&table.prefix);
    let allow_schema_update = opt_bool(&table.allow_schema_update);
    let allow_drop = opt_bool(&table.allow_drop);
    let repository = opt_str(&table.repository);
    let inherits = match &table.inherits {
        Some(path) => quote!(Some(&#path)),
        None => quote!(None),
    };
    let column_order = &table.column_order;
    let indexes: Vec<TokenStream> = table
        .indexes
        .iter()
        .map(|index| {
            let index_name = opt_str(&index.name);
            let columns = &index.columns;
            quote! {
                ::relmodel_core::decl::IndexDecl {
                    name: #index_name,
                    columns: &[#(#columns),*],
                }
            }
        })
        .collect();
    let translations = table.translations;

    let table_decl = quote! {
        pub const #table_const: ::relmodel_core::decl::TableDecl =
            ::relmodel_core::decl::TableDecl {
                kind: #kind,
                name: #table_name,
                prefix: #prefix,
                allow_schema_update: #allow_schema_update,
                allow_drop: #allow_drop,
                repository: #repository,
                inherits: #inherits,
                column_order: &[#(#column_order),*],
                indexes: &[#(#indexes),*],
                translations: #translations,
            };
    };

    // Column list: the inherited ID primary column first, then declarations.
    let column_entries: Vec<TokenStream> = def
        .fields
        .iter()
        .map(|field| {
            let property = field.ident.to_string();
            let decl = column_decl(field);
            quote!((#property, #decl))
        })
        .collect();

    // Accessor arms.
    let get_arms: Vec<TokenStream> = def
        .fields
        .iter()
        .map(|field| {
            let property = field.ident.to_string();
            let ident = &field.ident;
            quote! {
                #property => Ok(::relmodel_core::value::Value::from(self.#ident.clone())),
            }
        })
        .collect();

    let set_arms: Vec<TokenStream> = def
        .fields
        .iter()
        .map(|field| {
            let property = field.ident.to_string();
            let ident = &field.ident;
            let ty = &field.ty;
            quote! {
                #property => {
                    self.#ident =
                        <#ty as ::relmodel_core::value::FromValue>::from_value(&value)?;
                }
            }
        })
        .collect();

    let column_idents: Vec<_> = def.fields.iter().map(|f| &f.ident).collect();
    let extra_idents = &def.extra_fields;

    let hooks_impl = if def.custom_hooks {
        quote!()
    } else {
        quote! {
            impl ::relmodel_core::model::ModelHooks for #name {}
        }
    };

    quote! {
        #table_decl

        #hooks_impl

        impl ::relmodel_core::model::Model for #name {
            fn decl(&self) -> &'static ::relmodel_core::decl::ModelDecl {
                <Self as ::relmodel_core::model::Entity>::DECL
            }

            fn base(&self) -> &::relmodel_core::model::ModelBase {
                &self.base
            }

            fn base_mut(&mut self) -> &mut ::relmodel_core::model::ModelBase {
                &mut self.base
            }

            fn get(
                &self,
                property: &str,
            ) -> ::relmodel_core::error::Result<::relmodel_core::value::Value> {
                match property {
                    "ID" => Ok(::relmodel_core::value::Value::from(self.base.id())),
                    #(#get_arms)*
                    _ => Err(::relmodel_core::error::Error::PropertyDoesNotExist {
                        property: property.to_string(),
                        model: #model_name,
                    }),
                }
            }

            fn set(
                &mut self,
                property: &str,
                value: ::relmodel_core::value::Value,
            ) -> ::relmodel_core::error::Result<()> {
                match property {
                    "ID" => {
                        self.base.set_id(
                            <::core::option::Option<i64>
                                as ::relmodel_core::value::FromValue>::from_value(&value)?,
                        );
                    }
                    #(#set_arms)*
                    _ => {
                        return Err(::relmodel_core::error::Error::PropertyDoesNotExist {
                            property: property.to_string(),
                            model: #model_name,
                        });
                    }
                }
                Ok(())
            }

            fn boxed_clone(&self) -> ::std::boxed::Box<dyn ::relmodel_core::model::Model> {
                ::std::boxed::Box::new(self.clone())
            }

            fn into_shared(self: ::std::boxed::Box<Self>) -> ::relmodel_core::model::SharedModel {
                ::std::sync::Arc::new(::std::sync::RwLock::new(*self))
            }

            fn as_any(&self) -> &dyn ::std::any::Any {
                self
            }
        }

        impl ::relmodel_core::model::Entity for #name {
            const DECL: &'static ::relmodel_core::decl::ModelDecl =
                &::relmodel_core::decl::ModelDecl {
                    model: #model_name,
                    table: #table_const,
                    columns: &[
                        ("ID", ::relmodel_core::decl::ID_COLUMN),
                        #(#column_entries),*
                    ],
                };

            fn create() -> Self {
                Self {
                    base: ::relmodel_core::model::ModelBase::new(),
                    #(#column_idents: ::core::default::Default::default(),)*
                    #(#extra_idents: ::core::default::Default::default(),)*
                }
            }

            fn duplicate(&self) -> Self {
                Self {
                    base: ::relmodel_core::model::ModelBase::new(),
                    #(#column_idents: self.#column_idents.clone(),)*
                    #(#extra_idents: ::core::default::Default::default(),)*
                }
            }
        }
    }
}
