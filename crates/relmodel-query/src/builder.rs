//! Fluent SELECT construction.
//!
//! `QueryBuilder` accumulates validated clauses against a model declaration
//! and renders one SQL statement plus an ordered parameter list when
//! `build_query` runs. Execution and row materialization live in the
//! session layer; the builder also emits a `SelectPlan` describing the
//! column aliases the materializer should read.

use crate::where_clause::{Comparison, ConditionValue, Connective, RenderContext, Where};
use relmodel_core::decl::ModelDecl;
use relmodel_core::error::{Error, Result};
use relmodel_core::i18n::TranslationService;
use relmodel_core::registry::ModelRegistry;
use relmodel_core::schema::SchemaInfo;
use relmodel_core::{Entity, Value};
use relmodel_schema::Mapper;
use std::collections::HashMap;
use std::sync::Arc;

/// Everything `build_query` needs from the surrounding context.
pub struct BuildEnv<'a> {
    pub mapper: &'a mut Mapper,
    pub registry: &'a ModelRegistry,
    pub adapter_prefix: &'a str,
    pub i18n: Option<&'a dyn TranslationService>,
}

/// One declared join.
#[derive(Debug, Clone)]
struct JoinClause {
    /// Base-model property the join is keyed off.
    property: String,
    /// Target model declaration.
    target: &'static ModelDecl,
    /// Target property.
    target_property: String,
    /// LEFT OUTER JOIN instead of a comma-joined table.
    left: bool,
}

/// Aliased columns of one joined model, for materialization.
///
/// Joined columns select as `<property>__<column>`.
#[derive(Debug, Clone)]
pub struct JoinSelection {
    pub property: String,
    pub model: &'static str,
    pub columns: Vec<&'static str>,
}

/// Aliased columns of the translation shadow, selected as `i18n__<column>`.
#[derive(Debug, Clone)]
pub struct I18nSelection {
    /// Shadow model name (`<Model>I18n`).
    pub model: String,
    pub columns: Vec<&'static str>,
    /// Base properties to overlay from the shadow row.
    pub translated: Vec<&'static str>,
}

/// How the materializer should read result rows.
#[derive(Debug, Clone, Default)]
pub struct SelectPlan {
    pub joins: Vec<JoinSelection>,
    pub i18n: Option<I18nSelection>,
}

/// A rendered query, ready for the adapter.
#[derive(Debug, Clone)]
pub struct BuiltQuery {
    pub sql: String,
    /// `SELECT COUNT(*)` over the same FROM/WHERE.
    pub count_sql: String,
    pub params: Vec<Value>,
    pub plan: SelectPlan,
}

/// Clause accumulator for one model.
#[derive(Debug)]
pub struct QueryBuilder {
    decl: &'static ModelDecl,
    where_tree: Where,
    joins: Vec<JoinClause>,
    order_by: Vec<String>,
    limit: Option<(i64, i64)>,
}

impl QueryBuilder {
    /// Start a query against a model type.
    pub fn for_model<M: Entity>() -> Self {
        Self::for_decl(M::DECL)
    }

    /// Start a query against a declaration (dynamic call sites).
    pub fn for_decl(decl: &'static ModelDecl) -> Self {
        QueryBuilder {
            decl,
            where_tree: Where::new(),
            joins: Vec::new(),
            order_by: Vec::new(),
            limit: None,
        }
    }

    /// The declaration this query selects from.
    pub fn decl(&self) -> &'static ModelDecl {
        self.decl
    }

    /// Add a WHERE condition.
    ///
    /// The property must exist on the model and the comparison and
    /// connective must come from the fixed sets; violations fail
    /// immediately, never at execution time.
    pub fn where_(
        mut self,
        property: &str,
        value: impl Into<ConditionValue>,
        comparison: &str,
        connective: &str,
    ) -> Result<Self> {
        let comparison = Comparison::parse(comparison)?;
        let connective = Connective::parse(connective)?;
        self.check_property(property)?;

        let value = value.into();
        check_value_shape(comparison, &value)?;

        self.where_tree
            .add_condition(property, value, comparison, connective);
        Ok(self)
    }

    /// Add a nested WHERE sub-tree built with [`GroupBuilder`].
    pub fn where_group(mut self, group: GroupBuilder, connective: &str) -> Result<Self> {
        let connective = Connective::parse(connective)?;
        self.where_tree.add_group(group.tree, connective);
        Ok(self)
    }

    /// Start a validated sub-tree against the same model.
    pub fn group(&self) -> GroupBuilder {
        GroupBuilder {
            decl: self.decl,
            tree: Where::new(),
        }
    }

    /// Add an inner join keyed off `property`, equated to the target
    /// model's `target_property`. Renders as a comma-joined FROM table with
    /// the equality in the WHERE tree, in call order.
    pub fn join<T: Entity>(self, property: &str, target_property: &str) -> Result<Self> {
        self.add_join(T::DECL, property, target_property, false)
    }

    /// Add a LEFT OUTER JOIN variant of [`join`](Self::join).
    pub fn left_join<T: Entity>(self, property: &str, target_property: &str) -> Result<Self> {
        self.add_join(T::DECL, property, target_property, true)
    }

    fn add_join(
        mut self,
        target: &'static ModelDecl,
        property: &str,
        target_property: &str,
        left: bool,
    ) -> Result<Self> {
        self.check_property(property)?;
        if !target.has_column(target_property) {
            return Err(Error::PropertyDoesNotExist {
                property: target_property.to_string(),
                model: target.model,
            });
        }

        if !left {
            self.where_tree.add_join_condition(
                property,
                target.model,
                target_property,
                Comparison::Eq,
                Connective::And,
            );
        }
        self.joins.push(JoinClause {
            property: property.to_string(),
            target,
            target_property: target_property.to_string(),
            left,
        });
        Ok(self)
    }

    /// Append to ORDER BY. Direction must be `ASC` or `DESC`.
    pub fn order_by(mut self, property: &str, direction: &str) -> Result<Self> {
        if property != "ID" {
            self.check_property(property)?;
        }
        if direction != "ASC" && direction != "DESC" {
            return Err(Error::InvalidOperator {
                operator: direction.to_string(),
            });
        }

        self.order_by.push(format!("{} {}", property, direction));
        Ok(self)
    }

    /// Set LIMIT/OFFSET. Applied only when `count > 0` and `offset >= 0`;
    /// anything else is silently ignored.
    pub fn limit(mut self, count: i64, offset: i64) -> Self {
        if count > 0 && offset >= 0 {
            self.limit = Some((count, offset));
        }
        self
    }

    fn check_property(&self, property: &str) -> Result<()> {
        if self.decl.has_column(property) {
            Ok(())
        } else {
            Err(Error::PropertyDoesNotExist {
                property: property.to_string(),
                model: self.decl.model,
            })
        }
    }

    /// Render the statement, parameters, and selection plan.
    pub fn build_query(&self, env: &mut BuildEnv<'_>) -> Result<BuiltQuery> {
        let base = env.mapper.resolve_decl(self.decl, env.registry)?;
        let base_table = base.table_name(env.adapter_prefix);

        // Resolve join target schemas once, keyed by model name.
        let mut targets: HashMap<&'static str, Arc<SchemaInfo>> = HashMap::new();
        for join in &self.joins {
            let schema = env.mapper.resolve_decl(join.target, env.registry)?;
            targets.insert(join.target.model, schema);
        }

        // Translation shadow join applies when the schema declares
        // translations and the service asks for one.
        let i18n_join = match env.i18n {
            Some(service) if base.translations && service.need_translation() => {
                let shadow_name = format!("{}I18n", self.decl.model);
                let factory = env.registry.require(&shadow_name, self.decl.model)?;
                let schema = env.mapper.resolve_decl(factory.decl(), env.registry)?;
                Some((shadow_name, schema, service.language()))
            }
            _ => None,
        };

        let mut params: Vec<Value> = Vec::new();

        // SELECT list: bare star unless joins force explicit aliasing.
        let mut sql = String::from("SELECT ");
        let mut plan = SelectPlan::default();

        if self.joins.is_empty() && i18n_join.is_none() {
            sql.push('*');
        } else {
            let mut selected: Vec<String> = base
                .column_names()
                .iter()
                .map(|col| format!("{}.{} AS {}", base_table, col, col))
                .collect();

            for join in &self.joins {
                let schema = &targets[join.target.model];
                let table = schema.table_name(env.adapter_prefix);
                for col in schema.column_names() {
                    selected.push(format!(
                        "{}.{} AS {}__{}",
                        table, col, join.property, col
                    ));
                }
                plan.joins.push(JoinSelection {
                    property: join.property.clone(),
                    model: join.target.model,
                    columns: schema.column_names(),
                });
            }

            if let Some((shadow_name, schema, _)) = &i18n_join {
                let table = schema.table_name(env.adapter_prefix);
                for col in schema.column_names() {
                    selected.push(format!("{}.{} AS i18n__{}", table, col, col));
                }
                plan.i18n = Some(I18nSelection {
                    model: shadow_name.clone(),
                    columns: schema.column_names(),
                    translated: base.translated_columns().map(|c| c.property).collect(),
                });
            }

            sql.push_str(&selected.join(", "));
        }

        // FROM: base table plus comma-joined inner-join tables, then LEFT
        // OUTER JOIN clauses, then the i18n shadow join. Built as a separate
        // tail so the count query can share it.
        let mut tail = String::from(" FROM ");
        tail.push_str(&base_table);
        for join in self.joins.iter().filter(|j| !j.left) {
            tail.push_str(", ");
            tail.push_str(&targets[join.target.model].table_name(env.adapter_prefix));
        }
        for join in self.joins.iter().filter(|j| j.left) {
            let target = &targets[join.target.model];
            tail.push_str(&format!(
                " LEFT OUTER JOIN {} ON {} = {}",
                target.table_name(env.adapter_prefix),
                base.qualified_column(env.adapter_prefix, &join.property)?,
                target.qualified_column(env.adapter_prefix, &join.target_property)?,
            ));
        }
        if let Some((_, schema, language)) = &i18n_join {
            let table = schema.table_name(env.adapter_prefix);
            tail.push_str(&format!(
                " LEFT OUTER JOIN {} ON {}.object_id = {}.ID AND {}.language = %s",
                table, table, base_table, table
            ));
            params.push(Value::Text(language.clone()));
        }

        // WHERE
        if !self.where_tree.is_empty() {
            let ctx = RenderContext {
                base: &base,
                adapter_prefix: env.adapter_prefix,
                targets: &targets,
            };
            let rendered = self.where_tree.build(&ctx, &mut params)?;
            tail.push_str(" WHERE ");
            tail.push_str(&rendered);
        }

        // COUNT shares FROM and WHERE; ORDER BY and LIMIT bind nothing, so
        // the same parameter list serves both statements.
        let count_sql = format!("SELECT COUNT(*){}", tail);
        sql.push_str(&tail);

        // ORDER BY
        if !self.order_by.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&self.order_by.join(", "));
        }

        // LIMIT
        if let Some((count, offset)) = self.limit {
            sql.push_str(&format!(" LIMIT {} OFFSET {}", count, offset));
        }

        tracing::trace!(model = self.decl.model, sql = %sql, "built query");

        Ok(BuiltQuery {
            sql,
            count_sql,
            params,
            plan,
        })
    }
}

/// Validated sub-tree builder, bound to the same model declaration.
pub struct GroupBuilder {
    decl: &'static ModelDecl,
    tree: Where,
}

impl GroupBuilder {
    /// Add a condition to the sub-tree.
    pub fn where_(
        mut self,
        property: &str,
        value: impl Into<ConditionValue>,
        comparison: &str,
        connective: &str,
    ) -> Result<Self> {
        let comparison = Comparison::parse(comparison)?;
        let connective = Connective::parse(connective)?;
        if !self.decl.has_column(property) {
            return Err(Error::PropertyDoesNotExist {
                property: property.to_string(),
                model: self.decl.model,
            });
        }

        let value = value.into();
        check_value_shape(comparison, &value)?;

        self.tree
            .add_condition(property, value, comparison, connective);
        Ok(self)
    }

    /// Nest another sub-tree.
    pub fn nest(mut self, group: GroupBuilder, connective: &str) -> Result<Self> {
        let connective = Connective::parse(connective)?;
        self.tree.add_group(group.tree, connective);
        Ok(self)
    }
}

/// Reject value shapes that cannot render for the comparison.
fn check_value_shape(comparison: Comparison, value: &ConditionValue) -> Result<()> {
    let valid = if comparison.takes_list() {
        matches!(value, ConditionValue::List(_))
    } else if comparison.takes_no_value() {
        true
    } else {
        matches!(value, ConditionValue::Single(_))
    };

    if valid {
        Ok(())
    } else {
        Err(Error::InvalidOperator {
            operator: comparison.as_sql().to_string(),
        })
    }
}

// Re-exported so downstream layers can spell conditions without reaching
// into the tree module.
pub use crate::where_clause::ConditionValue as QueryValue;

#[cfg(test)]
mod tests {
    use super::*;
    use relmodel_core::decl::{ColumnDecl, ID_COLUMN, ManyToOneDecl, TableDecl};
    use relmodel_core::error::Error;
    use relmodel_core::model::{Model, ModelBase, ModelHooks, SharedModel};
    use relmodel_core::value::FromValue;
    use std::any::Any;
    use std::sync::{Arc, RwLock};

    macro_rules! test_entity {
        ($name:ident, $decl:ident) => {
            #[derive(Clone)]
            struct $name {
                base: ModelBase,
                name: String,
            }

            impl ModelHooks for $name {}

            impl Model for $name {
                fn decl(&self) -> &'static ModelDecl {
                    &$decl
                }

                fn base(&self) -> &ModelBase {
                    &self.base
                }

                fn base_mut(&mut self) -> &mut ModelBase {
                    &mut self.base
                }

                fn get(&self, property: &str) -> Result<Value> {
                    match property {
                        "ID" => Ok(Value::from(self.base.id())),
                        "name" => Ok(Value::from(self.name.clone())),
                        _ => Err(Error::PropertyDoesNotExist {
                            property: property.to_string(),
                            model: $decl.model,
                        }),
                    }
                }

                fn set(&mut self, property: &str, value: Value) -> Result<()> {
                    match property {
                        "ID" => self.base.set_id(Option::<i64>::from_value(&value)?),
                        "name" => self.name = String::from_value(&value)?,
                        _ => {
                            return Err(Error::PropertyDoesNotExist {
                                property: property.to_string(),
                                model: $decl.model,
                            });
                        }
                    }
                    Ok(())
                }

                fn boxed_clone(&self) -> Box<dyn Model> {
                    Box::new(self.clone())
                }

                fn into_shared(self: Box<Self>) -> SharedModel {
                    Arc::new(RwLock::new(*self))
                }

                fn as_any(&self) -> &dyn Any {
                    self
                }
            }

            impl Entity for $name {
                const DECL: &'static ModelDecl = &$decl;

                fn create() -> Self {
                    $name {
                        base: ModelBase::new(),
                        name: String::new(),
                    }
                }

                fn duplicate(&self) -> Self {
                    $name {
                        base: ModelBase::new(),
                        name: self.name.clone(),
                    }
                }
            }
        };
    }

    const BAR_DECL: ModelDecl = ModelDecl {
        model: "Bar",
        table: TableDecl {
            kind: Some("Entity"),
            name: Some("bar"),
            allow_schema_update: Some(true),
            ..TableDecl::EMPTY
        },
        columns: &[("ID", ID_COLUMN), ("name", ColumnDecl::plain("varchar"))],
    };

    const FOO_DECL: ModelDecl = ModelDecl {
        model: "Foo",
        table: TableDecl {
            kind: Some("Entity"),
            name: Some("foo"),
            allow_schema_update: Some(true),
            ..TableDecl::EMPTY
        },
        columns: &[
            ("ID", ID_COLUMN),
            ("name", ColumnDecl::plain("varchar")),
            (
                "bar_ID",
                ColumnDecl {
                    many_to_one: Some(ManyToOneDecl {
                        model: Some("Bar"),
                        property: Some("ID"),
                        on_delete: "CASCADE",
                    }),
                    ..ColumnDecl::plain("int")
                },
            ),
        ],
    };

    test_entity!(Bar, BAR_DECL);

    #[derive(Clone)]
    struct Foo {
        base: ModelBase,
        name: String,
        bar_id: i64,
    }

    impl ModelHooks for Foo {}

    impl Model for Foo {
        fn decl(&self) -> &'static ModelDecl {
            &FOO_DECL
        }

        fn base(&self) -> &ModelBase {
            &self.base
        }

        fn base_mut(&mut self) -> &mut ModelBase {
            &mut self.base
        }

        fn get(&self, property: &str) -> Result<Value> {
            match property {
                "ID" => Ok(Value::from(self.base.id())),
                "name" => Ok(Value::from(self.name.clone())),
                "bar_ID" => Ok(Value::from(self.bar_id)),
                _ => Err(Error::PropertyDoesNotExist {
                    property: property.to_string(),
                    model: "Foo",
                }),
            }
        }

        fn set(&mut self, property: &str, value: Value) -> Result<()> {
            match property {
                "ID" => self.base.set_id(Option::<i64>::from_value(&value)?),
                "name" => self.name = String::from_value(&value)?,
                "bar_ID" => self.bar_id = i64::from_value(&value)?,
                _ => {
                    return Err(Error::PropertyDoesNotExist {
                        property: property.to_string(),
                        model: "Foo",
                    });
                }
            }
            Ok(())
        }

        fn boxed_clone(&self) -> Box<dyn Model> {
            Box::new(self.clone())
        }

        fn into_shared(self: Box<Self>) -> SharedModel {
            Arc::new(RwLock::new(*self))
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    impl Entity for Foo {
        const DECL: &'static ModelDecl = &FOO_DECL;

        fn create() -> Self {
            Foo {
                base: ModelBase::new(),
                name: String::new(),
                bar_id: 0,
            }
        }

        fn duplicate(&self) -> Self {
            Foo {
                base: ModelBase::new(),
                name: self.name.clone(),
                bar_id: self.bar_id,
            }
        }
    }

    fn build(builder: &QueryBuilder) -> BuiltQuery {
        let mut mapper = Mapper::new();
        let registry = ModelRegistry::new();
        let mut env = BuildEnv {
            mapper: &mut mapper,
            registry: &registry,
            adapter_prefix: "wp_",
            i18n: None,
        };
        builder.build_query(&mut env).unwrap()
    }

    #[test]
    fn plain_select_star() {
        let builder = QueryBuilder::for_model::<Foo>();
        let built = build(&builder);
        assert_eq!(built.sql, "SELECT * FROM wp_foo");
        assert_eq!(built.count_sql, "SELECT COUNT(*) FROM wp_foo");
        assert!(built.params.is_empty());
    }

    #[test]
    fn where_order_limit() {
        let builder = QueryBuilder::for_model::<Foo>()
            .where_("name", "abc", "=", "AND")
            .unwrap()
            .order_by("ID", "ASC")
            .unwrap()
            .limit(10, 0);
        let built = build(&builder);
        assert_eq!(
            built.sql,
            "SELECT * FROM wp_foo WHERE (wp_foo.name = %s) ORDER BY ID ASC LIMIT 10 OFFSET 0"
        );
        assert_eq!(built.params, vec![Value::Text("abc".into())]);
        assert_eq!(
            built.count_sql,
            "SELECT COUNT(*) FROM wp_foo WHERE (wp_foo.name = %s)"
        );
    }

    #[test]
    fn invalid_limit_is_ignored() {
        let builder = QueryBuilder::for_model::<Foo>().limit(0, 0).limit(-3, 2);
        let built = build(&builder);
        assert_eq!(built.sql, "SELECT * FROM wp_foo");
    }

    #[test]
    fn unknown_property_fails_at_call() {
        let err = QueryBuilder::for_model::<Foo>()
            .where_("ghost", 1_i64, "=", "AND")
            .unwrap_err();
        assert!(matches!(err, Error::PropertyDoesNotExist { .. }));

        let err = QueryBuilder::for_model::<Foo>()
            .order_by("ghost", "ASC")
            .unwrap_err();
        assert!(matches!(err, Error::PropertyDoesNotExist { .. }));
    }

    #[test]
    fn invalid_operators_fail_at_call() {
        let err = QueryBuilder::for_model::<Foo>()
            .where_("name", "x", "LIKEISH", "AND")
            .unwrap_err();
        assert!(matches!(err, Error::InvalidOperator { .. }));

        let err = QueryBuilder::for_model::<Foo>()
            .where_("name", "x", "=", "XOR")
            .unwrap_err();
        assert!(matches!(err, Error::InvalidOperator { .. }));

        let err = QueryBuilder::for_model::<Foo>()
            .order_by("ID", "SIDEWAYS")
            .unwrap_err();
        assert!(matches!(err, Error::InvalidOperator { .. }));
    }

    #[test]
    fn inner_join_renders_comma_from_and_where_condition() {
        let builder = QueryBuilder::for_model::<Foo>()
            .join::<Bar>("bar_ID", "ID")
            .unwrap()
            .where_("name", "abc", "=", "AND")
            .unwrap();
        let built = build(&builder);

        assert_eq!(
            built.sql,
            "SELECT wp_foo.ID AS ID, wp_foo.name AS name, wp_foo.bar_ID AS bar_ID, \
             wp_bar.ID AS bar_ID__ID, wp_bar.name AS bar_ID__name \
             FROM wp_foo, wp_bar \
             WHERE (wp_foo.bar_ID = wp_bar.ID AND wp_foo.name = %s)"
        );
        assert_eq!(built.plan.joins.len(), 1);
        assert_eq!(built.plan.joins[0].property, "bar_ID");
        assert_eq!(built.plan.joins[0].columns, vec!["ID", "name"]);
    }

    #[test]
    fn left_join_renders_on_clause() {
        let builder = QueryBuilder::for_model::<Foo>()
            .left_join::<Bar>("bar_ID", "ID")
            .unwrap();
        let built = build(&builder);

        assert_eq!(
            built.sql,
            "SELECT wp_foo.ID AS ID, wp_foo.name AS name, wp_foo.bar_ID AS bar_ID, \
             wp_bar.ID AS bar_ID__ID, wp_bar.name AS bar_ID__name \
             FROM wp_foo LEFT OUTER JOIN wp_bar ON wp_foo.bar_ID = wp_bar.ID"
        );
    }

    #[test]
    fn join_validates_both_sides() {
        let err = QueryBuilder::for_model::<Foo>()
            .join::<Bar>("ghost", "ID")
            .unwrap_err();
        assert!(matches!(err, Error::PropertyDoesNotExist { model: "Foo", .. }));

        let err = QueryBuilder::for_model::<Foo>()
            .join::<Bar>("bar_ID", "ghost")
            .unwrap_err();
        assert!(matches!(err, Error::PropertyDoesNotExist { model: "Bar", .. }));
    }

    #[test]
    fn grouped_conditions_nest() {
        let builder = QueryBuilder::for_model::<Foo>();
        let group = builder
            .group()
            .where_("name", "a", "=", "AND")
            .unwrap()
            .where_("name", "b", "=", "OR")
            .unwrap();
        let builder = builder
            .where_("ID", 1_i64, ">=", "AND")
            .unwrap()
            .where_group(group, "AND")
            .unwrap();
        let built = build(&builder);

        assert_eq!(
            built.sql,
            "SELECT * FROM wp_foo WHERE (wp_foo.ID >= %d AND (wp_foo.name = %s OR wp_foo.name = %s))"
        );
    }

    #[test]
    fn list_comparison_requires_list_value() {
        let err = QueryBuilder::for_model::<Foo>()
            .where_("ID", 1_i64, "IN", "AND")
            .unwrap_err();
        assert!(matches!(err, Error::InvalidOperator { .. }));

        let builder = QueryBuilder::for_model::<Foo>()
            .where_("ID", vec![Value::Int(1), Value::Int(2)], "IN", "AND")
            .unwrap();
        let built = build(&builder);
        assert_eq!(
            built.sql,
            "SELECT * FROM wp_foo WHERE (wp_foo.ID IN (%d, %d))"
        );
    }
}
