//! WHERE condition trees.
//!
//! A tree is an ordered list of conditions; each condition carries its own
//! connective to the previous sibling, and the first element's connective is
//! never emitted. Rendering is strictly left to right, so
//! `where(A).where(B, OR).where(C)` produces `(A OR B AND C)`.

use relmodel_core::error::{Error, Result};
use relmodel_core::schema::SchemaInfo;
use relmodel_core::value::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// The fixed comparison set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Lt,
    Le,
    Eq,
    Ne,
    Gt,
    Ge,
    In,
    NotIn,
    Like,
    NotLike,
    IsNull,
    NotNull,
}

impl Comparison {
    /// Parse from the operator spelling; anything else is `InvalidOperator`.
    pub fn parse(operator: &str) -> Result<Self> {
        Ok(match operator {
            "<" => Comparison::Lt,
            "<=" => Comparison::Le,
            "=" => Comparison::Eq,
            "!=" => Comparison::Ne,
            ">" => Comparison::Gt,
            ">=" => Comparison::Ge,
            "IN" => Comparison::In,
            "NOT IN" => Comparison::NotIn,
            "LIKE" => Comparison::Like,
            "NOT LIKE" => Comparison::NotLike,
            "IS NULL" => Comparison::IsNull,
            "NOT NULL" => Comparison::NotNull,
            other => {
                return Err(Error::InvalidOperator {
                    operator: other.to_string(),
                });
            }
        })
    }

    /// SQL spelling.
    pub const fn as_sql(&self) -> &'static str {
        match self {
            Comparison::Lt => "<",
            Comparison::Le => "<=",
            Comparison::Eq => "=",
            Comparison::Ne => "!=",
            Comparison::Gt => ">",
            Comparison::Ge => ">=",
            Comparison::In => "IN",
            Comparison::NotIn => "NOT IN",
            Comparison::Like => "LIKE",
            Comparison::NotLike => "NOT LIKE",
            Comparison::IsNull => "IS NULL",
            Comparison::NotNull => "IS NOT NULL",
        }
    }

    /// Whether this comparison takes a parenthesized value list.
    pub const fn takes_list(&self) -> bool {
        matches!(self, Comparison::In | Comparison::NotIn)
    }

    /// Whether this comparison takes no value at all.
    pub const fn takes_no_value(&self) -> bool {
        matches!(self, Comparison::IsNull | Comparison::NotNull)
    }
}

/// Boolean connective attached to a condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connective {
    And,
    Or,
}

impl Connective {
    pub fn parse(operator: &str) -> Result<Self> {
        match operator {
            "AND" => Ok(Connective::And),
            "OR" => Ok(Connective::Or),
            other => Err(Error::InvalidOperator {
                operator: other.to_string(),
            }),
        }
    }

    pub const fn as_sql(&self) -> &'static str {
        match self {
            Connective::And => "AND",
            Connective::Or => "OR",
        }
    }
}

/// Value side of a leaf condition.
#[derive(Debug, Clone)]
pub enum ConditionValue {
    /// No value (null tests).
    None,
    /// One bound value.
    Single(Value),
    /// A bound value list (IN / NOT IN).
    List(Vec<Value>),
}

impl From<Value> for ConditionValue {
    fn from(value: Value) -> Self {
        ConditionValue::Single(value)
    }
}

impl From<Vec<Value>> for ConditionValue {
    fn from(values: Vec<Value>) -> Self {
        ConditionValue::List(values)
    }
}

impl From<i64> for ConditionValue {
    fn from(value: i64) -> Self {
        ConditionValue::Single(Value::Int(value))
    }
}

impl From<i32> for ConditionValue {
    fn from(value: i32) -> Self {
        ConditionValue::Single(Value::Int(i64::from(value)))
    }
}

impl From<f64> for ConditionValue {
    fn from(value: f64) -> Self {
        ConditionValue::Single(Value::Float(value))
    }
}

impl From<bool> for ConditionValue {
    fn from(value: bool) -> Self {
        ConditionValue::Single(Value::Bool(value))
    }
}

impl From<&str> for ConditionValue {
    fn from(value: &str) -> Self {
        ConditionValue::Single(Value::Text(value.to_string()))
    }
}

impl From<String> for ConditionValue {
    fn from(value: String) -> Self {
        ConditionValue::Single(Value::Text(value))
    }
}

/// One node of the tree.
#[derive(Debug, Clone)]
pub enum Condition {
    /// `<column> <comparison> <placeholder(s)>`
    Leaf {
        property: String,
        comparison: Comparison,
        value: ConditionValue,
        connective: Connective,
    },
    /// `<column> <comparison> <other table's column>`
    Join {
        property: String,
        target_model: &'static str,
        target_property: String,
        comparison: Comparison,
        connective: Connective,
    },
    /// A parenthesized sub-tree with its own connective.
    Group { tree: Where, connective: Connective },
}

impl Condition {
    fn connective(&self) -> Connective {
        match self {
            Condition::Leaf { connective, .. }
            | Condition::Join { connective, .. }
            | Condition::Group { connective, .. } => *connective,
        }
    }
}

/// Schema context the tree renders against.
pub struct RenderContext<'a> {
    /// Schema of the model the query selects from.
    pub base: &'a SchemaInfo,
    /// Adapter-wide table prefix.
    pub adapter_prefix: &'a str,
    /// Resolved schemas of join targets, keyed by model name.
    pub targets: &'a HashMap<&'static str, Arc<SchemaInfo>>,
}

impl RenderContext<'_> {
    fn target(&self, model: &'static str) -> Result<&SchemaInfo> {
        self.targets
            .get(model)
            .map(AsRef::as_ref)
            .ok_or_else(|| Error::RepositoryClassNotDefined {
                name: model.to_string(),
                model: self.base.model.to_string(),
            })
    }
}

/// An ordered condition tree.
#[derive(Debug, Clone, Default)]
pub struct Where {
    conditions: Vec<Condition>,
}

impl Where {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Append a leaf condition.
    pub fn add_condition(
        &mut self,
        property: impl Into<String>,
        value: ConditionValue,
        comparison: Comparison,
        connective: Connective,
    ) {
        self.conditions.push(Condition::Leaf {
            property: property.into(),
            comparison,
            value,
            connective,
        });
    }

    /// Append a join condition.
    pub fn add_join_condition(
        &mut self,
        property: impl Into<String>,
        target_model: &'static str,
        target_property: impl Into<String>,
        comparison: Comparison,
        connective: Connective,
    ) {
        self.conditions.push(Condition::Join {
            property: property.into(),
            target_model,
            target_property: target_property.into(),
            comparison,
            connective,
        });
    }

    /// Append a nested sub-tree.
    pub fn add_group(&mut self, tree: Where, connective: Connective) {
        self.conditions.push(Condition::Group { tree, connective });
    }

    /// Render the tree, pushing bound values onto `params` in SQL order.
    ///
    /// The output is wrapped in parentheses. Each condition after the first
    /// is prefixed by its own stored connective.
    pub fn build(&self, ctx: &RenderContext<'_>, params: &mut Vec<Value>) -> Result<String> {
        let mut sql = String::from("(");

        for (position, condition) in self.conditions.iter().enumerate() {
            if position > 0 {
                sql.push(' ');
                sql.push_str(condition.connective().as_sql());
                sql.push(' ');
            }

            match condition {
                Condition::Leaf {
                    property,
                    comparison,
                    value,
                    ..
                } => {
                    sql.push_str(&render_leaf(ctx, property, *comparison, value, params)?);
                }
                Condition::Join {
                    property,
                    target_model,
                    target_property,
                    comparison,
                    ..
                } => {
                    let left = ctx.base.qualified_column(ctx.adapter_prefix, property)?;
                    let target = ctx.target(target_model)?;
                    let right =
                        target.qualified_column(ctx.adapter_prefix, target_property)?;
                    sql.push_str(&format!("{} {} {}", left, comparison.as_sql(), right));
                }
                Condition::Group { tree, .. } => {
                    sql.push_str(&tree.build(ctx, params)?);
                }
            }
        }

        sql.push(')');
        Ok(sql)
    }
}

fn render_leaf(
    ctx: &RenderContext<'_>,
    property: &str,
    comparison: Comparison,
    value: &ConditionValue,
    params: &mut Vec<Value>,
) -> Result<String> {
    let qualified = ctx.base.qualified_column(ctx.adapter_prefix, property)?;

    if comparison.takes_no_value() {
        return Ok(format!("{} {}", qualified, comparison.as_sql()));
    }

    let placeholder = ctx.base.placeholder(property)?;

    if comparison.takes_list() {
        let ConditionValue::List(values) = value else {
            return Err(Error::InvalidOperator {
                operator: comparison.as_sql().to_string(),
            });
        };
        let placeholders: Vec<&str> = values
            .iter()
            .map(|v| {
                params.push(v.clone());
                placeholder.as_str()
            })
            .collect();
        return Ok(format!(
            "{} {} ({})",
            qualified,
            comparison.as_sql(),
            placeholders.join(", ")
        ));
    }

    let ConditionValue::Single(single) = value else {
        return Err(Error::InvalidOperator {
            operator: comparison.as_sql().to_string(),
        });
    };
    params.push(single.clone());
    Ok(format!(
        "{} {} {}",
        qualified,
        comparison.as_sql(),
        placeholder.as_str()
    ))
}
