//! Filter operators and their translation into SQL predicates

use crate::{Error, Result, Value};
use std::fmt::{self, Display};

/// Recognized filter operator.
///
/// Each variant is addressed by a short token (`eq`, `!sw`, `in`, ...), which
/// is what callers building filters from query strings usually have at hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// `eq`: `col = ?`
    Eq,
    /// `!eq`: `col != ?`
    NotEq,
    /// `lt`: `col < ?`
    Lt,
    /// `gt`: `col > ?`
    Gt,
    /// `le`: `col <= ?`
    Le,
    /// `ge`: `col >= ?`
    Ge,
    /// `sw`: starts with
    StartsWith,
    /// `!sw`: does not start with
    NotStartsWith,
    /// `ew`: ends with
    EndsWith,
    /// `!ew`: does not end with
    NotEndsWith,
    /// `has`: contains
    Has,
    /// `!has`: does not contain
    NotHas,
    /// `in`: member of a comma separated list
    In,
    /// `!in`: not a member of a comma separated list
    NotIn,
    /// `null`: `IS NULL` for `true`, `IS NOT NULL` for `false`
    Null,
}

/// A rendered filter: the SQL fragment and the values for its `?` markers, in order
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub sql: String,
    pub parameters: Vec<Value>,
}

impl Predicate {
    fn bare(sql: String) -> Self {
        Self {
            sql,
            parameters: Vec::new(),
        }
    }

    fn bound(sql: String, value: Value) -> Self {
        Self {
            sql,
            parameters: vec![value],
        }
    }
}

impl Operator {
    pub const ALL: [Operator; 15] = [
        Operator::Eq,
        Operator::NotEq,
        Operator::Lt,
        Operator::Gt,
        Operator::Le,
        Operator::Ge,
        Operator::StartsWith,
        Operator::NotStartsWith,
        Operator::EndsWith,
        Operator::NotEndsWith,
        Operator::Has,
        Operator::NotHas,
        Operator::In,
        Operator::NotIn,
        Operator::Null,
    ];

    /// The short token this operator is addressed by
    pub const fn token(self) -> &'static str {
        match self {
            Operator::Eq => "eq",
            Operator::NotEq => "!eq",
            Operator::Lt => "lt",
            Operator::Gt => "gt",
            Operator::Le => "le",
            Operator::Ge => "ge",
            Operator::StartsWith => "sw",
            Operator::NotStartsWith => "!sw",
            Operator::EndsWith => "ew",
            Operator::NotEndsWith => "!ew",
            Operator::Has => "has",
            Operator::NotHas => "!has",
            Operator::In => "in",
            Operator::NotIn => "!in",
            Operator::Null => "null",
        }
    }

    /// Look up an operator by token. Tokens are case sensitive.
    pub fn parse(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.token() == token)
    }

    /// Translate `column <op> value` into a predicate.
    ///
    /// Only `Null` can fail, when `value` is not a true/false sentinel.
    pub fn render(self, column: &str, value: Value) -> Result<Predicate> {
        let predicate = match self {
            Operator::Eq => compare(column, "=", value),
            Operator::NotEq => compare(column, "!=", value),
            Operator::Lt => compare(column, "<", value),
            Operator::Gt => compare(column, ">", value),
            Operator::Le => compare(column, "<=", value),
            Operator::Ge => compare(column, ">=", value),
            Operator::StartsWith => like(column, false, format!("{value}%")),
            Operator::NotStartsWith => like(column, true, format!("{value}%")),
            Operator::EndsWith => like(column, false, format!("%{value}")),
            Operator::NotEndsWith => like(column, true, format!("%{value}")),
            Operator::Has => like(column, false, format!("%{value}%")),
            Operator::NotHas => like(column, true, format!("%{value}%")),
            Operator::In => in_list(column, false, &value),
            Operator::NotIn => in_list(column, true, &value),
            Operator::Null => match null_sentinel(&value) {
                Some(true) => Predicate::bare(format!("{column} IS NULL")),
                Some(false) => Predicate::bare(format!("{column} IS NOT NULL")),
                None => {
                    return Err(Error::invalid_value(self.token(), value.to_string()));
                }
            },
        };

        Ok(predicate)
    }
}

/// Empty and missing values are written inline as `''` and take no placeholder
fn compare(column: &str, symbol: &str, value: Value) -> Predicate {
    if value.is_null() || value.is_empty_string() {
        return Predicate::bare(format!("{column} {symbol} ''"));
    }
    Predicate::bound(format!("{column} {symbol} ?"), value)
}

fn like(column: &str, negated: bool, pattern: String) -> Predicate {
    let keyword = if negated { "NOT LIKE" } else { "LIKE" };
    Predicate::bound(format!("{column} {keyword} ?"), Value::String(pattern))
}

fn in_list(column: &str, negated: bool, value: &Value) -> Predicate {
    let text = value.to_string();
    let parameters: Vec<Value> = text
        .split(',')
        .map(|token| Value::String(token.to_string()))
        .collect();
    let markers = vec!["?"; parameters.len()].join(",");
    let keyword = if negated { "NOT IN" } else { "IN" };

    Predicate {
        sql: format!("{column} {keyword} ({markers})"),
        parameters,
    }
}

fn null_sentinel(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) if s == "true" => Some(true),
        Value::String(s) if s == "false" => Some(false),
        _ => None,
    }
}

impl Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Trait for types that can be resolved to a filter operator
pub trait IntoOperator {
    /// Resolve the operator; `column` is only used to describe a failure
    fn into_operator(self, column: &str) -> Result<Operator>;
}

impl IntoOperator for Operator {
    fn into_operator(self, _column: &str) -> Result<Operator> {
        Ok(self)
    }
}

impl IntoOperator for &str {
    fn into_operator(self, column: &str) -> Result<Operator> {
        Operator::parse(self).ok_or_else(|| Error::invalid_operator(column, self))
    }
}

impl IntoOperator for &String {
    fn into_operator(self, column: &str) -> Result<Operator> {
        self.as_str().into_operator(column)
    }
}

impl IntoOperator for String {
    fn into_operator(self, column: &str) -> Result<Operator> {
        self.as_str().into_operator(column)
    }
}

/// Convenience module for operator constants
pub mod op {
    use super::Operator;

    pub const EQ: Operator = Operator::Eq;
    pub const NEQ: Operator = Operator::NotEq;
    pub const LT: Operator = Operator::Lt;
    pub const GT: Operator = Operator::Gt;
    pub const LTE: Operator = Operator::Le;
    pub const GTE: Operator = Operator::Ge;
    pub const STARTS_WITH: Operator = Operator::StartsWith;
    pub const NOT_STARTS_WITH: Operator = Operator::NotStartsWith;
    pub const ENDS_WITH: Operator = Operator::EndsWith;
    pub const NOT_ENDS_WITH: Operator = Operator::NotEndsWith;
    pub const HAS: Operator = Operator::Has;
    pub const NOT_HAS: Operator = Operator::NotHas;
    pub const IN: Operator = Operator::In;
    pub const NOT_IN: Operator = Operator::NotIn;
    pub const NULL: Operator = Operator::Null;
}
