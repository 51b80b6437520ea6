//! Query descriptor: a data-only description of filtering and ordering.
//!
//! A [`Filter`] is a tree whose leaves compare one column against an operand
//! and whose interior nodes combine children with AND/OR, nesting as deep as
//! needed:
//!
//! ```text
//! Filter::and(vec![
//!     Filter::le("id", 123),
//!     Filter::or(vec![Filter::eq("name", "Bob"), Filter::eq("name", "Alice")]),
//!     Filter::is_not_null("address"),
//! ])
//! ```
//!
//! Nothing here knows about SQL; see [`crate::domain::sql_builder`].

use crate::domain::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    NotIn,
    Like,
    IsNull,
    IsNotNull,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicCombo {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortOrder {
    Asc,
    Desc,
}

/// Right-hand side of a condition. Its shape must suit the operator.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    None,
    Single(Value),
    List(Vec<Value>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub column: String,
    pub op: LogicOp,
    pub operand: Operand,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Cond(Condition),
    Combo(LogicCombo, Vec<Filter>),
}

impl Filter {
    pub fn cond(column: impl Into<String>, op: LogicOp, operand: Operand) -> Self {
        Filter::Cond(Condition {
            column: column.into(),
            op,
            operand,
        })
    }

    fn single(column: impl Into<String>, op: LogicOp, value: impl Into<Value>) -> Self {
        Self::cond(column, op, Operand::Single(value.into()))
    }

    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::single(column, LogicOp::Eq, value)
    }

    pub fn ne(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::single(column, LogicOp::Ne, value)
    }

    pub fn lt(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::single(column, LogicOp::Lt, value)
    }

    pub fn le(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::single(column, LogicOp::Le, value)
    }

    pub fn gt(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::single(column, LogicOp::Gt, value)
    }

    pub fn ge(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::single(column, LogicOp::Ge, value)
    }

    /// Caller is responsible for escaping `%` and `_` in `pattern`.
    pub fn like(column: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::single(column, LogicOp::Like, Value::Text(pattern.into()))
    }

    pub fn is_in<V: Into<Value>>(
        column: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Self::cond(
            column,
            LogicOp::In,
            Operand::List(values.into_iter().map(Into::into).collect()),
        )
    }

    pub fn not_in<V: Into<Value>>(
        column: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Self::cond(
            column,
            LogicOp::NotIn,
            Operand::List(values.into_iter().map(Into::into).collect()),
        )
    }

    pub fn is_null(column: impl Into<String>) -> Self {
        Self::cond(column, LogicOp::IsNull, Operand::None)
    }

    pub fn is_not_null(column: impl Into<String>) -> Self {
        Self::cond(column, LogicOp::IsNotNull, Operand::None)
    }

    pub fn and(children: Vec<Filter>) -> Self {
        Filter::Combo(LogicCombo::And, children)
    }

    pub fn or(children: Vec<Filter>) -> Self {
        Filter::Combo(LogicCombo::Or, children)
    }

    /// Every column referenced, depth-first in tree order.
    pub fn columns(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_columns(&mut out);
        out
    }

    fn collect_columns<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Filter::Cond(cond) => out.push(&cond.column),
            Filter::Combo(_, children) => {
                for child in children {
                    child.collect_columns(out);
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderTerm {
    pub column: String,
    pub order: SortOrder,
}

impl OrderTerm {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            order: SortOrder::Asc,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            order: SortOrder::Desc,
        }
    }
}

/// Result shape requested from a read query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnAs {
    /// Rows hydrated into entities, enum columns decoded.
    Entities,
    /// Rows exactly as the driver returned them.
    RawRows,
    /// Only the number of matching rows.
    CountOnly,
}

/// Read query against one table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filter: Option<Filter>,
    pub order: Vec<OrderTerm>,
    pub limit: Option<u64>,
    /// Columns to select; `None` selects every column.
    pub columns: Option<Vec<String>>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn order_by(mut self, term: OrderTerm) -> Self {
        self.order.push(term);
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn columns<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        self.columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }
}
