//! Compiles query descriptors against a schema into parameterized SQL.
//!
//! Every column reference is resolved before any text is produced, so an
//! invalid query never reaches the store. User values only ever travel as
//! positional parameters; enum members are encoded as their stored text.

use crate::domain::error::GtaError;
use crate::domain::orm::decode_value;
use crate::domain::query::{Condition, Filter, LogicCombo, LogicOp, Operand, Query, SortOrder};
use crate::domain::schema::{ColumnSpec, Generated, Schema};
use crate::domain::value::Value;
use crate::ports::database_port::Dialect;

/// SQL text plus its positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

/// Accumulates parameters and hands out placeholders in order.
struct Binder<'d> {
    dialect: &'d dyn Dialect,
    params: Vec<Value>,
}

impl<'d> Binder<'d> {
    fn new(dialect: &'d dyn Dialect) -> Self {
        Self {
            dialect,
            params: Vec::new(),
        }
    }

    fn bind(
        &mut self,
        table: &str,
        column: &ColumnSpec,
        value: &Value,
    ) -> Result<String, GtaError> {
        self.params.push(encode_param(table, column, value)?);
        Ok(self.dialect.bind(self.params.len(), column))
    }

    fn bind_raw(&mut self, value: Value) -> String {
        self.params.push(value);
        self.dialect.placeholder(self.params.len())
    }
}

/// Convert a value to the form sent to the driver for `column`.
///
/// Parameters get the same coercion as values set on an entity, so a
/// filter binds identically on every dialect. Enum members travel as
/// their stored text.
pub fn encode_param(table: &str, column: &ColumnSpec, value: &Value) -> Result<Value, GtaError> {
    match decode_value(table, column, value.clone())? {
        Value::Enum(member) => Ok(Value::Text(member.stored().to_string())),
        other => Ok(other),
    }
}

pub struct SqlBuilder<'d> {
    dialect: &'d dyn Dialect,
    schema: &'static Schema,
}

impl<'d> SqlBuilder<'d> {
    pub fn new(dialect: &'d dyn Dialect, schema: &'static Schema) -> Self {
        Self { dialect, schema }
    }

    pub fn schema(&self) -> &'static Schema {
        self.schema
    }

    fn table(&self) -> String {
        self.dialect.qualify(self.schema.table)
    }

    fn column(&self, name: &str) -> Result<&'static ColumnSpec, GtaError> {
        self.schema.require_column(name).map(|(_, spec)| spec)
    }

    /// Resolve every column a query mentions, failing on the first unknown one.
    pub fn validate(&self, query: &Query) -> Result<(), GtaError> {
        if let Some(filter) = &query.filter {
            self.validate_filter(filter)?;
        }
        for term in &query.order {
            self.column(&term.column)?;
        }
        if let Some(columns) = &query.columns {
            for name in columns {
                self.column(name)?;
            }
        }
        Ok(())
    }

    pub fn validate_filter(&self, filter: &Filter) -> Result<(), GtaError> {
        for name in filter.columns() {
            self.column(name)?;
        }
        Ok(())
    }

    /// Columns a query returns, in schema order unless listed explicitly.
    pub fn selected_columns(&self, query: &Query) -> Result<Vec<&'static ColumnSpec>, GtaError> {
        match &query.columns {
            None => Ok(self.schema.columns.iter().collect()),
            Some(names) => names.iter().map(|n| self.column(n)).collect(),
        }
    }

    pub fn select(&self, query: &Query) -> Result<Statement, GtaError> {
        self.validate(query)?;
        let columns = self.selected_columns(query)?;
        if columns.is_empty() {
            return Err(GtaError::InvalidQuery {
                reason: format!("no columns selected from {}", self.schema.table),
            });
        }
        let exprs: Vec<String> = columns.iter().map(|c| self.dialect.select_expr(c)).collect();
        let mut binder = Binder::new(self.dialect);
        let mut sql = format!("SELECT {} FROM {}", exprs.join(", "), self.table());
        self.push_where(&mut sql, query.filter.as_ref(), &mut binder)?;
        sql.push_str(&self.compile_order(query)?);
        if let Some(limit) = query.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        Ok(Statement {
            sql,
            params: binder.params,
        })
    }

    /// `SELECT COUNT(*)` over the rows `query` would return.
    pub fn count(&self, query: &Query) -> Result<Statement, GtaError> {
        self.validate(query)?;
        let mut binder = Binder::new(self.dialect);
        let mut inner = match query.limit {
            Some(_) => format!("SELECT 1 FROM {}", self.table()),
            None => format!("SELECT COUNT(*) FROM {}", self.table()),
        };
        self.push_where(&mut inner, query.filter.as_ref(), &mut binder)?;
        let sql = match query.limit {
            Some(limit) => format!("SELECT COUNT(*) FROM ({inner} LIMIT {limit}) AS limited"),
            None => inner,
        };
        Ok(Statement {
            sql,
            params: binder.params,
        })
    }

    /// INSERT of the given columns, returning the primary key.
    pub fn insert(&self, values: &[(&str, Value)]) -> Result<Statement, GtaError> {
        let specs = values
            .iter()
            .map(|(name, _)| self.column(name))
            .collect::<Result<Vec<_>, _>>()?;
        let returning = self.returning_clause()?;
        if values.is_empty() {
            return Ok(Statement {
                sql: format!("INSERT INTO {} DEFAULT VALUES{returning}", self.table()),
                params: Vec::new(),
            });
        }
        let mut binder = Binder::new(self.dialect);
        let mut placeholders = Vec::with_capacity(values.len());
        for (spec, (_, value)) in specs.iter().zip(values) {
            placeholders.push(binder.bind(self.schema.table, spec, value)?);
        }
        let names: Vec<&str> = specs.iter().map(|s| s.name).collect();
        Ok(Statement {
            sql: format!(
                "INSERT INTO {} ({}) VALUES ({}){returning}",
                self.table(),
                names.join(", "),
                placeholders.join(", ")
            ),
            params: binder.params,
        })
    }

    fn returning_clause(&self) -> Result<String, GtaError> {
        let exprs = self
            .schema
            .primary_key
            .iter()
            .map(|name| self.column(name).map(|c| self.dialect.select_expr(c)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(format!(" RETURNING {}", exprs.join(", ")))
    }

    pub fn update(
        &self,
        values: &[(&str, Value)],
        filter: Option<&Filter>,
    ) -> Result<Statement, GtaError> {
        if let Some(filter) = filter {
            self.validate_filter(filter)?;
        }
        let specs = values
            .iter()
            .map(|(name, _)| self.column(name))
            .collect::<Result<Vec<_>, _>>()?;
        if specs.is_empty() {
            return Err(GtaError::InvalidQuery {
                reason: format!("update of {} sets no columns", self.schema.table),
            });
        }
        let mut binder = Binder::new(self.dialect);
        let mut assignments = Vec::with_capacity(specs.len());
        for (spec, (_, value)) in specs.iter().zip(values) {
            let placeholder = binder.bind(self.schema.table, spec, value)?;
            assignments.push(format!("{} = {placeholder}", spec.name));
        }
        let mut sql = format!("UPDATE {} SET {}", self.table(), assignments.join(", "));
        self.push_where(&mut sql, filter, &mut binder)?;
        Ok(Statement {
            sql,
            params: binder.params,
        })
    }

    /// DELETE matching `filter`. With no filter every row goes, which must
    /// be asked for explicitly.
    pub fn delete(
        &self,
        filter: Option<&Filter>,
        really_delete_all: bool,
    ) -> Result<Statement, GtaError> {
        if filter.is_none() && !really_delete_all {
            return Err(GtaError::InvalidQuery {
                reason: format!(
                    "refusing to delete every row of {} without really_delete_all",
                    self.schema.table
                ),
            });
        }
        if let Some(filter) = filter {
            self.validate_filter(filter)?;
        }
        let mut binder = Binder::new(self.dialect);
        let mut sql = format!("DELETE FROM {}", self.table());
        self.push_where(&mut sql, filter, &mut binder)?;
        Ok(Statement {
            sql,
            params: binder.params,
        })
    }

    fn push_where(
        &self,
        sql: &mut String,
        filter: Option<&Filter>,
        binder: &mut Binder<'_>,
    ) -> Result<(), GtaError> {
        if let Some(filter) = filter {
            let clause = self.compile_filter(filter, binder, false)?;
            sql.push_str(" WHERE ");
            sql.push_str(&clause);
        }
        Ok(())
    }

    fn compile_filter(
        &self,
        filter: &Filter,
        binder: &mut Binder<'_>,
        nested: bool,
    ) -> Result<String, GtaError> {
        match filter {
            Filter::Cond(cond) => self.compile_condition(cond, binder),
            Filter::Combo(combo, children) => {
                if children.is_empty() {
                    return Ok(match combo {
                        LogicCombo::And => "1 = 1",
                        LogicCombo::Or => "1 = 0",
                    }
                    .to_string());
                }
                let separator = match combo {
                    LogicCombo::And => " AND ",
                    LogicCombo::Or => " OR ",
                };
                let parts = children
                    .iter()
                    .map(|child| self.compile_filter(child, binder, true))
                    .collect::<Result<Vec<_>, _>>()?;
                let joined = parts.join(separator);
                Ok(if nested { format!("({joined})") } else { joined })
            }
        }
    }

    fn compile_condition(
        &self,
        cond: &Condition,
        binder: &mut Binder<'_>,
    ) -> Result<String, GtaError> {
        let spec = self.column(&cond.column)?;
        let table = self.schema.table;
        let name = spec.name;
        let shape_error = |expected: &str| GtaError::InvalidQuery {
            reason: format!("{:?} on {table}.{name} takes {expected}", cond.op),
        };
        match (cond.op, &cond.operand) {
            (LogicOp::IsNull, Operand::None) => Ok(format!("{name} IS NULL")),
            (LogicOp::IsNotNull, Operand::None) => Ok(format!("{name} IS NOT NULL")),
            (LogicOp::IsNull | LogicOp::IsNotNull, _) => Err(shape_error("no operand")),
            (LogicOp::In | LogicOp::NotIn, Operand::List(values)) => {
                let negated = cond.op == LogicOp::NotIn;
                if values.is_empty() {
                    return Ok(if negated { "1 = 1" } else { "1 = 0" }.to_string());
                }
                let placeholders = values
                    .iter()
                    .map(|v| binder.bind(table, spec, v))
                    .collect::<Result<Vec<_>, _>>()?;
                let keyword = if negated { "NOT IN" } else { "IN" };
                Ok(format!("{name} {keyword} ({})", placeholders.join(", ")))
            }
            (LogicOp::In | LogicOp::NotIn, _) => Err(shape_error("a list")),
            (LogicOp::Like, Operand::Single(Value::Text(pattern))) => {
                if spec.enum_type().is_some() {
                    return Err(GtaError::InvalidQuery {
                        reason: format!("LIKE is not supported on enum column {table}.{name}"),
                    });
                }
                let placeholder = binder.bind_raw(Value::Text(pattern.clone()));
                Ok(format!("{name} LIKE {placeholder}"))
            }
            (LogicOp::Like, _) => Err(shape_error("a text pattern")),
            (op, Operand::Single(value)) => {
                if value.is_null() {
                    return Err(shape_error("a non-null value; use IsNull/IsNotNull"));
                }
                let placeholder = binder.bind(table, spec, value)?;
                Ok(format!("{name} {} {placeholder}", comparison(op)))
            }
            (_, _) => Err(shape_error("a single value")),
        }
    }

    fn compile_order(&self, query: &Query) -> Result<String, GtaError> {
        if query.order.is_empty() {
            return Ok(String::new());
        }
        let terms = query
            .order
            .iter()
            .map(|term| {
                let spec = self.column(&term.column)?;
                let dir = match term.order {
                    SortOrder::Asc => "ASC",
                    SortOrder::Desc => "DESC",
                };
                Ok(format!("{} {dir}", spec.name))
            })
            .collect::<Result<Vec<_>, GtaError>>()?;
        Ok(format!(" ORDER BY {}", terms.join(", ")))
    }

    /// `CREATE TABLE IF NOT EXISTS` for the schema.
    pub fn create_table(&self) -> String {
        let inline_pk = match self.schema.primary_key.as_slice() {
            [only] => self
                .schema
                .column_spec(only)
                .filter(|c| c.generated == Generated::Identity)
                .map(|c| c.name),
            _ => None,
        };
        let mut defs: Vec<String> = self
            .schema
            .columns
            .iter()
            .map(|column| {
                if Some(column.name) == inline_pk {
                    return format!("{} {}", column.name, self.dialect.identity_column(column));
                }
                let mut def = format!("{} {}", column.name, self.dialect.column_type(column));
                if !column.nullable {
                    def.push_str(" NOT NULL");
                }
                if let Some(default) = column.default {
                    def.push_str(" DEFAULT ");
                    def.push_str(default);
                }
                def
            })
            .collect();
        if inline_pk.is_none() {
            defs.push(format!("PRIMARY KEY ({})", self.schema.primary_key.join(", ")));
        }
        for unique in &self.schema.unique {
            defs.push(format!("UNIQUE ({})", unique.join(", ")));
        }
        for fk in &self.schema.foreign_keys {
            defs.push(format!(
                "FOREIGN KEY ({}) REFERENCES {} ({}) ON DELETE {} ON UPDATE {}",
                fk.column,
                self.dialect.qualify(fk.references),
                fk.referenced_column,
                fk.on_delete.as_sql(),
                fk.on_update.as_sql()
            ));
        }
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
            self.table(),
            defs.join(",\n    ")
        )
    }
}

fn comparison(op: LogicOp) -> &'static str {
    match op {
        LogicOp::Eq => "=",
        LogicOp::Ne => "<>",
        LogicOp::Lt => "<",
        LogicOp::Le => "<=",
        LogicOp::Gt => ">",
        LogicOp::Ge => ">=",
        LogicOp::In => "IN",
        LogicOp::NotIn => "NOT IN",
        LogicOp::Like => "LIKE",
        LogicOp::IsNull => "IS NULL",
        LogicOp::IsNotNull => "IS NOT NULL",
    }
}
