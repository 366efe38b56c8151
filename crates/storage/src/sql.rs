use rusqlite::types::Value as SqlValue;

use hearth_core::{Key, Timestamp, Value};

use crate::error::StorageError;
use crate::mapping::{ColumnDef, ColumnType, TableMap};
use crate::sqlite::column_list;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    pub fn sql(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "<>",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Matches every row.
    All,
    Compare {
        field: String,
        op: CompareOp,
        value: Value,
    },
    IsNull(String),
    IsNotNull(String),
    /// Substring match.
    Like {
        field: String,
        pattern: String,
    },
    In {
        field: String,
        values: Vec<Value>,
    },
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
    /// At least one row of the named collection satisfies the inner predicate.
    Any {
        collection: String,
        predicate: Box<Predicate>,
    },
}

impl Predicate {
    pub fn compare(field: &str, op: CompareOp, value: impl Into<Value>) -> Self {
        Predicate::Compare {
            field: field.to_string(),
            op,
            value: value.into(),
        }
    }

    pub fn eq(field: &str, value: impl Into<Value>) -> Self {
        Self::compare(field, CompareOp::Eq, value)
    }

    pub fn key(key: Key) -> Self {
        Self::eq("key", key)
    }

    pub fn like(field: &str, pattern: &str) -> Self {
        Predicate::Like {
            field: field.to_string(),
            pattern: pattern.to_string(),
        }
    }

    pub fn is_null(field: &str) -> Self {
        Predicate::IsNull(field.to_string())
    }

    pub fn any(collection: &str, predicate: Predicate) -> Self {
        Predicate::Any {
            collection: collection.to_string(),
            predicate: Box::new(predicate),
        }
    }

    pub fn and(self, other: Predicate) -> Self {
        match self {
            Predicate::All => other,
            Predicate::And(mut items) => {
                items.push(other);
                Predicate::And(items)
            }
            first => Predicate::And(vec![first, other]),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub field: String,
    pub descending: bool,
}

impl OrderBy {
    pub fn asc(field: &str) -> Self {
        Self {
            field: field.to_string(),
            descending: false,
        }
    }

    pub fn desc(field: &str) -> Self {
        Self {
            field: field.to_string(),
            descending: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryOptions {
    pub offset: usize,
    /// `None` returns every row from `offset` on.
    pub count: Option<usize>,
    pub order_by: Vec<OrderBy>,
    pub include_obsolete: bool,
    pub include_hidden: bool,
}

impl QueryOptions {
    pub fn page(offset: usize, count: usize) -> Self {
        Self {
            offset,
            count: Some(count),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SqlStatement {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

impl SqlStatement {
    /// `SELECT COUNT(*)` over this statement as a subquery.
    pub fn count(&self) -> SqlStatement {
        SqlStatement {
            sql: format!("SELECT COUNT(*) FROM ({})", self.sql),
            params: self.params.clone(),
        }
    }
}

/// Coerces a model value for binding against `column`.
/// Wraps `raw` for a substring `LIKE ... ESCAPE '\'`, so `%` and `_` in it
/// match themselves.
pub fn like_pattern(raw: &str) -> String {
    let mut pattern = String::with_capacity(raw.len() + 2);
    pattern.push('%');
    for c in raw.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

pub fn bind_value(column: &ColumnDef, value: &Value) -> Result<SqlValue, StorageError> {
    let invalid = |reason: &str| StorageError::InvalidFilter {
        key: column.name.to_string(),
        value: format!("{value:?}"),
        reason: reason.to_string(),
    };
    Ok(match (column.ty, value) {
        (_, Value::Null) => SqlValue::Null,
        (_, Value::Key(k)) => SqlValue::Blob(k.as_bytes().to_vec()),
        (ColumnType::Key, Value::Text(s)) => {
            let key: Key = s.parse().map_err(|_| invalid("not a key"))?;
            SqlValue::Blob(key.as_bytes().to_vec())
        }
        (_, Value::Timestamp(t)) => SqlValue::Integer(t.ticks()),
        (ColumnType::Timestamp, Value::Text(s)) => {
            SqlValue::Integer(Timestamp::parse(s).map_err(|_| invalid("not a date"))?.ticks())
        }
        (_, Value::Boolean(b)) => SqlValue::Integer(i64::from(*b)),
        (_, Value::Integer(n)) => SqlValue::Integer(*n),
        (_, Value::Float(f)) => SqlValue::Real(*f),
        (_, Value::Text(s)) => SqlValue::Text(s.clone()),
        (_, Value::Bytes(b)) => SqlValue::Blob(b.clone()),
    })
}

/// Compiles predicates against one table and its always-join ancestors.
pub struct SelectBuilder {
    table: &'static TableMap,
    chain: Vec<&'static TableMap>,
}

impl SelectBuilder {
    pub fn new(table: &'static TableMap) -> Self {
        Self {
            table,
            chain: table.join_chain(),
        }
    }

    pub fn root(&self) -> &'static TableMap {
        self.chain.last().copied().unwrap_or(self.table)
    }

    /// Root-table rows matching `predicate`, paged and ordered.
    pub fn select(
        &self,
        predicate: &Predicate,
        options: &QueryOptions,
    ) -> Result<SqlStatement, StorageError> {
        let root = self.root();
        let mut stmt = self.base(&column_list(root, Some(root.name)), predicate, options)?;
        self.append_order(&mut stmt, options)?;
        self.append_page(&mut stmt, options);
        Ok(stmt)
    }

    /// Every matching key in order, unpaged.
    pub fn select_keys(
        &self,
        predicate: &Predicate,
        options: &QueryOptions,
    ) -> Result<SqlStatement, StorageError> {
        let root = self.root();
        let projection = format!("{}.{}", root.name, root.key_column);
        let mut stmt = self.base(&projection, predicate, options)?;
        self.append_order(&mut stmt, options)?;
        Ok(stmt)
    }

    /// One page of matching keys.
    pub fn page_keys(
        &self,
        predicate: &Predicate,
        options: &QueryOptions,
    ) -> Result<SqlStatement, StorageError> {
        let mut stmt = self.select_keys(predicate, options)?;
        self.append_page(&mut stmt, options);
        Ok(stmt)
    }

    /// Total matches ignoring paging and ordering.
    pub fn count(
        &self,
        predicate: &Predicate,
        options: &QueryOptions,
    ) -> Result<SqlStatement, StorageError> {
        let root = self.root();
        let projection = format!("{}.{}", root.name, root.key_column);
        Ok(self.base(&projection, predicate, options)?.count())
    }

    fn base(
        &self,
        projection: &str,
        predicate: &Predicate,
        options: &QueryOptions,
    ) -> Result<SqlStatement, StorageError> {
        let mut sql = format!("SELECT {projection} FROM {}", self.from_clause());
        let mut params = Vec::new();
        let mut clauses = Vec::new();

        if *predicate != Predicate::All {
            clauses.push(compile(&self.chain, predicate, &mut params)?);
        }
        let root = self.root();
        if root.soft_deletes() && !options.include_obsolete {
            clauses.push(format!("{}.obsoletion_time IS NULL", root.name));
        }
        if root.hides() && !options.include_hidden {
            clauses.push(format!("{}.hidden = 0", root.name));
        }
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        Ok(SqlStatement { sql, params })
    }

    /// The most-derived table with an INNER JOIN for every always-join column.
    fn from_clause(&self) -> String {
        let mut from = self.table.name.to_string();
        for table in &self.chain {
            for column in table.columns {
                if let Some(parent) = column.join {
                    from.push_str(&format!(
                        " INNER JOIN {0} ON {0}.{1} = {2}.{3}",
                        parent.name, parent.key_column, table.name, column.name
                    ));
                }
            }
        }
        from
    }

    fn append_order(
        &self,
        stmt: &mut SqlStatement,
        options: &QueryOptions,
    ) -> Result<(), StorageError> {
        let root = self.root();
        let mut terms = Vec::new();
        for order in &options.order_by {
            let (table, column) = resolve(&self.chain, &order.field)?;
            let dir = if order.descending { "DESC" } else { "ASC" };
            terms.push(format!("{}.{} {dir}", table.name, column.name));
        }
        terms.push(format!("{}.rowid ASC", root.name));
        stmt.sql.push_str(" ORDER BY ");
        stmt.sql.push_str(&terms.join(", "));
        Ok(())
    }

    fn append_page(&self, stmt: &mut SqlStatement, options: &QueryOptions) {
        match options.count {
            Some(count) => {
                stmt.sql.push_str(" LIMIT ? OFFSET ?");
                stmt.params.push(SqlValue::Integer(count as i64));
                stmt.params.push(SqlValue::Integer(options.offset as i64));
            }
            None if options.offset > 0 => {
                stmt.sql.push_str(" LIMIT -1 OFFSET ?");
                stmt.params.push(SqlValue::Integer(options.offset as i64));
            }
            None => {}
        }
    }
}

fn resolve(
    chain: &[&'static TableMap],
    field: &str,
) -> Result<(&'static TableMap, &'static ColumnDef), StorageError> {
    chain
        .iter()
        .find_map(|t| t.resolve_field(field).map(|c| (*t, c)))
        .ok_or_else(|| StorageError::UnknownField {
            table: chain.first().map(|t| t.name).unwrap_or_default().to_string(),
            field: field.to_string(),
        })
}

fn compile(
    chain: &[&'static TableMap],
    predicate: &Predicate,
    params: &mut Vec<SqlValue>,
) -> Result<String, StorageError> {
    Ok(match predicate {
        Predicate::All => "1 = 1".to_string(),
        Predicate::Compare { field, op, value } => {
            let (table, column) = resolve(chain, field)?;
            let bound = bind_value(column, value)?;
            match (op, &bound) {
                (CompareOp::Eq, SqlValue::Null) => format!("{}.{} IS NULL", table.name, column.name),
                (CompareOp::Ne, SqlValue::Null) => {
                    format!("{}.{} IS NOT NULL", table.name, column.name)
                }
                _ => {
                    params.push(bound);
                    format!("{}.{} {} ?", table.name, column.name, op.sql())
                }
            }
        }
        Predicate::IsNull(field) => {
            let (table, column) = resolve(chain, field)?;
            format!("{}.{} IS NULL", table.name, column.name)
        }
        Predicate::IsNotNull(field) => {
            let (table, column) = resolve(chain, field)?;
            format!("{}.{} IS NOT NULL", table.name, column.name)
        }
        Predicate::Like { field, pattern } => {
            let (table, column) = resolve(chain, field)?;
            params.push(SqlValue::Text(like_pattern(pattern)));
            format!("{}.{} LIKE ? ESCAPE '\\'", table.name, column.name)
        }
        Predicate::In { field, values } => {
            let (table, column) = resolve(chain, field)?;
            if values.is_empty() {
                return Ok("1 = 0".to_string());
            }
            for value in values {
                params.push(bind_value(column, value)?);
            }
            let marks = vec!["?"; values.len()].join(", ");
            format!("{}.{} IN ({marks})", table.name, column.name)
        }
        Predicate::And(items) if items.is_empty() => "1 = 1".to_string(),
        Predicate::Or(items) if items.is_empty() => "1 = 0".to_string(),
        Predicate::And(items) => join(chain, items, " AND ", params)?,
        Predicate::Or(items) => join(chain, items, " OR ", params)?,
        Predicate::Not(inner) => format!("NOT ({})", compile(chain, inner, params)?),
        Predicate::Any {
            collection,
            predicate,
        } => {
            let (owner, child) = chain
                .iter()
                .find_map(|t| t.collection(collection).map(|c| (*t, c)))
                .ok_or_else(|| StorageError::UnknownCollection {
                    table: chain.first().map(|t| t.name).unwrap_or_default().to_string(),
                    collection: collection.clone(),
                })?;
            let inner = compile(&child.join_chain(), predicate, params)?;
            format!(
                "{}.{} IN (SELECT {2}.source_key FROM {2} WHERE {inner})",
                owner.name, owner.key_column, child.name
            )
        }
    })
}

fn join(
    chain: &[&'static TableMap],
    items: &[Predicate],
    sep: &str,
    params: &mut Vec<SqlValue>,
) -> Result<String, StorageError> {
    let parts = items
        .iter()
        .map(|p| compile(chain, p, params).map(|s| format!("({s})")))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(parts.join(sep))
}
