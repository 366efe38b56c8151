use rusqlite::types::Value as SqlValue;

use hearth_core::{Key, Timestamp};

use crate::error::StorageError;
use crate::mapping::ColumnType;
use crate::named::NamedQuery;
use crate::sql::{QueryOptions, SqlStatement, like_pattern};

/// Filter keys with one or more values each, in the order given.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamedFilters {
    entries: Vec<(String, Vec<String>)>,
}

impl NamedFilters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a value; repeated keys collect values that are OR'ed.
    pub fn with(mut self, key: &str, value: &str) -> Self {
        match self.entries.iter_mut().find(|(k, _)| k == key) {
            Some((_, values)) => values.push(value.to_string()),
            None => self.entries.push((key.to_string(), vec![value.to_string()])),
        }
        self
    }

    pub fn entries(&self) -> &[(String, Vec<String>)] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterKey {
    /// First path segment; selects a collection view when it names one.
    pub prefix: String,
    pub column: String,
    pub guard: Option<String>,
    pub guard_column: String,
}

pub fn parse_key(key: &str) -> Result<FilterKey, StorageError> {
    let invalid = |reason: &str| StorageError::InvalidFilter {
        key: key.to_string(),
        value: String::new(),
        reason: reason.to_string(),
    };
    let (prop, guard, rest) = match key.find('[') {
        Some(open) => {
            let close = key[open..]
                .find(']')
                .map(|i| open + i)
                .ok_or_else(|| invalid("unclosed guard"))?;
            let rest = &key[close + 1..];
            if !(rest.is_empty() || rest.starts_with('.')) {
                return Err(invalid("guard must end a path segment"));
            }
            (&key[..open], Some(&key[open + 1..close]), rest)
        }
        None => (key, None, ""),
    };
    if prop.is_empty() {
        return Err(invalid("empty property"));
    }
    let prefix = prop.split('.').next().unwrap_or(prop).to_string();
    Ok(FilterKey {
        prefix,
        column: format!("{prop}{rest}").replace('.', "_"),
        guard: guard.map(str::to_string),
        guard_column: format!("{}_guard", prop.replace('.', "_")),
    })
}

/// Binds a raw filter operand by the view column's type.
pub fn coerce(column: &str, ty: ColumnType, raw: &str) -> Result<SqlValue, StorageError> {
    let invalid = |reason: &str| StorageError::InvalidFilter {
        key: column.to_string(),
        value: raw.to_string(),
        reason: reason.to_string(),
    };
    Ok(match ty {
        ColumnType::Key => {
            let key: Key = raw.parse().map_err(|_| invalid("expected a key"))?;
            SqlValue::Blob(key.as_bytes().to_vec())
        }
        ColumnType::Timestamp => match raw.parse::<i64>() {
            Ok(ticks) => SqlValue::Integer(ticks),
            Err(_) => SqlValue::Integer(
                Timestamp::parse(raw)
                    .map_err(|_| invalid("expected a date"))?
                    .ticks(),
            ),
        },
        ColumnType::Boolean => match raw.to_ascii_lowercase().as_str() {
            "true" | "1" => SqlValue::Integer(1),
            "false" | "0" => SqlValue::Integer(0),
            _ => return Err(invalid("expected a boolean")),
        },
        ColumnType::Integer => SqlValue::Integer(raw.parse().map_err(|_| invalid("expected an integer"))?),
        ColumnType::Real => SqlValue::Real(raw.parse().map_err(|_| invalid("expected a number"))?),
        ColumnType::Text => SqlValue::Text(raw.to_string()),
        ColumnType::Blob => return Err(invalid("blob columns cannot be filtered")),
    })
}

/// One filter value to a clause over `column` and its bound parameter, if any.
///
/// `<v` `<=v` `>v` `>=v` compare, `!v` is not-equal, `null` / `!null` test
/// for null, `~v` is a substring match and a plain `v` is equality.
pub fn compile_value(
    column: &str,
    ty: ColumnType,
    raw: &str,
) -> Result<(String, Option<SqlValue>), StorageError> {
    if raw == "null" {
        return Ok((format!("{column} IS NULL"), None));
    }
    if raw == "!null" {
        return Ok((format!("{column} IS NOT NULL"), None));
    }
    if let Some(v) = raw.strip_prefix('~') {
        return Ok((format!("{column} LIKE ? ESCAPE '\\'"), Some(SqlValue::Text(like_pattern(v)))));
    }
    let (op, operand) = if let Some(v) = raw.strip_prefix("<=") {
        ("<=", v)
    } else if let Some(v) = raw.strip_prefix(">=") {
        (">=", v)
    } else if let Some(v) = raw.strip_prefix('<') {
        ("<", v)
    } else if let Some(v) = raw.strip_prefix('>') {
        (">", v)
    } else if let Some(v) = raw.strip_prefix('!') {
        ("<>", v)
    } else {
        ("=", raw)
    };
    Ok((format!("{column} {op} ?"), Some(coerce(column, ty, operand)?)))
}

struct Fragment {
    sql: String,
    params: Vec<SqlValue>,
}

fn key_clause(
    key: &str,
    parsed: &FilterKey,
    values: &[String],
    lookup: impl Fn(&str) -> Option<ColumnType>,
) -> Result<Fragment, StorageError> {
    let unknown = |column: &str| StorageError::InvalidFilter {
        key: key.to_string(),
        value: values.join(","),
        reason: format!("no column {column}"),
    };
    let ty = lookup(&parsed.column).ok_or_else(|| unknown(&parsed.column))?;
    let mut params = Vec::new();
    let mut alternatives = Vec::new();
    for raw in values {
        let (sql, param) = compile_value(&parsed.column, ty, raw)?;
        alternatives.push(sql);
        params.extend(param);
    }
    let mut sql = format!("({})", alternatives.join(" OR "));
    if let Some(guard) = &parsed.guard {
        let guard_ty = lookup(&parsed.guard_column).ok_or_else(|| unknown(&parsed.guard_column))?;
        sql = format!("{} = ? AND {sql}", parsed.guard_column);
        params.insert(0, coerce(&parsed.guard_column, guard_ty, guard)?);
    }
    Ok(Fragment { sql, params })
}

/// A compiled `WHERE` clause over a named query's root view.
#[derive(Debug, Clone)]
pub struct CompiledFilter {
    pub query: &'static NamedQuery,
    pub clause: String,
    pub params: Vec<SqlValue>,
    order: String,
}

impl CompiledFilter {
    fn base(&self) -> SqlStatement {
        let mut sql = format!("SELECT {} FROM {}", self.query.key_column, self.query.view);
        if !self.clause.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&self.clause);
        }
        SqlStatement {
            sql,
            params: self.params.clone(),
        }
    }

    /// Every matching key, ordered, unpaged.
    pub fn keys(&self) -> SqlStatement {
        let mut stmt = self.base();
        stmt.sql.push_str(&self.order);
        stmt
    }

    pub fn page(&self, options: &QueryOptions) -> SqlStatement {
        let mut stmt = self.keys();
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
        stmt
    }

    pub fn count(&self) -> SqlStatement {
        self.base().count()
    }
}

/// Compiles string filters against `query`. Values for one key are OR'ed;
/// distinct keys over the same collection are INTERSECTed, since one joined
/// row cannot satisfy two different collection-row predicates at once.
pub fn compile_filters(
    query: &'static NamedQuery,
    filters: &NamedFilters,
    options: &QueryOptions,
) -> Result<CompiledFilter, StorageError> {
    let mut root_fragments = Vec::new();
    let mut grouped: Vec<(&str, Vec<Fragment>)> = Vec::new();

    for (key, values) in filters.entries() {
        let parsed = parse_key(key)?;
        match query.collection(&parsed.prefix) {
            Some(collection) => {
                let fragment = key_clause(key, &parsed, values, |c| {
                    collection.column(c).map(|v| v.ty)
                })?;
                let sub = Fragment {
                    sql: format!("SELECT source_key FROM {} WHERE {}", collection.view, fragment.sql),
                    params: fragment.params,
                };
                match grouped.iter_mut().find(|(p, _)| *p == collection.prefix) {
                    Some((_, subs)) => subs.push(sub),
                    None => grouped.push((collection.prefix, vec![sub])),
                }
            }
            None => {
                root_fragments.push(key_clause(key, &parsed, values, |c| {
                    query.column(c).map(|v| v.ty)
                })?);
            }
        }
    }

    let mut clauses = Vec::new();
    let mut params = Vec::new();
    for fragment in root_fragments {
        clauses.push(fragment.sql);
        params.extend(fragment.params);
    }
    for (_, subs) in grouped {
        let selects: Vec<String> = subs.iter().map(|s| s.sql.clone()).collect();
        clauses.push(format!(
            "{} IN ({})",
            query.key_column,
            selects.join(" INTERSECT ")
        ));
        for sub in subs {
            params.extend(sub.params);
        }
    }
    if query.column("obsoletion_time").is_some() && !options.include_obsolete {
        clauses.push("obsoletion_time IS NULL".to_string());
    }
    if query.column("hidden").is_some() && !options.include_hidden {
        clauses.push("hidden = 0".to_string());
    }

    let mut terms = Vec::new();
    for order in &options.order_by {
        if query.column(&order.field).is_none() {
            return Err(StorageError::UnknownField {
                table: query.view.to_string(),
                field: order.field.clone(),
            });
        }
        let dir = if order.descending { "DESC" } else { "ASC" };
        terms.push(format!("{} {dir}", order.field));
    }
    terms.push(format!("{} ASC", query.key_column));

    Ok(CompiledFilter {
        query,
        clause: clauses.join(" AND "),
        params,
        order: format!(" ORDER BY {}", terms.join(", ")),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::named::ENTITY_SEARCH;

    #[test]
    fn not_null_binds_nothing() {
        let (sql, param) = compile_value("foo", ColumnType::Integer, "!null").unwrap();
        assert_eq!(sql, "foo IS NOT NULL");
        assert_eq!(param, None);

        let (sql, param) = compile_value("foo", ColumnType::Integer, "null").unwrap();
        assert_eq!(sql, "foo IS NULL");
        assert_eq!(param, None);
    }

    #[test]
    fn comparison_prefixes() {
        let (sql, param) = compile_value("foo", ColumnType::Integer, ">=5").unwrap();
        assert_eq!(sql, "foo >= ?");
        assert_eq!(param, Some(SqlValue::Integer(5)));

        let cases = [("<5", "foo < ?"), ("<=5", "foo <= ?"), (">5", "foo > ?"), ("!5", "foo <> ?"), ("5", "foo = ?")];
        for (raw, expected) in cases {
            assert_eq!(compile_value("foo", ColumnType::Integer, raw).unwrap().0, expected);
        }
    }

    #[test]
    fn substring_match() {
        let (sql, param) = compile_value("name", ColumnType::Text, "~smi").unwrap();
        assert_eq!(sql, "name LIKE ? ESCAPE '\\'");
        assert_eq!(param, Some(SqlValue::Text("%smi%".into())));

        let (_, param) = compile_value("name", ColumnType::Text, "~50%").unwrap();
        assert_eq!(param, Some(SqlValue::Text("%50\\%%".into())));
    }

    #[test]
    fn coercion_by_column_type() {
        let key = Key::new();
        assert_eq!(
            coerce("k", ColumnType::Key, &key.to_string()).unwrap(),
            SqlValue::Blob(key.as_bytes().to_vec())
        );
        assert_eq!(
            coerce("d", ColumnType::Timestamp, "1970-01-02").unwrap(),
            SqlValue::Integer(86_400_000)
        );
        assert_eq!(coerce("b", ColumnType::Boolean, "true").unwrap(), SqlValue::Integer(1));
        assert!(coerce("i", ColumnType::Integer, "five").is_err());
    }

    #[test]
    fn parses_guarded_paths() {
        let k = parse_key("relationship[Mother].target").unwrap();
        assert_eq!(k.prefix, "relationship");
        assert_eq!(k.column, "relationship_target");
        assert_eq!(k.guard.as_deref(), Some("Mother"));
        assert_eq!(k.guard_column, "relationship_guard");

        let k = parse_key("name.component").unwrap();
        assert_eq!((k.prefix.as_str(), k.column.as_str(), k.guard), ("name", "name_component", None));

        assert!(parse_key("identifier[NHS").is_err());
        assert!(parse_key("identifier[NHS]x").is_err());
    }

    #[test]
    fn values_for_one_key_are_ored() {
        let filters = NamedFilters::new()
            .with("deceased_time", "null")
            .with("deceased_time", ">2020-01-01");
        let compiled = compile_filters(&ENTITY_SEARCH, &filters, &QueryOptions::default()).unwrap();
        assert!(compiled.clause.starts_with("(deceased_time IS NULL OR deceased_time > ?)"));
        assert_eq!(compiled.params.len(), 1);
    }

    #[test]
    fn guard_precedes_the_match() {
        let filters = NamedFilters::new().with("identifier[NHS]", "123");
        let compiled = compile_filters(&ENTITY_SEARCH, &filters, &QueryOptions::default()).unwrap();
        assert!(compiled.clause.contains(
            "uuid IN (SELECT source_key FROM entity_identifier_search WHERE identifier_guard = ? AND (identifier = ?))"
        ));
        assert_eq!(
            compiled.params,
            vec![SqlValue::Text("NHS".into()), SqlValue::Text("123".into())]
        );
    }

    #[test]
    fn distinct_collection_keys_intersect() {
        let (mother, father) = (Key::new(), Key::new());
        let (a, b) = (Key::new(), Key::new());
        let filters = NamedFilters::new()
            .with(&format!("relationship[{mother}].target"), &a.to_string())
            .with(&format!("relationship[{father}].target"), &b.to_string());
        let compiled = compile_filters(&ENTITY_SEARCH, &filters, &QueryOptions::default()).unwrap();

        assert!(compiled.clause.contains(" INTERSECT "));
        assert_eq!(compiled.clause.matches("SELECT source_key").count(), 2);
        assert_eq!(compiled.clause.matches("uuid IN").count(), 1);
        assert_eq!(compiled.params[0], SqlValue::Blob(mother.as_bytes().to_vec()));
        assert_eq!(compiled.params[3], SqlValue::Blob(b.as_bytes().to_vec()));
    }

    #[test]
    fn unknown_column_is_rejected() {
        let filters = NamedFilters::new().with("shoe_size", "9");
        assert!(compile_filters(&ENTITY_SEARCH, &filters, &QueryOptions::default()).is_err());
    }

    #[test]
    fn paging_and_count() {
        let filters = NamedFilters::new().with("gender_concept_key", "!null");
        let compiled = compile_filters(&ENTITY_SEARCH, &filters, &QueryOptions::default()).unwrap();
        let page = compiled.page(&QueryOptions::page(20, 10));
        assert!(page.sql.ends_with("ORDER BY uuid ASC LIMIT ? OFFSET ?"));
        assert!(compiled.count().sql.starts_with("SELECT COUNT(*) FROM (SELECT uuid FROM entity_search WHERE"));
        assert!(compiled.clause.contains("obsoletion_time IS NULL"));
    }
}
