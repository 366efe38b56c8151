use std::sync::Arc;

use rusqlite::{Connection, params_from_iter};

use hearth_core::{Key, QueryId};
use hearth_storage::{CompiledFilter, Predicate, QueryOptions, SelectBuilder, SqlStatement, TableMap, sqlite};

use crate::context::DataContext;
use crate::error::EngineError;
use crate::registry::QueryRegistry;

/// One page of hydrated results.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult<T> {
    pub results: Vec<T>,
    pub total: usize,
    /// Echoes the id the full result set was registered under, if any.
    pub query_id: Option<QueryId>,
}

/// The three statements behind one query.
#[derive(Debug, Clone)]
pub struct KeyQuery {
    pub page: SqlStatement,
    pub count: SqlStatement,
    pub keys: SqlStatement,
}

impl KeyQuery {
    pub fn typed(
        table: &'static TableMap,
        predicate: &Predicate,
        options: &QueryOptions,
    ) -> Result<Self, EngineError> {
        let builder = SelectBuilder::new(table);
        Ok(Self {
            page: builder.page_keys(predicate, options)?,
            count: builder.count(predicate, options)?,
            keys: builder.select_keys(predicate, options)?,
        })
    }

    pub fn named(filter: &CompiledFilter, options: &QueryOptions) -> Self {
        Self {
            page: filter.page(options),
            count: filter.count(),
            keys: filter.keys(),
        }
    }
}

pub(crate) fn run_keys(conn: &Connection, stmt: &SqlStatement) -> Result<Vec<Key>, EngineError> {
    let mut prepared = conn.prepare_cached(&stmt.sql)?;
    let blobs = prepared
        .query_map(params_from_iter(stmt.params.iter()), |row| row.get::<_, Vec<u8>>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    blobs
        .iter()
        .map(|b| Key::from_slice(b).map_err(EngineError::from))
        .collect()
}

fn run_count(conn: &Connection, stmt: &SqlStatement) -> Result<usize, EngineError> {
    let total: i64 = conn
        .prepare_cached(&stmt.sql)?
        .query_row(params_from_iter(stmt.params.iter()), |row| row.get(0))?;
    Ok(usize::try_from(total).unwrap_or(0))
}

/// Returns one page of keys and the total. A registered `query_id` is
/// served from the registry; otherwise the query runs and, when an id is
/// given, its full key set is registered.
pub fn execute(
    ctx: &DataContext<'_>,
    query: KeyQuery,
    options: &QueryOptions,
    query_id: Option<QueryId>,
) -> Result<(Vec<Key>, usize), EngineError> {
    let registry = &ctx.services().registry;
    if let Some(id) = query_id.filter(|id| registry.is_registered(*id)) {
        let keys = registry.get_results(id, options.offset, options.count);
        let total = registry
            .result_total(id)
            .unwrap_or(options.offset + keys.len());
        log::debug!("event=query_served module=query query_id={id} keys={}", keys.len());
        return Ok((keys, total));
    }

    let keys = run_keys(ctx.conn(), &query.page)?;
    let total = if ctx.config().count_totals {
        run_count(ctx.conn(), &query.count)?
    } else {
        options.offset + keys.len()
    };

    if let Some(id) = query_id {
        register(ctx, id, query.keys)?;
    }
    Ok((keys, total))
}

/// Registers off-thread on a read-only connection when the store is a
/// file with committed state; inline otherwise.
fn register(ctx: &DataContext<'_>, id: QueryId, stmt: SqlStatement) -> Result<(), EngineError> {
    let services = ctx.services();
    let background = services.config.background_query_registration
        && !ctx.is_staged()
        && !ctx.in_write_tx();
    if let (true, Some(work), Some(path)) = (background, &services.work, &services.store_path) {
        let registry: Arc<dyn QueryRegistry> = Arc::clone(&services.registry);
        let path = path.clone();
        let timeout = services.config.busy_timeout();
        work.queue_work_item(Box::new(move || {
            let keys = sqlite::open_read_only(&path, timeout)
                .map_err(EngineError::from)
                .and_then(|conn| run_keys(&conn, &stmt));
            match keys {
                Ok(keys) => registry.register_query_set(id, keys),
                Err(e) => {
                    log::warn!("event=query_registration_failed module=query query_id={id} error={e}")
                }
            }
        }))?;
        return Ok(());
    }

    let keys = run_keys(ctx.conn(), &stmt)?;
    services.registry.register_query_set(id, keys);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::tests::services;
    use hearth_core::Timestamp;
    use hearth_core::model::{RecordMeta, SecurityRole};
    use hearth_storage::mapper::SecurityRoleMapping;
    use hearth_storage::{RowMapping, SqliteStore, tables};

    fn seed(store: &SqliteStore, names: &[&str]) -> Vec<Key> {
        names
            .iter()
            .map(|name| {
                let key = Key::new();
                let role = SecurityRole {
                    name: Some((*name).into()),
                    meta: RecordMeta {
                        creation_time: Some(Timestamp::now()),
                        ..Default::default()
                    },
                    ..Default::default()
                };
                sqlite::insert_row(store.conn(), &SecurityRoleMapping::to_row(key, &role).unwrap()).unwrap();
                key
            })
            .collect()
    }

    #[test]
    fn pages_and_counts() {
        let store = SqliteStore::open_in_memory().unwrap();
        let services = services();
        let ctx = DataContext::new(store.conn(), &services);
        let keys = seed(&store, &["a", "b", "c", "d"]);

        let options = QueryOptions::page(1, 2);
        let query = KeyQuery::typed(&tables::SECURITY_ROLE, &Predicate::All, &options).unwrap();
        let (page, total) = execute(&ctx, query, &options, None).unwrap();
        assert_eq!(page, keys[1..3].to_vec());
        assert_eq!(total, 4);
    }

    #[test]
    fn registered_set_serves_later_pages() {
        let store = SqliteStore::open_in_memory().unwrap();
        let services = services();
        let ctx = DataContext::new(store.conn(), &services);
        let keys = seed(&store, &["a", "b", "c"]);
        let id = QueryId::new();

        let first = QueryOptions::page(0, 1);
        let query = KeyQuery::typed(&tables::SECURITY_ROLE, &Predicate::All, &first).unwrap();
        execute(&ctx, query, &first, Some(id)).unwrap();
        assert!(services.registry.is_registered(id));

        // Rows written after registration are not part of the set.
        seed(&store, &["d"]);
        let second = QueryOptions::page(1, 5);
        let query = KeyQuery::typed(&tables::SECURITY_ROLE, &Predicate::All, &second).unwrap();
        let (page, total) = execute(&ctx, query, &second, Some(id)).unwrap();
        assert_eq!(page, keys[1..].to_vec());
        assert_eq!(total, 3);
    }

    #[test]
    fn totals_can_be_skipped() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut services = services();
        services.config.count_totals = false;
        let ctx = DataContext::new(store.conn(), &services);
        seed(&store, &["a", "b", "c"]);

        let options = QueryOptions::page(2, 10);
        let query = KeyQuery::typed(&tables::SECURITY_ROLE, &Predicate::All, &options).unwrap();
        let (page, total) = execute(&ctx, query, &options, None).unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(total, 3);
    }
}
