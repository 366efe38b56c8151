use hearth_core::Bundle;
use hearth_storage::{MergeProgress, MergeReport, SqliteStaging, StagedStore, StagingBackend};

use crate::context::DataContext;
use crate::error::EngineError;
use crate::locator::PersisterRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportStrategy {
    Direct,
    Staged,
}

impl ImportStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportStrategy::Direct => "direct",
            ImportStrategy::Staged => "staged",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ImportOutcome {
    /// The saved items, keyed and versioned, in bundle order.
    pub bundle: Bundle,
    pub strategy: ImportStrategy,
    /// Present when the bundle went through staging.
    pub merge: Option<MergeReport>,
}

/// Small bundles run item by item inside a savepoint on the caller's
/// connection. Larger ones are written into a staging database and merged
/// into the primary under one exclusive transaction, falling back to the
/// direct path once if staging fails.
pub struct BundleCoordinator<'a> {
    persisters: &'a PersisterRegistry,
}

impl<'a> BundleCoordinator<'a> {
    pub fn new(persisters: &'a PersisterRegistry) -> Self {
        Self { persisters }
    }

    /// Whether `ctx` would stage a bundle of `items` records.
    pub fn would_stage(ctx: &DataContext<'_>, items: usize) -> bool {
        items > ctx.config().bulk_threshold
            && ctx.services().store_path.is_some()
            && !ctx.in_write_tx()
            && !ctx.is_staged()
    }

    pub fn import(&self, ctx: &DataContext<'_>, bundle: Bundle) -> Result<ImportOutcome, EngineError> {
        let items = bundle.len();
        let outcome = if Self::would_stage(ctx, items) {
            match self.import_staged(ctx, bundle.clone()) {
                Ok(outcome) => outcome,
                Err(e) => {
                    log::warn!("event=bundle_staging_failed module=bundle items={items} error={e}");
                    self.direct_outcome(ctx, bundle)?
                }
            }
        } else {
            self.direct_outcome(ctx, bundle)?
        };

        for key in outcome.bundle.items.iter().filter_map(|item| item.key()) {
            ctx.forget(key);
        }
        log::info!(
            "event=bundle_import module=bundle strategy={} items={items}",
            outcome.strategy.as_str()
        );
        Ok(outcome)
    }

    fn direct_outcome(&self, ctx: &DataContext<'_>, bundle: Bundle) -> Result<ImportOutcome, EngineError> {
        Ok(ImportOutcome {
            bundle: self.import_direct(ctx, bundle)?,
            strategy: ImportStrategy::Direct,
            merge: None,
        })
    }

    /// Saves every item in order inside one savepoint.
    pub fn import_direct(&self, ctx: &DataContext<'_>, bundle: Bundle) -> Result<Bundle, EngineError> {
        ctx.in_transaction(|ctx| {
            bundle
                .items
                .into_iter()
                .map(|item| self.persisters.resolve(item.model_type())?.save(ctx, item))
                .collect::<Result<Bundle, EngineError>>()
        })
    }

    fn import_staged(&self, ctx: &DataContext<'_>, bundle: Bundle) -> Result<ImportOutcome, EngineError> {
        let services = ctx.services();
        let path = services
            .store_path
            .as_deref()
            .ok_or_else(|| EngineError::Config("staging needs a file-backed store".into()))?;
        let reference_tables = services.config.resolved_reference_tables()?;
        let staging = SqliteStaging::new(path, services.config.busy_timeout());
        let store = staging.begin_staging(&reference_tables)?;

        let saved = {
            let staged = DataContext::staged(&store, services, ctx.principal());
            self.import_direct(&staged, bundle)?
        };

        let report = store.merge_into_primary(&mut |progress: &MergeProgress| {
            log::debug!(
                "event=bundle_merge_progress module=bundle table={} step={}/{} rows={}",
                progress.table,
                progress.index,
                progress.total,
                progress.rows
            );
        })?;
        Ok(ImportOutcome {
            bundle: saved,
            strategy: ImportStrategy::Staged,
            merge: Some(report),
        })
    }
}
