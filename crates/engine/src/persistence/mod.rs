pub mod base;
pub mod identified;
pub mod versioned;

use std::any::Any;

use hearth_core::Key;

use crate::cache::LoadDepth;
use crate::context::DataContext;
use crate::error::EngineError;

/// Cache-aware hydration. Callers get a copy of the cached model; a copy
/// shallower than `depth` is deepened and replaces the cache slot.
pub(crate) fn hydrate<T>(
    ctx: &DataContext<'_>,
    key: Key,
    depth: LoadDepth,
    shallow: impl FnOnce(&DataContext<'_>) -> Result<Option<T>, EngineError>,
    deepen: impl FnOnce(&DataContext<'_>, &mut T) -> Result<(), EngineError>,
) -> Result<Option<T>, EngineError>
where
    T: Any + Clone + Send + Sync,
{
    if let Some((mut model, cached_depth)) = ctx.cached::<T>(key) {
        if cached_depth >= depth {
            return Ok(Some(model));
        }
        deepen(ctx, &mut model)?;
        ctx.remember(key, &model, depth);
        return Ok(Some(model));
    }

    ctx.fault_in(key)?;
    let Some(mut model) = shallow(ctx)? else {
        return Ok(None);
    };
    if depth == LoadDepth::Full {
        deepen(ctx, &mut model)?;
    }
    ctx.remember(key, &model, depth);
    Ok(Some(model))
}
