//! Table caching
//!
//! Typed access to tabular results stored under the `df` prefix.

use std::time::Duration;

use tracing::warn;

use crate::manager::{CacheManager, Tier};
use crate::models::{Payload, Table, ValueMap};

/// Key prefix for tabular payloads.
pub const DATAFRAME_PREFIX: &str = "df";

/// Cached table for `(session_id, operation, params)`, if any.
///
/// A non-tabular payload under a table key is reported as a miss.
pub fn get_table(
    cache: &CacheManager,
    session_id: &str,
    operation: &str,
    params: Option<&ValueMap>,
) -> Option<Table> {
    match cache.get(DATAFRAME_PREFIX, session_id, operation, params)? {
        Payload::Tabular(table) => Some(table),
        other => {
            warn!(
                session_id = %session_id,
                operation = %operation,
                kind = other.kind(),
                "non-tabular payload under table key"
            );
            None
        }
    }
}

pub fn set_table(
    cache: &CacheManager,
    session_id: &str,
    operation: &str,
    table: Table,
    params: Option<&ValueMap>,
    ttl: Option<Duration>,
) -> Option<Tier> {
    cache.set(
        DATAFRAME_PREFIX,
        session_id,
        operation,
        Payload::Tabular(table),
        params,
        ttl,
    )
}

/// Returns the cached table or computes, caches and returns it.
///
/// Errors from `compute` are passed through and nothing is cached.
pub fn cached_table<E, F>(
    cache: &CacheManager,
    session_id: &str,
    operation: &str,
    params: Option<&ValueMap>,
    ttl: Option<Duration>,
    compute: F,
) -> Result<Table, E>
where
    F: FnOnce() -> Result<Table, E>,
{
    if let Some(table) = get_table(cache, session_id, operation, params) {
        return Ok(table);
    }

    let table = compute()?;
    set_table(cache, session_id, operation, table.clone(), params, ttl);
    Ok(table)
}
