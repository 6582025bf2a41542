//! Analysis-result caching
//!
//! Typed access to named analysis outputs stored under the `analysis` prefix.

use std::time::Duration;

use tracing::warn;

use crate::manager::{CacheManager, Tier};
use crate::models::{Payload, ValueMap};

/// Key prefix for analysis-result payloads.
pub const ANALYSIS_PREFIX: &str = "analysis";

/// Named outputs of one analysis run.
pub type AnalysisResult = ValueMap;

pub fn get_analysis(
    cache: &CacheManager,
    session_id: &str,
    operation: &str,
    params: Option<&ValueMap>,
) -> Option<AnalysisResult> {
    match cache.get(ANALYSIS_PREFIX, session_id, operation, params)? {
        Payload::StructuredMap(result) => Some(result),
        other => {
            warn!(
                session_id = %session_id,
                operation = %operation,
                kind = other.kind(),
                "unexpected payload under analysis key"
            );
            None
        }
    }
}

pub fn set_analysis(
    cache: &CacheManager,
    session_id: &str,
    operation: &str,
    result: AnalysisResult,
    params: Option<&ValueMap>,
    ttl: Option<Duration>,
) -> Option<Tier> {
    cache.set(
        ANALYSIS_PREFIX,
        session_id,
        operation,
        Payload::StructuredMap(result),
        params,
        ttl,
    )
}

/// Returns the cached result or computes, caches and returns it.
///
/// Errors from `compute` are passed through and nothing is cached.
pub fn cached_analysis<E, F>(
    cache: &CacheManager,
    session_id: &str,
    operation: &str,
    params: Option<&ValueMap>,
    ttl: Option<Duration>,
    compute: F,
) -> Result<AnalysisResult, E>
where
    F: FnOnce() -> Result<AnalysisResult, E>,
{
    if let Some(result) = get_analysis(cache, session_id, operation, params) {
        return Ok(result);
    }

    let result = compute()?;
    set_analysis(cache, session_id, operation, result.clone(), params, ttl);
    Ok(result)
}
