//! API Module
//!
//! Typed accessors over `CacheManager` for the payload shapes the analysis
//! layers use.
//!
//! # Accessors
//! - `tables` - tabular data under the `df` prefix
//! - `analysis` - analysis-result maps under the `analysis` prefix
//!
//! Each offers `get_*`, `set_*` and a `cached_*` get-or-compute helper.

pub mod analysis;
pub mod tables;

pub use analysis::{cached_analysis, get_analysis, set_analysis, AnalysisResult, ANALYSIS_PREFIX};
pub use tables::{cached_table, get_table, set_table, DATAFRAME_PREFIX};
