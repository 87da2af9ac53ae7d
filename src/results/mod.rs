//! Search data, request state and response merging
//!
//! `SearchData` and `SearchState` are the two values a consumer renders from;
//! `DataMerger` decides how appended pages join the data already held.

mod merge;
mod types;

pub use merge::{merge_flat, merge_grouped, DataMerger, MergeFn};
pub use types::*;
