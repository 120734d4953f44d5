//! Mapping entries, their durable store and merge suggestions.

pub mod entry;
pub mod heuristic;
mod legacy;
pub mod store;

pub use entry::{
    merge_key, ColumnMap, MappingEntry, MergeMapping, SingleMapping, SplitMapping, SplitTarget,
};
pub use heuristic::{suggest_merge, MergeDraft};
pub use legacy::LegacyShape;
pub use store::{MappingStore, StoreLoadReport};
