//! Target schema definitions and live table metadata.

pub mod definition;
pub mod live;

pub use definition::{definition_from_live, LoadedDefinition, TableDefinition, TargetSchema};
pub use live::{find_column, primary_key, primary_key_columns, KeyRole, LiveColumn};
