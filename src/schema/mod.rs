pub mod arrow;
pub mod batch;
pub mod tables;
pub mod types;

pub use self::arrow::{build_arrow_schema, map_to_arrow_type};
pub use batch::{stamped_batch, TableRows};
pub use tables::{countries_schema, observations_schema, COUNTRIES_TABLE, OBSERVATIONS_TABLE};
pub use types::{ColumnSpec, ColumnType, Mode, TableSchema};
