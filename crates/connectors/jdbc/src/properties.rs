//! Split property keys written by the planners. Partition and range keys
//! are read back by [`crate::SqlCompiler`], export keys by
//! [`crate::ExportReadCompiler`].

pub const PARTITION_NAME: &str = "partition_name";

pub const RANGE_COLUMN: &str = "range_column";
pub const RANGE_LOW: &str = "range_low";
pub const RANGE_HIGH: &str = "range_high";
/// Set on the first bucket, which also carries rows whose key is NULL.
pub const RANGE_INCLUDES_NULLS: &str = "range_includes_nulls";

pub const EXPORT_LOCATION: &str = "export_location";
pub const EXPORT_OBJECT: &str = "export_object";
