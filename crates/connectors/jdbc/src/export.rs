//! Reading the objects of a bulk export.
//!
//! An export split names one object written by [`crate::ExportStore`]. The
//! filter was applied when the export ran, so reading a split only streams
//! that object back as rows; it never goes through SQL again.

use crate::properties;
use crate::row::SqlRow;
use async_trait::async_trait;
use floe_common::{Column, Error, Result, TableName};
use floe_connector::{CompiledQuery, Constraints, PredicateCompiler, QueryExecutor, RecordCursor, Split, VecCursor};
use std::fmt;

/// The object one export split reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportObject {
    pub location: String,
    pub object: String,
}

impl ExportObject {
    /// The export object named by `split`, or `None` for a split planned by
    /// another strategy.
    pub fn from_split(split: &Split) -> Result<Option<Self>> {
        let Some(object) = split.property(properties::EXPORT_OBJECT) else {
            return Ok(None);
        };
        let location = split
            .property(properties::EXPORT_LOCATION)
            .ok_or_else(|| Error::malformed(format!("export object '{object}' has no export location")))?;
        Ok(Some(Self { location: location.to_string(), object: object.to_string() }))
    }
}

impl fmt::Display for ExportObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.location.trim_end_matches('/'), self.object)
    }
}

/// Resolves export splits to the object they read. The row limit is left to
/// the orchestrator since an object holds an arbitrary slice of the result.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExportReadCompiler;

impl PredicateCompiler for ExportReadCompiler {
    type Query = ExportObject;

    fn compile(
        &self,
        table: &TableName,
        _columns: &[Column],
        constraints: &Constraints,
        split: &Split,
    ) -> Result<CompiledQuery<ExportObject>> {
        if constraints.pass_through.is_some() {
            return Err(Error::NotSupported(format!("pass-through query over the export of {table}")));
        }
        let object = ExportObject::from_split(split)?
            .ok_or_else(|| Error::malformed(format!("split of {table} does not name an export object")))?;
        tracing::debug!(%table, %object, "reading export object");
        Ok(CompiledQuery::new(object, Vec::new(), false))
    }
}

/// Reads the rows of one exported object.
#[async_trait]
pub trait ObjectReader: Send + Sync {
    async fn read_object(&self, location: &str, object: &str) -> Result<Vec<SqlRow>>;
}

pub struct ExportExecutor<R> {
    reader: R,
    page_size: usize,
}

impl<R: ObjectReader> ExportExecutor<R> {
    pub fn new(reader: R, page_size: usize) -> Self {
        Self { reader, page_size }
    }
}

#[async_trait]
impl<R: ObjectReader> QueryExecutor for ExportExecutor<R> {
    type Query = ExportObject;
    type Record = SqlRow;

    async fn execute(
        &self,
        query: &CompiledQuery<ExportObject>,
        _split: &Split,
    ) -> Result<Box<dyn RecordCursor<Record = SqlRow>>> {
        let rows = self.reader.read_object(&query.query.location, &query.query.object).await?;
        Ok(Box::new(VecCursor::new(rows, self.page_size)))
    }
}
