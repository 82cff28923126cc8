//! Arrow batch building for canonical rows.

use crate::materializer::CanonicalRow;
use crate::value::Value;
use arrow::array::{
    ArrayRef, BinaryArray, BooleanArray, Date32Array, Decimal128Array, Float32Array, Float64Array, Int16Array,
    Int32Array, Int64Array, Int8Array, ListArray, StringArray, TimestampMillisecondArray,
};
use arrow::buffer::{NullBuffer, OffsetBuffer};
use arrow::datatypes::{DataType as ArrowType, Field, Schema, SchemaRef, TimeUnit};
use arrow::error::ArrowError;
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use floe_common::{Column, DataType, Error, Result};
use std::sync::Arc;

pub fn arrow_type(data_type: &DataType) -> ArrowType {
    match data_type {
        DataType::Boolean => ArrowType::Boolean,
        DataType::Int8 => ArrowType::Int8,
        DataType::Int16 => ArrowType::Int16,
        DataType::Int32 => ArrowType::Int32,
        DataType::Int64 => ArrowType::Int64,
        DataType::Float32 => ArrowType::Float32,
        DataType::Float64 => ArrowType::Float64,
        DataType::Decimal { precision, scale } => ArrowType::Decimal128(*precision, *scale),
        DataType::Utf8 => ArrowType::Utf8,
        DataType::Date => ArrowType::Date32,
        DataType::Timestamp => ArrowType::Timestamp(TimeUnit::Millisecond, None),
        DataType::Binary => ArrowType::Binary,
        DataType::List(inner) => ArrowType::List(Arc::new(list_item_field(inner))),
    }
}

fn list_item_field(inner: &DataType) -> Field {
    Field::new("item", arrow_type(inner), true)
}

/// Every column is nullable: a missing key always materializes as null.
pub fn arrow_schema(columns: &[Column]) -> SchemaRef {
    let fields: Vec<Field> =
        columns.iter().map(|column| Field::new(&column.name, arrow_type(&column.data_type), true)).collect();
    Arc::new(Schema::new(fields))
}

fn arrow_error(err: ArrowError) -> Error {
    Error::Internal(format!("failed to build record batch: {err}"))
}

/// Buffers canonical rows and turns them into one [`RecordBatch`].
pub struct RowBatchBuilder {
    columns: Vec<Column>,
    schema: SchemaRef,
    rows: Vec<CanonicalRow>,
}

impl RowBatchBuilder {
    pub fn new(columns: Vec<Column>) -> Self {
        let schema = arrow_schema(&columns);
        Self { columns, schema, rows: Vec::new() }
    }

    pub fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }

    pub fn push(&mut self, row: CanonicalRow) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(Error::Internal(format!(
                "row has {} slots but the batch has {} columns",
                row.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Drops buffered rows without building a batch.
    pub fn clear(&mut self) {
        self.rows.clear();
    }

    /// Builds a batch from the buffered rows and empties the buffer.
    pub fn finish(&mut self) -> Result<RecordBatch> {
        let rows = std::mem::take(&mut self.rows);
        let arrays = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, column)| {
                let slots: Vec<Option<&Value>> = rows.iter().map(|row| row[i].as_ref()).collect();
                build_array(column, &column.data_type, &slots)
            })
            .collect::<Result<Vec<_>>>()?;
        let options = RecordBatchOptions::new().with_row_count(Some(rows.len()));
        RecordBatch::try_new_with_options(self.schema.clone(), arrays, &options).map_err(arrow_error)
    }
}

macro_rules! primitive_array {
    ($column:expr, $data_type:expr, $slots:expr, $array:ty, $variant:ident) => {{
        let array = $slots
            .iter()
            .map(|slot| match slot {
                None => Ok(None),
                Some(Value::$variant(v)) => Ok(Some(v.clone())),
                Some(other) => Err(Error::type_mismatch(&$column.name, $data_type, other.type_name())),
            })
            .collect::<Result<$array>>()?;
        Arc::new(array) as ArrayRef
    }};
}

fn build_array(column: &Column, data_type: &DataType, slots: &[Option<&Value>]) -> Result<ArrayRef> {
    let array = match data_type {
        DataType::Boolean => primitive_array!(column, data_type, slots, BooleanArray, Boolean),
        DataType::Int8 => primitive_array!(column, data_type, slots, Int8Array, Int8),
        DataType::Int16 => primitive_array!(column, data_type, slots, Int16Array, Int16),
        DataType::Int32 => primitive_array!(column, data_type, slots, Int32Array, Int32),
        DataType::Int64 => primitive_array!(column, data_type, slots, Int64Array, Int64),
        DataType::Float32 => primitive_array!(column, data_type, slots, Float32Array, Float32),
        DataType::Float64 => primitive_array!(column, data_type, slots, Float64Array, Float64),
        DataType::Date => primitive_array!(column, data_type, slots, Date32Array, Date),
        DataType::Timestamp => primitive_array!(column, data_type, slots, TimestampMillisecondArray, Timestamp),
        DataType::Utf8 => primitive_array!(column, data_type, slots, StringArray, Utf8),
        DataType::Binary => primitive_array!(column, data_type, slots, BinaryArray, Binary),
        DataType::Decimal { precision, scale } => {
            let target_scale = (*scale).max(0) as u32;
            let array = slots
                .iter()
                .map(|slot| match slot {
                    None => Ok(None),
                    Some(Value::Decimal(decimal)) => {
                        let mut decimal = *decimal;
                        decimal.rescale(target_scale);
                        Ok(Some(decimal.mantissa()))
                    }
                    Some(other) => Err(Error::type_mismatch(&column.name, data_type, other.type_name())),
                })
                .collect::<Result<Decimal128Array>>()?
                .with_precision_and_scale(*precision, *scale)
                .map_err(arrow_error)?;
            Arc::new(array) as ArrayRef
        }
        DataType::List(inner) => {
            let mut lengths = Vec::with_capacity(slots.len());
            let mut validity = Vec::with_capacity(slots.len());
            let mut items: Vec<Option<&Value>> = Vec::new();
            for slot in slots {
                match slot {
                    None => {
                        lengths.push(0);
                        validity.push(false);
                    }
                    Some(Value::List(values)) => {
                        lengths.push(values.len());
                        validity.push(true);
                        items.extend(values.iter().map(Some));
                    }
                    Some(other) => {
                        return Err(Error::type_mismatch(&column.name, data_type, other.type_name()));
                    }
                }
            }
            let values = build_array(column, inner, &items)?;
            let nulls = validity.iter().any(|valid| !valid).then(|| NullBuffer::from(validity));
            let array = ListArray::try_new(
                Arc::new(list_item_field(inner)),
                OffsetBuffer::from_lengths(lengths),
                values,
                nulls,
            )
            .map_err(arrow_error)?;
            Arc::new(array) as ArrayRef
        }
    };
    Ok(array)
}
