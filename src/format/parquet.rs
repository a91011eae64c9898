use crate::format::{Format, FormatOptions};
use crate::payload::{Cell, Payload, Table};
use anyhow::{Context, Result, anyhow, bail};
use arrow::array::{ArrayRef, BooleanArray, Float64Array, Int32Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::arrow_writer::ArrowWriter;
use parquet::file::reader::{FileReader, SerializedFileReader};
use std::sync::Arc;
use tracing::debug;

/// Tabular data via arrow + parquet, entirely in memory.
///
/// Column types are inferred from the cells: all-integer columns become
/// `Int64`, numeric columns with any float become `Float64`, all-boolean
/// columns become `Boolean`, everything else is rendered as `Utf8`. All
/// columns are nullable (`Null` cells).
///
/// Loading tries the columnar record-batch reader first and falls back to the
/// row-based reader on any error.
pub struct ParquetFormat;

#[derive(Clone, Copy, PartialEq)]
enum ColumnKind {
    Int,
    Float,
    Bool,
    Str,
}

fn infer_kind(table: &Table, col: usize) -> ColumnKind {
    let mut kind: Option<ColumnKind> = None;
    for row in &table.rows {
        let cell_kind = match row.get(col) {
            Some(Cell::Null) | None => continue,
            Some(Cell::Int(_)) => ColumnKind::Int,
            Some(Cell::Float(_)) => ColumnKind::Float,
            Some(Cell::Bool(_)) => ColumnKind::Bool,
            Some(Cell::Str(_)) => ColumnKind::Str,
        };
        kind = Some(match (kind, cell_kind) {
            (None, k) => k,
            (Some(k), c) if k == c => k,
            (Some(ColumnKind::Int), ColumnKind::Float)
            | (Some(ColumnKind::Float), ColumnKind::Int) => ColumnKind::Float,
            _ => return ColumnKind::Str,
        });
    }
    kind.unwrap_or(ColumnKind::Str)
}

fn build_column(table: &Table, col: usize, kind: ColumnKind) -> Result<(DataType, ArrayRef)> {
    let cell = |row: &Vec<Cell>| row.get(col).cloned().unwrap_or(Cell::Null);
    Ok(match kind {
        ColumnKind::Int => {
            let values: Vec<Option<i64>> = table
                .rows
                .iter()
                .map(|r| match cell(r) {
                    Cell::Int(i) => Some(i),
                    _ => None,
                })
                .collect();
            (DataType::Int64, Arc::new(Int64Array::from(values)))
        }
        ColumnKind::Float => {
            let values: Vec<Option<f64>> = table
                .rows
                .iter()
                .map(|r| match cell(r) {
                    Cell::Float(f) => Some(f),
                    Cell::Int(i) => Some(i as f64),
                    _ => None,
                })
                .collect();
            (DataType::Float64, Arc::new(Float64Array::from(values)))
        }
        ColumnKind::Bool => {
            let values: Vec<Option<bool>> = table
                .rows
                .iter()
                .map(|r| match cell(r) {
                    Cell::Bool(b) => Some(b),
                    _ => None,
                })
                .collect();
            (DataType::Boolean, Arc::new(BooleanArray::from(values)))
        }
        ColumnKind::Str => {
            let values: Vec<Option<String>> = table
                .rows
                .iter()
                .map(|r| match cell(r) {
                    Cell::Null => None,
                    c => Some(c.render()),
                })
                .collect();
            (DataType::Utf8, Arc::new(StringArray::from(values)))
        }
    })
}

fn to_record_batch(table: &Table) -> Result<RecordBatch> {
    let mut fields = Vec::with_capacity(table.columns.len());
    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(table.columns.len());
    for (col, name) in table.columns.iter().enumerate() {
        let kind = infer_kind(table, col);
        let (dtype, array) = build_column(table, col, kind)?;
        fields.push(Field::new(name, dtype, true));
        arrays.push(array);
    }
    let schema = Arc::new(Schema::new(fields));
    if arrays.is_empty() {
        return Ok(RecordBatch::new_empty(schema));
    }
    RecordBatch::try_new(schema, arrays).context("assemble record batch")
}

fn cell_at(array: &ArrayRef, row: usize) -> Result<Cell> {
    use arrow::array::Array;
    if array.is_null(row) {
        return Ok(Cell::Null);
    }
    let any = array.as_any();
    if let Some(a) = any.downcast_ref::<Int64Array>() {
        return Ok(Cell::Int(a.value(row)));
    }
    if let Some(a) = any.downcast_ref::<Int32Array>() {
        return Ok(Cell::Int(i64::from(a.value(row))));
    }
    if let Some(a) = any.downcast_ref::<Float64Array>() {
        return Ok(Cell::Float(a.value(row)));
    }
    if let Some(a) = any.downcast_ref::<BooleanArray>() {
        return Ok(Cell::Bool(a.value(row)));
    }
    if let Some(a) = any.downcast_ref::<StringArray>() {
        return Ok(Cell::Str(a.value(row).to_string()));
    }
    bail!("unsupported arrow column type {:?}", array.data_type())
}

fn read_columnar(bytes: &[u8]) -> Result<Table> {
    let data = bytes::Bytes::copy_from_slice(bytes);
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(data).context("open parquet reader")?;
    let columns: Vec<String> = builder
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();
    let reader = builder.build().context("build record batch reader")?;
    let mut table = Table::new(columns);
    for batch in reader {
        let batch = batch.context("read record batch")?;
        for row in 0..batch.num_rows() {
            let mut cells = Vec::with_capacity(batch.num_columns());
            for col in 0..batch.num_columns() {
                cells.push(cell_at(batch.column(col), row)?);
            }
            table.push_row(cells);
        }
    }
    Ok(table)
}

fn read_rows(bytes: &[u8]) -> Result<Table> {
    use parquet::record::Field as PqField;

    let data = bytes::Bytes::copy_from_slice(bytes);
    let reader = SerializedFileReader::new(data).context("open parquet file reader")?;
    let columns: Vec<String> = reader
        .metadata()
        .file_metadata()
        .schema_descr()
        .columns()
        .iter()
        .map(|c| c.name().to_string())
        .collect();
    let mut table = Table::new(columns);
    for row in reader.get_row_iter(None).context("iterate parquet rows")? {
        let row = row.context("read parquet row")?;
        let mut cells = Vec::new();
        for (_, field) in row.get_column_iter() {
            cells.push(match field {
                PqField::Null => Cell::Null,
                PqField::Bool(b) => Cell::Bool(*b),
                PqField::Byte(v) => Cell::Int(i64::from(*v)),
                PqField::Short(v) => Cell::Int(i64::from(*v)),
                PqField::Int(v) => Cell::Int(i64::from(*v)),
                PqField::Long(v) => Cell::Int(*v),
                PqField::Float(v) => Cell::Float(f64::from(*v)),
                PqField::Double(v) => Cell::Float(*v),
                PqField::Str(s) => Cell::Str(s.clone()),
                other => bail!("unsupported parquet field {other:?}"),
            });
        }
        table.push_row(cells);
    }
    Ok(table)
}

impl Format for ParquetFormat {
    fn encode(&self, payload: &Payload, _opts: &FormatOptions) -> Result<Vec<u8>> {
        let table = match payload {
            Payload::Table(t) => t,
            other => bail!("parquet handler expects a Table payload, got {other:?}"),
        };
        let batch = to_record_batch(table)?;
        let mut buf = Vec::new();
        let mut writer = ArrowWriter::try_new(&mut buf, batch.schema(), None)
            .context("create parquet writer")?;
        writer.write(&batch).context("write record batch")?;
        writer.close().context("finish parquet file")?;
        Ok(buf)
    }

    fn decode(&self, bytes: &[u8], _opts: &FormatOptions) -> Result<Payload> {
        let table = match read_columnar(bytes) {
            Ok(table) => table,
            Err(columnar_err) => {
                debug!("columnar parquet read failed, retrying row-based: {columnar_err:#}");
                read_rows(bytes).map_err(|row_err| {
                    anyhow!("parquet decode failed: columnar: {columnar_err:#}; rows: {row_err:#}")
                })?
            }
        };
        Ok(Payload::Table(table))
    }
}
