use crate::format::{Format, FormatOptions};
use crate::payload::{Cell, Payload, Table};
use anyhow::{Context, Result, bail};
use csv::{ReaderBuilder, WriterBuilder};

/// Tabular data via the csv crate.
///
/// Writing renders each [`Cell`] textually (`Null` as an empty field); reading
/// re-infers the narrowest cell type per field, so `load(save(t))` returns the
/// original table for tables whose string cells are not themselves numeric or
/// boolean literals.
pub struct CsvFormat;

impl Format for CsvFormat {
    fn encode(&self, payload: &Payload, opts: &FormatOptions) -> Result<Vec<u8>> {
        let table = match payload {
            Payload::Table(t) => t,
            other => bail!("csv handler expects a Table payload, got {other:?}"),
        };
        let mut wtr = WriterBuilder::new()
            .delimiter(opts.delimiter)
            .from_writer(Vec::new());
        if opts.has_headers {
            wtr.write_record(&table.columns)
                .context("write CSV header row")?;
        }
        for (i, row) in table.rows.iter().enumerate() {
            let fields: Vec<String> = row.iter().map(Cell::render).collect();
            wtr.write_record(&fields)
                .with_context(|| format!("write CSV row #{}", i + 1))?;
        }
        wtr.into_inner().context("flush CSV writer")
    }

    fn decode(&self, bytes: &[u8], opts: &FormatOptions) -> Result<Payload> {
        let mut rdr = ReaderBuilder::new()
            .delimiter(opts.delimiter)
            .has_headers(opts.has_headers)
            .from_reader(bytes);
        let mut table = Table::default();
        if opts.has_headers {
            let headers = rdr.headers().context("read CSV header row")?;
            table.columns = headers.iter().map(str::to_string).collect();
        }
        for (i, rec) in rdr.records().enumerate() {
            let rec = rec.with_context(|| format!("parse CSV record #{}", i + 1))?;
            if table.columns.is_empty() {
                // Headerless input: synthesize positional column names.
                table.columns = (0..rec.len()).map(|c| c.to_string()).collect();
            }
            table.push_row(rec.iter().map(Cell::infer).collect());
        }
        Ok(Payload::Table(table))
    }
}
