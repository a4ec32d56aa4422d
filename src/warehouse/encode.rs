// src/warehouse/encode.rs

use anyhow::{Context, Result};
use arrow::record_batch::RecordBatch;
use parquet::{arrow::ArrowWriter, basic::Compression, file::properties::WriterProperties};
use std::io::Write;

fn writer_props() -> WriterProperties {
    WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build()
}

/// Write `batch` as a single Parquet file into `sink`.
pub fn write_parquet<W: Write + Send>(sink: W, batch: &RecordBatch) -> Result<()> {
    let mut writer = ArrowWriter::try_new(sink, batch.schema(), Some(writer_props()))
        .context("creating parquet writer")?;
    writer.write(batch).context("writing batch to parquet")?;
    writer.close().context("closing parquet writer")?;
    Ok(())
}

/// Encode `batch` as an in-memory Parquet file.
pub fn encode_parquet(batch: &RecordBatch) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    write_parquet(&mut buffer, batch)?;
    Ok(buffer)
}
