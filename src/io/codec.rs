//! Adapters over the arrow IPC and parquet codecs.
//!
//! The codecs themselves live in the `arrow` and `parquet` crates; this module
//! only maps a [`Table`] onto their readers and writers and turns their errors
//! into [`LakeError`]s without reinterpreting them.

use crate::error::{LakeError, Result};
use crate::format::{Compression, FileFormat};
use crate::table::Table;
use arrow::csv::reader::Format as CsvFormat;
use arrow::csv::ReaderBuilder as CsvReaderBuilder;
use arrow::ipc::CompressionType;
use arrow::ipc::reader::FileReader;
use arrow::ipc::writer::{FileWriter, IpcWriteOptions};
use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::arrow_writer::ArrowWriter;
use parquet::basic::{BrotliLevel, Compression as ParquetCompression, GzipLevel, ZstdLevel};
use parquet::file::properties::WriterProperties;
use std::io::{Cursor, Write};
use std::sync::Arc;

const READ_BATCH_SIZE: usize = 64 * 1024;

/// Decode a whole file held in memory. `path` is only used for error context.
///
/// # Errors
/// [`LakeError::IngestionFailed`] carrying the codec's error.
pub fn read_table(format: FileFormat, data: Bytes, path: &str) -> Result<Table> {
    match format {
        FileFormat::Parquet => read_parquet(data, path),
        FileFormat::Ipc => read_ipc(data, path),
    }
}

fn read_parquet(data: Bytes, path: &str) -> Result<Table> {
    let builder = ParquetRecordBatchReaderBuilder::try_new(data)
        .map_err(|e| LakeError::ingestion("read parquet", path, e))?;
    let schema = Arc::clone(builder.schema());
    let reader = builder
        .with_batch_size(READ_BATCH_SIZE)
        .build()
        .map_err(|e| LakeError::ingestion("read parquet", path, e))?;
    let batches = reader
        .collect::<Result<Vec<RecordBatch>, _>>()
        .map_err(|e| LakeError::ingestion("read parquet", path, e))?;
    Table::try_new(schema, batches)
}

fn read_ipc(data: Bytes, path: &str) -> Result<Table> {
    let reader = FileReader::try_new(Cursor::new(data), None)
        .map_err(|e| LakeError::ingestion("read ipc", path, e))?;
    let schema = reader.schema();
    let batches = reader
        .collect::<Result<Vec<RecordBatch>, _>>()
        .map_err(|e| LakeError::ingestion("read ipc", path, e))?;
    Table::try_new(schema, batches)
}

/// Parse CSV with a header row, inferring column types from the data.
///
/// # Errors
/// [`LakeError::IngestionFailed`] if inference or parsing fails.
pub fn read_csv(data: Bytes, path: &str) -> Result<Table> {
    let format = CsvFormat::default().with_header(true);
    let (schema, _) = format
        .infer_schema(Cursor::new(data.clone()), None)
        .map_err(|e| LakeError::ingestion("read csv", path, e))?;
    let reader = CsvReaderBuilder::new(Arc::new(schema))
        .with_format(format)
        .with_batch_size(READ_BATCH_SIZE)
        .build(Cursor::new(data))
        .map_err(|e| LakeError::ingestion("read csv", path, e))?;
    let schema = reader.schema();
    let batches = reader
        .collect::<Result<Vec<RecordBatch>, _>>()
        .map_err(|e| LakeError::ingestion("read csv", path, e))?;
    Table::try_new(schema, batches)
}

/// Encode `table` into `sink` with the given codec.
///
/// Parquet applies `compression` to every column chunk; IPC records it in the
/// file and supports only LZ4 (frame) and ZSTD. The sink is not closed here.
///
/// # Errors
/// Returns the codec's error boxed as-is; the caller attaches path context.
pub fn write_table<W: Write + Send>(
    format: FileFormat,
    table: &Table,
    sink: W,
    compression: Compression,
) -> std::result::Result<(), crate::error::BoxError> {
    match format {
        FileFormat::Parquet => {
            let props = WriterProperties::builder()
                .set_compression(parquet_compression(compression)?)
                .build();
            let mut writer = ArrowWriter::try_new(sink, table.schema(), Some(props))?;
            for batch in table.batches() {
                writer.write(batch)?;
            }
            writer.close()?;
        }
        FileFormat::Ipc => {
            let options =
                IpcWriteOptions::default().try_with_compression(ipc_compression(compression)?)?;
            let mut writer = FileWriter::try_new_with_options(sink, &table.schema(), options)?;
            for batch in table.batches() {
                writer.write(batch)?;
            }
            writer.finish()?;
        }
    }
    Ok(())
}

/// Reject codecs `format` cannot encode, before any file is opened.
///
/// # Errors
/// [`LakeError::InvalidArgument`] for IPC with a codec other than lz4 or zstd.
pub fn check_compression(format: FileFormat, compression: Compression) -> Result<()> {
    match format {
        FileFormat::Parquet => Ok(()),
        FileFormat::Ipc => ipc_compression(compression)
            .map(|_| ())
            .map_err(|e| LakeError::invalid("check compression", e.to_string())),
    }
}

fn parquet_compression(
    c: Compression,
) -> std::result::Result<ParquetCompression, crate::error::BoxError> {
    Ok(match c {
        Compression::None => ParquetCompression::UNCOMPRESSED,
        Compression::Snappy => ParquetCompression::SNAPPY,
        Compression::Gzip => ParquetCompression::GZIP(GzipLevel::default()),
        Compression::Brotli => ParquetCompression::BROTLI(BrotliLevel::default()),
        Compression::Lz4 => ParquetCompression::LZ4_RAW,
        Compression::Zstd => ParquetCompression::ZSTD(ZstdLevel::default()),
    })
}

fn ipc_compression(
    c: Compression,
) -> std::result::Result<Option<CompressionType>, crate::error::BoxError> {
    match c {
        Compression::None => Ok(None),
        Compression::Lz4 => Ok(Some(CompressionType::LZ4_FRAME)),
        Compression::Zstd => Ok(Some(CompressionType::ZSTD)),
        other => Err(format!("ipc files do not support {other:?} compression").into()),
    }
}
