// src/warehouse/local.rs

use anyhow::{Context, Result};
use arrow::record_batch::RecordBatch;
use chrono::Utc;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use std::{
    fs::{self, File, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument};

use super::{encode::write_parquet, TableRef, Warehouse};
use crate::error::LoadError;
use crate::schema::{build_arrow_schema, TableSchema};

const SCHEMA_FILE: &str = "_schema.json";

/// Tables as directories of Parquet files under `root/<dataset>/<table>/`.
///
/// Each append adds one new file; existing files are never rewritten.
pub struct LocalWarehouse {
    root: PathBuf,
}

impl LocalWarehouse {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn table_dir(&self, table: &TableRef) -> PathBuf {
        self.root.join(&table.dataset).join(&table.table)
    }

    fn read_schema(&self, table: &TableRef) -> Result<Option<TableSchema>> {
        let path = self.table_dir(table).join(SCHEMA_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let f = File::open(&path).with_context(|| format!("opening {}", path.display()))?;
        let schema = serde_json::from_reader(f)
            .with_context(|| format!("parsing {}", path.display()))?;
        Ok(Some(schema))
    }

    /// Data files of `table`, oldest first.
    pub fn data_files(&self, table: &TableRef) -> Result<Vec<PathBuf>> {
        let dir = self.table_dir(table);
        let mut files: Vec<PathBuf> = fs::read_dir(&dir)
            .with_context(|| format!("listing {}", dir.display()))?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "parquet"))
            .collect();
        files.sort_by_cached_key(|p| {
            let order = append_order(p);
            (order.is_none(), order, p.clone())
        });
        Ok(files)
    }

    /// Every batch ever appended to `table`.
    pub fn read_table(&self, table: &TableRef) -> Result<Vec<RecordBatch>> {
        let mut out = Vec::new();
        for path in self.data_files(table)? {
            let file =
                File::open(&path).with_context(|| format!("opening `{}`", path.display()))?;
            let reader = ParquetRecordBatchReaderBuilder::try_new(file)
                .with_context(|| format!("reading parquet metadata of `{}`", path.display()))?
                .build()
                .with_context(|| format!("building reader for `{}`", path.display()))?;
            for batch in reader {
                out.push(batch.with_context(|| format!("reading `{}`", path.display()))?);
            }
        }
        Ok(out)
    }
}

/// Create a fresh file in `dir`, never overwriting: `<micros>.parquet`, then `<micros>-1.parquet`, ...
fn create_new_file(dir: &Path) -> Result<(PathBuf, File)> {
    let stem = Utc::now().timestamp_micros();
    let mut n = 0u32;
    loop {
        let name = if n == 0 {
            format!("{stem}.parquet")
        } else {
            format!("{stem}-{n}.parquet")
        };
        let path = dir.join(name);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(f) => return Ok((path, f)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => n += 1,
            Err(e) => return Err(e).with_context(|| format!("creating {}", path.display())),
        }
    }
}

/// `(micros, n)` of a file named by [`create_new_file`].
fn append_order(path: &Path) -> Option<(i64, u32)> {
    let stem = path.file_stem()?.to_str()?;
    match stem.split_once('-') {
        Some((micros, n)) => Some((micros.parse().ok()?, n.parse().ok()?)),
        None => Some((stem.parse().ok()?, 0)),
    }
}

impl Warehouse for LocalWarehouse {
    #[instrument(level = "info", skip(self, schema), fields(table = %table))]
    fn ensure_table(&self, table: &TableRef, schema: &TableSchema) -> Result<()> {
        let dir = self.table_dir(table);
        if self.read_schema(table)?.is_some() {
            debug!("table exists");
            return Ok(());
        }
        fs::create_dir_all(&dir).map_err(|e| LoadError::Bootstrap {
            table: table.to_string(),
            message: e.to_string(),
        })?;

        // write to tmp then rename so a half-written schema is never observed
        let tmp_path = dir.join(format!(".{SCHEMA_FILE}.tmp"));
        let mut tmp = File::create(&tmp_path)
            .with_context(|| format!("creating {}", tmp_path.display()))?;
        serde_json::to_writer_pretty(&mut tmp, schema).context("serializing table schema")?;
        tmp.write_all(b"\n")?;
        fs::rename(&tmp_path, dir.join(SCHEMA_FILE))
            .with_context(|| format!("renaming {}", tmp_path.display()))?;

        info!("created table");
        Ok(())
    }

    #[instrument(level = "info", skip(self, batch), fields(table = %table, rows = batch.num_rows()))]
    fn append(&self, table: &TableRef, batch: &RecordBatch) -> Result<u64> {
        let schema = self.read_schema(table)?.ok_or_else(|| LoadError::Rejected {
            table: table.to_string(),
            message: "table does not exist".into(),
        })?;

        let expected = build_arrow_schema(&schema);
        if expected.fields() != batch.schema().fields() {
            return Err(LoadError::SchemaMismatch {
                table: table.to_string(),
                message: format!(
                    "expected columns {:?}, got {:?}",
                    schema.names(),
                    batch
                        .schema()
                        .fields()
                        .iter()
                        .map(|f| f.name().as_str())
                        .collect::<Vec<_>>()
                ),
            }
            .into());
        }

        let (path, file) = create_new_file(&self.table_dir(table))?;
        write_parquet(file, batch).with_context(|| format!("writing {}", path.display()))?;

        info!(path = %path.display(), "appended");
        Ok(batch.num_rows() as u64)
    }
}
