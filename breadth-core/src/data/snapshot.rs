//! Observation snapshot — caller-driven parquet persistence.
//!
//! The pipeline never persists automatically (each run rebuilds from an empty
//! observation set), but callers can snapshot the accumulated long-form
//! observation table after a run and reload it for offline reporting.
//!
//! Layout: `{dir}/observations.parquet` + `{dir}/meta.json`
//! Writes are atomic (write to .tmp, rename into place). Loads validate the
//! schema and row count before handing rows back.

use super::provider::FetchError;
use crate::domain::PriceObservation;
use chrono::NaiveDate;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Metadata sidecar for a snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotMeta {
    pub observation_count: usize,
    pub instrument_count: usize,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub content_hash: String,
    pub written_at: chrono::NaiveDateTime,
}

/// Parquet snapshot of a long-form observation set.
pub struct ObservationSnapshot {
    dir: PathBuf,
}

impl ObservationSnapshot {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn data_path(&self) -> PathBuf {
        self.dir.join("observations.parquet")
    }

    fn meta_path(&self) -> PathBuf {
        self.dir.join("meta.json")
    }

    /// Write the observation set, replacing any previous snapshot.
    pub fn write(&self, observations: &[PriceObservation]) -> Result<SnapshotMeta, FetchError> {
        if observations.is_empty() {
            return Err(FetchError::SnapshotError("no observations to snapshot".into()));
        }

        fs::create_dir_all(&self.dir)
            .map_err(|e| FetchError::SnapshotError(format!("failed to create dir: {e}")))?;

        let df = observations_to_dataframe(observations)?;
        let path = self.data_path();
        let tmp_path = path.with_extension("parquet.tmp");

        write_parquet(&df, &tmp_path)?;
        fs::rename(&tmp_path, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            FetchError::SnapshotError(format!("atomic rename failed: {e}"))
        })?;

        let mut instruments: Vec<&str> =
            observations.iter().map(|o| o.instrument.as_str()).collect();
        instruments.sort_unstable();
        instruments.dedup();

        let start_date = observations.iter().map(|o| o.date).min().unwrap();
        let end_date = observations.iter().map(|o| o.date).max().unwrap();

        let meta = SnapshotMeta {
            observation_count: observations.len(),
            instrument_count: instruments.len(),
            start_date,
            end_date,
            content_hash: content_hash(observations),
            written_at: chrono::Local::now().naive_local(),
        };
        let meta_json = serde_json::to_string_pretty(&meta)
            .map_err(|e| FetchError::SnapshotError(format!("meta serialization: {e}")))?;
        fs::write(self.meta_path(), meta_json)
            .map_err(|e| FetchError::SnapshotError(format!("meta write: {e}")))?;

        Ok(meta)
    }

    /// Load the snapshot back, sorted by (date, instrument).
    pub fn load(&self) -> Result<Vec<PriceObservation>, FetchError> {
        let path = self.data_path();
        if !path.exists() {
            return Err(FetchError::SnapshotError(format!(
                "no snapshot at {}",
                path.display()
            )));
        }

        let mut observations = load_and_validate_parquet(&path)?;
        observations.sort_by(|a, b| (a.date, &a.instrument).cmp(&(b.date, &b.instrument)));
        Ok(observations)
    }

    /// Read the metadata sidecar, if present and parseable.
    pub fn meta(&self) -> Option<SnapshotMeta> {
        let content = fs::read_to_string(self.meta_path()).ok()?;
        serde_json::from_str(&content).ok()
    }
}

/// Deterministic BLAKE3 hash over the observation set in sorted order.
pub fn content_hash(observations: &[PriceObservation]) -> String {
    let mut sorted: Vec<&PriceObservation> = observations.iter().collect();
    sorted.sort_by(|a, b| (a.date, &a.instrument, a.close.to_bits())
        .cmp(&(b.date, &b.instrument, b.close.to_bits())));

    let mut hasher = blake3::Hasher::new();
    for obs in sorted {
        hasher.update(obs.date.to_string().as_bytes());
        hasher.update(obs.instrument.as_bytes());
        hasher.update(&obs.close.to_le_bytes());
    }
    hasher.finalize().to_hex().to_string()
}

// ── Parquet I/O helpers ─────────────────────────────────────────────

fn observations_to_dataframe(observations: &[PriceObservation]) -> Result<DataFrame, FetchError> {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap();
    let dates: Vec<i32> = observations
        .iter()
        .map(|o| (o.date - epoch).num_days() as i32)
        .collect();
    let instruments: Vec<String> = observations.iter().map(|o| o.instrument.clone()).collect();
    let closes: Vec<f64> = observations.iter().map(|o| o.close).collect();

    DataFrame::new(vec![
        Column::new("date".into(), dates)
            .cast(&DataType::Date)
            .map_err(|e| FetchError::SnapshotError(format!("date cast: {e}")))?,
        Column::new("instrument".into(), instruments),
        Column::new("close".into(), closes),
    ])
    .map_err(|e| FetchError::SnapshotError(format!("dataframe creation: {e}")))
}

fn write_parquet(df: &DataFrame, path: &Path) -> Result<(), FetchError> {
    let file = fs::File::create(path)
        .map_err(|e| FetchError::SnapshotError(format!("create file: {e}")))?;
    ParquetWriter::new(file)
        .finish(&mut df.clone())
        .map_err(|e| FetchError::SnapshotError(format!("write parquet: {e}")))?;
    Ok(())
}

fn load_and_validate_parquet(path: &Path) -> Result<Vec<PriceObservation>, FetchError> {
    let file =
        fs::File::open(path).map_err(|e| FetchError::SnapshotError(format!("open: {e}")))?;
    let df = ParquetReader::new(file)
        .finish()
        .map_err(|e| FetchError::SnapshotError(format!("read: {e}")))?;

    if df.height() == 0 {
        return Err(FetchError::SnapshotError("empty snapshot file".into()));
    }
    for col_name in ["date", "instrument", "close"] {
        if df.column(col_name).is_err() {
            return Err(FetchError::SnapshotError(format!(
                "missing column '{col_name}'"
            )));
        }
    }

    dataframe_to_observations(&df)
}

fn dataframe_to_observations(df: &DataFrame) -> Result<Vec<PriceObservation>, FetchError> {
    let map_err = |e: PolarsError| FetchError::SnapshotError(format!("column read: {e}"));

    let dates = df.column("date").map_err(map_err)?;
    let instruments = df.column("instrument").map_err(map_err)?;
    let closes = df.column("close").map_err(map_err)?;

    let date_ca = dates
        .date()
        .map_err(|e| FetchError::SnapshotError(format!("date column type: {e}")))?;
    let instrument_ca = instruments
        .str()
        .map_err(|e| FetchError::SnapshotError(format!("instrument column type: {e}")))?;
    let close_ca = closes
        .f64()
        .map_err(|e| FetchError::SnapshotError(format!("close column type: {e}")))?;

    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap();
    let n = df.height();
    let mut observations = Vec::with_capacity(n);

    for i in 0..n {
        let date_days = date_ca
            .get(i)
            .ok_or_else(|| FetchError::SnapshotError(format!("null date at row {i}")))?;
        let instrument = instrument_ca
            .get(i)
            .ok_or_else(|| FetchError::SnapshotError(format!("null instrument at row {i}")))?;

        observations.push(PriceObservation {
            date: epoch + chrono::Duration::days(date_days as i64),
            instrument: instrument.to_string(),
            close: close_ca.get(i).unwrap_or(f64::NAN),
        });
    }

    Ok(observations)
}
