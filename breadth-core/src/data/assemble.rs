//! Matrix assembly — dedup and pivot long-form observations.
//!
//! The scheduler accumulates (date, instrument, close) rows from many
//! overlapping acquisition units. Assembly removes exact duplicates, pivots
//! into a date × instrument matrix, and drops instruments that never produced
//! an observation. Missing cells stay explicitly absent; forward-fill happens
//! later, inside the engine.

use crate::domain::{InstrumentId, PriceObservation};
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Wide price matrix: rows keyed by trading date (strictly ascending),
/// one column per instrument. Every column vector has `dates.len()` entries;
/// `None` means no observation for that (date, instrument) pair.
#[derive(Debug, Clone, PartialEq)]
pub struct WideMatrix {
    pub dates: Vec<NaiveDate>,
    pub columns: BTreeMap<InstrumentId, Vec<Option<f64>>>,
}

impl WideMatrix {
    /// Number of instrument columns.
    pub fn instrument_count(&self) -> usize {
        self.columns.len()
    }

    /// Number of trading dates (rows).
    pub fn row_count(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty() || self.columns.is_empty()
    }

    /// Close for an instrument on the row at `date_index`, if observed.
    pub fn close_at(&self, instrument: &str, date_index: usize) -> Option<f64> {
        self.columns
            .get(instrument)
            .and_then(|col| col.get(date_index))
            .copied()
            .flatten()
    }

    /// Deterministic content hash over dates and columns.
    pub fn content_hash(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        for date in &self.dates {
            hasher.update(date.to_string().as_bytes());
        }
        for (id, col) in &self.columns {
            hasher.update(id.as_bytes());
            for cell in col {
                match cell {
                    Some(v) => hasher.update(&v.to_le_bytes()),
                    None => hasher.update(&[0xff_u8]),
                };
            }
        }
        hasher.finalize().to_hex().to_string()
    }
}

/// Build one `WideMatrix` from the full accumulated observation set.
///
/// Pure function of its input: assembling the same observations twice yields
/// identical matrices, duplicates and input order notwithstanding.
pub fn assemble(observations: &[PriceObservation]) -> WideMatrix {
    // Exact-duplicate removal by full-row equality.
    let mut seen: HashSet<&PriceObservation> = HashSet::with_capacity(observations.len());
    let mut unique: Vec<&PriceObservation> = Vec::with_capacity(observations.len());
    for obs in observations {
        if seen.insert(obs) {
            unique.push(obs);
        }
    }

    // Union of observed dates = the row axis, ascending.
    let mut date_set = BTreeSet::new();
    for obs in &unique {
        date_set.insert(obs.date);
    }
    let dates: Vec<NaiveDate> = date_set.into_iter().collect();
    let date_index: BTreeMap<NaiveDate, usize> =
        dates.iter().enumerate().map(|(i, d)| (*d, i)).collect();

    // Pivot. A column only comes into existence on its first observation, so
    // the "drop all-empty columns" guarantee holds by construction.
    let mut columns: BTreeMap<InstrumentId, Vec<Option<f64>>> = BTreeMap::new();
    for obs in &unique {
        let col = columns
            .entry(obs.instrument.clone())
            .or_insert_with(|| vec![None; dates.len()]);
        col[date_index[&obs.date]] = Some(obs.close);
    }

    WideMatrix { dates, columns }
}
