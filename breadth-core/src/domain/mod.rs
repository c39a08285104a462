//! Domain types for the breadth pipeline.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Opaque instrument identifier, unique within a universe snapshot.
pub type InstrumentId = String;

/// One daily closing-price observation produced by the fetcher.
///
/// Observations are immutable once accepted. Overlapping acquisition units
/// (e.g. monthly windows touching the same day twice) produce exact
/// duplicates, which the assembler removes by full-row equality.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceObservation {
    pub date: NaiveDate,
    pub instrument: InstrumentId,
    pub close: f64,
}

impl PartialEq for PriceObservation {
    fn eq(&self, other: &Self) -> bool {
        self.date == other.date
            && self.instrument == other.instrument
            && self.close.to_bits() == other.close.to_bits()
    }
}

impl Eq for PriceObservation {}

impl std::hash::Hash for PriceObservation {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.date.hash(state);
        self.instrument.hash(state);
        self.close.to_bits().hash(state);
    }
}

/// Market segment of a listed instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketSegment {
    /// Main exchange board.
    PrimaryBoard,
    /// Over-the-counter / secondary board.
    OverTheCounter,
    /// Emerging-market board.
    Emerging,
}

/// Kind of tradable instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstrumentKind {
    Equity,
    Etf,
    Warrant,
    Other,
}

/// One entry of the consumed universe: the (id, segment, kind) triple the
/// universe source hands us. The pipeline filters to primary-board equities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrumentMeta {
    pub id: InstrumentId,
    pub segment: MarketSegment,
    pub kind: InstrumentKind,
}

/// One output row of the breadth engine: per trading day, how many
/// instruments closed at a new rolling high / new rolling low, plus the
/// benchmark level when available for that date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreadthRow {
    pub date: NaiveDate,
    pub new_highs: usize,
    pub new_lows: usize,
    pub benchmark: Option<f64>,
}
