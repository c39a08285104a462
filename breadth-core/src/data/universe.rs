//! Universe consumption — the externally-resolved instrument list.
//!
//! Resolving the universe from the exchange reference list happens outside
//! this repo; what arrives here is a TOML file of (id, segment, kind)
//! triples. The breadth pipeline only ever looks at primary-board equities.

use crate::domain::{InstrumentId, InstrumentKind, InstrumentMeta, MarketSegment};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// The consumed universe snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Universe {
    pub instruments: Vec<InstrumentMeta>,
}

impl Universe {
    /// Load a universe from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let content =
            std::fs::read_to_string(path).map_err(|e| format!("read universe file: {e}"))?;
        Self::from_toml(&content)
    }

    /// Parse a universe from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| format!("parse universe TOML: {e}"))
    }

    /// Serialize the universe to TOML.
    pub fn to_toml(&self) -> Result<String, String> {
        toml::to_string_pretty(self).map_err(|e| format!("serialize universe: {e}"))
    }

    /// Ids of primary-board equities — the breadth sample.
    pub fn primary_equities(&self) -> Vec<InstrumentId> {
        self.instruments
            .iter()
            .filter(|m| {
                m.segment == MarketSegment::PrimaryBoard && m.kind == InstrumentKind::Equity
            })
            .map(|m| m.id.clone())
            .collect()
    }

    /// Total entries in the snapshot, all segments and kinds.
    pub fn len(&self) -> usize {
        self.instruments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instruments.is_empty()
    }

    /// A small fixed sample for demos and smoke runs.
    pub fn sample() -> Self {
        fn equity(id: &str) -> InstrumentMeta {
            InstrumentMeta {
                id: id.to_string(),
                segment: MarketSegment::PrimaryBoard,
                kind: InstrumentKind::Equity,
            }
        }

        let mut instruments: Vec<InstrumentMeta> = [
            "1101", "1216", "1301", "1303", "2002", "2207", "2303", "2308", "2317", "2330",
            "2357", "2382", "2412", "2454", "2603", "2881", "2882", "2886", "2891", "3008",
        ]
        .iter()
        .map(|id| equity(id))
        .collect();

        // Non-equity / off-board entries the filter must exclude.
        instruments.push(InstrumentMeta {
            id: "0050".into(),
            segment: MarketSegment::PrimaryBoard,
            kind: InstrumentKind::Etf,
        });
        instruments.push(InstrumentMeta {
            id: "6488".into(),
            segment: MarketSegment::OverTheCounter,
            kind: InstrumentKind::Equity,
        });

        Self { instruments }
    }
}
