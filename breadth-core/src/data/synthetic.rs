//! Synthetic market data source for tests and offline runs.
//!
//! Produces a deterministic random walk per instrument (seeded from the
//! instrument id), weekdays only. Results built on synthetic data are for
//! development — the runner tags them so a synthetic report is never mistaken
//! for a live one.

use super::provider::{FetchError, MarketDataSource};
use crate::domain::PriceObservation;
use chrono::{Datelike, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Deterministic random-walk source over a fixed instrument list.
pub struct SyntheticSource {
    instruments: Vec<String>,
    end: NaiveDate,
}

impl SyntheticSource {
    /// `end` is the synthetic "today": open-ended instrument fetches stop there.
    pub fn new(instruments: Vec<String>, end: NaiveDate) -> Self {
        Self { instruments, end }
    }

    fn walk(&self, instrument: &str, start: NaiveDate, end: NaiveDate) -> Vec<PriceObservation> {
        let seed: [u8; 32] = *blake3::hash(instrument.as_bytes()).as_bytes();
        let mut rng = StdRng::from_seed(seed);

        let mut observations = Vec::new();
        let mut price = 100.0_f64;
        let mut current = start;

        while current <= end {
            let weekday = current.weekday();
            if weekday == chrono::Weekday::Sat || weekday == chrono::Weekday::Sun {
                current += chrono::Duration::days(1);
                continue;
            }

            let daily_return: f64 = rng.gen_range(-0.03..0.03);
            price *= 1.0 + daily_return;

            observations.push(PriceObservation {
                date: current,
                instrument: instrument.to_string(),
                close: price,
            });
            current += chrono::Duration::days(1);
        }

        observations
    }
}

impl MarketDataSource for SyntheticSource {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn authenticate(&self, _token: &str) -> Result<(), FetchError> {
        Ok(())
    }

    fn fetch_instrument(
        &self,
        instrument: &str,
        start: NaiveDate,
    ) -> Result<Vec<PriceObservation>, FetchError> {
        if !self.instruments.iter().any(|i| i == instrument) {
            return Err(FetchError::InstrumentNotFound {
                instrument: instrument.to_string(),
            });
        }
        Ok(self.walk(instrument, start, self.end))
    }

    fn fetch_market(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceObservation>, FetchError> {
        let mut out = Vec::new();
        for instrument in &self.instruments {
            out.extend(self.walk(instrument, start, end));
        }
        Ok(out)
    }

    fn is_available(&self) -> bool {
        true
    }
}
