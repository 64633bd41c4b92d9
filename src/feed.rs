// ===============================
// src/feed.rs
// ===============================
//
// Quote generator:
// - one random-walk step per tick for every configured pair
// - mid is floored at PRICE_FLOOR so quotes never go non-positive
// - bid/ask are derived from mid with a fixed fractional spread (1 pip)
//
// The RNG is passed in by the caller so runs can be seeded.
//

use rand::Rng;
use tracing::warn;

use crate::domain::Instrument;

pub const PRICE_FLOOR: f64 = 0.0001;
pub const DEFAULT_SPREAD: f64 = 0.0001;

#[derive(Debug, Clone, Copy)]
pub struct InstrumentSpec {
    pub symbol: &'static str,
    pub name: &'static str,
    pub initial_mid: f64,
    pub volatility: f64,
}

pub const CATALOG: [InstrumentSpec; 6] = [
    InstrumentSpec { symbol: "EURUSD", name: "Euro / US Dollar",              initial_mid: 1.0850, volatility: 0.0002 },
    InstrumentSpec { symbol: "GBPUSD", name: "British Pound / US Dollar",     initial_mid: 1.2650, volatility: 0.0003 },
    InstrumentSpec { symbol: "USDJPY", name: "US Dollar / Japanese Yen",      initial_mid: 149.50, volatility: 0.02 },
    InstrumentSpec { symbol: "USDCHF", name: "US Dollar / Swiss Franc",       initial_mid: 0.8750, volatility: 0.0002 },
    InstrumentSpec { symbol: "AUDUSD", name: "Australian Dollar / US Dollar", initial_mid: 0.6650, volatility: 0.0003 },
    InstrumentSpec { symbol: "USDCAD", name: "US Dollar / Canadian Dollar",   initial_mid: 1.3650, volatility: 0.0002 },
];

pub fn lookup(symbol: &str) -> Option<&'static InstrumentSpec> {
    CATALOG.iter().find(|s| s.symbol.eq_ignore_ascii_case(symbol))
}

#[derive(Debug, Clone)]
struct PairState {
    symbol: String,
    name: String,
    volatility: f64,
    mid: f64,
    prev_mid: f64,
}

#[derive(Debug, Clone)]
pub struct QuoteGenerator {
    pairs: Vec<PairState>,
    spread: f64,
    floor: f64,
}

impl QuoteGenerator {
    pub fn new(specs: &[InstrumentSpec], spread: f64, floor: f64) -> Self {
        let pairs = specs
            .iter()
            .map(|s| PairState {
                symbol: s.symbol.to_string(),
                name: s.name.to_string(),
                volatility: s.volatility,
                mid: s.initial_mid.max(floor),
                prev_mid: s.initial_mid.max(floor),
            })
            .collect();
        Self { pairs, spread, floor }
    }

    /// Builds a generator for the requested catalog symbols; unknown ones are skipped.
    pub fn from_symbols(symbols: &[String], spread: f64, floor: f64) -> Self {
        let mut specs: Vec<InstrumentSpec> = Vec::with_capacity(symbols.len());
        for sym in symbols {
            match lookup(sym) {
                Some(spec) if !specs.iter().any(|s| s.symbol == spec.symbol) => specs.push(*spec),
                Some(_) => {}
                None => warn!(symbol = %sym, "unknown symbol in config, skipped"),
            }
        }
        Self::new(&specs, spread, floor)
    }

    /// Advances every mid by one random-walk step and returns the new snapshot.
    pub fn tick<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Vec<Instrument> {
        for p in self.pairs.iter_mut() {
            p.prev_mid = p.mid;
            let delta = (rng.gen::<f64>() - 0.5) * p.volatility;
            p.mid = (p.mid + delta).max(self.floor);
        }
        self.snapshot()
    }

    pub fn snapshot(&self) -> Vec<Instrument> {
        self.pairs.iter().map(|p| self.quote_of(p)).collect()
    }

    pub fn mids(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.pairs.iter().map(|p| (p.symbol.as_str(), p.mid))
    }

    fn quote_of(&self, p: &PairState) -> Instrument {
        let half = self.spread * p.mid / 2.0;
        let change = p.mid - p.prev_mid;
        Instrument {
            symbol: p.symbol.clone(),
            name: p.name.clone(),
            bid: p.mid - half,
            ask: p.mid + half,
            change,
            change_percent: change / p.prev_mid * 100.0,
        }
    }

    #[cfg(test)]
    pub fn set_mid(&mut self, symbol: &str, mid: f64) {
        if let Some(p) = self.pairs.iter_mut().find(|p| p.symbol == symbol) {
            p.prev_mid = p.mid;
            p.mid = mid.max(self.floor);
        }
    }
}
