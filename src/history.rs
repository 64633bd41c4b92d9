// ===============================
// src/history.rs
// ===============================
use ahash::AHashMap as HashMap;
use std::collections::VecDeque;

use crate::domain::PriceSample;

pub const DEFAULT_CAPACITY: usize = 100;

/// Bounded per-symbol price history for charting, oldest sample first.
#[derive(Debug, Clone)]
pub struct QuoteHistory {
    capacity: usize,
    by_symbol: HashMap<String, VecDeque<PriceSample>>,
}

impl Default for QuoteHistory {
    fn default() -> Self { Self::new(DEFAULT_CAPACITY) }
}

impl QuoteHistory {
    pub fn new(capacity: usize) -> Self {
        Self { capacity: capacity.max(1), by_symbol: HashMap::new() }
    }

    /// Appends a sample, evicting the oldest ones past capacity.
    ///
    /// Samples that are not strictly newer than the last retained one are
    /// dropped and `false` is returned.
    pub fn append(&mut self, symbol: &str, sample: PriceSample) -> bool {
        let cap = self.capacity;
        let buf = self
            .by_symbol
            .entry(symbol.to_string())
            .or_insert_with(|| VecDeque::with_capacity(cap));
        if buf.back().is_some_and(|last| last.ts_ms >= sample.ts_ms) {
            return false;
        }
        buf.push_back(sample);
        while buf.len() > cap {
            buf.pop_front();
        }
        true
    }

    /// Retained samples for `symbol`; empty when the symbol is unknown.
    pub fn get(&self, symbol: &str) -> Vec<PriceSample> {
        self.by_symbol
            .get(symbol)
            .map(|b| b.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Last `n` samples, oldest first.
    pub fn tail(&self, symbol: &str, n: usize) -> Vec<PriceSample> {
        match self.by_symbol.get(symbol) {
            Some(b) => b.iter().skip(b.len().saturating_sub(n)).copied().collect(),
            None => Vec::new(),
        }
    }
}
