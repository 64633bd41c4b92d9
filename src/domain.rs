// ===============================
// src/domain.rs
// ===============================
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction { Long, Short }

impl Direction {
    /// Price a new position enters at: longs lift the ask, shorts hit the bid.
    pub fn entry_price(&self, q: &Instrument) -> f64 {
        match self { Direction::Long => q.ask, Direction::Short => q.bid }
    }

    /// Exit-side price used to mark an open position.
    pub fn exit_price(&self, q: &Instrument) -> f64 {
        match self { Direction::Long => q.bid, Direction::Short => q.ask }
    }

    pub fn price_diff(&self, entry: f64, mark: f64) -> f64 {
        match self { Direction::Long => mark - entry, Direction::Short => entry - mark }
    }

    pub fn label(&self) -> &'static str {
        match self { Direction::Long => "long", Direction::Short => "short" }
    }
}

/// Quote snapshot handed to subscribers on every tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instrument {
    pub symbol: String,
    pub name: String,
    pub bid: f64,
    pub ask: f64,
    pub change: f64,
    pub change_percent: f64,
}

impl Instrument {
    pub fn mid(&self) -> f64 { (self.bid + self.ask) / 2.0 }

    /// JPY crosses are quoted to 2 decimals, everything else to 4.
    pub fn price_decimals(&self) -> usize { price_decimals(&self.symbol) }
}

pub fn price_decimals(symbol: &str) -> usize {
    if symbol.contains("JPY") { 2 } else { 4 }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceSample { pub ts_ms: i64, pub price: f64 }

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PositionId(pub u64);

impl fmt::Display for PositionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "T-{}", self.0) }
}

impl std::str::FromStr for PositionId {
    type Err = std::num::ParseIntError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim();
        let digits = raw
            .strip_prefix("T-")
            .or_else(|| raw.strip_prefix("t-"))
            .unwrap_or(raw);
        digits.parse().map(PositionId)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionStatus { Open, Closed }

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub id: PositionId,
    pub symbol: String,
    pub direction: Direction,
    pub notional: f64,
    pub entry_price: f64,
    pub mark_price: f64,
    pub opened_at_ms: i64,
    pub status: PositionStatus,
    /// Unrealized while open, realized once closed.
    pub pnl: f64,
    pub close_price: Option<f64>,
    pub closed_at_ms: Option<i64>,
}

impl Position {
    pub fn is_open(&self) -> bool { self.status == PositionStatus::Open }
}

/// Result of a successful close, returned to the caller for balance adjustment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosedTrade {
    pub id: PositionId,
    pub symbol: String,
    pub direction: Direction,
    pub close_price: f64,
    pub closed_at_ms: i64,
    pub realized_pnl: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountSummary {
    pub balance: f64,
    pub equity: f64,
    pub used_margin: f64,
    pub free_margin: f64,
    pub margin_level: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarginHealth { NoExposure, Healthy, Warning, Critical }

// Journal records (JSONL)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    Quotes { ts_ms: i64, instruments: Vec<Instrument> },
    Opened(Position),
    Closed(ClosedTrade),
    Rejected { ts_ms: i64, reason: String },
    Note(String),
}
