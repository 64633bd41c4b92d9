// ===============================
// src/risk.rs
// ===============================
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::Limits;
use crate::domain::{Direction, Instrument};

/// Trade request coming from the session layer (stdin, tests).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRequest {
    pub symbol: String,
    pub direction: Direction,
    pub notional: f64,
}

#[derive(Debug, Error, PartialEq)]
pub enum RiskError {
    #[error("notional must be positive, got {0}")]
    NonPositiveNotional(f64),
    #[error("unknown symbol {0}")]
    UnknownSymbol(String),
    #[error("notional {notional} below minimum {min}")]
    BelowMinNotional { notional: f64, min: f64 },
    #[error("notional {notional} above maximum {max}")]
    AboveMaxNotional { notional: f64, max: f64 },
}

impl RiskError {
    /// Short label for metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            RiskError::NonPositiveNotional(_) => "non_positive_notional",
            RiskError::UnknownSymbol(_) => "unknown_symbol",
            RiskError::BelowMinNotional { .. } => "below_min_notional",
            RiskError::AboveMaxNotional { .. } => "above_max_notional",
        }
    }
}

/// Pre-trade checks. On success returns the quote the position should open against.
pub fn check<'a>(
    req: &TradeRequest,
    lim: &Limits,
    quotes: &'a [Instrument],
) -> Result<&'a Instrument, RiskError> {
    // 1) Notional must be a real positive amount
    if !req.notional.is_finite() || req.notional <= 0.0 {
        return Err(RiskError::NonPositiveNotional(req.notional));
    }

    // 2) Symbol must be quoted
    let quote = quotes
        .iter()
        .find(|q| q.symbol.eq_ignore_ascii_case(&req.symbol))
        .ok_or_else(|| RiskError::UnknownSymbol(req.symbol.clone()))?;

    // 3) Size band
    if req.notional < lim.min_notional {
        return Err(RiskError::BelowMinNotional { notional: req.notional, min: lim.min_notional });
    }
    if req.notional > lim.max_notional {
        return Err(RiskError::AboveMaxNotional { notional: req.notional, max: lim.max_notional });
    }

    Ok(quote)
}
