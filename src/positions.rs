// ===============================
// src/positions.rs (position book & mark-to-market)
// ===============================

use ahash::AHashMap as HashMap;
use thiserror::Error;

use crate::domain::{ClosedTrade, Direction, Instrument, Position, PositionId, PositionStatus};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PositionError {
    #[error("position {0} not found")]
    NotFound(PositionId),
    #[error("position {0} is already closed")]
    AlreadyClosed(PositionId),
}

impl PositionError {
    /// Short label for metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            PositionError::NotFound(_) => "not_found",
            PositionError::AlreadyClosed(_) => "already_closed",
        }
    }
}

/// All positions of one account, open and closed, in opening order.
#[derive(Debug, Default)]
pub struct PositionBook {
    positions: Vec<Position>,
    next_id: u64,
}

impl PositionBook {
    pub fn new() -> Self { Self::default() }

    /// Opens a position against `quote`; callers validate the request first.
    pub fn open(
        &mut self,
        quote: &Instrument,
        direction: Direction,
        notional: f64,
        now_ms: i64,
    ) -> &Position {
        self.next_id += 1;
        let entry = direction.entry_price(quote);
        self.positions.push(Position {
            id: PositionId(self.next_id),
            symbol: quote.symbol.clone(),
            direction,
            notional,
            entry_price: entry,
            mark_price: entry,
            opened_at_ms: now_ms,
            status: PositionStatus::Open,
            pnl: 0.0,
            close_price: None,
            closed_at_ms: None,
        });
        &self.positions[self.positions.len() - 1]
    }

    /// Marks every open position to the exit side of its instrument.
    /// Returns how many positions were revalued.
    pub fn mark_to_market(&mut self, quotes: &[Instrument]) -> usize {
        let by_symbol: HashMap<&str, &Instrument> =
            quotes.iter().map(|q| (q.symbol.as_str(), q)).collect();
        let mut n = 0;
        for pos in self.positions.iter_mut().filter(|p| p.is_open()) {
            if let Some(q) = by_symbol.get(pos.symbol.as_str()) {
                pos.mark_price = pos.direction.exit_price(q);
                pos.pnl = unrealized_pnl(pos.direction, pos.entry_price, pos.mark_price, pos.notional);
                n += 1;
            }
        }
        n
    }

    /// Freezes an open position at its latest mark.
    pub fn close(&mut self, id: PositionId, now_ms: i64) -> Result<ClosedTrade, PositionError> {
        let pos = self
            .positions
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(PositionError::NotFound(id))?;
        if !pos.is_open() {
            return Err(PositionError::AlreadyClosed(id));
        }
        pos.status = PositionStatus::Closed;
        pos.close_price = Some(pos.mark_price);
        pos.closed_at_ms = Some(now_ms);
        Ok(ClosedTrade {
            id,
            symbol: pos.symbol.clone(),
            direction: pos.direction,
            close_price: pos.mark_price,
            closed_at_ms: now_ms,
            realized_pnl: pos.pnl,
        })
    }

    pub fn get(&self, id: PositionId) -> Option<&Position> {
        self.positions.iter().find(|p| p.id == id)
    }

    pub fn all(&self) -> &[Position] { &self.positions }

    pub fn open_positions(&self) -> impl Iterator<Item = &Position> + '_ {
        self.positions.iter().filter(|p| p.is_open())
    }

    pub fn closed_positions(&self) -> impl Iterator<Item = &Position> + '_ {
        self.positions.iter().filter(|p| !p.is_open())
    }

    pub fn open_count(&self) -> usize { self.open_positions().count() }
}

pub fn unrealized_pnl(direction: Direction, entry: f64, mark: f64, notional: f64) -> f64 {
    direction.price_diff(entry, mark) / entry * notional
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quote(symbol: &str, bid: f64, ask: f64) -> Instrument {
        Instrument {
            symbol: symbol.to_string(),
            name: symbol.to_string(),
            bid,
            ask,
            change: 0.0,
            change_percent: 0.0,
        }
    }

    fn approx(a: f64, b: f64) -> bool { (a - b).abs() < 1e-9 }

    #[test]
    fn long_enters_at_ask_and_marks_at_bid() {
        let mut book = PositionBook::new();
        let id = book.open(&quote("EURUSD", 1.0849, 1.0850), Direction::Long, 1000.0, 1).id;
        let p = book.get(id).unwrap();
        assert_eq!(p.entry_price, 1.0850);
        assert_eq!(p.mark_price, 1.0850);
        assert_eq!(p.pnl, 0.0);

        assert_eq!(book.mark_to_market(&[quote("EURUSD", 1.0860, 1.0861)]), 1);
        let p = book.get(id).unwrap();
        assert_eq!(p.mark_price, 1.0860);
        assert!(approx(p.pnl, (1.0860 - 1.0850) / 1.0850 * 1000.0));
        assert!(approx(p.pnl, 0.921_658_986_175_1));
    }

    #[test]
    fn short_enters_at_bid_and_marks_at_ask() {
        let mut book = PositionBook::new();
        let id = book.open(&quote("GBPUSD", 1.2650, 1.2651), Direction::Short, 2500.0, 1).id;
        assert_eq!(book.get(id).unwrap().entry_price, 1.2650);

        book.mark_to_market(&[quote("GBPUSD", 1.2600, 1.2610)]);
        let p = book.get(id).unwrap();
        assert_eq!(p.mark_price, 1.2610);
        assert!(approx(p.pnl, (1.2650 - 1.2610) / 1.2650 * 2500.0));
        assert!(p.pnl > 0.0);
    }

    #[test]
    fn positions_without_a_quote_keep_their_mark() {
        let mut book = PositionBook::new();
        let id = book.open(&quote("USDJPY", 149.49, 149.51), Direction::Long, 1000.0, 1).id;
        assert_eq!(book.mark_to_market(&[quote("EURUSD", 1.0, 1.1)]), 0);
        assert_eq!(book.get(id).unwrap().mark_price, 149.51);
    }

    #[test]
    fn close_freezes_mark_and_rejects_second_close() {
        let mut book = PositionBook::new();
        let id = book.open(&quote("EURUSD", 1.0849, 1.0850), Direction::Long, 1000.0, 10).id;
        book.mark_to_market(&[quote("EURUSD", 1.0860, 1.0861)]);

        let closed = book.close(id, 20).unwrap();
        assert_eq!(closed.close_price, 1.0860);
        assert_eq!(closed.closed_at_ms, 20);
        assert!(approx(closed.realized_pnl, 0.921_658_986_175_1));

        let p = book.get(id).unwrap();
        assert_eq!(p.status, PositionStatus::Closed);
        assert_eq!(p.close_price, Some(1.0860));
        assert_eq!(p.closed_at_ms, Some(20));

        let err = book.close(id, 30).unwrap_err();
        assert_eq!(err, PositionError::AlreadyClosed(id));
        assert_eq!(err.reason(), "already_closed");

        // closed positions ignore later quotes
        book.mark_to_market(&[quote("EURUSD", 1.2000, 1.2001)]);
        let p = book.get(id).unwrap();
        assert_eq!(p.mark_price, 1.0860);
        assert!(approx(p.pnl, closed.realized_pnl));
    }

    #[test]
    fn close_unknown_id_is_rejected() {
        let mut book = PositionBook::new();
        assert_eq!(book.close(PositionId(99), 1), Err(PositionError::NotFound(PositionId(99))));
    }

    #[test]
    fn ids_are_unique_and_partitions_split_by_status() {
        let mut book = PositionBook::new();
        let q = quote("AUDUSD", 0.6649, 0.6651);
        let a = book.open(&q, Direction::Long, 100.0, 1).id;
        let b = book.open(&q, Direction::Short, 200.0, 2).id;
        assert_ne!(a, b);
        book.close(a, 3).unwrap();
        assert_eq!(book.open_count(), 1);
        assert_eq!(book.closed_positions().next().map(|p| p.id), Some(a));
        assert_eq!(book.all().len(), 2);
    }
}
