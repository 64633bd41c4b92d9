// ===============================
// src/account.rs
// ===============================
use crate::domain::{AccountSummary, ClosedTrade, MarginHealth, Position};

pub const DEFAULT_MARGIN_RATE: f64 = 0.01;
pub const DEFAULT_BALANCE: f64 = 10_000.0;

/// Cash account. Only the balance is stored; everything else is derived on read.
#[derive(Debug, Clone)]
pub struct Account {
    balance: f64,
    margin_rate: f64,
}

impl Default for Account {
    fn default() -> Self { Self::new(DEFAULT_BALANCE, DEFAULT_MARGIN_RATE) }
}

impl Account {
    pub fn new(balance: f64, margin_rate: f64) -> Self { Self { balance, margin_rate } }

    /// Books a realized P&L; the only way the balance changes.
    pub fn realize(&mut self, closed: &ClosedTrade) -> f64 {
        self.balance += closed.realized_pnl;
        self.balance
    }

    /// Derives equity and margin figures from the balance and the open positions.
    /// Closed positions passed in are ignored.
    pub fn summary<'a, I>(&self, positions: I) -> AccountSummary
    where
        I: IntoIterator<Item = &'a Position>,
    {
        let (pnl, used_margin) = positions
            .into_iter()
            .filter(|p| p.is_open())
            .fold((0.0, 0.0), |(pnl, margin), p| {
                (pnl + p.pnl, margin + p.notional * self.margin_rate)
            });
        let equity = self.balance + pnl;
        AccountSummary {
            balance: self.balance,
            equity,
            used_margin,
            free_margin: equity - used_margin,
            margin_level: if used_margin > 0.0 { equity / used_margin * 100.0 } else { 0.0 },
        }
    }
}

impl AccountSummary {
    pub fn health(&self) -> MarginHealth {
        if self.used_margin <= 0.0 {
            MarginHealth::NoExposure
        } else if self.margin_level > 200.0 {
            MarginHealth::Healthy
        } else if self.margin_level > 100.0 {
            MarginHealth::Warning
        } else {
            MarginHealth::Critical
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Direction, PositionId, PositionStatus};

    fn pos(id: u64, notional: f64, pnl: f64, status: PositionStatus) -> Position {
        Position {
            id: PositionId(id),
            symbol: "EURUSD".into(),
            direction: Direction::Long,
            notional,
            entry_price: 1.0850,
            mark_price: 1.0850,
            opened_at_ms: 0,
            status,
            pnl,
            close_price: None,
            closed_at_ms: None,
        }
    }

    #[test]
    fn flat_account_has_zero_margin_level() {
        let acc = Account::default();
        let s = acc.summary(&Vec::<Position>::new());
        assert_eq!(s.equity, 10_000.0);
        assert_eq!(s.used_margin, 0.0);
        assert_eq!(s.free_margin, 10_000.0);
        assert_eq!(s.margin_level, 0.0);
        assert_eq!(s.health(), MarginHealth::NoExposure);
    }

    #[test]
    fn worked_example() {
        let acc = Account::new(10_000.0, 0.01);
        let pnl = (1.0860 - 1.0850) / 1.0850 * 1000.0;
        let positions = vec![pos(1, 1000.0, pnl, PositionStatus::Open)];
        let s = acc.summary(&positions);
        assert!((s.equity - 10_000.921_658_986).abs() < 1e-6);
        assert!((s.used_margin - 10.0).abs() < 1e-12);
        assert!((s.free_margin - (s.equity - 10.0)).abs() < 1e-12);
        assert!((s.margin_level - 100_009.216_589_86).abs() < 1e-4);
        assert_eq!(s.health(), MarginHealth::Healthy);
    }

    #[test]
    fn closed_positions_do_not_count() {
        let acc = Account::new(5_000.0, 0.01);
        let positions = vec![
            pos(1, 1000.0, 12.5, PositionStatus::Open),
            pos(2, 9000.0, -40.0, PositionStatus::Closed),
        ];
        let s = acc.summary(&positions);
        assert_eq!(s.equity, 5_012.5);
        assert!((s.used_margin - 10.0).abs() < 1e-12);
    }

    #[test]
    fn realize_moves_balance_only() {
        let mut acc = Account::new(10_000.0, 0.01);
        let closed = ClosedTrade {
            id: PositionId(1),
            symbol: "EURUSD".into(),
            direction: Direction::Long,
            close_price: 1.0860,
            closed_at_ms: 5,
            realized_pnl: -25.0,
        };
        assert_eq!(acc.realize(&closed), 9_975.0);
        assert_eq!(acc.summary(&Vec::<Position>::new()).equity, 9_975.0);
    }

    #[test]
    fn health_bands() {
        let mk = |level: f64| AccountSummary {
            balance: 0.0,
            equity: 0.0,
            used_margin: 1.0,
            free_margin: 0.0,
            margin_level: level,
        };
        assert_eq!(mk(250.0).health(), MarginHealth::Healthy);
        assert_eq!(mk(150.0).health(), MarginHealth::Warning);
        assert_eq!(mk(100.0).health(), MarginHealth::Critical);
    }
}
