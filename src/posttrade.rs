// ===============================
// src/posttrade.rs
// ===============================
use tracing::{info, warn};

use crate::domain::{price_decimals, AccountSummary, ClosedTrade, MarginHealth, Position};
use crate::metrics::{TRADES_CLOSED, TRADES_OPENED, TRADES_REJECTED};
use crate::positions::PositionError;
use crate::risk::RiskError;

pub fn on_opened(p: &Position) {
    let dp = price_decimals(&p.symbol);
    info!(id = %p.id, symbol = %p.symbol, side = p.direction.label(), notional = p.notional,
        entry = %format!("{:.*}", dp, p.entry_price), "OPENED");
    TRADES_OPENED.with_label_values(&[p.symbol.as_str(), p.direction.label()]).inc();
}

pub fn on_closed(c: &ClosedTrade, acc: &AccountSummary) {
    let dp = price_decimals(&c.symbol);
    info!(id = %c.id, symbol = %c.symbol, close = %format!("{:.*}", dp, c.close_price),
        pnl = %format!("{:.2}", c.realized_pnl), balance = %format!("{:.2}", acc.balance), "CLOSED");
    TRADES_CLOSED.with_label_values(&[c.symbol.as_str()]).inc();
}

pub fn on_rejected(e: &RiskError) {
    warn!(?e, "trade rejected");
    TRADES_REJECTED.with_label_values(&[e.reason()]).inc();
}

pub fn on_close_rejected(e: &PositionError) {
    warn!(?e, "close rejected");
    TRADES_REJECTED.with_label_values(&[e.reason()]).inc();
}

pub fn on_account(acc: &AccountSummary) {
    match acc.health() {
        MarginHealth::Critical => warn!(level = %format!("{:.2}", acc.margin_level), "margin level critical"),
        MarginHealth::Warning => info!(level = %format!("{:.2}", acc.margin_level), "margin level low"),
        MarginHealth::Healthy | MarginHealth::NoExposure => {}
    }
}
