// ===============================
// src/metrics.rs
// ===============================
use once_cell::sync::Lazy;
use prometheus::{
    Encoder, Gauge, GaugeVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;
use tracing::{error, info};

use crate::domain::{AccountSummary, Instrument};

// Single custom registry (we register everything here)
pub static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

// -------- Quotes --------
pub static TICKS: Lazy<IntCounter> =
    Lazy::new(|| IntCounter::new("ticks_total", "simulator ticks").unwrap());

pub static QUOTE_MID: Lazy<GaugeVec> = Lazy::new(|| {
    GaugeVec::new(Opts::new("quote_mid", "current mid price per symbol"), &["symbol"]).unwrap()
});

pub static QUOTE_CHANGE_PCT: Lazy<GaugeVec> = Lazy::new(|| {
    GaugeVec::new(
        Opts::new("quote_change_percent", "last tick change in percent per symbol"),
        &["symbol"],
    )
    .unwrap()
});

// -------- Trades --------
pub static TRADES_OPENED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("trades_opened_total", "positions opened (labels: symbol, direction)"),
        &["symbol", "direction"],
    )
    .unwrap()
});

pub static TRADES_CLOSED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(Opts::new("trades_closed_total", "positions closed"), &["symbol"]).unwrap()
});

pub static TRADES_REJECTED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("trades_rejected_total", "rejected trade and close requests (label: reason)"),
        &["reason"],
    )
    .unwrap()
});

pub static OPEN_POSITIONS: Lazy<IntGauge> =
    Lazy::new(|| IntGauge::new("open_positions", "open positions").unwrap());

// -------- Account --------
pub static BALANCE: Lazy<Gauge> =
    Lazy::new(|| Gauge::new("account_balance", "cash balance").unwrap());

pub static EQUITY: Lazy<Gauge> =
    Lazy::new(|| Gauge::new("account_equity", "balance plus unrealized PnL").unwrap());

pub static USED_MARGIN: Lazy<Gauge> =
    Lazy::new(|| Gauge::new("account_used_margin", "margin held by open positions").unwrap());

pub static MARGIN_LEVEL: Lazy<Gauge> =
    Lazy::new(|| Gauge::new("account_margin_level", "equity / used margin in percent").unwrap());

pub fn init() {
    // Register all metrics to the custom registry
    for m in [
        REGISTRY.register(Box::new(TICKS.clone())),
        REGISTRY.register(Box::new(QUOTE_MID.clone())),
        REGISTRY.register(Box::new(QUOTE_CHANGE_PCT.clone())),
        REGISTRY.register(Box::new(TRADES_OPENED.clone())),
        REGISTRY.register(Box::new(TRADES_CLOSED.clone())),
        REGISTRY.register(Box::new(TRADES_REJECTED.clone())),
        REGISTRY.register(Box::new(OPEN_POSITIONS.clone())),
        REGISTRY.register(Box::new(BALANCE.clone())),
        REGISTRY.register(Box::new(EQUITY.clone())),
        REGISTRY.register(Box::new(USED_MARGIN.clone())),
        REGISTRY.register(Box::new(MARGIN_LEVEL.clone())),
    ] {
        let _ = m;
    }
}

pub fn record_quotes(quotes: &[Instrument]) {
    TICKS.inc();
    for q in quotes {
        QUOTE_MID.with_label_values(&[q.symbol.as_str()]).set(q.mid());
        QUOTE_CHANGE_PCT.with_label_values(&[q.symbol.as_str()]).set(q.change_percent);
    }
}

pub fn record_account(acc: &AccountSummary, open_positions: usize) {
    BALANCE.set(acc.balance);
    EQUITY.set(acc.equity);
    USED_MARGIN.set(acc.used_margin);
    MARGIN_LEVEL.set(acc.margin_level);
    OPEN_POSITIONS.set(open_positions as i64);
}

// Encode all metrics in Prometheus text format
fn encode_metrics() -> Vec<u8> {
    let encoder = TextEncoder::new();
    let families = REGISTRY.gather();
    let mut buf = Vec::new();
    if encoder.encode(&families, &mut buf).is_err() || buf.is_empty() {
        buf.extend_from_slice(b"# no metrics\n");
    }
    buf
}

// Serve one HTTP request (GET / or /metrics) with a tiny HTTP 1.1 responder
fn handle_client(mut stream: TcpStream) {
    // Read a bit to consume headers (no full parse)
    let mut _req_buf = [0u8; 1024];
    let _ = stream.read(&mut _req_buf);

    let body = encode_metrics();
    let header = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/plain; version=0.0.4; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    );

    let _ = stream.write_all(header.as_bytes());
    let _ = stream.write_all(&body);
    let _ = stream.flush();
}

/// Runs the metrics endpoint on a dedicated OS thread so the simulator loop stays single-threaded.
pub fn serve_metrics(port: u16) {
    thread::spawn(move || {
        let addr = format!("0.0.0.0:{port}");
        let listener = match TcpListener::bind(&addr) {
            Ok(l) => l,
            Err(e) => {
                error!(%addr, ?e, "metrics bind failed, endpoint disabled");
                return;
            }
        };
        info!("metrics listening on http://{addr}/ (and /metrics)");

        for conn in listener.incoming() {
            match conn {
                Ok(stream) => handle_client(stream),
                Err(e) => error!(?e, "metrics accept error"),
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_and_account_gauges_are_exported() {
        let q = Instrument {
            symbol: "EURUSD".into(),
            name: "Euro / US Dollar".into(),
            bid: 1.0849,
            ask: 1.0851,
            change: 0.0001,
            change_percent: 0.01,
        };
        record_quotes(&[q]);
        assert!((QUOTE_MID.with_label_values(&["EURUSD"]).get() - 1.0850).abs() < 1e-12);

        let acc = AccountSummary {
            balance: 10_000.0,
            equity: 10_001.0,
            used_margin: 10.0,
            free_margin: 9_991.0,
            margin_level: 100_010.0,
        };
        record_account(&acc, 1);
        assert_eq!(EQUITY.get(), 10_001.0);
        assert_eq!(OPEN_POSITIONS.get(), 1);

        init();
        let text = String::from_utf8(encode_metrics()).unwrap();
        assert!(text.contains("account_equity 10001"));
        assert!(text.contains("quote_mid{symbol=\"EURUSD\"}"));
    }
}
