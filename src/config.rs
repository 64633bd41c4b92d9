// ===============================
// src/config.rs
// ===============================
/*
=============================================================================
Project : fx_sim — demo forex quote simulator & paper position tracker
Module  : config.rs
Version : 0.1.0
License : MIT (see LICENSE)

Summary : Random-walk FX quotes on a fixed timer, bounded quote history,
          mark-to-market of open positions, account equity/margin, pre-trade
          limits, Prometheus metrics and an optional JSONL event journal.
=============================================================================
*/
use clap::Parser;
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;
use tracing::warn;

use crate::account::{DEFAULT_BALANCE, DEFAULT_MARGIN_RATE};
use crate::feed::{CATALOG, DEFAULT_SPREAD, PRICE_FLOOR};
use crate::history::DEFAULT_CAPACITY;

#[derive(Clone, Debug)]
pub struct Args {
    // instruments
    pub symbols: Vec<String>,

    // simulation
    pub tick_interval_ms: u64,
    pub max_ticks: Option<u64>,
    pub history_capacity: usize,
    pub spread: f64,
    pub price_floor: f64,
    pub seed: Option<u64>,

    // account
    pub initial_balance: f64,
    pub margin_rate: f64,

    // files/metrics
    pub record_file: Option<String>,
    pub metrics_port: u16,
    pub metrics_enabled: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Limits {
    pub min_notional: f64,
    pub max_notional: f64,
}

impl Default for Limits {
    fn default() -> Self { Self { min_notional: 100.0, max_notional: 100_000.0 } }
}

/// Command-line overrides; anything left unset falls back to the environment.
#[derive(Parser, Debug, Default)]
#[command(name = "fx_sim", version, about = "Demo forex quote simulator with paper positions")]
pub struct Cli {
    /// Tick period in milliseconds
    #[arg(long)]
    pub interval_ms: Option<u64>,
    /// Stop after this many ticks
    #[arg(long)]
    pub max_ticks: Option<u64>,
    /// Seed for the quote random walk
    #[arg(long)]
    pub seed: Option<u64>,
    /// Append events as JSON lines to this file
    #[arg(long)]
    pub record_file: Option<String>,
    /// Port for the Prometheus endpoint
    #[arg(long)]
    pub metrics_port: Option<u16>,
    /// Do not start the metrics endpoint
    #[arg(long)]
    pub no_metrics: bool,
}

impl Cli {
    pub fn apply(self, args: &mut Args) {
        if let Some(ms) = self.interval_ms {
            args.tick_interval_ms = ms.max(1);
        }
        if self.max_ticks.is_some() {
            args.max_ticks = self.max_ticks;
        }
        if self.seed.is_some() {
            args.seed = self.seed;
        }
        if self.record_file.is_some() {
            args.record_file = self.record_file;
        }
        if let Some(port) = self.metrics_port {
            args.metrics_port = port;
        }
        if self.no_metrics {
            args.metrics_enabled = false;
        }
    }
}

fn parse_or<T: FromStr>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    match get(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(%key, %raw, "invalid value, using default");
            default
        }),
        None => default,
    }
}

fn positive_or(get: &impl Fn(&str) -> Option<String>, key: &str, default: f64) -> f64 {
    let v: f64 = parse_or(get, key, default);
    if v.is_finite() && v > 0.0 {
        v
    } else {
        warn!(%key, value = v, "must be positive, using default");
        default
    }
}

fn finite_or(get: &impl Fn(&str) -> Option<String>, key: &str, default: f64) -> f64 {
    let v: f64 = parse_or(get, key, default);
    if v.is_finite() {
        v
    } else {
        warn!(%key, value = v, "must be finite, using default");
        default
    }
}

pub fn load() -> (Args, Limits) {
    // .env is optional
    let _ = dotenv();
    from_lookup(|k| env::var(k).ok())
}

pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> (Args, Limits) {
    // SYMBOLS=EURUSD,USDJPY
    let symbols: Vec<String> = get("SYMBOLS")
        .map(|s| {
            s.split(',')
                .map(|x| x.trim())
                .filter(|x| !x.is_empty())
                .map(|x| x.to_ascii_uppercase())
                .collect()
        })
        .filter(|v: &Vec<String>| !v.is_empty())
        .unwrap_or_else(|| CATALOG.iter().map(|s| s.symbol.to_string()).collect());

    let tick_interval_ms = parse_or(&get, "TICK_INTERVAL_MS", 1_000u64).max(1);
    let max_ticks = get("MAX_TICKS").and_then(|s| s.trim().parse().ok());
    let history_capacity = parse_or(&get, "HISTORY_CAPACITY", DEFAULT_CAPACITY).max(1);
    // bid < ask needs a non-zero spread
    let spread = positive_or(&get, "SPREAD", DEFAULT_SPREAD);
    let price_floor = positive_or(&get, "PRICE_FLOOR", PRICE_FLOOR);
    let seed = get("SIM_SEED").and_then(|s| s.trim().parse().ok());

    let initial_balance = finite_or(&get, "INITIAL_BALANCE", DEFAULT_BALANCE);
    let margin_rate = positive_or(&get, "MARGIN_RATE", DEFAULT_MARGIN_RATE);

    let record_file = get("RECORD_FILE").filter(|s| !s.trim().is_empty());
    let metrics_port = parse_or(&get, "METRICS_PORT", 9898u16);
    let metrics_enabled = !matches!(
        get("METRICS").map(|s| s.to_ascii_lowercase()).as_deref(),
        Some("0" | "off" | "false" | "no")
    );

    let args = Args {
        symbols,
        tick_interval_ms,
        max_ticks,
        history_capacity,
        spread,
        price_floor,
        seed,
        initial_balance,
        margin_rate,
        record_file,
        metrics_port,
        metrics_enabled,
    };

    // ===== Limits =====
    let defaults = Limits::default();
    let min_notional = positive_or(&get, "MIN_NOTIONAL", defaults.min_notional);
    let max_notional = positive_or(&get, "MAX_NOTIONAL", defaults.max_notional);
    let limits = if min_notional <= max_notional {
        Limits { min_notional, max_notional }
    } else {
        warn!(min_notional, max_notional, "MIN_NOTIONAL above MAX_NOTIONAL, using defaults");
        defaults
    };

    (args, limits)
}
