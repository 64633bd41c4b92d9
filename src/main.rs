// ===============================
// src/main.rs
// ===============================
/*
 # run with a fixed seed, half-second ticks, journal to ./data
 SIM_SEED=7 cargo run -- --interval-ms 500 --record-file data/events.jsonl

 # account & quotes from the metrics endpoint
 curl -s localhost:9898/metrics | egrep '^(account_|quote_mid)'
*/
/*
=============================================================================
Project : fx_sim — demo forex quote simulator & paper position tracker
Module  : main.rs
Version : 0.1.0
License : MIT (see LICENSE)

Summary : Random-walk FX quotes on a fixed timer, bounded quote history,
          mark-to-market of open positions, account equity/margin, pre-trade
          limits, Prometheus metrics and an optional JSONL event journal.
=============================================================================
*/
mod account;
mod commands;
mod config;
mod context;
mod domain;
mod feed;
mod history;
mod metrics;
mod observer;
mod positions;
mod posttrade;
mod recorder;
mod risk;

use clap::Parser;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    select,
    sync::mpsc,
    time::{interval, Duration, MissedTickBehavior},
};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::context::{now_ms, SimContext, TickState};
use crate::domain::{Event, Instrument};
use crate::recorder::Journal;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // ---- Logging ----
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // ---- Load config & limits (env, then CLI overrides) ----
    let cli = config::Cli::parse();
    let (mut args, limits) = config::load();
    cli.apply(&mut args);

    info!(
        symbols = ?args.symbols,
        interval_ms = args.tick_interval_ms,
        max_ticks = ?args.max_ticks,
        history = args.history_capacity,
        spread = args.spread,
        margin_rate = args.margin_rate,
        balance = args.initial_balance,
        seed = ?args.seed,
        min_notional = limits.min_notional,
        max_notional = limits.max_notional,
        "startup config"
    );

    // ---- Metrics ----
    if args.metrics_enabled {
        metrics::init();
        metrics::serve_metrics(args.metrics_port);
    }

    let mut ctx = SimContext::from_args(&args, limits);
    if ctx.quotes().is_empty() {
        error!(symbols = ?args.symbols, "no known symbols configured, nothing to simulate");
        return;
    }
    metrics::record_account(&ctx.account(), 0);

    // ---- Recorder (optional) ----
    let (journal, recorder_task) = match args.record_file.clone() {
        Some(path) => {
            let (rec_tx, rec_rx) = mpsc::channel::<Event>(8192);
            (Journal::new(rec_tx), Some(tokio::spawn(recorder::run(rec_rx, path))))
        }
        None => (Journal::disabled(), None),
    };

    // ---- Quote listeners ----
    ctx.subscribe(Box::new(|_: i64, quotes: &[Instrument]| metrics::record_quotes(quotes)));
    ctx.subscribe(Box::new(|_: i64, quotes: &[Instrument]| {
        for q in quotes {
            let dp = q.price_decimals();
            debug!(symbol = %q.symbol, bid = %format!("{:.*}", dp, q.bid), ask = %format!("{:.*}", dp, q.ask),
                chg_pct = %format!("{:+.4}", q.change_percent), "quote");
        }
    }));
    if journal.is_enabled() {
        let j = journal.clone();
        ctx.subscribe(Box::new(move |ts_ms: i64, quotes: &[Instrument]| {
            j.record(Event::Quotes { ts_ms, instruments: quotes.to_vec() });
        }));
    }
    journal.record(Event::Note(format!("started with {} instruments", ctx.quotes().len())));

    // ---- Event loop: timer ticks & stdin commands, one at a time ----
    let mut timer = interval(Duration::from_millis(args.tick_interval_ms));
    timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
    timer.tick().await; // first tick fires immediately

    let mut heartbeat = interval(Duration::from_secs(10));
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let mut ticking = true;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    println!("{}", commands::HELP);

    loop {
        match ctx.tick_state(args.max_ticks) {
            TickState::Done => {
                info!(ticks = ctx.ticks(), "max ticks reached");
                break;
            }
            TickState::Idle if ticking => {
                ticking = false;
                info!(ticks = ctx.ticks(), "no subscribers left, quote timer stopped");
            }
            TickState::Idle | TickState::Running => {}
        }
        if !ticking && !stdin_open {
            info!("nothing left to drive, shutting down");
            break;
        }

        select! {
            _ = timer.tick(), if ticking => {
                ctx.tick();
                metrics::record_account(&ctx.account(), ctx.positions().open_count());
            }
            line = lines.next_line(), if stdin_open => {
                match line {
                    Ok(Some(line)) => {
                        if line.trim().is_empty() {
                            continue;
                        }
                        match commands::parse(&line) {
                            Ok(cmd) => {
                                let reply = commands::apply(&mut ctx, cmd, now_ms(), &journal);
                                metrics::record_account(&ctx.account(), ctx.positions().open_count());
                                for l in &reply.lines {
                                    println!("{l}");
                                }
                                if reply.quit {
                                    info!("quit requested");
                                    break;
                                }
                            }
                            Err(e) => println!("error: {e} ({})", commands::HELP),
                        }
                    }
                    Ok(None) => {
                        stdin_open = false;
                        info!("stdin closed, commands disabled");
                    }
                    Err(e) => {
                        stdin_open = false;
                        warn!(?e, "stdin read failed, commands disabled");
                    }
                }
            }
            _ = heartbeat.tick() => {
                let acc = ctx.account();
                info!(
                    ticks = ctx.ticks(),
                    open = ctx.positions().open_count(),
                    balance = %format!("{:.2}", acc.balance),
                    equity = %format!("{:.2}", acc.equity),
                    margin_level = %format!("{:.2}", acc.margin_level),
                    "heartbeat"
                );
            }
            _ = &mut ctrl_c => {
                info!("ctrl-c received, shutting down");
                break;
            }
        }
    }

    // ---- Shutdown: drop every journal sender so the recorder flushes and exits ----
    let acc = ctx.account();
    info!(
        ticks = ctx.ticks(),
        balance = %format!("{:.2}", acc.balance),
        equity = %format!("{:.2}", acc.equity),
        "final account"
    );
    journal.record(Event::Note(format!("stopped after {} ticks", ctx.ticks())));
    drop(ctx);
    drop(journal);
    if let Some(task) = recorder_task {
        if let Err(e) = task.await {
            error!(?e, "recorder task failed");
        }
    }
}
