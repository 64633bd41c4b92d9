// ===============================
// src/commands.rs
// ===============================
//
// Line commands read from stdin:
//   buy EURUSD 1000 | sell USDJPY 2500 | close T-3
//   show T-3 | positions | closed | account | quotes | history EURUSD [n]
//   unsubscribe | help | quit
//

use thiserror::Error;

use crate::context::SimContext;
use crate::domain::{price_decimals, Direction, Event, Instrument, MarginHealth, Position, PositionId};
use crate::posttrade;
use crate::recorder::Journal;
use crate::risk::TradeRequest;

pub const HELP: &str = "commands: buy <SYM> <notional> | sell <SYM> <notional> | close <id> | \
show <id> | positions | closed | account | quotes | history <SYM> [n] | unsubscribe | quit";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Trade(TradeRequest),
    Close(PositionId),
    Show(PositionId),
    Positions,
    Closed,
    Account,
    Quotes,
    History { symbol: String, n: Option<usize> },
    Unsubscribe,
    Help,
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("empty command")]
    Empty,
    #[error("unknown command `{0}`")]
    Unknown(String),
    #[error("`{cmd}` needs <{arg}>")]
    MissingArg { cmd: &'static str, arg: &'static str },
    #[error("invalid {arg}: `{value}`")]
    InvalidArg { arg: &'static str, value: String },
}

pub fn parse(line: &str) -> Result<Command, CommandError> {
    let mut parts = line.split_whitespace();
    let head = parts.next().ok_or(CommandError::Empty)?.to_ascii_lowercase();

    let cmd = match head.as_str() {
        "buy" | "long" => trade(Direction::Long, "buy", &mut parts)?,
        "sell" | "short" => trade(Direction::Short, "sell", &mut parts)?,
        "close" => Command::Close(position_id("close", &mut parts)?),
        "show" => Command::Show(position_id("show", &mut parts)?),
        "positions" | "pos" => Command::Positions,
        "closed" => Command::Closed,
        "account" | "acc" => Command::Account,
        "quotes" | "q" => Command::Quotes,
        "history" | "hist" => {
            let symbol = parts
                .next()
                .ok_or(CommandError::MissingArg { cmd: "history", arg: "symbol" })?
                .to_ascii_uppercase();
            let n = match parts.next() {
                Some(raw) => Some(
                    raw.parse::<usize>()
                        .map_err(|_| CommandError::InvalidArg { arg: "n", value: raw.to_string() })?,
                ),
                None => None,
            };
            Command::History { symbol, n }
        }
        "unsubscribe" => Command::Unsubscribe,
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => return Err(CommandError::Unknown(other.to_string())),
    };
    Ok(cmd)
}

fn trade<'a>(
    direction: Direction,
    cmd: &'static str,
    parts: &mut impl Iterator<Item = &'a str>,
) -> Result<Command, CommandError> {
    let symbol = parts
        .next()
        .ok_or(CommandError::MissingArg { cmd, arg: "symbol" })?
        .to_ascii_uppercase();
    let raw = parts.next().ok_or(CommandError::MissingArg { cmd, arg: "notional" })?;
    let notional = raw
        .parse::<f64>()
        .map_err(|_| CommandError::InvalidArg { arg: "notional", value: raw.to_string() })?;
    Ok(Command::Trade(TradeRequest { symbol, direction, notional }))
}

fn position_id<'a>(
    cmd: &'static str,
    parts: &mut impl Iterator<Item = &'a str>,
) -> Result<PositionId, CommandError> {
    let raw = parts.next().ok_or(CommandError::MissingArg { cmd, arg: "id" })?;
    raw.parse::<PositionId>()
        .map_err(|_| CommandError::InvalidArg { arg: "id", value: raw.to_string() })
}

/// Output of one command: lines for the terminal and whether to stop.
#[derive(Debug, Default)]
pub struct Reply {
    pub lines: Vec<String>,
    pub quit: bool,
}

impl Reply {
    fn line(s: String) -> Self { Self { lines: vec![s], quit: false } }
}

/// Runs a command against the context. Trade events go to the journal.
pub fn apply(ctx: &mut SimContext, cmd: Command, now_ms: i64, journal: &Journal) -> Reply {
    match cmd {
        Command::Trade(req) => match ctx.execute(&req, now_ms) {
            Ok(pos) => {
                posttrade::on_opened(&pos);
                let line = format!("opened {}", fmt_position(&pos));
                journal.record(Event::Opened(pos));
                Reply::line(line)
            }
            Err(e) => {
                posttrade::on_rejected(&e);
                journal.record(Event::Rejected { ts_ms: now_ms, reason: e.to_string() });
                Reply::line(format!("rejected: {e}"))
            }
        },
        Command::Close(id) => match ctx.close(id, now_ms) {
            Ok(closed) => {
                let acc = ctx.account();
                posttrade::on_closed(&closed, &acc);
                posttrade::on_account(&acc);
                let line = format!(
                    "closed {} at {:.*} pnl {:+.2} balance {:.2}",
                    closed.id,
                    price_decimals(&closed.symbol),
                    closed.close_price,
                    closed.realized_pnl,
                    acc.balance
                );
                journal.record(Event::Closed(closed));
                Reply::line(line)
            }
            Err(e) => {
                posttrade::on_close_rejected(&e);
                journal.record(Event::Rejected { ts_ms: now_ms, reason: e.to_string() });
                Reply::line(format!("close rejected: {e}"))
            }
        },
        Command::Show(id) => match ctx.positions().get(id) {
            Some(p) => Reply::line(fmt_position(p)),
            None => Reply::line(format!("position {id} not found")),
        },
        Command::Positions => {
            let lines: Vec<String> = ctx.positions().open_positions().map(fmt_position).collect();
            if lines.is_empty() { Reply::line("no open positions".into()) } else { Reply { lines, quit: false } }
        }
        Command::Closed => {
            let lines: Vec<String> = ctx.positions().closed_positions().map(fmt_position).collect();
            if lines.is_empty() { Reply::line("no closed positions".into()) } else { Reply { lines, quit: false } }
        }
        Command::Account => {
            let acc = ctx.account();
            let health = match acc.health() {
                MarginHealth::NoExposure => "no exposure",
                MarginHealth::Healthy => "healthy",
                MarginHealth::Warning => "warning",
                MarginHealth::Critical => "critical",
            };
            Reply::line(format!(
                "balance {:.2} equity {:.2} used margin {:.2} free margin {:.2} margin level {:.2}% ({health})",
                acc.balance, acc.equity, acc.used_margin, acc.free_margin, acc.margin_level
            ))
        }
        Command::Quotes => Reply { lines: ctx.quotes().iter().map(fmt_quote).collect(), quit: false },
        Command::History { symbol, n } => {
            let samples = match n {
                Some(n) => ctx.history_tail(&symbol, n),
                None => ctx.history(&symbol),
            };
            if samples.is_empty() {
                return Reply::line(format!("no history for {symbol}"));
            }
            let dp = price_decimals(&symbol);
            let lines = samples.iter().map(|s| format!("{} {:.*}", s.ts_ms, dp, s.price)).collect();
            Reply { lines, quit: false }
        }
        Command::Unsubscribe => match ctx.subscription_ids().last().copied() {
            Some(id) => {
                ctx.unsubscribe(id);
                let left = ctx.subscription_ids().len();
                Reply::line(format!("listener removed, {left} left"))
            }
            None => Reply::line("no listeners registered".into()),
        },
        Command::Help => Reply::line(HELP.into()),
        Command::Quit => Reply { lines: Vec::new(), quit: true },
    }
}

fn fmt_quote(q: &Instrument) -> String {
    let dp = q.price_decimals();
    format!(
        "{:<7} {:<30} bid {:.*} ask {:.*} {:+.4}%",
        q.symbol, q.name, dp, q.bid, dp, q.ask, q.change_percent
    )
}

fn fmt_position(p: &Position) -> String {
    let dp = price_decimals(&p.symbol);
    let mut s = format!(
        "{} {} {} {:.2} entry {:.*} mark {:.*} pnl {:+.2}",
        p.id, p.direction.label(), p.symbol, p.notional, dp, p.entry_price, dp, p.mark_price, p.pnl
    );
    if let Some(close) = p.close_price {
        s.push_str(&format!(" closed at {:.*}", dp, close));
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::Account;
    use crate::config::Limits;
    use crate::feed::{QuoteGenerator, CATALOG, DEFAULT_SPREAD, PRICE_FLOOR};
    use crate::context::TickState;
    use crate::history::QuoteHistory;
    use crate::metrics::TRADES_REJECTED;
    use rand::{rngs::StdRng, SeedableRng};
    use tokio::sync::mpsc;

    fn ctx() -> SimContext {
        SimContext::new(
            QuoteGenerator::new(&CATALOG, DEFAULT_SPREAD, PRICE_FLOOR),
            QuoteHistory::new(50),
            Account::default(),
            Limits::default(),
            StdRng::seed_from_u64(1),
        )
    }

    fn run(ctx: &mut SimContext, line: &str, now: i64) -> Reply {
        apply(ctx, parse(line).unwrap(), now, &Journal::disabled())
    }

    #[test]
    fn parses_trades() {
        assert_eq!(
            parse("buy eurusd 1000").unwrap(),
            Command::Trade(TradeRequest { symbol: "EURUSD".into(), direction: Direction::Long, notional: 1000.0 })
        );
        assert_eq!(
            parse("  SELL USDJPY 2500.5 ").unwrap(),
            Command::Trade(TradeRequest { symbol: "USDJPY".into(), direction: Direction::Short, notional: 2500.5 })
        );
    }

    #[test]
    fn parses_close_with_or_without_prefix() {
        assert_eq!(parse("close T-3").unwrap(), Command::Close(PositionId(3)));
        assert_eq!(parse("close 12").unwrap(), Command::Close(PositionId(12)));
        assert!(matches!(parse("close T-x"), Err(CommandError::InvalidArg { arg: "id", .. })));
        assert_eq!(parse("show t-4").unwrap(), Command::Show(PositionId(4)));
        assert_eq!(parse("show"), Err(CommandError::MissingArg { cmd: "show", arg: "id" }));
    }

    #[test]
    fn parses_queries() {
        assert_eq!(parse("account").unwrap(), Command::Account);
        assert_eq!(parse("quotes").unwrap(), Command::Quotes);
        assert_eq!(parse("positions").unwrap(), Command::Positions);
        assert_eq!(parse("closed").unwrap(), Command::Closed);
        assert_eq!(
            parse("history gbpusd 5").unwrap(),
            Command::History { symbol: "GBPUSD".into(), n: Some(5) }
        );
        assert_eq!(parse("history gbpusd").unwrap(), Command::History { symbol: "GBPUSD".into(), n: None });
        assert_eq!(parse("quit").unwrap(), Command::Quit);
    }

    #[test]
    fn reports_bad_input() {
        assert_eq!(parse("   "), Err(CommandError::Empty));
        assert_eq!(parse("hedge EURUSD"), Err(CommandError::Unknown("hedge".into())));
        assert_eq!(parse("buy"), Err(CommandError::MissingArg { cmd: "buy", arg: "symbol" }));
        assert_eq!(parse("sell EURUSD"), Err(CommandError::MissingArg { cmd: "sell", arg: "notional" }));
        assert_eq!(
            parse("buy EURUSD lots"),
            Err(CommandError::InvalidArg { arg: "notional", value: "lots".into() })
        );
    }

    #[test]
    fn buy_then_close_round_trip() {
        let mut c = ctx();
        let r = run(&mut c, "buy EURUSD 1000", 1);
        assert!(r.lines[0].starts_with("opened T-1 long EURUSD 1000.00"), "{:?}", r.lines);
        c.tick_at(2);
        assert_eq!(run(&mut c, "positions", 3).lines.len(), 1);

        let r = run(&mut c, "close T-1", 4);
        assert!(r.lines[0].starts_with("closed T-1 at "), "{:?}", r.lines);
        assert_eq!(run(&mut c, "positions", 5).lines, vec!["no open positions".to_string()]);
        assert!(run(&mut c, "closed", 5).lines[0].contains("closed at"));
        assert!(run(&mut c, "show T-1", 5).lines[0].starts_with("T-1 long EURUSD"));
        assert_eq!(run(&mut c, "show T-9", 5).lines, vec!["position T-9 not found".to_string()]);

        let r = run(&mut c, "close T-1", 6);
        assert!(r.lines[0].starts_with("close rejected"));
    }

    #[test]
    fn rejected_trade_reports_reason() {
        let mut c = ctx();
        let r = run(&mut c, "sell XAUUSD 1000", 1);
        assert_eq!(r.lines, vec!["rejected: unknown symbol XAUUSD".to_string()]);
        assert!(c.positions().all().is_empty());
    }

    #[test]
    fn queries_render() {
        let mut c = ctx();
        assert_eq!(run(&mut c, "quotes", 1).lines.len(), 6);
        assert!(run(&mut c, "account", 1).lines[0].contains("(no exposure)"));
        assert_eq!(run(&mut c, "history EURUSD", 1).lines, vec!["no history for EURUSD".to_string()]);
        for t in 0..5 {
            c.tick_at(10 + t);
        }
        assert_eq!(run(&mut c, "history EURUSD", 20).lines.len(), 5);
        assert_eq!(run(&mut c, "history USDJPY 2", 20).lines.len(), 2);
        assert!(run(&mut c, "quit", 20).quit);
    }

    #[test]
    fn unsubscribe_drops_latest_listener() {
        let mut c = ctx();
        c.subscribe(Box::new(|_: i64, _: &[Instrument]| {}));
        c.subscribe(Box::new(|_: i64, _: &[Instrument]| {}));
        assert_eq!(run(&mut c, "unsubscribe", 1).lines, vec!["listener removed, 1 left".to_string()]);
        assert_eq!(c.tick_state(None), TickState::Running);
        run(&mut c, "unsubscribe", 1);
        assert_eq!(c.tick_state(None), TickState::Idle);
        assert_eq!(run(&mut c, "unsubscribe", 1).lines, vec!["no listeners registered".to_string()]);

        // timer is off but commands keep working
        assert!(run(&mut c, "buy EURUSD 1000", 2).lines[0].starts_with("opened T-1"));
        assert_eq!(run(&mut c, "quotes", 2).lines.len(), 6);
        assert!(run(&mut c, "close T-1", 3).lines[0].starts_with("closed T-1"));
        assert_eq!(c.ticks(), 0);
    }

    #[test]
    fn close_rejection_is_journaled_and_counted() {
        let (tx, mut rx) = mpsc::channel(8);
        let journal = Journal::new(tx);
        let mut c = ctx();

        let r = apply(&mut c, parse("close T-5").unwrap(), 9, &journal);
        assert_eq!(r.lines, vec!["close rejected: position T-5 not found".to_string()]);
        match rx.try_recv() {
            Ok(Event::Rejected { ts_ms, reason }) => {
                assert_eq!(ts_ms, 9);
                assert_eq!(reason, "position T-5 not found");
            }
            other => panic!("unexpected journal entry: {other:?}"),
        }
        assert!(TRADES_REJECTED.with_label_values(&["not_found"]).get() >= 1);
    }
}
