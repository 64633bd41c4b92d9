// ===============================
// src/context.rs
// ===============================
//
// SimContext owns every piece of mutable simulator state: quote generator,
// history, position book, account and listeners. Callers hold it by value
// (or &mut) and drive it from one task, so a tick and a trade never interleave.
//

use chrono::Utc;
use rand::{rngs::StdRng, SeedableRng};
use tracing::debug;

use crate::account::Account;
use crate::config::{Args, Limits};
use crate::domain::{AccountSummary, ClosedTrade, Instrument, Position, PositionId, PriceSample};
use crate::feed::QuoteGenerator;
use crate::history::QuoteHistory;
use crate::observer::{QuoteListener, SubscriptionId, Subscribers};
use crate::positions::{PositionBook, PositionError};
use crate::risk::{self, RiskError, TradeRequest};

pub fn now_ms() -> i64 { Utc::now().timestamp_millis() }

/// What the driver's timer should do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickState {
    Running,
    /// No listeners left; commands are still served.
    Idle,
    /// Tick limit reached.
    Done,
}

#[derive(Debug)]
pub struct SimContext {
    feed: QuoteGenerator,
    history: QuoteHistory,
    book: PositionBook,
    account: Account,
    limits: Limits,
    subscribers: Subscribers,
    rng: StdRng,
    quotes: Vec<Instrument>,
    last_ts_ms: i64,
    ticks: u64,
}

impl SimContext {
    pub fn new(
        feed: QuoteGenerator,
        history: QuoteHistory,
        account: Account,
        limits: Limits,
        rng: StdRng,
    ) -> Self {
        let quotes = feed.snapshot();
        Self {
            feed,
            history,
            book: PositionBook::new(),
            account,
            limits,
            subscribers: Subscribers::new(),
            rng,
            quotes,
            last_ts_ms: i64::MIN,
            ticks: 0,
        }
    }

    pub fn from_args(args: &Args, limits: Limits) -> Self {
        let rng = match args.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::new(
            QuoteGenerator::from_symbols(&args.symbols, args.spread, args.price_floor),
            QuoteHistory::new(args.history_capacity),
            Account::new(args.initial_balance, args.margin_rate),
            limits,
            rng,
        )
    }

    pub fn tick(&mut self) -> &[Instrument] {
        self.tick_at(now_ms())
    }

    /// One simulation step: move quotes, record history, revalue open
    /// positions, then notify listeners with the new snapshot.
    pub fn tick_at(&mut self, now_ms: i64) -> &[Instrument] {
        let quotes = self.feed.tick(&mut self.rng);
        self.publish(now_ms, quotes);
        &self.quotes
    }

    fn publish(&mut self, now_ms: i64, quotes: Vec<Instrument>) {
        // wall clock may repeat or step back; history needs strictly increasing stamps
        let ts_ms = if self.last_ts_ms == i64::MIN { now_ms } else { now_ms.max(self.last_ts_ms + 1) };
        self.last_ts_ms = ts_ms;

        self.quotes = quotes;
        for (symbol, mid) in self.feed.mids() {
            self.history.append(symbol, PriceSample { ts_ms, price: mid });
        }
        let revalued = self.book.mark_to_market(&self.quotes);
        self.subscribers.notify(ts_ms, &self.quotes);
        self.ticks += 1;
        debug!(tick = self.ticks, ts_ms, revalued, "tick");
    }

    /// Opens a position at the current ask (long) or bid (short).
    pub fn execute(&mut self, req: &TradeRequest, now_ms: i64) -> Result<Position, RiskError> {
        let quote = risk::check(req, &self.limits, &self.quotes)?;
        Ok(self.book.open(quote, req.direction, req.notional, now_ms).clone())
    }

    /// Closes an open position at its latest mark and books the P&L.
    pub fn close(&mut self, id: PositionId, now_ms: i64) -> Result<ClosedTrade, PositionError> {
        let closed = self.book.close(id, now_ms)?;
        self.account.realize(&closed);
        Ok(closed)
    }

    pub fn subscribe(&mut self, listener: QuoteListener) -> SubscriptionId {
        self.subscribers.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.subscribers.unsubscribe(id)
    }

    pub fn subscription_ids(&self) -> Vec<SubscriptionId> { self.subscribers.ids().collect() }

    pub fn history(&self, symbol: &str) -> Vec<PriceSample> { self.history.get(symbol) }

    pub fn history_tail(&self, symbol: &str, n: usize) -> Vec<PriceSample> {
        self.history.tail(symbol, n)
    }

    pub fn quotes(&self) -> &[Instrument] { &self.quotes }

    pub fn positions(&self) -> &PositionBook { &self.book }

    pub fn account(&self) -> AccountSummary { self.account.summary(self.book.all()) }

    pub fn ticks(&self) -> u64 { self.ticks }

    /// Checked before every timer tick, so a limit of 0 never ticks.
    pub fn tick_state(&self, max_ticks: Option<u64>) -> TickState {
        if max_ticks.is_some_and(|max| self.ticks >= max) {
            TickState::Done
        } else if self.subscribers.is_empty() {
            TickState::Idle
        } else {
            TickState::Running
        }
    }
}
