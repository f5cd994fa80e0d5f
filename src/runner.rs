//! Wires the order book, event loop, traders, scenario generator, and
//! event log into a complete simulation run.
//!
//! Determinism rules: every event the handler observes is written to the
//! log in processing order, OrderAccepted records are logged only after the
//! matcher has updated them, and nothing runs concurrently.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::agent::Agent;
use crate::book::Book;
use crate::config::Config;
use crate::error::SimResult;
use crate::eventlog::LogWriter;
use crate::eventloop::{EventHandler, EventLoop};
use crate::generator::Generator;
use crate::latency::LatencyModel;
use crate::logging::{log_run_finished, log_run_started};
use crate::time::ms_to_ns;
use crate::types::{Bbo, Event, EventType, OrderType, Signal, Trade};

/// Output of a completed simulation run
#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub run_id: String,
    pub config: Config,
    pub event_count: u64,
    pub trade_count: usize,
    pub wall_duration: Duration,
    pub log_path: PathBuf,
    pub log_hash: String,
    pub output_dir: PathBuf,
}

/// Executes one simulation run
pub struct Runner {
    cfg: Config,
    book: Book,
    log_writer: LogWriter,

    fast_agent: Agent,
    slow_agent: Agent,

    /// Latest post-match BBO, used to stamp signals
    current_bbo: Bbo,

    trades: Vec<Trade>,

    output_dir: PathBuf,
    log_path: PathBuf,
}

impl Runner {
    /// Create a runner, its output directory, and the agents with seeds
    /// derived from the configuration seed.
    pub fn new(cfg: &Config, base_output_dir: &Path) -> SimResult<Self> {
        cfg.validate()?;

        let run_id = format!("{}_seed{}", cfg.name, cfg.seed);
        let output_dir = base_output_dir.join(run_id);
        fs::create_dir_all(&output_dir)?;

        let log_path = output_dir.join("events.jsonl");
        let log_writer = LogWriter::create(&log_path)?;

        let fast_latency = LatencyModel::new(
            ms_to_ns(cfg.fast_trader.base_latency_ms),
            ms_to_ns(cfg.fast_trader.jitter_ms),
            cfg.seed + 1,
        );
        let slow_latency = LatencyModel::new(
            ms_to_ns(cfg.slow_trader.base_latency_ms),
            ms_to_ns(cfg.slow_trader.jitter_ms),
            cfg.seed + 2,
        );

        let fast_agent = Agent::new(&cfg.fast_trader.id, fast_latency, cfg.seed + 3, 1_000_000);
        let slow_agent = Agent::new(&cfg.slow_trader.id, slow_latency, cfg.seed + 4, 2_000_000);

        Ok(Self {
            cfg: cfg.clone(),
            book: Book::new(),
            log_writer,
            fast_agent,
            slow_agent,
            current_bbo: Bbo::default(),
            trades: Vec::new(),
            output_dir,
            log_path,
        })
    }

    /// Execute the simulation to completion and write the run artifacts.
    pub fn run(&mut self) -> SimResult<RunResult> {
        let wall_start = Instant::now();
        log_run_started(&self.cfg.name, self.cfg.seed, self.cfg.duration);

        let mut generator = Generator::new(&self.cfg)?;

        let mut el = EventLoop::new();
        el.schedule(Event::sim_start());
        for event in generator.generate() {
            el.schedule(event);
        }

        // Periodic re-quote ticks for both traders.
        let re_quote = self.fast_agent.strategy.re_quote_interval_ns;
        if re_quote > 0 {
            let fast_id = self.fast_agent.id.clone();
            let slow_id = self.slow_agent.id.clone();
            let mut t = re_quote;
            while t < self.cfg.duration {
                el.schedule(Event::re_quote(t, &fast_id));
                el.schedule(Event::re_quote(t, &slow_id));
                t += re_quote;
            }
        }

        el.schedule(Event::sim_end(self.cfg.duration));

        el.run(&mut *self)?;

        self.log_writer.finish()?;

        let log_hash = hash_file(&self.log_path)?;

        let config_path = self.output_dir.join("config.json");
        fs::write(&config_path, serde_json::to_vec_pretty(&self.cfg)?)?;

        let trades_path = self.output_dir.join("trades.json");
        fs::write(&trades_path, serde_json::to_vec_pretty(&self.trades)?)?;

        if let Some(base) = self.output_dir.parent() {
            fs::write(base.join("last-run"), self.output_dir.display().to_string())?;
        }

        log_run_finished(
            &self.cfg.name,
            el.events_processed,
            self.trades.len(),
            &log_hash,
        );

        Ok(RunResult {
            run_id: format!("{}_seed{}", self.cfg.name, self.cfg.seed),
            config: self.cfg.clone(),
            event_count: el.events_processed,
            trade_count: self.trades.len(),
            wall_duration: wall_start.elapsed(),
            log_path: self.log_path.clone(),
            log_hash,
            output_dir: self.output_dir.clone(),
        })
    }

    fn log_event(&mut self, mut event: Event) -> SimResult<()> {
        self.log_writer.append(&mut event)
    }

    /// Process an incoming order through the matching engine, log the
    /// results, and keep the owning agent's shadow state in sync.
    fn handle_order(&mut self, mut event: Event) -> SimResult<Vec<Event>> {
        let Some(mut order) = event.order.take() else {
            return Ok(Vec::new());
        };
        let ts = event.timestamp;

        let (trades, bbo) = self.book.process(&mut order, ts);
        if cfg!(debug_assertions) {
            self.book.assert_invariants();
        }

        // Record queue position at placement for limit orders that rested.
        if order.kind == OrderType::Limit && order.remaining_qty > 0 {
            order.queue_pos = self.book.queue_position(order.id);
        }

        // Log after processing so the recorded queue_pos is accurate.
        event.order = Some(order.clone());
        self.log_event(event)?;

        // Track agent limit orders before fill notifications so aggressive
        // fills find the record in place.
        if order.kind == OrderType::Limit {
            if order.trader_id == self.fast_agent.id {
                self.fast_agent.register(&order);
            } else if order.trader_id == self.slow_agent.id {
                self.slow_agent.register(&order);
            }
        }

        if order.kind == OrderType::Cancel {
            self.log_event(Event::order_canceled(ts, order.clone()))?;

            if order.trader_id == self.fast_agent.id {
                self.fast_agent.on_cancel_ack(order.cancel_id);
            } else if order.trader_id == self.slow_agent.id {
                self.slow_agent.on_cancel_ack(order.cancel_id);
            }
        }

        for trade in trades {
            self.trades.push(trade.clone());
            self.log_event(Event::trade_executed(ts, trade.clone()))?;

            if trade.buy_trader == self.fast_agent.id {
                self.fast_agent.on_fill(trade.buy_order_id, trade.qty);
            } else if trade.buy_trader == self.slow_agent.id {
                self.slow_agent.on_fill(trade.buy_order_id, trade.qty);
            }
            if trade.sell_trader == self.fast_agent.id {
                self.fast_agent.on_fill(trade.sell_order_id, trade.qty);
            } else if trade.sell_trader == self.slow_agent.id {
                self.slow_agent.on_fill(trade.sell_order_id, trade.qty);
            }
        }

        self.current_bbo = bbo;
        self.log_event(Event::bbo_update(ts, bbo))?;

        Ok(Vec::new())
    }

    /// Stamp the signal with the current mid, deliver it to both traders,
    /// and schedule their orders at latency-adjusted arrival times.
    fn handle_signal(&mut self, mut event: Event) -> SimResult<Vec<Event>> {
        let Some(mut signal) = event.signal.take() else {
            return Ok(Vec::new());
        };
        let ts = event.timestamp;

        signal.mid_price = self.current_bbo.mid_price;
        event.signal = Some(signal);
        self.log_event(event)?;

        let bbo = self.current_bbo;
        let mut out = Vec::new();

        for order in self.fast_agent.on_signal(&signal, &bbo, ts) {
            let mut order = order;
            order.arrival_time = self.fast_agent.latency.apply(order.decision_time);
            out.push(Event::order_accepted(order.arrival_time, order));
        }
        for order in self.slow_agent.on_signal(&signal, &bbo, ts) {
            let mut order = order;
            order.arrival_time = self.slow_agent.latency.apply(order.decision_time);
            out.push(Event::order_accepted(order.arrival_time, order));
        }

        Ok(out)
    }

    /// Deliver a neutral signal to the named trader so it can refresh
    /// stale quotes. Skipped entirely when the book is one-sided.
    fn handle_re_quote(&mut self, event: Event) -> SimResult<Vec<Event>> {
        if self.current_bbo.bid_price == 0 || self.current_bbo.ask_price == 0 {
            return Ok(Vec::new());
        }

        let agent = if event.trader_id == self.fast_agent.id {
            &mut self.fast_agent
        } else if event.trader_id == self.slow_agent.id {
            &mut self.slow_agent
        } else {
            return Ok(Vec::new());
        };

        let neutral = Signal {
            value: 0.0,
            mid_price: self.current_bbo.mid_price,
        };
        let bbo = self.current_bbo;

        let mut out = Vec::new();
        for order in agent.on_signal(&neutral, &bbo, event.timestamp) {
            let mut order = order;
            order.arrival_time = agent.latency.apply(order.decision_time);
            out.push(Event::order_accepted(order.arrival_time, order));
        }
        Ok(out)
    }
}

impl EventHandler for Runner {
    fn handle(&mut self, event: Event) -> SimResult<Vec<Event>> {
        match event.kind {
            EventType::OrderAccepted => self.handle_order(event),
            EventType::Signal => self.handle_signal(event),
            EventType::ReQuote => self.handle_re_quote(event),
            EventType::SimStart | EventType::SimEnd => {
                self.log_event(event)?;
                Ok(Vec::new())
            }
            // Written inline by order processing; never scheduled.
            EventType::TradeExecuted | EventType::BboUpdate | EventType::OrderCanceled => {
                Ok(Vec::new())
            }
        }
    }
}

/// SHA-256 of a file's raw bytes, hex encoded
pub fn hash_file<P: AsRef<Path>>(path: P) -> SimResult<String> {
    let data = fs::read(path.as_ref())?;
    Ok(format!("{:x}", Sha256::digest(&data)))
}
