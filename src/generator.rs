//! Deterministic background order flow and signal generation, one flavor
//! per market regime (calm, thin, spike).

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

use crate::config::Config;
use crate::error::{SimError, SimResult};
use crate::types::{Event, Order, OrderId, Price, Qty, Side};

/// Trader id stamped on all generated flow
pub const BACKGROUND_TRADER: &str = "background";

/// Background order ids start above this base to avoid colliding with
/// agent-allocated ids.
const ID_BASE: OrderId = 100_000;

/// Standard deviation of generated signal values
const SIGNAL_SIGMA: f64 = 0.5;

/// Produces the full time-ordered batch of background events for a scenario.
/// All randomness comes from a single PRNG seeded from the configuration.
pub struct Generator {
    cfg: Config,
    rng: StdRng,
    signal_dist: Normal<f64>,
    next_id: OrderId,
}

impl Generator {
    pub fn new(cfg: &Config) -> SimResult<Self> {
        cfg.validate()?;
        let signal_dist = Normal::new(0.0, SIGNAL_SIGMA)
            .map_err(|e| SimError::internal(format!("signal distribution: {e}")))?;
        Ok(Self {
            cfg: cfg.clone(),
            rng: StdRng::seed_from_u64(cfg.seed),
            signal_dist,
            next_id: ID_BASE,
        })
    }

    /// Generate all background events for the scenario duration,
    /// stable-sorted by timestamp.
    pub fn generate(&mut self) -> Vec<Event> {
        let mut events = self.initial_book();
        events.extend(self.signals());

        match self.cfg.name.as_str() {
            "thin" => self.thin_flow(&mut events),
            "spike" => self.spike_flow(&mut events),
            _ => self.calm_flow(&mut events),
        }

        events.sort_by_key(|e| e.timestamp);
        events
    }

    fn next_order_id(&mut self) -> OrderId {
        self.next_id += 1;
        self.next_id
    }

    fn rand_size(&mut self) -> Qty {
        let p = &self.cfg.scenario;
        if p.max_order_size <= p.min_order_size {
            return p.min_order_size;
        }
        self.rng.gen_range(p.min_order_size..=p.max_order_size)
    }

    fn rand_side(&mut self) -> Side {
        if self.rng.gen::<f64>() < 0.5 {
            Side::Buy
        } else {
            Side::Sell
        }
    }

    fn jitter_below(&mut self, bound: i64) -> i64 {
        if bound > 0 {
            self.rng.gen_range(0..bound)
        } else {
            0
        }
    }

    /// Initial resting limit orders seeding both sides of the book at t=0
    fn initial_book(&mut self) -> Vec<Event> {
        let p = self.cfg.scenario.clone();
        let mut events = Vec::new();

        let half_spread = p.initial_spread / 2;
        let best_bid = p.initial_mid_price - half_spread;
        let best_ask = p.initial_mid_price + half_spread;

        for lvl in 0..p.max_price_levels {
            let price = best_bid - lvl as Price * p.price_tick_size;
            for _ in 0..p.depth_per_level {
                let id = self.next_order_id();
                let size = self.rand_size();
                events.push(Event::order_accepted(
                    0,
                    Order::limit(id, BACKGROUND_TRADER, Side::Buy, price, size),
                ));
            }
        }

        for lvl in 0..p.max_price_levels {
            let price = best_ask + lvl as Price * p.price_tick_size;
            for _ in 0..p.depth_per_level {
                let id = self.next_order_id();
                let size = self.rand_size();
                events.push(Event::order_accepted(
                    0,
                    Order::limit(id, BACKGROUND_TRADER, Side::Sell, price, size),
                ));
            }
        }

        events
    }

    /// Periodic signal events. The generator does not know the mid;
    /// the runner stamps it at dispatch time.
    fn signals(&mut self) -> Vec<Event> {
        let interval = self.cfg.scenario.signal_interval_ns;
        if interval <= 0 {
            return Vec::new();
        }

        let mut events = Vec::new();
        let mut t = interval;
        while t < self.cfg.duration {
            let value = self.signal_dist.sample(&mut self.rng);
            events.push(Event::signal(
                t,
                crate::types::Signal {
                    value,
                    mid_price: 0,
                },
            ));
            t += interval;
        }
        events
    }

    /// One background action: cancel a tracked order, sweep with a market
    /// order, or post a limit order near the mid.
    fn emit_action(
        &mut self,
        events: &mut Vec<Event>,
        resting: &mut Vec<OrderId>,
        event_time: i64,
        cancel_rate: f64,
        market_ratio: f64,
        market_size_mul: f64,
    ) {
        let p = self.cfg.scenario.clone();
        let roll: f64 = self.rng.gen();

        if roll < cancel_rate && !resting.is_empty() {
            let idx = self.rng.gen_range(0..resting.len());
            let target = resting.remove(idx);
            let id = self.next_order_id();
            events.push(Event::order_accepted(
                event_time,
                Order::cancel(id, BACKGROUND_TRADER, target),
            ));
        } else if roll < cancel_rate + market_ratio {
            let id = self.next_order_id();
            let side = self.rand_side();
            let mut size = self.rand_size();
            if market_size_mul > 0.0 {
                size = (size as f64 * market_size_mul) as Qty;
            }
            events.push(Event::order_accepted(
                event_time,
                Order::market(id, BACKGROUND_TRADER, side, size),
            ));
        } else {
            let id = self.next_order_id();
            let side = self.rand_side();
            let offset = self.rng.gen_range(0..p.max_price_levels as i64) * p.price_tick_size;
            let price = match side {
                Side::Buy => p.initial_mid_price - p.initial_spread / 2 - offset,
                Side::Sell => p.initial_mid_price + p.initial_spread / 2 + offset,
            };
            let size = self.rand_size();
            events.push(Event::order_accepted(
                event_time,
                Order::limit(id, BACKGROUND_TRADER, side, price, size),
            ));
            resting.push(id);
        }
    }

    /// Steady-state flow: fixed stride, jitter in [0, interval/2)
    fn calm_flow(&mut self, events: &mut Vec<Event>) {
        let p = self.cfg.scenario.clone();
        let mut resting: Vec<OrderId> = Vec::new();

        let mut t = p.order_interval_ns;
        while t < self.cfg.duration {
            let jitter = self.jitter_below(p.order_interval_ns / 2);
            let event_time = t + jitter;
            if event_time >= self.cfg.duration {
                break;
            }
            self.emit_action(
                events,
                &mut resting,
                event_time,
                p.cancel_rate,
                p.market_order_ratio,
                1.0,
            );
            t += p.order_interval_ns;
        }
    }

    /// Thin flow: tighter jitter [0, interval/4), market sweeps are doubled
    /// in size so they move the price.
    fn thin_flow(&mut self, events: &mut Vec<Event>) {
        let p = self.cfg.scenario.clone();
        let mut resting: Vec<OrderId> = Vec::new();

        let mut t = p.order_interval_ns;
        while t < self.cfg.duration {
            let jitter = self.jitter_below(p.order_interval_ns / 4);
            let event_time = t + jitter;
            if event_time >= self.cfg.duration {
                break;
            }
            self.emit_action(
                events,
                &mut resting,
                event_time,
                p.cancel_rate,
                p.market_order_ratio,
                2.0,
            );
            t += p.order_interval_ns;
        }
    }

    /// Spike flow: periodic burst windows compress the stride and scale the
    /// cancel/market rates (capped) and market order sizes.
    fn spike_flow(&mut self, events: &mut Vec<Event>) {
        let p = self.cfg.scenario.clone();
        let mut resting: Vec<OrderId> = Vec::new();

        let mut bursts: Vec<(i64, i64)> = Vec::new();
        if p.burst_interval_ns > 0 && p.burst_window_ns > 0 {
            let mut t = p.burst_interval_ns;
            while t < self.cfg.duration {
                bursts.push((t, t + p.burst_window_ns));
                t += p.burst_interval_ns;
            }
        }
        let in_burst = |t: i64| bursts.iter().any(|&(start, end)| t >= start && t < end);

        let mut t = p.order_interval_ns;
        while t < self.cfg.duration {
            let is_burst = in_burst(t);

            let mut interval = p.order_interval_ns;
            if is_burst && p.burst_rate > 0.0 {
                interval = ((p.order_interval_ns as f64 / p.burst_rate) as i64).max(1);
            }

            // jitter in [0, interval/2]
            let jitter = self.jitter_below(interval / 2 + 1);
            let event_time = t + jitter;
            if event_time >= self.cfg.duration {
                break;
            }

            let mut cancel_rate = p.cancel_rate;
            let mut market_ratio = p.market_order_ratio;
            let mut size_mul = 1.0;
            if is_burst {
                cancel_rate *= p.burst_cancel_mul;
                market_ratio *= p.burst_market_mul;
                if p.burst_cancel_cap > 0.0 && cancel_rate > p.burst_cancel_cap {
                    cancel_rate = p.burst_cancel_cap;
                }
                if p.burst_market_cap > 0.0 && market_ratio > p.burst_market_cap {
                    market_ratio = p.burst_market_cap;
                }
                if p.burst_size_mul > 0.0 {
                    size_mul = p.burst_size_mul;
                }
            }

            self.emit_action(
                events,
                &mut resting,
                event_time,
                cancel_rate,
                market_ratio,
                size_mul,
            );

            t += interval;
        }
    }
}
