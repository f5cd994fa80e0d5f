//! Trading agents that react to signals with configurable latency.

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::latency::LatencyModel;
use crate::time::ms_to_ns;
use crate::types::{Bbo, Order, OrderId, Qty, Side, Signal};

/// Shadow record of an order the agent considers live (scheduled or
/// resting). The matcher owns the real order; this copy is kept in sync
/// from fill and cancel notifications.
#[derive(Debug, Clone)]
pub struct ActiveOrder {
    pub side: Side,
    pub decision_time: i64,
    pub remaining: Qty,
}

/// Post-at-best / cancel-stale / cross-on-strong-signal parameters
#[derive(Debug, Clone)]
pub struct Strategy {
    /// how often the runner re-invokes the strategy with a neutral signal
    pub re_quote_interval_ns: i64,
    /// cancel unfilled orders after this age
    pub cancel_timeout_ns: i64,
    /// cross with a market order when |signal| exceeds this
    pub cross_threshold: f64,
    /// quantity to post or cross with
    pub target_qty: Qty,
}

impl Default for Strategy {
    fn default() -> Self {
        Self {
            re_quote_interval_ns: ms_to_ns(100),
            cancel_timeout_ns: ms_to_ns(500),
            cross_threshold: 1.0,
            target_qty: 5,
        }
    }
}

/// A trader with latency, a strategy, and an id allocator.
pub struct Agent {
    pub id: String,
    pub latency: LatencyModel,
    pub strategy: Strategy,

    #[allow(dead_code)]
    rng: StdRng,
    next_id: OrderId,

    /// Orders this agent believes are live, keyed by id.
    /// BTreeMap so every iteration is in ascending id order.
    pub active_orders: BTreeMap<OrderId, ActiveOrder>,
}

impl Agent {
    /// Create an agent. `id_base` partitions the order-id space per agent.
    pub fn new(id: &str, latency: LatencyModel, seed: u64, id_base: OrderId) -> Self {
        Self {
            id: id.to_string(),
            latency,
            strategy: Strategy::default(),
            rng: StdRng::seed_from_u64(seed),
            next_id: id_base,
            active_orders: BTreeMap::new(),
        }
    }

    fn allocate_id(&mut self) -> OrderId {
        self.next_id += 1;
        self.next_id
    }

    /// React to a signal. Returned orders carry `decision_time`; the caller
    /// applies latency to compute the arrival time. A one-sided book yields
    /// no orders.
    pub fn on_signal(&mut self, signal: &Signal, bbo: &Bbo, current_time: i64) -> Vec<Order> {
        if bbo.bid_price == 0 || bbo.ask_price == 0 {
            return Vec::new();
        }
        self.decide(signal, bbo, current_time)
    }

    fn decide(&mut self, signal: &Signal, bbo: &Bbo, current_time: i64) -> Vec<Order> {
        let mut orders = Vec::new();

        // 1. Cancel stale resting orders, oldest id first.
        let stale: Vec<(OrderId, Side)> = self
            .active_orders
            .iter()
            .filter(|(_, active)| current_time - active.decision_time > self.strategy.cancel_timeout_ns)
            .map(|(&id, active)| (id, active.side))
            .collect();
        for (target, side) in stale {
            let mut cancel = Order::cancel(self.allocate_id(), &self.id, target);
            cancel.side = side;
            cancel.decision_time = current_time;
            orders.push(cancel);
        }

        // 2. Strong signal: cross immediately with a market order.
        if signal.value.abs() > self.strategy.cross_threshold {
            let side = if signal.value > 0.0 {
                Side::Buy
            } else {
                Side::Sell
            };
            let mut market = Order::market(self.allocate_id(), &self.id, side, self.strategy.target_qty);
            market.decision_time = current_time;
            orders.push(market);
            return orders;
        }

        // 3. Otherwise post at the best price on any side we are not quoting.
        let has_bid = self.active_orders.values().any(|a| a.side == Side::Buy);
        let has_ask = self.active_orders.values().any(|a| a.side == Side::Sell);

        if !has_bid && bbo.bid_price > 0 {
            let mut bid = Order::limit(
                self.allocate_id(),
                &self.id,
                Side::Buy,
                bbo.bid_price,
                self.strategy.target_qty,
            );
            bid.decision_time = current_time;
            orders.push(bid);
        }

        if !has_ask && bbo.ask_price > 0 {
            let mut ask = Order::limit(
                self.allocate_id(),
                &self.id,
                Side::Sell,
                bbo.ask_price,
                self.strategy.target_qty,
            );
            ask.decision_time = current_time;
            orders.push(ask);
        }

        orders
    }

    /// Track a newly accepted limit order of this agent. Called before any
    /// fill notifications for the same dispatch so aggressive fills find
    /// the record in place.
    pub fn register(&mut self, order: &Order) {
        self.active_orders.insert(
            order.id,
            ActiveOrder {
                side: order.side,
                decision_time: order.decision_time,
                remaining: order.qty,
            },
        );
    }

    /// Notification that one of this agent's orders traded `qty`.
    /// Fully filled orders leave the active set.
    pub fn on_fill(&mut self, order_id: OrderId, qty: Qty) {
        if let Some(active) = self.active_orders.get_mut(&order_id) {
            active.remaining -= qty;
            if active.remaining <= 0 {
                self.active_orders.remove(&order_id);
            }
        }
    }

    /// Acknowledgment that a cancel for `order_id` was processed.
    pub fn on_cancel_ack(&mut self, order_id: OrderId) {
        self.active_orders.remove(&order_id);
    }
}
