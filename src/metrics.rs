//! Per-trader execution-quality metrics folded from the event log.
//!
//! A single forward pass over events in log order feeds the accumulators;
//! all derived statistics are computed at the end. Background flow is
//! excluded from per-trader numbers but still contributes to the BBO and
//! trade-price histories.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::SimResult;
use crate::eventlog::LogReader;
use crate::generator::BACKGROUND_TRADER;
use crate::types::{price_utils, Bbo, Event, EventType, OrderId, OrderType, Price, Qty, Side};

/// Window after a fill over which adverse selection is measured
const ADVERSE_SELECTION_WINDOW_NS: i64 = 100_000_000;

/// Computed metrics for a single trader
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TraderMetrics {
    pub trader_id: String,

    // Order counts
    pub orders_sent: usize,
    pub limit_orders: usize,
    pub market_orders: usize,
    pub cancels_sent: usize,

    // Fill metrics
    pub total_fills: usize,
    pub total_qty_filled: Qty,
    /// filled executable orders / executable orders
    pub fill_rate: f64,

    /// cancel targets that never received a fill
    pub canceled_before_fill: usize,

    // Price metrics
    pub avg_exec_price: f64,
    /// vs mid at decision time; positive = worse
    pub avg_slippage: f64,
    pub slippage_bps: f64,

    // Time metrics. Values are milliseconds; the sorted series is retained
    // for percentile computation.
    pub avg_time_to_fill_ns: f64,
    pub time_to_fill_dist: Vec<f64>,

    // Queue position metrics
    pub avg_queue_pos_place: f64,
    pub avg_queue_pos_fill: f64,

    // Adverse selection
    pub avg_price_move_after_fill: f64,
    pub adverse_selection_bps: f64,

    /// Raw per-fill slippage values for plotting
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub slippage_values: Vec<f64>,
}

#[derive(Debug, Clone, Copy)]
struct OrderInfo {
    decision_time: i64,
    #[allow(dead_code)]
    arrival_time: i64,
    mid_at_decision: Price,
    queue_pos_place: usize,
}

#[derive(Debug, Clone, Copy)]
struct FillInfo {
    trade_price: Price,
    fill_qty: Qty,
    decision_time: i64,
    fill_time: i64,
    mid_at_decision: Price,
    queue_pos_fill: usize,
    side: Side,
}

#[derive(Debug, Default)]
struct TraderAccum {
    orders_sent: usize,
    limit_orders: usize,
    market_orders: usize,
    cancels_sent: usize,

    /// placement metadata per executable order id
    order_info: BTreeMap<OrderId, OrderInfo>,
    /// order ids that received at least one fill
    filled_orders: BTreeSet<OrderId>,
    /// targets of this trader's cancels
    cancel_targets: Vec<OrderId>,

    fills: Vec<FillInfo>,
}

/// Accumulates metrics from an event stream
#[derive(Debug, Default)]
pub struct Collector {
    traders: BTreeMap<String, TraderAccum>,
    bbo_history: Vec<(i64, Bbo)>,
    trade_history: Vec<(i64, Price)>,
}

impl Collector {
    pub fn new() -> Self {
        Self::default()
    }

    fn accum(&mut self, trader_id: &str) -> &mut TraderAccum {
        self.traders.entry(trader_id.to_string()).or_default()
    }

    /// Ingest a single event
    pub fn process_event(&mut self, event: &Event) {
        match event.kind {
            EventType::OrderAccepted => {
                if event.order.is_some() {
                    self.process_order(event);
                }
            }
            EventType::TradeExecuted => {
                if event.trade.is_some() {
                    self.process_trade(event);
                }
            }
            EventType::OrderCanceled => {
                if event.order.is_some() {
                    self.process_cancel(event);
                }
            }
            EventType::BboUpdate => {
                if let Some(bbo) = event.bbo {
                    self.bbo_history.push((event.timestamp, bbo));
                }
            }
            _ => {}
        }
    }

    fn process_order(&mut self, event: &Event) {
        let order = event.order.as_ref().expect("order payload present");
        if order.trader_id == BACKGROUND_TRADER {
            return;
        }

        let mid_at_decision = self.mid_at(order.decision_time);
        let a = self.accum(&order.trader_id);
        a.orders_sent += 1;

        match order.kind {
            OrderType::Limit => {
                a.limit_orders += 1;
                a.order_info.insert(
                    order.id,
                    OrderInfo {
                        decision_time: order.decision_time,
                        arrival_time: order.arrival_time,
                        mid_at_decision,
                        queue_pos_place: order.queue_pos,
                    },
                );
            }
            OrderType::Market => {
                a.market_orders += 1;
                a.order_info.insert(
                    order.id,
                    OrderInfo {
                        decision_time: order.decision_time,
                        arrival_time: order.arrival_time,
                        mid_at_decision,
                        queue_pos_place: 0,
                    },
                );
            }
            OrderType::Cancel => {
                a.cancels_sent += 1;
            }
        }
    }

    fn process_cancel(&mut self, event: &Event) {
        let order = event.order.as_ref().expect("order payload present");
        if order.trader_id == BACKGROUND_TRADER {
            return;
        }

        if order.cancel_id > 0 {
            let a = self.accum(&order.trader_id);
            a.cancel_targets.push(order.cancel_id);
        }
    }

    fn process_trade(&mut self, event: &Event) {
        let trade = event.trade.clone().expect("trade payload present");
        self.trade_history.push((trade.timestamp, trade.price));

        self.record_fill(
            &trade.buy_trader,
            trade.buy_order_id,
            &trade,
            event.timestamp,
            Side::Buy,
        );
        self.record_fill(
            &trade.sell_trader,
            trade.sell_order_id,
            &trade,
            event.timestamp,
            Side::Sell,
        );
    }

    fn record_fill(
        &mut self,
        trader_id: &str,
        order_id: OrderId,
        trade: &crate::types::Trade,
        fill_time: i64,
        side: Side,
    ) {
        if trader_id == BACKGROUND_TRADER {
            return;
        }

        let a = self.accum(trader_id);
        a.filled_orders.insert(order_id);

        let info = a.order_info.get(&order_id).copied();
        let (decision_time, mid_at_decision) = match info {
            Some(info) => (info.decision_time, info.mid_at_decision),
            None => (0, 0),
        };

        // The resting queue position only applies to the passive side.
        let queue_pos_fill = if trade.passive_order_id > 0 && order_id == trade.passive_order_id {
            trade.resting_queue_pos
        } else {
            0
        };

        a.fills.push(FillInfo {
            trade_price: trade.price,
            fill_qty: trade.qty,
            decision_time,
            fill_time,
            mid_at_decision,
            queue_pos_fill,
            side,
        });
    }

    /// Mid price at time `t`: the latest BBO snapshot with timestamp <= t.
    /// An empty history yields 0; a history starting after `t` yields its
    /// first snapshot.
    fn mid_at(&self, t: i64) -> Price {
        if self.bbo_history.is_empty() {
            return 0;
        }
        let idx = self.bbo_history.partition_point(|&(ts, _)| ts <= t);
        if idx == 0 {
            return self.bbo_history[0].1.mid_price;
        }
        self.bbo_history[idx - 1].1.mid_price
    }

    /// Mid price a fixed window after a fill
    fn mid_after(&self, fill_time: i64, window_ns: i64) -> Price {
        self.mid_at(fill_time + window_ns)
    }

    /// Time-ordered trade-price history observed so far
    pub fn trade_prices(&self) -> &[(i64, Price)] {
        &self.trade_history
    }

    /// Calculate final metrics for all tracked traders
    pub fn compute(&self) -> BTreeMap<String, TraderMetrics> {
        let mut result = BTreeMap::new();

        for (trader_id, a) in &self.traders {
            let mut m = TraderMetrics {
                trader_id: trader_id.clone(),
                orders_sent: a.orders_sent,
                limit_orders: a.limit_orders,
                market_orders: a.market_orders,
                cancels_sent: a.cancels_sent,
                total_fills: a.fills.len(),
                ..TraderMetrics::default()
            };

            // Fill rate is order-level: executable orders with >=1 fill
            // over all executable orders.
            let executable = a.order_info.len();
            if executable > 0 {
                let filled = a
                    .order_info
                    .keys()
                    .filter(|id| a.filled_orders.contains(id))
                    .count();
                m.fill_rate = filled as f64 / executable as f64;
            }

            let mut total_price = 0.0;
            let mut total_slippage = 0.0;
            let mut total_time_to_fill = 0.0;
            let mut total_qty: Qty = 0;

            let mut total_queue_pos_place = 0.0;
            let mut queue_pos_place_count = 0;
            for info in a.order_info.values() {
                if info.queue_pos_place > 0 {
                    total_queue_pos_place += info.queue_pos_place as f64;
                    queue_pos_place_count += 1;
                }
            }

            let mut total_queue_pos_fill = 0.0;
            let mut queue_pos_fill_count = 0;

            for fill in &a.fills {
                total_qty += fill.fill_qty;
                total_price += price_utils::to_f64(fill.trade_price) * fill.fill_qty as f64;

                // Signed slippage vs mid at decision time.
                if fill.mid_at_decision > 0 {
                    let slippage = match fill.side {
                        Side::Buy => {
                            price_utils::to_f64(fill.trade_price)
                                - price_utils::to_f64(fill.mid_at_decision)
                        }
                        Side::Sell => {
                            price_utils::to_f64(fill.mid_at_decision)
                                - price_utils::to_f64(fill.trade_price)
                        }
                    };
                    total_slippage += slippage * fill.fill_qty as f64;
                    m.slippage_values.push(slippage);
                }

                // Time to fill, in milliseconds.
                if fill.decision_time > 0 {
                    let ttf = (fill.fill_time - fill.decision_time) as f64 / 1e6;
                    total_time_to_fill += ttf;
                    m.time_to_fill_dist.push(ttf);
                }

                // Price move against the position a fixed window after the fill.
                let mid_future = self.mid_after(fill.fill_time, ADVERSE_SELECTION_WINDOW_NS);
                if mid_future > 0 && fill.trade_price > 0 {
                    let signed_move = match fill.side {
                        Side::Buy => {
                            price_utils::to_f64(mid_future) - price_utils::to_f64(fill.trade_price)
                        }
                        Side::Sell => {
                            price_utils::to_f64(fill.trade_price) - price_utils::to_f64(mid_future)
                        }
                    };
                    m.avg_price_move_after_fill += signed_move;
                }

                if fill.queue_pos_fill > 0 {
                    total_queue_pos_fill += fill.queue_pos_fill as f64;
                    queue_pos_fill_count += 1;
                }
            }

            m.total_qty_filled = total_qty;

            if total_qty > 0 {
                m.avg_exec_price = total_price / total_qty as f64;
                m.avg_slippage = total_slippage / total_qty as f64;
                let mid_at_t0 = price_utils::to_f64(self.mid_at(0));
                if mid_at_t0 > 0.0 {
                    m.slippage_bps = m.avg_slippage / mid_at_t0 * 10_000.0;
                }
            }

            if !a.fills.is_empty() {
                m.avg_time_to_fill_ns = total_time_to_fill / a.fills.len() as f64;
                m.avg_price_move_after_fill /= a.fills.len() as f64;

                let mid_at_t0 = price_utils::to_f64(self.mid_at(0));
                if mid_at_t0 > 0.0 {
                    m.adverse_selection_bps = m.avg_price_move_after_fill / mid_at_t0 * 10_000.0;
                }
            }

            if queue_pos_place_count > 0 {
                m.avg_queue_pos_place = total_queue_pos_place / queue_pos_place_count as f64;
            }
            if queue_pos_fill_count > 0 {
                m.avg_queue_pos_fill = total_queue_pos_fill / queue_pos_fill_count as f64;
            }

            m.canceled_before_fill = a
                .cancel_targets
                .iter()
                .filter(|id| !a.filled_orders.contains(id))
                .count();

            // Sorted series for percentile lookups.
            m.time_to_fill_dist
                .sort_by(|x, y| x.partial_cmp(y).expect("finite time-to-fill"));

            result.insert(trader_id.clone(), m);
        }

        result
    }
}

/// Read an event log and compute metrics
pub fn compute_from_log<P: AsRef<Path>>(path: P) -> SimResult<BTreeMap<String, TraderMetrics>> {
    let mut reader = LogReader::open(path)?;
    let mut collector = Collector::new();
    while let Some(event) = reader.next_event()? {
        collector.process_event(&event);
    }
    Ok(collector.compute())
}

/// Compute metrics directly from an in-memory event stream
pub fn compute_from_events(events: &[Event]) -> BTreeMap<String, TraderMetrics> {
    let mut collector = Collector::new();
    for event in events {
        collector.process_event(event);
    }
    collector.compute()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Order, Trade};

    fn bbo_event(ts: i64, bid: Price, ask: Price) -> Event {
        Event::bbo_update(
            ts,
            Bbo {
                bid_price: bid,
                bid_qty: 10,
                ask_price: ask,
                ask_qty: 10,
                mid_price: (bid + ask) / 2,
            },
        )
    }

    fn accepted_limit(ts: i64, id: OrderId, trader: &str, side: Side, price: Price) -> Event {
        let mut order = Order::limit(id, trader, side, price, 5);
        order.remaining_qty = 5;
        order.decision_time = ts - 1;
        order.arrival_time = ts;
        order.queue_pos = 1;
        Event::order_accepted(ts, order)
    }

    fn trade_event(ts: i64, buy_id: OrderId, sell_id: OrderId, buyer: &str, seller: &str) -> Event {
        Event::trade_executed(
            ts,
            Trade {
                id: 1,
                buy_order_id: buy_id,
                sell_order_id: sell_id,
                buy_trader: buyer.to_string(),
                sell_trader: seller.to_string(),
                price: 1_000_000,
                qty: 5,
                timestamp: ts,
                passive_order_id: sell_id,
                aggressor_order_id: buy_id,
                resting_queue_pos: 1,
            },
        )
    }

    #[test]
    fn test_background_is_excluded() {
        let events = vec![
            bbo_event(0, 990_000, 1_010_000),
            accepted_limit(10, 1, BACKGROUND_TRADER, Side::Buy, 990_000),
            accepted_limit(10, 2, "fast", Side::Buy, 990_000),
        ];
        let metrics = compute_from_events(&events);

        assert!(!metrics.contains_key(BACKGROUND_TRADER));
        assert_eq!(metrics["fast"].orders_sent, 1);
        assert_eq!(metrics["fast"].limit_orders, 1);
    }

    #[test]
    fn test_fill_rate_is_order_level() {
        let mut events = vec![bbo_event(0, 990_000, 1_010_000)];
        // two executable orders, one of which trades twice
        events.push(accepted_limit(10, 1, "fast", Side::Sell, 1_000_000));
        events.push(accepted_limit(10, 2, "fast", Side::Sell, 1_000_000));
        events.push(trade_event(20, 100, 1, BACKGROUND_TRADER, "fast"));
        events.push(trade_event(30, 101, 1, BACKGROUND_TRADER, "fast"));

        let metrics = compute_from_events(&events);
        let m = &metrics["fast"];
        assert_eq!(m.total_fills, 2);
        assert!((m.fill_rate - 0.5).abs() < 1e-12);
        assert!(m.fill_rate >= 0.0 && m.fill_rate <= 1.0);
    }

    #[test]
    fn test_slippage_sign_convention() {
        // mid at decision is 1_000_000; buy executes at 1_000_000 exactly,
        // so slippage should be 0; a sell at the same price is also 0.
        // Then shift the mid and check the signs.
        let events = vec![
            bbo_event(0, 995_000, 1_005_000), // mid 1_000_000
            accepted_limit(10, 1, "fast", Side::Buy, 995_000),
            trade_event(20, 1, 200, "fast", BACKGROUND_TRADER),
        ];
        let metrics = compute_from_events(&events);
        let m = &metrics["fast"];
        // buy at 100.0 with decision mid 100.0 -> zero slippage
        assert!(m.avg_slippage.abs() < 1e-12);

        // buyer pays above the decision mid -> positive (worse)
        let events = vec![
            bbo_event(0, 985_000, 995_000), // mid 990_000
            accepted_limit(10, 1, "fast", Side::Buy, 995_000),
            trade_event(20, 1, 200, "fast", BACKGROUND_TRADER), // exec at 1_000_000
        ];
        let metrics = compute_from_events(&events);
        assert!(metrics["fast"].avg_slippage > 0.0);

        // seller receives above the decision mid -> negative (better)
        let events = vec![
            bbo_event(0, 985_000, 995_000),
            accepted_limit(10, 1, "fast", Side::Sell, 995_000),
            trade_event(20, 200, 1, BACKGROUND_TRADER, "fast"),
        ];
        let metrics = compute_from_events(&events);
        assert!(metrics["fast"].avg_slippage < 0.0);
    }

    #[test]
    fn test_mid_lookup_uses_latest_at_or_before() {
        let mut collector = Collector::new();
        collector.process_event(&bbo_event(10, 990_000, 1_010_000));
        collector.process_event(&bbo_event(20, 1_000_000, 1_020_000));

        assert_eq!(collector.mid_at(5), 1_000_000); // before history: first snapshot
        assert_eq!(collector.mid_at(10), 1_000_000);
        assert_eq!(collector.mid_at(15), 1_000_000);
        assert_eq!(collector.mid_at(20), 1_010_000);
        assert_eq!(collector.mid_at(100), 1_010_000);
    }

    #[test]
    fn test_empty_history_mid_is_zero() {
        let collector = Collector::new();
        assert_eq!(collector.mid_at(100), 0);
    }

    #[test]
    fn test_canceled_before_fill() {
        let mut cancel_a = Order::cancel(10, "fast", 1);
        cancel_a.decision_time = 40;
        let mut cancel_b = Order::cancel(11, "fast", 2);
        cancel_b.decision_time = 40;

        let events = vec![
            bbo_event(0, 990_000, 1_010_000),
            accepted_limit(10, 1, "fast", Side::Sell, 1_000_000),
            accepted_limit(10, 2, "fast", Side::Sell, 1_000_000),
            // order 1 trades, order 2 never does
            trade_event(20, 100, 1, BACKGROUND_TRADER, "fast"),
            Event::order_canceled(50, cancel_a),
            Event::order_canceled(50, cancel_b),
        ];
        let metrics = compute_from_events(&events);
        assert_eq!(metrics["fast"].canceled_before_fill, 1);
    }

    #[test]
    fn test_queue_pos_fill_only_for_passive_side() {
        let events = vec![
            bbo_event(0, 990_000, 1_010_000),
            accepted_limit(10, 1, "fast", Side::Sell, 1_000_000),
            accepted_limit(10, 2, "slow", Side::Buy, 1_000_000),
            // order 1 is passive (sell side), order 2 is the aggressor
            trade_event(20, 2, 1, "slow", "fast"),
        ];
        let metrics = compute_from_events(&events);
        assert!((metrics["fast"].avg_queue_pos_fill - 1.0).abs() < 1e-12);
        assert_eq!(metrics["slow"].avg_queue_pos_fill, 0.0);
    }

    #[test]
    fn test_time_to_fill_is_sorted_and_in_ms() {
        let events = vec![
            bbo_event(0, 990_000, 1_010_000),
            accepted_limit(1_000_000, 1, "fast", Side::Sell, 1_000_000),
            trade_event(3_000_000, 100, 1, BACKGROUND_TRADER, "fast"),
            trade_event(2_000_000, 100, 1, BACKGROUND_TRADER, "fast"),
        ];
        let metrics = compute_from_events(&events);
        let dist = &metrics["fast"].time_to_fill_dist;
        assert_eq!(dist.len(), 2);
        assert!(dist[0] <= dist[1]);
        // decision at t=999_999 ns, fills at 2ms and 3ms
        assert!((dist[0] - 1.000001).abs() < 1e-6);
    }

    #[test]
    fn test_metrics_equal_after_log_round_trip() {
        let events = vec![
            bbo_event(0, 990_000, 1_010_000),
            accepted_limit(10, 1, "fast", Side::Sell, 1_000_000),
            accepted_limit(10, 2, "slow", Side::Buy, 990_000),
            trade_event(20, 100, 1, BACKGROUND_TRADER, "fast"),
            bbo_event(20, 990_000, 1_010_000),
        ];

        let direct = compute_from_events(&events);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let mut writer = crate::eventlog::LogWriter::create(&path).unwrap();
        for event in &events {
            writer.append(&mut event.clone()).unwrap();
        }
        writer.finish().unwrap();

        let from_log = compute_from_log(&path).unwrap();
        assert_eq!(direct, from_log);
    }
}
