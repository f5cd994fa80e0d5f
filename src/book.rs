//! Single-instrument limit order book with price-time priority matching.

use std::collections::{HashMap, VecDeque};

use crate::types::{Bbo, Order, OrderId, OrderType, Price, Qty, Side, Trade};

/// All resting orders at a single price, in FIFO order
#[derive(Debug, Clone)]
pub struct PriceLevel {
    pub price: Price,
    pub orders: VecDeque<Order>,
}

impl PriceLevel {
    fn with_order(order: Order) -> Self {
        let price = order.price;
        let mut orders = VecDeque::new();
        orders.push_back(order);
        Self { price, orders }
    }

    /// Sum of remaining quantities at this level
    pub fn total_qty(&self) -> Qty {
        self.orders.iter().map(|o| o.remaining_qty).sum()
    }
}

/// A single-instrument limit order book.
///
/// The book owns every resting order for its lifetime on the book; callers
/// receive trades and BBO snapshots, never references into the book.
#[derive(Debug, Default)]
pub struct Book {
    /// Bid levels sorted descending by price (best bid first)
    bids: Vec<PriceLevel>,
    /// Ask levels sorted ascending by price (best ask first)
    asks: Vec<PriceLevel>,

    /// Maps a resting order id to its (side, price) for cancel lookup
    order_index: HashMap<OrderId, (Side, Price)>,

    next_trade_id: u64,
}

impl Book {
    /// Create an empty order book
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle a limit, market, or cancel order.
    /// Returns any trades generated and the post-state BBO.
    pub fn process(&mut self, order: &mut Order, timestamp: i64) -> (Vec<Trade>, Bbo) {
        match order.kind {
            OrderType::Limit => self.process_limit(order, timestamp),
            OrderType::Market => self.process_market(order, timestamp),
            OrderType::Cancel => self.process_cancel(order),
        }
    }

    /// Insert a limit order, matching aggressively first
    fn process_limit(&mut self, order: &mut Order, timestamp: i64) -> (Vec<Trade>, Bbo) {
        order.remaining_qty = order.qty;
        let trades = self.match_incoming(order, timestamp);

        // If not fully filled, rest on the book
        if order.remaining_qty > 0 {
            self.insert(order.clone());
        }

        (trades, self.bbo())
    }

    /// Sweep the book. Market orders never rest; any unfilled remainder is dropped
    fn process_market(&mut self, order: &mut Order, timestamp: i64) -> (Vec<Trade>, Bbo) {
        order.remaining_qty = order.qty;
        let trades = self.match_incoming(order, timestamp);
        (trades, self.bbo())
    }

    /// Remove the remaining quantity of the target order.
    /// Unknown or already-filled targets are a no-op; a fresh BBO is still returned.
    fn process_cancel(&mut self, cancel: &Order) -> (Vec<Trade>, Bbo) {
        if let Some(&(side, price)) = self.order_index.get(&cancel.cancel_id) {
            self.remove_resting(cancel.cancel_id, side, price);
            self.order_index.remove(&cancel.cancel_id);
        }
        (Vec::new(), self.bbo())
    }

    /// Fill the incoming order against the opposite side, best level outward,
    /// FIFO within each level.
    fn match_incoming(&mut self, incoming: &mut Order, timestamp: i64) -> Vec<Trade> {
        let mut trades = Vec::new();

        loop {
            let levels = match incoming.side {
                Side::Buy => &mut self.asks,
                Side::Sell => &mut self.bids,
            };
            if incoming.remaining_qty <= 0 || levels.is_empty() {
                break;
            }

            let level_price = levels[0].price;

            // Price check for limit orders
            if incoming.kind == OrderType::Limit {
                match incoming.side {
                    Side::Buy if incoming.price < level_price => break,
                    Side::Sell if incoming.price > level_price => break,
                    _ => {}
                }
            }

            let level = &mut levels[0];
            let mut idx = 0;
            while idx < level.orders.len() && incoming.remaining_qty > 0 {
                let resting = &mut level.orders[idx];
                let fill_qty = incoming.remaining_qty.min(resting.remaining_qty);

                incoming.remaining_qty -= fill_qty;
                resting.remaining_qty -= fill_qty;

                self.next_trade_id += 1;
                let mut trade = Trade {
                    id: self.next_trade_id,
                    buy_order_id: 0,
                    sell_order_id: 0,
                    buy_trader: String::new(),
                    sell_trader: String::new(),
                    // trade at the resting order's price
                    price: resting.price,
                    qty: fill_qty,
                    timestamp,
                    passive_order_id: resting.id,
                    aggressor_order_id: incoming.id,
                    // 1-based position in the FIFO queue at the moment of fill
                    resting_queue_pos: idx + 1,
                };
                if incoming.side == Side::Buy {
                    trade.buy_order_id = incoming.id;
                    trade.sell_order_id = resting.id;
                    trade.buy_trader = incoming.trader_id.clone();
                    trade.sell_trader = resting.trader_id.clone();
                } else {
                    trade.sell_order_id = incoming.id;
                    trade.buy_order_id = resting.id;
                    trade.sell_trader = incoming.trader_id.clone();
                    trade.buy_trader = resting.trader_id.clone();
                }

                if resting.remaining_qty <= 0 {
                    let filled_id = resting.id;
                    level.orders.remove(idx);
                    self.order_index.remove(&filled_id);
                } else {
                    idx += 1;
                }
                trades.push(trade);
            }

            // Remove empty levels
            if level.orders.is_empty() {
                levels.remove(0);
            }
        }

        trades
    }

    /// Place a resting order into the book at the appropriate level
    fn insert(&mut self, order: Order) {
        self.order_index.insert(order.id, (order.side, order.price));

        match order.side {
            Side::Buy => {
                // bids descending
                match self.bids.binary_search_by(|l| order.price.cmp(&l.price)) {
                    Ok(idx) => self.bids[idx].orders.push_back(order),
                    Err(idx) => self.bids.insert(idx, PriceLevel::with_order(order)),
                }
            }
            Side::Sell => {
                // asks ascending
                match self.asks.binary_search_by(|l| l.price.cmp(&order.price)) {
                    Ok(idx) => self.asks[idx].orders.push_back(order),
                    Err(idx) => self.asks.insert(idx, PriceLevel::with_order(order)),
                }
            }
        }
    }

    /// Remove a resting order from its price level, dropping the level if it empties
    fn remove_resting(&mut self, order_id: OrderId, side: Side, price: Price) {
        let levels = match side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        };

        let found = match side {
            Side::Buy => levels.binary_search_by(|l| price.cmp(&l.price)),
            Side::Sell => levels.binary_search_by(|l| l.price.cmp(&price)),
        };

        if let Ok(level_idx) = found {
            let level = &mut levels[level_idx];
            if let Some(pos) = level.orders.iter().position(|o| o.id == order_id) {
                level.orders.remove(pos);
                if level.orders.is_empty() {
                    levels.remove(level_idx);
                }
            }
        }
    }

    /// Current best bid and offer
    pub fn bbo(&self) -> Bbo {
        let mut bbo = Bbo::default();

        if let Some(best) = self.bids.first() {
            bbo.bid_price = best.price;
            bbo.bid_qty = best.total_qty();
        }
        if let Some(best) = self.asks.first() {
            bbo.ask_price = best.price;
            bbo.ask_qty = best.total_qty();
        }
        if bbo.bid_price > 0 && bbo.ask_price > 0 {
            bbo.mid_price = (bbo.bid_price + bbo.ask_price) / 2;
        }

        bbo
    }

    /// 1-based position of a resting order at its price level, 0 if absent
    pub fn queue_position(&self, order_id: OrderId) -> usize {
        let Some(&(side, price)) = self.order_index.get(&order_id) else {
            return 0;
        };

        let levels = match side {
            Side::Buy => &self.bids,
            Side::Sell => &self.asks,
        };

        for level in levels {
            if level.price != price {
                continue;
            }
            if let Some(pos) = level.orders.iter().position(|o| o.id == order_id) {
                return pos + 1;
            }
        }
        0
    }

    /// Number of price levels on each side
    pub fn depth(&self) -> (usize, usize) {
        (self.bids.len(), self.asks.len())
    }

    /// Total resting volume on each side
    pub fn total_volume(&self) -> (Qty, Qty) {
        let bid_vol = self.bids.iter().map(|l| l.total_qty()).sum();
        let ask_vol = self.asks.iter().map(|l| l.total_qty()).sum();
        (bid_vol, ask_vol)
    }

    /// Check all book invariants. Panics on violation
    pub fn assert_invariants(&self) {
        // 1. Bids sorted strictly descending
        for i in 1..self.bids.len() {
            assert!(
                self.bids[i].price < self.bids[i - 1].price,
                "bid levels not sorted descending: {} >= {} at index {}",
                self.bids[i].price,
                self.bids[i - 1].price,
                i
            );
        }

        // 2. Asks sorted strictly ascending
        for i in 1..self.asks.len() {
            assert!(
                self.asks[i].price > self.asks[i - 1].price,
                "ask levels not sorted ascending: {} <= {} at index {}",
                self.asks[i].price,
                self.asks[i - 1].price,
                i
            );
        }

        // 3. No crossed book
        if let (Some(bid), Some(ask)) = (self.bids.first(), self.asks.first()) {
            assert!(
                bid.price < ask.price,
                "crossed book: best bid {} >= best ask {}",
                bid.price,
                ask.price
            );
        }

        // 4. No empty levels, no non-positive remaining quantities
        let mut count = 0;
        for level in self.bids.iter().chain(self.asks.iter()) {
            assert!(
                !level.orders.is_empty(),
                "empty price level at {}",
                level.price
            );
            for order in &level.orders {
                assert!(
                    order.remaining_qty > 0,
                    "order {} on book with remaining {}",
                    order.id,
                    order.remaining_qty
                );
                // 5. Index key set matches book contents
                let indexed = self.order_index.get(&order.id);
                assert_eq!(
                    indexed,
                    Some(&(order.side, order.price)),
                    "order {} missing or mislocated in index",
                    order.id
                );
            }
            count += level.orders.len();
        }

        // 6. Index holds nothing beyond book contents
        assert_eq!(
            count,
            self.order_index.len(),
            "order index size {} != book order count {}",
            self.order_index.len(),
            count
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_limit(id: OrderId, side: Side, price: Price, qty: Qty) -> Order {
        Order::limit(id, "test", side, price, qty)
    }

    fn make_market(id: OrderId, side: Side, qty: Qty) -> Order {
        Order::market(id, "test", side, qty)
    }

    fn make_cancel(id: OrderId, target: OrderId) -> Order {
        Order::cancel(id, "test", target)
    }

    fn process(book: &mut Book, mut order: Order, ts: i64) -> (Vec<Trade>, Bbo) {
        let out = book.process(&mut order, ts);
        book.assert_invariants();
        out
    }

    #[test]
    fn test_fifo_within_price_level() {
        let mut book = Book::new();

        // Three sells at 100.0000, quantities 10/10/10, in that order.
        process(&mut book, make_limit(1, Side::Sell, 1_000_000, 10), 0);
        process(&mut book, make_limit(2, Side::Sell, 1_000_000, 10), 0);
        process(&mut book, make_limit(3, Side::Sell, 1_000_000, 10), 0);

        // Buy market 15 fills order 1 fully, order 2 partially.
        let (trades, _) = process(&mut book, make_market(100, Side::Buy, 15), 1);

        assert_eq!(trades.len(), 2);
        assert_eq!(trades[0].sell_order_id, 1);
        assert_eq!(trades[0].qty, 10);
        assert_eq!(trades[0].price, 1_000_000);
        assert_eq!(trades[1].sell_order_id, 2);
        assert_eq!(trades[1].qty, 5);
        assert_eq!(trades[1].price, 1_000_000);

        // Queue afterwards: order 2 (remaining 5) first, order 3 second.
        assert_eq!(book.queue_position(2), 1);
        assert_eq!(book.queue_position(3), 2);
        assert_eq!(book.bbo().ask_qty, 15);
    }

    #[test]
    fn test_market_order_sweeps_multiple_levels() {
        let mut book = Book::new();

        book.process(&mut make_limit(1, Side::Sell, 100, 5), 0);
        book.process(&mut make_limit(2, Side::Sell, 101, 5), 0);
        book.process(&mut make_limit(3, Side::Sell, 102, 5), 0);
        book.assert_invariants();

        let (trades, bbo) = process(&mut book, make_market(100, Side::Buy, 12), 1);

        assert_eq!(trades.len(), 3);
        assert_eq!((trades[0].price, trades[0].qty), (100, 5));
        assert_eq!((trades[1].price, trades[1].qty), (101, 5));
        assert_eq!((trades[2].price, trades[2].qty), (102, 2));

        assert_eq!(bbo.ask_price, 102);
        assert_eq!(bbo.ask_qty, 3);
    }

    #[test]
    fn test_crossed_limit_order_matches_immediately() {
        let mut book = Book::new();

        process(&mut book, make_limit(1, Side::Sell, 100, 10), 0);

        // Crossing bid at 101 trades at the resting price.
        let (trades, bbo) = process(&mut book, make_limit(2, Side::Buy, 101, 5), 1);

        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].price, 100);
        assert_eq!(trades[0].qty, 5);
        assert_eq!(bbo.ask_qty, 5);
        assert_eq!(bbo.bid_price, 0); // the buy never rested
    }

    #[test]
    fn test_cancel_removes_remaining_only() {
        let mut book = Book::new();

        process(&mut book, make_limit(1, Side::Sell, 100, 10), 0);
        let (trades, _) = process(&mut book, make_market(2, Side::Buy, 3), 1);
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].qty, 3);

        process(&mut book, make_cancel(3, 1), 2);

        assert_eq!(book.depth(), (0, 0));
    }

    #[test]
    fn test_cancel_unknown_order_is_noop() {
        let mut book = Book::new();
        process(&mut book, make_limit(1, Side::Sell, 100, 10), 0);

        let (trades, bbo) = process(&mut book, make_cancel(2, 999), 1);

        assert!(trades.is_empty());
        assert_eq!(book.depth(), (0, 1));
        assert_eq!(bbo.ask_qty, 10);
    }

    #[test]
    fn test_cancel_of_filled_order_is_noop() {
        let mut book = Book::new();
        process(&mut book, make_limit(1, Side::Sell, 100, 5), 0);
        process(&mut book, make_market(2, Side::Buy, 5), 1);

        let (trades, _) = process(&mut book, make_cancel(3, 1), 2);
        assert!(trades.is_empty());
        assert_eq!(book.depth(), (0, 0));
    }

    #[test]
    fn test_bbo_updates() {
        let mut book = Book::new();

        let bbo = book.bbo();
        assert_eq!(bbo.bid_price, 0);
        assert_eq!(bbo.ask_price, 0);
        assert_eq!(bbo.mid_price, 0);

        process(&mut book, make_limit(1, Side::Buy, 99, 10), 0);
        process(&mut book, make_limit(2, Side::Sell, 101, 10), 0);

        let bbo = book.bbo();
        assert_eq!(bbo.bid_price, 99);
        assert_eq!(bbo.ask_price, 101);
        assert_eq!(bbo.mid_price, 100);

        // Better bid improves the BBO.
        process(&mut book, make_limit(3, Side::Buy, 100, 5), 0);
        assert_eq!(book.bbo().bid_price, 100);
    }

    #[test]
    fn test_one_sided_book_has_zero_mid() {
        let mut book = Book::new();
        process(&mut book, make_limit(1, Side::Buy, 99, 10), 0);
        let bbo = book.bbo();
        assert_eq!(bbo.bid_price, 99);
        assert_eq!(bbo.mid_price, 0);
    }

    #[test]
    fn test_partial_fill_keeps_order_on_book() {
        let mut book = Book::new();

        process(&mut book, make_limit(1, Side::Sell, 100, 10), 0);
        process(&mut book, make_market(2, Side::Buy, 3), 1);

        let bbo = book.bbo();
        assert_eq!(bbo.ask_qty, 7);
        // partially filled order stays at the front of its level
        assert_eq!(book.queue_position(1), 1);
    }

    #[test]
    fn test_empty_book_market_order_no_trades() {
        let mut book = Book::new();

        let (trades, bbo) = process(&mut book, make_market(1, Side::Buy, 10), 0);

        assert!(trades.is_empty());
        assert_eq!(book.depth(), (0, 0));
        assert_eq!(bbo, Bbo::default());
    }

    #[test]
    fn test_multiple_bid_levels() {
        let mut book = Book::new();

        process(&mut book, make_limit(1, Side::Buy, 98, 10), 0);
        process(&mut book, make_limit(2, Side::Buy, 100, 5), 0);
        process(&mut book, make_limit(3, Side::Buy, 99, 8), 0);

        assert_eq!(book.bbo().bid_price, 100);

        // Sell market sweeps the best bid first.
        let (trades, _) = process(&mut book, make_market(10, Side::Sell, 7), 1);

        assert_eq!(trades.len(), 2);
        assert_eq!((trades[0].price, trades[0].qty), (100, 5));
        assert_eq!((trades[1].price, trades[1].qty), (99, 2));
    }

    #[test]
    fn test_queue_position() {
        let mut book = Book::new();

        process(&mut book, make_limit(1, Side::Buy, 100, 10), 0);
        process(&mut book, make_limit(2, Side::Buy, 100, 5), 0);
        process(&mut book, make_limit(3, Side::Buy, 100, 8), 0);

        assert_eq!(book.queue_position(1), 1);
        assert_eq!(book.queue_position(2), 2);
        assert_eq!(book.queue_position(3), 3);
        assert_eq!(book.queue_position(999), 0);
    }

    #[test]
    fn test_trade_attribution_and_queue_pos_at_fill() {
        let mut book = Book::new();

        let mut passive = Order::limit(1, "maker", Side::Sell, 100, 10);
        book.process(&mut passive, 0);
        let mut aggressor = Order::market(2, "taker", Side::Buy, 4);
        let (trades, _) = book.process(&mut aggressor, 1);
        book.assert_invariants();

        assert_eq!(trades.len(), 1);
        let t = &trades[0];
        assert_eq!(t.passive_order_id, 1);
        assert_eq!(t.aggressor_order_id, 2);
        assert_eq!(t.buy_trader, "taker");
        assert_eq!(t.sell_trader, "maker");
        assert_eq!(t.resting_queue_pos, 1);
        assert!(t.qty > 0);
    }

    #[test]
    fn test_trade_ids_are_monotonic() {
        let mut book = Book::new();

        process(&mut book, make_limit(1, Side::Sell, 100, 5), 0);
        process(&mut book, make_limit(2, Side::Sell, 100, 5), 0);
        let (trades, _) = process(&mut book, make_market(3, Side::Buy, 10), 1);

        assert_eq!(trades.len(), 2);
        assert_eq!(trades[0].id, 1);
        assert_eq!(trades[1].id, 2);

        process(&mut book, make_limit(4, Side::Sell, 100, 5), 2);
        let (trades, _) = process(&mut book, make_market(5, Side::Buy, 5), 3);
        assert_eq!(trades[0].id, 3);
    }

    #[test]
    fn test_resting_limit_remainder_rests_at_price() {
        let mut book = Book::new();

        process(&mut book, make_limit(1, Side::Sell, 100, 3), 0);
        // Crossing buy for more than available: remainder rests as a bid at 101.
        let (trades, bbo) = process(&mut book, make_limit(2, Side::Buy, 101, 10), 1);

        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].qty, 3);
        assert_eq!(bbo.bid_price, 101);
        assert_eq!(bbo.bid_qty, 7);
        assert_eq!(bbo.ask_price, 0);
    }
}
