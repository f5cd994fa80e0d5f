use std::fmt;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Unique identifier for orders
pub type OrderId = u64;

/// Fixed-point price: signed 64-bit integer scaled by 10_000
/// (e.g. $100.0050 is stored as 1_000_050)
pub type Price = i64;

/// Quantity of shares/contracts
pub type Qty = i64;

/// Scale factor between fixed-point prices and display values
pub const PRICE_SCALE: i64 = 10_000;

/// Order side (Buy or Sell)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Get the opposite side
    pub fn opposite(&self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }
}

impl Default for Side {
    fn default() -> Self {
        Side::Buy
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Side {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Side {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SideVisitor;

        impl<'de> Visitor<'de> for SideVisitor {
            type Value = Side;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("\"BUY\"/\"SELL\" or the numeric form 1/-1")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Side, E> {
                match v {
                    "BUY" | "1" => Ok(Side::Buy),
                    "SELL" | "-1" => Ok(Side::Sell),
                    other => Err(E::custom(format!("unknown Side: {other}"))),
                }
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Side, E> {
                match v {
                    1 => Ok(Side::Buy),
                    -1 => Ok(Side::Sell),
                    other => Err(E::custom(format!("unknown Side: {other}"))),
                }
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Side, E> {
                self.visit_i64(v as i64)
            }
        }

        deserializer.deserialize_any(SideVisitor)
    }
}

/// Order type: resting-capable limit, sweeping market, or cancel instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderType {
    Limit,
    Market,
    Cancel,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::Limit => "LIMIT",
            OrderType::Market => "MARKET",
            OrderType::Cancel => "CANCEL",
        }
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for OrderType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for OrderType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct OrderTypeVisitor;

        impl<'de> Visitor<'de> for OrderTypeVisitor {
            type Value = OrderType;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("\"LIMIT\"/\"MARKET\"/\"CANCEL\" or the numeric form 0/1/2")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<OrderType, E> {
                match v {
                    "LIMIT" | "0" => Ok(OrderType::Limit),
                    "MARKET" | "1" => Ok(OrderType::Market),
                    "CANCEL" | "2" => Ok(OrderType::Cancel),
                    other => Err(E::custom(format!("unknown OrderType: {other}"))),
                }
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<OrderType, E> {
                match v {
                    0 => Ok(OrderType::Limit),
                    1 => Ok(OrderType::Market),
                    2 => Ok(OrderType::Cancel),
                    other => Err(E::custom(format!("unknown OrderType: {other}"))),
                }
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<OrderType, E> {
                self.visit_i64(v as i64)
            }
        }

        deserializer.deserialize_any(OrderTypeVisitor)
    }
}

/// Event type tag; each tag pairs with at most one payload kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    OrderAccepted,
    OrderCanceled,
    TradeExecuted,
    BboUpdate,
    Signal,
    ReQuote,
    SimStart,
    SimEnd,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::OrderAccepted => "ORDER_ACCEPTED",
            EventType::OrderCanceled => "ORDER_CANCELED",
            EventType::TradeExecuted => "TRADE_EXECUTED",
            EventType::BboUpdate => "BBO_UPDATE",
            EventType::Signal => "SIGNAL",
            EventType::ReQuote => "REQUOTE",
            EventType::SimStart => "SIM_START",
            EventType::SimEnd => "SIM_END",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for EventType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EventType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct EventTypeVisitor;

        impl<'de> Visitor<'de> for EventTypeVisitor {
            type Value = EventType;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an event type name or its numeric form 0-7")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<EventType, E> {
                match v {
                    "ORDER_ACCEPTED" | "0" => Ok(EventType::OrderAccepted),
                    "ORDER_CANCELED" | "1" => Ok(EventType::OrderCanceled),
                    "TRADE_EXECUTED" | "2" => Ok(EventType::TradeExecuted),
                    "BBO_UPDATE" | "3" => Ok(EventType::BboUpdate),
                    "SIGNAL" | "4" => Ok(EventType::Signal),
                    "REQUOTE" | "5" => Ok(EventType::ReQuote),
                    "SIM_START" | "6" => Ok(EventType::SimStart),
                    "SIM_END" | "7" => Ok(EventType::SimEnd),
                    other => Err(E::custom(format!("unknown EventType: {other}"))),
                }
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<EventType, E> {
                match v {
                    0 => Ok(EventType::OrderAccepted),
                    1 => Ok(EventType::OrderCanceled),
                    2 => Ok(EventType::TradeExecuted),
                    3 => Ok(EventType::BboUpdate),
                    4 => Ok(EventType::Signal),
                    5 => Ok(EventType::ReQuote),
                    6 => Ok(EventType::SimStart),
                    7 => Ok(EventType::SimEnd),
                    other => Err(E::custom(format!("unknown EventType: {other}"))),
                }
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<EventType, E> {
                self.visit_i64(v as i64)
            }
        }

        deserializer.deserialize_any(EventTypeVisitor)
    }
}

fn is_zero_u64(v: &u64) -> bool {
    *v == 0
}

fn is_zero_usize(v: &usize) -> bool {
    *v == 0
}

/// A limit, market, or cancel instruction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    #[serde(default)]
    pub trader_id: String,
    #[serde(default)]
    pub side: Side,
    #[serde(rename = "type")]
    pub kind: OrderType,
    /// 0 for market and cancel orders
    #[serde(default)]
    pub price: Price,
    #[serde(default)]
    pub qty: Qty,
    #[serde(default)]
    pub remaining_qty: Qty,
    /// nanos: when the trader decided
    #[serde(default)]
    pub decision_time: i64,
    /// nanos: after latency was applied
    #[serde(default)]
    pub arrival_time: i64,
    /// global FIFO tie-break
    #[serde(default)]
    pub seq_no: u64,
    /// for cancel orders: target order id
    #[serde(default, skip_serializing_if = "is_zero_u64")]
    pub cancel_id: OrderId,
    /// 1-based queue position at placement
    #[serde(default, skip_serializing_if = "is_zero_usize")]
    pub queue_pos: usize,
}

impl Order {
    /// Create a new limit order
    pub fn limit(id: OrderId, trader_id: &str, side: Side, price: Price, qty: Qty) -> Self {
        Self {
            id,
            trader_id: trader_id.to_string(),
            side,
            kind: OrderType::Limit,
            price,
            qty,
            remaining_qty: 0,
            decision_time: 0,
            arrival_time: 0,
            seq_no: 0,
            cancel_id: 0,
            queue_pos: 0,
        }
    }

    /// Create a new market order
    pub fn market(id: OrderId, trader_id: &str, side: Side, qty: Qty) -> Self {
        Self {
            id,
            trader_id: trader_id.to_string(),
            side,
            kind: OrderType::Market,
            price: 0,
            qty,
            remaining_qty: 0,
            decision_time: 0,
            arrival_time: 0,
            seq_no: 0,
            cancel_id: 0,
            queue_pos: 0,
        }
    }

    /// Create a cancel instruction targeting another order.
    /// Side is carried for record-shape stability; it has no matching meaning.
    pub fn cancel(id: OrderId, trader_id: &str, target: OrderId) -> Self {
        Self {
            id,
            trader_id: trader_id.to_string(),
            side: Side::default(),
            kind: OrderType::Cancel,
            price: 0,
            qty: 0,
            remaining_qty: 0,
            decision_time: 0,
            arrival_time: 0,
            seq_no: 0,
            cancel_id: target,
            queue_pos: 0,
        }
    }

    /// True once the order has no remaining quantity
    pub fn is_filled(&self) -> bool {
        self.remaining_qty <= 0
    }
}

/// A matched execution between an aggressor and a passive resting order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub id: u64,
    pub buy_order_id: OrderId,
    pub sell_order_id: OrderId,
    #[serde(default)]
    pub buy_trader: String,
    #[serde(default)]
    pub sell_trader: String,
    pub price: Price,
    pub qty: Qty,
    pub timestamp: i64,
    /// Explicit passive/aggressor identity for attribution in analytics
    #[serde(default, skip_serializing_if = "is_zero_u64")]
    pub passive_order_id: OrderId,
    #[serde(default, skip_serializing_if = "is_zero_u64")]
    pub aggressor_order_id: OrderId,
    /// Queue position of the resting (passive) order at fill time
    #[serde(default, skip_serializing_if = "is_zero_usize")]
    pub resting_queue_pos: usize,
}

/// Best bid and offer snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bbo {
    pub bid_price: Price,
    pub bid_qty: Qty,
    pub ask_price: Price,
    pub ask_qty: Qty,
    /// (bid+ask)/2, or 0 when either side is empty
    pub mid_price: Price,
}

/// A trading signal broadcast to all traders
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    /// signal strength / direction
    pub value: f64,
    /// mid at signal time, stamped by the runner at dispatch
    pub mid_price: Price,
}

fn string_is_empty(s: &String) -> bool {
    s.is_empty()
}

/// The core unit in the event loop and event log.
/// Exactly one payload is set, determined by the event type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(default)]
    pub seq_no: u64,
    pub timestamp: i64,
    #[serde(rename = "type")]
    pub kind: EventType,
    /// set for trader-specific events (e.g. re-quote)
    #[serde(default, skip_serializing_if = "string_is_empty")]
    pub trader_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<Order>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trade: Option<Trade>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbo: Option<Bbo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal: Option<Signal>,
}

impl Event {
    fn bare(timestamp: i64, kind: EventType) -> Self {
        Self {
            seq_no: 0,
            timestamp,
            kind,
            trader_id: String::new(),
            order: None,
            trade: None,
            bbo: None,
            signal: None,
        }
    }

    pub fn order_accepted(timestamp: i64, order: Order) -> Self {
        Self {
            order: Some(order),
            ..Self::bare(timestamp, EventType::OrderAccepted)
        }
    }

    pub fn order_canceled(timestamp: i64, order: Order) -> Self {
        Self {
            order: Some(order),
            ..Self::bare(timestamp, EventType::OrderCanceled)
        }
    }

    pub fn trade_executed(timestamp: i64, trade: Trade) -> Self {
        Self {
            trade: Some(trade),
            ..Self::bare(timestamp, EventType::TradeExecuted)
        }
    }

    pub fn bbo_update(timestamp: i64, bbo: Bbo) -> Self {
        Self {
            bbo: Some(bbo),
            ..Self::bare(timestamp, EventType::BboUpdate)
        }
    }

    pub fn signal(timestamp: i64, signal: Signal) -> Self {
        Self {
            signal: Some(signal),
            ..Self::bare(timestamp, EventType::Signal)
        }
    }

    pub fn re_quote(timestamp: i64, trader_id: &str) -> Self {
        Self {
            trader_id: trader_id.to_string(),
            ..Self::bare(timestamp, EventType::ReQuote)
        }
    }

    pub fn sim_start() -> Self {
        Self::bare(0, EventType::SimStart)
    }

    pub fn sim_end(timestamp: i64) -> Self {
        Self::bare(timestamp, EventType::SimEnd)
    }
}

/// Price utility functions
pub mod price_utils {
    use super::{Price, PRICE_SCALE};

    /// Convert a float price to fixed-point (4 decimal places)
    pub fn from_f64(price: f64) -> Price {
        (price * PRICE_SCALE as f64).round() as Price
    }

    /// Convert a fixed-point price to float for display
    pub fn to_f64(price: Price) -> f64 {
        price as f64 / PRICE_SCALE as f64
    }

    /// Format a fixed-point price with four decimal places
    pub fn format(price: Price) -> String {
        format!("{:.4}", to_f64(price))
    }

    /// Integer midpoint of bid and ask; truncates toward zero on ties
    pub fn mid(bid: Price, ask: Price) -> Price {
        (bid + ask) / 2
    }
}
