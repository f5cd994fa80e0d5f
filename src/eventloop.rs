//! Deterministic discrete-event simulation loop.
//!
//! Events are drained from a min-heap ordered by (timestamp, scheduling
//! sequence number), so two events at equal timestamps always dispatch in
//! the order they were scheduled.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use crate::error::SimResult;
use crate::types::Event;

/// Processes one event and may return new events to schedule
pub trait EventHandler {
    fn handle(&mut self, event: Event) -> SimResult<Vec<Event>>;
}

impl<F> EventHandler for F
where
    F: FnMut(Event) -> SimResult<Vec<Event>>,
{
    fn handle(&mut self, event: Event) -> SimResult<Vec<Event>> {
        self(event)
    }
}

/// Heap entry ordered by (timestamp, scheduling seq)
struct Scheduled {
    seq: u64,
    event: Event,
}

impl Scheduled {
    fn key(&self) -> (i64, u64) {
        (self.event.timestamp, self.seq)
    }
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Scheduled {}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scheduled {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

/// The deterministic simulation event loop
#[derive(Default)]
pub struct EventLoop {
    queue: BinaryHeap<Reverse<Scheduled>>,
    next_seq: u64,

    /// Number of events dispatched so far
    pub events_processed: u64,
    /// Timestamp of the most recently dispatched event
    pub current_time: i64,
}

impl EventLoop {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an event to the queue. The scheduling sequence number (1, 2, ...)
    /// is assigned here and serves as the tie-break at equal timestamps.
    pub fn schedule(&mut self, mut event: Event) {
        self.next_seq += 1;
        event.seq_no = self.next_seq;
        self.queue.push(Reverse(Scheduled {
            seq: self.next_seq,
            event,
        }));
    }

    /// Process events until the queue is empty
    pub fn run<H: EventHandler>(&mut self, handler: &mut H) -> SimResult<()> {
        while let Some(Reverse(next)) = self.queue.pop() {
            self.dispatch(next.event, handler)?;
        }
        Ok(())
    }

    /// Process events whose timestamp is <= `max_time`.
    /// Returns true if unprocessed events remain.
    pub fn run_until<H: EventHandler>(&mut self, max_time: i64, handler: &mut H) -> SimResult<bool> {
        loop {
            match self.queue.peek() {
                None => return Ok(false),
                Some(Reverse(next)) if next.event.timestamp > max_time => return Ok(true),
                Some(_) => {}
            }
            let Reverse(next) = self.queue.pop().expect("peeked entry present");
            self.dispatch(next.event, handler)?;
        }
    }

    fn dispatch<H: EventHandler>(&mut self, event: Event, handler: &mut H) -> SimResult<()> {
        self.current_time = event.timestamp;
        self.events_processed += 1;

        for new_event in handler.handle(event)? {
            self.schedule(new_event);
        }
        Ok(())
    }

    /// Number of events still in the queue
    pub fn pending(&self) -> usize {
        self.queue.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Order, Side};

    fn collect_ids(events: &[Event]) -> Vec<u64> {
        events
            .iter()
            .filter_map(|e| e.order.as_ref().map(|o| o.id))
            .collect()
    }

    #[test]
    fn test_events_dispatch_in_time_order() {
        let mut el = EventLoop::new();
        el.schedule(Event::order_accepted(
            300,
            Order::market(3, "t", Side::Buy, 1),
        ));
        el.schedule(Event::order_accepted(
            100,
            Order::market(1, "t", Side::Buy, 1),
        ));
        el.schedule(Event::order_accepted(
            200,
            Order::market(2, "t", Side::Buy, 1),
        ));

        let mut seen = Vec::new();
        let mut handler = |event: Event| -> SimResult<Vec<Event>> {
            seen.push(event);
            Ok(Vec::new())
        };
        el.run(&mut handler).unwrap();

        assert_eq!(collect_ids(&seen), vec![1, 2, 3]);
        assert_eq!(el.events_processed, 3);
        assert_eq!(el.current_time, 300);
    }

    #[test]
    fn test_same_timestamp_dispatches_in_schedule_order() {
        let mut el = EventLoop::new();
        for id in [10u64, 20, 30] {
            el.schedule(Event::order_accepted(
                100,
                Order::market(id, "t", Side::Buy, 1),
            ));
        }

        let mut seen = Vec::new();
        let mut handler = |event: Event| -> SimResult<Vec<Event>> {
            seen.push(event);
            Ok(Vec::new())
        };
        el.run(&mut handler).unwrap();

        assert_eq!(collect_ids(&seen), vec![10, 20, 30]);
    }

    #[test]
    fn test_handler_emitted_events_are_scheduled() {
        let mut el = EventLoop::new();
        el.schedule(Event::order_accepted(
            100,
            Order::market(1, "t", Side::Buy, 1),
        ));

        let mut seen = Vec::new();
        let mut handler = |event: Event| -> SimResult<Vec<Event>> {
            let id = event.order.as_ref().map(|o| o.id).unwrap_or(0);
            seen.push(id);
            if id == 1 {
                // derived event at the same timestamp orders after
                // equal-timestamp predecessors
                return Ok(vec![Event::order_accepted(
                    100,
                    Order::market(2, "t", Side::Sell, 1),
                )]);
            }
            Ok(Vec::new())
        };
        el.run(&mut handler).unwrap();

        assert_eq!(seen, vec![1, 2]);
    }

    #[test]
    fn test_run_until_leaves_future_events() {
        let mut el = EventLoop::new();
        el.schedule(Event::order_accepted(
            100,
            Order::market(1, "t", Side::Buy, 1),
        ));
        el.schedule(Event::order_accepted(
            500,
            Order::market(2, "t", Side::Buy, 1),
        ));

        let count = std::cell::Cell::new(0);
        let mut handler = |_event: Event| -> SimResult<Vec<Event>> {
            count.set(count.get() + 1);
            Ok(Vec::new())
        };

        let remaining = el.run_until(200, &mut handler).unwrap();
        assert!(remaining);
        assert_eq!(count.get(), 1);
        assert_eq!(el.pending(), 1);

        let remaining = el.run_until(1000, &mut handler).unwrap();
        assert!(!remaining);
        assert_eq!(count.get(), 2);
    }

    #[test]
    fn test_scheduling_seq_is_monotonic() {
        let mut el = EventLoop::new();
        el.schedule(Event::sim_start());
        el.schedule(Event::sim_end(10));

        let mut seqs = Vec::new();
        let mut handler = |event: Event| -> SimResult<Vec<Event>> {
            seqs.push(event.seq_no);
            Ok(Vec::new())
        };
        el.run(&mut handler).unwrap();

        assert_eq!(seqs, vec![1, 2]);
    }
}
