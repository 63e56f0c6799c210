//! Time-ordered event queue

use crate::event::Event;
use crate::types::SimTime;
use ordered_float::OrderedFloat;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Priority queue popping the earliest event first
///
/// Events scheduled for the same instant pop in insertion order.
#[derive(Debug, Default)]
pub struct Scheduler {
    seq: u64,
    events: BinaryHeap<Scheduled>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, event: Event) {
        let seq = self.seq;
        self.seq += 1;
        self.events.push(Scheduled {
            at: OrderedFloat(event.run_at),
            seq,
            event,
        });
    }

    pub fn pop_earliest(&mut self) -> Option<Event> {
        self.events.pop().map(|s| s.event)
    }

    /// Run time of the next event without removing it
    pub fn peek_time(&self) -> Option<SimTime> {
        self.events.peek().map(|s| s.at.into_inner())
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl Extend<Event> for Scheduler {
    fn extend<I: IntoIterator<Item = Event>>(&mut self, iter: I) {
        for event in iter {
            self.schedule(event);
        }
    }
}

#[derive(Debug)]
struct Scheduled {
    at: OrderedFloat<SimTime>,
    seq: u64,
    event: Event,
}

impl Eq for Scheduled {}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        self.at == other.at && self.seq == other.seq
    }
}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scheduled {
    // reversed: BinaryHeap is a max-heap
    fn cmp(&self, other: &Self) -> Ordering {
        self.at
            .cmp(&other.at)
            .then_with(|| self.seq.cmp(&other.seq))
            .reverse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;
    use crate::types::NodeId;

    fn event(node: usize, run_at: SimTime) -> Event {
        Event::new(NodeId(node), 0.0, run_at, EventKind::TransactionGenerate)
    }

    #[test]
    fn test_pops_in_time_order() {
        let mut scheduler = Scheduler::new();
        for (node, at) in [(0, 3.0), (1, 0.5), (2, 2.0), (3, 0.1)] {
            scheduler.schedule(event(node, at));
        }

        assert_eq!(scheduler.len(), 4);
        assert_eq!(scheduler.peek_time(), Some(0.1));

        let order: Vec<SimTime> =
            std::iter::from_fn(|| scheduler.pop_earliest()).map(|e| e.run_at).collect();
        assert_eq!(order, vec![0.1, 0.5, 2.0, 3.0]);
        assert!(scheduler.is_empty());
    }

    #[test]
    fn test_ties_pop_in_insertion_order() {
        let mut scheduler = Scheduler::new();
        scheduler.extend((0..5).map(|node| event(node, 1.0)));

        let nodes: Vec<usize> = std::iter::from_fn(|| scheduler.pop_earliest())
            .map(|e| e.node.index())
            .collect();
        assert_eq!(nodes, vec![0, 1, 2, 3, 4]);
    }
}
