//! Ring buffer of delivered events.

use crate::error::{Result, StreamError};
use crate::types::SubscriptionFault;
use std::collections::VecDeque;

/// One delivery: an item, or the fault the client reported instead.
pub type Event<T> = std::result::Result<T, SubscriptionFault>;

/// FIFO of events that keeps at most `maxlen` of the most recent ones.
///
/// Not synchronized; the owning stream guards it.
#[derive(Debug)]
pub struct EventQueue<T> {
    events: VecDeque<Event<T>>,
    maxlen: Option<usize>,
}

impl<T> EventQueue<T> {
    /// `None` means unbounded.
    pub fn new(maxlen: Option<usize>) -> Self {
        let events = match maxlen {
            Some(n) => VecDeque::with_capacity(n),
            None => VecDeque::new(),
        };
        Self { events, maxlen }
    }

    /// Append an event. When full, the oldest event is dropped first and
    /// returned.
    pub fn push(&mut self, event: Event<T>) -> Option<Event<T>> {
        let evicted = match self.maxlen {
            Some(n) if self.events.len() >= n => self.events.pop_front(),
            _ => None,
        };
        match self.maxlen {
            Some(0) => {}
            _ => self.events.push_back(event),
        }
        evicted
    }

    pub fn pop_oldest(&mut self) -> Result<Event<T>> {
        self.events.pop_front().ok_or(StreamError::Empty)
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn oldest(&self) -> Option<&Event<T>> {
        self.events.front()
    }

    pub fn newest(&self) -> Option<&Event<T>> {
        self.events.back()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn maxlen(&self) -> Option<usize> {
        self.maxlen
    }
}
