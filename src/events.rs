//! Wake-reason events.
//!
//! Events are produced by:
//! - the capture ISR (a snapshot is waiting in the capture slot)
//! - the keypad ISR
//! - the display refresh timer (esp_timer task)
//!
//! The main loop drains them into a [`WakeSummary`] before each coordinator
//! pass.  A key press holds the CPU awake for the menu (see
//! [`AwakeHold`](crate::scheduler::AwakeHold)); every reason is counted in
//! the cycle statistics.  Events never start a cycle themselves: the sample
//! gate decides that, and the capture data travels in the capture slot.
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌──────────────┐
//! │ Capture ISR │────▶│              │     │              │
//! │ Keypad ISR  │────▶│  EventQueue  │────▶│  Main Loop   │
//! │ Display tmr │────▶│              │     │  (consumer)  │
//! └─────────────┘     └──────────────┘     └──────────────┘
//! ```

use core::sync::atomic::{AtomicU8, Ordering};

/// Ring capacity; one slot stays empty to tell full from empty.
pub const EVENT_QUEUE_CAP: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Event {
    CaptureReady = 0,
    KeyPressed = 20,
    DisplayRefresh = 30,
}

impl Event {
    fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Self::CaptureReady),
            20 => Some(Self::KeyPressed),
            30 => Some(Self::DisplayRefresh),
            _ => None,
        }
    }
}

/// Multi-producer/single-consumer ring of [`Event`]s.
///
/// Producers run in ISR and timer-task context, so a push can be
/// interrupted by another push.  Producers serialize through a critical
/// section; the single consumer (the main loop) stays lock-free.
pub struct EventQueue {
    head: AtomicU8,
    tail: AtomicU8,
    buffer: [AtomicU8; EVENT_QUEUE_CAP],
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl EventQueue {
    pub const fn new() -> Self {
        Self {
            head: AtomicU8::new(0),
            tail: AtomicU8::new(0),
            buffer: [const { AtomicU8::new(0) }; EVENT_QUEUE_CAP],
        }
    }

    /// Returns `false` if the queue is full (event dropped).
    pub fn push(&self, event: Event) -> bool {
        critical_section::with(|_| {
            let head = self.head.load(Ordering::Relaxed);
            let tail = self.tail.load(Ordering::Acquire);
            let next_head = (head + 1) % EVENT_QUEUE_CAP as u8;
            if next_head == tail {
                return false;
            }
            self.buffer[head as usize].store(event as u8, Ordering::Relaxed);
            self.head.store(next_head, Ordering::Release);
            true
        })
    }

    pub fn pop(&self) -> Option<Event> {
        let tail = self.tail.load(Ordering::Relaxed);
        let head = self.head.load(Ordering::Acquire);
        if tail == head {
            return None;
        }
        let raw = self.buffer[tail as usize].load(Ordering::Relaxed);
        self.tail.store((tail + 1) % EVENT_QUEUE_CAP as u8, Ordering::Release);
        Event::from_u8(raw)
    }

    /// Pop everything, in FIFO order.
    pub fn drain(&self, mut handler: impl FnMut(Event)) {
        while let Some(event) = self.pop() {
            handler(event);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tail.load(Ordering::Relaxed) == self.head.load(Ordering::Acquire)
    }

    pub fn len(&self) -> usize {
        let head = self.head.load(Ordering::Relaxed) as usize;
        let tail = self.tail.load(Ordering::Relaxed) as usize;
        (head + EVENT_QUEUE_CAP - tail) % EVENT_QUEUE_CAP
    }
}

/// The firmware-wide queue.
pub static EVENTS: EventQueue = EventQueue::new();

/// Push onto [`EVENTS`].  ISR-safe.
pub fn push_event(event: Event) -> bool {
    EVENTS.push(event)
}

/// Why the CPU woke since the last pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WakeSummary {
    pub captures: u32,
    pub keys: u32,
    pub refreshes: u32,
}

impl WakeSummary {
    /// Drain `queue` into a summary.
    pub fn collect(queue: &EventQueue) -> Self {
        let mut summary = Self::default();
        queue.drain(|event| summary.record(event));
        summary
    }

    pub fn record(&mut self, event: Event) {
        match event {
            Event::CaptureReady => self.captures += 1,
            Event::KeyPressed => self.keys += 1,
            Event::DisplayRefresh => self.refreshes += 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Drain [`EVENTS`] into a [`WakeSummary`].
pub fn drain_wakes() -> WakeSummary {
    WakeSummary::collect(&EVENTS)
}
