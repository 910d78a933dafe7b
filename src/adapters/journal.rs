//! In-memory flow journal.
//!
//! Implements [`FlowJournalPort`] as a bounded ring of flow start/stop
//! records.  Steady `On` and `Off` cycles are not recorded; the two edge
//! statuses carry all the information a report needs.  When full, the
//! oldest record is dropped.

use heapless::Deque;
use log::{debug, info};

use crate::app::ports::{FlowJournalPort, RtcDateTime};
use crate::flow_status::FlowStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JournalEntry {
    pub status: FlowStatus,
    pub at: RtcDateTime,
}

pub struct StatusJournal<const N: usize> {
    entries: Deque<JournalEntry, N>,
    dropped: u32,
}

impl<const N: usize> Default for StatusJournal<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> StatusJournal<N> {
    pub const fn new() -> Self {
        Self {
            entries: Deque::new(),
            dropped: 0,
        }
    }

    /// Oldest first.
    pub fn entries(&self) -> impl Iterator<Item = &JournalEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Records lost to overflow since boot.
    pub fn dropped(&self) -> u32 {
        self.dropped
    }

    pub fn last(&self) -> Option<&JournalEntry> {
        self.entries.back()
    }
}

impl<const N: usize> FlowJournalPort for StatusJournal<N> {
    fn ingest(&mut self, status: FlowStatus, at: RtcDateTime) {
        if !status.is_edge() {
            return;
        }
        if self.entries.is_full() {
            self.entries.pop_front();
            self.dropped = self.dropped.saturating_add(1);
            debug!("Journal full, dropped oldest record");
        }
        let entry = JournalEntry { status, at };
        // Cannot fail: a slot was freed above.
        let _ = self.entries.push_back(entry);
        info!(
            "JOURNAL | {} {:04}-{:02}-{:02} {:02}:{:02}:{:02}",
            status.name(),
            at.year,
            at.month,
            at.day,
            at.hour,
            at.minute,
            at.second
        );
    }
}
