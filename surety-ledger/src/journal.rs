//! Event journal.
//!
//! Every committed operation appends its events here so watchers (the
//! frontend, the off-chain status bot) can poll by sequence number instead
//! of holding a subscription.

use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::RwLock;

use surety_types::LedgerEvent;

/// A journaled event.
#[derive(Debug, Clone)]
pub struct JournalEntry {
    /// Position in the journal, starting at 1
    pub seq: u64,
    /// Unique entry ID
    pub entry_id: String,
    /// When the event was committed
    pub recorded_at: DateTime<Utc>,
    /// The event
    pub event: LedgerEvent,
}

#[derive(Debug, Default)]
struct JournalInner {
    /// Entries, oldest first
    entries: VecDeque<JournalEntry>,
    next_seq: u64,
}

/// Bounded, sequenced log of committed events.
pub struct EventJournal {
    inner: Arc<RwLock<JournalInner>>,
    /// Maximum entries to retain
    max_entries: usize,
}

impl EventJournal {
    /// Create a journal retaining at most `max_entries` events.
    pub fn with_max_entries(max_entries: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(JournalInner {
                entries: VecDeque::new(),
                next_seq: 1,
            })),
            max_entries,
        }
    }

    /// Append events in order, returning the sequence of the last one.
    pub async fn append(&self, events: &[LedgerEvent]) -> u64 {
        let mut inner = self.inner.write().await;
        let recorded_at = Utc::now();

        for event in events {
            let seq = inner.next_seq;
            inner.next_seq += 1;
            inner.entries.push_back(JournalEntry {
                seq,
                entry_id: uuid::Uuid::new_v4().to_string(),
                recorded_at,
                event: event.clone(),
            });
        }

        // Prune if over limit
        while inner.entries.len() > self.max_entries {
            inner.entries.pop_front();
        }

        inner.next_seq - 1
    }

    /// Drop every entry and restart sequencing at 1.
    pub async fn reset(&self) {
        let mut inner = self.inner.write().await;
        inner.entries.clear();
        inner.next_seq = 1;
    }

    /// Entries with a sequence number greater than `seq`, oldest first.
    pub async fn since(&self, seq: u64) -> Vec<JournalEntry> {
        let inner = self.inner.read().await;
        inner
            .entries
            .iter()
            .filter(|e| e.seq > seq)
            .cloned()
            .collect()
    }

    /// The most recent `limit` entries, newest first.
    pub async fn recent(&self, limit: usize) -> Vec<JournalEntry> {
        let inner = self.inner.read().await;
        inner.entries.iter().rev().take(limit).cloned().collect()
    }

    /// Sequence number of the newest entry (0 when empty).
    pub async fn last_seq(&self) -> u64 {
        self.inner.read().await.next_seq - 1
    }

    /// Number of retained entries.
    pub async fn len(&self) -> usize {
        self.inner.read().await.entries.len()
    }

    /// Whether the journal holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toggle(operational: bool) -> LedgerEvent {
        LedgerEvent::OperationalStatusChanged { operational }
    }

    #[tokio::test]
    async fn test_sequencing() {
        let journal = EventJournal::with_max_entries(10);
        assert_eq!(journal.last_seq().await, 0);

        let last = journal.append(&[toggle(false), toggle(true)]).await;
        assert_eq!(last, 2);

        let entries = journal.since(1).await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].event, toggle(true));
    }

    #[tokio::test]
    async fn test_pruning() {
        let journal = EventJournal::with_max_entries(2);
        journal.append(&[toggle(false), toggle(true), toggle(false)]).await;

        assert_eq!(journal.len().await, 2);
        let recent = journal.recent(5).await;
        assert_eq!(recent[0].seq, 3);
        assert_eq!(recent[1].seq, 2);
        assert_eq!(journal.since(0).await.len(), 2);
    }

    #[tokio::test]
    async fn test_reset_restarts_sequence() {
        let journal = EventJournal::with_max_entries(10);
        journal.append(&[toggle(false), toggle(true)]).await;

        journal.reset().await;
        assert!(journal.is_empty().await);
        assert_eq!(journal.last_seq().await, 0);
        assert_eq!(journal.append(&[toggle(false)]).await, 1);
    }
}
