//! Holding area for batches that failed to send.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::time::Duration;
use uuid::Uuid;

/// A serialized batch waiting to be resent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetryEntry {
    pub id: Uuid,
    #[serde(skip)]
    pub payload: Bytes,
    pub event_count: usize,
    /// Failed resends so far.
    pub attempts: u32,
    pub enqueued_at: DateTime<Utc>,
    pub last_attempt_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct RetryQueue {
    entries: VecDeque<RetryEntry>,
    max_retries: u32,
    retry_delay: Duration,
    dropped: u64,
}

impl RetryQueue {
    pub fn new(max_retries: u32, retry_delay: Duration) -> Self {
        Self {
            entries: VecDeque::new(),
            max_retries,
            retry_delay,
            dropped: 0,
        }
    }

    /// Queue a batch with zero attempts. Returns the entry id.
    pub fn push(&mut self, payload: Bytes, event_count: usize, now: DateTime<Utc>) -> Uuid {
        let id = Uuid::new_v4();
        self.entries.push_back(RetryEntry {
            id,
            payload,
            event_count,
            attempts: 0,
            enqueued_at: now,
            last_attempt_at: now,
        });
        id
    }

    /// Entries whose last attempt is at least `retry_delay` old.
    pub fn due(&self, now: DateTime<Utc>) -> Vec<RetryEntry> {
        self.entries
            .iter()
            .filter(|entry| {
                (now - entry.last_attempt_at)
                    .to_std()
                    .is_ok_and(|age| age >= self.retry_delay)
            })
            .cloned()
            .collect()
    }

    /// The entry was delivered.
    pub fn remove(&mut self, id: Uuid) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.id != id);
        self.entries.len() != before
    }

    /// Count a failed resend. Returns `true` if the entry reached the retry
    /// cap and was dropped.
    pub fn record_failure(&mut self, id: Uuid, now: DateTime<Utc>) -> bool {
        let Some(position) = self.entries.iter().position(|entry| entry.id == id) else {
            return false;
        };

        let entry = &mut self.entries[position];
        entry.attempts += 1;
        entry.last_attempt_at = now;

        if entry.attempts >= self.max_retries {
            self.entries.remove(position);
            self.dropped += 1;
            true
        } else {
            false
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries dropped after reaching the retry cap.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn entries(&self) -> impl Iterator<Item = &RetryEntry> {
        self.entries.iter()
    }
}
