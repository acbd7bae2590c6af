use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use crate::model::{PendingMessage, ReplyTarget};

/// Messages processed together under one caption.
#[derive(Debug, Clone)]
pub struct IntakeBatch {
    /// `None` for a stand-alone message processed immediately.
    pub group_id: Option<String>,
    /// Messages in arrival order.
    pub messages: Vec<PendingMessage>,
    seq: u64,
    last_seen: Instant,
}

impl IntakeBatch {
    /// Wrap a message that carries no group identifier.
    pub fn single(message: PendingMessage) -> Self {
        Self {
            group_id: None,
            messages: vec![message],
            seq: 0,
            last_seen: Instant::now(),
        }
    }

    pub fn is_grouped(&self) -> bool {
        self.group_id.is_some()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Caption of the first message. Later messages of a group are
    /// continuations and their captions are ignored.
    pub fn caption(&self) -> Option<&str> {
        self.messages.first().and_then(|m| m.caption.as_deref())
    }

    /// Replies go to the first message of the batch.
    pub fn reply_target(&self) -> Option<&ReplyTarget> {
        self.messages.first().map(|m| &m.reply_to)
    }
}

/// What happened to a message handed to the accumulator.
#[derive(Debug)]
pub enum Admission {
    /// Buffered under its group; `pending` is the batch size so far.
    Buffered { group_id: String, pending: usize },
    /// No group identifier: process right away as a one-message batch.
    Immediate(IntakeBatch),
}

/// Buffers grouped messages until the next flush.
///
/// Per group key a batch goes `EMPTY -> ACCUMULATING -> FLUSHED`. A drain
/// removes batches from the map, so a later message with the same key opens
/// a fresh batch, including one that arrives while the previous snapshot is
/// still being processed.
#[derive(Debug, Default)]
pub struct BatchAccumulator {
    batches: HashMap<String, IntakeBatch>,
    next_seq: u64,
}

impl BatchAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn admit(&mut self, message: PendingMessage) -> Admission {
        self.admit_at(message, Instant::now())
    }

    pub fn admit_at(&mut self, message: PendingMessage, now: Instant) -> Admission {
        let Some(group_id) = message.group_id.clone() else {
            return Admission::Immediate(IntakeBatch::single(message));
        };

        let next_seq = &mut self.next_seq;
        let batch = self.batches.entry(group_id.clone()).or_insert_with(|| {
            *next_seq += 1;
            IntakeBatch {
                group_id: Some(group_id.clone()),
                messages: Vec::new(),
                seq: *next_seq,
                last_seen: now,
            }
        });
        batch.messages.push(message);
        batch.last_seen = now;

        Admission::Buffered {
            group_id,
            pending: batch.messages.len(),
        }
    }

    /// Take every buffered batch, oldest first.
    pub fn drain(&mut self) -> Vec<IntakeBatch> {
        let mut drained: Vec<IntakeBatch> = std::mem::take(&mut self.batches).into_values().collect();
        drained.sort_by_key(|b| b.seq);
        drained
    }

    /// Take the batches that have not received a message for at least
    /// `quiet`, oldest first. A zero `quiet` drains everything.
    pub fn drain_settled(&mut self, now: Instant, quiet: Duration) -> Vec<IntakeBatch> {
        if quiet.is_zero() {
            return self.drain();
        }
        let settled: Vec<String> = self
            .batches
            .iter()
            .filter(|(_, b)| now.saturating_duration_since(b.last_seen) >= quiet)
            .map(|(k, _)| k.clone())
            .collect();
        let mut drained: Vec<IntakeBatch> = settled
            .iter()
            .filter_map(|k| self.batches.remove(k))
            .collect();
        drained.sort_by_key(|b| b.seq);
        drained
    }

    /// Number of open batches.
    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    /// Messages buffered across all open batches.
    pub fn pending_messages(&self) -> usize {
        self.batches.values().map(IntakeBatch::len).sum()
    }

    pub fn contains(&self, group_id: &str) -> bool {
        self.batches.contains_key(group_id)
    }
}
