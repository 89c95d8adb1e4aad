//! Live context buffer.
//!
//! Holds a session's recent speech and visual items in arrival order along
//! with a running token estimate. The estimate is always the sum of the
//! per-item estimates of the items currently held.
//!
//! ## Compression handshake
//!
//! 1. [`ContextBuffer::append`] reports `compression_due` at most once per
//!    cycle, claiming the in-flight flag as it does.
//! 2. The compressor takes a [`BufferSnapshot`] with [`ContextBuffer::capture`]
//!    and works on it without holding any lock.
//! 3. On success [`ContextBuffer::release`] drops exactly the captured prefix;
//!    items appended meanwhile survive. On failure
//!    [`ContextBuffer::abandon_cycle`] leaves the buffer untouched.
//!
//! A [`ContextBuffer::clear`] in between bumps the generation, and the stale
//! snapshot then releases nothing.

use aura_core::items::BufferItem;
use aura_settings::ContextSettings;

use crate::tokens::estimate_tokens;

/// Result of an append.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AppendOutcome {
    /// Estimate after the append.
    pub token_estimate: u64,
    /// The caller must start a compression cycle.
    pub compression_due: bool,
}

/// Items captured for one compression cycle.
#[derive(Clone, Debug, PartialEq)]
pub struct BufferSnapshot {
    /// Buffer generation at capture time.
    pub generation: u64,
    /// Captured items, oldest first.
    pub items: Vec<BufferItem>,
    /// Token estimate of the captured items.
    pub token_estimate: u64,
}

impl BufferSnapshot {
    /// Whether nothing was captured.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Ordered items plus token bookkeeping for one session.
#[derive(Debug)]
pub struct ContextBuffer {
    items: Vec<BufferItem>,
    item_tokens: Vec<u64>,
    token_estimate: u64,
    generation: u64,
    compression_in_flight: bool,
    budget: u64,
    chars_per_token: usize,
}

impl ContextBuffer {
    /// Empty buffer with the given budget.
    pub fn new(budget: u64, chars_per_token: usize) -> Self {
        Self {
            items: Vec::new(),
            item_tokens: Vec::new(),
            token_estimate: 0,
            generation: 0,
            compression_in_flight: false,
            budget,
            chars_per_token,
        }
    }

    /// Empty buffer configured from settings.
    pub fn from_settings(settings: &ContextSettings) -> Self {
        Self::new(settings.token_budget, settings.chars_per_token)
    }

    /// Append an item and report whether a compression cycle should start.
    pub fn append(&mut self, item: BufferItem) -> AppendOutcome {
        let tokens = estimate_tokens(&item.text, self.chars_per_token);
        self.items.push(item);
        self.item_tokens.push(tokens);
        self.token_estimate += tokens;
        AppendOutcome {
            token_estimate: self.token_estimate,
            compression_due: self.claim_if_due(),
        }
    }

    /// Claim the in-flight flag if the budget is reached and no cycle runs.
    pub fn claim_if_due(&mut self) -> bool {
        if self.compression_in_flight || self.token_estimate < self.budget {
            return false;
        }
        self.compression_in_flight = true;
        true
    }

    /// Capture the current items for compression.
    pub fn capture(&self) -> BufferSnapshot {
        BufferSnapshot {
            generation: self.generation,
            items: self.items.clone(),
            token_estimate: self.token_estimate,
        }
    }

    /// Estimate that would remain after releasing `snapshot`.
    pub fn remaining_after(&self, snapshot: &BufferSnapshot) -> u64 {
        if snapshot.generation != self.generation {
            return self.token_estimate;
        }
        let captured = snapshot.items.len().min(self.item_tokens.len());
        self.item_tokens[captured..].iter().sum()
    }

    /// Drop the captured prefix and end the cycle. Returns the new estimate.
    pub fn release(&mut self, snapshot: &BufferSnapshot) -> u64 {
        if snapshot.generation == self.generation {
            let captured = snapshot.items.len().min(self.items.len());
            let _ = self.items.drain(..captured);
            let _ = self.item_tokens.drain(..captured);
            self.token_estimate = self.item_tokens.iter().sum();
            self.generation += 1;
        }
        self.compression_in_flight = false;
        self.token_estimate
    }

    /// End the cycle without touching the items.
    pub fn abandon_cycle(&mut self) {
        self.compression_in_flight = false;
    }

    /// Remove everything. Clearing an empty buffer is a no-op.
    pub fn clear(&mut self) {
        if self.items.is_empty() {
            return;
        }
        self.items.clear();
        self.item_tokens.clear();
        self.token_estimate = 0;
        self.generation += 1;
    }

    /// All items, oldest first.
    pub fn items(&self) -> &[BufferItem] {
        &self.items
    }

    /// The newest `limit` items, oldest first.
    pub fn recent(&self, limit: usize) -> Vec<BufferItem> {
        let start = self.items.len().saturating_sub(limit);
        self.items[start..].to_vec()
    }

    /// Current token estimate.
    pub fn token_estimate(&self) -> u64 {
        self.token_estimate
    }

    /// Configured budget.
    pub fn budget(&self) -> u64 {
        self.budget
    }

    /// Number of items held.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the buffer holds no items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Bumped on every clear and release.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether a compression cycle currently owns the buffer.
    pub fn compression_in_flight(&self) -> bool {
        self.compression_in_flight
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use proptest::prelude::*;

    fn item(chars: usize) -> BufferItem {
        BufferItem::speech("x".repeat(chars), Utc::now())
    }

    #[test]
    fn append_accumulates_estimate() {
        let mut buf = ContextBuffer::new(100, 4);
        assert_eq!(buf.append(item(8)).token_estimate, 2);
        assert_eq!(buf.append(item(7)).token_estimate, 3);
        assert_eq!(buf.len(), 2);
    }

    #[test]
    fn due_fires_once_at_budget() {
        let mut buf = ContextBuffer::new(10, 1);
        assert!(!buf.append(item(9)).compression_due);
        assert!(buf.append(item(1)).compression_due);
        assert!(!buf.append(item(5)).compression_due);
        assert!(buf.compression_in_flight());
    }

    #[test]
    fn release_keeps_items_appended_mid_cycle() {
        let mut buf = ContextBuffer::new(10, 1);
        let _ = buf.append(item(10));
        let snap = buf.capture();
        let _ = buf.append(item(3));
        assert_eq!(buf.remaining_after(&snap), 3);
        assert_eq!(buf.release(&snap), 3);
        assert_eq!(buf.len(), 1);
        assert!(!buf.compression_in_flight());
    }

    #[test]
    fn release_of_everything_resets_to_zero() {
        let mut buf = ContextBuffer::new(10, 1);
        let _ = buf.append(item(12));
        let snap = buf.capture();
        assert_eq!(buf.release(&snap), 0);
        assert!(buf.is_empty());
    }

    #[test]
    fn stale_snapshot_releases_nothing() {
        let mut buf = ContextBuffer::new(10, 1);
        let _ = buf.append(item(10));
        let snap = buf.capture();
        buf.clear();
        let _ = buf.append(item(4));
        assert_eq!(buf.remaining_after(&snap), 4);
        assert_eq!(buf.release(&snap), 4);
        assert_eq!(buf.len(), 1);
    }

    #[test]
    fn abandon_keeps_items_and_rearms() {
        let mut buf = ContextBuffer::new(10, 1);
        assert!(buf.append(item(10)).compression_due);
        buf.abandon_cycle();
        assert_eq!(buf.token_estimate(), 10);
        assert!(buf.claim_if_due());
    }

    #[test]
    fn clear_empty_is_noop() {
        let mut buf = ContextBuffer::new(10, 1);
        buf.clear();
        assert_eq!(buf.generation(), 0);
        let _ = buf.append(item(3));
        buf.clear();
        assert_eq!(buf.generation(), 1);
        assert_eq!(buf.token_estimate(), 0);
    }

    #[test]
    fn recent_returns_tail_in_order() {
        let mut buf = ContextBuffer::new(100, 1);
        for n in 1..=5 {
            let _ = buf.append(item(n));
        }
        let tail: Vec<usize> = buf.recent(2).iter().map(|i| i.text.len()).collect();
        assert_eq!(tail, vec![4, 5]);
        assert_eq!(buf.recent(50).len(), 5);
    }

    proptest! {
        #[test]
        fn estimate_is_sum_of_items(lens in proptest::collection::vec(0usize..200, 0..40), cut in 0usize..40) {
            let mut buf = ContextBuffer::new(u64::MAX, 4);
            for (i, len) in lens.iter().enumerate() {
                let _ = buf.append(item(*len));
                if i == cut {
                    let snap = buf.capture();
                    let _ = buf.release(&snap);
                }
            }
            let expected: u64 = buf.items().iter().map(|i| estimate_tokens(&i.text, 4)).sum();
            prop_assert_eq!(buf.token_estimate(), expected);
        }
    }
}
