use std::collections::VecDeque;

use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::{errors::Error, Result};

/// Configured trigger substrings.
///
/// A message matches when any trigger occurs in it under a case-insensitive
/// comparison. Blank triggers are dropped at construction.
#[derive(Clone, Debug)]
pub struct TriggerSet {
    lowered: Vec<String>,
}

impl TriggerSet {
    pub fn new<I, S>(triggers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let lowered = triggers
            .into_iter()
            .map(|s| s.as_ref().trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();
        Self { lowered }
    }

    /// True if any trigger is a case-insensitive substring of `text`.
    pub fn matches(&self, text: &str) -> bool {
        if self.lowered.is_empty() {
            return false;
        }
        let text = text.to_lowercase();
        self.lowered.iter().any(|t| text.contains(t))
    }
}

/// Fixed reply catalog plus a bounded window of recently used indices.
///
/// `select_reply` draws a uniformly random index and rejection-samples until
/// it lands outside the recent window, so the bot does not repeat the same
/// line back-to-back. The window capacity is clamped to `len - 1` at
/// construction; at full `len` the sampling loop would never find an
/// eligible index.
///
/// Not safe for unsynchronized concurrent use: callers that can observe
/// concurrent events must serialize access (the `Responder` holds the pool
/// behind a mutex).
pub struct ReplyPool {
    replies: Vec<String>,
    recent: VecDeque<usize>,
    capacity: usize,
    rng: StdRng,
}

impl ReplyPool {
    pub fn new(replies: Vec<String>, window: usize) -> Result<Self> {
        Self::with_rng(replies, window, StdRng::from_entropy())
    }

    /// Constructor taking an explicit generator, used by tests for
    /// deterministic sequences. Each pool owns its generator; nothing is
    /// shared across bot identities.
    pub fn with_rng(replies: Vec<String>, window: usize, rng: StdRng) -> Result<Self> {
        if replies.is_empty() {
            return Err(Error::Config(
                "reply catalog must contain at least one line".to_string(),
            ));
        }
        let capacity = window.min(replies.len() - 1);
        Ok(Self {
            replies,
            recent: VecDeque::with_capacity(capacity),
            capacity,
            rng,
        })
    }

    /// Pick a reply outside the recent window and record the pick, evicting
    /// the oldest entry once the window is full.
    pub fn select_reply(&mut self) -> &str {
        let n = self.replies.len();

        // Degenerate pools (single line, or no window) carry no repetition
        // constraint; skipping the loop keeps selection total.
        if self.capacity == 0 || n <= 1 {
            let idx = self.rng.gen_range(0..n);
            return &self.replies[idx];
        }

        let idx = loop {
            let candidate = self.rng.gen_range(0..n);
            if !self.recent.contains(&candidate) {
                break candidate;
            }
        };

        if self.recent.len() == self.capacity {
            self.recent.pop_front();
        }
        self.recent.push_back(idx);
        &self.replies[idx]
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn pool(n: usize, window: usize, seed: u64) -> ReplyPool {
        let replies = (0..n).map(|i| format!("reply-{i}")).collect();
        ReplyPool::with_rng(replies, window, StdRng::seed_from_u64(seed)).unwrap()
    }

    fn index_of(reply: &str) -> usize {
        reply.strip_prefix("reply-").unwrap().parse().unwrap()
    }

    #[test]
    fn empty_catalog_is_rejected() {
        assert!(ReplyPool::new(Vec::new(), 3).is_err());
    }

    #[test]
    fn recent_picks_stay_distinct() {
        let mut pool = pool(5, 3, 42);
        let mut picked = Vec::new();
        for _ in 0..200 {
            picked.push(index_of(pool.select_reply()));
            let tail: Vec<usize> = picked.iter().rev().take(3).copied().collect();
            let unique: HashSet<usize> = tail.iter().copied().collect();
            assert_eq!(unique.len(), tail.len(), "window repeated in {picked:?}");
        }
    }

    #[test]
    fn oversized_window_is_clamped_and_terminates() {
        // Window 10 over 3 lines clamps to 2, leaving one eligible index per
        // call; selection must still terminate on every call.
        let mut pool = pool(3, 10, 7);
        let mut picked = Vec::new();
        for _ in 0..100 {
            picked.push(index_of(pool.select_reply()));
            let tail: Vec<usize> = picked.iter().rev().take(2).copied().collect();
            let unique: HashSet<usize> = tail.iter().copied().collect();
            assert_eq!(unique.len(), tail.len());
        }
    }

    #[test]
    fn single_line_catalog_always_answers() {
        let mut pool = pool(1, 5, 1);
        for _ in 0..10 {
            assert_eq!(pool.select_reply(), "reply-0");
        }
    }

    #[test]
    fn zero_window_terminates_and_may_repeat() {
        let mut pool = pool(2, 0, 3);
        for _ in 0..50 {
            index_of(pool.select_reply());
        }
    }

    #[test]
    fn trigger_match_is_case_insensitive_substring() {
        let triggers = TriggerSet::new(["hello", "ПрИвЕт"]);
        assert!(triggers.matches("HELLO world"));
        assert!(triggers.matches("ну привет тебе"));
        assert!(!triggers.matches("goodbye"));
    }

    #[test]
    fn empty_trigger_set_never_matches() {
        let triggers = TriggerSet::new(Vec::<String>::new());
        assert!(!triggers.matches("anything at all"));
    }

    #[test]
    fn blank_triggers_are_dropped() {
        let triggers = TriggerSet::new(["  ", "", "ping"]);
        assert!(triggers.matches("PING"));
        assert!(!triggers.matches("   "));
    }
}
