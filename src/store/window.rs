//! Per-chat monotonic queues for sliding-window queries
//!
//! Each chat keeps only the events inside the tracked horizon, oldest
//! first, so window counts are a binary search instead of a log scan.

use super::events::{RequestEvent, drain_expired, first_after, insert_ordered};
use crate::constants::window::TRACKED_MS;
use crate::types::{ChatKey, Timestamp};
use std::collections::{HashMap, VecDeque};

#[derive(Debug, Default, Clone)]
pub(crate) struct WindowIndex {
    chats: HashMap<ChatKey, VecDeque<RequestEvent>>,
    /// Queues may be missing entries with `timestamp <= pruned_through`
    pruned_through: Timestamp,
}

impl WindowIndex {
    /// Rebuild from a time-ordered log; each chat keeps the events within
    /// the horizon of its own newest entry
    pub(crate) fn from_log(log: &VecDeque<RequestEvent>) -> Self {
        let mut index = Self::default();
        for event in log {
            index.push(event);
        }
        index
    }

    /// Whether the queue for `chat` holds every event newer than `cutoff`
    ///
    /// Chats without a queue have no events inside the horizon, unless the
    /// cutoff reaches back past the last prune.
    pub(crate) fn covers(&self, chat: &ChatKey, cutoff: Timestamp) -> bool {
        cutoff >= self.pruned_through
            && self
                .chats
                .get(chat)
                .and_then(VecDeque::back)
                .is_none_or(|newest| newest.timestamp.saturating_sub(TRACKED_MS) <= cutoff)
    }

    /// Announce a prune up to `cutoff` before pruning queue by queue
    pub(crate) fn mark_pruned(&mut self, cutoff: Timestamp) {
        self.pruned_through = self.pruned_through.max(cutoff);
    }

    /// Add an event and drop that chat's entries older than the horizon
    pub(crate) fn push(&mut self, event: &RequestEvent) {
        let queue = self.chats.entry(event.chat.clone()).or_default();
        insert_ordered(queue, event.clone());
        let newest = queue.back().map_or(event.timestamp, |e| e.timestamp);
        drain_expired(queue, newest.saturating_sub(TRACKED_MS), usize::MAX);
    }

    /// Events for `chat` with `timestamp > now - window_ms`, oldest first
    pub(crate) fn recent(
        &self,
        chat: &ChatKey,
        window_ms: u64,
        now: Timestamp,
    ) -> impl Iterator<Item = &RequestEvent> {
        let cutoff = now.saturating_sub(window_ms);
        self.chats
            .get(chat)
            .into_iter()
            .flat_map(move |queue| queue.range(first_after(queue, cutoff)..))
    }

    /// Drop entries with `timestamp <= cutoff` for one chat; removes the
    /// queue when it empties
    pub(crate) fn prune_chat(&mut self, chat: &ChatKey, cutoff: Timestamp) -> usize {
        let Some(queue) = self.chats.get_mut(chat) else {
            return 0;
        };
        let removed = drain_expired(queue, cutoff, usize::MAX);
        if queue.is_empty() {
            self.chats.remove(chat);
        }
        removed
    }

    pub(crate) fn keys(&self) -> Vec<ChatKey> {
        self.chats.keys().cloned().collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.chats.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::window::MINUTE_MS;
    use crate::types::ChatType;

    fn event(chat: &str, ts: Timestamp) -> RequestEvent {
        RequestEvent::new(chat, ChatType::Private, "x", true, ts)
    }

    #[test]
    fn test_recent_is_exclusive_of_cutoff() {
        let mut index = WindowIndex::default();
        for ts in [1_000, 2_000, 3_000] {
            index.push(&event("a", ts));
        }
        let chat = ChatKey::new("a");
        // cutoff = 3000 - 2000 = 1000, so the event at 1000 is outside
        assert_eq!(index.recent(&chat, 2_000, 3_000).count(), 2);
        assert_eq!(index.recent(&chat, 10_000, 3_000).count(), 3);
    }

    #[test]
    fn test_push_drops_entries_beyond_horizon() {
        let mut index = WindowIndex::default();
        index.push(&event("a", 0));
        index.push(&event("a", TRACKED_MS + MINUTE_MS));
        let chat = ChatKey::new("a");
        assert_eq!(index.recent(&chat, u64::MAX, TRACKED_MS + MINUTE_MS).count(), 1);
    }

    #[test]
    fn test_unknown_chat_has_no_events() {
        let index = WindowIndex::default();
        assert_eq!(index.recent(&ChatKey::new("z"), MINUTE_MS, 0).count(), 0);
    }

    #[test]
    fn test_prune_chat_removes_empty_queue() {
        let mut index = WindowIndex::default();
        index.push(&event("a", 10));
        assert_eq!(index.prune_chat(&ChatKey::new("a"), 10), 1);
        assert_eq!(index.len(), 0);
    }

    #[test]
    fn test_covers_stops_below_prune_mark() {
        let mut index = WindowIndex::default();
        index.push(&event("a", 10));
        index.mark_pruned(MINUTE_MS);
        index.prune_chat(&ChatKey::new("a"), MINUTE_MS);

        assert!(index.covers(&ChatKey::new("a"), MINUTE_MS));
        assert!(!index.covers(&ChatKey::new("a"), MINUTE_MS - 1));
        // A lower mark never lowers the watermark
        index.mark_pruned(0);
        assert!(!index.covers(&ChatKey::new("a"), 0));
    }

    #[test]
    fn test_covers_within_horizon() {
        let mut index = WindowIndex::default();
        index.push(&event("a", TRACKED_MS + MINUTE_MS));
        let chat = ChatKey::new("a");
        assert!(index.covers(&chat, MINUTE_MS));
        assert!(!index.covers(&chat, MINUTE_MS - 1));
        assert!(index.covers(&ChatKey::new("b"), 0));
    }

    #[test]
    fn test_from_log_keeps_horizon_of_newest() {
        let log: VecDeque<RequestEvent> = VecDeque::from(vec![
            event("a", 0),
            event("b", MINUTE_MS),
            event("a", TRACKED_MS + MINUTE_MS / 2),
        ]);
        let index = WindowIndex::from_log(&log);
        assert_eq!(index.len(), 2);
        let now = TRACKED_MS + MINUTE_MS / 2;
        assert_eq!(index.recent(&ChatKey::new("a"), u64::MAX, now).count(), 1);
        assert_eq!(index.recent(&ChatKey::new("b"), u64::MAX, now).count(), 1);
    }
}
