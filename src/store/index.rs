//! Chat aggregate index
//!
//! Derived per-chat summaries, updated only from inside the store's write
//! path so that they can never drift from the recorded events.

use super::aggregate::ChatAggregate;
use super::events::RequestEvent;
use crate::types::{ChatKey, ChatType, Platform, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Default, Clone)]
pub(crate) struct ChatIndex {
    chats: HashMap<ChatKey, ChatAggregate>,
}

impl ChatIndex {
    pub(crate) fn from_aggregates(aggregates: impl IntoIterator<Item = ChatAggregate>) -> Self {
        Self {
            chats: aggregates
                .into_iter()
                .map(|agg| (agg.chat.clone(), agg))
                .collect(),
        }
    }

    /// Update (or create) the aggregate for the event's chat
    pub(crate) fn apply(&mut self, event: &RequestEvent) {
        self.chats
            .entry(event.chat.clone())
            .or_insert_with(|| ChatAggregate::empty(event.chat.clone()))
            .apply(event);
    }

    /// Aggregate for a chat; a zero-valued aggregate for unknown chats
    pub(crate) fn get(&self, chat: &ChatKey) -> ChatAggregate {
        self.chats
            .get(chat)
            .cloned()
            .unwrap_or_else(|| ChatAggregate::empty(chat.clone()))
    }

    pub(crate) fn contains(&self, chat: &ChatKey) -> bool {
        self.chats.contains_key(chat)
    }

    /// Most active chats: `total_requests` descending, then chat key ascending
    pub(crate) fn top_n(&self, n: usize) -> Vec<ChatAggregate> {
        let mut ranked: Vec<&ChatAggregate> = self.chats.values().collect();
        ranked.sort_by(|a, b| {
            b.total_requests
                .cmp(&a.total_requests)
                .then_with(|| a.chat.cmp(&b.chat))
        });
        ranked.into_iter().take(n).cloned().collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.chats.len()
    }

    pub(crate) fn keys(&self) -> Vec<ChatKey> {
        self.chats.keys().cloned().collect()
    }

    /// Remove a chat if `last_seen <= cutoff`
    pub(crate) fn remove_if_stale(&mut self, chat: &ChatKey, cutoff: Timestamp) -> bool {
        match self.chats.get(chat) {
            Some(agg) if agg.last_seen <= cutoff => {
                self.chats.remove(chat);
                true
            }
            _ => false,
        }
    }

    /// Aggregates sorted by chat key, for stable serialization
    pub(crate) fn sorted(&self) -> Vec<ChatAggregate> {
        let mut all: Vec<ChatAggregate> = self.chats.values().cloned().collect();
        all.sort_by(|a, b| a.chat.cmp(&b.chat));
        all
    }

    /// Totals summed over the aggregates still in the index
    ///
    /// Each chat's requests count under its latest chat type. Used to seed
    /// the store totals from collections persisted without them.
    pub(crate) fn totals(&self) -> RequestTotals {
        let mut totals = RequestTotals::default();
        for agg in self.chats.values() {
            totals.total += agg.total_requests;
            totals.successful += agg.successful_requests;
            totals.failed += agg.failed_requests;
            *totals.by_chat_type.entry(agg.chat_type).or_insert(0) += agg.total_requests;
            for (platform, count) in &agg.platform_breakdown {
                *totals.by_platform.entry(platform.clone()).or_insert(0) += count;
            }
        }
        totals
    }
}

/// All-time request counts across all chats
///
/// Kept by the store next to the aggregates; retention removes stale chat
/// aggregates but never rolls these counts back.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestTotals {
    pub total: u64,
    pub successful: u64,
    pub failed: u64,
    #[serde(default)]
    pub by_platform: BTreeMap<Platform, u64>,
    #[serde(default)]
    pub by_chat_type: BTreeMap<ChatType, u64>,
}

impl RequestTotals {
    pub(crate) fn apply(&mut self, event: &RequestEvent) {
        self.total += 1;
        if event.success {
            self.successful += 1;
        } else {
            self.failed += 1;
        }
        *self.by_platform.entry(event.platform.clone()).or_insert(0) += 1;
        *self.by_chat_type.entry(event.chat_type).or_insert(0) += 1;
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.total == 0
    }
}
