// Copyright (C) 2022 Yehowshua Immanuel
// This program is distributed under both the GPLV3 license
// and the YEHOWSHUA license, both of which can be found at
// the root of the folder containing the sources for this program.

//! Multi-subscriber notifications for a running parse.
//!
//! Callbacks run on the parse worker thread. Subscribers that need the event
//! somewhere else forward it themselves, e.g. over a channel.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use super::{lock, ParseState};

#[derive(Debug, Clone, PartialEq)]
pub enum ParseEvent {
    State(ParseState),
    /// Fraction of the whole two-pass parse done so far, in `[0, 1]`.
    Progress(f64),
    /// Human readable label of the current step.
    Operation(String),
    /// Text of a `$comment` block met in the header.
    Comment(String),
    Finished,
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Callback = Arc<dyn Fn(&ParseEvent) + Send + Sync>;

#[derive(Default)]
pub(crate) struct EventBus {
    next_id: AtomicU64,
    subscribers: Mutex<Vec<(SubscriptionId, Callback)>>,
}

impl EventBus {
    pub(crate) fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&ParseEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        lock(&self.subscribers).push((id, Arc::new(callback)));
        id
    }

    pub(crate) fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = lock(&self.subscribers);
        let before = subscribers.len();
        subscribers.retain(|(sub_id, _)| *sub_id != id);
        subscribers.len() != before
    }

    pub(crate) fn publish(&self, event: &ParseEvent) {
        // callbacks are free to (un)subscribe, so call them on a snapshot
        // taken outside the lock
        let callbacks: Vec<Callback> = lock(&self.subscribers)
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();
        for callback in callbacks {
            callback(event);
        }
    }
}
