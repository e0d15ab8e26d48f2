use std::sync::atomic::{AtomicI32, Ordering};

use dashmap::DashMap;
use tracing::debug;

use crate::eval::value::{normalize_key, NULL_KEY};

/// Maximum concurrent listeners per script.
pub const MAX_LISTENERS: usize = 65;

#[derive(Debug, Clone, PartialEq)]
pub struct Listener {
    pub channel: i32,
    pub name: String,
    pub key: String,
    pub message: String,
    pub active: bool,
}

impl Listener {
    /// Empty name or message and a null key match anything.
    pub fn matches(&self, channel: i32, name: &str, key: &str, message: &str) -> bool {
        self.active
            && self.channel == channel
            && (self.name.is_empty() || self.name == name)
            && (self.key == NULL_KEY || self.key == normalize_key(key))
            && (self.message.is_empty() || self.message == message)
    }
}

/// `llListen` subscriptions, keyed by handle. Handles start at 1.
#[derive(Debug)]
pub struct ListenerTable {
    listeners: DashMap<i32, Listener>,
    next_handle: AtomicI32,
}

impl Default for ListenerTable {
    fn default() -> Self {
        Self {
            listeners: DashMap::new(),
            next_handle: AtomicI32::new(1),
        }
    }
}

impl ListenerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the new handle, or `None` when the table is full.
    pub fn add(&self, channel: i32, name: &str, key: &str, message: &str) -> Option<i32> {
        if self.listeners.len() >= MAX_LISTENERS {
            return None;
        }
        let handle = self.next_handle.fetch_add(1, Ordering::SeqCst);
        self.listeners.insert(
            handle,
            Listener {
                channel,
                name: name.to_string(),
                key: normalize_key(key),
                message: message.to_string(),
                active: true,
            },
        );
        debug!("listen {} on channel {}", handle, channel);
        Some(handle)
    }

    pub fn remove(&self, handle: i32) -> bool {
        self.listeners.remove(&handle).is_some()
    }

    pub fn set_active(&self, handle: i32, active: bool) -> bool {
        match self.listeners.get_mut(&handle) {
            Some(mut listener) => {
                listener.active = active;
                true
            }
            None => false,
        }
    }

    pub fn clear(&self) {
        self.listeners.clear();
    }

    /// Handles of active listeners that accept the message, in handle order.
    pub fn matching(&self, channel: i32, name: &str, key: &str, message: &str) -> Vec<i32> {
        let mut handles: Vec<i32> = self
            .listeners
            .iter()
            .filter(|entry| entry.value().matches(channel, name, key, message))
            .map(|entry| *entry.key())
            .collect();
        handles.sort_unstable();
        handles
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}
