//! # Events
//!
//! Everything the engine dispatches to script handlers is an [`Event`]: a
//! catalog name, positional arguments, and (for touches, collisions and
//! sensor sweeps) the detected-object table that `llDetected*` reads.
//!
//! ```text
//! ┌──────────────┐  push   ┌────────────┐  pop   ┌───────────┐
//! │ host / timer │────────▶│ EventQueue │───────▶│ main loop │
//! │ http / input │         └────────────┘        └───────────┘
//! └──────────────┘
//! ```
//!
//! Producers never touch script state; they only enqueue.

pub mod catalog;
pub mod queue;

pub use catalog::LslEvent;
pub use queue::EventQueue;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::eval::value::{Rotation, Value, Vector, NULL_KEY};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, strum::Display)]
pub enum Priority {
    /// `state_entry` of a freshly entered state.
    High,
    #[default]
    Normal,
}

/// One row of the detected-object table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedObject {
    pub name: String,
    pub key: String,
    pub owner: String,
    pub object_type: i32,
    pub position: Vector,
    pub rotation: Rotation,
    pub velocity: Vector,
}

impl DetectedObject {
    pub fn avatar(name: &str, key: &str, position: Vector) -> Self {
        Self {
            name: name.to_string(),
            key: key.to_string(),
            owner: key.to_string(),
            object_type: crate::eval::constants::AGENT,
            position,
            rotation: Rotation::IDENTITY,
            velocity: Vector::ZERO,
        }
    }
}

impl Default for DetectedObject {
    fn default() -> Self {
        Self {
            name: String::new(),
            key: NULL_KEY.to_string(),
            owner: NULL_KEY.to_string(),
            object_type: 0,
            position: Vector::ZERO,
            rotation: Rotation::IDENTITY,
            velocity: Vector::ZERO,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub kind: LslEvent,
    pub args: Vec<Value>,
    pub enqueued_at: DateTime<Utc>,
    pub priority: Priority,
    pub detected: Vec<DetectedObject>,
}

impl Event {
    pub fn new(kind: LslEvent, args: Vec<Value>) -> Self {
        Self {
            kind,
            args,
            enqueued_at: Utc::now(),
            priority: Priority::Normal,
            detected: Vec::new(),
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_detected(mut self, detected: Vec<DetectedObject>) -> Self {
        self.detected = detected;
        self
    }

    pub fn name(&self) -> &str {
        self.kind.as_ref()
    }

    /// Builds an event from a catalog name, coercing arguments to the declared
    /// parameter types and filling missing ones with defaults.
    pub fn from_name(name: &str, args: Vec<Value>) -> EventResult<Self> {
        let kind =
            LslEvent::lookup(name).ok_or_else(|| EventError::UnknownEvent(name.to_string()))?;
        let params = kind.params();
        let mut args = args;
        if args.len() > params.len() {
            args.truncate(params.len());
        }
        let args = params
            .iter()
            .enumerate()
            .map(|(i, ty)| match args.get(i) {
                Some(v) => v.coerce(*ty),
                None => Value::default_of(*ty),
            })
            .collect();
        Ok(Event::new(kind, args))
    }
}

pub type EventResult<T> = Result<T, EventError>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum EventError {
    #[error("Unknown event: {0}")]
    UnknownEvent(String),
    #[error("Event queue is closed")]
    QueueClosed,
    #[error("Event queue is full ({capacity} pending), dropped `{event}`")]
    QueueFull { event: String, capacity: usize },
    #[error("Stale event `{event}` from epoch {epoch} dropped")]
    StaleEpoch { event: String, epoch: u64 },
}
