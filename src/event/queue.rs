use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::{debug, trace};

use super::{Event, EventError, EventResult, LslEvent, Priority};

/// Two-class FIFO shared between the main loop and every event producer.
///
/// The queue carries an epoch that advances on each state change. Producers
/// that schedule work on behalf of a state (timers, repeating sensors) push
/// with [`push_in_epoch`](EventQueue::push_in_epoch) so their ticks are
/// rejected once that state is left.
pub struct EventQueue {
    state: Mutex<QueueState>,
    notify: Notify,
    capacity: usize,
}

#[derive(Default)]
struct QueueState {
    high: VecDeque<Event>,
    normal: VecDeque<Event>,
    epoch: u64,
    closed: bool,
}

impl EventQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            notify: Notify::new(),
            capacity,
        }
    }

    pub fn push(&self, event: Event) -> EventResult<()> {
        let mut state = self.state.lock();
        self.push_locked(&mut state, event)
    }

    pub fn push_in_epoch(&self, event: Event, epoch: u64) -> EventResult<()> {
        let mut state = self.state.lock();
        if state.epoch != epoch {
            return Err(EventError::StaleEpoch {
                event: event.name().to_string(),
                epoch,
            });
        }
        self.push_locked(&mut state, event)
    }

    fn push_locked(&self, state: &mut QueueState, event: Event) -> EventResult<()> {
        if state.closed {
            return Err(EventError::QueueClosed);
        }
        match event.priority {
            Priority::High => state.high.push_back(event),
            Priority::Normal => {
                if state.normal.len() >= self.capacity {
                    return Err(EventError::QueueFull {
                        event: event.name().to_string(),
                        capacity: self.capacity,
                    });
                }
                trace!("enqueue {}", event.name());
                state.normal.push_back(event);
            }
        }
        self.notify.notify_one();
        Ok(())
    }

    pub fn pop(&self) -> Option<Event> {
        let mut state = self.state.lock();
        state.high.pop_front().or_else(|| state.normal.pop_front())
    }

    pub fn epoch(&self) -> u64 {
        self.state.lock().epoch
    }

    /// Drops every pending event and starts a new epoch. Returns the number
    /// of events discarded.
    pub fn clear_and_advance_epoch(&self) -> usize {
        let mut state = self.state.lock();
        let dropped = state.high.len() + state.normal.len();
        state.high.clear();
        state.normal.clear();
        state.epoch += 1;
        debug!("queue cleared ({} dropped), epoch {}", dropped, state.epoch);
        dropped
    }

    /// Refuses further pushes and discards what is pending.
    pub fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        state.high.clear();
        state.normal.clear();
        drop(state);
        self.notify.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    pub fn contains(&self, kind: LslEvent) -> bool {
        let state = self.state.lock();
        state
            .high
            .iter()
            .chain(state.normal.iter())
            .any(|e| e.kind == kind)
    }

    /// Withdraws every pending event of `kind`.
    pub fn remove(&self, kind: LslEvent) -> usize {
        let mut state = self.state.lock();
        let before = state.high.len() + state.normal.len();
        state.high.retain(|e| e.kind != kind);
        state.normal.retain(|e| e.kind != kind);
        before - (state.high.len() + state.normal.len())
    }

    pub fn len(&self) -> usize {
        let state = self.state.lock();
        state.high.len() + state.normal.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Waits until something is pushed or `timeout` elapses.
    pub async fn wait(&self, timeout: Duration) {
        let _ = tokio::time::timeout(timeout, self.notify.notified()).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::value::Value;

    fn event(kind: LslEvent) -> Event {
        Event::new(kind, vec![])
    }

    #[test]
    fn test_fifo_within_priority() {
        let queue = EventQueue::new(8);
        queue.push(event(LslEvent::Timer)).unwrap();
        queue
            .push(Event::new(LslEvent::TouchStart, vec![Value::Integer(1)]))
            .unwrap();
        queue
            .push(event(LslEvent::StateEntry).with_priority(Priority::High))
            .unwrap();

        assert_eq!(queue.pop().unwrap().kind, LslEvent::StateEntry);
        assert_eq!(queue.pop().unwrap().kind, LslEvent::Timer);
        assert_eq!(queue.pop().unwrap().kind, LslEvent::TouchStart);
        assert!(queue.pop().is_none());
    }

    #[test]
    fn test_capacity() {
        let queue = EventQueue::new(2);
        queue.push(event(LslEvent::Timer)).unwrap();
        queue.push(event(LslEvent::Timer)).unwrap();
        assert!(matches!(
            queue.push(event(LslEvent::Timer)),
            Err(EventError::QueueFull { capacity: 2, .. })
        ));
        // high priority bypasses the cap
        queue
            .push(event(LslEvent::StateEntry).with_priority(Priority::High))
            .unwrap();
        assert_eq!(queue.len(), 3);
    }

    #[test]
    fn test_epoch_rejects_stale() {
        let queue = EventQueue::new(8);
        let epoch = queue.epoch();
        queue.push(event(LslEvent::Timer)).unwrap();
        assert_eq!(queue.clear_and_advance_epoch(), 1);
        assert!(matches!(
            queue.push_in_epoch(event(LslEvent::Timer), epoch),
            Err(EventError::StaleEpoch { .. })
        ));
        queue
            .push_in_epoch(event(LslEvent::Timer), queue.epoch())
            .unwrap();
        assert!(queue.contains(LslEvent::Timer));
    }

    #[test]
    fn test_close() {
        let queue = EventQueue::new(8);
        queue.push(event(LslEvent::Timer)).unwrap();
        queue.close();
        assert!(queue.is_empty());
        assert_eq!(queue.push(event(LslEvent::Timer)), Err(EventError::QueueClosed));
    }

    #[tokio::test]
    async fn test_wait_wakes_on_push() {
        let queue = std::sync::Arc::new(EventQueue::new(8));
        let producer = queue.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            producer.push(Event::new(LslEvent::Timer, vec![])).unwrap();
        });
        let started = std::time::Instant::now();
        queue.wait(Duration::from_secs(5)).await;
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(queue.len(), 1);
    }
}
