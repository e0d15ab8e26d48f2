use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::debug;

use crate::event::{Event, EventError, EventQueue, LslEvent};

use super::{Service, ServiceStatus};

/// Shortest accepted timer period.
const MIN_PERIOD: Duration = Duration::from_millis(1);

/// The script's single repeating timer.
///
/// Ticks are pushed in the queue epoch that was current when the timer was
/// set, and are coalesced: no `timer` is enqueued while one is still pending.
pub struct TimerService {
    queue: Arc<EventQueue>,
    task: Mutex<Option<JoinHandle<()>>>,
    period: Mutex<Option<Duration>>,
}

impl TimerService {
    pub fn new(queue: Arc<EventQueue>) -> Self {
        Self {
            queue,
            task: Mutex::new(None),
            period: Mutex::new(None),
        }
    }

    /// `seconds <= 0` cancels.
    pub fn set(&self, seconds: f64) {
        self.cancel();
        if !(seconds > 0.0) || !seconds.is_finite() {
            return;
        }
        let period = Duration::from_secs_f64(seconds).max(MIN_PERIOD);
        let epoch = self.queue.epoch();
        let queue = self.queue.clone();
        debug!("timer set: {:?} (epoch {})", period, epoch);

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if queue.contains(LslEvent::Timer) {
                    continue;
                }
                match queue.push_in_epoch(Event::new(LslEvent::Timer, vec![]), epoch) {
                    Ok(()) | Err(EventError::QueueFull { .. }) => {}
                    Err(e) => {
                        debug!("timer stops: {}", e);
                        break;
                    }
                }
            }
        });
        *self.task.lock() = Some(handle);
        *self.period.lock() = Some(period);
    }

    /// Stops ticking and withdraws a tick that is still pending.
    pub fn cancel(&self) {
        if let Some(handle) = self.task.lock().take() {
            handle.abort();
            let withdrawn = self.queue.remove(LslEvent::Timer);
            debug!("timer cancelled ({} pending tick withdrawn)", withdrawn);
        }
        *self.period.lock() = None;
    }

    pub fn period(&self) -> Option<Duration> {
        *self.period.lock()
    }
}

#[async_trait]
impl Service for TimerService {
    fn name(&self) -> &'static str {
        "timer"
    }

    fn status(&self) -> ServiceStatus {
        if self.period().is_some() {
            ServiceStatus::Active
        } else {
            ServiceStatus::Idle
        }
    }

    async fn stop(&self) {
        self.cancel();
    }
}
