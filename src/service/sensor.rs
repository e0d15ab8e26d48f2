use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::debug;

use crate::config::SensorConfig;
use crate::event::{DetectedObject, Event, EventError, EventQueue, LslEvent};
use crate::eval::value::{normalize_key, Rotation, Value, Vector, NULL_KEY};

use super::{Service, ServiceStatus};

/// Sensor range ceiling in metres.
pub const MAX_RANGE: f64 = 96.0;

#[derive(Debug, Clone, PartialEq)]
pub struct SensorQuery {
    pub name: String,
    pub key: String,
    pub type_mask: i32,
    pub range: f64,
    pub arc: f64,
}

/// Where the sweep originates and which way it faces.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vantage {
    pub position: Vector,
    pub rotation: Rotation,
}

/// Simulated region contents plus the single repeating sweep.
pub struct SensorService {
    entities: Arc<DashMap<String, DetectedObject>>,
    queue: Arc<EventQueue>,
    max_results: usize,
    repeat: Mutex<Option<JoinHandle<()>>>,
}

impl SensorService {
    pub fn new(queue: Arc<EventQueue>, config: &SensorConfig) -> Self {
        let entities = DashMap::new();
        for entity in &config.entities {
            let key = entity
                .key
                .as_deref()
                .map(normalize_key)
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
            entities.insert(
                key.clone(),
                DetectedObject {
                    name: entity.name.clone(),
                    key: key.clone(),
                    owner: key,
                    object_type: entity.entity_type,
                    position: entity.position,
                    ..Default::default()
                },
            );
        }
        Self {
            entities: Arc::new(entities),
            queue,
            max_results: config.max_results,
            repeat: Mutex::new(None),
        }
    }

    /// Adds or moves an entity.
    pub fn place(&self, entity: DetectedObject) {
        debug!("place entity {} at {}", entity.name, entity.position);
        self.entities.insert(normalize_key(&entity.key), entity);
    }

    pub fn remove(&self, key: &str) -> bool {
        self.entities.remove(&normalize_key(key)).is_some()
    }

    pub fn entity(&self, key: &str) -> Option<DetectedObject> {
        self.entities.get(&normalize_key(key)).map(|e| e.clone())
    }

    pub fn find_by_name(&self, name: &str) -> Option<DetectedObject> {
        self.entities
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.value().clone())
    }

    /// Nearest matches first, capped at the configured result count.
    pub fn scan(&self, query: &SensorQuery, from: &Vantage) -> Vec<DetectedObject> {
        sweep(&self.entities, query, from, self.max_results)
    }

    /// One-shot sweep; the result arrives as `sensor` or `no_sensor`.
    pub fn sense(&self, query: &SensorQuery, from: &Vantage) -> Result<(), EventError> {
        self.queue.push(result_event(self.scan(query, from)))
    }

    /// Replaces any running repeat. `rate <= 0` only cancels.
    pub fn repeat(&self, query: SensorQuery, from: Vantage, rate: f64) {
        self.cancel();
        if !(rate > 0.0) || !rate.is_finite() {
            return;
        }
        let period = Duration::from_secs_f64(rate).max(Duration::from_millis(1));
        let epoch = self.queue.epoch();
        let queue = self.queue.clone();
        let entities = self.entities.clone();
        let max_results = self.max_results;

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if queue.contains(LslEvent::Sensor) || queue.contains(LslEvent::NoSensor) {
                    continue;
                }
                let found = sweep(&entities, &query, &from, max_results);
                match queue.push_in_epoch(result_event(found), epoch) {
                    Ok(()) | Err(EventError::QueueFull { .. }) => {}
                    Err(e) => {
                        debug!("sensor repeat stops: {}", e);
                        break;
                    }
                }
            }
        });
        *self.repeat.lock() = Some(handle);
    }

    pub fn cancel(&self) {
        if let Some(handle) = self.repeat.lock().take() {
            handle.abort();
            debug!("sensor repeat cancelled");
        }
    }

    pub fn is_repeating(&self) -> bool {
        self.repeat.lock().is_some()
    }
}

fn result_event(found: Vec<DetectedObject>) -> Event {
    if found.is_empty() {
        Event::new(LslEvent::NoSensor, vec![])
    } else {
        Event::new(LslEvent::Sensor, vec![Value::Integer(found.len() as i32)])
            .with_detected(found)
    }
}

fn sweep(
    entities: &DashMap<String, DetectedObject>,
    query: &SensorQuery,
    from: &Vantage,
    max_results: usize,
) -> Vec<DetectedObject> {
    let range = query.range.clamp(0.0, MAX_RANGE);
    let key_filter = normalize_key(&query.key);
    let forward = from.rotation.apply(&Vector::new(1.0, 0.0, 0.0));

    let mut hits: Vec<(f64, DetectedObject)> = entities
        .iter()
        .filter(|e| query.name.is_empty() || e.name == query.name)
        .filter(|e| key_filter == NULL_KEY || e.key == key_filter)
        .filter(|e| e.object_type & query.type_mask != 0)
        .filter_map(|e| {
            let offset = subtract(&e.position, &from.position);
            let distance = offset.magnitude();
            if distance > range {
                return None;
            }
            if query.arc < std::f64::consts::PI && distance > 0.0 {
                let cos = forward.dot(&offset) / distance;
                if cos.clamp(-1.0, 1.0).acos() > query.arc {
                    return None;
                }
            }
            Some((distance, e.value().clone()))
        })
        .collect();

    hits.sort_by(|a, b| a.0.total_cmp(&b.0));
    hits.into_iter()
        .take(max_results)
        .map(|(_, entity)| entity)
        .collect()
}

fn subtract(a: &Vector, b: &Vector) -> Vector {
    Vector::new(a.x - b.x, a.y - b.y, a.z - b.z)
}

#[async_trait]
impl Service for SensorService {
    fn name(&self) -> &'static str {
        "sensor"
    }

    fn status(&self) -> ServiceStatus {
        if self.is_repeating() {
            ServiceStatus::Active
        } else {
            ServiceStatus::Idle
        }
    }

    async fn stop(&self) {
        self.cancel();
    }
}
