use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, warn};

use crate::config::EngineConfig;
use crate::event::{Event, EventError, EventQueue};
use crate::eval::value::{normalize_key, Rotation, Vector, NULL_KEY};
use crate::output::{ChatMessage, ChatVolume, Diagnostic, DiagnosticKind, OutputSink, Severity};
use crate::service::{
    dataserver::DataserverService, http::HttpService, listener::ListenerTable,
    sensor::{SensorService, Vantage}, timer::TimerService, ServiceRegistry,
};

/// Mutable properties of the object the script lives in.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectState {
    pub name: String,
    pub description: String,
    pub key: String,
    pub owner_key: String,
    pub owner_name: String,
    pub position: Vector,
    pub rotation: Rotation,
    pub region: String,
    pub script_name: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Permissions {
    pub mask: i32,
    pub agent: String,
}

impl Default for Permissions {
    fn default() -> Self {
        Self {
            mask: 0,
            agent: NULL_KEY.to_string(),
        }
    }
}

/// Everything host functions may touch: object state, services, the queue
/// and the output sink. Shared by the engine and every evaluation.
pub struct HostEnv {
    pub config: EngineConfig,
    pub sink: Arc<dyn OutputSink>,
    pub queue: Arc<EventQueue>,
    pub timer: Arc<TimerService>,
    pub listeners: ListenerTable,
    pub sensors: Arc<SensorService>,
    pub http: Arc<HttpService>,
    pub dataserver: Arc<DataserverService>,
    pub services: ServiceRegistry,
    object: RwLock<ObjectState>,
    clock: Mutex<Instant>,
    permissions: Mutex<Permissions>,
    diagnostics: Mutex<Vec<Diagnostic>>,
}

impl HostEnv {
    pub fn new(config: EngineConfig, sink: Arc<dyn OutputSink>) -> Self {
        let queue = Arc::new(EventQueue::new(config.queue_capacity));
        let timer = Arc::new(TimerService::new(queue.clone()));
        let sensors = Arc::new(SensorService::new(queue.clone(), &config.sensor));
        let http = Arc::new(HttpService::new(queue.clone(), config.http.clone()));
        let dataserver = Arc::new(DataserverService::new(
            queue.clone(),
            config.dataserver_delay,
            config.notecards.clone(),
            config.notecard_dir.clone(),
        ));

        let mut services = ServiceRegistry::new();
        services.register(timer.clone());
        services.register(sensors.clone());
        services.register(http.clone());
        services.register(dataserver.clone());

        let generated = || uuid::Uuid::new_v4().to_string();
        let o = &config.object;
        let object = ObjectState {
            name: o.name.clone(),
            description: o.description.clone(),
            key: o.key.as_deref().map(normalize_key).unwrap_or_else(generated),
            owner_key: o.owner_key.as_deref().map(normalize_key).unwrap_or_else(generated),
            owner_name: o.owner_name.clone(),
            position: o.position,
            rotation: o.rotation,
            region: o.region.clone(),
            script_name: o.script_name.clone(),
            text: String::new(),
        };

        Self {
            config,
            sink,
            queue,
            timer,
            listeners: ListenerTable::new(),
            sensors,
            http,
            dataserver,
            services,
            object: RwLock::new(object),
            clock: Mutex::new(Instant::now()),
            permissions: Mutex::new(Permissions::default()),
            diagnostics: Mutex::new(Vec::new()),
        }
    }

    pub fn object(&self) -> ObjectState {
        self.object.read().clone()
    }

    pub fn update_object<F: FnOnce(&mut ObjectState)>(&self, f: F) {
        f(&mut self.object.write());
    }

    /// Emits chat from the object.
    pub fn chat(&self, channel: i32, text: &str, volume: ChatVolume) {
        self.send(channel, text, volume, None);
    }

    pub fn direct(&self, target: &str, channel: i32, text: &str) {
        self.send(channel, text, ChatVolume::Direct, Some(normalize_key(target)));
    }

    fn send(&self, channel: i32, text: &str, volume: ChatVolume, target: Option<String>) {
        let object = self.object.read();
        let message = ChatMessage {
            channel,
            speaker_name: object.name.clone(),
            speaker_key: object.key.clone(),
            text: text.to_string(),
            volume,
            target,
            sent_at: Utc::now(),
        };
        drop(object);
        debug!("chat [{}] {}: {}", channel, message.speaker_name, text);
        self.sink.deliver(&message);
    }

    pub fn report(&self, diagnostic: Diagnostic) {
        match diagnostic.severity {
            Severity::Warning => warn!("{}: {}", diagnostic.kind, diagnostic.message),
            Severity::Error => error!("{}: {}", diagnostic.kind, diagnostic.message),
        }
        self.sink.report(&diagnostic);
        self.diagnostics.lock().push(diagnostic);
    }

    pub fn warn(&self, kind: DiagnosticKind, message: impl Into<String>) {
        self.report(Diagnostic::warning(kind, message));
    }

    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.diagnostics.lock().clone()
    }

    /// Pushes an event; overflow is reported and the event dropped.
    pub fn enqueue(&self, event: Event) -> bool {
        match self.queue.push(event) {
            Ok(()) => true,
            Err(e @ EventError::QueueFull { .. }) => {
                self.warn(DiagnosticKind::QueueOverflow, e.to_string());
                false
            }
            Err(e) => {
                debug!("event not enqueued: {}", e);
                false
            }
        }
    }

    pub fn vantage(&self) -> Vantage {
        let object = self.object.read();
        Vantage {
            position: object.position,
            rotation: object.rotation,
        }
    }

    /// Display name for a key the object knows about, else "".
    pub fn key_name(&self, key: &str) -> String {
        let key = normalize_key(key);
        let object = self.object.read();
        if key == object.key {
            return object.name.clone();
        }
        if key == object.owner_key {
            return object.owner_name.clone();
        }
        drop(object);
        self.sensors
            .entity(&key)
            .map(|e| e.name)
            .unwrap_or_default()
    }

    /// Seconds since start or the last reset.
    pub fn script_time(&self) -> f64 {
        self.clock.lock().elapsed().as_secs_f64()
    }

    /// Resets the script clock, returning the time elapsed before.
    pub fn reset_time(&self) -> f64 {
        let mut clock = self.clock.lock();
        let elapsed = clock.elapsed().as_secs_f64();
        *clock = Instant::now();
        elapsed
    }

    pub fn permissions(&self) -> Permissions {
        self.permissions.lock().clone()
    }

    pub fn grant_permissions(&self, agent: &str, mask: i32) {
        *self.permissions.lock() = Permissions {
            mask,
            agent: normalize_key(agent),
        };
    }
}
