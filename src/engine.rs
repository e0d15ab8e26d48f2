//! # Engine
//!
//! The façade a host program drives. It owns the script, the call stack with
//! its globals, the state machine and the [`HostEnv`], and runs the main loop
//! on a dedicated dispatch thread with its own current-thread runtime:
//!
//! ```text
//! loop {
//!     pop event ─┬─ none ──▶ wait (idle_poll_interval) or shutdown
//!                └─ some ──▶ handler for (current state, event)?
//!                              └─ run it ──▶ state change? ──▶ transition
//! }
//! ```
//!
//! A transition runs `state_exit`, discards pending events (advancing the
//! queue epoch), cancels the timer and sensor sweeps, optionally clears
//! listeners, switches state and queues `state_entry` at high priority.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{broadcast, oneshot};
use tracing::{debug, error, info, instrument, trace, warn};

use crate::analyzer::{load_ast_json, parse_script, ParseError};
use crate::ast::Script;
use crate::config::EngineConfig;
use crate::eval::{
    CallStack, EvalError, Evaluator, ExecutionContext, HandlerOutcome, Value, Vector,
};
use crate::event::{DetectedObject, Event, EventError, LslEvent, Priority};
use crate::host::{HostEnv, HostRegistry};
use crate::output::{Diagnostic, DiagnosticKind, OutputSink};
use crate::state_machine::StateMachine;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Engine already started")]
    AlreadyStarted,
    #[error("Engine is not running")]
    NotRunning,
    #[error("Main loop did not stop within {0:?}")]
    ShutdownTimeout(Duration),
    #[error("Failed to spawn the dispatch thread: {0}")]
    Spawn(String),
    #[error("Eval error: {0}")]
    Eval(#[from] EvalError),
    #[error("Event error: {0}")]
    Event(#[from] EventError),
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),
}

pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Stack of the thread handlers run on. Each nested LSL call polls several
/// boxed evaluator futures, so `max_call_depth` levels need far more than a
/// default 2 MiB thread stack in unoptimized builds.
pub const DISPATCH_STACK_SIZE: usize = 128 * 1024 * 1024;

/// Runs the future built by `make` to completion on a current-thread runtime
/// inside a new thread with [`DISPATCH_STACK_SIZE`] bytes of stack. Tasks the
/// future spawns (timers, sweeps, requests) live on that runtime.
pub fn spawn_on_dispatch_stack<F, Fut>(
    make: F,
) -> std::io::Result<std::thread::JoinHandle<std::io::Result<Fut::Output>>>
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future,
    Fut::Output: Send + 'static,
{
    std::thread::Builder::new()
        .name("linden-dispatch".to_string())
        .stack_size(DISPATCH_STACK_SIZE)
        .spawn(move || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?;
            Ok(runtime.block_on(make()))
        })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
pub enum EngineStatus {
    Created,
    Running,
    Stopped,
    Failed,
}

/// Which variables [`Engine::get_variables`] reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableScope {
    Global,
    /// The innermost frame of the running handler; empty between events.
    Local,
}

struct Inner {
    script: Arc<Script>,
    host: Arc<HostRegistry>,
    env: Arc<HostEnv>,
    stack: Arc<Mutex<CallStack>>,
    states: StateMachine,
    evaluator: Evaluator,
    status: RwLock<EngineStatus>,
    busy: AtomicBool,
    shutdown_tx: broadcast::Sender<()>,
}

struct MainLoop {
    thread: std::thread::JoinHandle<std::io::Result<()>>,
    done: oneshot::Receiver<()>,
}

pub struct Engine {
    inner: Arc<Inner>,
    main_loop: Mutex<Option<MainLoop>>,
}

impl Engine {
    pub fn new(script: Script, config: EngineConfig, sink: Arc<dyn OutputSink>) -> Self {
        let script = Arc::new(script);
        let (shutdown_tx, _) = broadcast::channel(1);
        let inner = Inner {
            states: StateMachine::new(script.clone()),
            script,
            host: Arc::new(HostRegistry::with_builtins()),
            env: Arc::new(HostEnv::new(config, sink)),
            stack: Arc::new(Mutex::new(CallStack::new())),
            evaluator: Evaluator::new(),
            status: RwLock::new(EngineStatus::Created),
            busy: AtomicBool::new(false),
            shutdown_tx,
        };
        Self {
            inner: Arc::new(inner),
            main_loop: Mutex::new(None),
        }
    }

    /// Accepts LSL source, or an AST as JSON when the text starts with `{`.
    pub fn from_source(
        source: &str,
        config: EngineConfig,
        sink: Arc<dyn OutputSink>,
    ) -> RuntimeResult<Self> {
        let script = if source.trim_start().starts_with('{') {
            load_ast_json(source)?
        } else {
            parse_script(source)?
        };
        Ok(Self::new(script, config, sink))
    }

    /// Initializes globals, queues `default.state_entry` and spawns the main
    /// loop on the dispatch thread.
    pub async fn start(&self) -> RuntimeResult<()> {
        if self.status() != EngineStatus::Created {
            return Err(RuntimeError::AlreadyStarted);
        }
        let context = self.inner.context(Vec::new());
        if let Err(e) = self
            .inner
            .evaluator
            .initialize_globals(&self.inner.script.globals, context)
            .await
        {
            self.inner.fail(&e);
            return Err(e.into());
        }
        self.inner.env.queue.push(
            Event::new(LslEvent::StateEntry, Vec::new()).with_priority(Priority::High),
        )?;
        *self.inner.status.write() = EngineStatus::Running;
        info!("engine started");

        let inner = self.inner.clone();
        let shutdown_rx = self.inner.shutdown_tx.subscribe();
        let (done_tx, done) = oneshot::channel();
        let spawned = spawn_on_dispatch_stack(move || async move {
            inner.run(shutdown_rx).await;
            let _ = done_tx.send(());
        });
        match spawned {
            Ok(thread) => {
                *self.main_loop.lock() = Some(MainLoop { thread, done });
                Ok(())
            }
            Err(e) => {
                error!("dispatch thread: {}", e);
                *self.inner.status.write() = EngineStatus::Failed;
                self.inner.env.queue.close();
                Err(RuntimeError::Spawn(e.to_string()))
            }
        }
    }

    /// Discards pending events, refuses new ones, stops background services
    /// and waits for the main loop to exit.
    pub async fn stop(&self) -> RuntimeResult<()> {
        let env = &self.inner.env;
        env.queue.close();
        let _ = self.inner.shutdown_tx.send(());

        let limit = env.config.shutdown_timeout;
        for e in env.services.shutdown(limit).await {
            warn!("{}", e);
        }

        let main_loop = self.main_loop.lock().take();
        let result = match main_loop {
            Some(MainLoop { thread, done }) => match tokio::time::timeout(limit, done).await {
                Ok(_) => {
                    match thread.join() {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => error!("dispatch runtime failed: {}", e),
                        Err(_) => error!("dispatch thread panicked"),
                    }
                    Ok(())
                }
                // The thread is left detached; it exits at its next shutdown check.
                Err(_) => Err(RuntimeError::ShutdownTimeout(limit)),
            },
            None => Ok(()),
        };

        let mut status = self.inner.status.write();
        if *status != EngineStatus::Failed {
            *status = EngineStatus::Stopped;
        }
        info!("engine stopped");
        result
    }

    pub fn status(&self) -> EngineStatus {
        *self.inner.status.read()
    }

    pub fn current_state(&self) -> String {
        self.inner.states.current()
    }

    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.inner.env.diagnostics()
    }

    pub fn env(&self) -> &HostEnv {
        &self.inner.env
    }

    pub fn script(&self) -> &Script {
        &self.inner.script
    }

    pub fn get_variables(&self, scope: VariableScope) -> BTreeMap<String, Value> {
        let stack = self.inner.stack.lock();
        match scope {
            VariableScope::Global => stack.globals(),
            VariableScope::Local => stack.top().map(|f| f.variables()).unwrap_or_default(),
        }
    }

    /// Queues a catalog event by name. Arguments are coerced to the
    /// catalog's parameter types; overflow is a warning, not an error.
    pub fn inject_event(&self, name: &str, args: Vec<Value>) -> RuntimeResult<()> {
        self.inject(Event::from_name(name, args)?)
    }

    pub fn inject_event_with_detected(
        &self,
        name: &str,
        args: Vec<Value>,
        detected: Vec<DetectedObject>,
    ) -> RuntimeResult<()> {
        self.inject(Event::from_name(name, args)?.with_detected(detected))
    }

    fn inject(&self, event: Event) -> RuntimeResult<()> {
        match self.inner.env.queue.push(event) {
            Ok(()) => Ok(()),
            Err(e @ EventError::QueueFull { .. }) => {
                self.inner.env.warn(DiagnosticKind::QueueOverflow, e.to_string());
                Ok(())
            }
            Err(EventError::QueueClosed) => Err(RuntimeError::NotRunning),
            Err(e) => Err(e.into()),
        }
    }

    /// Delivers chat heard on `channel`. Every matching listener produces a
    /// `listen` event; returns how many were queued.
    pub fn inject_channel_message(
        &self,
        channel: i32,
        name: &str,
        key: &str,
        message: &str,
    ) -> RuntimeResult<usize> {
        let handles = self
            .inner
            .env
            .listeners
            .matching(channel, name, key, message);
        for handle in &handles {
            trace!(handle, channel, "listen match");
            self.inject(Event::new(
                LslEvent::Listen,
                vec![
                    Value::Integer(channel),
                    Value::from(name),
                    Value::key(key),
                    Value::from(message),
                ],
            ))?;
        }
        Ok(handles.len())
    }

    fn avatar_beside_object(&self, name: &str, key: &str) -> DetectedObject {
        let position = self.inner.env.object().position;
        DetectedObject::avatar(
            name,
            key,
            Vector::new(position.x + 1.0, position.y, position.z),
        )
    }

    /// An avatar touches the object: `touch_start(1)` then `touch_end(1)`.
    pub fn inject_touch(&self, name: &str, key: &str) -> RuntimeResult<()> {
        let detected = vec![self.avatar_beside_object(name, key)];
        let touch = |kind: LslEvent| Event::new(kind, vec![Value::Integer(1)]);
        self.inject(touch(LslEvent::TouchStart).with_detected(detected.clone()))?;
        self.inject(touch(LslEvent::TouchEnd).with_detected(detected))
    }

    /// Places an avatar a metre from the object, where later sweeps can find
    /// it, and reports it at once with `sensor(1)`.
    pub fn sense_avatar(&self, name: &str, key: &str) -> RuntimeResult<()> {
        let avatar = self.avatar_beside_object(name, key);
        self.inner.env.sensors.place(avatar.clone());
        let event = Event::new(LslEvent::Sensor, vec![Value::Integer(1)]);
        self.inject(event.with_detected(vec![avatar]))
    }

    pub fn place_entity(&self, entity: DetectedObject) {
        self.inner.env.sensors.place(entity);
    }

    /// Waits until the queue is empty and no handler is running. Returns
    /// false on timeout.
    pub async fn wait_for_idle(&self, timeout: Duration) -> bool {
        let poll = self.inner.env.config.idle_poll_interval;
        let waited = tokio::time::timeout(timeout, async {
            loop {
                if self.inner.is_idle() {
                    break;
                }
                tokio::time::sleep(poll).await;
            }
        })
        .await;
        waited.is_ok()
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.inner.env.queue.close();
        let _ = self.inner.shutdown_tx.send(());
    }
}

impl Inner {
    fn context(&self, detected: Vec<DetectedObject>) -> Arc<ExecutionContext> {
        Arc::new(ExecutionContext::new(
            self.script.clone(),
            self.host.clone(),
            self.env.clone(),
            self.stack.clone(),
            detected,
        ))
    }

    fn is_idle(&self) -> bool {
        !self.busy.load(Ordering::SeqCst) && self.env.queue.is_empty()
    }

    fn fail(&self, e: &EvalError) {
        error!("script failed: {}", e);
        self.env.report(Diagnostic::error(DiagnosticKind::Fatal, e.to_string()));
        *self.status.write() = EngineStatus::Failed;
        self.env.queue.close();
    }

    async fn run(self: Arc<Self>, mut shutdown_rx: broadcast::Receiver<()>) {
        let poll = self.env.config.idle_poll_interval;
        loop {
            if *self.status.read() != EngineStatus::Running {
                break;
            }
            self.busy.store(true, Ordering::SeqCst);
            let next = self.env.queue.pop();
            match next {
                Some(event) => {
                    let result = self.dispatch(event).await;
                    self.busy.store(false, Ordering::SeqCst);
                    if let Err(e) = result {
                        self.fail(&e);
                        break;
                    }
                }
                None => {
                    self.busy.store(false, Ordering::SeqCst);
                    tokio::select! {
                        _ = shutdown_rx.recv() => {
                            debug!("main loop received shutdown");
                            break;
                        }
                        _ = self.env.queue.wait(poll) => {}
                    }
                }
            }
        }
        self.busy.store(false, Ordering::SeqCst);
    }

    #[instrument(level = "debug", skip(self, event), fields(event = %event.name()))]
    async fn dispatch(&self, event: Event) -> Result<(), EvalError> {
        let Some(handler) = self.states.handler(event.name()) else {
            trace!("no handler in state `{}`", self.states.current());
            return Ok(());
        };
        let context = self.context(event.detected.clone());
        let outcome = self
            .evaluator
            .eval_event_handler(handler, &event, context)
            .await?;
        if let HandlerOutcome::StateChange(target) = outcome {
            self.change_state(&target).await?;
        }
        Ok(())
    }

    async fn change_state(&self, target: &str) -> Result<(), EvalError> {
        if !self.states.check_transition(target)? {
            return Ok(());
        }
        if let Some(exit) = self.states.handler(LslEvent::StateExit.as_ref()) {
            let event = Event::new(LslEvent::StateExit, Vec::new());
            let outcome = self
                .evaluator
                .eval_event_handler(exit, &event, self.context(Vec::new()))
                .await?;
            if let HandlerOutcome::StateChange(ignored) = outcome {
                warn!("state change to `{}` inside state_exit ignored", ignored);
            }
        }

        let dropped = self.env.queue.clear_and_advance_epoch();
        self.env.timer.cancel();
        self.env.sensors.cancel();
        if self.env.config.clear_listeners_on_state_change {
            self.env.listeners.clear();
        }
        self.states.enter(target);
        debug!(dropped, "entered state `{}`", target);

        let entry = Event::new(LslEvent::StateEntry, Vec::new()).with_priority(Priority::High);
        if let Err(e) = self.env.queue.push(entry) {
            debug!("state_entry not queued: {}", e);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::MemorySink;
    use pretty_assertions::assert_eq;

    fn engine(source: &str) -> (Engine, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        let engine = Engine::from_source(source, EngineConfig::default(), sink.clone()).unwrap();
        (engine, sink)
    }

    #[tokio::test]
    async fn test_lifecycle() {
        let (engine, sink) = engine(r#"default { state_entry() { llSay(0, "up"); } }"#);
        assert_eq!(engine.status(), EngineStatus::Created);
        engine.start().await.unwrap();
        assert_eq!(engine.status(), EngineStatus::Running);
        assert!(engine.wait_for_idle(Duration::from_secs(1)).await);
        assert_eq!(sink.texts(), vec!["up"]);

        assert!(matches!(engine.start().await, Err(RuntimeError::AlreadyStarted)));
        engine.stop().await.unwrap();
        assert_eq!(engine.status(), EngineStatus::Stopped);
        assert!(matches!(
            engine.inject_event("touch_start", vec![Value::Integer(1)]),
            Err(RuntimeError::NotRunning)
        ));
    }

    #[tokio::test]
    async fn test_globals_persist_between_events() {
        let (engine, sink) = engine(
            r#"integer count;
               default { touch_start(integer n) { count += n; llSay(0, (string)count); } }"#,
        );
        engine.start().await.unwrap();
        engine.inject_event("touch_start", vec![Value::Integer(2)]).unwrap();
        engine.inject_event("touch_start", vec![Value::Integer(3)]).unwrap();
        assert!(engine.wait_for_idle(Duration::from_secs(1)).await);
        assert_eq!(sink.texts(), vec!["2", "5"]);
        assert_eq!(
            engine.get_variables(VariableScope::Global).get("count"),
            Some(&Value::Integer(5))
        );
        assert!(engine.get_variables(VariableScope::Local).is_empty());
        engine.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_state_exit_runs_before_entry() {
        let (engine, sink) = engine(
            r#"default {
                   state_entry() { llSay(0, "enter default"); state next; }
                   state_exit() { llSay(0, "exit default"); }
               }
               state next { state_entry() { llSay(0, "enter next"); } }"#,
        );
        engine.start().await.unwrap();
        assert!(engine.wait_for_idle(Duration::from_secs(1)).await);
        assert_eq!(
            sink.texts(),
            vec!["enter default", "exit default", "enter next"]
        );
        assert_eq!(engine.current_state(), "next");
        engine.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_same_state_is_noop() {
        let (engine, sink) = engine(
            r#"default {
                   state_entry() { llSay(0, "entry"); }
                   touch_start(integer n) { state default; }
                   state_exit() { llSay(0, "exit"); }
               }"#,
        );
        engine.start().await.unwrap();
        engine.inject_touch("Ava", "a0000000-0000-0000-0000-000000000001").unwrap();
        assert!(engine.wait_for_idle(Duration::from_secs(1)).await);
        assert_eq!(sink.texts(), vec!["entry"]);
        engine.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_fatal_error_fails_engine() {
        let (engine, sink) = engine(
            r#"integer f(integer n) { return f(n); }
               default { state_entry() { f(1); } touch_start(integer n) { llSay(0, "late"); } }"#,
        );
        engine.start().await.unwrap();
        assert!(engine.wait_for_idle(Duration::from_secs(5)).await);
        assert_eq!(engine.status(), EngineStatus::Failed);
        let diagnostics = sink.diagnostics();
        assert_eq!(diagnostics.last().unwrap().kind, DiagnosticKind::Fatal);
        engine.stop().await.unwrap();
        assert_eq!(engine.status(), EngineStatus::Failed);
    }

    #[tokio::test]
    async fn test_deep_recursion_completes() {
        let (engine, sink) = engine(
            r#"integer sum(integer n) { if (n <= 0) return 0; return n + sum(n - 1); }
               default { state_entry() { llSay(0, (string)sum(200)); } }"#,
        );
        engine.start().await.unwrap();
        assert!(engine.wait_for_idle(Duration::from_secs(5)).await);
        assert_eq!(engine.status(), EngineStatus::Running);
        assert_eq!(sink.texts(), vec!["20100"]);
        engine.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_touch_carries_detected() {
        let (engine, sink) = engine(
            r#"default { touch_start(integer n) { llSay(0, llDetectedName(0) + " " + (string)n); } }"#,
        );
        engine.start().await.unwrap();
        engine.inject_touch("Ava Example", "a0000000-0000-0000-0000-000000000001").unwrap();
        assert!(engine.wait_for_idle(Duration::from_secs(1)).await);
        assert_eq!(sink.texts(), vec!["Ava Example 1"]);
        engine.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_sense_avatar() {
        let (engine, sink) = engine(
            r#"default {
                   sensor(integer n) { llSay(0, llDetectedName(0) + " " + (string)n); }
                   touch_start(integer n) { llSensor("", NULL_KEY, AGENT, 10.0, PI); }
               }"#,
        );
        engine.start().await.unwrap();
        engine.sense_avatar("Bob", "b0000000-0000-0000-0000-000000000002").unwrap();
        assert!(engine.wait_for_idle(Duration::from_secs(1)).await);
        engine.inject_event("touch_start", vec![Value::Integer(1)]).unwrap();
        assert!(engine.wait_for_idle(Duration::from_secs(1)).await);
        assert_eq!(sink.texts(), vec!["Bob 1", "Bob 1"]);
        engine.stop().await.unwrap();
    }
}
