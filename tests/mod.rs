mod engine_tests;
mod invariant_tests;
mod scenario_tests;

use std::sync::Arc;
use std::time::Duration;

use lazy_static::lazy_static;
use linden::{Engine, EngineConfig, MemorySink};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[ctor::ctor]
fn init_tests() {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

const RUN_LIVE_HTTP_TESTS: &str = "RUN_LIVE_HTTP_TESTS";

lazy_static! {
    pub static ref LIVE_HTTP_TESTS_ENABLED: bool = {
        match std::env::var(RUN_LIVE_HTTP_TESTS) {
            Ok(_) => true,
            Err(_) => {
                println!("Skipping live HTTP tests: RUN_LIVE_HTTP_TESTS not set");
                false
            }
        }
    };
}

pub fn should_run_live_http_tests() -> bool {
    *LIVE_HTTP_TESTS_ENABLED
}

pub async fn start_with(source: &str, config: EngineConfig) -> (Engine, Arc<MemorySink>) {
    let sink = Arc::new(MemorySink::new());
    let engine = Engine::from_source(source, config, sink.clone()).expect("script should parse");
    engine.start().await.expect("engine should start");
    (engine, sink)
}

pub async fn start(source: &str) -> (Engine, Arc<MemorySink>) {
    start_with(source, EngineConfig::default()).await
}

/// Waits for the queue to drain and no handler to be running.
pub async fn settle(engine: &Engine) {
    assert!(
        engine.wait_for_idle(Duration::from_secs(2)).await,
        "engine did not go idle"
    );
}

/// Lets timers and other background producers run for `ms` milliseconds.
pub async fn run_for(engine: &Engine, ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
    settle(engine).await;
}
