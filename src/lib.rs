//! # Linden: an LSL execution engine
//!
//! Linden runs Linden Scripting Language scripts outside a virtual world. A
//! script is a set of states, each a bundle of event handlers; the engine
//! keeps one state current, feeds it events one at a time and lets host
//! functions (`llSay`, `llSetTimerEvent`, `llHTTPRequest`, ...) act on a
//! simulated object.
//!
//! ## Pipeline
//!
//! ```text
//! Source → Tokenizer → Parser → Validation → AST → Engine (event loop + evaluator)
//! ```
//!
//! * [`tokenizer`] turns source text into tokens with `nom`.
//! * [`analyzer`] builds the [`ast::Script`] and checks it against the event
//!   catalog. An AST produced elsewhere can be loaded as JSON instead.
//! * [`eval`] walks the AST: values, coercions, operators, frames.
//! * [`event`] holds the catalog and the priority queue handlers are fed from.
//! * [`host`] is the built-in function library, [`service`] the background
//!   producers behind it (timer, sensors, HTTP, dataserver, listeners).
//! * [`engine`] ties it together and owns the single-threaded main loop.
//!
//! ## Execution model
//!
//! Handlers run to completion one at a time. Background services never touch
//! script state; they only enqueue events. A `state` change runs `state_exit`,
//! discards everything pending, cancels the timer and sensors, then queues the
//! new state's `state_entry` ahead of anything else.
//!
//! ```no_run
//! use std::sync::Arc;
//! use linden::{Engine, EngineConfig, StdoutSink};
//!
//! # async fn run() -> linden::InternalResult<()> {
//! let source = r#"default { state_entry() { llSay(0, "Hello"); } }"#;
//! let sink = Arc::new(StdoutSink::default());
//! let engine = Engine::from_source(source, EngineConfig::default(), sink)?;
//! engine.start().await?;
//! engine.wait_for_idle(std::time::Duration::from_secs(1)).await;
//! engine.stop().await?;
//! # Ok(())
//! # }
//! ```

pub mod analyzer;
pub mod ast;
pub mod config;
pub mod engine;
pub mod error;
pub mod eval;
pub mod event;
pub mod host;
pub mod output;
pub mod service;
pub mod state_machine;
pub mod tokenizer;

// Re-exports
pub use analyzer::{load_ast_json, parse_script};
pub use config::EngineConfig;
pub use engine::{Engine, EngineStatus, RuntimeError, VariableScope};
pub use error::*;
pub use eval::{Rotation, Value, Vector};
pub use event::{DetectedObject, Event, LslEvent};
pub use output::{ChatMessage, Diagnostic, DiagnosticKind, MemorySink, OutputSink, StdoutSink};

#[cfg(test)]
mod tests {
    use tracing_subscriber::{EnvFilter, FmtSubscriber};

    #[ctor::ctor]
    fn init_tests() {
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(EnvFilter::from_default_env())
            .finish();
        tracing::subscriber::set_global_default(subscriber)
            .expect("Failed to set tracing subscriber");
    }
}
