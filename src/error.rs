use thiserror::Error;

use crate::analyzer::ParseError;
use crate::config::ConfigError;
use crate::engine::RuntimeError;
use crate::eval::EvalError;
use crate::event::EventError;
use crate::host::HostError;
use crate::service::ServiceError;
use crate::tokenizer::TokenizerError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Tokenizer error: {0}")]
    Tokenizer(#[from] TokenizerError),
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),
    #[error("Eval error: {0}")]
    Eval(#[from] EvalError),
    #[error("Event error: {0}")]
    Event(#[from] EventError),
    #[error("Host error: {0}")]
    Host(#[from] HostError),
    #[error("Runtime error: {0}")]
    Runtime(#[from] RuntimeError),
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error("Service error: {0}")]
    Service(#[from] ServiceError),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type InternalResult<T> = Result<T, Error>;

impl Error {
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Error::Internal(message.into())
    }
}
