use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("snapshot for {key:?} is {actual}, but the tracked value is {expected}")]
    ShapeMismatch {
        key: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("invalid state key {0:?}")]
    InvalidKey(String),

    #[error("engine state lock poisoned: {0}")]
    LockPoisoned(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("diff error: {0}")]
    Diff(#[from] revise_diff::DiffError),

    #[error("registry error: {0}")]
    Registry(#[from] revise_registry::RegistryError),

    #[error("type error: {0}")]
    Type(#[from] revise_types::TypeError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;
