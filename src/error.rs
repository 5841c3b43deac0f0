//! Error taxonomy for the translation pipeline
//!
//! Every stage reports failures through [`Error`]. Nothing is recovered
//! locally: classification and translation errors abort before any build
//! step, and a failed build never leaves a library loaded.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while translating, building or binding a model
#[derive(Error, Debug)]
pub enum Error {
    #[error("Untranslatable type for signal {signal}: {shape}")]
    UntranslatableType { signal: String, shape: String },

    #[error("Nested types not allowed: {0}")]
    NestedTypeNotAllowed(String),

    #[error("Record type {name} declared with two different shapes")]
    TypeConflict { name: String },

    #[error("Multiple assignment targets not supported ({count} targets in {block})")]
    MultiTargetAssignment { block: String, count: usize },

    #[error("Unsupported operator: {0}")]
    UnsupportedOperator(String),

    #[error("Unsupported construct: {0}")]
    UnsupportedConstruct(String),

    #[error("Cannot resolve name {name} in {block}")]
    UnresolvedName { block: String, name: String },

    #[error("Module did not compile!\n\nCommand:\n{command}\n\nError:\n{diagnostics}\n\nSource:\n{generated}")]
    Compile {
        command: String,
        diagnostics: String,
        generated: String,
    },

    #[error("Layout mismatch for {symbol}: declared {declared}, native {native}")]
    LayoutMismatch {
        symbol: String,
        declared: u64,
        native: u64,
    },

    #[error("Failed to load {}: {}", .path.display(), .source)]
    Load {
        path: PathBuf,
        #[source]
        source: libloading::Error,
    },

    #[error("Unknown signal: {0}")]
    UnknownSignal(String),

    #[error("Invalid model: {0}")]
    InvalidModel(String),

    #[error("Pipeline already failed: {0}")]
    PipelineFailed(String),

    #[error("Invalid build config: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// True for errors raised before the external compiler is invoked
    pub fn is_translation_error(&self) -> bool {
        matches!(
            self,
            Error::UntranslatableType { .. }
                | Error::NestedTypeNotAllowed(_)
                | Error::TypeConflict { .. }
                | Error::MultiTargetAssignment { .. }
                | Error::UnsupportedOperator(_)
                | Error::UnsupportedConstruct(_)
                | Error::UnresolvedName { .. }
        )
    }
}
