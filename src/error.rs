use thiserror::Error;

/// Boxed failure raised by an external collaborator (camera, model, sink).
pub type CollaboratorError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors produced by the decode/colorize/composite pipeline.
#[derive(Error, Debug)]
pub enum Error {
    /// Fatal startup problem: missing label table, unopenable source, ...
    #[error("Configuration error: {0}")]
    Config(String),

    /// The frame source ended or disconnected.
    #[error("Input exhausted after {frames} captured frames")]
    InputExhausted { frames: u64 },

    /// Tensor shape or class ids inconsistent with the configured label table.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Frame capture failed")]
    Capture(#[source] CollaboratorError),

    #[error("Inference failed")]
    Inference(#[source] CollaboratorError),

    #[error("Frame sink failed")]
    Sink(#[source] CollaboratorError),

    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
