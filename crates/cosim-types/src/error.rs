use thiserror::Error;

/// The result kinds a caller of this workspace can observe (spec §6, §7).
///
/// `CoSimError` intentionally keeps the four error categories from the
/// error-handling design as separate variant groups rather than a single
/// opaque string, so callers can match on `Full`/`Empty`/`InvalidArgument`
/// without string-sniffing a message.
#[derive(Error, Debug)]
pub enum CoSimError {
    /// Malformed frame, unexpected frame kind, version mismatch, or a
    /// payload exceeding the channel's buffer capacity. Closes the
    /// connection.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Transmit queue full. Local to the caller; connection stays open.
    #[error("queue full")]
    Full,

    /// Receive queue empty. Local to the caller; connection stays open.
    #[error("queue empty")]
    Empty,

    /// Unknown id, mis-sized buffer, responder-mode conflict, missing
    /// `FinishCommand`, or any other caller misuse.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The peer disconnected, or a transport-level syscall failed during
    /// send/recv. Blocking loops exit on this; pollers surface it as an
    /// error.
    #[error("disconnected")]
    Disconnected,

    /// Underlying I/O failure not otherwise classified above.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CoSimError>;
