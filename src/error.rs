use thiserror::Error;

/// Errors that can escape the tunnel engine to its caller.
///
/// Most of the error kinds in the wire protocol (late packets, duplicates,
/// unrepairable groups, a recovered-but-invalid slot) are not represented
/// here: they are logged and dropped at the point of detection and reported
/// back to the caller as a [`crate::receiver::DeliverOutcome`] rather than as
/// an `Err`, since they carry no actionable failure for the event loop.
#[derive(Debug, Error)]
pub enum TunnelError {
    #[error("packet too short to contain a valid header and minimal IP payload")]
    MalformedPacket,
    #[error("HMAC verification failed")]
    AuthFailure,
    #[error("reed-solomon codec error: {0}")]
    Codec(String),
    #[error("virtual interface error: {0}")]
    Tun(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
