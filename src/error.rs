/// The error surface of the transport. Backpressure conditions (handoff queue full,
///  reorder buffer overflow) are deliberately *not* represented here: they are
///  drop-and-continue conditions that the worker logs and absorbs.
#[derive(thiserror::Error, Debug)]
pub enum TransportError {
    /// A datagram that is too short, has a bad RTP version or an unknown payload
    ///  type. The offending datagram is dropped; a classification that is already
    ///  locked in is unaffected.
    #[error("invalid packet: {0}")]
    InvalidPacket(String),

    /// The configuration failed validation before any socket was touched.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The multicast group could not be joined or the socket could not be set up.
    ///  Fatal to `start()`; retry policy belongs to the caller.
    #[error("socket setup failed: {0}")]
    SocketSetup(#[from] std::io::Error),

    /// The worker terminated on a socket read error after a successful start. All
    ///  subsequent reads fail with this error rather than returning 0.
    #[error("stream broken: {0}")]
    StreamBroken(String),

    /// The transport was stopped explicitly; reading after `stop()` is an error,
    ///  not an empty read.
    #[error("transport closed")]
    Closed,
}
