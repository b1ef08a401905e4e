/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// There is no parent frame to post to.
    ///
    /// Raised immediately by `send`; nothing is queued or retried.
    #[error("no parent window found")]
    NoParent,

    /// The peer end of the channel is gone.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// The message could not be written.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Opening the bridge to the platform failed.
    #[error("connect failed: {0}")]
    ConnectFailed(#[source] std::io::Error),
}
