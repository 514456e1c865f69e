/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Binding the listening socket failed.
    #[error("bind failed: {0}")]
    BindFailed(#[source] std::io::Error),

    /// Accepting a TCP connection or completing the WebSocket upgrade
    /// failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// Writing a frame failed; the peer is most likely gone.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Reading a frame failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),
}

impl TransportError {
    pub(crate) fn send(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::SendFailed(std::io::Error::new(std::io::ErrorKind::BrokenPipe, err))
    }

    pub(crate) fn receive(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::ReceiveFailed(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            err,
        ))
    }
}
