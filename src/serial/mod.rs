pub mod interface;
pub mod link;
pub mod protocol;

pub use interface::SerialInterface;
pub use link::{LinkOpener, NativeLinkOpener, SerialLink, SerialSettings};
pub use protocol::{parse_response, ProjectorProtocol};

#[derive(Debug, thiserror::Error)]
pub enum SerialError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Not connected")]
    NotConnected,

    #[error("Protocol error: expected {expected:?} but got {received:?}")]
    ProtocolError { expected: String, received: String },

    #[error("Malformed response: {0:?}")]
    MalformedResponse(String),

    #[error("Command {command:?} failed: device answered {response:?}")]
    CommandFailed { command: String, response: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialport error: {0}")]
    SerialportError(#[from] serialport::Error),
}

impl SerialError {
    /// True for failures of the link itself rather than of a single exchange.
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            SerialError::ConnectionFailed(_)
                | SerialError::NotConnected
                | SerialError::IoError(_)
                | SerialError::SerialportError(_)
        )
    }

    /// Errors after which the link can no longer be trusted.
    pub fn demotes_link(&self) -> bool {
        self.is_connection_error() || matches!(self, SerialError::ProtocolError { .. })
    }
}

pub type Result<T> = std::result::Result<T, SerialError>;
