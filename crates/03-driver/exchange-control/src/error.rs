use std::io;

use exchange::ExchangeError;
use thiserror::Error;

pub type ControlResult<T> = Result<T, ControlError>;

#[derive(Debug, Error)]
pub enum ControlError {
    #[error("control stream i/o: {0}")]
    Io(#[from] io::Error),

    #[error("malformed control frame: {0}")]
    Malformed(String),

    /// The peer answered with a reply that does not fit the request.
    #[error("unexpected reply to {request}: {reply}")]
    UnexpectedReply {
        request: &'static str,
        reply: String,
    },

    /// The server refused the request as malformed.
    #[error("request rejected by server")]
    Rejected,

    #[error(transparent)]
    Exchange(#[from] ExchangeError),
}

impl ControlError {
    pub fn malformed(msg: impl Into<String>) -> Self {
        ControlError::Malformed(msg.into())
    }

    /// The exchange-level error carried by this failure, if any.
    pub fn exchange(&self) -> Option<&ExchangeError> {
        match self {
            ControlError::Exchange(err) => Some(err),
            _ => None,
        }
    }
}
