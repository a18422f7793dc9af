use exchange::ExchangeError;
use exchange_control::ControlError;
use thiserror::Error;

pub type ResponderResult<T> = Result<T, ResponderError>;

#[derive(Debug, Error)]
pub enum ResponderError {
    #[error(transparent)]
    Exchange(#[from] ExchangeError),

    #[error(transparent)]
    Control(ControlError),

    /// The payload stopped moving before `expected` bytes were transferred.
    #[error("short transfer: moved {moved} of {expected} bytes")]
    ShortTransfer { expected: usize, moved: usize },
}

impl ResponderError {
    pub fn exchange(&self) -> Option<&ExchangeError> {
        match self {
            ResponderError::Exchange(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ControlError> for ResponderError {
    fn from(err: ControlError) -> Self {
        // Exchange-level outcomes look the same whether the port is local or remote.
        match err {
            ControlError::Exchange(err) => ResponderError::Exchange(err),
            other => ResponderError::Control(other),
        }
    }
}
