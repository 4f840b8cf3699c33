pub use self::kind::ErrorKind;
pub use self::result::Result;

mod kind;
mod result;

// ==============

use std::{error, fmt};
use std::ops::Deref;

/// The error type used throughout the runtime.
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    payload: Option<Box<dyn error::Error + Send + Sync>>,
}

impl Error {

    /// Creates a new error from a known kind of error as well as an arbitrary error payload.
    pub fn new<K, E>(kind: K, payload: E) -> Error
        where K: Into<ErrorKind>,
              E: Into<Box<dyn error::Error + Send + Sync>>
    {

        Self::_new(kind.into(), Some(payload.into()))
    }

    // "De-generization" technique..
    fn _new(kind: ErrorKind, payload: Option<Box<dyn error::Error + Send + Sync>>) -> Error {

        Error {
            kind,
            payload,
        }
    }

    pub fn get_ref(&self) -> Option<&(dyn error::Error + Send + Sync + 'static)> {

        match self.payload {
            Some(ref payload) => Some(payload.deref()),
            _ => None
        }
    }

    /// Returns the corresponding `ErrorKind` for this error.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }
}

impl fmt::Display for Error {

    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {

        match self.payload {
            Some(ref payload) => write!(fmt, "{}: {}", self.kind.as_str(), payload),
            _ => write!(fmt, "{}", self.kind.as_str()),
        }
    }
}

impl error::Error for Error {

    fn source(&self) -> Option<&(dyn error::Error + 'static)> {

        match self.payload {
            Some(ref payload) => Some(payload.as_ref() as &(dyn error::Error + 'static)),
            _ => None
        }
    }
}
