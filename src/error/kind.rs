use super::Error;

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum ErrorKind {
    /// A framework-specific error.
    Framework { name: &'static str },
    /// An error returned when attempting to mutate a storage constructed as a read-only
    /// reference.
    ReadOnlyViolation,
    /// A shape disagreement: an out-of-bounds sub-view, a rank mismatch in a broadcast, or a
    /// scalar count that differs from the element count.
    IncompatibleShape,
    /// A blocking wait exceeded its deadline.
    TimedOut,
    /// A queued closure failed and poisoned its stream; later submissions are skipped.
    StreamPoisoned,
    /// The requested service or device is not present and substitution is disallowed.
    DeviceUnavailable,
    /// An error occurred while attempting to allocate memory.
    MemoryAllocationFailed,
    /// Any error not part of this list.
    Other,
    /// A marker variant that tells the compiler that users of this enum cannot match
    /// it exhaustively ([related RFC](https://github.com/rust-lang/rust/issues/32770)).
    #[doc(hidden)]
    _NonExhaustive,
}

impl ErrorKind {

    pub(super) fn as_str(&self) -> &'static str {

        use self::ErrorKind::*;

        match *self {
            Framework { name } => name,
            ReadOnlyViolation => "the storage is a read-only reference",
            IncompatibleShape => "the provided shape is incompatible",
            TimedOut => "the wait deadline was exceeded",
            StreamPoisoned => "the stream was poisoned by an earlier failure",
            DeviceUnavailable => "the requested service or device is not present",
            MemoryAllocationFailed => "memory allocation failed",
            Other => "other error",
            _ => unreachable!(),
        }
    }
}

impl From<ErrorKind> for Error {

    /// Creates a new error from a known kind of error
    fn from(kind: ErrorKind) -> Error {

        Error::_new(kind, None)
    }
}
