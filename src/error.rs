use core::fmt;

/// Error type for [`WavlMap`](crate::WavlMap) operations.
///
/// Every error is returned before the map is touched, so a failed operation leaves the map
/// exactly as it was.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Error {
    /// An entry with the given key is already present.
    KeyExists,
    /// No entry with the given key is present.
    KeyNotFound,
    /// The map has no entries.
    Empty,
    /// A 1-based index fell outside `1..=len`.
    OutOfRange { index: usize, len: usize },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::KeyExists => f.write_str("key already exists"),
            Error::KeyNotFound => f.write_str("key not found"),
            Error::Empty => f.write_str("map is empty"),
            Error::OutOfRange { index, len } => {
                write!(f, "index {index} out of range for map of length {len}")
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result type for [`WavlMap`](crate::WavlMap) operations.
pub type Result<T> = core::result::Result<T, Error>;
