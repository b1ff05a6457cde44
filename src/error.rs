use thiserror::Error;

/// Error produced when a [`SyncMultimap`](crate::SyncMultimap) is converted to or from JSON.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum Error {
    /// The input was not valid JSON, or was not an object whose fields hold arrays
    /// of the declared key and value types.
    #[error("failed to decode multimap: {0}")]
    Decode(#[source] serde_json::Error),
    /// A key could not be written as a JSON object field name, or a value refused to serialize.
    #[error("failed to encode multimap: {0}")]
    Encode(#[source] serde_json::Error),
}

impl Error {
    /// Returns `true` if the error was raised while decoding.
    pub const fn is_decode(&self) -> bool {
        matches!(self, Self::Decode(_))
    }

    /// Returns `true` if the error was raised while encoding.
    pub const fn is_encode(&self) -> bool {
        matches!(self, Self::Encode(_))
    }

    /// Line of the offending input, when the error came from malformed JSON.
    ///
    /// Returns `0` for errors that are not tied to a position in the input.
    pub fn line(&self) -> usize {
        match self {
            Self::Decode(err) | Self::Encode(err) => err.line(),
        }
    }

    /// Column of the offending input, when the error came from malformed JSON.
    pub fn column(&self) -> usize {
        match self {
            Self::Decode(err) | Self::Encode(err) => err.column(),
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;
