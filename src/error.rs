use std::io;

use thiserror::Error;

/// An error raised by the live codecs or the file reader.
///
/// The variants map onto the three states a byte stream can end up in after a
/// failed operation:
///
/// - [`Error::Malformed`] is a recoverable protocol violation. The stream
///   itself is fine and further calls may continue; the receiver clears (or,
///   for an unexpected status byte, repositions) its pending state first.
/// - [`Error::Eof`] means the input ran out. Reception state is retained, so
///   a source that is refilled later can resume mid-message.
/// - [`Error::Io`] wraps a failure of the underlying byte stream itself,
///   after which the stream should no longer be trusted.
#[derive(Debug, Error)]
pub enum Error {
    /// The byte stream violated the MIDI wire or file format.
    #[error("malformed midi: {0}")]
    Malformed(&'static str),

    /// The input ended before a message or chunk was complete.
    #[error("unexpected end of input")]
    Eof,

    /// The underlying byte stream failed.
    #[error(transparent)]
    Io(io::Error),
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            Error::Eof
        } else {
            Error::Io(err)
        }
    }
}

/// The result type used by all fallible operations in this crate.
pub type Result<T> = std::result::Result<T, Error>;
