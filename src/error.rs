//! IMAP synchronization error types.

use std::io::Error as IoError;
use std::result;

use thiserror::Error;

use crate::types::{IdType, Uid};

/// A convenience wrapper around `Result` for `imap_sync::Error`.
pub type Result<T> = result::Result<T, Error>;

/// A set of errors that can occur while interpreting server data or synchronizing a mailbox.
///
/// Errors fall into three groups:
///
///  - [`Error::UidValidityChanged`] means every cached UID for the mailbox is void. It is never
///    downgraded to a partial answer; see [`Error::invalidates_cache`].
///  - Transport errors (`Io`, `Bad`, `No`, `ConnectionLost`, `Parse`) come from the
///    [`Transport`](crate::transport::Transport) and are passed through untouched. Retrying
///    later is reasonable.
///  - Malformed input (`Validate`, `IdTypeMismatch`) is a caller bug and is reported as soon as
///    it is detected.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// An `io::Error` that occurred while talking to the server or reading a stored body.
    #[error(transparent)]
    Io(#[from] IoError),
    /// A BAD response from the IMAP server.
    #[error("Bad Response: {0}")]
    Bad(String),
    /// A NO response from the IMAP server.
    #[error("No Response: {0}")]
    No(String),
    /// The connection was terminated unexpectedly.
    #[error("Connection Lost")]
    ConnectionLost,
    /// Error parsing a server response.
    #[error(transparent)]
    Parse(#[from] ParseError),
    /// Error validating input data.
    #[error(transparent)]
    Validate(#[from] ValidateError),
    /// The mailbox's `UIDVALIDITY` no longer matches the one the cached state was built against.
    #[error("UIDVALIDITY of {mailbox:?} changed from {cached} to {current}")]
    UidValidityChanged {
        /// The mailbox being synchronized.
        mailbox: String,
        /// The value recorded in the caller's token.
        cached: u32,
        /// The value the server reports now.
        current: u32,
    },
    /// An id set of the wrong kind was handed to an operation.
    #[error("expected {expected} ids, got {found} ids")]
    IdTypeMismatch {
        /// The kind of ids the operation works on.
        expected: IdType,
        /// The kind of ids that were supplied.
        found: IdType,
    },
}

impl Error {
    /// Returns true if the caller must throw away everything it cached for the mailbox and
    /// start over, as opposed to an error that may go away on retry.
    pub fn invalidates_cache(&self) -> bool {
        matches!(self, Error::UidValidityChanged { .. })
    }
}

/// An error occured while trying to parse a server response.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ParseError {
    /// The server responded with something we could not parse at all.
    #[error("Unable to parse status response")]
    Invalid(Vec<u8>),
    /// The server responded with a well-formed response that we did not expect here.
    #[error("Unexpected Response: {0}")]
    Unexpected(String),
    /// A sequence set string was malformed.
    #[error("Unable to parse sequence set {0:?}")]
    SequenceSet(String),
    /// A serialized sync token was malformed.
    #[error("Unable to parse sync token {0:?}")]
    SyncToken(String),
    /// An `INTERNALDATE` value did not follow the RFC 3501 `date-time` format.
    #[error("Unable to parse internal date {0:?}")]
    InternalDate(String),
    /// A `STATUS` answer lacked an item the operation cannot do without.
    #[error("STATUS response for {mailbox:?} is missing {item}")]
    MissingStatus {
        /// The mailbox that was queried.
        mailbox: String,
        /// The missing item.
        item: &'static str,
    },
}

/// Malformed input handed to one of the data structures.
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum ValidateError {
    /// A rights string contained a character that is not a valid ACL right.
    #[error("Invalid character in ACL rights: {0:?}")]
    InvalidRight(char),
    /// A MIME part identifier was not `0` or a dot-separated list of positive integers.
    #[error("Invalid MIME part id: {0:?}")]
    InvalidMimeId(String),
    /// The same message appears in more than one thread.
    #[error("Message {0} appears in more than one thread")]
    DuplicateThreadMember(Uid),
    /// A thread bucket does not start with its base message at level 0.
    #[error("Thread {0} does not start with its base message at level 0")]
    InvalidThreadBase(Uid),
}
