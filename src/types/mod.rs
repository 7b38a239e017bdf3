//! This module contains the data structures that server answers are folded into.

/// From section [2.3.1.1 of RFC 3501](https://tools.ietf.org/html/rfc3501#section-2.3.1.1).
///
/// A 32-bit value assigned to each message, which when used with the unique identifier validity
/// value forms a 64-bit value that will not refer to any other message in the mailbox or any
/// subsequent mailbox with the same name forever.  Unique identifiers are assigned in a strictly
/// ascending fashion in the mailbox; as each message is added to the mailbox it is assigned a
/// higher UID than the message(s) which were added previously.  Unlike message sequence numbers,
/// unique identifiers are not necessarily contiguous.
///
/// Any change of unique identifiers between sessions is detectable through the `UIDVALIDITY`
/// value, which is what [`SyncToken`](crate::sync::SyncToken) records.
pub type Uid = u32;

/// From section [2.3.1.2 of RFC 3501](https://tools.ietf.org/html/rfc3501#section-2.3.1.2).
///
/// A relative position from 1 to the number of messages in the mailbox.  This position is ordered
/// by ascending unique identifier.  Message sequence numbers can be reassigned during the session,
/// for example when a message is expunged, so they are never used to identify cached state.
pub type Seq = u32;

/// From section [3 of RFC 7162](https://tools.ietf.org/html/rfc7162#section-3).
///
/// A positive unsigned 63-bit value assigned to each message by servers that support `CONDSTORE`.
/// Every time metadata of a message changes, its mod-sequence is set to a value higher than any
/// previously assigned in the mailbox.
pub type ModSeq = u64;

mod ids;
pub use self::ids::{IdSet, IdType, Ids};

mod capabilities;
pub use self::capabilities::{Capabilities, ModSeqSupport};

mod acls;
pub use self::acls::{
    Acl, AclDiff, AclEntry, AclModifyMode, AclRight, AclRights, ListRights, MyRights,
};

mod fetch;
pub use self::fetch::{
    Address, BodyStream, Content, ContentEncoding, Envelope, FetchAttribute, FetchResult,
    MimeId, MimePart, ReadSeek,
};

mod thread;
pub use self::thread::{ThreadNode, ThreadTree};

mod status;
pub use self::status::{MailboxStatus, StatusItem};
