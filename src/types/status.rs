use enumset::{EnumSet, EnumSetType};
use imap_proto::types::StatusAttribute;

use super::{IdSet, IdType, ModSeq, Uid};

/// The values a [`Transport`](crate::transport::Transport) is asked for in one status request.
///
/// The first four map onto `STATUS` items. The last three describe a combined snapshot that a
/// server with [`ModSeqSupport::Qresync`](super::ModSeqSupport::Qresync) can answer in a single
/// round trip: the mod-sequence the snapshot was taken against, and what changed or vanished
/// since then.
#[derive(Debug, EnumSetType)]
pub enum StatusItem {
    /// `MESSAGES`: the number of messages.
    Messages,
    /// `UIDNEXT`: the UID the next message will get.
    UidNext,
    /// `UIDVALIDITY`
    UidValidity,
    /// `HIGHESTMODSEQ`
    HighestModSeq,
    /// The mod-sequence the snapshot's changed and vanished sets are relative to.
    LastModSeq,
    /// The UIDs whose metadata changed after the given mod-sequence.
    ChangedSince,
    /// The UIDs expunged after the given mod-sequence.
    VanishedSince,
}

impl StatusItem {
    /// The `STATUS` data item name, for items that have one.
    pub fn atom(self) -> Option<&'static str> {
        match self {
            StatusItem::Messages => Some("MESSAGES"),
            StatusItem::UidNext => Some("UIDNEXT"),
            StatusItem::UidValidity => Some("UIDVALIDITY"),
            StatusItem::HighestModSeq => Some("HIGHESTMODSEQ"),
            StatusItem::LastModSeq | StatusItem::ChangedSince | StatusItem::VanishedSince => None,
        }
    }

    /// The parenthesized `STATUS` item list for a request, e.g. `(MESSAGES UIDNEXT)`.
    pub fn status_list(items: EnumSet<StatusItem>) -> String {
        let atoms: Vec<&str> = items.iter().filter_map(StatusItem::atom).collect();
        format!("({})", atoms.join(" "))
    }
}

/// The answer to a status request. Fields the server did not report are `None`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MailboxStatus {
    /// The number of messages in the mailbox.
    pub messages: Option<u32>,
    /// The next UID to be assigned.
    pub uid_next: Option<Uid>,
    /// The mailbox's current `UIDVALIDITY`.
    pub uid_validity: Option<u32>,
    /// The highest mod-sequence of any message in the mailbox.
    pub highest_modseq: Option<ModSeq>,
    /// The mod-sequence `changed` and `vanished` are relative to.
    pub last_modseq: Option<ModSeq>,
    /// UIDs changed since `last_modseq`.
    pub changed: Option<IdSet>,
    /// UIDs vanished since `last_modseq`.
    pub vanished: Option<IdSet>,
}

impl MailboxStatus {
    /// Fold the attributes of an untagged `STATUS` response into this value.
    pub(crate) fn apply(&mut self, attributes: &[StatusAttribute]) {
        for attr in attributes {
            match attr {
                StatusAttribute::Messages(n) => self.messages = Some(*n),
                StatusAttribute::UidNext(n) => self.uid_next = Some(*n),
                StatusAttribute::UidValidity(n) => self.uid_validity = Some(*n),
                StatusAttribute::HighestModSeq(n) => self.highest_modseq = Some(*n),
                other => log::trace!("ignoring STATUS attribute {:?}", other),
            }
        }
    }

    /// The changed set, or an empty UID set if none was reported.
    pub fn changed_or_empty(&self) -> IdSet {
        self.changed
            .clone()
            .unwrap_or_else(|| IdSet::new(IdType::Uid))
    }

    /// The vanished set, or an empty UID set if none was reported.
    pub fn vanished_or_empty(&self) -> IdSet {
        self.vanished
            .clone()
            .unwrap_or_else(|| IdSet::new(IdType::Uid))
    }
}
