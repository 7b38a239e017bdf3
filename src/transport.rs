//! The requests [`Sync`](crate::sync::Sync) needs answered, and the queries it sends.
//!
//! This crate does not talk to a server itself. An application implements [`Transport`] on top
//! of whatever connection it has, issuing the IMAP commands described on each method and
//! converting the answers with the functions in [`parse`](crate::parse).

use enumset::{EnumSet, EnumSetType};
use std::fmt;

use crate::error::Result;
use crate::types::{Capabilities, FetchResult, IdSet, MailboxStatus, ModSeq, StatusItem, Uid};

/// A connection that can answer the requests of a mailbox synchronization.
///
/// Every `restriction` is an optional [`IdSet`]; when given, the answer only needs to cover
/// those messages. A restriction of UIDs means `UID SEARCH` / `UID FETCH`, one of sequence
/// numbers the plain commands. Errors are passed on to the caller of the sync untouched.
pub trait Transport {
    /// The server's capabilities (`CAPABILITY`).
    fn capabilities(&mut self) -> Result<Capabilities>;

    /// The requested status `items` of `mailbox`.
    ///
    /// The regular items come from `STATUS` (or `SELECT`). [`StatusItem::ChangedSince`] and
    /// [`StatusItem::VanishedSince`] ask for the UIDs changed and expunged after `since`,
    /// scoped to `restriction`, with [`StatusItem::LastModSeq`] reporting the mod-sequence
    /// those sets are relative to. A server with `QRESYNC` answers all three with one
    /// `SELECT ... (QRESYNC (...))`.
    fn status(
        &mut self,
        mailbox: &str,
        items: EnumSet<StatusItem>,
        since: Option<ModSeq>,
        restriction: Option<&IdSet>,
    ) -> Result<MailboxStatus>;

    /// The UIDs of the messages in `mailbox` matching `query` (`UID SEARCH`).
    fn search(
        &mut self,
        mailbox: &str,
        query: &SearchQuery,
        restriction: Option<&IdSet>,
    ) -> Result<IdSet>;

    /// The UIDs expunged from `mailbox` after mod-sequence `since`
    /// (`UID FETCH <restriction> (UID) (CHANGEDSINCE <since> VANISHED)`).
    fn vanished(
        &mut self,
        mailbox: &str,
        since: ModSeq,
        restriction: Option<&IdSet>,
    ) -> Result<IdSet>;

    /// The requested data about messages in `mailbox`.
    fn fetch(
        &mut self,
        mailbox: &str,
        query: &FetchQuery,
        restriction: Option<&IdSet>,
    ) -> Result<Vec<FetchResult>>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn capabilities(&mut self) -> Result<Capabilities> {
        (**self).capabilities()
    }

    fn status(
        &mut self,
        mailbox: &str,
        items: EnumSet<StatusItem>,
        since: Option<ModSeq>,
        restriction: Option<&IdSet>,
    ) -> Result<MailboxStatus> {
        (**self).status(mailbox, items, since, restriction)
    }

    fn search(
        &mut self,
        mailbox: &str,
        query: &SearchQuery,
        restriction: Option<&IdSet>,
    ) -> Result<IdSet> {
        (**self).search(mailbox, query, restriction)
    }

    fn vanished(
        &mut self,
        mailbox: &str,
        since: ModSeq,
        restriction: Option<&IdSet>,
    ) -> Result<IdSet> {
        (**self).vanished(mailbox, since, restriction)
    }

    fn fetch(
        &mut self,
        mailbox: &str,
        query: &FetchQuery,
        restriction: Option<&IdSet>,
    ) -> Result<Vec<FetchResult>> {
        (**self).fetch(mailbox, query, restriction)
    }
}

/// A single search key, see [section 6.4.4 of RFC 3501](https://tools.ietf.org/html/rfc3501#section-6.4.4).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SearchCriterion {
    /// All messages in the mailbox.
    All,
    /// Messages whose UID is in the set.
    Uid(IdSet),
    /// Messages whose UID lies in `first:last`.
    ///
    /// There is no `first:*` form: a server reads `*` as its highest UID, so that range always
    /// matches the last message whatever `first` is.
    UidRange {
        /// The lowest UID to match.
        first: Uid,
        /// The highest UID to match.
        last: Uid,
    },
    /// Messages with a mod-sequence equal to or greater than the value
    /// ([RFC 7162](https://tools.ietf.org/html/rfc7162#section-3.1.5)).
    ModSeq(ModSeq),
}

impl fmt::Display for SearchCriterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchCriterion::All => write!(f, "ALL"),
            SearchCriterion::Uid(ids) => write!(f, "UID {}", ids),
            SearchCriterion::UidRange { first, last } => write!(f, "UID {}:{}", first, last),
            SearchCriterion::ModSeq(modseq) => write!(f, "MODSEQ {}", modseq),
        }
    }
}

/// A `SEARCH` program: messages matching every criterion. No criteria means all messages.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SearchQuery {
    criteria: Vec<SearchCriterion>,
}

impl SearchQuery {
    /// A query matching every message.
    pub fn new() -> Self {
        Self::default()
    }

    /// Also require `criterion`.
    pub fn and(mut self, criterion: SearchCriterion) -> Self {
        self.criteria.push(criterion);
        self
    }

    /// Messages with UIDs from `first` up to `last`.
    pub fn uid_range(first: Uid, last: Uid) -> Self {
        SearchQuery::new().and(SearchCriterion::UidRange { first, last })
    }

    /// Messages changed after mod-sequence `modseq`. At the largest mod-sequence this matches
    /// only messages at that value.
    pub fn changed_since(modseq: ModSeq) -> Self {
        SearchQuery::new().and(SearchCriterion::ModSeq(modseq.saturating_add(1)))
    }

    /// The criteria, in order.
    pub fn criteria(&self) -> &[SearchCriterion] {
        &self.criteria
    }
}

impl fmt::Display for SearchQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.criteria.is_empty() {
            write!(f, "ALL")
        } else {
            let criteria: Vec<String> = self.criteria.iter().map(|c| c.to_string()).collect();
            write!(f, "{}", criteria.join(" "))
        }
    }
}

/// A message data item to fetch.
#[derive(Debug, EnumSetType)]
pub enum FetchItem {
    /// `UID`
    Uid,
    /// `FLAGS`
    Flags,
    /// `MODSEQ`
    ModSeq,
    /// `RFC822.SIZE`
    Size,
    /// `INTERNALDATE`
    InternalDate,
    /// `ENVELOPE`
    Envelope,
    /// `BODYSTRUCTURE`
    BodyStructure,
}

impl fmt::Display for FetchItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let item = match self {
            FetchItem::Uid => "UID",
            FetchItem::Flags => "FLAGS",
            FetchItem::ModSeq => "MODSEQ",
            FetchItem::Size => "RFC822.SIZE",
            FetchItem::InternalDate => "INTERNALDATE",
            FetchItem::Envelope => "ENVELOPE",
            FetchItem::BodyStructure => "BODYSTRUCTURE",
        };
        write!(f, "{}", item)
    }
}

/// The data items of a `FETCH`, rendered as a parenthesized list.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FetchQuery {
    /// What to fetch.
    pub items: EnumSet<FetchItem>,
}

impl FetchQuery {
    /// Fetch the given items.
    pub fn new(items: impl Into<EnumSet<FetchItem>>) -> Self {
        FetchQuery {
            items: items.into(),
        }
    }
}

impl fmt::Display for FetchQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let items: Vec<String> = self.items.iter().map(|i| i.to_string()).collect();
        write!(f, "({})", items.join(" "))
    }
}
