//! Reconciling a cached view of a mailbox with the server.
//!
//! A caller that keeps a local copy of a mailbox stores a [`SyncToken`] alongside it. On the
//! next visit, [`Sync::run`] compares the token with the server's current state and reports
//! which messages are new, which had their flags changed and which were expunged, using
//! mod-sequences (`CONDSTORE`/`QRESYNC`) where the server has them and plain searches
//! otherwise. Both paths give the same answer; the fast one just needs fewer round trips.
//!
//! Without `QRESYNC`, expunged UIDs can only be named when the caller passes the UIDs it
//! has cached as the restriction. Otherwise an expunge shows up only as a shortfall in the
//! message count, and the vanished set is reported as "all" (`1:*`).
//!
//! ```no_run
//! # use imap_sync::{Result, SyncBuilder, SyncCriteria, SyncToken};
//! # fn sync(transport: impl imap_sync::transport::Transport) -> Result<()> {
//! let token: SyncToken = "V1408806928|H757|U11|M10".parse()?;
//! let mut sync = SyncBuilder::new().build(transport);
//! let result = sync.run("INBOX", Some(&token), SyncCriteria::all_ids(), None)?;
//! if let Some(vanished) = result.vanished_ids {
//!     println!("expunged: {}", vanished);
//! }
//! let next = sync.current_token("INBOX")?;
//! # Ok(())
//! # }
//! ```

use enumset::{EnumSet, EnumSetType};
use lazy_static::lazy_static;
use log::{debug, warn};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, ParseError, Result};
use crate::transport::{FetchItem, FetchQuery, SearchQuery, Transport};
use crate::types::{IdSet, IdType, MailboxStatus, ModSeq, ModSeqSupport, StatusItem, Uid};

/// What a caller remembers about a mailbox between two synchronizations.
///
/// The textual form is `V<uidvalidity>|H<highestmodseq>|U<uidnext>|M<messages>`, with any of
/// the last three left out when unknown:
///
/// ```
/// # use imap_sync::SyncToken;
/// let token: SyncToken = "V5|U12".parse().unwrap();
/// assert_eq!(token.uid_validity, 5);
/// assert_eq!(token.highest_modseq, None);
/// assert_eq!(token.uid_next, Some(12));
/// assert_eq!(token.to_string(), "V5|U12");
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SyncToken {
    /// The mailbox's `UIDVALIDITY`. A token is worthless once this changes.
    pub uid_validity: u32,
    /// The mailbox's `HIGHESTMODSEQ`, if the server supports mod-sequences.
    pub highest_modseq: Option<ModSeq>,
    /// The mailbox's `UIDNEXT`.
    pub uid_next: Option<Uid>,
    /// The number of messages in the mailbox.
    pub messages: Option<u32>,
}

impl SyncToken {
    /// A token knowing nothing but the mailbox's `UIDVALIDITY`.
    pub fn new(uid_validity: u32) -> Self {
        SyncToken {
            uid_validity,
            highest_modseq: None,
            uid_next: None,
            messages: None,
        }
    }

    /// The highest UID the mailbox could have held when the token was taken.
    pub fn highest_uid(&self) -> Option<Uid> {
        self.uid_next.and_then(|n| n.checked_sub(1)).filter(|&h| h > 0)
    }
}

impl fmt::Display for SyncToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "V{}", self.uid_validity)?;
        if let Some(h) = self.highest_modseq {
            write!(f, "|H{}", h)?;
        }
        if let Some(u) = self.uid_next {
            write!(f, "|U{}", u)?;
        }
        if let Some(m) = self.messages {
            write!(f, "|M{}", m)?;
        }
        Ok(())
    }
}

impl FromStr for SyncToken {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        lazy_static! {
            static ref TOKEN_RE: Regex =
                Regex::new(r"^V(\d+)(?:\|H(\d+))?(?:\|U(\d+))?(?:\|M(\d+))?$").unwrap();
        }

        let invalid = || Error::Parse(ParseError::SyncToken(s.to_string()));
        let caps = TOKEN_RE.captures(s).ok_or_else(invalid)?;
        let uid_validity = caps
            .get(1)
            .and_then(|m| m.as_str().parse().ok())
            .ok_or_else(invalid)?;
        let mut token = SyncToken::new(uid_validity);
        if let Some(m) = caps.get(2) {
            token.highest_modseq = Some(m.as_str().parse().map_err(|_| invalid())?);
        }
        if let Some(m) = caps.get(3) {
            token.uid_next = Some(m.as_str().parse().map_err(|_| invalid())?);
        }
        if let Some(m) = caps.get(4) {
            token.messages = Some(m.as_str().parse().map_err(|_| invalid())?);
        }
        Ok(token)
    }
}

/// The questions a [`Sync::run`] call should answer.
#[derive(Debug, EnumSetType)]
pub enum SyncCriteria {
    /// Only check that the token still applies.
    Validity,
    /// Whether new messages arrived.
    NewMessages,
    /// The UIDs of the new messages.
    NewMessageIds,
    /// Whether any message's flags changed.
    FlagsChanged,
    /// The UIDs of the messages whose flags changed.
    FlagsChangedIds,
    /// Whether any message was expunged.
    Vanished,
    /// The UIDs of the expunged messages.
    VanishedIds,
}

impl SyncCriteria {
    /// Every question, with id sets.
    pub fn all_ids() -> EnumSet<SyncCriteria> {
        EnumSet::all()
    }
}

/// The answer of a [`Sync::run`] call. Only what was asked for is filled in; everything else
/// stays `false` / `None`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SyncResult {
    /// New messages arrived since the token was taken.
    pub new_messages: bool,
    /// The UIDs of the new messages.
    pub new_message_ids: Option<IdSet>,
    /// Some message's flags changed since the token was taken.
    pub flags_changed: bool,
    /// The UIDs of the messages whose flags changed.
    pub flags_changed_ids: Option<IdSet>,
    /// Some message was expunged since the token was taken.
    pub vanished: bool,
    /// The UIDs of the expunged messages.
    pub vanished_ids: Option<IdSet>,
}

/// Tuning knobs of a [`Sync`]. Deserializable, so it can live in an application's config file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Use mod-sequences when the server supports them.
    pub use_modseq: bool,
    /// Ask a `QRESYNC` server for a combined changed/vanished snapshot before searching.
    pub quick_resync: bool,
    /// When a server does not report `UIDNEXT`, fetch the UID of the last message instead.
    pub fetch_missing_uid_next: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            use_modseq: true,
            quick_resync: true,
            fetch_missing_uid_next: true,
        }
    }
}

/// A convenience builder for [`Sync`] values.
///
/// ```
/// # use imap_sync::SyncBuilder;
/// # fn build(transport: impl imap_sync::transport::Transport) {
/// let sync = SyncBuilder::new().use_modseq(false).build(transport);
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct SyncBuilder {
    config: SyncConfig,
}

impl SyncBuilder {
    /// Make a new `SyncBuilder` with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a loaded configuration.
    pub fn from_config(config: SyncConfig) -> Self {
        SyncBuilder { config }
    }

    /// Use mod-sequences when the server supports them. Turning this off always takes the
    /// search-based path.
    pub fn use_modseq(&mut self, use_modseq: bool) -> &mut Self {
        self.config.use_modseq = use_modseq;
        self
    }

    /// Try the combined status snapshot on `QRESYNC` servers before searching.
    pub fn quick_resync(&mut self, quick_resync: bool) -> &mut Self {
        self.config.quick_resync = quick_resync;
        self
    }

    /// Allow one extra `FETCH` when a server leaves out `UIDNEXT`.
    pub fn fetch_missing_uid_next(&mut self, fetch: bool) -> &mut Self {
        self.config.fetch_missing_uid_next = fetch;
        self
    }

    /// Return a new [`Sync`] over `transport`.
    pub fn build<T: Transport>(&self, transport: T) -> Sync<T> {
        Sync {
            transport,
            config: self.config,
        }
    }
}

/// Computes what changed in a mailbox since a [`SyncToken`] was taken.
///
/// Any failure aborts the whole call: a `run` either returns a complete [`SyncResult`] or an
/// error, never a partial answer.
#[derive(Debug)]
pub struct Sync<T> {
    transport: T,
    config: SyncConfig,
}

impl<T: Transport> Sync<T> {
    /// The configuration in use.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Give back the transport.
    pub fn into_inner(self) -> T {
        self.transport
    }

    /// Compare `prev` against the current state of `mailbox`.
    ///
    /// `restriction`, if given, must be a set of UIDs; only those messages are considered and
    /// every returned id set is a subset of it. Without a token, every message counts as new
    /// and changed.
    ///
    /// Fails with [`Error::UidValidityChanged`] before anything else is computed if the
    /// mailbox's `UIDVALIDITY` no longer matches the token.
    pub fn run(
        &mut self,
        mailbox: &str,
        prev: Option<&SyncToken>,
        criteria: EnumSet<SyncCriteria>,
        restriction: Option<&IdSet>,
    ) -> Result<SyncResult> {
        if let Some(restriction) = restriction {
            restriction.expect_type(IdType::Uid)?;
        }

        let support = self.modseq_support()?;
        let status = self.status(mailbox, support)?;
        let uid_validity = required(mailbox, status.uid_validity, "UIDVALIDITY")?;

        if let Some(prev) = prev {
            if prev.uid_validity != uid_validity {
                return Err(Error::UidValidityChanged {
                    mailbox: mailbox.to_string(),
                    cached: prev.uid_validity,
                    current: uid_validity,
                });
            }
        }

        let mut result = SyncResult::default();

        let prev_modseq = prev.and_then(|t| t.highest_modseq);
        let qresync_vanished = support == ModSeqSupport::Qresync && prev_modseq.is_some();
        let want_new =
            !(criteria & (SyncCriteria::NewMessages | SyncCriteria::NewMessageIds)).is_empty();
        let want_vanished =
            !(criteria & (SyncCriteria::Vanished | SyncCriteria::VanishedIds)).is_empty();
        // Without QRESYNC or known UIDs, expunges only show in the message count.
        let count_from = match prev {
            Some(prev) if want_vanished && restriction.is_none() && !qresync_vanished => Some(prev),
            _ => None,
        };

        let mut counted = None;
        if want_new || count_from.is_some() {
            let need_ids = criteria.contains(SyncCriteria::NewMessageIds) || count_from.is_some();
            let (new, ids) = self.new_messages(mailbox, prev, &status, need_ids, restriction)?;
            if want_new {
                result.new_messages = new;
                if criteria.contains(SyncCriteria::NewMessageIds) {
                    let ids = ids.clone().unwrap_or_else(|| IdSet::new(IdType::Uid));
                    result.new_message_ids = Some(restrict(ids, restriction));
                }
            }
            if let Some(prev) = count_from {
                let added = ids.as_ref().map_or(0, IdSet::len);
                counted = Some(vanished_by_count(mailbox, prev, &status, added));
            }
        }

        let delta = SyncCriteria::FlagsChanged
            | SyncCriteria::FlagsChangedIds
            | SyncCriteria::Vanished
            | SyncCriteria::VanishedIds;
        if !(criteria & delta).is_empty() {
            match (support, prev_modseq) {
                (ModSeqSupport::None, _) | (_, None) => {
                    debug!("{}: no usable mod-sequence, reporting every message", mailbox);
                    self.delta_without_modseq(mailbox, criteria, restriction, counted, &mut result)?;
                }
                (support, Some(since)) => {
                    if let Some(current) = status.highest_modseq {
                        if current < since {
                            warn!(
                                "{}: HIGHESTMODSEQ {} is behind the token's {}",
                                mailbox, current, since
                            );
                        }
                    }
                    self.delta_with_modseq(
                        mailbox,
                        support,
                        since,
                        criteria,
                        restriction,
                        counted,
                        &mut result,
                    )?;
                }
            }
        }

        Ok(result)
    }

    /// The token to store once the caller has caught up with `mailbox`.
    pub fn current_token(&mut self, mailbox: &str) -> Result<SyncToken> {
        let support = self.modseq_support()?;
        let status = self.status(mailbox, support)?;
        let mut token = SyncToken::new(required(mailbox, status.uid_validity, "UIDVALIDITY")?);
        token.uid_next = self.uid_next(mailbox, &status)?;
        token.messages = status.messages;
        if support != ModSeqSupport::None {
            token.highest_modseq = status.highest_modseq;
        }
        Ok(token)
    }

    fn modseq_support(&mut self) -> Result<ModSeqSupport> {
        if !self.config.use_modseq {
            return Ok(ModSeqSupport::None);
        }
        Ok(self.transport.capabilities()?.modseq_support())
    }

    fn status(&mut self, mailbox: &str, support: ModSeqSupport) -> Result<MailboxStatus> {
        let mut items = StatusItem::UidValidity | StatusItem::UidNext | StatusItem::Messages;
        if support != ModSeqSupport::None {
            items |= StatusItem::HighestModSeq;
        }
        self.transport.status(mailbox, items, None, None)
    }

    /// `UIDNEXT` as reported, or derived from the last message when the server left it out.
    fn uid_next(&mut self, mailbox: &str, status: &MailboxStatus) -> Result<Option<Uid>> {
        if status.uid_next.is_some() {
            return Ok(status.uid_next);
        }
        let messages = status.messages.unwrap_or(0);
        if messages == 0 {
            return Ok(None);
        }
        if !self.config.fetch_missing_uid_next {
            warn!("{}: server did not report UIDNEXT", mailbox);
            return Ok(None);
        }
        debug!("{}: deriving UIDNEXT from message {}", mailbox, messages);
        let last = IdSet::seqs(Some(messages));
        let fetches = self
            .transport
            .fetch(mailbox, &FetchQuery::new(FetchItem::Uid), Some(&last))?;
        let last = fetches.iter().filter_map(|f| f.uid()).max();
        let next = last.and_then(|uid| uid.checked_add(1));
        if last.is_some() && next.is_none() {
            warn!("{}: last message has UID {}, no UIDNEXT to derive", mailbox, Uid::MAX);
        }
        Ok(next)
    }

    /// Whether messages arrived since `prev`, plus their UIDs when `need_ids` is set or when
    /// only a search can tell.
    ///
    /// A range of new UIDs is searched without the restriction, so that its size can be set
    /// against the message count.
    fn new_messages(
        &mut self,
        mailbox: &str,
        prev: Option<&SyncToken>,
        status: &MailboxStatus,
        need_ids: bool,
        restriction: Option<&IdSet>,
    ) -> Result<(bool, Option<IdSet>)> {
        let none_new = || (false, need_ids.then(|| IdSet::new(IdType::Uid)));
        if status.messages.unwrap_or(0) == 0 {
            return Ok(none_new());
        }
        let prev_next = prev.and_then(|t| t.uid_next);
        let current_next = self.uid_next(mailbox, status)?;

        let query = match (prev_next, current_next) {
            (Some(first), Some(next)) if next <= first => return Ok(none_new()),
            (Some(_), Some(_)) | (None, _) if !need_ids => return Ok((true, None)),
            (Some(first), Some(next)) => SearchQuery::uid_range(first, next - 1),
            (Some(first), None) => {
                warn!("{}: UIDNEXT unknown, searching UIDs from {}", mailbox, first);
                SearchQuery::uid_range(first, Uid::MAX)
            }
            (None, _) => {
                debug!("{}: no UIDNEXT to compare with, every message is new", mailbox);
                let ids = self.transport.search(mailbox, &SearchQuery::new(), restriction)?;
                return Ok((true, Some(ids)));
            }
        };

        debug!("{}: searching new messages with {}", mailbox, query);
        let found = self.transport.search(mailbox, &query, None)?;
        let first = prev_next.unwrap_or(1);
        // a server answers n:m with its highest UID even when that is below n
        let ids = found.intersection(&IdSet::from_ranges(Some(first..=Uid::MAX), IdType::Uid));
        Ok((!ids.is_empty(), Some(ids)))
    }

    /// Flag changes are not tracked: everything in scope counts as changed. Expunges are found
    /// among the messages the caller knows, or through the message count.
    fn delta_without_modseq(
        &mut self,
        mailbox: &str,
        criteria: EnumSet<SyncCriteria>,
        restriction: Option<&IdSet>,
        counted: Option<IdSet>,
        result: &mut SyncResult,
    ) -> Result<()> {
        if !(criteria & (SyncCriteria::FlagsChanged | SyncCriteria::FlagsChangedIds)).is_empty() {
            result.flags_changed = true;
            if criteria.contains(SyncCriteria::FlagsChangedIds) {
                result.flags_changed_ids = Some(
                    restriction
                        .cloned()
                        .unwrap_or_else(|| IdSet::all(IdType::Uid)),
                );
            }
        }

        if !(criteria & (SyncCriteria::Vanished | SyncCriteria::VanishedIds)).is_empty() {
            let vanished = match counted {
                Some(vanished) => vanished,
                None => self.vanished_by_search(mailbox, restriction)?,
            };
            self.set_vanished(criteria, vanished, restriction, result);
        }
        Ok(())
    }

    fn delta_with_modseq(
        &mut self,
        mailbox: &str,
        support: ModSeqSupport,
        since: ModSeq,
        criteria: EnumSet<SyncCriteria>,
        restriction: Option<&IdSet>,
        counted: Option<IdSet>,
        result: &mut SyncResult,
    ) -> Result<()> {
        let want_flags =
            !(criteria & (SyncCriteria::FlagsChanged | SyncCriteria::FlagsChangedIds)).is_empty();
        let want_vanished =
            !(criteria & (SyncCriteria::Vanished | SyncCriteria::VanishedIds)).is_empty();

        if support == ModSeqSupport::Qresync && self.config.quick_resync {
            let snapshot = self.transport.status(
                mailbox,
                StatusItem::LastModSeq | StatusItem::ChangedSince | StatusItem::VanishedSince,
                Some(since),
                restriction,
            )?;
            if snapshot.last_modseq == Some(since) {
                debug!("{}: snapshot matches MODSEQ {}, using it as is", mailbox, since);
                if want_flags {
                    self.set_changed(criteria, snapshot.changed_or_empty(), restriction, result);
                }
                if want_vanished {
                    self.set_vanished(criteria, snapshot.vanished_or_empty(), restriction, result);
                }
                return Ok(());
            }
            match snapshot.last_modseq {
                Some(last) if last > since => warn!(
                    "{}: snapshot taken at MODSEQ {}, ahead of the token's {}, searching",
                    mailbox, last, since
                ),
                last => debug!(
                    "{}: snapshot taken at {:?}, token has {}, searching",
                    mailbox, last, since
                ),
            }
        }

        if want_flags {
            let changed =
                self.transport
                    .search(mailbox, &SearchQuery::changed_since(since), restriction)?;
            self.set_changed(criteria, changed, restriction, result);
        }
        if want_vanished {
            let vanished = match counted {
                _ if support == ModSeqSupport::Qresync => {
                    self.transport.vanished(mailbox, since, restriction)?
                }
                Some(vanished) => vanished,
                None => self.vanished_by_search(mailbox, restriction)?,
            };
            self.set_vanished(criteria, vanished, restriction, result);
        }
        Ok(())
    }

    /// The messages of `restriction` the server no longer has. Without a restriction and
    /// without a token there is nothing known to compare against.
    fn vanished_by_search(
        &mut self,
        mailbox: &str,
        restriction: Option<&IdSet>,
    ) -> Result<IdSet> {
        match restriction {
            Some(known) if !known.is_all() => {
                let present = self
                    .transport
                    .search(mailbox, &SearchQuery::new(), Some(known))?;
                Ok(known.difference(&present))
            }
            _ => {
                debug!("{}: no known UIDs to detect expunges against", mailbox);
                Ok(IdSet::new(IdType::Uid))
            }
        }
    }

    fn set_changed(
        &self,
        criteria: EnumSet<SyncCriteria>,
        changed: IdSet,
        restriction: Option<&IdSet>,
        result: &mut SyncResult,
    ) {
        let changed = restrict(changed, restriction);
        result.flags_changed = !changed.is_empty();
        if criteria.contains(SyncCriteria::FlagsChangedIds) {
            result.flags_changed_ids = Some(changed);
        }
    }

    fn set_vanished(
        &self,
        criteria: EnumSet<SyncCriteria>,
        vanished: IdSet,
        restriction: Option<&IdSet>,
        result: &mut SyncResult,
    ) {
        let vanished = restrict(vanished, restriction);
        result.vanished = !vanished.is_empty();
        if criteria.contains(SyncCriteria::VanishedIds) {
            result.vanished_ids = Some(vanished);
        }
    }
}

/// Expunges seen through the message count alone: what the token counted plus what arrived
/// since must still be there. Which messages went is unknown, so a shortfall (or a count that
/// cannot be compared) is reported as every UID.
fn vanished_by_count(
    mailbox: &str,
    prev: &SyncToken,
    status: &MailboxStatus,
    added: usize,
) -> IdSet {
    let gone = match (prev.messages, status.messages) {
        (Some(before), Some(now)) => before as usize + added > now as usize,
        _ => {
            debug!("{}: message count unknown, assuming expunges", mailbox);
            true
        }
    };
    if gone {
        debug!("{}: messages were expunged, UIDs unknown", mailbox);
        IdSet::all(IdType::Uid)
    } else {
        IdSet::new(IdType::Uid)
    }
}

fn restrict(ids: IdSet, restriction: Option<&IdSet>) -> IdSet {
    match restriction {
        Some(r) => ids.intersection(r),
        None => ids,
    }
}

fn required<V>(mailbox: &str, value: Option<V>, item: &'static str) -> Result<V> {
    value.ok_or_else(|| {
        Error::Parse(ParseError::MissingStatus {
            mailbox: mailbox.to_string(),
            item,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock_transport::{MockTransport, Request};

    const STATUS: &str = "* STATUS INBOX (MESSAGES 10 UIDNEXT 21 UIDVALIDITY 7 HIGHESTMODSEQ 900)\r\n";
    const QRESYNC: &str = "* CAPABILITY IMAP4rev1 CONDSTORE QRESYNC\r\n";
    const CONDSTORE: &str = "* CAPABILITY IMAP4rev1 CONDSTORE\r\n";
    const PLAIN: &str = "* CAPABILITY IMAP4rev1\r\n";

    fn token(uid_validity: u32, modseq: Option<ModSeq>, uid_next: Option<Uid>) -> SyncToken {
        SyncToken {
            uid_validity,
            highest_modseq: modseq,
            uid_next,
            messages: Some(8),
        }
    }

    fn flags_and_vanished() -> EnumSet<SyncCriteria> {
        SyncCriteria::FlagsChanged
            | SyncCriteria::FlagsChangedIds
            | SyncCriteria::Vanished
            | SyncCriteria::VanishedIds
    }

    #[test]
    fn validity_gate() {
        for criteria in vec![
            EnumSet::only(SyncCriteria::Validity),
            SyncCriteria::all_ids(),
            flags_and_vanished(),
        ] {
            let mut mock = MockTransport::new(QRESYNC, STATUS);
            let prev = token(5, Some(800), Some(15));
            let err = SyncBuilder::new()
                .build(&mut mock)
                .run("INBOX", Some(&prev), criteria, None)
                .unwrap_err();
            match &err {
                Error::UidValidityChanged {
                    mailbox,
                    cached,
                    current,
                } => {
                    assert_eq!(mailbox, "INBOX");
                    assert_eq!(*cached, 5);
                    assert_eq!(*current, 7);
                }
                e => panic!("unexpected error: {:?}", e),
            }
            assert!(err.invalidates_cache());
            assert_eq!(mock.requests.len(), 2);
            assert!(matches!(mock.requests[1], Request::Status(_, None, None)));
        }
    }

    #[test]
    fn validity_probe_is_empty() {
        let mut mock = MockTransport::new(QRESYNC, STATUS);
        let prev = token(7, Some(800), Some(15));
        let result = SyncBuilder::new()
            .build(&mut mock)
            .run("INBOX", Some(&prev), EnumSet::only(SyncCriteria::Validity), None)
            .unwrap();
        assert_eq!(result, SyncResult::default());
        assert_eq!(mock.requests.len(), 2);
    }

    #[test]
    fn new_messages_range() {
        let mut mock = MockTransport::new(PLAIN, STATUS).with_search("* SEARCH 16 18 20\r\n");
        let prev = token(7, None, Some(15));
        let result = SyncBuilder::new()
            .build(&mut mock)
            .run(
                "INBOX",
                Some(&prev),
                SyncCriteria::NewMessages | SyncCriteria::NewMessageIds,
                None,
            )
            .unwrap();
        assert!(result.new_messages);
        assert_eq!(result.new_message_ids, Some(IdSet::uids(vec![16, 18, 20])));
        assert_eq!(
            mock.searches(),
            vec![&Request::Search("UID 15:20".to_string(), None)]
        );
    }

    #[test]
    fn no_new_messages() {
        let mut mock = MockTransport::new(PLAIN, STATUS);
        let prev = token(7, None, Some(21));
        let result = SyncBuilder::new()
            .build(&mut mock)
            .run(
                "INBOX",
                Some(&prev),
                SyncCriteria::NewMessages | SyncCriteria::NewMessageIds,
                None,
            )
            .unwrap();
        assert!(!result.new_messages);
        assert_eq!(result.new_message_ids, Some(IdSet::new(IdType::Uid)));
        assert!(mock.searches().is_empty());
    }

    #[test]
    fn first_sync_searches_everything() {
        let mut mock = MockTransport::new(PLAIN, STATUS).with_search("* SEARCH 1 2 3\r\n");
        let result = SyncBuilder::new()
            .build(&mut mock)
            .run("INBOX", None, EnumSet::only(SyncCriteria::NewMessageIds), None)
            .unwrap();
        assert!(result.new_messages);
        assert_eq!(result.new_message_ids, Some(IdSet::uids(vec![1, 2, 3])));
        assert_eq!(
            mock.searches(),
            vec![&Request::Search("ALL".to_string(), None)]
        );
    }

    #[test]
    fn fast_path_uses_snapshot() {
        let snapshot = MailboxStatus {
            last_modseq: Some(800),
            changed: Some(IdSet::uids(vec![3, 4])),
            vanished: Some(IdSet::uids(vec![9])),
            ..MailboxStatus::default()
        };
        let mut mock = MockTransport::new(QRESYNC, STATUS).with_snapshot(snapshot);
        let prev = token(7, Some(800), Some(21));
        let result = SyncBuilder::new()
            .build(&mut mock)
            .run("INBOX", Some(&prev), flags_and_vanished(), None)
            .unwrap();

        assert!(result.flags_changed);
        assert_eq!(result.flags_changed_ids, Some(IdSet::uids(vec![3, 4])));
        assert!(result.vanished);
        assert_eq!(result.vanished_ids, Some(IdSet::uids(vec![9])));
        assert!(mock.searches().is_empty());
        assert!(!mock
            .requests
            .iter()
            .any(|r| matches!(r, Request::Vanished(..))));
        assert_eq!(mock.requests.len(), 3);
        assert_eq!(
            mock.requests[2],
            Request::Status(
                StatusItem::LastModSeq | StatusItem::ChangedSince | StatusItem::VanishedSince,
                Some(800),
                None
            )
        );
    }

    #[test]
    fn stale_snapshot_falls_back() {
        let snapshot = MailboxStatus {
            last_modseq: Some(850),
            changed: Some(IdSet::uids(vec![3])),
            ..MailboxStatus::default()
        };
        let mut mock = MockTransport::new(QRESYNC, STATUS)
            .with_snapshot(snapshot)
            .with_search("* SEARCH 3 5\r\n")
            .with_vanished("* VANISHED (EARLIER) 11:12\r\n");
        let prev = token(7, Some(800), Some(21));
        let result = SyncBuilder::new()
            .build(&mut mock)
            .run("INBOX", Some(&prev), flags_and_vanished(), None)
            .unwrap();

        assert_eq!(result.flags_changed_ids, Some(IdSet::uids(vec![3, 5])));
        assert_eq!(result.vanished_ids, Some(IdSet::uids(vec![11, 12])));
        assert_eq!(
            mock.searches(),
            vec![&Request::Search("MODSEQ 801".to_string(), None)]
        );
        assert!(mock.requests.contains(&Request::Vanished(800, None)));
    }

    #[test]
    fn both_paths_agree() {
        let snapshot = MailboxStatus {
            last_modseq: Some(800),
            changed: Some(IdSet::uids(vec![3, 5])),
            vanished: Some(IdSet::uids(vec![11, 12])),
            ..MailboxStatus::default()
        };
        let prev = token(7, Some(800), Some(21));

        let mut fast = MockTransport::new(QRESYNC, STATUS).with_snapshot(snapshot);
        let fast = SyncBuilder::new()
            .build(&mut fast)
            .run("INBOX", Some(&prev), flags_and_vanished(), None)
            .unwrap();

        let mut slow = MockTransport::new(QRESYNC, STATUS)
            .with_search("* SEARCH 3 5\r\n")
            .with_vanished("* VANISHED (EARLIER) 11:12\r\n");
        let slow = SyncBuilder::new()
            .quick_resync(false)
            .build(&mut slow)
            .run("INBOX", Some(&prev), flags_and_vanished(), None)
            .unwrap();

        assert_eq!(fast, slow);
    }

    #[test]
    fn without_modseq_everything_changed() {
        let mut mock = MockTransport::new(PLAIN, STATUS);
        let prev = token(7, Some(800), Some(21));
        let result = SyncBuilder::new()
            .build(&mut mock)
            .run(
                "INBOX",
                Some(&prev),
                SyncCriteria::FlagsChanged | SyncCriteria::FlagsChangedIds,
                None,
            )
            .unwrap();
        assert!(result.flags_changed);
        assert_eq!(result.flags_changed_ids, Some(IdSet::all(IdType::Uid)));

        let restriction = IdSet::uids(vec![1, 2, 3]);
        let mut mock = MockTransport::new(PLAIN, STATUS);
        let result = SyncBuilder::new()
            .build(&mut mock)
            .run(
                "INBOX",
                Some(&prev),
                SyncCriteria::FlagsChanged | SyncCriteria::FlagsChangedIds,
                Some(&restriction),
            )
            .unwrap();
        assert!(result.flags_changed);
        assert_eq!(result.flags_changed_ids, Some(restriction));
        assert!(mock.searches().is_empty());
    }

    #[test]
    fn modseq_can_be_turned_off() {
        let mut mock = MockTransport::new(QRESYNC, STATUS);
        let prev = token(7, Some(800), Some(21));
        let result = SyncBuilder::new()
            .use_modseq(false)
            .build(&mut mock)
            .run("INBOX", Some(&prev), EnumSet::only(SyncCriteria::FlagsChangedIds), None)
            .unwrap();
        assert_eq!(result.flags_changed_ids, Some(IdSet::all(IdType::Uid)));
        assert!(!mock.requests.contains(&Request::Capabilities));
    }

    #[test]
    fn condstore_finds_vanished_by_search() {
        let restriction = IdSet::uids(vec![2, 4, 6, 8]);
        let mut mock = MockTransport::new(CONDSTORE, STATUS)
            .with_search("* SEARCH 4\r\n")
            .with_search("* SEARCH 2 4 8\r\n");
        let prev = token(7, Some(800), Some(21));
        let result = SyncBuilder::new()
            .build(&mut mock)
            .run("INBOX", Some(&prev), flags_and_vanished(), Some(&restriction))
            .unwrap();
        assert_eq!(result.flags_changed_ids, Some(IdSet::uids(vec![4])));
        assert_eq!(result.vanished_ids, Some(IdSet::uids(vec![6])));
        assert!(result.vanished);
        assert_eq!(
            mock.searches(),
            vec![
                &Request::Search("MODSEQ 801".to_string(), Some(restriction.clone())),
                &Request::Search("ALL".to_string(), Some(restriction.clone())),
            ]
        );
    }

    #[test]
    fn results_are_restricted() {
        let restriction = IdSet::uids(vec![3, 4, 16]);
        let snapshot = MailboxStatus {
            last_modseq: Some(800),
            changed: Some(IdSet::uids(vec![3, 5])),
            vanished: Some(IdSet::uids(vec![9])),
            ..MailboxStatus::default()
        };
        let mut mock = MockTransport::new(QRESYNC, STATUS)
            .with_snapshot(snapshot)
            .with_search("* SEARCH 16 17\r\n");
        let prev = token(7, Some(800), Some(15));
        let result = SyncBuilder::new()
            .build(&mut mock)
            .run("INBOX", Some(&prev), SyncCriteria::all_ids(), Some(&restriction))
            .unwrap();
        assert_eq!(result.flags_changed_ids, Some(IdSet::uids(vec![3])));
        assert_eq!(result.vanished_ids, Some(IdSet::new(IdType::Uid)));
        assert!(!result.vanished);
        assert_eq!(result.new_message_ids, Some(IdSet::uids(vec![16])));
        // the new range is searched in full, then narrowed
        assert_eq!(
            mock.searches(),
            vec![&Request::Search("UID 15:20".to_string(), None)]
        );
    }

    #[test]
    fn unknown_uid_next_skips_old_uids() {
        let status = "* STATUS INBOX (MESSAGES 14 UIDVALIDITY 7)\r\n";
        let prev: SyncToken = "V7|U15|M14".parse().unwrap();

        // nothing arrived, but the server still answers with its last UID
        let mut mock = MockTransport::new(PLAIN, status).with_search("* SEARCH 14\r\n");
        let result = SyncBuilder::new()
            .fetch_missing_uid_next(false)
            .build(&mut mock)
            .run(
                "INBOX",
                Some(&prev),
                SyncCriteria::NewMessages | SyncCriteria::NewMessageIds,
                None,
            )
            .unwrap();
        assert!(!result.new_messages);
        assert_eq!(result.new_message_ids, Some(IdSet::new(IdType::Uid)));
        assert_eq!(
            mock.searches(),
            vec![&Request::Search("UID 15:4294967295".to_string(), None)]
        );

        let mut mock = MockTransport::new(PLAIN, status).with_search("* SEARCH 14 15 16\r\n");
        let result = SyncBuilder::new()
            .fetch_missing_uid_next(false)
            .build(&mut mock)
            .run("INBOX", Some(&prev), EnumSet::only(SyncCriteria::NewMessages), None)
            .unwrap();
        assert!(result.new_messages);
        assert_eq!(result.new_message_ids, None);
    }

    #[test]
    fn expunges_found_by_count() {
        let status = "* STATUS INBOX (MESSAGES 10 UIDNEXT 21 UIDVALIDITY 7 HIGHESTMODSEQ 900)\r\n";
        let run = |messages: Option<u32>, criteria: EnumSet<SyncCriteria>| {
            let mut mock = MockTransport::new(CONDSTORE, status)
                .with_search("* SEARCH 20\r\n")
                .with_search("* SEARCH 3\r\n");
            let prev = SyncToken {
                messages,
                ..token(7, Some(800), Some(20))
            };
            let result = SyncBuilder::new()
                .build(&mut mock)
                .run("INBOX", Some(&prev), criteria, None)
                .unwrap();
            (result, mock.requests)
        };

        // 10 before and 1 new, but only 10 now
        let (result, requests) = run(Some(10), SyncCriteria::all_ids());
        assert!(result.vanished);
        assert_eq!(result.vanished_ids, Some(IdSet::all(IdType::Uid)));
        assert_eq!(result.new_message_ids, Some(IdSet::uids(vec![20])));
        assert_eq!(result.flags_changed_ids, Some(IdSet::uids(vec![3])));
        assert!(requests.contains(&Request::Search("UID 20:20".to_string(), None)));
        assert!(!requests.iter().any(|r| matches!(r, Request::Vanished(..))));

        let (result, _) = run(Some(9), SyncCriteria::all_ids());
        assert!(!result.vanished);
        assert_eq!(result.vanished_ids, Some(IdSet::new(IdType::Uid)));

        // a count that cannot be compared
        let (result, _) = run(None, flags_and_vanished());
        assert!(result.vanished);
        assert!(!result.new_messages);
        assert_eq!(result.new_message_ids, None);

        let (result, requests) = run(Some(9), EnumSet::only(SyncCriteria::Vanished));
        assert!(!result.vanished);
        assert_eq!(result.vanished_ids, None);
        assert_eq!(
            requests.last(),
            Some(&Request::Search("UID 20:20".to_string(), None))
        );
    }

    #[test]
    fn restriction_must_be_uids() {
        let mut mock = MockTransport::new(QRESYNC, STATUS);
        let restriction = IdSet::seqs(vec![1]);
        match SyncBuilder::new().build(&mut mock).run(
            "INBOX",
            None,
            SyncCriteria::all_ids(),
            Some(&restriction),
        ) {
            Err(Error::IdTypeMismatch { expected, found }) => {
                assert_eq!(expected, IdType::Uid);
                assert_eq!(found, IdType::Sequence);
            }
            r => panic!("unexpected result: {:?}", r),
        }
        assert!(mock.requests.is_empty());
    }

    #[test]
    fn failure_aborts_the_call() {
        let mut mock = MockTransport::new(PLAIN, STATUS).with_search_err();
        let prev = token(7, None, Some(15));
        match SyncBuilder::new()
            .build(&mut mock)
            .run("INBOX", Some(&prev), SyncCriteria::all_ids(), None)
        {
            Err(Error::No(_)) => {}
            r => panic!("unexpected result: {:?}", r),
        }
    }

    #[test]
    fn missing_uid_validity() {
        let mut mock = MockTransport::new(PLAIN, "* STATUS INBOX (MESSAGES 1)\r\n");
        match SyncBuilder::new().build(&mut mock).run(
            "INBOX",
            None,
            SyncCriteria::all_ids(),
            None,
        ) {
            Err(Error::Parse(ParseError::MissingStatus { item, .. })) => {
                assert_eq!(item, "UIDVALIDITY")
            }
            r => panic!("unexpected result: {:?}", r),
        }
    }

    #[test]
    fn current_token_from_status() {
        let mut mock = MockTransport::new(QRESYNC, STATUS);
        let token = SyncBuilder::new()
            .build(&mut mock)
            .current_token("INBOX")
            .unwrap();
        assert_eq!(token.to_string(), "V7|H900|U21|M10");

        let mut mock = MockTransport::new(PLAIN, STATUS);
        let token = SyncBuilder::new()
            .build(&mut mock)
            .current_token("INBOX")
            .unwrap();
        assert_eq!(token.to_string(), "V7|U21|M10");
    }

    #[test]
    fn current_token_fetches_missing_uid_next() {
        let mut mock = MockTransport::new(PLAIN, "* STATUS INBOX (MESSAGES 4 UIDVALIDITY 7)\r\n")
            .with_fetch("* 4 FETCH (UID 31)\r\n");
        let token = SyncBuilder::new()
            .build(&mut mock)
            .current_token("INBOX")
            .unwrap();
        assert_eq!(token.uid_next, Some(32));
        assert_eq!(
            mock.requests.last(),
            Some(&Request::Fetch(
                "(UID)".to_string(),
                Some(IdSet::seqs(vec![4]))
            ))
        );

        let mut mock = MockTransport::new(PLAIN, "* STATUS INBOX (MESSAGES 4 UIDVALIDITY 7)\r\n");
        let token = SyncBuilder::new()
            .fetch_missing_uid_next(false)
            .build(&mut mock)
            .current_token("INBOX")
            .unwrap();
        assert_eq!(token.uid_next, None);
        assert!(!mock
            .requests
            .iter()
            .any(|r| matches!(r, Request::Fetch(..))));
    }

    #[test]
    fn highest_uid_leaves_uid_next_unknown() {
        let mut mock = MockTransport::new(PLAIN, "* STATUS INBOX (MESSAGES 1 UIDVALIDITY 7)\r\n")
            .with_fetch("* 1 FETCH (UID 4294967295)\r\n");
        let token = SyncBuilder::new()
            .build(&mut mock)
            .current_token("INBOX")
            .unwrap();
        assert_eq!(token.uid_next, None);
        assert_eq!(token.to_string(), "V7|M1");
    }

    #[test]
    fn token_text_form() {
        let token: SyncToken = "V1408806928|H757|U11|M10".parse().unwrap();
        assert_eq!(
            token,
            SyncToken {
                uid_validity: 1408806928,
                highest_modseq: Some(757),
                uid_next: Some(11),
                messages: Some(10),
            }
        );
        assert_eq!(token.to_string(), "V1408806928|H757|U11|M10");
        assert_eq!(token.highest_uid(), Some(10));
        assert_eq!("V3".parse::<SyncToken>().unwrap(), SyncToken::new(3));

        for bad in &["", "H5", "V|H1", "V1|U2|H3", "V99999999999", "V1|X2"] {
            match bad.parse::<SyncToken>() {
                Err(Error::Parse(ParseError::SyncToken(s))) => assert_eq!(s.as_str(), *bad),
                r => panic!("{:?} parsed as {:?}", bad, r),
            }
        }
    }

    #[test]
    fn token_serde() {
        let token = token(7, Some(800), None);
        let json = serde_json::to_string(&token).unwrap();
        let back: SyncToken = serde_json::from_str(&json).unwrap();
        assert_eq!(back, token);
    }

    #[test]
    fn config_from_partial_json() {
        let config: SyncConfig = serde_json::from_str(r#"{"quick_resync": false}"#).unwrap();
        assert!(config.use_modseq);
        assert!(!config.quick_resync);
        assert!(config.fetch_missing_uid_next);
        let sync = SyncBuilder::from_config(config).build(MockTransport::default());
        assert_eq!(sync.config(), &config);
    }
}
