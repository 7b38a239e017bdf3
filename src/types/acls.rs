use crate::error::{Error, Result, ValidateError};
use crate::parse::{parse_many_into, MapOrNot};
use crate::types::Capabilities;
use imap_proto::types::Response;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// enum used to render the rights argument of `SETACL`, to specify how the ACL is to be modified.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AclModifyMode {
    /// Replace all ACLs on the identifier for the mailbox
    Replace,
    /// Add the given ACLs to the identifier for the mailbox
    Add,
    /// Remove the given ACLs from the identifier for the mailbox
    Remove,
}

impl AclModifyMode {
    /// The `mod-rights` argument of [`SETACL`](https://datatracker.ietf.org/doc/html/rfc4314#section-3.1)
    /// for `rights` under this mode.
    pub fn rights_argument(self, rights: &AclRights) -> String {
        match self {
            AclModifyMode::Replace => rights.to_string(),
            AclModifyMode::Add => format!("+{}", rights),
            AclModifyMode::Remove => format!("-{}", rights),
        }
    }
}

/// From [section 2.1 of RFC 4314](https://datatracker.ietf.org/doc/html/rfc4314#section-2.1).
///
/// A single access right.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AclRight {
    /// `l` - mailbox is visible to LIST/LSUB commands, SUBSCRIBE mailbox
    Lookup,
    /// `r` - SELECT the mailbox, perform STATUS
    Read,
    /// `s` - keep seen/unseen information across sessions
    Seen,
    /// `w` - set or clear flags other than `\Seen` and `\Deleted`
    Write,
    /// `i` - perform APPEND, COPY into mailbox
    Insert,
    /// `p` - send mail to submission address for mailbox
    Post,
    /// `k` - CREATE new sub-mailboxes
    CreateMailbox,
    /// `x` - DELETE mailbox, old mailbox name in RENAME
    DeleteMailbox,
    /// `t` - set or clear `\Deleted` flag via STORE
    DeleteMessage,
    /// `e` - perform EXPUNGE and expunge as part of CLOSE
    Expunge,
    /// `a` - administer (perform SETACL/DELETEACL/GETACL/LISTRIGHTS)
    Administer,
    /// `c` - the RFC 2086 create right. Virtual: held exactly when `k` and `x` are held.
    Create,
    /// `d` - the RFC 2086 delete right. Virtual: held exactly when `x`, `t` and `e` are held.
    Delete,
    /// Any other right, such as the digits reserved for implementation-defined rights.
    Custom(char),
}

/// The virtual rights and the real rights they stand for.
const VIRTUAL_RIGHTS: &[(AclRight, &[AclRight])] = &[
    (
        AclRight::Create,
        &[AclRight::CreateMailbox, AclRight::DeleteMailbox],
    ),
    (
        AclRight::Delete,
        &[
            AclRight::DeleteMailbox,
            AclRight::DeleteMessage,
            AclRight::Expunge,
        ],
    ),
];

impl AclRight {
    /// True for the synthetic RFC 2086 rights `c` and `d`.
    pub fn is_virtual(self) -> bool {
        matches!(self, AclRight::Create | AclRight::Delete)
    }

    /// Position in the canonical listing order of RFC 4314, section 2.1.
    fn rank(self) -> u8 {
        match self {
            AclRight::Lookup => 0,
            AclRight::Read => 1,
            AclRight::Seen => 2,
            AclRight::Write => 3,
            AclRight::Insert => 4,
            AclRight::Post => 5,
            AclRight::CreateMailbox => 6,
            AclRight::DeleteMailbox => 7,
            AclRight::DeleteMessage => 8,
            AclRight::Expunge => 9,
            AclRight::Administer => 10,
            AclRight::Create => 11,
            AclRight::Delete => 12,
            AclRight::Custom(_) => 13,
        }
    }

    fn components(self) -> &'static [AclRight] {
        VIRTUAL_RIGHTS
            .iter()
            .find(|(v, _)| *v == self)
            .map(|(_, c)| *c)
            .unwrap_or(&[])
    }
}

impl TryFrom<char> for AclRight {
    type Error = ValidateError;

    fn try_from(c: char) -> std::result::Result<Self, ValidateError> {
        Ok(match c {
            'l' => AclRight::Lookup,
            'r' => AclRight::Read,
            's' => AclRight::Seen,
            'w' => AclRight::Write,
            'i' => AclRight::Insert,
            'p' => AclRight::Post,
            'k' => AclRight::CreateMailbox,
            'x' => AclRight::DeleteMailbox,
            't' => AclRight::DeleteMessage,
            'e' => AclRight::Expunge,
            'a' => AclRight::Administer,
            'c' => AclRight::Create,
            'd' => AclRight::Delete,
            c if c.is_ascii_lowercase() || c.is_ascii_digit() => AclRight::Custom(c),
            c => return Err(ValidateError::InvalidRight(c)),
        })
    }
}

impl From<AclRight> for char {
    fn from(right: AclRight) -> char {
        match right {
            AclRight::Lookup => 'l',
            AclRight::Read => 'r',
            AclRight::Seen => 's',
            AclRight::Write => 'w',
            AclRight::Insert => 'i',
            AclRight::Post => 'p',
            AclRight::CreateMailbox => 'k',
            AclRight::DeleteMailbox => 'x',
            AclRight::DeleteMessage => 't',
            AclRight::Expunge => 'e',
            AclRight::Administer => 'a',
            AclRight::Create => 'c',
            AclRight::Delete => 'd',
            AclRight::Custom(c) => c,
        }
    }
}

/// The rights one identifier holds on one mailbox, normalized across RFC 2086 and RFC 4314.
///
/// Servers implementing the older RFC 2086 report the coarse `c` and `d` rights, while RFC 4314
/// servers report their finer components. `AclRights` keeps only one canonical form: a virtual
/// right is present if and only if all of its components are. Granting a virtual right grants
/// its components, and revoking any component revokes the virtual right.
///
/// The string form lists rights in the order of RFC 4314, section 2.1 (`lrswipkxtea`, then `c`
/// and `d`), followed by any implementation-defined rights in the order they were first seen.
///
/// ```
/// # use imap_sync::{AclRight, AclRights};
/// let mut rights: AclRights = "lrswi".parse().unwrap();
/// rights.insert(AclRight::Create);
/// assert!(rights.has_right('k'));
/// assert_eq!(rights.to_string(), "lrswikxc");
/// rights.remove(AclRight::DeleteMailbox);
/// assert!(!rights.has_right(AclRight::Create));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct AclRights {
    rights: Vec<AclRight>,
}

/// The result of [`AclRights::diff`]. Never contains virtual rights.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AclDiff {
    /// Rights present in the other set but not in this one.
    pub added: Vec<AclRight>,
    /// Rights present in this set but not in the other one.
    pub removed: Vec<AclRight>,
}

impl AclRights {
    /// An empty set of rights.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns if the set has the provided right (either as a char or an [`AclRight`]).
    ///
    /// Characters that are not rights at all are never held.
    pub fn has_right<T: TryInto<AclRight>>(&self, right: T) -> bool {
        match right.try_into() {
            Ok(right) => self.rights.contains(&right),
            Err(_) => false,
        }
    }

    /// Grant a right. Granting a virtual right grants all of its components.
    pub fn insert(&mut self, right: AclRight) {
        for &component in right.components() {
            self.push(component);
        }
        self.push(right);
        self.normalize();
    }

    /// Revoke a right. Revoking a virtual right revokes all of its components; revoking a
    /// component revokes every virtual right built on it.
    pub fn remove(&mut self, right: AclRight) {
        let components = right.components();
        self.rights
            .retain(|r| *r != right && !components.contains(r));
        self.normalize();
    }

    /// Compare against another rights string, ignoring virtual rights.
    pub fn diff(&self, other: &str) -> Result<AclDiff> {
        let other: AclRights = other.parse()?;
        let added = other
            .real_rights()
            .filter(|r| !self.rights.contains(r))
            .collect();
        let removed = self
            .real_rights()
            .filter(|r| !other.rights.contains(r))
            .collect();
        Ok(AclDiff { added, removed })
    }

    /// Iterate over the rights in canonical order, virtual rights included.
    pub fn iter(&self) -> impl Iterator<Item = AclRight> + '_ {
        self.rights.iter().copied()
    }

    /// The number of rights held, virtual rights included.
    pub fn len(&self) -> usize {
        self.rights.len()
    }

    /// True if no rights are held.
    pub fn is_empty(&self) -> bool {
        self.rights.is_empty()
    }

    /// The master list of rights a server supports, from its `RIGHTS=` capability if it
    /// implements RFC 4314, or the RFC 2086 set otherwise.
    pub fn all_for(capabilities: &Capabilities) -> AclRights {
        let mut all: AclRights = "lrswipa".parse().unwrap_or_default();
        if capabilities.has("RIGHTS") {
            for param in capabilities.params("RIGHTS") {
                for c in param.chars() {
                    if let Ok(right) = AclRight::try_from(c.to_ascii_lowercase()) {
                        all.insert(right);
                    }
                }
            }
        } else {
            all.insert(AclRight::Create);
            all.insert(AclRight::Delete);
        }
        all
    }

    fn real_rights(&self) -> impl Iterator<Item = AclRight> + '_ {
        self.iter().filter(|r| !r.is_virtual())
    }

    fn push(&mut self, right: AclRight) {
        if !self.rights.contains(&right) {
            self.rights.push(right);
        }
    }

    /// Make virtual rights mirror their components and restore canonical order.
    ///
    /// Running this on an already normalized set changes nothing.
    fn normalize(&mut self) {
        for &(virt, components) in VIRTUAL_RIGHTS {
            let complete = components.iter().all(|c| self.rights.contains(c));
            if complete {
                self.push(virt);
            } else {
                self.rights.retain(|r| *r != virt);
            }
        }
        // stable, so custom rights keep the order they were first seen in
        self.rights.sort_by_key(|r| r.rank());
    }
}

impl FromStr for AclRights {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut rights = AclRights::new();
        for c in s.chars() {
            rights.insert(AclRight::try_from(c)?);
        }
        Ok(rights)
    }
}

impl TryFrom<String> for AclRights {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<AclRights> for String {
    fn from(rights: AclRights) -> String {
        rights.to_string()
    }
}

impl Display for AclRights {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let s: String = self.rights.iter().map(|r| char::from(*r)).collect();
        write!(f, "{}", s)
    }
}

impl FromIterator<AclRight> for AclRights {
    fn from_iter<T: IntoIterator<Item = AclRight>>(iter: T) -> Self {
        let mut rights = AclRights::new();
        for right in iter {
            rights.insert(right);
        }
        rights
    }
}

/// Normalize rights as handed out by `imap-proto`.
fn from_proto(rights: Vec<imap_proto::types::AclRight>) -> Result<AclRights> {
    let s: String = rights.into_iter().map(char::from).collect();
    s.parse()
}

/// From [section 3.6 of RFC 4314](https://datatracker.ietf.org/doc/html/rfc4314#section-3.6).
///
/// The ACL response from the getacl IMAP command
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Acl {
    /// the mailbox these rights list are for
    pub mailbox: String,
    /// The list of identifier/rights pairs for the mailbox
    pub entries: Vec<AclEntry>,
}

impl Acl {
    /// Parse the given input into a [`Acl`] response.
    pub fn parse(lines: &[u8]) -> Result<Self> {
        let mut acls = Vec::new();
        parse_many_into(lines, &mut acls, |response| match response {
            Response::Acl(a) => Ok(MapOrNot::Map(a)),
            resp => Ok(MapOrNot::Not(resp)),
        })?;
        let acl = acls
            .pop()
            .ok_or_else(|| Error::Parse(crate::error::ParseError::Invalid(lines.to_vec())))?;

        let mut entries = Vec::with_capacity(acl.acls.len());
        for entry in acl.acls {
            entries.push(AclEntry {
                identifier: entry.identifier.to_string(),
                rights: from_proto(entry.rights)?,
            });
        }
        Ok(Acl {
            mailbox: acl.mailbox.to_string(),
            entries,
        })
    }

    /// The rights of one identifier, if the ACL lists it.
    pub fn rights_of(&self, identifier: &str) -> Option<&AclRights> {
        self.entries
            .iter()
            .find(|e| e.identifier == identifier)
            .map(|e| &e.rights)
    }
}

/// From [section 3.6 of RFC 4314](https://datatracker.ietf.org/doc/html/rfc4314#section-3.6).
///
/// The list of identifiers and rights for the ACL response
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AclEntry {
    /// The user identifier the rights are for
    pub identifier: String,
    /// the rights for the provided identifier
    pub rights: AclRights,
}

/// From [section 3.7 of RFC 4314](https://datatracker.ietf.org/doc/html/rfc4314#section-3.7).
///
/// The LISTRIGHTS response from the listrights IMAP command
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ListRights {
    /// The mailbox for the rights
    pub mailbox: String,
    /// The user identifier for the rights
    pub identifier: String,
    /// The set of rights that are always provided for this identifier
    pub required: AclRights,
    /// The set of rights that can be granted to the identifier
    pub optional: AclRights,
}

impl ListRights {
    /// Parse the given input into a [`ListRights`] response.
    pub fn parse(lines: &[u8]) -> Result<Self> {
        let mut found = Vec::new();
        parse_many_into(lines, &mut found, |response| match response {
            Response::ListRights(a) => Ok(MapOrNot::Map(a)),
            resp => Ok(MapOrNot::Not(resp)),
        })?;
        let lr = found
            .pop()
            .ok_or_else(|| Error::Parse(crate::error::ParseError::Invalid(lines.to_vec())))?;

        Ok(ListRights {
            mailbox: lr.mailbox.to_string(),
            identifier: lr.identifier.to_string(),
            required: from_proto(lr.required)?,
            optional: from_proto(lr.optional)?,
        })
    }
}

/// From [section 3.8 of RFC 4314](https://datatracker.ietf.org/doc/html/rfc4314#section-3.8).
///
/// The MYRIGHTS response from the myrights IMAP command
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MyRights {
    /// The mailbox for the rights
    pub mailbox: String,
    /// The rights for the mailbox
    pub rights: AclRights,
}

impl MyRights {
    /// Parse the given input into a [`MyRights`] response.
    pub fn parse(lines: &[u8]) -> Result<Self> {
        let mut found = Vec::new();
        parse_many_into(lines, &mut found, |response| match response {
            Response::MyRights(a) => Ok(MapOrNot::Map(a)),
            resp => Ok(MapOrNot::Not(resp)),
        })?;
        let mr = found
            .pop()
            .ok_or_else(|| Error::Parse(crate::error::ParseError::Invalid(lines.to_vec())))?;

        Ok(MyRights {
            mailbox: mr.mailbox.to_string(),
            rights: from_proto(mr.rights)?,
        })
    }
}
