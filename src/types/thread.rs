use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use super::{IdSet, IdType};
use crate::error::{Error, Result, ValidateError};

/// One message's place in a thread, as returned by [`ThreadTree::thread`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ThreadNode {
    /// The message id.
    pub id: u32,
    /// The first message of the thread, or `None` if the thread has only this message.
    pub base: Option<u32>,
    /// Depth in the thread; the base message is at level 0.
    pub level: u32,
    /// True if no later sibling follows at this level before the thread moves back up.
    pub last: bool,
}

/// The threads of a mailbox, as answered by the [`THREAD`](https://tools.ietf.org/html/rfc5256)
/// command.
///
/// Each thread is stored as a bucket keyed by its base message, holding its messages in the
/// server's depth-first order together with their depth. Every message is in exactly one
/// bucket. Whether the ids are UIDs or sequence numbers is carried along to every derived
/// [`IdSet`].
///
/// ```
/// # use imap_sync::{IdType, ThreadTree};
/// let tree = ThreadTree::from_buckets(
///     vec![(1, vec![(1, 0), (2, 1), (3, 1), (4, 0)]), (9, vec![(9, 0)])],
///     IdType::Uid,
/// )
/// .unwrap();
/// assert_eq!(tree.len(), 5);
/// let thread = tree.thread(3);
/// assert!(thread[2].last);
/// assert_eq!(thread[2].base, Some(1));
/// assert_eq!(tree.thread(9)[0].base, None);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ThreadBuckets", into = "ThreadBuckets")]
pub struct ThreadTree {
    buckets: BTreeMap<u32, Vec<(u32, u32)>>,
    id_type: IdType,
    // message id -> base id
    index: HashMap<u32, u32>,
}

/// The serialized form of a [`ThreadTree`].
#[derive(Clone, Debug, Serialize, Deserialize)]
struct ThreadBuckets {
    buckets: BTreeMap<u32, Vec<(u32, u32)>>,
    id_type: IdType,
}

impl ThreadTree {
    /// Build a tree from buckets of `(id, level)` pairs keyed by base id.
    ///
    /// Fails if a message appears twice, or if a bucket does not start with its base id at
    /// level 0.
    pub fn from_buckets<I>(buckets: I, id_type: IdType) -> Result<Self>
    where
        I: IntoIterator<Item = (u32, Vec<(u32, u32)>)>,
    {
        let mut tree = ThreadTree {
            buckets: BTreeMap::new(),
            id_type,
            index: HashMap::new(),
        };
        for (base, members) in buckets {
            if members.first() != Some(&(base, 0)) {
                return Err(ValidateError::InvalidThreadBase(base).into());
            }
            if tree.buckets.contains_key(&base) {
                return Err(ValidateError::DuplicateThreadMember(base).into());
            }
            for &(id, _) in &members {
                if tree.index.insert(id, base).is_some() {
                    return Err(ValidateError::DuplicateThreadMember(id).into());
                }
            }
            tree.buckets.insert(base, members);
        }
        Ok(tree)
    }

    /// Whether the ids are UIDs or sequence numbers.
    pub fn id_type(&self) -> IdType {
        self.id_type
    }

    /// Every message in every thread.
    pub fn message_list(&self) -> IdSet {
        IdSet::from_ids(self.index.keys().copied(), self.id_type)
    }

    /// The total number of messages.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// True if there are no threads at all.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Iterate over the threads, keyed by base id.
    pub fn buckets(&self) -> impl Iterator<Item = (u32, &[(u32, u32)])> + '_ {
        self.buckets.iter().map(|(base, members)| (*base, &members[..]))
    }

    /// The whole thread containing `id`, in thread order. Empty if `id` is unknown.
    pub fn thread(&self, id: u32) -> Vec<ThreadNode> {
        let members = match self.index.get(&id).and_then(|b| self.buckets.get(b)) {
            Some(members) => members,
            None => return Vec::new(),
        };
        let base = match members.len() {
            1 => None,
            _ => members.first().map(|&(base, _)| base),
        };
        members
            .iter()
            .enumerate()
            .map(|(i, &(id, level))| ThreadNode {
                id,
                base,
                level,
                last: is_last(&members[i + 1..], level),
            })
            .collect()
    }
}

/// The first later member at the same or a lower level decides: the same level means a
/// sibling follows, a lower level closes this one.
fn is_last(rest: &[(u32, u32)], level: u32) -> bool {
    rest.iter()
        .map(|&(_, l)| l)
        .find(|&l| l <= level)
        .map_or(true, |l| l < level)
}

impl TryFrom<ThreadBuckets> for ThreadTree {
    type Error = Error;

    fn try_from(data: ThreadBuckets) -> Result<Self> {
        ThreadTree::from_buckets(data.buckets, data.id_type)
    }
}

impl From<ThreadTree> for ThreadBuckets {
    fn from(tree: ThreadTree) -> Self {
        ThreadBuckets {
            buckets: tree.buckets,
            id_type: tree.id_type,
        }
    }
}
