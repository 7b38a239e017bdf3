use serde::{Deserialize, Serialize};
use std::collections::btree_map::{self, BTreeMap};
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Whether the numbers in an [`IdSet`] are message sequence numbers or UIDs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IdType {
    /// Message sequence numbers, see [`Seq`](super::Seq).
    Sequence,
    /// Unique identifiers, see [`Uid`](super::Uid).
    #[default]
    Uid,
}

impl fmt::Display for IdType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdType::Sequence => write!(f, "sequence number"),
            IdType::Uid => write!(f, "UID"),
        }
    }
}

/// An ordered set of message identifiers of one [`IdType`].
///
/// Besides explicit ids, a set can stand for every message in the mailbox (`1:*`), which is what
/// a server-side search or an unrestricted sync means by "everything". Intersecting "all" with an
/// explicit set yields the explicit set.
///
/// Ids are kept as runs of contiguous values, so a wide range such as the `1:4294967295` a
/// server may put in a `VANISHED (EARLIER)` answer costs a single entry.
///
/// `IdSet` formats as a compressed IMAP sequence set and can be parsed back from one:
///
/// ```
/// # use imap_sync::IdSet;
/// let ids: IdSet = "1:3,7,9:10".parse().unwrap();
/// assert_eq!(ids.len(), 6);
/// assert!(ids.contains(2));
/// assert_eq!(ids.to_string(), "1:3,7,9:10");
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "IdSetRepr", into = "IdSetRepr")]
pub struct IdSet {
    /// Run start to run end, inclusive. Runs never overlap or touch.
    runs: BTreeMap<u32, u32>,
    all: bool,
    id_type: IdType,
}

#[derive(Serialize, Deserialize)]
struct IdSetRepr {
    ranges: Vec<(u32, u32)>,
    all: bool,
    id_type: IdType,
}

impl From<IdSetRepr> for IdSet {
    fn from(repr: IdSetRepr) -> Self {
        if repr.all {
            return IdSet::all(repr.id_type);
        }
        IdSet::from_ranges(repr.ranges.into_iter().map(|(s, e)| s..=e), repr.id_type)
    }
}

impl From<IdSet> for IdSetRepr {
    fn from(set: IdSet) -> Self {
        IdSetRepr {
            ranges: set.runs.into_iter().collect(),
            all: set.all,
            id_type: set.id_type,
        }
    }
}

impl IdSet {
    /// An empty set of the given kind.
    pub fn new(id_type: IdType) -> Self {
        IdSet {
            runs: BTreeMap::new(),
            all: false,
            id_type,
        }
    }

    /// A set standing for every message in the mailbox.
    pub fn all(id_type: IdType) -> Self {
        IdSet {
            runs: BTreeMap::new(),
            all: true,
            id_type,
        }
    }

    /// A set of UIDs.
    pub fn uids<I: IntoIterator<Item = u32>>(ids: I) -> Self {
        Self::from_ids(ids, IdType::Uid)
    }

    /// A set of message sequence numbers.
    pub fn seqs<I: IntoIterator<Item = u32>>(ids: I) -> Self {
        Self::from_ids(ids, IdType::Sequence)
    }

    /// A set of the given kind holding `ids`.
    pub fn from_ids<I: IntoIterator<Item = u32>>(ids: I, id_type: IdType) -> Self {
        let mut set = IdSet::new(id_type);
        set.extend(ids);
        set
    }

    /// Construct a set from the ranges of a sequence set, as found in a `VANISHED` response.
    pub fn from_ranges<I>(ranges: I, id_type: IdType) -> Self
    where
        I: IntoIterator<Item = RangeInclusive<u32>>,
    {
        let mut set = IdSet::new(id_type);
        for range in ranges {
            set.insert_range(range);
        }
        set
    }

    /// Parse an IMAP sequence set (`1:4,7,10:*`) into a set of the given kind.
    ///
    /// The only open-ended forms accepted are `*` and `1:*`, both of which mean "all".
    pub fn parse(s: &str, id_type: IdType) -> Result<Self> {
        crate::parse::parse_sequence_set(s, id_type)
    }

    /// The kind of ids held in this set.
    pub fn id_type(&self) -> IdType {
        self.id_type
    }

    /// True if the set holds message sequence numbers rather than UIDs.
    pub fn is_sequence(&self) -> bool {
        self.id_type == IdType::Sequence
    }

    /// True if this set stands for every message in the mailbox.
    pub fn is_all(&self) -> bool {
        self.all
    }

    /// Fail with [`Error::IdTypeMismatch`] unless the set holds ids of `expected` kind.
    pub fn expect_type(&self, expected: IdType) -> Result<()> {
        if self.id_type == expected {
            Ok(())
        } else {
            Err(Error::IdTypeMismatch {
                expected,
                found: self.id_type,
            })
        }
    }

    /// Add an id to the set. Adding to an "all" set is a no-op.
    pub fn insert(&mut self, id: u32) {
        self.insert_range(id..=id);
    }

    /// Add every id from `range.start()` to `range.end()`; a reversed range is read the other
    /// way round, like `10:1` in a sequence set.
    pub fn insert_range(&mut self, range: RangeInclusive<u32>) {
        if self.all {
            return;
        }
        let (a, b) = range.into_inner();
        let (mut start, mut end) = (a.min(b), a.max(b));

        let touching: Vec<(u32, u32)> = self
            .runs
            .range(..=end.saturating_add(1))
            .rev()
            .take_while(|&(_, &e)| e.saturating_add(1) >= start)
            .map(|(&s, &e)| (s, e))
            .collect();
        for (s, e) in touching {
            self.runs.remove(&s);
            start = start.min(s);
            end = end.max(e);
        }
        self.runs.insert(start, end);
    }

    /// Remove an id from the set. Returns whether the id was explicitly present.
    pub fn remove(&mut self, id: u32) -> bool {
        let (start, end) = match self.runs.range(..=id).next_back() {
            Some((&s, &e)) if e >= id => (s, e),
            _ => return false,
        };
        self.runs.remove(&start);
        if start < id {
            self.runs.insert(start, id - 1);
        }
        if id < end {
            self.runs.insert(id + 1, end);
        }
        true
    }

    /// True if `id` is in the set. An "all" set contains every id.
    pub fn contains(&self, id: u32) -> bool {
        self.all
            || self
                .runs
                .range(..=id)
                .next_back()
                .map_or(false, |(_, &end)| end >= id)
    }

    /// The number of explicit ids in the set. An "all" set has no explicit ids.
    pub fn len(&self) -> usize {
        self.runs
            .iter()
            .map(|(&s, &e)| (e - s) as usize + 1)
            .sum()
    }

    /// True if the set holds nothing. An "all" set is never empty.
    pub fn is_empty(&self) -> bool {
        !self.all && self.runs.is_empty()
    }

    /// Iterate over the explicit ids in ascending order.
    pub fn iter(&self) -> Ids<'_> {
        Ids {
            runs: self.runs.iter(),
            current: None,
        }
    }

    /// The largest explicit id, if any.
    pub fn max(&self) -> Option<u32> {
        self.runs.values().next_back().copied()
    }

    /// The ids present in both sets. The result keeps the kind of `self`.
    pub fn intersection(&self, other: &IdSet) -> IdSet {
        match (self.all, other.all) {
            (true, true) => IdSet::all(self.id_type),
            (true, false) => IdSet {
                runs: other.runs.clone(),
                all: false,
                id_type: self.id_type,
            },
            (false, true) => self.clone(),
            (false, false) => {
                let mut out = IdSet::new(self.id_type);
                let mut a = self.runs.iter().peekable();
                let mut b = other.runs.iter().peekable();
                loop {
                    let ((s1, e1), (s2, e2)) = match (a.peek(), b.peek()) {
                        (Some(&(&s1, &e1)), Some(&(&s2, &e2))) => ((s1, e1), (s2, e2)),
                        _ => break,
                    };
                    let (s, e) = (s1.max(s2), e1.min(e2));
                    if s <= e {
                        out.runs.insert(s, e);
                    }
                    if e1 < e2 {
                        a.next();
                    } else {
                        b.next();
                    }
                }
                out
            }
        }
    }

    /// The ids present in either set.
    pub fn union(&self, other: &IdSet) -> IdSet {
        if self.all || other.all {
            return IdSet::all(self.id_type);
        }
        let mut out = self.clone();
        for (&s, &e) in &other.runs {
            out.insert_range(s..=e);
        }
        out
    }

    /// The explicit ids of `self` that are not in `other`.
    pub fn difference(&self, other: &IdSet) -> IdSet {
        if other.all {
            return IdSet::new(self.id_type);
        }
        if self.all {
            return self.clone();
        }
        let mut out = IdSet::new(self.id_type);
        for (&start, &end) in &self.runs {
            let before = other
                .runs
                .range(..start)
                .next_back()
                .filter(|&(_, &e)| e >= start);
            let mut next = Some(start);
            for (&s, &e) in before.into_iter().chain(other.runs.range(start..=end)) {
                let cur = match next {
                    Some(cur) => cur,
                    None => break,
                };
                if s > cur {
                    out.runs.insert(cur, s - 1);
                }
                next = e.checked_add(1).map(|n| n.max(cur));
            }
            if let Some(cur) = next {
                if cur <= end {
                    out.runs.insert(cur, end);
                }
            }
        }
        out
    }

    /// The explicit ids as the shortest list of contiguous ranges.
    pub fn ranges(&self) -> Vec<RangeInclusive<u32>> {
        self.runs.iter().map(|(&s, &e)| s..=e).collect()
    }
}

/// Iterator over the ids of an [`IdSet`], see [`IdSet::iter`].
#[derive(Clone, Debug)]
pub struct Ids<'a> {
    runs: btree_map::Iter<'a, u32, u32>,
    current: Option<RangeInclusive<u32>>,
}

impl Iterator for Ids<'_> {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        loop {
            if let Some(id) = self.current.as_mut().and_then(Iterator::next) {
                return Some(id);
            }
            let (&s, &e) = self.runs.next()?;
            self.current = Some(s..=e);
        }
    }
}

impl fmt::Display for IdSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.all {
            return write!(f, "1:*");
        }
        for (i, (&s, &e)) in self.runs.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            if s == e {
                write!(f, "{}", s)?;
            } else {
                write!(f, "{}:{}", s, e)?;
            }
        }
        Ok(())
    }
}

impl FromStr for IdSet {
    type Err = Error;

    /// Parses into a UID set; use [`IdSet::parse`] for sequence numbers.
    fn from_str(s: &str) -> Result<Self> {
        IdSet::parse(s, IdType::Uid)
    }
}

impl<'a> IntoIterator for &'a IdSet {
    type Item = u32;
    type IntoIter = Ids<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl Extend<u32> for IdSet {
    fn extend<T: IntoIterator<Item = u32>>(&mut self, iter: T) {
        for id in iter {
            self.insert(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_vanished_ranges() {
        let uids = IdSet::from_ranges(vec![1..=1, 3..=5, 8..=9, 12..=12], IdType::Uid);
        let mut i = uids.iter();
        assert_eq!(Some(1), i.next());
        assert_eq!(Some(3), i.next());
        assert_eq!(Some(4), i.next());
        assert_eq!(Some(5), i.next());
        assert_eq!(Some(8), i.next());
        assert_eq!(Some(9), i.next());
        assert_eq!(Some(12), i.next());
        assert_eq!(None, i.next());

        let uids = IdSet::from_ranges(vec![], IdType::Uid);
        assert!(uids.is_empty());
    }

    #[test]
    fn wide_ranges_stay_compact() {
        let uids = IdSet::from_ranges(vec![1..=u32::MAX], IdType::Uid);
        assert_eq!(uids.len(), u32::MAX as usize);
        assert!(uids.contains(u32::MAX));
        assert_eq!(uids.max(), Some(u32::MAX));
        assert_eq!(uids.ranges(), vec![1..=u32::MAX]);
        assert_eq!(uids.to_string(), "1:4294967295");

        let known = IdSet::uids(vec![3, 4, 4000000000]);
        assert_eq!(uids.intersection(&known), known);
        assert!(known.difference(&uids).is_empty());
        let rest = uids.difference(&known);
        assert_eq!(rest.to_string(), "1:2,5:3999999999,4000000001:4294967295");
        assert_eq!(rest.iter().take(3).collect::<Vec<_>>(), vec![1, 2, 5]);
    }

    #[test]
    fn runs_merge_and_split() {
        let mut ids = IdSet::uids(vec![1, 2, 5]);
        ids.insert(3);
        ids.insert(4);
        assert_eq!(ids.ranges(), vec![1..=5]);
        ids.insert_range(9..=7);
        ids.insert_range(6..=6);
        assert_eq!(ids.ranges(), vec![1..=9]);

        assert!(ids.remove(4));
        assert!(!ids.remove(4));
        assert!(ids.remove(1));
        assert!(ids.remove(9));
        assert_eq!(ids.to_string(), "2:3,5:8");
        assert_eq!(ids.len(), 6);
        assert!(!ids.contains(4));
        assert!(ids.contains(5));

        ids.insert_range(1..=20);
        assert_eq!(ids, IdSet::from_ranges(vec![1..=20], IdType::Uid));
    }

    #[test]
    fn display_compresses_ranges() {
        let ids = IdSet::uids(vec![9, 1, 2, 3, 5, 10, 11]);
        assert_eq!(ids.to_string(), "1:3,5,9:11");
        assert_eq!(IdSet::all(IdType::Uid).to_string(), "1:*");
        assert_eq!(IdSet::new(IdType::Uid).to_string(), "");
    }

    #[test]
    fn all_semantics() {
        let all = IdSet::all(IdType::Uid);
        assert!(all.contains(4711));
        assert!(!all.is_empty());
        assert_eq!(all.len(), 0);

        let some = IdSet::uids(vec![1, 2]);
        assert_eq!(all.intersection(&some), some);
        assert_eq!(some.intersection(&all), some);
        assert!(some.union(&all).is_all());
        assert!(some.difference(&all).is_empty());
    }

    #[test]
    fn set_arithmetic() {
        let a = IdSet::uids(vec![1, 2, 3, 4]);
        let b = IdSet::uids(vec![3, 4, 5]);
        assert_eq!(a.intersection(&b), IdSet::uids(vec![3, 4]));
        assert_eq!(a.union(&b), IdSet::uids(vec![1, 2, 3, 4, 5]));
        assert_eq!(a.difference(&b), IdSet::uids(vec![1, 2]));
        assert_eq!(b.difference(&a), IdSet::uids(vec![5]));

        let gaps = IdSet::uids(vec![1, 3, 5, 7]);
        let span = IdSet::from_ranges(vec![2..=6], IdType::Uid);
        assert_eq!(gaps.intersection(&span), IdSet::uids(vec![3, 5]));
        assert_eq!(span.difference(&gaps), IdSet::uids(vec![2, 4, 6]));
    }

    #[test]
    fn type_is_checked() {
        let seqs = IdSet::seqs(vec![1]);
        assert!(seqs.is_sequence());
        assert!(seqs.expect_type(IdType::Sequence).is_ok());
        match seqs.expect_type(IdType::Uid) {
            Err(Error::IdTypeMismatch { expected, found }) => {
                assert_eq!(expected, IdType::Uid);
                assert_eq!(found, IdType::Sequence);
            }
            r => panic!("unexpected result: {:?}", r),
        }
    }

    #[test]
    fn insert_into_all_is_noop() {
        let mut all = IdSet::all(IdType::Uid);
        all.insert(3);
        assert_eq!(all.len(), 0);
        assert!(all.is_all());
    }

    #[test]
    fn serde_keeps_runs() {
        let ids = IdSet::from_ranges(vec![1..=3, 10..=u32::MAX], IdType::Sequence);
        let json = serde_json::to_string(&ids).unwrap();
        let back: IdSet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ids);

        let overlapping = r#"{"ranges":[[1,5],[3,8]],"all":false,"id_type":"Uid"}"#;
        let merged: IdSet = serde_json::from_str(overlapping).unwrap();
        assert_eq!(merged.ranges(), vec![1..=8]);
    }
}
