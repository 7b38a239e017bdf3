use imap_proto::types::{Capability, MailboxDatum, Response, ResponseCode, Status};
use nom::{
    branch::alt,
    character::complete::{char, digit1},
    combinator::{all_consuming, map, map_res, opt, value},
    multi::{many0, separated_list0, separated_list1},
    sequence::{delimited, pair, preceded},
    IResult,
};

use super::error::{Error, ParseError, Result};
use super::types::*;

pub(crate) enum MapOrNot<'a, T> {
    Map(T),
    Not(Response<'a>),
    Ignore,
}

/// Run every response in `lines` through `map`, collecting what it maps into `into`.
///
/// Responses `map` does not want are checked against the ones a server may send at any time;
/// anything else is an error.
pub(crate) fn parse_many_into<'a, T, F>(
    mut lines: &'a [u8],
    into: &mut Vec<T>,
    mut map: F,
) -> Result<()>
where
    F: FnMut(Response<'a>) -> Result<MapOrNot<'a, T>>,
{
    loop {
        if lines.is_empty() {
            break Ok(());
        }

        match imap_proto::parser::parse_response(lines) {
            Ok((rest, resp)) => {
                lines = rest;

                match map(resp)? {
                    MapOrNot::Map(t) => into.push(t),
                    MapOrNot::Not(resp) => {
                        if let Some(resp) = handle_unilateral(resp) {
                            break Err(unexpected(resp));
                        }
                    }
                    MapOrNot::Ignore => continue,
                }
            }
            _ => {
                break Err(Error::Parse(ParseError::Invalid(lines.to_vec())));
            }
        }
    }
}

/// Fold `CAPABILITY` responses, and capabilities announced in a response code, into a registry.
pub fn parse_capabilities(lines: &[u8]) -> Result<Capabilities> {
    let mut found = Vec::new();
    parse_many_into(lines, &mut found, |resp| match resp {
        Response::Capabilities(c) => Ok(MapOrNot::Map(c)),
        Response::Data {
            status: Status::Ok,
            code: Some(ResponseCode::Capabilities(c)),
            ..
        } => Ok(MapOrNot::Map(c)),
        resp => Ok(MapOrNot::Not(resp)),
    })?;

    let mut caps = Capabilities::new();
    for capability in found.into_iter().flatten() {
        match capability {
            Capability::Imap4rev1 => caps.add("IMAP4rev1"),
            Capability::Auth(mechanism) => caps.add_params("AUTH", Some(&*mechanism)),
            Capability::Atom(atom) => caps.add_token(&atom),
            #[allow(unreachable_patterns)]
            other => log::trace!("ignoring capability {:?}", other),
        }
    }
    Ok(caps)
}

/// Convert untagged `FETCH` responses, one [`FetchResult`] each.
pub fn parse_fetches(lines: &[u8]) -> Result<Vec<FetchResult>> {
    let mut fetches = Vec::new();
    parse_many_into(lines, &mut fetches, |resp| match resp {
        Response::Fetch(seq, attrs) => Ok(MapOrNot::Map(FetchResult::from_proto(seq, attrs)?)),
        resp => Ok(MapOrNot::Not(resp)),
    })?;
    Ok(fetches)
}

/// Collect the ids of `SEARCH` responses.
pub fn parse_ids(lines: &[u8], id_type: IdType) -> Result<IdSet> {
    let mut found = Vec::new();
    parse_many_into(lines, &mut found, |resp| match resp {
        Response::MailboxData(MailboxDatum::Search(ids)) => Ok(MapOrNot::Map(ids)),
        resp => Ok(MapOrNot::Not(resp)),
    })?;
    Ok(IdSet::from_ids(found.into_iter().flatten(), id_type))
}

/// Collect the UIDs of `VANISHED` responses. `FETCH` responses that accompany them in a
/// `QRESYNC` answer are skipped.
pub fn parse_vanished(lines: &[u8]) -> Result<IdSet> {
    let mut found = Vec::new();
    parse_many_into(lines, &mut found, |resp| match resp {
        Response::Vanished { uids, .. } => Ok(MapOrNot::Map(uids)),
        Response::Fetch(..) => Ok(MapOrNot::Ignore),
        resp => Ok(MapOrNot::Not(resp)),
    })?;
    Ok(IdSet::from_ranges(found.into_iter().flatten(), IdType::Uid))
}

/// Fold the `STATUS` response for `mailbox` into a [`MailboxStatus`]. `STATUS` responses for
/// other mailboxes are skipped.
pub fn parse_status(lines: &[u8], mailbox: &str) -> Result<MailboxStatus> {
    let mut found = Vec::new();
    parse_many_into(lines, &mut found, |resp| match resp {
        Response::MailboxData(MailboxDatum::Status {
            mailbox: name,
            status,
            ..
        }) => {
            if &*name == mailbox {
                Ok(MapOrNot::Map(status))
            } else {
                log::trace!("skipping STATUS for {:?}", &*name);
                Ok(MapOrNot::Ignore)
            }
        }
        resp => Ok(MapOrNot::Not(resp)),
    })?;

    let mut status = MailboxStatus::default();
    for attributes in &found {
        status.apply(attributes);
    }
    Ok(status)
}

/// Convert a [`THREAD`](https://tools.ietf.org/html/rfc5256#section-4) response into a
/// [`ThreadTree`]. Each top-level thread becomes one bucket keyed by its first message.
pub fn parse_thread(lines: &[u8], id_type: IdType) -> Result<ThreadTree> {
    let mut buckets = Vec::new();
    let mut rest = lines;
    while !rest.is_empty() {
        let end = rest
            .windows(2)
            .position(|w| w == b"\r\n")
            .map_or(rest.len(), |p| p + 2);
        let (line, tail) = rest.split_at(end);
        rest = tail;

        if !line.starts_with(b"* THREAD") {
            match imap_proto::parser::parse_response(line) {
                Ok((_, resp)) => {
                    if let Some(resp) = handle_unilateral(resp) {
                        return Err(unexpected(resp));
                    }
                }
                _ => return Err(Error::Parse(ParseError::Invalid(line.to_vec()))),
            }
            continue;
        }

        let text = std::str::from_utf8(line)
            .map_err(|_| Error::Parse(ParseError::Invalid(line.to_vec())))?
            .trim_end();
        let (_, threads) = all_consuming(preceded(
            nom::bytes::complete::tag("* THREAD"),
            many0(preceded(opt(char(' ')), thread_branch)),
        ))(text)
        .map_err(|_| Error::Parse(ParseError::Invalid(line.to_vec())))?;

        for thread in threads {
            let mut members = Vec::new();
            thread.flatten_into(0, &mut members);
            if let Some(&(base, _)) = members.first() {
                buckets.push((base, members));
            }
        }
    }
    ThreadTree::from_buckets(buckets, id_type)
}

/// A parenthesized thread: a chain of messages each the parent of the next, followed by the
/// sub-threads hanging off the last one.
struct ThreadBranch {
    chain: Vec<u32>,
    children: Vec<ThreadBranch>,
}

impl ThreadBranch {
    fn flatten_into(&self, mut level: u32, out: &mut Vec<(u32, u32)>) {
        for &id in &self.chain {
            out.push((id, level));
            level += 1;
        }
        for child in &self.children {
            child.flatten_into(level, out);
        }
    }
}

fn nz_number(input: &str) -> IResult<&str, u32> {
    map_res(digit1, |s: &str| s.parse::<u32>())(input)
}

fn thread_branch(input: &str) -> IResult<&str, ThreadBranch> {
    delimited(char('('), thread_members, char(')'))(input)
}

fn thread_members(input: &str) -> IResult<&str, ThreadBranch> {
    map(
        pair(
            separated_list0(char(' '), nz_number),
            many0(preceded(opt(char(' ')), thread_branch)),
        ),
        |(chain, children)| ThreadBranch { chain, children },
    )(input)
}

#[derive(Clone, Copy)]
enum SeqNumber {
    Number(u32),
    Star,
}

fn seq_number(input: &str) -> IResult<&str, SeqNumber> {
    alt((
        value(SeqNumber::Star, char('*')),
        map(nz_number, SeqNumber::Number),
    ))(input)
}

fn seq_item(input: &str) -> IResult<&str, (SeqNumber, Option<SeqNumber>)> {
    pair(seq_number, opt(preceded(char(':'), seq_number)))(input)
}

/// Parse an IMAP `sequence-set` such as `1:4,7,10:12`.
///
/// `*`, `1:*` and `*:1` stand for every message. Other open-ended ranges depend on the size
/// of the mailbox and are rejected. The empty string is the empty set.
pub fn parse_sequence_set(s: &str, id_type: IdType) -> Result<IdSet> {
    if s.is_empty() {
        return Ok(IdSet::new(id_type));
    }
    let invalid = || Error::Parse(ParseError::SequenceSet(s.to_string()));
    let (_, items) =
        all_consuming(separated_list1(char(','), seq_item))(s).map_err(|_| invalid())?;

    let mut set = IdSet::new(id_type);
    for item in items {
        match item {
            (SeqNumber::Number(0), _) | (_, Some(SeqNumber::Number(0))) => return Err(invalid()),
            (SeqNumber::Number(n), None) => set.insert(n),
            (SeqNumber::Number(a), Some(SeqNumber::Number(b))) => {
                set.insert_range(a..=b);
            }
            (SeqNumber::Star, None)
            | (SeqNumber::Number(1), Some(SeqNumber::Star))
            | (SeqNumber::Star, Some(SeqNumber::Number(1)))
            | (SeqNumber::Star, Some(SeqNumber::Star)) => return Ok(IdSet::all(id_type)),
            _ => return Err(invalid()),
        }
    }
    Ok(set)
}

// check if this is simply a unilateral server response
// (see Section 7 of RFC 3501):
fn handle_unilateral(res: Response<'_>) -> Option<Response<'_>> {
    match res {
        Response::MailboxData(MailboxDatum::Status { mailbox, .. }) => {
            log::trace!("skipping unilateral STATUS for {:?}", &*mailbox);
        }
        Response::MailboxData(MailboxDatum::Recent(n)) => {
            log::trace!("skipping unilateral {} RECENT", n);
        }
        Response::MailboxData(MailboxDatum::Exists(n)) => {
            log::trace!("skipping unilateral {} EXISTS", n);
        }
        Response::Expunge(n) => {
            log::trace!("skipping unilateral {} EXPUNGE", n);
        }
        Response::Data {
            status: Status::Ok, ..
        } => {
            log::trace!("skipping untagged OK");
        }
        Response::Done {
            status: Status::Ok, ..
        } => {
            log::trace!("skipping tagged OK");
        }
        res => {
            return Some(res);
        }
    }
    None
}

fn unexpected(resp: Response<'_>) -> Error {
    let text = |information: Option<&str>| information.unwrap_or_default().to_string();
    match resp {
        Response::Done {
            status: Status::No,
            information,
            ..
        }
        | Response::Data {
            status: Status::No,
            information,
            ..
        } => Error::No(text(information.as_deref())),
        Response::Done {
            status: Status::Bad,
            information,
            ..
        }
        | Response::Data {
            status: Status::Bad,
            information,
            ..
        } => Error::Bad(text(information.as_deref())),
        Response::Data {
            status: Status::Bye,
            ..
        } => Error::ConnectionLost,
        resp => Error::Parse(ParseError::Unexpected(format!("{:?}", resp))),
    }
}
