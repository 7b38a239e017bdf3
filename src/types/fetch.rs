use std::collections::BTreeMap;
use std::fmt;
use std::io::{self, Cursor, Read, Seek, SeekFrom};
use std::str::FromStr;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, FixedOffset};
use imap_proto::types::{AttributeValue, BodyStructure, MessageSection, SectionPath};

use super::{ModSeq, Seq, Uid};
use crate::error::{Error, ParseError, Result, ValidateError};

/// Anything a stored body can be read back from.
pub trait ReadSeek: Read + Seek {}
impl<T: Read + Seek> ReadSeek for T {}

/// Body-like data as it was handed to a [`FetchResult`].
///
/// Either form can be read back as bytes or as a stream; streams are rewound first, so reading
/// never depends on where a previous reader left off.
pub enum Content {
    /// Data held in memory.
    InMemory(Vec<u8>),
    /// Data behind a seekable handle, such as a temporary file.
    Seekable(Box<dyn ReadSeek + Send>),
}

impl Content {
    /// Wrap a seekable handle.
    pub fn from_reader<R: Read + Seek + Send + 'static>(reader: R) -> Self {
        Content::Seekable(Box::new(reader))
    }

    /// Read the whole content. A seekable handle is rewound before and after reading.
    pub fn to_bytes(&mut self) -> io::Result<Vec<u8>> {
        match self {
            Content::InMemory(data) => Ok(data.clone()),
            Content::Seekable(handle) => {
                handle.seek(SeekFrom::Start(0))?;
                let mut data = Vec::new();
                handle.read_to_end(&mut data)?;
                handle.seek(SeekFrom::Start(0))?;
                Ok(data)
            }
        }
    }

    /// A stream positioned at the start of the content.
    pub fn stream(&mut self) -> io::Result<BodyStream<'_>> {
        match self {
            Content::InMemory(data) => Ok(BodyStream::Memory(Cursor::new(&data[..]))),
            Content::Seekable(handle) => {
                handle.seek(SeekFrom::Start(0))?;
                Ok(BodyStream::Handle(&mut **handle))
            }
        }
    }
}

impl fmt::Debug for Content {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Content::InMemory(data) => f.debug_tuple("InMemory").field(&data.len()).finish(),
            Content::Seekable(_) => f.write_str("Seekable(..)"),
        }
    }
}

impl From<Vec<u8>> for Content {
    fn from(data: Vec<u8>) -> Self {
        Content::InMemory(data)
    }
}

impl From<&[u8]> for Content {
    fn from(data: &[u8]) -> Self {
        Content::InMemory(data.to_vec())
    }
}

impl From<&str> for Content {
    fn from(data: &str) -> Self {
        Content::InMemory(data.as_bytes().to_vec())
    }
}

impl From<String> for Content {
    fn from(data: String) -> Self {
        Content::InMemory(data.into_bytes())
    }
}

/// A readable, seekable view of a [`Content`].
pub enum BodyStream<'a> {
    /// Reading from memory owned by the [`FetchResult`].
    Memory(Cursor<&'a [u8]>),
    /// Reading through the stored handle.
    Handle(&'a mut (dyn ReadSeek + Send + 'static)),
}

impl Read for BodyStream<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            BodyStream::Memory(cursor) => cursor.read(buf),
            BodyStream::Handle(handle) => handle.read(buf),
        }
    }
}

impl Seek for BodyStream<'_> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match self {
            BodyStream::Memory(cursor) => cursor.seek(pos),
            BodyStream::Handle(handle) => handle.seek(pos),
        }
    }
}

/// The content transfer encoding of a stored body part, used by
/// [`FetchResult::body_part_decoded`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContentEncoding {
    /// The server already decoded the part ([RFC 3516](https://tools.ietf.org/html/rfc3516)
    /// `BINARY`) and the result is 8-bit text.
    EightBit,
    /// The server already decoded the part and the result may contain any octet.
    Binary,
    /// The part is still base64 transfer-encoded.
    Base64,
}

/// A MIME part identifier as used in `BODY[<section>]`.
///
/// `0` stands for the whole message; every other id is a dot-separated list of positive
/// integers (`1`, `2.1.3`). Ids order numerically per component, so `2` sorts before `10`.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MimeId(Vec<u32>);

impl MimeId {
    /// The id of the whole message.
    pub fn whole() -> Self {
        MimeId(Vec::new())
    }

    /// Build an id from its path components. An empty path is the whole message.
    pub fn from_path(path: &[u32]) -> Result<Self> {
        if path.contains(&0) {
            let text = path
                .iter()
                .map(|p| p.to_string())
                .collect::<Vec<_>>()
                .join(".");
            return Err(ValidateError::InvalidMimeId(text).into());
        }
        Ok(MimeId(path.to_vec()))
    }

    /// True for the whole-message id `0`.
    pub fn is_whole(&self) -> bool {
        self.0.is_empty()
    }

    /// The path components; empty for the whole message.
    pub fn path(&self) -> &[u32] {
        &self.0
    }

    /// The id of the `n`th (1-based) child part.
    pub fn child(&self, n: u32) -> Self {
        let mut path = self.0.clone();
        path.push(n);
        MimeId(path)
    }
}

impl FromStr for MimeId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s == "0" {
            return Ok(MimeId::whole());
        }
        let invalid = || Error::from(ValidateError::InvalidMimeId(s.to_string()));
        let mut path = Vec::new();
        for component in s.split('.') {
            if component.is_empty() || !component.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid());
            }
            match component.parse::<u32>() {
                Ok(n) if n > 0 => path.push(n),
                _ => return Err(invalid()),
            }
        }
        Ok(MimeId(path))
    }
}

impl From<u32> for MimeId {
    /// `0` is the whole message, anything else a top-level part.
    fn from(n: u32) -> Self {
        if n == 0 {
            MimeId::whole()
        } else {
            MimeId(vec![n])
        }
    }
}

impl fmt::Display for MimeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "0");
        }
        for (i, n) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            write!(f, "{}", n)?;
        }
        Ok(())
    }
}

/// One node of a message's MIME structure, from `BODYSTRUCTURE`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MimePart {
    /// The id to fetch this part with.
    pub id: MimeId,
    /// Lower-cased primary type, e.g. `text`.
    pub media_type: String,
    /// Lower-cased subtype, e.g. `plain`.
    pub subtype: String,
    /// Content-Type parameters, names lower-cased.
    pub params: BTreeMap<String, String>,
    /// Lower-cased transfer encoding for single parts.
    pub encoding: Option<String>,
    /// Encoded size in octets for single parts.
    pub size: Option<u32>,
    /// Sub-parts of a multipart, or the body of an embedded message.
    pub parts: Vec<MimePart>,
}

impl MimePart {
    /// `type/subtype`.
    pub fn mime_type(&self) -> String {
        format!("{}/{}", self.media_type, self.subtype)
    }

    /// Find the part with the given id in this subtree.
    pub fn find(&self, id: &MimeId) -> Option<&MimePart> {
        if &self.id == id {
            return Some(self);
        }
        self.parts.iter().find_map(|p| p.find(id))
    }

    /// The root part of a message. A single-part message body is part `1`, a multipart root
    /// is `0`.
    fn from_proto_root(bs: &BodyStructure<'_>) -> Self {
        match bs {
            BodyStructure::Multipart { .. } => Self::from_proto(bs, MimeId::whole()),
            _ => Self::from_proto(bs, MimeId::from(1)),
        }
    }

    fn from_proto(bs: &BodyStructure<'_>, id: MimeId) -> Self {
        let (common, single, parts) = match bs {
            BodyStructure::Basic { common, other, .. }
            | BodyStructure::Text { common, other, .. } => (common, Some(other), Vec::new()),
            BodyStructure::Message {
                common,
                other,
                body,
                ..
            } => {
                // an embedded multipart shares the id of the message part it lives in
                let inner = match **body {
                    BodyStructure::Multipart { .. } => Self::from_proto(body, id.clone()),
                    _ => Self::from_proto(body, id.child(1)),
                };
                (common, Some(other), vec![inner])
            }
            BodyStructure::Multipart { common, bodies, .. } => {
                let parts = bodies
                    .iter()
                    .zip(1..)
                    .map(|(b, n)| Self::from_proto(b, id.child(n)))
                    .collect();
                (common, None, parts)
            }
        };

        let params = common
            .ty
            .params
            .iter()
            .flatten()
            .map(|(k, v)| (k.to_lowercase(), v.to_string()))
            .collect();
        MimePart {
            id,
            media_type: common.ty.ty.to_lowercase(),
            subtype: common.ty.subtype.to_lowercase(),
            params,
            encoding: single.map(|s| encoding_name(&s.transfer_encoding)),
            size: single.map(|s| s.octets),
            parts,
        }
    }
}

fn encoding_name(encoding: &imap_proto::types::ContentEncoding<'_>) -> String {
    use imap_proto::types::ContentEncoding as E;
    match encoding {
        E::SevenBit => "7bit".to_string(),
        E::EightBit => "8bit".to_string(),
        E::Binary => "binary".to_string(),
        E::Base64 => "base64".to_string(),
        E::QuotedPrintable => "quoted-printable".to_string(),
        E::Other(other) => other.to_lowercase(),
    }
}

/// One address of an [`Envelope`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Address {
    /// Display name.
    pub name: Option<String>,
    /// Local part.
    pub mailbox: Option<String>,
    /// Domain.
    pub host: Option<String>,
}

impl Address {
    /// `mailbox@host`, if both are known.
    pub fn address(&self) -> Option<String> {
        match (&self.mailbox, &self.host) {
            (Some(m), Some(h)) => Some(format!("{}@{}", m, h)),
            _ => None,
        }
    }
}

/// The `ENVELOPE` of a message. Non-UTF-8 bytes are replaced.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct Envelope {
    pub date: Option<String>,
    pub subject: Option<String>,
    pub from: Vec<Address>,
    pub sender: Vec<Address>,
    pub reply_to: Vec<Address>,
    pub to: Vec<Address>,
    pub cc: Vec<Address>,
    pub bcc: Vec<Address>,
    pub in_reply_to: Option<String>,
    pub message_id: Option<String>,
}

macro_rules! lossy {
    ($e:expr) => {
        $e.as_ref().map(|b| String::from_utf8_lossy(b).into_owned())
    };
}

fn addresses(list: &Option<Vec<imap_proto::types::Address<'_>>>) -> Vec<Address> {
    list.iter()
        .flatten()
        .map(|a| Address {
            name: lossy!(a.name),
            mailbox: lossy!(a.mailbox),
            host: lossy!(a.host),
        })
        .collect()
}

impl From<&imap_proto::types::Envelope<'_>> for Envelope {
    fn from(e: &imap_proto::types::Envelope<'_>) -> Self {
        Envelope {
            date: lossy!(e.date),
            subject: lossy!(e.subject),
            from: addresses(&e.from),
            sender: addresses(&e.sender),
            reply_to: addresses(&e.reply_to),
            to: addresses(&e.to),
            cc: addresses(&e.cc),
            bcc: addresses(&e.bcc),
            in_reply_to: lossy!(e.in_reply_to),
            message_id: lossy!(e.message_id),
        }
    }
}

/// The kinds of data a [`FetchResult`] can hold, for [`FetchResult::exists`].
#[allow(missing_docs)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FetchAttribute {
    FullMessage,
    Structure,
    Headers,
    HeaderText,
    MimeHeader,
    BodyPart,
    BodyPartSize,
    BodyText,
    Envelope,
    Flags,
    ImapDate,
    Size,
    Uid,
    Seq,
    ModSeq,
    Downgraded,
}

/// Everything known about one message from one or more `FETCH` responses.
///
/// Every attribute starts out absent. Getters never fail because of absence: they return an
/// empty value (no bytes, no flags, zero) or `None` where the distinction matters. Fragments
/// for the same message are folded together with [`FetchResult::merge`].
///
/// Body-like attributes are stored as [`Content`] and can be read back as bytes or as a
/// [`BodyStream`] regardless of how they were stored. Reading touches the stored handle, so
/// those getters take `&mut self`.
#[derive(Debug, Default)]
pub struct FetchResult {
    full_msg: Option<Content>,
    structure: Option<MimePart>,
    headers: BTreeMap<String, Content>,
    header_text: BTreeMap<MimeId, Content>,
    mime_header: BTreeMap<MimeId, Content>,
    body_part: BTreeMap<MimeId, Content>,
    body_part_encoding: BTreeMap<MimeId, ContentEncoding>,
    body_part_size: BTreeMap<MimeId, u32>,
    body_text: BTreeMap<MimeId, Content>,
    envelope: Option<Envelope>,
    flags: Option<Vec<String>>,
    imap_date: Option<DateTime<FixedOffset>>,
    size: Option<u32>,
    uid: Option<Uid>,
    seq: Option<Seq>,
    modseq: Option<ModSeq>,
    downgraded: Option<bool>,
}

fn read_bytes(content: Option<&mut Content>) -> Result<Vec<u8>> {
    match content {
        Some(c) => Ok(c.to_bytes()?),
        None => Ok(Vec::new()),
    }
}

fn read_stream(content: Option<&mut Content>) -> Result<BodyStream<'_>> {
    match content {
        Some(c) => Ok(c.stream()?),
        None => Ok(BodyStream::Memory(Cursor::new(&[][..]))),
    }
}

impl FetchResult {
    /// An empty result.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the entire message.
    pub fn set_full_msg(&mut self, content: impl Into<Content>) {
        self.full_msg = Some(content.into());
    }

    /// The entire message (`BODY[]` or `RFC822`).
    pub fn full_msg(&mut self) -> Result<Vec<u8>> {
        read_bytes(self.full_msg.as_mut())
    }

    /// The entire message as a stream.
    pub fn full_msg_stream(&mut self) -> Result<BodyStream<'_>> {
        read_stream(self.full_msg.as_mut())
    }

    /// Store the parsed `BODYSTRUCTURE`.
    pub fn set_structure(&mut self, structure: MimePart) {
        self.structure = Some(structure);
    }

    /// The MIME structure, if it was fetched.
    pub fn structure(&self) -> Option<&MimePart> {
        self.structure.as_ref()
    }

    /// Store header data under a caller-chosen label.
    pub fn set_headers(&mut self, label: &str, content: impl Into<Content>) {
        self.headers.insert(label.to_string(), content.into());
    }

    /// Header data stored under `label`.
    pub fn headers(&mut self, label: &str) -> Result<Vec<u8>> {
        read_bytes(self.headers.get_mut(label))
    }

    /// Header data stored under `label`, as a stream.
    pub fn headers_stream(&mut self, label: &str) -> Result<BodyStream<'_>> {
        read_stream(self.headers.get_mut(label))
    }

    /// The header block of a part; [`MimeId::whole`] is the message header.
    pub fn set_header_text(&mut self, id: MimeId, content: impl Into<Content>) {
        self.header_text.insert(id, content.into());
    }

    /// The header block of a part.
    pub fn header_text(&mut self, id: &MimeId) -> Result<Vec<u8>> {
        read_bytes(self.header_text.get_mut(id))
    }

    /// The header block of a part, as a stream.
    pub fn header_text_stream(&mut self, id: &MimeId) -> Result<BodyStream<'_>> {
        read_stream(self.header_text.get_mut(id))
    }

    /// The MIME header of a part (`BODY[<id>.MIME]`).
    pub fn set_mime_header(&mut self, id: MimeId, content: impl Into<Content>) {
        self.mime_header.insert(id, content.into());
    }

    /// The MIME header of a part.
    pub fn mime_header(&mut self, id: &MimeId) -> Result<Vec<u8>> {
        read_bytes(self.mime_header.get_mut(id))
    }

    /// The MIME header of a part, as a stream.
    pub fn mime_header_stream(&mut self, id: &MimeId) -> Result<BodyStream<'_>> {
        read_stream(self.mime_header.get_mut(id))
    }

    /// Store the body of a part. `encoding` records whether the data still carries its
    /// transfer encoding, see [`FetchResult::body_part_decoded`].
    pub fn set_body_part(
        &mut self,
        id: MimeId,
        content: impl Into<Content>,
        encoding: Option<ContentEncoding>,
    ) {
        match encoding {
            Some(e) => self.body_part_encoding.insert(id.clone(), e),
            None => self.body_part_encoding.remove(&id),
        };
        self.body_part.insert(id, content.into());
    }

    /// The body of a part as stored.
    pub fn body_part(&mut self, id: &MimeId) -> Result<Vec<u8>> {
        read_bytes(self.body_part.get_mut(id))
    }

    /// The body of a part as stored, as a stream.
    pub fn body_part_stream(&mut self, id: &MimeId) -> Result<BodyStream<'_>> {
        read_stream(self.body_part.get_mut(id))
    }

    /// The encoding hint given when the part was stored.
    pub fn body_part_encoding(&self, id: &MimeId) -> Option<ContentEncoding> {
        self.body_part_encoding.get(id).copied()
    }

    /// The body of a part with any base64 transfer encoding removed.
    pub fn body_part_decoded(&mut self, id: &MimeId) -> Result<Vec<u8>> {
        let data = self.body_part(id)?;
        if self.body_part_encoding(id) != Some(ContentEncoding::Base64) {
            return Ok(data);
        }
        let compact: Vec<u8> = data
            .iter()
            .copied()
            .filter(|b| !b.is_ascii_whitespace())
            .collect();
        STANDARD
            .decode(&compact)
            .map_err(|_| Error::Parse(ParseError::Invalid(data)))
    }

    /// Store the decoded size of a part (`BINARY.SIZE`).
    pub fn set_body_part_size(&mut self, id: MimeId, size: u32) {
        self.body_part_size.insert(id, size);
    }

    /// The decoded size of a part, `0` if unknown.
    pub fn body_part_size(&self, id: &MimeId) -> u32 {
        self.body_part_size.get(id).copied().unwrap_or(0)
    }

    /// The text of a part without its headers; [`MimeId::whole`] is the message text.
    pub fn set_body_text(&mut self, id: MimeId, content: impl Into<Content>) {
        self.body_text.insert(id, content.into());
    }

    /// The text of a part.
    pub fn body_text(&mut self, id: &MimeId) -> Result<Vec<u8>> {
        read_bytes(self.body_text.get_mut(id))
    }

    /// The text of a part, as a stream.
    pub fn body_text_stream(&mut self, id: &MimeId) -> Result<BodyStream<'_>> {
        read_stream(self.body_text.get_mut(id))
    }

    /// Store the parsed `ENVELOPE`.
    pub fn set_envelope(&mut self, envelope: Envelope) {
        self.envelope = Some(envelope);
    }

    /// The envelope, if it was fetched.
    pub fn envelope(&self) -> Option<&Envelope> {
        self.envelope.as_ref()
    }

    /// Store the message flags, lower-cased.
    pub fn set_flags<I, S>(&mut self, flags: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.flags = Some(
            flags
                .into_iter()
                .map(|f| f.as_ref().to_lowercase())
                .collect(),
        );
    }

    /// The message flags, lower-cased. Empty if unknown.
    pub fn flags(&self) -> &[String] {
        self.flags.as_deref().unwrap_or(&[])
    }

    /// Store the `INTERNALDATE`.
    pub fn set_imap_date(&mut self, date: DateTime<FixedOffset>) {
        self.imap_date = Some(date);
    }

    /// The `INTERNALDATE` of the message.
    pub fn imap_date(&self) -> Option<DateTime<FixedOffset>> {
        self.imap_date
    }

    /// Store `RFC822.SIZE`.
    pub fn set_size(&mut self, size: u32) {
        self.size = Some(size);
    }

    /// `RFC822.SIZE`, `0` if unknown.
    pub fn size(&self) -> u32 {
        self.size.unwrap_or(0)
    }

    /// Store the message UID.
    pub fn set_uid(&mut self, uid: Uid) {
        self.uid = Some(uid);
    }

    /// The message UID.
    pub fn uid(&self) -> Option<Uid> {
        self.uid
    }

    /// Store the message sequence number.
    pub fn set_seq(&mut self, seq: Seq) {
        self.seq = Some(seq);
    }

    /// The message sequence number.
    pub fn seq(&self) -> Option<Seq> {
        self.seq
    }

    /// Store the message mod-sequence.
    pub fn set_modseq(&mut self, modseq: ModSeq) {
        self.modseq = Some(modseq);
    }

    /// The message mod-sequence, when the server has `CONDSTORE`.
    pub fn modseq(&self) -> Option<ModSeq> {
        self.modseq
    }

    /// Mark the message as downgraded from an internationalized original
    /// ([RFC 6858](https://tools.ietf.org/html/rfc6858)).
    pub fn set_downgraded(&mut self, downgraded: bool) {
        self.downgraded = Some(downgraded);
    }

    /// Whether the message was downgraded. `false` if unknown.
    pub fn downgraded(&self) -> bool {
        self.downgraded.unwrap_or(false)
    }

    /// True if any value of the given kind has been stored.
    pub fn exists(&self, attribute: FetchAttribute) -> bool {
        match attribute {
            FetchAttribute::FullMessage => self.full_msg.is_some(),
            FetchAttribute::Structure => self.structure.is_some(),
            FetchAttribute::Headers => !self.headers.is_empty(),
            FetchAttribute::HeaderText => !self.header_text.is_empty(),
            FetchAttribute::MimeHeader => !self.mime_header.is_empty(),
            FetchAttribute::BodyPart => !self.body_part.is_empty(),
            FetchAttribute::BodyPartSize => !self.body_part_size.is_empty(),
            FetchAttribute::BodyText => !self.body_text.is_empty(),
            FetchAttribute::Envelope => self.envelope.is_some(),
            FetchAttribute::Flags => self.flags.is_some(),
            FetchAttribute::ImapDate => self.imap_date.is_some(),
            FetchAttribute::Size => self.size.is_some(),
            FetchAttribute::Uid => self.uid.is_some(),
            FetchAttribute::Seq => self.seq.is_some(),
            FetchAttribute::ModSeq => self.modseq.is_some(),
            FetchAttribute::Downgraded => self.downgraded.is_some(),
        }
    }

    /// True if nothing has ever been stored.
    pub fn is_default(&self) -> bool {
        const ALL: [FetchAttribute; 16] = [
            FetchAttribute::FullMessage,
            FetchAttribute::Structure,
            FetchAttribute::Headers,
            FetchAttribute::HeaderText,
            FetchAttribute::MimeHeader,
            FetchAttribute::BodyPart,
            FetchAttribute::BodyPartSize,
            FetchAttribute::BodyText,
            FetchAttribute::Envelope,
            FetchAttribute::Flags,
            FetchAttribute::ImapDate,
            FetchAttribute::Size,
            FetchAttribute::Uid,
            FetchAttribute::Seq,
            FetchAttribute::ModSeq,
            FetchAttribute::Downgraded,
        ];
        !ALL.iter().any(|a| self.exists(*a))
    }

    /// Fold another fragment for the same message into this one. Values present in `other`
    /// replace ours; keyed values are merged key by key.
    pub fn merge(&mut self, other: FetchResult) {
        fn take<T>(ours: &mut Option<T>, theirs: Option<T>) {
            if theirs.is_some() {
                *ours = theirs;
            }
        }

        take(&mut self.full_msg, other.full_msg);
        take(&mut self.structure, other.structure);
        self.headers.extend(other.headers);
        self.header_text.extend(other.header_text);
        self.mime_header.extend(other.mime_header);
        for id in other.body_part.keys() {
            self.body_part_encoding.remove(id);
        }
        self.body_part.extend(other.body_part);
        self.body_part_encoding.extend(other.body_part_encoding);
        self.body_part_size.extend(other.body_part_size);
        self.body_text.extend(other.body_text);
        take(&mut self.envelope, other.envelope);
        take(&mut self.flags, other.flags);
        take(&mut self.imap_date, other.imap_date);
        take(&mut self.size, other.size);
        take(&mut self.uid, other.uid);
        take(&mut self.seq, other.seq);
        take(&mut self.modseq, other.modseq);
        take(&mut self.downgraded, other.downgraded);
    }

    /// Build a result from the attributes of one untagged `FETCH` response.
    pub(crate) fn from_proto(seq: Seq, attrs: Vec<AttributeValue<'_>>) -> Result<Self> {
        let mut result = FetchResult::new();
        result.set_seq(seq);
        for attr in attrs {
            match attr {
                AttributeValue::Uid(uid) => result.set_uid(uid),
                AttributeValue::ModSeq(modseq) => result.set_modseq(modseq),
                AttributeValue::Rfc822Size(size) => result.set_size(size),
                AttributeValue::Flags(flags) => result.set_flags(flags.iter().map(|f| f.to_string())),
                AttributeValue::InternalDate(date) => {
                    result.set_imap_date(parse_internal_date(&date)?)
                }
                AttributeValue::Envelope(envelope) => result.set_envelope(Envelope::from(&*envelope)),
                AttributeValue::BodyStructure(bs) => {
                    result.set_structure(MimePart::from_proto_root(&bs))
                }
                AttributeValue::Rfc822(data) => result.set_full_msg(bytes(data)),
                AttributeValue::Rfc822Header(data) => {
                    result.set_header_text(MimeId::whole(), bytes(data))
                }
                AttributeValue::Rfc822Text(data) => {
                    result.set_body_text(MimeId::whole(), bytes(data))
                }
                AttributeValue::BodySection { section, data, .. } => {
                    let data = bytes(data);
                    match section {
                        None => result.set_full_msg(data),
                        Some(SectionPath::Full(part)) => {
                            result.set_section(MimeId::whole(), part, data)
                        }
                        Some(SectionPath::Part(path, None)) => {
                            result.set_body_part(MimeId::from_path(&path)?, data, None)
                        }
                        Some(SectionPath::Part(path, Some(part))) => {
                            result.set_section(MimeId::from_path(&path)?, part, data)
                        }
                    }
                }
                other => log::trace!("ignoring FETCH attribute {:?}", other),
            }
        }
        Ok(result)
    }

    fn set_section(&mut self, id: MimeId, section: MessageSection, data: Vec<u8>) {
        match section {
            MessageSection::Header => self.set_header_text(id, data),
            MessageSection::Mime => self.set_mime_header(id, data),
            MessageSection::Text => self.set_body_text(id, data),
        }
    }
}

fn bytes<B: AsRef<[u8]>>(data: Option<B>) -> Vec<u8> {
    data.map(|d| d.as_ref().to_vec()).unwrap_or_default()
}

/// Parse an RFC 3501 `date-time`, e.g. `17-Jul-1996 02:44:25 -0700`. Single-digit days may be
/// space-padded.
pub(crate) fn parse_internal_date(date: &str) -> Result<DateTime<FixedOffset>> {
    DateTime::parse_from_str(date.trim(), "%d-%b-%Y %H:%M:%S %z")
        .map_err(|_| ParseError::InternalDate(date.to_string()).into())
}
