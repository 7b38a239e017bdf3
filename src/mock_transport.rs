use enumset::EnumSet;
use std::collections::VecDeque;

use crate::error::{Error, Result};
use crate::parse::{parse_capabilities, parse_fetches, parse_ids, parse_status, parse_vanished};
use crate::transport::{FetchQuery, SearchQuery, Transport};
use crate::types::{
    Capabilities, FetchResult, IdSet, IdType, MailboxStatus, ModSeq, StatusItem,
};

/// A request as the mock saw it, with queries rendered to their IMAP text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Request {
    Capabilities,
    Status(EnumSet<StatusItem>, Option<ModSeq>, Option<IdSet>),
    Search(String, Option<IdSet>),
    Vanished(ModSeq, Option<IdSet>),
    Fetch(String, Option<IdSet>),
}

/// Answers every request by parsing canned server text, and records what was asked.
pub struct MockTransport {
    capabilities: Vec<u8>,
    status: Vec<u8>,
    snapshot: MailboxStatus,
    searches: VecDeque<Vec<u8>>,
    vanished: Vec<u8>,
    fetch: Vec<u8>,
    err_on_search: bool,
    pub requests: Vec<Request>,
}

impl Default for MockTransport {
    fn default() -> Self {
        MockTransport {
            capabilities: b"* CAPABILITY IMAP4rev1\r\n".to_vec(),
            status: Vec::new(),
            snapshot: MailboxStatus::default(),
            searches: VecDeque::new(),
            vanished: Vec::new(),
            fetch: Vec::new(),
            err_on_search: false,
            requests: Vec::new(),
        }
    }
}

impl MockTransport {
    pub fn new(capabilities: &str, status: &str) -> MockTransport {
        MockTransport::default()
            .with_capabilities(capabilities)
            .with_status(status)
    }

    pub fn with_capabilities(mut self, capabilities: &str) -> MockTransport {
        self.capabilities = capabilities.as_bytes().to_vec();
        self
    }

    pub fn with_status(mut self, status: &str) -> MockTransport {
        self.status = status.as_bytes().to_vec();
        self
    }

    /// The answer to a combined changed/vanished status request.
    pub fn with_snapshot(mut self, snapshot: MailboxStatus) -> MockTransport {
        self.snapshot = snapshot;
        self
    }

    /// Queue the answer to the next search.
    pub fn with_search(mut self, search: &str) -> MockTransport {
        self.searches.push_back(search.as_bytes().to_vec());
        self
    }

    pub fn with_vanished(mut self, vanished: &str) -> MockTransport {
        self.vanished = vanished.as_bytes().to_vec();
        self
    }

    pub fn with_fetch(mut self, fetch: &str) -> MockTransport {
        self.fetch = fetch.as_bytes().to_vec();
        self
    }

    pub fn with_search_err(mut self) -> MockTransport {
        self.err_on_search = true;
        self
    }

    pub fn searches(&self) -> Vec<&Request> {
        self.requests
            .iter()
            .filter(|r| matches!(r, Request::Search(..)))
            .collect()
    }
}

impl Transport for MockTransport {
    fn capabilities(&mut self) -> Result<Capabilities> {
        self.requests.push(Request::Capabilities);
        parse_capabilities(&self.capabilities)
    }

    fn status(
        &mut self,
        mailbox: &str,
        items: EnumSet<StatusItem>,
        since: Option<ModSeq>,
        restriction: Option<&IdSet>,
    ) -> Result<MailboxStatus> {
        self.requests
            .push(Request::Status(items, since, restriction.cloned()));
        if items.contains(StatusItem::ChangedSince) || items.contains(StatusItem::VanishedSince) {
            return Ok(self.snapshot.clone());
        }
        parse_status(&self.status, mailbox)
    }

    fn search(
        &mut self,
        _mailbox: &str,
        query: &SearchQuery,
        restriction: Option<&IdSet>,
    ) -> Result<IdSet> {
        self.requests
            .push(Request::Search(query.to_string(), restriction.cloned()));
        if self.err_on_search {
            return Err(Error::No("SEARCH failed".to_string()));
        }
        match self.searches.pop_front() {
            Some(answer) => parse_ids(&answer, IdType::Uid),
            None => Ok(IdSet::new(IdType::Uid)),
        }
    }

    fn vanished(
        &mut self,
        _mailbox: &str,
        since: ModSeq,
        restriction: Option<&IdSet>,
    ) -> Result<IdSet> {
        self.requests
            .push(Request::Vanished(since, restriction.cloned()));
        parse_vanished(&self.vanished)
    }

    fn fetch(
        &mut self,
        _mailbox: &str,
        query: &FetchQuery,
        restriction: Option<&IdSet>,
    ) -> Result<Vec<FetchResult>> {
        self.requests
            .push(Request::Fetch(query.to_string(), restriction.cloned()));
        parse_fetches(&self.fetch)
    }
}
