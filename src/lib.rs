//! IMAP client data model and mailbox resynchronization for Rust.
//!
//! This crate turns the answers of an IMAP server into typed values (capabilities, id sets,
//! fetch results with MIME structure and content, ACL rights, threads, mailbox status) and
//! uses them to bring a cached copy of a mailbox up to date. It does not open connections:
//! the application implements [`transport::Transport`] on whatever client it uses, and feeds
//! the raw server text through the functions in [`parse`].
//!
//! # Usage
//!
//! Here is a transport that answers from canned server text, and one synchronization round.
//!
//! ```
//! use imap_sync::enumset::EnumSet;
//! use imap_sync::parse::{parse_capabilities, parse_fetches, parse_ids, parse_status};
//! use imap_sync::transport::{FetchQuery, SearchQuery, Transport};
//! use imap_sync::{
//!     Capabilities, FetchResult, IdSet, IdType, MailboxStatus, ModSeq, Result, StatusItem,
//!     SyncBuilder, SyncCriteria, SyncToken,
//! };
//!
//! struct Canned;
//!
//! impl Transport for Canned {
//!     fn capabilities(&mut self) -> Result<Capabilities> {
//!         parse_capabilities(b"* CAPABILITY IMAP4rev1 CONDSTORE\r\n")
//!     }
//!
//!     fn status(
//!         &mut self,
//!         mailbox: &str,
//!         _items: EnumSet<StatusItem>,
//!         _since: Option<ModSeq>,
//!         _restriction: Option<&IdSet>,
//!     ) -> Result<MailboxStatus> {
//!         let answer = b"* STATUS INBOX (MESSAGES 3 UIDNEXT 8 UIDVALIDITY 1 HIGHESTMODSEQ 20)\r\n";
//!         parse_status(answer, mailbox)
//!     }
//!
//!     fn search(
//!         &mut self,
//!         _mailbox: &str,
//!         query: &SearchQuery,
//!         _restriction: Option<&IdSet>,
//!     ) -> Result<IdSet> {
//!         match query.to_string().as_str() {
//!             "UID 6:7" => parse_ids(b"* SEARCH 7\r\n", IdType::Uid),
//!             _ => parse_ids(b"* SEARCH 2\r\n", IdType::Uid),
//!         }
//!     }
//!
//!     fn vanished(
//!         &mut self,
//!         _mailbox: &str,
//!         _since: ModSeq,
//!         _restriction: Option<&IdSet>,
//!     ) -> Result<IdSet> {
//!         Ok(IdSet::new(IdType::Uid))
//!     }
//!
//!     fn fetch(
//!         &mut self,
//!         _mailbox: &str,
//!         _query: &FetchQuery,
//!         _restriction: Option<&IdSet>,
//!     ) -> Result<Vec<FetchResult>> {
//!         parse_fetches(b"* 3 FETCH (UID 7)\r\n")
//!     }
//! }
//!
//! fn main() -> Result<()> {
//!     let prev: SyncToken = "V1|H15|U6|M2".parse()?;
//!     let mut sync = SyncBuilder::new().build(Canned);
//!     let result = sync.run("INBOX", Some(&prev), SyncCriteria::all_ids(), None)?;
//!
//!     assert_eq!(result.new_message_ids, Some(IdSet::uids(vec![7])));
//!     assert_eq!(result.flags_changed_ids, Some(IdSet::uids(vec![2])));
//!     assert!(!result.vanished);
//!
//!     assert_eq!(sync.current_token("INBOX")?.to_string(), "V1|H20|U8|M3");
//!     Ok(())
//! }
//! ```

pub use enumset;

pub mod parse;
mod types;

pub mod error;
pub mod sync;
pub mod transport;

pub use error::{Error, Result};
pub use sync::{Sync, SyncBuilder, SyncConfig, SyncCriteria, SyncResult, SyncToken};
pub use types::*;

#[cfg(feature = "test_helpers")]
pub mod testing;

#[cfg(test)]
mod mock_transport;
