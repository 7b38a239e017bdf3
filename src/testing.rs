//! Enable the test_helpers feature to expose helper methods to build
//! response structures from raw server text, for testing code that uses imap-sync.
//!
//! To use add a dev-dependency on the crate with the feature "test_helpers"
//! e.g.
//!
//! ```toml
//! [dependencies]
//! imap-sync = { version = "0.1" }
//!
//! [dev-dependencies]
//! # mirror the same configuration your dependencies and add test_helpers
//! imap-sync = { version = "0.1", features = ["test_helpers"] }
//! ```
//!
//! Every helper panics if the input does not parse.
#[cfg(doc)]
use crate::types::*;

/// Methods to build a [`Capabilities`] response object
pub mod capabilities {
    use crate::types::Capabilities;

    /// Builds a [`Capabilities`] based on the provided input
    ///
    /// Example input.
    ///
    /// ```
    /// let input = "* CAPABILITY IMAP4rev1 CONDSTORE QRESYNC\r\n";
    /// let response = imap_sync::testing::capabilities::parse(input);
    /// ```
    pub fn parse(input: impl AsRef<[u8]>) -> Capabilities {
        crate::parse::parse_capabilities(input.as_ref()).unwrap()
    }
}

/// Methods to build [`FetchResult`] objects
pub mod fetches {
    use crate::types::FetchResult;

    /// Builds a list of [`FetchResult`] based on the provided input
    ///
    /// Example input.
    ///
    /// ```
    /// let input = "\
    /// * 24 FETCH (FLAGS (\\Seen) UID 4827943)\r\n\
    /// * 25 FETCH (FLAGS (\\Seen))\r\n\
    /// ";
    /// let response = imap_sync::testing::fetches::parse(input);
    /// ```
    pub fn parse(input: impl AsRef<[u8]>) -> Vec<FetchResult> {
        crate::parse::parse_fetches(input.as_ref()).unwrap()
    }
}

/// Methods to build a [`MailboxStatus`] response object
pub mod status {
    use crate::types::MailboxStatus;

    /// Builds the [`MailboxStatus`] of `mailbox` based on the provided input
    ///
    /// Example input.
    ///
    /// ```
    /// let input = "* STATUS INBOX (MESSAGES 3 UIDNEXT 4 UIDVALIDITY 1)\r\n";
    /// let response = imap_sync::testing::status::parse(input, "INBOX");
    /// ```
    pub fn parse(input: impl AsRef<[u8]>, mailbox: &str) -> MailboxStatus {
        crate::parse::parse_status(input.as_ref(), mailbox).unwrap()
    }
}

/// Methods to build an [`IdSet`] from a search response
pub mod search {
    use crate::types::{IdSet, IdType};

    /// Builds an [`IdSet`] of UIDs based on the provided input
    ///
    /// Example input.
    ///
    /// ```
    /// let input = "* SEARCH 2 84 882\r\n";
    /// let response = imap_sync::testing::search::parse(input);
    /// ```
    pub fn parse(input: impl AsRef<[u8]>) -> IdSet {
        crate::parse::parse_ids(input.as_ref(), IdType::Uid).unwrap()
    }
}

/// Methods to build a [`ThreadTree`] response object
pub mod thread {
    use crate::types::{IdType, ThreadTree};

    /// Builds a [`ThreadTree`] of UIDs based on the provided input
    ///
    /// Example input.
    ///
    /// ```
    /// let input = "* THREAD (2)(3 6 (4 23)(44 7 96))\r\n";
    /// let response = imap_sync::testing::thread::parse(input);
    /// ```
    pub fn parse(input: impl AsRef<[u8]>) -> ThreadTree {
        crate::parse::parse_thread(input.as_ref(), IdType::Uid).unwrap()
    }
}

/// Methods to build an [`Acl`] response object
pub mod acl {
    use crate::types::Acl;

    /// Builds an [`Acl`] based on the provided input
    ///
    /// Example input.
    ///
    /// ```
    /// let input = "* ACL INBOX user1 lr user2 lrx\r\n";
    /// let response = imap_sync::testing::acl::parse(input);
    /// ```
    pub fn parse(input: impl AsRef<[u8]>) -> Acl {
        Acl::parse(input.as_ref()).unwrap()
    }
}

/// Methods to build a [`ListRights`] response object
pub mod list_rights {
    use crate::types::ListRights;

    /// Builds a [`ListRights`] based on the provided input
    ///
    /// Example input.
    ///
    /// ```
    /// let input = "* LISTRIGHTS INBOX myuser lr x k\r\n";
    /// let response = imap_sync::testing::list_rights::parse(input);
    ///```
    pub fn parse(input: impl AsRef<[u8]>) -> ListRights {
        ListRights::parse(input.as_ref()).unwrap()
    }
}

/// Methods to build a [`MyRights`] response object
pub mod my_rights {
    use crate::types::MyRights;

    /// Builds a [`MyRights`] based on the provided input
    ///
    /// Example input.
    ///
    /// ```
    /// let input = "* MYRIGHTS INBOX lrxk\r\n";
    /// let response = imap_sync::testing::my_rights::parse(input);
    /// ```
    pub fn parse(input: impl AsRef<[u8]>) -> MyRights {
        MyRights::parse(input.as_ref()).unwrap()
    }
}
