use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Capabilities that are only usable if the server also advertises the listed ones.
const CAPABILITY_DEPS: &[(&str, &[&str])] = &[
    // RFC 7162 [3.2.3]
    ("QRESYNC", &["CONDSTORE"]),
    // RFC 5182 [2]
    ("SEARCHRES", &["ESEARCH"]),
    // RFC 5255 [3.1]
    ("LANGUAGE", &["NAMESPACE"]),
];

/// From [section 7.2.1 of RFC 3501](https://tools.ietf.org/html/rfc3501#section-7.2.1).
///
/// The set of capabilities a server advertises, with their parameters.
///
/// A capability either stands alone (`IDLE`) or carries parameters, which servers send as
/// repeated `NAME=PARAM` atoms (`AUTH=PLAIN AUTH=GSSAPI`). Both names and parameters are stored
/// upper-cased and matched case-insensitively. Adding a capability that is already present merges
/// the parameter lists.
///
/// ```
/// # use imap_sync::Capabilities;
/// let mut caps: Capabilities = ["IMAP4rev1", "AUTH=PLAIN", "auth=gssapi", "IDLE"]
///     .iter()
///     .collect();
/// assert!(caps.has("idle"));
/// assert!(caps.query("AUTH", Some("gssapi")));
/// assert!(!caps.query("AUTH", Some("XOAUTH2")));
/// caps.remove("IDLE");
/// assert!(!caps.has("IDLE"));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities(BTreeMap<String, Option<BTreeSet<String>>>);

/// How much of the `CONDSTORE`/`QRESYNC` family a server supports, which decides the strategy
/// [`Sync`](crate::sync::Sync) uses for flag changes and expunges.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModSeqSupport {
    /// [RFC 7162 QRESYNC](https://tools.ietf.org/html/rfc7162#section-3.2): mod-sequences plus
    /// `VANISHED` reporting of expunged UIDs.
    Qresync,
    /// [RFC 7162 CONDSTORE](https://tools.ietf.org/html/rfc7162#section-3.1): mod-sequences only.
    Condstore,
    /// Neither; flag changes can not be tracked incrementally.
    None,
}

impl Capabilities {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a capability without parameters. If it is already present this does nothing.
    pub fn add(&mut self, name: &str) {
        self.0.entry(name.to_uppercase()).or_insert(None);
    }

    /// Add a capability together with parameters, merging them into any already known.
    /// With no parameters this behaves like [`Capabilities::add`].
    pub fn add_params<I, S>(&mut self, name: &str, params: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let params: BTreeSet<String> = params
            .into_iter()
            .map(|p| p.as_ref().to_uppercase())
            .collect();
        if params.is_empty() {
            self.add(name);
            return;
        }
        self.0
            .entry(name.to_uppercase())
            .or_insert(None)
            .get_or_insert_with(BTreeSet::new)
            .extend(params);
    }

    /// Add a raw capability atom, splitting `NAME=PARAM` forms.
    pub fn add_token(&mut self, token: &str) {
        match token.split_once('=') {
            Some((name, param)) => self.add_params(name, Some(param)),
            None => self.add(token),
        }
    }

    /// Remove a capability and all of its parameters.
    pub fn remove(&mut self, name: &str) {
        self.0.remove(&name.to_uppercase());
    }

    /// Check if the server has the given capability.
    pub fn has(&self, name: &str) -> bool {
        self.0.contains_key(&name.to_uppercase())
    }

    /// Check if the server has the given capability and, if `param` is given, that parameter.
    ///
    /// A capability advertised without any parameters answers `true` for every parameter.
    pub fn query(&self, name: &str, param: Option<&str>) -> bool {
        match (self.0.get(&name.to_uppercase()), param) {
            (None, _) => false,
            (Some(_), None) | (Some(None), Some(_)) => true,
            (Some(Some(params)), Some(p)) => params.contains(&p.to_uppercase()),
        }
    }

    /// Like [`Capabilities::has`], but also require every capability that `name` builds on.
    pub fn query_with_deps(&self, name: &str) -> bool {
        if !self.has(name) {
            return false;
        }
        let name = name.to_uppercase();
        CAPABILITY_DEPS
            .iter()
            .filter(|(cap, _)| *cap == name)
            .flat_map(|(_, deps)| deps.iter())
            .all(|dep| self.query_with_deps(dep))
    }

    /// The parameters advertised for a capability; empty if it is absent or has none.
    pub fn params(&self, name: &str) -> BTreeSet<String> {
        self.0
            .get(&name.to_uppercase())
            .and_then(|p| p.clone())
            .unwrap_or_default()
    }

    /// Classify the server's mod-sequence support.
    pub fn modseq_support(&self) -> ModSeqSupport {
        if self.query_with_deps("QRESYNC") {
            ModSeqSupport::Qresync
        } else if self.has("CONDSTORE") {
            ModSeqSupport::Condstore
        } else {
            ModSeqSupport::None
        }
    }

    /// Iterate over all the server's capabilities as `CAPABILITY` atoms.
    pub fn iter(&self) -> impl Iterator<Item = String> + '_ {
        self.0.iter().flat_map(|(name, params)| {
            let tokens: Vec<String> = match params {
                None => vec![name.clone()],
                Some(params) => params.iter().map(|p| format!("{}={}", name, p)).collect(),
            };
            tokens
        })
    }

    /// Returns how many distinct capability names the server has.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the server purports to have no capabilities.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: AsRef<str>> FromIterator<S> for Capabilities {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        let mut caps = Capabilities::new();
        caps.extend(iter);
        caps
    }
}

impl<S: AsRef<str>> Extend<S> for Capabilities {
    fn extend<T: IntoIterator<Item = S>>(&mut self, iter: T) {
        for token in iter {
            self.add_token(token.as_ref());
        }
    }
}

impl fmt::Display for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tokens: Vec<String> = self.iter().collect();
        write!(f, "{}", tokens.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookups_are_case_insensitive() {
        let caps: Capabilities = ["imap4rev1", "Idle"].iter().collect();
        assert!(caps.has("IMAP4REV1"));
        assert!(caps.has("idle"));
        assert!(!caps.has("MOVE"));
        assert_eq!(caps.len(), 2);
    }

    #[test]
    fn params_are_merged() {
        let mut caps = Capabilities::new();
        caps.add_params("auth", vec!["plain"]);
        caps.add_params("AUTH", vec!["GSSAPI"]);
        caps.add("AUTH");
        let params = caps.params("Auth");
        assert_eq!(params.len(), 2);
        assert!(params.contains("PLAIN"));
        assert!(params.contains("GSSAPI"));
    }

    #[test]
    fn parameterless_matches_any_param() {
        let mut caps = Capabilities::new();
        caps.add("CONTEXT");
        assert!(caps.query("CONTEXT", Some("SEARCH")));
        assert!(caps.query("CONTEXT", None));
        assert!(caps.params("CONTEXT").is_empty());
        assert!(!caps.query("ESORT", Some("SEARCH")));
        assert!(caps.params("ESORT").is_empty());
    }

    #[test]
    fn repeated_add_is_noop() {
        let mut caps = Capabilities::new();
        caps.add("IDLE");
        let before = caps.clone();
        caps.add("idle");
        assert_eq!(caps, before);
    }

    #[test]
    fn remove_capability() {
        let mut caps: Capabilities = ["AUTH=PLAIN", "IDLE"].iter().collect();
        caps.remove("auth");
        assert!(!caps.has("AUTH"));
        assert!(!caps.query("AUTH", Some("PLAIN")));
        assert!(caps.has("IDLE"));
    }

    #[test]
    fn dependencies_are_required() {
        let caps: Capabilities = ["QRESYNC"].iter().collect();
        assert!(caps.has("QRESYNC"));
        assert!(!caps.query_with_deps("QRESYNC"));
        assert_eq!(caps.modseq_support(), ModSeqSupport::None);

        let caps: Capabilities = ["QRESYNC", "CONDSTORE"].iter().collect();
        assert_eq!(caps.modseq_support(), ModSeqSupport::Qresync);

        let caps: Capabilities = ["CONDSTORE"].iter().collect();
        assert_eq!(caps.modseq_support(), ModSeqSupport::Condstore);
    }

    #[test]
    fn add_without_params_is_noop() {
        let mut caps = Capabilities::new();
        caps.add("CONTEXT");
        caps.add_params("CONTEXT", Vec::<&str>::new());
        assert!(caps.query("CONTEXT", Some("SEARCH")));
        assert!(caps.params("CONTEXT").is_empty());

        caps.add_params("SORT", Some("DISPLAY"));
        caps.add_params("SORT", Vec::<String>::new());
        caps.add("SORT");
        assert!(caps.query("SORT", Some("display")));
        assert!(!caps.query("SORT", Some("other")));

        caps.add_params("ESEARCH", Vec::<&str>::new());
        assert!(caps.has("ESEARCH"));
        assert!(caps.query("ESEARCH", Some("anything")));
    }

    #[test]
    fn display_round_trips() {
        let caps: Capabilities = ["IMAP4rev1", "AUTH=PLAIN", "AUTH=GSSAPI"].iter().collect();
        let text = caps.to_string();
        assert_eq!(text, "AUTH=GSSAPI AUTH=PLAIN IMAP4REV1");
        let again: Capabilities = text.split(' ').collect();
        assert_eq!(again, caps);
    }
}
