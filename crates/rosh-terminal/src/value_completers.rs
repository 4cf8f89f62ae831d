//! Completers backed by live network state or lookup tables.

use std::net::IpAddr;
use std::sync::Arc;

use rosh_platform::QueryContext;
use rosh_types::lookup::Lookup;
use rosh_types::value::{Family, Prefix, Value};

use crate::completer::{Candidate, Completer, before_cursor, complete_words};

/// Interface names of the active namespace.
pub struct LinkCompleter {
    query: Arc<QueryContext>,
    physical_only: bool,
}

impl LinkCompleter {
    pub fn all(query: Arc<QueryContext>) -> Self {
        Self {
            query,
            physical_only: false,
        }
    }

    /// Only links backed by a hardware device.
    pub fn physical(query: Arc<QueryContext>) -> Self {
        Self {
            query,
            physical_only: true,
        }
    }

    fn links(&self) -> Vec<(String, u32)> {
        match self.query.current().list_links() {
            Ok(links) => {
                let mut links: Vec<(String, u32)> = links
                    .into_iter()
                    .filter(|l| !self.physical_only || l.is_physical())
                    .map(|l| (l.name, l.index))
                    .collect();
                links.sort();
                links
            },
            Err(e) => {
                log::debug!("cannot list links: {e}");
                Vec::new()
            },
        }
    }
}

impl Completer for LinkCompleter {
    fn candidates(&self, line: &str, cursor: usize) -> Vec<Candidate> {
        let links = self.links();
        complete_words(
            before_cursor(line, cursor),
            links.iter().map(|(name, _)| name.as_str()),
        )
    }

    fn parse(&self, token: &str) -> Result<Value, String> {
        let what = if self.physical_only {
            "physical interface"
        } else {
            "interface"
        };
        self.links()
            .into_iter()
            .find(|(name, _)| name == token)
            .map(|(name, index)| Value::Link { name, index })
            .ok_or_else(|| format!("{token} is invalid for {what}"))
    }
}

/// Named network namespaces.
pub struct NetnsCompleter {
    query: Arc<QueryContext>,
}

impl NetnsCompleter {
    pub fn new(query: Arc<QueryContext>) -> Self {
        Self { query }
    }

    fn names(&self) -> Vec<String> {
        self.query.current().list_namespaces().unwrap_or_else(|e| {
            log::debug!("cannot list namespaces: {e}");
            Vec::new()
        })
    }
}

impl Completer for NetnsCompleter {
    fn candidates(&self, line: &str, cursor: usize) -> Vec<Candidate> {
        let names = self.names();
        complete_words(before_cursor(line, cursor), names.iter().map(String::as_str))
    }

    fn parse(&self, token: &str) -> Result<Value, String> {
        if self.names().iter().any(|n| n == token) {
            Ok(Value::Text(token.to_string()))
        } else {
            Err(format!("netns {token} does not exist"))
        }
    }
}

/// Names of a lookup table; parses names or decimal ids to [`Value::Id`].
pub struct LookupCompleter {
    lookup: Lookup,
    description: String,
}

impl LookupCompleter {
    pub fn new(description: &str, lookup: Lookup) -> Self {
        Self {
            lookup,
            description: description.to_string(),
        }
    }
}

impl Completer for LookupCompleter {
    fn candidates(&self, line: &str, cursor: usize) -> Vec<Candidate> {
        let names = self.lookup.names();
        complete_words(before_cursor(line, cursor), names.iter().map(String::as_str))
    }

    fn parse(&self, token: &str) -> Result<Value, String> {
        self.lookup
            .lookup_id(token)
            .map(Value::Id)
            .ok_or_else(|| format!("{token} is invalid for {}", self.description))
    }
}

/// An address of one family (or any, when `family` is `None`).
pub struct AddrCompleter {
    family: Option<Family>,
}

impl AddrCompleter {
    pub fn new(family: Option<Family>) -> Self {
        Self { family }
    }
}

impl Completer for AddrCompleter {
    fn candidates(&self, _line: &str, _cursor: usize) -> Vec<Candidate> {
        Vec::new()
    }

    fn parse(&self, token: &str) -> Result<Value, String> {
        let addr: IpAddr = token
            .parse()
            .map_err(|_| format!("'{token}' does not appear to be an IP address"))?;
        match self.family {
            Some(family) if Family::of(&addr) != family => {
                Err(format!("'{token}' is not an {family} address"))
            },
            _ => Ok(Value::Addr(addr)),
        }
    }
}

/// A network prefix of one family.
pub struct PrefixCompleter {
    family: Option<Family>,
}

impl PrefixCompleter {
    pub fn new(family: Option<Family>) -> Self {
        Self { family }
    }
}

impl Completer for PrefixCompleter {
    fn candidates(&self, _line: &str, _cursor: usize) -> Vec<Candidate> {
        Vec::new()
    }

    fn parse(&self, token: &str) -> Result<Value, String> {
        let prefix: Prefix = token.parse()?;
        match self.family {
            Some(family) if prefix.family() != family => {
                Err(format!("'{token}' is not an {family} prefix"))
            },
            _ => Ok(Value::Prefix(prefix)),
        }
    }
}
