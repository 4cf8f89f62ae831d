//! In-memory network state.

use std::collections::BTreeMap;
use std::sync::Arc;

use rosh_types::error::{Result, RoshError};
use rosh_types::lookup::Lookups;
use rosh_types::value::Family;

use crate::services::{
    Address, AddressFilter, Link, NetworkQuery, Neighbour, NeighbourFilter, Route, RouteFilter,
    Rule, RuleFilter,
};

/// State of one namespace.
#[derive(Debug, Clone, Default)]
pub struct NamespaceState {
    pub links: Vec<Link>,
    pub addresses: Vec<Address>,
    pub routes: Vec<Route>,
    pub neighbours: Vec<Neighbour>,
    /// Bridge forwarding database.
    pub fdb: Vec<Neighbour>,
    pub rules: Vec<(Family, Rule)>,
}

/// A fixed set of namespaces held in memory; the unnamed one is the host.
#[derive(Debug, Clone)]
pub struct MemoryQuery {
    namespace: Option<String>,
    states: Arc<BTreeMap<Option<String>, NamespaceState>>,
}

impl MemoryQuery {
    /// An empty host namespace.
    pub fn new() -> Self {
        Self::with_state(NamespaceState::default())
    }

    pub fn with_state(host: NamespaceState) -> Self {
        Self::with_namespaces(host, BTreeMap::new())
    }

    pub fn with_namespaces(host: NamespaceState, named: BTreeMap<String, NamespaceState>) -> Self {
        let mut states: BTreeMap<Option<String>, NamespaceState> =
            named.into_iter().map(|(k, v)| (Some(k), v)).collect();
        states.insert(None, host);
        Self {
            namespace: None,
            states: Arc::new(states),
        }
    }

    fn state(&self) -> Result<&NamespaceState> {
        self.states.get(&self.namespace).ok_or_else(|| {
            RoshError::Query(format!(
                "namespace {} does not exist",
                self.namespace.as_deref().unwrap_or("")
            ))
        })
    }
}

impl Default for MemoryQuery {
    fn default() -> Self {
        Self::new()
    }
}

fn matches_dev(filter: &Option<String>, dev: Option<&str>) -> bool {
    filter.as_deref().is_none_or(|f| dev == Some(f))
}

fn matches_family(filter: Option<Family>, family: Family) -> bool {
    filter.is_none_or(|f| f == family)
}

impl NetworkQuery for MemoryQuery {
    fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    fn list_links(&self) -> Result<Vec<Link>> {
        Ok(self.state()?.links.clone())
    }

    fn list_addresses(&self, filter: &AddressFilter) -> Result<Vec<Address>> {
        Ok(self
            .state()?
            .addresses
            .iter()
            .filter(|a| matches_family(filter.family, a.family()))
            .filter(|a| matches_dev(&filter.dev, Some(a.ifname.as_str())))
            .cloned()
            .collect())
    }

    fn list_routes(&self, filter: &RouteFilter) -> Result<Vec<Route>> {
        let lookups = Lookups::builtin();
        let family = filter.family.unwrap_or(Family::V4);
        let table_of = |r: &Route| {
            r.table
                .as_deref()
                .and_then(|t| lookups.tables.lookup_id(t))
                .unwrap_or(254)
        };
        Ok(self
            .state()?
            .routes
            .iter()
            .filter(|r| r.dst.family() == family)
            .filter(|r| matches_dev(&filter.dev, r.dev.as_deref()))
            .filter(|r| filter.via.is_none_or(|v| r.gateway == Some(v)))
            .filter(|r| filter.to.is_none_or(|p| r.dst == p))
            .filter(|r| {
                filter
                    .proto
                    .is_none_or(|p| lookups.protos.lookup_id(&r.protocol) == Some(p))
            })
            .filter(|r| {
                filter
                    .scope
                    .is_none_or(|s| lookups.scopes.lookup_id(&r.scope) == Some(s))
            })
            .filter(|r| match filter.table {
                Some(0) => true,
                Some(t) => table_of(r) == t,
                None => table_of(r) == 254,
            })
            .cloned()
            .collect())
    }

    fn list_neighbours(&self, filter: &NeighbourFilter) -> Result<Vec<Neighbour>> {
        let state = self.state()?;
        let source = if filter.family == Some(Family::Bridge) {
            &state.fdb
        } else {
            &state.neighbours
        };
        Ok(source
            .iter()
            .filter(|n| matches_dev(&filter.dev, Some(n.dev.as_str())))
            .filter(|n| match filter.family {
                Some(Family::Bridge) | None => true,
                Some(f) => n
                    .dst
                    .as_deref()
                    .and_then(|d| d.parse::<std::net::IpAddr>().ok())
                    .is_some_and(|ip| Family::of(&ip) == f),
            })
            .cloned()
            .collect())
    }

    fn list_rules(&self, filter: &RuleFilter) -> Result<Vec<Rule>> {
        let family = filter.family.unwrap_or(Family::V4);
        Ok(self
            .state()?
            .rules
            .iter()
            .filter(|(f, _)| *f == family)
            .filter(|(_, r)| matches_dev(&filter.dev, r.iif.as_deref()))
            .map(|(_, r)| r.clone())
            .collect())
    }

    fn list_namespaces(&self) -> Result<Vec<String>> {
        Ok(self.states.keys().flatten().cloned().collect())
    }

    fn for_namespace(&self, namespace: Option<&str>) -> Result<Arc<dyn NetworkQuery>> {
        let namespace = namespace.map(str::to_string);
        if !self.states.contains_key(&namespace) {
            return Err(RoshError::Query(format!(
                "namespace {} does not exist",
                namespace.as_deref().unwrap_or("")
            )));
        }
        Ok(Arc::new(Self {
            namespace,
            states: Arc::clone(&self.states),
        }))
    }
}
