//! Collaborator traits and the records they return.

use std::net::IpAddr;
use std::path::Path;
use std::sync::Arc;

use rosh_types::error::Result;
use rosh_types::value::{Family, Prefix};

use crate::process::StreamHandle;

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// A network interface.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Link {
    pub index: u32,
    pub name: String,
    /// Link kind (`veth`, `bridge`, ...) or the parent bus of a physical device.
    pub kind: Option<String>,
    pub admin_up: bool,
    /// Operational state, lower case (`up`, `down`, `unknown`, ...).
    pub oper_state: String,
    pub carrier: bool,
    pub mtu: Option<u32>,
    pub address: Option<String>,
    pub master: Option<String>,
    /// Bus of the backing device (`pci`, `usb`, ...); `None` for virtual links.
    pub parent_bus: Option<String>,
}

impl Link {
    /// Physical links are backed by a device on some bus.
    pub fn is_physical(&self) -> bool {
        self.parent_bus.is_some()
    }
}

/// An address assigned to an interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    pub index: u32,
    pub ifname: String,
    pub local: IpAddr,
    pub prefix_len: u8,
    pub scope: String,
    pub flags: Vec<String>,
}

impl Address {
    pub fn family(&self) -> Family {
        Family::of(&self.local)
    }
}

/// A routing table entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub dst: Prefix,
    pub gateway: Option<IpAddr>,
    pub dev: Option<String>,
    pub metric: Option<u32>,
    pub pref: Option<String>,
    pub protocol: String,
    pub scope: String,
    pub table: Option<String>,
    pub flags: Vec<String>,
}

/// A neighbour (ARP/NDP) or bridge forwarding database entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Neighbour {
    pub dst: Option<String>,
    pub dev: String,
    pub lladdr: Option<String>,
    pub state: Vec<String>,
    pub flags: Vec<String>,
}

/// A policy routing rule.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rule {
    pub priority: u32,
    pub src: String,
    pub dst: String,
    pub iif: Option<String>,
    pub oif: Option<String>,
    pub fwmark: Option<String>,
    pub ip_proto: Option<String>,
    pub action: String,
    pub target: Option<String>,
    pub protocol: Option<String>,
}

// ---------------------------------------------------------------------------
// Query filters
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressFilter {
    pub family: Option<Family>,
    pub dev: Option<String>,
}

/// Selectors for a route dump. Ids come from the iproute2 lookup tables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteFilter {
    pub family: Option<Family>,
    pub dev: Option<String>,
    pub via: Option<IpAddr>,
    pub to: Option<Prefix>,
    pub proto: Option<u32>,
    pub table: Option<u32>,
    pub scope: Option<u32>,
}

/// `family: Some(Family::Bridge)` selects the bridge forwarding database.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NeighbourFilter {
    pub family: Option<Family>,
    pub dev: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleFilter {
    pub family: Option<Family>,
    /// Match rules on this input interface.
    pub dev: Option<String>,
}

// ---------------------------------------------------------------------------
// Network state
// ---------------------------------------------------------------------------

/// Read access to the network state of one namespace.
pub trait NetworkQuery: Send + Sync {
    /// Namespace this query operates in; `None` is the shell's own namespace.
    fn namespace(&self) -> Option<&str>;

    fn list_links(&self) -> Result<Vec<Link>>;

    fn list_addresses(&self, filter: &AddressFilter) -> Result<Vec<Address>>;

    fn list_routes(&self, filter: &RouteFilter) -> Result<Vec<Route>>;

    fn list_neighbours(&self, filter: &NeighbourFilter) -> Result<Vec<Neighbour>>;

    fn list_rules(&self, filter: &RuleFilter) -> Result<Vec<Rule>>;

    /// Named network namespaces on the host.
    fn list_namespaces(&self) -> Result<Vec<String>>;

    /// A query for another namespace (`None` = the shell's own).
    fn for_namespace(&self, namespace: Option<&str>) -> Result<Arc<dyn NetworkQuery>>;
}

// ---------------------------------------------------------------------------
// Process launching
// ---------------------------------------------------------------------------

/// Callback receiving each output line of a streamed process.
pub type LineSink = Box<dyn FnMut(&str) + Send>;

/// Runs external tools.
pub trait ProcessLauncher: Send + Sync {
    /// Run in the foreground with the terminal attached; returns the exit code
    /// (-1 when terminated by a signal).
    fn spawn(&self, executable: &Path, args: &[String], env: &[(String, String)]) -> Result<i32>;

    /// Run in the background, feeding stdout line by line to `on_line`.
    fn stream(&self, executable: &Path, args: &[String], on_line: LineSink)
    -> Result<StreamHandle>;
}
