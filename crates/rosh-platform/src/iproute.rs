//! Network state read through the iproute2 tools' JSON output.

use std::collections::BTreeMap;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use serde::Deserialize;
use serde::de::DeserializeOwned;

use rosh_types::error::{Result, RoshError};
use rosh_types::value::{Family, Prefix};

use crate::services::{
    Address, AddressFilter, Link, NetworkQuery, Neighbour, NeighbourFilter, Route, RouteFilter,
    Rule, RuleFilter,
};

/// Runs `ip -j` / `bridge -j`, optionally inside a named namespace.
#[derive(Debug, Clone)]
pub struct IprouteQuery {
    ip: PathBuf,
    bridge: PathBuf,
    namespace: Option<String>,
}

impl IprouteQuery {
    pub fn new(ip: PathBuf, bridge: PathBuf) -> Self {
        Self {
            ip,
            bridge,
            namespace: None,
        }
    }

    fn family_arg(family: Option<Family>) -> Option<&'static str> {
        match family {
            Some(Family::V4) => Some("-4"),
            Some(Family::V6) => Some("-6"),
            _ => None,
        }
    }

    fn run<T: DeserializeOwned>(&self, exe: &Path, args: &[&str]) -> Result<Vec<T>> {
        let mut cmd = Command::new(exe);
        if let Some(ns) = &self.namespace {
            cmd.arg("-n").arg(ns);
        }
        cmd.arg("-j").args(args);
        log::trace!("query {} {}", exe.display(), args.join(" "));

        let output = cmd.output().map_err(|e| {
            RoshError::Query(format!("failed to run {}: {e}", exe.display()))
        })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RoshError::Query(stderr.trim().to_string()));
        }
        parse_json_list(&output.stdout)
    }
}

/// Tools print nothing at all for an empty dump.
fn parse_json_list<T: DeserializeOwned>(stdout: &[u8]) -> Result<Vec<T>> {
    if stdout.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_slice(stdout)?)
}

impl NetworkQuery for IprouteQuery {
    fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    fn list_links(&self) -> Result<Vec<Link>> {
        let raw: Vec<IpLink> = self.run(&self.ip, &["-d", "link", "show"])?;
        Ok(raw.into_iter().map(IpLink::into_link).collect())
    }

    fn list_addresses(&self, filter: &AddressFilter) -> Result<Vec<Address>> {
        let mut args: Vec<&str> = Vec::new();
        args.extend(Self::family_arg(filter.family));
        args.extend(["addr", "show"]);
        if let Some(dev) = &filter.dev {
            args.extend(["dev", dev.as_str()]);
        }
        let raw: Vec<IpAddrIface> = self.run(&self.ip, &args)?;
        Ok(raw.into_iter().flat_map(IpAddrIface::into_addresses).collect())
    }

    fn list_routes(&self, filter: &RouteFilter) -> Result<Vec<Route>> {
        let family = filter.family.unwrap_or(Family::V4);
        let table = filter.table.map(|t| t.to_string());
        let proto = filter.proto.map(|p| p.to_string());
        let scope = filter.scope.map(|s| s.to_string());
        let via = filter.via.map(|v| v.to_string());
        let to = filter.to.map(|p| p.to_string());

        let mut args: Vec<&str> = Vec::new();
        args.extend(Self::family_arg(Some(family)));
        args.extend(["route", "show"]);
        if let Some(table) = &table {
            args.extend(["table", table.as_str()]);
        }
        if let Some(dev) = &filter.dev {
            args.extend(["dev", dev.as_str()]);
        }
        if let Some(via) = &via {
            args.extend(["via", via.as_str()]);
        }
        if let Some(to) = &to {
            args.extend(["to", "match", to.as_str()]);
        }
        if let Some(proto) = &proto {
            args.extend(["proto", proto.as_str()]);
        }
        if let Some(scope) = &scope {
            args.extend(["scope", scope.as_str()]);
        }

        let raw: Vec<IpRoute> = self.run(&self.ip, &args)?;
        Ok(raw
            .into_iter()
            .filter_map(|r| r.into_route(family, filter.dev.as_deref()))
            .collect())
    }

    fn list_neighbours(&self, filter: &NeighbourFilter) -> Result<Vec<Neighbour>> {
        if filter.family == Some(Family::Bridge) {
            let mut args = vec!["fdb", "show"];
            if let Some(dev) = &filter.dev {
                args.extend(["dev", dev.as_str()]);
            }
            let raw: Vec<BridgeFdb> = self.run(&self.bridge, &args)?;
            return Ok(raw.into_iter().map(BridgeFdb::into_neighbour).collect());
        }

        let mut args: Vec<&str> = Vec::new();
        args.extend(Self::family_arg(filter.family));
        args.extend(["neigh", "show"]);
        if let Some(dev) = &filter.dev {
            args.extend(["dev", dev.as_str()]);
        }
        let raw: Vec<IpNeigh> = self.run(&self.ip, &args)?;
        Ok(raw
            .into_iter()
            .map(|n| n.into_neighbour(filter.dev.as_deref()))
            .collect())
    }

    fn list_rules(&self, filter: &RuleFilter) -> Result<Vec<Rule>> {
        let family = filter.family.unwrap_or(Family::V4);
        let mut args: Vec<&str> = Vec::new();
        args.extend(Self::family_arg(Some(family)));
        args.extend(["rule", "show"]);
        if let Some(dev) = &filter.dev {
            args.extend(["iif", dev.as_str()]);
        }
        let raw: Vec<IpRule> = self.run(&self.ip, &args)?;
        Ok(raw.into_iter().map(|r| r.into_rule(family)).collect())
    }

    fn list_namespaces(&self) -> Result<Vec<String>> {
        // Namespace names are host-wide; never query them through `-n`.
        let host = Self {
            namespace: None,
            ..self.clone()
        };
        let raw: Vec<IpNetns> = host.run(&self.ip, &["netns", "list"])?;
        let mut names: Vec<String> = raw.into_iter().map(|n| n.name).collect();
        names.sort();
        Ok(names)
    }

    fn for_namespace(&self, namespace: Option<&str>) -> Result<Arc<dyn NetworkQuery>> {
        Ok(Arc::new(Self {
            namespace: namespace.map(str::to_string),
            ..self.clone()
        }))
    }
}

// ---------------------------------------------------------------------------
// JSON shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct IpLink {
    ifindex: u32,
    ifname: String,
    #[serde(default)]
    flags: Vec<String>,
    mtu: Option<u32>,
    operstate: Option<String>,
    address: Option<String>,
    master: Option<String>,
    linkinfo: Option<IpLinkInfo>,
    parentbus: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IpLinkInfo {
    info_kind: Option<String>,
}

impl IpLink {
    fn into_link(self) -> Link {
        let has = |f: &str| self.flags.iter().any(|x| x == f);
        let admin_up = has("UP");
        let carrier = has("LOWER_UP");
        let kind = self
            .linkinfo
            .as_ref()
            .and_then(|i| i.info_kind.clone())
            .or_else(|| self.parentbus.clone());
        Link {
            index: self.ifindex,
            name: self.ifname,
            kind,
            admin_up,
            oper_state: self
                .operstate
                .unwrap_or_else(|| "unknown".into())
                .to_lowercase(),
            carrier,
            mtu: self.mtu,
            address: self.address,
            master: self.master,
            parent_bus: self.parentbus,
        }
    }
}

#[derive(Debug, Deserialize)]
struct IpAddrIface {
    ifindex: u32,
    ifname: String,
    #[serde(default)]
    addr_info: Vec<IpAddrInfo>,
}

#[derive(Debug, Deserialize)]
struct IpAddrInfo {
    local: Option<String>,
    prefixlen: u8,
    scope: Option<String>,
    #[serde(flatten)]
    extra: BTreeMap<String, serde_json::Value>,
}

impl IpAddrIface {
    fn into_addresses(self) -> Vec<Address> {
        let ifindex = self.ifindex;
        let ifname = self.ifname;
        self.addr_info
            .into_iter()
            .filter_map(|info| {
                let local: IpAddr = info.local.as_deref()?.parse().ok()?;
                // Address flags appear as boolean keys.
                let flags = info
                    .extra
                    .iter()
                    .filter(|(_, v)| v.as_bool() == Some(true))
                    .map(|(k, _)| k.clone())
                    .collect();
                Some(Address {
                    index: ifindex,
                    ifname: ifname.clone(),
                    local,
                    prefix_len: info.prefixlen,
                    scope: info.scope.unwrap_or_else(|| "global".into()),
                    flags,
                })
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct IpRoute {
    dst: String,
    gateway: Option<String>,
    dev: Option<String>,
    metric: Option<u32>,
    pref: Option<String>,
    protocol: Option<String>,
    scope: Option<String>,
    table: Option<String>,
    #[serde(default)]
    flags: Vec<String>,
}

impl IpRoute {
    /// `dev_filter` fills in the device, which `ip` omits when filtering by it.
    fn into_route(self, family: Family, dev_filter: Option<&str>) -> Option<Route> {
        let dst = parse_route_dst(&self.dst, family)?;
        Some(Route {
            dst,
            gateway: self.gateway.as_deref().and_then(|g| g.parse().ok()),
            dev: self.dev.or_else(|| dev_filter.map(str::to_string)),
            metric: self.metric,
            pref: self.pref,
            protocol: self.protocol.unwrap_or_else(|| "boot".into()),
            scope: self.scope.unwrap_or_else(|| "global".into()),
            table: self.table,
            flags: self.flags,
        })
    }
}

/// `default`, a bare host or `addr/len`.
fn parse_route_dst(dst: &str, family: Family) -> Option<Prefix> {
    if dst == "default" {
        let any: IpAddr = match family {
            Family::V6 => "::".parse().ok()?,
            _ => "0.0.0.0".parse().ok()?,
        };
        return Some(Prefix::truncating(any, 0));
    }
    match dst.split_once('/') {
        Some((addr, len)) => Some(Prefix::truncating(addr.parse().ok()?, len.parse().ok()?)),
        None => {
            let addr: IpAddr = dst.parse().ok()?;
            Some(Prefix::truncating(addr, Family::of(&addr).max_prefix_len()))
        },
    }
}

#[derive(Debug, Deserialize)]
struct IpNeigh {
    dst: Option<String>,
    dev: Option<String>,
    lladdr: Option<String>,
    #[serde(default)]
    state: Vec<String>,
    #[serde(flatten)]
    extra: BTreeMap<String, serde_json::Value>,
}

const NEIGH_FLAG_KEYS: &[&str] = &["router", "proxy", "extern_learn", "offload"];

impl IpNeigh {
    fn into_neighbour(self, dev_filter: Option<&str>) -> Neighbour {
        let flags = NEIGH_FLAG_KEYS
            .iter()
            .filter(|k| self.extra.contains_key(**k))
            .map(|k| k.to_string())
            .collect();
        Neighbour {
            dst: self.dst,
            dev: self
                .dev
                .or_else(|| dev_filter.map(str::to_string))
                .unwrap_or_default(),
            lladdr: self.lladdr,
            state: self.state.iter().map(|s| s.to_lowercase()).collect(),
            flags,
        }
    }
}

#[derive(Debug, Deserialize)]
struct BridgeFdb {
    mac: Option<String>,
    ifname: Option<String>,
    dst: Option<String>,
    #[serde(default)]
    state: serde_json::Value,
    #[serde(default)]
    flags: Vec<String>,
}

impl BridgeFdb {
    fn into_neighbour(self) -> Neighbour {
        let state = match self.state {
            serde_json::Value::String(s) if !s.is_empty() => vec![s],
            serde_json::Value::Array(items) => items
                .into_iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        };
        Neighbour {
            dst: self.dst,
            dev: self.ifname.unwrap_or_default(),
            lladdr: self.mac,
            state,
            flags: self.flags,
        }
    }
}

#[derive(Debug, Deserialize)]
struct IpRule {
    #[serde(default)]
    priority: u32,
    src: Option<String>,
    srclen: Option<u8>,
    dst: Option<String>,
    dstlen: Option<u8>,
    iif: Option<String>,
    oif: Option<String>,
    fwmark: Option<String>,
    ipproto: Option<String>,
    table: Option<String>,
    goto: Option<u32>,
    action: Option<String>,
    protocol: Option<String>,
}

impl IpRule {
    fn into_rule(self, family: Family) -> Rule {
        let selector = |addr: Option<String>, len: Option<u8>| match (addr, len) {
            (Some(a), Some(l)) if a != "all" => format!("{a}/{l}"),
            (Some(a), _) if a != "all" => {
                let max = a
                    .parse::<IpAddr>()
                    .map(|ip| Family::of(&ip).max_prefix_len())
                    .unwrap_or_else(|_| family.max_prefix_len());
                format!("{a}/{max}")
            },
            _ => "all".to_string(),
        };
        let (action, target) = match (self.table, self.goto, self.action) {
            (Some(table), _, _) => ("lookup".to_string(), Some(table)),
            (None, Some(goto), _) => ("goto".to_string(), Some(goto.to_string())),
            (None, None, Some(action)) => (action, None),
            (None, None, None) => ("unspec".to_string(), None),
        };
        Rule {
            priority: self.priority,
            src: selector(self.src, self.srclen),
            dst: selector(self.dst, self.dstlen),
            iif: self.iif,
            oif: self.oif,
            fwmark: self.fwmark,
            ip_proto: self.ipproto,
            action,
            target,
            protocol: self.protocol,
        }
    }
}

#[derive(Debug, Deserialize)]
struct IpNetns {
    name: String,
}
