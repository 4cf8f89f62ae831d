//! `show ...` commands: read-only views of the network state.

use std::fmt::Display;
use std::path::Path;
use std::sync::Arc;

use rosh_platform::{AddressFilter, NeighbourFilter, QueryContext, RouteFilter, RuleFilter};
use rosh_types::error::{Result, RoshError};
use rosh_types::lookup::Lookups;
use rosh_types::value::{Family, Value};

use crate::completer::{Completer, PeerCompleter, TupleCompleter, WordCompleter};
use crate::interpreter::{
    Command, CommandOutput, Environment, Invocation, ParsedArgs, validate_simple,
};
use crate::output::Details;
use crate::system_commands::run_tool;
use crate::value_completers::{AddrCompleter, LinkCompleter, LookupCompleter, PrefixCompleter};

/// `show interface IFNAME <sub>` → ethtool flag.
pub const ETHTOOL_SUBCOMMANDS: &[(&str, &str)] = &[
    ("coalesce", "-c"),
    ("driver", "-i"),
    ("eee", "--show-eee"),
    ("features", "-k"),
    ("module", "-m"),
    ("pause", "-a"),
    ("ring", "-g"),
    ("settings", "-I"),
    ("stats", "-S"),
    ("tstamp", "-T"),
];

/// Read by `show ifstate config` when no file is configured.
pub const IFSTATE_DEFAULT_CONFIG: &str = "/etc/ifstate/config.yml";

fn dash<T: Display>(value: Option<T>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

fn join_or_dash(items: &[String]) -> String {
    if items.is_empty() {
        "-".to_string()
    } else {
        items.join(",")
    }
}

fn up_down(flag: bool) -> &'static str {
    if flag { "up" } else { "down" }
}

fn table(headers: &[&str], rows: Vec<Vec<String>>) -> CommandOutput {
    CommandOutput::Table {
        headers: headers.iter().map(|h| h.to_string()).collect(),
        rows,
    }
}

/// The interface named by the positional argument, if any.
fn dev_arg(inv: &Invocation) -> Option<String> {
    inv.parsed
        .positional
        .as_ref()
        .and_then(Value::as_text)
        .map(str::to_string)
}

// ---------------------------------------------------------------------------
// show interface
// ---------------------------------------------------------------------------

pub struct ShowInterfaceCmd {
    completer: Arc<dyn Completer>,
    ethtool: bool,
}

impl ShowInterfaceCmd {
    /// Without ethtool only the brief and detail views exist.
    pub fn new(query: &Arc<QueryContext>, ethtool: bool) -> Self {
        let links: Arc<dyn Completer> = Arc::new(LinkCompleter::all(Arc::clone(query)));
        let completer: Arc<dyn Completer> = if ethtool {
            let subs: Vec<&str> = ETHTOOL_SUBCOMMANDS.iter().map(|(name, _)| *name).collect();
            Arc::new(PeerCompleter::new(links, Arc::new(WordCompleter::new(&subs))))
        } else {
            links
        };
        Self { completer, ethtool }
    }

    fn brief(&self, env: &Environment<'_>) -> Result<CommandOutput> {
        let mut links = env.query.current().list_links()?;
        links.sort_by(|a, b| a.name.cmp(&b.name));
        let rows = links
            .into_iter()
            .map(|l| {
                vec![
                    l.index.to_string(),
                    l.name,
                    dash(l.kind),
                    up_down(l.admin_up).to_string(),
                    l.oper_state,
                    up_down(l.carrier).to_string(),
                ]
            })
            .collect();
        Ok(table(
            &["idx", "ifname", "kind", "admin", "oper", "carrier"],
            rows,
        ))
    }

    fn details(&self, env: &Environment<'_>, ifname: &str) -> Result<CommandOutput> {
        let query = env.query.current();
        let link = query
            .list_links()?
            .into_iter()
            .find(|l| l.name == ifname)
            .ok_or_else(|| RoshError::Command(format!("{ifname} does not exist")))?;
        let addresses = query.list_addresses(&AddressFilter {
            dev: Some(link.name.clone()),
            ..AddressFilter::default()
        })?;

        let mut view = Details::new()
            .section("States")
            .field("admin", up_down(link.admin_up))
            .field("oper", &link.oper_state)
            .field("carrier", up_down(link.carrier))
            .section("Addresses")
            .field("L2", dash(link.address.as_ref()));
        for a in &addresses {
            view = view.field("L3", format!("{}/{}", a.local, a.prefix_len));
        }
        if let Some(mtu) = link.mtu {
            view = view.section("MTU").field("set", mtu);
        }
        Ok(view
            .section("Link")
            .field("index", link.index)
            .field_opt("kind", link.kind.as_ref())
            .field_opt("bus", link.parent_bus.as_ref())
            .field_opt("master", link.master.as_ref())
            .build())
    }
}

impl Command for ShowInterfaceCmd {
    fn description(&self) -> &str {
        "show interface details"
    }
    fn completer(&self) -> Arc<dyn Completer> {
        Arc::clone(&self.completer)
    }
    fn max_args(&self) -> Option<usize> {
        Some(if self.ethtool { 2 } else { 1 })
    }
    fn validate(&self, args: &[String]) -> Result<ParsedArgs> {
        let parsed = validate_simple(args, 0, self.max_args(), self.completer.as_ref())?;
        if let Some(sub) = args.get(1)
            && !ETHTOOL_SUBCOMMANDS.iter().any(|(name, _)| name == sub)
        {
            return Err(RoshError::Argument {
                column: 1,
                message: format!("subcommand {sub} is invalid"),
            });
        }
        Ok(parsed)
    }
    fn execute(&self, inv: &Invocation, env: &mut Environment<'_>) -> Result<CommandOutput> {
        match inv.args.as_slice() {
            [] => self.brief(env),
            [ifname] => self.details(env, ifname),
            [ifname, sub, ..] => {
                let flag = ETHTOOL_SUBCOMMANDS
                    .iter()
                    .find(|(name, _)| name == sub)
                    .map(|(_, flag)| *flag)
                    .ok_or_else(|| RoshError::Command(format!("subcommand {sub} is invalid")))?;
                run_tool(env, "ethtool", &[flag.to_string(), ifname.clone()])
            },
        }
    }
}

// ---------------------------------------------------------------------------
// show ip|ipv6 address
// ---------------------------------------------------------------------------

pub struct ShowAddressCmd {
    family: Family,
    completer: Arc<dyn Completer>,
}

impl ShowAddressCmd {
    pub fn new(query: &Arc<QueryContext>, family: Family) -> Self {
        Self {
            family,
            completer: Arc::new(LinkCompleter::all(Arc::clone(query))),
        }
    }
}

impl Command for ShowAddressCmd {
    fn description(&self) -> &str {
        match self.family {
            Family::V6 => "show assigned ipv6 addresses",
            _ => "show assigned ipv4 addresses",
        }
    }
    fn completer(&self) -> Arc<dyn Completer> {
        Arc::clone(&self.completer)
    }
    fn max_args(&self) -> Option<usize> {
        Some(1)
    }
    fn execute(&self, inv: &Invocation, env: &mut Environment<'_>) -> Result<CommandOutput> {
        let mut addrs = env.query.current().list_addresses(&AddressFilter {
            family: Some(self.family),
            dev: dev_arg(inv),
        })?;
        addrs.sort_by_key(|a| (a.local, a.prefix_len));
        let rows = addrs
            .into_iter()
            .map(|a| {
                vec![
                    format!("{}/{}", a.local, a.prefix_len),
                    a.ifname,
                    a.scope,
                    join_or_dash(&a.flags),
                ]
            })
            .collect();
        Ok(table(&["address", "ifname", "scope", "flags"], rows))
    }
}

// ---------------------------------------------------------------------------
// show ip|ipv6 neighbour, show bridge fdb
// ---------------------------------------------------------------------------

pub struct ShowNeighbourCmd {
    family: Family,
    completer: Arc<dyn Completer>,
}

impl ShowNeighbourCmd {
    /// `Family::Bridge` shows the bridge forwarding database.
    pub fn new(query: &Arc<QueryContext>, family: Family) -> Self {
        Self {
            family,
            completer: Arc::new(LinkCompleter::all(Arc::clone(query))),
        }
    }
}

impl Command for ShowNeighbourCmd {
    fn description(&self) -> &str {
        match self.family {
            Family::V4 => "show ipv4 neighbours",
            Family::V6 => "show ipv6 neighbours",
            Family::Bridge => "show bridge forwarding database",
        }
    }
    fn completer(&self) -> Arc<dyn Completer> {
        Arc::clone(&self.completer)
    }
    fn max_args(&self) -> Option<usize> {
        Some(1)
    }
    fn execute(&self, inv: &Invocation, env: &mut Environment<'_>) -> Result<CommandOutput> {
        let mut neighbours = env.query.current().list_neighbours(&NeighbourFilter {
            family: Some(self.family),
            dev: dev_arg(inv),
        })?;
        neighbours.sort_by(|a, b| (&a.dst, &a.lladdr).cmp(&(&b.dst, &b.lladdr)));
        let rows = neighbours
            .into_iter()
            .map(|n| {
                vec![
                    dash(n.dst),
                    dash(n.lladdr),
                    n.dev,
                    join_or_dash(&n.flags),
                    join_or_dash(&n.state),
                ]
            })
            .collect();
        Ok(table(&["dst", "lladdr", "ifname", "flags", "state"], rows))
    }
}

// ---------------------------------------------------------------------------
// show ip|ipv6 rule
// ---------------------------------------------------------------------------

pub struct ShowRuleCmd {
    family: Family,
    completer: Arc<dyn Completer>,
}

impl ShowRuleCmd {
    pub fn new(query: &Arc<QueryContext>, family: Family) -> Self {
        Self {
            family,
            completer: Arc::new(LinkCompleter::all(Arc::clone(query))),
        }
    }
}

impl Command for ShowRuleCmd {
    fn description(&self) -> &str {
        match self.family {
            Family::V6 => "show ipv6 routing rules",
            _ => "show ipv4 routing rules",
        }
    }
    fn completer(&self) -> Arc<dyn Completer> {
        Arc::clone(&self.completer)
    }
    fn max_args(&self) -> Option<usize> {
        Some(1)
    }
    fn execute(&self, inv: &Invocation, env: &mut Environment<'_>) -> Result<CommandOutput> {
        let mut rules = env.query.current().list_rules(&RuleFilter {
            family: Some(self.family),
            dev: dev_arg(inv),
        })?;
        rules.sort_by_key(|r| r.priority);
        let rows = rules
            .into_iter()
            .map(|r| {
                vec![
                    r.priority.to_string(),
                    r.src,
                    r.dst,
                    dash(r.iif),
                    dash(r.oif),
                    dash(r.fwmark),
                    dash(r.ip_proto),
                    r.action,
                    dash(r.target),
                    dash(r.protocol),
                ]
            })
            .collect();
        Ok(table(
            &[
                "prio", "from", "to", "iif", "oif", "fwmark", "ip_proto", "action", "target",
                "proto",
            ],
            rows,
        ))
    }
}

// ---------------------------------------------------------------------------
// show ip|ipv6 route
// ---------------------------------------------------------------------------

/// Route dump filtered by any combination of `name value` pairs.
pub struct ShowRouteCmd {
    family: Family,
    params: TupleCompleter,
}

impl ShowRouteCmd {
    pub fn new(query: &Arc<QueryContext>, lookups: &Lookups, family: Family) -> Self {
        let params = TupleCompleter::new([
            (
                "dev",
                Arc::new(LinkCompleter::all(Arc::clone(query))) as Arc<dyn Completer>,
            ),
            ("via", Arc::new(AddrCompleter::new(Some(family))) as Arc<dyn Completer>),
            ("to", Arc::new(PrefixCompleter::new(Some(family))) as Arc<dyn Completer>),
            (
                "proto",
                Arc::new(LookupCompleter::new("protocol", lookups.protos.clone())) as Arc<dyn Completer>,
            ),
            (
                "table",
                Arc::new(LookupCompleter::new("table", lookups.tables.clone())) as Arc<dyn Completer>,
            ),
            (
                "scope",
                Arc::new(LookupCompleter::new("scope", lookups.scopes.clone())) as Arc<dyn Completer>,
            ),
        ]);
        Self { family, params }
    }

    fn filter(&self, parsed: &ParsedArgs) -> RouteFilter {
        let named = &parsed.named;
        RouteFilter {
            family: Some(self.family),
            dev: named.get("dev").and_then(Value::as_text).map(str::to_string),
            via: match named.get("via") {
                Some(Value::Addr(addr)) => Some(*addr),
                _ => None,
            },
            to: match named.get("to") {
                Some(Value::Prefix(prefix)) => Some(*prefix),
                _ => None,
            },
            proto: named.get("proto").and_then(Value::as_id),
            table: named.get("table").and_then(Value::as_id),
            scope: named.get("scope").and_then(Value::as_id),
        }
    }
}

impl Command for ShowRouteCmd {
    fn description(&self) -> &str {
        match self.family {
            Family::V6 => "show ipv6 routes",
            _ => "show ipv4 routes",
        }
    }
    fn completer(&self) -> Arc<dyn Completer> {
        Arc::new(self.params.clone())
    }
    fn validate(&self, args: &[String]) -> Result<ParsedArgs> {
        self.params.validate_pairs(args)
    }
    fn execute(&self, inv: &Invocation, env: &mut Environment<'_>) -> Result<CommandOutput> {
        let mut routes = env.query.current().list_routes(&self.filter(&inv.parsed))?;
        routes.sort_by_key(|r| (r.dst.addr(), r.dst.len()));
        let rows = routes
            .into_iter()
            .map(|r| {
                vec![
                    r.dst.to_string(),
                    dash(r.gateway),
                    dash(r.dev),
                    dash(r.metric),
                    dash(r.pref),
                    r.protocol,
                    r.scope,
                    join_or_dash(&r.flags),
                ]
            })
            .collect();
        Ok(table(
            &["dst", "via", "dev", "prio", "pref", "proto", "scope", "flags"],
            rows,
        ))
    }
}

// ---------------------------------------------------------------------------
// show netns
// ---------------------------------------------------------------------------

pub struct ShowNetnsCmd;
impl Command for ShowNetnsCmd {
    fn description(&self) -> &str {
        "list network namespaces"
    }
    fn max_args(&self) -> Option<usize> {
        Some(0)
    }
    fn execute(&self, _inv: &Invocation, env: &mut Environment<'_>) -> Result<CommandOutput> {
        let mut names = env.query.current().list_namespaces()?;
        names.sort();
        Ok(table(&["netns"], names.into_iter().map(|n| vec![n]).collect()))
    }
}

// ---------------------------------------------------------------------------
// show ifstate config
// ---------------------------------------------------------------------------

pub struct ShowIfstateConfigCmd;
impl Command for ShowIfstateConfigCmd {
    fn description(&self) -> &str {
        "show ifstate's config file"
    }
    fn validate(&self, args: &[String]) -> Result<ParsedArgs> {
        if !args.is_empty() {
            return Err(RoshError::Argument {
                column: 0,
                message: "no parameters allowed".into(),
            });
        }
        Ok(ParsedArgs::default())
    }
    fn execute(&self, _inv: &Invocation, env: &mut Environment<'_>) -> Result<CommandOutput> {
        let configured = &env.config.command.ifstatecli.config_file;
        let path = if configured.is_empty() {
            Path::new(IFSTATE_DEFAULT_CONFIG)
        } else {
            Path::new(configured)
        };
        let text = std::fs::read_to_string(path).map_err(|e| {
            RoshError::Command(format!("could not read {}: {e}", path.display()))
        })?;
        Ok(CommandOutput::Text(text.trim_end().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use rosh_types::config::RoshConfig;

    use crate::test_utils::{RecordingLauncher, test_shell, test_shell_with};

    fn rows(out: CommandOutput) -> Vec<Vec<String>> {
        match out {
            CommandOutput::Table { rows, .. } => rows,
            other => panic!("expected table, got {other:?}"),
        }
    }

    fn column(out: CommandOutput, i: usize) -> Vec<String> {
        rows(out).into_iter().map(|r| r[i].clone()).collect()
    }

    #[test]
    fn interface_brief_sorted_by_name() {
        let t = test_shell();
        let out = t.shell.dispatch("show interface").unwrap();
        let CommandOutput::Table { headers, rows } = out else {
            panic!("expected table");
        };
        assert_eq!(headers, vec!["idx", "ifname", "kind", "admin", "oper", "carrier"]);
        let names: Vec<&str> = rows.iter().map(|r| r[1].as_str()).collect();
        assert_eq!(names, vec!["br0", "eth0", "lo"]);
        assert_eq!(rows[0][2], "bridge");
        assert_eq!(rows[1][2], "pci");
        assert_eq!(rows[2][2], "-");
        assert_eq!(rows[2][4], "unknown");
    }

    #[test]
    fn interface_details_sections() {
        let t = test_shell();
        let CommandOutput::Text(text) = t.shell.dispatch("show interface eth0").unwrap() else {
            panic!("expected text");
        };
        assert!(text.starts_with("States:\n  admin: up\n"));
        assert!(text.contains("  L3: 192.0.2.1/24"));
        assert!(text.contains("  L3: 2001:db8::1/64"));
        assert!(text.contains("MTU:\n  set: 1500"));
        assert!(text.contains("  bus: pci"));
    }

    #[test]
    fn interface_ethtool_subcommand() {
        let t = test_shell();
        t.shell.dispatch("show interface eth0 stats").unwrap();
        let launches = t.launcher.launches();
        assert_eq!(launches.len(), 1);
        assert_eq!(launches[0].executable, Path::new("/usr/bin/ethtool"));
        assert_eq!(launches[0].args, vec!["-S", "eth0"]);
    }

    #[test]
    fn interface_argument_errors() {
        let t = test_shell();
        let err = t.shell.dispatch("show interface eth9").unwrap_err();
        assert_eq!(err.column(), Some(0));
        assert_eq!(format!("{err}"), "eth9 is invalid for interface");
        let err = t.shell.dispatch("show interface eth0 bogus").unwrap_err();
        assert_eq!(err.column(), Some(1));
        assert_eq!(format!("{err}"), "subcommand bogus is invalid");
        let err = t.shell.dispatch("show interface eth0 stats x").unwrap_err();
        assert_eq!(err.column(), Some(2));
    }

    #[test]
    fn interface_completion_offers_subcommands() {
        let t = test_shell();
        let got: Vec<String> = t
            .shell
            .complete("show interface eth0 s", 21)
            .into_iter()
            .map(|c| c.text)
            .collect();
        assert_eq!(got, vec!["settings", "stats"]);
    }

    #[test]
    fn addresses_per_family() {
        let t = test_shell();
        let v4 = column(t.shell.dispatch("show ip address").unwrap(), 0);
        assert_eq!(v4, vec!["192.0.2.1/24", "198.51.100.1/24"]);
        let v6 = column(t.shell.dispatch("show ipv6 address").unwrap(), 0);
        assert_eq!(v6, vec!["2001:db8::1/64"]);
        let br = column(t.shell.dispatch("show ip addr br0").unwrap(), 1);
        assert_eq!(br, vec!["br0"]);
    }

    #[test]
    fn route_tuple_filters() {
        let t = test_shell();
        let dsts = column(
            t.shell.dispatch("show ip route proto static").unwrap(),
            0,
        );
        assert_eq!(dsts, vec!["0.0.0.0/0", "172.16.0.0/12"]);
        let dsts = column(
            t.shell.dispatch("show ip route dev eth0 via 192.0.2.254").unwrap(),
            0,
        );
        assert_eq!(dsts, vec!["0.0.0.0/0"]);
        let dsts = column(t.shell.dispatch("show ip route to 10.2.0.0/16").unwrap(), 0);
        assert_eq!(dsts, vec!["10.2.0.0/16"]);
        assert!(rows(t.shell.dispatch("show ip route table 100").unwrap()).is_empty());
        let v6 = column(t.shell.dispatch("show ipv6 route").unwrap(), 0);
        assert_eq!(v6, vec!["2001:db8::/64"]);
    }

    #[test]
    fn route_value_errors() {
        let t = test_shell();
        let err = t.shell.dispatch("show ip route via 2001:db8::1").unwrap_err();
        assert_eq!(err.column(), Some(1));
        assert_eq!(format!("{err}"), "'2001:db8::1' is not an inet address");
        let err = t.shell.dispatch("show ip route table nope").unwrap_err();
        assert_eq!(format!("{err}"), "nope is invalid for table");
        let err = t.shell.dispatch("show ip route metric 5").unwrap_err();
        assert_eq!(err.column(), Some(0));
    }

    #[test]
    fn neighbours_and_fdb() {
        let t = test_shell();
        let out = rows(t.shell.dispatch("show ip neighbour").unwrap());
        assert_eq!(out[0], vec!["192.0.2.254", "02:00:00:00:00:fe", "eth0", "-", "reachable"]);
        assert!(rows(t.shell.dispatch("show ipv6 neighbour").unwrap()).is_empty());
        let fdb = rows(t.shell.dispatch("show bridge fdb").unwrap());
        assert_eq!(fdb[0], vec!["-", "02:00:00:00:00:aa", "br0", "self", "permanent"]);
    }

    #[test]
    fn rules_sorted_by_priority() {
        let t = test_shell();
        let out = rows(t.shell.dispatch("show ip rule").unwrap());
        assert_eq!(out.len(), 2);
        assert_eq!(out[0][0], "0");
        assert_eq!(out[1][3], "eth0");
        assert_eq!(out[1][8], "100");
        assert_eq!(rows(t.shell.dispatch("show ip rule eth0").unwrap()).len(), 1);
    }

    #[test]
    fn netns_listing() {
        let t = test_shell();
        assert_eq!(column(t.shell.dispatch("show netns").unwrap(), 0), vec!["blue"]);
    }

    #[test]
    fn ifstate_config_reads_configured_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "interfaces:\n  - name: eth0").unwrap();
        let mut config = RoshConfig::default();
        config.command.ifstatecli.config_file = file.path().display().to_string();
        let t = test_shell_with(RecordingLauncher::default(), config);
        let out = t.shell.dispatch("show ifstate config").unwrap();
        assert_eq!(out, CommandOutput::Text("interfaces:\n  - name: eth0".into()));
        let err = t.shell.dispatch("show ifstate config x").unwrap_err();
        assert_eq!(format!("{err}"), "no parameters allowed");
    }
}
